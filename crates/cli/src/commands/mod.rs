mod plugins;
mod run;
mod validate;

pub(crate) use plugins::cmd_plugins;
pub(crate) use run::{cmd_run, RunArgs};
pub(crate) use validate::cmd_validate;
