//! specbed-spec: the declarative test specification model.
//!
//! A [`TestSpec`] names one test case: the workload to run inside a
//! testbed, the outputs it must produce, the comparisons to evaluate over
//! those outputs, and the environment it requires. This crate owns the
//! typed model, loading from JSON documents and discovery of spec files.
//! It performs no execution; see `specbed-runner` for that.

pub mod discover;
pub mod load;
pub mod types;

pub use discover::discover_specs;
pub use load::{load_spec, SpecError};
pub use types::*;
