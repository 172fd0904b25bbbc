use specbed_runner::{BackendRegistry, FingerprintRegistry, OperatorKind, OperatorRegistry};

use crate::OutputFormat;

pub(crate) fn cmd_plugins(output: OutputFormat) {
    let backends = BackendRegistry::with_builtins();
    let fingerprints = FingerprintRegistry::with_builtins();
    let operators = OperatorRegistry::with_builtins();

    let backend_names: Vec<&str> = backends.names().collect();
    let by_tag: Vec<(&str, Vec<&str>)> = fingerprints
        .tags()
        .map(|tag| {
            let names = fingerprints.for_tag(tag).iter().map(|fp| fp.name()).collect();
            (tag, names)
        })
        .collect();
    let by_kind: Vec<(OperatorKind, Vec<&str>)> =
        [OperatorKind::NamedFunction, OperatorKind::NamedClass]
            .into_iter()
            .map(|kind| {
                let names = operators
                    .entries()
                    .filter(|(k, _)| *k == kind)
                    .map(|(_, name)| name)
                    .collect();
                (kind, names)
            })
            .collect();

    match output {
        OutputFormat::Text => {
            println!("backends:");
            for name in &backend_names {
                println!("  {}", name);
            }
            println!("fingerprinters:");
            for (tag, names) in &by_tag {
                println!("  {}: {}", tag, names.join(", "));
            }
            println!("operators:");
            for (kind, names) in &by_kind {
                println!("  {}: {}", kind, names.join(", "));
            }
        }
        OutputFormat::Json => {
            let fingerprinters: serde_json::Map<String, serde_json::Value> = by_tag
                .iter()
                .map(|(tag, names)| (tag.to_string(), serde_json::json!(names)))
                .collect();
            let ops: serde_json::Map<String, serde_json::Value> = by_kind
                .iter()
                .map(|(kind, names)| (kind.to_string(), serde_json::json!(names)))
                .collect();
            let json = serde_json::json!({
                "backends": backend_names,
                "fingerprinters": fingerprinters,
                "operators": ops,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&json).unwrap_or_default()
            );
        }
    }
}
