//! Environment-variable expansion for declared executable paths.

/// Expand `$NAME` and `${NAME}` from the process environment.
///
/// References to unset variables, and malformed references, are left
/// unchanged. Values that are not valid UTF-8 are substituted lossily.
pub fn expand_vars(input: &str) -> String {
    expand_with(input, process_env)
}

/// Lossy read of a process environment variable; `None` only when unset.
pub(crate) fn process_env(name: &str) -> Option<String> {
    std::env::var_os(name).map(|value| value.to_string_lossy().into_owned())
}

pub(crate) fn expand_with<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], end)
        };
        match (!name.is_empty()).then(|| lookup(name)).flatten() {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[pos..pos + 1 + consumed]),
        }
        rest = &rest[pos + 1 + consumed..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "HOME" => Some("/home/kr".to_string()),
            "TOOL_DIR" => Some("/opt/tool".to_string()),
            _ => None,
        }
    }

    #[test]
    fn expands_plain_and_braced() {
        assert_eq!(expand_with("$HOME/bin/x", lookup), "/home/kr/bin/x");
        assert_eq!(expand_with("${TOOL_DIR}/bin", lookup), "/opt/tool/bin");
        assert_eq!(expand_with("$HOME:$TOOL_DIR", lookup), "/home/kr:/opt/tool");
    }

    #[test]
    fn leaves_unknown_and_malformed_references() {
        assert_eq!(expand_with("$NOPE/bin", lookup), "$NOPE/bin");
        assert_eq!(expand_with("${NOPE}/bin", lookup), "${NOPE}/bin");
        assert_eq!(expand_with("${HOME", lookup), "${HOME");
        assert_eq!(expand_with("cost: $5", lookup), "cost: $5");
        assert_eq!(expand_with("trailing $", lookup), "trailing $");
    }
}
