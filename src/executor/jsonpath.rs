//! Minimal JSON path extraction for `produces` bindings (spec §3): paths
//! like `Instances[0].InstanceId` against a command's JSON stdout.

use serde_json::Value;

fn tokenize(path: &str) -> Vec<PathSegment> {
    let mut out = Vec::new();
    for part in path.split('.') {
        let mut rest = part;
        while let Some(bracket) = rest.find('[') {
            let (field, after) = rest.split_at(bracket);
            if !field.is_empty() {
                out.push(PathSegment::Key(field.to_string()));
            }
            if let Some(close) = after.find(']') {
                if let Ok(index) = after[1..close].parse::<usize>() {
                    out.push(PathSegment::Index(index));
                }
                rest = &after[close + 1..];
            } else {
                rest = "";
            }
        }
        if !rest.is_empty() {
            out.push(PathSegment::Key(rest.to_string()));
        }
    }
    out
}

enum PathSegment {
    Key(String),
    Index(usize),
}

/// Extracts the value at `path` from `stdout`'s parsed JSON, rendered as a
/// plain string (strings pass through; other scalars are stringified).
/// Returns `None` if `stdout` doesn't parse or the path doesn't resolve.
pub fn extract(stdout: &str, path: &str) -> Option<String> {
    let value: Value = serde_json::from_str(stdout).ok()?;
    let mut cursor = &value;
    for segment in tokenize(path) {
        cursor = match segment {
            PathSegment::Key(key) => cursor.get(&key)?,
            PathSegment::Index(index) => cursor.get(index)?,
        };
    }
    match cursor {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_nested_array_field() {
        let stdout = r#"{"Instances":[{"InstanceId":"i-123"}]}"#;
        assert_eq!(extract(stdout, "Instances[0].InstanceId"), Some("i-123".to_string()));
    }

    #[test]
    fn extracts_top_level_field() {
        let stdout = r#"{"Account":"123456789012"}"#;
        assert_eq!(extract(stdout, "Account"), Some("123456789012".to_string()));
    }

    #[test]
    fn missing_path_returns_none() {
        let stdout = r#"{"Account":"123456789012"}"#;
        assert_eq!(extract(stdout, "Nothing.Here"), None);
    }

    #[test]
    fn malformed_stdout_returns_none() {
        assert_eq!(extract("not json", "Account"), None);
    }
}
