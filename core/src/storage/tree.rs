//! Path addressing over a JSON tree with realtime-database semantics:
//! writing `null` deletes, deleting prunes parents left empty, and an empty
//! object reads as absent.

use crate::{Error, Result};
use serde_json::{Map, Value};

const FORBIDDEN: &[char] = &['.', '$', '#', '[', ']', '/'];

/// Validate a single key (one path segment)
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidPath("empty key".to_string()));
    }
    if let Some(c) = key.chars().find(|c| FORBIDDEN.contains(c) || c.is_control()) {
        return Err(Error::InvalidPath(format!("key {:?} contains {:?}", key, c)));
    }
    Ok(())
}

/// Split a `/`-separated path into validated segments. The empty path (or
/// `/`) addresses the root.
pub fn segments(path: &str) -> Result<Vec<&str>> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let segments: Vec<&str> = trimmed.split('/').collect();
    for segment in &segments {
        validate_key(segment)?;
    }
    Ok(segments)
}

/// Whether a change at `a` is visible from `b` or the other way round
pub fn related<A: AsRef<str>, B: AsRef<str>>(a: &[A], b: &[B]) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| x.as_ref() == y.as_ref())
}

/// Read the value at `path`, `None` when absent
pub fn get<S: AsRef<str>>(root: &Value, path: &[S]) -> Option<Value> {
    let mut node = root;
    for segment in path {
        node = node.as_object()?.get(segment.as_ref())?;
    }
    normalize(node.clone())
}

/// Write `value` at `path`, replacing whatever was there
pub fn set<S: AsRef<str>>(root: &mut Value, path: &[S], value: Value) {
    let Some(value) = normalize(value) else {
        remove(root, path);
        return;
    };

    let Some((first, rest)) = path.split_first() else {
        *root = value;
        return;
    };

    if !root.is_object() {
        *root = Value::Object(Map::new());
    }
    if let Value::Object(children) = root {
        let child = children
            .entry(first.as_ref().to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        set(child, rest, value);
    }
}

/// Merge each child of `children` under `path`, as a `patch` does
pub fn merge<S: AsRef<str>>(root: &mut Value, path: &[S], children: Map<String, Value>) {
    for (key, value) in children {
        let mut child_path: Vec<String> = path.iter().map(|s| s.as_ref().to_string()).collect();
        child_path.extend(key.split('/').filter(|s| !s.is_empty()).map(str::to_string));
        set(root, &child_path, value);
    }
}

/// Remove the value at `path`; removing something absent is a no-op
pub fn remove<S: AsRef<str>>(root: &mut Value, path: &[S]) {
    let Some((first, rest)) = path.split_first() else {
        *root = Value::Null;
        return;
    };

    if let Value::Object(children) = root {
        if rest.is_empty() {
            children.remove(first.as_ref());
        } else if let Some(child) = children.get_mut(first.as_ref()) {
            remove(child, rest);
            if is_empty(child) {
                children.remove(first.as_ref());
            }
        }
        if children.is_empty() {
            *root = Value::Null;
        }
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(children) => children.is_empty(),
        _ => false,
    }
}

/// Strip null children and empty objects; `None` when nothing is left
fn normalize(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(children) => {
            let children: Map<String, Value> = children
                .into_iter()
                .filter_map(|(key, child)| normalize(child).map(|child| (key, child)))
                .collect();
            if children.is_empty() {
                None
            } else {
                Some(Value::Object(children))
            }
        }
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_segments() {
        assert_eq!(segments("favorites/52772").unwrap(), vec!["favorites", "52772"]);
        assert_eq!(segments("/favorites/").unwrap(), vec!["favorites"]);
        assert!(segments("/").unwrap().is_empty());
        assert!(matches!(segments("favorites/a.b"), Err(Error::InvalidPath(_))));
        assert!(matches!(segments("favorites//a"), Err(Error::InvalidPath(_))));
    }

    #[test]
    fn test_related() {
        assert!(related(&["favorites"], &["favorites", "1"]));
        assert!(related(&["favorites", "1"], &["favorites"]));
        assert!(related::<&str, &str>(&[], &["favorites"]));
        assert!(!related(&["favorites", "1"], &["favorites", "2"]));
    }

    #[test]
    fn test_set_and_get() {
        let mut root = Value::Null;
        set(&mut root, &["favorites", "1"], json!({"id": "1"}));
        set(&mut root, &["favorites", "2"], json!({"id": "2"}));

        assert_eq!(get(&root, &["favorites", "1"]), Some(json!({"id": "1"})));
        assert_eq!(get(&root, &["favorites"]).unwrap().as_object().unwrap().len(), 2);
        assert_eq!(get(&root, &["favorites", "3"]), None);
    }

    #[test]
    fn test_remove_prunes_empty_parents() {
        let mut root = Value::Null;
        set(&mut root, &["favorites", "1"], json!({"id": "1"}));
        remove(&mut root, &["favorites", "1"]);

        assert_eq!(root, Value::Null);
        assert_eq!(get(&root, &["favorites"]), None);

        // removing something absent is fine
        remove(&mut root, &["favorites", "1"]);
    }

    #[test]
    fn test_set_null_removes() {
        let mut root = json!({"favorites": {"1": {"id": "1"}, "2": {"id": "2"}}});
        set(&mut root, &["favorites", "1"], Value::Null);
        assert_eq!(root, json!({"favorites": {"2": {"id": "2"}}}));
    }

    #[test]
    fn test_set_strips_nested_nulls() {
        let mut root = Value::Null;
        set(&mut root, &["a"], json!({"keep": 1, "drop": null, "empty": {}}));
        assert_eq!(root, json!({"a": {"keep": 1}}));
    }

    #[test]
    fn test_merge_children() {
        let mut root = json!({"favorites": {"1": {"id": "1"}}});
        let patch = json!({"2": {"id": "2"}, "1": null}).as_object().unwrap().clone();
        merge(&mut root, &["favorites"], patch);
        assert_eq!(root, json!({"favorites": {"2": {"id": "2"}}}));
    }
}
