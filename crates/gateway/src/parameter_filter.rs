//! Rewrites invocation arguments according to the `FilterDirective`s a
//! policy decision returns, before the arguments reach a protocol
//! adapter. Paths are dot-separated JSON keys with optional bracketed
//! array indices (e.g. `"user.addresses[0].street"`).

use sark_domain::FilterDirective;
use serde_json::Value;

/// Apply every directive in order. A directive whose path doesn't
/// resolve to an existing value is a no-op rather than an error — policy
/// authors may write defensive directives for optional fields.
pub fn apply(arguments: &mut Value, directives: &[FilterDirective]) {
    for directive in directives {
        match directive {
            FilterDirective::Drop { path } => drop_path(arguments, path),
            FilterDirective::Redact { path, replacement } => redact_path(arguments, path, replacement),
            FilterDirective::Allowlist { path, keys } => allowlist_path(arguments, path, keys),
        }
    }
}

/// A single path segment: an object key, or an array index.
#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

/// Split `"a.b[2].c"` into the parent segments `[Key(a), Key(b), Index(2)]`
/// and the final segment `Key(c)`. A path segment like `b[2]` is split
/// into a key segment followed by an index segment.
fn split(path: &str) -> (Vec<Segment<'_>>, Segment<'_>) {
    let mut segments = Vec::new();
    for raw in path.split('.').filter(|s| !s.is_empty()) {
        match raw.find('[') {
            None => segments.push(Segment::Key(raw)),
            Some(bracket_pos) => {
                let key = &raw[..bracket_pos];
                if !key.is_empty() {
                    segments.push(Segment::Key(key));
                }
                for index_str in raw[bracket_pos..].split('[').skip(1) {
                    if let Some(index_str) = index_str.strip_suffix(']') {
                        if let Ok(index) = index_str.parse::<usize>() {
                            segments.push(Segment::Index(index));
                        }
                    }
                }
            }
        }
    }
    let last = segments.pop().unwrap_or(Segment::Key(""));
    (segments, last)
}

fn navigate<'a>(root: &'a mut Value, segments: &[Segment<'_>]) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in segments {
        current = match segment {
            Segment::Key(key) => current.as_object_mut()?.get_mut(*key)?,
            Segment::Index(index) => current.as_array_mut()?.get_mut(*index)?,
        };
    }
    Some(current)
}

fn drop_path(root: &mut Value, path: &str) {
    let (parent_segments, last) = split(path);
    let Some(parent) = navigate(root, &parent_segments) else { return };
    match last {
        Segment::Key(key) => {
            if let Some(obj) = parent.as_object_mut() {
                obj.remove(key);
            }
        }
        Segment::Index(index) => {
            if let Some(arr) = parent.as_array_mut() {
                if index < arr.len() {
                    arr.remove(index);
                }
            }
        }
    }
}

fn redact_path(root: &mut Value, path: &str, replacement: &str) {
    let (parent_segments, last) = split(path);
    let Some(parent) = navigate(root, &parent_segments) else { return };
    match last {
        Segment::Key(key) => {
            if let Some(obj) = parent.as_object_mut() {
                if obj.contains_key(key) {
                    obj.insert(key.to_string(), Value::String(replacement.to_string()));
                }
            }
        }
        Segment::Index(index) => {
            if let Some(arr) = parent.as_array_mut() {
                if let Some(slot) = arr.get_mut(index) {
                    *slot = Value::String(replacement.to_string());
                }
            }
        }
    }
}

fn allowlist_path(root: &mut Value, path: &str, keys: &[String]) {
    let segments: Vec<Segment<'_>> = if path.is_empty() {
        Vec::new()
    } else {
        let (mut parent, last) = split(path);
        parent.push(last);
        parent
    };
    if let Some(target) = navigate(root, &segments) {
        if let Some(obj) = target.as_object_mut() {
            obj.retain(|k, _| keys.iter().any(|allowed| allowed == k));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn drop_removes_nested_field() {
        let mut args = json!({ "user": { "name": "a", "ssn": "123" } });
        apply(&mut args, &[FilterDirective::Drop { path: "user.ssn".into() }]);
        assert_eq!(args, json!({ "user": { "name": "a" } }));
    }

    #[test]
    fn redact_replaces_value_in_place() {
        let mut args = json!({ "card": "4111111111111111" });
        apply(&mut args, &[FilterDirective::Redact { path: "card".into(), replacement: "***".into() }]);
        assert_eq!(args["card"], json!("***"));
    }

    #[test]
    fn allowlist_keeps_only_named_keys() {
        let mut args = json!({ "user": { "name": "a", "ssn": "123", "email": "a@b.com" } });
        apply(
            &mut args,
            &[FilterDirective::Allowlist { path: "user".into(), keys: vec!["name".into()] }],
        );
        assert_eq!(args, json!({ "user": { "name": "a" } }));
    }

    #[test]
    fn missing_path_is_a_no_op() {
        let mut args = json!({ "a": 1 });
        apply(&mut args, &[FilterDirective::Drop { path: "b.c".into() }]);
        assert_eq!(args, json!({ "a": 1 }));
    }

    #[test]
    fn allowlist_at_root_with_empty_path() {
        let mut args = json!({ "a": 1, "b": 2 });
        apply(&mut args, &[FilterDirective::Allowlist { path: "".into(), keys: vec!["a".into()] }]);
        assert_eq!(args, json!({ "a": 1 }));
    }

    #[test]
    fn redact_targets_array_element_by_index() {
        let mut args = json!({ "users": [{ "ssn": "1" }, { "ssn": "2" }] });
        apply(
            &mut args,
            &[FilterDirective::Redact { path: "users[1].ssn".into(), replacement: "***".into() }],
        );
        assert_eq!(args["users"][0]["ssn"], json!("1"));
        assert_eq!(args["users"][1]["ssn"], json!("***"));
    }

    #[test]
    fn drop_removes_array_element() {
        let mut args = json!({ "tags": ["a", "b", "c"] });
        apply(&mut args, &[FilterDirective::Drop { path: "tags[1]".into() }]);
        assert_eq!(args, json!({ "tags": ["a", "c"] }));
    }

    #[test]
    fn out_of_bounds_index_is_a_no_op() {
        let mut args = json!({ "tags": ["a"] });
        apply(&mut args, &[FilterDirective::Drop { path: "tags[5]".into() }]);
        assert_eq!(args, json!({ "tags": ["a"] }));
    }
}
