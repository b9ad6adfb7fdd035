//! Field extraction from JSON document sources.
//!
//! Document sources are arbitrary JSON objects. Indexing and query
//! evaluation both view them as a flat set of dotted field paths mapping to
//! scalar leaves; array elements share their parent path.

use serde_json::Value;

/// A scalar leaf rendered to the text the analyzer will see.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Flatten a source object into `(dotted path, leaf text)` pairs.
///
/// Paths repeat when an array holds several elements. Null leaves are
/// skipped entirely, matching how they are skipped at query time.
pub fn flatten_source(source: &Value) -> Vec<(String, String)> {
    let mut out = Vec::new();
    flatten_into(source, String::new(), &mut out);
    out
}

fn flatten_into(value: &Value, path: String, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                flatten_into(child, child_path, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                flatten_into(item, path.clone(), out);
            }
        }
        leaf => {
            if !path.is_empty()
                && let Some(text) = scalar_text(leaf)
            {
                out.push((path, text));
            }
        }
    }
}

/// Resolve a dotted field path to its scalar leaves, flattening arrays.
pub fn lookup_path<'a>(source: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![source];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(map) => {
                    if let Some(child) = map.get(segment) {
                        next.push(child);
                    }
                }
                Value::Array(items) => {
                    for item in items {
                        if let Value::Object(map) = item
                            && let Some(child) = map.get(segment)
                        {
                            next.push(child);
                        }
                    }
                }
                _ => {}
            }
        }
        current = next;
        if current.is_empty() {
            return current;
        }
    }

    // Flatten trailing arrays so callers always see scalars.
    let mut leaves = Vec::new();
    for value in current {
        collect_leaves(value, &mut leaves);
    }
    leaves
}

fn collect_leaves<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_leaves(item, out);
            }
        }
        Value::Null | Value::Object(_) => {}
        leaf => out.push(leaf),
    }
}
