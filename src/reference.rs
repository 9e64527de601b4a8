//! `$ref` classification, normalization, and fragment lookup.

use std::path::{Component, Path, PathBuf};

use serde_json::Value;

use crate::types::NormalizedReference;

/// Separator between the file part and the fragment part of a reference.
#[cfg(not(windows))]
pub const REF_HASH_SEPARATOR: &str = "#/";

/// Separator between the file part and the fragment part of a reference.
#[cfg(windows)]
pub const REF_HASH_SEPARATOR: &str = "#\\";

/// The reserved key a reference lives under.
pub const REF_KEY: &str = "$ref";

/// Decode one fragment component (`~1` is `/`, `~0` is `~`).
fn decode_pointer_segment(segment: &str) -> String {
    return segment.replace("~1", "/").replace("~0", "~");
}

/// Canonical absolute form of an external reference.
pub fn external_reference(absolute_path: &Path, fragment_path: &str) -> String {
    return format!("{}{REF_HASH_SEPARATOR}{fragment_path}", absolute_path.display());
}

/// Split a fragment into decoded field names. Empty components are skipped,
/// so `""` and `"/"` both address the document root.
pub fn fragment_segments(fragment: &str) -> Vec<String> {
    return fragment
        .split(std::path::is_separator)
        .filter(|s| return !s.is_empty())
        .map(decode_pointer_segment)
        .collect();
}

/// Canonical form of a reference scoped to the current document.
pub fn internal_reference(fragment_path: &str) -> String {
    return format!("{REF_HASH_SEPARATOR}{fragment_path}");
}

/// True iff the pair is a reference that stays inside its own document.
pub fn is_internal_reference(key: &str, value: &Value) -> bool {
    return is_reference(key, value)
        && value.as_str().is_some_and(|s| return s.starts_with(REF_HASH_SEPARATOR));
}

/// True iff `key` is `$ref` and `value` is a non-empty string containing the
/// hash separator. Anything else is ordinary data.
pub fn is_reference(key: &str, value: &Value) -> bool {
    if key != REF_KEY {
        return false;
    }
    let Some(text) = value.as_str() else {
        return false;
    };
    return !text.is_empty() && text.contains(REF_HASH_SEPARATOR);
}

/// Navigate to the value a fragment addresses. Objects are indexed by field
/// name, arrays by decimal index.
pub fn lookup_fragment<'a>(document: &'a Value, fragment: &str) -> Option<&'a Value> {
    let mut node = document;
    for segment in fragment_segments(fragment) {
        node = match node {
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            Value::Object(map) => map.get(&segment)?,
            Value::Bool(_) | Value::Null | Value::Number(_) | Value::String(_) => return None,
        };
    }
    return Some(node);
}

/// Collapse `.` and `..` components in a path without touching the filesystem.
/// Preserves leading `..` of relative paths; `..` at a root is dropped.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        push_normalized_component(&mut components, component);
    }
    return components.iter().collect();
}

/// Split a reference string at its first hash separator.
/// Returns `None` when the string has no separator.
pub fn normalize_reference(reference: &str) -> Option<NormalizedReference> {
    let (path, fragment) = reference.split_once(REF_HASH_SEPARATOR)?;
    return Some(NormalizedReference {
        absolute_path: PathBuf::from(path),
        fragment_path: fragment.to_string(),
    });
}

/// Handle a single path component during normalization.
fn push_normalized_component<'a>(components: &mut Vec<Component<'a>>, component: Component<'a>) {
    match component {
        Component::CurDir => {},
        Component::ParentDir => match components.last() {
            Some(Component::Normal(_)) => {
                components.pop();
            },
            Some(Component::Prefix(_) | Component::RootDir) => {},
            Some(Component::CurDir | Component::ParentDir) | None => components.push(component),
        },
        Component::Normal(_) | Component::Prefix(_) | Component::RootDir => {
            components.push(component);
        },
    }
    return;
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, reason = "test code")]
mod tests {
    use serde_json::json;

    use super::*;

    fn s(text: &str) -> Value {
        return Value::String(text.to_string());
    }

    #[test]
    fn classifies_references_by_key_and_shape() {
        let external = format!("./shared/x.yaml{REF_HASH_SEPARATOR}path/to/User");
        let internal = format!("{REF_HASH_SEPARATOR}path/to/User");

        assert!(is_reference("$ref", &s(&external)));
        assert!(!is_reference("name", &s(&external)));
        assert!(is_reference("$ref", &s(&internal)));
        assert!(!is_reference("$ref", &s("path/to/User")));
        assert!(!is_reference("$ref", &s("")));
        assert!(!is_reference("$ref", &json!({})));
        assert!(!is_reference("$ref", &json!(42)));
    }

    #[test]
    fn internal_needs_leading_separator() {
        let external = format!("a.yaml{REF_HASH_SEPARATOR}Foo");
        let internal = format!("{REF_HASH_SEPARATOR}Foo");

        assert!(is_internal_reference("$ref", &s(&internal)));
        assert!(!is_internal_reference("$ref", &s(&external)));
        assert!(!is_internal_reference("title", &s(&internal)));
    }

    #[cfg(not(windows))]
    #[test]
    fn splits_at_first_separator() {
        let normalized = normalize_reference("/abs/shared/x.yaml#/components/schemas/User").unwrap();
        assert_eq!(normalized.absolute_path, PathBuf::from("/abs/shared/x.yaml"));
        assert_eq!(normalized.fragment_path, "components/schemas/User");

        assert!(normalize_reference("x.yaml").is_none());
    }

    #[cfg(not(windows))]
    #[test]
    fn normalizes_dot_segments() {
        assert_eq!(normalize_path(Path::new("/a/./b/../c.yaml")), PathBuf::from("/a/c.yaml"));
        assert_eq!(normalize_path(Path::new("/../x.yaml")), PathBuf::from("/x.yaml"));
        assert_eq!(normalize_path(Path::new("../x/../y.yaml")), PathBuf::from("../y.yaml"));
    }

    #[cfg(not(windows))]
    #[test]
    fn looks_up_nested_fields_and_indices() {
        let doc = json!({
            "components": {"schemas": {"User": {"type": "object"}}},
            "paths": {"/pets": {"parameters": [{"name": "id"}]}},
        });

        assert_eq!(
            lookup_fragment(&doc, "components/schemas/User"),
            Some(&json!({"type": "object"}))
        );
        assert_eq!(
            lookup_fragment(&doc, "paths/~1pets/parameters/0/name"),
            Some(&json!("id"))
        );
        assert_eq!(lookup_fragment(&doc, ""), Some(&doc));
        assert_eq!(lookup_fragment(&doc, "components/schemas/Missing"), None);
        assert_eq!(lookup_fragment(&doc, "paths/~1pets/parameters/x"), None);
    }
}
