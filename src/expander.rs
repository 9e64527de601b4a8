//! Inlines internal (`#/...`) references of a single document.
//!
//! Circular references are ignored: a reference whose target is the node
//! itself, one of its ancestors, or an ancestor of any reference already being
//! followed stays as an unexpanded `$ref` node. External reference markers are
//! copied untouched.

use std::path::Path;

use serde_json::{Map, Value};

use crate::error::Error;
use crate::reference::{
    REF_KEY, fragment_segments, is_internal_reference, lookup_fragment, normalize_reference,
};

/// Nested reference jumps allowed before the document is rejected.
const MAX_EXPANSION_DEPTH: usize = 512;

/// Walk state for one document.
struct Expander<'a> {
    /// Locations of the reference nodes currently being followed, outermost first.
    chain: Vec<Vec<String>>,
    /// Source file, for error context.
    file: &'a Path,
    /// The unexpanded document that targets are looked up in.
    root: &'a Value,
}

impl Expander<'_> {
    /// Expand `node`, found at `location` in the logical document.
    ///
    /// # Errors
    ///
    /// Returns `Error::ExpansionFailed` when a target is missing or nesting is too deep.
    fn expand(&mut self, node: &Value, location: &mut Vec<String>) -> Result<Value, Error> {
        return match node {
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    location.push(index.to_string());
                    let expanded = self.expand(item, location);
                    location.pop();
                    out.push(expanded?);
                }
                Ok(Value::Array(out))
            },
            Value::Object(map) => {
                if let Some(reference) = map
                    .get(REF_KEY)
                    .filter(|value| return is_internal_reference(REF_KEY, value))
                    .and_then(Value::as_str)
                {
                    return self.expand_reference(map, reference, location);
                }
                Ok(Value::Object(self.expand_fields(map, None, location)?))
            },
            Value::Bool(_) | Value::Null | Value::Number(_) | Value::String(_) => Ok(node.clone()),
        };
    }

    /// Expand every field of `map`, optionally skipping one key.
    ///
    /// # Errors
    ///
    /// Propagates expansion failures of any field.
    fn expand_fields(
        &mut self,
        map: &Map<String, Value>,
        skip: Option<&str>,
        location: &mut Vec<String>,
    ) -> Result<Map<String, Value>, Error> {
        let mut out = Map::with_capacity(map.len());
        for (key, child) in map {
            if skip == Some(key.as_str()) {
                continue;
            }
            location.push(key.clone());
            let expanded = self.expand(child, location);
            location.pop();
            out.insert(key.clone(), expanded?);
        }
        return Ok(out);
    }

    /// Replace a reference node with its expanded target.
    ///
    /// # Errors
    ///
    /// Returns `Error::ExpansionFailed` if the target does not exist or the
    /// reference chain exceeds `MAX_EXPANSION_DEPTH`.
    fn expand_reference(
        &mut self,
        map: &Map<String, Value>,
        reference: &str,
        location: &mut Vec<String>,
    ) -> Result<Value, Error> {
        let fragment = normalize_reference(reference)
            .map(|normalized| return normalized.fragment_path)
            .unwrap_or_default();
        let mut target_location = fragment_segments(&fragment);

        if self.is_circular(&target_location, location) {
            tracing::debug!(file = %self.file.display(), %reference, "leaving circular $ref");
            return Ok(Value::Object(map.clone()));
        }
        if self.chain.len() >= MAX_EXPANSION_DEPTH {
            return Err(Error::ExpansionFailed {
                file: self.file.to_path_buf(),
                reason: format!("more than {MAX_EXPANSION_DEPTH} nested references at `{reference}`"),
            });
        }
        let Some(target) = lookup_fragment(self.root, &fragment) else {
            return Err(Error::ExpansionFailed {
                file: self.file.to_path_buf(),
                reason: format!("`{reference}` points at nothing"),
            });
        };

        self.chain.push(location.clone());
        let expanded = self.expand(target, &mut target_location);
        self.chain.pop();
        let expanded = expanded?;

        if map.len() == 1 {
            return Ok(expanded);
        }
        let Value::Object(fields) = expanded else {
            return Ok(expanded);
        };
        // Siblings of `$ref` win over target fields of the same name.
        let mut merged = self.expand_fields(map, Some(REF_KEY), location)?;
        for (key, value) in fields {
            if !merged.contains_key(&key) {
                merged.insert(key, value);
            }
        }
        return Ok(Value::Object(merged));
    }

    /// Whether following `target` would re-enter a node already on the current path.
    fn is_circular(&self, target: &[String], location: &[String]) -> bool {
        return location.starts_with(target)
            || self.chain.iter().any(|followed| return followed.starts_with(target));
    }
}

/// Return a copy of `document` with all internal references inlined.
///
/// # Errors
///
/// Returns `Error::ExpansionFailed` when a reference points at a missing
/// location or the reference chain is unreasonably deep.
pub fn expand_internal(file: &Path, document: &Value) -> Result<Value, Error> {
    let mut expander = Expander {
        chain: Vec::new(),
        file,
        root: document,
    };
    return expander.expand(document, &mut Vec::new());
}

#[cfg(all(test, not(windows)))]
#[allow(clippy::missing_panics_doc, reason = "test code")]
mod tests {
    use serde_json::json;

    use super::*;

    fn expand(doc: &Value) -> Result<Value, Error> {
        return expand_internal(Path::new("/abs/a.yaml"), doc);
    }

    #[test]
    fn inlines_simple_reference() {
        let doc = json!({
            "components": {"schemas": {"Pet": {"type": "object"}}},
            "paths": {"/pets": {"get": {"schema": {"$ref": "#/components/schemas/Pet"}}}},
        });

        let out = expand(&doc).unwrap();
        assert_eq!(out["paths"]["/pets"]["get"]["schema"], json!({"type": "object"}));
    }

    #[test]
    fn follows_reference_chains() {
        let doc = json!({
            "A": {"$ref": "#/B"},
            "B": {"$ref": "#/C"},
            "C": {"type": "string"},
        });

        let out = expand(&doc).unwrap();
        assert_eq!(out["A"], json!({"type": "string"}));
        assert_eq!(out["B"], json!({"type": "string"}));
    }

    #[test]
    fn siblings_override_target_fields() {
        let doc = json!({
            "Base": {"type": "object", "description": "base"},
            "Derived": {"$ref": "#/Base", "description": "derived"},
        });

        let out = expand(&doc).unwrap();
        assert_eq!(out["Derived"], json!({"description": "derived", "type": "object"}));
    }

    #[test]
    fn self_containing_reference_is_left_in_place() {
        let doc = json!({
            "Node": {"properties": {"next": {"$ref": "#/Node"}}},
        });

        let out = expand(&doc).unwrap();
        assert_eq!(out, doc);
    }

    #[test]
    fn mutual_cycle_terminates() {
        let doc = json!({
            "A": {"properties": {"b": {"$ref": "#/B"}}},
            "B": {"properties": {"a": {"$ref": "#/A"}}},
        });

        let out = expand(&doc).unwrap();
        assert_eq!(out["A"]["properties"]["b"], json!({"properties": {"a": {"$ref": "#/A"}}}));
        assert_eq!(out["B"]["properties"]["a"], json!({"properties": {"b": {"$ref": "#/B"}}}));
    }

    #[test]
    fn missing_target_fails() {
        let doc = json!({"A": {"$ref": "#/Nope"}});
        assert!(matches!(expand(&doc), Err(Error::ExpansionFailed { .. })));
    }

    #[test]
    fn external_markers_are_untouched() {
        let doc = json!({
            "A": {"$ref": "/abs/b.yaml#/X"},
            "list": [{"$ref": "#/A"}],
        });

        let out = expand(&doc).unwrap();
        assert_eq!(out["list"][0], json!({"$ref": "/abs/b.yaml#/X"}));
    }
}
