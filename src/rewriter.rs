//! Path rewriting: applies `[rewrite]` rules to external references and
//! resolves them to absolute paths relative to the containing file.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::reference::{
    external_reference, internal_reference, is_internal_reference, is_reference, normalize_path,
    normalize_reference,
};
use crate::types::RewriteRule;

/// Rewrites the references of one source file.
///
/// Rules run before path resolution so they can redirect logical paths
/// (package aliases, mount points) to real filesystem locations.
pub struct PathRewriter<'a> {
    /// Absolute, normalized path of the file being rewritten.
    file: PathBuf,
    /// Distinct external targets found by the last `rewrite`, in document order.
    refs: Vec<PathBuf>,
    /// Rules applied in declaration order.
    rules: &'a [RewriteRule],
}

impl<'a> PathRewriter<'a> {
    /// Every distinct absolute external path discovered by the most recent `rewrite`.
    pub fn all_refs(&self) -> &[PathBuf] {
        return &self.refs;
    }

    /// Create a rewriter for `file`, which must already be absolute and normalized.
    pub fn new(rules: &'a [RewriteRule], file: &Path) -> Self {
        return Self {
            file: file.to_path_buf(),
            refs: Vec::new(),
            rules,
        };
    }

    /// Deep-copy `document`, rewriting every external reference to its absolute
    /// form and every reference back into this file to its internal form.
    pub fn rewrite(&mut self, document: &Value) -> Value {
        self.refs.clear();
        return self.rewrite_value(document);
    }

    /// Rewrite one reference string that is known to be external.
    fn rewrite_reference(&mut self, reference: &str) -> String {
        let rewritten = self
            .rules
            .iter()
            .fold(reference.to_string(), |acc, rule| return rule.apply(&acc));
        tracing::debug!(file = %self.file.display(), %reference, %rewritten, "resolving path");

        // A rule may strip the separator; the result is then plain data.
        let Some(normalized) = normalize_reference(&rewritten) else {
            return rewritten;
        };
        if normalized.absolute_path.as_os_str().is_empty() {
            return internal_reference(&normalized.fragment_path);
        }

        let dir = self.file.parent().unwrap_or_else(|| return Path::new(""));
        let absolute = normalize_path(&dir.join(&normalized.absolute_path));
        if absolute == self.file {
            return internal_reference(&normalized.fragment_path);
        }

        let value = external_reference(&absolute, &normalized.fragment_path);
        if !self.refs.contains(&absolute) {
            self.refs.push(absolute);
        }
        return value;
    }

    /// Recursive copy that rewrites `$ref` entries along the way.
    fn rewrite_value(&mut self, value: &Value) -> Value {
        return match value {
            Value::Array(items) => {
                Value::Array(items.iter().map(|item| return self.rewrite_value(item)).collect())
            },
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (key, child) in map {
                    let rewritten = match child.as_str() {
                        Some(text) if is_reference(key, child) && !is_internal_reference(key, child) => {
                            Value::String(self.rewrite_reference(text))
                        },
                        _ => self.rewrite_value(child),
                    };
                    out.insert(key.clone(), rewritten);
                }
                Value::Object(out)
            },
            Value::Bool(_) | Value::Null | Value::Number(_) | Value::String(_) => value.clone(),
        };
    }
}

#[cfg(all(test, not(windows)))]
#[allow(clippy::missing_panics_doc, reason = "test code")]
mod tests {
    use regex::Regex;
    use serde_json::json;

    use super::*;

    fn rule(pattern: &str, replacement: &str) -> RewriteRule {
        return RewriteRule {
            pattern: Regex::new(pattern).unwrap(),
            replacement: replacement.to_string(),
        };
    }

    #[test]
    fn zero_rules_only_normalizes() {
        let mut rewriter = PathRewriter::new(&[], Path::new("/abs/specs/a.yaml"));
        let out = rewriter.rewrite(&json!({"$ref": "./../shared/./x.yaml#/Foo"}));

        assert_eq!(out, json!({"$ref": "/abs/shared/x.yaml#/Foo"}));
        assert_eq!(rewriter.all_refs(), [PathBuf::from("/abs/shared/x.yaml")]);
    }

    #[test]
    fn rules_redirect_before_resolution() {
        let rules = [rule(r"^\./shared/", "/abs/shared/")];
        let mut rewriter = PathRewriter::new(&rules, Path::new("/abs/a.yaml"));
        let out = rewriter.rewrite(&json!({"$ref": "./shared/x.yaml#/Foo"}));

        let reference = out["$ref"].as_str().unwrap();
        let normalized = normalize_reference(reference).unwrap();
        assert_eq!(normalized.absolute_path, PathBuf::from("/abs/shared/x.yaml"));
        assert_eq!(normalized.fragment_path, "Foo");
    }

    #[test]
    fn rules_apply_in_declaration_order() {
        let rules = [rule("^@lib/", "./vendor/"), rule("^./vendor/", "./third_party/")];
        let mut rewriter = PathRewriter::new(&rules, Path::new("/abs/a.yaml"));
        let out = rewriter.rewrite(&json!({"$ref": "@lib/x.yaml#/Foo"}));

        assert_eq!(out, json!({"$ref": "/abs/third_party/x.yaml#/Foo"}));
    }

    #[test]
    fn replacement_is_literal() {
        let rules = [rule("^(shared)/", "$1-copy/")];
        let mut rewriter = PathRewriter::new(&rules, Path::new("/abs/a.yaml"));
        let out = rewriter.rewrite(&json!({"$ref": "shared/x.yaml#/Foo"}));

        assert_eq!(out, json!({"$ref": "/abs/$1-copy/x.yaml#/Foo"}));
    }

    #[test]
    fn self_reference_becomes_internal() {
        let mut rewriter = PathRewriter::new(&[], Path::new("/abs/a.yaml"));
        let out = rewriter.rewrite(&json!({"$ref": "./a.yaml#/Foo"}));

        assert_eq!(out, json!({"$ref": "#/Foo"}));
        assert!(rewriter.all_refs().is_empty());
    }

    #[test]
    fn internal_and_plain_values_pass_through() {
        let doc = json!({
            "info": {"title": "x.yaml#/not-a-ref"},
            "items": [{"$ref": "#/components/schemas/Pet"}, 3, null],
            "weird": {"$ref": "no-separator.yaml"},
        });
        let mut rewriter = PathRewriter::new(&[], Path::new("/abs/a.yaml"));

        assert_eq!(rewriter.rewrite(&doc), doc);
        assert!(rewriter.all_refs().is_empty());
    }

    #[test]
    fn collects_distinct_refs_in_document_order() {
        let doc = json!({
            "b": {"$ref": "b.yaml#/X"},
            "a": [{"$ref": "a2.yaml#/Y"}, {"$ref": "./b.yaml#/Z"}],
        });
        let mut rewriter = PathRewriter::new(&[], Path::new("/abs/root.yaml"));
        rewriter.rewrite(&doc);

        assert_eq!(
            rewriter.all_refs(),
            [PathBuf::from("/abs/b.yaml"), PathBuf::from("/abs/a2.yaml")]
        );

        rewriter.rewrite(&json!({}));
        assert!(rewriter.all_refs().is_empty());
    }
}
