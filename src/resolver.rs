//! Graph resolution: walks the `$ref` graph of an entry document depth-first,
//! resolving every dependency file at most once per session and splicing
//! cached results into the documents that reference them.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::cache::{CacheEntry, SchemaCache};
use crate::error::Error;
use crate::expander::expand_internal;
use crate::hasher::hash_path;
use crate::reference::{
    REF_KEY, is_internal_reference, is_reference, lookup_fragment, normalize_path,
    normalize_reference,
};
use crate::rewriter::PathRewriter;
use crate::types::{FileHash, Handle, RewriteRule};

/// A file that has been parsed and rewritten but not yet finalized.
struct Frame {
    /// External files this document references, in discovery order.
    dependencies: Vec<PathBuf>,
    /// Rewritten document.
    document: Value,
    /// Absolute path of the file.
    file: PathBuf,
    /// Cache key of the file.
    hash: FileHash,
    /// Index of the next dependency to visit.
    next: usize,
}

/// Resolves one entry document and everything it references.
pub struct Resolver {
    /// Absolute, normalized entry path.
    entry: PathBuf,
    /// Cache key of the entry.
    hash: FileHash,
    /// Rewrite rules shared by every file in the graph.
    rules: Vec<RewriteRule>,
    /// Files visited during the current `parse()`.
    seen: HashSet<FileHash>,
    /// Report of the most recent `parse()`.
    session: Session,
}

/// What the most recent `parse()` did.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Files whose resolution was aborted, with the rendered reason.
    pub failed: Vec<(PathBuf, String)>,
    /// Files read during the session, in visit order.
    pub parsed: Vec<PathBuf>,
}

impl Resolver {
    /// Absolute, normalized path of the entry document.
    pub fn entry(&self) -> &Path {
        return &self.entry;
    }

    /// Expand internal references, splice in cached external ones, and store the result.
    fn finalize(&mut self, cache: &mut SchemaCache, frame: Frame) {
        let mut schema = match expand_internal(&frame.file, &frame.document) {
            Err(e) => {
                self.record_failure(&frame.file, &e);
                return;
            },
            Ok(expanded) => expanded,
        };
        substitute_external(cache, &mut schema);

        let dependencies = frame.dependencies.iter().map(|p| return hash_path(p)).collect();
        tracing::info!(file = %frame.file.display(), hash = %frame.hash, "resolved");
        cache.set(frame.hash, CacheEntry {
            dependencies,
            must_revalidate: false,
            schema,
            source_path: frame.file,
        });
        return;
    }

    /// Locator of the entry document, whether or not it has been resolved.
    pub fn handle(&self) -> Handle {
        let basename = self
            .entry
            .file_name()
            .map(|name| return name.to_string_lossy().into_owned())
            .unwrap_or_default();
        return Handle {
            basename,
            hash: self.hash.clone(),
        };
    }

    /// Create a resolver for `entry`. Relative paths are made absolute
    /// against the current directory.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the current directory cannot be determined.
    pub fn new(entry: &Path, rules: Vec<RewriteRule>) -> Result<Self, Error> {
        let entry = normalize_path(&std::path::absolute(entry)?);
        let hash = hash_path(&entry);
        return Ok(Self {
            entry,
            hash,
            rules,
            seen: HashSet::new(),
            session: Session::default(),
        });
    }

    /// Resolve the entry document into `cache` and return its handle.
    ///
    /// Never fails: per-file errors are logged and recorded in `session()`,
    /// and whatever resolved is left in the cache.
    pub fn parse(&mut self, cache: &mut SchemaCache) -> Handle {
        self.seen.clear();
        self.session = Session::default();

        if cache.must_revalidate(&self.hash) {
            let entry = self.entry.clone();
            self.resolve(cache, &entry);
        } else {
            tracing::debug!(file = %self.entry.display(), "cached entry is fresh");
        }

        let handle = self.handle();
        tracing::info!(file = %self.entry.display(), url = %handle, "serving resolved document");
        return handle;
    }

    /// Log a per-file failure and remember it for the session report.
    fn record_failure(&mut self, file: &Path, e: &Error) {
        tracing::warn!(file = %file.display(), error = %e, "resolution aborted");
        self.session.failed.push((file.to_path_buf(), e.to_string()));
        return;
    }

    /// Depth-first walk from `file` using an explicit stack. Dependencies are
    /// finalized before the files that reference them, except where a cycle
    /// closes on a file that is still on the stack.
    fn resolve(&mut self, cache: &mut SchemaCache, file: &Path) {
        let mut stack: Vec<Frame> = Vec::new();
        if let Some(frame) = self.visit(cache, file) {
            stack.push(frame);
        }

        while let Some(top) = stack.last_mut() {
            if let Some(dependency) = top.dependencies.get(top.next).cloned() {
                top.next = top.next.saturating_add(1);
                if let Some(frame) = self.visit(cache, &dependency) {
                    stack.push(frame);
                }
                continue;
            }
            if let Some(frame) = stack.pop() {
                self.finalize(cache, frame);
            }
        }
        return;
    }

    /// Report of the most recent `parse()`.
    pub const fn session(&self) -> &Session {
        return &self.session;
    }

    /// Mark `file` seen, then read and rewrite it. Returns `None` when the file
    /// was already seen, is cached and fresh, or failed to load.
    fn visit(&mut self, cache: &SchemaCache, file: &Path) -> Option<Frame> {
        let hash = hash_path(file);
        if self.seen.contains(&hash) || !cache.must_revalidate(&hash) {
            return None;
        }
        // Committed before any work so a cycle back to this file stops here.
        self.seen.insert(hash.clone());
        self.session.parsed.push(file.to_path_buf());

        let raw = match load_document(file) {
            Err(e) => {
                self.record_failure(file, &e);
                return None;
            },
            Ok(document) => document,
        };

        let mut rewriter = PathRewriter::new(&self.rules, file);
        let document = rewriter.rewrite(&raw);
        let dependencies = rewriter.all_refs().to_vec();
        tracing::debug!(file = %file.display(), dependencies = dependencies.len(), "parsed");

        return Some(Frame {
            dependencies,
            document,
            file: file.to_path_buf(),
            hash,
            next: 0,
        });
    }
}

/// The reference string of `node` if it is an unexpanded external reference.
fn external_marker(node: &Value) -> Option<&str> {
    return node
        .as_object()?
        .get(REF_KEY)
        .filter(|value| return is_reference(REF_KEY, value) && !is_internal_reference(REF_KEY, value))
        .and_then(Value::as_str);
}

/// Read and parse a document. `.json` files go through `serde_json`,
/// everything else through `serde_yaml`.
///
/// # Errors
///
/// Returns `Error::FileNotFound`, `Error::Io`, or `Error::ParseFailed`
/// (including when the root is not a mapping).
pub fn load_document(file: &Path) -> Result<Value, Error> {
    let content = match std::fs::read_to_string(file) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::FileNotFound { path: file.to_path_buf() });
        },
        Err(e) => return Err(Error::Io(e)),
        Ok(c) => c,
    };

    let is_json = file.extension().is_some_and(|ext| return ext.eq_ignore_ascii_case("json"));
    let parsed: Result<Value, String> = if is_json {
        serde_json::from_str(&content).map_err(|e| return e.to_string())
    } else {
        serde_yaml::from_str(&content).map_err(|e| return e.to_string())
    };
    let document = parsed.map_err(|reason| return Error::ParseFailed {
        file: file.to_path_buf(),
        reason,
    })?;

    if !document.is_object() {
        return Err(Error::ParseFailed {
            file: file.to_path_buf(),
            reason: "document root is not a mapping".to_string(),
        });
    }
    return Ok(document);
}

/// Fetch the subtree an external reference points at, if its file is cached.
fn lookup_cached_target(cache: &SchemaCache, reference: &str) -> Option<Value> {
    let normalized = normalize_reference(reference)?;
    let Some(entry) = cache.get(&hash_path(&normalized.absolute_path)) else {
        tracing::debug!(%reference, "target not cached, leaving $ref");
        return None;
    };
    let target = lookup_fragment(&entry.schema, &normalized.fragment_path);
    if target.is_none() {
        tracing::debug!(%reference, "fragment not found in target, leaving $ref");
    }
    return target.cloned();
}

/// Replace external reference markers with the cached content they point at.
/// Markers whose target is unavailable are left as they are. Spliced
/// subtrees are already resolved and are not walked again.
fn substitute_external(cache: &SchemaCache, node: &mut Value) {
    let Some(reference) = external_marker(node).map(str::to_string) else {
        match node {
            Value::Array(items) => {
                for item in items.iter_mut() {
                    substitute_external(cache, item);
                }
            },
            Value::Object(map) => {
                for value in map.values_mut() {
                    substitute_external(cache, value);
                }
            },
            Value::Bool(_) | Value::Null | Value::Number(_) | Value::String(_) => {},
        }
        return;
    };

    match (lookup_cached_target(cache, &reference), node) {
        (None, _) => {},
        (Some(Value::Object(fields)), Value::Object(map)) => {
            map.shift_remove(REF_KEY);
            for (key, value) in fields {
                map.insert(key, value);
            }
        },
        (Some(other), slot) => *slot = other,
    }
    return;
}
