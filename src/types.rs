/// Core domain types for specweave references, hashes, and handles.
use std::fmt;
use std::path::PathBuf;

use regex::Regex;

/// A file hash: 8 lowercase hex chars derived from an absolute path.
/// Newtype prevents mixing with arbitrary strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileHash(
    /// The hex-encoded truncated SHA-256 digest.
    pub String,
);

impl fmt::Display for FileHash {
    /// Print the bare hex string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.write_str(&self.0);
    }
}

/// Opaque locator for a resolved document, shared with whatever serves it.
/// The URL layout is `/<hash>/<basename>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handle {
    /// File name of the entry document, without directories.
    pub basename: String,
    /// Cache key of the entry document.
    pub hash: FileHash,
}

impl Handle {
    /// URL path under which the resolved document is served.
    pub fn url_path(&self) -> String {
        return format!("/{}/{}", self.hash, self.basename);
    }
}

impl fmt::Display for Handle {
    /// Same as `url_path`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.write_str(&self.url_path());
    }
}

/// A `$ref` split into the file it points at and the fragment inside it.
/// The fragment has no leading separator (`components/schemas/User`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedReference {
    /// Path component of the reference, absolute once rewritten.
    pub absolute_path: PathBuf,
    /// Nested field path inside the target document.
    pub fragment_path: String,
}

/// One `[rewrite]` entry: the first match of `pattern` is replaced by the
/// literal `replacement`.
#[derive(Debug, Clone)]
pub struct RewriteRule {
    /// Compiled pattern.
    pub pattern: Regex,
    /// Literal substitution text; `$` has no special meaning.
    pub replacement: String,
}

impl RewriteRule {
    /// Apply this rule to a reference string.
    pub fn apply(&self, reference: &str) -> String {
        return self
            .pattern
            .replace(reference, regex::NoExpand(&self.replacement))
            .into_owned();
    }
}
