/// Crate-level error types for specweave diagnostics.
use std::path::PathBuf;

/// All errors in specweave carry enough context to produce a useful diagnostic
/// without a debugger. Each variant names the file, pattern, or reason for failure.
#[allow(clippy::error_impl_error, reason = "crate-internal error type in binary")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An explicitly requested config file does not exist on disk.
    #[error("config not found: {}", path.display())]
    ConfigNotFound {
        /// Path to the missing config file.
        path: PathBuf,
    },

    /// Internal references of a document could not be inlined.
    #[error("internal $ref expansion failed: {}: {reason}", file.display())]
    ExpansionFailed {
        /// Document whose internal references failed to expand.
        file: PathBuf,
        /// Description of the expansion failure.
        reason: String,
    },

    /// A referenced document does not exist on disk.
    #[error("file not found: {}", path.display())]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// A `[rewrite]` pattern is not a valid regular expression.
    #[error("invalid rewrite rule `{pattern}`: {reason}")]
    InvalidRewriteRule {
        /// The offending pattern as written in the config.
        pattern: String,
        /// Regex compiler message.
        reason: String,
    },

    /// Underlying I/O error from the filesystem.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// The resolved document could not be written as JSON.
    #[error("json serialize: {0}")]
    JsonSerialize(
        /// The wrapped JSON error.
        #[from]
        serde_json::Error,
    ),

    /// A document exists but is not valid YAML/JSON, or its root is not a mapping.
    #[error("parse failed: {}: {reason}", file.display())]
    ParseFailed {
        /// File that failed to parse.
        file: PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// TOML deserialization failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),

    /// The entry document itself never reached the cache.
    #[error("entry could not be resolved: {}", path.display())]
    UnresolvedEntry {
        /// Path of the entry document.
        path: PathBuf,
    },

    /// The filesystem watcher could not be set up.
    #[error("watch failed: {reason}")]
    WatchFailed {
        /// Description of the watcher failure.
        reason: String,
    },

    /// The resolved document could not be written as YAML.
    #[error("yaml serialize: {0}")]
    YamlSerialize(
        /// The wrapped YAML error.
        #[from]
        serde_yaml::Error,
    ),
}
