use std::path::Path;

use regex::Regex;

use crate::error::Error;
use crate::types::RewriteRule;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".specweave.toml";

/// Project configuration loaded from `.specweave.toml`.
/// Rewrite rules keep their declaration order, which is also their application order.
#[derive(Debug, Default)]
pub struct Config {
    /// Compiled `[rewrite]` rules.
    pub rewrite_rules: Vec<RewriteRule>,
}

/// Raw TOML structure for `.specweave.toml`.
#[derive(serde::Deserialize)]
struct SpecweaveTomlConfig {
    /// Pattern → replacement table; order preserved.
    #[serde(default)]
    rewrite: toml::Table,
}

impl Config {
    /// Append a rule given on the command line as `PATTERN=REPLACEMENT`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRewriteRule` if there is no `=` or the pattern
    /// does not compile.
    pub fn add_cli_rule(&mut self, rule: &str) -> Result<(), Error> {
        let Some((pattern, replacement)) = rule.split_once('=') else {
            return Err(Error::InvalidRewriteRule {
                pattern: rule.to_string(),
                reason: "expected PATTERN=REPLACEMENT".to_string(),
            });
        };
        self.rewrite_rules.push(compile_rule(pattern, replacement)?);
        return Ok(());
    }

    /// Load config from `explicit`, or from `.specweave.toml` in `root`.
    /// A missing default file yields an empty config; a missing explicit
    /// file is an error. A malformed file is always an error, never
    /// silently replaced by defaults.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigNotFound`, `Error::Io`, `Error::TomlDe`,
    /// or `Error::InvalidRewriteRule`.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self, Error> {
        let path = explicit.map_or_else(|| return root.join(CONFIG_FILE), Path::to_path_buf);
        let content = match std::fs::read_to_string(&path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if explicit.is_some() {
                    return Err(Error::ConfigNotFound { path });
                }
                return Ok(Self::default());
            },
            Err(e) => return Err(Error::Io(e)),
            Ok(c) => c,
        };
        return Self::parse(&content);
    }

    /// Parse config from TOML content.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlDe` for malformed TOML, or `Error::InvalidRewriteRule`
    /// for a bad pattern or a non-string replacement.
    pub fn parse(content: &str) -> Result<Self, Error> {
        let raw: SpecweaveTomlConfig = toml::from_str(content)?;
        let mut rewrite_rules = Vec::with_capacity(raw.rewrite.len());
        for (pattern, replacement) in &raw.rewrite {
            let Some(replacement) = replacement.as_str() else {
                return Err(Error::InvalidRewriteRule {
                    pattern: pattern.clone(),
                    reason: "replacement must be a string".to_string(),
                });
            };
            rewrite_rules.push(compile_rule(pattern, replacement)?);
        }
        return Ok(Self { rewrite_rules });
    }
}

/// Compile one rule.
///
/// # Errors
///
/// Returns `Error::InvalidRewriteRule` if the pattern is not a valid regex.
fn compile_rule(pattern: &str, replacement: &str) -> Result<RewriteRule, Error> {
    let compiled = Regex::new(pattern).map_err(|e| return Error::InvalidRewriteRule {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;
    tracing::debug!(%pattern, %replacement, "rewrite rule created");
    return Ok(RewriteRule {
        pattern: compiled,
        replacement: replacement.to_string(),
    });
}
