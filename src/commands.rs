//! Core CLI commands for specweave: resolve, check, hash.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use serde_json::Value;

use crate::cache::SchemaCache;
use crate::config::Config;
use crate::error;
use crate::reference::{is_internal_reference, is_reference};
use crate::resolver::Resolver;

/// File extensions treated as documents when a directory is checked.
const DOCUMENT_EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

/// Serialization format of the resolved document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    /// Pretty-printed JSON.
    Json,
    /// YAML.
    Yaml,
}

/// Where and how to write a resolved document.
#[derive(Debug, Clone)]
pub struct OutputOptions {
    /// Serialization format.
    pub format: Format,
    /// Destination file; stdout when absent.
    pub output: Option<PathBuf>,
}

/// Resolve every document under `paths` and report what did not resolve.
///
/// Exit code priority: failed files (2) > unresolved references (1) > clean (0).
///
/// # Errors
///
/// Returns `Error::Io` if a resolver cannot be created for a path.
pub fn check(paths: &[PathBuf], config: &Config) -> Result<ExitCode, error::Error> {
    let documents = collect_documents(paths);
    let mut cache = SchemaCache::new();
    let mut failed: Vec<PathBuf> = Vec::new();
    let mut unresolved_count = 0_u32;

    for document in &documents {
        let mut resolver = Resolver::new(document, config.rewrite_rules.clone())?;
        let handle = resolver.parse(&mut cache);

        for (file, reason) in &resolver.session().failed {
            if !failed.contains(file) {
                println!("FAILED      {} ({reason})", file.display());
                failed.push(file.clone());
            }
        }

        let Some(entry) = cache.get(&handle.hash) else {
            continue;
        };
        for reference in find_unresolved(&entry.schema) {
            println!("UNRESOLVED  {} -> {reference}", document.display());
            unresolved_count = unresolved_count.saturating_add(1);
        }
    }

    let failed_count = failed.len();
    if failed_count > 0 {
        println!();
        println!("{failed_count} failed, {unresolved_count} unresolved");
        return Ok(ExitCode::from(2));
    } else if unresolved_count > 0 {
        println!();
        println!("{unresolved_count} unresolved");
        return Ok(ExitCode::from(1));
    } else {
        let total = documents.len();
        println!("All {total} documents fully resolved");
        return Ok(ExitCode::SUCCESS);
    }
}

/// Expand directories into the documents they contain, sorted by name.
/// Plain file arguments are kept as given.
pub fn collect_documents(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut documents = Vec::new();
    for path in paths {
        if !path.is_dir() {
            documents.push(path.clone());
            continue;
        }
        let found = walkdir::WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| return e.file_type().is_file() && has_document_extension(e.path()))
            .map(walkdir::DirEntry::into_path);
        documents.extend(found);
    }
    return documents;
}

/// Every external reference marker still present in a resolved document,
/// in document order.
pub fn find_unresolved(schema: &Value) -> Vec<String> {
    let mut found = Vec::new();
    collect_unresolved(schema, &mut found);
    return found;
}

/// Recursive worker for `find_unresolved`.
fn collect_unresolved(node: &Value, found: &mut Vec<String>) {
    match node {
        Value::Array(items) => {
            for item in items {
                collect_unresolved(item, found);
            }
        },
        Value::Object(map) => {
            for (key, value) in map {
                if is_reference(key, value) && !is_internal_reference(key, value) {
                    found.extend(value.as_str().map(str::to_string));
                } else {
                    collect_unresolved(value, found);
                }
            }
        },
        Value::Bool(_) | Value::Null | Value::Number(_) | Value::String(_) => {},
    }
    return;
}

/// Whether a path has one of `DOCUMENT_EXTENSIONS`.
fn has_document_extension(path: &Path) -> bool {
    return path
        .extension()
        .and_then(|ext| return ext.to_str())
        .is_some_and(|ext| return DOCUMENT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
}

/// Print the handle (`/<hash>/<basename>`) a server would expose for `file`.
///
/// # Errors
///
/// Returns `Error::Io` if the path cannot be made absolute.
pub fn hash(file: &Path) -> Result<(), error::Error> {
    let resolver = Resolver::new(file, Vec::new())?;
    println!("{}", resolver.handle());
    return Ok(());
}

/// Serialize a document.
///
/// # Errors
///
/// Returns `Error::JsonSerialize` or `Error::YamlSerialize`.
pub fn render(schema: &Value, format: Format) -> Result<String, error::Error> {
    return match format {
        Format::Json => {
            let mut text = serde_json::to_string_pretty(schema)?;
            text.push('\n');
            Ok(text)
        },
        Format::Yaml => Ok(serde_yaml::to_string(schema)?),
    };
}

/// Resolve one entry document and write it out.
///
/// Exits 0 when every file resolved, 1 when the entry resolved but some
/// dependency failed (the document is still written).
///
/// # Errors
///
/// Returns `Error::UnresolvedEntry` if the entry itself failed, or
/// serialization and I/O errors from writing.
pub fn resolve(file: &Path, config: &Config, options: &OutputOptions) -> Result<ExitCode, error::Error> {
    let mut cache = SchemaCache::new();
    let mut resolver = Resolver::new(file, config.rewrite_rules.clone())?;
    resolver.parse(&mut cache);

    write_resolved(&cache, &resolver, options)?;

    let failed = resolver.session().failed.len();
    if failed > 0 {
        eprintln!("{failed} referenced file(s) failed to resolve; their $refs were left in place");
        return Ok(ExitCode::from(1));
    }
    return Ok(ExitCode::SUCCESS);
}

/// Write the cached document of `resolver`'s entry to the configured destination.
///
/// # Errors
///
/// Returns `Error::UnresolvedEntry` if the entry is not cached, or
/// serialization and I/O errors.
pub fn write_resolved(
    cache: &SchemaCache,
    resolver: &Resolver,
    options: &OutputOptions,
) -> Result<(), error::Error> {
    let Some(entry) = cache.get(&resolver.handle().hash) else {
        return Err(error::Error::UnresolvedEntry {
            path: resolver.entry().to_path_buf(),
        });
    };
    let text = render(&entry.schema, options.format)?;
    match &options.output {
        None => print!("{text}"),
        Some(path) => std::fs::write(path, text)?,
    }
    return Ok(());
}
