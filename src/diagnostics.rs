use crate::config::CONFIG_FILE;
use crate::error::Error;

/// ANSI bold, applied to markdown headings on a terminal.
const BOLD: &str = "\x1b[1m";
/// ANSI reset.
const RESET: &str = "\x1b[0m";

/// Render an error as valid markdown with bold headings and print to stderr.
pub fn print_error(e: &Error) {
    let md = render_error(e);
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
    return;
}

/// Render an error as a structured markdown diagnostic.
///
/// Each variant produces a block with what happened and, where the user can
/// act on it, how to fix it.
pub fn render_error(e: &Error) -> String {
    return match e {
        Error::ConfigNotFound { path } => format!(
            "\
# Error: Config Not Found

`{}` does not exist.

## Fix

Create it, or drop `--config` to use `{CONFIG_FILE}` from the working directory.
",
            path.display()
        ),
        Error::ExpansionFailed { file, reason } => format!(
            "\
# Error: Internal Reference Failed

`{}`: {reason}

## Fix

Point the `$ref` at a location that exists in the same document.
",
            file.display()
        ),
        Error::FileNotFound { path } => format!(
            "\
# Error: File Not Found

`{}` does not exist.
",
            path.display()
        ),
        Error::InvalidRewriteRule { pattern, reason } => render_invalid_rewrite_rule(pattern, reason),
        Error::ParseFailed { file, reason } => format!(
            "\
# Error: Parse Failed

Could not parse `{}`: {reason}

## Fix

Documents must be YAML or JSON with a mapping at the root.
",
            file.display()
        ),
        Error::UnresolvedEntry { path } => render_unresolved_entry(&path.display().to_string()),
        Error::Io(_)
        | Error::JsonSerialize(_)
        | Error::TomlDe(_)
        | Error::WatchFailed { .. }
        | Error::YamlSerialize(_) => render_generic(e),
    };
}

/// Headline-only block for errors with no actionable fix.
fn render_generic(e: &Error) -> String {
    let title = match e {
        Error::Io(_) => "I/O",
        Error::JsonSerialize(_) => "JSON Serialization",
        Error::TomlDe(_) => "Invalid TOML",
        Error::WatchFailed { .. } => "Watch Failed",
        Error::YamlSerialize(_) => "YAML Serialization",
        Error::ConfigNotFound { .. }
        | Error::ExpansionFailed { .. }
        | Error::FileNotFound { .. }
        | Error::InvalidRewriteRule { .. }
        | Error::ParseFailed { .. }
        | Error::UnresolvedEntry { .. } => "Error",
    };
    return format!(
        "\
# Error: {title}

{e}
"
    );
}

/// Block for a rewrite pattern that does not compile.
fn render_invalid_rewrite_rule(pattern: &str, reason: &str) -> String {
    return format!(
        "\
# Error: Invalid Rewrite Rule

`{pattern}`: {reason}

## Fix

Rules map a regular expression to a literal replacement, in `{CONFIG_FILE}`:

    [rewrite]
    \"^@shared/\" = \"../shared/\"

or on the command line:

    specweave --rewrite '^@shared/=../shared/' resolve api.yaml
"
    );
}

/// Block for an entry document that never reached the cache.
fn render_unresolved_entry(path: &str) -> String {
    return format!(
        "\
# Error: Entry Not Resolved

`{path}` could not be read, parsed, or expanded. See the warnings above for the cause.

## Fix

Run a check to list every failing file:

    specweave check {path}
"
    );
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, reason = "test code")]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn every_block_is_a_markdown_heading() {
        let errors = [
            Error::ConfigNotFound { path: PathBuf::from("custom.toml") },
            Error::FileNotFound { path: PathBuf::from("missing.yaml") },
            Error::UnresolvedEntry { path: PathBuf::from("api.yaml") },
            Error::WatchFailed { reason: "no inotify".to_string() },
        ];
        for e in &errors {
            assert!(render_error(e).starts_with("# Error: "), "{e}");
        }
    }

    #[test]
    fn rewrite_rule_block_shows_both_forms() {
        let md = render_error(&Error::InvalidRewriteRule {
            pattern: "(unclosed".to_string(),
            reason: "unclosed group".to_string(),
        });

        assert!(md.contains("`(unclosed`: unclosed group"));
        assert!(md.contains("[rewrite]"));
        assert!(md.contains("--rewrite"));
    }

    #[test]
    fn unresolved_entry_suggests_check() {
        let md = render_error(&Error::UnresolvedEntry { path: PathBuf::from("specs/api.yaml") });
        assert!(md.contains("specweave check specs/api.yaml"));
    }

    #[test]
    fn generic_errors_keep_their_message() {
        let md = render_error(&Error::WatchFailed { reason: "inotify limit reached".to_string() });
        assert!(md.contains("# Error: Watch Failed"));
        assert!(md.contains("inotify limit reached"));
    }
}
