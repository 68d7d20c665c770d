use std::path::Path;

use tracing::{debug, info};

use crate::errors::{FileOperation, InjectError};
use crate::resolver::ReplacementTable;

/// What a rewrite did, for the run summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteReport {
    /// Total number of placeholder occurrences replaced.
    pub substitutions: usize,
}

/// Wraps a key in angle brackets: `EP` → `<EP>`.
pub fn placeholder(key: &str) -> String {
    format!("<{}>", key)
}

/// Replaces `<key>` with its value for every entry, one full pass per key in
/// table order. Passes are independent: a value inserted by an earlier pass
/// that itself contains `<later_key>` is rewritten again by the later pass.
pub fn substitute(content: &str, replacements: &ReplacementTable) -> (String, usize) {
    let mut output = content.to_string();
    let mut substitutions = 0;
    for (key, value) in replacements.iter() {
        let token = placeholder(key);
        let hits = output.matches(token.as_str()).count();
        if hits == 0 {
            continue;
        }
        output = output.replace(token.as_str(), value.expose());
        debug!("Replaced {} occurrence(s) of {}", hits, token);
        substitutions += hits;
    }
    (output, substitutions)
}

/// Reads `path`, substitutes placeholders and overwrites the file in place.
/// No backup is kept and placeholders without a replacement stay as they are.
pub fn rewrite(path: &Path, replacements: &ReplacementTable) -> Result<RewriteReport, InjectError> {
    let content = std::fs::read_to_string(path).map_err(|source| InjectError::TargetFileIo {
        path: path.to_path_buf(),
        operation: FileOperation::Read,
        source,
    })?;

    let (updated, substitutions) = substitute(&content, replacements);

    std::fs::write(path, updated).map_err(|source| InjectError::TargetFileIo {
        path: path.to_path_buf(),
        operation: FileOperation::Write,
        source,
    })?;

    info!("Successfully updated {}", path.display());
    Ok(RewriteReport { substitutions })
}
