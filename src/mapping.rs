//! Loads the `KEY=SECRET_IDENTIFIER` file that drives an injection run.

use std::path::Path;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, error};

use crate::errors::InjectError;

static PAIR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+)=(\S+)$").expect("mapping line pattern is valid"));

/// Placeholder key → secret identifier, in first-seen key order.
///
/// Re-inserting a key replaces its identifier but keeps the key's original
/// position, so resolution and substitution order follow the first time a
/// key appeared in the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    entries: IndexMap<String, String>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a pair; last write wins for duplicate keys.
    pub fn insert(&mut self, key: impl Into<String>, identifier: impl Into<String>) {
        self.entries.insert(key.into(), identifier.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parses one line. Surrounding whitespace is ignored; anything that is not
/// exactly `word=non-whitespace` yields `None`.
pub fn parse_line(line: &str) -> Option<(&str, &str)> {
    let caps = PAIR_RE.captures(line.trim())?;
    let key = caps.get(1)?.as_str();
    let identifier = caps.get(2)?.as_str();
    Some((key, identifier))
}

/// Parses a whole mapping file. `\n`, `\r\n` and a bare `\r` all end a line.
pub fn parse_mapping(content: &str) -> MappingTable {
    let mut table = MappingTable::new();
    for line in content.split(|c: char| c == '\n' || c == '\r') {
        match parse_line(line) {
            Some((key, identifier)) => table.insert(key, identifier),
            None if !line.trim().is_empty() => {
                debug!("Skipping unrecognized mapping line");
            }
            None => {}
        }
    }
    table
}

/// Reads and parses the mapping file, surfacing I/O failures.
pub fn try_load_mapping(path: &Path) -> Result<MappingTable, InjectError> {
    let content = std::fs::read_to_string(path).map_err(|source| InjectError::MappingFileIo {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_mapping(&content))
}

/// Best-effort variant used by the pipeline: an unreadable file is reported
/// and treated as an empty mapping.
pub fn load_mapping(path: &Path) -> MappingTable {
    match try_load_mapping(path) {
        Ok(table) => {
            debug!("Loaded {} key/secret pairs from {}", table.len(), path.display());
            table
        }
        Err(e) => {
            error!("{}", e);
            MappingTable::new()
        }
    }
}
