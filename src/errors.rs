use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Which half of a read-modify-write cycle failed on the target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    Read,
    Write,
}

impl fmt::Display for FileOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileOperation::Read => f.write_str("read"),
            FileOperation::Write => f.write_str("write"),
        }
    }
}

#[derive(Debug, Error)]
pub enum InjectError {
    /// Not exactly three arguments. Fatal: nothing has been touched yet.
    #[error("expected 3 arguments, got {given}\n{usage}")]
    ArgumentCount { given: usize, usage: String },

    /// Three arguments that still fail to parse (e.g. a non UTF-8 region).
    #[error("{0}")]
    Usage(#[from] clap::Error),

    #[error("error reading key/secret mapping file {}: {source}", path.display())]
    MappingFileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error updating file {}: {operation} failed: {source}", path.display())]
    TargetFileIo {
        path: PathBuf,
        operation: FileOperation,
        #[source]
        source: std::io::Error,
    },
}
