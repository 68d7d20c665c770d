use std::ffi::OsString;
use std::path::PathBuf;

use clap::{CommandFactory, Parser};

use crate::errors::InjectError;

/// Positional arguments after the program name.
pub const EXPECTED_ARGS: usize = 3;

/// Replace `<KEY>` placeholders in a fixture file with values pulled from
/// AWS Secrets Manager.
#[derive(Debug, Parser)]
#[command(name = "fixture-secrets", version, about)]
pub struct Cli {
    /// File with one `KEY=SECRET_ID` pair per line
    pub key_secrets_file: PathBuf,

    /// File whose `<KEY>` placeholders are rewritten in place
    pub target_file: PathBuf,

    /// AWS region of the secrets (e.g. us-east-1)
    pub region: String,
}

impl Cli {
    /// Parses `argv` (program name first). Exactly three arguments are
    /// accepted and all of them are positional, including ones that look
    /// like flags (`--help`, `-t.swift`).
    pub fn parse_args<I, T>(args: I) -> Result<Self, InjectError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let mut args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        let given = args.len().saturating_sub(1);
        if given != EXPECTED_ARGS {
            return Err(InjectError::ArgumentCount {
                given,
                usage: usage(),
            });
        }

        // `--` ends option parsing so every remaining value stays positional.
        args.insert(1, OsString::from("--"));
        Ok(Cli::try_parse_from(args)?)
    }
}

/// Rendered `Usage: ...` line.
pub fn usage() -> String {
    Cli::command().render_usage().to_string()
}
