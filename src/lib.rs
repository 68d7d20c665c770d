//! fixture-secrets: library crate for integration testing.
//!
//! Re-exports the pipeline stages used by the binary and by `tests/`.

pub mod cli;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod mapping;
pub mod pipeline;
pub mod resolver;
pub mod rewriter;
pub mod store;
