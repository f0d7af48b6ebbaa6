//! CLI support for derivo
//!
//! Provides programmatic access to the `eval` and `check` commands so they
//! can be embedded in other tools.

mod check;
mod eval;

pub use check::{CheckOptions, CheckResult, execute_check};
pub use eval::{EvalOptions, builtin_library, execute_eval};

use std::io;

use thiserror::Error;

use crate::{CompileError, RuntimeError};

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("No input provided. Use --input or pipe JSON to stdin.")]
    NoInput,

    /// A `--apply` entry that is not `[name, args...]`
    #[error("Invalid mutation at position {index}: {message}")]
    InvalidMutation { index: usize, message: String },
}
