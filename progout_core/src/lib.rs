#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! Run external commands as values and memoize their output.
//!
//! A [`CommandSpec`] names what to run and how. A [`ProcessRunner`] turns it
//! into a child process, and a [`ResultCache`] makes sure each distinct spec is
//! only ever executed once per process lifetime.

pub mod cache;
pub mod command;
pub mod error;
pub mod runner;
pub mod split;

pub use cache::{ResultCache, Runner};
pub use command::{CommandLine, CommandSpec, DirectiveRecord};
pub use error::{ExecError, Result};
pub use runner::{OutputStream, ProcessHandle, ProcessRunner, ShellProgram};

use serde::Serialize;

/// A finished process: its exit code and trimmed standard output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub output: String,
}

impl ExecutionResult {
    /// Build a result from raw captured bytes.
    ///
    /// Trailing whitespace is trimmed. Bytes that are not valid UTF-8 are
    /// reported as [`ExecError::OutputDecode`] rather than replaced.
    pub fn from_captured(exit_code: i32, captured: Vec<u8>) -> Result<Self> {
        let mut output = String::from_utf8(captured)?;
        output.truncate(output.trim_end().len());
        Ok(Self { exit_code, output })
    }

    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }

    #[must_use]
    pub fn into_parts(self) -> (i32, String) {
        (self.exit_code, self.output)
    }
}
