//! Error types for bumpgate.

use std::path::PathBuf;

use thiserror::Error;

/// Gate error type.
///
/// Every variant is fatal: the commit is refused and the message is shown
/// to the user as a single line.
#[derive(Error, Debug)]
pub enum Error {
    /// A snapshot has no `version = ` line.
    #[error("Missing version number in {path} ({snapshot})")]
    MissingVersion { path: String, snapshot: String },

    /// Baseline and candidate are identical where a bump was required.
    #[error("Missing version bump in {path}")]
    NoVersionBump { path: String },

    #[error("Command `{command}` failed with {}", exit_description(*.code))]
    ToolFailed { command: String, code: Option<i32> },

    #[error("Failed to run `{command}`: {source}")]
    ToolSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("git error: {0}")]
    Git(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    pub fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Config {
            path: path.into(),
            message: message.into(),
        }
    }
}

fn exit_description(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}
