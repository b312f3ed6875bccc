//! Error taxonomy for a build run

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised inside a build run
///
/// None of these reach the caller directly: the orchestrator converts each into
/// a [`BuildResult`](crate::BuildResult) after logging the details.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Bad input, reported before any filesystem mutation
    #[error("{0}")]
    Validation(String),

    /// Target templating, cache purging or asset staging failed
    #[error("Failed to prepare target: {0:#}")]
    Preparation(anyhow::Error),

    /// The build tool ran and failed (non-zero exit, signal or timeout)
    #[error("{tool} failed ({})", describe_exit(.code))]
    BuildTool {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Moving the bundle into the install directory failed
    #[error("Failed to install {}: {source}", .bundle.display())]
    Install {
        bundle: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Another run holds the project
    #[error("A build is already in progress")]
    Busy,

    /// Anything else (tool could not be spawned, log directory unwritable, ...)
    #[error("{0:#}")]
    Internal(anyhow::Error),
}

impl BuildError {
    /// Only build-tool failures restart the run from preparation
    pub fn is_retryable(&self) -> bool {
        matches!(self, BuildError::BuildTool { .. })
    }

    /// Text written to the error log for this failure
    pub fn log_contents(&self) -> String {
        match self {
            BuildError::BuildTool { stderr, .. } => stderr.clone(),
            other => format!("{}\n", other),
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated".to_string(),
    }
}
