//! External processes the pipeline drives
//!
//! `Toolchain` is the seam between orchestration and the host system: the
//! build tool, the preview extractor and the screensaver host processes.
//! `SystemToolchain` shells out to `xcodebuild`, `ffmpeg` and `killall`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

/// Everything needed for one build-tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInvocation {
    /// The `.xcodeproj` bundle
    pub project: PathBuf,
    pub target: String,
    pub configuration: String,
    /// Bundle name; the product lands at `<build_dir>/<product_name>.saver`
    pub product_name: String,
    pub build_dir: PathBuf,
    pub timeout: Option<Duration>,
}

impl BuildInvocation {
    /// `xcodebuild` arguments: clean then build one target with explicit output dirs
    pub fn args(&self) -> Vec<String> {
        vec![
            "clean".to_string(),
            "build".to_string(),
            "-project".to_string(),
            self.project.display().to_string(),
            "-target".to_string(),
            self.target.clone(),
            "-configuration".to_string(),
            self.configuration.clone(),
            format!("PRODUCT_NAME={}", self.product_name),
            format!("SYMROOT={}", self.build_dir.display()),
            format!("CONFIGURATION_BUILD_DIR={}", self.build_dir.display()),
        ]
    }

    /// Where a successful build leaves the bundle
    pub fn product_path(&self) -> PathBuf {
        self.build_dir.join(format!("{}.saver", self.product_name))
    }
}

/// Captured result of a finished build-tool process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code; `None` when killed by a signal or the timeout
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Host-system operations used by the orchestrator
#[allow(async_fn_in_trait)]
pub trait Toolchain {
    /// Name used in logs and error messages
    fn build_tool_name(&self) -> &str {
        "xcodebuild"
    }

    /// Run the build tool to completion, capturing all output. `Err` means the
    /// tool could not be run at all; a failed build is an `Ok` with a non-zero code.
    async fn build(&self, invocation: &BuildInvocation) -> Result<ToolOutput>;

    /// Write the first decodable frame of `video` to `dest` as PNG.
    /// Returns false when no frame could be produced.
    async fn extract_preview(&self, video: &Path, dest: &Path) -> bool;

    /// Terminate running screensaver hosts so the new bundle is picked up.
    /// Synchronous: cleanup calls it from `Drop`.
    fn refresh_screensaver(&self, processes: &[String]);
}

/// Toolchain backed by the real system binaries
#[derive(Debug, Clone)]
pub struct SystemToolchain {
    build_tool: String,
    preview_tool: String,
}

impl Default for SystemToolchain {
    fn default() -> Self {
        Self {
            build_tool: "xcodebuild".to_string(),
            preview_tool: "ffmpeg".to_string(),
        }
    }
}

impl SystemToolchain {
    pub fn new(build_tool: impl Into<String>, preview_tool: impl Into<String>) -> Self {
        Self {
            build_tool: build_tool.into(),
            preview_tool: preview_tool.into(),
        }
    }
}

impl Toolchain for SystemToolchain {
    fn build_tool_name(&self) -> &str {
        &self.build_tool
    }

    async fn build(&self, invocation: &BuildInvocation) -> Result<ToolOutput> {
        let args = invocation.args();
        tracing::info!(tool = %self.build_tool, args = ?args, "running build tool");

        let mut command = TokioCommand::new(&self.build_tool);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let run = command.output();
        let output = match invocation.timeout {
            Some(limit) => match timeout(limit, run).await {
                Ok(output) => output,
                Err(_) => {
                    // Dropping the future kills the child (kill_on_drop)
                    tracing::warn!(seconds = limit.as_secs(), "build tool timed out");
                    return Ok(ToolOutput {
                        code: None,
                        stdout: String::new(),
                        stderr: format!(
                            "{} timed out after {} seconds\n",
                            self.build_tool,
                            limit.as_secs()
                        ),
                    });
                }
            },
            None => run.await,
        }
        .with_context(|| format!("Failed to run {}", self.build_tool))?;

        Ok(ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn extract_preview(&self, video: &Path, dest: &Path) -> bool {
        let status = TokioCommand::new(&self.preview_tool)
            .args(["-y", "-loglevel", "error", "-i"])
            .arg(video)
            .args(["-frames:v", "1"])
            .arg(dest)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await;

        match status {
            Ok(status) if status.success() => dest.is_file(),
            Ok(status) => {
                tracing::debug!(code = ?status.code(), "preview extraction failed");
                false
            }
            Err(e) => {
                tracing::debug!(error = %e, tool = %self.preview_tool, "preview tool unavailable");
                false
            }
        }
    }

    fn refresh_screensaver(&self, processes: &[String]) {
        for name in processes {
            let result = Command::new("killall")
                .args(["-KILL", name.as_str()])
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
            // Exit status 1 just means nothing was running
            if let Err(e) = result {
                tracing::debug!(process = %name, error = %e, "killall unavailable");
            }
        }
    }
}
