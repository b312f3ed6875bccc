//! Generic tool management for external CLI tools
//!
//! Describes the binaries the pipeline shells out to and how to probe them.

use std::process::Command;

/// Configuration for an external tool
#[derive(Debug, Clone)]
pub struct ToolConfig {
    /// Name of the tool binary (e.g., "xcodebuild")
    pub name: &'static str,
    /// Display name for user-facing messages
    pub display_name: &'static str,
    /// Arguments that make the tool print its version
    pub version_args: &'static [&'static str],
    /// Where to read about installing it
    pub docs_url: &'static str,
    /// Builds cannot run without it
    pub required: bool,
}

/// Manager for probing an external tool
#[derive(Debug, Clone)]
pub struct ToolManager {
    config: ToolConfig,
}

impl ToolManager {
    pub fn new(config: ToolConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    /// Check if the tool is installed and available in PATH
    pub fn is_installed(&self) -> bool {
        Command::new("which")
            .arg(self.config.name)
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// First line of the tool's version output, if it runs
    pub fn get_version(&self) -> Option<String> {
        Command::new(self.config.name)
            .args(self.config.version_args)
            .output()
            .ok()
            .filter(|output| output.status.success())
            .and_then(|output| {
                String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .next()
                    .map(|line| line.trim().to_string())
            })
            .filter(|line| !line.is_empty())
    }
}

/// Apple's build tool; builds are impossible without it
pub fn xcodebuild_tool() -> ToolManager {
    ToolManager::new(ToolConfig {
        name: "xcodebuild",
        display_name: "Xcode command line tools",
        version_args: &["-version"],
        docs_url: "https://developer.apple.com/xcode/",
        required: true,
    })
}

/// Used for the preview frame only; missing ffmpeg means no preview
pub fn ffmpeg_tool() -> ToolManager {
    ToolManager::new(ToolConfig {
        name: "ffmpeg",
        display_name: "FFmpeg",
        version_args: &["-version"],
        docs_url: "https://ffmpeg.org/download.html",
        required: false,
    })
}
