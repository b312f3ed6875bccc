//! Build requests and results

use std::fmt;
use std::path::{Path, PathBuf};

/// Reported after a bundle is installed
pub const SUCCESS_MESSAGE: &str = "Screensaver built successfully!";

/// Reported for every non-validation failure; details go to the log
pub const FAILURE_MESSAGE: &str = "Something went wrong";

/// Reported when another run holds the project
pub const BUSY_MESSAGE: &str = "A build is already in progress";

/// One build run's input, fixed for the duration of the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    video_path: PathBuf,
    display_name: String,
}

impl BuildRequest {
    pub fn new(video_path: impl Into<PathBuf>, display_name: impl Into<String>) -> Self {
        Self {
            video_path: video_path.into(),
            display_name: display_name.into().trim().to_string(),
        }
    }

    /// Request named after the video's file stem
    pub fn from_video(video_path: impl Into<PathBuf>) -> Self {
        let video_path = video_path.into();
        let name = default_display_name(&video_path);
        Self::new(video_path, name)
    }

    pub fn video_path(&self) -> &Path {
        &self.video_path
    }

    /// Name shown in System Settings; also the bundle's product name
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Filesystem-safe target identifier derived from the display name
    pub fn target_name(&self) -> String {
        sanitize_target_name(&self.display_name)
    }

    /// Extension of the source video as written (no dot)
    pub fn video_extension(&self) -> Option<&str> {
        self.video_path.extension().and_then(|ext| ext.to_str())
    }
}

/// Default display name for a video: its file stem
pub fn default_display_name(video_path: &Path) -> String {
    video_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Prefix for target names that would otherwise start with a digit
const DIGIT_PREFIX: &str = "Saver";

/// Reduce a display name to an identifier usable as an Objective-C class
/// prefix and an unquoted Xcode target name: ASCII letters, digits and `_`,
/// never starting with a digit
pub fn sanitize_target_name(display_name: &str) -> String {
    let name: String = display_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        format!("{}{}", DIGIT_PREFIX, name)
    } else {
        name
    }
}

/// Outcome of one build run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildResult {
    /// Bundle installed at `artifact`
    Success { artifact: PathBuf },
    /// Input rejected before anything was touched
    ValidationError { message: String },
    /// Run failed; details were written to `log_path` when present
    BuildFailure {
        message: String,
        log_path: Option<PathBuf>,
    },
}

impl BuildResult {
    pub fn failure(log_path: Option<PathBuf>) -> Self {
        BuildResult::BuildFailure {
            message: FAILURE_MESSAGE.to_string(),
            log_path,
        }
    }

    pub fn busy() -> Self {
        BuildResult::BuildFailure {
            message: BUSY_MESSAGE.to_string(),
            log_path: None,
        }
    }

    /// The single user-facing status string for this result
    pub fn message(&self) -> &str {
        match self {
            BuildResult::Success { .. } => SUCCESS_MESSAGE,
            BuildResult::ValidationError { message } => message,
            BuildResult::BuildFailure { message, .. } => message,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BuildResult::Success { .. })
    }

    pub fn log_path(&self) -> Option<&Path> {
        match self {
            BuildResult::BuildFailure { log_path, .. } => log_path.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for BuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}
