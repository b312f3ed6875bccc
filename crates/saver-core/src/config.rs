//! Builder configuration
//!
//! Every path the pipeline touches comes from here. Values are read from a YAML
//! file when one is found and fall back to defaults relative to the working
//! directory and the user's home.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming a config file to load
pub const CONFIG_ENV: &str = "SAVER_CONFIG";

/// Config file picked up from the working directory when present
pub const DEFAULT_CONFIG_FILE: &str = "saver.yaml";

/// Subdirectory of the user cache dir holding per-project state
const STATE_ROOT: &str = "saver";

/// Configuration for a builder instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Directory holding `<project_name>.xcodeproj` and the per-target folders
    pub project_root: PathBuf,

    /// Base name of the Xcode project (also the derived-data prefix)
    pub project_name: String,

    /// Directory containing `template.yaml` and the template files
    pub template_dir: PathBuf,

    /// Where finished `.saver` bundles are installed
    pub install_dir: PathBuf,

    /// Xcode's derived-data directory
    pub derived_data_dir: PathBuf,

    /// Directory receiving `err.log` / `run.log`
    pub log_dir: PathBuf,

    /// Accepted video extensions, without the leading dot
    pub accepted_extensions: Vec<String>,

    /// Xcode build configuration passed to `-configuration`
    pub build_configuration: String,

    /// Total build attempts per run (first try plus retries)
    pub max_attempts: u32,

    /// Kill the build tool after this many seconds; `None` waits indefinitely
    pub build_timeout_secs: Option<u64>,

    /// Screensaver host processes terminated after every run
    pub screensaver_processes: Vec<String>,

    /// Lock file and descriptor backup; kept outside the project so the
    /// project tree ends a run exactly as it started. Defaults to a
    /// per-project directory under the user cache dir.
    pub state_dir: Option<PathBuf>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));

        Self {
            project_root: cwd.join("myscreensaver"),
            project_name: "myscreensaver".to_string(),
            template_dir: cwd.join("templates").join("saver"),
            install_dir: home.join("Library").join("Screen Savers"),
            derived_data_dir: home
                .join("Library")
                .join("Developer")
                .join("Xcode")
                .join("DerivedData"),
            log_dir: cwd.join("logs"),
            accepted_extensions: vec!["mp4".to_string(), "mov".to_string(), "m4v".to_string()],
            build_configuration: "Release".to_string(),
            max_attempts: 2,
            build_timeout_secs: None,
            screensaver_processes: vec![
                "ScreenSaverAgent".to_string(),
                "legacyScreenSaver".to_string(),
                "Screen Saver".to_string(),
            ],
            state_dir: None,
        }
    }
}

impl BuilderConfig {
    /// Resolve the configuration: explicit path, then `$SAVER_CONFIG`, then
    /// `./saver.yaml`, then defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.is_empty() {
                return Self::from_file(Path::new(&path));
            }
        }

        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.is_file() {
            return Self::from_file(local);
        }

        Ok(Self::default())
    }

    /// Read a YAML config file; relative paths resolve against the file's directory
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: BuilderConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let config = config.resolve_paths(&base);
        config.validate()?;
        Ok(config)
    }

    /// Anchor relative paths at `base` and expand a leading `~`
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        for path in [
            &mut self.project_root,
            &mut self.template_dir,
            &mut self.install_dir,
            &mut self.derived_data_dir,
            &mut self.log_dir,
        ] {
            *path = resolve_path(path, base);
        }
        if let Some(state_dir) = &mut self.state_dir {
            *state_dir = resolve_path(state_dir, base);
        }
        self
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.project_name.trim().is_empty() {
            anyhow::bail!("project_name must not be empty");
        }
        if self.accepted_extensions.is_empty() {
            anyhow::bail!("accepted_extensions must list at least one extension");
        }
        if self.max_attempts == 0 {
            anyhow::bail!("max_attempts must be at least 1");
        }
        Ok(())
    }

    /// Path of the `.xcodeproj` bundle
    pub fn project_file(&self) -> PathBuf {
        self.project_root
            .join(format!("{}.xcodeproj", self.project_name))
    }

    /// The shared project descriptor that target creation overwrites
    pub fn descriptor_path(&self) -> PathBuf {
        self.project_file().join("project.pbxproj")
    }

    /// Tool-owned state directory for this project. The default is keyed by
    /// project name and root path so two checkouts never share a lock.
    pub fn state_dir(&self) -> PathBuf {
        if let Some(dir) = &self.state_dir {
            return dir.clone();
        }

        let mut hasher = DefaultHasher::new();
        self.project_root.hash(&mut hasher);
        let key = format!("{}-{:016x}", self.project_name, hasher.finish());

        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(STATE_ROOT)
            .join(key)
    }

    /// Descriptor backup written before target creation
    pub fn backup_path(&self) -> PathBuf {
        self.state_dir().join("project.pbxproj.bak")
    }

    /// Advisory lock serializing runs against this project
    pub fn lock_path(&self) -> PathBuf {
        self.state_dir().join("build.lock")
    }

    /// Per-target folder; also where the video and preview are staged
    pub fn target_dir(&self, target_name: &str) -> PathBuf {
        self.project_root.join(target_name)
    }

    /// Build output directory for a target
    pub fn build_dir(&self, target_name: &str) -> PathBuf {
        self.target_dir(target_name).join("build")
    }

    pub fn build_timeout(&self) -> Option<Duration> {
        self.build_timeout_secs.map(Duration::from_secs)
    }

    /// Check a video path against the accepted extensions (case-insensitive)
    pub fn accepts(&self, video_path: &Path) -> bool {
        video_path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.accepted_extensions
                    .iter()
                    .any(|accepted| accepted.trim_start_matches('.').eq_ignore_ascii_case(ext))
            })
    }

    /// Message shown when the selected file has the wrong extension
    pub fn extension_hint(&self) -> String {
        let exts: Vec<String> = self
            .accepted_extensions
            .iter()
            .map(|e| format!(".{}", e.trim_start_matches('.')))
            .collect();

        let list = match exts.as_slice() {
            [] => String::new(),
            [only] => only.clone(),
            [first, second] => format!("{} or {}", first, second),
            [rest @ .., last] => format!("{}, or {}", rest.join(", "), last),
        };

        format!("Please select a video file in {} format", list)
    }
}

fn resolve_path(path: &Path, base: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
