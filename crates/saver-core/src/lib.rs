//! Saver Core - Shared library for building macOS screensavers from video files
//!
//! This library turns a video file into an installed `.saver` bundle. It templates
//! an Xcode target into an existing project, drives `xcodebuild`, installs the
//! product and puts the project back the way it found it.
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! - **Layer 1: Core Operations** - Template rendering, target creation/teardown,
//!   build cache purging, asset staging, tool detection
//! - **Layer 2: Workflow Orchestration** - `Orchestrator` sequencing one build run
//!   through validation, preparation, build, install and cleanup
//! - **Layer 3: CLI/TUI Interface** - Optional cliclack-based prompts (feature-gated)
//!
//! # Feature Flags
//!
//! - `tui` (default): Enables the cliclack-based TUI prompts module
//!
//! # Example Usage (without TUI)
//!
//! ```ignore
//! use saver_core::{BuildRequest, BuilderConfig, Orchestrator, SystemToolchain};
//!
//! let config = BuilderConfig::load(None)?;
//! let orchestrator = Orchestrator::new(config, SystemToolchain::default());
//! let request = BuildRequest::new("clip.mp4", "My Saver");
//! let result = orchestrator.run(&request, |status| println!("{status}")).await;
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod request;
pub mod runtime;
pub mod templates;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export main types for convenience
pub use config::BuilderConfig;
pub use error::BuildError;
pub use pipeline::{BuildPhase, Orchestrator, SystemToolchain, Toolchain};
pub use request::{BuildRequest, BuildResult};
pub use templates::{TargetTemplate, TemplateBinding, TemplateManifest};

#[cfg(feature = "tui")]
pub use tui::run;

/// Library version - compared against the `version` field of template manifests
pub const CORE_VERSION: &str = env!("CARGO_PKG_VERSION");
