//! External tool detection
//!
//! This module provides:
//! - Generic tool descriptions (binary name, version probe, docs link)
//! - Availability checks with required/advisory semantics

pub mod check;
pub mod tool;

pub use check::{check_tools, print_report, ToolInfo};
pub use tool::{ffmpeg_tool, xcodebuild_tool, ToolManager};
