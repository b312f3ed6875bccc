//! Template loading, rendering and target materialization
//!
//! This module provides:
//! - Template manifest types (TemplateManifest, TemplateFile)
//! - Placeholder bindings with freshly generated build-system identifiers
//! - Target creation and teardown against the shared project descriptor
//! - Version compatibility checking

pub mod binding;
pub mod manifest;
pub mod target;
pub mod version;

pub use binding::{generate_identifier, TemplateBinding};
pub use manifest::{TemplateFile, TemplateManifest};
pub use target::TargetTemplate;
pub use version::check_compatibility;
