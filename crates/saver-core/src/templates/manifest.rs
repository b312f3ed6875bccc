//! Template manifest types and parsing

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A single file rendered into the project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateFile {
    /// Source path relative to the template directory
    pub source: String,

    /// Destination relative to the project root; may contain placeholders.
    /// Ignored for the descriptor, which always lands on the project's
    /// `project.pbxproj`.
    #[serde(default)]
    pub dest: Option<String>,

    /// This file replaces the shared project descriptor (backed up first)
    #[serde(default)]
    pub descriptor: bool,
}

/// Template manifest (`<template_dir>/template.yaml`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateManifest {
    /// Display name of the template
    pub name: String,

    /// Description of what the template provides
    #[serde(default)]
    pub description: String,

    /// Semver version for compatibility checking
    pub version: String,

    /// Placeholders that receive a fresh build-system identifier per run
    #[serde(default)]
    pub identifiers: Vec<String>,

    /// Files rendered into the project
    pub files: Vec<TemplateFile>,
}

impl TemplateManifest {
    pub const FILE_NAME: &'static str = "template.yaml";

    /// Read and check `template.yaml` from a template directory
    pub fn load(template_dir: &Path) -> Result<Self> {
        let path = template_dir.join(Self::FILE_NAME);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let manifest: TemplateManifest = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// At least one file, at most one descriptor, and a destination for everything else
    pub fn validate(&self) -> Result<()> {
        if self.files.is_empty() {
            anyhow::bail!("Template '{}' lists no files", self.name);
        }

        let descriptors = self.files.iter().filter(|f| f.descriptor).count();
        if descriptors > 1 {
            anyhow::bail!(
                "Template '{}' marks {} files as the project descriptor; expected at most one",
                self.name,
                descriptors
            );
        }

        if let Some(file) = self.files.iter().find(|f| !f.descriptor && f.dest.is_none()) {
            anyhow::bail!(
                "Template '{}': file '{}' has no dest",
                self.name,
                file.source
            );
        }

        Ok(())
    }

    /// The entry rendered onto the project descriptor, if any
    pub fn descriptor(&self) -> Option<&TemplateFile> {
        self.files.iter().find(|f| f.descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
name: Video screensaver
description: Loops a bundled video
version: 0.1.0
identifiers:
  - UUID_PROJECT
  - UUID_SAVER
files:
  - source: project.pbxproj.template
    descriptor: true
  - source: templateView.h.template
    dest: "{{TARGET_NAME}}/{{TARGET_NAME}}View.h"
"#;

    #[test]
    fn test_parse_manifest() {
        let manifest: TemplateManifest = serde_yaml::from_str(MANIFEST).unwrap();
        manifest.validate().unwrap();

        assert_eq!(manifest.identifiers, vec!["UUID_PROJECT", "UUID_SAVER"]);
        assert_eq!(
            manifest.descriptor().map(|f| f.source.as_str()),
            Some("project.pbxproj.template")
        );
        assert_eq!(
            manifest.files[1].dest.as_deref(),
            Some("{{TARGET_NAME}}/{{TARGET_NAME}}View.h")
        );
    }

    #[test]
    fn test_two_descriptors_rejected() {
        let manifest = TemplateManifest {
            name: "broken".to_string(),
            description: String::new(),
            version: "0.1.0".to_string(),
            identifiers: vec![],
            files: vec![
                TemplateFile {
                    source: "a".to_string(),
                    dest: None,
                    descriptor: true,
                },
                TemplateFile {
                    source: "b".to_string(),
                    dest: None,
                    descriptor: true,
                },
            ],
        };
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_missing_dest_rejected() {
        let manifest = TemplateManifest {
            name: "broken".to_string(),
            description: String::new(),
            version: "0.1.0".to_string(),
            identifiers: vec![],
            files: vec![TemplateFile {
                source: "view.m".to_string(),
                dest: None,
                descriptor: false,
            }],
        };
        let err = manifest.validate().unwrap_err();
        assert!(err.to_string().contains("view.m"));
    }

    #[test]
    fn test_load_missing_manifest_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = TemplateManifest::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("template.yaml"));
    }
}
