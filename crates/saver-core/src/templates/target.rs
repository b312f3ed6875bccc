//! Target creation and teardown
//!
//! A target is one folder of rendered sources inside the project plus a
//! rewritten project descriptor. Creation backs the descriptor up; teardown
//! removes the folder and puts the descriptor back.

use super::binding::TemplateBinding;
use super::manifest::TemplateManifest;
use crate::config::BuilderConfig;
use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Written into every target folder this builder creates; teardown only
/// removes folders that carry it
pub const OWNER_MARKER: &str = ".saver-target";

/// Materializes one build target inside the project
#[derive(Debug)]
pub struct TargetTemplate {
    template_dir: PathBuf,
    project_root: PathBuf,
    target_dir: PathBuf,
    descriptor_path: PathBuf,
    backup_path: PathBuf,
    /// Set when creation wrote a descriptor where none existed
    descriptor_created: bool,
}

impl TargetTemplate {
    pub fn new(config: &BuilderConfig, target_name: &str) -> Self {
        Self {
            template_dir: config.template_dir.clone(),
            project_root: config.project_root.clone(),
            target_dir: config.target_dir(target_name),
            descriptor_path: config.descriptor_path(),
            backup_path: config.backup_path(),
            descriptor_created: false,
        }
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    pub fn descriptor_path(&self) -> &Path {
        &self.descriptor_path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// Whether the target folder exists but belongs to the project rather
    /// than to a build (or an interrupted build) of ours
    pub fn is_foreign(&self) -> bool {
        self.target_dir.exists() && !self.target_dir.join(OWNER_MARKER).is_file()
    }

    /// Render every template file into the project, returning the written paths
    pub fn create_target(
        &mut self,
        manifest: &TemplateManifest,
        binding: &TemplateBinding,
    ) -> Result<Vec<PathBuf>> {
        if self.is_foreign() {
            anyhow::bail!(
                "{} already exists in the project and was not created by a build",
                self.target_dir.display()
            );
        }

        fs::create_dir_all(&self.target_dir).with_context(|| {
            format!(
                "Failed to create target directory: {}",
                self.target_dir.display()
            )
        })?;
        let marker = self.target_dir.join(OWNER_MARKER);
        fs::write(&marker, b"")
            .with_context(|| format!("Failed to write {}", marker.display()))?;

        if manifest.descriptor().is_some() {
            self.backup_descriptor()?;
        }

        let mut written = Vec::new();

        for file in &manifest.files {
            let source = self.template_dir.join(&file.source);
            let template = fs::read_to_string(&source)
                .with_context(|| format!("Failed to read template: {}", source.display()))?;

            let dest = if file.descriptor {
                self.descriptor_path.clone()
            } else {
                // validate() guarantees a dest for non-descriptor files
                let dest = file.dest.as_deref().unwrap_or(&file.source);
                self.project_root.join(binding.render(dest))
            };

            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }

            fs::write(&dest, binding.render(&template))
                .with_context(|| format!("Failed to write file: {}", dest.display()))?;

            tracing::debug!(source = %source.display(), dest = %dest.display(), "rendered template");
            written.push(dest);
        }

        Ok(written)
    }

    /// Remove the target folder and restore the descriptor. Safe to call when
    /// nothing was created. A folder without the owner marker is left alone.
    pub fn delete_target(&mut self) -> Result<()> {
        if self.is_foreign() {
            tracing::warn!(
                dir = %self.target_dir.display(),
                "not removing a folder this builder did not create"
            );
        } else {
            remove_dir_if_exists(&self.target_dir).with_context(|| {
                format!(
                    "Failed to remove target directory: {}",
                    self.target_dir.display()
                )
            })?;
        }

        if self.backup_path.is_file() {
            fs::copy(&self.backup_path, &self.descriptor_path).with_context(|| {
                format!(
                    "Failed to restore project descriptor: {}",
                    self.descriptor_path.display()
                )
            })?;
            fs::remove_file(&self.backup_path).with_context(|| {
                format!("Failed to remove backup: {}", self.backup_path.display())
            })?;
            tracing::debug!(descriptor = %self.descriptor_path.display(), "restored project descriptor");
        } else if self.descriptor_created {
            remove_file_if_exists(&self.descriptor_path).with_context(|| {
                format!(
                    "Failed to remove rendered descriptor: {}",
                    self.descriptor_path.display()
                )
            })?;
        }
        self.descriptor_created = false;

        // Leave no empty state directory behind
        if let Some(state_dir) = self.backup_path.parent() {
            let _ = fs::remove_dir(state_dir);
        }

        Ok(())
    }

    fn backup_descriptor(&mut self) -> Result<()> {
        // A leftover backup holds the real descriptor; the file on disk is a rendered one
        if self.backup_path.is_file() {
            tracing::warn!(
                backup = %self.backup_path.display(),
                "keeping descriptor backup left by an interrupted run"
            );
            return Ok(());
        }

        if !self.descriptor_path.is_file() {
            self.descriptor_created = true;
            return Ok(());
        }

        if let Some(parent) = self.backup_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        fs::copy(&self.descriptor_path, &self.backup_path).with_context(|| {
            format!(
                "Failed to back up project descriptor to {}",
                self.backup_path.display()
            )
        })?;

        Ok(())
    }
}

fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
