//! Scoped ownership of one prepared target
//!
//! A `BuildSession` exists from the moment preparation starts until cleanup
//! has run. Cleanup happens in `finish` or, failing that, in `Drop`, so early
//! returns, errors, cancellation and panics all leave the project restored.

use super::assets;
use super::cache;
use super::toolchain::{BuildInvocation, Toolchain};
use crate::config::BuilderConfig;
use crate::request::BuildRequest;
use crate::templates::{TargetTemplate, TemplateBinding, TemplateManifest};
use anyhow::{Context, Result};
use std::path::PathBuf;

pub struct BuildSession<'a, T: Toolchain> {
    toolchain: &'a T,
    config: &'a BuilderConfig,
    target: TargetTemplate,
    target_name: String,
    asset_dir: PathBuf,
    build_dir: PathBuf,
    released: bool,
}

impl<'a, T: Toolchain> BuildSession<'a, T> {
    pub fn new(toolchain: &'a T, config: &'a BuilderConfig, target_name: &str) -> Self {
        Self {
            toolchain,
            config,
            target: TargetTemplate::new(config, target_name),
            target_name: target_name.to_string(),
            asset_dir: config.target_dir(target_name),
            build_dir: config.build_dir(target_name),
            released: false,
        }
    }

    /// Render the target, purge stale caches, write the preview and stage the video
    pub async fn prepare(
        &mut self,
        manifest: &TemplateManifest,
        binding: &TemplateBinding,
        request: &BuildRequest,
    ) -> Result<()> {
        self.target
            .create_target(manifest, binding)
            .context("Failed to create target")?;

        cache::clear_build_cache(
            &self.build_dir,
            &self.config.derived_data_dir,
            &self.config.project_name,
        )
        .context("Failed to clear build cache")?;

        let preview = assets::preview_path(&self.asset_dir);
        if !self
            .toolchain
            .extract_preview(request.video_path(), &preview)
            .await
        {
            tracing::info!(video = %request.video_path().display(), "no preview frame; continuing without one");
        }

        let staged = assets::stage_video(request.video_path(), &self.asset_dir)?;
        tracing::debug!(staged = %staged.display(), "staged video");

        Ok(())
    }

    /// Build-tool invocation for this target
    pub fn invocation(&self, request: &BuildRequest) -> BuildInvocation {
        BuildInvocation {
            project: self.config.project_file(),
            target: self.target_name.clone(),
            configuration: self.config.build_configuration.clone(),
            product_name: request.display_name().to_string(),
            build_dir: self.build_dir.clone(),
            timeout: self.config.build_timeout(),
        }
    }

    /// Run cleanup now rather than at drop
    pub fn finish(mut self) {
        self.cleanup();
    }

    /// Every step runs even if an earlier one fails; failures are logged only
    fn cleanup(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        tracing::debug!(target_name = %self.target_name, "cleaning up");

        // Staged files and the build dir only live in a folder we created
        if self.target.is_foreign() {
            tracing::warn!(dir = %self.asset_dir.display(), "target folder belongs to the project; leaving its contents alone");
        } else {
            if let Err(e) = assets::delete_assets(&self.asset_dir) {
                tracing::warn!(error = %e, "failed to delete staged assets");
            }

            if let Err(e) = cache::clear_build_cache(
                &self.build_dir,
                &self.config.derived_data_dir,
                &self.config.project_name,
            ) {
                tracing::warn!(error = %e, "failed to clear build cache");
            }
        }

        self.toolchain
            .refresh_screensaver(&self.config.screensaver_processes);

        if let Err(e) = self.target.delete_target() {
            tracing::warn!(error = %format!("{:#}", e), "failed to restore project");
        }
    }
}

impl<T: Toolchain> Drop for BuildSession<'_, T> {
    fn drop(&mut self) {
        if !self.released {
            tracing::debug!(target_name = %self.target_name, "session dropped before finish");
        }
        self.cleanup();
    }
}
