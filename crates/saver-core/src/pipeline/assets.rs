//! Staged assets: the copied video and its preview frame

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// File stem of the staged video; the source extension is kept
pub const VIDEO_STEM: &str = "video";

/// File name of the preview frame
pub const PREVIEW_FILE: &str = "preview.png";

pub fn preview_path(asset_dir: &Path) -> PathBuf {
    asset_dir.join(PREVIEW_FILE)
}

/// Copy the source video to `<asset_dir>/video.<ext>`
pub fn stage_video(video: &Path, asset_dir: &Path) -> Result<PathBuf> {
    let dest = match video.extension() {
        Some(ext) => asset_dir.join(format!("{}.{}", VIDEO_STEM, ext.to_string_lossy())),
        None => asset_dir.join(VIDEO_STEM),
    };

    fs::create_dir_all(asset_dir)
        .with_context(|| format!("Failed to create asset directory: {}", asset_dir.display()))?;
    fs::copy(video, &dest).with_context(|| {
        format!(
            "Failed to copy {} to {}",
            video.display(),
            dest.display()
        )
    })?;

    Ok(dest)
}

/// Whether a file in the asset directory was staged by a build
pub fn is_staged_asset(file_name: &str) -> bool {
    file_name.starts_with(VIDEO_STEM) || file_name == PREVIEW_FILE
}

/// Delete staged `video.*` and `preview.png` files; a missing directory is fine.
/// Returns how many files were removed.
pub fn delete_assets(asset_dir: &Path) -> io::Result<usize> {
    let entries = match fs::read_dir(asset_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if is_staged_asset(&entry.file_name().to_string_lossy()) {
            fs::remove_file(entry.path())?;
            removed += 1;
        }
    }

    Ok(removed)
}
