//! Build cache purging

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Remove the target's build directory and every derived-data directory whose
/// name starts with the project name. Returns the removed paths.
pub fn clear_build_cache(
    build_dir: &Path,
    derived_data_dir: &Path,
    project_name: &str,
) -> io::Result<Vec<PathBuf>> {
    let mut removed = Vec::new();

    if remove_dir(build_dir)? {
        removed.push(build_dir.to_path_buf());
    }

    let entries = match fs::read_dir(derived_data_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(removed),
        Err(e) => return Err(e),
    };

    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(project_name) {
            continue;
        }
        let path = entry.path();
        if path.is_dir() && remove_dir(&path)? {
            removed.push(path);
        }
    }

    if !removed.is_empty() {
        tracing::debug!(count = removed.len(), "purged build cache");
    }

    Ok(removed)
}

fn remove_dir(path: &Path) -> io::Result<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
