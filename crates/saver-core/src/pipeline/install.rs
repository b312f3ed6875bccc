//! Installing the built bundle

use crate::error::BuildError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Move `bundle` into `install_dir`, replacing a bundle of the same name.
/// Returns the installed path.
///
/// The bundle is first moved to a hidden staging sibling and only then swapped
/// in, so a failed move leaves any previously installed bundle untouched and
/// never leaves a partial bundle under the installed name.
pub fn install_bundle(bundle: &Path, install_dir: &Path) -> Result<PathBuf, BuildError> {
    install_with(bundle, install_dir, move_path)
}

fn install_with<M>(bundle: &Path, install_dir: &Path, move_to: M) -> Result<PathBuf, BuildError>
where
    M: Fn(&Path, &Path) -> io::Result<()>,
{
    let fail = |source: io::Error| BuildError::Install {
        bundle: bundle.to_path_buf(),
        source,
    };

    let file_name = bundle.file_name().ok_or_else(|| {
        fail(io::Error::new(
            io::ErrorKind::InvalidInput,
            "bundle path has no file name",
        ))
    })?;

    if !bundle.exists() {
        return Err(fail(io::Error::new(
            io::ErrorKind::NotFound,
            "build tool reported success but produced no bundle",
        )));
    }

    fs::create_dir_all(install_dir).map_err(fail)?;

    let name = file_name.to_string_lossy();
    let dest = install_dir.join(file_name);
    let staging = install_dir.join(format!(".{}.tmp", name));
    let previous = install_dir.join(format!(".{}.old", name));

    remove_path(&staging).map_err(fail)?;
    if let Err(e) = move_to(bundle, &staging) {
        discard(&staging);
        return Err(fail(e));
    }

    let replacing = dest.exists();
    if replacing {
        remove_path(&previous).map_err(fail)?;
        if let Err(e) = fs::rename(&dest, &previous) {
            discard(&staging);
            return Err(fail(e));
        }
    }

    if let Err(e) = fs::rename(&staging, &dest) {
        if replacing {
            if let Err(restore) = fs::rename(&previous, &dest) {
                tracing::error!(error = %restore, "failed to restore previously installed bundle");
            }
        }
        discard(&staging);
        return Err(fail(e));
    }

    if replacing {
        discard(&previous);
    }

    tracing::info!(dest = %dest.display(), "installed bundle");
    Ok(dest)
}

/// Remove a file or directory; absent is fine
fn remove_path(path: &Path) -> io::Result<()> {
    let removed = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match removed {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn discard(path: &Path) {
    if let Err(e) = remove_path(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove leftover install file");
    }
}

/// Rename, falling back to copy + delete when crossing filesystems
fn move_path(src: &Path, dest: &Path) -> io::Result<()> {
    match fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            copy_recursive(src, dest)?;
            if src.is_dir() {
                fs::remove_dir_all(src)
            } else {
                fs::remove_file(src)
            }
        }
        Err(e) => Err(e),
    }
}

fn copy_recursive(src: &Path, dest: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
