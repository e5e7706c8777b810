//! Platform installers.
//!
//! Each installer swaps the downloaded build in for the installed one. The
//! running executable is first renamed to its `.tmp` sibling; if the swap
//! fails the sibling is renamed back, and whatever is left over is removed
//! at the next startup.

use crate::archive;
use crate::{UpdateError, UpdateResult};
use client_config_and_utils::{InstallLayout, Platform};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Installs a downloaded payload over the current application.
///
/// Runs on the blocking pool.
pub trait Installer: Send + Sync {
    fn platform(&self) -> Platform;

    /// Install `download`, using `workdir` for scratch space.
    fn install(&self, download: &Path, workdir: &Path, layout: &InstallLayout) -> UpdateResult<()>;
}

/// The installer for `platform`.
pub fn installer_for(platform: Platform) -> Arc<dyn Installer> {
    match platform {
        Platform::Linux => Arc::new(LinuxInstaller),
        Platform::Mac => Arc::new(MacInstaller),
        Platform::Windows => Arc::new(WindowsInstaller),
    }
}

fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn remove_path(path: &Path) -> io::Result<()> {
    if fs::symlink_metadata(path)?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn copy_recursive(src: &Path, dst: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(src)?;

    #[cfg(unix)]
    if meta.file_type().is_symlink() {
        return std::os::unix::fs::symlink(fs::read_link(src)?, dst);
    }

    if meta.is_dir() {
        fs::create_dir_all(dst)?;
        for entry in fs::read_dir(src)? {
            let entry = entry?;
            copy_recursive(&entry.path(), &dst.join(entry.file_name()))?;
        }
        fs::set_permissions(dst, meta.permissions())
    } else {
        fs::copy(src, dst).map(|_| ())
    }
}

/// Move a file or directory, falling back to copy and delete when a plain
/// rename is not possible (e.g. across filesystems).
pub fn move_path(src: &Path, dst: &Path) -> io::Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!(src = %src.display(), dst = %dst.display(), error = %e, "Rename failed, copying");
            copy_recursive(src, dst)?;
            remove_path(src)
        }
    }
}

/// Delete the `.tmp` sibling left by a previous install.
pub fn remove_stale_executable(layout: &InstallLayout) -> io::Result<bool> {
    let stale = layout.staged_old_path();
    if !exists(&stale) {
        return Ok(false);
    }
    remove_path(&stale)?;
    info!(path = %stale.display(), "Removed previous executable");
    Ok(true)
}

/// Rename the installed executable to its `.tmp` sibling.
fn stage_old_executable(layout: &InstallLayout) -> UpdateResult<bool> {
    if !exists(&layout.executable_path) {
        warn!(path = %layout.executable_path.display(), "No installed executable to replace");
        return Ok(false);
    }

    let staged = layout.staged_old_path();
    if exists(&staged) {
        remove_path(&staged)?;
    }
    fs::rename(&layout.executable_path, &staged).map_err(|e| {
        UpdateError::InstallFailed(format!(
            "renaming {}: {}",
            layout.executable_path.display(),
            e
        ))
    })?;
    debug!(path = %staged.display(), "Old executable staged");
    Ok(true)
}

/// Undo [`stage_old_executable`] after a failed swap.
fn restore_old_executable(layout: &InstallLayout) {
    if exists(&layout.executable_path) {
        if let Err(e) = remove_path(&layout.executable_path) {
            warn!(error = %e, "Could not remove partial install");
            return;
        }
    }
    if let Err(e) = fs::rename(layout.staged_old_path(), &layout.executable_path) {
        warn!(error = %e, "Could not restore previous executable");
    }
}

/// Run `swap` with the old executable staged, rolling back on failure.
fn swap_in(
    layout: &InstallLayout,
    swap: impl FnOnce() -> UpdateResult<()>,
) -> UpdateResult<()> {
    let staged = stage_old_executable(layout)?;
    if let Err(e) = swap() {
        if staged {
            restore_old_executable(layout);
        }
        return Err(e);
    }
    info!(path = %layout.executable_path.display(), "New build installed");
    Ok(())
}

fn install_failed(context: &str, e: io::Error) -> UpdateError {
    UpdateError::InstallFailed(format!("{}: {}", context, e))
}

/// Linux: tar archive whose top-level entry is the new executable.
pub struct LinuxInstaller;

impl Installer for LinuxInstaller {
    fn platform(&self) -> Platform {
        Platform::Linux
    }

    fn install(&self, download: &Path, workdir: &Path, layout: &InstallLayout) -> UpdateResult<()> {
        let dest = workdir.join("extracted");
        if exists(&dest) {
            remove_path(&dest)?;
        }
        let extracted = archive::extract_tar(download, &dest)?;
        swap_in(layout, || {
            move_path(&extracted, &layout.executable_path)
                .map_err(|e| install_failed("moving extracted build", e))
        })
    }
}

/// Mac: zip archive holding the application bundle.
pub struct MacInstaller;

impl Installer for MacInstaller {
    fn platform(&self) -> Platform {
        Platform::Mac
    }

    fn install(&self, download: &Path, _workdir: &Path, layout: &InstallLayout) -> UpdateResult<()> {
        archive::validate_zip(download)?;
        swap_in(layout, || {
            archive::extract_zip(download, &layout.app_dir)?;
            if exists(&layout.executable_path) {
                Ok(())
            } else {
                Err(UpdateError::InstallFailed(format!(
                    "archive does not contain {}",
                    layout.platform.app_name()
                )))
            }
        })
    }
}

/// Windows: the download is the executable itself.
pub struct WindowsInstaller;

impl Installer for WindowsInstaller {
    fn platform(&self) -> Platform {
        Platform::Windows
    }

    fn install(&self, download: &Path, _workdir: &Path, layout: &InstallLayout) -> UpdateResult<()> {
        swap_in(layout, || {
            move_path(download, &layout.executable_path)
                .map_err(|e| install_failed("moving downloaded executable", e))
        })
    }
}
