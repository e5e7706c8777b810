//! Archive extraction for update payloads.
//!
//! Every member is checked before anything is written: a member whose path,
//! or link target, resolves outside the extraction root fails the whole
//! extraction with [`UpdateError::PathTraversalDetected`].

use crate::{UpdateError, UpdateResult};
use flate2::read::GzDecoder;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use zip::ZipArchive;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

/// Longest chain of archive symlinks followed while resolving one path.
const MAX_LINK_DEPTH: usize = 32;

/// Symlink members seen so far, keyed by where they land under the root.
///
/// Paths are resolved the way the filesystem will see them once the links
/// exist on disk: an intermediate component that names a link is replaced
/// by the link's target. A path that climbs above the root, or is absolute,
/// resolves to `None`.
#[derive(Default)]
struct LinkTable {
    links: HashMap<Vec<OsString>, PathBuf>,
}

impl LinkTable {
    fn resolve(&self, base: &[OsString], path: &Path) -> Option<Vec<OsString>> {
        self.walk(base.to_vec(), path, 0)
    }

    fn walk(&self, mut stack: Vec<OsString>, path: &Path, depth: usize) -> Option<Vec<OsString>> {
        if depth > MAX_LINK_DEPTH {
            return None;
        }

        let mut components = path.components().peekable();
        while let Some(component) = components.next() {
            match component {
                Component::Normal(part) => {
                    stack.push(part.to_os_string());
                    if components.peek().is_none() {
                        break;
                    }
                    if let Some(target) = self.links.get(&stack) {
                        stack.pop();
                        stack = self.walk(stack, target, depth + 1)?;
                    }
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    stack.pop()?;
                }
                Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        Some(stack)
    }

    /// Where a member lands on disk.
    fn member(&self, path: &Path) -> UpdateResult<Vec<OsString>> {
        self.resolve(&[], path)
            .ok_or_else(|| UpdateError::PathTraversalDetected(path.display().to_string()))
    }

    fn add_symlink(&mut self, member: Vec<OsString>, target: PathBuf) {
        self.links.insert(member, target);
    }

    /// Every symlink target must stay under the root once all links exist.
    /// Targets are relative to the directory holding the link.
    fn check_targets(&self) -> UpdateResult<()> {
        for (member, target) in &self.links {
            let parent = &member[..member.len().saturating_sub(1)];
            if self.resolve(parent, target).is_none() {
                return Err(UpdateError::PathTraversalDetected(format!(
                    "link target {}",
                    target.display()
                )));
            }
        }
        Ok(())
    }
}

fn open_tar(path: &Path) -> UpdateResult<tar::Archive<Box<dyn Read>>> {
    let mut file = File::open(path)?;
    let mut magic = Vec::with_capacity(2);
    (&mut file).take(2).read_to_end(&mut magic)?;
    file.seek(SeekFrom::Start(0))?;

    let reader: Box<dyn Read> = if magic == GZIP_MAGIC {
        debug!(path = %path.display(), "gzip-compressed tar");
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(tar::Archive::new(reader))
}

/// Check every tar member. Returns the member paths in archive order.
pub fn validate_tar(archive_path: &Path) -> UpdateResult<Vec<PathBuf>> {
    let mut archive = open_tar(archive_path)?;
    let mut links = LinkTable::default();
    let mut hard_links = Vec::new();
    let mut names = Vec::new();

    for entry in archive.entries()? {
        let entry = entry?;
        let path = entry.path()?.into_owned();
        let member = links.member(&path)?;

        let entry_type = entry.header().entry_type();
        if entry_type.is_symlink() || entry_type.is_hard_link() {
            let target = entry
                .link_name()?
                .ok_or_else(|| {
                    UpdateError::InstallFailed(format!("link {} has no target", path.display()))
                })?
                .into_owned();
            if entry_type.is_symlink() {
                links.add_symlink(member.clone(), target);
            } else {
                // Hard link targets name another member, relative to the root.
                hard_links.push(target);
            }
        }

        names.push(member.iter().collect());
    }

    links.check_targets()?;
    for target in &hard_links {
        links.member(target)?;
    }

    Ok(names)
}

/// Extract a (possibly gzip-compressed) tar archive into `dest`.
///
/// Returns the path of the top-level entry of the last member, which is
/// the extracted application.
pub fn extract_tar(archive_path: &Path, dest: &Path) -> UpdateResult<PathBuf> {
    let names = validate_tar(archive_path)?;
    let top = names
        .iter()
        .rev()
        .find_map(|name: &PathBuf| name.components().next())
        .map(|component| component.as_os_str().to_os_string())
        .ok_or_else(|| UpdateError::InstallFailed("archive is empty".to_string()))?;

    fs::create_dir_all(dest)?;
    let mut archive = open_tar(archive_path)?;
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);
    archive.unpack(dest)?;

    debug!(members = names.len(), dest = %dest.display(), "tar extracted");
    Ok(dest.join(top))
}

fn is_symlink_mode(mode: Option<u32>) -> bool {
    mode.map_or(false, |mode| mode & S_IFMT == S_IFLNK)
}

/// Check every zip member.
pub fn validate_zip(archive_path: &Path) -> UpdateResult<()> {
    let mut archive = ZipArchive::new(File::open(archive_path)?)?;
    let mut links = LinkTable::default();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let name = entry.name().to_string();
        let Some(path) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            return Err(UpdateError::PathTraversalDetected(name));
        };
        let member = links.member(&path)?;

        if is_symlink_mode(entry.unix_mode()) {
            let mut target = String::new();
            entry.read_to_string(&mut target)?;
            links.add_symlink(member, PathBuf::from(target));
        }
    }

    links.check_targets()
}

/// Fail unless `path`, with every link on the way followed, is under `root`.
fn ensure_inside(root: &Path, path: &Path) -> UpdateResult<()> {
    let resolved = fs::canonicalize(path)?;
    if resolved.starts_with(root) {
        Ok(())
    } else {
        Err(UpdateError::PathTraversalDetected(path.display().to_string()))
    }
}

fn remove_existing(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn write_symlink(target: &str, link: &Path) -> io::Result<()> {
    remove_existing(link)?;
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn write_symlink(target: &str, link: &Path) -> io::Result<()> {
    remove_existing(link)?;
    fs::write(link, target)
}

/// Extract a zip archive into `dest`, reapplying stored Unix permission
/// bits and recreating symlinks.
pub fn extract_zip(archive_path: &Path, dest: &Path) -> UpdateResult<()> {
    validate_zip(archive_path)?;

    fs::create_dir_all(dest)?;
    let root = fs::canonicalize(dest)?;
    let mut archive = ZipArchive::new(File::open(archive_path)?)?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let Some(relative) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            return Err(UpdateError::PathTraversalDetected(entry.name().to_string()));
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            ensure_inside(&root, &out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
            ensure_inside(&root, parent)?;
        }

        let mode = entry.unix_mode();
        if is_symlink_mode(mode) {
            let mut target = String::new();
            entry.read_to_string(&mut target)?;
            write_symlink(&target, &out_path)?;
            continue;
        }

        remove_existing(&out_path)?;
        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = mode {
                fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o7777))?;
            }
        }
    }

    debug!(members = archive.len(), dest = %dest.display(), "zip extracted");
    Ok(())
}
