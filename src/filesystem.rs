//! On-disk helpers shared by the materializer, checkpoint store and backups.
//!
//! Every replacement of a file or directory goes through a rename, so a
//! reader sees either the old content or the new content, never a mix.
//! Renames require source and destination on the same filesystem; the
//! workspace keeps its scratch and backup areas under the meta-repository
//! root for that reason.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::Result;

/// Write `content` to `path` via a temporary file in the same directory.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Whether `name` is usable as a single directory entry under a store.
///
/// Rejects empty names, hidden names (which covers `.` and `..`) and
/// anything containing a path separator.
pub fn is_plain_name(name: &str) -> bool {
    !(name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']))
}

/// Remove a file or directory tree. Missing paths are not an error.
pub fn remove_path(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path)?,
        Ok(_) => fs::remove_file(path)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Whether anything (file, directory or dangling symlink) exists at `path`.
pub fn path_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Recursively copy `src` into `dst`, preserving symlinks on unix.
///
/// `dst` is created if missing. File permissions are carried over by
/// `fs::copy`.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;

    for entry in WalkDir::new(src).follow_links(false).min_depth(1) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let link = fs::read_link(src)?;
    std::os::unix::fs::symlink(link, dst)?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    fs::copy(src, dst)?;
    Ok(())
}

/// A path next to `target` that does not exist yet.
pub fn sibling_path(target: &Path, tag: &str) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dir".to_string());
    let parent = target.parent().unwrap_or_else(|| Path::new("."));

    let mut counter = 0u32;
    loop {
        let candidate = parent.join(format!(".{}.{}-{}-{}", name, tag, std::process::id(), counter));
        if !path_exists(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Move the directory `staged` to `target`, replacing whatever is there.
///
/// The previous tree is renamed aside first and put back if the second
/// rename fails, so `target` is never left missing on error.
pub fn swap_into_place(staged: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    if !path_exists(target) {
        fs::rename(staged, target)?;
        return Ok(());
    }

    let aside = sibling_path(target, "old");
    fs::rename(target, &aside)?;

    if let Err(e) = fs::rename(staged, target) {
        if let Err(restore_err) = fs::rename(&aside, target) {
            log::error!(
                "Could not move {} back to {}: {}",
                aside.display(),
                target.display(),
                restore_err
            );
        }
        return Err(e.into());
    }

    if let Err(e) = remove_path(&aside) {
        log::warn!("Could not remove old tree {}: {}", aside.display(), e);
    }
    Ok(())
}

/// Replace `dst` with a fresh copy of `src`.
///
/// The copy is staged next to `dst` and swapped in, so a failed copy leaves
/// `dst` untouched.
pub fn replace_dir_with_copy(src: &Path, dst: &Path) -> Result<()> {
    let staging = sibling_path(dst, "restore");
    if let Err(e) = copy_dir_recursive(src, &staging) {
        let _ = remove_path(&staging);
        return Err(e);
    }
    swap_into_place(&staging, dst)
}
