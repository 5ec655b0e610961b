use std::fs;
use std::io;
use std::path::Path;

use log::debug;
use walkdir::WalkDir;

type TransferFn = fn(&Path, &Path) -> io::Result<()>;

/// Ways to move a file or directory, tried in order until one succeeds.
/// `rename` fails across filesystems; `copy` then deletes the source.
pub const TRANSFER_STRATEGIES: &[(&str, TransferFn)] =
    &[("rename", rename_entry), ("copy", copy_then_remove)];

/// Move `from` to `to`. The destination must not exist.
pub fn move_entry(from: &Path, to: &Path) -> Result<(), String> {
    let mut failures = Vec::new();
    for (name, strategy) in TRANSFER_STRATEGIES {
        match strategy(from, to) {
            Ok(()) => {
                if !failures.is_empty() {
                    debug!(
                        "transfer: moved {} via {name} after {}",
                        from.display(),
                        failures.join("; ")
                    );
                }
                return Ok(());
            }
            Err(err) => failures.push(format!("{name}: {err}")),
        }
    }
    Err(format!(
        "cannot move {} to {} ({})",
        from.display(),
        to.display(),
        failures.join("; ")
    ))
}

/// Remove `to` if present, then move `from` over it.
pub fn replace_entry(from: &Path, to: &Path) -> Result<(), String> {
    if exists(to) {
        remove_path(to).map_err(|e| format!("cannot remove {}: {e}", to.display()))?;
    }
    move_entry(from, to)
}

/// True for anything at `path`, including dangling symlinks.
pub fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Delete a file, symlink or directory tree.
pub fn remove_path(path: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(path)?;
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn rename_entry(from: &Path, to: &Path) -> io::Result<()> {
    fs::rename(from, to)
}

fn copy_then_remove(from: &Path, to: &Path) -> io::Result<()> {
    if let Err(err) = copy_tree(from, to) {
        // Leave the source intact; drop the partial copy.
        let _ = remove_path(to);
        return Err(err);
    }
    // The copy is complete; a partly removed source must not be taken for the original.
    remove_path(from).map_err(|err| {
        io::Error::new(
            err.kind(),
            format!(
                "copied to {} but could not remove the source: {err}",
                to.display()
            ),
        )
    })
}

/// Recursively copy `from` to `to`, recreating symlinks instead of following them.
pub fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    for entry in WalkDir::new(from).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(io::Error::other)?;
        let dest = if relative.as_os_str().is_empty() {
            to.to_path_buf()
        } else {
            to.join(relative)
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&dest)?;
            continue;
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        if file_type.is_symlink() {
            copy_symlink(entry.path(), &dest)?;
        } else {
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dest: &Path) -> io::Result<()> {
    let target = fs::read_link(src)?;
    std::os::unix::fs::symlink(target, dest)
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dest: &Path) -> io::Result<()> {
    fs::copy(src, dest).map(|_| ())
}
