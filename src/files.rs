//! File-system helpers: output directories, asset copies, text includes.
//!
//! Asset copies replace their target outright, so a stylesheet deleted from
//! the source tree also disappears from the output.

use crate::error::MdPressError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Create `dir` and its parents if missing.
pub fn ensure_dir(dir: &Path) -> Result<(), MdPressError> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|source| MdPressError::OutputWriteFailed {
        path: dir.to_path_buf(),
        source,
    })
}

/// Create the parent directory of `path` if missing.
pub fn ensure_parent(path: &Path) -> Result<(), MdPressError> {
    match path.parent() {
        Some(parent) => ensure_dir(parent),
        None => Ok(()),
    }
}

/// Copy the tree at `dir` to `<dest>/<dir>`, replacing whatever was there.
///
/// Copying a directory onto itself is a no-op. A target that contains the
/// source, or lies inside it, is refused before anything is removed.
/// Returns the target directory.
pub fn copy_dir(dir: &Path, dest: &Path) -> Result<PathBuf, MdPressError> {
    let target = dest.join(relative_name(dir));
    ensure_dir(dest)?;

    let real_source = canonical(dir, dir, &target)?;
    let real_target = match fs::canonicalize(&target) {
        Ok(path) => path,
        Err(_) => canonical(dest, dir, &target)?.join(relative_name(dir)),
    };
    if real_target == real_source {
        info!("{} is already in place", target.display());
        return Ok(target);
    }
    if real_source.starts_with(&real_target) || real_target.starts_with(&real_source) {
        return Err(MdPressError::CopyOverlap {
            from: dir.to_path_buf(),
            to: target,
        });
    }

    if target.exists() {
        debug!("Removing stale {}", target.display());
        fs::remove_dir_all(&target).map_err(|source| MdPressError::CopyFailed {
            from: dir.to_path_buf(),
            to: target.clone(),
            source,
        })?;
    }

    info!("Copying {} to {}", dir.display(), target.display());
    copy_tree(dir, &target).map_err(|source| MdPressError::CopyFailed {
        from: dir.to_path_buf(),
        to: target.clone(),
        source,
    })?;
    Ok(target)
}

/// Copy `file` into `dest`, named `new_name` or the file's own name.
///
/// An existing target is replaced; a target that is `file` itself is left
/// alone. Returns the target path.
pub fn copy_file(
    file: &Path,
    dest: &Path,
    new_name: Option<&Path>,
) -> Result<PathBuf, MdPressError> {
    let name = new_name.unwrap_or_else(|| relative_name(file));
    let target = dest.join(name);
    let real_source = canonical(file, file, &target)?;

    info!("Copying {} to {}", file.display(), target.display());
    ensure_parent(&target)?;
    if target.exists() {
        if fs::canonicalize(&target).is_ok_and(|t| t == real_source) {
            info!("{} is already in place", target.display());
            return Ok(target);
        }
        fs::remove_file(&target).map_err(|source| MdPressError::CopyFailed {
            from: file.to_path_buf(),
            to: target.clone(),
            source,
        })?;
    }
    fs::copy(file, &target).map_err(|source| MdPressError::CopyFailed {
        from: file.to_path_buf(),
        to: target.clone(),
        source,
    })?;
    Ok(target)
}

/// Replace every occurrence of `variable` in `infile` with `text`.
///
/// Writes to `outfile`, or back to `infile` when `None`. Returns the path
/// written.
pub fn include_in_file(
    infile: &Path,
    variable: &str,
    text: &str,
    outfile: Option<&Path>,
) -> Result<PathBuf, MdPressError> {
    let outfile = outfile.unwrap_or(infile).to_path_buf();
    info!("Including text in {}", outfile.display());

    let content =
        fs::read_to_string(infile).map_err(|e| MdPressError::from_source_io(infile, e))?;
    let replaced = content.replace(variable, text);

    ensure_parent(&outfile)?;
    fs::write(&outfile, replaced).map_err(|source| MdPressError::OutputWriteFailed {
        path: outfile.clone(),
        source,
    })?;
    debug!(
        "{} replaced by {} bytes: in {} out {}",
        variable,
        text.len(),
        infile.display(),
        outfile.display()
    );
    Ok(outfile)
}

/// Write `content` to `path`, creating the parent directory.
pub fn write_file(path: &Path, content: &str) -> Result<(), MdPressError> {
    ensure_parent(path)?;
    fs::write(path, content).map_err(|source| MdPressError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    })
}

/// `dir` without a leading `./`; absolute paths keep only their last component.
fn relative_name(path: &Path) -> &Path {
    let stripped = path.strip_prefix("./").unwrap_or(path);
    if stripped.is_absolute() {
        stripped
            .file_name()
            .map(Path::new)
            .unwrap_or(stripped)
    } else {
        stripped
    }
}

fn canonical(path: &Path, from: &Path, to: &Path) -> Result<PathBuf, MdPressError> {
    fs::canonicalize(path).map_err(|source| MdPressError::CopyFailed {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })
}

fn copy_tree(from: &Path, to: &Path) -> std::io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let src = entry.path();
        let dst = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&src, &dst)?;
        } else {
            fs::copy(&src, &dst)?;
        }
    }
    Ok(())
}
