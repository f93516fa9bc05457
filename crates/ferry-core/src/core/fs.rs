use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

/// A bare git directory has an `objects` directory and a `HEAD` that is not a
/// directory. Symlinks are followed.
pub(crate) fn is_git_dir(path: &Path) -> bool {
    let objects_is_dir = fs::metadata(path.join("objects")).is_ok_and(|meta| meta.is_dir());
    let head_is_file = fs::metadata(path.join("HEAD")).is_ok_and(|meta| !meta.is_dir());
    objects_is_dir && head_is_file
}

/// Entries that could not be copied while the rest of the tree was.
#[derive(Debug, Clone, Default, Serialize)]
pub(crate) struct CopySummary {
    pub(crate) files: usize,
    pub(crate) dirs: usize,
    pub(crate) skipped: Vec<SkippedEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SkippedEntry {
    pub(crate) path: PathBuf,
    pub(crate) error: String,
}

impl CopySummary {
    fn absorb(&mut self, other: CopySummary) {
        self.files += other.files;
        self.dirs += other.dirs;
        self.skipped.extend(other.skipped);
    }

    fn skip(&mut self, path: &Path, err: &anyhow::Error) {
        tracing::warn!(path = %path.display(), error = %format!("{err:#}"), "skipping entry during copy");
        self.skipped.push(SkippedEntry {
            path: path.to_path_buf(),
            error: format!("{err:#}"),
        });
    }
}

/// Copies the bytes of `src` to `dst` and applies the permission bits of
/// `src` to the copy.
pub(crate) fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    fs::copy(src, dst)
        .with_context(|| format!("failed to copy {} to {}", src.display(), dst.display()))?;
    let perms = fs::metadata(src)
        .with_context(|| format!("failed to stat {}", src.display()))?
        .permissions();
    fs::set_permissions(dst, perms)
        .with_context(|| format!("failed to set permissions on {}", dst.display()))?;
    Ok(())
}

/// Recursively copies the directory `src` into `dst`.
///
/// Failing to stat `src`, create `dst` or list `src` is an error. A file or
/// subdirectory that cannot be copied is logged and recorded in the returned
/// summary, and the walk continues with its siblings.
pub(crate) fn copy_tree(src: &Path, dst: &Path) -> Result<CopySummary> {
    let meta = fs::metadata(src).with_context(|| format!("failed to stat {}", src.display()))?;
    fs::create_dir_all(dst)
        .with_context(|| format!("failed to create directory {}", dst.display()))?;
    let entries =
        fs::read_dir(src).with_context(|| format!("failed to read directory {}", src.display()))?;

    let mut summary = CopySummary {
        dirs: 1,
        ..CopySummary::default()
    };
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                summary.skip(src, &anyhow::Error::new(err).context("failed to read entry"));
                continue;
            }
        };
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let is_dir = entry.file_type().is_ok_and(|kind| kind.is_dir());
        if is_dir {
            match copy_tree(&from, &to) {
                Ok(nested) => summary.absorb(nested),
                Err(err) => summary.skip(&from, &err),
            }
        } else {
            match copy_file(&from, &to) {
                Ok(()) => summary.files += 1,
                Err(err) => summary.skip(&from, &err),
            }
        }
    }

    // Applied last so a read-only source directory does not block its own copy.
    fs::set_permissions(dst, meta.permissions())
        .with_context(|| format!("failed to set permissions on {}", dst.display()))?;
    Ok(summary)
}

/// Creates `path` and its parents, restricting `path` itself to its owner.
pub(crate) fn create_private_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o700))
            .with_context(|| format!("failed to restrict permissions on {}", path.display()))?;
    }
    Ok(())
}
