use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use ferry_domain::{clean_path, sanitize_repo, TargetConfiguration};

use super::report::MigrationReport;
use crate::backend::{Backend, RepositoryOptions};
use crate::fs::{copy_tree, create_private_dir, is_git_dir};

/// Copies every bare repository under `repos_root` into the data directory
/// and registers it with the backend.
///
/// Only listing `repos_root` and creating the destination root are fatal.
/// Each repository is copied and registered independently.
pub(crate) fn import_repositories(
    repos_root: &Path,
    target: &TargetConfiguration,
    backend: &mut dyn Backend,
    report: &mut MigrationReport,
) -> Result<()> {
    let listing = fs::read_dir(repos_root).with_context(|| {
        format!(
            "failed to read legacy repositories root {}",
            repos_root.display()
        )
    })?;
    let mut entries = readable_entries(repos_root, listing, report);
    entries.sort_by_key(fs::DirEntry::file_name);

    for entry in entries {
        let path = entry.path();
        if !entry.file_type().is_ok_and(|kind| kind.is_dir()) {
            tracing::debug!(path = %path.display(), "skipping non-directory entry");
            continue;
        }
        if !is_git_dir(&path) {
            tracing::debug!(path = %path.display(), "skipping directory without a git layout");
            continue;
        }

        create_private_dir(&target.repos_dir())?;

        let name = sanitize_repo(&entry.file_name().to_string_lossy());
        let source = clean_path(&path);
        let destination = target.repo_dir(&name);
        tracing::info!(repo = %name, "importing repository");

        match copy_tree(&source, &destination) {
            Ok(summary) => {
                tracing::debug!(
                    repo = %name,
                    files = summary.files,
                    dirs = summary.dirs,
                    "copied repository"
                );
                for skipped in &summary.skipped {
                    report.failed(
                        format!("{name}:{}", skipped.path.display()),
                        "copy-entry",
                        &skipped.error,
                    );
                }
                report.applied(name.as_str(), "copy");
            }
            Err(err) => {
                report.failed(name.as_str(), "copy", &format!("{err:#}"));
                continue;
            }
        }

        match backend.create_repository(&name, RepositoryOptions::default()) {
            Ok(()) => {
                report.applied(name.as_str(), "register");
                report.imported_repos.push(name);
            }
            Err(err) => report.failed(name.as_str(), "register", &err),
        }
    }
    Ok(())
}

/// Keeps the entries that could be read and records the rest as failures.
fn readable_entries(
    repos_root: &Path,
    listing: impl Iterator<Item = io::Result<fs::DirEntry>>,
    report: &mut MigrationReport,
) -> Vec<fs::DirEntry> {
    let mut entries = Vec::new();
    for entry in listing {
        match entry {
            Ok(entry) => entries.push(entry),
            Err(err) => {
                tracing::warn!(
                    root = %repos_root.display(),
                    error = %err,
                    "skipping unreadable entry in repositories root"
                );
                report.failed(repos_root.display().to_string(), "list-entry", &err);
            }
        }
    }
    entries
}
