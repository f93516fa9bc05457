//! Repository name normalization shared by the importer and the backend.

use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepoNameError {
    #[error("repository name cannot be empty")]
    Empty,
    #[error("repository name `{0}` contains characters other than letters, digits, `-`, `_`, `.` and `/`")]
    InvalidCharacter(String),
    #[error("repository name `{0}` cannot start with `-`")]
    LeadingDash(String),
    #[error("repository name `{0}` cannot contain `..` components")]
    ParentComponent(String),
}

/// Normalizes a repository name: strips surrounding whitespace and a leading
/// `/`, cleans the path lexically and drops a trailing `.git`.
///
/// `"/group//proj.git"` becomes `"group/proj"`.
#[must_use]
pub fn sanitize_repo(raw: &str) -> String {
    let raw = raw.trim().replace('\\', "/");
    let trimmed = raw.strip_prefix('/').unwrap_or(&raw);
    let cleaned = clean_path(Path::new(trimmed))
        .to_string_lossy()
        .replace('\\', "/");
    if let Some(stem) = cleaned.strip_suffix(".git") {
        return stem.to_string();
    }
    cleaned
}

pub fn validate_repo(name: &str) -> Result<(), RepoNameError> {
    if name.is_empty() || name == "." {
        return Err(RepoNameError::Empty);
    }
    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
    {
        return Err(RepoNameError::InvalidCharacter(name.to_string()));
    }
    if name.starts_with('-') {
        return Err(RepoNameError::LeadingDash(name.to_string()));
    }
    if name.split('/').any(|part| part == "..") {
        return Err(RepoNameError::ParentComponent(name.to_string()));
    }
    Ok(())
}

/// Lexically normalizes a path without touching the filesystem: collapses
/// repeated separators, drops `.` and resolves `..` against preceding
/// elements. A `..` that cannot be resolved is kept on relative paths and
/// dropped at the root.
#[must_use]
pub fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    cleaned.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    cleaned.pop();
                } else if !cleaned.has_root() {
                    cleaned.push("..");
                }
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    if cleaned.as_os_str().is_empty() {
        cleaned.push(".");
    }
    cleaned
}
