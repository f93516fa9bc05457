//! Write interface of the target server's store.
//!
//! Migration only ever writes through [`Backend`]; every method is a single
//! atomic operation so a failed call leaves nothing half applied.

use std::path::PathBuf;

use ferry_domain::{AccessLevel, KeyParseError, RepoNameError, UsernameError};

pub mod sqlite;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryOptions {
    pub project_name: Option<String>,
    pub description: Option<String>,
    pub private: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserOptions {
    pub admin: bool,
    pub public_keys: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error(transparent)]
    InvalidRepoName(#[from] RepoNameError),
    #[error(transparent)]
    InvalidUsername(#[from] UsernameError),
    #[error(transparent)]
    InvalidKey(#[from] KeyParseError),
    #[error("repository `{0}` already exists")]
    RepoExists(String),
    #[error("repository `{0}` not found")]
    RepoNotFound(String),
    #[error("user `{0}` already exists")]
    UserExists(String),
    #[error("public key is already registered to user `{0}`")]
    KeyInUse(String),
    #[error("failed to initialize repository at {path}: {source}")]
    Git {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },
    #[error("failed to create directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("backend store error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub trait Backend {
    fn set_allow_keyless(&mut self, allow: bool) -> Result<(), BackendError>;

    fn set_anon_access(&mut self, level: AccessLevel) -> Result<(), BackendError>;

    /// Registers a repository, initializing an empty bare repository on disk
    /// when none exists yet.
    fn create_repository(
        &mut self,
        name: &str,
        options: RepositoryOptions,
    ) -> Result<(), BackendError>;

    fn set_project_name(&mut self, repo: &str, project_name: &str) -> Result<(), BackendError>;

    fn set_description(&mut self, repo: &str, description: &str) -> Result<(), BackendError>;

    fn set_private(&mut self, repo: &str, private: bool) -> Result<(), BackendError>;

    /// Grants `username` access to `repo`. The user does not have to exist
    /// yet; the grant applies once it is created.
    fn add_collaborator(&mut self, repo: &str, username: &str) -> Result<(), BackendError>;

    /// Creates a user together with all of its keys.
    fn create_user(&mut self, username: &str, options: UserOptions) -> Result<(), BackendError>;
}
