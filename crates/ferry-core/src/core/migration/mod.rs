//! One-shot migration of a legacy installation (`ferry migrate-config`).

mod apply;
mod import;
mod plan;
mod populate;
mod report;

pub use apply::migrate_config;
pub use plan::MigrateConfigRequest;
pub use report::{MigrationPhase, MigrationReport, StepOutcome, StepRecord};

#[cfg(test)]
pub(crate) mod testing {
    use ferry_domain::{sanitize_repo, AccessLevel};

    use crate::backend::{Backend, BackendError, RepositoryOptions, UserOptions};

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Call {
        SetAllowKeyless(bool),
        SetAnonAccess(AccessLevel),
        CreateRepository(String),
        SetProjectName(String, String),
        SetDescription(String, String),
        SetPrivate(String, bool),
        AddCollaborator(String, String),
        CreateUser(String, UserOptions),
    }

    /// In-memory backend that records every call and fails on unknown
    /// repositories and duplicate users the way a real store does.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingBackend {
        pub(crate) repositories: Vec<String>,
        pub(crate) users: Vec<String>,
        pub(crate) fail_repositories: Vec<String>,
        pub(crate) fail_settings: bool,
        pub(crate) calls: Vec<Call>,
    }

    impl RecordingBackend {
        fn require_repo(&self, repo: &str) -> Result<(), BackendError> {
            if self.repositories.iter().any(|r| r == repo) {
                Ok(())
            } else {
                Err(BackendError::RepoNotFound(repo.to_string()))
            }
        }

        fn settings_result(&self) -> Result<(), BackendError> {
            if self.fail_settings {
                Err(BackendError::Database(rusqlite::Error::InvalidQuery))
            } else {
                Ok(())
            }
        }
    }

    impl Backend for RecordingBackend {
        fn set_allow_keyless(&mut self, allow: bool) -> Result<(), BackendError> {
            self.calls.push(Call::SetAllowKeyless(allow));
            self.settings_result()
        }

        fn set_anon_access(&mut self, level: AccessLevel) -> Result<(), BackendError> {
            self.calls.push(Call::SetAnonAccess(level));
            self.settings_result()
        }

        fn create_repository(
            &mut self,
            name: &str,
            _options: RepositoryOptions,
        ) -> Result<(), BackendError> {
            let name = sanitize_repo(name);
            self.calls.push(Call::CreateRepository(name.clone()));
            if self.fail_repositories.contains(&name) || self.repositories.contains(&name) {
                return Err(BackendError::RepoExists(name));
            }
            self.repositories.push(name);
            Ok(())
        }

        fn set_project_name(&mut self, repo: &str, project_name: &str) -> Result<(), BackendError> {
            self.calls
                .push(Call::SetProjectName(repo.to_string(), project_name.to_string()));
            self.require_repo(repo)
        }

        fn set_description(&mut self, repo: &str, description: &str) -> Result<(), BackendError> {
            self.calls
                .push(Call::SetDescription(repo.to_string(), description.to_string()));
            self.require_repo(repo)
        }

        fn set_private(&mut self, repo: &str, private: bool) -> Result<(), BackendError> {
            self.calls.push(Call::SetPrivate(repo.to_string(), private));
            self.require_repo(repo)
        }

        fn add_collaborator(&mut self, repo: &str, username: &str) -> Result<(), BackendError> {
            self.calls
                .push(Call::AddCollaborator(repo.to_string(), username.to_string()));
            self.require_repo(repo)
        }

        fn create_user(&mut self, username: &str, options: UserOptions) -> Result<(), BackendError> {
            self.calls
                .push(Call::CreateUser(username.to_string(), options));
            if self.users.iter().any(|u| u == username) {
                return Err(BackendError::UserExists(username.to_string()));
            }
            self.users.push(username.to_string());
            Ok(())
        }
    }
}
