use std::path::PathBuf;

use crate::config::{MigrationEnv, DEFAULT_DATA_PATH};

/// Inputs given on the command line. Unset fields fall back to the
/// environment.
#[derive(Clone, Debug, Default)]
pub struct MigrateConfigRequest {
    pub key_path: Option<PathBuf>,
    pub repos_path: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub config_repo: Option<PathBuf>,
    pub data_path: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct MigrationPlan {
    pub(crate) key_path: Option<PathBuf>,
    pub(crate) repos_path: Option<PathBuf>,
    pub(crate) bind_address: Option<String>,
    pub(crate) config_repo: PathBuf,
    pub(crate) data_path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum PlanError {
    #[error("legacy SSH host key {} does not exist", .0.display())]
    MissingHostKey(PathBuf),
    #[error("legacy repositories root {} is not a directory", .0.display())]
    MissingReposRoot(PathBuf),
}

impl PlanError {
    pub(crate) fn reason(&self) -> &'static str {
        match self {
            PlanError::MissingHostKey(_) => "missing_host_key",
            PlanError::MissingReposRoot(_) => "missing_repos_root",
        }
    }

    pub(crate) fn hint(&self) -> &'static str {
        match self {
            PlanError::MissingHostKey(_) => {
                "Point --key-path (or FERRY_LEGACY_KEY_PATH) at the legacy server's private host key."
            }
            PlanError::MissingReposRoot(_) => {
                "Point --repos-path (or FERRY_LEGACY_REPO_PATH) at the directory holding the legacy bare repositories."
            }
        }
    }
}

fn non_empty_path(path: Option<&PathBuf>) -> Option<PathBuf> {
    path.filter(|p| !p.as_os_str().is_empty()).cloned()
}

impl MigrationPlan {
    pub(crate) fn resolve(request: &MigrateConfigRequest, env: &MigrationEnv) -> Self {
        let key_path = non_empty_path(request.key_path.as_ref()).or_else(|| env.key_path.clone());
        let repos_path =
            non_empty_path(request.repos_path.as_ref()).or_else(|| env.repos_path.clone());
        let bind_address = request
            .bind_address
            .clone()
            .filter(|addr| !addr.trim().is_empty())
            .or_else(|| env.bind_address.clone());
        let config_repo = non_empty_path(request.config_repo.as_ref())
            .or_else(|| env.config_repo.clone())
            .unwrap_or_else(|| match &repos_path {
                Some(root) => root.join("config"),
                None => PathBuf::from("config"),
            });
        let data_path = non_empty_path(request.data_path.as_ref())
            .or_else(|| env.data_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH));
        Self {
            key_path,
            repos_path,
            bind_address,
            config_repo,
            data_path,
        }
    }

    /// Rejects inputs that point at nothing before any work starts.
    pub(crate) fn validate(&self) -> Result<(), PlanError> {
        if let Some(key) = &self.key_path {
            if !key.is_file() {
                return Err(PlanError::MissingHostKey(key.clone()));
            }
        }
        if let Some(root) = &self.repos_path {
            if !root.is_dir() {
                return Err(PlanError::MissingReposRoot(root.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_values_win_over_environment() {
        let env = MigrationEnv {
            key_path: Some(PathBuf::from("/env/key")),
            repos_path: Some(PathBuf::from("/env/repos")),
            bind_address: Some(":1".to_string()),
            config_repo: None,
            data_path: Some(PathBuf::from("/env/data")),
        };
        let request = MigrateConfigRequest {
            repos_path: Some(PathBuf::from("/cli/repos")),
            bind_address: Some(":2222".to_string()),
            ..MigrateConfigRequest::default()
        };
        let plan = MigrationPlan::resolve(&request, &env);
        assert_eq!(plan.key_path, Some(PathBuf::from("/env/key")));
        assert_eq!(plan.repos_path, Some(PathBuf::from("/cli/repos")));
        assert_eq!(plan.bind_address.as_deref(), Some(":2222"));
        assert_eq!(plan.config_repo, PathBuf::from("/cli/repos/config"));
        assert_eq!(plan.data_path, PathBuf::from("/env/data"));
    }

    #[test]
    fn defaults_without_any_input() {
        let request = MigrateConfigRequest {
            bind_address: Some(String::new()),
            key_path: Some(PathBuf::new()),
            ..MigrateConfigRequest::default()
        };
        let plan = MigrationPlan::resolve(&request, &MigrationEnv::default());
        assert_eq!(plan.key_path, None);
        assert_eq!(plan.bind_address, None);
        assert_eq!(plan.config_repo, PathBuf::from("config"));
        assert_eq!(plan.data_path, PathBuf::from(DEFAULT_DATA_PATH));
    }

    #[test]
    fn explicit_config_repo_is_kept() {
        let env = MigrationEnv {
            repos_path: Some(PathBuf::from("/legacy/repos")),
            config_repo: Some(PathBuf::from("/elsewhere/config.git")),
            ..MigrationEnv::default()
        };
        let plan = MigrationPlan::resolve(&MigrateConfigRequest::default(), &env);
        assert_eq!(plan.config_repo, PathBuf::from("/elsewhere/config.git"));
    }

    #[test]
    fn validate_flags_missing_inputs() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut plan =
            MigrationPlan::resolve(&MigrateConfigRequest::default(), &MigrationEnv::default());
        assert!(plan.validate().is_ok());

        plan.key_path = Some(temp.path().join("missing_key"));
        let err = plan.validate().expect_err("missing key");
        assert_eq!(err.reason(), "missing_host_key");

        plan.key_path = None;
        plan.repos_path = Some(temp.path().join("missing_repos"));
        let err = plan.validate().expect_err("missing repos");
        assert_eq!(err.reason(), "missing_repos_root");
    }
}
