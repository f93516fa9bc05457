use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const KEY_PATH_ENV: &str = "FERRY_LEGACY_KEY_PATH";
pub const REPO_PATH_ENV: &str = "FERRY_LEGACY_REPO_PATH";
pub const BIND_ADDRESS_ENV: &str = "FERRY_LEGACY_BIND_ADDRESS";
pub const CONFIG_REPO_ENV: &str = "FERRY_LEGACY_CONFIG_REPO";
pub const DATA_PATH_ENV: &str = "FERRY_DATA_PATH";
pub const TIMINGS_ENV: &str = "FERRY_TIMINGS";

pub const DEFAULT_DATA_PATH: &str = "data";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalOptions {
    pub quiet: bool,
    pub verbose: u8,
    pub trace: bool,
    pub json: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub(crate) fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    /// Returns the value of `key`, treating empty values as unset.
    pub(crate) fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    pub(crate) fn path(&self, key: &str) -> Option<PathBuf> {
        self.var(key).map(PathBuf::from)
    }

    #[cfg(test)]
    pub(crate) fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

#[derive(Debug)]
pub struct Config {
    pub(crate) migration: MigrationEnv,
}

/// Migration inputs taken from the environment. Command-line values take
/// precedence over these.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationEnv {
    pub key_path: Option<PathBuf>,
    pub repos_path: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub config_repo: Option<PathBuf>,
    pub data_path: Option<PathBuf>,
}

impl Config {
    /// Builds a configuration snapshot from the current process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_snapshot(&EnvSnapshot::capture())
    }

    pub(crate) fn from_snapshot(snapshot: &EnvSnapshot) -> Self {
        Self {
            migration: MigrationEnv {
                key_path: snapshot.path(KEY_PATH_ENV),
                repos_path: snapshot.path(REPO_PATH_ENV),
                bind_address: snapshot.var(BIND_ADDRESS_ENV).map(ToOwned::to_owned),
                config_repo: snapshot.path(CONFIG_REPO_ENV),
                data_path: snapshot.path(DATA_PATH_ENV),
            },
        }
    }

    #[must_use]
    pub fn migration(&self) -> &MigrationEnv {
        &self.migration
    }
}
