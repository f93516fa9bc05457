use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const DEFAULT_SERVER_NAME: &str = "Ferry";
pub const DEFAULT_SSH_LISTEN_ADDR: &str = ":23231";
pub const DEFAULT_SSH_PUBLIC_URL: &str = "ssh://localhost:23231";
pub const DEFAULT_HOST_KEY_NAME: &str = "ferry_host_ed25519";

/// Configuration of the target server, written once as `<data>/config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfiguration {
    pub name: String,
    #[serde(skip)]
    pub data_path: PathBuf,
    pub ssh: SshSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshSettings {
    pub listen_addr: String,
    pub public_url: String,
    pub key_path: PathBuf,
}

impl TargetConfiguration {
    #[must_use]
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        let data_path = data_path.into();
        let key_path = data_path.join("ssh").join(DEFAULT_HOST_KEY_NAME);
        Self {
            name: DEFAULT_SERVER_NAME.to_string(),
            data_path,
            ssh: SshSettings {
                listen_addr: DEFAULT_SSH_LISTEN_ADDR.to_string(),
                public_url: DEFAULT_SSH_PUBLIC_URL.to_string(),
                key_path,
            },
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.data_path.join("config.yaml")
    }

    pub fn repos_dir(&self) -> PathBuf {
        self.data_path.join("repos")
    }

    pub fn ssh_dir(&self) -> PathBuf {
        self.data_path.join("ssh")
    }

    pub fn database_file(&self) -> PathBuf {
        self.data_path.join("ferry.db")
    }

    /// On-disk location of an imported repository.
    pub fn repo_dir(&self, name: &str) -> PathBuf {
        self.repos_dir().join(format!("{name}.git"))
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }
}
