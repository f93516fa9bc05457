//! Document model of the legacy server configuration.
//!
//! The legacy server kept a single `config.yaml` (or `config.json`) at the root
//! of its `config` repository. Every key is optional; missing keys decode to
//! their empty value so partially filled documents still migrate.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigEncoding {
    Yaml,
    Json,
}

impl ConfigEncoding {
    /// Entry names probed in the config store, in lookup order.
    pub const LOOKUP_ORDER: [ConfigEncoding; 2] = [ConfigEncoding::Yaml, ConfigEncoding::Json];

    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            ConfigEncoding::Yaml => "config.yaml",
            ConfigEncoding::Json => "config.json",
        }
    }
}

impl fmt::Display for ConfigEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConfigEncoding::Yaml => "yaml",
            ConfigEncoding::Json => "json",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to parse legacy YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to parse legacy JSON config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LegacyConfig {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub host: String,
    #[serde(deserialize_with = "null_as_default")]
    pub port: u16,
    #[serde(deserialize_with = "null_as_default")]
    pub anon_access: String,
    #[serde(deserialize_with = "null_as_default")]
    pub allow_keyless: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub users: Vec<LegacyUser>,
    #[serde(deserialize_with = "null_as_default")]
    pub repos: Vec<LegacyRepoConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LegacyUser {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub admin: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub public_keys: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub collab_repos: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LegacyRepoConfig {
    /// Display name shown by the legacy server.
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    /// Repository identifier, matching the directory name on disk.
    #[serde(deserialize_with = "null_as_default")]
    pub repo: String,
    #[serde(deserialize_with = "null_as_default")]
    pub note: String,
    #[serde(deserialize_with = "null_as_default")]
    pub private: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub readme: String,
    #[serde(deserialize_with = "null_as_default")]
    pub collabs: Vec<String>,
}

impl LegacyConfig {
    /// Decodes a legacy document in the given encoding.
    pub fn decode(encoding: ConfigEncoding, bytes: &[u8]) -> Result<Self, DecodeError> {
        match encoding {
            ConfigEncoding::Yaml => {
                // An empty YAML document carries no keys at all.
                if bytes.iter().all(u8::is_ascii_whitespace) {
                    return Ok(Self::default());
                }
                Ok(serde_yaml::from_slice(bytes)?)
            }
            ConfigEncoding::Json => Ok(serde_json::from_slice(bytes)?),
        }
    }

    /// The `ssh://host:port` address clients used to reach the legacy server.
    #[must_use]
    pub fn public_url(&self) -> String {
        format!("ssh://{}:{}", self.host, self.port)
    }
}

// Keys written with no value (`users:` in YAML, `null` in JSON) take their
// empty value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
name: Legacy Soft
host: example.com
port: 2222
anon-access: read-only
allow-keyless: true
users:
  - name: Jane Doe
    admin: true
    public-keys:
      - ssh-ed25519 AAAA jane
    collab-repos:
      - dotfiles
repos:
  - name: Dot Files
    repo: dotfiles
    note: my dotfiles
    private: true
    collabs:
      - bob
"#;

    #[test]
    fn decodes_kebab_case_yaml() {
        let config = LegacyConfig::decode(ConfigEncoding::Yaml, YAML.as_bytes()).expect("decode");
        assert_eq!(config.name, "Legacy Soft");
        assert_eq!(config.port, 2222);
        assert_eq!(config.anon_access, "read-only");
        assert!(config.allow_keyless);
        assert_eq!(config.users.len(), 1);
        assert_eq!(config.users[0].collab_repos, vec!["dotfiles".to_string()]);
        assert_eq!(config.repos[0].repo, "dotfiles");
        assert!(config.repos[0].private);
        assert!(config.repos[0].readme.is_empty());
    }

    #[test]
    fn decodes_json_with_missing_fields() {
        let raw = r#"{"host":"git.local","port":23231,"repos":[{"repo":"a"}]}"#;
        let config = LegacyConfig::decode(ConfigEncoding::Json, raw.as_bytes()).expect("decode");
        assert_eq!(config.host, "git.local");
        assert!(config.users.is_empty());
        assert_eq!(config.repos[0].repo, "a");
        assert!(config.repos[0].collabs.is_empty());
    }

    #[test]
    fn null_lists_decode_as_empty() {
        let raw = "host: h\nusers:\nrepos: ~\n";
        let config = LegacyConfig::decode(ConfigEncoding::Yaml, raw.as_bytes()).expect("decode");
        assert!(config.users.is_empty());
        assert!(config.repos.is_empty());
    }

    #[test]
    fn null_scalars_decode_as_empty() {
        let json = br#"{"name":null,"port":null,"allow-keyless":null,
            "repos":[{"repo":"dotfiles","name":null,"note":null,"private":null}]}"#;
        let config = LegacyConfig::decode(ConfigEncoding::Json, json).expect("json");
        assert!(config.name.is_empty());
        assert_eq!(config.port, 0);
        assert!(!config.allow_keyless);
        assert_eq!(config.repos[0].repo, "dotfiles");
        assert!(config.repos[0].note.is_empty());
        assert!(!config.repos[0].private);

        let yaml = b"name:\nrepos:\n  - repo: dotfiles\n    note:\n";
        let config = LegacyConfig::decode(ConfigEncoding::Yaml, yaml).expect("yaml");
        assert!(config.name.is_empty());
        assert!(config.repos[0].note.is_empty());
    }

    #[test]
    fn empty_yaml_is_default() {
        let config = LegacyConfig::decode(ConfigEncoding::Yaml, b"\n").expect("decode");
        assert_eq!(config, LegacyConfig::default());
    }

    #[test]
    fn malformed_documents_are_errors() {
        let err = LegacyConfig::decode(ConfigEncoding::Yaml, b"users: [unterminated")
            .expect_err("invalid yaml");
        assert!(matches!(err, DecodeError::Yaml(_)));
        let err =
            LegacyConfig::decode(ConfigEncoding::Json, b"{\"port\": ").expect_err("invalid json");
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn public_url_joins_host_and_port() {
        let config = LegacyConfig {
            host: "example.com".to_string(),
            port: 2222,
            ..LegacyConfig::default()
        };
        assert_eq!(config.public_url(), "ssh://example.com:2222");
    }
}
