use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ferry_domain::{
    canonical_key, sanitize_repo, validate_repo, validate_username, AccessLevel,
    TargetConfiguration,
};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::Serialize;
use time::OffsetDateTime;

use super::{Backend, BackendError, RepositoryOptions, UserOptions};

const SETTING_ALLOW_KEYLESS: &str = "allow_keyless";
const SETTING_ANON_ACCESS: &str = "anon_access";

/// Backend persisted in a SQLite database under the data directory.
pub struct SqliteBackend {
    conn: Connection,
    repos_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryRecord {
    pub name: String,
    pub project_name: String,
    pub description: String,
    pub private: bool,
    pub collaborators: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub username: String,
    pub admin: bool,
    pub public_keys: Vec<String>,
}

/// What the store holds, read back after a migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    pub anon_access: Option<String>,
    pub allow_keyless: Option<String>,
    pub repositories: Vec<RepositoryRecord>,
    pub users: Vec<UserRecord>,
}

impl SqliteBackend {
    /// Opens (creating if needed) the store described by `config`.
    pub fn open(config: &TargetConfiguration) -> Result<Self> {
        let data_path = config.data_path();
        fs::create_dir_all(data_path)
            .with_context(|| format!("failed to create data directory {}", data_path.display()))?;
        let path = config.database_file();
        let conn = Self::connect(&path)?;
        init_schema(&conn)?;
        tracing::debug!(path = %path.display(), "opened backend store");
        Ok(Self {
            conn,
            repos_dir: config.repos_dir(),
        })
    }

    fn connect(path: &Path) -> Result<Connection> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open backend store at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("failed to enable WAL for backend store")?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("failed to enable foreign keys for backend store")?;
        Ok(conn)
    }

    pub fn setting(&self, key: &str) -> Result<Option<String>, BackendError> {
        Ok(self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    pub fn repository(&self, name: &str) -> Result<Option<RepositoryRecord>, BackendError> {
        let name = sanitize_repo(name);
        let row = self
            .conn
            .query_row(
                "SELECT project_name, description, private FROM repos WHERE name = ?1",
                params![name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, bool>(2)?,
                    ))
                },
            )
            .optional()?;
        let Some((project_name, description, private)) = row else {
            return Ok(None);
        };
        let collaborators = self.collaborators(&name)?;
        Ok(Some(RepositoryRecord {
            name,
            project_name,
            description,
            private,
            collaborators,
        }))
    }

    pub fn repository_names(&self) -> Result<Vec<String>, BackendError> {
        let mut stmt = self.conn.prepare("SELECT name FROM repos ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    pub fn usernames(&self) -> Result<Vec<String>, BackendError> {
        let mut stmt = self.conn.prepare("SELECT username FROM users ORDER BY username")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    pub fn user(&self, username: &str) -> Result<Option<UserRecord>, BackendError> {
        let username = username.to_lowercase();
        let row = self
            .conn
            .query_row(
                "SELECT id, admin FROM users WHERE username = ?1",
                params![username],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, bool>(1)?)),
            )
            .optional()?;
        let Some((id, admin)) = row else {
            return Ok(None);
        };
        let mut stmt = self
            .conn
            .prepare("SELECT public_key FROM public_keys WHERE user_id = ?1 ORDER BY id")?;
        let public_keys = stmt
            .query_map(params![id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(Some(UserRecord {
            username,
            admin,
            public_keys,
        }))
    }

    pub fn collaborators(&self, repo: &str) -> Result<Vec<String>, BackendError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT c.username FROM collabs c
            JOIN repos r ON r.id = c.repo_id
            WHERE r.name = ?1
            ORDER BY c.username
            "#,
        )?;
        let names = stmt
            .query_map(params![sanitize_repo(repo)], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Reads back settings, repositories with their grants, and users.
    pub fn summary(&self) -> Result<StoreSummary, BackendError> {
        let mut repositories = Vec::new();
        for name in self.repository_names()? {
            repositories.extend(self.repository(&name)?);
        }
        let mut users = Vec::new();
        for username in self.usernames()? {
            users.extend(self.user(&username)?);
        }
        Ok(StoreSummary {
            anon_access: self.setting(SETTING_ANON_ACCESS)?,
            allow_keyless: self.setting(SETTING_ALLOW_KEYLESS)?,
            repositories,
            users,
        })
    }

    fn put_setting(&mut self, key: &str, value: &str) -> Result<(), BackendError> {
        self.conn.execute(
            r#"
            INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, value, now()],
        )?;
        Ok(())
    }

    fn update_repo(
        &mut self,
        repo: &str,
        sql: &str,
        value: &dyn rusqlite::ToSql,
    ) -> Result<(), BackendError> {
        let name = sanitize_repo(repo);
        let changed = self.conn.execute(sql, params![value, name])?;
        if changed == 0 {
            return Err(BackendError::RepoNotFound(name));
        }
        Ok(())
    }
}

impl Backend for SqliteBackend {
    fn set_allow_keyless(&mut self, allow: bool) -> Result<(), BackendError> {
        self.put_setting(SETTING_ALLOW_KEYLESS, if allow { "true" } else { "false" })
    }

    fn set_anon_access(&mut self, level: AccessLevel) -> Result<(), BackendError> {
        self.put_setting(SETTING_ANON_ACCESS, level.as_str())
    }

    fn create_repository(
        &mut self,
        name: &str,
        options: RepositoryOptions,
    ) -> Result<(), BackendError> {
        let name = sanitize_repo(name);
        validate_repo(&name)?;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let existing = tx
            .query_row(
                "SELECT id FROM repos WHERE name = ?1",
                params![name],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(BackendError::RepoExists(name));
        }
        tx.execute(
            r#"
            INSERT INTO repos (name, project_name, description, private, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                name,
                options.project_name.unwrap_or_default(),
                options.description.unwrap_or_default(),
                options.private,
                now(),
            ],
        )?;

        let path = self.repos_dir.join(format!("{name}.git"));
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|source| BackendError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            git2::Repository::init_bare(&path).map_err(|source| BackendError::Git {
                path: path.clone(),
                source,
            })?;
            tracing::debug!(repo = %name, path = %path.display(), "initialized bare repository");
        }
        tx.commit()?;
        Ok(())
    }

    fn set_project_name(&mut self, repo: &str, project_name: &str) -> Result<(), BackendError> {
        self.update_repo(
            repo,
            "UPDATE repos SET project_name = ?1 WHERE name = ?2",
            &project_name,
        )
    }

    fn set_description(&mut self, repo: &str, description: &str) -> Result<(), BackendError> {
        self.update_repo(
            repo,
            "UPDATE repos SET description = ?1 WHERE name = ?2",
            &description,
        )
    }

    fn set_private(&mut self, repo: &str, private: bool) -> Result<(), BackendError> {
        self.update_repo(
            repo,
            "UPDATE repos SET private = ?1 WHERE name = ?2",
            &private,
        )
    }

    fn add_collaborator(&mut self, repo: &str, username: &str) -> Result<(), BackendError> {
        let repo = sanitize_repo(repo);
        let username = username.to_lowercase();
        validate_username(&username)?;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let repo_id = tx
            .query_row(
                "SELECT id FROM repos WHERE name = ?1",
                params![repo],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        let Some(repo_id) = repo_id else {
            return Err(BackendError::RepoNotFound(repo));
        };
        // Grants are keyed by username so they may precede the user row.
        tx.execute(
            "INSERT OR IGNORE INTO collabs (repo_id, username, created_at) VALUES (?1, ?2, ?3)",
            params![repo_id, username, now()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn create_user(&mut self, username: &str, options: UserOptions) -> Result<(), BackendError> {
        let username = username.to_lowercase();
        validate_username(&username)?;
        let mut keys: Vec<String> = Vec::with_capacity(options.public_keys.len());
        for raw in &options.public_keys {
            let (canonical, _) = canonical_key(raw)?;
            if !keys.contains(&canonical) {
                keys.push(canonical);
            }
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let existing = tx
            .query_row(
                "SELECT id FROM users WHERE username = ?1",
                params![username],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(BackendError::UserExists(username));
        }
        tx.execute(
            "INSERT INTO users (username, admin, created_at) VALUES (?1, ?2, ?3)",
            params![username, options.admin, now()],
        )?;
        let user_id = tx.last_insert_rowid();
        for key in &keys {
            let owner = tx
                .query_row(
                    r#"
                    SELECT u.username FROM public_keys k
                    JOIN users u ON u.id = k.user_id
                    WHERE k.public_key = ?1
                    "#,
                    params![key],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            if let Some(owner) = owner {
                return Err(BackendError::KeyInUse(owner));
            }
            tx.execute(
                "INSERT INTO public_keys (user_id, public_key, created_at) VALUES (?1, ?2, ?3)",
                params![user_id, key, now()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS repos (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            project_name TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            private INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            admin INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS public_keys (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            public_key TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS collabs (
            repo_id INTEGER NOT NULL REFERENCES repos(id) ON DELETE CASCADE,
            username TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (repo_id, username)
        );
        CREATE INDEX IF NOT EXISTS idx_public_keys_user ON public_keys(user_id);
        "#,
    )
    .context("failed to initialize backend store schema")?;
    Ok(())
}

fn now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAILzpBy22yqtCE2eQX/efL/OsD3T0Ganaxue2ckVcIkZl alice@laptop";
    const BOB: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAILeWXqFzlRcnmycA7lTeCNozzxTDGveyQdRo5eZaoa00 bob@desk";

    fn open(temp: &tempfile::TempDir) -> (SqliteBackend, TargetConfiguration) {
        let config = TargetConfiguration::new(temp.path().join("data"));
        let backend = SqliteBackend::open(&config).expect("open backend");
        (backend, config)
    }

    fn keys(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|k| (*k).to_string()).collect()
    }

    #[test]
    fn create_repository_initializes_bare_repo() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (mut backend, config) = open(&temp);
        backend
            .create_repository("group/proj.git", RepositoryOptions::default())
            .expect("create");
        let repo = git2::Repository::open_bare(config.repo_dir("group/proj")).expect("bare");
        assert!(repo.is_bare());
        let record = backend.repository("group/proj").expect("query").expect("row");
        assert!(!record.private);
        assert!(record.project_name.is_empty());
    }

    #[test]
    fn create_repository_keeps_existing_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (mut backend, config) = open(&temp);
        let dir = config.repo_dir("copied");
        fs::create_dir_all(dir.join("objects")).expect("objects");
        fs::write(dir.join("HEAD"), "ref: refs/heads/main\n").expect("HEAD");
        fs::write(dir.join("marker"), "kept").expect("marker");
        backend
            .create_repository("copied", RepositoryOptions::default())
            .expect("create");
        assert_eq!(fs::read_to_string(dir.join("marker")).expect("marker"), "kept");
    }

    #[test]
    fn duplicate_and_invalid_repositories_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (mut backend, _) = open(&temp);
        backend
            .create_repository("dotfiles", RepositoryOptions::default())
            .expect("create");
        let err = backend
            .create_repository("/dotfiles.git", RepositoryOptions::default())
            .expect_err("duplicate");
        assert!(matches!(err, BackendError::RepoExists(name) if name == "dotfiles"));
        let err = backend
            .create_repository("has space", RepositoryOptions::default())
            .expect_err("invalid");
        assert!(matches!(err, BackendError::InvalidRepoName(_)));
        assert_eq!(backend.repository_names().expect("names"), vec!["dotfiles"]);
    }

    #[test]
    fn metadata_setters_update_and_report_unknown_repos() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (mut backend, _) = open(&temp);
        backend
            .create_repository("dotfiles", RepositoryOptions::default())
            .expect("create");
        backend.set_project_name("dotfiles", "Dot Files").expect("name");
        backend.set_description("dotfiles", "my dotfiles").expect("desc");
        backend.set_private("dotfiles", true).expect("private");
        let record = backend.repository("dotfiles").expect("query").expect("row");
        assert_eq!(record.project_name, "Dot Files");
        assert_eq!(record.description, "my dotfiles");
        assert!(record.private);

        let err = backend.set_private("ghost", true).expect_err("unknown");
        assert!(matches!(err, BackendError::RepoNotFound(name) if name == "ghost"));
    }

    #[test]
    fn create_user_dedupes_keys_and_rejects_shared_keys() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (mut backend, _) = open(&temp);
        let alice_again = format!("no-pty {}", ALICE.replace("alice@laptop", "other"));
        backend
            .create_user(
                "alice",
                UserOptions {
                    admin: true,
                    public_keys: keys(&[ALICE, &alice_again]),
                },
            )
            .expect("alice");
        let alice = backend.user("alice").expect("query").expect("row");
        assert!(alice.admin);
        assert_eq!(alice.public_keys.len(), 1);
        assert!(!alice.public_keys[0].contains("alice@laptop"));

        let err = backend
            .create_user(
                "mallory",
                UserOptions {
                    admin: false,
                    public_keys: keys(&[BOB, ALICE]),
                },
            )
            .expect_err("shared key");
        assert!(matches!(err, BackendError::KeyInUse(owner) if owner == "alice"));
        assert!(backend.user("mallory").expect("query").is_none());
    }

    #[test]
    fn create_user_validates_input() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (mut backend, _) = open(&temp);
        let err = backend
            .create_user("", UserOptions::default())
            .expect_err("empty name");
        assert!(matches!(err, BackendError::InvalidUsername(_)));
        let err = backend
            .create_user(
                "bob",
                UserOptions {
                    admin: false,
                    public_keys: keys(&["garbage"]),
                },
            )
            .expect_err("bad key");
        assert!(matches!(err, BackendError::InvalidKey(_)));
        backend
            .create_user("bob", UserOptions::default())
            .expect("keyless user");
        let err = backend
            .create_user("Bob", UserOptions::default())
            .expect_err("duplicate");
        assert!(matches!(err, BackendError::UserExists(_)));
    }

    #[test]
    fn collaborators_may_precede_their_user() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (mut backend, _) = open(&temp);
        backend
            .create_repository("dotfiles", RepositoryOptions::default())
            .expect("create");
        backend
            .add_collaborator("dotfiles", "Bob")
            .expect("grant before user");
        backend.add_collaborator("dotfiles", "bob").expect("idempotent");
        let err = backend.add_collaborator("ghost", "bob").expect_err("no repo");
        assert!(matches!(err, BackendError::RepoNotFound(_)));
        let err = backend
            .add_collaborator("dotfiles", "-bad")
            .expect_err("invalid user");
        assert!(matches!(err, BackendError::InvalidUsername(_)));

        backend
            .create_user("bob", UserOptions::default())
            .expect("bob");
        assert_eq!(backend.collaborators("dotfiles").expect("list"), vec!["bob"]);
    }

    #[test]
    fn summary_reads_back_everything_stored() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (mut backend, _) = open(&temp);
        backend.set_anon_access(AccessLevel::NoAccess).expect("anon");
        for name in ["zeta", "alpha"] {
            backend
                .create_repository(name, RepositoryOptions::default())
                .expect("create");
        }
        backend.add_collaborator("zeta", "bob").expect("grant");
        backend
            .create_user(
                "bob",
                UserOptions {
                    admin: false,
                    public_keys: keys(&[BOB]),
                },
            )
            .expect("bob");

        let summary = backend.summary().expect("summary");
        assert_eq!(summary.anon_access.as_deref(), Some("no-access"));
        assert_eq!(summary.allow_keyless, None);
        let names: Vec<_> = summary.repositories.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(summary.repositories[1].collaborators, vec!["bob"]);
        assert_eq!(summary.users.len(), 1);
        assert_eq!(summary.users[0].public_keys.len(), 1);
    }

    #[test]
    fn settings_are_upserted_and_persist() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (mut backend, config) = open(&temp);
        backend.set_allow_keyless(true).expect("keyless");
        backend.set_allow_keyless(false).expect("keyless again");
        backend
            .set_anon_access(AccessLevel::ReadOnly)
            .expect("anon");
        drop(backend);

        let reopened = SqliteBackend::open(&config).expect("reopen");
        assert_eq!(
            reopened.setting(SETTING_ALLOW_KEYLESS).expect("query").as_deref(),
            Some("false")
        );
        assert_eq!(
            reopened.setting(SETTING_ANON_ACCESS).expect("query").as_deref(),
            Some("read-only")
        );
    }
}
