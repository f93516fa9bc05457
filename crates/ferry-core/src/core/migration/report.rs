use std::fmt;
use std::path::PathBuf;

use ferry_domain::ConfigEncoding;
use serde::Serialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MigrationPhase {
    Init,
    SshBindAddress,
    SshHostKeyCopy,
    ReadLegacyConfig,
    ServerSettings,
    RepositoryImport,
    RepositoryMetadata,
    UserCreation,
    WriteFinalConfig,
    Done,
}

impl MigrationPhase {
    /// Label used for timing events.
    pub(crate) const fn timing_label(self) -> &'static str {
        match self {
            MigrationPhase::Init => "migrate_config.init",
            MigrationPhase::SshBindAddress => "migrate_config.ssh_bind_address",
            MigrationPhase::SshHostKeyCopy => "migrate_config.ssh_host_key_copy",
            MigrationPhase::ReadLegacyConfig => "migrate_config.read_legacy_config",
            MigrationPhase::ServerSettings => "migrate_config.server_settings",
            MigrationPhase::RepositoryImport => "migrate_config.repository_import",
            MigrationPhase::RepositoryMetadata => "migrate_config.repository_metadata",
            MigrationPhase::UserCreation => "migrate_config.user_creation",
            MigrationPhase::WriteFinalConfig => "migrate_config.write_final_config",
            MigrationPhase::Done => "migrate_config.done",
        }
    }
}

impl fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MigrationPhase::Init => "init",
            MigrationPhase::SshBindAddress => "ssh-bind-address",
            MigrationPhase::SshHostKeyCopy => "ssh-host-key-copy",
            MigrationPhase::ReadLegacyConfig => "read-legacy-config",
            MigrationPhase::ServerSettings => "server-settings",
            MigrationPhase::RepositoryImport => "repository-import",
            MigrationPhase::RepositoryMetadata => "repository-metadata",
            MigrationPhase::UserCreation => "user-creation",
            MigrationPhase::WriteFinalConfig => "write-final-config",
            MigrationPhase::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "kebab-case")]
pub enum StepOutcome {
    Applied,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub phase: MigrationPhase,
    pub subject: String,
    pub action: String,
    pub outcome: StepOutcome,
}

impl StepRecord {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, StepOutcome::Failed(_))
    }
}

/// Everything a migration run did, in order.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub started_at: String,
    pub finished_at: Option<String>,
    pub phase: MigrationPhase,
    pub legacy_encoding: Option<ConfigEncoding>,
    pub steps: Vec<StepRecord>,
    pub imported_repos: Vec<String>,
    pub created_users: Vec<String>,
    pub rejected_keys: usize,
    pub config_path: Option<PathBuf>,
}

impl MigrationReport {
    pub(crate) fn start() -> Self {
        Self {
            started_at: timestamp(),
            finished_at: None,
            phase: MigrationPhase::Init,
            legacy_encoding: None,
            steps: Vec::new(),
            imported_repos: Vec::new(),
            created_users: Vec::new(),
            rejected_keys: 0,
            config_path: None,
        }
    }

    pub(crate) fn enter(&mut self, phase: MigrationPhase) {
        tracing::debug!(phase = %phase, "entering migration phase");
        self.phase = phase;
    }

    pub(crate) fn applied(&mut self, subject: impl Into<String>, action: &str) {
        self.steps.push(StepRecord {
            phase: self.phase,
            subject: subject.into(),
            action: action.to_string(),
            outcome: StepOutcome::Applied,
        });
    }

    /// Records a recoverable failure and logs it against its subject.
    pub(crate) fn failed(
        &mut self,
        subject: impl Into<String>,
        action: &str,
        error: &dyn fmt::Display,
    ) {
        let subject = subject.into();
        let error = error.to_string();
        tracing::error!(
            phase = %self.phase,
            subject = %subject,
            action,
            error = %error,
            "migration step failed"
        );
        self.steps.push(StepRecord {
            phase: self.phase,
            subject,
            action: action.to_string(),
            outcome: StepOutcome::Failed(error),
        });
    }

    pub(crate) fn finish(&mut self) {
        self.enter(MigrationPhase::Done);
        self.finished_at = Some(timestamp());
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps.iter().filter(|step| step.is_failure())
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }
}

fn timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}
