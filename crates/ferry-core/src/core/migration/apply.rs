use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ferry_domain::{AccessLevel, LegacyConfig, TargetConfiguration};
use serde_json::json;

use super::import::import_repositories;
use super::plan::{MigrateConfigRequest, MigrationPlan};
use super::populate::{create_users, populate_repositories};
use super::report::{MigrationPhase, MigrationReport};
use crate::backend::sqlite::{SqliteBackend, StoreSummary};
use crate::backend::Backend;
use crate::config::context::CommandContext;
use crate::fs::{copy_file, create_private_dir};
use crate::legacy_store::read_legacy_source;
use crate::outcome::ExecutionOutcome;
use crate::timings::TimingGuard;

/// Migrates a legacy installation into the data directory.
///
/// Recoverable failures are recorded in the report carried by the outcome's
/// details; the outcome is still a success. Initializing the backend, copying
/// the SSH host key, reading the legacy config and writing the final config
/// are fatal.
///
/// # Errors
/// Returns an error when a fatal step fails.
pub fn migrate_config(
    ctx: &CommandContext,
    request: &MigrateConfigRequest,
) -> Result<ExecutionOutcome> {
    let plan = MigrationPlan::resolve(request, ctx.config().migration());
    if let Err(err) = plan.validate() {
        return Ok(ExecutionOutcome::user_error(
            err.to_string(),
            json!({
                "reason": err.reason(),
                "hint": err.hint(),
            }),
        ));
    }

    let mut target = TargetConfiguration::new(plan.data_path.clone());
    let mut backend = {
        let _timing = TimingGuard::new(MigrationPhase::Init.timing_label());
        tracing::info!(data_path = %plan.data_path.display(), "initializing target backend");
        SqliteBackend::open(&target).context("failed to initialize the target backend")?
    };
    let report = run_phases(&plan, &mut target, &mut backend)?;
    let store = match backend.summary() {
        Ok(store) => Some(store),
        Err(err) => {
            tracing::warn!(error = %err, "failed to read back the backend store");
            None
        }
    };
    summarize(&target, &report, store.as_ref())
}

/// Runs every phase after backend initialization, in order.
pub(crate) fn run_phases(
    plan: &MigrationPlan,
    target: &mut TargetConfiguration,
    backend: &mut dyn Backend,
) -> Result<MigrationReport> {
    let mut report = MigrationReport::start();
    report.applied(target.data_path().display().to_string(), "open-backend");

    report.enter(MigrationPhase::SshBindAddress);
    if let Some(addr) = &plan.bind_address {
        let _timing = TimingGuard::new(MigrationPhase::SshBindAddress.timing_label());
        tracing::info!(listen_addr = %addr, "overriding SSH listen address");
        target.ssh.listen_addr.clone_from(addr);
        report.applied(addr.as_str(), "set-listen-addr");
    }

    report.enter(MigrationPhase::SshHostKeyCopy);
    if let Some(key_path) = &plan.key_path {
        let _timing = TimingGuard::new(MigrationPhase::SshHostKeyCopy.timing_label());
        copy_host_key(key_path, target, &mut report)?;
    }

    report.enter(MigrationPhase::ReadLegacyConfig);
    let legacy = {
        let _timing = TimingGuard::new(MigrationPhase::ReadLegacyConfig.timing_label());
        read_legacy_config(&plan.config_repo, &mut report)?
    };

    report.enter(MigrationPhase::ServerSettings);
    {
        let _timing = TimingGuard::new(MigrationPhase::ServerSettings.timing_label());
        apply_server_settings(&legacy, target, backend, &mut report);
    }

    report.enter(MigrationPhase::RepositoryImport);
    if let Some(root) = &plan.repos_path {
        let _timing = TimingGuard::new(MigrationPhase::RepositoryImport.timing_label());
        import_repositories(root, target, backend, &mut report)?;
    } else {
        tracing::info!("no legacy repositories root given; skipping repository import");
    }

    report.enter(MigrationPhase::RepositoryMetadata);
    {
        let _timing = TimingGuard::new(MigrationPhase::RepositoryMetadata.timing_label());
        populate_repositories(&legacy, backend, &mut report);
    }

    report.enter(MigrationPhase::UserCreation);
    {
        let _timing = TimingGuard::new(MigrationPhase::UserCreation.timing_label());
        create_users(&legacy, backend, &mut report);
    }

    report.enter(MigrationPhase::WriteFinalConfig);
    {
        let _timing = TimingGuard::new(MigrationPhase::WriteFinalConfig.timing_label());
        write_final_config(target, &mut report)?;
    }

    report.finish();
    tracing::info!(
        repos = report.imported_repos.len(),
        users = report.created_users.len(),
        failures = report.failure_count(),
        "migration complete"
    );
    Ok(report)
}

fn copy_host_key(
    key_path: &Path,
    target: &mut TargetConfiguration,
    report: &mut MigrationReport,
) -> Result<()> {
    let ssh_dir = target.ssh_dir();
    create_private_dir(&ssh_dir)?;
    let file_name = key_path
        .file_name()
        .with_context(|| format!("SSH host key path {} has no file name", key_path.display()))?;
    let destination = ssh_dir.join(file_name);
    tracing::info!(from = %key_path.display(), to = %destination.display(), "copying SSH host key");
    copy_file(key_path, &destination).context("failed to copy SSH host key")?;
    report.applied(destination.display().to_string(), "copy-host-key");

    let public_source = with_pub_suffix(key_path);
    let public_destination = with_pub_suffix(&destination);
    match copy_file(&public_source, &public_destination) {
        Ok(()) => report.applied(public_destination.display().to_string(), "copy-public-key"),
        Err(err) => report.failed(
            public_source.display().to_string(),
            "copy-public-key",
            &format!("{err:#}"),
        ),
    }

    target.ssh.key_path = destination;
    Ok(())
}

fn with_pub_suffix(path: &Path) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_owned();
    raw.push(".pub");
    PathBuf::from(raw)
}

fn read_legacy_config(config_repo: &Path, report: &mut MigrationReport) -> Result<LegacyConfig> {
    tracing::info!(store = %config_repo.display(), "reading legacy config");
    let source = read_legacy_source(config_repo).context("failed to read legacy config")?;
    report.legacy_encoding = Some(source.encoding);
    let legacy = source.decode().with_context(|| {
        format!(
            "failed to decode {} from {}",
            source.encoding.file_name(),
            config_repo.display()
        )
    })?;
    report.applied(config_repo.display().to_string(), "read-config");
    Ok(legacy)
}

fn apply_server_settings(
    legacy: &LegacyConfig,
    target: &mut TargetConfiguration,
    backend: &mut dyn Backend,
    report: &mut MigrationReport,
) {
    if !legacy.name.is_empty() {
        target.name.clone_from(&legacy.name);
        report.applied(legacy.name.as_str(), "set-name");
    }
    target.ssh.public_url = legacy.public_url();
    report.applied(target.ssh.public_url.as_str(), "set-public-url");

    match backend.set_allow_keyless(legacy.allow_keyless) {
        Ok(()) => report.applied(legacy.allow_keyless.to_string(), "set-allow-keyless"),
        Err(err) => report.failed(
            legacy.allow_keyless.to_string(),
            "set-allow-keyless",
            &err,
        ),
    }

    match AccessLevel::parse(&legacy.anon_access) {
        Some(level) => match backend.set_anon_access(level) {
            Ok(()) => report.applied(level.as_str(), "set-anon-access"),
            Err(err) => report.failed(level.as_str(), "set-anon-access", &err),
        },
        None => tracing::warn!(
            value = %legacy.anon_access,
            "unrecognised anon-access level; keeping the backend default"
        ),
    }
}

fn write_final_config(target: &TargetConfiguration, report: &mut MigrationReport) -> Result<()> {
    let data_path = target.data_path();
    fs::create_dir_all(data_path)
        .with_context(|| format!("failed to create data directory {}", data_path.display()))?;
    let yaml = target
        .to_yaml()
        .context("failed to render target configuration")?;
    let path = target.config_file();
    fs::write(&path, yaml).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote target configuration");
    report.applied(path.display().to_string(), "write-config");
    report.config_path = Some(path);
    Ok(())
}

fn summarize(
    target: &TargetConfiguration,
    report: &MigrationReport,
    store: Option<&StoreSummary>,
) -> Result<ExecutionOutcome> {
    let failures = report.failure_count();
    let mut message = format!(
        "migrated {} repositories and {} users",
        report.imported_repos.len(),
        report.created_users.len()
    );
    if failures > 0 {
        message.push_str(&format!(" ({failures} steps failed)"));
    }
    let mut details = json!({
        "report": serde_json::to_value(report).context("failed to serialize migration report")?,
        "config_path": target.config_file().display().to_string(),
        "database_path": target.database_file().display().to_string(),
        "store": serde_json::to_value(store).context("failed to serialize backend store summary")?,
    });
    if failures > 0 {
        details["hint"] = json!(
            "Failed steps were skipped; apply them by hand or fix the legacy config and migrate into a fresh data directory."
        );
    }
    Ok(ExecutionOutcome::success(message, details))
}
