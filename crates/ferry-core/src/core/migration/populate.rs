use ferry_domain::{normalize_username, reconcile_user, sanitize_repo, LegacyConfig};

use super::report::MigrationReport;
use crate::backend::{Backend, UserOptions};

/// Applies per-repository metadata. Every write is attempted on its own.
pub(crate) fn populate_repositories(
    legacy: &LegacyConfig,
    backend: &mut dyn Backend,
    report: &mut MigrationReport,
) {
    for repo in &legacy.repos {
        let name = sanitize_repo(&repo.repo);
        tracing::info!(repo = %name, "applying repository metadata");

        match backend.set_project_name(&name, &repo.name) {
            Ok(()) => report.applied(name.as_str(), "set-project-name"),
            Err(err) => report.failed(name.as_str(), "set-project-name", &err),
        }
        match backend.set_description(&name, &repo.note) {
            Ok(()) => report.applied(name.as_str(), "set-description"),
            Err(err) => report.failed(name.as_str(), "set-description", &err),
        }
        match backend.set_private(&name, repo.private) {
            Ok(()) => report.applied(name.as_str(), "set-private"),
            Err(err) => report.failed(name.as_str(), "set-private", &err),
        }
        // Users are created later; the backend keeps grants by username.
        for collaborator in &repo.collabs {
            let username = normalize_username(collaborator);
            let subject = format!("{name}:{username}");
            match backend.add_collaborator(&name, &username) {
                Ok(()) => report.applied(subject, "add-collaborator"),
                Err(err) => report.failed(subject, "add-collaborator", &err),
            }
        }
    }
}

/// Creates one user per legacy entry, then grants its declared
/// collaborations. A user that cannot be created gets no collaborations.
pub(crate) fn create_users(
    legacy: &LegacyConfig,
    backend: &mut dyn Backend,
    report: &mut MigrationReport,
) {
    for user in &legacy.users {
        let identity = reconcile_user(user);
        for rejected in &identity.rejected {
            tracing::warn!(
                user = %identity.username,
                position = rejected.position,
                reason = %rejected.reason,
                "skipping unparsable public key"
            );
        }
        report.rejected_keys += identity.rejected.len();
        tracing::info!(
            user = %identity.username,
            keys = identity.keys.len(),
            admin = identity.admin,
            "creating user"
        );

        let options = UserOptions {
            admin: identity.admin,
            public_keys: identity.public_keys(),
        };
        if let Err(err) = backend.create_user(&identity.username, options) {
            report.failed(identity.username.as_str(), "create-user", &err);
            continue;
        }
        report.applied(identity.username.as_str(), "create-user");
        report.created_users.push(identity.username.clone());

        for repo in &user.collab_repos {
            let repo = sanitize_repo(repo);
            let subject = format!("{repo}:{}", identity.username);
            match backend.add_collaborator(&repo, &identity.username) {
                Ok(()) => report.applied(subject, "add-collaborator"),
                Err(err) => report.failed(subject, "add-collaborator", &err),
            }
        }
    }
}
