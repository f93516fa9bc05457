#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod access;
pub mod identity;
pub mod legacy;
pub mod repo_name;
pub mod target;

pub use access::{AccessLevel, UnknownAccessLevel};
pub use identity::{
    canonical_key, normalize_username, reconcile_user, validate_username, CanonicalIdentity,
    KeyParseError, RejectedKey, UsernameError,
};
pub use legacy::{ConfigEncoding, DecodeError, LegacyConfig, LegacyRepoConfig, LegacyUser};
pub use repo_name::{clean_path, sanitize_repo, validate_repo, RepoNameError};
pub use target::{SshSettings, TargetConfiguration};
