#![deny(clippy::all, warnings)]

mod core;

pub mod api;

pub(crate) use crate::core::config;
pub(crate) use crate::core::tooling::{outcome, timings};
pub(crate) use crate::core::{backend, fs, legacy_store};
#[cfg(test)]
pub(crate) use crate::core::migration;

pub use crate::core::backend::{Backend, BackendError, RepositoryOptions, UserOptions};
pub use crate::core::backend::sqlite::{RepositoryRecord, SqliteBackend, StoreSummary, UserRecord};
pub use crate::core::config::context::{CommandContext, CommandGroup, CommandInfo};
pub use crate::core::config::{
    Config, GlobalOptions, MigrationEnv, BIND_ADDRESS_ENV, CONFIG_REPO_ENV, DATA_PATH_ENV,
    KEY_PATH_ENV, REPO_PATH_ENV, TIMINGS_ENV,
};
pub use crate::core::legacy_store::{LegacySource, LegacyStoreError};
pub use crate::core::migration::{
    migrate_config, MigrateConfigRequest, MigrationPhase, MigrationReport, StepOutcome,
    StepRecord,
};
pub use crate::core::tooling::outcome::{CommandStatus, ExecutionOutcome};
pub use crate::core::tooling::response::{format_status_message, to_json_response};
