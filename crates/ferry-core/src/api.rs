// Intended public API surface for `ferry-core`.
//
// The CLI imports through this module so the set of types it depends on stays
// explicit.

pub use crate::core::config::context::{CommandContext, CommandGroup, CommandInfo};
pub use crate::core::config::GlobalOptions;
pub use crate::core::migration::{migrate_config, MigrateConfigRequest};
pub use crate::core::tooling::outcome::{CommandStatus, ExecutionOutcome};
pub use crate::core::tooling::response::{format_status_message, to_json_response};
