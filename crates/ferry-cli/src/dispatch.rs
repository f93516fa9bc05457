use color_eyre::Result;
use ferry_core::api as ferry_core;
use ferry_core::{CommandContext, CommandGroup, CommandInfo, MigrateConfigRequest};

use crate::cli::{CommandGroupCli, MigrateConfigArgs};

pub fn dispatch_command(
    ctx: &CommandContext,
    group: &CommandGroupCli,
) -> Result<(CommandInfo, ferry_core::ExecutionOutcome)> {
    match group {
        CommandGroupCli::MigrateConfig(args) => {
            let info = CommandInfo::new(CommandGroup::MigrateConfig, "migrate-config");
            let request = migrate_config_request_from_args(args);
            core_call(info, || ferry_core::migrate_config(ctx, &request))
        }
    }
}

fn migrate_config_request_from_args(args: &MigrateConfigArgs) -> MigrateConfigRequest {
    MigrateConfigRequest {
        key_path: args.key_path.clone(),
        repos_path: args.repos_path.clone(),
        bind_address: args.bind_address.clone(),
        config_repo: args.config_repo.clone(),
        data_path: args.data_path.clone(),
    }
}

fn core_call<F>(info: CommandInfo, action: F) -> Result<(CommandInfo, ferry_core::ExecutionOutcome)>
where
    F: FnOnce() -> anyhow::Result<ferry_core::ExecutionOutcome>,
{
    match action() {
        Ok(result) => Ok((info, result)),
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            let issues: Vec<String> = err.chain().map(std::string::ToString::to_string).collect();
            Ok((
                info,
                ferry_core::ExecutionOutcome::failure(
                    err.to_string(),
                    serde_json::json!({
                        "reason": "internal_error",
                        "error": err.to_string(),
                        "issues": issues,
                        "hint": "Nothing after the failing step was migrated; fix the cause and re-run against an empty data directory (-v shows more detail).",
                    }),
                ),
            ))
        }
    }
}
