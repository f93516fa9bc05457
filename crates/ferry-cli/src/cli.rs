use std::path::PathBuf;

use clap::{value_parser, ArgAction, Args, Parser, Subcommand};
use ferry_core::{BIND_ADDRESS_ENV, CONFIG_REPO_ENV, DATA_PATH_ENV, KEY_PATH_ENV, REPO_PATH_ENV};

pub const FERRY_HELP_TEMPLATE: &str =
    "{before-help}\nUsage:\n    {usage}\n\nCommands:\n{subcommands}\n\nGlobal options:\n{options}\n";

pub const FERRY_BEFORE_HELP: &str = concat!(
    "ferry ",
    env!("CARGO_PKG_VERSION"),
    " – Legacy git hosting migration\n\n",
    "\x1b[1;36mCommands\x1b[0m\n",
    "  migrate-config   Import a legacy config repository, its repositories and users.\n",
);

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    propagate_version = false,
    disable_help_subcommand = true,
    before_help = FERRY_BEFORE_HELP,
    help_template = FERRY_HELP_TEMPLATE
)]
#[allow(clippy::struct_excessive_bools)]
pub struct FerryCli {
    #[arg(
        short,
        long,
        help = "Suppress human output (errors still print to stderr)",
        global = true
    )]
    pub quiet: bool,
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        help = "Increase logging (-vv reaches trace)",
        global = true
    )]
    pub verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v/-q", global = true)]
    pub trace: bool,
    #[arg(
        long,
        help = "Emit {status,message,details} JSON envelopes",
        global = true
    )]
    pub json: bool,
    #[arg(long, help = "Disable colored human output", global = true)]
    pub no_color: bool,
    #[command(subcommand)]
    pub command: CommandGroupCli,
}

#[derive(Subcommand, Debug)]
pub enum CommandGroupCli {
    #[command(
        name = "migrate-config",
        about = "Migrate a legacy config repository, repositories and users into the data directory.",
        override_usage = "ferry migrate-config [--repos-path DIR] [--key-path FILE] [--data-path DIR]",
        after_help = "Examples:\n  ferry migrate-config --repos-path /var/lib/legacy/repos --key-path /var/lib/legacy/ssh/host_key\n  FERRY_LEGACY_REPO_PATH=/srv/repos ferry --json migrate-config"
    )]
    MigrateConfig(MigrateConfigArgs),
}

#[derive(Args, Debug)]
pub struct MigrateConfigArgs {
    #[arg(
        long,
        env = KEY_PATH_ENV,
        value_name = "FILE",
        value_parser = value_parser!(PathBuf),
        help = "Legacy SSH private host key to carry over"
    )]
    pub key_path: Option<PathBuf>,
    #[arg(
        long,
        env = REPO_PATH_ENV,
        value_name = "DIR",
        value_parser = value_parser!(PathBuf),
        help = "Directory holding the legacy bare repositories"
    )]
    pub repos_path: Option<PathBuf>,
    #[arg(
        long,
        env = BIND_ADDRESS_ENV,
        value_name = "ADDR",
        help = "SSH listen address for the migrated server (e.g. :23231)"
    )]
    pub bind_address: Option<String>,
    #[arg(
        long,
        env = CONFIG_REPO_ENV,
        value_name = "DIR",
        value_parser = value_parser!(PathBuf),
        help = "Legacy config repository (defaults to <repos-path>/config)"
    )]
    pub config_repo: Option<PathBuf>,
    #[arg(
        long,
        env = DATA_PATH_ENV,
        value_name = "DIR",
        value_parser = value_parser!(PathBuf),
        help = "Data directory of the migrated server (defaults to ./data)"
    )]
    pub data_path: Option<PathBuf>,
}
