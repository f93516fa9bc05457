use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{Config, EnvSnapshot, GlobalOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandGroup {
    MigrateConfig,
}

impl fmt::Display for CommandGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandGroup::MigrateConfig => "migrate-config",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CommandInfo {
    pub group: CommandGroup,
    pub name: &'static str,
}

impl CommandInfo {
    #[must_use]
    pub const fn new(group: CommandGroup, name: &'static str) -> Self {
        Self { group, name }
    }
}

pub struct CommandContext<'a> {
    pub global: &'a GlobalOptions,
    config: Config,
}

impl<'a> CommandContext<'a> {
    /// Creates a new command context, capturing the process environment.
    #[must_use]
    pub fn new(global: &'a GlobalOptions) -> Self {
        Self::from_snapshot(global, &EnvSnapshot::capture())
    }

    pub(crate) fn from_snapshot(global: &'a GlobalOptions, env: &EnvSnapshot) -> Self {
        Self {
            global,
            config: Config::from_snapshot(env),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }
}
