use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Anonymous access levels understood by the target server, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessLevel {
    NoAccess,
    ReadOnly,
    ReadWrite,
    AdminAccess,
}

impl AccessLevel {
    /// Parses the legacy spelling. Unrecognised values yield `None` so the
    /// caller can leave the current setting untouched.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "no-access" => Some(Self::NoAccess),
            "read-only" => Some(Self::ReadOnly),
            "read-write" => Some(Self::ReadWrite),
            "admin-access" => Some(Self::AdminAccess),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoAccess => "no-access",
            Self::ReadOnly => "read-only",
            Self::ReadWrite => "read-write",
            Self::AdminAccess => "admin-access",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown access level `{0}`")]
pub struct UnknownAccessLevel(pub String);

impl FromStr for AccessLevel {
    type Err = UnknownAccessLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownAccessLevel(s.to_string()))
    }
}
