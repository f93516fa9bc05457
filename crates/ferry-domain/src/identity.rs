//! Reconciles legacy user entries into canonical identities.
//!
//! Legacy configs were hand edited, so the same key often appears several
//! times with different comments, `authorized_keys` options or spacing. Keys
//! are collapsed on their canonical `<algorithm> <base64>` form.

use std::str::FromStr;

use indexmap::IndexMap;
use serde::Serialize;
use ssh_key::authorized_keys::Entry;
use ssh_key::PublicKey;

use crate::legacy::LegacyUser;

#[derive(Debug, thiserror::Error)]
#[error("invalid public key: {0}")]
pub struct KeyParseError(#[from] ssh_key::Error);

/// A key string that could not be parsed, identified by its position in the
/// user's `public-keys` list. The raw text is not retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedKey {
    pub position: usize,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct CanonicalIdentity {
    pub username: String,
    pub admin: bool,
    /// Keyed by canonical form, in first-seen order.
    pub keys: IndexMap<String, PublicKey>,
    pub rejected: Vec<RejectedKey>,
}

impl CanonicalIdentity {
    /// Canonical key strings, ready to hand to the backend.
    pub fn public_keys(&self) -> Vec<String> {
        self.keys.keys().cloned().collect()
    }
}

/// Lower-cases the name and replaces spaces with hyphens.
///
/// ```
/// assert_eq!(ferry_domain::normalize_username("Jane Doe"), "jane-doe");
/// ```
#[must_use]
pub fn normalize_username(name: &str) -> String {
    name.to_lowercase().replace(' ', "-")
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsernameError {
    #[error("username cannot be empty")]
    Empty,
    #[error("username `{0}` cannot start with `-`")]
    LeadingDash(String),
    #[error("username `{0}` may only contain letters, digits and `-`")]
    InvalidCharacter(String),
}

pub fn validate_username(name: &str) -> Result<(), UsernameError> {
    if name.is_empty() {
        return Err(UsernameError::Empty);
    }
    if name.starts_with('-') {
        return Err(UsernameError::LeadingDash(name.to_string()));
    }
    if !name.chars().all(|c| c.is_alphanumeric() || c == '-') {
        return Err(UsernameError::InvalidCharacter(name.to_string()));
    }
    Ok(())
}

/// Parses one `authorized_keys` style line and returns its canonical form
/// together with the comment-free key.
pub fn canonical_key(raw: &str) -> Result<(String, PublicKey), KeyParseError> {
    let entry = Entry::from_str(raw.trim())?;
    let key = PublicKey::new(entry.public_key().key_data().clone(), "");
    let canonical = key.to_openssh()?.trim_end().to_string();
    Ok((canonical, key))
}

pub fn reconcile_user(user: &LegacyUser) -> CanonicalIdentity {
    let mut keys = IndexMap::new();
    let mut rejected = Vec::new();
    for (position, raw) in user.public_keys.iter().enumerate() {
        match canonical_key(raw) {
            Ok((canonical, key)) => {
                keys.entry(canonical).or_insert(key);
            }
            Err(err) => rejected.push(RejectedKey {
                position,
                reason: err.to_string(),
            }),
        }
    }
    CanonicalIdentity {
        username: normalize_username(&user.name),
        admin: user.admin,
        keys,
        rejected,
    }
}
