//! Internal implementation modules for `ferry-core`.
//!
//! Most callers should go through `ferry_core::api` rather than importing these
//! modules directly.

pub mod backend;
pub mod config;
pub mod fs;
pub mod legacy_store;
pub mod migration;
pub mod tooling;
