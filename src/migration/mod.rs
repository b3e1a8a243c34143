//! # Schema Migration
//!
//! Hooks are injected into the migrator explicitly; there is no global
//! hook registry.

mod hooks;
mod migrator;

pub use hooks::{
    HookError, HookResult, MigrationDocument, MigrationHooks, MigrationResult, MigrationStage,
};
pub use migrator::{DocumentMigrator, MigrationReport};
