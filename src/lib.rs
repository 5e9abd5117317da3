//! Thunderstore mod manager for BONELAB.
//!
//! The library holds the registry client, the persisted install state and
//! the install/uninstall orchestration. The `marrow` binary is a thin
//! command-line front end over [`manager::ModManager`].

pub mod archive;
pub mod catalog;
pub mod config;
pub mod error;
pub mod ident;
pub mod install;
pub mod logging;
pub mod manager;
pub mod notify;
pub mod registry;
pub mod state;
pub mod uninstall;

pub use error::{ErrorCategory, ModError, ModResult};
pub use ident::{DependencyId, ModKey};
pub use manager::ModManager;
