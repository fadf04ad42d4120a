//! Shared types for the brain-region dispatch engine
//!
//! Contains the task model, provider and model catalog, retry configuration
//! and the logging setup used by every crate in the workspace.

pub mod config;
pub mod errors;
pub mod logging;
pub mod types;

pub use config::*;
pub use errors::*;
pub use types::*;
