//! Concurrent LLM task dispatch for brain-region analyses
//!
//! Expands regions, hemispheres, functions and models into independent tasks,
//! runs them through a bounded worker pool with per-provider retry, and merges
//! every result into shared JSON documents under a file lock.

pub mod analyser;
pub mod context;
pub mod core;
pub mod error;
pub mod services;
pub mod traits;
pub mod types;

pub use analyser::process_task;
pub use context::{DispatchContext, DispatchContextBuilder, ProviderHandle};
pub use error::{DispatchError, DispatchResult};
pub use traits::*;
pub use types::*;
