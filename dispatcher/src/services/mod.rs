//! Dispatcher service implementations

pub mod api_keys;
pub mod embeddings;
pub mod function_catalog;
pub mod providers;
pub mod result_store;
pub mod summary;

#[cfg(test)]
pub mod tests;

pub use api_keys::*;
pub use embeddings::*;
pub use function_catalog::*;
pub use providers::*;
pub use result_store::*;
pub use summary::*;
