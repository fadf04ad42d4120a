//! Tests for dispatcher services
//!
//! Provider clients are exercised against a local mock HTTP server; the result
//! store runs against temporary directories.

pub mod function_catalog;
pub mod providers;
