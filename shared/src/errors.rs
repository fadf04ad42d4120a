//! Shared error types for the dispatch system

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Invalid configuration: {field} = {value}")]
    InvalidConfig { field: String, value: String },

    #[error("Unknown model: {name}")]
    UnknownModel { name: String },

    #[error("Empty selection for {field}")]
    EmptySelection { field: String },
}

pub type SharedResult<T> = Result<T, SharedError>;
