use thiserror::Error;

/// Errors produced while parsing or validating domain values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("{0} is not a valid alias status")]
    InvalidStatus(String),

    #[error("unknown sort order: {0}")]
    InvalidSortOrder(String),

    #[error("{field} tag must not be empty")]
    EmptyTag { field: &'static str },

    #[error("{field} tag cannot contain spaces: {value:?}")]
    TagContainsSpace { field: &'static str, value: String },
}
