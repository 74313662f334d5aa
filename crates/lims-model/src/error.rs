use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("schema name must not be empty")]
    EmptySchemaName,
    #[error("query name must not be empty")]
    EmptyQueryName,
    #[error("unknown filter operator: {0}")]
    UnknownFilterOperator(String),
    #[error("invalid filter parameter '{name}': {reason}")]
    InvalidFilterParam { name: String, reason: String },
    #[error("invalid sort: {0}")]
    InvalidSort(String),
    #[error("invalid offset: {0}")]
    InvalidOffset(String),
    #[error("invalid max rows: {0}")]
    InvalidMaxRows(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
