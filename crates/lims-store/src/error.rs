use thiserror::Error;

/// Errors returned by store actions.
///
/// Loader failures never surface here: they are resolved to a message and
/// stored on the failing slice of the model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No model is registered under this id.
    #[error("Model not found: {id}")]
    ModelNotFound {
        /// Requested model id.
        id: String,
    },

    /// The action needs schema metadata that has not loaded yet.
    #[error("Query info for model '{id}' is not loaded")]
    QueryInfoRequired {
        /// Model id.
        id: String,
    },

    /// Settings could not be loaded.
    #[error("Invalid store settings: {0}")]
    Settings(String),

    /// The runtime task owning the store is gone.
    #[error("Store runtime has stopped")]
    RuntimeStopped,
}

impl StoreError {
    pub(crate) fn model_not_found(id: &str) -> Self {
        Self::ModelNotFound { id: id.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
