use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// An update targeted a document that does not exist. When raised
    /// from a batch, nothing in the batch was applied.
    #[error("document not found: {path}/{id}")]
    NotFound { path: String, id: String },

    /// The backend rejected the write. Transient; callers may retry.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
