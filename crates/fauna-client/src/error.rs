use thiserror::Error;

/// Errors raised while talking to the provider.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The endpoint kept failing after the session retry budget was spent.
    #[error("provider error budget exhausted after {errors} transfer errors (last HTTP status {status})")]
    Protocol { status: u16, errors: u32 },

    /// The provider kept signaling continuation past the chunk ceiling.
    #[error("pagination did not terminate within {max_chunks} chunks")]
    PaginationOverflow { max_chunks: usize },

    /// A search was issued without a query body; that is a caller bug.
    #[error("search requests require a query body")]
    MissingSearchBody,

    /// Chunks of one request changed shape mid-stream.
    #[error(transparent)]
    ChunkShape(#[from] fauna_core::payload::MergeError),
}
