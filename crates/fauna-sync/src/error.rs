use thiserror::Error;

/// Engine-level failures; all of them abort the current partition but not
/// its siblings.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Fetch(#[from] fauna_client::FetchError),

    #[error(transparent)]
    Store(#[from] fauna_store::StoreError),

    #[error(transparent)]
    Record(#[from] fauna_core::RecordError),

    #[error("malformed directory entry: {0}")]
    Decode(#[from] serde_json::Error),
}
