use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Record(#[from] fauna_core::RecordError),

    #[error("reprojection failed: {0}")]
    Reproject(#[from] proj4rs::errors::Error),

    #[error("database failure: {0}")]
    Database(#[from] sqlx::Error),

    /// The worker pool was already closed when a write was submitted.
    #[error("observation pipeline is shut down")]
    PipelineClosed,
}
