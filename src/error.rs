// error.rs - Error taxonomy for the relief pipeline
//
// Every core operation fails fast with one of these. Messages are meant to be
// shown to the caller verbatim.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Invalid or out-of-range parameter. Caller-fixable.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Degenerate input grid or a mesh that is not a closed manifold.
    #[error("geometry error: {0}")]
    Geometry(String),
    /// Clustering did not converge, even after a re-seeded retry.
    #[error("clustering error: {0}")]
    Clustering(String),
    /// The injected background-removal collaborator failed.
    #[error("background removal failed: {0}")]
    BackgroundRemoval(String),
    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) fn config_err(msg: impl Into<String>) -> Error {
    Error::Configuration(msg.into())
}

pub(crate) fn geometry_err(msg: impl Into<String>) -> Error {
    Error::Geometry(msg.into())
}
