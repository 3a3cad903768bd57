use thiserror::Error;

/// Failures that end a vectorization request before any geometry is produced.
#[derive(Debug, Error)]
pub enum VectorizeError {
    /// The input bytes are not a decodable raster image.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// The remote image could not be retrieved (network, timeout or HTTP status).
    #[error("failed to fetch image: {0}")]
    Fetch(String),
}

impl VectorizeError {
    pub fn is_decode(&self) -> bool {
        matches!(self, VectorizeError::Decode(_))
    }

    pub fn is_fetch(&self) -> bool {
        matches!(self, VectorizeError::Fetch(_))
    }
}
