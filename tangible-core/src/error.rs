use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("signature id must not be empty")]
    EmptyId,
    #[error("signature '{id}' has a non-positive side: {sides:?}")]
    NonPositiveSide { id: String, sides: [f64; 3] },
    #[error("signature '{id}' sides are not ascending: {sides:?}")]
    UnsortedSides { id: String, sides: [f64; 3] },
    #[error("signature '{id}' has an invalid bounding box")]
    BadBoundingBox { id: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying key-value backend refused the operation.
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("malformed record under '{key}': {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] SignatureError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a finite value in {range}, got {value}")]
    OutOfRange {
        name: &'static str,
        range: &'static str,
        value: f64,
    },
}
