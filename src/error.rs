use thiserror::Error;

/// Errors returned by the network store, the engine and the teaching/pruning loops.
///
/// Every variant carries a human-readable description built at the point of detection.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Bad layer/neuron/weight locator or index, access to a disabled weight,
    /// incompatible topologies.
    #[error("structural error: {0}")]
    Structural(String),

    /// Row/column count mismatch between matrices or between data and network.
    #[error("dimension error: {0}")]
    Dimension(String),

    /// Invalid hyperparameter, activation id or activation parameter.
    #[error("invalid config: {0}")]
    Config(String),

    /// Singular matrix or non-finite intermediate result.
    #[error("numeric failure: {0}")]
    Numeric(String),

    /// Malformed persisted network or dataset.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, Error>;
