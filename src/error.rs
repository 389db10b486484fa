//! Crate-wide error type

use thiserror::Error;

/// Result alias used throughout podar.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the pruning engine and its substrate.
///
/// Nothing is retried: disk, codec and shape failures surface to the caller
/// as soon as they happen.
#[derive(Error, Debug)]
pub enum Error {
    /// A configuration precondition does not hold.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An argument is outside its valid domain.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A tensor does not have the shape its consumer expects.
    #[error("Shape mismatch for '{name}': expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Qualified name (or operation) the tensors belong to
        name: String,
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        actual: Vec<usize>,
    },

    /// No parameter is registered under the qualified name.
    #[error("Parameter not found: '{0}'")]
    ParameterNotFound(String),

    /// No submodule is registered under the dotted path.
    #[error("Module not found: '{0}'")]
    ModuleNotFound(String),

    /// Encoding or decoding a persisted blob failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_message_names_parameter() {
        let err = Error::ShapeMismatch {
            name: "encoder.0.weight".to_string(),
            expected: vec![4, 2],
            actual: vec![2, 4],
        };
        let msg = err.to_string();
        assert!(msg.contains("encoder.0.weight"));
        assert!(msg.contains("[4, 2]"));
    }

    #[test]
    fn test_io_error_converts() {
        fn fails() -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"))?;
            Ok(())
        }
        assert!(matches!(fails(), Err(Error::Io(_))));
    }
}
