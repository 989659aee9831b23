//! Error types for HazMap

use thiserror::Error;

/// Main error type for HazMap operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: cannot decode raster: {0}")]
    Decode(String),

    #[error("I/O error: cannot encode raster: {0}")]
    Encode(String),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("Raster footprints do not overlap: {0}")]
    NoOverlap(String),

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("No valid samples in {0}")]
    EmptyInput(&'static str),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a size mismatch error from two `(rows, cols)` shapes
    pub fn size_mismatch(expected: (usize, usize), actual: (usize, usize)) -> Self {
        Error::SizeMismatch {
            er: expected.0,
            ec: expected.1,
            ar: actual.0,
            ac: actual.1,
        }
    }

    /// Build an invalid parameter error
    pub fn invalid(name: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this error came from reading or writing a raster
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Decode(_) | Error::Encode(_))
    }
}

/// Result type alias for HazMap operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_mismatch_message() {
        let err = Error::size_mismatch((4, 4), (3, 5));
        assert_eq!(
            err.to_string(),
            "Raster size mismatch: expected (4, 4), got (3, 5)"
        );
    }

    #[test]
    fn test_io_classification() {
        assert!(Error::Decode("bad".into()).is_io());
        assert!(!Error::EmptyInput("threshold").is_io());
    }
}
