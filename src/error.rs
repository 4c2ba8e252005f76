//! Error types for rastercache

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::types::DataType;

/// Result type for rastercache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in rastercache operations
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error at the raster store boundary
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file does not exist
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Malformed TIFF structure
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Invalid TIFF magic number
    #[error("Invalid TIFF magic number: {0}")]
    InvalidMagic(u16),

    /// Missing required tag
    #[error("Missing required tag: {0}")]
    MissingTag(u16),

    /// Failure reported by a raster store
    #[error("Raster store error: {0}")]
    Store(String),

    /// Unsupported feature, colour interpretation or layout
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Samples cannot be represented as f32 without loss
    #[error("{0} samples cannot be read as f32 without losing precision")]
    Precision(DataType),

    /// Geotransform has rotation terms
    #[error("Raster is not north-up (rotation terms {0}, {1})")]
    NotNorthUp(f64, f64),

    /// Out of bounds access
    #[error("Out of bounds: {0}")]
    OutOfBounds(String),

    /// Caller buffer does not match the requested size
    #[error("Buffer size mismatch: expected {expected} samples, got {actual}")]
    BufferSize {
        /// Samples required by the request
        expected: usize,
        /// Samples supplied by the caller
        actual: usize,
    },

    /// Written samples do not match the declared data type
    #[error("Data type mismatch: raster is {expected}, buffer is {actual}")]
    DataTypeMismatch {
        /// Declared raster data type
        expected: DataType,
        /// Data type of the caller's buffer
        actual: DataType,
    },

    /// Palette index not present in the colour table
    #[error("Palette index {index} outside colour table of {len} entries")]
    PaletteIndex {
        /// Offending index value
        index: f64,
        /// Number of colour table entries
        len: usize,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Operation attempted on a closed raster
    #[error("Raster file is closed")]
    Closed,
}

/// Broad classification of errors, used by callers that only need to know
/// whether a failure is their fault, the data's, the store's or the file state's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller bug: bad coordinates, buffer sizes or types
    Precondition,
    /// Data cannot be represented in the working layout
    UnsupportedFormat,
    /// Open/create/read/write failure at the store boundary
    Resource,
    /// Operation on a closed raster
    State,
}

impl Error {
    /// Returns the kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::OutOfBounds(_)
            | Error::BufferSize { .. }
            | Error::DataTypeMismatch { .. }
            | Error::PaletteIndex { .. }
            | Error::Config(_) => ErrorKind::Precondition,
            Error::Unsupported(_) | Error::Precision(_) | Error::NotNorthUp(..) => {
                ErrorKind::UnsupportedFormat
            }
            Error::Io(_)
            | Error::NotFound(_)
            | Error::InvalidFormat(_)
            | Error::InvalidMagic(_)
            | Error::MissingTag(_)
            | Error::Store(_) => ErrorKind::Resource,
            Error::Closed => ErrorKind::State,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Config(error.to_string())
    }
}
