//! Error types for image, field and unit operations.
//!
//! Every fallible operation in this crate returns [`SdcError`]. None of these
//! conditions has a fallback: a missing metadata field or an empty mask means
//! the correction is physically undefined.

use thiserror::Error;

/// Main error type for distortion-correction primitives.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SdcError {
    /// Two images that must share a grid do not.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// A phase-encoding code outside the `axis[sign]` grammar.
    #[error("Invalid phase-encoding direction: {0:?}")]
    InvalidPhaseEncoding(String),

    /// A required acquisition metadata field is absent.
    #[error("Missing metadata field: {field}")]
    MissingMetadata { field: &'static str },

    /// A metadata field is present but physically meaningless.
    #[error("Invalid metadata field {field}: {reason}")]
    InvalidMetadata { field: &'static str, reason: String },

    /// Median requested over a mask with no voxel above zero.
    #[error("Mask selects no voxels")]
    EmptyMask,

    /// First element requested from an empty sequence.
    #[error("Empty sequence: {0}")]
    EmptySequence(String),

    /// Tensor data could not be read back or rebuilt.
    #[error("Tensor data error: {0}")]
    TensorData(String),

    /// Geometry cannot be used for index/physical mapping.
    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// Invalid argument to a unit.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Metadata could not be deserialized.
    #[error("Metadata parse error: {0}")]
    MetadataParse(String),
}

/// Result type for distortion-correction primitives.
pub type Result<T> = std::result::Result<T, SdcError>;

impl SdcError {
    /// Create a shape mismatch error.
    pub fn shape_mismatch(expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    /// Create a tensor data error.
    pub fn tensor_data(msg: impl Into<String>) -> Self {
        Self::TensorData(msg.into())
    }

    /// Create a degenerate geometry error.
    pub fn degenerate_geometry(msg: impl Into<String>) -> Self {
        Self::DegenerateGeometry(msg.into())
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}
