//! Error types for dynarray

use crate::types::DType;
use std::error::Error;
use std::fmt;
use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, DynArrayError>;

/// Errors raised by erased arrays, dispatch and expression evaluation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DynArrayError {
    /// No kernel registered for the operand type(s) of an operation
    #[error("no kernel registered for {op} on ({types})")]
    UnregisteredCombination { op: String, types: String },

    /// A type index that the registry never handed out
    #[error("unknown type index {0}")]
    UnknownTypeIndex(usize),

    /// Resize/assign against a variant that does not support it
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Typed access with the wrong element type
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// Two shapes that cannot be broadcast together
    #[error("cannot broadcast shape {from:?} into {into:?}")]
    Broadcast { from: Vec<usize>, into: Vec<usize> },

    /// Any other shape problem (bad axis, bad slice, bad region)
    #[error("shape error: {0}")]
    Shape(String),

    /// amin/amax over an empty lane without an initial value
    #[error("reduction over an empty lane has no identity")]
    EmptyReduction,

    /// Integer division or remainder by zero
    #[error("arithmetic error: {0}")]
    Arithmetic(String),

    /// Raw byte buffer conversion failure
    #[error(transparent)]
    Raw(#[from] RawArrayError),
}

impl DynArrayError {
    pub(crate) fn unsupported(message: impl Into<String>) -> Self {
        DynArrayError::UnsupportedOperation(message.into())
    }

    pub(crate) fn shape(message: impl Into<String>) -> Self {
        DynArrayError::Shape(message.into())
    }
}

/// Error for converting between raw byte arrays and typed arrays
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawArrayError {
    /// DType mismatch between expected and actual
    DTypeMismatch { expected: DType, actual: DType },
    /// Shape doesn't match data length
    ShapeMismatch { shape: Vec<u64>, data_len: usize },
}

impl fmt::Display for RawArrayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawArrayError::DTypeMismatch { expected, actual } => {
                write!(
                    f,
                    "DType mismatch: expected {:?}, got {:?}",
                    expected, actual
                )
            }
            RawArrayError::ShapeMismatch { shape, data_len } => {
                write!(
                    f,
                    "Shape {:?} doesn't match data length {}",
                    shape, data_len
                )
            }
        }
    }
}

impl Error for RawArrayError {}
