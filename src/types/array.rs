//! Raw typed byte arrays

use super::DType;
use crate::error::RawArrayError;

/// Owned array as a dtype tag, a shape and little-endian element bytes.
///
/// This is the form in which a caller typically holds data whose element type
/// is only known at runtime, e.g. after reading a file.
#[derive(Debug, Clone, PartialEq)]
pub struct RawArray {
    pub dtype: DType,
    pub shape: Vec<u64>,
    pub data: Vec<u8>,
}

impl RawArray {
    pub fn new(dtype: DType, shape: Vec<u64>, data: Vec<u8>) -> Self {
        Self { dtype, shape, data }
    }

    pub fn num_elements(&self) -> Result<u64, RawArrayError> {
        self.view().num_elements()
    }

    /// Expected data size in bytes
    pub fn expected_size(&self) -> Result<u64, RawArrayError> {
        self.view().expected_size()
    }

    pub fn view(&self) -> RawArrayView<'_> {
        RawArrayView {
            dtype: self.dtype,
            shape: self.shape.clone(),
            data: &self.data,
        }
    }
}

/// Borrowed counterpart of [`RawArray`]
#[derive(Debug, Clone)]
pub struct RawArrayView<'a> {
    pub dtype: DType,
    pub shape: Vec<u64>,
    pub data: &'a [u8],
}

impl<'a> RawArrayView<'a> {
    fn overflow(&self) -> RawArrayError {
        RawArrayError::ShapeMismatch {
            shape: self.shape.clone(),
            data_len: self.data.len(),
        }
    }

    /// Element count; a shape whose product overflows is rejected
    pub fn num_elements(&self) -> Result<u64, RawArrayError> {
        self.shape
            .iter()
            .try_fold(1u64, |count, &dim| count.checked_mul(dim))
            .ok_or_else(|| self.overflow())
    }

    pub fn expected_size(&self) -> Result<u64, RawArrayError> {
        self.num_elements()?
            .checked_mul(self.dtype.element_size() as u64)
            .ok_or_else(|| self.overflow())
    }

    /// Shape as ndarray dimensions
    pub fn dims(&self) -> Result<Vec<usize>, RawArrayError> {
        self.shape
            .iter()
            .map(|&dim| usize::try_from(dim).map_err(|_| self.overflow()))
            .collect()
    }

    /// Check that the byte length matches shape and dtype
    pub fn validate(&self) -> Result<(), RawArrayError> {
        if self.data.len() as u64 == self.expected_size()? {
            Ok(())
        } else {
            Err(self.overflow())
        }
    }

    pub fn to_owned(&self) -> RawArray {
        RawArray::new(self.dtype, self.shape.clone(), self.data.to_vec())
    }
}
