//! Conversions between raw byte arrays and ndarray arrays
//!
//! A [`RawArray`] stores elements little-endian in row-major order. Reading
//! copies element by element, so neither alignment nor the host byte order
//! matter; writing walks the array in logical order, so any layout works.

use crate::error::RawArrayError;
use crate::types::{Element, RawArray, RawArrayView};
use ndarray::{ArrayD, ArrayViewD, IxDyn};

/// Element types with a fixed little-endian byte encoding
pub trait RawElement: Element {
    fn write_le(self, out: &mut Vec<u8>);

    /// Decode from exactly `DTYPE.element_size()` bytes
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! raw_element {
    ($($t:ty),*) => {$(
        impl RawElement for $t {
            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn read_le(bytes: &[u8]) -> Self {
                let mut buffer = [0u8; std::mem::size_of::<$t>()];
                buffer.copy_from_slice(bytes);
                <$t>::from_le_bytes(buffer)
            }
        }
    )*};
}

raw_element!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl RawElement for bool {
    fn write_le(self, out: &mut Vec<u8>) {
        out.push(u8::from(self));
    }

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

fn decode<T: RawElement>(raw: &RawArrayView<'_>) -> Result<ArrayD<T>, RawArrayError> {
    if T::DTYPE != raw.dtype {
        return Err(RawArrayError::DTypeMismatch {
            expected: T::DTYPE,
            actual: raw.dtype,
        });
    }
    raw.validate()?;

    let elements: Vec<T> = raw
        .data
        .chunks_exact(raw.dtype.element_size())
        .map(T::read_le)
        .collect();
    ArrayD::from_shape_vec(IxDyn(&raw.dims()?), elements).map_err(|_| RawArrayError::ShapeMismatch {
        shape: raw.shape.clone(),
        data_len: raw.data.len(),
    })
}

impl RawArray {
    /// Encode any ndarray view, whatever its memory layout
    pub fn from_ndarray<T: RawElement>(values: ArrayViewD<'_, T>) -> Self {
        let shape: Vec<u64> = values.shape().iter().map(|&d| d as u64).collect();
        let mut data = Vec::with_capacity(values.len() * T::DTYPE.element_size());
        for &value in values.iter() {
            value.write_le(&mut data);
        }
        RawArray::new(T::DTYPE, shape, data)
    }

    /// Decode into an owned ndarray array
    pub fn to_ndarray<T: RawElement>(&self) -> Result<ArrayD<T>, RawArrayError> {
        decode(&self.view())
    }
}

impl RawArrayView<'_> {
    pub fn to_ndarray<T: RawElement>(&self) -> Result<ArrayD<T>, RawArrayError> {
        decode(self)
    }
}
