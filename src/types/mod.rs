//! Core element and buffer types

mod array;
mod dtype;
mod element;
mod special;

pub use array::{RawArray, RawArrayView};
pub use dtype::DType;
pub use element::{
    ArithElement, ArithmeticConversion, Element, FloatElement, IntElement, Promote, Promoted,
    Scalar,
};
