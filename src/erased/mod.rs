//! Type-erased array interface
//!
//! [`ErasedArray`] is the single non-generic vtable behind every
//! [`DynArray`](crate::DynArray). Its only implementor is [`TypedArray<T>`],
//! whose backing decides the variant: owning dense, scalar, cached lazy
//! expression or chunked.

mod lazy;
mod typed;

pub use lazy::{Generator, LazyExpression, SharedSlice};
pub use typed::TypedArray;

use crate::broadcast::broadcast_into;
use crate::chunked::ChunkGrid;
use crate::error::{DynArrayError, Result};
use crate::registry::TypeIndex;
use crate::slice::SliceSpec;
use crate::types::{DType, Element};
use serde_json::Value;
use std::any::Any;
use std::fmt;

/// Which backing an erased array has
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayKind {
    /// Owns a dense buffer
    Dense,
    /// Owns a single value; never resized or assigned
    Scalar,
    /// Lazily materializes an external expression
    Expression,
    /// Wraps a chunked array
    Chunked,
}

/// Array whose element type is only known at runtime
pub trait ErasedArray: Any + Send + Sync + fmt::Debug {
    fn type_index(&self) -> TypeIndex;

    fn dtype(&self) -> DType;

    fn type_name(&self) -> &'static str;

    fn kind(&self) -> ArrayKind;

    /// Deep copy preserving the concrete type
    fn clone_box(&self) -> Box<dyn ErasedArray>;

    /// Strided sub-view, itself erased
    fn make_view(&self, slices: &[SliceSpec]) -> Result<Box<dyn ErasedArray>>;

    fn metadata(&self) -> &Value;

    fn set_metadata(&mut self, metadata: Value);

    fn shape(&self) -> Vec<usize>;

    fn dimension(&self) -> usize {
        self.shape().len()
    }

    /// Reshape the storage; existing values are not preserved
    fn resize(&mut self, shape: &[usize]) -> Result<()>;

    /// Broadcast this array's shape into `shape`; returns whether it was trivial.
    ///
    /// Leaf arrays have nothing to cache, so `reuse_cache` is ignored.
    fn broadcast_shape(&self, shape: &mut Vec<usize>, _reuse_cache: bool) -> Result<bool> {
        broadcast_into(shape, &self.shape())
    }

    fn is_assignable(&self) -> bool;

    fn chunk_grid(&self) -> Option<ChunkGrid>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

/// Typed view of an erased array
pub fn downcast<T: Element>(array: &dyn ErasedArray) -> Result<&TypedArray<T>> {
    array
        .as_any()
        .downcast_ref::<TypedArray<T>>()
        .ok_or_else(|| DynArrayError::TypeMismatch {
            expected: T::NAME,
            actual: array.type_name(),
        })
}

pub fn downcast_mut<T: Element>(array: &mut dyn ErasedArray) -> Result<&mut TypedArray<T>> {
    let actual = array.type_name();
    array
        .as_any_mut()
        .downcast_mut::<TypedArray<T>>()
        .ok_or(DynArrayError::TypeMismatch {
            expected: T::NAME,
            actual,
        })
}
