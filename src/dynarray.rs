//! The user-facing erased array handle

use crate::assign::{assign_expression, AssignReport};
use crate::chunked::ChunkedArray;
use crate::dispatch::{self, Input, KernelArgs};
use crate::erased::{downcast, downcast_mut, ArrayKind, ErasedArray, LazyExpression, TypedArray};
use crate::error::{DynArrayError, Result};
use crate::expression::Expr;
use crate::registry::{self, TypeIndex};
use crate::slice::SliceSpec;
use crate::types::{DType, Element, RawArray, RawArrayView};
use ndarray::{Array, ArrayD, Dimension};
use serde_json::Value;
use tracing::debug;

/// Runs `$body` with `$t` bound to the element type of `$dtype`
macro_rules! for_dtype {
    ($dtype:expr, $t:ident => $body:expr) => {
        match $dtype {
            DType::U8 => {
                type $t = u8;
                $body
            }
            DType::I8 => {
                type $t = i8;
                $body
            }
            DType::U16 => {
                type $t = u16;
                $body
            }
            DType::I16 => {
                type $t = i16;
                $body
            }
            DType::U32 => {
                type $t = u32;
                $body
            }
            DType::I32 => {
                type $t = i32;
                $body
            }
            DType::U64 => {
                type $t = u64;
                $body
            }
            DType::I64 => {
                type $t = i64;
                $body
            }
            DType::F32 => {
                type $t = f32;
                $body
            }
            DType::F64 => {
                type $t = f64;
                $body
            }
            DType::Bool => {
                type $t = bool;
                $body
            }
        }
    };
}

/// Array whose element type is decided at runtime.
///
/// Cloning is deep: the clone never shares element storage with the
/// original. Arithmetic on `&DynArray` builds a lazy [`Expr`] which is only
/// evaluated by [`DynArray::assign`] or [`DynArray::try_from`].
#[derive(Debug)]
pub struct DynArray {
    inner: Box<dyn ErasedArray>,
}

impl Clone for DynArray {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone_box(),
        }
    }
}

impl DynArray {
    pub fn from_erased(inner: Box<dyn ErasedArray>) -> Self {
        Self { inner }
    }

    pub fn into_erased(self) -> Box<dyn ErasedArray> {
        self.inner
    }

    /// Empty dense array of a registered type
    pub fn empty(type_index: TypeIndex) -> Result<Self> {
        registry::allocate(type_index).map(Self::from_erased)
    }

    /// Read-only zero-dimensional array
    pub fn from_scalar<T: Element>(value: T) -> Self {
        Self::from_erased(Box::new(TypedArray::scalar(value)))
    }

    pub fn from_chunked<T: Element>(store: impl ChunkedArray<T> + 'static) -> Self {
        Self::from_erased(Box::new(TypedArray::chunked(Box::new(store))))
    }

    /// Wrap an expression evaluated (once) on first read
    pub fn from_expression<T: Element>(expression: impl LazyExpression<T> + 'static) -> Self {
        Self::from_erased(Box::new(TypedArray::expression(Box::new(expression))))
    }

    /// Decode a raw little-endian buffer into a dense array of its dtype
    pub fn from_raw(raw: RawArrayView<'_>) -> Result<Self> {
        Ok(for_dtype!(raw.dtype, T => {
            Self::from_erased(Box::new(TypedArray::dense(raw.to_ndarray::<T>()?)))
        }))
    }

    /// Encode the values, materializing expressions and chunks
    pub fn to_raw(&self) -> Result<RawArray> {
        for_dtype!(self.dtype(), T => {
            let values = self.typed::<T>()?.read_region(None)?;
            Ok(RawArray::from_ndarray(values.view()))
        })
    }

    pub fn typed<T: Element>(&self) -> Result<&TypedArray<T>> {
        downcast(self.inner.as_ref())
    }

    pub fn typed_mut<T: Element>(&mut self) -> Result<&mut TypedArray<T>> {
        downcast_mut(self.inner.as_mut())
    }

    /// Borrow the values as `T`; fails on a type mismatch or a chunked array
    pub fn array<T: Element>(&self) -> Result<&ArrayD<T>> {
        self.typed::<T>()?.array()
    }

    pub fn array_mut<T: Element>(&mut self) -> Result<&mut ArrayD<T>> {
        self.typed_mut::<T>()?.array_mut()
    }

    /// Whether [`DynArray::array`] would succeed for `T`
    pub fn can_get_array<T: Element>(&self) -> bool {
        self.typed::<T>().is_ok_and(|typed| typed.as_chunked().is_none())
    }

    /// Owned copy of every value as `T`, whatever the backing
    pub fn to_dense<T: Element>(&self) -> Result<ArrayD<T>> {
        self.typed::<T>()?.to_dense()
    }

    pub fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    pub fn shape(&self) -> Vec<usize> {
        self.inner.shape()
    }

    pub fn resize(&mut self, shape: &[usize]) -> Result<()> {
        self.inner.resize(shape)
    }

    pub fn broadcast_shape(&self, shape: &mut Vec<usize>, reuse_cache: bool) -> Result<bool> {
        self.inner.broadcast_shape(shape, reuse_cache)
    }

    pub fn metadata(&self) -> &Value {
        self.inner.metadata()
    }

    pub fn set_metadata(&mut self, metadata: Value) {
        self.inner.set_metadata(metadata);
    }

    pub fn type_index(&self) -> TypeIndex {
        self.inner.type_index()
    }

    pub fn dtype(&self) -> DType {
        self.inner.dtype()
    }

    pub fn type_name(&self) -> &'static str {
        self.inner.type_name()
    }

    pub fn kind(&self) -> ArrayKind {
        self.inner.kind()
    }

    pub fn is_chunked(&self) -> bool {
        self.kind() == ArrayKind::Chunked
    }

    pub fn is_assignable(&self) -> bool {
        self.inner.is_assignable()
    }

    /// The wrapped chunked array, if this is one holding `T`
    pub fn as_chunked_array<T: Element>(&self) -> Option<&dyn ChunkedArray<T>> {
        self.typed::<T>().ok()?.as_chunked()
    }

    pub fn as_chunked_array_mut<T: Element>(&mut self) -> Option<&mut (dyn ChunkedArray<T> + 'static)> {
        self.typed_mut::<T>().ok()?.as_chunked_mut()
    }

    /// Strided sub-view carrying a copy of the metadata
    pub fn make_view(&self, slices: &[SliceSpec]) -> Result<DynArray> {
        self.inner.make_view(slices).map(Self::from_erased)
    }

    pub fn as_erased(&self) -> &dyn ErasedArray {
        self.inner.as_ref()
    }

    pub fn as_erased_mut(&mut self) -> &mut dyn ErasedArray {
        self.inner.as_mut()
    }

    /// Evaluate `expr` into this array, converting to its element type
    pub fn assign<'a>(&mut self, expr: impl Into<Expr<'a>>) -> Result<()> {
        self.assign_report(expr).map(|_| ())
    }

    /// Like [`DynArray::assign`], also reporting temporaries and chunks used
    pub fn assign_report<'a>(&mut self, expr: impl Into<Expr<'a>>) -> Result<AssignReport> {
        let expr = expr.into();
        let resolved = expr.resolve()?;
        let report = assign_expression(self.inner.as_mut(), &resolved)?;
        debug!(
            element = self.type_name(),
            shape = ?self.shape(),
            temporaries = report.temporaries,
            chunks = report.chunks,
            "assigned expression"
        );
        Ok(report)
    }

    /// Copy `other` into this array, converting to this array's element type
    pub fn assign_from(&mut self, other: &DynArray) -> Result<()> {
        if !self.is_assignable() {
            return Err(not_assignable(self));
        }
        let shape = other.shape();
        self.inner.resize(&shape)?;
        let args = KernelArgs {
            shape: &shape,
            target: None,
            trivial_broadcast: true,
        };
        dispatch::dispatch_assign(Input::Whole(other.as_erased()), self.inner.as_mut(), &args)
    }

    /// Take over `other`'s values; dense arrays of the same type give up
    /// their buffer instead of being copied
    pub fn move_from(&mut self, other: DynArray) -> Result<()> {
        if !self.is_assignable() {
            return Err(not_assignable(self));
        }
        dispatch::dispatch_move(other.inner, self.inner.as_mut())
    }

    /// Evaluate `expr` into a fresh dense array of the expression's type
    pub fn evaluate<'a>(expr: impl Into<Expr<'a>>) -> Result<Self> {
        Self::try_from(expr.into())
    }
}

fn not_assignable(array: &DynArray) -> DynArrayError {
    DynArrayError::unsupported(format!(
        "{:?} array of {} is not assignable",
        array.kind(),
        array.type_name()
    ))
}

impl<T: Element, D: Dimension> From<Array<T, D>> for DynArray {
    fn from(values: Array<T, D>) -> Self {
        Self::from_erased(Box::new(TypedArray::dense(values.into_dyn())))
    }
}

impl<T: Element> From<TypedArray<T>> for DynArray {
    fn from(array: TypedArray<T>) -> Self {
        Self::from_erased(Box::new(array))
    }
}

impl TryFrom<Expr<'_>> for DynArray {
    type Error = DynArrayError;

    fn try_from(expr: Expr<'_>) -> Result<Self> {
        let resolved = expr.resolve()?;
        let mut inner = resolved.allocate_result()?;
        assign_expression(inner.as_mut(), &resolved)?;
        Ok(Self::from_erased(inner))
    }
}

impl TryFrom<&DynArray> for RawArray {
    type Error = DynArrayError;

    fn try_from(array: &DynArray) -> Result<Self> {
        array.to_raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::erased::Generator;
    use ndarray::{array, IxDyn};
    use serde_json::json;

    #[test]
    fn metadata_defaults_to_data_type() {
        let a = DynArray::from(array![1.5f64, 2.5]);
        assert_eq!(a.metadata(), &json!({ "data_type": "<f8" }));
        assert_eq!(a.dtype(), DType::F64);
        assert_eq!(a.kind(), ArrayKind::Dense);
    }

    #[test]
    fn typed_access_checks_the_element_type() {
        let mut a = DynArray::from(array![[1i32, 2], [3, 4]]);
        assert!(a.can_get_array::<i32>());
        assert!(!a.can_get_array::<f32>());
        assert!(matches!(a.array::<f32>(), Err(DynArrayError::TypeMismatch { .. })));
        a.array_mut::<i32>().unwrap()[IxDyn(&[1, 1])] = 40;
        assert_eq!(a.array::<i32>().unwrap()[IxDyn(&[1, 1])], 40);
    }

    #[test]
    fn raw_roundtrip_keeps_type() {
        let a = DynArray::from(array![[1u16, 2, 3], [4, 5, 6]]);
        let raw = a.to_raw().unwrap();
        assert_eq!(raw.dtype, DType::U16);
        let back = DynArray::from_raw(raw.view()).unwrap();
        assert_eq!(back.type_index(), a.type_index());
        assert_eq!(back.array::<u16>().unwrap(), a.array::<u16>().unwrap());
    }

    #[test]
    fn assign_from_converts() {
        let source = DynArray::from(array![1i32, -2, 3]);
        let mut target = DynArray::from(ArrayD::<f64>::zeros(IxDyn(&[1])));
        target.assign_from(&source).unwrap();
        assert_eq!(target.array::<f64>().unwrap(), &array![1.0, -2.0, 3.0].into_dyn());
    }

    #[test]
    fn move_from_takes_the_buffer() {
        let source = DynArray::from(array![1.0f32, 2.0]);
        let mut target = DynArray::from(ArrayD::<f32>::zeros(IxDyn(&[0])));
        target.move_from(source).unwrap();
        assert_eq!(target.array::<f32>().unwrap(), &array![1.0f32, 2.0].into_dyn());

        let mut scalar = DynArray::from_scalar(1.0f32);
        let source = DynArray::from(array![1.0f32]);
        assert!(scalar.move_from(source).is_err());
    }

    #[test]
    fn expressions_materialize_on_read() {
        let a = DynArray::from_expression(Generator::new(vec![2, 2], |ix: &[usize]| (ix[0] * 2 + ix[1]) as i64));
        assert_eq!(a.kind(), ArrayKind::Expression);
        assert!(!a.is_assignable());
        assert_eq!(a.array::<i64>().unwrap(), &array![[0i64, 1], [2, 3]].into_dyn());
    }
}
