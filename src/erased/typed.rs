//! The generic implementor behind every erased array

use super::lazy::{LazyExpression, Snapshot};
use super::{ArrayKind, ErasedArray};
use crate::broadcast::full_region;
use crate::chunked::{ChunkGrid, ChunkedArray};
use crate::error::{DynArrayError, Result};
use crate::registry::{self, TypeIndex};
use crate::slice::{region_view, region_view_mut, slice_view, SliceSpec};
use crate::types::{DType, Element};
use ndarray::{ArrayD, ArrayViewMutD, CowArray, IxDyn};
use once_cell::sync::OnceCell;
use serde_json::{json, Value};
use std::any::Any;
use std::ops::Range;
use std::sync::Arc;

#[derive(Debug)]
struct CachedExpression<T: Element> {
    expression: Box<dyn LazyExpression<T>>,
    cache: OnceCell<ArrayD<T>>,
}

impl<T: Element> CachedExpression<T> {
    fn values(&self) -> Result<&ArrayD<T>> {
        self.cache.get_or_try_init(|| self.expression.evaluate())
    }
}

#[derive(Debug)]
enum Backing<T: Element> {
    Dense(ArrayD<T>),
    Scalar(ArrayD<T>),
    Expression(CachedExpression<T>),
    Chunked(Box<dyn ChunkedArray<T>>),
}

impl<T: Element> Clone for Backing<T> {
    fn clone(&self) -> Self {
        match self {
            Backing::Dense(values) => Backing::Dense(values.clone()),
            Backing::Scalar(values) => Backing::Scalar(values.clone()),
            Backing::Expression(cached) => Backing::Expression(CachedExpression {
                expression: cached.expression.clone_box(),
                cache: cached.cache.clone(),
            }),
            Backing::Chunked(store) => Backing::Chunked(store.clone_box()),
        }
    }
}

/// Erased array holding elements of type `T`
#[derive(Debug, Clone)]
pub struct TypedArray<T: Element> {
    backing: Backing<T>,
    metadata: Value,
    type_index: TypeIndex,
}

fn default_metadata<T: Element>() -> Value {
    json!({ "data_type": T::DTYPE.data_type_tag() })
}

impl<T: Element> TypedArray<T> {
    fn with_backing(backing: Backing<T>) -> Self {
        Self {
            backing,
            metadata: default_metadata::<T>(),
            type_index: registry::register::<T>(),
        }
    }

    /// Empty dense array stored by the registry; must not touch the registry itself
    pub(crate) fn prototype(type_index: TypeIndex) -> Self {
        Self {
            backing: Backing::Dense(ArrayD::default(IxDyn(&[0]))),
            metadata: default_metadata::<T>(),
            type_index,
        }
    }

    pub fn dense(values: ArrayD<T>) -> Self {
        Self::with_backing(Backing::Dense(values))
    }

    pub fn scalar(value: T) -> Self {
        Self::with_backing(Backing::Scalar(ArrayD::from_elem(IxDyn(&[]), value)))
    }

    pub fn expression(expression: Box<dyn LazyExpression<T>>) -> Self {
        Self::with_backing(Backing::Expression(CachedExpression {
            expression,
            cache: OnceCell::new(),
        }))
    }

    pub fn chunked(store: Box<dyn ChunkedArray<T>>) -> Self {
        Self::with_backing(Backing::Chunked(store))
    }

    /// Borrow the dense buffer (materializing a cached expression).
    ///
    /// Chunked arrays have no single buffer; use [`TypedArray::to_dense`].
    pub fn array(&self) -> Result<&ArrayD<T>> {
        match &self.backing {
            Backing::Dense(values) | Backing::Scalar(values) => Ok(values),
            Backing::Expression(cached) => cached.values(),
            Backing::Chunked(_) => Err(DynArrayError::unsupported(
                "chunked arrays have no dense buffer",
            )),
        }
    }

    /// Mutable access, only for owning dense arrays
    pub fn array_mut(&mut self) -> Result<&mut ArrayD<T>> {
        let kind = self.kind();
        match &mut self.backing {
            Backing::Dense(values) => Ok(values),
            _ => Err(DynArrayError::unsupported(format!(
                "{:?} arrays do not expose a mutable buffer",
                kind
            ))),
        }
    }

    pub fn as_chunked(&self) -> Option<&dyn ChunkedArray<T>> {
        match &self.backing {
            Backing::Chunked(store) => Some(store.as_ref()),
            _ => None,
        }
    }

    pub fn as_chunked_mut(&mut self) -> Option<&mut (dyn ChunkedArray<T> + 'static)> {
        match &mut self.backing {
            Backing::Chunked(store) => Some(store.as_mut()),
            _ => None,
        }
    }

    /// Values of the whole array, or of `ranges` only
    pub fn read_region(&self, ranges: Option<&[Range<usize>]>) -> Result<CowArray<'_, T, IxDyn>> {
        if let Backing::Chunked(store) = &self.backing {
            let values = match ranges {
                Some(ranges) => store.read_region(ranges)?,
                None => store.to_dense()?,
            };
            return Ok(CowArray::from(values));
        }
        let view = self.array()?.view();
        let view = match ranges {
            Some(ranges) => region_view(view, ranges)?,
            None => view,
        };
        Ok(CowArray::from(view))
    }

    pub fn to_dense(&self) -> Result<ArrayD<T>> {
        Ok(self.read_region(None)?.into_owned())
    }

    /// Write `shape`-shaped values produced by `fill`.
    ///
    /// Without `target` the whole array is replaced (a dense buffer is
    /// reallocated if its shape differs); with `target` only that region is
    /// written.
    pub fn write<F>(&mut self, target: Option<&[Range<usize>]>, shape: &[usize], fill: F) -> Result<()>
    where
        F: FnOnce(ArrayViewMutD<'_, T>) -> Result<()>,
    {
        match &mut self.backing {
            Backing::Dense(values) => match target {
                Some(ranges) => fill(region_view_mut(values.view_mut(), ranges)?),
                None => {
                    if values.shape() != shape {
                        *values = ArrayD::default(IxDyn(shape));
                    }
                    fill(values.view_mut())
                }
            },
            Backing::Scalar(_) => Err(DynArrayError::unsupported("scalar arrays are read-only")),
            Backing::Expression(cached) => {
                if !cached.expression.is_assignable() {
                    return Err(DynArrayError::unsupported("expression is not assignable"));
                }
                let mut staged = ArrayD::default(IxDyn(shape));
                fill(staged.view_mut())?;
                cached.expression.assign(target, staged.view())?;
                cached.cache = OnceCell::new();
                Ok(())
            }
            Backing::Chunked(store) => {
                let mut staged = ArrayD::default(IxDyn(shape));
                fill(staged.view_mut())?;
                match target {
                    Some(ranges) => store.write_region(ranges, staged.view()),
                    None => {
                        let ranges = full_region(store.shape());
                        store.write_region(&ranges, staged.view())
                    }
                }
            }
        }
    }

    /// Take over another array's dense buffer
    pub(crate) fn steal(&mut self, other: TypedArray<T>) -> Result<()> {
        match (&mut self.backing, other.backing) {
            (Backing::Dense(values), Backing::Dense(stolen)) => {
                *values = stolen;
                Ok(())
            }
            _ => Err(DynArrayError::unsupported("only dense buffers can be moved")),
        }
    }

    fn view_of(&self, slices: &[SliceSpec]) -> Result<ArrayD<T>> {
        let values = self.read_region(None)?;
        Ok(slice_view(values.view(), slices)?.to_owned())
    }
}

impl<T: Element> From<ArrayD<T>> for TypedArray<T> {
    fn from(values: ArrayD<T>) -> Self {
        Self::dense(values)
    }
}

impl<T: Element> ErasedArray for TypedArray<T> {
    fn type_index(&self) -> TypeIndex {
        self.type_index
    }

    fn dtype(&self) -> DType {
        T::DTYPE
    }

    fn type_name(&self) -> &'static str {
        T::NAME
    }

    fn kind(&self) -> ArrayKind {
        match self.backing {
            Backing::Dense(_) => ArrayKind::Dense,
            Backing::Scalar(_) => ArrayKind::Scalar,
            Backing::Expression(_) => ArrayKind::Expression,
            Backing::Chunked(_) => ArrayKind::Chunked,
        }
    }

    fn clone_box(&self) -> Box<dyn ErasedArray> {
        Box::new(self.clone())
    }

    fn make_view(&self, slices: &[SliceSpec]) -> Result<Box<dyn ErasedArray>> {
        let expression = match &self.backing {
            Backing::Expression(cached) => match cached.expression.make_view(slices) {
                Some(view) => view?,
                None => {
                    let values = slice_view(cached.values()?.view(), slices)?.to_owned();
                    Box::new(Snapshot(Arc::new(values)))
                }
            },
            _ => Box::new(Snapshot(Arc::new(self.view_of(slices)?))),
        };
        let mut view = TypedArray::expression(expression);
        view.metadata = self.metadata.clone();
        Ok(Box::new(view))
    }

    fn metadata(&self) -> &Value {
        &self.metadata
    }

    fn set_metadata(&mut self, metadata: Value) {
        self.metadata = metadata;
    }

    fn shape(&self) -> Vec<usize> {
        match &self.backing {
            Backing::Dense(values) | Backing::Scalar(values) => values.shape().to_vec(),
            Backing::Expression(cached) => cached.expression.shape(),
            Backing::Chunked(store) => store.shape().to_vec(),
        }
    }

    fn resize(&mut self, shape: &[usize]) -> Result<()> {
        let current = self.shape();
        match &mut self.backing {
            Backing::Dense(values) => {
                if current != shape {
                    *values = ArrayD::default(IxDyn(shape));
                }
                Ok(())
            }
            Backing::Scalar(_) => Err(DynArrayError::unsupported("cannot resize a scalar")),
            Backing::Expression(cached) if cached.expression.is_assignable() && current == shape => {
                Ok(())
            }
            Backing::Expression(_) => Err(DynArrayError::unsupported(
                "cannot resize an expression",
            )),
            // Chunked storage belongs to its owner; only a same-shape resize succeeds.
            Backing::Chunked(_) if current == shape => Ok(()),
            Backing::Chunked(_) => Err(DynArrayError::unsupported(format!(
                "cannot resize chunked array of shape {:?} to {:?}",
                current, shape
            ))),
        }
    }

    fn is_assignable(&self) -> bool {
        match &self.backing {
            Backing::Dense(_) | Backing::Chunked(_) => true,
            Backing::Scalar(_) => false,
            Backing::Expression(cached) => cached.expression.is_assignable(),
        }
    }

    fn chunk_grid(&self) -> Option<ChunkGrid> {
        self.as_chunked().map(|store| store.grid().clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}
