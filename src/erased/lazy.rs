//! Lazy expressions wrapped by the cached-expression variant

use crate::error::{DynArrayError, Result};
use crate::slice::{region_view_mut, slice_view, slice_view_mut, view_shape, SliceSpec};
use crate::types::Element;
use ndarray::{ArrayD, ArrayViewD, Dimension, IxDyn};
use std::fmt;
use std::ops::Range;
use std::sync::{Arc, PoisonError, RwLock};

/// Statically typed expression evaluated on first read
pub trait LazyExpression<T: Element>: Send + Sync + fmt::Debug {
    fn shape(&self) -> Vec<usize>;

    fn evaluate(&self) -> Result<ArrayD<T>>;

    fn clone_box(&self) -> Box<dyn LazyExpression<T>>;

    /// Whether writes reach some owned storage
    fn is_assignable(&self) -> bool {
        false
    }

    fn assign(&mut self, _region: Option<&[Range<usize>]>, _values: ArrayViewD<'_, T>) -> Result<()> {
        Err(DynArrayError::unsupported("expression is not assignable"))
    }

    /// Lazy sub-view, when the expression can express one without evaluating
    fn make_view(&self, _slices: &[SliceSpec]) -> Option<Result<Box<dyn LazyExpression<T>>>> {
        None
    }
}

/// Expression computing every element from its index
#[derive(Clone)]
pub struct Generator<T: Element> {
    shape: Vec<usize>,
    function: Arc<dyn Fn(&[usize]) -> T + Send + Sync>,
}

impl<T: Element> Generator<T> {
    pub fn new(shape: Vec<usize>, function: impl Fn(&[usize]) -> T + Send + Sync + 'static) -> Self {
        Self {
            shape,
            function: Arc::new(function),
        }
    }
}

impl<T: Element> fmt::Debug for Generator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator").field("shape", &self.shape).finish_non_exhaustive()
    }
}

impl<T: Element> LazyExpression<T> for Generator<T> {
    fn shape(&self) -> Vec<usize> {
        self.shape.clone()
    }

    fn evaluate(&self) -> Result<ArrayD<T>> {
        Ok(ArrayD::from_shape_fn(IxDyn(&self.shape), |index| {
            (self.function)(index.slice())
        }))
    }

    fn clone_box(&self) -> Box<dyn LazyExpression<T>> {
        Box::new(self.clone())
    }
}

/// Strided view into storage shared with the caller.
///
/// Reads and writes go through the lock, so a `DynArray` built from it is
/// assignable and its writes are visible to every other holder of the storage.
#[derive(Debug)]
pub struct SharedSlice<T: Element> {
    storage: Arc<RwLock<ArrayD<T>>>,
    slices: Vec<Vec<SliceSpec>>,
    shape: Vec<usize>,
}

impl<T: Element> SharedSlice<T> {
    /// View of the whole storage
    pub fn new(storage: Arc<RwLock<ArrayD<T>>>) -> Self {
        let shape = storage
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .shape()
            .to_vec();
        Self {
            storage,
            slices: Vec::new(),
            shape,
        }
    }

    pub fn sliced(storage: Arc<RwLock<ArrayD<T>>>, slices: &[SliceSpec]) -> Result<Self> {
        Self::new(storage).slice(slices)
    }

    fn slice(mut self, slices: &[SliceSpec]) -> Result<Self> {
        self.shape = view_shape(slices, &self.shape)?;
        self.slices.push(slices.to_vec());
        Ok(self)
    }

    pub fn storage(&self) -> &Arc<RwLock<ArrayD<T>>> {
        &self.storage
    }
}

impl<T: Element> LazyExpression<T> for SharedSlice<T> {
    fn shape(&self) -> Vec<usize> {
        self.shape.clone()
    }

    fn evaluate(&self) -> Result<ArrayD<T>> {
        let storage = self.storage.read().unwrap_or_else(PoisonError::into_inner);
        let mut view = storage.view();
        for slices in &self.slices {
            view = slice_view(view, slices)?;
        }
        Ok(view.to_owned())
    }

    /// Deep copy: the clone gets storage of its own
    fn clone_box(&self) -> Box<dyn LazyExpression<T>> {
        let copy = self
            .storage
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Box::new(SharedSlice {
            storage: Arc::new(RwLock::new(copy)),
            slices: self.slices.clone(),
            shape: self.shape.clone(),
        })
    }

    fn is_assignable(&self) -> bool {
        true
    }

    fn assign(&mut self, region: Option<&[Range<usize>]>, values: ArrayViewD<'_, T>) -> Result<()> {
        let mut storage = self.storage.write().unwrap_or_else(PoisonError::into_inner);
        let mut view = storage.view_mut();
        for slices in &self.slices {
            view = slice_view_mut(view, slices)?;
        }
        if let Some(ranges) = region {
            view = region_view_mut(view, ranges)?;
        }
        if view.shape() != values.shape() {
            return Err(DynArrayError::Broadcast {
                from: values.shape().to_vec(),
                into: view.shape().to_vec(),
            });
        }
        view.assign(&values);
        Ok(())
    }

    fn make_view(&self, slices: &[SliceSpec]) -> Option<Result<Box<dyn LazyExpression<T>>>> {
        let view = SharedSlice {
            storage: Arc::clone(&self.storage),
            slices: self.slices.clone(),
            shape: self.shape.clone(),
        };
        Some(view.slice(slices).map(|v| Box::new(v) as Box<dyn LazyExpression<T>>))
    }
}

/// Already materialized values, used for views of non-lazy arrays
#[derive(Debug, Clone)]
pub(crate) struct Snapshot<T: Element>(pub(crate) Arc<ArrayD<T>>);

impl<T: Element> LazyExpression<T> for Snapshot<T> {
    fn shape(&self) -> Vec<usize> {
        self.0.shape().to_vec()
    }

    fn evaluate(&self) -> Result<ArrayD<T>> {
        Ok(self.0.as_ref().clone())
    }

    fn clone_box(&self) -> Box<dyn LazyExpression<T>> {
        Box::new(Snapshot(Arc::new(self.0.as_ref().clone())))
    }
}
