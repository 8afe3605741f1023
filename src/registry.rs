//! Process-wide type registry
//!
//! Maps each registered element type to a stable [`TypeIndex`] and keeps an
//! empty prototype array per index. Dispatch resolves result types to indices;
//! the registry turns an index back into a fresh, correctly typed buffer.

use crate::erased::{ErasedArray, TypedArray};
use crate::error::{DynArrayError, Result};
use crate::types::{DType, Element};
use once_cell::sync::Lazy;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// Stable process-wide tag of one registered element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeIndex(usize);

impl TypeIndex {
    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for TypeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Entry {
    dtype: DType,
    name: &'static str,
    prototype: Box<dyn ErasedArray>,
}

#[derive(Default)]
struct Registry {
    indices: HashMap<TypeId, TypeIndex>,
    entries: Vec<Entry>,
}

impl Registry {
    fn with_defaults() -> Self {
        let mut registry = Self::default();
        registry.insert::<f32>();
        registry.insert::<f64>();
        registry.insert::<i32>();
        registry.insert::<u32>();
        registry.insert::<i64>();
        registry.insert::<u64>();
        registry.insert::<bool>();
        registry
    }

    fn insert<T: Element>(&mut self) -> TypeIndex {
        if let Some(&index) = self.indices.get(&TypeId::of::<T>()) {
            return index;
        }
        let index = TypeIndex(self.entries.len());
        self.entries.push(Entry {
            dtype: T::DTYPE,
            name: T::NAME,
            prototype: Box::new(TypedArray::<T>::prototype(index)),
        });
        self.indices.insert(TypeId::of::<T>(), index);
        debug!(element = T::NAME, index = index.get(), "registered element type");
        index
    }
}

static REGISTRY: Lazy<RwLock<Registry>> = Lazy::new(|| RwLock::new(Registry::with_defaults()));

/// Register `T`, returning its index. Idempotent.
pub fn register<T: Element>() -> TypeIndex {
    if let Some(index) = type_index_of::<T>() {
        return index;
    }
    REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert::<T>()
}

/// Index of `T` if it has been registered
pub fn type_index_of<T: Element>() -> Option<TypeIndex> {
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .indices
        .get(&TypeId::of::<T>())
        .copied()
}

/// Fresh empty array of the type registered at `index`
pub fn allocate(index: TypeIndex) -> Result<Box<dyn ErasedArray>> {
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .entries
        .get(index.0)
        .map(|entry| entry.prototype.clone_box())
        .ok_or(DynArrayError::UnknownTypeIndex(index.0))
}

pub fn dtype(index: TypeIndex) -> Option<DType> {
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .entries
        .get(index.0)
        .map(|entry| entry.dtype)
}

/// Element type name for diagnostics, `"?"` for unknown indices
pub fn type_name(index: TypeIndex) -> &'static str {
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .entries
        .get(index.0)
        .map_or("?", |entry| entry.name)
}

/// Every registered type, in index order
pub fn registered() -> Vec<(TypeIndex, DType)> {
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .entries
        .iter()
        .enumerate()
        .map(|(i, entry)| (TypeIndex(i), entry.dtype))
        .collect()
}

pub(crate) fn init() {
    Lazy::force(&REGISTRY);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::erased::ArrayKind;

    #[test]
    fn defaults_come_first() {
        assert_eq!(type_index_of::<f32>(), Some(TypeIndex(0)));
        assert_eq!(type_index_of::<f64>(), Some(TypeIndex(1)));
        assert_eq!(type_index_of::<u64>(), Some(TypeIndex(5)));
        assert_eq!(type_name(TypeIndex(6)), "bool");
    }

    #[test]
    fn register_is_idempotent() {
        let first = register::<i16>();
        let second = register::<i16>();
        assert_eq!(first, second);
        assert_eq!(dtype(first), Some(DType::I16));
    }

    #[test]
    fn allocate_clones_prototype() {
        let index = register::<f64>();
        let array = allocate(index).unwrap();
        assert_eq!(array.type_index(), index);
        assert_eq!(array.dtype(), DType::F64);
        assert_eq!(array.kind(), ArrayKind::Dense);
    }

    #[test]
    fn unknown_index() {
        let err = allocate(TypeIndex(usize::MAX)).unwrap_err();
        assert_eq!(err, DynArrayError::UnknownTypeIndex(usize::MAX));
        assert_eq!(type_name(TypeIndex(usize::MAX)), "?");
    }
}
