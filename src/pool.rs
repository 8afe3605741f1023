//! Scoped pool of temporary buffers
//!
//! One pool lives for exactly one top-level assignment. Interior expression
//! nodes check buffers out by type index and return them once their parent
//! has consumed them, so a deep tree needs roughly as many temporaries as it
//! has distinct live results rather than one per node.

use crate::erased::{ArrayKind, ErasedArray};
use crate::error::{DynArrayError, Result};
use crate::registry::{self, TypeIndex};
use std::collections::{BTreeMap, HashMap};
use tracing::trace;

/// Handle to a buffer owned (or borrowed) by a [`TemporaryPool`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferId {
    /// The assignment destination, lent to the pool
    Destination,
    Temp(usize),
}

#[derive(Debug)]
pub struct TemporaryPool<'d> {
    destination: Option<&'d mut dyn ErasedArray>,
    temps: Vec<Option<Box<dyn ErasedArray>>>,
    free: BTreeMap<TypeIndex, Vec<BufferId>>,
    /// Results that outlive a single chunk, keyed by the node that made them
    kept: HashMap<usize, BufferId>,
}

impl<'d> TemporaryPool<'d> {
    /// Pool writing its final result into `destination`.
    ///
    /// A dense destination is offered as a free buffer of its own type, so a
    /// node producing that type can write straight into it.
    pub fn new(destination: &'d mut dyn ErasedArray) -> Self {
        let mut free = BTreeMap::new();
        if destination.kind() == ArrayKind::Dense {
            free.insert(destination.type_index(), vec![BufferId::Destination]);
        }
        Self {
            destination: Some(destination),
            temps: Vec::new(),
            free,
            kept: HashMap::new(),
        }
    }

    /// Number of temporaries allocated so far
    pub fn size(&self) -> usize {
        self.temps.len()
    }

    /// Check out a buffer of type `type_index`, resized to `shape`
    pub fn acquire(&mut self, type_index: TypeIndex, shape: &[usize]) -> Result<BufferId> {
        let id = match self.free.get_mut(&type_index).and_then(Vec::pop) {
            Some(id) => id,
            None => {
                self.temps.push(Some(registry::allocate(type_index)?));
                trace!(
                    element = registry::type_name(type_index),
                    temporaries = self.temps.len(),
                    "allocated temporary"
                );
                BufferId::Temp(self.temps.len() - 1)
            }
        };
        self.buffer_mut(id)?.resize(shape)?;
        trace!(?id, ?shape, "checked out buffer");
        Ok(id)
    }

    /// Hold `id` for the rest of the assignment under `key`; it is never released
    pub fn keep(&mut self, key: usize, id: BufferId) {
        self.kept.insert(key, id);
    }

    pub fn kept(&self, key: usize) -> Option<BufferId> {
        self.kept.get(&key).copied()
    }

    /// Return a buffer to the free list
    pub fn release(&mut self, id: BufferId) -> Result<()> {
        let type_index = self.get(id)?.type_index();
        self.free.entry(type_index).or_default().push(id);
        Ok(())
    }

    pub fn get(&self, id: BufferId) -> Result<&dyn ErasedArray> {
        let buffer = match id {
            BufferId::Destination => self.destination.as_deref(),
            BufferId::Temp(slot) => self.temps.get(slot).and_then(|temp| temp.as_deref()),
        };
        buffer.ok_or_else(|| missing(id))
    }

    fn buffer_mut(&mut self, id: BufferId) -> Result<&mut dyn ErasedArray> {
        let buffer: Option<&mut dyn ErasedArray> = match id {
            BufferId::Destination => self.destination.as_deref_mut(),
            BufferId::Temp(slot) => match self.temps.get_mut(slot) {
                Some(Some(temp)) => Some(temp.as_mut()),
                _ => None,
            },
        };
        buffer.ok_or_else(|| missing(id))
    }

    /// Whether `id` can serve as the output of type `type_index` and `shape`
    pub fn matches(&self, id: BufferId, type_index: TypeIndex, shape: &[usize]) -> bool {
        self.get(id)
            .map(|buffer| buffer.type_index() == type_index && buffer.shape() == shape)
            .unwrap_or(false)
    }

    /// Run `f` with buffer `id` lent out mutably while the rest of the pool
    /// stays readable
    pub fn run<R>(&mut self, id: BufferId, f: impl FnOnce(&Self, &mut dyn ErasedArray) -> Result<R>) -> Result<R> {
        match id {
            BufferId::Destination => {
                let destination = self.destination.take().ok_or_else(|| missing(id))?;
                let result = f(self, &mut *destination);
                self.destination = Some(destination);
                result
            }
            BufferId::Temp(slot) => {
                let mut buffer = self
                    .temps
                    .get_mut(slot)
                    .and_then(Option::take)
                    .ok_or_else(|| missing(id))?;
                let result = f(self, buffer.as_mut());
                self.temps[slot] = Some(buffer);
                result
            }
        }
    }
}

fn missing(id: BufferId) -> DynArrayError {
    DynArrayError::unsupported(format!("buffer {:?} is not available", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::erased::TypedArray;
    use crate::registry::register;
    use ndarray::{ArrayD, IxDyn};

    #[test]
    fn dense_destination_is_reused_first() {
        let mut destination = TypedArray::dense(ArrayD::<f32>::zeros(IxDyn(&[2])));
        let mut pool = TemporaryPool::new(&mut destination);
        let f32_ = register::<f32>();

        let first = pool.acquire(f32_, &[3]).unwrap();
        assert_eq!(first, BufferId::Destination);
        let second = pool.acquire(f32_, &[3]).unwrap();
        assert_eq!(second, BufferId::Temp(0));
        assert_eq!(pool.size(), 1);

        pool.release(second).unwrap();
        assert_eq!(pool.acquire(f32_, &[1]).unwrap(), BufferId::Temp(0));
        assert_eq!(pool.size(), 1);
        assert!(pool.matches(BufferId::Temp(0), f32_, &[1]));
        assert!(!pool.matches(BufferId::Temp(0), register::<f64>(), &[1]));
    }

    #[test]
    fn other_types_get_fresh_buffers() {
        let mut destination = TypedArray::dense(ArrayD::<f64>::zeros(IxDyn(&[2])));
        let mut pool = TemporaryPool::new(&mut destination);
        let id = pool.acquire(register::<i64>(), &[2, 2]).unwrap();
        assert_eq!(id, BufferId::Temp(0));
        assert_eq!(pool.get(id).unwrap().shape(), vec![2, 2]);
        pool.run(id, |pool, buffer| {
            assert_eq!(pool.get(BufferId::Destination)?.shape(), vec![2]);
            assert!(pool.get(id).is_err());
            buffer.resize(&[1])
        })
        .unwrap();
        assert_eq!(pool.get(id).unwrap().shape(), vec![1]);
    }

    #[test]
    fn scalar_destination_is_never_lent() {
        let mut destination = TypedArray::scalar(1.0f64);
        let mut pool = TemporaryPool::new(&mut destination);
        assert_eq!(pool.acquire(register::<f64>(), &[]).unwrap(), BufferId::Temp(0));
    }
}
