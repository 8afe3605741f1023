//! Dispatch tables keyed by runtime type indices

use crate::error::{DynArrayError, Result};
use crate::registry::{self, TypeIndex};
use std::collections::HashMap;
use tracing::warn;

fn unregistered(op: &str, types: &[TypeIndex]) -> DynArrayError {
    let types = types
        .iter()
        .map(|&index| registry::type_name(index))
        .collect::<Vec<_>>()
        .join(", ");
    warn!(op, types = %types, "no kernel registered");
    DynArrayError::UnregisteredCombination {
        op: op.to_string(),
        types,
    }
}

/// Table for operations with one operand and one result.
///
/// Type resolution is keyed on the operand alone, execution on the
/// `(operand, result)` pair. The first kernel inserted for an operand fixes
/// the result type reported by [`UnaryDispatcher::result_type`] until
/// [`UnaryDispatcher::set_result`] replaces it.
#[derive(Debug, Clone)]
pub struct UnaryDispatcher<F> {
    name: &'static str,
    results: HashMap<TypeIndex, TypeIndex>,
    kernels: HashMap<(TypeIndex, TypeIndex), F>,
}

impl<F: Copy> UnaryDispatcher<F> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            results: HashMap::new(),
            kernels: HashMap::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    pub fn insert(&mut self, operand: TypeIndex, result: TypeIndex, kernel: F) {
        self.results.entry(operand).or_insert(result);
        self.kernels.insert((operand, result), kernel);
    }

    /// Override the result type reported for `operand`
    pub fn set_result(&mut self, operand: TypeIndex, result: TypeIndex) {
        self.results.insert(operand, result);
    }

    pub fn result_type(&self, operand: TypeIndex) -> Result<TypeIndex> {
        self.results
            .get(&operand)
            .copied()
            .ok_or_else(|| unregistered(self.name, &[operand]))
    }

    pub fn kernel(&self, operand: TypeIndex, result: TypeIndex) -> Result<F> {
        self.kernels
            .get(&(operand, result))
            .copied()
            .ok_or_else(|| unregistered(self.name, &[operand, result]))
    }
}

/// Table for operations with two operands.
///
/// Each operand pair maps to exactly one result type and kernel.
#[derive(Debug, Clone)]
pub struct BinaryDispatcher<F> {
    name: &'static str,
    kernels: HashMap<(TypeIndex, TypeIndex), (TypeIndex, F)>,
}

impl<F: Copy> BinaryDispatcher<F> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            kernels: HashMap::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    pub fn insert(&mut self, lhs: TypeIndex, rhs: TypeIndex, result: TypeIndex, kernel: F) {
        self.kernels.insert((lhs, rhs), (result, kernel));
    }

    pub fn result_type(&self, lhs: TypeIndex, rhs: TypeIndex) -> Result<TypeIndex> {
        self.kernel(lhs, rhs).map(|(result, _)| result)
    }

    pub fn kernel(&self, lhs: TypeIndex, rhs: TypeIndex) -> Result<(TypeIndex, F)> {
        self.kernels
            .get(&(lhs, rhs))
            .copied()
            .ok_or_else(|| unregistered(self.name, &[lhs, rhs]))
    }
}
