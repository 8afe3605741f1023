//! Lazy expression trees over erased arrays
//!
//! Building an [`Expr`] never touches element data. Assigning it first
//! [resolves](Expr::resolve) the tree into a [`ResolvedExpr`], which fixes
//! every node's shape and result type, and then evaluates it into the
//! destination.

mod ops;
mod resolved;

pub use resolved::ResolvedExpr;

use crate::broadcast::{broadcast_into, finalize, uninitialized_shape};
use crate::dispatch::{self, BinaryOp, UnaryOp};
use crate::error::{DynArrayError, Result};
use crate::reducer::{ReducerKind, ReducerOptions};
use crate::registry::TypeIndex;
use crate::slice::{view_shape, SliceSpec};
use crate::DynArray;
use std::borrow::Cow;
use std::fmt;

/// Operator tag of a function node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Unary(UnaryOp),
    Binary(BinaryOp),
}

impl Op {
    pub fn arity(self) -> usize {
        match self {
            Op::Unary(_) => 1,
            Op::Binary(_) => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Op::Unary(op) => op.name(),
            Op::Binary(op) => op.name(),
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unevaluated computation over erased arrays
#[derive(Debug, Clone)]
pub enum Expr<'a> {
    /// An array, borrowed or owned
    Leaf(Cow<'a, DynArray>),
    /// Element-wise operator applied to broadcast operands
    Function { op: Op, operands: Vec<Expr<'a>> },
    /// Strided view of the operand
    View {
        operand: Box<Expr<'a>>,
        slices: Vec<SliceSpec>,
    },
    /// Reduction of the operand over some axes
    Reducer {
        kind: ReducerKind,
        operand: Box<Expr<'a>>,
        options: ReducerOptions,
    },
}

impl<'a> Expr<'a> {
    pub fn unary(op: UnaryOp, operand: impl Into<Expr<'a>>) -> Self {
        Expr::Function {
            op: Op::Unary(op),
            operands: vec![operand.into()],
        }
    }

    pub fn binary(op: BinaryOp, lhs: impl Into<Expr<'a>>, rhs: impl Into<Expr<'a>>) -> Self {
        Expr::Function {
            op: Op::Binary(op),
            operands: vec![lhs.into(), rhs.into()],
        }
    }

    pub fn view(operand: impl Into<Expr<'a>>, slices: impl Into<Vec<SliceSpec>>) -> Self {
        Expr::View {
            operand: Box::new(operand.into()),
            slices: slices.into(),
        }
    }

    pub fn reduce(kind: ReducerKind, operand: impl Into<Expr<'a>>, options: impl Into<ReducerOptions>) -> Self {
        Expr::Reducer {
            kind,
            operand: Box::new(operand.into()),
            options: options.into(),
        }
    }

    /// Rank of the result, without computing any shape
    pub fn dimension(&self) -> usize {
        match self {
            Expr::Leaf(array) => array.dimension(),
            Expr::Function { operands, .. } => {
                operands.iter().map(Expr::dimension).max().unwrap_or(0)
            }
            Expr::View { operand, slices } => {
                let removed = slices
                    .iter()
                    .filter(|spec| matches!(spec, SliceSpec::Index(_)))
                    .count();
                let added = slices
                    .iter()
                    .filter(|spec| matches!(spec, SliceSpec::NewAxis))
                    .count();
                (operand.dimension() + added).saturating_sub(removed)
            }
            Expr::Reducer { operand, options, .. } => {
                let rank = operand.dimension();
                if options.keeps_dims() {
                    return rank;
                }
                let reduced = options.normalized_axes(rank).map_or(0, |axes| axes.len());
                rank - reduced
            }
        }
    }

    /// Broadcast shape of the result
    pub fn shape(&self) -> Result<Vec<usize>> {
        match self {
            Expr::Leaf(array) => Ok(array.shape()),
            Expr::Function { operands, .. } => {
                let mut shape = uninitialized_shape(self.dimension());
                for operand in operands {
                    operand.broadcast_shape(&mut shape, false)?;
                }
                finalize(&mut shape);
                Ok(shape)
            }
            Expr::View { operand, slices } => view_shape(slices, &operand.shape()?),
            Expr::Reducer { operand, options, .. } => options.output_shape(&operand.shape()?),
        }
    }

    /// Broadcast this expression's shape into `shape`.
    ///
    /// An unresolved expression caches nothing, so `reuse_cache` has no
    /// effect; see [`ResolvedExpr::broadcast_shape`].
    pub fn broadcast_shape(&self, shape: &mut Vec<usize>, _reuse_cache: bool) -> Result<bool> {
        broadcast_into(shape, &self.shape()?)
    }

    /// Element type of the result, found through the dispatch tables alone
    pub fn result_type_index(&self) -> Result<TypeIndex> {
        match self {
            Expr::Leaf(array) => Ok(array.type_index()),
            Expr::Function { op, operands } => {
                let types = operands
                    .iter()
                    .map(Expr::result_type_index)
                    .collect::<Result<Vec<_>>>()?;
                match (op, types.as_slice()) {
                    (Op::Unary(op), &[operand]) => dispatch::unary_result_type(*op, operand),
                    (Op::Binary(op), &[lhs, rhs]) => dispatch::binary_result_type(*op, lhs, rhs),
                    _ => Err(arity_error(*op, operands.len())),
                }
            }
            Expr::View { operand, .. } => dispatch::view_result_type(operand.result_type_index()?),
            Expr::Reducer { kind, operand, .. } => {
                dispatch::reducer_result_type(*kind, operand.result_type_index()?)
            }
        }
    }

    /// Fix shapes and result types of the whole tree
    pub fn resolve(&self) -> Result<ResolvedExpr<'_>> {
        ResolvedExpr::new(self)
    }
}

pub(crate) fn arity_error(op: Op, operands: usize) -> DynArrayError {
    DynArrayError::unsupported(format!(
        "{} takes {} operand(s), got {}",
        op,
        op.arity(),
        operands
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::register;
    use ndarray::{array, ArrayD, IxDyn};

    #[test]
    fn shapes_broadcast_without_evaluating() {
        let a = DynArray::from(ArrayD::<f64>::zeros(IxDyn(&[4, 1, 3])));
        let b = DynArray::from(ArrayD::<f32>::zeros(IxDyn(&[5, 1])));
        let expr = &a + &b;
        assert_eq!(expr.dimension(), 3);
        assert_eq!(expr.shape().unwrap(), vec![4, 5, 3]);
        assert_eq!(expr.result_type_index().unwrap(), register::<f64>());
    }

    #[test]
    fn mismatched_shapes_fail() {
        let a = DynArray::from(ArrayD::<f64>::zeros(IxDyn(&[2, 3])));
        let b = DynArray::from(ArrayD::<f64>::zeros(IxDyn(&[4])));
        let expr = &a * &b;
        assert!(matches!(expr.shape(), Err(DynArrayError::Broadcast { .. })));
    }

    #[test]
    fn views_and_reducers_have_shapes() {
        let a = DynArray::from(array![[1, 2, 3], [4, 5, 6]]);
        let view = Expr::view(&a, vec![SliceSpec::Index(1), SliceSpec::NewAxis]);
        assert_eq!(view.dimension(), 2);
        assert_eq!(view.shape().unwrap(), vec![1, 3]);

        let total = Expr::reduce(ReducerKind::Sum, &a, [1]);
        assert_eq!(total.dimension(), 1);
        assert_eq!(total.shape().unwrap(), vec![2]);
        assert_eq!(total.result_type_index().unwrap(), register::<i64>());
    }
}
