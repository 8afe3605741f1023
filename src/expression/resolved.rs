//! Resolved expression trees and their evaluation

use super::{arity_error, Expr, Op};
use crate::assign::AssignArgs;
use crate::broadcast::{broadcast_into, finalize, map_region, region_shape, uninitialized_shape};
use crate::dispatch::{self, Input, KernelArgs, ViewArgs};
use crate::erased::ErasedArray;
use crate::error::{DynArrayError, Result};
use crate::pool::{BufferId, TemporaryPool};
use crate::reducer::{operand_region, reduced_shape, EvaluationStrategy, ReduceArgs, ReducerKind, ReducerOptions};
use crate::registry::{self, TypeIndex};
use crate::slice::{view_shape, view_source, SliceSpec};
use std::ops::Range;

#[derive(Debug)]
enum Node<'e> {
    Leaf(&'e dyn ErasedArray),
    Function {
        op: Op,
        operands: Vec<ResolvedExpr<'e>>,
    },
    View {
        operand: Box<ResolvedExpr<'e>>,
        slices: &'e [SliceSpec],
    },
    Reducer {
        kind: ReducerKind,
        operand: Box<ResolvedExpr<'e>>,
        options: &'e ReducerOptions,
        axes: Vec<usize>,
    },
}

/// Expression tree with every node's shape and result type fixed
#[derive(Debug)]
pub struct ResolvedExpr<'e> {
    node: Node<'e>,
    shape: Vec<usize>,
    /// Every operand already has `shape`
    trivial: bool,
    type_index: TypeIndex,
}

/// Where a node's values ended up
#[derive(Debug, Clone, Copy)]
pub(crate) enum Evaluated<'e> {
    Leaf(&'e dyn ErasedArray),
    Buffer(BufferId),
}

fn input_for<'p>(
    pool: &'p TemporaryPool<'_>,
    evaluated: &Evaluated<'p>,
    region: Option<&'p [Range<usize>]>,
    output: BufferId,
) -> Result<Input<'p>> {
    Ok(match *evaluated {
        Evaluated::Leaf(array) => match region {
            Some(ranges) => Input::Region(array, ranges),
            None => Input::Whole(array),
        },
        Evaluated::Buffer(id) if id == output => Input::InPlace,
        Evaluated::Buffer(id) => Input::Whole(pool.get(id)?),
    })
}

impl<'e> ResolvedExpr<'e> {
    pub(super) fn new(expr: &'e Expr<'_>) -> Result<Self> {
        match expr {
            Expr::Leaf(array) => {
                let erased = array.as_erased();
                Ok(Self {
                    shape: erased.shape(),
                    trivial: true,
                    type_index: erased.type_index(),
                    node: Node::Leaf(erased),
                })
            }
            Expr::Function { op, operands } => {
                let operands = operands
                    .iter()
                    .map(ResolvedExpr::new)
                    .collect::<Result<Vec<_>>>()?;
                let type_index = match (op, operands.as_slice()) {
                    (Op::Unary(op), [operand]) => dispatch::unary_result_type(*op, operand.type_index)?,
                    (Op::Binary(op), [lhs, rhs]) => {
                        dispatch::binary_result_type(*op, lhs.type_index, rhs.type_index)?
                    }
                    _ => return Err(arity_error(*op, operands.len())),
                };
                let dimension = operands.iter().map(ResolvedExpr::dimension).max().unwrap_or(0);
                let mut shape = uninitialized_shape(dimension);
                let mut trivial = true;
                for operand in &operands {
                    trivial &= operand.broadcast_shape(&mut shape, true)?;
                }
                finalize(&mut shape);
                Ok(Self {
                    node: Node::Function { op: *op, operands },
                    shape,
                    trivial,
                    type_index,
                })
            }
            Expr::View { operand, slices } => {
                let operand = ResolvedExpr::new(operand)?;
                let shape = view_shape(slices, &operand.shape)?;
                let type_index = dispatch::view_result_type(operand.type_index)?;
                Ok(Self {
                    node: Node::View {
                        operand: Box::new(operand),
                        slices,
                    },
                    shape,
                    trivial: false,
                    type_index,
                })
            }
            Expr::Reducer { kind, operand, options } => {
                let operand = ResolvedExpr::new(operand)?;
                if options.initial_value().is_some() && !kind.accepts_initial() {
                    return Err(DynArrayError::unsupported(format!(
                        "{} does not take an initial value",
                        kind
                    )));
                }
                let axes = options.normalized_axes(operand.dimension())?;
                let shape = reduced_shape(&operand.shape, &axes, options.keeps_dims());
                let type_index = dispatch::reducer_result_type(*kind, operand.type_index)?;
                Ok(Self {
                    node: Node::Reducer {
                        kind: *kind,
                        operand: Box::new(operand),
                        options,
                        axes,
                    },
                    shape,
                    trivial: false,
                    type_index,
                })
            }
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn dimension(&self) -> usize {
        self.shape.len()
    }

    pub fn type_index(&self) -> TypeIndex {
        self.type_index
    }

    /// Whether every operand of the root already has the result shape
    pub fn is_trivial(&self) -> bool {
        self.trivial
    }

    /// Broadcast this expression's shape into `shape`.
    ///
    /// With `reuse_cache` the shape fixed at resolution is used; without it
    /// the shape is recomputed from the leaves. Both give the same answer.
    pub fn broadcast_shape(&self, shape: &mut Vec<usize>, reuse_cache: bool) -> Result<bool> {
        if reuse_cache {
            broadcast_into(shape, &self.shape)
        } else {
            broadcast_into(shape, &self.compute_shape()?)
        }
    }

    fn compute_shape(&self) -> Result<Vec<usize>> {
        match &self.node {
            Node::Leaf(array) => Ok(array.shape()),
            Node::Function { operands, .. } => {
                let dimension = operands.iter().map(ResolvedExpr::dimension).max().unwrap_or(0);
                let mut shape = uninitialized_shape(dimension);
                for operand in operands {
                    operand.broadcast_shape(&mut shape, false)?;
                }
                finalize(&mut shape);
                Ok(shape)
            }
            Node::View { operand, slices } => view_shape(slices, &operand.compute_shape()?),
            Node::Reducer { operand, options, axes, .. } => Ok(reduced_shape(
                &operand.compute_shape()?,
                axes,
                options.keeps_dims(),
            )),
        }
    }

    /// Fresh empty buffer of the result type, sized to the result shape
    pub fn allocate_result(&self) -> Result<Box<dyn ErasedArray>> {
        let mut result = registry::allocate(self.type_index)?;
        result.resize(&self.shape)?;
        Ok(result)
    }

    /// Evaluate into the pool's destination, restricted to the chunk in `args`
    pub fn assign_to(&self, pool: &mut TemporaryPool<'_>, args: &AssignArgs) -> Result<()> {
        // The destination may be larger than the expression, which then
        // broadcasts into it.
        let target = args.region();
        let source_region = target.map(|ranges| map_region(ranges, &self.shape));
        let result = self.evaluate(pool, source_region.as_deref())?;
        if matches!(result, Evaluated::Buffer(BufferId::Destination)) {
            return Ok(());
        }

        let full = pool.get(BufferId::Destination)?.shape();
        let shape = args.region_shape(&full);
        let kernel_args = KernelArgs {
            shape: &shape,
            target,
            trivial_broadcast: args.trivial_broadcast,
        };
        pool.run(BufferId::Destination, |pool, destination| {
            let input = input_for(pool, &result, source_region.as_deref(), BufferId::Destination)?;
            dispatch::dispatch_assign(input, destination, &kernel_args)
        })?;
        if let Evaluated::Buffer(id) = result {
            pool.release(id)?;
        }
        Ok(())
    }

    /// Evaluate this node over `region` of its shape (or all of it).
    ///
    /// Leaves are returned as they are. Any other node ends up in a pool
    /// buffer holding exactly the requested region, which the caller must
    /// release.
    pub(crate) fn evaluate(
        &self,
        pool: &mut TemporaryPool<'_>,
        region: Option<&[Range<usize>]>,
    ) -> Result<Evaluated<'e>> {
        let output_shape = region.map_or_else(|| self.shape.clone(), region_shape);
        match &self.node {
            Node::Leaf(array) => Ok(Evaluated::Leaf(*array)),
            Node::Function { op, operands } => {
                let mut evaluated = Vec::with_capacity(operands.len());
                for operand in operands {
                    let sub_region = region.map(|ranges| map_region(ranges, &operand.shape));
                    let result = operand.evaluate(pool, sub_region.as_deref())?;
                    evaluated.push((result, sub_region));
                }

                // Reuse the first temporary that already has the right type and shape.
                let reused = evaluated.iter().find_map(|(result, _)| match *result {
                    Evaluated::Buffer(id) if pool.matches(id, self.type_index, &output_shape) => Some(id),
                    _ => None,
                });
                let output = match reused {
                    Some(id) => id,
                    None => pool.acquire(self.type_index, &output_shape)?,
                };

                let args = KernelArgs {
                    shape: &output_shape,
                    target: None,
                    trivial_broadcast: self.trivial,
                };
                pool.run(output, |pool, buffer| {
                    let inputs = evaluated
                        .iter()
                        .map(|(result, sub_region)| input_for(pool, result, sub_region.as_deref(), output))
                        .collect::<Result<Vec<_>>>()?;
                    match (op, inputs.as_slice()) {
                        (Op::Unary(op), &[input]) => dispatch::dispatch_unary(*op, input, buffer, &args),
                        (Op::Binary(op), &[lhs, rhs]) => dispatch::dispatch_binary(*op, lhs, rhs, buffer, &args),
                        _ => Err(arity_error(*op, inputs.len())),
                    }
                })?;

                for (result, _) in &evaluated {
                    if let Evaluated::Buffer(id) = *result {
                        if id != output {
                            pool.release(id)?;
                        }
                    }
                }
                Ok(Evaluated::Buffer(output))
            }
            Node::View { operand, slices } => {
                // Inside a chunk only the operand region under it is read.
                let mapped = region
                    .map(|ranges| view_source(slices, &operand.shape, ranges))
                    .transpose()?;
                let (source_region, local) = match &mapped {
                    Some((ranges, local)) => (Some(ranges.as_slice()), local.as_slice()),
                    None => (None, *slices),
                };
                let source = operand.evaluate(pool, source_region)?;
                let output = pool.acquire(self.type_index, &output_shape)?;
                let args = ViewArgs {
                    slices: local,
                    region: None,
                };
                pool.run(output, |pool, buffer| {
                    let input = input_for(pool, &source, source_region, output)?;
                    dispatch::dispatch_view(input, buffer, &args)
                })?;
                if let Evaluated::Buffer(id) = source {
                    pool.release(id)?;
                }
                Ok(Evaluated::Buffer(output))
            }
            Node::Reducer {
                kind,
                operand,
                options,
                axes,
            } => {
                let reduce = |pool: &mut TemporaryPool<'_>,
                              source_region: Option<&[Range<usize>]>,
                              output_shape: &[usize]| {
                    let source = operand.evaluate(pool, source_region)?;
                    let output = pool.acquire(self.type_index, output_shape)?;
                    let args = ReduceArgs {
                        axes,
                        keep_dims: options.keeps_dims(),
                        initial: options.initial_value(),
                    };
                    pool.run(output, |pool, buffer| {
                        let input = input_for(pool, &source, source_region, output)?;
                        dispatch::dispatch_reduce(*kind, input, buffer, &args)
                    })?;
                    if let Evaluated::Buffer(id) = source {
                        pool.release(id)?;
                    }
                    Ok::<_, DynArrayError>(output)
                };

                let Some(ranges) = region else {
                    return Ok(Evaluated::Buffer(reduce(pool, None, &self.shape)?));
                };
                match options.strategy() {
                    EvaluationStrategy::Lazy => {
                        let source_region = operand_region(&operand.shape, axes, options.keeps_dims(), ranges);
                        let output = reduce(pool, Some(&source_region), &output_shape)?;
                        Ok(Evaluated::Buffer(output))
                    }
                    EvaluationStrategy::Immediate => {
                        // The whole reduction is kept in the pool for the following chunks.
                        let key = self as *const Self as usize;
                        let reduced = match pool.kept(key) {
                            Some(id) => id,
                            None => {
                                let id = reduce(pool, None, &self.shape)?;
                                pool.keep(key, id);
                                id
                            }
                        };
                        let output = pool.acquire(self.type_index, &output_shape)?;
                        let args = ViewArgs {
                            slices: &[],
                            region: Some(ranges),
                        };
                        pool.run(output, |pool, buffer| {
                            dispatch::dispatch_view(Input::Whole(pool.get(reduced)?), buffer, &args)
                        })?;
                        Ok(Evaluated::Buffer(output))
                    }
                }
            }
        }
    }
}
