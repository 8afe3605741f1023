//! Reductions over array axes
//!
//! A reducer node carries a [`ReducerKind`] and a [`ReducerOptions`] value.
//! The options are consulted twice: once when the node resolves its output
//! shape, and once per kernel call when the operand is reduced.

use crate::dispatch::Input;
use crate::erased::{downcast_mut, ErasedArray};
use crate::error::{DynArrayError, Result};
use crate::types::{ArithElement, Element, Scalar};
use ndarray::{ArrayD, ArrayViewD, IxDyn};
use num_traits::Float;
use std::fmt;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReducerKind {
    Sum,
    Prod,
    Mean,
    Variance,
    Stddev,
    Amin,
    Amax,
    NormL0,
    NormL1,
    NormL2,
}

impl ReducerKind {
    pub const ALL: [ReducerKind; 10] = [
        ReducerKind::Sum,
        ReducerKind::Prod,
        ReducerKind::Mean,
        ReducerKind::Variance,
        ReducerKind::Stddev,
        ReducerKind::Amin,
        ReducerKind::Amax,
        ReducerKind::NormL0,
        ReducerKind::NormL1,
        ReducerKind::NormL2,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ReducerKind::Sum => "sum",
            ReducerKind::Prod => "prod",
            ReducerKind::Mean => "mean",
            ReducerKind::Variance => "variance",
            ReducerKind::Stddev => "stddev",
            ReducerKind::Amin => "amin",
            ReducerKind::Amax => "amax",
            ReducerKind::NormL0 => "norm_l0",
            ReducerKind::NormL1 => "norm_l1",
            ReducerKind::NormL2 => "norm_l2",
        }
    }

    /// Whether an initial value may seed this reduction
    pub fn accepts_initial(self) -> bool {
        matches!(
            self,
            ReducerKind::Sum
                | ReducerKind::Prod
                | ReducerKind::Mean
                | ReducerKind::Amin
                | ReducerKind::Amax
        )
    }
}

impl fmt::Display for ReducerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// When the operand of a reducer is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvaluationStrategy {
    /// Reduce only the part of the operand the requested output region needs
    #[default]
    Lazy,
    /// Reduce the whole operand, then select the requested region
    Immediate,
}

/// Axes, kept dimensions, strategy and initial value of a reduction
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReducerOptions {
    axes: Option<Vec<usize>>,
    keep_dims: bool,
    strategy: EvaluationStrategy,
    initial: Option<Scalar>,
}

impl ReducerOptions {
    /// Reduce over every axis
    pub fn new() -> Self {
        Self::default()
    }

    pub fn over(axes: impl Into<Vec<usize>>) -> Self {
        Self {
            axes: Some(axes.into()),
            ..Self::default()
        }
    }

    pub fn keep_dims(mut self) -> Self {
        self.keep_dims = true;
        self
    }

    pub fn immediate(mut self) -> Self {
        self.strategy = EvaluationStrategy::Immediate;
        self
    }

    pub fn lazy(mut self) -> Self {
        self.strategy = EvaluationStrategy::Lazy;
        self
    }

    pub fn initial(mut self, value: impl Into<Scalar>) -> Self {
        self.initial = Some(value.into());
        self
    }

    pub fn axes(&self) -> Option<&[usize]> {
        self.axes.as_deref()
    }

    pub fn keeps_dims(&self) -> bool {
        self.keep_dims
    }

    pub fn strategy(&self) -> EvaluationStrategy {
        self.strategy
    }

    pub fn initial_value(&self) -> Option<Scalar> {
        self.initial
    }

    /// Sorted, deduplicated axes for an operand of rank `rank`
    pub fn normalized_axes(&self, rank: usize) -> Result<Vec<usize>> {
        let mut axes = match &self.axes {
            Some(axes) => axes.clone(),
            None => (0..rank).collect(),
        };
        axes.sort_unstable();
        axes.dedup();
        if let Some(&axis) = axes.iter().find(|&&axis| axis >= rank) {
            return Err(DynArrayError::shape(format!(
                "axis {} out of range for rank {}",
                axis, rank
            )));
        }
        Ok(axes)
    }

    pub fn output_shape(&self, shape: &[usize]) -> Result<Vec<usize>> {
        let axes = self.normalized_axes(shape.len())?;
        Ok(reduced_shape(shape, &axes, self.keep_dims))
    }
}

impl<const N: usize> From<[usize; N]> for ReducerOptions {
    fn from(axes: [usize; N]) -> Self {
        Self::over(axes)
    }
}

impl From<Vec<usize>> for ReducerOptions {
    fn from(axes: Vec<usize>) -> Self {
        Self::over(axes)
    }
}

pub(crate) fn reduced_shape(shape: &[usize], axes: &[usize], keep_dims: bool) -> Vec<usize> {
    shape
        .iter()
        .enumerate()
        .filter_map(|(axis, &size)| match (axes.contains(&axis), keep_dims) {
            (false, _) => Some(size),
            (true, true) => Some(1),
            (true, false) => None,
        })
        .collect()
}

/// Operand region feeding `output_region`: reduced axes are taken whole
pub(crate) fn operand_region(
    operand_shape: &[usize],
    axes: &[usize],
    keep_dims: bool,
    output_region: &[Range<usize>],
) -> Vec<Range<usize>> {
    let mut next = 0;
    operand_shape
        .iter()
        .enumerate()
        .map(|(axis, &size)| {
            if axes.contains(&axis) {
                if keep_dims {
                    next += 1;
                }
                0..size
            } else {
                let range = output_region[next].clone();
                next += 1;
                range
            }
        })
        .collect()
}

// =============================================================================
// Reductions
// =============================================================================

/// Reduction of one lane of values to a single element
pub trait Reduction<T: Element> {
    const KIND: ReducerKind;

    type Output: Element;

    fn reduce(lane: &[T], initial: Option<Scalar>) -> Result<Self::Output>;
}

#[derive(Debug, Clone, Copy)]
pub struct Sum;

impl<T: Element> Reduction<T> for Sum {
    const KIND: ReducerKind = ReducerKind::Sum;

    type Output = T::Accumulator;

    fn reduce(lane: &[T], initial: Option<Scalar>) -> Result<T::Accumulator> {
        let start = initial.map_or_else(<T::Accumulator as ArithElement>::zero_value, Scalar::to);
        Ok(lane.iter().fold(start, |acc, &value| acc.plus(value.cast())))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Prod;

impl<T: Element> Reduction<T> for Prod {
    const KIND: ReducerKind = ReducerKind::Prod;

    type Output = T::Accumulator;

    fn reduce(lane: &[T], initial: Option<Scalar>) -> Result<T::Accumulator> {
        let start = initial.map_or_else(<T::Accumulator as ArithElement>::one_value, Scalar::to);
        Ok(lane.iter().fold(start, |acc, &value| acc.times(value.cast())))
    }
}

fn mean<T: Element>(lane: &[T], initial: Option<Scalar>) -> f64 {
    if lane.is_empty() {
        return f64::NAN;
    }
    let start = initial.map_or(0.0, Scalar::to::<f64>);
    let total = lane.iter().fold(start, |acc, &value| acc + value.cast::<f64>());
    total / lane.len() as f64
}

fn variance<T: Element>(lane: &[T]) -> f64 {
    let center = mean(lane, None);
    let squares = lane
        .iter()
        .map(|&value| (value.cast::<f64>() - center).powi(2))
        .sum::<f64>();
    squares / lane.len() as f64
}

#[derive(Debug, Clone, Copy)]
pub struct Mean;

impl<T: Element> Reduction<T> for Mean {
    const KIND: ReducerKind = ReducerKind::Mean;

    type Output = f64;

    fn reduce(lane: &[T], initial: Option<Scalar>) -> Result<f64> {
        Ok(mean(lane, initial))
    }
}

/// Population variance
#[derive(Debug, Clone, Copy)]
pub struct Variance;

impl<T: Element> Reduction<T> for Variance {
    const KIND: ReducerKind = ReducerKind::Variance;

    type Output = f64;

    fn reduce(lane: &[T], _initial: Option<Scalar>) -> Result<f64> {
        Ok(variance(lane))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Stddev;

impl<T: Element> Reduction<T> for Stddev {
    const KIND: ReducerKind = ReducerKind::Stddev;

    type Output = f64;

    fn reduce(lane: &[T], _initial: Option<Scalar>) -> Result<f64> {
        Ok(variance(lane).sqrt())
    }
}

fn extremum<T: Element>(lane: &[T], initial: Option<Scalar>, replace: fn(T, T) -> bool) -> Result<T> {
    lane.iter()
        .fold(initial.map(Scalar::to::<T>), |acc, &value| match acc {
            Some(current) if !replace(value, current) => Some(current),
            _ => Some(value),
        })
        .ok_or(DynArrayError::EmptyReduction)
}

#[derive(Debug, Clone, Copy)]
pub struct Amin;

impl<T: Element> Reduction<T> for Amin {
    const KIND: ReducerKind = ReducerKind::Amin;

    type Output = T;

    fn reduce(lane: &[T], initial: Option<Scalar>) -> Result<T> {
        extremum(lane, initial, |value, current| value < current)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Amax;

impl<T: Element> Reduction<T> for Amax {
    const KIND: ReducerKind = ReducerKind::Amax;

    type Output = T;

    fn reduce(lane: &[T], initial: Option<Scalar>) -> Result<T> {
        extremum(lane, initial, |value, current| value > current)
    }
}

/// Number of non-zero elements
#[derive(Debug, Clone, Copy)]
pub struct NormL0;

impl<T: Element> Reduction<T> for NormL0 {
    const KIND: ReducerKind = ReducerKind::NormL0;

    type Output = T::Float;

    fn reduce(lane: &[T], _initial: Option<Scalar>) -> Result<T::Float> {
        let count = lane.iter().filter(|value| value.is_truthy()).count();
        Ok(Scalar::UInt(count as u64).to())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NormL1;

impl<T: Element> Reduction<T> for NormL1 {
    const KIND: ReducerKind = ReducerKind::NormL1;

    type Output = T::Float;

    fn reduce(lane: &[T], _initial: Option<Scalar>) -> Result<T::Float> {
        Ok(lane.iter().fold(<T::Float as ArithElement>::zero_value(), |acc, &value| {
            acc + value.cast::<T::Float>().abs()
        }))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NormL2;

impl<T: Element> Reduction<T> for NormL2 {
    const KIND: ReducerKind = ReducerKind::NormL2;

    type Output = T::Float;

    fn reduce(lane: &[T], _initial: Option<Scalar>) -> Result<T::Float> {
        let squares = lane.iter().fold(<T::Float as ArithElement>::zero_value(), |acc, &value| {
            let value = value.cast::<T::Float>();
            acc + value * value
        });
        Ok(squares.sqrt())
    }
}

/// Reduce `values` over the sorted `axes`
pub fn reduce_axes<K, T>(
    values: ArrayViewD<'_, T>,
    axes: &[usize],
    keep_dims: bool,
    initial: Option<Scalar>,
) -> Result<ArrayD<K::Output>>
where
    K: Reduction<T>,
    T: Element,
{
    let shape = values.shape().to_vec();
    let kept: Vec<usize> = (0..shape.len()).filter(|axis| !axes.contains(axis)).collect();
    let order: Vec<usize> = kept.iter().chain(axes).copied().collect();
    let inner: usize = axes.iter().map(|&axis| shape[axis]).product();
    let outer: usize = kept.iter().map(|&axis| shape[axis]).product();

    // Kept axes outermost, so every lane is a contiguous run of `inner` values.
    let flat: Vec<T> = values.permuted_axes(IxDyn(&order)).iter().copied().collect();
    let mut reduced = Vec::with_capacity(outer);
    if inner == 0 {
        for _ in 0..outer {
            reduced.push(K::reduce(&[], initial)?);
        }
    } else {
        for lane in flat.chunks(inner) {
            reduced.push(K::reduce(lane, initial)?);
        }
    }

    let output_shape = reduced_shape(&shape, axes, keep_dims);
    ArrayD::from_shape_vec(IxDyn(&output_shape), reduced)
        .map_err(|err| DynArrayError::shape(err.to_string()))
}

/// Arguments of a reduction kernel
#[derive(Debug, Clone, Copy)]
pub struct ReduceArgs<'a> {
    /// Sorted, deduplicated axes of the operand
    pub axes: &'a [usize],
    pub keep_dims: bool,
    pub initial: Option<Scalar>,
}

pub type ReduceFn = fn(Input<'_>, &mut dyn ErasedArray, &ReduceArgs<'_>) -> Result<()>;

pub(crate) fn run_reduce<K, T>(input: Input<'_>, output: &mut dyn ErasedArray, args: &ReduceArgs<'_>) -> Result<()>
where
    K: Reduction<T>,
    T: Element,
{
    if args.initial.is_some() && !K::KIND.accepts_initial() {
        return Err(DynArrayError::unsupported(format!(
            "{} does not take an initial value",
            K::KIND
        )));
    }
    let values = input
        .read::<T>()?
        .ok_or_else(|| DynArrayError::unsupported("reductions cannot run in place"))?;
    let reduced = reduce_axes::<K, T>(values.view(), args.axes, args.keep_dims, args.initial)?;
    let shape = reduced.shape().to_vec();
    downcast_mut::<K::Output>(output)?.write(None, &shape, |mut dst| {
        dst.assign(&reduced);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn options_normalize_axes() {
        let options = ReducerOptions::over([2, 0, 2]);
        assert_eq!(options.normalized_axes(3).unwrap(), vec![0, 2]);
        assert_eq!(options.output_shape(&[4, 5, 6]).unwrap(), vec![5]);
        assert_eq!(
            options.clone().keep_dims().output_shape(&[4, 5, 6]).unwrap(),
            vec![1, 5, 1]
        );
        assert!(options.normalized_axes(2).is_err());
        assert_eq!(ReducerOptions::new().output_shape(&[4, 5]).unwrap(), Vec::<usize>::new());
    }

    #[test]
    fn operand_regions_cover_reduced_axes() {
        let region = operand_region(&[4, 5, 6], &[1], false, &[1..2, 3..6]);
        assert_eq!(region, vec![1..2, 0..5, 3..6]);
        let region = operand_region(&[4, 5, 6], &[1], true, &[1..2, 0..1, 3..6]);
        assert_eq!(region, vec![1..2, 0..5, 3..6]);
    }

    #[test]
    fn sums_over_axes() {
        let a = array![[1.0f32, 2.0], [3.0, 4.0]].into_dyn();
        let rows = reduce_axes::<Sum, f32>(a.view(), &[0], false, None).unwrap();
        assert_eq!(rows, array![4.0f32, 6.0].into_dyn());
        let total = reduce_axes::<Sum, f32>(a.view(), &[0, 1], true, None).unwrap();
        assert_eq!(total, array![[10.0f32]].into_dyn());
    }

    #[test]
    fn integer_sums_accumulate_wide() {
        let a = array![i32::MAX, 1].into_dyn();
        let total = reduce_axes::<Sum, i32>(a.view(), &[0], false, None).unwrap();
        assert_eq!(total[[]], i32::MAX as i64 + 1);
        let product = reduce_axes::<Prod, u8>(array![2u8, 200].into_dyn().view(), &[0], false, None).unwrap();
        assert_eq!(product[[]], 400u64);
    }

    #[test]
    fn initial_values_seed() {
        let a = array![1i64, 2, 3].into_dyn();
        let total = reduce_axes::<Sum, i64>(a.view(), &[0], false, Some(Scalar::Int(10))).unwrap();
        assert_eq!(total[[]], 16);
        let low = reduce_axes::<Amin, i64>(a.view(), &[0], false, Some(Scalar::Int(0))).unwrap();
        assert_eq!(low[[]], 0);
        let high = reduce_axes::<Amax, i64>(a.view(), &[0], false, None).unwrap();
        assert_eq!(high[[]], 3);
    }

    #[test]
    fn statistics() {
        let a = array![[1.0f64, 2.0, 3.0, 4.0]].into_dyn();
        let mean = reduce_axes::<Mean, f64>(a.view(), &[1], false, None).unwrap();
        assert_eq!(mean, array![2.5].into_dyn());
        let var = reduce_axes::<Variance, f64>(a.view(), &[1], false, None).unwrap();
        assert_eq!(var, array![1.25].into_dyn());
        let std = reduce_axes::<Stddev, f64>(a.view(), &[1], false, None).unwrap();
        assert_eq!(std[[0]], 1.25f64.sqrt());
    }

    #[test]
    fn norms() {
        let a = array![3.0f32, 0.0, -4.0].into_dyn();
        let l0 = reduce_axes::<NormL0, f32>(a.view(), &[0], false, None).unwrap();
        let l1 = reduce_axes::<NormL1, f32>(a.view(), &[0], false, None).unwrap();
        let l2 = reduce_axes::<NormL2, f32>(a.view(), &[0], false, None).unwrap();
        assert_eq!((l0[[]], l1[[]], l2[[]]), (2.0, 7.0, 5.0));
    }

    #[test]
    fn empty_lanes() {
        let a = ArrayD::<f64>::zeros(IxDyn(&[2, 0]));
        let sums = reduce_axes::<Sum, f64>(a.view(), &[1], false, None).unwrap();
        assert_eq!(sums, array![0.0, 0.0].into_dyn());
        let products = reduce_axes::<Prod, f64>(a.view(), &[1], false, None).unwrap();
        assert_eq!(products, array![1.0, 1.0].into_dyn());
        let means = reduce_axes::<Mean, f64>(a.view(), &[1], false, None).unwrap();
        assert!(means.iter().all(|m| m.is_nan()));
        assert_eq!(
            reduce_axes::<Amax, f64>(a.view(), &[1], false, None).unwrap_err(),
            DynArrayError::EmptyReduction
        );
    }
}
