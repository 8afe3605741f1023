//! Runtime multi-dispatch
//!
//! Operations on erased arrays are routed through process-wide tables that map
//! operand type indices to monomorphized kernels. The tables are built once,
//! on first use or by [`init_system`](crate::init_system), from static type
//! lists; after that every lookup only takes a read lock.
//!
//! | table      | key                     | kernel        |
//! |------------|-------------------------|---------------|
//! | unary op   | operand, result         | [`UnaryFn`]   |
//! | binary op  | lhs, rhs                | [`BinaryFn`]  |
//! | reducer    | operand, result         | [`ReduceFn`]  |
//! | assign     | source, destination     | [`UnaryFn`]   |
//! | move       | source, destination     | [`MoveFn`]    |
//! | view       | operand, operand        | [`ViewFn`]    |

mod functors;
mod kernels;
mod registration;
mod table;

pub use functors::*;
pub use kernels::{BinaryFn, Input, KernelArgs, MoveFn, UnaryFn, ViewArgs, ViewFn};
pub use table::{BinaryDispatcher, UnaryDispatcher};

use crate::erased::ErasedArray;
use crate::error::{DynArrayError, Result};
use crate::reducer::{ReduceArgs, ReduceFn, ReducerKind, Reduction};
use crate::registry::{self, TypeIndex};
use crate::types::Element;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

/// Operations with one operand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UnaryOp {
    Identity,
    Negate,
    LogicalNot,
    BitwiseNot,
    Fabs,
    Exp,
    Exp2,
    Expm1,
    Log,
    Log10,
    Log2,
    Log1p,
    Sqrt,
    Cbrt,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Asinh,
    Acosh,
    Atanh,
    Erf,
    Erfc,
    Tgamma,
    Lgamma,
    Ceil,
    Floor,
    Trunc,
    Round,
    Nearbyint,
    Rint,
    IsFinite,
    IsInf,
    IsNan,
}

impl UnaryOp {
    pub fn name(self) -> &'static str {
        match self {
            UnaryOp::Identity => "identity",
            UnaryOp::Negate => "negate",
            UnaryOp::LogicalNot => "logical_not",
            UnaryOp::BitwiseNot => "bitwise_not",
            UnaryOp::Fabs => "fabs",
            UnaryOp::Exp => "exp",
            UnaryOp::Exp2 => "exp2",
            UnaryOp::Expm1 => "expm1",
            UnaryOp::Log => "log",
            UnaryOp::Log10 => "log10",
            UnaryOp::Log2 => "log2",
            UnaryOp::Log1p => "log1p",
            UnaryOp::Sqrt => "sqrt",
            UnaryOp::Cbrt => "cbrt",
            UnaryOp::Sin => "sin",
            UnaryOp::Cos => "cos",
            UnaryOp::Tan => "tan",
            UnaryOp::Asin => "asin",
            UnaryOp::Acos => "acos",
            UnaryOp::Atan => "atan",
            UnaryOp::Sinh => "sinh",
            UnaryOp::Cosh => "cosh",
            UnaryOp::Tanh => "tanh",
            UnaryOp::Asinh => "asinh",
            UnaryOp::Acosh => "acosh",
            UnaryOp::Atanh => "atanh",
            UnaryOp::Erf => "erf",
            UnaryOp::Erfc => "erfc",
            UnaryOp::Tgamma => "tgamma",
            UnaryOp::Lgamma => "lgamma",
            UnaryOp::Ceil => "ceil",
            UnaryOp::Floor => "floor",
            UnaryOp::Trunc => "trunc",
            UnaryOp::Round => "round",
            UnaryOp::Nearbyint => "nearbyint",
            UnaryOp::Rint => "rint",
            UnaryOp::IsFinite => "isfinite",
            UnaryOp::IsInf => "isinf",
            UnaryOp::IsNan => "isnan",
        }
    }
}

/// Operations with two operands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BinaryOp {
    Plus,
    Minus,
    Multiplies,
    Divides,
    Modulus,
    LogicalOr,
    LogicalAnd,
    BitwiseOr,
    BitwiseAnd,
    BitwiseXor,
    LeftShift,
    RightShift,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    Fmod,
    Remainder,
    Fmax,
    Fmin,
    Fdim,
    Pow,
    Hypot,
    Atan2,
}

impl BinaryOp {
    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Plus => "plus",
            BinaryOp::Minus => "minus",
            BinaryOp::Multiplies => "multiplies",
            BinaryOp::Divides => "divides",
            BinaryOp::Modulus => "modulus",
            BinaryOp::LogicalOr => "logical_or",
            BinaryOp::LogicalAnd => "logical_and",
            BinaryOp::BitwiseOr => "bitwise_or",
            BinaryOp::BitwiseAnd => "bitwise_and",
            BinaryOp::BitwiseXor => "bitwise_xor",
            BinaryOp::LeftShift => "left_shift",
            BinaryOp::RightShift => "right_shift",
            BinaryOp::Less => "less",
            BinaryOp::LessEqual => "less_equal",
            BinaryOp::Greater => "greater",
            BinaryOp::GreaterEqual => "greater_equal",
            BinaryOp::Equal => "equal",
            BinaryOp::NotEqual => "not_equal",
            BinaryOp::Fmod => "fmod",
            BinaryOp::Remainder => "remainder",
            BinaryOp::Fmax => "fmax",
            BinaryOp::Fmin => "fmin",
            BinaryOp::Fdim => "fdim",
            BinaryOp::Pow => "pow",
            BinaryOp::Hypot => "hypot",
            BinaryOp::Atan2 => "atan2",
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Process-wide tables
// =============================================================================

struct Dispatchers {
    unary: HashMap<UnaryOp, UnaryDispatcher<UnaryFn>>,
    binary: HashMap<BinaryOp, BinaryDispatcher<BinaryFn>>,
    reducers: HashMap<ReducerKind, UnaryDispatcher<ReduceFn>>,
    assign: UnaryDispatcher<UnaryFn>,
    moves: UnaryDispatcher<MoveFn>,
    views: UnaryDispatcher<ViewFn>,
}

impl Dispatchers {
    fn build() -> Self {
        Self {
            unary: registration::unary_tables(),
            binary: registration::binary_tables(),
            reducers: registration::reducer_tables(),
            assign: registration::assign_table(),
            moves: registration::move_table(),
            views: registration::view_table(),
        }
    }

    fn unary(&self, op: UnaryOp) -> Result<&UnaryDispatcher<UnaryFn>> {
        self.unary
            .get(&op)
            .ok_or_else(|| DynArrayError::unsupported(format!("no table for {}", op)))
    }

    fn binary(&self, op: BinaryOp) -> Result<&BinaryDispatcher<BinaryFn>> {
        self.binary
            .get(&op)
            .ok_or_else(|| DynArrayError::unsupported(format!("no table for {}", op)))
    }

    fn reducer(&self, kind: ReducerKind) -> Result<&UnaryDispatcher<ReduceFn>> {
        self.reducers
            .get(&kind)
            .ok_or_else(|| DynArrayError::unsupported(format!("no table for {}", kind)))
    }
}

static DISPATCHERS: Lazy<RwLock<Dispatchers>> = Lazy::new(|| RwLock::new(Dispatchers::build()));

fn tables() -> RwLockReadGuard<'static, Dispatchers> {
    DISPATCHERS.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn init() {
    Lazy::force(&DISPATCHERS);
}

/// Result type of `op` applied to an operand of type `operand`
pub fn unary_result_type(op: UnaryOp, operand: TypeIndex) -> Result<TypeIndex> {
    tables().unary(op)?.result_type(operand)
}

pub fn binary_result_type(op: BinaryOp, lhs: TypeIndex, rhs: TypeIndex) -> Result<TypeIndex> {
    tables().binary(op)?.result_type(lhs, rhs)
}

pub fn reducer_result_type(kind: ReducerKind, operand: TypeIndex) -> Result<TypeIndex> {
    tables().reducer(kind)?.result_type(operand)
}

/// Result type of a view, which is the operand's own type when supported
pub fn view_result_type(operand: TypeIndex) -> Result<TypeIndex> {
    tables().views.result_type(operand)
}

// The kernel pointer is copied out before the call so the read lock is not
// held while user data is processed.

pub fn dispatch_unary(
    op: UnaryOp,
    input: Input<'_>,
    output: &mut dyn ErasedArray,
    args: &KernelArgs<'_>,
) -> Result<()> {
    let operand = input.type_index(output);
    let kernel = tables().unary(op)?.kernel(operand, output.type_index())?;
    kernel(input, output, args)
}

pub fn dispatch_binary(
    op: BinaryOp,
    lhs: Input<'_>,
    rhs: Input<'_>,
    output: &mut dyn ErasedArray,
    args: &KernelArgs<'_>,
) -> Result<()> {
    let (l, r) = (lhs.type_index(output), rhs.type_index(output));
    let (result, kernel) = tables().binary(op)?.kernel(l, r)?;
    if result != output.type_index() {
        return Err(DynArrayError::TypeMismatch {
            expected: registry::type_name(result),
            actual: output.type_name(),
        });
    }
    kernel(lhs, rhs, output, args)
}

pub fn dispatch_reduce(
    kind: ReducerKind,
    input: Input<'_>,
    output: &mut dyn ErasedArray,
    args: &ReduceArgs<'_>,
) -> Result<()> {
    let operand = input.type_index(output);
    let kernel = tables().reducer(kind)?.kernel(operand, output.type_index())?;
    kernel(input, output, args)
}

/// Copy `input` into `output`, converting to the output's element type
pub fn dispatch_assign(input: Input<'_>, output: &mut dyn ErasedArray, args: &KernelArgs<'_>) -> Result<()> {
    let source = input.type_index(output);
    let kernel = tables().assign.kernel(source, output.type_index())?;
    kernel(input, output, args)
}

pub fn dispatch_move(source: Box<dyn ErasedArray>, output: &mut dyn ErasedArray) -> Result<()> {
    let kernel = tables()
        .moves
        .kernel(source.type_index(), output.type_index())?;
    kernel(source, output)
}

pub fn dispatch_view(input: Input<'_>, output: &mut dyn ErasedArray, args: &ViewArgs<'_>) -> Result<()> {
    let operand = input.type_index(output);
    let kernel = tables().views.kernel(operand, output.type_index())?;
    kernel(input, output, args)
}

fn tables_mut() -> std::sync::RwLockWriteGuard<'static, Dispatchers> {
    DISPATCHERS.write().unwrap_or_else(PoisonError::into_inner)
}

/// Add `K` to the process-wide table of `op`, for operands of type `T`.
///
/// `K::Output` becomes the result type of `op` on `T`, replacing any built-in
/// one. Must happen before arrays are assigned concurrently.
pub fn insert_unary<K: UnaryKernel<T>, T: Element>(op: UnaryOp) {
    let mut tables = tables_mut();
    let table = tables
        .unary
        .entry(op)
        .or_insert_with(|| UnaryDispatcher::new(op.name()));
    table.insert_kernel::<K, T>();
    table.set_result(registry::register::<T>(), registry::register::<K::Output>());
}

pub fn insert_binary<K: BinaryKernel<A, B>, A: Element, B: Element>(op: BinaryOp) {
    tables_mut()
        .binary
        .entry(op)
        .or_insert_with(|| BinaryDispatcher::new(op.name()))
        .insert_kernel::<K, A, B>();
}

/// Like [`insert_unary`], `K::Output` becomes the result type of `kind` on `T`
pub fn insert_reducer<K: Reduction<T>, T: Element>(kind: ReducerKind) {
    let mut tables = tables_mut();
    let table = tables
        .reducers
        .entry(kind)
        .or_insert_with(|| UnaryDispatcher::new(kind.name()));
    table.insert_reducer::<K, T>();
    table.set_result(registry::register::<T>(), registry::register::<K::Output>());
}

impl UnaryDispatcher<UnaryFn> {
    /// Run the kernel for `input` directly, writing a fresh result into `output`
    pub fn dispatch(&self, input: &dyn ErasedArray, output: &mut dyn ErasedArray) -> Result<()> {
        let kernel = self.kernel(input.type_index(), output.type_index())?;
        let shape = input.shape();
        kernel(Input::Whole(input), output, &KernelArgs::whole(&shape))
    }
}

impl BinaryDispatcher<BinaryFn> {
    /// Run the kernel for `lhs` and `rhs` directly, writing a fresh result into `output`
    pub fn dispatch(&self, lhs: &dyn ErasedArray, rhs: &dyn ErasedArray, output: &mut dyn ErasedArray) -> Result<()> {
        let (_, kernel) = self.kernel(lhs.type_index(), rhs.type_index())?;
        let mut shape = lhs.shape();
        let trivial = crate::broadcast::broadcast_into(&mut shape, &rhs.shape())?;
        let args = KernelArgs {
            shape: &shape,
            target: None,
            trivial_broadcast: trivial && lhs.shape() == shape,
        };
        kernel(Input::Whole(lhs), Input::Whole(rhs), output, &args)
    }
}
