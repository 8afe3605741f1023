//! Table construction from static type lists

use super::functors::*;
use super::kernels::{run_binary, run_move, run_unary, run_view, BinaryFn, MoveFn, UnaryFn, ViewFn};
use super::table::{BinaryDispatcher, UnaryDispatcher};
use super::{BinaryOp, UnaryOp};
use crate::reducer::{self, ReduceFn, ReducerKind, Reduction};
use crate::registry;
use crate::types::Element;
use std::collections::HashMap;
use tracing::debug;

impl UnaryDispatcher<UnaryFn> {
    /// Register `K` for operands of type `T`
    pub fn insert_kernel<K: UnaryKernel<T>, T: Element>(&mut self) {
        let operand = registry::register::<T>();
        let result = registry::register::<K::Output>();
        self.insert(operand, result, run_unary::<K, T> as UnaryFn);
    }

    /// Register the conversion from `T` into `R`
    pub fn insert_cast<T: Element, R: Element>(&mut self) {
        self.insert_kernel::<Cast<R>, T>();
    }
}

impl BinaryDispatcher<BinaryFn> {
    /// Register `K` for operands of types `A` and `B`
    pub fn insert_kernel<K: BinaryKernel<A, B>, A: Element, B: Element>(&mut self) {
        let lhs = registry::register::<A>();
        let rhs = registry::register::<B>();
        let result = registry::register::<K::Output>();
        self.insert(lhs, rhs, result, run_binary::<K, A, B> as BinaryFn);
    }
}

impl UnaryDispatcher<MoveFn> {
    pub fn insert_move<T: Element, R: Element>(&mut self) {
        let source = registry::register::<T>();
        let target = registry::register::<R>();
        self.insert(source, target, run_move::<T, R> as MoveFn);
    }
}

impl UnaryDispatcher<ViewFn> {
    pub fn insert_view<T: Element>(&mut self) {
        let index = registry::register::<T>();
        self.insert(index, index, run_view::<T> as ViewFn);
    }
}

impl UnaryDispatcher<ReduceFn> {
    pub fn insert_reducer<K: Reduction<T>, T: Element>(&mut self) {
        let operand = registry::register::<T>();
        let result = registry::register::<K::Output>();
        self.insert(operand, result, reducer::run_reduce::<K, T> as ReduceFn);
    }
}

// =============================================================================
// Type lists
// =============================================================================

#[cfg(not(feature = "small-ints"))]
macro_rules! numeric {
    ($m:ident!($($args:tt)*)) => { $m!($($args)* [f32, f64, i32, u32, i64, u64]) };
}

#[cfg(feature = "small-ints")]
macro_rules! numeric {
    ($m:ident!($($args:tt)*)) => { $m!($($args)* [f32, f64, i32, u32, i64, u64, i8, u8, i16, u16]) };
}

#[cfg(not(feature = "small-ints"))]
macro_rules! logical {
    ($m:ident!($($args:tt)*)) => { $m!($($args)* [f32, f64, i32, u32, i64, u64, bool]) };
}

#[cfg(feature = "small-ints")]
macro_rules! logical {
    ($m:ident!($($args:tt)*)) => { $m!($($args)* [f32, f64, i32, u32, i64, u64, i8, u8, i16, u16, bool]) };
}

#[cfg(not(feature = "small-ints"))]
macro_rules! integral {
    ($m:ident!($($args:tt)*)) => { $m!($($args)* [i32, u32, i64, u64, bool]) };
}

#[cfg(feature = "small-ints")]
macro_rules! integral {
    ($m:ident!($($args:tt)*)) => { $m!($($args)* [i32, u32, i64, u64, i8, u8, i16, u16, bool]) };
}

macro_rules! every {
    ($m:ident!($($args:tt)*)) => {
        $m!($($args)* [f32, f64, i32, u32, i64, u64, i8, u8, i16, u16, bool])
    };
}

macro_rules! unary_types {
    ($table:ident, $kernel:ty, [$($t:ty),*]) => {
        $( $table.insert_kernel::<$kernel, $t>(); )*
    };
}

macro_rules! binary_pairs {
    (@rows $table:ident, $kernel:ty, [$($a:ty),*], $all:tt) => {
        $( binary_pairs!(@row $table, $kernel, $a, $all); )*
    };
    (@row $table:ident, $kernel:ty, $a:ty, [$($b:ty),*]) => {
        $( $table.insert_kernel::<$kernel, $a, $b>(); )*
    };
    ($table:ident, $kernel:ty, [$($t:ty),*]) => {
        binary_pairs!(@rows $table, $kernel, [$($t),*], [$($t),*]);
    };
}

macro_rules! unary_ops {
    ($tables:ident, $list:ident: $($op:ident => $kernel:ty),* $(,)?) => {$(
        let mut table = UnaryDispatcher::<UnaryFn>::new(UnaryOp::$op.name());
        $list!(unary_types!(table, $kernel,));
        $tables.insert(UnaryOp::$op, table);
    )*};
}

macro_rules! binary_ops {
    ($tables:ident, $list:ident: $($op:ident => $kernel:ty),* $(,)?) => {$(
        let mut table = BinaryDispatcher::<BinaryFn>::new(BinaryOp::$op.name());
        $list!(binary_pairs!(table, $kernel,));
        $tables.insert(BinaryOp::$op, table);
    )*};
}

macro_rules! reducers {
    ($tables:ident: $($kind:ident => $reduction:ty),* $(,)?) => {$(
        let mut table = UnaryDispatcher::<ReduceFn>::new(ReducerKind::$kind.name());
        numeric!(reducer_types!(table, $reduction,));
        $tables.insert(ReducerKind::$kind, table);
    )*};
}

macro_rules! reducer_types {
    ($table:ident, $reduction:ty, [$($t:ty),*]) => {
        $( $table.insert_reducer::<$reduction, $t>(); )*
    };
}

macro_rules! cast_pairs {
    (@rows $table:ident, $method:ident, [$($a:ty),*], $all:tt) => {
        $( cast_pairs!(@row $table, $method, $a, $all); )*
    };
    (@row $table:ident, $method:ident, $a:ty, [$($b:ty),*]) => {
        $( $table.$method::<$a, $b>(); )*
    };
    ($table:ident, $method:ident, [$($t:ty),*]) => {
        cast_pairs!(@rows $table, $method, [$($t),*], [$($t),*]);
    };
}

macro_rules! view_types {
    ($table:ident, [$($t:ty),*]) => {
        $( $table.insert_view::<$t>(); )*
    };
}

// =============================================================================
// Construction
// =============================================================================

pub(super) fn unary_tables() -> HashMap<UnaryOp, UnaryDispatcher<UnaryFn>> {
    let mut tables = HashMap::new();
    unary_ops!(tables, numeric:
        Identity => Identity,
        Negate => Negate,
        Fabs => Fabs,
        Exp => Exp,
        Exp2 => Exp2,
        Expm1 => Expm1,
        Log => Log,
        Log10 => Log10,
        Log2 => Log2,
        Log1p => Log1p,
        Sqrt => Sqrt,
        Cbrt => Cbrt,
        Sin => Sin,
        Cos => Cos,
        Tan => Tan,
        Asin => Asin,
        Acos => Acos,
        Atan => Atan,
        Sinh => Sinh,
        Cosh => Cosh,
        Tanh => Tanh,
        Asinh => Asinh,
        Acosh => Acosh,
        Atanh => Atanh,
        Erf => Erf,
        Erfc => Erfc,
        Tgamma => Tgamma,
        Lgamma => Lgamma,
        Ceil => Ceil,
        Floor => Floor,
        Trunc => Trunc,
        Round => Round,
        Nearbyint => Nearbyint,
        Rint => Rint,
        IsFinite => IsFinite,
        IsInf => IsInf,
        IsNan => IsNan,
    );
    unary_ops!(tables, logical: LogicalNot => LogicalNot);
    unary_ops!(tables, integral: BitwiseNot => BitwiseNot);
    debug!(operations = tables.len(), "built unary dispatch tables");
    tables
}

pub(super) fn binary_tables() -> HashMap<BinaryOp, BinaryDispatcher<BinaryFn>> {
    let mut tables = HashMap::new();
    binary_ops!(tables, numeric:
        Plus => Plus,
        Minus => Minus,
        Multiplies => Multiplies,
        Divides => Divides,
        Modulus => Modulus,
        Fmod => Fmod,
        Remainder => Remainder,
        Fmax => Fmax,
        Fmin => Fmin,
        Fdim => Fdim,
        Pow => Pow,
        Hypot => Hypot,
        Atan2 => Atan2,
    );
    binary_ops!(tables, logical:
        LogicalAnd => LogicalAnd,
        LogicalOr => LogicalOr,
        Less => Less,
        LessEqual => LessEqual,
        Greater => Greater,
        GreaterEqual => GreaterEqual,
        Equal => Equal,
        NotEqual => NotEqual,
    );
    binary_ops!(tables, integral:
        BitwiseAnd => BitwiseAnd,
        BitwiseOr => BitwiseOr,
        BitwiseXor => BitwiseXor,
        LeftShift => LeftShift,
        RightShift => RightShift,
    );
    debug!(operations = tables.len(), "built binary dispatch tables");
    tables
}

pub(super) fn reducer_tables() -> HashMap<ReducerKind, UnaryDispatcher<ReduceFn>> {
    let mut tables = HashMap::new();
    reducers!(tables:
        Sum => reducer::Sum,
        Prod => reducer::Prod,
        Mean => reducer::Mean,
        Variance => reducer::Variance,
        Stddev => reducer::Stddev,
        Amin => reducer::Amin,
        Amax => reducer::Amax,
        NormL0 => reducer::NormL0,
        NormL1 => reducer::NormL1,
        NormL2 => reducer::NormL2,
    );
    debug!(reducers = tables.len(), "built reducer dispatch tables");
    tables
}

pub(super) fn assign_table() -> UnaryDispatcher<UnaryFn> {
    let mut table = UnaryDispatcher::<UnaryFn>::new("assign");
    every!(cast_pairs!(table, insert_cast,));
    table
}

pub(super) fn move_table() -> UnaryDispatcher<MoveFn> {
    let mut table = UnaryDispatcher::<MoveFn>::new("move");
    every!(cast_pairs!(table, insert_move,));
    table
}

pub(super) fn view_table() -> UnaryDispatcher<ViewFn> {
    let mut table = UnaryDispatcher::<ViewFn>::new("view");
    every!(view_types!(table,));
    table
}
