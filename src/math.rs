//! Free functions building expression nodes
//!
//! Everything here is lazy: each call returns an [`Expr`] and nothing is
//! computed until the expression is assigned.

use crate::dispatch::{BinaryOp, UnaryOp};
use crate::expression::Expr;
use crate::reducer::{ReducerKind, ReducerOptions};
use crate::slice::SliceSpec;

macro_rules! unary_functions {
    ($($name:ident => $op:ident),* $(,)?) => {$(
        pub fn $name<'a>(operand: impl Into<Expr<'a>>) -> Expr<'a> {
            Expr::unary(UnaryOp::$op, operand)
        }
    )*};
}

macro_rules! binary_functions {
    ($($name:ident => $op:ident),* $(,)?) => {$(
        pub fn $name<'a>(lhs: impl Into<Expr<'a>>, rhs: impl Into<Expr<'a>>) -> Expr<'a> {
            Expr::binary(BinaryOp::$op, lhs, rhs)
        }
    )*};
}

macro_rules! reducer_functions {
    ($($name:ident => $kind:ident),* $(,)?) => {$(
        pub fn $name<'a>(operand: impl Into<Expr<'a>>, options: impl Into<ReducerOptions>) -> Expr<'a> {
            Expr::reduce(ReducerKind::$kind, operand, options)
        }
    )*};
}

unary_functions!(
    identity => Identity,
    negate => Negate,
    logical_not => LogicalNot,
    bitwise_not => BitwiseNot,
    fabs => Fabs,
    exp => Exp,
    exp2 => Exp2,
    expm1 => Expm1,
    log => Log,
    log10 => Log10,
    log2 => Log2,
    log1p => Log1p,
    sqrt => Sqrt,
    cbrt => Cbrt,
    sin => Sin,
    cos => Cos,
    tan => Tan,
    asin => Asin,
    acos => Acos,
    atan => Atan,
    sinh => Sinh,
    cosh => Cosh,
    tanh => Tanh,
    asinh => Asinh,
    acosh => Acosh,
    atanh => Atanh,
    erf => Erf,
    erfc => Erfc,
    tgamma => Tgamma,
    lgamma => Lgamma,
    ceil => Ceil,
    floor => Floor,
    trunc => Trunc,
    round => Round,
    nearbyint => Nearbyint,
    rint => Rint,
    isfinite => IsFinite,
    isinf => IsInf,
    isnan => IsNan,
);

binary_functions!(
    plus => Plus,
    minus => Minus,
    multiplies => Multiplies,
    divides => Divides,
    modulus => Modulus,
    logical_or => LogicalOr,
    logical_and => LogicalAnd,
    bitwise_or => BitwiseOr,
    bitwise_and => BitwiseAnd,
    bitwise_xor => BitwiseXor,
    left_shift => LeftShift,
    right_shift => RightShift,
    less => Less,
    less_equal => LessEqual,
    greater => Greater,
    greater_equal => GreaterEqual,
    equal => Equal,
    not_equal => NotEqual,
    fmod => Fmod,
    remainder => Remainder,
    fmax => Fmax,
    fmin => Fmin,
    fdim => Fdim,
    pow => Pow,
    hypot => Hypot,
    atan2 => Atan2,
);

reducer_functions!(
    sum => Sum,
    prod => Prod,
    mean => Mean,
    variance => Variance,
    stddev => Stddev,
    amin => Amin,
    amax => Amax,
    norm_l0 => NormL0,
    norm_l1 => NormL1,
    norm_l2 => NormL2,
);

/// Lazy strided view of `operand`
pub fn strided_view<'a>(operand: impl Into<Expr<'a>>, slices: impl Into<Vec<SliceSpec>>) -> Expr<'a> {
    Expr::view(operand, slices)
}
