//! Operator overloads building expression nodes

use super::Expr;
use crate::dispatch::{BinaryOp, UnaryOp};
use crate::DynArray;
use std::borrow::Cow;
use std::ops;

impl<'a> From<&'a DynArray> for Expr<'a> {
    fn from(array: &'a DynArray) -> Self {
        Expr::Leaf(Cow::Borrowed(array))
    }
}

impl From<DynArray> for Expr<'_> {
    fn from(array: DynArray) -> Self {
        Expr::Leaf(Cow::Owned(array))
    }
}

macro_rules! scalar_leaves {
    ($($t:ty),*) => {$(
        impl From<$t> for Expr<'_> {
            fn from(value: $t) -> Self {
                Expr::Leaf(Cow::Owned(DynArray::from_scalar(value)))
            }
        }
    )*};
}

scalar_leaves!(f32, f64, i32, u32, i64, u64, i8, u8, i16, u16, bool);

macro_rules! binary_operators {
    ($($trait:ident::$method:ident => $op:ident),* $(,)?) => {$(
        impl<'a, R: Into<Expr<'a>>> ops::$trait<R> for Expr<'a> {
            type Output = Expr<'a>;

            fn $method(self, rhs: R) -> Expr<'a> {
                Expr::binary(BinaryOp::$op, self, rhs)
            }
        }

        impl<'a, R: Into<Expr<'a>>> ops::$trait<R> for &'a DynArray {
            type Output = Expr<'a>;

            fn $method(self, rhs: R) -> Expr<'a> {
                Expr::binary(BinaryOp::$op, self, rhs)
            }
        }
    )*};
}

binary_operators!(
    Add::add => Plus,
    Sub::sub => Minus,
    Mul::mul => Multiplies,
    Div::div => Divides,
    Rem::rem => Modulus,
    BitAnd::bitand => BitwiseAnd,
    BitOr::bitor => BitwiseOr,
    BitXor::bitxor => BitwiseXor,
    Shl::shl => LeftShift,
    Shr::shr => RightShift,
);

// `2.0 * &a` and friends
macro_rules! scalar_lhs {
    (@impl $t:ty, $trait:ident::$method:ident => $op:ident) => {
        impl<'a> ops::$trait<&'a DynArray> for $t {
            type Output = Expr<'a>;

            fn $method(self, rhs: &'a DynArray) -> Expr<'a> {
                Expr::binary(BinaryOp::$op, self, rhs)
            }
        }

        impl<'a> ops::$trait<Expr<'a>> for $t {
            type Output = Expr<'a>;

            fn $method(self, rhs: Expr<'a>) -> Expr<'a> {
                Expr::binary(BinaryOp::$op, self, rhs)
            }
        }
    };
    ($($t:ty),*) => {$(
        scalar_lhs!(@impl $t, Add::add => Plus);
        scalar_lhs!(@impl $t, Sub::sub => Minus);
        scalar_lhs!(@impl $t, Mul::mul => Multiplies);
        scalar_lhs!(@impl $t, Div::div => Divides);
        scalar_lhs!(@impl $t, Rem::rem => Modulus);
    )*};
}

scalar_lhs!(f32, f64, i32, u32, i64, u64, i8, u8, i16, u16);

impl<'a> ops::Neg for Expr<'a> {
    type Output = Expr<'a>;

    fn neg(self) -> Expr<'a> {
        Expr::unary(UnaryOp::Negate, self)
    }
}

impl<'a> ops::Neg for &'a DynArray {
    type Output = Expr<'a>;

    fn neg(self) -> Expr<'a> {
        Expr::unary(UnaryOp::Negate, self)
    }
}

/// Logical negation, like `!` on a `bool`
impl<'a> ops::Not for Expr<'a> {
    type Output = Expr<'a>;

    fn not(self) -> Expr<'a> {
        Expr::unary(UnaryOp::LogicalNot, self)
    }
}

impl<'a> ops::Not for &'a DynArray {
    type Output = Expr<'a>;

    fn not(self) -> Expr<'a> {
        Expr::unary(UnaryOp::LogicalNot, self)
    }
}
