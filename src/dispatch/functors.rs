//! Statically typed element functors
//!
//! Each operation is a unit struct implementing [`UnaryKernel`] or
//! [`BinaryKernel`] for every element type combination it supports. The
//! associated `Output` type is the result type recorded in the dispatch table.

use crate::types::{ArithElement, Element, FloatElement, IntElement, Promote, Promoted};
use num_traits::Float;
use std::marker::PhantomData;

/// Element-wise function of one operand
pub trait UnaryKernel<T: Element> {
    type Output: Element;

    fn apply(value: T) -> Self::Output;
}

/// Element-wise function of two operands; `None` signals a division by zero
pub trait BinaryKernel<A: Element, B: Element> {
    type Output: Element;

    fn apply(lhs: A, rhs: B) -> Option<Self::Output>;
}

/// Conversion into `R`, used by assignment and moves
#[derive(Debug, Clone, Copy, Default)]
pub struct Cast<R>(PhantomData<R>);

impl<T: Element, R: Element> UnaryKernel<T> for Cast<R> {
    type Output = R;

    fn apply(value: T) -> R {
        value.cast()
    }
}

// =============================================================================
// Unary operators
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct Identity;

impl<T: Element> UnaryKernel<T> for Identity {
    type Output = T::Promoted;

    fn apply(value: T) -> T::Promoted {
        value.cast()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Negate;

impl<T: Element> UnaryKernel<T> for Negate
where
    T::Promoted: ArithElement,
{
    type Output = T::Promoted;

    fn apply(value: T) -> T::Promoted {
        value.cast::<T::Promoted>().negated()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BitwiseNot;

impl<T: Element> UnaryKernel<T> for BitwiseNot
where
    T::Promoted: IntElement,
{
    type Output = T::Promoted;

    fn apply(value: T) -> T::Promoted {
        value.cast::<T::Promoted>().bit_not()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LogicalNot;

impl<T: Element> UnaryKernel<T> for LogicalNot {
    type Output = bool;

    fn apply(value: T) -> bool {
        !value.is_truthy()
    }
}

// =============================================================================
// Unary math functions
// =============================================================================

macro_rules! float_unary {
    ($($name:ident => |$x:ident| $body:expr;)*) => {$(
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl<T: Element> UnaryKernel<T> for $name {
            type Output = T::Float;

            fn apply(value: T) -> T::Float {
                let $x = value.cast::<T::Float>();
                $body
            }
        }
    )*};
}

float_unary! {
    Fabs => |x| x.abs();
    Exp => |x| x.exp();
    Exp2 => |x| x.exp2();
    Expm1 => |x| x.exp_m1();
    Log => |x| x.ln();
    Log10 => |x| x.log10();
    Log2 => |x| x.log2();
    Log1p => |x| x.ln_1p();
    Sqrt => |x| x.sqrt();
    Cbrt => |x| x.cbrt();
    Sin => |x| x.sin();
    Cos => |x| x.cos();
    Tan => |x| x.tan();
    Asin => |x| x.asin();
    Acos => |x| x.acos();
    Atan => |x| x.atan();
    Sinh => |x| x.sinh();
    Cosh => |x| x.cosh();
    Tanh => |x| x.tanh();
    Asinh => |x| x.asinh();
    Acosh => |x| x.acosh();
    Atanh => |x| x.atanh();
    Erf => |x| FloatElement::erf(x);
    Erfc => |x| FloatElement::erfc(x);
    Tgamma => |x| FloatElement::tgamma(x);
    Lgamma => |x| FloatElement::lgamma(x);
    Ceil => |x| x.ceil();
    Floor => |x| x.floor();
    Trunc => |x| x.trunc();
    Round => |x| x.round();
    Nearbyint => |x| x.rint();
    Rint => |x| x.rint();
}

macro_rules! classification {
    ($($name:ident => $method:ident;)*) => {$(
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl<T: Element> UnaryKernel<T> for $name {
            type Output = bool;

            fn apply(value: T) -> bool {
                value.cast::<T::Float>().$method()
            }
        }
    )*};
}

classification! {
    IsFinite => is_finite;
    IsInf => is_infinite;
    IsNan => is_nan;
}

// =============================================================================
// Binary operators
// =============================================================================

macro_rules! arithmetic {
    ($($name:ident => |$a:ident, $b:ident| $body:expr;)*) => {$(
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl<A: Promote<B>, B: Element> BinaryKernel<A, B> for $name
        where
            Promoted<A, B>: ArithElement,
        {
            type Output = Promoted<A, B>;

            fn apply(lhs: A, rhs: B) -> Option<Promoted<A, B>> {
                let $a = lhs.cast::<Promoted<A, B>>();
                let $b = rhs.cast::<Promoted<A, B>>();
                $body
            }
        }
    )*};
}

arithmetic! {
    Plus => |a, b| Some(a.plus(b));
    Minus => |a, b| Some(a.minus(b));
    Multiplies => |a, b| Some(a.times(b));
    Divides => |a, b| a.divided(b);
    Modulus => |a, b| a.modulo(b);
}

macro_rules! bitwise {
    ($($name:ident => $method:ident;)*) => {$(
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl<A: Promote<B>, B: Element> BinaryKernel<A, B> for $name
        where
            Promoted<A, B>: IntElement,
        {
            type Output = Promoted<A, B>;

            fn apply(lhs: A, rhs: B) -> Option<Promoted<A, B>> {
                Some(lhs.cast::<Promoted<A, B>>().$method(rhs.cast()))
            }
        }
    )*};
}

bitwise! {
    BitwiseAnd => bit_and;
    BitwiseOr => bit_or;
    BitwiseXor => bit_xor;
}

macro_rules! shift {
    ($($name:ident => $method:ident;)*) => {$(
        /// Shifts keep the promoted type of the left operand
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl<A: Element, B: Element> BinaryKernel<A, B> for $name
        where
            A::Promoted: IntElement,
        {
            type Output = A::Promoted;

            fn apply(lhs: A, rhs: B) -> Option<A::Promoted> {
                Some(lhs.cast::<A::Promoted>().$method(rhs.cast::<u32>()))
            }
        }
    )*};
}

shift! {
    LeftShift => shift_left;
    RightShift => shift_right;
}

macro_rules! comparison {
    ($($name:ident => $op:tt;)*) => {$(
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl<A: Promote<B>, B: Element> BinaryKernel<A, B> for $name {
            type Output = bool;

            fn apply(lhs: A, rhs: B) -> Option<bool> {
                Some(lhs.cast::<Promoted<A, B>>() $op rhs.cast::<Promoted<A, B>>())
            }
        }
    )*};
}

comparison! {
    Less => <;
    LessEqual => <=;
    Greater => >;
    GreaterEqual => >=;
    Equal => ==;
    NotEqual => !=;
}

#[derive(Debug, Clone, Copy)]
pub struct LogicalAnd;

impl<A: Element, B: Element> BinaryKernel<A, B> for LogicalAnd {
    type Output = bool;

    fn apply(lhs: A, rhs: B) -> Option<bool> {
        Some(lhs.is_truthy() && rhs.is_truthy())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LogicalOr;

impl<A: Element, B: Element> BinaryKernel<A, B> for LogicalOr {
    type Output = bool;

    fn apply(lhs: A, rhs: B) -> Option<bool> {
        Some(lhs.is_truthy() || rhs.is_truthy())
    }
}

// =============================================================================
// Binary math functions
// =============================================================================

macro_rules! float_binary {
    ($($name:ident => |$a:ident, $b:ident| $body:expr;)*) => {$(
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl<A: Promote<B>, B: Element> BinaryKernel<A, B> for $name {
            type Output = <Promoted<A, B> as Element>::Float;

            fn apply(lhs: A, rhs: B) -> Option<Self::Output> {
                let $a = lhs.cast::<Self::Output>();
                let $b = rhs.cast::<Self::Output>();
                Some($body)
            }
        }
    )*};
}

float_binary! {
    Fmod => |a, b| a % b;
    Remainder => |a, b| a.ieee_remainder(b);
    Fmax => |a, b| Float::max(a, b);
    Fmin => |a, b| Float::min(a, b);
    Fdim => |a, b| a.fdim(b);
    Pow => |a, b| a.powf(b);
    Hypot => |a, b| a.hypot(b);
    Atan2 => |a, b| a.atan2(b);
}
