//! Element types that can live inside an erased array
//!
//! Every supported primitive implements [`Element`]. The associated types
//! encode the numeric tower used when kernels pick their result type:
//! integral promotion, the usual arithmetic conversions, the floating
//! counterpart used by math functions, and the accumulator used by sums.

use super::DType;
use super::special;
use num_traits::Float;
use std::fmt;

/// A single element value with its type erased to one of four families
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl Scalar {
    #[inline]
    pub fn is_truthy(self) -> bool {
        match self {
            Scalar::Bool(b) => b,
            Scalar::Int(v) => v != 0,
            Scalar::UInt(v) => v != 0,
            Scalar::Float(v) => v != 0.0,
        }
    }

    /// Convert into a concrete element type with `as` semantics
    pub fn to<T: Element>(self) -> T {
        T::from_scalar(self)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

macro_rules! scalar_from {
    ($variant:ident as $wide:ty: $($t:ty),*) => {$(
        impl From<$t> for Scalar {
            fn from(value: $t) -> Self {
                Scalar::$variant(value as $wide)
            }
        }
    )*};
}

scalar_from!(Int as i64: i8, i16, i32, i64);
scalar_from!(UInt as u64: u8, u16, u32, u64);
scalar_from!(Float as f64: f32, f64);

/// Trait for element types storable in an erased array
pub trait Element: Copy + Default + PartialOrd + fmt::Debug + Send + Sync + 'static {
    const DTYPE: DType;
    const NAME: &'static str;

    /// Type after integral promotion (`bool`, 8 and 16 bit ints become `i32`)
    type Promoted: Element;
    /// Floating type produced by math functions over this type
    type Float: FloatElement;
    /// Type used to accumulate sums and products
    type Accumulator: ArithElement;

    fn to_scalar(self) -> Scalar;
    fn from_scalar(value: Scalar) -> Self;

    /// Convert to another element type with `as` semantics.
    ///
    /// Both conversions are inlined, so after monomorphization the `Scalar`
    /// round trip folds into a single `as` cast.
    #[inline]
    fn cast<U: Element>(self) -> U {
        U::from_scalar(self.to_scalar())
    }

    fn is_truthy(self) -> bool {
        self.to_scalar().is_truthy()
    }
}

/// Usual arithmetic conversions between two promoted types
pub trait ArithmeticConversion<Rhs> {
    type Output: Element;
}

/// Result type of a binary operation between `Self` and `Rhs`
pub trait Promote<Rhs: Element>: Element {
    type Output: Element;
}

impl<A: Element, B: Element> Promote<B> for A
where
    A::Promoted: ArithmeticConversion<B::Promoted>,
{
    type Output = <A::Promoted as ArithmeticConversion<B::Promoted>>::Output;
}

/// Shorthand for the promoted type of `A op B`
pub type Promoted<A, B> = <A as Promote<B>>::Output;

/// Element types with wrapping arithmetic
pub trait ArithElement: Element {
    fn zero_value() -> Self;
    fn one_value() -> Self;
    fn plus(self, rhs: Self) -> Self;
    fn minus(self, rhs: Self) -> Self;
    fn times(self, rhs: Self) -> Self;
    /// `None` on integer division by zero
    fn divided(self, rhs: Self) -> Option<Self>;
    /// `None` on integer remainder by zero
    fn modulo(self, rhs: Self) -> Option<Self>;
    fn negated(self) -> Self;
}

/// Integer element types with bitwise operations
pub trait IntElement: ArithElement {
    fn bit_and(self, rhs: Self) -> Self;
    fn bit_or(self, rhs: Self) -> Self;
    fn bit_xor(self, rhs: Self) -> Self;
    fn bit_not(self) -> Self;
    fn shift_left(self, amount: u32) -> Self;
    fn shift_right(self, amount: u32) -> Self;
}

/// Floating element types, with the C math functions `num_traits::Float` lacks
pub trait FloatElement: ArithElement + Float {
    /// Round half to even
    fn rint(self) -> Self;

    fn erf(self) -> Self {
        Self::from_scalar(Scalar::Float(special::erf(self.cast::<f64>())))
    }

    fn erfc(self) -> Self {
        Self::from_scalar(Scalar::Float(special::erfc(self.cast::<f64>())))
    }

    fn tgamma(self) -> Self {
        Self::from_scalar(Scalar::Float(special::gamma(self.cast::<f64>())))
    }

    fn lgamma(self) -> Self {
        Self::from_scalar(Scalar::Float(special::ln_gamma(self.cast::<f64>())))
    }

    /// IEEE remainder: `self - n * rhs` with `n` the quotient rounded to even
    fn ieee_remainder(self, rhs: Self) -> Self {
        let n = (self / rhs).rint();
        self - n * rhs
    }

    /// Positive difference
    fn fdim(self, rhs: Self) -> Self {
        if self.is_nan() || rhs.is_nan() {
            Self::nan()
        } else if self > rhs {
            self - rhs
        } else {
            Self::zero_value()
        }
    }
}

// =============================================================================
// Element implementations
// =============================================================================

impl Element for bool {
    const DTYPE: DType = DType::Bool;
    const NAME: &'static str = "bool";

    type Promoted = i32;
    type Float = f64;
    type Accumulator = u64;

    #[inline]
    fn to_scalar(self) -> Scalar {
        Scalar::Bool(self)
    }

    #[inline]
    fn from_scalar(value: Scalar) -> Self {
        value.is_truthy()
    }
}

macro_rules! impl_int_element {
    ($($t:ty => $dtype:ident, $family:ident, $promoted:ty, $acc:ty);* $(;)?) => {$(
        impl Element for $t {
            const DTYPE: DType = DType::$dtype;
            const NAME: &'static str = stringify!($t);

            type Promoted = $promoted;
            type Float = f64;
            type Accumulator = $acc;

            #[inline]
            fn to_scalar(self) -> Scalar {
                Scalar::$family(self as _)
            }

            #[inline]
            fn from_scalar(value: Scalar) -> Self {
                match value {
                    Scalar::Bool(b) => b as $t,
                    Scalar::Int(v) => v as $t,
                    Scalar::UInt(v) => v as $t,
                    Scalar::Float(v) => v as $t,
                }
            }
        }
    )*};
}

impl_int_element! {
    i8 => I8, Int, i32, i64;
    u8 => U8, UInt, i32, u64;
    i16 => I16, Int, i32, i64;
    u16 => U16, UInt, i32, u64;
    i32 => I32, Int, i32, i64;
    u32 => U32, UInt, u32, u64;
    i64 => I64, Int, i64, i64;
    u64 => U64, UInt, u64, u64;
}

macro_rules! impl_float_element {
    ($($t:ty => $dtype:ident);* $(;)?) => {$(
        impl Element for $t {
            const DTYPE: DType = DType::$dtype;
            const NAME: &'static str = stringify!($t);

            type Promoted = $t;
            type Float = $t;
            type Accumulator = $t;

            #[inline]
            fn to_scalar(self) -> Scalar {
                Scalar::Float(self as f64)
            }

            #[inline]
            fn from_scalar(value: Scalar) -> Self {
                match value {
                    Scalar::Bool(b) => b as u8 as $t,
                    Scalar::Int(v) => v as $t,
                    Scalar::UInt(v) => v as $t,
                    Scalar::Float(v) => v as $t,
                }
            }
        }

        impl ArithElement for $t {
            fn zero_value() -> Self {
                0.0
            }
            fn one_value() -> Self {
                1.0
            }
            fn plus(self, rhs: Self) -> Self {
                self + rhs
            }
            fn minus(self, rhs: Self) -> Self {
                self - rhs
            }
            fn times(self, rhs: Self) -> Self {
                self * rhs
            }
            fn divided(self, rhs: Self) -> Option<Self> {
                Some(self / rhs)
            }
            fn modulo(self, rhs: Self) -> Option<Self> {
                Some(self % rhs)
            }
            fn negated(self) -> Self {
                -self
            }
        }

        impl FloatElement for $t {
            fn rint(self) -> Self {
                <$t>::round_ties_even(self)
            }
        }
    )*};
}

impl_float_element! {
    f32 => F32;
    f64 => F64;
}

macro_rules! impl_arith_int {
    ($($t:ty),*) => {$(
        impl ArithElement for $t {
            fn zero_value() -> Self {
                0
            }
            fn one_value() -> Self {
                1
            }
            fn plus(self, rhs: Self) -> Self {
                self.wrapping_add(rhs)
            }
            fn minus(self, rhs: Self) -> Self {
                self.wrapping_sub(rhs)
            }
            fn times(self, rhs: Self) -> Self {
                self.wrapping_mul(rhs)
            }
            fn divided(self, rhs: Self) -> Option<Self> {
                (rhs != 0).then(|| self.wrapping_div(rhs))
            }
            fn modulo(self, rhs: Self) -> Option<Self> {
                (rhs != 0).then(|| self.wrapping_rem(rhs))
            }
            fn negated(self) -> Self {
                self.wrapping_neg()
            }
        }

        impl IntElement for $t {
            fn bit_and(self, rhs: Self) -> Self {
                self & rhs
            }
            fn bit_or(self, rhs: Self) -> Self {
                self | rhs
            }
            fn bit_xor(self, rhs: Self) -> Self {
                self ^ rhs
            }
            fn bit_not(self) -> Self {
                !self
            }
            fn shift_left(self, amount: u32) -> Self {
                self.wrapping_shl(amount)
            }
            fn shift_right(self, amount: u32) -> Self {
                self.wrapping_shr(amount)
            }
        }
    )*};
}

impl_arith_int!(i8, i16, i32, i64, u8, u16, u32, u64);

// Rank order after integral promotion: i32 < u32 < i64 < u64 < f32 < f64
macro_rules! conversions {
    ($($a:ty, $b:ty => $out:ty;)*) => {$(
        impl ArithmeticConversion<$b> for $a {
            type Output = $out;
        }
    )*};
}

conversions! {
    i32, i32 => i32; i32, u32 => u32; i32, i64 => i64; i32, u64 => u64; i32, f32 => f32; i32, f64 => f64;
    u32, i32 => u32; u32, u32 => u32; u32, i64 => i64; u32, u64 => u64; u32, f32 => f32; u32, f64 => f64;
    i64, i32 => i64; i64, u32 => i64; i64, i64 => i64; i64, u64 => u64; i64, f32 => f32; i64, f64 => f64;
    u64, i32 => u64; u64, u32 => u64; u64, i64 => u64; u64, u64 => u64; u64, f32 => f32; u64, f64 => f64;
    f32, i32 => f32; f32, u32 => f32; f32, i64 => f32; f32, u64 => f32; f32, f32 => f32; f32, f64 => f64;
    f64, i32 => f64; f64, u32 => f64; f64, i64 => f64; f64, u64 => f64; f64, f32 => f64; f64, f64 => f64;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::TypeId;

    fn same<A: 'static, B: 'static>() -> bool {
        TypeId::of::<A>() == TypeId::of::<B>()
    }

    #[test]
    fn usual_arithmetic_conversions() {
        assert!(same::<Promoted<f32, f64>, f64>());
        assert!(same::<Promoted<f32, f32>, f32>());
        assert!(same::<Promoted<i8, u8>, i32>());
        assert!(same::<Promoted<bool, bool>, i32>());
        assert!(same::<Promoted<i32, u32>, u32>());
        assert!(same::<Promoted<u32, i64>, i64>());
        assert!(same::<Promoted<i64, u64>, u64>());
        assert!(same::<Promoted<u64, f32>, f32>());
        assert!(same::<Promoted<u16, f64>, f64>());
    }

    #[test]
    fn casts_follow_as_semantics() {
        assert_eq!((-1i32).cast::<u8>(), 255u8);
        assert_eq!(true.cast::<f64>(), 1.0);
        assert_eq!(2.7f64.cast::<i32>(), 2);
        assert!(!0.0f32.cast::<bool>());
        assert_eq!(u64::MAX.cast::<u64>(), u64::MAX);
        assert_eq!(i64::MIN.cast::<i64>(), i64::MIN);
    }

    #[test]
    fn integer_division_by_zero_is_none() {
        assert_eq!(7i32.divided(0), None);
        assert_eq!(7u64.modulo(0), None);
        assert_eq!(7i32.divided(2), Some(3));
        assert_eq!(i32::MIN.divided(-1), Some(i32::MIN));
        assert!(1.0f64.divided(0.0).unwrap().is_infinite());
    }

    #[test]
    fn float_extras() {
        assert_eq!(2.5f64.rint(), 2.0);
        assert_eq!(3.5f32.rint(), 4.0);
        assert_eq!(5.0f64.ieee_remainder(3.0), -1.0);
        assert_eq!(5.0f64.fdim(3.0), 2.0);
        assert_eq!(3.0f64.fdim(5.0), 0.0);
        assert!((4.0f64.tgamma() - 6.0).abs() < 1e-10);
    }
}
