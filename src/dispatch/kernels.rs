//! Erased kernel entry points
//!
//! Every table stores plain function pointers. Each one is a monomorphized
//! `run_*` function that downcasts its erased arguments, broadcasts the
//! operands to the requested shape and writes into the output buffer.

use super::functors::{BinaryKernel, Cast, UnaryKernel};
use crate::erased::{downcast, downcast_mut, ArrayKind, ErasedArray, TypedArray};
use crate::error::{DynArrayError, Result};
use crate::registry::TypeIndex;
use crate::slice::{region_view, slice_view, SliceSpec};
use crate::types::Element;
use ndarray::{ArrayViewD, CowArray, IxDyn, Zip};
use std::any::TypeId;
use std::ops::Range;

/// One operand of a kernel call
#[derive(Debug, Clone, Copy)]
pub enum Input<'a> {
    /// The entire array
    Whole(&'a dyn ErasedArray),
    /// Only the given region of the array
    Region(&'a dyn ErasedArray, &'a [Range<usize>]),
    /// The output buffer itself, updated in place
    InPlace,
}

impl<'a> Input<'a> {
    pub fn type_index(&self, output: &dyn ErasedArray) -> TypeIndex {
        match self {
            Input::Whole(array) | Input::Region(array, _) => array.type_index(),
            Input::InPlace => output.type_index(),
        }
    }

    /// Typed values of the operand; `None` when it is the output buffer
    pub fn read<T: Element>(&self) -> Result<Option<CowArray<'a, T, IxDyn>>> {
        match *self {
            Input::Whole(array) => downcast::<T>(array)?.read_region(None).map(Some),
            Input::Region(array, ranges) => downcast::<T>(array)?.read_region(Some(ranges)).map(Some),
            Input::InPlace => Ok(None),
        }
    }
}

/// Where and how a kernel writes its result
#[derive(Debug, Clone, Copy)]
pub struct KernelArgs<'a> {
    /// Shape of the values produced
    pub shape: &'a [usize],
    /// Region of the output to write; `None` replaces the whole output
    pub target: Option<&'a [Range<usize>]>,
    /// Operands already have `shape`, so elements map one to one
    pub trivial_broadcast: bool,
}

impl<'a> KernelArgs<'a> {
    pub fn whole(shape: &'a [usize]) -> Self {
        Self {
            shape,
            target: None,
            trivial_broadcast: false,
        }
    }
}

/// Arguments of a strided view kernel
#[derive(Debug, Clone, Copy)]
pub struct ViewArgs<'a> {
    pub slices: &'a [SliceSpec],
    /// Part of the view to keep
    pub region: Option<&'a [Range<usize>]>,
}

pub type UnaryFn = fn(Input<'_>, &mut dyn ErasedArray, &KernelArgs<'_>) -> Result<()>;
pub type BinaryFn = fn(Input<'_>, Input<'_>, &mut dyn ErasedArray, &KernelArgs<'_>) -> Result<()>;
pub type ViewFn = fn(Input<'_>, &mut dyn ErasedArray, &ViewArgs<'_>) -> Result<()>;
pub type MoveFn = fn(Box<dyn ErasedArray>, &mut dyn ErasedArray) -> Result<()>;

pub(crate) fn stretch<'v, T>(values: &'v CowArray<'_, T, IxDyn>, shape: &[usize]) -> Result<ArrayViewD<'v, T>> {
    values
        .broadcast(IxDyn(shape))
        .ok_or_else(|| DynArrayError::Broadcast {
            from: values.shape().to_vec(),
            into: shape.to_vec(),
        })
}

fn in_place_output<R: Element>(output: &mut dyn ErasedArray) -> Result<&mut ndarray::ArrayD<R>> {
    downcast_mut::<R>(output)?.array_mut()
}

fn division_by_zero() -> DynArrayError {
    DynArrayError::Arithmetic("integer division by zero".into())
}

pub(crate) fn run_unary<K, T>(input: Input<'_>, output: &mut dyn ErasedArray, args: &KernelArgs<'_>) -> Result<()>
where
    K: UnaryKernel<T>,
    T: Element,
{
    let Some(values) = input.read::<T>()? else {
        in_place_output::<K::Output>(output)?.mapv_inplace(|value| K::apply(value.cast::<T>()));
        return Ok(());
    };
    let values = stretch(&values, args.shape)?;
    downcast_mut::<K::Output>(output)?.write(args.target, args.shape, |mut dst| {
        if args.trivial_broadcast {
            if let (Some(dst), Some(src)) = (dst.as_slice_mut(), values.as_slice()) {
                for (d, &s) in dst.iter_mut().zip(src) {
                    *d = K::apply(s);
                }
                return Ok(());
            }
        }
        Zip::from(&mut dst).and(&values).for_each(|d, &s| *d = K::apply(s));
        Ok(())
    })
}

pub(crate) fn run_binary<K, A, B>(
    lhs: Input<'_>,
    rhs: Input<'_>,
    output: &mut dyn ErasedArray,
    args: &KernelArgs<'_>,
) -> Result<()>
where
    K: BinaryKernel<A, B>,
    A: Element,
    B: Element,
{
    let mut ok = true;
    match (lhs.read::<A>()?, rhs.read::<B>()?) {
        (Some(l), Some(r)) => {
            let l = stretch(&l, args.shape)?;
            let r = stretch(&r, args.shape)?;
            downcast_mut::<K::Output>(output)?.write(args.target, args.shape, |mut dst| {
                if args.trivial_broadcast {
                    if let (Some(dst), Some(l), Some(r)) = (dst.as_slice_mut(), l.as_slice(), r.as_slice()) {
                        for ((d, &a), &b) in dst.iter_mut().zip(l).zip(r) {
                            match K::apply(a, b) {
                                Some(value) => *d = value,
                                None => ok = false,
                            }
                        }
                        return Ok(());
                    }
                }
                Zip::from(&mut dst).and(&l).and(&r).for_each(|d, &a, &b| match K::apply(a, b) {
                    Some(value) => *d = value,
                    None => ok = false,
                });
                Ok(())
            })?;
        }
        (None, Some(r)) => {
            let dst = in_place_output::<K::Output>(output)?;
            let shape = dst.shape().to_vec();
            let r = stretch(&r, &shape)?;
            Zip::from(dst).and(&r).for_each(|d, &b| match K::apply(d.cast::<A>(), b) {
                Some(value) => *d = value,
                None => ok = false,
            });
        }
        (Some(l), None) => {
            let dst = in_place_output::<K::Output>(output)?;
            let shape = dst.shape().to_vec();
            let l = stretch(&l, &shape)?;
            Zip::from(dst).and(&l).for_each(|d, &a| match K::apply(a, d.cast::<B>()) {
                Some(value) => *d = value,
                None => ok = false,
            });
        }
        (None, None) => {
            return Err(DynArrayError::unsupported(
                "both operands cannot share the output buffer",
            ));
        }
    }
    if ok { Ok(()) } else { Err(division_by_zero()) }
}

pub(crate) fn run_view<T: Element>(input: Input<'_>, output: &mut dyn ErasedArray, args: &ViewArgs<'_>) -> Result<()> {
    let values = input
        .read::<T>()?
        .ok_or_else(|| DynArrayError::unsupported("views cannot run in place"))?;
    let view = slice_view(values.view(), args.slices)?;
    let view = match args.region {
        Some(ranges) => region_view(view, ranges)?,
        None => view,
    };
    let shape = view.shape().to_vec();
    downcast_mut::<T>(output)?.write(None, &shape, |mut dst| {
        dst.assign(&view);
        Ok(())
    })
}

/// Move `source` into `output`.
///
/// A dense source of the receiver's own type hands over its buffer; anything
/// else is copied element by element with a cast.
pub(crate) fn run_move<T: Element, R: Element>(source: Box<dyn ErasedArray>, output: &mut dyn ErasedArray) -> Result<()> {
    let same_type = TypeId::of::<T>() == TypeId::of::<R>();
    if same_type && source.kind() == ArrayKind::Dense && output.kind() == ArrayKind::Dense {
        let actual = source.type_name();
        let source = source
            .into_any()
            .downcast::<TypedArray<R>>()
            .map_err(|_| DynArrayError::TypeMismatch {
                expected: R::NAME,
                actual,
            })?;
        return downcast_mut::<R>(output)?.steal(*source);
    }
    let shape = source.shape();
    output.resize(&shape)?;
    run_unary::<Cast<R>, T>(Input::Whole(source.as_ref()), output, &KernelArgs::whole(&shape))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::functors::{Divides, Negate, Plus};
    use ndarray::{array, ArrayD};

    fn dense<T: Element>(values: ArrayD<T>) -> Box<dyn ErasedArray> {
        Box::new(TypedArray::dense(values))
    }

    #[test]
    fn binary_broadcasts_operands() {
        let a = dense(array![[1.0f64, 2.0], [3.0, 4.0]].into_dyn());
        let b = dense(array![10.0f32, 20.0].into_dyn());
        let mut out = dense(ArrayD::<f64>::zeros(IxDyn(&[0])));
        run_binary::<Plus, f64, f32>(
            Input::Whole(a.as_ref()),
            Input::Whole(b.as_ref()),
            out.as_mut(),
            &KernelArgs::whole(&[2, 2]),
        )
        .unwrap();
        assert_eq!(
            downcast::<f64>(out.as_ref()).unwrap().array().unwrap(),
            &array![[11.0, 22.0], [13.0, 24.0]].into_dyn()
        );
    }

    #[test]
    fn in_place_and_regions() {
        let a = dense(array![[1i64, 2], [3, 4]].into_dyn());
        let mut out = dense(array![5i64, 6].into_dyn());
        let region = [1..2, 0..2];
        run_binary::<Plus, i64, i64>(
            Input::InPlace,
            Input::Region(a.as_ref(), &region),
            out.as_mut(),
            &KernelArgs::whole(&[2]),
        )
        .unwrap();
        assert_eq!(
            downcast::<i64>(out.as_ref()).unwrap().array().unwrap(),
            &array![8i64, 10].into_dyn()
        );

        run_unary::<Negate, i64>(Input::InPlace, out.as_mut(), &KernelArgs::whole(&[2])).unwrap();
        assert_eq!(
            downcast::<i64>(out.as_ref()).unwrap().array().unwrap(),
            &array![-8i64, -10].into_dyn()
        );
    }

    #[test]
    fn integer_division_by_zero_fails() {
        let a = dense(array![1i32, 2].into_dyn());
        let b = dense(array![1i32, 0].into_dyn());
        let mut out = dense(ArrayD::<i32>::zeros(IxDyn(&[2])));
        let err = run_binary::<Divides, i32, i32>(
            Input::Whole(a.as_ref()),
            Input::Whole(b.as_ref()),
            out.as_mut(),
            &KernelArgs {
                shape: &[2],
                target: None,
                trivial_broadcast: true,
            },
        )
        .unwrap_err();
        assert!(matches!(err, DynArrayError::Arithmetic(_)));
    }

    #[test]
    fn moves_steal_or_cast() {
        let mut out = dense(ArrayD::<f64>::zeros(IxDyn(&[0])));
        run_move::<f64, f64>(dense(array![1.5f64, 2.5].into_dyn()), out.as_mut()).unwrap();
        assert_eq!(out.shape(), vec![2]);

        let mut out = dense(ArrayD::<i32>::zeros(IxDyn(&[0])));
        run_move::<f64, i32>(dense(array![1.5f64, 2.5].into_dyn()), out.as_mut()).unwrap();
        assert_eq!(
            downcast::<i32>(out.as_ref()).unwrap().array().unwrap(),
            &array![1, 2].into_dyn()
        );
    }

    #[test]
    fn views_select_regions() {
        let a = dense(array![[1u8, 2, 3], [4, 5, 6]].into_dyn());
        let mut out = dense(ArrayD::<u8>::zeros(IxDyn(&[0])));
        let slices = [SliceSpec::All, SliceSpec::range(1, 3)];
        let region = [1..2, 0..2];
        run_view::<u8>(
            Input::Whole(a.as_ref()),
            out.as_mut(),
            &ViewArgs {
                slices: &slices,
                region: Some(&region),
            },
        )
        .unwrap();
        assert_eq!(
            downcast::<u8>(out.as_ref()).unwrap().array().unwrap(),
            &array![[5u8, 6]].into_dyn()
        );
    }
}
