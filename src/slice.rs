//! Slice specifications for strided views

use crate::error::{DynArrayError, Result};
use ndarray::{ArrayViewD, ArrayViewMutD, Slice, SliceInfoElem};
use std::ops::Range;

/// One entry of a view's slice vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SliceSpec {
    /// Keep the whole axis
    All,
    /// Select one position and drop the axis; negative counts from the end
    Index(isize),
    /// `start..stop` with a step; bounds are clamped, negatives count from the end
    Range {
        start: Option<isize>,
        stop: Option<isize>,
        step: isize,
    },
    /// Insert an axis of length 1
    NewAxis,
}

impl SliceSpec {
    pub fn range(start: isize, stop: isize) -> Self {
        SliceSpec::Range {
            start: Some(start),
            stop: Some(stop),
            step: 1,
        }
    }

    pub fn stepped(start: Option<isize>, stop: Option<isize>, step: isize) -> Self {
        SliceSpec::Range { start, stop, step }
    }
}

impl From<isize> for SliceSpec {
    fn from(index: isize) -> Self {
        SliceSpec::Index(index)
    }
}

impl From<Range<isize>> for SliceSpec {
    fn from(range: Range<isize>) -> Self {
        SliceSpec::range(range.start, range.end)
    }
}

fn absolute(index: isize, len: usize) -> isize {
    if index < 0 { index + len as isize } else { index }
}

/// Validate a slice vector against a shape and lower it to ndarray terms.
///
/// Missing trailing axes are filled with [`SliceSpec::All`].
pub(crate) fn resolve(specs: &[SliceSpec], shape: &[usize]) -> Result<Vec<SliceInfoElem>> {
    let consumed = specs
        .iter()
        .filter(|spec| !matches!(spec, SliceSpec::NewAxis))
        .count();
    if consumed > shape.len() {
        return Err(DynArrayError::shape(format!(
            "{} sliced axes for an array of dimension {}",
            consumed,
            shape.len()
        )));
    }

    let mut axis = 0;
    let mut elems = Vec::with_capacity(specs.len() + shape.len() - consumed);
    for spec in specs {
        let elem = match spec {
            SliceSpec::NewAxis => SliceInfoElem::NewAxis,
            SliceSpec::All => {
                axis += 1;
                SliceInfoElem::Slice {
                    start: 0,
                    end: None,
                    step: 1,
                }
            }
            SliceSpec::Index(index) => {
                let len = shape[axis];
                let position = absolute(*index, len);
                if position < 0 || position >= len as isize {
                    return Err(DynArrayError::shape(format!(
                        "index {} out of bounds for axis {} of length {}",
                        index, axis, len
                    )));
                }
                axis += 1;
                SliceInfoElem::Index(position)
            }
            SliceSpec::Range { start, stop, step } => {
                if *step == 0 {
                    return Err(DynArrayError::shape("slice step cannot be zero"));
                }
                let len = shape[axis] as isize;
                let start = absolute(start.unwrap_or(0), len as usize).clamp(0, len);
                let stop = absolute(stop.unwrap_or(len), len as usize).clamp(start, len);
                axis += 1;
                SliceInfoElem::Slice {
                    start,
                    end: Some(stop),
                    step: *step,
                }
            }
        };
        elems.push(elem);
    }
    elems.extend((axis..shape.len()).map(|_| SliceInfoElem::Slice {
        start: 0,
        end: None,
        step: 1,
    }));
    Ok(elems)
}

/// Shape of the view a slice vector selects from `shape`
pub fn view_shape(specs: &[SliceSpec], shape: &[usize]) -> Result<Vec<usize>> {
    let elems = resolve(specs, shape)?;
    let mut axis = 0;
    let mut out = Vec::with_capacity(elems.len());
    for elem in elems {
        match elem {
            SliceInfoElem::NewAxis => out.push(1),
            SliceInfoElem::Index(_) => axis += 1,
            SliceInfoElem::Slice { start, end, step } => {
                let end = end.unwrap_or(shape[axis] as isize);
                let span = (end - start).max(0) as usize;
                let step = step.unsigned_abs();
                out.push(span.div_ceil(step));
                axis += 1;
            }
        }
    }
    Ok(out)
}

pub fn slice_view<'a, T>(view: ArrayViewD<'a, T>, specs: &[SliceSpec]) -> Result<ArrayViewD<'a, T>> {
    let elems = resolve(specs, view.shape())?;
    Ok(view.slice_move(&elems[..]))
}

pub fn slice_view_mut<'a, T>(
    view: ArrayViewMutD<'a, T>,
    specs: &[SliceSpec],
) -> Result<ArrayViewMutD<'a, T>> {
    let elems = resolve(specs, view.shape())?;
    Ok(view.slice_move(&elems[..]))
}

/// Restrict a view to a rectangular region
pub fn region_view<'a, T>(view: ArrayViewD<'a, T>, ranges: &[Range<usize>]) -> Result<ArrayViewD<'a, T>> {
    check_region(view.shape(), ranges)?;
    let mut view = view;
    view.slice_each_axis_inplace(|ax| Slice::from(ranges[ax.axis.index()].clone()));
    Ok(view)
}

pub fn region_view_mut<'a, T>(
    view: ArrayViewMutD<'a, T>,
    ranges: &[Range<usize>],
) -> Result<ArrayViewMutD<'a, T>> {
    check_region(view.shape(), ranges)?;
    let mut view = view;
    view.slice_each_axis_inplace(|ax| Slice::from(ranges[ax.axis.index()].clone()));
    Ok(view)
}

/// Map `region` of a view back onto the operand.
///
/// Returns the smallest operand region covering it and the slice vector that
/// cuts the view's region out of that operand region.
pub(crate) fn view_source(
    specs: &[SliceSpec],
    shape: &[usize],
    region: &[Range<usize>],
) -> Result<(Vec<Range<usize>>, Vec<SliceSpec>)> {
    check_region(&view_shape(specs, shape)?, region)?;
    let elems = resolve(specs, shape)?;
    let mut source = Vec::with_capacity(shape.len());
    let mut local = Vec::with_capacity(elems.len());
    let mut wanted = region.iter();
    let mut axis = 0;
    for elem in elems {
        match elem {
            SliceInfoElem::NewAxis => {
                wanted.next();
                local.push(SliceSpec::NewAxis);
            }
            SliceInfoElem::Index(position) => {
                let position = position as usize;
                source.push(position..position + 1);
                local.push(SliceSpec::Index(0));
                axis += 1;
            }
            SliceInfoElem::Slice { start, end, step } => {
                let range = wanted.next().cloned().unwrap_or(0..0);
                let start = start as usize;
                let end = end.map_or(shape[axis], |end| end as usize);
                let stride = step.unsigned_abs();
                let covered = if range.is_empty() {
                    start..start
                } else if step > 0 {
                    start + range.start * stride..start + (range.end - 1) * stride + 1
                } else {
                    // Negative steps walk back from the end of the slice
                    end - 1 - (range.end - 1) * stride..end - range.start * stride
                };
                source.push(covered);
                local.push(SliceSpec::stepped(None, None, step));
                axis += 1;
            }
        }
    }
    Ok((source, local))
}

pub(crate) fn check_region(shape: &[usize], ranges: &[Range<usize>]) -> Result<()> {
    let fits = ranges.len() == shape.len()
        && ranges
            .iter()
            .zip(shape)
            .all(|(range, &size)| range.start <= range.end && range.end <= size);
    if fits {
        Ok(())
    } else {
        Err(DynArrayError::shape(format!(
            "region {:?} does not fit shape {:?}",
            ranges, shape
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn, array};

    #[test]
    fn shapes_of_views() {
        let shape = [4, 5, 6];
        assert_eq!(view_shape(&[], &shape).unwrap(), vec![4, 5, 6]);
        assert_eq!(view_shape(&[SliceSpec::Index(1)], &shape).unwrap(), vec![5, 6]);
        assert_eq!(
            view_shape(&[SliceSpec::range(1, 3), SliceSpec::NewAxis], &shape).unwrap(),
            vec![2, 1, 5, 6]
        );
        assert_eq!(
            view_shape(&[SliceSpec::All, SliceSpec::stepped(None, None, 2)], &shape).unwrap(),
            vec![4, 3, 6]
        );
        assert_eq!(
            view_shape(&[SliceSpec::range(-2, 100)], &shape).unwrap(),
            vec![2, 5, 6]
        );
    }

    #[test]
    fn invalid_slices() {
        let shape = [2, 2];
        assert!(view_shape(&[SliceSpec::Index(2)], &shape).is_err());
        assert!(view_shape(&[SliceSpec::stepped(None, None, 0)], &shape).is_err());
        assert!(view_shape(&[SliceSpec::All, SliceSpec::All, SliceSpec::All], &shape).is_err());
    }

    #[test]
    fn slicing_matches_shape() {
        let arr = ArrayD::from_shape_fn(IxDyn(&[3, 4]), |idx| (idx[0] * 4 + idx[1]) as i32);
        let specs = [SliceSpec::Index(-1), SliceSpec::stepped(Some(1), None, 2)];
        let view = slice_view(arr.view(), &specs).unwrap();
        assert_eq!(view.shape(), view_shape(&specs, arr.shape()).unwrap().as_slice());
        assert_eq!(view, array![9, 11].into_dyn());
    }

    #[test]
    fn regions() {
        let arr = ArrayD::from_shape_fn(IxDyn(&[3, 4]), |idx| (idx[0] * 4 + idx[1]) as i32);
        let view = region_view(arr.view(), &[1..3, 2..4]).unwrap();
        assert_eq!(view, array![[6, 7], [10, 11]].into_dyn());
        assert!(region_view(arr.view(), &[0..4, 0..1]).is_err());
    }

    #[test]
    fn view_regions_map_back_to_the_operand() {
        let arr = ArrayD::from_shape_fn(IxDyn(&[6, 7, 2]), |idx| (idx[0] * 100 + idx[1] * 10 + idx[2]) as i32);
        let specs = [
            SliceSpec::stepped(Some(1), None, 2),
            SliceSpec::NewAxis,
            SliceSpec::stepped(None, Some(-1), -3),
            SliceSpec::Index(1),
        ];
        assert_eq!(view_shape(&specs, arr.shape()).unwrap(), vec![3, 1, 2]);

        let region = [1..3, 0..1, 1..2];
        let (source, local) = view_source(&specs, arr.shape(), &region).unwrap();
        assert_eq!(source, vec![3..6, 2..3, 1..2]);

        let expected = region_view(slice_view(arr.view(), &specs).unwrap(), &region).unwrap();
        let from_source = slice_view(region_view(arr.view(), &source).unwrap(), &local).unwrap();
        assert_eq!(from_source, expected);
        assert_eq!(from_source, array![[[321]], [[521]]].into_dyn());

        assert!(view_source(&specs, arr.shape(), &[0..4, 0..1, 0..2]).is_err());
    }
}
