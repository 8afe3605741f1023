//! NumPy-style shape broadcasting and region mapping

use crate::error::{DynArrayError, Result};
use std::ops::Range;

/// Marker for a dimension no operand has set yet
pub const UNSET: usize = usize::MAX;

/// Shape of the given rank with every dimension unset
pub fn uninitialized_shape(dimension: usize) -> Vec<usize> {
    vec![UNSET; dimension]
}

/// Broadcast `input` into `output` in place.
///
/// Shapes are right-aligned; a size of 1 (or [`UNSET`]) on either side takes
/// the other size. Returns whether the broadcast was trivial, i.e. `input`
/// already had exactly the shape `output` ends up with.
pub fn broadcast_into(output: &mut Vec<usize>, input: &[usize]) -> Result<bool> {
    let mut trivial = output.len() == input.len();
    if input.len() > output.len() {
        let extra = input.len() - output.len();
        output.splice(0..0, std::iter::repeat_n(UNSET, extra));
    }

    let offset = output.len() - input.len();
    for (axis, &size) in input.iter().enumerate() {
        let current = output[offset + axis];
        if current == UNSET || current == size {
            output[offset + axis] = size;
        } else if current == 1 {
            output[offset + axis] = size;
            trivial = false;
        } else if size == 1 {
            trivial = false;
        } else {
            return Err(DynArrayError::Broadcast {
                from: input.to_vec(),
                into: output.clone(),
            });
        }
    }
    Ok(trivial)
}

/// Replace dimensions nobody set by 1
pub fn finalize(shape: &mut [usize]) {
    for size in shape.iter_mut().filter(|size| **size == UNSET) {
        *size = 1;
    }
}

/// Broadcast a list of shapes together
pub fn broadcast_shapes<'a>(shapes: impl IntoIterator<Item = &'a [usize]>) -> Result<(Vec<usize>, bool)> {
    let mut output = Vec::new();
    let mut trivial = true;
    for (i, shape) in shapes.into_iter().enumerate() {
        if i == 0 {
            output = shape.to_vec();
        } else {
            trivial &= broadcast_into(&mut output, shape)?;
        }
    }
    Ok((output, trivial))
}

/// Map a region of a broadcast result onto one of its operands.
///
/// Axes the operand lacks are dropped and axes where it has size 1 collapse
/// to `0..1`.
pub fn map_region(ranges: &[Range<usize>], operand_shape: &[usize]) -> Vec<Range<usize>> {
    let offset = ranges.len().saturating_sub(operand_shape.len());
    operand_shape
        .iter()
        .enumerate()
        .map(|(axis, &size)| {
            let range = ranges.get(offset + axis).cloned().unwrap_or(0..size);
            if size == 1 { 0..1 } else { range }
        })
        .collect()
}

/// Shape covered by a list of ranges
pub fn region_shape(ranges: &[Range<usize>]) -> Vec<usize> {
    ranges.iter().map(|range| range.len()).collect()
}

/// Ranges covering an entire shape
pub fn full_region(shape: &[usize]) -> Vec<Range<usize>> {
    shape.iter().map(|&size| 0..size).collect()
}
