//! Assignment of resolved expressions into erased destinations
//!
//! Dense destinations are written in a single pass. Chunked destinations are
//! written one chunk at a time: the whole tree is evaluated over the chunk's
//! region only, so no temporary ever grows beyond one chunk. Reducers with
//! the immediate strategy are the exception: their whole result is computed
//! once per assignment and kept until the last chunk is written.

use crate::broadcast::region_shape;
use crate::erased::{ArrayKind, ErasedArray};
use crate::error::{DynArrayError, Result};
use crate::expression::ResolvedExpr;
use crate::pool::TemporaryPool;
use std::ops::Range;
use tracing::{debug, trace};

/// One chunk of a chunked destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRegion {
    pub index: usize,
    pub ranges: Vec<Range<usize>>,
}

/// Per-pass arguments of an assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignArgs {
    /// The expression already has the destination's shape
    pub trivial_broadcast: bool,
    pub chunk: Option<ChunkRegion>,
}

impl AssignArgs {
    pub fn whole(trivial_broadcast: bool) -> Self {
        Self {
            trivial_broadcast,
            chunk: None,
        }
    }

    pub fn for_chunk(trivial_broadcast: bool, index: usize, ranges: Vec<Range<usize>>) -> Self {
        Self {
            trivial_broadcast,
            chunk: Some(ChunkRegion { index, ranges }),
        }
    }

    /// Region of the destination written by this pass
    pub fn region(&self) -> Option<&[Range<usize>]> {
        self.chunk.as_ref().map(|chunk| chunk.ranges.as_slice())
    }

    /// Shape of the values written by this pass
    pub fn region_shape(&self, full: &[usize]) -> Vec<usize> {
        match self.region() {
            Some(ranges) => region_shape(ranges),
            None => full.to_vec(),
        }
    }
}

/// What an assignment cost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AssignReport {
    /// Temporary buffers the pool had to allocate
    pub temporaries: usize,
    /// Chunks written; zero for a non-chunked destination
    pub chunks: usize,
}

/// Evaluate `expr` into `destination`.
///
/// A dense destination is resized to the expression's shape. Chunked arrays
/// and writable views keep their shape and the expression must broadcast
/// into it.
pub fn assign_expression(destination: &mut dyn ErasedArray, expr: &ResolvedExpr<'_>) -> Result<AssignReport> {
    if !destination.is_assignable() {
        return Err(DynArrayError::unsupported(format!(
            "{:?} array of {} is not assignable",
            destination.kind(),
            destination.type_name()
        )));
    }
    let target_shape = match destination.kind() {
        ArrayKind::Chunked | ArrayKind::Expression => {
            let mut shape = destination.shape();
            expr.broadcast_shape(&mut shape, true)?;
            shape
        }
        _ => expr.shape().to_vec(),
    };
    destination.resize(&target_shape)?;
    let mut shape = destination.shape();
    let trivial = expr.broadcast_shape(&mut shape, true)?;

    let grid = destination.chunk_grid();
    let mut pool = TemporaryPool::new(destination);
    let chunks = match grid {
        Some(grid) => {
            debug!(
                chunks = grid.size(),
                chunk_shape = ?grid.chunk_shape(),
                trivial,
                "assigning chunk by chunk"
            );
            for index in 0..grid.size() {
                let ranges = grid.chunk_ranges(index);
                trace!(index, ?ranges, "assigning chunk");
                expr.assign_to(&mut pool, &AssignArgs::for_chunk(trivial, index, ranges))?;
            }
            grid.size()
        }
        None => {
            trace!(?shape, trivial, "assigning in one pass");
            expr.assign_to(&mut pool, &AssignArgs::whole(trivial))?;
            0
        }
    };

    Ok(AssignReport {
        temporaries: pool.size(),
        chunks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunked::MemoryChunkedArray;
    use crate::erased::{downcast, TypedArray};
    use crate::DynArray;
    use ndarray::{array, ArrayD, IxDyn};

    #[test]
    fn region_shape_defaults_to_full() {
        let args = AssignArgs::whole(true);
        assert_eq!(args.region(), None);
        assert_eq!(args.region_shape(&[3, 4]), vec![3, 4]);

        let args = AssignArgs::for_chunk(false, 2, vec![0..2, 4..5]);
        assert_eq!(args.region_shape(&[3, 5]), vec![2, 1]);
    }

    #[test]
    fn scalars_cannot_be_assigned() {
        let a = DynArray::from(array![1.0f64]);
        let expr = &a + 1.0;
        let resolved = expr.resolve().unwrap();
        let mut destination = TypedArray::scalar(0.0f64);
        assert!(matches!(
            assign_expression(&mut destination, &resolved),
            Err(DynArrayError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn chunked_destination_is_written_per_chunk() {
        let a = DynArray::from(ArrayD::from_shape_fn(IxDyn(&[4, 3]), |ix| (ix[0] * 3 + ix[1]) as f64));
        let expr = &a * 2.0;
        let resolved = expr.resolve().unwrap();

        let store = MemoryChunkedArray::<f64>::new(vec![4, 3], vec![2, 2]).unwrap();
        let mut destination = TypedArray::chunked(Box::new(store));
        let report = assign_expression(&mut destination, &resolved).unwrap();
        assert_eq!(report.chunks, 4);

        let written = downcast::<f64>(&destination).unwrap().to_dense().unwrap();
        let expected = ArrayD::from_shape_fn(IxDyn(&[4, 3]), |ix| (ix[0] * 3 + ix[1]) as f64 * 2.0);
        assert_eq!(written, expected);
    }
}
