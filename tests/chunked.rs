//! Integration tests for chunked arrays
//!
//! Chunked destinations are written one chunk at a time; the results must
//! match a dense evaluation of the same expression exactly.

use dynarray::math::{sqrt, strided_view, sum};
use dynarray::{
    ArrayKind, ChunkGrid, ChunkedArray, DynArray, DynArrayError, MemoryChunkedArray, ReducerOptions, SliceSpec,
};
use ndarray::{array, ArrayD, ArrayViewD, IxDyn};
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn ramp(shape: &[usize], scale: f64) -> ArrayD<f64> {
    let mut next = 0.0;
    ArrayD::from_shape_simple_fn(IxDyn(shape), || {
        next += 1.0;
        next * scale
    })
}

fn chunked(values: &ArrayD<f64>, chunk_shape: &[usize]) -> DynArray {
    DynArray::from_chunked(MemoryChunkedArray::from_array(values.view(), chunk_shape.to_vec()).unwrap())
}

/// Chunked store that counts the elements read from it
#[derive(Debug)]
struct CountingStore {
    inner: MemoryChunkedArray<f64>,
    reads: Arc<AtomicUsize>,
}

impl CountingStore {
    fn wrap(values: &ArrayD<f64>, chunk_shape: &[usize]) -> (DynArray, Arc<AtomicUsize>) {
        let reads = Arc::new(AtomicUsize::new(0));
        let store = CountingStore {
            inner: MemoryChunkedArray::from_array(values.view(), chunk_shape.to_vec()).unwrap(),
            reads: reads.clone(),
        };
        (DynArray::from_chunked(store), reads)
    }
}

impl ChunkedArray<f64> for CountingStore {
    fn grid(&self) -> &ChunkGrid {
        self.inner.grid()
    }

    fn read_region(&self, ranges: &[Range<usize>]) -> dynarray::Result<ArrayD<f64>> {
        let values = self.inner.read_region(ranges)?;
        self.reads.fetch_add(values.len(), Ordering::Relaxed);
        Ok(values)
    }

    fn write_region(&mut self, ranges: &[Range<usize>], values: ArrayViewD<'_, f64>) -> dynarray::Result<()> {
        self.inner.write_region(ranges, values)
    }

    fn clone_box(&self) -> Box<dyn ChunkedArray<f64>> {
        Box::new(CountingStore {
            inner: self.inner.clone(),
            reads: self.reads.clone(),
        })
    }
}

fn empty_chunked(shape: &[usize], chunk_shape: &[usize]) -> DynArray {
    DynArray::from_chunked(MemoryChunkedArray::<f64>::new(shape.to_vec(), chunk_shape.to_vec()).unwrap())
}

// =============================================================================
// Chunked destinations
// =============================================================================

#[test]
fn chunked_destination_matches_dense() {
    let a = DynArray::from(array![[1.0f64, 2.0, 3.0, 4.0], [5.0, 6.0, 7.0, 8.0], [9.0, 10.0, 11.0, 12.0], [13.0, 14.0, 15.0, 16.0]]);
    let b = DynArray::from(ArrayD::from_elem(IxDyn(&[4, 4]), 0.5f64));

    let dense = DynArray::try_from(&a + &b).unwrap();
    let mut destination = empty_chunked(&[4, 4], &[2, 2]);
    assert!(destination.is_chunked());

    let report = destination.assign_report(&a + &b).unwrap();
    assert_eq!(report.chunks, 4);
    assert_eq!(
        destination.to_dense::<f64>().unwrap(),
        dense.to_dense::<f64>().unwrap()
    );
    assert_eq!(destination.as_chunked_array::<f64>().unwrap().grid_size(), 4);
}

#[test]
fn mixed_chunked_and_dense_operands() {
    let shape = [8, 9, 10];
    let chunk = [2, 3, 4];
    let values: Vec<ArrayD<f64>> = (1..=4).map(|i| ramp(&shape, i as f64 * 0.25)).collect();

    let z0 = chunked(&values[0], &chunk);
    let z1 = DynArray::from(values[1].clone());
    let z2 = chunked(&values[2], &chunk);
    let z3 = DynArray::from(values[3].clone());
    let tree = || (&z0 + &z1) + 2.0 + (&z2 + &z3);

    let mut dense = DynArray::from(ArrayD::<f64>::zeros(IxDyn(&[1])));
    dense.assign(tree()).unwrap();
    assert_eq!(dense.kind(), ArrayKind::Dense);

    let mut into_chunks = empty_chunked(&shape, &chunk);
    let report = into_chunks.assign_report(tree()).unwrap();
    assert_eq!(report.chunks, 4 * 3 * 3);

    let expected = &values[0] + &values[1] + 2.0 + (&values[2] + &values[3]);
    assert_eq!(dense.array::<f64>().unwrap(), &expected);
    assert_eq!(into_chunks.to_dense::<f64>().unwrap(), expected);
}

#[test]
fn chunked_destination_converts_type() {
    let a = DynArray::from(ArrayD::from_shape_fn(IxDyn(&[3, 5]), |ix| (ix[0] * 5 + ix[1]) as i32));
    let mut destination =
        DynArray::from_chunked(MemoryChunkedArray::<i64>::with_fill(vec![3, 5], vec![2, 2], -1).unwrap());

    destination.assign(&a * 3i32).unwrap();
    let expected = ArrayD::from_shape_fn(IxDyn(&[3, 5]), |ix| (ix[0] * 5 + ix[1]) as i64 * 3);
    assert_eq!(destination.to_dense::<i64>().unwrap(), expected);
}

#[test]
fn chunked_arrays_keep_their_shape() {
    let mut destination = empty_chunked(&[4, 4], &[2, 2]);
    assert!(destination.resize(&[4, 4]).is_ok());
    assert!(matches!(
        destination.resize(&[2, 2]),
        Err(DynArrayError::UnsupportedOperation(_))
    ));

    let a = DynArray::from(ArrayD::<f64>::zeros(IxDyn(&[3, 3])));
    assert!(destination.assign(&a + 1.0).is_err());
}

// =============================================================================
// Per-chunk evaluation of views and reducers
// =============================================================================

#[test]
fn reducers_inside_chunked_assignment() {
    let values = ramp(&[6, 4, 5], 1.0);
    let a = DynArray::from(values.clone());
    let expected = values.sum_axis(ndarray::Axis(1));

    for options in [ReducerOptions::over([1]), ReducerOptions::over([1]).immediate()] {
        let mut destination = empty_chunked(&[6, 5], &[4, 2]);
        let report = destination.assign_report(sum(&a, options)).unwrap();
        assert_eq!(report.chunks, 6);
        assert_eq!(destination.to_dense::<f64>().unwrap(), expected);
    }
}

#[test]
fn views_and_math_inside_chunked_assignment() {
    let values = ramp(&[4, 6], 1.0);
    let a = chunked(&values, &[3, 3]);
    let view = strided_view(&a, vec![SliceSpec::stepped(None, None, 2), SliceSpec::All]);

    let mut destination = empty_chunked(&[2, 6], &[1, 4]);
    destination.assign(sqrt(view)).unwrap();

    let expected = values
        .view()
        .into_dimensionality::<ndarray::Ix2>()
        .unwrap()
        .slice(ndarray::s![..;2, ..])
        .mapv(f64::sqrt)
        .into_dyn();
    assert_eq!(destination.to_dense::<f64>().unwrap(), expected);
}

#[test]
fn views_read_only_the_chunk_they_cover() {
    let values = ramp(&[16, 16], 1.0);

    let (source, reads) = CountingStore::wrap(&values, &[4, 4]);
    let mut destination = empty_chunked(&[16, 16], &[4, 4]);
    let report = destination.assign_report(strided_view(&source, vec![SliceSpec::All])).unwrap();
    assert_eq!(report.chunks, 16);
    assert_eq!(reads.load(Ordering::Relaxed), 256);
    assert_eq!(destination.to_dense::<f64>().unwrap(), values);

    // Every other row: each chunk of four rows spans seven source rows.
    let (source, reads) = CountingStore::wrap(&values, &[4, 4]);
    let mut destination = empty_chunked(&[8, 16], &[4, 4]);
    destination
        .assign(strided_view(&source, vec![SliceSpec::stepped(None, None, 2)]))
        .unwrap();
    assert_eq!(reads.load(Ordering::Relaxed), 224);
    let expected = values
        .view()
        .into_dimensionality::<ndarray::Ix2>()
        .unwrap()
        .slice(ndarray::s![..;2, ..])
        .to_owned()
        .into_dyn();
    assert_eq!(destination.to_dense::<f64>().unwrap(), expected);
}

#[test]
fn reducers_read_their_operand_once() {
    let values = ramp(&[6, 4, 5], 1.0);
    let expected = values.sum_axis(ndarray::Axis(1));

    for options in [ReducerOptions::over([1]), ReducerOptions::over([1]).immediate()] {
        let (source, reads) = CountingStore::wrap(&values, &[2, 2, 2]);
        let mut destination = empty_chunked(&[6, 5], &[4, 2]);
        let report = destination.assign_report(sum(&source, options)).unwrap();
        assert_eq!(report.chunks, 6);
        assert_eq!(reads.load(Ordering::Relaxed), 120);
        assert_eq!(destination.to_dense::<f64>().unwrap(), expected);
    }
}

#[test]
fn chunked_clone_is_deep() {
    let values = ramp(&[4, 4], 1.0);
    let original = chunked(&values, &[2, 2]);
    let mut copy = original.clone();
    copy.assign(DynArray::from_scalar(0.0f64)).unwrap();

    assert_eq!(copy.to_dense::<f64>().unwrap(), ArrayD::<f64>::zeros(IxDyn(&[4, 4])));
    assert_eq!(original.to_dense::<f64>().unwrap(), values);
}
