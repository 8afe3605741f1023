//! Chunked arrays
//!
//! A chunked array is split into a regular grid of fixed-size blocks. The
//! erased layer only needs the grid geometry plus region reads and writes,
//! captured by [`ChunkedArray`]. [`MemoryChunkedArray`] keeps its chunks in a
//! map and materializes them on first write.

use crate::broadcast::{full_region, region_shape};
use crate::error::{DynArrayError, Result};
use crate::slice::{check_region, region_view, region_view_mut};
use crate::types::Element;
use ndarray::{ArrayD, ArrayViewD, IxDyn};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

/// Geometry of a chunk grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkGrid {
    shape: Vec<usize>,
    chunk_shape: Vec<usize>,
}

impl ChunkGrid {
    pub fn new(shape: Vec<usize>, chunk_shape: Vec<usize>) -> Result<Self> {
        if shape.len() != chunk_shape.len() {
            return Err(DynArrayError::shape(format!(
                "chunk shape {:?} does not match the rank of {:?}",
                chunk_shape, shape
            )));
        }
        if chunk_shape.contains(&0) {
            return Err(DynArrayError::shape("chunk dimensions must be positive"));
        }
        Ok(Self { shape, chunk_shape })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn chunk_shape(&self) -> &[usize] {
        &self.chunk_shape
    }

    /// Number of chunks along each axis
    pub fn grid_shape(&self) -> Vec<usize> {
        self.shape
            .iter()
            .zip(&self.chunk_shape)
            .map(|(&size, &chunk)| size.div_ceil(chunk))
            .collect()
    }

    /// Total number of chunks
    pub fn size(&self) -> usize {
        self.grid_shape().iter().product()
    }

    /// Grid coordinates of the chunk with the given row-major index
    pub fn chunk_coords(&self, index: usize) -> Vec<usize> {
        let grid = self.grid_shape();
        let mut coords = vec![0; grid.len()];
        let mut rest = index;
        for (coord, &count) in coords.iter_mut().zip(&grid).rev() {
            *coord = rest % count.max(1);
            rest /= count.max(1);
        }
        coords
    }

    pub fn chunk_index(&self, coords: &[usize]) -> usize {
        coords
            .iter()
            .zip(self.grid_shape())
            .fold(0, |index, (&coord, count)| index * count + coord)
    }

    /// Element ranges covered by one chunk, clipped at the array edge
    pub fn chunk_ranges(&self, index: usize) -> Vec<Range<usize>> {
        self.ranges_at(&self.chunk_coords(index))
    }

    fn ranges_at(&self, coords: &[usize]) -> Vec<Range<usize>> {
        coords
            .iter()
            .zip(self.shape.iter().zip(&self.chunk_shape))
            .map(|(&coord, (&size, &chunk))| {
                let start = coord * chunk;
                start..(start + chunk).min(size)
            })
            .collect()
    }

    /// Indices of the chunks intersecting a region, in grid order
    pub fn chunks_overlapping(&self, ranges: &[Range<usize>]) -> Vec<usize> {
        if ranges.iter().any(|range| range.is_empty()) {
            return Vec::new();
        }
        let bounds: Vec<Range<usize>> = ranges
            .iter()
            .zip(&self.chunk_shape)
            .map(|(range, &chunk)| range.start / chunk..range.end.div_ceil(chunk))
            .collect();
        let counts: Vec<usize> = bounds.iter().map(|b| b.len()).collect();
        ndarray::indices(IxDyn(&counts))
            .into_iter()
            .map(|offset| {
                let coords: Vec<usize> = bounds
                    .iter()
                    .enumerate()
                    .map(|(axis, b)| b.start + offset[axis])
                    .collect();
                self.chunk_index(&coords)
            })
            .collect()
    }
}

/// Array stored as a grid of chunks
pub trait ChunkedArray<T: Element>: Send + Sync + fmt::Debug {
    fn grid(&self) -> &ChunkGrid;

    fn read_region(&self, ranges: &[Range<usize>]) -> Result<ArrayD<T>>;

    fn write_region(&mut self, ranges: &[Range<usize>], values: ArrayViewD<'_, T>) -> Result<()>;

    fn clone_box(&self) -> Box<dyn ChunkedArray<T>>;

    fn shape(&self) -> &[usize] {
        self.grid().shape()
    }

    fn chunk_shape(&self) -> &[usize] {
        self.grid().chunk_shape()
    }

    fn grid_size(&self) -> usize {
        self.grid().size()
    }

    fn chunk_ranges(&self, index: usize) -> Vec<Range<usize>> {
        self.grid().chunk_ranges(index)
    }

    fn read_chunk(&self, index: usize) -> Result<ArrayD<T>> {
        self.read_region(&self.chunk_ranges(index))
    }

    fn write_chunk(&mut self, index: usize, values: ArrayViewD<'_, T>) -> Result<()> {
        let ranges = self.chunk_ranges(index);
        self.write_region(&ranges, values)
    }

    fn to_dense(&self) -> Result<ArrayD<T>> {
        self.read_region(&full_region(self.shape()))
    }
}

/// In-memory chunk store; chunks never written read as the fill value
#[derive(Debug, Clone)]
pub struct MemoryChunkedArray<T: Element> {
    grid: ChunkGrid,
    fill: T,
    chunks: BTreeMap<usize, ArrayD<T>>,
}

impl<T: Element> MemoryChunkedArray<T> {
    pub fn new(shape: Vec<usize>, chunk_shape: Vec<usize>) -> Result<Self> {
        Self::with_fill(shape, chunk_shape, T::default())
    }

    pub fn with_fill(shape: Vec<usize>, chunk_shape: Vec<usize>, fill: T) -> Result<Self> {
        Ok(Self {
            grid: ChunkGrid::new(shape, chunk_shape)?,
            fill,
            chunks: BTreeMap::new(),
        })
    }

    /// Chunk a dense array
    pub fn from_array(values: ArrayViewD<'_, T>, chunk_shape: Vec<usize>) -> Result<Self> {
        let mut chunked = Self::new(values.shape().to_vec(), chunk_shape)?;
        let ranges = full_region(values.shape());
        chunked.write_region(&ranges, values)?;
        Ok(chunked)
    }

    pub fn fill_value(&self) -> T {
        self.fill
    }

    /// Number of chunks that have been written at least once
    pub fn stored_chunks(&self) -> usize {
        self.chunks.len()
    }

    fn relative(outer: &[Range<usize>], inner: &[Range<usize>]) -> Vec<Range<usize>> {
        outer
            .iter()
            .zip(inner)
            .map(|(o, i)| (i.start - o.start)..(i.end - o.start))
            .collect()
    }

    fn intersect(a: &[Range<usize>], b: &[Range<usize>]) -> Vec<Range<usize>> {
        a.iter()
            .zip(b)
            .map(|(x, y)| x.start.max(y.start)..x.end.min(y.end).max(x.start.max(y.start)))
            .collect()
    }
}

impl<T: Element> ChunkedArray<T> for MemoryChunkedArray<T> {
    fn grid(&self) -> &ChunkGrid {
        &self.grid
    }

    fn read_region(&self, ranges: &[Range<usize>]) -> Result<ArrayD<T>> {
        check_region(self.grid.shape(), ranges)?;
        let mut out = ArrayD::from_elem(IxDyn(&region_shape(ranges)), self.fill);
        for index in self.grid.chunks_overlapping(ranges) {
            let Some(chunk) = self.chunks.get(&index) else {
                continue;
            };
            let chunk_ranges = self.grid.chunk_ranges(index);
            let common = Self::intersect(ranges, &chunk_ranges);
            let source = region_view(chunk.view(), &Self::relative(&chunk_ranges, &common))?;
            let mut target = region_view_mut(out.view_mut(), &Self::relative(ranges, &common))?;
            target.assign(&source);
        }
        Ok(out)
    }

    fn write_region(&mut self, ranges: &[Range<usize>], values: ArrayViewD<'_, T>) -> Result<()> {
        check_region(self.grid.shape(), ranges)?;
        let expected = region_shape(ranges);
        if values.shape() != expected.as_slice() {
            return Err(DynArrayError::Broadcast {
                from: values.shape().to_vec(),
                into: expected,
            });
        }
        for index in self.grid.chunks_overlapping(ranges) {
            let chunk_ranges = self.grid.chunk_ranges(index);
            let fill = self.fill;
            let chunk = self
                .chunks
                .entry(index)
                .or_insert_with(|| ArrayD::from_elem(IxDyn(&region_shape(&chunk_ranges)), fill));
            let common = Self::intersect(ranges, &chunk_ranges);
            let source = region_view(values.view(), &Self::relative(ranges, &common))?;
            let mut target = region_view_mut(chunk.view_mut(), &Self::relative(&chunk_ranges, &common))?;
            target.assign(&source);
        }
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn ChunkedArray<T>> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn grid_geometry() {
        let grid = ChunkGrid::new(vec![8, 9, 10], vec![2, 3, 4]).unwrap();
        assert_eq!(grid.grid_shape(), vec![4, 3, 3]);
        assert_eq!(grid.size(), 36);
        assert_eq!(grid.chunk_coords(0), vec![0, 0, 0]);
        assert_eq!(grid.chunk_coords(35), vec![3, 2, 2]);
        assert_eq!(grid.chunk_index(&[1, 2, 0]), 15);
        assert_eq!(grid.chunk_ranges(35), vec![6..8, 6..9, 8..10]);
    }

    #[test]
    fn grid_rejects_bad_chunks() {
        assert!(ChunkGrid::new(vec![4, 4], vec![2]).is_err());
        assert!(ChunkGrid::new(vec![4, 4], vec![2, 0]).is_err());
    }

    #[test]
    fn overlapping_chunks() {
        let grid = ChunkGrid::new(vec![4, 4], vec![2, 2]).unwrap();
        assert_eq!(grid.chunks_overlapping(&[1..3, 0..2]), vec![0, 2]);
        assert_eq!(grid.chunks_overlapping(&[0..4, 0..4]), vec![0, 1, 2, 3]);
        assert!(grid.chunks_overlapping(&[0..0, 0..4]).is_empty());
    }

    #[test]
    fn unwritten_chunks_read_fill() {
        let chunked = MemoryChunkedArray::with_fill(vec![3, 3], vec![2, 2], 7i32).unwrap();
        assert_eq!(chunked.to_dense().unwrap(), ArrayD::from_elem(IxDyn(&[3, 3]), 7));
        assert_eq!(chunked.stored_chunks(), 0);
    }

    #[test]
    fn region_roundtrip_across_chunks() {
        let dense = ArrayD::from_shape_fn(IxDyn(&[5, 4]), |idx| (idx[0] * 4 + idx[1]) as f64);
        let chunked = MemoryChunkedArray::from_array(dense.view(), vec![2, 3]).unwrap();
        assert_eq!(chunked.stored_chunks(), 6);
        assert_eq!(chunked.to_dense().unwrap(), dense);

        let region = chunked.read_region(&[1..3, 2..4]).unwrap();
        assert_eq!(region, array![[6.0, 7.0], [10.0, 11.0]].into_dyn());
    }

    #[test]
    fn partial_writes() {
        let mut chunked = MemoryChunkedArray::<u8>::new(vec![4, 4], vec![2, 2]).unwrap();
        chunked
            .write_region(&[1..3, 1..3], array![[1u8, 2], [3, 4]].into_dyn().view())
            .unwrap();
        assert_eq!(chunked.stored_chunks(), 4);
        assert_eq!(
            chunked.to_dense().unwrap(),
            array![[0u8, 0, 0, 0], [0, 1, 2, 0], [0, 3, 4, 0], [0, 0, 0, 0]].into_dyn()
        );

        chunked.write_chunk(3, array![[9u8, 9], [9, 9]].into_dyn().view()).unwrap();
        assert_eq!(chunked.read_chunk(3).unwrap(), array![[9u8, 9], [9, 9]].into_dyn());

        let wrong = chunked.write_region(&[0..2, 0..2], array![1u8, 2].into_dyn().view());
        assert!(wrong.is_err());
    }
}
