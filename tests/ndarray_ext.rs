//! Integration tests for raw byte interop
//!
//! These tests demonstrate loading arrays whose dtype is only known from a
//! tag, computing on them and writing the result back out as raw bytes.

use dynarray::{DType, DynArray, DynArrayError, RawArray, RawArrayError, RawArrayView};
use ndarray::{array, ArrayD, IxDyn};

// =============================================================================
// Raw buffers in and out
// =============================================================================

#[test]
fn raw_f32_buffer_to_handle() {
    let data: Vec<f32> = vec![1.0, 2.0, 3.0, 4.0];
    let bytes: Vec<u8> = data.iter().flat_map(|f| f.to_le_bytes()).collect();
    let raw = RawArray::new(DType::F32, vec![2, 2], bytes);

    let handle = DynArray::from_raw(raw.view()).unwrap();
    assert_eq!(handle.dtype(), DType::F32);
    assert_eq!(handle.shape(), vec![2, 2]);
    assert_eq!(handle.metadata()["data_type"], "<f4");
    assert_eq!(handle.array::<f32>().unwrap(), &array![[1.0f32, 2.0], [3.0, 4.0]].into_dyn());
}

#[test]
fn malformed_raw_buffers_are_errors() {
    let huge = RawArrayView {
        dtype: DType::U8,
        shape: vec![1 << 32, 1 << 32],
        data: &[],
    };
    assert!(matches!(
        DynArray::from_raw(huge),
        Err(DynArrayError::Raw(RawArrayError::ShapeMismatch { .. }))
    ));

    let short = RawArray::new(DType::I32, vec![3], vec![0; 8]);
    assert!(matches!(
        DynArray::from_raw(short.view()),
        Err(DynArrayError::Raw(RawArrayError::ShapeMismatch { data_len: 8, .. }))
    ));
}

#[test]
fn computed_result_back_to_raw() {
    let a = DynArray::from_raw(RawArray::from_ndarray(array![1i64, -2, 3].into_dyn().view()).view()).unwrap();
    let b = DynArray::from_raw(RawArray::from_ndarray(array![100u32, 100, 100].into_dyn().view()).view()).unwrap();

    // i64 * u32 promotes to i64
    let product = DynArray::try_from(&a * &b).unwrap();
    let raw = RawArray::try_from(&product).unwrap();
    assert_eq!(raw.dtype, DType::I64);
    assert_eq!(raw.shape, vec![3]);
    assert_eq!(raw.to_ndarray::<i64>().unwrap(), array![100i64, -200, 300].into_dyn());
}

#[test]
fn small_ints_convert_on_assignment() {
    let raw = RawArray::from_ndarray(array![-1i16, 2, 300].into_dyn().view());
    let small = DynArray::from_raw(raw.view()).unwrap();
    assert_eq!(small.dtype(), DType::I16);

    let mut wide = DynArray::from(ArrayD::<i32>::zeros(IxDyn(&[0])));
    wide.assign_from(&small).unwrap();
    assert_eq!(wide.array::<i32>().unwrap(), &array![-1, 2, 300].into_dyn());

    let mut bytes = DynArray::from(ArrayD::<u8>::zeros(IxDyn(&[0])));
    bytes.assign_from(&small).unwrap();
    assert_eq!(bytes.array::<u8>().unwrap(), &array![255u8, 2, 44].into_dyn());
}

#[test]
fn every_dtype_roundtrips() {
    let handles = [
        DynArray::from(array![true, false]),
        DynArray::from(array![1u8, 2]),
        DynArray::from(array![-1i8, 2]),
        DynArray::from(array![1u16, 2]),
        DynArray::from(array![-1i16, 2]),
        DynArray::from(array![1u32, 2]),
        DynArray::from(array![-1i32, 2]),
        DynArray::from(array![1u64, 2]),
        DynArray::from(array![-1i64, 2]),
        DynArray::from(array![1.5f32, 2.0]),
        DynArray::from(array![1.5f64, 2.0]),
    ];
    for handle in &handles {
        let raw = handle.to_raw().unwrap();
        assert_eq!(raw.dtype, handle.dtype());
        assert_eq!(raw.data.len() as u64, raw.expected_size().unwrap());
        let back = DynArray::from_raw(raw.view()).unwrap();
        assert_eq!(back.type_index(), handle.type_index());
        assert_eq!(back.to_raw().unwrap(), raw);
    }
}

#[test]
fn chunked_and_lazy_arrays_encode_their_values() {
    let lazy = DynArray::from_expression(dynarray::Generator::new(vec![2, 3], |ix: &[usize]| {
        (ix[0] * 3 + ix[1]) as f64
    }));
    let raw = lazy.to_raw().unwrap();
    assert_eq!(
        raw.to_ndarray::<f64>().unwrap(),
        ArrayD::from_shape_fn(IxDyn(&[2, 3]), |ix| (ix[0] * 3 + ix[1]) as f64)
    );

    let values = array![[1u32, 2, 3], [4, 5, 6]].into_dyn();
    let chunked = DynArray::from_chunked(
        dynarray::MemoryChunkedArray::from_array(values.view(), vec![1, 2]).unwrap(),
    );
    assert_eq!(chunked.to_raw().unwrap().to_ndarray::<u32>().unwrap(), values);
}
