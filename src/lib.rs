//! dynarray - Runtime type erasure and dynamic dispatch for ndarray arrays
//!
//! Arrays whose element type is only known at runtime (for example after
//! reading a file that stores a dtype tag) are wrapped in a [`DynArray`].
//! Combining them builds a lazy [`Expr`] tree; assigning the tree resolves
//! the result type of every node through process-wide dispatch tables,
//! evaluates it with statically-typed ndarray kernels and reuses temporary
//! buffers along the way.
//!
//! # Features
//!
//! - Dense, scalar, cached-expression and chunked arrays behind one handle
//! - Unary, binary and reducer dispatch on runtime type indices
//! - NumPy-style broadcasting and strided views
//! - Chunk-by-chunk assignment into chunked destinations
//!
//! # Example
//!
//! ```rust
//! use dynarray::{math, DynArray};
//! use ndarray::{array, IxDyn};
//!
//! let a = DynArray::from(array![[1.0f32, 2.0], [3.0, 4.0]]);
//! let b = DynArray::from(array![10i32, 20]);
//!
//! // f32 + i32 promotes to f32; b is broadcast along the first axis
//! let mut c = DynArray::try_from(&a + &b).unwrap();
//! assert_eq!(c.array::<f32>().unwrap()[IxDyn(&[1, 1])], 24.0);
//!
//! c.assign(math::sqrt(&a) * 2.0).unwrap();
//! assert_eq!(c.array::<f32>().unwrap()[IxDyn(&[1, 1])], 4.0);
//! ```

pub mod assign;
pub mod broadcast;
pub mod chunked;
pub mod dispatch;
pub mod dynarray;
pub mod erased;
pub mod error;
pub mod expression;
pub mod math;
pub mod ndarray_ext;
pub mod pool;
pub mod reducer;
pub mod registry;
pub mod slice;
pub mod types;

// Re-export common types at crate root
pub use assign::AssignReport;
pub use chunked::{ChunkGrid, ChunkedArray, MemoryChunkedArray};
pub use dispatch::{BinaryOp, UnaryOp};
pub use dynarray::DynArray;
pub use erased::{ArrayKind, ErasedArray, Generator, LazyExpression, SharedSlice, TypedArray};
pub use error::{DynArrayError, RawArrayError, Result};
pub use expression::{Expr, Op, ResolvedExpr};
pub use ndarray_ext::RawElement;
pub use reducer::{EvaluationStrategy, ReducerKind, ReducerOptions};
pub use registry::TypeIndex;
pub use slice::SliceSpec;
pub use types::{DType, Element, RawArray, RawArrayView, Scalar};

/// Build the type registry and every dispatch table up front.
///
/// Both are also built lazily on first use; calling this once at startup
/// keeps that cost out of the first assignment.
pub fn init_system() {
    registry::init();
    dispatch::init();
}
