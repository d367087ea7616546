// crates/fv_foundation/src/lib.rs

//! Finvol Foundation Layer
//!
//! 基础层，提供整个工作区共享的基础抽象。
//!
//! # 模块概览
//!
//! - [`error`]: 统一错误类型与致命错误分级
//! - [`scalar`]: 密封的运行时标量 trait（f32/f64）
//! - [`kahan_sum`]: 补偿求和
//!
//! # 示例
//!
//! ```
//! use fv_foundation::prelude::*;
//!
//! fn mean<S: RuntimeScalar>(v: &[S]) -> FvResult<S> {
//!     if v.is_empty() {
//!         return Err(FvError::size_mismatch("values", 1, 0));
//!     }
//!     let n = S::from_usize(v.len()).unwrap_or(S::ONE);
//!     Ok(KahanSum::sum_iter(v.iter().copied()) / n)
//! }
//! assert_eq!(mean(&[1.0f64, 3.0]).unwrap(), 2.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod kahan_sum;
pub mod scalar;

pub use error::{FvError, FvResult};
pub use kahan_sum::KahanSum;
pub use scalar::RuntimeScalar;

/// 当前层级
pub const LAYER: u8 = 1;

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::error::{FvError, FvResult};
    pub use crate::kahan_sum::KahanSum;
    pub use crate::scalar::RuntimeScalar;
}
