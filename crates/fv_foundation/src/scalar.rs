// crates/fv_foundation/src/scalar.rs

//! RuntimeScalar - 密封的标量类型抽象
//!
//! 矩阵与求解器以 `S: RuntimeScalar` 为泛型边界，可在 f32 与 f64 之间切换。
//! 场与几何始终使用 f64，进入求解器时通过 [`RuntimeScalar::from_config`] 转换。
//!
//! ```rust
//! use fv_foundation::RuntimeScalar;
//!
//! fn harmonic<S: RuntimeScalar>(a: S, b: S) -> S {
//!     S::TWO * a * b / (a + b)
//! }
//! assert_eq!(harmonic(1.0f64, 1.0), 1.0);
//! ```

use std::fmt::{Debug, Display};
use std::iter::Sum;

use bytemuck::Pod;
use num_traits::{Float, FromPrimitive, NumAssign};

mod private {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
}

/// 运行时标量类型（密封，仅 f32/f64 可实现）
///
/// `Pod` 约束使标量切片可以直接按字节在分区之间传递。
pub trait RuntimeScalar:
    private::Sealed
    + Pod
    + Float
    + FromPrimitive
    + NumAssign
    + Debug
    + Display
    + Send
    + Sync
    + Sum
    + Default
    + 'static
{
    /// 零值
    const ZERO: Self;
    /// 一
    const ONE: Self;
    /// 二
    const TWO: Self;
    /// 二分之一
    const HALF: Self;
    /// 机器精度
    const EPSILON: Self;
    /// 最小正值
    const MIN_POSITIVE: Self;
    /// 最大值
    const MAX: Self;
    /// 残差归一化的微小偏移（OpenFOAM 意义上的 SMALL）
    const SMALL: Self;
    /// 极小值（VSMALL）
    const VSMALL: Self;

    /// 从配置层的 f64 转换
    fn from_config(value: f64) -> Self;

    /// 转为 f64（用于日志与性能记录）
    fn as_f64(self) -> f64;

    /// 安全除法
    ///
    /// 当除数绝对值小于 MIN_POSITIVE 时返回 fallback
    #[inline]
    fn safe_div(self, rhs: Self, fallback: Self) -> Self {
        if rhs.abs() < Self::MIN_POSITIVE {
            fallback
        } else {
            self / rhs
        }
    }

    /// 批量验证切片中所有值是否有限
    fn validate_slice(data: &[Self]) -> Result<(), (usize, Self)> {
        for (i, &v) in data.iter().enumerate() {
            if !v.is_finite() {
                return Err((i, v));
            }
        }
        Ok(())
    }
}

// =============================================================================
// f32 实现
// =============================================================================

impl RuntimeScalar for f32 {
    const ZERO: f32 = 0.0;
    const ONE: f32 = 1.0;
    const TWO: f32 = 2.0;
    const HALF: f32 = 0.5;
    const EPSILON: f32 = f32::EPSILON;
    const MIN_POSITIVE: f32 = f32::MIN_POSITIVE;
    const MAX: f32 = f32::MAX;
    const SMALL: f32 = 1e-15;
    const VSMALL: f32 = 1e-30;

    #[inline]
    fn from_config(value: f64) -> Self {
        value as f32
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self as f64
    }
}

// =============================================================================
// f64 实现
// =============================================================================

impl RuntimeScalar for f64 {
    const ZERO: f64 = 0.0;
    const ONE: f64 = 1.0;
    const TWO: f64 = 2.0;
    const HALF: f64 = 0.5;
    const EPSILON: f64 = f64::EPSILON;
    const MIN_POSITIVE: f64 = f64::MIN_POSITIVE;
    const MAX: f64 = f64::MAX;
    const SMALL: f64 = 1e-20;
    const VSMALL: f64 = 1e-300;

    #[inline]
    fn from_config(value: f64) -> Self {
        value
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generic_sum<S: RuntimeScalar>(data: &[S]) -> S {
        data.iter().copied().sum()
    }

    #[test]
    fn test_constants() {
        assert_eq!(<f64 as RuntimeScalar>::ZERO, 0.0);
        assert_eq!(<f32 as RuntimeScalar>::HALF, 0.5);
        assert!(<f64 as RuntimeScalar>::SMALL > 0.0);
    }

    #[test]
    fn test_conversion() {
        assert_eq!(f32::from_config(0.25), 0.25f32);
        assert_eq!(1.5f32.as_f64(), 1.5);
        assert_eq!(generic_sum(&[1.0f32, 2.0, 3.0]), 6.0);
    }

    #[test]
    fn test_safe_div_and_validate() {
        assert_eq!(1.0f64.safe_div(0.0, -1.0), -1.0);
        assert_eq!(1.0f64.safe_div(2.0, -1.0), 0.5);
        assert!(f64::validate_slice(&[1.0, 2.0]).is_ok());
        assert_eq!(f64::validate_slice(&[1.0, f64::NAN]).unwrap_err().0, 1);
    }
}
