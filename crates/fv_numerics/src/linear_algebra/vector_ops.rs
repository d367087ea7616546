// crates/fv_numerics/src/linear_algebra/vector_ops.rs

//! 向量运算
//!
//! 本地求和使用 Kahan 补偿；`g_*` 版本在本地求和后做全局归约。

use fv_foundation::{FvResult, KahanSum, RuntimeScalar};

use crate::parallel::comm::{reduce_max, reduce_sum, reduce_sum_many, Communicator};

/// 点积
#[inline]
pub fn sum_prod<S: RuntimeScalar>(a: &[S], b: &[S]) -> S {
    KahanSum::sum_iter(a.iter().zip(b).map(|(&x, &y)| x * y))
}

/// 绝对值之和
#[inline]
pub fn sum_mag<S: RuntimeScalar>(a: &[S]) -> S {
    KahanSum::sum_iter(a.iter().map(|x| x.abs()))
}

/// 平方和
#[inline]
pub fn sum_sqr<S: RuntimeScalar>(a: &[S]) -> S {
    KahanSum::sum_iter(a.iter().map(|&x| x * x))
}

/// 最大绝对值
#[inline]
pub fn max_mag<S: RuntimeScalar>(a: &[S]) -> S {
    a.iter().fold(S::ZERO, |m, x| m.max(x.abs()))
}

/// y += alpha * x
#[inline]
pub fn axpy<S: RuntimeScalar>(y: &mut [S], alpha: S, x: &[S]) {
    for (yi, &xi) in y.iter_mut().zip(x) {
        *yi += alpha * xi;
    }
}

/// 全局点积
pub fn g_sum_prod<S: RuntimeScalar>(comm: &dyn Communicator, a: &[S], b: &[S]) -> FvResult<S> {
    reduce_sum(comm, sum_prod(a, b))
}

/// 全局绝对值之和
pub fn g_sum_mag<S: RuntimeScalar>(comm: &dyn Communicator, a: &[S]) -> FvResult<S> {
    reduce_sum(comm, sum_mag(a))
}

/// 全局平方和
pub fn g_sum_sqr<S: RuntimeScalar>(comm: &dyn Communicator, a: &[S]) -> FvResult<S> {
    reduce_sum(comm, sum_sqr(a))
}

/// 全局求和
pub fn g_sum<S: RuntimeScalar>(comm: &dyn Communicator, a: &[S]) -> FvResult<S> {
    reduce_sum(comm, KahanSum::sum_iter(a.iter().copied()))
}

/// 全局最大绝对值
pub fn g_max_mag<S: RuntimeScalar>(comm: &dyn Communicator, a: &[S]) -> FvResult<S> {
    reduce_max(comm, max_mag(a))
}

/// 全局平均值（没有单元时为零）
pub fn g_average<S: RuntimeScalar>(comm: &dyn Communicator, a: &[S]) -> FvResult<S> {
    let local_n = S::from_usize(a.len()).unwrap_or(S::ZERO);
    let totals = reduce_sum_many(comm, &[KahanSum::sum_iter(a.iter().copied()), local_n])?;
    Ok(totals[0].safe_div(totals[1], S::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::SerialComm;

    #[test]
    fn test_local_ops() {
        let a = [1.0, -2.0, 3.0];
        let b = [1.0, 1.0, 1.0];
        assert_eq!(sum_prod(&a, &b), 2.0);
        assert_eq!(sum_mag(&a), 6.0);
        assert_eq!(sum_sqr(&a), 14.0);
        assert_eq!(max_mag(&a), 3.0);
        let mut y = vec![0.0; 3];
        axpy(&mut y, 2.0, &a);
        assert_eq!(y, vec![2.0, -4.0, 6.0]);
    }

    #[test]
    fn test_average_empty() {
        let empty: [f64; 0] = [];
        assert_eq!(g_average(&SerialComm, &empty).unwrap(), 0.0);
        assert_eq!(g_average(&SerialComm, &[1.0, 3.0]).unwrap(), 2.0);
    }
}
