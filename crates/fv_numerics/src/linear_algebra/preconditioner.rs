// crates/fv_numerics/src/linear_algebra/preconditioner.rs

//! 预条件器
//!
//! 预条件器计算 `w = M⁻¹ r`，只作用于本分区内部面（耦合界面不参与分解）。
//!
//! | 名称 | 适用矩阵 | 说明 |
//! |------|----------|------|
//! | `none` | 任意 | `w = r` |
//! | `diagonal` | 任意 | `w = r / diag` |
//! | `DIC` | 对称 | 对角不完全 Cholesky |
//! | `DILU` | 任意 | 对角不完全 LU |

use fv_foundation::RuntimeScalar;

use crate::matrix::LduMatrix;

/// 预条件器接口
pub trait LduPreconditioner<S: RuntimeScalar> {
    /// 名称
    fn name(&self) -> &'static str;

    /// `w = M⁻¹ r`
    fn precondition(&self, w: &mut [S], r: &[S]);

    /// `w = M⁻ᵀ r`
    fn precondition_t(&self, w: &mut [S], r: &[S]) {
        self.precondition(w, r);
    }
}

/// 无预条件
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPreconditioner;

impl<S: RuntimeScalar> LduPreconditioner<S> for NoPreconditioner {
    fn name(&self) -> &'static str {
        "none"
    }

    fn precondition(&self, w: &mut [S], r: &[S]) {
        w.copy_from_slice(r);
    }
}

/// 对角（Jacobi）预条件
#[derive(Debug, Clone)]
pub struct DiagonalPreconditioner<S: RuntimeScalar> {
    r_d: Vec<S>,
}

impl<S: RuntimeScalar> DiagonalPreconditioner<S> {
    /// 由矩阵对角构造
    pub fn new(matrix: &LduMatrix<S>) -> Self {
        Self {
            r_d: matrix.diag().iter().map(|&d| S::ONE / d).collect(),
        }
    }
}

impl<S: RuntimeScalar> LduPreconditioner<S> for DiagonalPreconditioner<S> {
    fn name(&self) -> &'static str {
        "diagonal"
    }

    fn precondition(&self, w: &mut [S], r: &[S]) {
        for ((wi, &ri), &di) in w.iter_mut().zip(r).zip(&self.r_d) {
            *wi = ri * di;
        }
    }
}

/// 对角不完全 Cholesky 预条件（对称矩阵）
#[derive(Debug, Clone)]
pub struct DicPreconditioner<'a, S: RuntimeScalar> {
    matrix: &'a LduMatrix<S>,
    r_d: Vec<S>,
}

impl<'a, S: RuntimeScalar> DicPreconditioner<'a, S> {
    /// 计算分解的对角倒数
    pub fn new(matrix: &'a LduMatrix<S>) -> Self {
        let mut r_d = matrix.diag().to_vec();
        Self::calc_reciprocal_d(&mut r_d, matrix);
        Self { matrix, r_d }
    }

    /// `rD[u] -= upper² / rD[l]`，然后取倒数
    pub fn calc_reciprocal_d(r_d: &mut [S], matrix: &LduMatrix<S>) {
        let addr = matrix.addressing();
        let (l, u) = (addr.lower_addr(), addr.upper_addr());
        let upper = matrix.upper();
        for f in 0..l.len() {
            r_d[u[f]] -= upper[f] * upper[f] / r_d[l[f]];
        }
        for d in r_d.iter_mut() {
            *d = S::ONE / *d;
        }
    }

    /// 分解的对角倒数
    pub fn reciprocal_d(&self) -> &[S] {
        &self.r_d
    }
}

impl<'a, S: RuntimeScalar> LduPreconditioner<S> for DicPreconditioner<'a, S> {
    fn name(&self) -> &'static str {
        "DIC"
    }

    fn precondition(&self, w: &mut [S], r: &[S]) {
        let addr = self.matrix.addressing();
        let (l, u) = (addr.lower_addr(), addr.upper_addr());
        let upper = self.matrix.upper();
        let r_d = &self.r_d;

        for ((wi, &ri), &di) in w.iter_mut().zip(r).zip(r_d) {
            *wi = di * ri;
        }
        for f in 0..l.len() {
            w[u[f]] -= r_d[u[f]] * upper[f] * w[l[f]];
        }
        for f in (0..l.len()).rev() {
            w[l[f]] -= r_d[l[f]] * upper[f] * w[u[f]];
        }
    }
}

/// 对角不完全 LU 预条件
#[derive(Debug, Clone)]
pub struct DiluPreconditioner<'a, S: RuntimeScalar> {
    matrix: &'a LduMatrix<S>,
    r_d: Vec<S>,
}

impl<'a, S: RuntimeScalar> DiluPreconditioner<'a, S> {
    /// 计算分解的对角倒数
    pub fn new(matrix: &'a LduMatrix<S>) -> Self {
        let mut r_d = matrix.diag().to_vec();
        Self::calc_reciprocal_d(&mut r_d, matrix);
        Self { matrix, r_d }
    }

    /// `rD[u] -= upper * lower / rD[l]`，然后取倒数
    pub fn calc_reciprocal_d(r_d: &mut [S], matrix: &LduMatrix<S>) {
        let addr = matrix.addressing();
        let (l, u) = (addr.lower_addr(), addr.upper_addr());
        let (upper, lower) = (matrix.upper(), matrix.lower());
        for f in 0..l.len() {
            r_d[u[f]] -= upper[f] * lower[f] / r_d[l[f]];
        }
        for d in r_d.iter_mut() {
            *d = S::ONE / *d;
        }
    }
}

impl<'a, S: RuntimeScalar> LduPreconditioner<S> for DiluPreconditioner<'a, S> {
    fn name(&self) -> &'static str {
        "DILU"
    }

    fn precondition(&self, w: &mut [S], r: &[S]) {
        let addr = self.matrix.addressing();
        let (l, u, losort) = (addr.lower_addr(), addr.upper_addr(), addr.losort_addr());
        let (upper, lower) = (self.matrix.upper(), self.matrix.lower());
        let r_d = &self.r_d;

        for ((wi, &ri), &di) in w.iter_mut().zip(r).zip(r_d) {
            *wi = di * ri;
        }
        for &sf in losort {
            w[u[sf]] -= r_d[u[sf]] * lower[sf] * w[l[sf]];
        }
        for f in (0..l.len()).rev() {
            w[l[f]] -= r_d[l[f]] * upper[f] * w[u[f]];
        }
    }

    fn precondition_t(&self, w: &mut [S], r: &[S]) {
        let addr = self.matrix.addressing();
        let (l, u, losort) = (addr.lower_addr(), addr.upper_addr(), addr.losort_addr());
        let (upper, lower) = (self.matrix.upper(), self.matrix.lower());
        let r_d = &self.r_d;

        for ((wi, &ri), &di) in w.iter_mut().zip(r).zip(r_d) {
            *wi = di * ri;
        }
        for f in 0..l.len() {
            w[u[f]] -= r_d[u[f]] * upper[f] * w[l[f]];
        }
        for &sf in losort.iter().rev() {
            w[l[sf]] -= r_d[l[sf]] * lower[sf] * w[u[sf]];
        }
    }
}
