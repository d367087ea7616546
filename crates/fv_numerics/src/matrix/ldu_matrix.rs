// crates/fv_numerics/src/matrix/ldu_matrix.rs

//! LDU 矩阵
//!
//! 系数按寻址存放：`diag[c]`，面 `f` 上的 `upper[f] = A[l][u]`、`lower[f] = A[u][l]`。
//! 结构分三种：
//!
//! - 对角：只有 `diag`
//! - 对称：`lower` 与 `upper` 共用同一存储
//! - 非对称：`lower` 单独存储
//!
//! 本模块只处理内部面。耦合界面的贡献由 [`LinearSystem`](crate::matrix::LinearSystem)
//! 在乘法与残差中叠加。
//!
//! # 示例
//!
//! ```rust
//! use std::sync::Arc;
//! use fv_numerics::ldu::LduAddressing;
//! use fv_numerics::matrix::LduMatrix;
//!
//! let addr = Arc::new(LduAddressing::new(2, vec![0], vec![1], vec![], 1).unwrap());
//! let mut m: LduMatrix = LduMatrix::new(addr);
//! m.diag_mut().copy_from_slice(&[2.0, 2.0]);
//! m.upper_mut()[0] = -1.0;
//! let mut y = vec![0.0; 2];
//! m.amul_internal(&[1.0, 1.0], &mut y);
//! assert_eq!(y, vec![1.0, 1.0]);
//! ```

use std::sync::Arc;

use fv_foundation::{FvError, FvResult, RuntimeScalar};

use crate::ldu::LduAddressing;

/// LDU 矩阵
#[derive(Debug, Clone)]
pub struct LduMatrix<S: RuntimeScalar = f64> {
    addressing: Arc<LduAddressing>,
    diag: Vec<S>,
    upper: Vec<S>,
    lower: Option<Vec<S>>,
    has_off_diag: bool,
}

impl<S: RuntimeScalar> LduMatrix<S> {
    /// 零矩阵（对角结构）
    pub fn new(addressing: Arc<LduAddressing>) -> Self {
        let n = addressing.size();
        let nf = addressing.n_faces();
        Self {
            addressing,
            diag: vec![S::ZERO; n],
            upper: vec![S::ZERO; nf],
            lower: None,
            has_off_diag: false,
        }
    }

    /// 由系数构造，`lower` 为 `None` 时为对称矩阵
    pub fn from_coeffs(
        addressing: Arc<LduAddressing>,
        diag: Vec<S>,
        upper: Vec<S>,
        lower: Option<Vec<S>>,
    ) -> FvResult<Self> {
        FvError::check_size("diag", addressing.size(), diag.len())?;
        FvError::check_size("upper", addressing.n_faces(), upper.len())?;
        if let Some(l) = &lower {
            FvError::check_size("lower", addressing.n_faces(), l.len())?;
        }
        Ok(Self {
            addressing,
            diag,
            upper,
            lower,
            has_off_diag: true,
        })
    }

    /// 寻址
    #[inline]
    pub fn addressing(&self) -> &Arc<LduAddressing> {
        &self.addressing
    }

    /// 维数
    #[inline]
    pub fn size(&self) -> usize {
        self.addressing.size()
    }

    /// 对角系数
    #[inline]
    pub fn diag(&self) -> &[S] {
        &self.diag
    }

    /// 对角系数（可写）
    #[inline]
    pub fn diag_mut(&mut self) -> &mut [S] {
        &mut self.diag
    }

    /// 上三角系数（对角矩阵为零）
    #[inline]
    pub fn upper(&self) -> &[S] {
        &self.upper
    }

    /// 上三角系数（可写），矩阵至少变为对称结构
    pub fn upper_mut(&mut self) -> &mut [S] {
        self.has_off_diag = true;
        &mut self.upper
    }

    /// 下三角系数，对称矩阵返回上三角存储
    #[inline]
    pub fn lower(&self) -> &[S] {
        self.lower.as_deref().unwrap_or(&self.upper)
    }

    /// 下三角系数（可写），矩阵变为非对称结构
    pub fn lower_mut(&mut self) -> &mut [S] {
        self.has_off_diag = true;
        let upper = &self.upper;
        self.lower.get_or_insert_with(|| upper.clone())
    }

    /// 是否只有对角
    #[inline]
    pub fn is_diagonal(&self) -> bool {
        !self.has_off_diag
    }

    /// 是否对称结构
    #[inline]
    pub fn is_symmetric(&self) -> bool {
        self.has_off_diag && self.lower.is_none()
    }

    /// 是否非对称结构
    #[inline]
    pub fn is_asymmetric(&self) -> bool {
        self.lower.is_some()
    }

    /// 下三角系数单独存储且与上三角不同
    fn has_distinct_lower(&self) -> bool {
        self.lower.as_ref().is_some_and(|l| *l != self.upper)
    }

    /// 结构名称
    pub fn structure_name(&self) -> &'static str {
        if self.is_asymmetric() {
            "asymmetric"
        } else if self.is_symmetric() {
            "symmetric"
        } else {
            "diagonal"
        }
    }

    /// 检查与另一个矩阵是否建立在同一寻址上
    ///
    /// 同一 `Arc` 直接通过；否则要求纪元相同且面连接一致。
    pub fn check_compatible(&self, other: &LduAddressing, operation: &'static str) -> FvResult<()> {
        if std::ptr::eq(Arc::as_ptr(&self.addressing), other) {
            return Ok(());
        }
        if self.addressing.epoch() == other.epoch() && self.addressing.same_structure(other) {
            return Ok(());
        }
        Err(FvError::assembly_mismatch(
            operation,
            format!(
                "寻址不一致: 纪元 {} / {}, 单元 {} / {}, 面 {} / {}",
                self.addressing.epoch(),
                other.epoch(),
                self.addressing.size(),
                other.size(),
                self.addressing.n_faces(),
                other.n_faces()
            ),
        ))
    }

    // =========================================================================
    // 乘法
    // =========================================================================

    /// `y = A x`（只含内部面）
    pub fn amul_internal(&self, x: &[S], y: &mut [S]) {
        let l = self.addressing.lower_addr();
        let u = self.addressing.upper_addr();
        let upper = self.upper();
        let lower = self.lower();
        for ((yi, &d), &xi) in y.iter_mut().zip(&self.diag).zip(x) {
            *yi = d * xi;
        }
        for f in 0..l.len() {
            y[u[f]] += lower[f] * x[l[f]];
            y[l[f]] += upper[f] * x[u[f]];
        }
    }

    /// `y = Aᵀ x`（只含内部面）
    pub fn tmul_internal(&self, x: &[S], y: &mut [S]) {
        let l = self.addressing.lower_addr();
        let u = self.addressing.upper_addr();
        let upper = self.upper();
        let lower = self.lower();
        for ((yi, &d), &xi) in y.iter_mut().zip(&self.diag).zip(x) {
            *yi = d * xi;
        }
        for f in 0..l.len() {
            y[u[f]] += upper[f] * x[l[f]];
            y[l[f]] += lower[f] * x[u[f]];
        }
    }

    /// 行和（只含内部面）
    pub fn sum_a_internal(&self, out: &mut [S]) {
        let l = self.addressing.lower_addr();
        let u = self.addressing.upper_addr();
        let upper = self.upper();
        let lower = self.lower();
        out.copy_from_slice(&self.diag);
        for f in 0..l.len() {
            out[l[f]] += upper[f];
            out[u[f]] += lower[f];
        }
    }

    /// `H x`：非对角部分乘 x 取负
    pub fn h_operator(&self, x: &[S]) -> Vec<S> {
        let l = self.addressing.lower_addr();
        let u = self.addressing.upper_addr();
        let upper = self.upper();
        let lower = self.lower();
        let mut h = vec![S::ZERO; self.size()];
        for f in 0..l.len() {
            h[u[f]] -= lower[f] * x[l[f]];
            h[l[f]] -= upper[f] * x[u[f]];
        }
        h
    }

    // =========================================================================
    // 系数操作
    // =========================================================================

    /// 对角取负的列和：`diag[l] -= lower`, `diag[u] -= upper`
    pub fn neg_sum_diag(&mut self) {
        let l = self.addressing.lower_addr();
        let u = self.addressing.upper_addr();
        let lower = self.lower.as_deref().unwrap_or(&self.upper);
        for f in 0..l.len() {
            self.diag[l[f]] -= lower[f];
            self.diag[u[f]] -= self.upper[f];
        }
    }

    /// 对角加列和：`diag[l] += lower`, `diag[u] += upper`
    pub fn sum_diag(&mut self) {
        let l = self.addressing.lower_addr();
        let u = self.addressing.upper_addr();
        let lower = self.lower.as_deref().unwrap_or(&self.upper);
        for f in 0..l.len() {
            self.diag[l[f]] += lower[f];
            self.diag[u[f]] += self.upper[f];
        }
    }

    /// 每行非对角系数绝对值之和（只含内部面）
    pub fn sum_mag_off_diag(&self, out: &mut [S]) {
        let l = self.addressing.lower_addr();
        let u = self.addressing.upper_addr();
        let upper = self.upper();
        let lower = self.lower();
        out.fill(S::ZERO);
        for f in 0..l.len() {
            out[l[f]] += upper[f].abs();
            out[u[f]] += lower[f].abs();
        }
    }

    /// `self += other`
    pub fn add_assign(&mut self, other: &LduMatrix<S>) -> FvResult<()> {
        self.combine(other, "ldu_matrix_add", S::ONE)
    }

    /// `self -= other`
    pub fn sub_assign(&mut self, other: &LduMatrix<S>) -> FvResult<()> {
        self.combine(other, "ldu_matrix_sub", -S::ONE)
    }

    fn combine(&mut self, other: &LduMatrix<S>, operation: &'static str, sign: S) -> FvResult<()> {
        self.check_compatible(&other.addressing, operation)?;
        for (d, &o) in self.diag.iter_mut().zip(&other.diag) {
            *d += sign * o;
        }
        if other.is_diagonal() {
            return Ok(());
        }
        if other.has_distinct_lower() || self.is_asymmetric() {
            let lower = self.lower_mut();
            for (a, &o) in lower.iter_mut().zip(other.lower()) {
                *a += sign * o;
            }
        }
        let upper = self.upper_mut();
        for (a, &o) in upper.iter_mut().zip(other.upper()) {
            *a += sign * o;
        }
        Ok(())
    }

    /// 全部系数乘以常数
    pub fn scale(&mut self, factor: S) {
        self.diag.iter_mut().for_each(|d| *d *= factor);
        self.upper.iter_mut().for_each(|u| *u *= factor);
        if let Some(lower) = &mut self.lower {
            lower.iter_mut().for_each(|l| *l *= factor);
        }
    }

    /// 全部系数取负
    pub fn negate(&mut self) {
        self.scale(-S::ONE);
    }

    /// 转换标量精度
    pub fn cast<T: RuntimeScalar>(&self) -> LduMatrix<T> {
        let conv = |v: &[S]| v.iter().map(|&x| T::from_config(x.as_f64())).collect::<Vec<T>>();
        LduMatrix {
            addressing: Arc::clone(&self.addressing),
            diag: conv(&self.diag),
            upper: conv(&self.upper),
            lower: self.lower.as_deref().map(conv),
            has_off_diag: self.has_off_diag,
        }
    }

    /// 检查系数是否有限
    pub fn validate(&self) -> FvResult<()> {
        let mut parts: Vec<(&str, &[S])> = vec![("diag", &self.diag[..]), ("upper", &self.upper[..])];
        if let Some(lower) = &self.lower {
            parts.push(("lower", &lower[..]));
        }
        for (name, data) in parts {
            S::validate_slice(data).map_err(|(i, v)| FvError::non_finite(format!("{}[{}] = {}", name, i, v)))?;
        }
        Ok(())
    }
}
