// crates/fv_numerics/src/discretization/fv_matrix.rs

//! 有限体积方程矩阵
//!
//! [`FvMatrix`] 表示离散方程 `M(ψ) = A ψ - b`，求解 `M(ψ) = 0`：
//!
//! ```text
//! A = LduMatrix + Σ_patch internal_coeffs            (对角)
//! b = source + Σ_非耦合 boundary_coeffs               (右端)
//! 耦合面片: boundary_coeffs 作为界面系数乘对侧单元值
//! ```
//!
//! 各项算子（[`fvm`](super::fvm)）生成的 `FvMatrix` 通过 `+=`/`-=` 叠加，叠加顺序固定时结果确定。

use std::sync::Arc;

use fv_config::Precision;
use fv_foundation::{FvError, FvResult, RuntimeScalar};

use crate::fields::VolScalarField;
use crate::ldu::LduAddressing;
use crate::linear_algebra::{create_solver, ResolvedControls, SolverPerformance};
use crate::matrix::{LduMatrix, LinearSystem};
use crate::mesh::FvMesh;
use crate::parallel::Communicator;

/// 单个方程的矩阵
#[derive(Debug, Clone)]
pub struct FvMatrix {
    field_name: String,
    ldu: LduMatrix<f64>,
    source: Vec<f64>,
    internal_coeffs: Vec<Vec<f64>>,
    boundary_coeffs: Vec<Vec<f64>>,
    coupled: Vec<bool>,
    epoch: u64,
}

impl FvMatrix {
    /// 零矩阵
    pub fn new(psi: &VolScalarField, mesh: &FvMesh) -> FvResult<Self> {
        mesh.check_epoch(psi.epoch(), "fv_matrix")?;
        let patches = mesh.poly().patches();
        Ok(Self {
            field_name: psi.name().to_string(),
            ldu: LduMatrix::new(Arc::clone(mesh.addressing())),
            source: vec![0.0; mesh.n_cells()],
            internal_coeffs: patches.iter().map(|p| vec![0.0; p.size]).collect(),
            boundary_coeffs: patches.iter().map(|p| vec![0.0; p.size]).collect(),
            coupled: patches.iter().map(|p| p.is_coupled()).collect(),
            epoch: mesh.topology_epoch(),
        })
    }

    /// 场名
    #[inline]
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// LDU 部分
    #[inline]
    pub fn ldu(&self) -> &LduMatrix<f64> {
        &self.ldu
    }

    /// LDU 部分（可写）
    #[inline]
    pub fn ldu_mut(&mut self) -> &mut LduMatrix<f64> {
        &mut self.ldu
    }

    /// 右端项
    #[inline]
    pub fn source(&self) -> &[f64] {
        &self.source
    }

    /// 右端项（可写）
    #[inline]
    pub fn source_mut(&mut self) -> &mut [f64] {
        &mut self.source
    }

    /// 各面片加到对角的系数
    #[inline]
    pub fn internal_coeffs(&self) -> &[Vec<f64>] {
        &self.internal_coeffs
    }

    /// 各面片加到对角的系数（可写）
    #[inline]
    pub fn internal_coeffs_mut(&mut self) -> &mut [Vec<f64>] {
        &mut self.internal_coeffs
    }

    /// 各面片的边界系数
    #[inline]
    pub fn boundary_coeffs(&self) -> &[Vec<f64>] {
        &self.boundary_coeffs
    }

    /// 各面片的边界系数（可写）
    #[inline]
    pub fn boundary_coeffs_mut(&mut self) -> &mut [Vec<f64>] {
        &mut self.boundary_coeffs
    }

    /// 装配时的拓扑纪元
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    fn addressing(&self) -> &Arc<LduAddressing> {
        self.ldu.addressing()
    }

    fn check_same_equation(&self, other: &FvMatrix, operation: &'static str) -> FvResult<()> {
        if self.field_name != other.field_name {
            return Err(FvError::assembly_mismatch(
                operation,
                format!("场 '{}' 与 '{}' 的项不能相加", self.field_name, other.field_name),
            ));
        }
        if self.epoch != other.epoch {
            return Err(FvError::assembly_mismatch(
                operation,
                format!("拓扑纪元 {} 与 {} 不一致", self.epoch, other.epoch),
            ));
        }
        self.ldu.check_compatible(other.addressing(), operation)?;
        for (a, b) in self.internal_coeffs.iter().zip(&other.internal_coeffs) {
            FvError::check_size("internal_coeffs", a.len(), b.len())?;
        }
        Ok(())
    }

    fn combine(&mut self, other: &FvMatrix, operation: &'static str, sign: f64) -> FvResult<()> {
        self.check_same_equation(other, operation)?;
        if sign > 0.0 {
            self.ldu.add_assign(&other.ldu)?;
        } else {
            self.ldu.sub_assign(&other.ldu)?;
        }
        axpy(&mut self.source, sign, &other.source);
        for (a, b) in self.internal_coeffs.iter_mut().zip(&other.internal_coeffs) {
            axpy(a, sign, b);
        }
        for (a, b) in self.boundary_coeffs.iter_mut().zip(&other.boundary_coeffs) {
            axpy(a, sign, b);
        }
        Ok(())
    }

    /// `self += other`
    pub fn add_assign(&mut self, other: &FvMatrix) -> FvResult<()> {
        self.combine(other, "fv_matrix_add", 1.0)
    }

    /// `self -= other`
    pub fn sub_assign(&mut self, other: &FvMatrix) -> FvResult<()> {
        self.combine(other, "fv_matrix_sub", -1.0)
    }

    /// 取负
    pub fn negate(&mut self) {
        self.ldu.negate();
        self.source.iter_mut().for_each(|s| *s = -*s);
        for c in self.internal_coeffs.iter_mut().chain(self.boundary_coeffs.iter_mut()) {
            c.iter_mut().for_each(|v| *v = -*v);
        }
    }

    /// 加显式项 `M + su`，`su` 为单位体积值
    pub fn add_explicit(&mut self, su: &[f64], mesh: &FvMesh) -> FvResult<()> {
        self.explicit(su, mesh, -1.0)
    }

    /// 减显式项 `M - su`，即 `M == su`
    pub fn sub_explicit(&mut self, su: &[f64], mesh: &FvMesh) -> FvResult<()> {
        self.explicit(su, mesh, 1.0)
    }

    fn explicit(&mut self, su: &[f64], mesh: &FvMesh, sign: f64) -> FvResult<()> {
        mesh.check_epoch(self.epoch, "fv_matrix_explicit")?;
        FvError::check_size("explicit source", self.source.len(), su.len())?;
        for ((s, &v), &vol) in self.source.iter_mut().zip(su).zip(mesh.volumes()) {
            *s += sign * vol * v;
        }
        Ok(())
    }

    /// 每个单元的 `(对角 + 边界对角, 非对角模之和)`
    fn total_diag_and_off(&self) -> (Vec<f64>, Vec<f64>) {
        let addr = self.addressing();
        let mut d = self.ldu.diag().to_vec();
        let mut sum_off = vec![0.0; d.len()];
        self.ldu.sum_mag_off_diag(&mut sum_off);
        for patchi in 0..self.internal_coeffs.len() {
            let cells = addr.patch_addr(patchi);
            for (i, &c) in cells.iter().enumerate() {
                d[c] += self.internal_coeffs[patchi][i];
                if self.coupled[patchi] {
                    sum_off[c] += self.boundary_coeffs[patchi][i].abs();
                }
            }
        }
        (d, sum_off)
    }

    /// 亚松弛
    ///
    /// 先把对角放大到不小于非对角模之和，再除以 `alpha`，右端补偿 `(D - D0) ψ`，
    /// 收敛解不变。
    pub fn relax(&mut self, psi: &VolScalarField, alpha: f64) -> FvResult<()> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(FvError::invalid_config("relaxationFactor", alpha.to_string(), "必须在 (0, 1] 内"));
        }
        FvError::check_size("psi", self.source.len(), psi.internal().len())?;
        let (d0, sum_off) = self.total_diag_and_off();
        let internal_only: Vec<f64> = self.ldu.diag().iter().zip(&d0).map(|(&d, &t)| t - d).collect();
        let psi = psi.internal();
        let diag = self.ldu.diag_mut();
        for c in 0..diag.len() {
            let sign = if d0[c] < 0.0 { -1.0 } else { 1.0 };
            let d = sign * d0[c].abs().max(sum_off[c]) / alpha;
            self.source[c] += (d - d0[c]) * psi[c];
            diag[c] = d - internal_only[c];
        }
        Ok(())
    }

    /// `A = (对角 + 边界对角) / V`
    pub fn a(&self, mesh: &FvMesh) -> FvResult<Vec<f64>> {
        mesh.check_epoch(self.epoch, "fv_matrix_a")?;
        let (d, _) = self.total_diag_and_off();
        Ok(d.iter().zip(mesh.volumes()).map(|(&d, &v)| d / v).collect())
    }

    /// `H = (b - N ψ) / V`，收敛时 `A ψ = H`
    pub fn h(&self, psi: &VolScalarField, mesh: &FvMesh) -> FvResult<Vec<f64>> {
        mesh.check_epoch(self.epoch, "fv_matrix_h")?;
        FvError::check_size("psi", self.source.len(), psi.internal().len())?;
        let mut h = self.ldu.h_operator(psi.internal());
        self.add_boundary_source(&mut h, psi)?;
        for (hc, (&s, &v)) in h.iter_mut().zip(self.source.iter().zip(mesh.volumes())) {
            *hc = (*hc + s) / v;
        }
        Ok(h)
    }

    /// 非耦合面片的边界源与耦合面片的对侧贡献
    fn add_boundary_source(&self, out: &mut [f64], psi: &VolScalarField) -> FvResult<()> {
        let addr = self.addressing();
        for (patchi, coeffs) in self.boundary_coeffs.iter().enumerate() {
            let cells = addr.patch_addr(patchi);
            if self.coupled[patchi] {
                let Some(nbr) = psi.patch(patchi)?.patch_neighbour_field() else {
                    continue;
                };
                for ((&c, &b), &x) in cells.iter().zip(coeffs).zip(nbr) {
                    out[c] -= b * x;
                }
            } else {
                for (&c, &b) in cells.iter().zip(coeffs) {
                    out[c] += b;
                }
            }
        }
        Ok(())
    }

    /// 求解器看到的对角、右端与界面系数
    fn solver_coeffs(&self) -> (Vec<f64>, Vec<f64>, Vec<Vec<f64>>, Vec<Vec<f64>>) {
        let addr = self.addressing();
        let mut diag = self.ldu.diag().to_vec();
        let mut source = self.source.clone();
        let mut bou = Vec::with_capacity(self.boundary_coeffs.len());
        let mut int = Vec::with_capacity(self.boundary_coeffs.len());
        for patchi in 0..self.boundary_coeffs.len() {
            let cells = addr.patch_addr(patchi);
            for (&c, &ic) in cells.iter().zip(&self.internal_coeffs[patchi]) {
                diag[c] += ic;
            }
            if self.coupled[patchi] {
                bou.push(self.boundary_coeffs[patchi].clone());
                int.push(self.internal_coeffs[patchi].clone());
            } else {
                for (&c, &b) in cells.iter().zip(&self.boundary_coeffs[patchi]) {
                    source[c] += b;
                }
                bou.push(Vec::new());
                int.push(Vec::new());
            }
        }
        (diag, source, bou, int)
    }

    fn solver_matrix(&self, diag: Vec<f64>) -> FvResult<LduMatrix<f64>> {
        if self.ldu.is_diagonal() {
            let mut m = LduMatrix::new(Arc::clone(self.addressing()));
            m.diag_mut().copy_from_slice(&diag);
            return Ok(m);
        }
        let lower = self.ldu.is_asymmetric().then(|| self.ldu.lower().to_vec());
        LduMatrix::from_coeffs(Arc::clone(self.addressing()), diag, self.ldu.upper().to_vec(), lower)
    }

    /// 残差 `b - A ψ`（含界面贡献），所有分区必须同时调用
    pub fn residual(&self, psi: &VolScalarField, mesh: &FvMesh, comm: &dyn Communicator) -> FvResult<Vec<f64>> {
        mesh.check_epoch(self.epoch, "fv_matrix_residual")?;
        FvError::check_size("psi", self.source.len(), psi.internal().len())?;
        let (diag, source, bou, int) = self.solver_coeffs();
        let matrix = self.solver_matrix(diag)?;
        let system = LinearSystem::new(&matrix, &bou, &int, mesh.ldu(), comm)?;
        let mut r = vec![0.0; source.len()];
        system.residual(psi.internal(), &source, &mut r)?;
        Ok(r)
    }

    /// 求解并写回场值，所有分区必须同时调用
    ///
    /// 矩阵按 `precision` 转换后交给求解器，结果再转回 `f64`。
    pub fn solve(
        &self,
        psi: &mut VolScalarField,
        mesh: &FvMesh,
        comm: &dyn Communicator,
        controls: &ResolvedControls,
        precision: Precision,
    ) -> FvResult<SolverPerformance> {
        mesh.check_epoch(self.epoch, "fv_matrix_solve")?;
        mesh.check_epoch(psi.epoch(), "fv_matrix_solve")?;
        if psi.name() != self.field_name {
            return Err(FvError::assembly_mismatch(
                "fv_matrix_solve",
                format!("矩阵属于场 '{}'，传入场 '{}'", self.field_name, psi.name()),
            ));
        }

        let (diag, source, bou, int) = self.solver_coeffs();
        let matrix = self.solver_matrix(diag)?;
        matrix.validate()?;

        let perf = match precision {
            Precision::F64 => solve_as::<f64>(&self.field_name, &matrix, &bou, &int, &source, psi, mesh, comm, controls)?,
            Precision::F32 => solve_as::<f32>(&self.field_name, &matrix, &bou, &int, &source, psi, mesh, comm, controls)?,
        };
        psi.correct_boundary_conditions(mesh, comm)?;
        perf.log();
        Ok(perf)
    }
}

#[allow(clippy::too_many_arguments)]
fn solve_as<S: RuntimeScalar>(
    field_name: &str,
    matrix: &LduMatrix<f64>,
    bou: &[Vec<f64>],
    int: &[Vec<f64>],
    source: &[f64],
    psi: &mut VolScalarField,
    mesh: &FvMesh,
    comm: &dyn Communicator,
    controls: &ResolvedControls,
) -> FvResult<SolverPerformance> {
    let cast = |v: &[f64]| v.iter().map(|&x| S::from_config(x)).collect::<Vec<S>>();
    let matrix_s: LduMatrix<S> = matrix.cast();
    let bou_s: Vec<Vec<S>> = bou.iter().map(|c| cast(c)).collect();
    let int_s: Vec<Vec<S>> = int.iter().map(|c| cast(c)).collect();
    let source_s = cast(source);
    let mut x = cast(psi.internal());

    let system = LinearSystem::new(&matrix_s, &bou_s, &int_s, mesh.ldu(), comm)?;
    let mut solver = create_solver(controls, &matrix_s)?;
    let perf = solver.solve(field_name, &system, &mut x, &source_s)?;

    for (p, v) in psi.internal_mut().iter_mut().zip(&x) {
        *p = v.as_f64();
    }
    Ok(perf)
}

fn axpy(y: &mut [f64], a: f64, x: &[f64]) {
    for (yi, &xi) in y.iter_mut().zip(x) {
        *yi += a * xi;
    }
}
