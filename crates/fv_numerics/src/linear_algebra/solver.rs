// crates/fv_numerics/src/linear_algebra/solver.rs

//! 迭代求解器
//!
//! 所有求解器共用同一套残差定义：
//!
//! ```text
//! r = b - Aψ,   residual = Σ|r| / normFactor
//! ```
//!
//! 归一化因子见 [`LinearSystem::norm_factor`]。点积与范数都是全局归约，因此各分区
//! 的收敛判定一致，迭代次数相同。

use fv_foundation::{FvError, FvResult, RuntimeScalar};

use super::performance::{ConvergenceMonitor, SolverPerformance, SolverStatus};
use super::registry::{create_preconditioner, create_smoother, ResolvedControls};
use super::vector_ops::{axpy, g_max_mag, g_sum_mag, g_sum_prod, g_sum_sqr};
use crate::matrix::LinearSystem;

/// 线性求解器接口
pub trait LduSolver<S: RuntimeScalar> {
    /// 名称
    fn name(&self) -> &'static str;

    /// 求解 `A ψ = b`，`psi` 作为初值并就地更新
    fn solve(
        &mut self,
        field_name: &str,
        system: &LinearSystem<'_, S>,
        psi: &mut [S],
        source: &[S],
    ) -> FvResult<SolverPerformance>;
}

/// 检查向量长度
pub(crate) fn check_sizes<S: RuntimeScalar>(system: &LinearSystem<'_, S>, psi: &[S], source: &[S]) -> FvResult<()> {
    FvError::check_size("psi", system.n_cells(), psi.len())?;
    FvError::check_size("source", system.n_cells(), source.len())
}

/// 初始残差：返回 `(normFactor, 归一化残差)`，`r` 中为 `b - Aψ`
pub(crate) fn initial_residual<S: RuntimeScalar>(
    system: &LinearSystem<'_, S>,
    psi: &[S],
    source: &[S],
    ax: &mut [S],
    r: &mut [S],
) -> FvResult<(S, S)> {
    system.amul(psi, ax)?;
    for ((ri, &bi), &ai) in r.iter_mut().zip(source).zip(ax.iter()) {
        *ri = bi - ai;
    }
    let mut tmp = vec![S::ZERO; psi.len()];
    let norm_factor = system.norm_factor(psi, source, ax, &mut tmp)?;
    let residual = g_sum_mag(system.comm(), r)? / norm_factor;
    Ok((norm_factor, residual))
}

fn is_singular<S: RuntimeScalar>(value: S) -> bool {
    value.abs() < S::VSMALL
}

fn trace<S: RuntimeScalar>(controls: &ResolvedControls, name: &str, field: &str, iter: usize, residual: S) {
    if controls.verbose {
        log::trace!("{} {} 第 {} 次迭代: 残差 = {:e}", name, field, iter, residual.as_f64());
    }
}

// ============================================================
// PCG
// ============================================================

/// 预条件共轭梯度（对称矩阵）
#[derive(Debug, Clone)]
pub struct PcgSolver {
    controls: ResolvedControls,
}

impl PcgSolver {
    /// 创建
    pub fn new(controls: ResolvedControls) -> Self {
        Self { controls }
    }
}

impl<S: RuntimeScalar> LduSolver<S> for PcgSolver {
    fn name(&self) -> &'static str {
        "PCG"
    }

    fn solve(
        &mut self,
        field_name: &str,
        system: &LinearSystem<'_, S>,
        psi: &mut [S],
        source: &[S],
    ) -> FvResult<SolverPerformance> {
        check_sizes(system, psi, source)?;
        let comm = system.comm();
        let n = system.n_cells();
        let mut perf = SolverPerformance::new("PCG", field_name);
        if n == 0 {
            return Ok(perf);
        }

        let mut w_a = vec![S::ZERO; n];
        let mut r_a = vec![S::ZERO; n];
        let mut p_a = vec![S::ZERO; n];

        let (norm_factor, initial) = initial_residual(system, psi, source, &mut w_a, &mut r_a)?;
        perf.initial_residual = initial.as_f64();
        perf.final_residual = perf.initial_residual;

        let (mut monitor, status) = ConvergenceMonitor::start(self.controls.criteria, initial)?;
        let status = match status {
            Some(status) => status,
            None => {
                let precon = create_preconditioner(self.controls.preconditioner, system.matrix())?;
                let mut w_ar_a = S::ZERO;
                loop {
                    let w_ar_a_old = w_ar_a;
                    precon.precondition(&mut w_a, &r_a);
                    w_ar_a = g_sum_prod(comm, &w_a, &r_a)?;

                    if monitor.n_iterations() == 0 {
                        p_a.copy_from_slice(&w_a);
                    } else {
                        let beta = w_ar_a / w_ar_a_old;
                        for (p, &w) in p_a.iter_mut().zip(&w_a) {
                            *p = w + beta * *p;
                        }
                    }

                    system.amul(&p_a, &mut w_a)?;
                    let w_ap_a = g_sum_prod(comm, &w_a, &p_a)?;
                    if is_singular(w_ap_a / norm_factor) {
                        break SolverStatus::Stagnated;
                    }

                    let alpha = w_ar_a / w_ap_a;
                    axpy(psi, alpha, &p_a);
                    axpy(&mut r_a, -alpha, &w_a);

                    let residual = g_sum_mag(comm, &r_a)? / norm_factor;
                    perf.final_residual = residual.as_f64();
                    let change = if monitor.wants_change() {
                        Some(alpha.abs() * g_max_mag(comm, &p_a)?)
                    } else {
                        None
                    };
                    trace(&self.controls, "PCG", field_name, monitor.n_iterations() + 1, residual);
                    if let Some(status) = monitor.update(1, residual, change)? {
                        break status;
                    }
                }
            }
        };

        perf.n_iterations = monitor.n_iterations();
        perf.status = status;
        Ok(perf)
    }
}

// ============================================================
// PBiCG
// ============================================================

/// 预条件双共轭梯度（非对称矩阵）
#[derive(Debug, Clone)]
pub struct PbicgSolver {
    controls: ResolvedControls,
}

impl PbicgSolver {
    /// 创建
    pub fn new(controls: ResolvedControls) -> Self {
        Self { controls }
    }
}

impl<S: RuntimeScalar> LduSolver<S> for PbicgSolver {
    fn name(&self) -> &'static str {
        "PBiCG"
    }

    fn solve(
        &mut self,
        field_name: &str,
        system: &LinearSystem<'_, S>,
        psi: &mut [S],
        source: &[S],
    ) -> FvResult<SolverPerformance> {
        check_sizes(system, psi, source)?;
        let comm = system.comm();
        let n = system.n_cells();
        let mut perf = SolverPerformance::new("PBiCG", field_name);
        if n == 0 {
            return Ok(perf);
        }

        let mut w_a = vec![S::ZERO; n];
        let mut r_a = vec![S::ZERO; n];
        let mut p_a = vec![S::ZERO; n];

        let (norm_factor, initial) = initial_residual(system, psi, source, &mut w_a, &mut r_a)?;
        perf.initial_residual = initial.as_f64();
        perf.final_residual = perf.initial_residual;

        let (mut monitor, status) = ConvergenceMonitor::start(self.controls.criteria, initial)?;
        let status = match status {
            Some(status) => status,
            None => {
                let precon = create_preconditioner(self.controls.preconditioner, system.matrix())?;
                let mut r_t = r_a.clone();
                let mut w_t = vec![S::ZERO; n];
                let mut p_t = vec![S::ZERO; n];
                let mut w_ar_t = S::ZERO;
                loop {
                    let w_ar_t_old = w_ar_t;
                    precon.precondition(&mut w_a, &r_a);
                    precon.precondition_t(&mut w_t, &r_t);
                    w_ar_t = g_sum_prod(comm, &w_a, &r_t)?;

                    if monitor.n_iterations() == 0 {
                        p_a.copy_from_slice(&w_a);
                        p_t.copy_from_slice(&w_t);
                    } else {
                        let beta = w_ar_t / w_ar_t_old;
                        for i in 0..n {
                            p_a[i] = w_a[i] + beta * p_a[i];
                            p_t[i] = w_t[i] + beta * p_t[i];
                        }
                    }

                    system.amul(&p_a, &mut w_a)?;
                    system.tmul(&p_t, &mut w_t)?;
                    let w_ap_t = g_sum_prod(comm, &w_a, &p_t)?;
                    if is_singular(w_ap_t / norm_factor) {
                        break SolverStatus::Stagnated;
                    }

                    let alpha = w_ar_t / w_ap_t;
                    axpy(psi, alpha, &p_a);
                    axpy(&mut r_a, -alpha, &w_a);
                    axpy(&mut r_t, -alpha, &w_t);

                    let residual = g_sum_mag(comm, &r_a)? / norm_factor;
                    perf.final_residual = residual.as_f64();
                    let change = if monitor.wants_change() {
                        Some(alpha.abs() * g_max_mag(comm, &p_a)?)
                    } else {
                        None
                    };
                    trace(&self.controls, "PBiCG", field_name, monitor.n_iterations() + 1, residual);
                    if let Some(status) = monitor.update(1, residual, change)? {
                        break status;
                    }
                }
            }
        };

        perf.n_iterations = monitor.n_iterations();
        perf.status = status;
        Ok(perf)
    }
}

// ============================================================
// PBiCGStab
// ============================================================

/// 预条件稳定双共轭梯度
#[derive(Debug, Clone)]
pub struct PbicgStabSolver {
    controls: ResolvedControls,
}

impl PbicgStabSolver {
    /// 创建
    pub fn new(controls: ResolvedControls) -> Self {
        Self { controls }
    }
}

impl<S: RuntimeScalar> LduSolver<S> for PbicgStabSolver {
    fn name(&self) -> &'static str {
        "PBiCGStab"
    }

    fn solve(
        &mut self,
        field_name: &str,
        system: &LinearSystem<'_, S>,
        psi: &mut [S],
        source: &[S],
    ) -> FvResult<SolverPerformance> {
        check_sizes(system, psi, source)?;
        let comm = system.comm();
        let n = system.n_cells();
        let mut perf = SolverPerformance::new("PBiCGStab", field_name);
        if n == 0 {
            return Ok(perf);
        }

        let mut y_a = vec![S::ZERO; n];
        let mut r_a = vec![S::ZERO; n];

        let (norm_factor, initial) = initial_residual(system, psi, source, &mut y_a, &mut r_a)?;
        perf.initial_residual = initial.as_f64();
        perf.final_residual = perf.initial_residual;

        let (mut monitor, status) = ConvergenceMonitor::start(self.controls.criteria, initial)?;
        let status = match status {
            Some(status) => status,
            None => {
                let precon = create_preconditioner(self.controls.preconditioner, system.matrix())?;
                let r_a0 = r_a.clone();
                let mut p_a = vec![S::ZERO; n];
                let mut ay_a = vec![S::ZERO; n];
                let mut s_a = vec![S::ZERO; n];
                let mut z_a = vec![S::ZERO; n];
                let mut t_a = vec![S::ZERO; n];
                let (mut r_a0r_a_old, mut alpha, mut omega) = (S::ZERO, S::ZERO, S::ZERO);

                loop {
                    let r_a0r_a = g_sum_prod(comm, &r_a0, &r_a)?;
                    if is_singular(r_a0r_a) {
                        break SolverStatus::Stagnated;
                    }

                    if monitor.n_iterations() == 0 {
                        p_a.copy_from_slice(&r_a);
                    } else {
                        if is_singular(omega) {
                            break SolverStatus::Stagnated;
                        }
                        let beta = (r_a0r_a / r_a0r_a_old) * (alpha / omega);
                        for i in 0..n {
                            p_a[i] = r_a[i] + beta * (p_a[i] - omega * ay_a[i]);
                        }
                    }

                    precon.precondition(&mut y_a, &p_a);
                    system.amul(&y_a, &mut ay_a)?;
                    let r_a0ay_a = g_sum_prod(comm, &r_a0, &ay_a)?;
                    if is_singular(r_a0ay_a) {
                        break SolverStatus::Stagnated;
                    }
                    alpha = r_a0r_a / r_a0ay_a;

                    for i in 0..n {
                        s_a[i] = r_a[i] - alpha * ay_a[i];
                    }
                    let s_residual = g_sum_mag(comm, &s_a)? / norm_factor;
                    if monitor.would_converge(s_residual) {
                        axpy(psi, alpha, &y_a);
                        r_a.copy_from_slice(&s_a);
                        perf.final_residual = s_residual.as_f64();
                        let change = if monitor.wants_change() {
                            Some(alpha.abs() * g_max_mag(comm, &y_a)?)
                        } else {
                            None
                        };
                        if let Some(status) = monitor.update(1, s_residual, change)? {
                            break status;
                        }
                        continue;
                    }

                    precon.precondition(&mut z_a, &s_a);
                    system.amul(&z_a, &mut t_a)?;
                    let t_at_a = g_sum_sqr(comm, &t_a)?;
                    omega = g_sum_prod(comm, &t_a, &s_a)? / t_at_a;

                    let mut local_change = S::ZERO;
                    for i in 0..n {
                        let dx = alpha * y_a[i] + omega * z_a[i];
                        psi[i] += dx;
                        local_change = local_change.max(dx.abs());
                        r_a[i] = s_a[i] - omega * t_a[i];
                    }
                    r_a0r_a_old = r_a0r_a;

                    let residual = g_sum_mag(comm, &r_a)? / norm_factor;
                    perf.final_residual = residual.as_f64();
                    let change = if monitor.wants_change() {
                        Some(crate::parallel::reduce_max(comm, local_change)?)
                    } else {
                        None
                    };
                    trace(&self.controls, "PBiCGStab", field_name, monitor.n_iterations() + 1, residual);
                    if let Some(status) = monitor.update(1, residual, change)? {
                        break status;
                    }
                }
            }
        };

        perf.n_iterations = monitor.n_iterations();
        perf.status = status;
        Ok(perf)
    }
}

// ============================================================
// smoothSolver
// ============================================================

/// 以光顺器迭代的求解器
#[derive(Debug, Clone)]
pub struct SmoothSolver {
    controls: ResolvedControls,
}

impl SmoothSolver {
    /// 创建
    pub fn new(controls: ResolvedControls) -> Self {
        Self { controls }
    }
}

impl<S: RuntimeScalar> LduSolver<S> for SmoothSolver {
    fn name(&self) -> &'static str {
        "smoothSolver"
    }

    fn solve(
        &mut self,
        field_name: &str,
        system: &LinearSystem<'_, S>,
        psi: &mut [S],
        source: &[S],
    ) -> FvResult<SolverPerformance> {
        check_sizes(system, psi, source)?;
        let comm = system.comm();
        let n = system.n_cells();
        let mut perf = SolverPerformance::new("smoothSolver", field_name);
        if n == 0 {
            return Ok(perf);
        }

        let mut ax = vec![S::ZERO; n];
        let mut r_a = vec![S::ZERO; n];
        let (norm_factor, initial) = initial_residual(system, psi, source, &mut ax, &mut r_a)?;
        perf.initial_residual = initial.as_f64();
        perf.final_residual = perf.initial_residual;

        let (mut monitor, status) = ConvergenceMonitor::start(self.controls.criteria, initial)?;
        let status = match status {
            Some(status) => status,
            None => {
                let mut smoother = create_smoother(self.controls.smoother, system)?;
                let n_sweeps = self.controls.n_sweeps;
                let mut previous = Vec::new();
                loop {
                    if monitor.wants_change() {
                        previous.clear();
                        previous.extend_from_slice(psi);
                    }
                    smoother.smooth(system, psi, source, n_sweeps)?;
                    system.residual(psi, source, &mut r_a)?;
                    let residual = g_sum_mag(comm, &r_a)? / norm_factor;
                    perf.final_residual = residual.as_f64();
                    let change = if monitor.wants_change() {
                        let local = psi
                            .iter()
                            .zip(&previous)
                            .fold(S::ZERO, |m, (&a, &b)| m.max((a - b).abs()));
                        Some(crate::parallel::reduce_max(comm, local)?)
                    } else {
                        None
                    };
                    trace(&self.controls, "smoothSolver", field_name, monitor.n_iterations() + n_sweeps, residual);
                    if let Some(status) = monitor.update(n_sweeps, residual, change)? {
                        break status;
                    }
                }
            }
        };

        perf.n_iterations = monitor.n_iterations();
        perf.status = status;
        Ok(perf)
    }
}

// ============================================================
// 对角求解器
// ============================================================

/// 纯对角矩阵的直接求解
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagonalSolver;

impl<S: RuntimeScalar> LduSolver<S> for DiagonalSolver {
    fn name(&self) -> &'static str {
        "diagonal"
    }

    fn solve(
        &mut self,
        field_name: &str,
        system: &LinearSystem<'_, S>,
        psi: &mut [S],
        source: &[S],
    ) -> FvResult<SolverPerformance> {
        check_sizes(system, psi, source)?;
        for ((p, &b), &d) in psi.iter_mut().zip(source).zip(system.matrix().diag()) {
            *p = b / d;
        }
        S::validate_slice(psi).map_err(|(i, v)| FvError::non_finite(format!("对角求解 psi[{}] = {}", i, v)))?;
        Ok(SolverPerformance::new("diagonal", field_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ldu::{LduAddressing, LduMesh};
    use crate::linear_algebra::registry::{PreconditionerKind, SmootherKind, SolverKind};
    use crate::matrix::LduMatrix;
    use crate::parallel::SerialComm;
    use approx::assert_relative_eq;

    fn tridiag(n: usize, lower: Option<f64>) -> (LduMatrix, LduMesh) {
        let addr = LduAddressing::new(n, (0..n - 1).collect(), (1..n).collect(), vec![], 1).unwrap();
        let mesh = LduMesh::uncoupled(addr).unwrap();
        let m = LduMatrix::from_coeffs(
            mesh.addressing().clone(),
            vec![2.5; n],
            vec![-1.0; n - 1],
            lower.map(|l| vec![l; n - 1]),
        )
        .unwrap();
        (m, mesh)
    }

    fn controls(solver: SolverKind, precon: PreconditionerKind) -> ResolvedControls {
        let mut c = ResolvedControls {
            solver,
            preconditioner: precon,
            ..ResolvedControls::default()
        };
        c.criteria.tolerance = 1e-12;
        c
    }

    fn check_solution(m: &LduMatrix, psi: &[f64], b: &[f64]) {
        let mut ax = vec![0.0; psi.len()];
        m.amul_internal(psi, &mut ax);
        for (a, e) in ax.iter().zip(b) {
            assert_relative_eq!(*a, *e, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_pcg_variants() {
        let (m, mesh) = tridiag(20, None);
        let comm = SerialComm;
        let sys = LinearSystem::uncoupled(&m, &mesh, &comm).unwrap();
        let b: Vec<f64> = (0..20).map(|i| (i as f64).sin()).collect();
        for precon in [PreconditionerKind::None, PreconditionerKind::Diagonal, PreconditionerKind::Dic] {
            let mut psi = vec![0.0; 20];
            let perf = PcgSolver::new(controls(SolverKind::Pcg, precon))
                .solve("x", &sys, &mut psi, &b)
                .unwrap();
            assert!(perf.converged(), "{:?}: {:?}", precon, perf);
            check_solution(&m, &psi, &b);
        }
    }

    #[test]
    fn test_asymmetric_solvers() {
        let (m, mesh) = tridiag(15, Some(-0.4));
        let comm = SerialComm;
        let sys = LinearSystem::uncoupled(&m, &mesh, &comm).unwrap();
        let b: Vec<f64> = (0..15).map(|i| 1.0 + i as f64).collect();

        let mut psi = vec![0.0; 15];
        let perf = PbicgSolver::new(controls(SolverKind::Pbicg, PreconditionerKind::Dilu))
            .solve("x", &sys, &mut psi, &b)
            .unwrap();
        assert!(perf.converged());
        check_solution(&m, &psi, &b);

        let mut psi = vec![0.0; 15];
        let perf = PbicgStabSolver::new(controls(SolverKind::PbicgStab, PreconditionerKind::Diagonal))
            .solve("x", &sys, &mut psi, &b)
            .unwrap();
        assert!(perf.converged());
        check_solution(&m, &psi, &b);
    }

    #[test]
    fn test_smooth_solver_counts_sweeps() {
        let (m, mesh) = tridiag(10, None);
        let comm = SerialComm;
        let sys = LinearSystem::uncoupled(&m, &mesh, &comm).unwrap();
        let b = vec![1.0; 10];
        let mut c = controls(SolverKind::Smooth, PreconditionerKind::None);
        c.smoother = SmootherKind::SymGaussSeidel;
        c.n_sweeps = 2;
        c.criteria.tolerance = 1e-10;
        let mut psi = vec![0.0; 10];
        let perf = SmoothSolver::new(c).solve("x", &sys, &mut psi, &b).unwrap();
        assert!(perf.converged());
        assert_eq!(perf.n_iterations % 2, 0);
        check_solution(&m, &psi, &b);
    }

    #[test]
    fn test_max_iter_zero_leaves_guess() {
        let (m, mesh) = tridiag(5, None);
        let comm = SerialComm;
        let sys = LinearSystem::uncoupled(&m, &mesh, &comm).unwrap();
        let mut c = controls(SolverKind::Pcg, PreconditionerKind::Dic);
        c.criteria.max_iter = 0;
        let mut psi = vec![0.5; 5];
        let perf = PcgSolver::new(c).solve("x", &sys, &mut psi, &[1.0; 5]).unwrap();
        assert_eq!(perf.status, SolverStatus::MaxIterationsReached);
        assert_eq!(perf.n_iterations, 0);
        assert_eq!(psi, vec![0.5; 5]);
    }

    #[test]
    fn test_diagonal_solver() {
        let addr = LduAddressing::new(2, vec![0], vec![1], vec![], 1).unwrap();
        let mesh = LduMesh::uncoupled(addr).unwrap();
        let mut m: LduMatrix = LduMatrix::new(mesh.addressing().clone());
        m.diag_mut().copy_from_slice(&[2.0, 4.0]);
        let comm = SerialComm;
        let sys = LinearSystem::uncoupled(&m, &mesh, &comm).unwrap();
        let mut psi = vec![0.0; 2];
        let perf = DiagonalSolver.solve("x", &sys, &mut psi, &[2.0, 2.0]).unwrap();
        assert_eq!(psi, vec![1.0, 0.5]);
        assert_eq!(perf.n_iterations, 0);

        m.diag_mut()[1] = 0.0;
        let sys = LinearSystem::uncoupled(&m, &mesh, &comm).unwrap();
        assert!(matches!(
            DiagonalSolver.solve("x", &sys, &mut psi, &[2.0, 2.0]),
            Err(FvError::NonFinite { .. })
        ));
    }
}
