// crates/fv_numerics/src/linear_algebra/gamg.rs

//! 几何无关的代数多重网格（GAMG）
//!
//! # 层级构建
//!
//! ```text
//! 细层单元 ──(按 |系数| 最大的邻居两两聚合)──> 粗层单元
//!            ──(Galerkin 求和)──> 粗层矩阵
//! ```
//!
//! 粗层只保留本分区的内部连接，粗层求解使用本地通信器，因此各分区的层数可以不同。
//! 细层的光顺与残差仍然走完整的耦合系统。
//!
//! # V 循环
//!
//! 前光顺 → 限制残差（求和）→ 下一层 → … → 最粗层求解 → 延拓修正（注入）→ 后光顺

use std::collections::BTreeMap;

use fv_foundation::{FvResult, RuntimeScalar};

use super::performance::{ConvergenceCriteria, ConvergenceMonitor, SolverPerformance};
use super::registry::{create_smoother, PreconditionerKind, ResolvedControls, SolverKind};
use super::solver::{check_sizes, initial_residual, LduSolver, PbicgStabSolver, PcgSolver};
use super::vector_ops::g_sum_mag;
use crate::ldu::{LduAddressing, LduMesh};
use crate::matrix::{LduMatrix, LinearSystem};
use crate::parallel::SerialComm;

/// 一个粗层
#[derive(Debug)]
pub struct CoarseLevel<S: RuntimeScalar> {
    mesh: LduMesh,
    matrix: LduMatrix<S>,
    /// 上一层单元 → 本层单元
    restrict_addr: Vec<usize>,
}

impl<S: RuntimeScalar> CoarseLevel<S> {
    /// 单元数
    pub fn n_cells(&self) -> usize {
        self.mesh.n_cells()
    }

    /// 粗层矩阵
    pub fn matrix(&self) -> &LduMatrix<S> {
        &self.matrix
    }

    /// 上一层单元到本层单元的映射
    pub fn restrict_addr(&self) -> &[usize] {
        &self.restrict_addr
    }

    /// 限制：粗层值为所含细层值之和
    fn restrict(&self, fine: &[S], coarse: &mut [S]) {
        coarse.fill(S::ZERO);
        for (&c, &v) in self.restrict_addr.iter().zip(fine) {
            coarse[c] += v;
        }
    }

    /// 延拓：细层值加上所属粗层的修正
    fn prolong_add(&self, coarse: &[S], fine: &mut [S]) {
        for (f, &c) in fine.iter_mut().zip(&self.restrict_addr) {
            *f += coarse[c];
        }
    }
}

/// 两两聚合
///
/// 返回 `(单元 → 聚合编号, 聚合数)`。未配对的单元并入权重最大的已有聚合，
/// 孤立单元单独成为一个聚合。
pub fn agglomerate<S: RuntimeScalar>(matrix: &LduMatrix<S>) -> (Vec<usize>, usize) {
    let addr = matrix.addressing();
    let (l, u) = (addr.lower_addr(), addr.upper_addr());
    let weight = |f: usize| -> S {
        if matrix.is_asymmetric() {
            matrix.upper()[f].abs().max(matrix.lower()[f].abs())
        } else {
            matrix.upper()[f].abs()
        }
    };

    let n = addr.size();
    let mut agg: Vec<Option<usize>> = vec![None; n];
    let mut n_coarse = 0;

    for celli in 0..n {
        if agg[celli].is_some() {
            continue;
        }
        let faces = addr.owned_faces(celli).chain(addr.neighbour_faces(celli));
        let mut best_free: Option<(usize, S)> = None;
        let mut best_taken: Option<(usize, S)> = None;
        for f in faces {
            let other = if l[f] == celli { u[f] } else { l[f] };
            let w = weight(f);
            let slot = if agg[other].is_none() { &mut best_free } else { &mut best_taken };
            if slot.map_or(true, |(_, bw)| w > bw) {
                *slot = Some((other, w));
            }
        }

        match (best_free, best_taken) {
            (Some((other, _)), _) => {
                agg[celli] = Some(n_coarse);
                agg[other] = Some(n_coarse);
                n_coarse += 1;
            }
            (None, Some((other, _))) => {
                agg[celli] = agg[other];
            }
            (None, None) => {
                agg[celli] = Some(n_coarse);
                n_coarse += 1;
            }
        }
    }

    (agg.into_iter().map(|a| a.unwrap_or(0)).collect(), n_coarse)
}

/// 由聚合结果构建粗层
pub fn coarsen<S: RuntimeScalar>(
    matrix: &LduMatrix<S>,
    restrict_addr: Vec<usize>,
    n_coarse: usize,
) -> FvResult<CoarseLevel<S>> {
    let addr = matrix.addressing();
    let (l, u) = (addr.lower_addr(), addr.upper_addr());

    // 粗层面按 (lower, upper) 排序即为上三角顺序
    let mut pairs: BTreeMap<(usize, usize), usize> = BTreeMap::new();
    let mut face_restrict: Vec<Option<(usize, bool)>> = Vec::with_capacity(l.len());
    for f in 0..l.len() {
        let (a, b) = (restrict_addr[l[f]], restrict_addr[u[f]]);
        if a == b {
            face_restrict.push(None);
        } else {
            let key = (a.min(b), a.max(b));
            let next = pairs.len();
            pairs.entry(key).or_insert(next);
            face_restrict.push(Some((next, a > b)));
        }
    }

    // 插入顺序编号 → 排序后编号
    let mut renumber = vec![0; pairs.len()];
    let mut lower = Vec::with_capacity(pairs.len());
    let mut upper = Vec::with_capacity(pairs.len());
    for (sorted, (&(cl, cu), &inserted)) in pairs.iter().enumerate() {
        renumber[inserted] = sorted;
        lower.push(cl);
        upper.push(cu);
    }

    let n_faces = lower.len();
    let coarse_addr = LduAddressing::new(n_coarse, lower, upper, vec![], addr.epoch())?;
    let mesh = LduMesh::uncoupled(coarse_addr)?;

    let mut diag = vec![S::ZERO; n_coarse];
    let mut c_upper = vec![S::ZERO; n_faces];
    let mut c_lower = matrix.is_asymmetric().then(|| vec![S::ZERO; n_faces]);

    for (i, &d) in matrix.diag().iter().enumerate() {
        diag[restrict_addr[i]] += d;
    }
    let (upper, lower) = (matrix.upper(), matrix.lower());
    for (f, fr) in face_restrict.iter().enumerate() {
        match *fr {
            None => diag[restrict_addr[l[f]]] += upper[f] + lower[f],
            Some((inserted, flipped)) => {
                let cf = renumber[inserted];
                match c_lower.as_mut() {
                    Some(cl) if flipped => {
                        c_upper[cf] += lower[f];
                        cl[cf] += upper[f];
                    }
                    Some(cl) => {
                        c_upper[cf] += upper[f];
                        cl[cf] += lower[f];
                    }
                    None => c_upper[cf] += upper[f],
                }
            }
        }
    }

    let coarse = LduMatrix::from_coeffs(mesh.addressing().clone(), diag, c_upper, c_lower)?;
    Ok(CoarseLevel {
        mesh,
        matrix: coarse,
        restrict_addr,
    })
}

/// 构建层级，直到单元数足够少、达到层数上限或聚合不再缩减
pub fn build_hierarchy<S: RuntimeScalar>(
    fine: &LduMatrix<S>,
    n_cells_in_coarsest: usize,
    max_levels: usize,
) -> FvResult<Vec<CoarseLevel<S>>> {
    let mut levels: Vec<CoarseLevel<S>> = Vec::new();
    loop {
        let current = levels.last().map_or(fine, |lvl| &lvl.matrix);
        let n = current.size();
        if n <= n_cells_in_coarsest.max(1) || levels.len() + 1 >= max_levels {
            break;
        }
        let (restrict_addr, n_coarse) = agglomerate(current);
        if n_coarse >= n {
            break;
        }
        let level = coarsen(current, restrict_addr, n_coarse)?;
        levels.push(level);
    }
    Ok(levels)
}

/// 代数多重网格求解器
#[derive(Debug, Clone)]
pub struct GamgSolver {
    controls: ResolvedControls,
}

impl GamgSolver {
    /// 创建
    pub fn new(controls: ResolvedControls) -> Self {
        Self { controls }
    }

    fn coarsest_controls(&self, symmetric: bool) -> ResolvedControls {
        let (solver, preconditioner) = if symmetric {
            (SolverKind::Pcg, PreconditionerKind::Dic)
        } else {
            (SolverKind::PbicgStab, PreconditionerKind::Dilu)
        };
        ResolvedControls {
            solver,
            preconditioner,
            criteria: ConvergenceCriteria {
                tolerance: 0.0,
                rel_tol: 1e-2,
                max_iter: self.controls.gamg.coarsest_max_iter.max(1),
                min_iter: 0,
                solution_tolerance: 0.0,
                ..self.controls.criteria
            },
            verbose: false,
            ..self.controls.clone()
        }
    }

    /// 最粗层求解
    fn solve_coarsest<S: RuntimeScalar>(&self, system: &LinearSystem<'_, S>, x: &mut [S], b: &[S]) -> FvResult<()> {
        let matrix = system.matrix();
        x.fill(S::ZERO);
        if matrix.size() == 1 {
            x[0] = b[0].safe_div(matrix.diag()[0], S::ZERO);
            return Ok(());
        }
        let controls = self.coarsest_controls(!matrix.is_asymmetric());
        let perf = if controls.solver == SolverKind::Pcg {
            PcgSolver::new(controls).solve("coarsest", system, x, b)?
        } else {
            PbicgStabSolver::new(controls).solve("coarsest", system, x, b)?
        };
        log::trace!("GAMG 最粗层: {}", perf.summary());
        Ok(())
    }
}

impl<S: RuntimeScalar> LduSolver<S> for GamgSolver {
    fn name(&self) -> &'static str {
        "GAMG"
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
        let mut perf = SolverPerformance::new("GAMG", field_name);
        if n == 0 {
            return Ok(perf);
        }

        let mut ax = vec![S::ZERO; n];
        let mut r = vec![S::ZERO; n];
        let (norm_factor, initial) = initial_residual(system, psi, source, &mut ax, &mut r)?;
        perf.initial_residual = initial.as_f64();
        perf.final_residual = perf.initial_residual;

        let (mut monitor, status) = ConvergenceMonitor::start(self.controls.criteria, initial)?;
        if let Some(status) = status {
            perf.status = status;
            return Ok(perf);
        }

        let gamg = self.controls.gamg;
        let levels = build_hierarchy(system.matrix(), gamg.n_cells_in_coarsest_level, gamg.max_levels)?;
        log::debug!(
            "GAMG {}: {} 层, 单元数 {:?}",
            field_name,
            levels.len() + 1,
            std::iter::once(n).chain(levels.iter().map(|l| l.n_cells())).collect::<Vec<_>>()
        );

        let serial = SerialComm;
        let coarse_systems = levels
            .iter()
            .map(|lvl| LinearSystem::uncoupled(&lvl.matrix, &lvl.mesh, &serial))
            .collect::<FvResult<Vec<_>>>()?;

        let mut fine_smoother = create_smoother(self.controls.smoother, system)?;
        let mut coarse_smoothers = coarse_systems
            .iter()
            .map(|sys| create_smoother(self.controls.smoother, sys))
            .collect::<FvResult<Vec<_>>>()?;

        let mut xs: Vec<Vec<S>> = levels.iter().map(|l| vec![S::ZERO; l.n_cells()]).collect();
        let mut bs = xs.clone();
        let mut rs = xs.clone();
        let (n_pre, n_post) = (gamg.n_pre_sweeps, gamg.n_post_sweeps.max(1));
        let mut previous = Vec::new();

        let status = loop {
            if monitor.wants_change() {
                previous.clear();
                previous.extend_from_slice(psi);
            }

            // 下行
            if n_pre > 0 {
                fine_smoother.smooth(system, psi, source, n_pre)?;
            }
            if let Some(first) = levels.first() {
                system.residual(psi, source, &mut r)?;
                first.restrict(&r, &mut bs[0]);
            }
            let last = levels.len().saturating_sub(1);
            for k in 0..levels.len() {
                if k == last {
                    self.solve_coarsest(&coarse_systems[k], &mut xs[k], &bs[k])?;
                    break;
                }
                xs[k].fill(S::ZERO);
                if n_pre > 0 {
                    coarse_smoothers[k].smooth(&coarse_systems[k], &mut xs[k], &bs[k], n_pre)?;
                }
                coarse_systems[k].residual(&xs[k], &bs[k], &mut rs[k])?;
                levels[k + 1].restrict(&rs[k], &mut bs[k + 1]);
            }

            // 上行
            for k in (0..levels.len()).rev() {
                if k > 0 {
                    let (lo, hi) = xs.split_at_mut(k);
                    levels[k].prolong_add(&hi[0], &mut lo[k - 1]);
                    coarse_smoothers[k - 1].smooth(&coarse_systems[k - 1], &mut lo[k - 1], &bs[k - 1], n_post)?;
                } else {
                    levels[0].prolong_add(&xs[0], psi);
                }
            }
            fine_smoother.smooth(system, psi, source, n_post)?;

            system.residual(psi, source, &mut r)?;
            let residual = g_sum_mag(comm, &r)? / norm_factor;
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
            if self.controls.verbose {
                log::trace!("GAMG {} 第 {} 次 V 循环: 残差 = {:e}", field_name, monitor.n_iterations() + 1, residual.as_f64());
            }
            if let Some(status) = monitor.update(1, residual, change)? {
                break status;
            }
        };

        perf.n_iterations = monitor.n_iterations();
        perf.status = status;
        Ok(perf)
    }
}
