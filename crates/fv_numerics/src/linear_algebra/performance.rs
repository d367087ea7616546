// crates/fv_numerics/src/linear_algebra/performance.rs

//! 求解性能与收敛判定
//!
//! 迭代状态机：
//!
//! ```text
//! 初始残差 ──> 已收敛? ──是──> Converged (0 次迭代)
//!                │否
//!                ▼
//!             迭代 ──> 收敛 ──> Converged
//!                 ├──> 连续增长超过阈值 ──> Diverged
//!                 ├──> 数值崩溃 ──> Stagnated
//!                 └──> 达到上限 ──> MaxIterationsReached
//! ```
//!
//! 非有限残差不是状态而是错误（[`FvError::NonFinite`]）。

use fv_config::LinearSolverControls;
use fv_foundation::{FvError, FvResult, RuntimeScalar};
use serde::Serialize;

/// 求解终止状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SolverStatus {
    /// 达到容差
    Converged,
    /// 达到最大迭代次数
    MaxIterationsReached,
    /// 残差持续增长
    Diverged,
    /// 数值崩溃（如 `pᵀAp ≈ 0`），无法继续迭代
    Stagnated,
}

impl SolverStatus {
    /// 名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Converged => "converged",
            Self::MaxIterationsReached => "maxIterationsReached",
            Self::Diverged => "diverged",
            Self::Stagnated => "stagnated",
        }
    }
}

impl std::fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 一次求解的性能记录
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolverPerformance {
    /// 求解器名称
    pub solver_name: String,
    /// 场名称
    pub field_name: String,
    /// 初始归一化残差
    pub initial_residual: f64,
    /// 最终归一化残差
    pub final_residual: f64,
    /// 迭代次数
    pub n_iterations: usize,
    /// 终止状态
    pub status: SolverStatus,
}

impl SolverPerformance {
    /// 创建未迭代的记录
    pub fn new(solver_name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            solver_name: solver_name.into(),
            field_name: field_name.into(),
            initial_residual: 0.0,
            final_residual: 0.0,
            n_iterations: 0,
            status: SolverStatus::Converged,
        }
    }

    /// 是否收敛
    pub fn converged(&self) -> bool {
        self.status == SolverStatus::Converged
    }

    /// 标准日志行
    pub fn summary(&self) -> String {
        format!(
            "{}:  Solving for {}, Initial residual = {:e}, Final residual = {:e}, No Iterations {}",
            self.solver_name, self.field_name, self.initial_residual, self.final_residual, self.n_iterations
        )
    }

    /// 按状态输出日志
    pub fn log(&self) {
        match self.status {
            SolverStatus::Converged | SolverStatus::MaxIterationsReached => log::info!("{}", self.summary()),
            SolverStatus::Diverged | SolverStatus::Stagnated => {
                log::warn!("{} ({})", self.summary(), self.status)
            }
        }
    }
}

/// 收敛判据
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceCriteria {
    /// 绝对容差
    pub tolerance: f64,
    /// 相对容差（0 表示不用）
    pub rel_tol: f64,
    /// 最大迭代次数
    pub max_iter: usize,
    /// 最小迭代次数
    pub min_iter: usize,
    /// 解变化量容差（0 表示不用）
    pub solution_tolerance: f64,
    /// 发散倍数
    pub divergence_factor: f64,
    /// 连续超过倍数的迭代次数
    pub divergence_consecutive: usize,
}

impl ConvergenceCriteria {
    /// 从求解控制构造
    pub fn from_controls(controls: &LinearSolverControls) -> Self {
        Self {
            tolerance: controls.tolerance,
            rel_tol: controls.rel_tol,
            max_iter: controls.max_iter,
            min_iter: controls.min_iter,
            solution_tolerance: controls.solution_tolerance,
            divergence_factor: controls.divergence.factor,
            divergence_consecutive: controls.divergence.consecutive,
        }
    }

    /// 残差是否满足容差
    pub fn is_converged(&self, initial: f64, residual: f64) -> bool {
        residual < self.tolerance || (self.rel_tol > 0.0 && residual < self.rel_tol * initial)
    }
}

impl Default for ConvergenceCriteria {
    fn default() -> Self {
        Self::from_controls(&LinearSolverControls::default())
    }
}

/// 迭代收敛监视器
#[derive(Debug, Clone)]
pub struct ConvergenceMonitor {
    criteria: ConvergenceCriteria,
    initial: f64,
    n_iterations: usize,
    growth_count: usize,
}

impl ConvergenceMonitor {
    /// 以初始残差开始
    ///
    /// 返回 `Some(status)` 表示无需迭代。
    pub fn start<S: RuntimeScalar>(
        criteria: ConvergenceCriteria,
        initial: S,
    ) -> FvResult<(Self, Option<SolverStatus>)> {
        let initial = initial.as_f64();
        if !initial.is_finite() {
            return Err(FvError::non_finite(format!("初始残差 = {}", initial)));
        }
        let monitor = Self {
            criteria,
            initial,
            n_iterations: 0,
            growth_count: 0,
        };
        let status = if criteria.min_iter == 0 && criteria.is_converged(initial, initial) {
            Some(SolverStatus::Converged)
        } else if criteria.max_iter.max(criteria.min_iter) == 0 {
            Some(SolverStatus::MaxIterationsReached)
        } else {
            None
        };
        Ok((monitor, status))
    }

    /// 不做迭代时的快速收敛判断（用于子步提前退出）
    pub fn would_converge<S: RuntimeScalar>(&self, residual: S) -> bool {
        self.n_iterations + 1 >= self.criteria.min_iter && self.criteria.is_converged(self.initial, residual.as_f64())
    }

    /// 记录 `n` 次迭代后的残差
    ///
    /// `max_change` 为本次解的最大变化量（仅在设置了解变化容差时需要）。
    pub fn update<S: RuntimeScalar>(
        &mut self,
        n: usize,
        residual: S,
        max_change: Option<S>,
    ) -> FvResult<Option<SolverStatus>> {
        self.n_iterations += n;
        let residual = residual.as_f64();
        if !residual.is_finite() {
            return Err(FvError::non_finite(format!(
                "第 {} 次迭代残差 = {}",
                self.n_iterations, residual
            )));
        }
        let c = &self.criteria;
        if self.n_iterations >= c.min_iter {
            let small_change = c.solution_tolerance > 0.0
                && max_change.map_or(false, |m| m.as_f64() < c.solution_tolerance);
            if c.is_converged(self.initial, residual) || small_change {
                return Ok(Some(SolverStatus::Converged));
            }
        }
        if self.initial > 0.0 && residual > c.divergence_factor * self.initial {
            self.growth_count += 1;
            if self.growth_count >= c.divergence_consecutive.max(1) {
                return Ok(Some(SolverStatus::Diverged));
            }
        } else {
            self.growth_count = 0;
        }
        if self.n_iterations >= c.max_iter.max(c.min_iter) {
            return Ok(Some(SolverStatus::MaxIterationsReached));
        }
        Ok(None)
    }

    /// 已执行的迭代次数
    pub fn n_iterations(&self) -> usize {
        self.n_iterations
    }

    /// 是否需要计算解变化量
    pub fn wants_change(&self) -> bool {
        self.criteria.solution_tolerance > 0.0
    }

    /// 判据
    pub fn criteria(&self) -> &ConvergenceCriteria {
        &self.criteria
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criteria() -> ConvergenceCriteria {
        ConvergenceCriteria {
            tolerance: 1e-6,
            rel_tol: 0.0,
            max_iter: 10,
            min_iter: 0,
            solution_tolerance: 0.0,
            divergence_factor: 10.0,
            divergence_consecutive: 2,
        }
    }

    #[test]
    fn test_already_converged() {
        let (_, status) = ConvergenceMonitor::start(criteria(), 0.0f64).unwrap();
        assert_eq!(status, Some(SolverStatus::Converged));
    }

    #[test]
    fn test_zero_max_iter() {
        let c = ConvergenceCriteria { max_iter: 0, ..criteria() };
        let (_, status) = ConvergenceMonitor::start(c, 1.0f64).unwrap();
        assert_eq!(status, Some(SolverStatus::MaxIterationsReached));
    }

    #[test]
    fn test_min_iter_forces_iterations() {
        let c = ConvergenceCriteria { min_iter: 2, ..criteria() };
        let (mut m, status) = ConvergenceMonitor::start(c, 0.0f64).unwrap();
        assert_eq!(status, None);
        assert_eq!(m.update(1, 0.0f64, None).unwrap(), None);
        assert_eq!(m.update(1, 0.0f64, None).unwrap(), Some(SolverStatus::Converged));
    }

    #[test]
    fn test_divergence_needs_consecutive_growth() {
        let (mut m, _) = ConvergenceMonitor::start(criteria(), 1.0f64).unwrap();
        assert_eq!(m.update(1, 20.0f64, None).unwrap(), None);
        assert_eq!(m.update(1, 0.5f64, None).unwrap(), None);
        assert_eq!(m.update(1, 20.0f64, None).unwrap(), None);
        assert_eq!(m.update(1, 30.0f64, None).unwrap(), Some(SolverStatus::Diverged));
    }

    #[test]
    fn test_nan_is_error() {
        let (mut m, _) = ConvergenceMonitor::start(criteria(), 1.0f64).unwrap();
        assert!(matches!(m.update(1, f64::NAN, None), Err(FvError::NonFinite { .. })));
        assert!(ConvergenceMonitor::start(criteria(), f64::INFINITY).is_err());
    }

    #[test]
    fn test_rel_tol_and_solution_tolerance() {
        let c = ConvergenceCriteria {
            tolerance: 0.0,
            rel_tol: 0.1,
            solution_tolerance: 1e-3,
            ..criteria()
        };
        let (mut m, _) = ConvergenceMonitor::start(c, 1.0f64).unwrap();
        assert_eq!(m.update(1, 0.5f64, Some(1.0)).unwrap(), None);
        assert_eq!(m.update(1, 0.5f64, Some(1e-4)).unwrap(), Some(SolverStatus::Converged));
        let (mut m, _) = ConvergenceMonitor::start(c, 1.0f64).unwrap();
        assert_eq!(m.update(1, 0.05f64, None).unwrap(), Some(SolverStatus::Converged));
    }

    #[test]
    fn test_summary_format() {
        let mut p = SolverPerformance::new("PCG", "T");
        p.n_iterations = 3;
        assert!(p.summary().starts_with("PCG:  Solving for T, Initial residual = "));
        assert!(p.summary().ends_with("No Iterations 3"));
    }
}
