// crates/fv_numerics/src/linear_algebra/registry.rs

//! 求解器、预条件器与光顺器的名称注册表
//!
//! 配置中的名称在加载时一次性解析为 [`ResolvedControls`]，之后求解只按枚举分派。
//! 未知名称返回 [`FvError::UnknownSelection`]，附带全部有效名称。
//!
//! 每个条目登记其适用的矩阵结构；对称专用的算法（PCG、DIC）用于非对称矩阵时，
//! 在创建时报错并列出对非对称矩阵可用的名称。

use std::collections::HashMap;
use std::sync::OnceLock;

use fv_config::{GamgControls, LinearSolverControls};
use fv_foundation::{FvError, FvResult, RuntimeScalar};

use super::gamg::GamgSolver;
use super::performance::ConvergenceCriteria;
use super::preconditioner::{
    DiagonalPreconditioner, DicPreconditioner, DiluPreconditioner, LduPreconditioner, NoPreconditioner,
};
use super::smoother::{
    DicSmoother, DiluSmoother, GaussSeidelSmoother, LduSmoother, SymGaussSeidelSmoother,
};
use super::solver::{DiagonalSolver, LduSolver, PbicgSolver, PbicgStabSolver, PcgSolver, SmoothSolver};
use crate::matrix::{LduMatrix, LinearSystem};

/// 适用的矩阵结构
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixSupport {
    /// 仅对称
    Symmetric,
    /// 仅非对称
    Asymmetric,
    /// 两者皆可
    Both,
}

impl MatrixSupport {
    /// 是否适用于给定结构
    pub fn accepts(&self, symmetric: bool) -> bool {
        match self {
            Self::Symmetric => symmetric,
            Self::Asymmetric => !symmetric,
            Self::Both => true,
        }
    }
}

/// 求解器种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverKind {
    /// 预条件共轭梯度
    Pcg,
    /// 预条件双共轭梯度
    Pbicg,
    /// 预条件稳定双共轭梯度
    PbicgStab,
    /// 光顺迭代
    Smooth,
    /// 代数多重网格
    Gamg,
    /// 对角直接求解
    Diagonal,
}

/// 预条件器种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreconditionerKind {
    /// 无
    None,
    /// 对角
    Diagonal,
    /// 对角不完全 Cholesky
    Dic,
    /// 对角不完全 LU
    Dilu,
}

/// 光顺器种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmootherKind {
    /// Gauss-Seidel
    GaussSeidel,
    /// 对称 Gauss-Seidel
    SymGaussSeidel,
    /// DIC 修正
    Dic,
    /// DILU 修正
    Dilu,
}

/// 名称注册表
#[derive(Debug)]
pub struct Registry<K: 'static> {
    kind: &'static str,
    table: HashMap<&'static str, (K, MatrixSupport)>,
}

impl<K: Copy + PartialEq> Registry<K> {
    fn new(kind: &'static str, entries: &[(&'static str, K, MatrixSupport)]) -> Self {
        Self {
            kind,
            table: entries.iter().map(|&(name, k, s)| (name, (k, s))).collect(),
        }
    }

    /// 按名称查找
    pub fn lookup(&self, name: &str) -> FvResult<(K, MatrixSupport)> {
        self.table
            .get(name)
            .copied()
            .ok_or_else(|| FvError::unknown_selection(self.kind, name, self.names()))
    }

    /// 全部名称（排序）
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.table.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// 适用于给定结构的名称（排序）
    pub fn names_for(&self, symmetric: bool) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .table
            .iter()
            .filter(|(_, (_, s))| s.accepts(symmetric))
            .map(|(&n, _)| n)
            .collect();
        names.sort_unstable();
        names
    }

    /// 种类对应的注册名称
    pub fn name_of(&self, kind: K) -> &'static str {
        self.table
            .iter()
            .find(|(_, (k, _))| *k == kind)
            .map(|(&n, _)| n)
            .unwrap_or("unknown")
    }

    /// 检查种类是否适用于矩阵结构
    pub fn check_support(&self, kind: K, symmetric: bool) -> FvResult<()> {
        let name = self.name_of(kind);
        let supported = self.table.get(name).map_or(false, |(_, s)| s.accepts(symmetric));
        if supported {
            return Ok(());
        }
        let structure = if symmetric { "symmetric" } else { "asymmetric" };
        Err(FvError::unknown_selection(
            self.kind,
            format!("{} ({} matrix)", name, structure),
            self.names_for(symmetric),
        ))
    }
}

/// 求解器注册表
pub fn solvers() -> &'static Registry<SolverKind> {
    static REGISTRY: OnceLock<Registry<SolverKind>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        Registry::new(
            "solver",
            &[
                ("PCG", SolverKind::Pcg, MatrixSupport::Symmetric),
                ("PBiCG", SolverKind::Pbicg, MatrixSupport::Asymmetric),
                ("PBiCGStab", SolverKind::PbicgStab, MatrixSupport::Both),
                ("smoothSolver", SolverKind::Smooth, MatrixSupport::Both),
                ("GAMG", SolverKind::Gamg, MatrixSupport::Both),
                ("diagonal", SolverKind::Diagonal, MatrixSupport::Both),
            ],
        )
    })
}

/// 预条件器注册表
pub fn preconditioners() -> &'static Registry<PreconditionerKind> {
    static REGISTRY: OnceLock<Registry<PreconditionerKind>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        Registry::new(
            "preconditioner",
            &[
                ("none", PreconditionerKind::None, MatrixSupport::Both),
                ("diagonal", PreconditionerKind::Diagonal, MatrixSupport::Both),
                ("DIC", PreconditionerKind::Dic, MatrixSupport::Symmetric),
                ("DILU", PreconditionerKind::Dilu, MatrixSupport::Both),
            ],
        )
    })
}

/// 光顺器注册表
pub fn smoothers() -> &'static Registry<SmootherKind> {
    static REGISTRY: OnceLock<Registry<SmootherKind>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        Registry::new(
            "smoother",
            &[
                ("GaussSeidel", SmootherKind::GaussSeidel, MatrixSupport::Both),
                ("symGaussSeidel", SmootherKind::SymGaussSeidel, MatrixSupport::Both),
                ("DIC", SmootherKind::Dic, MatrixSupport::Symmetric),
                ("DILU", SmootherKind::Dilu, MatrixSupport::Both),
            ],
        )
    })
}

/// 解析后的求解控制
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedControls {
    /// 求解器
    pub solver: SolverKind,
    /// 预条件器
    pub preconditioner: PreconditionerKind,
    /// 光顺器
    pub smoother: SmootherKind,
    /// 收敛判据
    pub criteria: ConvergenceCriteria,
    /// 每次光顺的扫掠次数
    pub n_sweeps: usize,
    /// 多重网格参数
    pub gamg: GamgControls,
    /// 输出逐次迭代残差
    pub verbose: bool,
}

impl ResolvedControls {
    /// 校验并解析名称
    pub fn resolve(controls: &LinearSolverControls) -> FvResult<Self> {
        controls.validate("solver")?;
        let (solver, _) = solvers().lookup(&controls.solver)?;
        let (preconditioner, _) = preconditioners().lookup(&controls.preconditioner)?;
        let (smoother, _) = smoothers().lookup(&controls.smoother)?;
        Ok(Self {
            solver,
            preconditioner,
            smoother,
            criteria: ConvergenceCriteria::from_controls(controls),
            n_sweeps: controls.n_sweeps.max(1),
            gamg: controls.gamg,
            verbose: controls.verbose,
        })
    }

    /// 求解器名称
    pub fn solver_name(&self) -> &'static str {
        solvers().name_of(self.solver)
    }
}

impl Default for ResolvedControls {
    fn default() -> Self {
        Self {
            solver: SolverKind::Pcg,
            preconditioner: PreconditionerKind::Dic,
            smoother: SmootherKind::GaussSeidel,
            criteria: ConvergenceCriteria::default(),
            n_sweeps: 1,
            gamg: GamgControls::default(),
            verbose: false,
        }
    }
}

/// 解析求解控制（配置加载时调用一次）
pub fn resolve_controls(controls: &LinearSolverControls) -> FvResult<ResolvedControls> {
    ResolvedControls::resolve(controls)
}

/// 创建预条件器
pub fn create_preconditioner<'a, S: RuntimeScalar>(
    kind: PreconditionerKind,
    matrix: &'a LduMatrix<S>,
) -> FvResult<Box<dyn LduPreconditioner<S> + 'a>> {
    preconditioners().check_support(kind, !matrix.is_asymmetric())?;
    Ok(match kind {
        PreconditionerKind::None => Box::new(NoPreconditioner),
        PreconditionerKind::Diagonal => Box::new(DiagonalPreconditioner::new(matrix)),
        PreconditionerKind::Dic => Box::new(DicPreconditioner::new(matrix)),
        PreconditionerKind::Dilu => Box::new(DiluPreconditioner::new(matrix)),
    })
}

/// 创建光顺器
pub fn create_smoother<'a, S: RuntimeScalar>(
    kind: SmootherKind,
    system: &LinearSystem<'a, S>,
) -> FvResult<Box<dyn LduSmoother<S> + 'a>> {
    let matrix = system.matrix();
    smoothers().check_support(kind, !matrix.is_asymmetric())?;
    let n = system.n_cells();
    Ok(match kind {
        SmootherKind::GaussSeidel => Box::new(GaussSeidelSmoother::new(system)),
        SmootherKind::SymGaussSeidel => Box::new(SymGaussSeidelSmoother::new(system)),
        SmootherKind::Dic => Box::new(DicSmoother::new(DicPreconditioner::new(matrix), n)),
        SmootherKind::Dilu => Box::new(DiluSmoother::new(DiluPreconditioner::new(matrix), n)),
    })
}

/// 创建求解器
///
/// 纯对角矩阵总是使用对角求解器。
pub fn create_solver<S: RuntimeScalar>(
    controls: &ResolvedControls,
    matrix: &LduMatrix<S>,
) -> FvResult<Box<dyn LduSolver<S>>> {
    if matrix.is_diagonal() {
        return Ok(Box::new(DiagonalSolver));
    }
    solvers().check_support(controls.solver, !matrix.is_asymmetric())?;
    let c = controls.clone();
    Ok(match controls.solver {
        SolverKind::Pcg => Box::new(PcgSolver::new(c)),
        SolverKind::Pbicg => Box::new(PbicgSolver::new(c)),
        SolverKind::PbicgStab => Box::new(PbicgStabSolver::new(c)),
        SolverKind::Smooth => Box::new(SmoothSolver::new(c)),
        SolverKind::Gamg => Box::new(GamgSolver::new(c)),
        SolverKind::Diagonal => Box::new(DiagonalSolver),
    })
}
