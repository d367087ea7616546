// crates/fv_numerics/src/linear_algebra/mod.rs

//! 线性代数：向量运算、预条件器、光顺器与迭代求解器
//!
//! # 架构设计
//!
//! ```text
//! LinearSolverControls ──resolve──> ResolvedControls
//!                                        │
//!                       create_solver ───┤
//!                                        ▼
//!        ┌──────────── Box<dyn LduSolver<S>> ────────────┐
//!        │ PCG / PBiCG / PBiCGStab / smoothSolver / GAMG │
//!        └──────┬──────────────────────────┬─────────────┘
//!               ▼                          ▼
//!      LduPreconditioner<S>          LduSmoother<S>
//! ```
//!
//! 求解器只通过 [`LinearSystem`](crate::matrix::LinearSystem) 访问矩阵、界面与通信器。

pub mod gamg;
pub mod performance;
pub mod preconditioner;
pub mod registry;
pub mod smoother;
pub mod solver;
pub mod vector_ops;

// 求解器
pub use gamg::{build_hierarchy, CoarseLevel, GamgSolver};
pub use solver::{DiagonalSolver, LduSolver, PbicgSolver, PbicgStabSolver, PcgSolver, SmoothSolver};

// 预条件与光顺
pub use preconditioner::{
    DiagonalPreconditioner, DicPreconditioner, DiluPreconditioner, LduPreconditioner, NoPreconditioner,
};
pub use smoother::{
    CorrectionSmoother, DicSmoother, DiluSmoother, GaussSeidelSmoother, LduSmoother, SymGaussSeidelSmoother,
};

// 选择与性能
pub use performance::{ConvergenceCriteria, ConvergenceMonitor, SolverPerformance, SolverStatus};
pub use registry::{
    create_preconditioner, create_smoother, create_solver, preconditioners, resolve_controls, smoothers, solvers,
    MatrixSupport, PreconditionerKind, Registry, ResolvedControls, SmootherKind, SolverKind,
};

pub use vector_ops::{g_average, g_max_mag, g_sum, g_sum_mag, g_sum_prod, g_sum_sqr};
