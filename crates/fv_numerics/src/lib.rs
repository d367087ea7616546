// crates/fv_numerics/src/lib.rs

//! Finvol 数值核心
//!
//! 从非结构网格的面连接关系导出 LDU 稀疏寻址，把有限体积算子装配成线性系统，
//! 并用迭代求解器求解。多分区运行时，耦合界面按预先计算的调度交换数据。
//!
//! # 模块概览
//!
//! - [`ldu`]: LDU 寻址、耦合界面与界面调度
//! - [`parallel`]: 分区通信器
//! - [`matrix`]: LDU 矩阵与带界面的线性系统
//! - [`linear_algebra`]: 预条件器、光顺器、迭代求解器与收敛判据
//! - [`fields`]: 体场、面场与多态边界条件
//! - [`mesh`]: 有限体积网格（拓扑 + 几何 + LDU 视图）
//! - [`discretization`]: 隐式 (`fvm`) 与显式 (`fvc`) 离散算子
//! - [`context`]: 一次运行的显式上下文
//! - [`performance_log`]: 求解性能记录
//!
//! # 示例
//!
//! ```
//! use std::collections::BTreeMap;
//! use fv_config::{BoundarySpec, CommsType, LinearSolverControls, Precision};
//! use fv_mesh::BlockMeshGenerator;
//! use fv_numerics::prelude::*;
//!
//! let poly = BlockMeshGenerator::chain(4, 1.0).build().unwrap();
//! let mesh = FvMesh::new(poly, &SerialComm, CommsType::NonBlocking).unwrap();
//! let mut specs = BTreeMap::new();
//! specs.insert("xMin".to_string(), BoundarySpec::fixed_value(0.0));
//! specs.insert("xMax".to_string(), BoundarySpec::fixed_value(1.0));
//! for p in ["yMin", "yMax", "zMin", "zMax"] {
//!     specs.insert(p.to_string(), BoundarySpec::zero_gradient());
//! }
//! let mut t = VolScalarField::uniform("T", &mesh, 0.0, &specs, &PatchFieldRegistry::with_builtins()).unwrap();
//!
//! let mut eqn = fvm::laplacian(&Diffusivity::Uniform(1.0), &t, &mesh, LaplacianScheme::Uncorrected).unwrap();
//! eqn.negate();
//! let controls = resolve_controls(&LinearSolverControls::new("PCG", 1e-10, 100)).unwrap();
//! let perf = eqn.solve(&mut t, &mesh, &SerialComm, &controls, Precision::F64).unwrap();
//! assert!(perf.converged());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod discretization;
pub mod fields;
pub mod ldu;
pub mod linear_algebra;
pub mod matrix;
pub mod mesh;
pub mod parallel;
pub mod performance_log;

/// 当前层级
pub const LAYER: u8 = 3;

pub use context::SimulationContext;
pub use mesh::FvMesh;
pub use performance_log::{PerformanceLog, PerformanceRecord};

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::context::SimulationContext;
    pub use crate::discretization::{fvc, fvm, ConvectionScheme, Diffusivity, FvMatrix, LaplacianScheme};
    pub use crate::fields::{FieldRegistry, PatchField, PatchFieldRegistry, SurfaceScalarField, VolScalarField};
    pub use crate::ldu::{LduAddressing, LduMesh};
    pub use crate::linear_algebra::{resolve_controls, ResolvedControls, SolverPerformance, SolverStatus};
    pub use crate::matrix::{LduMatrix, LinearSystem};
    pub use crate::mesh::FvMesh;
    pub use crate::parallel::{run_partitioned, Communicator, SerialComm, ThreadComm};
    pub use crate::performance_log::PerformanceLog;
}
