// crates/fv_config/src/lib.rs

//! Finvol Config Layer
//!
//! 配置层，提供线性求解控制、通信方式、精度选择与算例声明。
//! 本层不含泛型，数值均以 f64 存储。
//!
//! # 模块概览
//!
//! - [`precision`]: Precision 枚举（F32/F64）
//! - [`solver_controls`]: 单个场的线性求解控制
//! - [`case_config`]: 算例配置与 JSON 加载
//! - [`error`]: 配置错误类型

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod case_config;
pub mod error;
pub mod precision;
pub mod solver_controls;

/// 层级标识
pub const LAYER: u8 = 2;

pub use case_config::{
    BlockMeshConfig, BoundarySpec, CaseConfig, CommsType, DecompositionConfig, FieldConfig,
};
pub use error::ConfigError;
pub use precision::Precision;
pub use solver_controls::{DivergenceControls, GamgControls, LinearSolverControls};
