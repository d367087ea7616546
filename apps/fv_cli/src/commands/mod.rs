// apps/fv_cli/src/commands/mod.rs

//! 子命令

pub mod info;
pub mod run;
pub mod validate;

use std::path::Path;

use anyhow::{Context, Result};
use fv_config::CaseConfig;

/// 读取配置文件，未指定时使用内置的单链算例
pub fn load_case(path: Option<&Path>) -> Result<CaseConfig> {
    match path {
        Some(p) => CaseConfig::from_file(p).with_context(|| format!("无法加载配置文件 {}", p.display())),
        None => Ok(builtin_case()),
    }
}

/// 内置算例：一维链，左右两端固定值
pub fn builtin_case() -> CaseConfig {
    use fv_config::{BoundarySpec, FieldConfig, LinearSolverControls};

    let mut config = CaseConfig::default();
    config
        .solvers
        .insert("T".to_string(), LinearSolverControls::new("PCG", 1e-8, 500));
    let mut field = FieldConfig::default();
    field.boundary.insert("xMin".to_string(), BoundarySpec::fixed_value(1.0));
    field.boundary.insert("xMax".to_string(), BoundarySpec::fixed_value(3.0));
    for p in ["yMin", "yMax", "zMin", "zMax"] {
        field.boundary.insert(p.to_string(), BoundarySpec::zero_gradient());
    }
    config.fields.insert("T".to_string(), field);
    config
}
