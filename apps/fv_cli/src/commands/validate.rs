// apps/fv_cli/src/commands/validate.rs

//! 配置验证命令
//!
//! 解析 JSON 配置，检查参数范围与名称选择，并在生成的网格上试建所有场。

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Args;
use fv_config::CaseConfig;
use fv_mesh::BlockMeshGenerator;
use fv_numerics::discretization::LaplacianScheme;
use fv_numerics::linear_algebra::resolve_controls;
use fv_numerics::parallel::SerialComm;
use fv_numerics::SimulationContext;
use tracing::{error, info, warn};

/// 验证参数
#[derive(Args)]
pub struct ValidateArgs {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: PathBuf,

    /// 严格模式（警告也视为错误）
    #[arg(long)]
    pub strict: bool,
}

/// 验证结果
#[derive(Default)]
struct ValidationResult {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationResult {
    fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn is_ok(&self, strict: bool) -> bool {
        self.errors.is_empty() && (!strict || self.warnings.is_empty())
    }
}

/// 执行验证命令
pub fn execute(args: ValidateArgs) -> Result<()> {
    info!("=== Finvol 配置验证 ===");
    let mut result = ValidationResult::default();

    if let Some(config) = parse_config(&args.config, &mut result) {
        check_config(&config, &mut result);
        if result.errors.is_empty() {
            dry_run(config, &mut result);
        }
    }

    for w in &result.warnings {
        warn!("{}", w);
    }
    for e in &result.errors {
        error!("{}", e);
    }
    if !result.is_ok(args.strict) {
        bail!(
            "配置验证失败: {} 个错误, {} 个警告",
            result.errors.len(),
            result.warnings.len()
        );
    }
    println!("✓ {} 有效", args.config.display());
    Ok(())
}

fn parse_config(path: &Path, result: &mut ValidationResult) -> Option<CaseConfig> {
    match CaseConfig::from_file(path) {
        Ok(config) => Some(config),
        Err(e) => {
            result.add_error(format!("{}: {}", path.display(), e));
            None
        }
    }
}

fn check_config(config: &CaseConfig, result: &mut ValidationResult) {
    if let Err(e) = config.validate() {
        result.add_error(e.to_string());
    }

    for (key, controls) in &config.solvers {
        if let Err(e) = resolve_controls(controls) {
            result.add_error(format!("solvers.{}: {}", key, e));
        }
        let used = config
            .fields
            .keys()
            .any(|f| config.controls_key(f) == Some(key.as_str()));
        if !used {
            result.add_warning(format!("solvers.{} 未被任何场使用", key));
        }
        if controls.max_iter < controls.min_iter {
            result.add_warning(format!(
                "solvers.{}: maxIter {} 小于 minIter {}，以 minIter 为准",
                key, controls.max_iter, controls.min_iter
            ));
        }
    }

    for (name, field) in &config.fields {
        if config.controls_key(name).is_none() {
            result.add_error(format!("场 '{}' 没有对应的 solvers 条目", name));
        }
        if let Err(e) = field.laplacian_scheme.parse::<LaplacianScheme>() {
            result.add_error(format!("fields.{}.laplacianScheme: {}", name, e));
        }
        if field.diffusivity == 0.0 {
            result.add_warning(format!("场 '{}' 的扩散系数为 0，方程退化", name));
        }
    }
}

/// 在生成的网格上初始化一次上下文，检查边界条件与面片名称
fn dry_run(config: CaseConfig, result: &mut ValidationResult) {
    let poly = match BlockMeshGenerator::new(config.mesh.cells, config.mesh.lengths).build() {
        Ok(poly) => poly,
        Err(e) => {
            result.add_error(format!("网格生成失败: {}", e));
            return;
        }
    };
    if config.decomposition.n_procs > poly.n_cells() {
        result.add_error(format!(
            "decomposition.nProcs = {} 超过单元数 {}",
            config.decomposition.n_procs,
            poly.n_cells()
        ));
    }
    match SimulationContext::init(config, poly, Box::new(SerialComm)) {
        Ok(ctx) => {
            println!(
                "  ✓ {} 个场在 {} 单元的网格上初始化成功",
                ctx.fields().len(),
                ctx.mesh().n_cells()
            );
        }
        Err(e) => result.add_error(format!("初始化失败: {}", e)),
    }
}
