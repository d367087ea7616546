// crates/fv_config/src/solver_controls.rs

//! 线性求解器控制参数（全 f64）
//!
//! 求解器、预条件器与光顺器以名称给出，在算例初始化时由数值层的
//! 名称注册表一次性解析，未知名称在那里报错。

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 单个场的线性求解控制
///
/// JSON 示例:
///
/// ```json
/// { "solver": "PCG", "preconditioner": "DIC", "tolerance": 1e-8, "relTol": 0.0, "maxIter": 500 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearSolverControls {
    /// 求解器名称（PCG, PBiCG, PBiCGStab, smoothSolver, GAMG, diagonal）
    #[serde(default = "default_solver")]
    pub solver: String,

    /// 预条件器名称（none, diagonal, DIC, DILU）
    #[serde(default = "default_preconditioner")]
    pub preconditioner: String,

    /// 光顺器名称（GaussSeidel, symGaussSeidel, DIC, DILU），smoothSolver 与 GAMG 使用
    #[serde(default = "default_smoother")]
    pub smoother: String,

    /// 绝对残差容差
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// 相对初始残差的容差，0 表示不启用
    #[serde(default)]
    pub rel_tol: f64,

    /// 最大迭代次数
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,

    /// 最小迭代次数
    #[serde(default)]
    pub min_iter: usize,

    /// 每次光顺的扫掠次数
    #[serde(default = "default_n_sweeps")]
    pub n_sweeps: usize,

    /// 解变化量容差（单次迭代的最大 |Δx|），0 表示不启用
    #[serde(default)]
    pub solution_tolerance: f64,

    /// 发散检测
    #[serde(default)]
    pub divergence: DivergenceControls,

    /// GAMG 参数
    #[serde(default)]
    pub gamg: GamgControls,

    /// 是否输出逐次迭代残差
    #[serde(default)]
    pub verbose: bool,
}

fn default_solver() -> String { "PCG".to_string() }
fn default_preconditioner() -> String { "DIC".to_string() }
fn default_smoother() -> String { "GaussSeidel".to_string() }
fn default_tolerance() -> f64 { 1e-6 }
fn default_max_iter() -> usize { 1000 }
fn default_n_sweeps() -> usize { 1 }

impl Default for LinearSolverControls {
    fn default() -> Self {
        Self {
            solver: default_solver(),
            preconditioner: default_preconditioner(),
            smoother: default_smoother(),
            tolerance: default_tolerance(),
            rel_tol: 0.0,
            max_iter: default_max_iter(),
            min_iter: 0,
            n_sweeps: default_n_sweeps(),
            solution_tolerance: 0.0,
            divergence: DivergenceControls::default(),
            gamg: GamgControls::default(),
            verbose: false,
        }
    }
}

impl LinearSolverControls {
    /// 以求解器名称与容差创建
    pub fn new(solver: impl Into<String>, tolerance: f64, max_iter: usize) -> Self {
        Self {
            solver: solver.into(),
            tolerance,
            max_iter,
            ..Default::default()
        }
    }

    /// 设置预条件器
    pub fn with_preconditioner(mut self, name: impl Into<String>) -> Self {
        self.preconditioner = name.into();
        self
    }

    /// 设置光顺器
    pub fn with_smoother(mut self, name: impl Into<String>) -> Self {
        self.smoother = name.into();
        self
    }

    /// 设置相对容差
    pub fn with_rel_tol(mut self, rel_tol: f64) -> Self {
        self.rel_tol = rel_tol;
        self
    }

    /// 设置发散检测参数
    pub fn with_divergence(mut self, factor: f64, consecutive: usize) -> Self {
        self.divergence = DivergenceControls { factor, consecutive };
        self
    }

    /// 启用详细输出
    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }

    /// 验证参数范围
    pub fn validate(&self, key: &str) -> Result<(), ConfigError> {
        if self.solver.trim().is_empty() {
            return Err(ConfigError::invalid(format!("{key}.solver"), "", "求解器名称不能为空"));
        }
        if !(self.tolerance >= 0.0) {
            return Err(ConfigError::invalid(
                format!("{key}.tolerance"),
                self.tolerance,
                "容差必须非负",
            ));
        }
        if !(0.0..1.0).contains(&self.rel_tol) {
            return Err(ConfigError::invalid(
                format!("{key}.relTol"),
                self.rel_tol,
                "相对容差必须在 [0, 1) 范围内",
            ));
        }
        if self.n_sweeps == 0 {
            return Err(ConfigError::invalid(format!("{key}.nSweeps"), 0, "扫掠次数至少为 1"));
        }
        if !(self.solution_tolerance >= 0.0) {
            return Err(ConfigError::invalid(
                format!("{key}.solutionTolerance"),
                self.solution_tolerance,
                "解变化量容差必须非负",
            ));
        }
        self.divergence.validate(key)?;
        self.gamg.validate(key)
    }
}

/// 发散检测参数
///
/// 残差连续 `consecutive` 次迭代超过初始残差的 `factor` 倍时判定发散。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DivergenceControls {
    /// 相对初始残差的增长倍数
    #[serde(default = "default_divergence_factor")]
    pub factor: f64,
    /// 连续超限的迭代次数
    #[serde(default = "default_divergence_consecutive")]
    pub consecutive: usize,
}

fn default_divergence_factor() -> f64 { 1e5 }
fn default_divergence_consecutive() -> usize { 3 }

impl Default for DivergenceControls {
    fn default() -> Self {
        Self {
            factor: default_divergence_factor(),
            consecutive: default_divergence_consecutive(),
        }
    }
}

impl DivergenceControls {
    fn validate(&self, key: &str) -> Result<(), ConfigError> {
        if !(self.factor > 1.0) {
            return Err(ConfigError::invalid(
                format!("{key}.divergence.factor"),
                self.factor,
                "发散倍数必须大于 1",
            ));
        }
        if self.consecutive == 0 {
            return Err(ConfigError::invalid(
                format!("{key}.divergence.consecutive"),
                0,
                "连续次数至少为 1",
            ));
        }
        Ok(())
    }
}

/// GAMG 多重网格参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamgControls {
    /// 最粗层的目标单元数
    #[serde(default = "default_coarsest_cells")]
    pub n_cells_in_coarsest_level: usize,
    /// 最大层数（含最细层）
    #[serde(default = "default_max_levels")]
    pub max_levels: usize,
    /// 前光顺次数
    #[serde(default)]
    pub n_pre_sweeps: usize,
    /// 后光顺次数
    #[serde(default = "default_post_sweeps")]
    pub n_post_sweeps: usize,
    /// 最粗层求解的最大迭代次数
    #[serde(default = "default_coarsest_max_iter")]
    pub coarsest_max_iter: usize,
}

fn default_coarsest_cells() -> usize { 10 }
fn default_max_levels() -> usize { 50 }
fn default_post_sweeps() -> usize { 2 }
fn default_coarsest_max_iter() -> usize { 200 }

impl Default for GamgControls {
    fn default() -> Self {
        Self {
            n_cells_in_coarsest_level: default_coarsest_cells(),
            max_levels: default_max_levels(),
            n_pre_sweeps: 0,
            n_post_sweeps: default_post_sweeps(),
            coarsest_max_iter: default_coarsest_max_iter(),
        }
    }
}

impl GamgControls {
    fn validate(&self, key: &str) -> Result<(), ConfigError> {
        if self.n_cells_in_coarsest_level == 0 {
            return Err(ConfigError::invalid(
                format!("{key}.gamg.nCellsInCoarsestLevel"),
                0,
                "最粗层单元数至少为 1",
            ));
        }
        if self.max_levels == 0 {
            return Err(ConfigError::invalid(format!("{key}.gamg.maxLevels"), 0, "层数至少为 1"));
        }
        if self.n_pre_sweeps + self.n_post_sweeps == 0 {
            return Err(ConfigError::invalid(
                format!("{key}.gamg.nPostSweeps"),
                0,
                "前后光顺次数不能同时为 0",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let c: LinearSolverControls = serde_json::from_str("{}").unwrap();
        assert_eq!(c, LinearSolverControls::default());
        assert_eq!(c.max_iter, 1000);
        assert_eq!(c.tolerance, 1e-6);
        assert!(c.validate("T").is_ok());
    }

    #[test]
    fn test_camel_case_keys() {
        let json = r#"{ "solver": "GAMG", "relTol": 0.01, "maxIter": 20,
                        "gamg": { "nCellsInCoarsestLevel": 4 } }"#;
        let c: LinearSolverControls = serde_json::from_str(json).unwrap();
        assert_eq!(c.solver, "GAMG");
        assert_eq!(c.rel_tol, 0.01);
        assert_eq!(c.max_iter, 20);
        assert_eq!(c.gamg.n_cells_in_coarsest_level, 4);
        assert_eq!(c.gamg.n_post_sweeps, 2);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let c = LinearSolverControls::new("PCG", -1.0, 10);
        assert!(c.validate("p").is_err());

        let c = LinearSolverControls::default().with_rel_tol(1.5);
        assert!(c.validate("p").is_err());

        let c = LinearSolverControls::default().with_divergence(0.5, 3);
        let err = c.validate("p").unwrap_err();
        assert!(err.to_string().contains("divergence.factor"));
    }
}
