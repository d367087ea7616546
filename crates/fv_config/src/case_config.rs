// crates/fv_config/src/case_config.rs

//! CaseConfig - 算例配置
//!
//! 汇集通信方式、求解精度、各场的线性求解控制和边界条件声明，
//! 以及演示算例使用的块网格与分区参数。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ConfigError;
use crate::precision::Precision;
use crate::solver_controls::LinearSolverControls;

/// 耦合界面的通信方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommsType {
    /// 先全部发送，再按界面顺序逐个接收
    Blocking,
    /// 按预先计算的通信轮次成对交换
    Scheduled,
    /// 发送与接收分离，全部发送后统一接收
    #[default]
    NonBlocking,
}

impl CommsType {
    /// 名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Blocking => "blocking",
            Self::Scheduled => "scheduled",
            Self::NonBlocking => "nonBlocking",
        }
    }
}

impl std::fmt::Display for CommsType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for CommsType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blocking" => Ok(Self::Blocking),
            "scheduled" => Ok(Self::Scheduled),
            "nonBlocking" | "nonblocking" => Ok(Self::NonBlocking),
            other => Err(format!(
                "未知通信方式 '{}'，可选: blocking, scheduled, nonBlocking",
                other
            )),
        }
    }
}

/// 单个边界面片的边界条件声明
///
/// `type` 为边界条件名称，由数值层的边界条件注册表解析。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundarySpec {
    /// 边界条件类型名
    #[serde(rename = "type")]
    pub kind: String,
    /// 固定值
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// 法向梯度
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gradient: Option<f64>,
    /// 混合边界的参考值
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_value: Option<f64>,
    /// 混合边界的参考梯度
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_gradient: Option<f64>,
    /// 混合边界的值权重 [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_fraction: Option<f64>,
}

impl BoundarySpec {
    /// 指定类型名
    pub fn of_type(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Default::default()
        }
    }

    /// 固定值边界
    pub fn fixed_value(value: f64) -> Self {
        Self {
            value: Some(value),
            ..Self::of_type("fixedValue")
        }
    }

    /// 固定梯度边界
    pub fn fixed_gradient(gradient: f64) -> Self {
        Self {
            gradient: Some(gradient),
            ..Self::of_type("fixedGradient")
        }
    }

    /// 零梯度边界
    pub fn zero_gradient() -> Self {
        Self::of_type("zeroGradient")
    }
}

/// 标量场声明
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldConfig {
    /// 初始内部值
    #[serde(default)]
    pub initial: f64,
    /// 扩散系数
    #[serde(default = "default_diffusivity")]
    pub diffusivity: f64,
    /// 体积源项
    #[serde(default)]
    pub source: f64,
    /// 各边界面片的边界条件，键为面片名
    #[serde(default)]
    pub boundary: BTreeMap<String, BoundarySpec>,
    /// 拉普拉斯格式名称（`corrected` / `uncorrected`）
    #[serde(default = "default_laplacian_scheme")]
    pub laplacian_scheme: String,
    /// 亚松弛因子，1 表示不松弛
    #[serde(default = "default_relaxation_factor")]
    pub relaxation_factor: f64,
}

fn default_diffusivity() -> f64 { 1.0 }
fn default_laplacian_scheme() -> String { "corrected".to_string() }
fn default_relaxation_factor() -> f64 { 1.0 }

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            initial: 0.0,
            diffusivity: default_diffusivity(),
            source: 0.0,
            boundary: BTreeMap::new(),
            laplacian_scheme: default_laplacian_scheme(),
            relaxation_factor: default_relaxation_factor(),
        }
    }
}

/// 块网格参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockMeshConfig {
    /// 三个方向的单元数
    #[serde(default = "default_cells")]
    pub cells: [usize; 3],
    /// 三个方向的长度
    #[serde(default = "default_lengths")]
    pub lengths: [f64; 3],
}

fn default_cells() -> [usize; 3] { [20, 1, 1] }
fn default_lengths() -> [f64; 3] { [1.0, 0.1, 0.1] }

impl Default for BlockMeshConfig {
    fn default() -> Self {
        Self {
            cells: default_cells(),
            lengths: default_lengths(),
        }
    }
}

/// 分区参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecompositionConfig {
    /// 分区数
    #[serde(default = "default_n_procs")]
    pub n_procs: usize,
    /// 按坐标切分的方向（0=x, 1=y, 2=z）
    #[serde(default)]
    pub axis: usize,
}

fn default_n_procs() -> usize { 1 }

impl Default for DecompositionConfig {
    fn default() -> Self {
        Self {
            n_procs: default_n_procs(),
            axis: 0,
        }
    }
}

/// 算例配置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseConfig {
    /// 线性求解精度
    #[serde(default)]
    pub precision: Precision,

    /// 耦合界面通信方式
    #[serde(default)]
    pub comms_type: CommsType,

    /// 线性求解控制，键为场名；支持 `a|b` 多名称键与 `*` 通配键
    #[serde(default)]
    pub solvers: BTreeMap<String, LinearSolverControls>,

    /// 标量场声明，键为场名
    #[serde(default)]
    pub fields: BTreeMap<String, FieldConfig>,

    /// 块网格参数
    #[serde(default)]
    pub mesh: BlockMeshConfig,

    /// 分区参数
    #[serde(default)]
    pub decomposition: DecompositionConfig,
}

impl CaseConfig {
    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&content)
    }

    /// 从 JSON 字符串加载配置
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: CaseConfig =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 序列化为格式化 JSON
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, controls) in &self.solvers {
            controls.validate(&format!("solvers.{key}"))?;
        }

        for (name, field) in &self.fields {
            if !(field.diffusivity > 0.0) {
                return Err(ConfigError::invalid(
                    format!("fields.{name}.diffusivity"),
                    field.diffusivity,
                    "扩散系数必须为正",
                ));
            }
            if !(field.relaxation_factor > 0.0 && field.relaxation_factor <= 1.0) {
                return Err(ConfigError::invalid(
                    format!("fields.{name}.relaxationFactor"),
                    field.relaxation_factor,
                    "必须在 (0, 1] 内",
                ));
            }
            for (patch, spec) in &field.boundary {
                if spec.kind.trim().is_empty() {
                    return Err(ConfigError::invalid(
                        format!("fields.{name}.boundary.{patch}.type"),
                        "",
                        "边界条件类型不能为空",
                    ));
                }
            }
        }

        if self.mesh.cells.iter().any(|&n| n == 0) {
            return Err(ConfigError::invalid(
                "mesh.cells",
                format!("{:?}", self.mesh.cells),
                "每个方向至少 1 个单元",
            ));
        }
        if self.mesh.lengths.iter().any(|&l| !(l > 0.0)) {
            return Err(ConfigError::invalid(
                "mesh.lengths",
                format!("{:?}", self.mesh.lengths),
                "长度必须为正",
            ));
        }
        if self.decomposition.n_procs == 0 {
            return Err(ConfigError::invalid("decomposition.nProcs", 0, "分区数至少为 1"));
        }
        if self.decomposition.axis > 2 {
            return Err(ConfigError::invalid(
                "decomposition.axis",
                self.decomposition.axis,
                "方向必须为 0, 1 或 2",
            ));
        }
        Ok(())
    }

    /// 查找场的求解控制
    ///
    /// 依次匹配：精确键、`a|b` 形式的多名称键、`*` 通配键。
    pub fn controls_for(&self, field: &str) -> Result<&LinearSolverControls, ConfigError> {
        self.controls_key(field)
            .and_then(|key| self.solvers.get(key))
            .ok_or_else(|| ConfigError::Missing(format!("solvers.{field}")))
    }

    /// 场对应的求解器配置键：精确匹配, 然后 `a|b` 形式, 最后 `*`
    pub fn controls_key(&self, field: &str) -> Option<&str> {
        if let Some((key, _)) = self.solvers.get_key_value(field) {
            return Some(key.as_str());
        }
        if let Some(key) = self
            .solvers
            .keys()
            .find(|key| key.contains('|') && key.split('|').any(|k| k.trim() == field))
        {
            return Some(key.as_str());
        }
        self.solvers.get_key_value("*").map(|(key, _)| key.as_str())
    }
}
