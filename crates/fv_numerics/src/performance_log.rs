// crates/fv_numerics/src/performance_log.rs

//! 求解性能记录
//!
//! 按场名汇总每次线性求解的初始残差、最终残差与迭代次数，供运行结束后输出表格或 JSON。

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use fv_foundation::{FvError, FvResult};
use serde::Serialize;

use crate::linear_algebra::{SolverPerformance, SolverStatus};

/// 单次求解记录
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceRecord {
    /// 时间步编号
    pub time_index: usize,
    /// 求解器名称
    pub solver: String,
    /// 初始残差
    pub initial_residual: f64,
    /// 最终残差
    pub final_residual: f64,
    /// 迭代次数
    pub n_iterations: usize,
    /// 终止状态
    pub status: SolverStatus,
}

/// 性能日志
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct PerformanceLog {
    fields: BTreeMap<String, Vec<PerformanceRecord>>,
}

impl PerformanceLog {
    /// 空日志
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一次求解结果
    pub fn record(&mut self, time_index: usize, perf: &SolverPerformance) {
        self.fields
            .entry(perf.field_name.clone())
            .or_default()
            .push(PerformanceRecord {
                time_index,
                solver: perf.solver_name.clone(),
                initial_residual: perf.initial_residual,
                final_residual: perf.final_residual,
                n_iterations: perf.n_iterations,
                status: perf.status,
            });
    }

    /// 某个场的全部记录
    pub fn for_field(&self, field: &str) -> &[PerformanceRecord] {
        self.fields.get(field).map_or(&[], Vec::as_slice)
    }

    /// 某个场的最近一次记录
    pub fn latest(&self, field: &str) -> Option<&PerformanceRecord> {
        self.for_field(field).last()
    }

    /// 有记录的场名
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// 记录总数
    pub fn len(&self) -> usize {
        self.fields.values().map(Vec::len).sum()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 是否有未收敛的求解
    pub fn has_failures(&self) -> bool {
        self.fields
            .values()
            .flatten()
            .any(|r| r.status != SolverStatus::Converged)
    }

    /// 文本表格
    pub fn render_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<10} {:>6} {:<14} {:>14} {:>14} {:>6}  {}",
            "field", "step", "solver", "initial", "final", "iters", "status"
        );
        for (field, rows) in &self.fields {
            for r in rows {
                let _ = writeln!(
                    out,
                    "{:<10} {:>6} {:<14} {:>14.6e} {:>14.6e} {:>6}  {}",
                    field, r.time_index, r.solver, r.initial_residual, r.final_residual, r.n_iterations, r.status
                );
            }
        }
        out
    }

    /// JSON 文本
    pub fn to_json(&self) -> FvResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| FvError::io_with_source("序列化性能日志失败", e.into()))
    }

    /// 写入 JSON 文件
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> FvResult<()> {
        let path = path.as_ref();
        let json = self.to_json()?;
        std::fs::write(path, json)
            .map_err(|e| FvError::io_with_source(format!("写入 {} 失败", path.display()), e))?;
        log::info!("性能日志已写入 {}", path.display());
        Ok(())
    }
}
