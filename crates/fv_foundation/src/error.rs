// crates/fv_foundation/src/error.rs

//! 错误处理模块，定义统一错误类型
//!
//! 提供 `FvError` 枚举和 `FvResult` 类型别名。
//!
//! # 错误分级
//!
//! - **结构性错误**（致命）: 拓扑错误、装配寻址不匹配、数组尺寸不符、非有限残差。
//!   这些错误表示网格或寻址已经损坏，调用方应立即终止运行。
//! - **可恢复错误**: 配置、边界条件、通信、IO 等。
//!
//! 求解发散与达到最大迭代次数不是错误，它们作为求解性能数据返回。
//!
//! # 示例
//!
//! ```
//! use fv_foundation::error::{FvError, FvResult};
//!
//! fn check_face(owner: usize, neighbour: usize) -> FvResult<()> {
//!     if owner >= neighbour {
//!         return Err(FvError::topology("build_addressing", "owner >= neighbour"));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_face(3, 1).unwrap_err().is_fatal());
//! ```

use thiserror::Error;

/// 统一结果类型
pub type FvResult<T> = Result<T, FvError>;

/// Finvol 错误类型
#[derive(Error, Debug)]
pub enum FvError {
    // ========================================================================
    // 结构性错误（致命）
    // ========================================================================
    /// 拓扑错误：寻址格式错误或不一致
    #[error("拓扑错误 [{operation}]: {details}")]
    Topology {
        /// 触发错误的操作
        operation: &'static str,
        /// 详细信息
        details: String,
    },

    /// 装配寻址不匹配：项的寻址与矩阵的寻址不同
    #[error("装配寻址不匹配 [{operation}]: {details}")]
    AssemblyMismatch {
        /// 触发错误的操作
        operation: &'static str,
        /// 详细信息
        details: String,
    },

    /// 数组大小不匹配
    #[error("数组大小不匹配: {name} 期望{expected}, 实际{actual}")]
    SizeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 索引越界
    #[error("索引越界: {index_type} 索引 {index} 超出范围 0..{len}")]
    IndexOutOfBounds {
        /// 索引类别描述
        index_type: &'static str,
        /// 访问的索引
        index: usize,
        /// 上界（长度）
        len: usize,
    },

    /// 残差或解中出现 NaN/Inf
    #[error("数值异常: {context} 出现非有限值")]
    NonFinite {
        /// 出现位置
        context: String,
    },

    // ========================================================================
    // 可恢复错误
    // ========================================================================
    /// 未知的运行时选择（求解器、预条件器、边界条件类型等）
    #[error("未知的{kind}类型 '{name}'，可选: {valid:?}")]
    UnknownSelection {
        /// 选择类别
        kind: &'static str,
        /// 请求的名称
        name: String,
        /// 可用名称
        valid: Vec<String>,
    },

    /// 配置值无效
    #[error("配置值无效: {key}={value}, 原因: {reason}")]
    InvalidConfig {
        /// 配置键名
        key: String,
        /// 配置值
        value: String,
        /// 无效原因说明
        reason: String,
    },

    /// 边界条件错误
    #[error("边界条件错误 [patch {patch}]: {message}")]
    BoundaryCondition {
        /// 边界名称
        patch: String,
        /// 具体错误信息
        message: String,
    },

    /// 分区间通信失败
    #[error("通信错误: {message}")]
    Communication {
        /// 具体错误信息
        message: String,
    },

    /// 资源未找到
    #[error("资源未找到: {resource}")]
    NotFound {
        /// 资源名称
        resource: String,
    },

    /// IO 错误
    #[error("IO错误: {message}")]
    Io {
        /// 描述性错误信息
        message: String,
        /// 可选的底层 IO 错误
        #[source]
        source: Option<std::io::Error>,
    },
}

// ========================================================================
// 便捷构造方法
// ========================================================================

impl FvError {
    /// 拓扑错误
    pub fn topology(operation: &'static str, details: impl Into<String>) -> Self {
        Self::Topology {
            operation,
            details: details.into(),
        }
    }

    /// 装配寻址不匹配
    pub fn assembly_mismatch(operation: &'static str, details: impl Into<String>) -> Self {
        Self::AssemblyMismatch {
            operation,
            details: details.into(),
        }
    }

    /// 数组大小不匹配
    pub fn size_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            name,
            expected,
            actual,
        }
    }

    /// 索引越界
    pub fn index_out_of_bounds(index_type: &'static str, index: usize, len: usize) -> Self {
        Self::IndexOutOfBounds {
            index_type,
            index,
            len,
        }
    }

    /// 非有限值
    pub fn non_finite(context: impl Into<String>) -> Self {
        Self::NonFinite {
            context: context.into(),
        }
    }

    /// 未知选择
    pub fn unknown_selection(
        kind: &'static str,
        name: impl Into<String>,
        valid: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self::UnknownSelection {
            kind,
            name: name.into(),
            valid: valid.into_iter().map(Into::into).collect(),
        }
    }

    /// 配置值无效
    pub fn invalid_config(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// 边界条件错误
    pub fn boundary_condition(patch: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BoundaryCondition {
            patch: patch.into(),
            message: message.into(),
        }
    }

    /// 通信错误
    pub fn communication(message: impl Into<String>) -> Self {
        Self::Communication {
            message: message.into(),
        }
    }

    /// 资源未找到
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// IO 错误（带源）
    pub fn io_with_source(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(source),
        }
    }
}

// ========================================================================
// 分类与验证辅助方法
// ========================================================================

impl FvError {
    /// 是否为结构性（致命）错误
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Topology { .. }
                | Self::AssemblyMismatch { .. }
                | Self::SizeMismatch { .. }
                | Self::IndexOutOfBounds { .. }
                | Self::NonFinite { .. }
        )
    }

    /// 检查数组大小是否匹配
    #[inline]
    pub fn check_size(name: &'static str, expected: usize, actual: usize) -> FvResult<()> {
        if expected != actual {
            Err(Self::size_mismatch(name, expected, actual))
        } else {
            Ok(())
        }
    }

    /// 检查索引是否有效
    #[inline]
    pub fn check_index(index_type: &'static str, index: usize, len: usize) -> FvResult<()> {
        if index >= len {
            Err(Self::index_out_of_bounds(index_type, index, len))
        } else {
            Ok(())
        }
    }
}

impl From<std::io::Error> for FvError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: Some(err),
        }
    }
}
