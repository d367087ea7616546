// crates/fv_config/src/error.rs

//! 配置层错误类型

use fv_foundation::FvError;

/// 配置错误
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 解析错误
    #[error("解析错误: {0}")]
    Parse(String),

    /// 无效值
    #[error("无效值 '{key}': {value} - {reason}")]
    InvalidValue {
        /// 配置键
        key: String,
        /// 配置值
        value: String,
        /// 原因
        reason: String,
    },

    /// 缺失配置
    #[error("缺失配置: {0}")]
    Missing(String),
}

impl ConfigError {
    /// 无效值
    pub fn invalid(key: impl Into<String>, value: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<ConfigError> for FvError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Io(e) => FvError::io_with_source("读取配置失败", e),
            ConfigError::Parse(msg) => FvError::invalid_config("<json>", "", msg),
            ConfigError::InvalidValue { key, value, reason } => {
                FvError::invalid_config(key, value, reason)
            }
            ConfigError::Missing(key) => FvError::not_found(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::invalid("solvers.T.tolerance", -1.0, "必须非负");
        assert!(err.to_string().contains("tolerance"));
    }

    #[test]
    fn test_into_fv_error() {
        let err: FvError = ConfigError::Missing("solvers.p".into()).into();
        assert!(matches!(err, FvError::NotFound { .. }));
        assert!(!err.is_fatal());
    }
}
