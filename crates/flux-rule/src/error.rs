use crate::model::{ConditionType, Operator};
use thiserror::Error;

/// 规则引擎错误类型
#[derive(Error, Debug)]
pub enum RuleError {
    /// 条件类型不支持该操作符（配置错误，不重试）
    #[error("Unsupported operator {operator} for {condition_type} condition")]
    UnsupportedOperator {
        condition_type: ConditionType,
        operator: Operator,
    },

    /// 阈值无法解析为数值（配置错误，不重试）
    #[error("Malformed threshold value: {0:?}")]
    MalformedThreshold(String),

    /// 时间窗口格式错误
    #[error("Malformed time window {value:?}: {reason}")]
    MalformedTimeWindow { value: String, reason: String },

    /// 规则存储不可用（加载或更新失败、超时）
    #[error("Rule store unavailable: {0}")]
    StoreUnavailable(String),

    /// 设备目录不可用
    #[error("Device directory unavailable: {0}")]
    DirectoryUnavailable(String),

    /// 动作执行器不可用
    #[error("Action executor unavailable: {0}")]
    ExecutorUnavailable(String),

    /// 通道发送失败
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// 规则引擎结果类型
pub type Result<T> = std::result::Result<T, RuleError>;

impl RuleError {
    /// 稳定的错误类别名称，用于日志字段和指标标签
    pub fn kind(&self) -> &'static str {
        match self {
            RuleError::UnsupportedOperator { .. } => "unsupported_operator",
            RuleError::MalformedThreshold(_) => "malformed_threshold",
            RuleError::MalformedTimeWindow { .. } => "malformed_time_window",
            RuleError::StoreUnavailable(_) => "store_unavailable",
            RuleError::DirectoryUnavailable(_) => "directory_unavailable",
            RuleError::ExecutorUnavailable(_) => "executor_unavailable",
            RuleError::ChannelSend(_) => "channel_send",
            RuleError::Other(_) => "other",
        }
    }

    /// 是否为规则配置错误（重试无意义）
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            RuleError::UnsupportedOperator { .. }
                | RuleError::MalformedThreshold(_)
                | RuleError::MalformedTimeWindow { .. }
        )
    }

    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        RuleError::StoreUnavailable(msg.into())
    }

    pub fn time_window(value: impl Into<String>, reason: impl Into<String>) -> Self {
        RuleError::MalformedTimeWindow {
            value: value.into(),
            reason: reason.into(),
        }
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for RuleError {
    fn from(err: tokio::sync::mpsc::error::SendError<T>) -> Self {
        RuleError::ChannelSend(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_labels() {
        let err = RuleError::UnsupportedOperator {
            condition_type: ConditionType::DeviceStatus,
            operator: Operator::GreaterThan,
        };
        assert_eq!(err.kind(), "unsupported_operator");
        assert!(err.is_configuration_error());
        assert_eq!(
            err.to_string(),
            "Unsupported operator GREATER_THAN for DEVICE_STATUS condition"
        );

        let err = RuleError::store_unavailable("connection refused");
        assert_eq!(err.kind(), "store_unavailable");
        assert!(!err.is_configuration_error());
    }
}
