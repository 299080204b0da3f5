use crate::context::DeviceSnapshot;
use crate::error::{Result, RuleError};
use crate::model::{Condition, ConditionKind, ConditionType, Operator};
use crate::window::TimeWindow;
use serde::Serialize;

/// 条件求值的原因码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    Satisfied,
    Unsatisfied,
    /// 快照中没有该指标（暂态，不是错误）
    MetricMissing,
    /// 条件引用的设备没有快照
    DeviceUnknown,
}

/// 单个条件的求值结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConditionOutcome {
    pub matched: bool,
    pub reason: Reason,
}

impl ConditionOutcome {
    pub fn from_bool(matched: bool) -> Self {
        Self {
            matched,
            reason: if matched {
                Reason::Satisfied
            } else {
                Reason::Unsatisfied
            },
        }
    }

    pub fn not_matched(reason: Reason) -> Self {
        Self {
            matched: false,
            reason,
        }
    }
}

/// 对快照求值单个条件，纯函数
pub fn evaluate(condition: &Condition, snapshot: &DeviceSnapshot) -> Result<ConditionOutcome> {
    match &condition.kind {
        ConditionKind::DeviceStatus { operator, value } => {
            if *operator != Operator::Equals {
                return Err(RuleError::UnsupportedOperator {
                    condition_type: ConditionType::DeviceStatus,
                    operator: *operator,
                });
            }
            let matched = snapshot
                .status
                .as_str()
                .eq_ignore_ascii_case(value.trim());
            Ok(ConditionOutcome::from_bool(matched))
        }

        ConditionKind::TelemetryThreshold {
            metric,
            operator,
            value,
        } => {
            let Some(reading) = snapshot.metric(metric) else {
                return Ok(ConditionOutcome::not_matched(Reason::MetricMissing));
            };
            let threshold = parse_threshold(value)?;
            Ok(ConditionOutcome::from_bool(
                operator.compare(reading.value, threshold),
            ))
        }

        ConditionKind::TimeBased { operator, value } => {
            if let Some(op) = (*operator).filter(|op| *op != Operator::Equals) {
                return Err(RuleError::UnsupportedOperator {
                    condition_type: ConditionType::TimeBased,
                    operator: op,
                });
            }
            let window = TimeWindow::parse(value)?;
            Ok(ConditionOutcome::from_bool(
                window.contains(snapshot.evaluated_at),
            ))
        }
    }
}

/// 解析数值阈值；无法解析或非有限值视为配置错误
pub fn parse_threshold(value: &str) -> Result<f64> {
    match value.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(RuleError::MalformedThreshold(value.to_string())),
    }
}
