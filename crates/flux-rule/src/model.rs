use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// 规则定义
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// 规则 ID，为空时保存时生成
    #[serde(default)]
    pub id: String,

    /// 所属组织
    pub organization_id: String,

    /// 设备 ID（None 表示适用于组织内所有设备）
    #[serde(default)]
    pub device_id: Option<String>,

    /// 规则名称
    pub name: String,

    /// 规则描述
    #[serde(default)]
    pub description: String,

    /// 是否启用（未启用的规则从不求值）
    #[serde(default = "default_active")]
    pub active: bool,

    /// 描述性字段，不参与求值
    #[serde(default)]
    pub metric: Option<String>,
    #[serde(default)]
    pub metric_value: Option<String>,
    #[serde(default)]
    pub threshold: Option<String>,
    #[serde(default)]
    pub consequence: Option<String>,

    /// 条件列表（有序）
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// 动作列表（有序）
    #[serde(default)]
    pub actions: Vec<Action>,

    /// 最后触发时间
    #[serde(default)]
    pub last_triggered: Option<DateTime<Utc>>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl Default for Rule {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            organization_id: String::new(),
            device_id: None,
            name: String::new(),
            description: String::new(),
            active: true,
            metric: None,
            metric_value: None,
            threshold: None,
            consequence: None,
            conditions: Vec::new(),
            actions: Vec::new(),
            last_triggered: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Rule {
    pub fn new(organization_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// 规则是否作用于该组织下的该设备
    pub fn applies_to(&self, organization_id: &str, device_id: &str) -> bool {
        self.organization_id == organization_id
            && self.device_id.as_deref().map_or(true, |d| d == device_id)
    }
}

/// 条件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionType {
    DeviceStatus,
    TelemetryThreshold,
    TimeBased,
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConditionType::DeviceStatus => "DEVICE_STATUS",
            ConditionType::TelemetryThreshold => "TELEMETRY_THRESHOLD",
            ConditionType::TimeBased => "TIME_BASED",
        };
        f.write_str(s)
    }
}

/// 比较操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    GreaterThan,
    LessThan,
    #[default]
    Equals,
    GreaterThanOrEqual,
    LessThanOrEqual,
}

impl Operator {
    /// 以 `actual <op> expected` 的方式比较
    pub fn compare(&self, actual: f64, expected: f64) -> bool {
        match self {
            Operator::GreaterThan => actual > expected,
            Operator::LessThan => actual < expected,
            Operator::Equals => actual == expected,
            Operator::GreaterThanOrEqual => actual >= expected,
            Operator::LessThanOrEqual => actual <= expected,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::GreaterThan => "GREATER_THAN",
            Operator::LessThan => "LESS_THAN",
            Operator::Equals => "EQUALS",
            Operator::GreaterThanOrEqual => "GREATER_THAN_OR_EQUAL",
            Operator::LessThanOrEqual => "LESS_THAN_OR_EQUAL",
        };
        f.write_str(s)
    }
}

/// 与下一个条件的连接方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogicOperator {
    #[default]
    And,
    Or,
}

/// 规则条件
///
/// `logic_operator` 描述本条件与**下一个**条件的组合方式，最后一个条件上的值被忽略。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub id: String,

    /// 覆盖规则的设备范围
    #[serde(default)]
    pub device_id: Option<String>,

    #[serde(flatten)]
    pub kind: ConditionKind,

    #[serde(default)]
    pub logic_operator: LogicOperator,
}

/// 条件内容（按类型区分）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionKind {
    /// 设备状态，仅支持 EQUALS
    DeviceStatus {
        #[serde(default)]
        operator: Operator,
        value: String,
    },

    /// 遥测阈值
    TelemetryThreshold {
        metric: String,
        operator: Operator,
        value: String,
    },

    /// 时间窗口，格式见 [`crate::TimeWindow`]
    TimeBased {
        #[serde(default)]
        operator: Option<Operator>,
        value: String,
    },
}

impl ConditionKind {
    pub fn condition_type(&self) -> ConditionType {
        match self {
            ConditionKind::DeviceStatus { .. } => ConditionType::DeviceStatus,
            ConditionKind::TelemetryThreshold { .. } => ConditionType::TelemetryThreshold,
            ConditionKind::TimeBased { .. } => ConditionType::TimeBased,
        }
    }
}

impl Condition {
    pub fn new(kind: ConditionKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            device_id: None,
            kind,
            logic_operator: LogicOperator::And,
        }
    }

    pub fn telemetry(metric: impl Into<String>, operator: Operator, value: impl Into<String>) -> Self {
        Self::new(ConditionKind::TelemetryThreshold {
            metric: metric.into(),
            operator,
            value: value.into(),
        })
    }

    pub fn device_status(value: impl Into<String>) -> Self {
        Self::new(ConditionKind::DeviceStatus {
            operator: Operator::Equals,
            value: value.into(),
        })
    }

    pub fn time_window(value: impl Into<String>) -> Self {
        Self::new(ConditionKind::TimeBased {
            operator: None,
            value: value.into(),
        })
    }

    pub fn and(mut self) -> Self {
        self.logic_operator = LogicOperator::And;
        self
    }

    pub fn or(mut self) -> Self {
        self.logic_operator = LogicOperator::Or;
        self
    }

    pub fn for_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn condition_type(&self) -> ConditionType {
        self.kind.condition_type()
    }
}

/// 动作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Notification,
    DeviceControl,
    Webhook,
    Log,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Notification => "NOTIFICATION",
            ActionType::DeviceControl => "DEVICE_CONTROL",
            ActionType::Webhook => "WEBHOOK",
            ActionType::Log => "LOG",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 规则动作
///
/// `config` 的键由动作类型决定，引擎不做校验，原样透传给执行器。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(default)]
    pub id: String,

    #[serde(rename = "type")]
    pub action_type: ActionType,

    #[serde(default)]
    pub config: HashMap<String, String>,
}

impl Action {
    pub fn new(action_type: ActionType) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            action_type,
            config: HashMap::new(),
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }
}
