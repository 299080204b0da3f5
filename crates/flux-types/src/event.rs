use crate::device::DeviceStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 遥测数据更新事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryUpdate {
    pub device_id: String,
    pub organization_id: String,
    pub metric: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// 设备状态变化事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub device_id: String,
    pub organization_id: String,
    pub new_status: DeviceStatus,
    pub timestamp: DateTime<Utc>,
}

/// 规则引擎的输入事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceEvent {
    TelemetryUpdate(TelemetryUpdate),
    StatusChange(StatusChange),
}

impl DeviceEvent {
    pub fn device_id(&self) -> &str {
        match self {
            DeviceEvent::TelemetryUpdate(e) => &e.device_id,
            DeviceEvent::StatusChange(e) => &e.device_id,
        }
    }

    pub fn organization_id(&self) -> &str {
        match self {
            DeviceEvent::TelemetryUpdate(e) => &e.organization_id,
            DeviceEvent::StatusChange(e) => &e.organization_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            DeviceEvent::TelemetryUpdate(e) => e.timestamp,
            DeviceEvent::StatusChange(e) => e.timestamp,
        }
    }

    /// 事件类型名称（用于日志）
    pub fn kind(&self) -> &'static str {
        match self {
            DeviceEvent::TelemetryUpdate(_) => "telemetry_update",
            DeviceEvent::StatusChange(_) => "status_change",
        }
    }
}

impl From<TelemetryUpdate> for DeviceEvent {
    fn from(update: TelemetryUpdate) -> Self {
        DeviceEvent::TelemetryUpdate(update)
    }
}

impl From<StatusChange> for DeviceEvent {
    fn from(change: StatusChange) -> Self {
        DeviceEvent::StatusChange(change)
    }
}
