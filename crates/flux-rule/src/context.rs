use crate::model::Condition;
use chrono::{DateTime, Utc};
use flux_types::DeviceStatus;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 指标读数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricReading {
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// 设备快照：一次求值所依据的设备状态和最新指标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub device_id: String,
    pub organization_id: String,
    pub status: DeviceStatus,
    pub metrics: HashMap<String, MetricReading>,
    /// 最近一次状态变化事件的时间；目录中的初始状态为 None
    #[serde(default)]
    pub status_changed_at: Option<DateTime<Utc>>,
    /// 求值时间
    pub evaluated_at: DateTime<Utc>,
}

impl DeviceSnapshot {
    pub fn new(
        device_id: impl Into<String>,
        organization_id: impl Into<String>,
        status: DeviceStatus,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            organization_id: organization_id.into(),
            status,
            metrics: HashMap::new(),
            status_changed_at: None,
            evaluated_at: Utc::now(),
        }
    }

    pub fn with_metric(mut self, metric: impl Into<String>, value: f64) -> Self {
        let timestamp = self.evaluated_at;
        self.metrics
            .insert(metric.into(), MetricReading { value, timestamp });
        self
    }

    pub fn at(mut self, evaluated_at: DateTime<Utc>) -> Self {
        self.evaluated_at = evaluated_at;
        self
    }

    pub fn metric(&self, name: &str) -> Option<&MetricReading> {
        self.metrics.get(name)
    }
}

/// 条件求值视图：事件设备的快照，以及条件中引用的其他设备快照
#[derive(Debug, Clone, Copy)]
pub struct SnapshotView<'a> {
    primary: &'a DeviceSnapshot,
    peers: Option<&'a HashMap<String, DeviceSnapshot>>,
}

impl<'a> SnapshotView<'a> {
    pub fn single(primary: &'a DeviceSnapshot) -> Self {
        Self {
            primary,
            peers: None,
        }
    }

    pub fn with_peers(
        primary: &'a DeviceSnapshot,
        peers: &'a HashMap<String, DeviceSnapshot>,
    ) -> Self {
        Self {
            primary,
            peers: Some(peers),
        }
    }

    pub fn primary(&self) -> &'a DeviceSnapshot {
        self.primary
    }

    /// 按条件的设备覆盖选择快照；引用的设备没有快照时返回 None
    pub fn resolve(&self, condition: &Condition) -> Option<&'a DeviceSnapshot> {
        match condition.device_id.as_deref() {
            None => Some(self.primary),
            Some(id) if id == self.primary.device_id => Some(self.primary),
            Some(id) => self.peers.and_then(|peers| peers.get(id)),
        }
    }
}
