use crate::error::Result;
use async_trait::async_trait;
use flux_types::DeviceStatus;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// 设备目录中的设备记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub device_id: String,
    pub organization_id: String,
    #[serde(default)]
    pub status: DeviceStatus,
}

impl DeviceRecord {
    pub fn new(
        device_id: impl Into<String>,
        organization_id: impl Into<String>,
        status: DeviceStatus,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            organization_id: organization_id.into(),
            status,
        }
    }
}

/// 设备目录：设备是否存在、当前状态、所属组织
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    async fn lookup(&self, device_id: &str) -> Result<Option<DeviceRecord>>;
}

/// 设备目录（内存实现）
#[derive(Clone, Default)]
pub struct InMemoryDeviceDirectory {
    devices: Arc<RwLock<HashMap<String, DeviceRecord>>>,
}

impl InMemoryDeviceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, record: DeviceRecord) {
        self.devices
            .write()
            .await
            .insert(record.device_id.clone(), record);
    }

    pub async fn remove(&self, device_id: &str) -> Option<DeviceRecord> {
        self.devices.write().await.remove(device_id)
    }

    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }
}

#[async_trait]
impl DeviceDirectory for InMemoryDeviceDirectory {
    async fn lookup(&self, device_id: &str) -> Result<Option<DeviceRecord>> {
        Ok(self.devices.read().await.get(device_id).cloned())
    }
}
