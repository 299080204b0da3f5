use crate::context::{DeviceSnapshot, MetricReading};
use crate::directory::DeviceDirectory;
use crate::error::Result;
use flux_types::DeviceEvent;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// 设备快照缓存
///
/// 首次见到设备时从设备目录取状态，之后由事件增量更新。
#[derive(Clone, Default)]
pub struct SnapshotCache {
    snapshots: Arc<RwLock<HashMap<String, DeviceSnapshot>>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 将事件合并进缓存，返回合并后的快照
    ///
    /// 设备不存在或不属于事件声明的组织时返回 None。
    pub async fn apply(
        &self,
        event: &DeviceEvent,
        directory: &dyn DeviceDirectory,
    ) -> Result<Option<DeviceSnapshot>> {
        let device_id = event.device_id();
        let organization_id = event.organization_id();

        let cached = self.snapshots.read().await.contains_key(device_id);
        let seed = if cached {
            None
        } else {
            match directory.lookup(device_id).await? {
                Some(record) => Some(DeviceSnapshot::new(
                    record.device_id,
                    record.organization_id,
                    record.status,
                )),
                None => {
                    debug!(device_id = %device_id, "Event for unknown device ignored");
                    return Ok(None);
                }
            }
        };

        let mut snapshots = self.snapshots.write().await;
        let snapshot = match seed {
            Some(seed) => snapshots.entry(device_id.to_string()).or_insert(seed),
            None => match snapshots.get_mut(device_id) {
                Some(snapshot) => snapshot,
                // 期间被清除，下一条事件会重新加载
                None => return Ok(None),
            },
        };

        if snapshot.organization_id != organization_id {
            warn!(
                device_id = %device_id,
                organization_id = %organization_id,
                owner = %snapshot.organization_id,
                "Event organization does not own device, ignored"
            );
            return Ok(None);
        }

        match event {
            DeviceEvent::TelemetryUpdate(update) => {
                let newer = snapshot
                    .metrics
                    .get(&update.metric)
                    .map_or(true, |existing| existing.timestamp <= update.timestamp);
                if newer {
                    snapshot.metrics.insert(
                        update.metric.clone(),
                        MetricReading {
                            value: update.value,
                            timestamp: update.timestamp,
                        },
                    );
                }
            }
            DeviceEvent::StatusChange(change) => {
                let newer = snapshot
                    .status_changed_at
                    .map_or(true, |at| at <= change.timestamp);
                if newer {
                    snapshot.status = change.new_status;
                    snapshot.status_changed_at = Some(change.timestamp);
                } else {
                    debug!(device_id = %device_id, "Stale status change ignored");
                }
            }
        }
        snapshot.evaluated_at = event.timestamp();

        Ok(Some(snapshot.clone()))
    }

    /// 条件引用的其他设备的快照；未缓存时从设备目录取状态（不写入缓存）
    pub async fn peer(
        &self,
        organization_id: &str,
        device_id: &str,
        directory: &dyn DeviceDirectory,
    ) -> Result<Option<DeviceSnapshot>> {
        if let Some(snapshot) = self.snapshots.read().await.get(device_id) {
            return Ok((snapshot.organization_id == organization_id).then(|| snapshot.clone()));
        }

        Ok(directory
            .lookup(device_id)
            .await?
            .filter(|record| record.organization_id == organization_id)
            .map(|record| {
                DeviceSnapshot::new(record.device_id, record.organization_id, record.status)
            }))
    }

    pub async fn get(&self, device_id: &str) -> Option<DeviceSnapshot> {
        self.snapshots.read().await.get(device_id).cloned()
    }

    /// 直接写入快照（用于预热）
    pub async fn seed(&self, snapshot: DeviceSnapshot) {
        self.snapshots
            .write()
            .await
            .insert(snapshot.device_id.clone(), snapshot);
    }

    pub async fn evict(&self, device_id: &str) -> Option<DeviceSnapshot> {
        self.snapshots.write().await.remove(device_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{DeviceRecord, InMemoryDeviceDirectory};
    use chrono::{Duration, TimeZone, Utc};
    use flux_types::{DeviceStatus, StatusChange, TelemetryUpdate};

    fn telemetry(metric: &str, value: f64, secs: i64) -> DeviceEvent {
        TelemetryUpdate {
            device_id: "sensor_01".to_string(),
            organization_id: "org_1".to_string(),
            metric: metric.to_string(),
            value,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
                + Duration::seconds(secs),
        }
        .into()
    }

    async fn directory() -> InMemoryDeviceDirectory {
        let directory = InMemoryDeviceDirectory::new();
        directory
            .register(DeviceRecord::new("sensor_01", "org_1", DeviceStatus::Online))
            .await;
        directory
    }

    #[tokio::test]
    async fn test_metrics_merge_across_events() {
        let directory = directory().await;
        let cache = SnapshotCache::new();

        cache.apply(&telemetry("temperature", 85.0, 0), &directory).await.unwrap();
        let snapshot = cache
            .apply(&telemetry("humidity", 40.0, 1), &directory)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(snapshot.status, DeviceStatus::Online);
        assert_eq!(snapshot.metric("temperature").unwrap().value, 85.0);
        assert_eq!(snapshot.metric("humidity").unwrap().value, 40.0);
    }

    #[tokio::test]
    async fn test_stale_reading_does_not_overwrite() {
        let directory = directory().await;
        let cache = SnapshotCache::new();

        cache.apply(&telemetry("temperature", 85.0, 10), &directory).await.unwrap();
        let snapshot = cache
            .apply(&telemetry("temperature", 20.0, 5), &directory)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.metric("temperature").unwrap().value, 85.0);
    }

    #[tokio::test]
    async fn test_status_change_and_ownership() {
        let directory = directory().await;
        let cache = SnapshotCache::new();

        let change = StatusChange {
            device_id: "sensor_01".to_string(),
            organization_id: "org_1".to_string(),
            new_status: DeviceStatus::Error,
            timestamp: Utc::now(),
        };
        let snapshot = cache.apply(&change.clone().into(), &directory).await.unwrap().unwrap();
        assert_eq!(snapshot.status, DeviceStatus::Error);

        let foreign = StatusChange {
            organization_id: "org_2".to_string(),
            ..change
        };
        assert!(cache.apply(&foreign.into(), &directory).await.unwrap().is_none());

        let mut unknown = telemetry("temperature", 1.0, 0);
        if let DeviceEvent::TelemetryUpdate(update) = &mut unknown {
            update.device_id = "ghost".to_string();
        }
        assert!(cache.apply(&unknown, &directory).await.unwrap().is_none());
        assert!(cache.get("ghost").await.is_none());
    }

    #[tokio::test]
    async fn test_stale_status_change_does_not_overwrite() {
        let directory = directory().await;
        let cache = SnapshotCache::new();
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let change = |status, secs| -> DeviceEvent {
            StatusChange {
                device_id: "sensor_01".to_string(),
                organization_id: "org_1".to_string(),
                new_status: status,
                timestamp: base + Duration::seconds(secs),
            }
            .into()
        };

        cache.apply(&change(DeviceStatus::Online, 10), &directory).await.unwrap();
        let snapshot = cache
            .apply(&change(DeviceStatus::Offline, 5), &directory)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.status, DeviceStatus::Online);
        assert_eq!(snapshot.status_changed_at, Some(base + Duration::seconds(10)));

        // 相同时间戳按到达顺序生效
        let snapshot = cache
            .apply(&change(DeviceStatus::Warning, 10), &directory)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.status, DeviceStatus::Warning);
    }

    #[tokio::test]
    async fn test_peer_lookup_respects_organization() {
        let directory = directory().await;
        directory
            .register(DeviceRecord::new("fan_01", "org_1", DeviceStatus::Offline))
            .await;
        let cache = SnapshotCache::new();

        let peer = cache.peer("org_1", "fan_01", &directory).await.unwrap().unwrap();
        assert_eq!(peer.status, DeviceStatus::Offline);
        assert!(cache.peer("org_2", "fan_01", &directory).await.unwrap().is_none());
        assert!(cache.get("fan_01").await.is_none());
    }
}
