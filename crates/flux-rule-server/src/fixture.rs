use anyhow::{Context, Result};
use flux_rule::{DeviceRecord, InMemoryDeviceDirectory, InMemoryRuleStore, Rule};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::info;

/// 启动时加载的规则和设备
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub devices: Vec<DeviceRecord>,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl Fixture {
    /// 从 JSON 文件加载
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse fixture {}", path.display()))
    }

    /// 写入规则存储和设备目录
    pub async fn install(
        self,
        store: &InMemoryRuleStore,
        directory: &InMemoryDeviceDirectory,
    ) -> Result<()> {
        let devices = self.devices.len();
        let rules = self.rules.len();

        for device in self.devices {
            directory.register(device).await;
        }
        for rule in self.rules {
            store.save(rule).await?;
        }

        info!(devices, rules, "Fixture installed");
        Ok(())
    }

    /// 涉及的组织
    pub fn organizations(&self) -> BTreeSet<String> {
        self.devices
            .iter()
            .map(|d| d.organization_id.clone())
            .chain(self.rules.iter().map(|r| r.organization_id.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_rule::{ConditionKind, RuleStore};
    use flux_types::DeviceStatus;
    use std::fs;
    use tempfile::tempdir;

    const FIXTURE: &str = r#"{
        "devices": [
            { "device_id": "sensor_01", "organization_id": "org_1", "status": "ONLINE" },
            { "device_id": "sensor_02", "organization_id": "org_1" }
        ],
        "rules": [
            {
                "id": "rule_overheat",
                "organization_id": "org_1",
                "name": "overheat",
                "conditions": [
                    { "type": "TELEMETRY_THRESHOLD", "metric": "temperature", "operator": "GREATER_THAN", "value": "80", "logic_operator": "AND" },
                    { "type": "DEVICE_STATUS", "operator": "EQUALS", "value": "ONLINE" }
                ],
                "actions": [
                    { "type": "NOTIFICATION", "config": { "recipient": "ops@example.com" } }
                ]
            }
        ]
    }"#;

    #[tokio::test]
    async fn test_load_and_install_fixture() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("fixture.json");
        fs::write(&path, FIXTURE).unwrap();

        let fixture = Fixture::load(&path).unwrap();
        assert_eq!(fixture.devices.len(), 2);
        assert_eq!(fixture.devices[1].status, DeviceStatus::Offline);
        assert!(matches!(
            fixture.rules[0].conditions[0].kind,
            ConditionKind::TelemetryThreshold { .. }
        ));
        assert_eq!(fixture.organizations().len(), 1);

        let store = InMemoryRuleStore::new();
        let directory = InMemoryDeviceDirectory::new();
        fixture.install(&store, &directory).await.unwrap();

        assert_eq!(directory.len().await, 2);
        let rules = store.load_active_rules("org_1", "sensor_01").await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, "rule_overheat");
    }

    #[test]
    fn test_missing_fixture_reports_path() {
        let err = Fixture::load("/nonexistent/fixture.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/fixture.json"));
    }
}
