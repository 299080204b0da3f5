use crate::context::DeviceSnapshot;
use crate::model::{ActionType, Rule};
use chrono::{DateTime, Utc};
use flux_types::DeviceEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// 触发信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerInfo {
    pub metric: Option<String>,
    pub value: Option<Value>,
}

impl TriggerInfo {
    /// 遥测事件取指标名和值；状态变化事件以 `status` 为指标名
    pub fn from_event(event: &DeviceEvent) -> Self {
        match event {
            DeviceEvent::TelemetryUpdate(update) => Self {
                metric: Some(update.metric.clone()),
                value: Some(Value::from(update.value)),
            },
            DeviceEvent::StatusChange(change) => Self {
                metric: Some("status".to_string()),
                value: Some(Value::from(change.new_status.as_str())),
            },
        }
    }
}

/// 派发上下文
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchContext {
    pub rule_id: String,
    pub rule_name: String,
    pub device_id: String,
    pub organization_id: String,
    pub triggering_metric: Option<String>,
    pub triggering_value: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

/// 交给动作执行器的派发请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDispatchRequest {
    pub id: String,
    pub action_type: ActionType,
    /// 原样透传的动作配置
    pub config: HashMap<String, String>,
    pub context: DispatchContext,
}

/// 动作派发器
///
/// 每个动作生成一条请求，顺序与规则中动作顺序一致，不区分动作类型。
#[derive(Debug, Clone, Default)]
pub struct ActionDispatcher;

impl ActionDispatcher {
    pub fn new() -> Self {
        Self
    }

    pub fn dispatch(
        &self,
        rule: &Rule,
        snapshot: &DeviceSnapshot,
        trigger: &TriggerInfo,
    ) -> Vec<ActionDispatchRequest> {
        let context = DispatchContext {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            device_id: snapshot.device_id.clone(),
            organization_id: snapshot.organization_id.clone(),
            triggering_metric: trigger.metric.clone(),
            triggering_value: trigger.value.clone(),
            timestamp: snapshot.evaluated_at,
        };

        rule.actions
            .iter()
            .map(|action| ActionDispatchRequest {
                id: uuid::Uuid::new_v4().to_string(),
                action_type: action.action_type,
                config: action.config.clone(),
                context: context.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Action;
    use flux_types::{DeviceStatus, TelemetryUpdate};

    #[test]
    fn test_one_request_per_action_in_order() {
        let rule = Rule::new("org_1", "overheat")
            .with_action(
                Action::new(ActionType::Notification)
                    .with_config("recipient", "ops@example.com")
                    .with_config("template", "overheat"),
            )
            .with_action(Action::new(ActionType::Webhook).with_config("url", "https://example.com/hook"))
            .with_action(Action::new(ActionType::Log));

        let snapshot = DeviceSnapshot::new("sensor_01", "org_1", DeviceStatus::Online)
            .with_metric("temperature", 85.0);
        let event = DeviceEvent::from(TelemetryUpdate {
            device_id: "sensor_01".to_string(),
            organization_id: "org_1".to_string(),
            metric: "temperature".to_string(),
            value: 85.0,
            timestamp: snapshot.evaluated_at,
        });

        let requests = ActionDispatcher::new().dispatch(&rule, &snapshot, &TriggerInfo::from_event(&event));

        let types: Vec<_> = requests.iter().map(|r| r.action_type).collect();
        assert_eq!(
            types,
            vec![ActionType::Notification, ActionType::Webhook, ActionType::Log]
        );
        assert_eq!(requests[0].config, rule.actions[0].config);
        assert_eq!(requests[1].config["url"], "https://example.com/hook");
        assert_ne!(requests[0].id, requests[1].id);

        let context = &requests[0].context;
        assert_eq!(context.rule_id, rule.id);
        assert_eq!(context.rule_name, "overheat");
        assert_eq!(context.device_id, "sensor_01");
        assert_eq!(context.triggering_metric.as_deref(), Some("temperature"));
        assert_eq!(context.triggering_value, Some(serde_json::json!(85.0)));
    }

    #[test]
    fn test_rule_without_actions_dispatches_nothing() {
        let rule = Rule::new("org_1", "silent");
        let snapshot = DeviceSnapshot::new("sensor_01", "org_1", DeviceStatus::Online);
        let trigger = TriggerInfo {
            metric: None,
            value: None,
        };
        assert!(ActionDispatcher::new().dispatch(&rule, &snapshot, &trigger).is_empty());
    }
}
