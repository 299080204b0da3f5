use chrono::Utc;
use flux_logging::{init_logging, LoggingConfig};
use flux_rule::{
    Action, ActionType, ChannelActionExecutor, Condition, DeviceRecord, InMemoryDeviceDirectory,
    InMemoryRuleStore, Operator, Rule, RuleMatcher,
};
use flux_types::{DeviceEvent, DeviceStatus, StatusChange, TelemetryUpdate};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(&LoggingConfig::default())?;

    println!("🚀 FLUX IOT - 规则引擎演示\n");

    let store = Arc::new(InMemoryRuleStore::new());
    let directory = Arc::new(InMemoryDeviceDirectory::new());
    directory
        .register(DeviceRecord::new("sensor_01", "org_1", DeviceStatus::Online))
        .await;

    let rule = Rule::new("org_1", "高温告警")
        .with_condition(Condition::telemetry("temperature", Operator::GreaterThan, "80").and())
        .with_condition(Condition::device_status("ONLINE"))
        .with_action(
            Action::new(ActionType::Notification)
                .with_config("recipient", "ops@example.com")
                .with_config("template", "overheat"),
        )
        .with_action(Action::new(ActionType::Log));
    let rule_id = rule.id.clone();
    store.save(rule).await?;
    println!("✅ 规则已添加: {}", rule_id);

    let (executor, mut requests) = ChannelActionExecutor::new(16);
    let matcher = RuleMatcher::new(store.clone(), directory, Arc::new(executor));

    println!("\n示例 1: 温度 75，不触发");
    let report = matcher.on_event(&telemetry(75.0)).await?;
    println!("   触发规则数: {}", report.fired.len());

    println!("\n示例 2: 温度 85，触发");
    let report = matcher.on_event(&telemetry(85.0)).await?;
    println!("   触发规则数: {}", report.fired.len());
    while let Ok(request) = requests.try_recv() {
        println!("   📤 {} -> {:?}", request.action_type, request.config);
    }

    println!("\n示例 3: 设备离线后温度 90，不触发");
    matcher
        .on_event(&DeviceEvent::from(StatusChange {
            device_id: "sensor_01".to_string(),
            organization_id: "org_1".to_string(),
            new_status: DeviceStatus::Offline,
            timestamp: Utc::now(),
        }))
        .await?;
    let report = matcher.on_event(&telemetry(90.0)).await?;
    println!("   触发规则数: {}", report.fired.len());

    let stats = store.rule_stats("org_1", Utc::now()).await?;
    println!("\n📊 规则统计: {:?}", stats);

    Ok(())
}

fn telemetry(value: f64) -> DeviceEvent {
    DeviceEvent::from(TelemetryUpdate {
        device_id: "sensor_01".to_string(),
        organization_id: "org_1".to_string(),
        metric: "temperature".to_string(),
        value,
        timestamp: Utc::now(),
    })
}
