use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use flux_rule::{
    Action, ActionDispatchRequest, ActionExecutor, ActionType, ChannelActionExecutor, Condition,
    DeviceRecord, InMemoryDeviceDirectory, InMemoryRuleStore, MatcherConfig, Operator, Rule,
    RuleMatcher, RuleStore,
};
use flux_types::{DeviceEvent, DeviceStatus, StatusChange, TelemetryUpdate};
use std::sync::{Arc, Mutex};

type Journal = Arc<Mutex<Vec<String>>>;

/// 记录回写顺序的规则存储
struct JournalStore {
    inner: InMemoryRuleStore,
    journal: Journal,
}

#[async_trait]
impl RuleStore for JournalStore {
    async fn load_active_rules(
        &self,
        organization_id: &str,
        device_id: &str,
    ) -> flux_rule::Result<Vec<Rule>> {
        self.inner.load_active_rules(organization_id, device_id).await
    }

    async fn update_last_triggered(
        &self,
        rule_id: &str,
        expected: Option<DateTime<Utc>>,
        triggered_at: DateTime<Utc>,
    ) -> flux_rule::Result<bool> {
        self.journal.lock().unwrap().push(format!("update:{}", rule_id));
        self.inner
            .update_last_triggered(rule_id, expected, triggered_at)
            .await
    }
}

/// 记录提交顺序的动作执行器
struct JournalExecutor {
    journal: Journal,
}

#[async_trait]
impl ActionExecutor for JournalExecutor {
    async fn submit(&self, request: ActionDispatchRequest) -> flux_rule::Result<()> {
        self.journal
            .lock()
            .unwrap()
            .push(format!("submit:{}", request.context.rule_id));
        Ok(())
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 8, 30, 0).unwrap()
}

fn temperature(value: f64, at: DateTime<Utc>) -> DeviceEvent {
    DeviceEvent::from(TelemetryUpdate {
        device_id: "sensor_01".to_string(),
        organization_id: "org_1".to_string(),
        metric: "temperature".to_string(),
        value,
        timestamp: at,
    })
}

/// 温度 > 80 且设备在线时发送通知
fn overheat_rule() -> Rule {
    Rule::new("org_1", "overheat while online")
        .with_condition(Condition::telemetry("temperature", Operator::GreaterThan, "80").and())
        .with_condition(Condition::device_status("ONLINE"))
        .with_action(
            Action::new(ActionType::Notification)
                .with_config("recipient", "ops@example.com")
                .with_config("template", "overheat"),
        )
}

async fn online_directory() -> Arc<InMemoryDeviceDirectory> {
    let directory = InMemoryDeviceDirectory::new();
    directory
        .register(DeviceRecord::new("sensor_01", "org_1", DeviceStatus::Online))
        .await;
    Arc::new(directory)
}

/// 测试完整触发流程
#[tokio::test]
async fn test_overheat_notification_flow() {
    let store = Arc::new(InMemoryRuleStore::new());
    let rule = overheat_rule();
    let rule_id = rule.id.clone();
    store.save(rule).await.unwrap();

    let (executor, mut rx) = ChannelActionExecutor::new(16);
    let matcher = RuleMatcher::new(store.clone(), online_directory().await, Arc::new(executor));

    // 1. 温度未超阈值
    let report = matcher.on_event(&temperature(75.0, t0())).await.unwrap();
    assert!(report.fired.is_empty());
    assert!(rx.try_recv().is_err());

    // 2. 超过阈值，发送一条通知
    let at = t0() + Duration::seconds(1);
    let report = matcher.on_event(&temperature(85.0, at)).await.unwrap();
    assert_eq!(report.fired_ids(), vec![rule_id.as_str()]);

    let request = rx.recv().await.unwrap();
    assert_eq!(request.action_type, ActionType::Notification);
    assert_eq!(request.config["recipient"], "ops@example.com");
    assert_eq!(request.context.device_id, "sensor_01");
    assert_eq!(request.context.organization_id, "org_1");
    assert_eq!(request.context.triggering_value, Some(serde_json::json!(85.0)));
    assert!(rx.try_recv().is_err());

    // 3. 回写触发时间和历史
    let stored = store.get(&rule_id).await.unwrap().unwrap();
    assert_eq!(stored.last_triggered, Some(at));
    let history = store.trigger_history(Some(&rule_id), 10).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].triggered_at, at);
}

/// 测试设备离线时同样的温度不触发
#[tokio::test]
async fn test_overheat_on_offline_device_does_not_fire() {
    let store = Arc::new(InMemoryRuleStore::new());
    store.save(overheat_rule()).await.unwrap();

    // 1. 目录中登记为离线
    let directory = Arc::new(InMemoryDeviceDirectory::new());
    directory
        .register(DeviceRecord::new("sensor_01", "org_1", DeviceStatus::Offline))
        .await;

    let (executor, mut rx) = ChannelActionExecutor::new(16);
    let matcher = RuleMatcher::new(store.clone(), directory, Arc::new(executor));

    let report = matcher.on_event(&temperature(85.0, t0())).await.unwrap();
    assert_eq!(report.evaluated, 1);
    assert!(report.fired.is_empty());
    assert!(rx.try_recv().is_err());

    // 2. 在线设备收到离线状态变化后，同样的温度也不触发
    let (executor, mut rx) = ChannelActionExecutor::new(16);
    let matcher = RuleMatcher::new(store.clone(), online_directory().await, Arc::new(executor));
    let offline = DeviceEvent::from(StatusChange {
        device_id: "sensor_01".to_string(),
        organization_id: "org_1".to_string(),
        new_status: DeviceStatus::Offline,
        timestamp: t0(),
    });
    matcher.on_event(&offline).await.unwrap();

    let report = matcher
        .on_event(&temperature(85.0, t0() + Duration::seconds(1)))
        .await
        .unwrap();
    assert!(report.fired.is_empty());
    assert!(rx.try_recv().is_err());

    let history = store.trigger_history(None, 10).await;
    assert!(history.is_empty());
}

/// 测试停用规则不触发
#[tokio::test]
async fn test_inactive_rule_never_fires() {
    let store = Arc::new(InMemoryRuleStore::new());
    store.save(overheat_rule().inactive()).await.unwrap();

    let (executor, mut rx) = ChannelActionExecutor::new(16);
    let matcher = RuleMatcher::new(store, online_directory().await, Arc::new(executor));

    let report = matcher.on_event(&temperature(99.0, t0())).await.unwrap();
    assert_eq!(report.evaluated, 0);
    assert!(rx.try_recv().is_err());
}

/// 测试其他组织的规则不参与求值
#[tokio::test]
async fn test_foreign_organization_rule_is_out_of_scope() {
    let store = Arc::new(InMemoryRuleStore::new());
    let mut foreign = overheat_rule();
    foreign.organization_id = "org_2".to_string();
    store.save(foreign).await.unwrap();

    let (executor, _rx) = ChannelActionExecutor::new(16);
    let matcher = RuleMatcher::new(store, online_directory().await, Arc::new(executor));

    let report = matcher.on_event(&temperature(99.0, t0())).await.unwrap();
    assert_eq!(report.evaluated, 0);
}

/// 测试先回写再派发
#[tokio::test]
async fn test_last_triggered_written_before_dispatch() {
    let journal: Journal = Arc::new(Mutex::new(Vec::new()));
    let inner = InMemoryRuleStore::new();
    let rule = overheat_rule().with_action(Action::new(ActionType::Log));
    let rule_id = rule.id.clone();
    inner.save(rule).await.unwrap();

    let store = Arc::new(JournalStore {
        inner,
        journal: journal.clone(),
    });
    let executor = Arc::new(JournalExecutor {
        journal: journal.clone(),
    });
    let matcher = RuleMatcher::new(store, online_directory().await, executor);

    matcher.on_event(&temperature(85.0, t0())).await.unwrap();

    let entries = journal.lock().unwrap().clone();
    assert_eq!(
        entries,
        vec![
            format!("update:{}", rule_id),
            format!("submit:{}", rule_id),
            format!("submit:{}", rule_id),
        ]
    );
}

/// 测试最小触发间隔边界
#[tokio::test]
async fn test_retrigger_interval_boundary() {
    let store = Arc::new(InMemoryRuleStore::new());
    store.save(overheat_rule()).await.unwrap();

    let config = MatcherConfig {
        min_retrigger_interval: std::time::Duration::from_secs(30),
        ..Default::default()
    };
    let (executor, _rx) = ChannelActionExecutor::new(16);
    let matcher =
        RuleMatcher::with_config(store, online_directory().await, Arc::new(executor), config);

    let first = matcher.on_event(&temperature(85.0, t0())).await.unwrap();
    assert_eq!(first.fired.len(), 1);

    let early = t0() + Duration::milliseconds(29_999);
    let report = matcher.on_event(&temperature(85.0, early)).await.unwrap();
    assert!(report.fired.is_empty());

    let on_time = t0() + Duration::seconds(30);
    let report = matcher.on_event(&temperature(85.0, on_time)).await.unwrap();
    assert_eq!(report.fired.len(), 1);
}

/// 测试并发求值同一规则只触发一次
#[tokio::test]
async fn test_concurrent_matchers_fire_once() {
    let store = Arc::new(InMemoryRuleStore::new());
    store.save(overheat_rule()).await.unwrap();
    let directory = online_directory().await;

    let (executor, mut rx) = ChannelActionExecutor::new(16);
    let executor = Arc::new(executor);

    let mut handles = Vec::new();
    for _ in 0..4 {
        let matcher = RuleMatcher::new(store.clone(), directory.clone(), executor.clone());
        handles.push(tokio::spawn(async move {
            matcher.on_event(&temperature(85.0, t0())).await.unwrap()
        }));
    }

    let mut fired = 0;
    for handle in handles {
        fired += handle.await.unwrap().fired.len();
    }
    assert_eq!(fired, 1);

    assert!(rx.recv().await.is_some());
    assert!(rx.try_recv().is_err());
}
