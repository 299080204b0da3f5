use crate::cache::SnapshotCache;
use crate::combinator::combine;
use crate::context::{DeviceSnapshot, SnapshotView};
use crate::directory::DeviceDirectory;
use crate::dispatcher::{ActionDispatchRequest, ActionDispatcher, TriggerInfo};
use crate::error::{Result, RuleError};
use crate::executor::ActionExecutor;
use crate::metrics;
use crate::model::Rule;
use crate::storage::RuleStore;
use chrono::{DateTime, Utc};
use flux_logging::{LogSampler, SampleDecision};
use flux_types::DeviceEvent;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 匹配器配置
#[derive(Debug, Clone, PartialEq)]
pub struct MatcherConfig {
    /// 同一规则两次触发的最小间隔
    pub min_retrigger_interval: Duration,
    pub store_timeout: Duration,
    pub dispatch_timeout: Duration,
    /// 每条规则在窗口内最多记录的求值失败日志数
    pub failure_log_limit: u32,
    pub failure_log_window: Duration,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            min_retrigger_interval: Duration::from_secs(60),
            store_timeout: Duration::from_secs(5),
            dispatch_timeout: Duration::from_secs(5),
            failure_log_limit: 5,
            failure_log_window: Duration::from_secs(60),
        }
    }
}

/// 本次事件触发的规则
#[derive(Debug, Clone)]
pub struct FiredRule {
    pub rule_id: String,
    pub rule_name: String,
    pub device_id: String,
    pub fired_at: DateTime<Utc>,
    pub requests: Vec<ActionDispatchRequest>,
}

/// 单条规则的失败（求值或派发），不影响其他规则
#[derive(Debug)]
pub struct RuleFailure {
    pub rule_id: String,
    pub error: RuleError,
}

/// 单个事件的匹配结果
#[derive(Debug, Default)]
pub struct MatchReport {
    /// 参与求值的规则数
    pub evaluated: usize,
    pub fired: Vec<FiredRule>,
    pub debounced: Vec<String>,
    pub failures: Vec<RuleFailure>,
}

impl MatchReport {
    pub fn fired_ids(&self) -> Vec<&str> {
        self.fired.iter().map(|f| f.rule_id.as_str()).collect()
    }
}

/// CAS 回写的结果
enum Claim {
    Won,
    Lost,
    /// 存储失败或超时，仍然派发
    Unconfirmed,
}

/// 规则匹配器
///
/// 每个设备事件：合并进快照，加载作用域内的启用规则，组合条件，
/// 防抖，先回写 `last_triggered` 再派发动作。
pub struct RuleMatcher {
    store: Arc<dyn RuleStore>,
    directory: Arc<dyn DeviceDirectory>,
    executor: Arc<dyn ActionExecutor>,
    dispatcher: ActionDispatcher,
    snapshots: SnapshotCache,
    config: MatcherConfig,
    sampler: LogSampler,
}

impl RuleMatcher {
    pub fn new(
        store: Arc<dyn RuleStore>,
        directory: Arc<dyn DeviceDirectory>,
        executor: Arc<dyn ActionExecutor>,
    ) -> Self {
        Self::with_config(store, directory, executor, MatcherConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn RuleStore>,
        directory: Arc<dyn DeviceDirectory>,
        executor: Arc<dyn ActionExecutor>,
        config: MatcherConfig,
    ) -> Self {
        let sampler = LogSampler::rate_limited(config.failure_log_limit, config.failure_log_window);
        Self {
            store,
            directory,
            executor,
            dispatcher: ActionDispatcher::new(),
            snapshots: SnapshotCache::new(),
            config,
            sampler,
        }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    pub fn snapshots(&self) -> &SnapshotCache {
        &self.snapshots
    }

    /// 处理一个设备事件
    ///
    /// 只有加载规则失败会返回错误；单条规则的失败记录在报告中。
    pub async fn on_event(&self, event: &DeviceEvent) -> Result<MatchReport> {
        metrics::record_event(event.kind());

        // 先更新快照，再加载规则
        let Some(snapshot) = self
            .snapshots
            .apply(event, self.directory.as_ref())
            .await?
        else {
            return Ok(MatchReport::default());
        };

        let rules = self
            .load_rules(&snapshot.organization_id, &snapshot.device_id)
            .await?;
        let trigger = TriggerInfo::from_event(event);

        let mut report = MatchReport::default();
        for rule in rules {
            // 存储可能放宽了过滤条件
            if !rule.active || !rule.applies_to(&snapshot.organization_id, &snapshot.device_id) {
                continue;
            }
            report.evaluated += 1;
            self.evaluate_rule(&rule, &snapshot, &trigger, &mut report).await;
        }

        debug!(
            device_id = %snapshot.device_id,
            event = event.kind(),
            evaluated = report.evaluated,
            fired = report.fired.len(),
            "Event matched"
        );
        Ok(report)
    }

    async fn load_rules(&self, organization_id: &str, device_id: &str) -> Result<Vec<Rule>> {
        let loaded = tokio::time::timeout(
            self.config.store_timeout,
            self.store.load_active_rules(organization_id, device_id),
        )
        .await;

        let error = match loaded {
            Ok(Ok(rules)) => return Ok(rules),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("load timed out after {:?}", self.config.store_timeout),
        };

        metrics::record_store_error("load");
        warn!(
            organization_id = %organization_id,
            device_id = %device_id,
            error = %error,
            "Failed to load rules, event skipped"
        );
        Err(RuleError::store_unavailable(error))
    }

    async fn evaluate_rule(
        &self,
        rule: &Rule,
        snapshot: &DeviceSnapshot,
        trigger: &TriggerInfo,
        report: &mut MatchReport,
    ) {
        let peers = self.gather_peers(rule, snapshot).await;
        let view = SnapshotView::with_peers(snapshot, &peers);

        metrics::record_evaluation();
        let combined = combine(&rule.conditions, view);
        if let Some(error) = combined.error {
            self.log_evaluation_failure(rule, &error).await;
            metrics::record_evaluation_error(error.kind());
            report.failures.push(RuleFailure {
                rule_id: rule.id.clone(),
                error,
            });
            return;
        }
        if !combined.matched {
            return;
        }

        let fired_at = snapshot.evaluated_at;
        if self.debounced(rule, fired_at) {
            metrics::record_debounced();
            debug!(rule_id = %rule.id, "Rule matched within re-trigger interval, skipped");
            report.debounced.push(rule.id.clone());
            return;
        }

        match self.claim(rule, fired_at).await {
            Claim::Won | Claim::Unconfirmed => {}
            Claim::Lost => {
                metrics::record_debounced();
                debug!(rule_id = %rule.id, "Rule already triggered by a concurrent evaluation");
                report.debounced.push(rule.id.clone());
                return;
            }
        }

        let requests = self.dispatcher.dispatch(rule, snapshot, trigger);
        for request in &requests {
            if let Err(error) = self.submit(request.clone()).await {
                report.failures.push(RuleFailure {
                    rule_id: rule.id.clone(),
                    error,
                });
            }
        }

        metrics::record_triggered();
        info!(
            rule_id = %rule.id,
            rule_name = %rule.name,
            device_id = %snapshot.device_id,
            actions = requests.len(),
            "Rule triggered"
        );

        report.fired.push(FiredRule {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            device_id: snapshot.device_id.clone(),
            fired_at,
            requests,
        });
    }

    /// 收集条件中引用的其他设备快照，求值时间统一为事件时间
    async fn gather_peers(
        &self,
        rule: &Rule,
        snapshot: &DeviceSnapshot,
    ) -> HashMap<String, DeviceSnapshot> {
        let mut peers = HashMap::new();
        for device_id in rule.conditions.iter().filter_map(|c| c.device_id.as_deref()) {
            if device_id == snapshot.device_id || peers.contains_key(device_id) {
                continue;
            }
            match self
                .snapshots
                .peer(&snapshot.organization_id, device_id, self.directory.as_ref())
                .await
            {
                Ok(Some(mut peer)) => {
                    peer.evaluated_at = snapshot.evaluated_at;
                    peers.insert(device_id.to_string(), peer);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(rule_id = %rule.id, device_id = %device_id, error = %e, "Peer lookup failed");
                }
            }
        }
        peers
    }

    fn debounced(&self, rule: &Rule, at: DateTime<Utc>) -> bool {
        let Some(last) = rule.last_triggered else {
            return false;
        };
        let elapsed = (at - last).num_milliseconds();
        let interval = i64::try_from(self.config.min_retrigger_interval.as_millis()).unwrap_or(i64::MAX);
        elapsed < interval
    }

    /// 派发前回写 `last_triggered`
    async fn claim(&self, rule: &Rule, at: DateTime<Utc>) -> Claim {
        let updated = tokio::time::timeout(
            self.config.store_timeout,
            self.store.update_last_triggered(&rule.id, rule.last_triggered, at),
        )
        .await;

        let error = match updated {
            Ok(Ok(true)) => return Claim::Won,
            Ok(Ok(false)) => return Claim::Lost,
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("update timed out after {:?}", self.config.store_timeout),
        };

        metrics::record_store_error("update");
        warn!(
            rule_id = %rule.id,
            error = %error,
            "Failed to record last_triggered, dispatching anyway"
        );
        Claim::Unconfirmed
    }

    async fn submit(&self, request: ActionDispatchRequest) -> Result<()> {
        let action_type = request.action_type.as_str();
        let rule_id = request.context.rule_id.clone();
        metrics::record_dispatch(action_type);

        let submitted = tokio::time::timeout(self.config.dispatch_timeout, self.executor.submit(request)).await;
        let error = match submitted {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => e,
            Err(_) => RuleError::ExecutorUnavailable(format!(
                "submit timed out after {:?}",
                self.config.dispatch_timeout
            )),
        };

        metrics::record_dispatch_failure(action_type);
        warn!(rule_id = %rule_id, action_type, error = %error, "Failed to submit action");
        Err(error)
    }

    async fn log_evaluation_failure(&self, rule: &Rule, error: &RuleError) {
        if let SampleDecision::Log { suppressed } = self.sampler.sample(&rule.id).await {
            warn!(
                rule_id = %rule.id,
                error_kind = error.kind(),
                error = %error,
                suppressed,
                "Rule evaluation failed"
            );
        }
    }
}
