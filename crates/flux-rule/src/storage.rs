use crate::error::Result;
use crate::model::Rule;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// 规则存储适配器
///
/// 引擎只通过该接口读取规则和回写 `last_triggered`。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// 加载组织内作用于该设备的启用规则（设备专属规则和组织级规则）
    async fn load_active_rules(&self, organization_id: &str, device_id: &str) -> Result<Vec<Rule>>;

    /// 比较并交换 `last_triggered`
    ///
    /// 当前值等于 `expected` 时写入 `triggered_at` 并返回 true；
    /// 已被其他求值抢先更新时返回 false。
    async fn update_last_triggered(
        &self,
        rule_id: &str,
        expected: Option<DateTime<Utc>>,
        triggered_at: DateTime<Utc>,
    ) -> Result<bool>;
}

/// 表示"从未触发"的哨兵值
const NEVER: i64 = i64::MIN;

/// 触发记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerRecord {
    pub rule_id: String,
    pub organization_id: String,
    pub triggered_at: DateTime<Utc>,
}

/// 规则统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleStats {
    pub total_rules: u64,
    pub active_rules: u64,
    pub triggered_today: u64,
    pub triggered_this_week: u64,
}

struct StoredRule {
    rule: Rule,
    /// 毫秒时间戳，NEVER 表示从未触发
    last_triggered: Arc<AtomicI64>,
}

impl StoredRule {
    fn snapshot(&self) -> Rule {
        let mut rule = self.rule.clone();
        rule.last_triggered = from_millis(self.last_triggered.load(Ordering::Acquire));
        rule
    }
}

fn to_millis(ts: Option<DateTime<Utc>>) -> i64 {
    ts.map_or(NEVER, |t| t.timestamp_millis())
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    if ms == NEVER {
        None
    } else {
        Utc.timestamp_millis_opt(ms).single()
    }
}

/// 规则存储（内存实现）
pub struct InMemoryRuleStore {
    rules: Arc<RwLock<HashMap<String, StoredRule>>>,

    /// 触发历史（最新的在队尾）
    history: Arc<RwLock<VecDeque<TriggerRecord>>>,

    max_history: usize,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self {
            rules: Arc::new(RwLock::new(HashMap::new())),
            history: Arc::new(RwLock::new(VecDeque::new())),
            max_history: 10_000,
        }
    }

    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    /// 保存规则（覆盖同 ID 规则，规则自带的 `last_triggered` 作为初始值）
    pub async fn save(&self, mut rule: Rule) -> Result<()> {
        if rule.id.is_empty() {
            rule.id = uuid::Uuid::new_v4().to_string();
        }
        rule.updated_at = Utc::now();

        let stored = StoredRule {
            last_triggered: Arc::new(AtomicI64::new(to_millis(rule.last_triggered))),
            rule,
        };

        let mut rules = self.rules.write().await;
        info!(rule_id = %stored.rule.id, rule_name = %stored.rule.name, "Rule saved");
        rules.insert(stored.rule.id.clone(), stored);
        Ok(())
    }

    pub async fn get(&self, rule_id: &str) -> Result<Option<Rule>> {
        let rules = self.rules.read().await;
        Ok(rules.get(rule_id).map(StoredRule::snapshot))
    }

    pub async fn delete(&self, rule_id: &str) -> Result<()> {
        let mut rules = self.rules.write().await;
        rules.remove(rule_id);
        info!(rule_id = %rule_id, "Rule deleted");
        Ok(())
    }

    /// 列出组织内所有规则
    pub async fn list(&self, organization_id: &str) -> Result<Vec<Rule>> {
        let rules = self.rules.read().await;
        Ok(rules
            .values()
            .filter(|r| r.rule.organization_id == organization_id)
            .map(StoredRule::snapshot)
            .collect())
    }

    /// 设备专属规则
    pub async fn rules_by_device(&self, organization_id: &str, device_id: &str) -> Result<Vec<Rule>> {
        let rules = self.rules.read().await;
        Ok(rules
            .values()
            .filter(|r| {
                r.rule.organization_id == organization_id
                    && r.rule.device_id.as_deref() == Some(device_id)
            })
            .map(StoredRule::snapshot)
            .collect())
    }

    /// 触发历史，按时间倒序
    pub async fn trigger_history(&self, rule_id: Option<&str>, limit: usize) -> Vec<TriggerRecord> {
        let history = self.history.read().await;
        history
            .iter()
            .rev()
            .filter(|r| rule_id.map_or(true, |id| r.rule_id == id))
            .take(limit)
            .cloned()
            .collect()
    }

    /// 组织的规则统计；"本周"从周一 00:00 (UTC) 起算
    pub async fn rule_stats(&self, organization_id: &str, now: DateTime<Utc>) -> Result<RuleStats> {
        let (total_rules, active_rules) = {
            let rules = self.rules.read().await;
            let owned: Vec<_> = rules
                .values()
                .filter(|r| r.rule.organization_id == organization_id)
                .collect();
            (
                owned.len() as u64,
                owned.iter().filter(|r| r.rule.active).count() as u64,
            )
        };

        let start_of_day = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|d| d.and_utc())
            .unwrap_or(now);
        let start_of_week =
            start_of_day - Duration::days(now.weekday().num_days_from_monday() as i64);

        let history = self.history.read().await;
        let in_org = || {
            history
                .iter()
                .filter(|r| r.organization_id == organization_id && r.triggered_at <= now)
        };

        Ok(RuleStats {
            total_rules,
            active_rules,
            triggered_today: in_org().filter(|r| r.triggered_at >= start_of_day).count() as u64,
            triggered_this_week: in_org()
                .filter(|r| r.triggered_at >= start_of_week)
                .count() as u64,
        })
    }

    async fn record_trigger(&self, record: TriggerRecord) {
        let mut history = self.history.write().await;
        if history.len() >= self.max_history {
            history.pop_front();
        }
        history.push_back(record);
    }
}

impl Default for InMemoryRuleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RuleStore for InMemoryRuleStore {
    async fn load_active_rules(&self, organization_id: &str, device_id: &str) -> Result<Vec<Rule>> {
        let rules = self.rules.read().await;
        let mut loaded: Vec<Rule> = rules
            .values()
            .filter(|r| r.rule.active && r.rule.applies_to(organization_id, device_id))
            .map(StoredRule::snapshot)
            .collect();
        // 保证求值顺序稳定
        loaded.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(loaded)
    }

    async fn update_last_triggered(
        &self,
        rule_id: &str,
        expected: Option<DateTime<Utc>>,
        triggered_at: DateTime<Utc>,
    ) -> Result<bool> {
        let (slot, organization_id) = {
            let rules = self.rules.read().await;
            match rules.get(rule_id) {
                Some(r) => (r.last_triggered.clone(), r.rule.organization_id.clone()),
                None => {
                    debug!(rule_id = %rule_id, "Rule vanished before last_triggered update");
                    return Ok(false);
                }
            }
        };

        let swapped = slot
            .compare_exchange(
                to_millis(expected),
                triggered_at.timestamp_millis(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();

        if swapped {
            self.record_trigger(TriggerRecord {
                rule_id: rule_id.to_string(),
                organization_id,
                triggered_at,
            })
            .await;
        }

        Ok(swapped)
    }
}
