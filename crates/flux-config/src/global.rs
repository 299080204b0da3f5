use anyhow::{anyhow, Result};
use flux_logging::LoggingConfig;
use flux_rule::{MatcherConfig, WorkerPoolConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 规则引擎配置
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RuleEngineConfig {
    pub system: SystemConfig,
    pub matcher: MatcherSettings,
    pub workers: WorkerSettings,
    pub logging: LoggingConfig,
    pub metrics: MetricsSettings,
}

/// 系统配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemConfig {
    pub name: String,
    pub version: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            name: "FLUX IOT Rule Engine".to_string(),
            version: "1.0.0".to_string(),
        }
    }
}

/// 匹配器配置（毫秒）
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MatcherSettings {
    pub min_retrigger_interval_ms: u64,
    pub store_timeout_ms: u64,
    pub dispatch_timeout_ms: u64,
    pub failure_log_limit: u32,
    pub failure_log_window_ms: u64,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            min_retrigger_interval_ms: 60_000,
            store_timeout_ms: 5_000,
            dispatch_timeout_ms: 5_000,
            failure_log_limit: 5,
            failure_log_window_ms: 60_000,
        }
    }
}

impl MatcherSettings {
    pub fn to_matcher_config(&self) -> MatcherConfig {
        MatcherConfig {
            min_retrigger_interval: Duration::from_millis(self.min_retrigger_interval_ms),
            store_timeout: Duration::from_millis(self.store_timeout_ms),
            dispatch_timeout: Duration::from_millis(self.dispatch_timeout_ms),
            failure_log_limit: self.failure_log_limit,
            failure_log_window: Duration::from_millis(self.failure_log_window_ms),
        }
    }
}

/// 工作池配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerSettings {
    pub count: usize,
    /// 每个 worker 的事件队列容量
    pub queue_capacity: usize,
    /// 动作派发队列容量
    pub dispatch_capacity: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            count: 4,
            queue_capacity: 1024,
            dispatch_capacity: 1024,
        }
    }
}

impl WorkerSettings {
    pub fn to_pool_config(&self) -> WorkerPoolConfig {
        WorkerPoolConfig {
            workers: self.count,
            queue_capacity: self.queue_capacity,
        }
    }
}

/// 指标导出配置
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsSettings {
    /// Prometheus 监听地址，未设置时不导出
    pub listen_addr: Option<String>,
}

impl RuleEngineConfig {
    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        if self.workers.count == 0 {
            return Err(anyhow!("workers.count must be greater than 0"));
        }
        if self.workers.queue_capacity == 0 {
            return Err(anyhow!("workers.queue_capacity must be greater than 0"));
        }
        if self.workers.dispatch_capacity == 0 {
            return Err(anyhow!("workers.dispatch_capacity must be greater than 0"));
        }
        if self.matcher.store_timeout_ms == 0 {
            return Err(anyhow!("matcher.store_timeout_ms must be greater than 0"));
        }
        if self.matcher.dispatch_timeout_ms == 0 {
            return Err(anyhow!("matcher.dispatch_timeout_ms must be greater than 0"));
        }
        if self.matcher.failure_log_window_ms == 0 {
            return Err(anyhow!("matcher.failure_log_window_ms must be greater than 0"));
        }
        if let Some(addr) = &self.metrics.listen_addr {
            addr.parse::<std::net::SocketAddr>()
                .map_err(|e| anyhow!("metrics.listen_addr {:?} is invalid: {}", addr, e))?;
        }
        Ok(())
    }

    /// 序列化为 TOML，用于生成配置模板
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
