use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// 采样策略
#[derive(Debug, Clone)]
pub enum SamplingStrategy {
    /// 始终记录
    Always,

    /// 从不记录
    Never,

    /// 每个 key 在时间窗口内最多记录 N 条
    RateLimit { max_per_window: u32, window: Duration },
}

/// 采样结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleDecision {
    /// 记录；`suppressed` 为上次记录后被丢弃的条数
    Log { suppressed: u64 },
    Suppress,
}

impl SampleDecision {
    pub fn should_log(&self) -> bool {
        matches!(self, SampleDecision::Log { .. })
    }
}

struct KeyWindow {
    started: Instant,
    logged: u32,
    suppressed: u64,
}

/// 按 key 采样的日志限流器
///
/// 同一条配置错误的规则每个事件都会失败，按规则 ID 限流可以避免刷屏。
pub struct LogSampler {
    strategy: SamplingStrategy,
    windows: RwLock<HashMap<String, KeyWindow>>,
    total_suppressed: AtomicU64,
}

impl LogSampler {
    pub fn new(strategy: SamplingStrategy) -> Self {
        Self {
            strategy,
            windows: RwLock::new(HashMap::new()),
            total_suppressed: AtomicU64::new(0),
        }
    }

    pub fn rate_limited(max_per_window: u32, window: Duration) -> Self {
        Self::new(SamplingStrategy::RateLimit {
            max_per_window,
            window,
        })
    }

    /// 判断该 key 的日志是否应该记录
    pub async fn sample(&self, key: &str) -> SampleDecision {
        self.sample_at(key, Instant::now()).await
    }

    async fn sample_at(&self, key: &str, now: Instant) -> SampleDecision {
        match &self.strategy {
            SamplingStrategy::Always => SampleDecision::Log { suppressed: 0 },

            SamplingStrategy::Never => {
                self.total_suppressed.fetch_add(1, Ordering::Relaxed);
                SampleDecision::Suppress
            }

            SamplingStrategy::RateLimit {
                max_per_window,
                window,
            } => {
                let mut windows = self.windows.write().await;
                let entry = windows.entry(key.to_string()).or_insert(KeyWindow {
                    started: now,
                    logged: 0,
                    suppressed: 0,
                });

                // 窗口过期，重新计数
                if now.duration_since(entry.started) >= *window {
                    entry.started = now;
                    entry.logged = 0;
                }

                if entry.logged < *max_per_window {
                    entry.logged += 1;
                    let suppressed = std::mem::take(&mut entry.suppressed);
                    SampleDecision::Log { suppressed }
                } else {
                    entry.suppressed += 1;
                    self.total_suppressed.fetch_add(1, Ordering::Relaxed);
                    SampleDecision::Suppress
                }
            }
        }
    }

    /// 被丢弃的日志总数
    pub fn total_suppressed(&self) -> u64 {
        self.total_suppressed.load(Ordering::Relaxed)
    }

    /// 清除某个 key 的计数
    pub async fn reset(&self, key: &str) {
        self.windows.write().await.remove(key);
    }
}

impl Default for LogSampler {
    fn default() -> Self {
        Self::new(SamplingStrategy::Always)
    }
}
