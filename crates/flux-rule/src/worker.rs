use crate::error::{Result, RuleError};
use crate::matcher::RuleMatcher;
use flux_types::DeviceEvent;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 工作池配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPoolConfig {
    pub workers: usize,
    /// 每个 worker 的队列容量
    pub queue_capacity: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 1024,
        }
    }
}

/// 规则求值工作池
///
/// 按设备 ID 分片，同一设备的事件在同一个 worker 上按到达顺序处理。
/// 每个事件在独立任务中求值，panic 只影响该事件。
pub struct RuleWorkerPool {
    senders: Vec<mpsc::Sender<DeviceEvent>>,
    handles: Vec<JoinHandle<()>>,
}

impl RuleWorkerPool {
    pub fn start(matcher: Arc<RuleMatcher>, config: WorkerPoolConfig) -> Self {
        let workers = config.workers.max(1);
        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for shard in 0..workers {
            let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
            senders.push(tx);
            handles.push(tokio::spawn(run_worker(shard, matcher.clone(), rx)));
        }

        info!(workers, queue_capacity = config.queue_capacity, "Rule worker pool started");
        Self { senders, handles }
    }

    pub fn workers(&self) -> usize {
        self.senders.len()
    }

    /// 事件所在的分片
    pub fn shard_for(&self, device_id: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        device_id.hash(&mut hasher);
        (hasher.finish() % self.senders.len() as u64) as usize
    }

    /// 提交事件；队列满时等待
    pub async fn submit(&self, event: DeviceEvent) -> Result<()> {
        let shard = self.shard_for(event.device_id());
        self.senders[shard]
            .send(event)
            .await
            .map_err(|e| RuleError::ChannelSend(format!("worker {} stopped: {}", shard, e)))
    }

    /// 关闭队列并等待已提交的事件处理完
    pub async fn shutdown(self) {
        drop(self.senders);
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Rule worker exited abnormally");
            }
        }
        info!("Rule worker pool stopped");
    }
}

async fn run_worker(shard: usize, matcher: Arc<RuleMatcher>, mut rx: mpsc::Receiver<DeviceEvent>) {
    debug!(shard, "Rule worker started");

    while let Some(event) = rx.recv().await {
        let device_id = event.device_id().to_string();
        let matcher = matcher.clone();
        let task = tokio::spawn(async move { matcher.on_event(&event).await });

        match task.await {
            Ok(Ok(report)) => {
                if !report.fired.is_empty() {
                    debug!(shard, device_id = %device_id, fired = report.fired.len(), "Event processed");
                }
            }
            Ok(Err(e)) => {
                warn!(shard, device_id = %device_id, error_kind = e.kind(), error = %e, "Event evaluation failed");
            }
            Err(e) => {
                error!(shard, device_id = %device_id, error = %e, "Event evaluation panicked");
            }
        }
    }

    debug!(shard, "Rule worker stopped");
}
