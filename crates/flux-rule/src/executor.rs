use crate::dispatcher::ActionDispatchRequest;
use crate::error::{Result, RuleError};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

/// 动作执行器
///
/// 引擎只负责提交，执行结果和重试由执行器自己处理。
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn submit(&self, request: ActionDispatchRequest) -> Result<()>;
}

/// 将派发请求写入有界队列，由下游消费
#[derive(Clone)]
pub struct ChannelActionExecutor {
    sender: mpsc::Sender<ActionDispatchRequest>,
}

impl ChannelActionExecutor {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ActionDispatchRequest>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl ActionExecutor for ChannelActionExecutor {
    async fn submit(&self, request: ActionDispatchRequest) -> Result<()> {
        let request_id = request.id.clone();
        self.sender
            .send(request)
            .await
            .map_err(|e| RuleError::ExecutorUnavailable(e.to_string()))?;
        debug!(request_id = %request_id, "Dispatch request queued");
        Ok(())
    }
}
