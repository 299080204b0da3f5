use crate::metrics;
use anyhow::Result;
use flux_rule::RuleWorkerPool;
use flux_types::DeviceEvent;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

/// 读取统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub accepted: u64,
    pub rejected: u64,
}

/// 逐行读取 JSON 事件并提交给工作池
///
/// 无法解析的行记录后跳过；空行忽略。工作池停止时返回错误。
pub async fn ingest_lines<R>(reader: R, pool: &RuleWorkerPool) -> Result<IngestStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut stats = IngestStats::default();
    let mut line_no = 0u64;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: DeviceEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                stats.rejected += 1;
                metrics::record_rejected_line();
                warn!(line = line_no, error = %e, "Malformed event line skipped");
                continue;
            }
        };

        pool.submit(event).await?;
        stats.accepted += 1;
    }

    info!(accepted = stats.accepted, rejected = stats.rejected, "Event input closed");
    Ok(stats)
}
