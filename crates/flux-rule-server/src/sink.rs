use anyhow::Result;
use flux_rule::ActionDispatchRequest;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// 派发请求的下游：每条请求写成一行 JSON
///
/// 通道关闭后返回写出的请求数。
pub async fn run_sink<W>(mut rx: mpsc::Receiver<ActionDispatchRequest>, mut writer: W) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;

    while let Some(request) = rx.recv().await {
        debug!(
            request_id = %request.id,
            rule_id = %request.context.rule_id,
            action_type = %request.action_type,
            "Dispatch request received"
        );

        let mut line = serde_json::to_vec(&request)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
        written += 1;
    }

    info!(written, "Dispatch sink closed");
    Ok(written)
}
