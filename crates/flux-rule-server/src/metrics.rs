use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// 初始化 Prometheus metrics exporter
pub fn init_metrics(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    describe_metrics();

    tracing::info!("Metrics exporter started on http://{}/metrics", addr);
    Ok(())
}

/// 描述所有指标
fn describe_metrics() {
    // 规则引擎指标
    flux_rule::metrics::describe_metrics();

    // 输入相关指标
    describe_counter!(
        "flux_rule_rejected_lines_total",
        "Input lines that could not be parsed as device events"
    );
    describe_gauge!("flux_rule_rules_loaded", "Number of rules loaded at startup");
    describe_gauge!("flux_rule_devices_loaded", "Number of devices loaded at startup");
}

/// 记录无法解析的输入行
pub fn record_rejected_line() {
    counter!("flux_rule_rejected_lines_total", 1);
}

/// 记录启动时加载的规则和设备数
pub fn update_fixture_size(rules: usize, devices: usize) {
    gauge!("flux_rule_rules_loaded", rules as f64);
    gauge!("flux_rule_devices_loaded", devices as f64);
}
