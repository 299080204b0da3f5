use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use flux_config::ConfigLoader;
use flux_logging::init_logging;
use flux_rule::{
    ChannelActionExecutor, InMemoryDeviceDirectory, InMemoryRuleStore, RuleMatcher, RuleWorkerPool,
};
use flux_rule_server::{ingest_lines, metrics, run_sink, Fixture};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config directory containing rule_engine.toml
    #[arg(short, long, default_value = "config")]
    config: PathBuf,

    /// JSON fixture with devices and rules to preload
    #[arg(short, long)]
    fixture: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = ConfigLoader::new(&args.config).load_validated()?;
    if args.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    init_logging(&config.logging)?;
    tracing::info!(
        name = %config.system.name,
        version = %config.system.version,
        config_dir = %args.config.display(),
        "Starting rule engine"
    );

    if let Some(addr) = &config.metrics.listen_addr {
        let addr: SocketAddr = addr.parse().context("Invalid metrics listen address")?;
        metrics::init_metrics(addr)?;
    }

    let store = Arc::new(InMemoryRuleStore::new());
    let directory = Arc::new(InMemoryDeviceDirectory::new());

    let mut organizations = Vec::new();
    if let Some(path) = &args.fixture {
        let fixture = Fixture::load(path)?;
        metrics::update_fixture_size(fixture.rules.len(), fixture.devices.len());
        organizations.extend(fixture.organizations());
        fixture.install(&store, &directory).await?;
    }

    let (executor, requests) = ChannelActionExecutor::new(config.workers.dispatch_capacity);
    let sink = tokio::spawn(run_sink(requests, tokio::io::stdout()));

    let matcher = Arc::new(RuleMatcher::with_config(
        store.clone(),
        directory,
        Arc::new(executor),
        config.matcher.to_matcher_config(),
    ));
    let pool = RuleWorkerPool::start(matcher, config.workers.to_pool_config());

    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = ingest_lines(stdin, &pool) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Event ingest failed");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    // 工作池停止后执行器随匹配器一起释放，派发通道随之关闭
    pool.shutdown().await;
    match sink.await {
        Ok(Ok(written)) => tracing::info!(written, "Dispatch requests written"),
        Ok(Err(e)) => tracing::error!(error = %e, "Dispatch sink failed"),
        Err(e) => tracing::error!(error = %e, "Dispatch sink panicked"),
    }

    let now = Utc::now();
    for organization_id in &organizations {
        let stats = store.rule_stats(organization_id, now).await?;
        tracing::info!(
            organization_id = %organization_id,
            total_rules = stats.total_rules,
            active_rules = stats.active_rules,
            triggered_today = stats.triggered_today,
            triggered_this_week = stats.triggered_this_week,
            "Rule statistics"
        );
    }

    tracing::info!("Rule engine stopped");
    Ok(())
}
