mod cli;
mod metric_defs;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::LogFormat;
use colored::Colorize;
use lib::config::ConfigLoader;
use lib::shutdown::Shutdown;
use metrics_exporter_prometheus::PrometheusBuilder;
use metrics_util::MetricKindMask;
use scheduler::memory::{
    AlwaysValid,
    InMemoryExecutionQueue,
    InMemoryExecutionStore,
    InMemoryFlowCatalog,
    InMemoryTriggerStore,
    PassthroughRunContextFactory,
};
use scheduler::traits::SystemClock;
use scheduler::{Scheduler, SchedulerDeps};
use tokio::{select, time};
use tracing::{debug, info, trace, warn, Subscriber};
use tracing_subscriber::FmtSubscriber;

fn setup_logging_subscriber(f: &LogFormat) -> Box<dyn Subscriber + Send + Sync> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "flowschedd=debug,scheduler=debug".into());

    let sub = FmtSubscriber::builder()
        .with_thread_names(true)
        .with_max_level(tracing::Level::INFO)
        .with_env_filter(env_filter);

    match f {
        LogFormat::Pretty => Box::new(sub.pretty().finish()),
        LogFormat::Compact => Box::new(sub.compact().finish()),
        LogFormat::Json => Box::new(sub.json().finish()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(e) if e.not_found() => {}
        Err(e) => bail!("failed to load .env file: {e}"),
    }

    let opts = cli::CliOpts::parse();
    let mut shutdown = Shutdown::default();

    tracing::subscriber::set_global_default(setup_logging_subscriber(&opts.log_format))?;

    debug!("** {} **", "flowschedd".magenta());
    trace!(config = ?opts.config, "loading configuration");
    let config_loader = ConfigLoader::from_path(&opts.config);
    let config = config_loader.load()?;

    let prometheus_addr: SocketAddr =
        format!("{}:{}", config.main.prometheus_address, config.main.prometheus_port)
            .parse()
            .context("invalid prometheus listener address")?;
    info!(%prometheus_addr, "starting Prometheus HTTP listener");
    PrometheusBuilder::new()
        .idle_timeout(MetricKindMask::HISTOGRAM, Some(Duration::from_secs(120)))
        .with_http_listener(prometheus_addr)
        .install()
        .expect("failed to install Prometheus recorder");
    metric_defs::install_metrics();
    metric_defs::record_build_info();

    // No external flow source, persistence layer, or execution queue is
    // wired in standalone mode: this binary is the embedder referenced by
    // the scheduler crate's docs, running entirely against the in-memory
    // reference collaborators. An embedder with a real flow source would
    // replace `InMemoryFlowCatalog` with its own `FlowCatalog` and seed it
    // continuously, rather than once at startup.
    let deps = SchedulerDeps {
        flow_catalog: InMemoryFlowCatalog::new(),
        condition_evaluator: Arc::new(AlwaysValid),
        trigger_store: InMemoryTriggerStore::new(),
        execution_store: InMemoryExecutionStore::new(),
        run_context_factory: Arc::new(PassthroughRunContextFactory),
        execution_queue: InMemoryExecutionQueue::new(),
        clock: Arc::new(SystemClock),
    };
    let scheduler = Scheduler::new(deps, Duration::from_millis(config.scheduler.tick_period_ms));

    scheduler.start().await;
    info!("scheduler started");

    select! {
        _ = shutdown.recv() => {
            warn!("received shutdown signal from a downstream component");
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("received Ctrl+C (SIGINT)");
            shutdown.broadcast_shutdown();
        }
    };

    metric_defs::record_shutdown();
    info!(
        "waiting ({}ms) for the scheduler to close cleanly...",
        config.scheduler.drain_timeout_ms
    );
    let drain_timeout = Duration::from_millis(config.scheduler.drain_timeout_ms);
    if time::timeout(drain_timeout, scheduler.close()).await.is_err() {
        warn!("scheduler did not close within the drain timeout");
    }
    info!("bye!");

    Ok(())
}
