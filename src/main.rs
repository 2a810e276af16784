use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use showtime_watcher::artifacts::ArtifactWriter;
use showtime_watcher::config::LoggingConfig;
use showtime_watcher::notifiers::NotifierManager;
use showtime_watcher::shutdown;
use showtime_watcher::status::{JsonLinesStatusSink, LogStatusSink, StatusSink};
use showtime_watcher::store::{NotificationStore, SqliteStore};
use showtime_watcher::{retention, AppConfig, Pipeline, Scheduler};

#[derive(Parser)]
#[command(name = "showtime-watcher", version, about = "Watch showtime listings for special events")]
struct Cli {
    /// Base configuration file, without extension
    #[arg(short, long, default_value = "config/default")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run on the configured schedule until Ctrl-C (default)
    Serve,
    /// Run the pipeline once and exit
    RunOnce {
        /// Log messages instead of sending them
        #[arg(long)]
        dry_run: bool,
    },
    /// Evict expired notification records and stale artifacts
    Cleanup,
    /// Print notification history statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config).context("failed to load configuration")?;
    let _log_guard = init_tracing(&config.logging)?;

    let store = Arc::new(
        SqliteStore::connect(&config.database.url, config.database.max_connections)
            .await
            .context("failed to open notification store")?,
    );

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config, store.clone()).await?,
        Command::RunOnce { dry_run } => {
            config.notifications.dry_run |= dry_run;
            run_once(&config, store.clone()).await?
        }
        Command::Cleanup => {
            let artifacts = ArtifactWriter::new(&config.output.dir);
            let report = retention::cleanup(&*store, Some(&artifacts), &config.retention, Utc::now()).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Stats => {
            let stats = store.statistics(Local::now().date_naive()).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    store.close().await;
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::from_default_env().add_directive("showtime_watcher=info".parse()?);
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact());

    match &logging.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "showtime-watcher.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Ok(Some(guard))
        }
        None => {
            registry.init();
            Ok(None)
        }
    }
}

fn status_sink(config: &AppConfig) -> Arc<dyn StatusSink> {
    match &config.output.status_file {
        Some(path) => Arc::new(JsonLinesStatusSink::new(path)),
        None => Arc::new(LogStatusSink),
    }
}

async fn build_pipeline(config: &AppConfig, store: Arc<SqliteStore>) -> Result<(Pipeline, NotifierManager)> {
    let manager = NotifierManager::from_config(&config.notifications).await?;
    info!(targets = ?manager.list_notifier_types().await, "Notification targets ready");
    manager.check_connections().await;

    let pipeline = Pipeline::from_config(config, store, Arc::new(manager.clone()))?;
    Ok((pipeline, manager))
}

async fn serve(config: &AppConfig, store: Arc<SqliteStore>) -> Result<()> {
    info!("Starting Showtime Watcher...");
    let (pipeline, manager) = build_pipeline(config, store).await?;

    let mut scheduler = Scheduler::new(
        Arc::new(pipeline),
        status_sink(config),
        config.scheduler.clone(),
        config.retention.clone(),
    );
    if config.output.save_artifacts {
        scheduler = scheduler.with_artifacts(ArtifactWriter::new(&config.output.dir));
    }

    let (trigger, shutdown) = shutdown::channel();
    let handle = tokio::spawn(Arc::new(scheduler).run(shutdown));

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    trigger.trigger();

    let stats = handle.await?;
    info!(
        total_runs = stats.total_runs,
        failed_runs = stats.failed_runs,
        skipped_ticks = stats.skipped_ticks,
        uptime_seconds = stats.uptime_seconds,
        "Scheduler finished"
    );

    manager.shutdown().await?;
    Ok(())
}

async fn run_once(config: &AppConfig, store: Arc<SqliteStore>) -> Result<()> {
    let (pipeline, manager) = build_pipeline(config, store).await?;

    let (trigger, shutdown) = shutdown::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.trigger();
        }
    });

    let status = pipeline.run_once(&shutdown).await;
    status_sink(config).record(&status).await?;
    manager.shutdown().await?;

    if !status.is_success() {
        anyhow::bail!(
            "run failed: {}",
            status.error_summary.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
