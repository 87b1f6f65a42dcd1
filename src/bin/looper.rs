//! looper CLI: inspect the API-level gates and exercise worker threads.

use clap::{Parser, Subcommand};
use looper_rs::build_check::{ApiLevel, BuildCheck, EnvApiLevel};
use looper_rs::config::Config;
use looper_rs::looper::WorkerGroup;
use looper_rs::telemetry::{TelemetryConfig, init_telemetry};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "looper", about = "Worker threads and API-level gates")]
struct Cli {
    /// Optional TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the API-level gate results
    Check {
        /// Override the configured API level
        #[arg(long)]
        api_level: Option<u32>,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Start workers, post tasks to them, then shut them down
    Run {
        /// Number of worker threads
        #[arg(long, default_value_t = 2)]
        workers: usize,
        /// Tasks posted to each worker
        #[arg(long, default_value_t = 10)]
        tasks: u64,
        /// Delay before each task becomes due
        #[arg(long, default_value_t = 0)]
        delay_ms: u64,
        /// Keep workers alive until Ctrl-C
        #[arg(long)]
        hold: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => Config::load(path)?,
        None => Config::from_env()?,
    };

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "looper".to_string(),
        log_level: config.log_level.clone(),
    })?;

    match cli.command {
        Command::Check { api_level, json } => cmd_check(&config, api_level, json),
        Command::Run {
            workers,
            tasks,
            delay_ms,
            hold,
        } => cmd_run(workers, tasks, Duration::from_millis(delay_ms), hold).await,
    }
}

fn cmd_check(config: &Config, api_level: Option<u32>, json: bool) -> anyhow::Result<()> {
    let report = match api_level.map(ApiLevel).or(config.api_level) {
        Some(level) => BuildCheck::new(level).report(),
        None => BuildCheck::new(EnvApiLevel).report(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("API level:    {}", report.api_level);
    println!("lollipop:     {}", report.lollipop);
    println!("marshmallow:  {}", report.marshmallow);
    println!("android5:     {}", report.android5);
    println!("api31:        {}", report.api31);
    Ok(())
}

async fn cmd_run(workers: usize, tasks: u64, delay: Duration, hold: bool) -> anyhow::Result<()> {
    if workers == 0 {
        anyhow::bail!("--workers must be at least 1");
    }

    let mut group = WorkerGroup::new();
    let completed = Arc::new(AtomicU64::new(0));

    for i in 0..workers {
        let handler = group.spawn(format!("looper-{i}"))?;
        for n in 0..tasks {
            let completed = Arc::clone(&completed);
            let name = handler.name().to_string();
            let task = move || {
                tracing::debug!(worker = %name, task = n, "task ran");
                completed.fetch_add(1, Ordering::Relaxed);
            };
            if delay.is_zero() {
                handler.post(task)?;
            } else {
                handler.post_delayed(task, delay)?;
            }
        }
    }

    if hold {
        println!("{} worker(s) running, press Ctrl-C to stop", group.len());
        tokio::signal::ctrl_c().await?;
    } else if !delay.is_zero() {
        // Let delayed tasks become due; quit_safely drops anything still in the future.
        tokio::time::sleep(delay).await;
    }

    let results = tokio::task::spawn_blocking(move || group.shutdown()).await?;

    println!("{:<12}  {:>8}  {:>8}  {:>9}", "WORKER", "EXECUTED", "PANICKED", "DISCARDED");
    println!("{}", "-".repeat(45));
    for (name, result) in results {
        match result {
            Ok(stats) => println!(
                "{:<12}  {:>8}  {:>8}  {:>9}",
                name, stats.executed, stats.panicked, stats.discarded
            ),
            Err(e) => println!("{name:<12}  error: {e}"),
        }
    }
    println!("\n{} task(s) completed", completed.load(Ordering::Relaxed));
    Ok(())
}
