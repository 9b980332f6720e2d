//! loadtrace command line.
//!
//! ```text
//! loadtrace run <TARGET>    drive virtual users, export traced telemetry
//! loadtrace encode          mint a trace id and its propagation header
//! loadtrace decode <HEX>    print the fields of a trace id
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use reqwest::Method;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};

use loadtrace::client::{Instrumenter, RequestContext};
use loadtrace::config::{apply_env, load_config, LoadtraceConfig};
use loadtrace::ids::{TraceCode, TraceId};
use loadtrace::lifecycle::{wait_for_shutdown_signal, Session, Shutdown};
use loadtrace::observability::{logging, metrics};
use loadtrace::propagation::Propagator;

#[derive(Parser)]
#[command(name = "loadtrace")]
#[command(about = "Traced HTTP load generation with batched telemetry export", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides observability.log_level
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send traced requests to a target and export their telemetry
    Run {
        target: String,

        /// Concurrent virtual users
        #[arg(long, default_value_t = 1)]
        vus: usize,

        #[arg(long, default_value = "30s", value_parser = humantime::parse_duration)]
        duration: Duration,

        /// Sleep between iterations of one virtual user
        #[arg(long, default_value = "0s", value_parser = humantime::parse_duration)]
        pause: Duration,

        #[arg(long, default_value = "GET")]
        method: String,

        #[arg(long, default_value = "")]
        group: String,

        #[arg(long, default_value = "default")]
        scenario: String,
    },
    /// Mint a trace id and print it with its propagation header
    Encode {
        #[arg(long, value_parser = parse_code)]
        code: Option<TraceCode>,

        #[arg(long)]
        propagator: Option<Propagator>,

        /// Milliseconds since the Unix epoch, defaults to now
        #[arg(long)]
        timestamp_ms: Option<u64>,
    },
    /// Print the structured fields of a hex trace id
    Decode { trace_id: String },
}

struct RunArgs {
    target: String,
    vus: usize,
    duration: Duration,
    pause: Duration,
    method: Method,
    ctx: RequestContext,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => LoadtraceConfig::default(),
    };
    apply_env(&mut config, |key| std::env::var(key).ok())?;

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.observability.log_level.clone());
    logging::init_logging(&level).map_err(|e| e as Box<dyn std::error::Error>)?;

    match cli.command {
        Commands::Run {
            target,
            vus,
            duration,
            pause,
            method,
            group,
            scenario,
        } => {
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())?;
            let args = RunArgs {
                target,
                vus,
                duration,
                pause,
                method,
                ctx: RequestContext::new(group, scenario),
            };
            run(config, args).await?;
        }
        Commands::Encode {
            code,
            propagator,
            timestamp_ms,
        } => {
            let instrumenter = Instrumenter::new(
                code.unwrap_or(config.propagation.code),
                propagator.unwrap_or(config.propagation.propagator),
            );
            let prepared = match timestamp_ms {
                Some(timestamp_ms) => instrumenter.prepare_at(timestamp_ms)?,
                None => instrumenter.prepare()?,
            };

            println!("trace_id: {}", prepared.trace_id.as_hex());
            for (name, value) in prepared.headers.iter() {
                println!("{}: {}", name, value);
            }
        }
        Commands::Decode { trace_id } => {
            let id = TraceId::decode_hex(&trace_id)?;
            let fields = serde_json::json!({
                "prefix": format!("{:#o}", id.prefix()),
                "code": id.code(),
                "kind": id.kind(),
                "timestamp_ms": id.timestamp_ms(),
                "valid": id.is_valid(),
                "valid_cloud": id.is_valid_cloud(),
            });
            println!("{}", serde_json::to_string_pretty(&fields)?);
        }
    }

    Ok(())
}

async fn run(config: LoadtraceConfig, args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::start(&config)?;

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    tracing::info!(
        url = %args.target,
        vus = args.vus,
        duration = ?args.duration,
        "Starting virtual users"
    );

    let deadline = Instant::now() + args.duration;
    let shutdown = Shutdown::new();
    let mut users = JoinSet::new();

    for vu in 0..args.vus {
        let client = session.client().clone();
        let mut stop = shutdown.subscribe();
        let target = args.target.clone();
        let method = args.method.clone();
        let ctx = args.ctx.clone();
        let pause = args.pause;

        users.spawn(async move {
            let mut iterations: u64 = 0;
            loop {
                tokio::select! {
                    biased;
                    _ = stop.recv() => break,
                    _ = time::sleep_until(deadline) => break,
                    result = client.send(method.clone(), &target, &ctx, None) => {
                        iterations += 1;
                        match result {
                            Ok(traced) => tracing::debug!(
                                vu,
                                status = traced.response.status().as_u16(),
                                trace_id = %traced.trace_id.as_hex(),
                                "Iteration complete"
                            ),
                            Err(e) => tracing::warn!(vu, error = %e, "Request failed"),
                        }
                    }
                }
                if !pause.is_zero() {
                    time::sleep(pause).await;
                }
            }
            iterations
        });
    }

    tokio::select! {
        _ = wait_for_shutdown_signal() => {
            tracing::info!("Interrupted, stopping virtual users");
            shutdown.trigger();
        }
        _ = time::sleep_until(deadline) => {}
    }

    let mut iterations = 0;
    while let Some(joined) = users.join_next().await {
        match joined {
            Ok(count) => iterations += count,
            Err(e) => tracing::error!(error = %e, "Virtual user task failed"),
        }
    }

    session.shutdown().await;
    tracing::info!(
        iterations,
        test_run_id = session.settings().test_run_id,
        "Run complete"
    );
    Ok(())
}

fn parse_code(raw: &str) -> Result<TraceCode, String> {
    match raw.to_ascii_lowercase().as_str() {
        "cloud" => Ok(TraceCode::Cloud),
        "local" => Ok(TraceCode::Local),
        other => Err(format!("unknown trace code '{}', expected cloud or local", other)),
    }
}
