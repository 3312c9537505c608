// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use axum::{http::StatusCode, routing::get, Router};
use clap::Parser;
use futures::StreamExt;
use kube::{
    runtime::{
        reflector::{self, store::Writer},
        watcher, WatchStreamExt,
    },
    Api, Client,
};
use spaces::{
    constants::{
        DEFAULT_FIELD_MANAGER, DEFAULT_MAX_HIERARCHY_OBJECTS, DEFAULT_PER_OBJECT_TIMEOUT_SECS,
        DEFAULT_REQUEUE_NOT_READY_SECS, DEFAULT_REQUEUE_READY_SECS, METRICS_SERVER_BIND_ADDRESS,
        METRICS_SERVER_PATH, METRICS_SERVER_PORT, TOKIO_WORKER_THREADS,
    },
    context::{Context, Settings, Stores},
    crd::{ConfigurationOverride, ControlPlane, InControlPlaneOverride},
    metrics::gather_metrics,
    override_controller::run_override_controller,
    reconcilers::overrides::{walker::TraversalLimits, PassSettings},
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Spaces override controller.
///
/// Propagates `InControlPlaneOverride` and `ConfigurationOverride` patches into the
/// object hierarchies of managed control planes.
#[derive(Parser, Debug)]
#[command(name = "spaces-controller", version, about)]
struct Cli {
    /// Field manager used for server-side apply inside control planes
    #[arg(long, env = "SPACES_FIELD_MANAGER", default_value = DEFAULT_FIELD_MANAGER)]
    field_manager: String,

    /// Maximum number of objects visited per hierarchy walk, target included
    #[arg(long, env = "SPACES_MAX_HIERARCHY_OBJECTS", default_value_t = DEFAULT_MAX_HIERARCHY_OBJECTS)]
    max_hierarchy_objects: usize,

    /// Timeout of every single fetch and apply, in seconds
    #[arg(long, env = "SPACES_PER_OBJECT_TIMEOUT_SECS", default_value_t = DEFAULT_PER_OBJECT_TIMEOUT_SECS)]
    per_object_timeout_secs: u64,

    /// Requeue interval of ready overrides, in seconds
    #[arg(long, env = "SPACES_REQUEUE_READY_SECS", default_value_t = DEFAULT_REQUEUE_READY_SECS)]
    requeue_ready_secs: u64,

    /// Requeue interval of overrides that are not ready, in seconds
    #[arg(long, env = "SPACES_REQUEUE_NOT_READY_SECS", default_value_t = DEFAULT_REQUEUE_NOT_READY_SECS)]
    requeue_not_ready_secs: u64,

    /// Address the metrics server binds to
    #[arg(long, env = "SPACES_METRICS_BIND_ADDRESS", default_value = METRICS_SERVER_BIND_ADDRESS)]
    metrics_bind_address: String,

    /// Port of the metrics server
    #[arg(long, env = "SPACES_METRICS_PORT", default_value_t = METRICS_SERVER_PORT)]
    metrics_port: u16,
}

impl Cli {
    /// Controller settings derived from the command line.
    fn settings(&self) -> Settings {
        Settings {
            field_manager: self.field_manager.clone(),
            pass: PassSettings {
                limits: TraversalLimits::new(self.max_hierarchy_objects),
                per_object_timeout: Duration::from_secs(self.per_object_timeout_secs),
            },
            requeue_ready: Duration::from_secs(self.requeue_ready_secs),
            requeue_not_ready: Duration::from_secs(self.requeue_not_ready_secs),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("spaces-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

/// Initialize logging.
///
/// Respects `RUST_LOG` (default `info`) and `RUST_LOG_FORMAT` (`json` or `text`).
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main(cli: Cli) -> Result<()> {
    init_tracing();

    info!("Starting Spaces override controller");
    debug!(?cli, "Parsed command line");

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let (control_planes, control_plane_writer) = reflector::store::<ControlPlane>();
    let context = Arc::new(Context::new(
        client.clone(),
        Stores { control_planes },
        cli.settings(),
    ));

    info!("Starting all controllers");

    // Controllers should never exit - if one fails, we log it and exit the main process
    let result = tokio::select! {
        result = run_control_plane_reflector(client.clone(), control_plane_writer) => {
            error!("CRITICAL: ControlPlane reflector exited unexpectedly: {:?}", result);
            result.and_then(|()| Err(anyhow::anyhow!("ControlPlane reflector exited unexpectedly without error")))
        }
        result = run_override_controller::<InControlPlaneOverride>(context.clone()) => {
            error!("CRITICAL: InControlPlaneOverride controller exited unexpectedly: {:?}", result);
            result.and_then(|()| Err(anyhow::anyhow!("InControlPlaneOverride controller exited unexpectedly without error")))
        }
        result = run_override_controller::<ConfigurationOverride>(context.clone()) => {
            error!("CRITICAL: ConfigurationOverride controller exited unexpectedly: {:?}", result);
            result.and_then(|()| Err(anyhow::anyhow!("ConfigurationOverride controller exited unexpectedly without error")))
        }
        result = run_metrics_server(&cli.metrics_bind_address, cli.metrics_port) => {
            error!("CRITICAL: Metrics server exited unexpectedly: {:?}", result);
            result.and_then(|()| Err(anyhow::anyhow!("Metrics server exited unexpectedly without error")))
        }
        result = cancel_on(shutdown_signal(), &context.shutdown) => {
            info!("Shutdown signal received, stopping controllers");
            result
        }
    };

    result
}

/// Wait for `signal`, then cancel `shutdown`.
///
/// The token is cancelled while the controllers are still alive, so in-flight passes
/// are abandoned through their child tokens before the controllers are dropped.
/// Nothing partial is persisted.
async fn cancel_on<F>(signal: F, shutdown: &CancellationToken) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    let result = signal.await;
    shutdown.cancel();
    result
}

/// Keep the `ControlPlane` store in sync with the host cluster.
async fn run_control_plane_reflector(client: Client, writer: Writer<ControlPlane>) -> Result<()> {
    info!("Starting ControlPlane reflector");

    let api = Api::<ControlPlane>::all(client);
    reflector::reflector(writer, watcher(api, watcher::Config::default()))
        .default_backoff()
        .applied_objects()
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Serve Prometheus metrics.
async fn run_metrics_server(bind_address: &str, port: u16) -> Result<()> {
    let router = Router::new().route(METRICS_SERVER_PATH, get(metrics_handler));
    let listener = TcpListener::bind(format!("{bind_address}:{port}")).await?;
    info!("Metrics server listening on {bind_address}:{port}{METRICS_SERVER_PATH}");

    axum::serve(listener, router).await?;
    Ok(())
}

async fn metrics_handler() -> (StatusCode, String) {
    match gather_metrics() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Resolve once SIGINT or SIGTERM is received.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    Ok(())
}
