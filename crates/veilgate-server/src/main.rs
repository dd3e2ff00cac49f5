//! VeilGate server
//!
//! Streaming PII redaction gateway for object reads:
//! - Serves `GET /objects/{key}` with redaction applied on the fly
//! - Pluggable object store backend (filesystem, HTTP, in-memory)
//! - Built-in and custom regex detectors, sealed at startup
//! - Prometheus metrics and health endpoints
//!
//! Usage:
//! ```bash
//! # With config file
//! veilgate serve --config veilgate.yaml
//!
//! # Or with environment variables
//! VEILGATE_STORE_ROOT=/var/data/objects veilgate serve
//!
//! # Validate a config without serving
//! veilgate check-config --config veilgate.yaml
//! ```
//!
//! Test with:
//! ```bash
//! curl http://localhost:8080/objects/docs/letter.txt
//! curl -H 'Range: bytes=0-1023' http://localhost:8080/objects/big.log
//! curl http://localhost:8080/metrics
//! ```

mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::{ServerConfig, StoreConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use veilgate_core::ObjectStore;
use veilgate_ingress::{RedactionPolicy, TransformAdapter};
use veilgate_observability::{
    BackendStatus, HealthState, Metrics, ReadinessChecker, health_router,
};
use veilgate_pii::builtin;
use veilgate_pii::registry::DetectorRegistry;
use veilgate_pipeline::RedactionPipeline;
use veilgate_store::{FsObjectStore, HttpObjectStore, HttpStoreConfig, MemoryObjectStore};

const BANNER: &str = r#"
 __     __   _ _  ____       _
 \ \   / /__(_) |/ ___| __ _| |_ ___
  \ \ / / _ \ | | |  _ / _` | __/ _ \
   \ V /  __/ | | |_| | (_| | ||  __/
    \_/ \___|_|_|\____|\__,_|\__\___|

    streaming PII redaction for object reads
"#;

/// VeilGate - streaming PII redaction gateway
#[derive(Parser)]
#[command(name = "veilgate")]
#[command(about = "VeilGate redaction gateway server", long_about = None)]
#[command(before_help = BANNER)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file (YAML or TOML)
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "VEILGATE_CONFIG",
        global = true
    )]
    config: Option<String>,

    /// Port to listen on (overrides config file and environment)
    #[arg(short, long, value_name = "PORT", global = true)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the VeilGate server (default if no command specified)
    Serve,
    /// Validate the configuration and print the resolved detector set
    CheckConfig,
}

/// Reports the configured store backend for `/readyz`.
struct StoreReadiness {
    store: StoreConfig,
}

impl ReadinessChecker for StoreReadiness {
    fn is_ready(&self) -> bool {
        match &self.store {
            StoreConfig::Fs { root } => root.is_dir(),
            StoreConfig::Http { .. } | StoreConfig::Memory => true,
        }
    }

    fn backend_status(&self) -> BackendStatus {
        match &self.store {
            StoreConfig::Fs { root } => BackendStatus {
                name: "fs".to_string(),
                status: if root.is_dir() {
                    "available".to_string()
                } else {
                    "missing".to_string()
                },
                detail: Some(root.display().to_string()),
            },
            StoreConfig::Http { base_url } => BackendStatus {
                name: "http".to_string(),
                status: "configured".to_string(),
                detail: Some(base_url.clone()),
            },
            StoreConfig::Memory => BackendStatus {
                name: "memory".to_string(),
                status: "available".to_string(),
                detail: None,
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration, then let the environment override it
    let mut config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)
            .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", path, e))?,
        None => ServerConfig::default(),
    };
    config.merge_env();

    // CLI flags take precedence over file and environment
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }

    init_tracing(&config.logging.level)?;

    match cli.command {
        Some(Commands::CheckConfig) => return check_config(&config),
        Some(Commands::Serve) | None => {}
    }

    println!("{}", BANNER);
    info!("🚀 Initializing VeilGate v{}", env!("CARGO_PKG_VERSION"));

    // Detector registry, sealed before the first request
    let registry = Arc::new(build_registry(&config)?);
    info!(
        "🔍 Detector registry sealed: {} detectors, max pattern length {} bytes",
        registry.len(),
        registry.max_pattern_len()
    );

    let store = build_store(&config.store)?;
    let pipeline = Arc::new(
        RedactionPipeline::new(store, registry, config.pipeline.to_pipeline_config())
            .context("invalid pipeline configuration")?,
    );

    // Observability
    info!("📊 Initializing observability (metrics, health endpoints)");
    let metrics = Arc::new(Metrics::new().context("failed to create metrics")?);

    let policy = if config.redaction.extensions.is_empty() {
        info!("🔒 Redaction policy: scan every object");
        RedactionPolicy::scan_all()
    } else {
        info!(
            "🔒 Redaction policy: scan extensions {:?}, pass everything else through",
            config.redaction.extensions
        );
        RedactionPolicy::scan_extensions(config.redaction.extensions.clone())
    };

    let adapter = Arc::new(
        TransformAdapter::new(pipeline)
            .with_policy(policy)
            .with_metrics(metrics.clone()),
    );

    let readiness = Arc::new(StoreReadiness {
        store: config.store.clone(),
    });
    let health_state = HealthState::with_readiness_checker(metrics, readiness);

    // Combine routers
    let app = veilgate_ingress::router(adapter).merge(health_router(health_state));

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid host/port")?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("");
    info!("✅ VeilGate listening on http://{}", addr);
    info!("   - Object reads:       http://{}/objects/{{key}}", addr);
    info!("   - Health check:       http://{}/healthz", addr);
    info!("   - Readiness check:    http://{}/readyz", addr);
    info!("   - Prometheus metrics: http://{}/metrics", addr);
    info!("");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let log_level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => {
            eprintln!("Warning: unknown log level '{}', using info", other);
            Level::INFO
        }
    };

    let filter = EnvFilter::new(format!("{}", log_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn build_registry(config: &ServerConfig) -> anyhow::Result<DetectorRegistry> {
    let mut registry = DetectorRegistry::new();

    for name in &config.redaction.detectors {
        let detector = builtin::by_name(name)
            .with_context(|| format!("unknown built-in detector '{}'", name))?
            .with_context(|| format!("built-in detector '{}' failed to compile", name))?;
        registry
            .register(Arc::new(detector))
            .with_context(|| format!("failed to register detector '{}'", name))?;
        info!("✓ Detector enabled: {}", name);
    }

    for spec in &config.redaction.custom {
        registry
            .register_spec(spec)
            .with_context(|| format!("failed to register custom detector '{}'", spec.name))?;
        info!("✓ Custom detector enabled: {}", spec.name);
    }

    if registry.is_empty() {
        warn!("No detectors enabled; every object streams through unredacted");
    }

    registry.seal();
    Ok(registry)
}

fn build_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    Ok(match config {
        StoreConfig::Fs { root } => {
            info!("📦 Object store: fs, root {}", root.display());
            if !root.is_dir() {
                warn!("Store root {} does not exist yet", root.display());
            }
            Arc::new(FsObjectStore::new(root))
        }
        StoreConfig::Http { base_url } => {
            info!("📦 Object store: http, base {}", base_url);
            Arc::new(
                HttpObjectStore::new(HttpStoreConfig {
                    base_url: base_url.clone(),
                    ..Default::default()
                })
                .context("failed to build HTTP store client")?,
            )
        }
        StoreConfig::Memory => {
            info!("📦 Object store: memory (starts empty)");
            Arc::new(MemoryObjectStore::new())
        }
    })
}

fn check_config(config: &ServerConfig) -> anyhow::Result<()> {
    let registry = Arc::new(build_registry(config)?);
    let store = build_store(&config.store)?;
    RedactionPipeline::new(store, registry.clone(), config.pipeline.to_pipeline_config())
        .context("invalid pipeline configuration")?;

    println!("configuration OK");
    println!("  listen:       {}:{}", config.host, config.port);
    println!(
        "  detectors:    {} ({} bytes max pattern)",
        registry.len(),
        registry.max_pattern_len()
    );
    println!(
        "  scan scope:   {}",
        if config.redaction.extensions.is_empty() {
            "all objects".to_string()
        } else {
            config.redaction.extensions.join(", ")
        }
    );
    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
