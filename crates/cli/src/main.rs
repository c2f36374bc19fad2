use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use prismdns_domain::{Config, LogFormat, RuntimeOptions};
use prismdns_infrastructure::dns::{Coordinator, QueryHandler, ZoneRuntime};
use prismdns_infrastructure::{MemoryLimits, MemoryMonitor, Metrics};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod bootstrap;
mod server;

#[derive(Parser)]
#[command(name = "prismdns")]
#[command(version)]
#[command(about = "Authoritative-plus-forwarding DNS server for overlay networks")]
struct Cli {
    /// Zone configuration file (JSON with comments)
    #[arg(short = 'c', long, env = "PRISMDNS_CONFIG", default_value = "./config.json5")]
    config: String,

    /// DNS listen port
    #[arg(long, env = "PRISMDNS_DNS_PORT", default_value_t = 53)]
    dns_port: u16,

    /// HTTP port for health and stats
    #[arg(long, env = "PRISMDNS_HTTP_PORT", default_value_t = 8080)]
    http_port: u16,

    /// Bind address
    #[arg(short = 'b', long, env = "PRISMDNS_BIND_ADDRESS", default_value = "0.0.0.0")]
    bind: String,

    /// TTL stamped on synthetic answers
    #[arg(long, env = "PRISMDNS_DEFAULT_TTL", default_value_t = 300)]
    default_ttl: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "PRISMDNS_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log format (json or text)
    #[arg(long, env = "PRISMDNS_LOG_FORMAT", default_value = "json")]
    log_format: LogFormat,

    /// Log every query
    #[arg(long, env = "PRISMDNS_LOG_QUERIES", default_value_t = false)]
    log_queries: bool,

    /// Overlay auth credential, consumed by an embedded overlay
    /// backend when one is linked in
    #[arg(long, env = "OVERLAY_AUTHKEY", hide_env_values = true)]
    overlay_authkey: Option<String>,

    /// Validate the configuration and exit
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

impl Cli {
    fn to_options(&self) -> RuntimeOptions {
        RuntimeOptions {
            dns_port: self.dns_port,
            http_port: self.http_port,
            bind_address: self.bind.clone(),
            default_ttl: self.default_ttl,
            log_level: self.log_level.clone(),
            log_format: self.log_format,
            log_queries: self.log_queries,
            overlay_auth_key: self.overlay_authkey.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let options = cli.to_options();

    bootstrap::init_logging(&options);

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!(file = %cli.config, error = %e, "Failed to load configuration");
            anyhow::bail!("failed to load configuration from {}: {e}", cli.config);
        }
    };

    info!(
        file = %cli.config,
        zones = config.zones.len(),
        dns_port = options.dns_port,
        "Configuration loaded"
    );

    if cli.dry_run {
        info!("Configuration valid, exiting (dry run)");
        return Ok(());
    }

    if options.overlay_auth_key.is_some() {
        warn!("Overlay credentials provided but no overlay backend is linked into this build; running standalone");
    }

    let metrics = Arc::new(Metrics::new());
    let runtime = ZoneRuntime::build(config, None)
        .map_err(|e| anyhow::anyhow!("failed to build zone runtime: {e}"))?;

    info!(
        synthesis_zones = runtime.translator.zone_count(),
        caches = runtime.caches.len(),
        "Zone runtime ready"
    );

    let memory = MemoryMonitor::new(MemoryLimits::default());
    memory.sync_zones(runtime.config.zones.keys().map(String::as_str));
    memory.start_periodic_check(Duration::from_secs(30));

    let handler = Arc::new(
        QueryHandler::new(runtime, options.clone(), metrics.clone())
            .with_memory_monitor(memory.clone()),
    );
    let coordinator = Arc::new(Coordinator::new(handler.clone(), cli.config.clone()));

    let shutdown = CancellationToken::new();

    // Bind everything before going resident so port conflicts exit nonzero.
    let dns_addr = format!("{}:{}", options.bind_address, options.dns_port);
    let dns_task = server::dns::spawn(&dns_addr, handler.clone(), shutdown.clone())?;

    let web_addr: SocketAddr = format!("{}:{}", options.bind_address, options.http_port).parse()?;
    let web_task = tokio::spawn(server::web::serve(
        web_addr,
        handler.clone(),
        shutdown.clone(),
    ));

    info!(dns = %dns_addr, http = %web_addr, "prismdns started");

    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down");
                break;
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
                break;
            }
            _ = sighup.recv() => {
                info!("Received SIGHUP, reloading configuration");
                if let Err(e) = coordinator.reload() {
                    error!(error = %e, "Configuration reload failed, keeping previous configuration");
                }
            }
        }
    }

    shutdown.cancel();

    if let Err(e) = dns_task.await {
        error!(error = %e, "DNS server task error");
    }
    if let Ok(Err(e)) = web_task.await {
        error!(error = %e, "Web server error");
    }

    memory.stop();
    coordinator.shutdown();
    info!("Server shutdown complete");
    Ok(())
}
