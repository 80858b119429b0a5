use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Notify;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::health::checkers::{PingableChecker, ProtocolChecker};
use crate::health::HealthComposite;
use crate::server::null_session::NullSessionManager;
use crate::{config, server};

/// CLI arguments forwarded from `main()`. `listen`/`admin_listen` are
/// `None` when the operator didn't pass the flag, in which case the
/// loaded config's `listen_addr`/`admin_listen_addr` apply instead.
pub struct BootstrapArgs {
    pub config_path: std::path::PathBuf,
    pub listen: Option<String>,
    pub admin_listen: Option<String>,
}

/// Gateway lifecycle: load config → build state → serve → wait for signal →
/// drain → exit. There is no distributed-config watcher or
/// service-discovery loop here — mapping state lives in the in-memory
/// registry, seeded (and write-through cached) by the resolver's repository
/// and remote-control tiers, not polled on an interval.
pub async fn run(args: BootstrapArgs) -> Result<()> {
    init_tracing();

    let config = config::GatewayConfig::load(&args.config_path)?;
    let check_timeout = config.health.check_timeout();
    let listen = args.listen.clone().unwrap_or_else(|| config.listen_addr.clone());
    let admin_listen = args
        .admin_listen
        .clone()
        .unwrap_or_else(|| config.admin_listen_addr.clone());

    // No production collaborators are wired in here — the session manager,
    // persistent repository, remote control client and stats provider are
    // out of scope for this core. A deployment that wants
    // real forwarding supplies its own `GatewayState` construction using
    // this crate as a library; this binary boots with the null/absent
    // defaults so `domain-gateway` still starts and answers its admin
    // endpoints with an accurate (degraded) health report.
    let health = Arc::new(HealthComposite::new(
        vec![
            Arc::new(PingableChecker::storage(None, check_timeout)),
            Arc::new(PingableChecker::broker(None, check_timeout)),
            Arc::new(ProtocolChecker::new(None)),
        ],
        check_timeout,
    ));

    let state = server::GatewayState::new(config, Arc::new(NullSessionManager), None, None, health, None);

    let shutdown = Arc::new(Notify::new());

    tracing::info!("server: starting gateway, listen={}", listen);

    let admin_handle = {
        let state = state.clone();
        let admin_addr = admin_listen.clone();
        tokio::spawn(async move {
            if let Err(e) = server::run_admin_server(&admin_addr, state).await {
                tracing::error!("server: admin failed, error={}", e);
            }
        })
    };

    let proxy_handle = tokio::spawn({
        let listen = listen.clone();
        let state = state.clone();
        let shutdown = shutdown.clone();
        async move { server::run_proxy_server(&listen, state, shutdown).await }
    });

    wait_for_shutdown(&shutdown).await;
    state.gateway_health.mark_draining();

    // `run_proxy_server` owns its own drain loop and returns once in-flight
    // connections finish or the drain timeout elapses.
    if let Err(e) = proxy_handle.await {
        tracing::error!("server: proxy task error: {}", e);
    }
    admin_handle.abort();

    tracing::info!("server: shutdown complete");
    Ok(())
}

fn init_tracing() {
    let (non_blocking, _guard) = tracing_appender::non_blocking::NonBlockingBuilder::default()
        .buffered_lines_limit(128_000)
        .lossy(true)
        .finish(std::io::stdout());

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(false)
                .json(),
        )
        .init();

    std::mem::forget(_guard);
}

async fn wait_for_shutdown(shutdown: &Arc<Notify>) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("server: received SIGINT, shutting down"),
        _ = terminate => tracing::info!("server: received SIGTERM, shutting down"),
    }

    shutdown.notify_waiters();
}
