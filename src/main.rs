#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

use latchkey_server::api::MgmtState;
use latchkey_server::config::Config;
use latchkey_server::{AppBuilder, Workers, adapters, telemetry};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::Instrument;

struct Runtime {
    api_listener: TcpListener,
    mgmt_listener: TcpListener,
    app_router: axum::Router,
    mgmt_router: axum::Router,
    workers: Workers,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    let telemetry_guard = telemetry::init_telemetry(&config.telemetry)?;

    latchkey_server::setup_panic_hook();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    latchkey_server::spawn_signal_handler(shutdown_tx.clone());

    let boot_span = tracing::info_span!("boot_server");
    let runtime = async {
        // Phase 1: infrastructure
        let mut builder = AppBuilder::new(config.clone());
        if let Some(url) = &config.database.url {
            let pool = adapters::database::init_pool(url, &config.database).await?;
            latchkey_server::run_migrations(&pool).await?;
            builder = builder.with_database(pool);
        }

        // Phase 2: wiring
        let app = builder.build()?;

        // Phase 3: listeners and routers
        let app_router = latchkey_server::api::app_router(config.clone(), app.services);
        let mgmt_router = latchkey_server::api::mgmt_router(MgmtState { health_service: app.health_service });

        let api_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
        let mgmt_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.mgmt_port).parse()?;

        let api_listener = TcpListener::bind(api_addr).await?;
        let mgmt_listener = TcpListener::bind(mgmt_addr).await?;

        tracing::info!(address = %api_listener.local_addr()?, "listening");
        tracing::info!(address = %mgmt_listener.local_addr()?, "management server listening");

        Ok::<_, anyhow::Error>(Runtime { api_listener, mgmt_listener, app_router, mgmt_router, workers: app.workers })
    }
    .instrument(boot_span)
    .await?;

    // Phase 4: serve
    let worker_tasks = runtime.workers.spawn_all(shutdown_rx.clone());

    let mut api_rx = shutdown_rx.clone();
    let api_server =
        axum::serve(runtime.api_listener, runtime.app_router.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(async move {
                let _ = api_rx.wait_for(|&s| s).await;
            });

    let mut mgmt_rx = shutdown_rx.clone();
    let mgmt_server =
        axum::serve(runtime.mgmt_listener, runtime.mgmt_router.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(async move {
                let _ = mgmt_rx.wait_for(|&s| s).await;
            });

    if let Err(e) = tokio::try_join!(api_server, mgmt_server) {
        tracing::error!(error = %e, "Server error");
    }

    // Phase 5: drain background work
    let _ = shutdown_tx.send(true);
    tokio::select! {
        () = async {
            futures::future::join_all(worker_tasks).await;
        } => {
            tracing::info!("Background tasks finished.");
        }
        () = tokio::time::sleep(std::time::Duration::from_secs(config.server.shutdown_timeout_secs)) => {
            tracing::warn!("Timeout waiting for background tasks to finish.");
        }
    }

    telemetry_guard.shutdown();
    Ok(())
}
