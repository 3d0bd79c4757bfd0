use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use myinfo::config::PortalConfig;
use myinfo::{rate_limit, session};
use myinfo::store::{Database, LibSqlBackend};
use myinfo::web::{AppState, portal_routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = myinfo::logging::init("myinfo");

    let config = PortalConfig::from_env();

    eprintln!("MyInfo v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Listening: http://{}", config.bind_addr);
    eprintln!("   Database: {}", config.db_path);
    eprintln!(
        "   Rate limit: {} GET / {} POST per {}s",
        config.rate_limit.get_limit,
        config.rate_limit.post_limit,
        config.rate_limit.window.as_secs()
    );
    eprintln!("   Session max age: {}s", config.session_max_age.as_secs());

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(Path::new(&config.db_path))
            .await
            .with_context(|| format!("failed to open database at {}", config.db_path))?,
    );

    // ── HTTP server ──────────────────────────────────────────────────────
    let bind_addr = config.bind_addr.clone();
    let session_max_age = config.session_max_age;
    let state = AppState::new(Arc::clone(&db), config);
    let _sweep_handle = rate_limit::spawn_sweep_task(Arc::clone(&state.limiter));
    let _session_sweep_handle = session::spawn_session_sweep_task(db, session_max_age);
    let app = portal_routes(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "MyInfo portal started");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    tracing::info!("MyInfo portal stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
