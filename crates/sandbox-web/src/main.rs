use sandbox_container::ContainerDriver;
use sandbox_session::SessionManager;
use sandbox_web::{build_router, AppState, Config, NotifyBus};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();

    let pool = sandbox_store::init_db(&config.database_url).await?;
    let driver = ContainerDriver::connect(config.container_config())?;
    let sessions = SessionManager::new(pool.clone(), driver);

    let state = AppState {
        pool,
        sessions: sessions.clone(),
        notify: Arc::new(NotifyBus::new()),
    };

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            ticker.tick().await;
            if let Err(e) = sessions.reap_orphans().await {
                tracing::warn!("periodic reap_orphans failed: {e}");
            }
        }
    });

    let app = build_router(state);

    tracing::info!("listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
