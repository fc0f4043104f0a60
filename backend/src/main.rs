use anyhow::Context;
use santa_backend::config::Settings;
use santa_backend::{app, AppState};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("santa_backend=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env().context("loading configuration")?;
    if settings.admin_key.is_none() {
        tracing::warn!("ADMIN_KEY is not set, admin routes will always answer 401");
    }
    let addr = settings.listen_addr();
    let db_path = settings.db_path.clone();

    let state = AppState::open(settings)
        .await
        .with_context(|| format!("opening {}", db_path.display()))?;
    let app = app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, db = %db_path.display(), "starting server");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
