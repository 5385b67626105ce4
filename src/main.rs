use anyhow::{Context, Result};
use std::sync::Arc;

use attendance_hub::config::Settings;
use attendance_hub::services::recognizer::ProcessRecognizer;
use attendance_hub::{app, db, telemetry, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let settings = Settings::from_env()?;
    for dir in settings.media_dirs() {
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("could not create {}", dir.display()))?;
    }

    let pool = db::connect(&settings.database_url).await?;
    db::run_migrations(&pool).await?;

    let recognizer = Arc::new(ProcessRecognizer::new(
        settings.recognizer_program.clone(),
        settings.recognizer_script.clone(),
    ));
    let port = settings.port;
    let router = app(AppState::new(pool.clone(), settings, recognizer));

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;
    let ctrl_c = async {
        signal::ctrl_c().await.ok();
    };
    #[cfg(unix)]
    let term = async {
        if let Ok(mut s) = signal::unix::signal(signal::unix::SignalKind::terminate()) {
            s.recv().await;
        }
    };
    #[cfg(not(unix))]
    let term = std::future::pending::<()>();
    tokio::select! { _ = ctrl_c => {}, _ = term => {} }
}
