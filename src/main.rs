use std::sync::Arc;

use assignment_grader::{app, config, db, state, workflow::SessionStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "assignment_grader=info,tower_http=info".into()),
        )
        .init();

    let config = Arc::new(config::Config::from_env());
    let weight_total = config.weights.total();
    if weight_total != 100 {
        tracing::warn!(total = weight_total, "Rubric weights do not sum to 100");
    }

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(pool.as_ref()).await?;

    let state = Arc::new(state::AppState {
        pool,
        config: config.clone(),
        sessions: SessionStore::new(config.session_ttl),
    });

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Assignment grader listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
