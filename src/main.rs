use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use listing_backend::{
    config::{Config, LogFormat},
    database::{pool, postgres::PgStore},
    routes,
    services::recommendation_service::{AiRecommender, Recommender},
    utils::time::SystemClock,
    AppState, Stores,
};
use reqwest::Client;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    let stores = match &config.database_url {
        Some(url) => {
            let store = Arc::new(PgStore::new(pool::connect(url).await?));
            Stores {
                listings: store.clone(),
                users: store.clone(),
                directory: store,
            }
        }
        None => {
            warn!("DATABASE_URL is not set; using the in-memory store, data is lost on restart");
            Stores::in_memory()
        }
    };

    let recommender: Option<Arc<dyn Recommender>> = match config.ai.clone() {
        Some(ai) => {
            let client = Client::builder()
                .timeout(Duration::from_secs(60))
                .build()?;
            Some(Arc::new(AiRecommender::new(ai, client)))
        }
        None => {
            info!("AI_API_KEY is not set; recommendations are disabled");
            None
        }
    };

    let app_state = AppState::new(&config, stores, Arc::new(SystemClock), recommender);

    if let Some(admin) = &config.admin {
        app_state.user_service.ensure_admin(admin).await?;
    }

    if let Some(secs) = config.sweep_interval_secs.filter(|s| *s > 0) {
        let listings = app_state.listing_service.clone();
        info!(interval_secs = secs, "background visibility sweep enabled");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(secs));
            loop {
                ticker.tick().await;
                if let Err(e) = listings.sweep(None).await {
                    tracing::error!(error = ?e, "visibility sweep failed");
                }
            }
        });
    }

    let app = routes::router(app_state, &config);

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
