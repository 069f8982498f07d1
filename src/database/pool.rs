use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use crate::error::Result;

const MAX_CONNECTIONS: u32 = 20;

/// Opens the pool and brings the schema up to date before anything queries it.
pub async fn connect(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!(max_connections = MAX_CONNECTIONS, "database ready, migrations applied");
    Ok(pool)
}
