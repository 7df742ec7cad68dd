use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};

/// Creates the connection pool shared by the activity log and the place
/// catalog.
///
/// Sized for the request fan-out: one recommendation request can hold
/// several connections at once while its scorers query concurrently, and
/// acquisition is bounded so a saturated pool surfaces as an error rather
/// than a hang.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(16)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;

    Ok(pool)
}
