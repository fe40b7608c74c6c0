//! Connection bootstrap for the PostgreSQL store.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::MIGRATOR;
use crate::error::{PipelineError, Result};

const BACKOFF_BASE: Duration = Duration::from_millis(500);
const BACKOFF_CAP: Duration = Duration::from_secs(10);
const MAX_CONNECTIONS: u32 = 5;

/// Delay before retry number `attempt` (1-based): 500ms doubling, capped at 10s.
pub fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    BACKOFF_BASE
        .saturating_mul(1u32 << exponent)
        .min(BACKOFF_CAP)
}

/// Connect to PostgreSQL, retrying with bounded exponential backoff, then
/// apply pending migrations.
pub async fn connect_with_retry(url: &str, attempts: u32) -> Result<PgPool> {
    let attempts = attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(url)
            .await
        {
            Ok(pool) => {
                info!(attempt, "connected to database");
                MIGRATOR.run(&pool).await.map_err(|e| {
                    PipelineError::Database(format!("Failed to run migrations: {e}"))
                })?;
                return Ok(pool);
            }
            Err(err) => {
                if attempt < attempts {
                    let delay = backoff_delay(attempt);
                    warn!(
                        attempt,
                        attempts,
                        retry_in = ?delay,
                        error = %err,
                        "database not ready, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                last_error = Some(err);
            }
        }
    }

    Err(PipelineError::Database(format!(
        "Database unreachable after {attempts} attempts: {}",
        last_error.map(|e| e.to_string()).unwrap_or_default()
    )))
}
