use redis::AsyncCommands;
use redis::Client;
use tokio::sync::mpsc;

use crate::error::AppResult;

/// Creates a Redis client for the advisory popularity signal
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// A single counter bump queued for the background writer
struct SignalBump {
    key: String,
}

/// Advisory per-city search-popularity signal.
///
/// Tracked searches bump a redis counter per city so downstream consumers
/// can see what is being searched for. The engine never reads these back
/// and tracking calls never wait on redis: bumps go through a background
/// writer task and failures are logged and dropped.
#[derive(Clone)]
pub struct PopularitySignal {
    bump_tx: mpsc::UnboundedSender<SignalBump>,
}

/// Handle for gracefully shutting down the signal writer
pub struct SignalWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl SignalWriterHandle {
    /// Signals the writer task to flush pending bumps and stop
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Popularity signal writer shutdown signal sent");
    }
}

impl PopularitySignal {
    /// Spawns the background writer and returns the signal handle pair
    pub fn new(redis_client: Client) -> (Self, SignalWriterHandle) {
        let (bump_tx, bump_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        tokio::spawn(async move {
            Self::writer_task(redis_client, bump_rx, shutdown_rx).await;
        });

        (Self { bump_tx }, SignalWriterHandle { shutdown_tx })
    }

    /// A signal with no backing writer; bumps go nowhere.
    ///
    /// Used when redis is not configured and in tests: the signal is
    /// advisory, so a missing backend only loses a statistic.
    pub fn disabled() -> Self {
        let (bump_tx, _bump_rx) = mpsc::unbounded_channel();
        Self { bump_tx }
    }

    async fn writer_task(
        client: Client,
        mut bump_rx: mpsc::UnboundedReceiver<SignalBump>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!("Popularity signal writer started");

        loop {
            tokio::select! {
                Some(bump) = bump_rx.recv() => {
                    if let Err(e) = Self::write_bump(&client, &bump).await {
                        tracing::error!(error = %e, key = %bump.key, "Failed to bump popularity signal");
                    }
                }
                _ = shutdown_rx.recv() => {
                    // Drain whatever is still queued before stopping
                    while let Ok(bump) = bump_rx.try_recv() {
                        if let Err(e) = Self::write_bump(&client, &bump).await {
                            tracing::error!(error = %e, "Failed to flush popularity signal bump");
                        }
                    }
                    tracing::info!("Popularity signal writer stopped");
                    break;
                }
            }
        }
    }

    async fn write_bump(client: &Client, bump: &SignalBump) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: i64 = conn.incr(&bump.key, 1).await?;
        Ok(())
    }

    /// Queues a search-popularity bump for a city without blocking.
    ///
    /// Never fails the caller; if the writer is gone the bump is dropped.
    pub fn bump_city_search(&self, city: &str) {
        let bump = SignalBump {
            key: format!("city_searches:{}", city.trim().to_lowercase()),
        };
        if self.bump_tx.send(bump).is_err() {
            tracing::debug!(city = %city, "Popularity signal writer unavailable, bump dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_signal_swallows_bumps() {
        let signal = PopularitySignal::disabled();
        // Receiver is dropped; bumping must still be a no-op, not a panic
        signal.bump_city_search("Paris");
        signal.bump_city_search("  Rome  ");
    }
}
