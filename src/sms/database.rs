use std::time::Duration;
use anyhow::{anyhow, bail, Context, Result};
use tracing::{debug, warn};
use sqlx::any::{install_default_drivers, AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Row};
use crate::config::DatabaseConfig;
use crate::sms::types::{OutboxMessage, OutboxStatus, Transition};
use crate::sms::OutboxStore;

pub struct OutboxDatabase {
    pool: AnyPool,
    url: String,
    table: String
}
impl OutboxDatabase {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = Self::create_pool(&config.url).await?;
        Ok(Self {
            pool,
            url: config.url.clone(),
            table: config.table.clone()
        })
    }

    async fn create_pool(url: &str) -> Result<AnyPool> {
        install_default_drivers();

        AnyPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .test_before_acquire(true)
            .after_connect(|conn, _meta| {
                Box::pin(async move {

                    // Every cycle must see rows committed since the last one.
                    if conn.backend_name() == "MySQL" {
                        sqlx::query("SET SESSION TRANSACTION ISOLATION LEVEL READ COMMITTED")
                            .execute(&mut *conn)
                            .await?;
                    }
                    Ok(())
                })
            })
            .connect(url)
            .await
            .map_err(|e| anyhow!("Failed to connect to outbox database: {}", e))
    }

    #[cfg(test)]
    fn from_pool(pool: AnyPool, table: &str) -> Self {
        Self {
            pool,
            url: String::new(),
            table: table.to_string()
        }
    }

    /// Liveness check run every few poll cycles.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow!("Database ping failed: {}", e))?;
        Ok(())
    }

    /// Replaces the pool with a freshly connected one.
    pub async fn reconnect(&mut self) -> Result<()> {
        warn!("Reconnecting to outbox database");
        let pool = Self::create_pool(&self.url).await?;
        let old = std::mem::replace(&mut self.pool, pool);
        old.close().await;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// A missing number decodes as empty, so the row fails through the normal retry path.
    fn message_from_row(row: &AnyRow) -> Result<OutboxMessage> {
        Ok(OutboxMessage {
            id: row.try_get("id")?,
            phone_number: row.try_get::<Option<String>, _>("phone_number")?.unwrap_or_default(),
            recipient: row.try_get("recipient")?,
            message: row.try_get::<Option<String>, _>("message")?.unwrap_or_default(),
            attempts: row.try_get("attempts")?,
            error_message: row.try_get("error_message")?
        })
    }
}

impl OutboxStore for OutboxDatabase {
    async fn fetch_pending(&mut self, limit: u32) -> Result<Vec<OutboxMessage>> {
        let query = format!(
            "SELECT id, phone_number, recipient, message, attempts, error_message FROM {} WHERE status = ? AND attempts > 0 ORDER BY id ASC LIMIT ?",
            self.table
        );
        let rows = sqlx::query(&query)
            .bind(OutboxStatus::Pending.as_str())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow!("Failed to fetch pending messages: {}", e))?;

        // A row that cannot be decoded is skipped, it must not hold up the rest.
        let messages: Vec<OutboxMessage> = rows.iter()
            .filter_map(|row| match Self::message_from_row(row) {
                Ok(message) => Some(message),
                Err(e) => {
                    let id = row.try_get::<i64, _>("id")
                        .map(|id| id.to_string())
                        .unwrap_or_else(|_| "?".to_string());
                    warn!("Skipping outbox row {}, it could not be read: {}", id, e);
                    None
                }
            })
            .collect();

        debug!("Fetched {} pending message(s)", messages.len());
        Ok(messages)
    }

    async fn apply_transition(&mut self, id: i64, transition: &Transition) -> Result<()> {
        let mut tx = self.pool.begin().await
            .context("Failed to begin outbox update")?;

        let result = match transition {
            Transition::Sent => {
                sqlx::query(&format!(
                    "UPDATE {} SET status = ?, error_message = NULL, sent_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
                    self.table
                ))
                    .bind(transition.status().as_str())
                    .bind(id)
                    .execute(&mut *tx)
                    .await
            },
            Transition::Retry { attempts, error } => {
                sqlx::query(&format!(
                    "UPDATE {} SET attempts = ?, error_message = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
                    self.table
                ))
                    .bind(*attempts)
                    .bind(error.as_str())
                    .bind(id)
                    .execute(&mut *tx)
                    .await
            },
            Transition::Failed { error } => {
                sqlx::query(&format!(
                    "UPDATE {} SET status = ?, attempts = 0, error_message = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
                    self.table
                ))
                    .bind(transition.status().as_str())
                    .bind(error.as_str())
                    .bind(id)
                    .execute(&mut *tx)
                    .await
            }
        }
            .map_err(|e| anyhow!("Failed to update outbox row {}: {}", id, e))?;

        if result.rows_affected() == 0 {
            bail!("Outbox row {} no longer exists", id);
        }

        tx.commit().await
            .context("Failed to commit outbox update")?;
        Ok(())
    }
}
