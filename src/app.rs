use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tokio::time::sleep;
use tokio_serial::SerialStream;
use tracing::{debug, error, info, warn};
use crate::config::{AppConfig, OutboxConfig};
use crate::modem;
use crate::modem::transport::{ModemTransport, PduTransport};
use crate::sms::database::OutboxDatabase;
use crate::sms::OutboxProcessor;

pub struct App<T> {
    processor: OutboxProcessor<T, StdRng>,
    database: OutboxDatabase,
    config: OutboxConfig,
    shutdown: watch::Receiver<bool>
}
impl App<ModemTransport<SerialStream>> {

    /// Opens the modem and the database, either failing is fatal.
    pub async fn create(config: AppConfig) -> Result<Self> {
        let transport = modem::connect(&config.modem).await?;
        let database = OutboxDatabase::connect(&config.database).await?;
        info!("Connected to outbox table '{}'", config.database.table);

        Ok(Self {
            processor: OutboxProcessor::new(transport, StdRng::from_os_rng(), config.outbox.clone()),
            database,
            config: config.outbox,
            shutdown: Self::listen_for_shutdown()
        })
    }

    fn listen_for_shutdown() -> watch::Receiver<bool> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl-C, stopping after the current message");
                    let _ = shutdown_tx.send(true);
                },
                Err(e) => {
                    error!("Failed to listen for Ctrl-C: {}", e);

                    // Keep the sender alive so the poll loop never sees a closed channel.
                    std::future::pending::<()>().await;
                }
            }
        });
        shutdown_rx
    }
}
impl<T: PduTransport> App<T> {
    pub async fn run(mut self) -> Result<()> {
        info!(
            "Polling outbox every {}s, up to {} message(s) per cycle",
            self.config.poll_interval_secs, self.config.batch_size
        );

        let mut cycle: u64 = 0;
        let mut database_suspect = false;
        while !*self.shutdown.borrow() {
            cycle += 1;

            let ping_due = self.config.ping_every_cycles > 0
                && cycle % u64::from(self.config.ping_every_cycles) == 0;
            if ping_due || database_suspect {
                database_suspect = !self.check_database().await;
            }

            match self.processor.poll_cycle(&mut self.database, &self.shutdown).await {
                Ok(summary) => {
                    if summary.is_idle() {
                        debug!("Poll cycle {}: {}", cycle, summary);
                    } else {
                        info!("Poll cycle {}: {}", cycle, summary);
                    }

                    // A lost connection mid-batch is checked before the next fetch.
                    database_suspect = summary.has_write_errors();
                },
                Err(e) => {
                    error!("Poll cycle {} failed: {:#}", cycle, e);
                    database_suspect = true;
                }
            }

            tokio::select! {
                _ = sleep(self.config.poll_interval()) => {},
                _ = self.shutdown.changed() => {}
            }
        }

        info!("Shutting down");
        self.database.close().await;
        Ok(())
    }

    /// Pings the database, rebuilding the pool when the ping fails.
    async fn check_database(&mut self) -> bool {
        let Err(e) = self.database.ping().await else {
            return true;
        };
        warn!("{:#}", e);

        match self.database.reconnect().await {
            Ok(()) => {
                info!("Reconnected to outbox database");
                true
            },
            Err(e) => {
                error!("Database reconnect failed, retrying next cycle: {:#}", e);
                false
            }
        }
    }
}
