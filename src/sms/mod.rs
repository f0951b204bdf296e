pub mod types;
pub mod database;
pub mod multipart;

use std::fmt::{Display, Formatter};
use std::time::Duration;
use anyhow::Result;
use rand::Rng;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};
use crate::config::OutboxConfig;
use crate::modem::transport::PduTransport;
use crate::pdu::{PhoneAddress, SubmitPdu};
use crate::sms::multipart::plan_message;
use crate::sms::types::{MessageOutcome, OutboxMessage, Transition};

/// Persistence the processor needs from the outbox table.
#[allow(async_fn_in_trait)]
pub trait OutboxStore {
    async fn fetch_pending(&mut self, limit: u32) -> Result<Vec<OutboxMessage>>;
    async fn apply_transition(&mut self, id: i64, transition: &Transition) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub fetched: usize,
    pub sent: usize,
    pub retried: usize,
    pub failed: usize,
    pub write_errors: usize
}
impl CycleSummary {
    fn record(&mut self, transition: &Transition) {
        match transition {
            Transition::Sent => self.sent += 1,
            Transition::Retry { .. } => self.retried += 1,
            Transition::Failed { .. } => self.failed += 1
        }
    }

    pub fn is_idle(&self) -> bool {
        self.fetched == 0
    }

    /// A write failed mid-batch, so the connection should be checked before the next read.
    pub fn has_write_errors(&self) -> bool {
        self.write_errors > 0
    }
}
impl Display for CycleSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "fetched {}, sent {}, retried {}, failed {}, write errors {}",
            self.fetched, self.sent, self.retried, self.failed, self.write_errors
        )
    }
}

/// Sends pending outbox rows one at a time and records each outcome.
pub struct OutboxProcessor<T, R> {
    transport: T,
    rng: R,
    config: OutboxConfig
}
impl<T: PduTransport, R: Rng> OutboxProcessor<T, R> {
    pub fn new(transport: T, rng: R, config: OutboxConfig) -> Self {
        Self { transport, rng, config }
    }

    /// One poll: fetch a batch and work through it in id order. Shutdown is
    /// only checked between messages, an in-flight send always completes.
    pub async fn poll_cycle<S: OutboxStore>(
        &mut self,
        store: &mut S,
        shutdown: &watch::Receiver<bool>
    ) -> Result<CycleSummary> {
        let messages = store.fetch_pending(self.config.batch_size).await?;
        let mut summary = CycleSummary {
            fetched: messages.len(),
            ..CycleSummary::default()
        };

        for message in messages {
            if *shutdown.borrow() {
                info!("Shutdown requested, leaving SMS {} and later rows for the next run", message.id);
                break;
            }

            let started = Instant::now();
            let outcome = self.send_message(&message).await;
            let transition = Transition::next(message.attempts, &outcome, self.config.error_message_limit);
            Self::log_transition(&message, &outcome, &transition, started.elapsed());

            // A failed write leaves the row pending, the rest of the batch still goes out.
            match store.apply_transition(message.id, &transition).await {
                Ok(()) => summary.record(&transition),
                Err(e) => {
                    error!("Failed to record outcome for SMS {}: {:#}", message.id, e);
                    summary.write_errors += 1;
                }
            }
        }

        Ok(summary)
    }

    async fn send_message(&mut self, message: &OutboxMessage) -> MessageOutcome {
        info!(
            "Sending SMS {} -> {} ({}) [attempts left: {}]",
            message.id, message.display_name(), message.phone_number, message.attempts
        );
        if let Some(previous) = &message.error_message {
            debug!("SMS {} previous error: {}", message.id, previous);
        }

        match self.try_send_message(message).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("SMS {} could not be sent: {:#}", message.id, e);
                MessageOutcome::Failed(format!("{:#}", e))
            }
        }
    }

    /// Sends every part in order, stopping at the first part that fails.
    /// Parts already accepted by the network are not recalled.
    async fn try_send_message(&mut self, message: &OutboxMessage) -> Result<MessageOutcome> {
        let address = PhoneAddress::parse(&message.phone_number)?;
        let reference: u8 = self.rng.random();
        let (encoding, parts) = plan_message(&message.message, reference)?;
        let total = parts.len();

        let mut network_reference = None;
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                sleep(self.config.part_delay()).await;
            }

            let pdu = SubmitPdu::build(&address, part, encoding)?;
            debug!(
                "SMS {} part {}/{} ({:?}): {} [TPDU length {}]",
                message.id, part.index, part.total, encoding, pdu.to_hex(), pdu.tpdu_len()
            );

            let detail = match self.transport.send_pdu(&pdu).await {
                Ok(outcome) => match outcome.failure_detail() {
                    None => {
                        network_reference = outcome.message_reference();
                        continue;
                    },
                    Some(detail) => detail
                },
                Err(e) => format!("{:#}", e)
            };

            return Ok(MessageOutcome::Failed(if total > 1 {
                format!("Part {}/{}: {}", part.index, part.total, detail)
            } else {
                detail
            }));
        }

        Ok(MessageOutcome::Sent {
            parts: total,
            reference: network_reference
        })
    }

    fn log_transition(message: &OutboxMessage, outcome: &MessageOutcome, transition: &Transition, took: Duration) {
        let line = Self::describe_transition(message, outcome, transition, took);
        match transition {
            Transition::Sent => info!("{}", line),
            Transition::Retry { .. } => warn!("{}", line),
            Transition::Failed { .. } => error!("{}", line)
        }
    }

    fn describe_transition(message: &OutboxMessage, outcome: &MessageOutcome, transition: &Transition, took: Duration) -> String {
        let took = took.as_secs_f64();
        match (transition, outcome) {
            (Transition::Sent, MessageOutcome::Sent { parts, reference }) => {
                let reference = reference
                    .map(|r| format!(", reference {}", r))
                    .unwrap_or_default();
                format!(
                    "[OK] SMS {} sent to {} in {} part(s){} (took {:.1}s)",
                    message.id, message.display_name(), parts, reference, took
                )
            },
            (Transition::Retry { attempts, error }, _) => {
                format!("[RETRY] SMS {} failed after {:.1}s, {} attempt(s) left: {}", message.id, took, attempts, error)
            },
            (Transition::Failed { error }, _) => {
                format!("[FAIL] SMS {} failed permanently after {:.1}s: {}", message.id, took, error)
            },
            (Transition::Sent, _) => format!("[OK] SMS {} sent (took {:.1}s)", message.id, took)
        }
    }
}
