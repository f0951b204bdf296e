use std::time::Duration;
use anyhow::{anyhow, bail, Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};
use crate::config::ModemConfig;
use crate::modem::buffer::ResponseBuffer;
use crate::modem::classifier::{error_line, has_ok_line, is_final_result_line, ClassifierState, ResponseClassifier};
use crate::modem::parsers::{parse_cops_response, parse_creg_response, parse_csq_response, parse_identity_response};
use crate::modem::types::{ModemStatus, OutcomeKind, TransportOutcome};
use crate::pdu::SubmitPdu;

/// Terminates the PDU hex and tells the modem to submit.
pub const CTRL_Z: u8 = 0x1A;

const READ_CHUNK_SIZE: usize = 256;

/// Anything able to push one SMS-SUBMIT PDU to the network.
#[allow(async_fn_in_trait)]
pub trait PduTransport {
    async fn send_pdu(&mut self, pdu: &SubmitPdu) -> Result<TransportOutcome>;
}

#[derive(Debug, Clone)]
pub struct TransportTiming {
    pub command_delay: Duration,
    pub prompt_timeout: Duration,
    pub response_timeout: Duration,
    pub idle_timeout: Duration,
    pub grace_period: Duration,
}
impl From<&ModemConfig> for TransportTiming {
    fn from(config: &ModemConfig) -> Self {
        Self {
            command_delay: config.command_delay(),
            prompt_timeout: config.prompt_timeout(),
            response_timeout: config.response_timeout(),
            idle_timeout: config.idle_timeout(),
            grace_period: config.grace_period(),
        }
    }
}

enum PromptWait {
    Ready,
    Missing(String),
    Rejected(String),
}

/// Drives a PDU-mode modem over any byte stream, usually a serial port.
pub struct ModemTransport<S> {
    port: S,
    timing: TransportTiming,
}
impl<S: AsyncRead + AsyncWrite + Unpin> ModemTransport<S> {
    pub fn new(port: S, timing: TransportTiming) -> Self {
        Self { port, timing }
    }

    /// Checks the modem answers, then reads its identity, network registration,
    /// operator and signal quality. Unreadable fields are left as `None`.
    pub async fn probe(&mut self) -> Result<ModemStatus> {
        let response = self.query("AT").await?;
        if !has_ok_line(&response) {
            bail!("Modem did not acknowledge AT: {:?}", response.trim());
        }
        self.query("ATE0").await?;

        let mut status = ModemStatus {
            manufacturer: self.identity("AT+CGMI").await?,
            model: self.identity("AT+CGMM").await?,
            revision: self.identity("AT+CGMR").await?,
            ..ModemStatus::default()
        };

        match parse_creg_response(&self.query("AT+CREG?").await?) {
            Ok((_, registration)) => status.registration = Some(registration),
            Err(e) => warn!("Could not read network registration: {}", e),
        }
        match parse_cops_response(&self.query("AT+COPS?").await?) {
            Ok((_, _, operator)) => status.operator = Some(operator),
            Err(e) => debug!("Could not read network operator: {}", e),
        }
        match parse_csq_response(&self.query("AT+CSQ").await?) {
            Ok((rssi, ber)) => {
                status.rssi = Some(rssi);
                status.ber = Some(ber);
            },
            Err(e) => warn!("Could not read signal quality: {}", e),
        }
        Ok(status)
    }

    async fn identity(&mut self, command: &str) -> Result<Option<String>> {
        match parse_identity_response(&self.query(command).await?, command) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                debug!("Could not read modem identity: {}", e);
                Ok(None)
            }
        }
    }

    /// Sends a plain command and collects lines until a final result code.
    async fn query(&mut self, command: &str) -> Result<String> {
        self.write_command(command).await?;

        let deadline = Instant::now() + self.timing.prompt_timeout;
        let mut buffer = ResponseBuffer::new();
        while self.read_before(deadline, &mut buffer).await? {
            if buffer.lines().iter().any(|line| is_final_result_line(line)) {
                break;
            }
        }

        let response = buffer.text().into_owned();
        debug!("{} -> {:?}", command, response);
        Ok(response)
    }

    async fn write_command(&mut self, command: &str) -> Result<()> {
        let line = format!("{}\r", command);
        self.port.write_all(line.as_bytes()).await
            .with_context(|| format!("Failed to write {} to modem", command))?;
        self.port.flush().await
            .context("Failed to flush serial port")
    }

    /// Reads one chunk into `buffer`, returning false once `deadline` passes.
    async fn read_before(&mut self, deadline: Instant, buffer: &mut ResponseBuffer) -> Result<bool> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        match timeout_at(deadline, self.port.read(&mut chunk)).await {
            Ok(Ok(0)) => bail!("Serial port closed"),
            Ok(Ok(n)) => {
                buffer.push(&chunk[..n]);
                Ok(true)
            },
            Ok(Err(e)) => Err(anyhow!("Serial read failed: {}", e)),
            Err(_) => Ok(false),
        }
    }

    /// Waits out the command delay, discarding whatever the modem echoes.
    async fn settle(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.timing.command_delay;
        let mut discarded = ResponseBuffer::new();
        while self.read_before(deadline, &mut discarded).await? {}
        Ok(())
    }

    async fn await_prompt(&mut self) -> Result<PromptWait> {
        let deadline = Instant::now() + self.timing.prompt_timeout;
        let mut buffer = ResponseBuffer::new();
        while self.read_before(deadline, &mut buffer).await? {
            if buffer.has_prompt() {
                return Ok(PromptWait::Ready);
            }
            if buffer.text().contains("ERROR") {
                return Ok(PromptWait::Rejected(buffer.text().into_owned()));
            }
        }
        Ok(PromptWait::Missing(buffer.text().into_owned()))
    }

    /// Reads until the classifier settles, the modem goes idle or the deadline passes.
    async fn collect_response(&mut self) -> Result<(OutcomeKind, String)> {
        let deadline = Instant::now() + self.timing.response_timeout;
        let mut buffer = ResponseBuffer::new();
        let mut classifier = ResponseClassifier::default();
        let mut last_data: Option<Instant> = None;

        loop {
            let wake = match last_data {
                Some(at) => deadline.min(at + self.timing.idle_timeout),
                None => deadline,
            };

            if self.read_before(wake, &mut buffer).await? {
                last_data = Some(Instant::now());
                let state = classifier.observe(&buffer.text());
                match state {
                    ClassifierState::SuccessDetected => {
                        // Trailing lines such as the final OK belong to this exchange.
                        let grace = Instant::now() + self.timing.grace_period;
                        while self.read_before(grace, &mut buffer).await? {}
                        break;
                    },
                    ClassifierState::ErrorDetected => break,
                    _ => {}
                }
            } else if Instant::now() >= deadline {
                classifier.deadline_elapsed();
                break;
            } else {
                classifier.idle_elapsed();
                break;
            }
        }

        let text = buffer.text().into_owned();
        Ok((classifier.conclude(&text), text))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> PduTransport for ModemTransport<S> {
    async fn send_pdu(&mut self, pdu: &SubmitPdu) -> Result<TransportOutcome> {
        let started = Instant::now();

        self.write_command("ATE0").await?;
        self.settle().await?;
        self.write_command("AT+CMGF=0").await?;
        self.settle().await?;

        self.write_command(&format!("AT+CMGS={}", pdu.tpdu_len())).await?;
        match self.await_prompt().await? {
            PromptWait::Ready => {},
            PromptWait::Missing(text) => {
                warn!("No data prompt after AT+CMGS within {:?}, sending PDU anyway (got {:?})", self.timing.prompt_timeout, text.trim());
            },
            PromptWait::Rejected(text) => {
                let kind = OutcomeKind::ModemError(error_line(&text));
                return Ok(TransportOutcome { kind, raw: text, elapsed: started.elapsed() });
            }
        }

        let mut payload = pdu.to_hex().into_bytes();
        payload.push(CTRL_Z);
        self.port.write_all(&payload).await
            .context("Failed to write PDU to modem")?;
        self.port.flush().await
            .context("Failed to flush serial port")?;

        let (kind, raw) = self.collect_response().await?;
        let outcome = TransportOutcome { kind, raw, elapsed: started.elapsed() };
        debug!("Modem response after {:?}: {:?}", outcome.elapsed, outcome.raw);
        Ok(outcome)
    }
}
