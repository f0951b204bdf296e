use anyhow::{anyhow, Result};
use tracing::{info, warn};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use crate::config::ModemConfig;
use crate::modem::transport::{ModemTransport, TransportTiming};

pub mod transport;
pub mod types;
mod buffer;
mod classifier;
mod parsers;

/// Opens the configured serial port and probes the modem behind it.
///
/// Only failing to open the port is fatal, an unresponsive modem is logged and
/// left for the send path to report per message.
pub async fn connect(config: &ModemConfig) -> Result<ModemTransport<SerialStream>> {
    let port = tokio_serial::new(&config.device, config.baud)
        .open_native_async()
        .map_err(|e| anyhow!("Failed to open serial port {}: {}", config.device, e))?;
    info!("Opened modem on {} at {} baud", config.device, config.baud);

    let mut transport = ModemTransport::new(port, TransportTiming::from(config));
    match transport.probe().await {
        Ok(status) => {
            info!("Modem identified as {}", status.identity());

            let registration = match (status.registration, &status.operator) {
                (Some(_), Some(operator)) if status.is_registered() => format!("registered on {}", operator),
                (Some(code), None) if status.is_registered() => format!("registered ({})", code),
                (Some(code), _) => format!("not registered ({})", code),
                (None, _) => "unknown".to_string(),
            };
            let signal = match (status.signal_dbm(), status.ber) {
                (Some(dbm), Some(ber)) if ber != 99 => format!("{} dBm, BER {}", dbm, ber),
                (Some(dbm), _) => format!("{} dBm", dbm),
                (None, _) => "unknown".to_string(),
            };
            info!("Modem ready: network {}, signal {}", registration, signal);
            if !status.is_registered() {
                warn!("Modem is not registered on a network, sends will likely fail");
            }
        },
        Err(e) => warn!("Modem probe failed: {:#}", e),
    }

    Ok(transport)
}
