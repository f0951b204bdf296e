use std::fmt::{Display, Formatter};
use std::time::Duration;
use crate::modem::parsers::parse_cmgs_result;

/// Longest slice of an inconclusive response kept in the failure detail.
const AMBIGUOUS_DETAIL_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeKind {
    Success,
    ModemError(String),
    Timeout,
    Ambiguous(String),
}
impl Display for OutcomeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeKind::Success => write!(f, "Success"),
            OutcomeKind::ModemError(text) => write!(f, "ModemError: {}", text),
            OutcomeKind::Timeout => write!(f, "Timeout"),
            OutcomeKind::Ambiguous(text) => write!(f, "Ambiguous: {:?}", text),
        }
    }
}

/// Result of pushing one PDU through the modem.
#[derive(Debug, Clone)]
pub struct TransportOutcome {
    pub kind: OutcomeKind,
    pub raw: String,
    pub elapsed: Duration,
}
impl TransportOutcome {
    /// Text persisted as the row's error message, `None` on success.
    pub fn failure_detail(&self) -> Option<String> {
        match &self.kind {
            OutcomeKind::Success => None,
            OutcomeKind::ModemError(text) => Some(text.clone()),
            OutcomeKind::Timeout => Some(format!(
                "No response from modem (timeout after {:.1}s)",
                self.elapsed.as_secs_f64()
            )),
            OutcomeKind::Ambiguous(text) => Some(format!(
                "Ambiguous modem response: {}",
                text.chars().take(AMBIGUOUS_DETAIL_CHARS).collect::<String>()
            )),
        }
    }

    /// TP-MR assigned by the network, when the modem reported one.
    pub fn message_reference(&self) -> Option<u8> {
        parse_cmgs_result(&self.raw).ok()
    }
}

/// What the startup probe learned about the modem.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModemStatus {
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub revision: Option<String>,
    pub registration: Option<u8>,
    pub operator: Option<String>,
    pub rssi: Option<i32>,
    pub ber: Option<i32>,
}
impl ModemStatus {
    /// Registered on the home network (1) or roaming (5).
    pub fn is_registered(&self) -> bool {
        matches!(self.registration, Some(1) | Some(5))
    }

    pub fn signal_dbm(&self) -> Option<i32> {
        match self.rssi {
            Some(rssi @ 0..=31) => Some(-113 + 2 * rssi),
            _ => None,
        }
    }

    /// Manufacturer, model and firmware joined for the startup log.
    pub fn identity(&self) -> String {
        let name = [&self.manufacturer, &self.model]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");

        match (name.is_empty(), &self.revision) {
            (true, None) => "unknown modem".to_string(),
            (true, Some(revision)) => format!("unknown modem (firmware {})", revision),
            (false, None) => name,
            (false, Some(revision)) => format!("{} (firmware {})", name, revision),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(kind: OutcomeKind, raw: &str) -> TransportOutcome {
        TransportOutcome { kind, raw: raw.to_string(), elapsed: Duration::from_millis(30_000) }
    }

    #[test]
    fn test_failure_detail() {
        assert_eq!(outcome(OutcomeKind::Success, "OK").failure_detail(), None);
        assert_eq!(
            outcome(OutcomeKind::ModemError("+CMS ERROR: 38".to_string()), "").failure_detail().unwrap(),
            "+CMS ERROR: 38"
        );
        assert_eq!(
            outcome(OutcomeKind::Timeout, "").failure_detail().unwrap(),
            "No response from modem (timeout after 30.0s)"
        );
        let detail = outcome(OutcomeKind::Ambiguous("x".repeat(80)), "").failure_detail().unwrap();
        assert_eq!(detail, format!("Ambiguous modem response: {}", "x".repeat(50)));
    }

    #[test]
    fn test_message_reference() {
        assert_eq!(outcome(OutcomeKind::Success, "\r\n+CMGS: 17\r\n\r\nOK\r\n").message_reference(), Some(17));
        assert_eq!(outcome(OutcomeKind::Success, "\r\nOK\r\n").message_reference(), None);
    }

    #[test]
    fn test_modem_status() {
        let status = ModemStatus { registration: Some(5), rssi: Some(20), ber: Some(99), ..ModemStatus::default() };
        assert!(status.is_registered());
        assert_eq!(status.signal_dbm(), Some(-73));

        let status = ModemStatus { registration: Some(2), rssi: Some(99), ..ModemStatus::default() };
        assert!(!status.is_registered());
        assert_eq!(status.signal_dbm(), None);
    }

    #[test]
    fn test_modem_identity() {
        assert_eq!(ModemStatus::default().identity(), "unknown modem");

        let status = ModemStatus {
            manufacturer: Some("SIMCOM_Ltd".to_string()),
            model: Some("SIMCOM_SIM800L".to_string()),
            revision: Some("1418B05SIM800L24".to_string()),
            ..ModemStatus::default()
        };
        assert_eq!(status.identity(), "SIMCOM_Ltd SIMCOM_SIM800L (firmware 1418B05SIM800L24)");

        let status = ModemStatus { model: Some("E173".to_string()), ..ModemStatus::default() };
        assert_eq!(status.identity(), "E173");
    }
}
