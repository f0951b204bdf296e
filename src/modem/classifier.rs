use tracing::warn;
use crate::modem::types::OutcomeKind;

const SUCCESS_TOKEN: &str = "+CMGS:";
const ERROR_TOKEN: &str = "ERROR";
const CMS_ERROR_TOKEN: &str = "+CMS ERROR:";

/// Responses longer than this with no recognised token are taken as sent.
const HEURISTIC_SUCCESS_CHARS: usize = 5;

/// Final result codes that end a plain AT command exchange.
pub fn is_final_result_line(line: &str) -> bool {
    line == "OK" || line == ERROR_TOKEN
        || line.starts_with("+CME ERROR:") || line.starts_with(CMS_ERROR_TOKEN)
}

pub fn has_ok_line(text: &str) -> bool {
    text.split(['\r', '\n']).any(|line| line.trim() == "OK")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassifierState {
    #[default]
    AwaitingData,
    Receiving,
    SuccessDetected,
    ErrorDetected,
    IdleTimeout,
    DeadlineElapsed,
}
impl ClassifierState {
    pub fn is_final(self) -> bool {
        matches!(
            self,
            ClassifierState::SuccessDetected
                | ClassifierState::ErrorDetected
                | ClassifierState::IdleTimeout
                | ClassifierState::DeadlineElapsed
        )
    }
}

/// Tracks the modem's reply to a submitted PDU as it streams in.
#[derive(Debug, Default)]
pub struct ResponseClassifier {
    state: ClassifierState,
}
impl ResponseClassifier {
    #[cfg(test)]
    pub fn state(&self) -> ClassifierState {
        self.state
    }

    /// Re-evaluates the accumulated response after a read.
    pub fn observe(&mut self, text: &str) -> ClassifierState {
        if self.state.is_final() {
            return self.state;
        }

        let has_error = text.contains(ERROR_TOKEN) || text.contains(CMS_ERROR_TOKEN);
        self.state = if text.contains(SUCCESS_TOKEN) && !has_error {
            ClassifierState::SuccessDetected
        } else if has_error {
            ClassifierState::ErrorDetected
        } else if has_ok_line(text) {
            ClassifierState::SuccessDetected
        } else {
            ClassifierState::Receiving
        };
        self.state
    }

    /// The modem went quiet after sending something.
    pub fn idle_elapsed(&mut self) {
        if self.state == ClassifierState::Receiving {
            self.state = ClassifierState::IdleTimeout;
        }
    }

    pub fn deadline_elapsed(&mut self) {
        if !self.state.is_final() {
            self.state = ClassifierState::DeadlineElapsed;
        }
    }

    pub fn conclude(&self, text: &str) -> OutcomeKind {
        match self.state {
            ClassifierState::SuccessDetected => OutcomeKind::Success,
            ClassifierState::ErrorDetected => OutcomeKind::ModemError(error_line(text)),
            ClassifierState::AwaitingData => OutcomeKind::Timeout,
            ClassifierState::Receiving
            | ClassifierState::IdleTimeout
            | ClassifierState::DeadlineElapsed => settle(text),
        }
    }
}

/// Classification of whatever arrived once reading has stopped.
fn settle(text: &str) -> OutcomeKind {
    let trimmed = text.trim();
    let upper = trimmed.to_uppercase();

    if upper.contains(SUCCESS_TOKEN) && !upper.contains(ERROR_TOKEN) {
        OutcomeKind::Success
    } else if upper.contains(ERROR_TOKEN) {
        OutcomeKind::ModemError(error_line(trimmed))
    } else if upper.contains("OK") && upper.len() > 2 {
        OutcomeKind::Success
    } else if trimmed.is_empty() {
        OutcomeKind::Timeout
    } else if trimmed.chars().count() > HEURISTIC_SUCCESS_CHARS {
        warn!("Treating unrecognised modem response as sent: {:?}", trimmed);
        OutcomeKind::Success
    } else {
        OutcomeKind::Ambiguous(trimmed.to_string())
    }
}

/// First line mentioning ERROR, or the whole trimmed response.
pub fn error_line(text: &str) -> String {
    text.split(['\r', '\n'])
        .map(str::trim)
        .find(|line| line.to_uppercase().contains(ERROR_TOKEN))
        .unwrap_or(text.trim())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify_stream(chunks: &[&str]) -> (ClassifierState, String) {
        let mut classifier = ResponseClassifier::default();
        let mut text = String::new();
        for chunk in chunks {
            text.push_str(chunk);
            if classifier.observe(&text).is_final() {
                break;
            }
        }
        (classifier.state(), text)
    }

    #[test]
    fn test_cmgs_detected_across_chunks() {
        let (state, text) = classify_stream(&["\r\n+CM", "GS: 12\r\n"]);
        assert_eq!(state, ClassifierState::SuccessDetected);
        assert_eq!(ResponseClassifier { state }.conclude(&text), OutcomeKind::Success);
    }

    #[test]
    fn test_error_wins_over_cmgs() {
        let mut classifier = ResponseClassifier::default();
        classifier.observe("\r\n+CMGS: 1\r\nERROR\r\n");
        assert_eq!(classifier.state(), ClassifierState::ErrorDetected);
    }

    #[test]
    fn test_cms_error_is_reported_verbatim() {
        let text = "\r\n+CMS ERROR: 500\r\n";
        let mut classifier = ResponseClassifier::default();
        assert_eq!(classifier.observe(text), ClassifierState::ErrorDetected);
        assert_eq!(classifier.conclude(text), OutcomeKind::ModemError("+CMS ERROR: 500".to_string()));
    }

    #[test]
    fn test_ok_line_is_success() {
        let mut classifier = ResponseClassifier::default();
        assert_eq!(classifier.observe("\r\nO"), ClassifierState::Receiving);
        assert_eq!(classifier.observe("\r\nOK\r\n"), ClassifierState::SuccessDetected);

        // OK inside another word is not a result code.
        let mut classifier = ResponseClassifier::default();
        assert_eq!(classifier.observe("\r\nTOKEN\r\n"), ClassifierState::Receiving);
    }

    #[test]
    fn test_silence_is_timeout() {
        let mut classifier = ResponseClassifier::default();
        classifier.idle_elapsed();
        assert_eq!(classifier.state(), ClassifierState::AwaitingData);
        classifier.deadline_elapsed();
        assert_eq!(classifier.state(), ClassifierState::DeadlineElapsed);
        assert_eq!(classifier.conclude(""), OutcomeKind::Timeout);
        assert_eq!(ResponseClassifier::default().conclude(""), OutcomeKind::Timeout);
    }

    #[test]
    fn test_idle_settlement() {
        let settle_after = |text: &str| {
            let mut classifier = ResponseClassifier::default();
            classifier.observe(text);
            classifier.idle_elapsed();
            assert_eq!(classifier.state(), ClassifierState::IdleTimeout);
            classifier.conclude(text)
        };

        assert_eq!(settle_after("\r\nAB\r\n"), OutcomeKind::Ambiguous("AB".to_string()));
        assert_eq!(settle_after("\r\n+CUSTOM: 1\r\n"), OutcomeKind::Success);
        assert_eq!(settle_after("\r\n \r\n"), OutcomeKind::Timeout);
        assert_eq!(settle_after("\r\nready ok\r\n"), OutcomeKind::Success);
    }

    #[test]
    fn test_final_state_is_sticky() {
        let mut classifier = ResponseClassifier::default();
        classifier.observe("\r\n+CMGS: 3\r\n");
        classifier.observe("\r\n+CMGS: 3\r\n\r\nERROR\r\n");
        classifier.deadline_elapsed();
        assert_eq!(classifier.state(), ClassifierState::SuccessDetected);
    }

    #[test]
    fn test_final_result_lines() {
        assert!(is_final_result_line("OK"));
        assert!(is_final_result_line("ERROR"));
        assert!(is_final_result_line("+CME ERROR: 10"));
        assert!(!is_final_result_line("+CSQ: 20,99"));
    }
}
