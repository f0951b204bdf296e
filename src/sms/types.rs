use anyhow::{anyhow, Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxStatus {
    Pending,
    Sent,
    Failed
}
impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Sent => "sent",
            OutboxStatus::Failed => "failed"
        }
    }
}
impl TryFrom<&str> for OutboxStatus {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(OutboxStatus::Pending),
            "sent" => Ok(OutboxStatus::Sent),
            "failed" => Ok(OutboxStatus::Failed),
            _ => Err(anyhow!("Invalid outbox status value: {:?}", value))
        }
    }
}

/// A pending outbox row, as selected for sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxMessage {
    pub id: i64,
    pub phone_number: String,
    pub recipient: Option<String>,
    pub message: String,
    pub attempts: i64,
    pub error_message: Option<String>
}
impl OutboxMessage {

    /// Human label for logs, falling back to the number itself.
    pub fn display_name(&self) -> &str {
        self.recipient
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.phone_number)
    }
}

/// Net result of sending every part of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    Sent {
        parts: usize,
        reference: Option<u8>
    },
    Failed(String)
}

/// Row update that follows one send attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Sent,
    Retry {
        attempts: i64,
        error: String
    },
    Failed {
        error: String
    }
}
impl Transition {
    pub fn next(attempts: i64, outcome: &MessageOutcome, error_limit: usize) -> Self {
        match outcome {
            MessageOutcome::Sent { .. } => Transition::Sent,
            MessageOutcome::Failed(detail) => {
                let error = truncate_chars(detail, error_limit);
                let remaining = attempts - 1;
                if remaining > 0 {
                    Transition::Retry { attempts: remaining, error }
                } else {
                    Transition::Failed { error }
                }
            }
        }
    }

    pub fn status(&self) -> OutboxStatus {
        match self {
            Transition::Sent => OutboxStatus::Sent,
            Transition::Retry { .. } => OutboxStatus::Pending,
            Transition::Failed { .. } => OutboxStatus::Failed
        }
    }

    /// Attempts left after the transition, given the count before it.
    pub fn attempts_after(&self, current: i64) -> i64 {
        match self {
            Transition::Sent => current,
            Transition::Retry { attempts, .. } => *attempts,
            Transition::Failed { .. } => 0
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Transition::Sent => None,
            Transition::Retry { error, .. } | Transition::Failed { error } => Some(error)
        }
    }
}

/// Cuts `text` to at most `limit` characters without splitting a character.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string()
    }
}
