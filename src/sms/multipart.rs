use anyhow::{anyhow, Result};
use crate::pdu::capacity::{calculate_parts, split_message};
use crate::pdu::Encoding;

/// One concatenated segment of an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePart {
    pub text: String,

    /// 1-based position within the message.
    pub index: u8,
    pub total: u8,

    /// Concatenation reference shared by every part of one message.
    pub reference: u8,
}

/// Decides the encoding once for the whole message and splits it into
/// ordered parts that all carry `reference`.
pub fn plan_message(text: &str, reference: u8) -> Result<(Encoding, Vec<MessagePart>)> {
    let plan = calculate_parts(text);
    let texts = split_message(text, &plan)?;
    let total = u8::try_from(texts.len())
        .map_err(|_| anyhow!("Message split into {} parts", texts.len()))?;

    let parts = texts.into_iter()
        .zip(1..=total)
        .map(|(text, index)| MessagePart { text, index, total, reference })
        .collect();

    Ok((plan.encoding, parts))
}
