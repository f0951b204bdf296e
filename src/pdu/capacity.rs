use anyhow::{bail, Result};
use crate::pdu::alphabet::{classify, Encoding};

const GSM7_SINGLE_BUDGET: usize = 160;
const GSM7_MULTIPART_BUDGET: usize = 153;
const UCS2_SINGLE_BUDGET: usize = 70;
const UCS2_MULTIPART_BUDGET: usize = 67;

/// The concatenation header carries the part count in one octet.
pub const MAX_PARTS: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartPlan {
    pub encoding: Encoding,
    pub parts: usize,
    pub budget: usize,
}

/// Length of `text` in the encoding's budget unit.
pub fn weighted_length(text: &str, encoding: Encoding) -> usize {
    text.chars().map(|c| encoding.weight(c)).sum()
}

pub fn calculate_parts(text: &str) -> PartPlan {
    let encoding = classify(text);
    let length = weighted_length(text, encoding);
    let (single, multipart) = match encoding {
        Encoding::Gsm7 => (GSM7_SINGLE_BUDGET, GSM7_MULTIPART_BUDGET),
        Encoding::Ucs2 => (UCS2_SINGLE_BUDGET, UCS2_MULTIPART_BUDGET),
    };

    if length <= single {
        PartPlan { encoding, parts: 1, budget: single }
    } else {
        PartPlan {
            encoding,
            parts: (length + multipart - 1) / multipart,
            budget: multipart,
        }
    }
}

/// Greedy split: a character that would overflow the current part opens the
/// next one, so an escape pair (or surrogate pair) is never divided.
pub fn split_message(text: &str, plan: &PartPlan) -> Result<Vec<String>> {
    if text.is_empty() {
        return Ok(vec![String::new()]);
    }

    let mut parts = Vec::with_capacity(plan.parts);
    let mut current = String::new();
    let mut current_len = 0;

    for c in text.chars() {
        let weight = plan.encoding.weight(c);
        if current_len + weight > plan.budget && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push(c);
        current_len += weight;
    }
    if !current.is_empty() {
        parts.push(current);
    }

    if parts.len() > MAX_PARTS {
        bail!("Message needs {} parts, the concatenation limit is {}", parts.len(), MAX_PARTS);
    }
    Ok(parts)
}
