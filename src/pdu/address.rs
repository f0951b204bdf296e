use anyhow::{bail, Result};

pub const TON_INTERNATIONAL: u8 = 0x91;
pub const TON_UNKNOWN: u8 = 0x81;

/// Destination address as it appears in the TP-DA field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneAddress {
    pub type_of_number: u8,
    pub digits: String,
    pub semi_octets: Vec<u8>,
}
impl PhoneAddress {
    pub fn parse(phone: &str) -> Result<Self> {
        let international = phone.chars()
            .find(|c| c.is_ascii_digit() || *c == '+')
            .is_some_and(|c| c == '+');
        let digits: String = phone.chars()
            .filter(|c| c.is_ascii_digit())
            .collect();

        if digits.is_empty() {
            bail!("Phone number {:?} contains no digits", phone);
        }
        if digits.len() > 20 {
            bail!("Phone number {:?} has {} digits, the address field allows 20", phone, digits.len());
        }

        Ok(Self {
            type_of_number: if international { TON_INTERNATIONAL } else { TON_UNKNOWN },
            semi_octets: swap_semi_octets(&digits),
            digits,
        })
    }

    /// TP-DA length field, counted in digits rather than octets.
    pub fn digit_count(&self) -> u8 {
        self.digits.len() as u8
    }
}

/// Packs "1234567" as 0x21 0x43 0x65 0xF7: low nibble first, odd counts padded with F.
fn swap_semi_octets(digits: &str) -> Vec<u8> {
    digits.as_bytes()
        .chunks(2)
        .map(|pair| {
            let low = pair[0] - b'0';
            let high = pair.get(1).map_or(0x0F, |d| d - b'0');
            (high << 4) | low
        })
        .collect()
}
