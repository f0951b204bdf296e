use anyhow::{bail, Result};
use crate::pdu::address::PhoneAddress;
use crate::pdu::alphabet::{to_septets, Encoding};
use crate::pdu::septets::{fill_bits_after, pack_septets};
use crate::sms::multipart::MessagePart;

const SMSC_DEFAULT: u8 = 0x00;
const MTI_SUBMIT: u8 = 0x01;
const UDHI: u8 = 0x40;
const MESSAGE_REFERENCE_AUTO: u8 = 0x00;
const PROTOCOL_IDENTIFIER: u8 = 0x00;

const IEI_CONCAT_8BIT: u8 = 0x00;
const IEDL_CONCAT_8BIT: u8 = 0x03;

/// UDHL octet plus the 5-octet concatenation element.
const CONCAT_HEADER_OCTETS: usize = 6;

/// Largest user data the TP-UD field can hold.
const MAX_USER_DATA_OCTETS: usize = 140;

/// A complete SMS-SUBMIT PDU, including the leading SMSC length octet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitPdu {
    bytes: Vec<u8>,
}
impl SubmitPdu {
    pub fn build(address: &PhoneAddress, part: &MessagePart, encoding: Encoding) -> Result<Self> {
        let multipart = part.total > 1;

        let mut bytes = Vec::with_capacity(176);
        bytes.push(SMSC_DEFAULT);
        bytes.push(if multipart { MTI_SUBMIT | UDHI } else { MTI_SUBMIT });
        bytes.push(MESSAGE_REFERENCE_AUTO);
        bytes.push(address.digit_count());
        bytes.push(address.type_of_number);
        bytes.extend_from_slice(&address.semi_octets);
        bytes.push(PROTOCOL_IDENTIFIER);
        bytes.push(encoding.data_coding_scheme());

        let header = multipart.then(|| concatenation_header(part));
        let header_octets = header.as_ref().map_or(0, |h| h.len());

        let (user_data_length, payload) = match encoding {
            Encoding::Gsm7 => {
                let septets = to_septets(&part.text);
                let fill_bits = fill_bits_after(header_octets);
                let header_septets = (header_octets * 8 + fill_bits as usize) / 7;
                (header_septets + septets.len(), pack_septets(&septets, fill_bits))
            }
            Encoding::Ucs2 => {
                let payload: Vec<u8> = part.text
                    .encode_utf16()
                    .flat_map(u16::to_be_bytes)
                    .collect();
                (header_octets + payload.len(), payload)
            }
        };

        let user_data_octets = header_octets + payload.len();
        if user_data_octets > MAX_USER_DATA_OCTETS {
            bail!(
                "Part {}/{} needs {} user data octets, the limit is {}",
                part.index, part.total, user_data_octets, MAX_USER_DATA_OCTETS
            );
        }

        bytes.push(user_data_length as u8);
        if let Some(header) = header {
            bytes.extend_from_slice(&header);
        }
        bytes.extend_from_slice(&payload);

        Ok(Self { bytes })
    }

    #[cfg(test)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Uppercase hex of the whole PDU, as written after the `AT+CMGS` prompt.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(&self.bytes)
    }

    /// Length passed to `AT+CMGS=`, which excludes the SMSC length octet.
    pub fn tpdu_len(&self) -> usize {
        self.bytes.len() - 1
    }
}

fn concatenation_header(part: &MessagePart) -> [u8; CONCAT_HEADER_OCTETS] {
    [
        (CONCAT_HEADER_OCTETS - 1) as u8,
        IEI_CONCAT_8BIT,
        IEDL_CONCAT_8BIT,
        part.reference,
        part.total,
        part.index,
    ]
}
