//! GSM 03.40 SMS-SUBMIT encoding: alphabet classification, part sizing,
//! destination address packing and the final PDU byte layout.

pub mod address;
pub mod alphabet;
pub mod capacity;
pub mod septets;
pub mod submit;

pub use address::PhoneAddress;
pub use alphabet::Encoding;
pub use submit::SubmitPdu;
