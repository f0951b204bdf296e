/// Packs 7-bit values into octets least-significant-bit first.
///
/// `fill_bits` zero bits are emitted ahead of the first septet so that, after a
/// user data header, the text starts on a septet boundary counted from the
/// beginning of the user data.
pub fn pack_septets(septets: &[u8], fill_bits: u8) -> Vec<u8> {
    if septets.is_empty() {
        return Vec::new();
    }

    let mut octets = Vec::with_capacity((septets.len() * 7 + fill_bits as usize + 7) / 8);
    let mut carry: u16 = 0;
    let mut carry_bits = u32::from(fill_bits % 7);

    for &septet in septets {
        carry |= u16::from(septet & 0x7F) << carry_bits;
        carry_bits += 7;
        while carry_bits >= 8 {
            octets.push((carry & 0xFF) as u8);
            carry >>= 8;
            carry_bits -= 8;
        }
    }
    if carry_bits > 0 {
        octets.push(carry as u8);
    }
    octets
}

/// Number of fill bits needed after a header of `header_octets` octets.
pub fn fill_bits_after(header_octets: usize) -> u8 {
    match (header_octets * 8) % 7 {
        0 => 0,
        rem => (7 - rem) as u8,
    }
}

#[cfg(test)]
pub fn unpack_septets(octets: &[u8], fill_bits: u8, count: usize) -> Vec<u8> {
    let mut septets = Vec::with_capacity(count);
    let mut bit = fill_bits as usize;
    while septets.len() < count {
        let byte = bit / 8;
        let offset = bit % 8;
        let low = u16::from(octets.get(byte).copied().unwrap_or(0));
        let high = u16::from(octets.get(byte + 1).copied().unwrap_or(0));
        septets.push((((high << 8 | low) >> offset) & 0x7F) as u8);
        bit += 7;
    }
    septets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdu::alphabet::{from_septets, to_septets};

    #[test]
    fn test_known_vector() {
        let packed = pack_septets(&to_septets("hellohello"), 0);
        assert_eq!(hex::encode_upper(&packed), "E8329BFD4697D9EC37");
    }

    #[test]
    fn test_eight_septets_fill_seven_octets() {
        let packed = pack_septets(&to_septets("12345678"), 0);
        assert_eq!(packed.len(), 7);
        assert_eq!(hex::encode_upper(&packed), "31D98C56B3DD70");
    }

    #[test]
    fn test_fill_bit_shifts_payload() {
        // One fill bit: 'a' (0x61) lands in bits 1..8.
        let packed = pack_septets(&[0x61], 1);
        assert_eq!(packed, vec![0xC2]);

        let packed = pack_septets(&to_septets("hello"), 1);
        assert_eq!(unpack_septets(&packed, 1, 5), to_septets("hello"));
    }

    #[test]
    fn test_fill_bits_after() {
        assert_eq!(fill_bits_after(6), 1);
        assert_eq!(fill_bits_after(7), 0);
        assert_eq!(fill_bits_after(0), 0);
        assert_eq!(fill_bits_after(1), 6);
    }

    #[test]
    fn test_round_trip_with_and_without_fill() {
        let samples = [
            "A",
            "Hello World!",
            "1234567",
            "12345678",
            "Price: 5€ {braces} [brackets] ~tilde| back\\slash ^caret",
            "@£$¥èéùìòÇ\nØø\rÅåΔ_ΦΓΛΩΠΨΣΘΞÆæßÉ !\"#¤%&'()*+,-./",
            "¡ABCDEFGHIJKLMNOPQRSTUVWXYZÄÖÑÜ§¿abcdefghijklmnopqrstuvwxyzäöñüà",
        ];
        for text in samples {
            let septets = to_septets(text);
            for fill in [0, 1, 6] {
                let packed = pack_septets(&septets, fill);
                assert_eq!(packed.len(), (septets.len() * 7 + fill as usize + 7) / 8);
                let unpacked = unpack_septets(&packed, fill, septets.len());
                assert_eq!(from_septets(&unpacked), text, "fill {} for {:?}", fill, text);
            }
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(pack_septets(&[], 1).is_empty());
    }
}
