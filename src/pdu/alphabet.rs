/// Escape septet that prefixes every extension table code.
pub const ESCAPE: u8 = 0x1B;

/// Septet written for characters that have no GSM7 mapping ('?').
pub const FALLBACK: u8 = 0x3F;

/// GSM 03.38 default alphabet, indexed by septet value.
/// Index 0x1B is the escape code and never matches text.
const BASIC: [char; 128] = [
    '@', '£', '$', '¥', 'è', 'é', 'ù', 'ì', 'ò', 'Ç', '\n', 'Ø', 'ø', '\r', 'Å', 'å',
    'Δ', '_', 'Φ', 'Γ', 'Λ', 'Ω', 'Π', 'Ψ', 'Σ', 'Θ', 'Ξ', '\u{1B}', 'Æ', 'æ', 'ß', 'É',
    ' ', '!', '"', '#', '¤', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/',
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', ':', ';', '<', '=', '>', '?',
    '¡', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O',
    'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'Ä', 'Ö', 'Ñ', 'Ü', '§',
    '¿', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o',
    'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'ä', 'ö', 'ñ', 'ü', 'à',
];

/// Extension table reached through [`ESCAPE`], each entry costs two septets.
const EXTENDED: [(char, u8); 10] = [
    ('\u{0C}', 0x0A),
    ('^', 0x14),
    ('{', 0x28),
    ('}', 0x29),
    ('\\', 0x2F),
    ('[', 0x3C),
    ('~', 0x3D),
    (']', 0x3E),
    ('|', 0x40),
    ('€', 0x65),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Gsm7,
    Ucs2,
}
impl Encoding {

    /// TP-DCS byte for this encoding (default class, uncompressed).
    pub fn data_coding_scheme(self) -> u8 {
        match self {
            Encoding::Gsm7 => 0x00,
            Encoding::Ucs2 => 0x08,
        }
    }

    /// Cost of a single character in this encoding's budget unit
    /// (septets for GSM7, UTF-16 code units for UCS2).
    pub fn weight(self, c: char) -> usize {
        match self {
            Encoding::Gsm7 if is_extended(c) => 2,
            Encoding::Gsm7 => 1,
            Encoding::Ucs2 => c.len_utf16(),
        }
    }
}

pub fn basic_code(c: char) -> Option<u8> {
    BASIC.iter()
        .position(|&b| b == c)
        .filter(|&idx| idx as u8 != ESCAPE)
        .map(|idx| idx as u8)
}

pub fn extended_code(c: char) -> Option<u8> {
    EXTENDED.iter()
        .find(|(ch, _)| *ch == c)
        .map(|(_, code)| *code)
}

pub fn is_extended(c: char) -> bool {
    extended_code(c).is_some()
}

pub fn is_gsm7_compatible(text: &str) -> bool {
    text.chars().all(|c| basic_code(c).is_some() || is_extended(c))
}

/// Picks GSM7 when every character is representable, UCS2 otherwise.
pub fn classify(text: &str) -> Encoding {
    if is_gsm7_compatible(text) {
        Encoding::Gsm7
    } else {
        Encoding::Ucs2
    }
}

/// Maps text to septets. Extension characters emit an escape pair and
/// anything unmappable degrades to '?'.
pub fn to_septets(text: &str) -> Vec<u8> {
    let mut septets = Vec::with_capacity(text.len());
    for c in text.chars() {
        if let Some(code) = extended_code(c) {
            septets.push(ESCAPE);
            septets.push(code);
        } else {
            septets.push(basic_code(c).unwrap_or(FALLBACK));
        }
    }
    septets
}

#[cfg(test)]
pub fn from_septets(septets: &[u8]) -> String {
    let mut text = String::with_capacity(septets.len());
    let mut escaped = false;
    for &septet in septets {
        if escaped {
            escaped = false;
            if let Some((c, _)) = EXTENDED.iter().find(|(_, code)| *code == septet) {
                text.push(*c);
                continue;
            }
        }
        if septet == ESCAPE {
            escaped = true;
            continue;
        }
        text.push(BASIC[(septet & 0x7F) as usize]);
    }
    text
}
