//! Text transforms selected by `data_coding`.
//!
//! GSM 03.38 is written unpacked, one septet per octet, which is what SMSCs
//! expect in `short_message` for data coding 0.

use super::DataCoding;

const ESCAPE: u8 = 0x1B;
const REPLACEMENT: u8 = b'?';

#[rustfmt::skip]
const GSM7_BASIC: [char; 128] = [
    '@', '£', '$', '¥', 'è', 'é', 'ù', 'ì', 'ò', 'Ç', '\n', 'Ø', 'ø', '\r', 'Å', 'å',
    'Δ', '_', 'Φ', 'Γ', 'Λ', 'Ω', 'Π', 'Ψ', 'Σ', 'Θ', 'Ξ', '\u{1b}', 'Æ', 'æ', 'ß', 'É',
    ' ', '!', '"', '#', '¤', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/',
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', ':', ';', '<', '=', '>', '?',
    '¡', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O',
    'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'Ä', 'Ö', 'Ñ', 'Ü', '§',
    '¿', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o',
    'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'ä', 'ö', 'ñ', 'ü', 'à',
];

const GSM7_EXTENSION: [(u8, char); 10] = [
    (0x0A, '\u{0c}'),
    (0x14, '^'),
    (0x28, '{'),
    (0x29, '}'),
    (0x2F, '\\'),
    (0x3C, '['),
    (0x3D, '~'),
    (0x3E, ']'),
    (0x40, '|'),
    (0x65, '€'),
];

/// Encode UTF-8 text for the given data coding.
///
/// Characters the target alphabet cannot represent become `?`.
pub fn encode(coding: DataCoding, text: &str) -> Vec<u8> {
    match coding {
        DataCoding::Default => encode_gsm7(text),
        DataCoding::Latin1 => text
            .chars()
            .map(|c| u8::try_from(u32::from(c)).unwrap_or(REPLACEMENT))
            .collect(),
        DataCoding::Iso88595 => text.chars().map(encode_iso8859_5).collect(),
        DataCoding::Ucs2 => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
        DataCoding::Other(_) => text.as_bytes().to_vec(),
    }
}

/// Decode a payload in the given data coding into UTF-8 text.
pub fn decode(coding: DataCoding, raw: &[u8]) -> String {
    match coding {
        DataCoding::Default => decode_gsm7(raw),
        DataCoding::Latin1 => raw.iter().map(|&b| char::from(b)).collect(),
        DataCoding::Iso88595 => raw.iter().map(|&b| decode_iso8859_5(b)).collect(),
        DataCoding::Ucs2 => {
            let pairs = raw.chunks_exact(2);
            let odd = !pairs.remainder().is_empty();
            let units: Vec<u16> = pairs.map(|pair| u16::from_be_bytes([pair[0], pair[1]])).collect();
            let mut text = String::from_utf16_lossy(&units);
            // A dangling octet cannot form a code unit.
            if odd {
                text.push(char::REPLACEMENT_CHARACTER);
            }
            text
        }
        DataCoding::Other(_) => String::from_utf8_lossy(raw).into_owned(),
    }
}

fn encode_gsm7(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        if let Some(septet) = GSM7_BASIC.iter().position(|&g| g == c && c != '\u{1b}') {
            out.push(septet as u8);
        } else if let Some(&(septet, _)) = GSM7_EXTENSION.iter().find(|&&(_, g)| g == c) {
            out.push(ESCAPE);
            out.push(septet);
        } else {
            out.push(REPLACEMENT);
        }
    }
    out
}

fn decode_gsm7(raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut septets = raw.iter().map(|&b| b & 0x7F);
    while let Some(septet) = septets.next() {
        if septet != ESCAPE {
            out.push(GSM7_BASIC[septet as usize]);
            continue;
        }
        match septets.next() {
            Some(ext) => match GSM7_EXTENSION.iter().find(|&&(code, _)| code == ext) {
                Some(&(_, c)) => out.push(c),
                // Unknown escapes fall back to the basic character.
                None => out.push(GSM7_BASIC[ext as usize]),
            },
            None => out.push(' '),
        }
    }
    out
}

fn encode_iso8859_5(c: char) -> u8 {
    let cp = u32::from(c);
    let byte = match cp {
        0x00..=0xA0 | 0xAD => cp,
        0x2116 => 0xF0,
        0xA7 => 0xFD,
        0x0401..=0x040C => cp - 0x0401 + 0xA1,
        0x040E..=0x044F => cp - 0x040E + 0xAE,
        0x0451..=0x045C => cp - 0x0451 + 0xF1,
        0x045E..=0x045F => cp - 0x045E + 0xFE,
        _ => u32::from(REPLACEMENT),
    };
    byte as u8
}

fn decode_iso8859_5(b: u8) -> char {
    let cp = match b {
        0x00..=0xA0 | 0xAD => u32::from(b),
        0xF0 => 0x2116,
        0xFD => 0xA7,
        0xA1..=0xAC => u32::from(b) - 0xA1 + 0x0401,
        0xAE..=0xEF => u32::from(b) - 0xAE + 0x040E,
        0xF1..=0xFC => u32::from(b) - 0xF1 + 0x0451,
        0xFE..=0xFF => u32::from(b) - 0xFE + 0x045E,
    };
    char::from_u32(cp).unwrap_or(char::REPLACEMENT_CHARACTER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gsm7_ascii() {
        let raw = encode(DataCoding::Default, "Hello world");
        assert_eq!(raw, b"Hello world");
        assert_eq!(decode(DataCoding::Default, &raw), "Hello world");
    }

    #[test]
    fn test_gsm7_special_characters() {
        let raw = encode(DataCoding::Default, "@£€[");
        assert_eq!(raw, vec![0x00, 0x01, 0x1B, 0x65, 0x1B, 0x3C]);
        assert_eq!(decode(DataCoding::Default, &raw), "@£€[");
    }

    #[test]
    fn test_gsm7_unrepresentable() {
        assert_eq!(encode(DataCoding::Default, "a✓b"), b"a?b");
    }

    #[test]
    fn test_ucs2() {
        let raw = encode(DataCoding::Ucs2, "Hé");
        assert_eq!(raw, vec![0x00, 0x48, 0x00, 0xE9]);
        assert_eq!(decode(DataCoding::Ucs2, &raw), "Hé");
    }

    #[test]
    fn test_ucs2_odd_length() {
        assert_eq!(decode(DataCoding::Ucs2, &[0x00, 0x48, 0x00]), "H\u{FFFD}");
        assert_eq!(decode(DataCoding::Ucs2, &[0x41]), "\u{FFFD}");
    }

    #[test]
    fn test_latin1_and_cyrillic() {
        assert_eq!(encode(DataCoding::Latin1, "café"), vec![b'c', b'a', b'f', 0xE9]);
        assert_eq!(decode(DataCoding::Latin1, &[b'c', 0xE9]), "cé");

        let raw = encode(DataCoding::Iso88595, "Привет");
        assert_eq!(raw[0], 0xBF);
        assert_eq!(decode(DataCoding::Iso88595, &raw), "Привет");
    }
}
