use common::domain::DataCoding;

/// Message text ready for storage plus the audit copy of the raw bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    pub display_text: String,
    /// Lowercase hex of the reassembled bytes before any transcoding
    pub raw_hex: String,
}

/// Convert a reassembled message body to UTF-8 display text.
///
/// UCS2 bodies (data_coding 8 or the `UCS2` scheme) are decoded as UTF-16BE;
/// unpaired surrogates and a dangling odd byte become U+FFFD. Any other body
/// is already UTF-8 and passes through, with invalid sequences replaced.
/// NUL characters are replaced with U+FFFD as well since PostgreSQL text
/// columns cannot hold them; `raw_hex` still carries the original bytes.
pub fn normalize(buffer: &[u8], coding: Option<&DataCoding>) -> NormalizedText {
    let raw_hex = hex::encode(buffer);

    let decoded = match coding {
        Some(coding) if coding.is_ucs2() => decode_utf16_be(buffer),
        _ => String::from_utf8_lossy(buffer).into_owned(),
    };

    let display_text = if decoded.contains('\0') {
        decoded.replace('\0', "\u{FFFD}")
    } else {
        decoded
    };

    NormalizedText {
        display_text,
        raw_hex,
    }
}

fn decode_utf16_be(buffer: &[u8]) -> String {
    let chunks = buffer.chunks_exact(2);
    let dangling = !chunks.remainder().is_empty();
    let units = chunks.map(|pair| u16::from_be_bytes([pair[0], pair[1]]));

    let mut text: String = char::decode_utf16(units)
        .map(|unit| unit.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();

    if dangling {
        text.push(char::REPLACEMENT_CHARACTER);
    }

    text
}
