//! UTF-8 codepoint decoding over raw bytes.
//!
//! Structural decoding only: lead bytes classify the width, continuation
//! bytes must sit in `[0x80, 0xC0)`, and the numeric value is assembled by
//! bit arithmetic. No scalar-value validation (surrogates and the like pass
//! through); match failure is the only error channel the engine has, so a
//! malformed byte simply decodes to `None`.

const ASCII_MAX: u8 = 0x80;
const TWO_BYTE_MAX: u8 = 0xE0;
const THREE_BYTE_MAX: u8 = 0xF0;
const FOUR_BYTE_MAX: u8 = 0xF8;
const CONTINUATION_MIN: u8 = 0x80;
const CONTINUATION_MAX: u8 = 0xC0;

fn is_continuation(byte: u8) -> bool {
    (CONTINUATION_MIN..CONTINUATION_MAX).contains(&byte)
}

/// Byte width of the codepoint starting at `pos`, or `None` past the end of
/// the text, on a lead byte `>= 0xF8`, or when a required continuation byte
/// is missing or out of range.
pub fn char_len(text: &[u8], pos: usize) -> Option<usize> {
    let lead = *text.get(pos)?;

    let len = if lead < ASCII_MAX {
        1
    } else if lead < TWO_BYTE_MAX {
        2
    } else if lead < THREE_BYTE_MAX {
        3
    } else if lead < FOUR_BYTE_MAX {
        4
    } else {
        return None;
    };

    for offset in 1..len {
        if !text.get(pos + offset).copied().is_some_and(is_continuation) {
            return None;
        }
    }

    Some(len)
}

/// Numeric value of the codepoint starting at `pos`.
///
/// Fails exactly when [`char_len`] fails.
pub fn char_code(text: &[u8], pos: usize) -> Option<u32> {
    let len = char_len(text, pos)?;
    let bytes = &text[pos..pos + len];

    let code = match len {
        1 => u32::from(bytes[0]),
        2 => (u32::from(bytes[0] & 0x1F) << 6) | u32::from(bytes[1] & 0x3F),
        3 => {
            (u32::from(bytes[0] & 0x0F) << 12)
                | (u32::from(bytes[1] & 0x3F) << 6)
                | u32::from(bytes[2] & 0x3F)
        }
        _ => {
            (u32::from(bytes[0] & 0x07) << 18)
                | (u32::from(bytes[1] & 0x3F) << 12)
                | (u32::from(bytes[2] & 0x3F) << 6)
                | u32::from(bytes[3] & 0x3F)
        }
    };

    Some(code)
}

/// Encode a numeric codepoint as bytes. Inverse of [`char_code`]; codes past
/// the 4-byte form's capacity (`>= 0x20_0000`) fail.
pub fn encode_char(code: u32) -> Option<Vec<u8>> {
    let bytes = if code < 0x80 {
        vec![code as u8]
    } else if code < 0x800 {
        vec![0xC0 | (code >> 6) as u8, 0x80 | (code & 0x3F) as u8]
    } else if code < 0x1_0000 {
        vec![
            0xE0 | (code >> 12) as u8,
            0x80 | ((code >> 6) & 0x3F) as u8,
            0x80 | (code & 0x3F) as u8,
        ]
    } else if code < 0x20_0000 {
        vec![
            0xF0 | (code >> 18) as u8,
            0x80 | ((code >> 12) & 0x3F) as u8,
            0x80 | ((code >> 6) & 0x3F) as u8,
            0x80 | (code & 0x3F) as u8,
        ]
    } else {
        return None;
    };

    Some(bytes)
}
