//! Lexical scanning: classifies a codepoint run into one token.
//!
//! SPACE, WORD and NUMBER tokens are maximal runs of same-class single-byte
//! codepoints; a NUMBER run accepts one `.` as a decimal point (possibly
//! trailing). Everything else is a single SYMBOL token, including any
//! codepoint wider than one byte. A multi-byte codepoint also terminates a run
//! it follows, as does a decode failure mid-run; a decode failure at the run
//! start fails the whole scan.

use crate::text::decoder::char_len;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Space,
    Symbol,
    Word,
    Number,
}

/// Single-byte character classes. Multi-byte codepoints are classified as
/// symbols without consulting this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteClass {
    Space,
    Symbol,
    Digit,
    Letter,
}

fn byte_class(byte: u8) -> ByteClass {
    match byte {
        0x00..=0x20 | 0x7F => ByteClass::Space,
        b'0'..=b'9' => ByteClass::Digit,
        b'A'..=b'Z' | b'a'..=b'z' => ByteClass::Letter,
        _ => ByteClass::Symbol,
    }
}

/// True for bytes in the SPACE class (0x00 through 0x20 and DEL).
pub fn is_space(byte: u8) -> bool {
    matches!(byte_class(byte), ByteClass::Space)
}

/// One scanned token: its kind, the bytes it covers, and its codepoint count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a [u8],
    pub chars: u32,
}

impl Token<'_> {
    /// Byte length of the token.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Numeric value of a NUMBER token. `None` for any other kind.
    pub fn number_value(&self) -> Option<f64> {
        if self.kind != TokenKind::Number {
            return None;
        }
        std::str::from_utf8(self.text).ok()?.parse().ok()
    }
}

/// Scan the token starting at `pos`. `None` at the end of the text or when
/// the codepoint at `pos` does not decode.
pub fn next_token(text: &[u8], pos: usize) -> Option<Token<'_>> {
    let lead_len = char_len(text, pos)?;

    if lead_len > 1 {
        return Some(Token {
            kind: TokenKind::Symbol,
            text: &text[pos..pos + lead_len],
            chars: 1,
        });
    }

    let class = byte_class(text[pos]);
    if class == ByteClass::Symbol {
        return Some(Token {
            kind: TokenKind::Symbol,
            text: &text[pos..pos + 1],
            chars: 1,
        });
    }

    let kind = match class {
        ByteClass::Space => TokenKind::Space,
        ByteClass::Digit => TokenKind::Number,
        _ => TokenKind::Word,
    };

    let mut end = pos + 1;
    let mut seen_point = false;
    loop {
        // A decode failure or multi-byte codepoint ends the run.
        match char_len(text, end) {
            Some(1) => {}
            _ => break,
        }

        let byte = text[end];
        let next_class = byte_class(byte);
        let continues = match kind {
            TokenKind::Space => next_class == ByteClass::Space,
            TokenKind::Word => next_class == ByteClass::Letter,
            TokenKind::Number => {
                if next_class == ByteClass::Digit {
                    true
                } else if byte == b'.' && !seen_point {
                    seen_point = true;
                    true
                } else {
                    false
                }
            }
            TokenKind::Symbol => false,
        };
        if !continues {
            break;
        }
        end += 1;
    }

    Some(Token {
        kind,
        text: &text[pos..end],
        chars: (end - pos) as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(text: &[u8], pos: usize) -> Token<'_> {
        next_token(text, pos).expect("token")
    }

    #[test]
    fn space_run() {
        let t = token(b"  \t x", 0);
        assert_eq!(t.kind, TokenKind::Space);
        assert_eq!(t.text, b"  \t ");
        assert_eq!(t.chars, 4);
    }

    #[test]
    fn word_run() {
        let t = token(b"hello world", 0);
        assert_eq!(t.kind, TokenKind::Word);
        assert_eq!(t.text, b"hello");
    }

    #[test]
    fn word_stops_at_digit() {
        let t = token(b"ab12", 0);
        assert_eq!(t.text, b"ab");
        let t = token(b"ab12", 2);
        assert_eq!(t.kind, TokenKind::Number);
        assert_eq!(t.text, b"12");
    }

    #[test]
    fn integer_token() {
        let t = token(b"1234+", 0);
        assert_eq!(t.kind, TokenKind::Number);
        assert_eq!(t.text, b"1234");
        assert_eq!(t.number_value(), Some(1234.0));
    }

    #[test]
    fn decimal_token() {
        let t = token(b"3.25 ", 0);
        assert_eq!(t.text, b"3.25");
        assert_eq!(t.number_value(), Some(3.25));
    }

    #[test]
    fn second_point_ends_number() {
        let t = token(b"1.2.3", 0);
        assert_eq!(t.text, b"1.2");
        let t = token(b"1.2.3", 3);
        assert_eq!(t.kind, TokenKind::Symbol);
        assert_eq!(t.text, b".");
    }

    #[test]
    fn trailing_point_is_kept() {
        let t = token(b"7.", 0);
        assert_eq!(t.text, b"7.");
        assert_eq!(t.number_value(), Some(7.0));
    }

    #[test]
    fn point_alone_is_a_symbol() {
        let t = token(b".5", 0);
        assert_eq!(t.kind, TokenKind::Symbol);
        assert_eq!(t.text, b".");
    }

    #[test]
    fn ascii_symbol() {
        let t = token(b"+x", 0);
        assert_eq!(t.kind, TokenKind::Symbol);
        assert_eq!(t.text, b"+");
        assert_eq!(t.chars, 1);
    }

    #[test]
    fn underscore_is_a_symbol() {
        let t = token(b"_", 0);
        assert_eq!(t.kind, TokenKind::Symbol);
    }

    #[test]
    fn multibyte_codepoint_is_a_symbol() {
        let text = "é1".as_bytes();
        let t = token(text, 0);
        assert_eq!(t.kind, TokenKind::Symbol);
        assert_eq!(t.text, "é".as_bytes());
        assert_eq!(t.chars, 1);
    }

    #[test]
    fn multibyte_ends_word_run() {
        let text = "abé".as_bytes();
        let t = token(text, 0);
        assert_eq!(t.kind, TokenKind::Word);
        assert_eq!(t.text, b"ab");
    }

    #[test]
    fn del_byte_is_space_class() {
        let t = token(b" \x7F.", 0);
        assert_eq!(t.kind, TokenKind::Space);
        assert_eq!(t.text, b" \x7F");
    }

    #[test]
    fn scan_at_end_fails() {
        assert_eq!(next_token(b"ab", 2), None);
        assert_eq!(next_token(b"", 0), None);
    }

    #[test]
    fn ill_formed_at_start_fails() {
        assert_eq!(next_token(&[0xFF, b'a'], 0), None);
        assert_eq!(next_token(&[0xC3], 0), None); // truncated two-byte head
    }

    #[test]
    fn ill_formed_mid_run_ends_token() {
        let t = token(&[b'a', b'b', 0xFF], 0);
        assert_eq!(t.kind, TokenKind::Word);
        assert_eq!(t.text, b"ab");
    }

    #[test]
    fn number_value_on_non_number_is_none() {
        assert_eq!(token(b"abc", 0).number_value(), None);
        assert_eq!(token(b"+", 0).number_value(), None);
    }

    mod prop_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn tokens_tile_ascii_input(s in "[ -~]{0,40}") {
                // Over printable ASCII, scanning from each token end must
                // cover the input exactly, with no gaps and no overlaps.
                let bytes = s.as_bytes();
                let mut pos = 0;
                while pos < bytes.len() {
                    let t = next_token(bytes, pos).expect("ascii always scans");
                    prop_assert!(!t.is_empty());
                    prop_assert_eq!(&bytes[pos..pos + t.len()], t.text);
                    pos += t.len();
                }
                prop_assert_eq!(pos, bytes.len());
            }

            #[test]
            fn never_panics_on_arbitrary_bytes(bytes in prop::collection::vec(any::<u8>(), 0..24),
                                               pos in 0usize..30) {
                if let Some(t) = next_token(&bytes, pos) {
                    prop_assert!(pos + t.len() <= bytes.len());
                    prop_assert!(!t.is_empty());
                }
            }
        }
    }
}
