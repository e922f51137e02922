//! Byte-level text handling: UTF-8 codepoint decoding and token scanning.

pub mod decoder;
pub mod scanner;

pub use scanner::{next_token, Token, TokenKind};
