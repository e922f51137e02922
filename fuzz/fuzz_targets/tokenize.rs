#![no_main]

use libfuzzer_sys::fuzz_target;
use patlang::text::next_token;

// Scanning must always make progress and never step past the text.
fuzz_target!(|data: &[u8]| {
    let mut pos = 0;
    while let Some(token) = next_token(data, pos) {
        assert!(!token.is_empty());
        pos += token.len();
        assert!(pos <= data.len());
    }
});
