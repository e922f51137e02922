#![no_main]

use libfuzzer_sys::fuzz_target;
use patlang::Expression;

// Any pattern that compiles must serialize to a canonical form that
// compiles back to the same canonical form, and matching must not panic.
fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else { return };
    let Ok(expression) = Expression::compile(source, &[]) else { return };

    let canon = expression.to_dsl();
    let again = Expression::compile(&canon, &[]).expect("canonical form recompiles");
    assert_eq!(again.to_dsl(), canon);

    let _ = expression.matches(source.as_bytes(), &[]);
});
