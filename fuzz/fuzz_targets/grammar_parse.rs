#![no_main]

use std::sync::OnceLock;

use libfuzzer_sys::fuzz_target;
use patlang::RuleSet;

const ARITHMETIC: &str = r#"
rules:
  - name: number
    pattern: NUMT()
  - name: sum
    pattern: EXP(3)-SET("+-")-EXP(3)
  - name: product
    pattern: EXP(3)-SET("*/")-EXP(3)
grammar:
  members: [number, sum, product]
"#;

fn rules() -> &'static RuleSet {
    static RULES: OnceLock<RuleSet> = OnceLock::new();
    RULES.get_or_init(|| RuleSet::from_str(ARITHMETIC).expect("rule set loads"))
}

// Parsing arbitrary bytes must terminate without panicking, and the
// position must land inside the text on success and stay put on failure.
fuzz_target!(|data: &[u8]| {
    let mut pos = 0;
    let parsed = rules().parse(data, &mut pos, data.len());
    if parsed {
        assert_eq!(pos, data.len());
    } else {
        assert_eq!(pos, 0);
    }
});
