//! Benchmark the pattern engine over synthesized workloads.
//!
//! Usage:
//!   cargo run --release --bin bench_patlang            # all workloads
//!   cargo run --release --bin bench_patlang -- match   # one workload
//!
//! Workloads: compile (DSL to commands), match (expression over a long
//! line), grammar (recursive arithmetic chains), scan (tokenizing a text
//! corpus). Each reports wall time and throughput.

use std::time::Instant;

use clap::Parser;
use patlang::text::next_token;
use patlang::{Expression, RuleSet};

// --- CLI ---

#[derive(Parser)]
#[command(about = "Benchmark the pattern engine over synthesized workloads.")]
struct Args {
    /// Workload: compile, match, grammar, scan, or omit for all
    #[arg(default_value = "all")]
    mode: String,
}

// --- Workloads ---

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

const FIELDS_PATTERN: &str = "REPIF(XOR(NUMT(),REP(LETTER(),1)),UCHAR(\",\"))";

fn main() {
    let args = Args::parse();

    match args.mode.as_str() {
        "compile" => bench_compile(),
        "match" => bench_match(),
        "grammar" => bench_grammar(),
        "scan" => bench_scan(),
        "all" => {
            bench_compile();
            bench_match();
            bench_grammar();
            bench_scan();
        }
        other => {
            eprintln!("Unknown mode: {other}. Use: compile, match, grammar, scan, or all.");
            std::process::exit(1);
        }
    }
}

fn report(name: &str, iterations: usize, bytes: usize, start: &Instant) {
    let secs = start.elapsed().as_secs_f64();
    let mib = bytes as f64 / (1024.0 * 1024.0);
    println!(
        "{name:<10} {iterations:>9} iters  {secs:>8.3}s  {:>8.1} MiB/s",
        mib / secs
    );
}

fn bench_compile() {
    let iterations = 50_000;
    let start = Instant::now();
    for _ in 0..iterations {
        let expression =
            Expression::compile(FIELDS_PATTERN, &[]).expect("benchmark pattern compiles");
        std::hint::black_box(&expression);
    }
    report("compile", iterations, iterations * FIELDS_PATTERN.len(), &start);
}

fn bench_match() {
    let fields = Expression::compile(FIELDS_PATTERN, &[]).expect("benchmark pattern compiles");
    let mut line = String::new();
    for i in 0..4_000 {
        if i > 0 {
            line.push(',');
        }
        if i % 3 == 0 {
            line.push_str("word");
        } else {
            line.push_str("1234.5");
        }
    }
    let text = line.as_bytes();

    let iterations = 2_000;
    let start = Instant::now();
    for _ in 0..iterations {
        assert!(fields.matches(std::hint::black_box(text), &[]));
    }
    report("match", iterations, iterations * text.len(), &start);
}

fn bench_grammar() {
    let rules = RuleSet::from_str(ARITHMETIC).expect("rule set loads");
    let operators = ["+", "-", "*", "/"];
    let mut chain = String::from("1");
    for i in 0..2_000 {
        chain.push_str(operators[i % operators.len()]);
        chain.push_str("12.5");
    }
    let text = chain.as_bytes();

    let iterations = 500;
    let start = Instant::now();
    for _ in 0..iterations {
        let mut pos = 0;
        assert!(rules.parse(std::hint::black_box(text), &mut pos, text.len()));
    }
    report("grammar", iterations, iterations * text.len(), &start);
}

fn bench_scan() {
    let corpus = "alpha 42.5 (beta), gamma delta\n".repeat(30_000);
    let text = corpus.as_bytes();

    let iterations = 20;
    let start = Instant::now();
    for _ in 0..iterations {
        let mut pos = 0;
        while let Some(token) = next_token(std::hint::black_box(text), pos) {
            pos += token.len();
        }
        assert_eq!(pos, text.len());
    }
    report("scan", iterations, iterations * text.len(), &start);
}
