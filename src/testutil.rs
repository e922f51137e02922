use std::sync::{Arc, Mutex};

use crate::pattern::{Expression, GrammarId, Scope, ScopeRule, Span};

/// Compiles a pattern against an empty scope, panicking on error.
pub fn compile_expr(source: &str) -> Expression {
    compile_expr_in(source, &[])
}

/// Compiles a pattern against the given scope, panicking on error.
pub fn compile_expr_in(source: &str, scope: Scope<'_>) -> Expression {
    match Expression::compile(source, scope) {
        Ok(expression) => expression,
        Err(err) => panic!("pattern `{source}` failed to compile: {err}"),
    }
}

/// A placeholder scope of `len` slots, all referencing `id`. Only scope
/// length matters at compile time, so this stands in for any rule layout.
pub fn grammar_stub(id: GrammarId, len: usize) -> Vec<ScopeRule<'static>> {
    vec![ScopeRule::GrammarRef(id); len]
}

/// A match action that records every span it sees, plus the shared log to
/// inspect afterwards.
pub fn span_recorder() -> (Arc<Mutex<Vec<Span>>>, impl Fn(Span) + Send + Sync + 'static) {
    let spans = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&spans);
    let action = move |span| sink.lock().expect("span log poisoned").push(span);
    (spans, action)
}

/// Snapshot of a recorded span log as `(begin, end)` pairs.
pub fn recorded(log: &Arc<Mutex<Vec<Span>>>) -> Vec<(usize, usize)> {
    log.lock().expect("span log poisoned").iter().map(|s| (s.begin, s.end)).collect()
}
