//! The grammar dispatcher: indexes expressions by their leading codepoint
//! and drives the continuation loop that lets self-referential rules extend
//! a prefix match across the whole text.

use std::collections::HashMap;

use crate::pattern::scope::{GrammarId, Scope};
use crate::text::decoder::char_code;

/// An expression index over one rule scope. Bucket values are scope
/// indices: `terminal` maps a literal leading codepoint to its candidates,
/// `continuation` holds rules whose lead is this grammar itself, `wildcard`
/// holds rules that can start with any codepoint.
#[derive(Debug)]
pub struct Grammar {
    id: GrammarId,
    terminal: HashMap<u32, Vec<usize>>,
    continuation: Vec<usize>,
    wildcard: Vec<usize>,
}

impl Grammar {
    pub fn new() -> Self {
        Grammar {
            id: GrammarId::next(),
            terminal: HashMap::new(),
            continuation: Vec::new(),
            wildcard: Vec::new(),
        }
    }

    /// The grammar's process-unique identity. Stable across rebuilds.
    pub fn id(&self) -> GrammarId {
        self.id
    }

    /// Rebuilds the index from the given scope members, bucketing each by
    /// its lead. A rule may land in several buckets. A lead referencing a
    /// different grammar, or a member outside the scope, empties the whole
    /// grammar and reports failure. Rules with empty leads index nowhere.
    pub fn set_expressions(&mut self, members: &[usize], scope: Scope<'_>) -> bool {
        self.clear();
        for &member in members {
            let Some(rule) = scope.get(member) else {
                self.clear();
                return false;
            };
            let lead = rule.lead(scope);
            for &id in lead.grammars() {
                if id != self.id {
                    self.clear();
                    return false;
                }
                if !self.continuation.contains(&member) {
                    self.continuation.push(member);
                }
            }
            if lead.is_any() {
                // Literal chars are subsumed by the wildcard bucket.
                if !self.wildcard.contains(&member) {
                    self.wildcard.push(member);
                }
            } else {
                for &code in lead.chars() {
                    let bucket = self.terminal.entry(code).or_default();
                    if !bucket.contains(&member) {
                        bucket.push(member);
                    }
                }
            }
        }
        true
    }

    /// Parses `text` between `*pos` and `last_pos`: looks up candidates by
    /// the leading codepoint, matches each with the rest ignored, and lets
    /// the continuation set extend a candidate that stops short. Succeeds
    /// only by reaching `last_pos` exactly, which is also the only way
    /// `*pos` moves. An empty range parses trivially.
    pub fn parse(
        &self,
        text: &[u8],
        pos: &mut usize,
        last_pos: usize,
        scope: Scope<'_>,
    ) -> bool {
        if *pos >= last_pos {
            return true;
        }
        let Some(code) = char_code(text, *pos) else {
            return false;
        };
        let terminal = self.terminal.get(&code).map(Vec::as_slice).unwrap_or(&[]);
        for &member in terminal.iter().chain(&self.wildcard) {
            let Some(rule) = scope.get(member) else {
                continue;
            };
            let mut probe = *pos;
            if !rule.check(text, &mut probe, last_pos, scope) {
                continue;
            }
            if probe == last_pos || self.extend(text, &mut probe, last_pos, scope) {
                *pos = last_pos;
                return true;
            }
        }
        false
    }

    /// The continuation loop. Rescans the continuation set after every
    /// strict extension; terminates because the position only grows.
    fn extend(&self, text: &[u8], pos: &mut usize, last_pos: usize, scope: Scope<'_>) -> bool {
        'scan: loop {
            for &member in &self.continuation {
                let Some(rule) = scope.get(member) else {
                    continue;
                };
                let mut probe = *pos;
                if !rule.resume(text, &mut probe, last_pos, scope) {
                    continue;
                }
                if probe == last_pos {
                    *pos = last_pos;
                    return true;
                }
                if probe > *pos {
                    *pos = probe;
                    continue 'scan;
                }
            }
            return false;
        }
    }

    pub fn clear(&mut self) {
        self.terminal.clear();
        self.continuation.clear();
        self.wildcard.clear();
    }

    pub fn terminal_members(&self, code: u32) -> &[usize] {
        self.terminal.get(&code).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn continuation_members(&self) -> &[usize] {
        &self.continuation
    }

    pub fn wildcard_members(&self) -> &[usize] {
        &self.wildcard
    }

    pub fn is_empty(&self) -> bool {
        self.terminal.is_empty() && self.continuation.is_empty() && self.wildcard.is_empty()
    }
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::expression::Expression;
    use crate::pattern::scope::ScopeRule;
    use crate::testutil::{compile_expr, compile_expr_in, grammar_stub};
    use std::sync::{Arc, Mutex};

    #[test]
    fn keywords_index_under_their_leading_characters() {
        let kw_if = compile_expr("STR(\"if\")");
        let kw_while = compile_expr("STR(\"while\")");
        let scope = [ScopeRule::Expr(&kw_if), ScopeRule::Expr(&kw_while)];
        let mut grammar = Grammar::new();
        assert!(grammar.set_expressions(&[0, 1], &scope));

        assert_eq!(grammar.terminal_members(u32::from('i')), &[0]);
        assert_eq!(grammar.terminal_members(u32::from('w')), &[1]);
        assert_eq!(grammar.terminal_members(u32::from('f')), &[]);

        let text = b"while";
        let mut pos = 0;
        assert!(grammar.parse(text, &mut pos, text.len(), &scope));
        assert_eq!(pos, 5);
    }

    #[test]
    fn parse_fails_without_moving_on_unknown_lead() {
        let kw = compile_expr("STR(\"if\")");
        let scope = [ScopeRule::Expr(&kw)];
        let mut grammar = Grammar::new();
        assert!(grammar.set_expressions(&[0], &scope));

        let mut pos = 0;
        assert!(!grammar.parse(b"for", &mut pos, 3, &scope));
        assert_eq!(pos, 0);
    }

    #[test]
    fn empty_range_parses_trivially() {
        let grammar = Grammar::new();
        let mut pos = 3;
        assert!(grammar.parse(b"abc", &mut pos, 3, &[]));
        assert_eq!(pos, 3);
    }

    #[test]
    fn ill_formed_lead_byte_fails_the_parse() {
        let any = compile_expr("REP(CHAR())");
        let scope = [ScopeRule::Expr(&any)];
        let mut grammar = Grammar::new();
        assert!(grammar.set_expressions(&[0], &scope));

        let mut pos = 0;
        assert!(!grammar.parse(&[0xFF, b'a'], &mut pos, 2, &scope));
        assert_eq!(pos, 0);
    }

    #[test]
    fn wildcard_rules_catch_any_leading_character() {
        let any = compile_expr("REP(CHAR())");
        let scope = [ScopeRule::Expr(&any)];
        let mut grammar = Grammar::new();
        assert!(grammar.set_expressions(&[0], &scope));
        assert_eq!(grammar.wildcard_members(), &[0]);

        let text = "héllo".as_bytes();
        let mut pos = 0;
        assert!(grammar.parse(text, &mut pos, text.len(), &scope));
        assert_eq!(pos, text.len());
    }

    #[test]
    fn terminal_candidates_run_before_wildcards() {
        let mut word = compile_expr("STR(\"ab\")");
        let mut any = compile_expr("REP(CHAR())");
        let order = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&order);
        word.set_action(move |_| sink.lock().expect("lock").push("word"));
        let sink = Arc::clone(&order);
        any.set_action(move |_| sink.lock().expect("lock").push("any"));

        let scope = [ScopeRule::Expr(&word), ScopeRule::Expr(&any)];
        let mut grammar = Grammar::new();
        assert!(grammar.set_expressions(&[0, 1], &scope));

        let mut pos = 0;
        assert!(grammar.parse(b"ab", &mut pos, 2, &scope));
        assert_eq!(order.lock().expect("lock").as_slice(), &["word"]);
    }

    #[test]
    fn continuation_extends_a_short_candidate() {
        let mut grammar = Grammar::new();
        let stub = grammar_stub(grammar.id(), 3);
        let number = compile_expr("NUMT()");
        let sum = compile_expr_in("EXP(2)-UCHAR(\"+\")-EXP(2)", &stub);
        let build_scope = [
            ScopeRule::Expr(&number),
            ScopeRule::Expr(&sum),
            ScopeRule::GrammarRef(grammar.id()),
        ];
        assert!(grammar.set_expressions(&[0, 1], &build_scope));
        assert_eq!(grammar.continuation_members(), &[1]);

        let scope = [
            ScopeRule::Expr(&number),
            ScopeRule::Expr(&sum),
            ScopeRule::Grammar(&grammar),
        ];
        for text in [b"1".as_slice(), b"1+2", b"1+2+3", b"1 + 2.5 + 3"] {
            let mut pos = 0;
            assert!(grammar.parse(text, &mut pos, text.len(), &scope), "{text:?}");
            assert_eq!(pos, text.len());
        }
        for text in [b"+1".as_slice(), b"1++2"] {
            let mut pos = 0;
            assert!(!grammar.parse(text, &mut pos, text.len(), &scope), "{text:?}");
            assert_eq!(pos, 0);
        }
    }

    #[test]
    fn trailing_delegation_accepts_the_empty_remainder() {
        let mut grammar = Grammar::new();
        let stub = grammar_stub(grammar.id(), 3);
        let number = compile_expr("NUMT()");
        let sum = compile_expr_in("EXP(2)-UCHAR(\"+\")-EXP(2)", &stub);
        let build_scope = [
            ScopeRule::Expr(&number),
            ScopeRule::Expr(&sum),
            ScopeRule::GrammarRef(grammar.id()),
        ];
        assert!(grammar.set_expressions(&[0, 1], &build_scope));

        let scope = [
            ScopeRule::Expr(&number),
            ScopeRule::Expr(&sum),
            ScopeRule::Grammar(&grammar),
        ];
        // The trailing EXP lands on an empty range, which parses trivially.
        let mut pos = 0;
        assert!(grammar.parse(b"1+", &mut pos, 2, &scope));
        assert_eq!(pos, 2);
    }

    #[test]
    fn foreign_grammar_reference_empties_the_index() {
        let other = Grammar::new();
        let stub = grammar_stub(other.id(), 2);
        let alien = compile_expr_in("EXP(1)", &stub);
        let scope = [ScopeRule::Expr(&alien), ScopeRule::GrammarRef(other.id())];

        let mut grammar = Grammar::new();
        assert!(!grammar.set_expressions(&[0], &scope));
        assert!(grammar.is_empty());
    }

    #[test]
    fn out_of_scope_member_empties_the_index() {
        let kw = compile_expr("STR(\"if\")");
        let scope = [ScopeRule::Expr(&kw)];
        let mut grammar = Grammar::new();
        assert!(grammar.set_expressions(&[0], &scope));
        assert!(!grammar.set_expressions(&[0, 5], &scope));
        assert!(grammar.is_empty());
    }

    #[test]
    fn empty_leads_index_nowhere() {
        let hollow = Expression::new();
        let scope = [ScopeRule::Expr(&hollow)];
        let mut grammar = Grammar::new();
        assert!(grammar.set_expressions(&[0], &scope));
        assert!(grammar.is_empty());
    }

    #[test]
    fn mixed_leads_land_in_several_buckets() {
        let mut grammar = Grammar::new();
        let stub = grammar_stub(grammar.id(), 2);
        let mixed = compile_expr_in("OR(EXP(1),STR(\"x\"))", &stub);
        let scope = [ScopeRule::Expr(&mixed), ScopeRule::GrammarRef(grammar.id())];
        assert!(grammar.set_expressions(&[0], &scope));

        assert_eq!(grammar.terminal_members(u32::from('x')), &[0]);
        assert_eq!(grammar.continuation_members(), &[0]);
        assert!(grammar.wildcard_members().is_empty());
    }

    #[test]
    fn abandoned_candidates_keep_their_action_side_effects() {
        let mut short = compile_expr("STR(\"a\")");
        let mut long = compile_expr("STR(\"ab\")");
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        short.set_action(move |span| sink.lock().expect("lock").push(("short", span.end)));
        let sink = Arc::clone(&log);
        long.set_action(move |span| sink.lock().expect("lock").push(("long", span.end)));

        let scope = [ScopeRule::Expr(&short), ScopeRule::Expr(&long)];
        let mut grammar = Grammar::new();
        assert!(grammar.set_expressions(&[0, 1], &scope));

        let mut pos = 0;
        assert!(grammar.parse(b"ab", &mut pos, 2, &scope));
        // The short candidate matched, stalled, and was abandoned, but its
        // action already ran.
        assert_eq!(
            log.lock().expect("lock").as_slice(),
            &[("short", 1), ("long", 2)]
        );
    }

    #[test]
    fn rebuild_replaces_the_previous_index() {
        let kw_if = compile_expr("STR(\"if\")");
        let kw_while = compile_expr("STR(\"while\")");
        let scope = [ScopeRule::Expr(&kw_if), ScopeRule::Expr(&kw_while)];
        let mut grammar = Grammar::new();
        let id = grammar.id();
        assert!(grammar.set_expressions(&[0, 1], &scope));
        assert!(grammar.set_expressions(&[1], &scope));

        assert_eq!(grammar.id(), id);
        assert_eq!(grammar.terminal_members(u32::from('i')), &[]);
        assert_eq!(grammar.terminal_members(u32::from('w')), &[1]);
    }
}
