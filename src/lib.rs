//! A pattern-matching engine built around a compact command language.
//!
//! Patterns are written in a parenthesized command DSL (`NUMT()-UCHAR("+")-NUMT()`),
//! compiled into [`Expression`] values, and matched against raw bytes with
//! backtracking. A [`Grammar`] indexes expressions by their leading codepoint
//! and resolves `EXP(i)` self-references, turning a flat rule list into a
//! recursive parser. [`RuleSet`] loads named rules and a grammar from YAML.

pub mod pattern;
pub mod ruleset;
pub mod text;

#[cfg(test)]
pub mod testutil;

pub use pattern::{
    compile_sequence, Command, CompileError, Expression, Grammar, GrammarId, Lead, MatchAction,
    Scope, ScopeRule, Span, UNBOUNDED,
};
pub use ruleset::RuleSet;
