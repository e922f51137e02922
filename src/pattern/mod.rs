//! The pattern engine: command DSL compiler, compiled expressions, and the
//! grammar dispatcher that composes them into recursive parsers.
//!
//! An [`Expression`] is a compiled command sequence; a [`Grammar`] indexes
//! expressions by their leading codepoint and drives the continuation loop
//! that lets self-referential rules grow a match across the whole text.

pub mod command;
pub mod compiler;
pub mod expression;
pub mod grammar;
pub mod scope;

pub use command::{Command, UNBOUNDED};
pub use compiler::{compile_sequence, CompileError};
pub use expression::Expression;
pub use grammar::Grammar;
pub use scope::{GrammarId, Lead, MatchAction, Scope, ScopeRule, Span};
