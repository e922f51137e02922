//! A compiled pattern: an ordered command sequence with an optional match
//! action. Expressions are the unit the grammar dispatcher indexes and the
//! unit `EXP(i)` delegates to.

use std::fmt;

use crate::pattern::command::{check_sequence, resume_sequence, sequence_dsl, Command};
use crate::pattern::compiler::{compile_sequence, CompileError};
use crate::pattern::scope::{Lead, MatchAction, Scope, Span};

pub struct Expression {
    commands: Vec<Command>,
    action: Option<MatchAction>,
}

impl Expression {
    pub fn new() -> Self {
        Expression { commands: Vec::new(), action: None }
    }

    /// Compiles a whole DSL source into an expression.
    pub fn compile(source: &str, scope: Scope<'_>) -> Result<Self, CompileError> {
        Self::compile_range(source, 0, source.len(), scope)
    }

    /// Compiles the DSL text between byte offsets `from` and `to`.
    pub fn compile_range(
        source: &str,
        from: usize,
        to: usize,
        scope: Scope<'_>,
    ) -> Result<Self, CompileError> {
        Ok(Expression { commands: compile_sequence(source, from, to, scope)?, action: None })
    }

    /// Replaces the command sequence from new DSL source. On error the
    /// previous sequence is untouched; the match action stays registered
    /// either way.
    pub fn recompile(&mut self, source: &str, scope: Scope<'_>) -> Result<(), CompileError> {
        self.commands = compile_sequence(source, 0, source.len(), scope)?;
        Ok(())
    }

    /// Runs every command in order from `*pos`. Fails on the first command
    /// failure, leaving `*pos` unchanged. When `ignore_rest` is false the
    /// match must additionally end at the end of `text` itself, not merely
    /// within `last_pos`. On success `*pos` advances past the match and the
    /// registered action fires exactly once with the matched span, even if
    /// the caller later discards the result.
    pub fn match_at(
        &self,
        text: &[u8],
        pos: &mut usize,
        last_pos: usize,
        ignore_rest: bool,
        scope: Scope<'_>,
    ) -> bool {
        let begin = *pos;
        let mut probe = *pos;
        if !check_sequence(&self.commands, text, &mut probe, last_pos, scope) {
            return false;
        }
        if !ignore_rest && probe != text.len() {
            return false;
        }
        *pos = probe;
        if let Some(action) = &self.action {
            action(Span::new(begin, probe));
        }
        true
    }

    /// Whole-text match from position zero.
    pub fn matches(&self, text: &[u8], scope: Scope<'_>) -> bool {
        let mut pos = 0;
        self.match_at(text, &mut pos, text.len(), false, scope)
    }

    /// The continuation protocol: the first command resumes mid-match, the
    /// remaining commands then match normally. Terminal-headed and empty
    /// expressions refuse. The match action does not fire here; a resumed
    /// span is not a whole match.
    pub fn resume_at(
        &self,
        text: &[u8],
        pos: &mut usize,
        last_pos: usize,
        scope: Scope<'_>,
    ) -> bool {
        let mut probe = *pos;
        if !resume_sequence(&self.commands, text, &mut probe, last_pos, scope) {
            return false;
        }
        *pos = probe;
        true
    }

    /// The expression's possible leading codepoints, entirely determined by
    /// its first command. An empty expression has an empty lead.
    pub fn lead(&self, scope: Scope<'_>) -> Lead {
        self.lead_at(scope, 0)
    }

    pub(crate) fn lead_at(&self, scope: Scope<'_>, depth: usize) -> Lead {
        match self.commands.first() {
            Some(command) => command.lead_at(scope, depth),
            None => Lead::empty(),
        }
    }

    pub fn to_dsl(&self) -> String {
        sequence_dsl(&self.commands)
    }

    /// Drops the command sequence. The match action stays registered.
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn set_action(&mut self, action: impl Fn(Span) + Send + Sync + 'static) {
        self.action = Some(Box::new(action));
    }

    pub fn clear_action(&mut self) {
        self.action = None;
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }
}

impl Default for Expression {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_dsl())
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expression")
            .field("commands", &self.commands)
            .field("action", &self.action.is_some())
            .finish()
    }
}
