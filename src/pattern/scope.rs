//! Shared plumbing for the engine: rule scopes (`EXP(i)` resolves into a
//! [`Scope`]), first-sets ([`Lead`]), match spans and match actions.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::pattern::expression::Expression;
use crate::pattern::grammar::Grammar;

static NEXT_GRAMMAR_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique grammar identity. Self-reference detection compares ids,
/// never addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GrammarId(u64);

impl GrammarId {
    pub(crate) fn next() -> GrammarId {
        GrammarId(NEXT_GRAMMAR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Byte span of a successful match, handed to match actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub begin: usize,
    pub end: usize,
}

impl Span {
    pub fn new(begin: usize, end: usize) -> Span {
        Span { begin, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }
}

/// Callback fired when an expression match succeeds. Actions fire eagerly,
/// including for candidate matches a grammar later abandons; captured state
/// must be `Send + Sync` so read-only matching can be shared across threads.
pub type MatchAction = Box<dyn Fn(Span) + Send + Sync>;

/// First-set of a command or rule: the codepoints a match can start with,
/// an any-character flag, and the identities of grammars the rule opens
/// with. Codepoints are kept sorted and deduplicated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lead {
    chars: Vec<u32>,
    any: bool,
    grammars: Vec<GrammarId>,
}

impl Lead {
    pub fn empty() -> Lead {
        Lead::default()
    }

    pub fn single(code: u32) -> Lead {
        Lead { chars: vec![code], ..Lead::default() }
    }

    pub fn any_char() -> Lead {
        Lead { any: true, ..Lead::default() }
    }

    pub fn grammar(id: GrammarId) -> Lead {
        Lead { grammars: vec![id], ..Lead::default() }
    }

    /// The SPACE class: control bytes 0x00 through 0x20 plus DEL.
    pub fn space_class() -> Lead {
        let mut chars: Vec<u32> = (0x00..=0x20).collect();
        chars.push(0x7F);
        Lead { chars, ..Lead::default() }
    }

    /// ASCII `A-Z` and `a-z`.
    pub fn ascii_letters() -> Lead {
        let chars = (b'A'..=b'Z').chain(b'a'..=b'z').map(u32::from).collect();
        Lead { chars, ..Lead::default() }
    }

    /// The digit characters `min` through `max` (both 0 to 9).
    pub fn digits(min: u8, max: u8) -> Lead {
        let chars = (u32::from(min)..=u32::from(max)).map(|d| 0x30 + d).collect();
        Lead { chars, ..Lead::default() }
    }

    pub fn add_char(&mut self, code: u32) {
        if let Err(slot) = self.chars.binary_search(&code) {
            self.chars.insert(slot, code);
        }
    }

    /// Adds every codepoint in `[min, max]`. Spans wider than 256 codepoints
    /// degrade to the any-character flag instead of enumerating.
    pub fn add_span(&mut self, min: u32, max: u32) {
        if max < min {
            return;
        }
        if max - min >= 256 {
            self.any = true;
            return;
        }
        for code in min..=max {
            self.add_char(code);
        }
    }

    pub fn add_grammar(&mut self, id: GrammarId) {
        if !self.grammars.contains(&id) {
            self.grammars.push(id);
        }
    }

    pub fn merge(&mut self, other: Lead) {
        self.any |= other.any;
        for code in other.chars {
            self.add_char(code);
        }
        for id in other.grammars {
            self.add_grammar(id);
        }
    }

    pub fn contains(&self, code: u32) -> bool {
        self.any || self.chars.binary_search(&code).is_ok()
    }

    pub fn is_any(&self) -> bool {
        self.any
    }

    pub fn is_empty(&self) -> bool {
        !self.any && self.chars.is_empty() && self.grammars.is_empty()
    }

    pub fn chars(&self) -> &[u32] {
        &self.chars
    }

    pub fn grammars(&self) -> &[GrammarId] {
        &self.grammars
    }
}

/// One rule visible to `EXP(i)`: a compiled expression, a grammar, or a
/// grammar identity placeholder.
///
/// `GrammarRef` stands in for a grammar whose own index is being rebuilt and
/// which therefore cannot be borrowed into the scope; it answers `lead` and
/// `resume` but refuses match delegation.
#[derive(Debug, Clone, Copy)]
pub enum ScopeRule<'a> {
    Expr(&'a Expression),
    Grammar(&'a Grammar),
    GrammarRef(GrammarId),
}

/// The sibling list `EXP(i)` indexes into.
pub type Scope<'a> = &'a [ScopeRule<'a>];

impl ScopeRule<'_> {
    pub(crate) fn check(
        &self,
        text: &[u8],
        pos: &mut usize,
        last_pos: usize,
        scope: Scope<'_>,
    ) -> bool {
        match self {
            ScopeRule::Expr(expr) => expr.match_at(text, pos, last_pos, true, scope),
            ScopeRule::Grammar(grammar) => grammar.parse(text, pos, last_pos, scope),
            ScopeRule::GrammarRef(_) => false,
        }
    }

    /// Continuation entry. An expression resumes mid-sequence; a grammar
    /// prefix is already a complete parse, so grammar rules resume in place.
    pub(crate) fn resume(
        &self,
        text: &[u8],
        pos: &mut usize,
        last_pos: usize,
        scope: Scope<'_>,
    ) -> bool {
        match self {
            ScopeRule::Expr(expr) => expr.resume_at(text, pos, last_pos, scope),
            ScopeRule::Grammar(_) | ScopeRule::GrammarRef(_) => true,
        }
    }

    pub fn lead(&self, scope: Scope<'_>) -> Lead {
        self.lead_at(scope, 0)
    }

    pub(crate) fn lead_at(&self, scope: Scope<'_>, depth: usize) -> Lead {
        match self {
            ScopeRule::Expr(expr) => expr.lead_at(scope, depth),
            ScopeRule::Grammar(grammar) => Lead::grammar(grammar.id()),
            ScopeRule::GrammarRef(id) => Lead::grammar(*id),
        }
    }
}
