//! The command AST. One variant per DSL command, each honoring four
//! contracts: `check` (match at a position, advancing on success), `resume`
//! (the continuation entry: the leading sub-command is treated as already
//! satisfied), `lead` (first-set) and `to_dsl` (round-trip serialization).

use crate::pattern::scope::{Lead, Scope};
use crate::text::decoder::{char_code, char_len};
use crate::text::scanner::{is_space, next_token, TokenKind};

/// Sentinel for an unbounded repetition count.
pub const UNBOUNDED: u32 = u32::MAX;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `UCHAR("c")`: one codepoint equal to `c`. The cursor advances by the
    /// decoded codepoint's byte length even when the comparison fails.
    UChar { ch: String },
    /// `CHAR()`: any single codepoint; fails only at the end of the range.
    AnyChar,
    /// `STR("s")`: exact byte-for-byte substring.
    Str { value: String },
    /// `NUM()`, `NUM(n)`, `NUM(lo,hi)`: the first digit of a NUMBER token,
    /// digit value in `[min, max]`. Consumes exactly one byte.
    Num { min: u8, max: u8 },
    /// `NUMT(...)`: a whole NUMBER token, value in range if given.
    NumToken { range: Option<(f64, f64)> },
    /// `INUMT(...)`: like NUMT, but the value must be integral.
    IntToken { range: Option<(f64, f64)> },
    /// `_`: a run of one or more SPACE codepoints.
    Blank,
    /// `-`: a run of zero or more SPACE codepoints; never fails.
    OptBlank,
    /// `REP(seq[,min[,max]])`: greedy repetition, count must land in
    /// `[min, max]`.
    Rep { seq: Vec<Command>, min: u32, max: u32 },
    /// `REPIF(seq,cond[,ignore[,min[,max]]])`: repetitions of `seq`
    /// separated by `cond`. A matched separator stays consumed; with
    /// `ignore` unset a separator not followed by another `seq` fails the
    /// whole command.
    RepIf { seq: Vec<Command>, cond: Vec<Command>, ignore: bool, min: u32, max: u32 },
    /// `OR(a,b)`: `a`, then opportunistically also `b` right after (or the
    /// other way round). The opportunistic attempt never undoes the match.
    Or { first: Vec<Command>, second: Vec<Command> },
    /// `XOR(a,b)`: `a` else `b`, nothing extra.
    Xor { first: Vec<Command>, second: Vec<Command> },
    /// `OPT(seq)`: `seq` or nothing; never fails.
    Opt { seq: Vec<Command> },
    /// `EXP(i)`: delegates fully to rule `i` of the enclosing scope.
    Ref { index: usize },
    /// `RANGE(lo,hi)`: one codepoint with numeric value in `[min, max]`.
    CodeRange { min: u32, max: u32 },
    /// `LETTER()`: one codepoint in `A-Z` or `a-z`.
    Letter,
    /// `SET("chars",RANGE(lo,hi),...)`: one codepoint in the union of the
    /// literal characters and the ranges.
    Set { chars: String, ranges: Vec<(u32, u32)> },
    /// `SWITCH(c1,...,cn)`: the first case (insertion order) that matches.
    /// When no case matches, reports success without consuming.
    Switch { cases: Vec<Command> },
}

impl Command {
    /// Attempts a match at `*pos`, advancing it on success. On failure the
    /// position is unspecified but never beyond `last_pos`.
    pub fn check(&self, text: &[u8], pos: &mut usize, last_pos: usize, scope: Scope<'_>) -> bool {
        match self {
            Command::UChar { ch } => {
                let Some(len) = char_len(text, *pos) else { return false };
                if *pos + len > last_pos {
                    return false;
                }
                let matched = &text[*pos..*pos + len] == ch.as_bytes();
                // Mismatches advance too.
                *pos += len;
                matched
            }
            Command::AnyChar => match bounded_char(text, *pos, last_pos) {
                Some((_, len)) => {
                    *pos += len;
                    true
                }
                None => false,
            },
            Command::Str { value } => {
                let end = *pos + value.len();
                if end > last_pos {
                    return false;
                }
                match text.get(*pos..end) {
                    Some(window) if window == value.as_bytes() => {
                        *pos = end;
                        true
                    }
                    _ => false,
                }
            }
            Command::Num { min, max } => {
                let Some(token) = next_token(text, *pos) else { return false };
                if token.kind != TokenKind::Number || *pos + token.len() > last_pos {
                    return false;
                }
                let digit = text[*pos] - b'0';
                if digit < *min || digit > *max {
                    return false;
                }
                *pos += 1;
                true
            }
            Command::NumToken { range } => match number_token(text, *pos, last_pos, range) {
                Some((_, len)) => {
                    *pos += len;
                    true
                }
                None => false,
            },
            Command::IntToken { range } => match number_token(text, *pos, last_pos, range) {
                Some((value, len)) if value.fract() == 0.0 => {
                    *pos += len;
                    true
                }
                _ => false,
            },
            Command::Blank => {
                let run = space_run(text, *pos, last_pos);
                if run == 0 {
                    return false;
                }
                *pos += run;
                true
            }
            Command::OptBlank => {
                *pos += space_run(text, *pos, last_pos);
                true
            }
            Command::Rep { seq, min, max } => {
                let mut count = 0;
                rep_tail(seq, text, pos, last_pos, scope, &mut count, *max);
                (*min..=*max).contains(&count)
            }
            Command::RepIf { seq, cond, ignore, min, max } => {
                let mut count = 0;
                let mut probe = *pos;
                if *max > 0 && check_sequence(seq, text, &mut probe, last_pos, scope) {
                    *pos = probe;
                    count = 1;
                    if !rep_if_tail(seq, cond, *ignore, text, pos, last_pos, scope, &mut count, *max)
                    {
                        return false;
                    }
                }
                (*min..=*max).contains(&count)
            }
            Command::Or { first, second } => {
                let mut probe = *pos;
                if check_sequence(first, text, &mut probe, last_pos, scope) {
                    *pos = probe;
                    opportunistic(second, text, pos, last_pos, scope);
                    return true;
                }
                let mut probe = *pos;
                if check_sequence(second, text, &mut probe, last_pos, scope) {
                    *pos = probe;
                    opportunistic(first, text, pos, last_pos, scope);
                    return true;
                }
                false
            }
            Command::Xor { first, second } => {
                let mut probe = *pos;
                if check_sequence(first, text, &mut probe, last_pos, scope) {
                    *pos = probe;
                    return true;
                }
                let mut probe = *pos;
                if check_sequence(second, text, &mut probe, last_pos, scope) {
                    *pos = probe;
                    return true;
                }
                false
            }
            Command::Opt { seq } => {
                let mut probe = *pos;
                if check_sequence(seq, text, &mut probe, last_pos, scope) {
                    *pos = probe;
                }
                true
            }
            Command::Ref { index } => match scope.get(*index) {
                Some(rule) => rule.check(text, pos, last_pos, scope),
                None => false,
            },
            Command::CodeRange { min, max } => match bounded_char(text, *pos, last_pos) {
                Some((code, len)) if *min <= code && code <= *max => {
                    *pos += len;
                    true
                }
                _ => false,
            },
            Command::Letter => match bounded_char(text, *pos, last_pos) {
                Some((code, len)) if is_ascii_letter(code) => {
                    *pos += len;
                    true
                }
                _ => false,
            },
            Command::Set { chars, ranges } => match bounded_char(text, *pos, last_pos) {
                Some((code, len))
                    if chars.chars().any(|c| u32::from(c) == code)
                        || ranges.iter().any(|&(lo, hi)| lo <= code && code <= hi) =>
                {
                    *pos += len;
                    true
                }
                _ => false,
            },
            Command::Switch { cases } => {
                for case in cases {
                    let mut probe = *pos;
                    if case.check(text, &mut probe, last_pos, scope) {
                        *pos = probe;
                        return true;
                    }
                }
                true
            }
        }
    }

    /// Continuation entry: the leading sub-command is treated as already
    /// satisfied by text before `*pos`, and the rest completes from there.
    /// Terminal commands categorically refuse.
    pub fn resume(&self, text: &[u8], pos: &mut usize, last_pos: usize, scope: Scope<'_>) -> bool {
        match self {
            Command::UChar { .. }
            | Command::AnyChar
            | Command::Str { .. }
            | Command::Num { .. }
            | Command::NumToken { .. }
            | Command::IntToken { .. }
            | Command::Blank
            | Command::OptBlank
            | Command::CodeRange { .. }
            | Command::Letter
            | Command::Set { .. } => false,
            Command::Rep { seq, min, max } => {
                if *max == 0 || !resume_sequence(seq, text, pos, last_pos, scope) {
                    return false;
                }
                // The resumed repetition counts as one.
                let mut count = 1;
                rep_tail(seq, text, pos, last_pos, scope, &mut count, *max);
                (*min..=*max).contains(&count)
            }
            Command::RepIf { seq, cond, ignore, min, max } => {
                if *max == 0 || !resume_sequence(seq, text, pos, last_pos, scope) {
                    return false;
                }
                let mut count = 1;
                if !rep_if_tail(seq, cond, *ignore, text, pos, last_pos, scope, &mut count, *max) {
                    return false;
                }
                (*min..=*max).contains(&count)
            }
            Command::Or { first, second } => {
                let mut probe = *pos;
                if resume_sequence(first, text, &mut probe, last_pos, scope) {
                    *pos = probe;
                    opportunistic(second, text, pos, last_pos, scope);
                    return true;
                }
                let mut probe = *pos;
                if resume_sequence(second, text, &mut probe, last_pos, scope) {
                    *pos = probe;
                    opportunistic(first, text, pos, last_pos, scope);
                    return true;
                }
                false
            }
            Command::Xor { first, second } => {
                let mut probe = *pos;
                if resume_sequence(first, text, &mut probe, last_pos, scope) {
                    *pos = probe;
                    return true;
                }
                let mut probe = *pos;
                if resume_sequence(second, text, &mut probe, last_pos, scope) {
                    *pos = probe;
                    return true;
                }
                false
            }
            Command::Opt { seq } => resume_sequence(seq, text, pos, last_pos, scope),
            Command::Ref { index } => match scope.get(*index) {
                Some(rule) => rule.resume(text, pos, last_pos, scope),
                None => false,
            },
            Command::Switch { cases } => {
                for case in cases {
                    let mut probe = *pos;
                    if case.resume(text, &mut probe, last_pos, scope) {
                        *pos = probe;
                        return true;
                    }
                }
                false
            }
        }
    }

    /// First-set of this command.
    pub fn lead(&self, scope: Scope<'_>) -> Lead {
        self.lead_at(scope, 0)
    }

    pub(crate) fn lead_at(&self, scope: Scope<'_>, depth: usize) -> Lead {
        match self {
            Command::UChar { ch } => match ch.chars().next() {
                Some(c) => Lead::single(u32::from(c)),
                None => Lead::empty(),
            },
            Command::AnyChar => Lead::any_char(),
            Command::Str { value } => match value.chars().next() {
                Some(c) => Lead::single(u32::from(c)),
                None => Lead::empty(),
            },
            Command::Num { min, max } => Lead::digits(*min, *max),
            Command::NumToken { .. } | Command::IntToken { .. } => Lead::digits(0, 9),
            Command::Blank | Command::OptBlank => Lead::space_class(),
            Command::Rep { seq, .. } | Command::RepIf { seq, .. } | Command::Opt { seq } => {
                sequence_lead(seq, scope, depth)
            }
            Command::Or { first, second } | Command::Xor { first, second } => {
                let mut lead = sequence_lead(first, scope, depth);
                lead.merge(sequence_lead(second, scope, depth));
                lead
            }
            Command::Ref { index } => {
                // A delegation chain longer than the scope must be cyclic.
                let hops = depth + 1;
                if hops > scope.len() {
                    return Lead::empty();
                }
                match scope.get(*index) {
                    Some(rule) => rule.lead_at(scope, hops),
                    None => Lead::empty(),
                }
            }
            Command::CodeRange { min, max } => {
                let mut lead = Lead::empty();
                lead.add_span(*min, *max);
                lead
            }
            Command::Letter => Lead::ascii_letters(),
            Command::Set { chars, ranges } => {
                let mut lead = Lead::empty();
                for c in chars.chars() {
                    lead.add_char(u32::from(c));
                }
                for &(lo, hi) in ranges {
                    lead.add_span(lo, hi);
                }
                lead
            }
            Command::Switch { cases } => {
                let mut lead = Lead::empty();
                for case in cases {
                    lead.merge(case.lead_at(scope, depth));
                }
                lead
            }
        }
    }

    /// Canonical DSL form. Defaulted trailing arguments are omitted, so the
    /// output is stable under recompilation.
    pub fn to_dsl(&self) -> String {
        match self {
            Command::UChar { ch } => format!("UCHAR(\"{}\")", escape_literal(ch)),
            Command::AnyChar => "CHAR()".to_owned(),
            Command::Str { value } => format!("STR(\"{}\")", escape_literal(value)),
            Command::Num { min, max } => match (*min, *max) {
                (0, 9) => "NUM()".to_owned(),
                (lo, hi) if lo == hi => format!("NUM({lo})"),
                (lo, hi) => format!("NUM({lo},{hi})"),
            },
            Command::NumToken { range } => match range {
                None => "NUMT()".to_owned(),
                Some((lo, hi)) if lo == hi => format!("NUMT({lo})"),
                Some((lo, hi)) => format!("NUMT({lo},{hi})"),
            },
            Command::IntToken { range } => match range {
                None => "INUMT()".to_owned(),
                Some((lo, hi)) if lo == hi => format!("INUMT({lo})"),
                Some((lo, hi)) => format!("INUMT({lo},{hi})"),
            },
            Command::Blank => "_".to_owned(),
            Command::OptBlank => "-".to_owned(),
            Command::Rep { seq, min, max } => {
                let body = sequence_dsl(seq);
                match (*min, *max) {
                    (1, UNBOUNDED) => format!("REP({body})"),
                    (lo, UNBOUNDED) => format!("REP({body},{lo})"),
                    (lo, hi) => format!("REP({body},{lo},{hi})"),
                }
            }
            Command::RepIf { seq, cond, ignore, min, max } => {
                let body = sequence_dsl(seq);
                let sep = sequence_dsl(cond);
                match (*ignore, *min, *max) {
                    (false, 1, UNBOUNDED) => format!("REPIF({body},{sep})"),
                    (ig, 1, UNBOUNDED) => format!("REPIF({body},{sep},{ig})"),
                    (ig, lo, UNBOUNDED) => format!("REPIF({body},{sep},{ig},{lo})"),
                    (ig, lo, hi) => format!("REPIF({body},{sep},{ig},{lo},{hi})"),
                }
            }
            Command::Or { first, second } => {
                format!("OR({},{})", sequence_dsl(first), sequence_dsl(second))
            }
            Command::Xor { first, second } => {
                format!("XOR({},{})", sequence_dsl(first), sequence_dsl(second))
            }
            Command::Opt { seq } => format!("OPT({})", sequence_dsl(seq)),
            Command::Ref { index } => format!("EXP({index})"),
            Command::CodeRange { min, max } => format!("RANGE({min},{max})"),
            Command::Letter => "LETTER()".to_owned(),
            Command::Set { chars, ranges } => {
                let mut out = format!("SET(\"{}\"", escape_literal(chars));
                for (lo, hi) in ranges {
                    out.push_str(&format!(",RANGE({lo},{hi})"));
                }
                out.push(')');
                out
            }
            Command::Switch { cases } => {
                let inner: Vec<String> = cases.iter().map(Command::to_dsl).collect();
                format!("SWITCH({})", inner.join(","))
            }
        }
    }
}

/// Runs every command in order, threading the position through. Empty
/// sequences match zero width.
pub(crate) fn check_sequence(
    commands: &[Command],
    text: &[u8],
    pos: &mut usize,
    last_pos: usize,
    scope: Scope<'_>,
) -> bool {
    commands.iter().all(|command| command.check(text, pos, last_pos, scope))
}

/// Resumes the first command, then checks the rest normally. Empty
/// sequences have nothing to resume.
pub(crate) fn resume_sequence(
    commands: &[Command],
    text: &[u8],
    pos: &mut usize,
    last_pos: usize,
    scope: Scope<'_>,
) -> bool {
    let Some((head, rest)) = commands.split_first() else {
        return false;
    };
    head.resume(text, pos, last_pos, scope) && check_sequence(rest, text, pos, last_pos, scope)
}

/// Serializes a command sequence: concatenation, no separators.
pub(crate) fn sequence_dsl(commands: &[Command]) -> String {
    commands.iter().map(Command::to_dsl).collect()
}

fn sequence_lead(seq: &[Command], scope: Scope<'_>, depth: usize) -> Lead {
    seq.first().map(|command| command.lead_at(scope, depth)).unwrap_or_default()
}

/// OR's extra consumption: committed when it succeeds, discarded otherwise.
fn opportunistic(seq: &[Command], text: &[u8], pos: &mut usize, last_pos: usize, scope: Scope<'_>) {
    let mut probe = *pos;
    if check_sequence(seq, text, &mut probe, last_pos, scope) {
        *pos = probe;
    }
}

/// Greedy repetition tail: repeats `seq` until failure, `max` repetitions,
/// or a zero-width iteration (which counts once and stops).
fn rep_tail(
    seq: &[Command],
    text: &[u8],
    pos: &mut usize,
    last_pos: usize,
    scope: Scope<'_>,
    count: &mut u32,
    max: u32,
) {
    while *count < max {
        let mut probe = *pos;
        if !check_sequence(seq, text, &mut probe, last_pos, scope) {
            break;
        }
        let advanced = probe != *pos;
        *pos = probe;
        *count += 1;
        if !advanced {
            break;
        }
    }
}

/// REPIF's separator loop, entered after at least one `seq` repetition.
/// Separator consumption is committed before the follow-up `seq` attempt;
/// returns false only for a dangling separator with `ignore` unset.
#[allow(clippy::too_many_arguments)]
fn rep_if_tail(
    seq: &[Command],
    cond: &[Command],
    ignore: bool,
    text: &[u8],
    pos: &mut usize,
    last_pos: usize,
    scope: Scope<'_>,
    count: &mut u32,
    max: u32,
) -> bool {
    while *count < max {
        let start = *pos;
        let mut sep = *pos;
        if !check_sequence(cond, text, &mut sep, last_pos, scope) {
            break;
        }
        *pos = sep;
        let mut next = *pos;
        if check_sequence(seq, text, &mut next, last_pos, scope) {
            *pos = next;
            *count += 1;
            if *pos == start {
                break;
            }
        } else if ignore {
            break;
        } else {
            return false;
        }
    }
    true
}

/// Decodes the codepoint at `pos` when it fits entirely inside the range.
fn bounded_char(text: &[u8], pos: usize, last_pos: usize) -> Option<(u32, usize)> {
    let len = char_len(text, pos)?;
    if pos + len > last_pos {
        return None;
    }
    let code = char_code(text, pos)?;
    Some((code, len))
}

/// Scans the NUMBER token at `pos`, requiring it to fit inside the range
/// and its value to land in `range` when one is given.
fn number_token(
    text: &[u8],
    pos: usize,
    last_pos: usize,
    range: &Option<(f64, f64)>,
) -> Option<(f64, usize)> {
    let token = next_token(text, pos)?;
    if token.kind != TokenKind::Number || pos + token.len() > last_pos {
        return None;
    }
    let value = token.number_value()?;
    if let Some((lo, hi)) = range {
        if value < *lo || value > *hi {
            return None;
        }
    }
    Some((value, token.len()))
}

fn space_run(text: &[u8], pos: usize, last_pos: usize) -> usize {
    let stop = last_pos.min(text.len());
    let mut end = pos;
    while end < stop && is_space(text[end]) {
        end += 1;
    }
    end.saturating_sub(pos)
}

fn is_ascii_letter(code: u32) -> bool {
    matches!(code, 0x41..=0x5A | 0x61..=0x7A)
}

fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '\\' || c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
