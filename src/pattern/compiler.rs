//! The DSL compiler. Recursive descent over a byte range of pattern text:
//! a command is `_`, `-`, or `NAME(` args `)`; arguments are quoted strings,
//! numbers, booleans, or raw command-sequences captured by a depth-tracking
//! scan and compiled recursively. Any violation aborts the whole enclosing
//! compile; no partial sequence survives.

use std::fmt;

use crate::pattern::command::{Command, UNBOUNDED};
use crate::pattern::scope::Scope;
use crate::text::decoder::char_len;
use crate::text::scanner::{is_space, next_token, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    UnknownCommand { name: String, pos: usize },
    UnexpectedEnd { pos: usize },
    UnbalancedParens { pos: usize },
    UnterminatedString { pos: usize },
    BadEscape { pos: usize },
    BadArgument { command: &'static str, reason: String },
    RuleIndexOutOfBounds { index: usize, limit: usize },
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::UnknownCommand { name, pos } => {
                write!(f, "unknown command `{name}` at byte {pos}")
            }
            CompileError::UnexpectedEnd { pos } => {
                write!(f, "unexpected end of pattern at byte {pos}")
            }
            CompileError::UnbalancedParens { pos } => {
                write!(f, "unbalanced parentheses at byte {pos}")
            }
            CompileError::UnterminatedString { pos } => {
                write!(f, "unterminated string starting at byte {pos}")
            }
            CompileError::BadEscape { pos } => {
                write!(f, "unsupported escape at byte {pos}")
            }
            CompileError::BadArgument { command, reason } => {
                write!(f, "bad argument for {command}: {reason}")
            }
            CompileError::RuleIndexOutOfBounds { index, limit } => {
                write!(f, "rule index {index} outside the scope of {limit} rules")
            }
        }
    }
}

impl std::error::Error for CompileError {}

/// Compiles the DSL text between byte offsets `from` and `to` (clamped to
/// the text) into a command sequence. Empty ranges compile to an empty
/// sequence.
pub fn compile_sequence(
    source: &str,
    from: usize,
    to: usize,
    scope: Scope<'_>,
) -> Result<Vec<Command>, CompileError> {
    let text = source.as_bytes();
    let to = to.min(text.len());
    let from = from.min(to);
    Compiler { source, text, scope }.sequence(from, to)
}

struct Compiler<'a> {
    source: &'a str,
    text: &'a [u8],
    scope: Scope<'a>,
}

impl Compiler<'_> {
    fn sequence(&self, from: usize, to: usize) -> Result<Vec<Command>, CompileError> {
        let mut commands = Vec::new();
        let mut pos = from;
        while pos < to {
            commands.push(self.command(&mut pos, to)?);
        }
        Ok(commands)
    }

    fn command(&self, pos: &mut usize, to: usize) -> Result<Command, CompileError> {
        match self.peek(*pos, to) {
            None => Err(CompileError::UnexpectedEnd { pos: *pos }),
            Some(b'_') => {
                *pos += 1;
                Ok(Command::Blank)
            }
            Some(b'-') => {
                *pos += 1;
                Ok(Command::OptBlank)
            }
            Some(b')') => Err(CompileError::UnbalancedParens { pos: *pos }),
            Some(_) => self.named_command(pos, to),
        }
    }

    fn named_command(&self, pos: &mut usize, to: usize) -> Result<Command, CompileError> {
        let start = *pos;
        let open = match self.text[start..to].iter().position(|&b| b == b'(') {
            Some(offset) => start + offset,
            None => return Err(CompileError::UnexpectedEnd { pos: to }),
        };
        let Ok(name) = std::str::from_utf8(&self.text[start..open]) else {
            return Err(CompileError::UnknownCommand {
                name: String::from_utf8_lossy(&self.text[start..open]).into_owned(),
                pos: start,
            });
        };
        *pos = open + 1;
        match name {
            "UCHAR" => self.uchar(pos, to),
            "CHAR" => {
                self.no_args("CHAR", pos, to)?;
                Ok(Command::AnyChar)
            }
            "STR" => self.str_literal(pos, to),
            "NUM" => self.num(pos, to),
            "NUMT" => self.numt(pos, to, false),
            "INUMT" => self.numt(pos, to, true),
            "REP" => self.rep(pos, to),
            "REPIF" => self.rep_if(pos, to),
            "OR" => self.branch(pos, to, false),
            "XOR" => self.branch(pos, to, true),
            "OPT" => self.opt(pos, to),
            "EXP" => self.exp(pos, to),
            "RANGE" => {
                let (min, max) = self.range(pos, to)?;
                Ok(Command::CodeRange { min, max })
            }
            "LETTER" => {
                self.no_args("LETTER", pos, to)?;
                Ok(Command::Letter)
            }
            "SET" => self.set(pos, to),
            "SWITCH" => self.switch(pos, to),
            _ => Err(CompileError::UnknownCommand { name: name.to_owned(), pos: start }),
        }
    }

    fn uchar(&self, pos: &mut usize, to: usize) -> Result<Command, CompileError> {
        let (ch, chars) = self.string_arg("UCHAR", pos, to)?;
        if chars != 1 {
            return Err(CompileError::BadArgument {
                command: "UCHAR",
                reason: "expected exactly one character".to_owned(),
            });
        }
        self.close("UCHAR", pos, to)?;
        Ok(Command::UChar { ch })
    }

    fn str_literal(&self, pos: &mut usize, to: usize) -> Result<Command, CompileError> {
        let (value, _) = self.string_arg("STR", pos, to)?;
        self.close("STR", pos, to)?;
        Ok(Command::Str { value })
    }

    fn num(&self, pos: &mut usize, to: usize) -> Result<Command, CompileError> {
        self.skip_space(pos, to);
        if self.peek(*pos, to) == Some(b')') {
            *pos += 1;
            return Ok(Command::Num { min: 0, max: 9 });
        }
        let min = self.digit_arg("NUM", pos, to)?;
        if self.delimiter("NUM", pos, to)? == b')' {
            return Ok(Command::Num { min, max: min });
        }
        let max = self.digit_arg("NUM", pos, to)?;
        if min > max {
            return Err(CompileError::BadArgument {
                command: "NUM",
                reason: "bounds out of order".to_owned(),
            });
        }
        self.close("NUM", pos, to)?;
        Ok(Command::Num { min, max })
    }

    fn numt(&self, pos: &mut usize, to: usize, integral: bool) -> Result<Command, CompileError> {
        let command = if integral { "INUMT" } else { "NUMT" };
        self.skip_space(pos, to);
        let range = if self.peek(*pos, to) == Some(b')') {
            *pos += 1;
            None
        } else {
            let lo = self.number_arg(command, pos, to)?;
            if self.delimiter(command, pos, to)? == b')' {
                Some((lo, lo))
            } else {
                let hi = self.number_arg(command, pos, to)?;
                if lo > hi {
                    return Err(CompileError::BadArgument {
                        command,
                        reason: "bounds out of order".to_owned(),
                    });
                }
                self.close(command, pos, to)?;
                Some((lo, hi))
            }
        };
        Ok(if integral {
            Command::IntToken { range }
        } else {
            Command::NumToken { range }
        })
    }

    fn rep(&self, pos: &mut usize, to: usize) -> Result<Command, CompileError> {
        let seq = self.sequence_arg(pos, to)?;
        let mut min = 1;
        let mut max = UNBOUNDED;
        if self.delimiter("REP", pos, to)? == b',' {
            min = self.integer_arg("REP", pos, to)?;
            if self.delimiter("REP", pos, to)? == b',' {
                max = self.integer_arg("REP", pos, to)?;
                if min > max {
                    return Err(CompileError::BadArgument {
                        command: "REP",
                        reason: "bounds out of order".to_owned(),
                    });
                }
                self.close("REP", pos, to)?;
            }
        }
        Ok(Command::Rep { seq, min, max })
    }

    fn rep_if(&self, pos: &mut usize, to: usize) -> Result<Command, CompileError> {
        let seq = self.sequence_arg(pos, to)?;
        if self.delimiter("REPIF", pos, to)? != b',' {
            return Err(CompileError::BadArgument {
                command: "REPIF",
                reason: "expected a separator sequence".to_owned(),
            });
        }
        let cond = self.sequence_arg(pos, to)?;
        let mut ignore = false;
        let mut min = 1;
        let mut max = UNBOUNDED;
        if self.delimiter("REPIF", pos, to)? == b',' {
            ignore = self.bool_arg("REPIF", pos, to)?;
            if self.delimiter("REPIF", pos, to)? == b',' {
                min = self.integer_arg("REPIF", pos, to)?;
                if self.delimiter("REPIF", pos, to)? == b',' {
                    max = self.integer_arg("REPIF", pos, to)?;
                    if min > max {
                        return Err(CompileError::BadArgument {
                            command: "REPIF",
                            reason: "bounds out of order".to_owned(),
                        });
                    }
                    self.close("REPIF", pos, to)?;
                }
            }
        }
        Ok(Command::RepIf { seq, cond, ignore, min, max })
    }

    fn branch(&self, pos: &mut usize, to: usize, exclusive: bool) -> Result<Command, CompileError> {
        let command = if exclusive { "XOR" } else { "OR" };
        let first = self.sequence_arg(pos, to)?;
        if self.delimiter(command, pos, to)? != b',' {
            return Err(CompileError::BadArgument {
                command,
                reason: "expected two branches".to_owned(),
            });
        }
        let second = self.sequence_arg(pos, to)?;
        self.close(command, pos, to)?;
        Ok(if exclusive {
            Command::Xor { first, second }
        } else {
            Command::Or { first, second }
        })
    }

    fn opt(&self, pos: &mut usize, to: usize) -> Result<Command, CompileError> {
        let seq = self.sequence_arg(pos, to)?;
        self.close("OPT", pos, to)?;
        Ok(Command::Opt { seq })
    }

    fn exp(&self, pos: &mut usize, to: usize) -> Result<Command, CompileError> {
        let index = self.integer_arg("EXP", pos, to)? as usize;
        if index >= self.scope.len() {
            return Err(CompileError::RuleIndexOutOfBounds { index, limit: self.scope.len() });
        }
        self.close("EXP", pos, to)?;
        Ok(Command::Ref { index })
    }

    fn range(&self, pos: &mut usize, to: usize) -> Result<(u32, u32), CompileError> {
        let min = self.integer_arg("RANGE", pos, to)?;
        if self.delimiter("RANGE", pos, to)? != b',' {
            return Err(CompileError::BadArgument {
                command: "RANGE",
                reason: "expected two bounds".to_owned(),
            });
        }
        let max = self.integer_arg("RANGE", pos, to)?;
        if min > max {
            return Err(CompileError::BadArgument {
                command: "RANGE",
                reason: "bounds out of order".to_owned(),
            });
        }
        self.close("RANGE", pos, to)?;
        Ok((min, max))
    }

    fn set(&self, pos: &mut usize, to: usize) -> Result<Command, CompileError> {
        let (chars, _) = self.string_arg("SET", pos, to)?;
        let mut ranges = Vec::new();
        while self.delimiter("SET", pos, to)? == b',' {
            let (start, end) = self.raw_arg(pos, to)?;
            let seq = self.sequence(start, end)?;
            match seq.as_slice() {
                [Command::CodeRange { min, max }] => ranges.push((*min, *max)),
                _ => {
                    return Err(CompileError::BadArgument {
                        command: "SET",
                        reason: "extra arguments must be RANGE commands".to_owned(),
                    });
                }
            }
        }
        Ok(Command::Set { chars, ranges })
    }

    fn switch(&self, pos: &mut usize, to: usize) -> Result<Command, CompileError> {
        let mut cases = Vec::new();
        loop {
            let (start, end) = self.raw_arg(pos, to)?;
            let mut seq = self.sequence(start, end)?;
            let case = match seq.pop() {
                Some(case) if seq.is_empty() => case,
                _ => {
                    return Err(CompileError::BadArgument {
                        command: "SWITCH",
                        reason: "each case is a single command".to_owned(),
                    });
                }
            };
            cases.push(case);
            if self.delimiter("SWITCH", pos, to)? == b')' {
                break;
            }
        }
        Ok(Command::Switch { cases })
    }

    /// Captures and compiles a raw command-sequence argument.
    fn sequence_arg(&self, pos: &mut usize, to: usize) -> Result<Vec<Command>, CompileError> {
        let (start, end) = self.raw_arg(pos, to)?;
        self.sequence(start, end)
    }

    /// Captures a raw argument: scans to the next `,` or `)` at parenthesis
    /// depth zero, skipping quoted strings. The delimiter stays unconsumed.
    fn raw_arg(&self, pos: &mut usize, to: usize) -> Result<(usize, usize), CompileError> {
        self.skip_space(pos, to);
        let start = *pos;
        let mut depth = 0usize;
        let mut scan = start;
        loop {
            if scan >= to {
                return Err(if depth > 0 {
                    CompileError::UnbalancedParens { pos: start }
                } else {
                    CompileError::UnexpectedEnd { pos: scan }
                });
            }
            match self.text[scan] {
                b'"' => scan = self.skip_string(scan, to)?,
                b'(' => {
                    depth += 1;
                    scan += 1;
                }
                b')' if depth == 0 => break,
                b')' => {
                    depth -= 1;
                    scan += 1;
                }
                b',' if depth == 0 => break,
                _ => scan += 1,
            }
        }
        *pos = scan;
        Ok((start, scan))
    }

    /// Advances past a quoted string without interpreting its escapes.
    fn skip_string(&self, pos: usize, to: usize) -> Result<usize, CompileError> {
        let mut scan = pos + 1;
        while scan < to {
            match self.text[scan] {
                b'"' => return Ok(scan + 1),
                b'\\' => scan += 2,
                _ => scan += 1,
            }
        }
        Err(CompileError::UnterminatedString { pos })
    }

    /// Parses a quoted string argument into its unescaped content and
    /// codepoint count. Escapes are exactly `\\` and `\"`.
    fn string_arg(
        &self,
        command: &'static str,
        pos: &mut usize,
        to: usize,
    ) -> Result<(String, u32), CompileError> {
        self.skip_space(pos, to);
        if self.peek(*pos, to) != Some(b'"') {
            return Err(CompileError::BadArgument {
                command,
                reason: "expected a quoted string".to_owned(),
            });
        }
        let start = *pos;
        *pos += 1;
        let mut content = String::new();
        let mut chars = 0u32;
        loop {
            if *pos >= to {
                return Err(CompileError::UnterminatedString { pos: start });
            }
            match self.text[*pos] {
                b'"' => {
                    *pos += 1;
                    return Ok((content, chars));
                }
                b'\\' => {
                    match self.peek(*pos + 1, to) {
                        Some(b'\\') => content.push('\\'),
                        Some(b'"') => content.push('"'),
                        Some(_) => return Err(CompileError::BadEscape { pos: *pos }),
                        None => return Err(CompileError::UnterminatedString { pos: start }),
                    }
                    chars += 1;
                    *pos += 2;
                }
                _ => {
                    let len = match char_len(self.text, *pos) {
                        Some(len) if *pos + len <= to => len,
                        _ => return Err(CompileError::UnterminatedString { pos: start }),
                    };
                    match self.source.get(*pos..*pos + len) {
                        Some(piece) => content.push_str(piece),
                        None => return Err(CompileError::UnterminatedString { pos: start }),
                    }
                    chars += 1;
                    *pos += len;
                }
            }
        }
    }

    fn number_arg(
        &self,
        command: &'static str,
        pos: &mut usize,
        to: usize,
    ) -> Result<f64, CompileError> {
        self.skip_space(pos, to);
        let bad = || CompileError::BadArgument { command, reason: "expected a number".to_owned() };
        let Some(token) = next_token(self.text, *pos) else {
            return Err(bad());
        };
        if token.kind != TokenKind::Number || *pos + token.len() > to {
            return Err(bad());
        }
        let Some(value) = token.number_value() else {
            return Err(bad());
        };
        *pos += token.len();
        Ok(value)
    }

    fn integer_arg(
        &self,
        command: &'static str,
        pos: &mut usize,
        to: usize,
    ) -> Result<u32, CompileError> {
        let value = self.number_arg(command, pos, to)?;
        if value.fract() != 0.0 || value > f64::from(u32::MAX) {
            return Err(CompileError::BadArgument {
                command,
                reason: "expected an integer".to_owned(),
            });
        }
        Ok(value as u32)
    }

    fn digit_arg(
        &self,
        command: &'static str,
        pos: &mut usize,
        to: usize,
    ) -> Result<u8, CompileError> {
        let value = self.integer_arg(command, pos, to)?;
        if value > 9 {
            return Err(CompileError::BadArgument {
                command,
                reason: "digit bounds lie in 0-9".to_owned(),
            });
        }
        Ok(value as u8)
    }

    fn bool_arg(
        &self,
        command: &'static str,
        pos: &mut usize,
        to: usize,
    ) -> Result<bool, CompileError> {
        self.skip_space(pos, to);
        let bad = || CompileError::BadArgument {
            command,
            reason: "expected true or false".to_owned(),
        };
        let Some(token) = next_token(self.text, *pos) else {
            return Err(bad());
        };
        if token.kind != TokenKind::Word || *pos + token.len() > to {
            return Err(bad());
        }
        let value = match token.text {
            b"true" => true,
            b"false" => false,
            _ => return Err(bad()),
        };
        *pos += token.len();
        Ok(value)
    }

    /// Consumes the `,` or `)` that must directly follow an argument. No
    /// whitespace is skipped here.
    fn delimiter(
        &self,
        command: &'static str,
        pos: &mut usize,
        to: usize,
    ) -> Result<u8, CompileError> {
        match self.peek(*pos, to) {
            Some(b @ (b',' | b')')) => {
                *pos += 1;
                Ok(b)
            }
            Some(_) => Err(CompileError::BadArgument {
                command,
                reason: "expected ',' or ')' after an argument".to_owned(),
            }),
            None => Err(CompileError::UnexpectedEnd { pos: *pos }),
        }
    }

    fn close(&self, command: &'static str, pos: &mut usize, to: usize) -> Result<(), CompileError> {
        match self.delimiter(command, pos, to)? {
            b')' => Ok(()),
            _ => Err(CompileError::BadArgument {
                command,
                reason: "too many arguments".to_owned(),
            }),
        }
    }

    fn no_args(&self, command: &'static str, pos: &mut usize, to: usize) -> Result<(), CompileError> {
        self.skip_space(pos, to);
        match self.peek(*pos, to) {
            Some(b')') => {
                *pos += 1;
                Ok(())
            }
            Some(_) => Err(CompileError::BadArgument {
                command,
                reason: "takes no arguments".to_owned(),
            }),
            None => Err(CompileError::UnexpectedEnd { pos: *pos }),
        }
    }

    fn skip_space(&self, pos: &mut usize, to: usize) {
        while *pos < to && is_space(self.text[*pos]) {
            *pos += 1;
        }
    }

    fn peek(&self, pos: usize, to: usize) -> Option<u8> {
        if pos < to { self.text.get(pos).copied() } else { None }
    }
}
