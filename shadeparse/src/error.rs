//! Source-location and error types shared by the token source and the
//! shift-reduce engine.
//!
//! Positions are 1-based (human-facing); byte offsets are kept separately on
//! each [`Token`](crate::Token).
//!
//! # Examples
//!
//! ```rust
//! # use shadeparse::{Position, Span};
//! let sp = Span::new(Position::new(3, 5), Position::new(3, 10));
//! assert!(sp.start < sp.end);
//! ```

use smartstring::alias::String;
use std::fmt::Write;
use thiserror::Error;

/// A 1-based line/column position in source text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    /// 1-based line number.
    pub line: usize,
    /// 1-based column number (character position in the line).
    pub column: usize,
}

impl Position {
    /// Creates a new `Position`.
    #[inline]
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// A half-open source range: `[start, end)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    /// Starting position (inclusive).
    pub start: Position,
    /// Ending position (exclusive by convention).
    pub end: Position,
}

impl Span {
    /// Creates a new `Span`.
    #[inline]
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

/// Failures of the token source.
#[derive(Debug, Clone, Error)]
pub enum LexError {
    /// One of the rule patterns did not compile.
    #[error("invalid token rule set: {0}")]
    Build(std::string::String),

    /// No rule matched at the given position.
    #[error("no token rule matches {ch:?} at line {line}, column {column}")]
    NoMatch {
        line: usize,
        column: usize,
        ch: char,
    },
}

/// A syntax error reported by the engine.
///
/// Carries the position and text of the offending lookahead and the labels
/// of every symbol the parser state could have accepted there.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error on line {line}, column {column}: unexpected {}", offending_label(.kind, .text))]
pub struct SyntaxError {
    /// 1-based line of the offending token.
    pub line: usize,
    /// 1-based column of the offending token.
    pub column: usize,
    /// Byte offset of the offending token.
    pub offset: usize,
    /// Token kind of the offending lookahead.
    pub kind: String,
    /// Source text of the offending lookahead (empty at end of input).
    pub text: String,
    /// Labels the state had actions for, in table order.
    pub expected: Vec<String>,
}

fn offending_label(kind: &str, text: &str) -> std::string::String {
    if text.is_empty() {
        kind.to_owned()
    } else {
        format!("{kind} {text:?}")
    }
}

impl SyntaxError {
    /// Renders the error with surrounding source lines and a caret under the
    /// offending column.
    ///
    /// `context_lines` lines before and after the offending line are shown,
    /// each prefixed with its 1-based line number.
    pub fn render(&self, source: &str, context_lines: usize) -> std::string::String {
        let lines: Vec<&str> = source.split('\n').collect();
        let first = self.line.saturating_sub(context_lines).max(1);
        let last = (self.line + context_lines).min(lines.len());
        let width = last.to_string().len().max(3);

        let mut out = std::string::String::new();
        let _ = writeln!(out, "{self}");
        if !self.expected.is_empty() {
            let expected: Vec<&str> = self.expected.iter().map(|s| s.as_str()).collect();
            let _ = writeln!(out, "expected one of: {}", expected.join(", "));
        }
        for n in first..=last {
            let _ = writeln!(out, "{n:>width$}: {}", lines[n - 1]);
            if n == self.line {
                let pad = width + 2 + self.column.saturating_sub(1);
                let _ = writeln!(out, "{}^", " ".repeat(pad));
            }
        }
        out
    }
}

/// Errors raised while running the shift-reduce engine.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Unrecoverable syntax error; the first reported error of the parse.
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// The token source failed.
    #[error(transparent)]
    Lex(#[from] LexError),

    /// A semantic action returned an error.
    #[error("action for production {production} failed at line {line}: {message}")]
    Action {
        production: usize,
        line: usize,
        message: std::string::String,
    },

    /// The table bundle is inconsistent with the parse it drives.
    #[error("malformed parse tables: {0}")]
    Table(std::string::String),
}
