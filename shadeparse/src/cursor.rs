use crate::{Position, Span};

/// Tracks the current lexical position while the token source walks its
/// input buffer.
///
/// `LexerCursor` advances over matched text, updating a `Span` that covers the
/// most recent match and counting newlines so that every token knows its
/// 1-based line and column.
#[derive(Debug, Clone)]
pub struct LexerCursor {
    /// Byte offset of the next unread character.
    pub pos: usize,
    pub span: Span,
}

impl Default for LexerCursor {
    fn default() -> Self {
        Self::new()
    }
}

impl LexerCursor {
    pub fn new() -> Self {
        let origin = Position::new(1, 1);
        Self {
            pos: 0,
            span: Span::new(origin, origin),
        }
    }

    /// Current position (start of the next token).
    #[inline]
    pub fn position(&self) -> Position {
        self.span.end
    }

    /// Advance over `text`, leaving `span` covering exactly that text.
    pub fn advance(&mut self, text: &str) {
        self.span.start = self.span.end;
        for c in text.chars() {
            if c == '\n' {
                self.span.end.line += 1;
                self.span.end.column = 1;
            } else {
                self.span.end.column += 1;
            }
        }
        self.pos += text.len();
    }
}
