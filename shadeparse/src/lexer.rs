use crate::cursor::LexerCursor;
use crate::{LexError, Span};
use regex_automata::{Anchored, Input, meta::Regex};
use smartstring::alias::String;
use std::fmt::Debug;

/// Hook applied to a token right after its rule matched, e.g. to remap an
/// identifier to a keyword kind.
pub type RewriteFn = fn(&mut Token);

/// One entry of the ordered rule table: a pattern and the token kind it
/// produces.
#[derive(Debug, Clone)]
pub struct LexerRule {
    pub kind: String,
    pub pattern: String,
    pub discard: bool,
    rewrite: Option<RewriteFn>,
}

impl LexerRule {
    pub fn new(kind: impl AsRef<str>, pattern: impl AsRef<str>) -> Self {
        Self {
            kind: kind.as_ref().into(),
            pattern: pattern.as_ref().into(),
            discard: false,
            rewrite: None,
        }
    }

    /// Marks the rule as discarded: matches advance the input but never reach
    /// the parser.
    #[must_use]
    pub fn discard(mut self) -> Self {
        self.discard = true;
        self
    }

    #[must_use]
    pub fn with_rewrite(mut self, rewrite: RewriteFn) -> Self {
        self.rewrite = Some(rewrite);
        self
    }
}

/// A lexical token.
///
/// `kind` is the name of the rule that produced it (possibly rewritten);
/// the engine maps it onto a grammar symbol through the table bundle's label
/// map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: String,
    pub text: String,
    /// Byte offset of the first character.
    pub offset: usize,
    pub span: Span,
}

impl Token {
    pub fn new(kind: impl AsRef<str>, text: impl AsRef<str>, offset: usize, span: Span) -> Self {
        Self {
            kind: kind.as_ref().into(),
            text: text.as_ref().into(),
            offset,
            span,
        }
    }

    #[inline]
    pub fn line(&self) -> usize {
        self.span.start.line
    }

    #[inline]
    pub fn column(&self) -> usize {
        self.span.start.column
    }
}

#[derive(Debug, Clone, Default)]
pub struct LexerStats {
    pub chars: usize,
    pub matches: usize,
    pub discarded: usize,
}

/// The token source: an ordered rule table compiled into a single anchored
/// multi-pattern regex.
///
/// Patterns are searched leftmost-first, so when several rules match at the
/// same position the one listed first wins, with its own greedy match length.
#[derive(Debug, Clone)]
pub struct Lexer {
    rules: Vec<LexerRule>,
    regex: Regex,
}

impl Lexer {
    pub fn try_new(rules: Vec<LexerRule>) -> Result<Self, LexError> {
        let patterns: Vec<&str> = rules.iter().map(|r| r.pattern.as_str()).collect();
        let regex = Regex::new_many(&patterns).map_err(|e| LexError::Build(e.to_string()))?;
        log::debug!("compiled {} token rules", rules.len());
        Ok(Self { rules, regex })
    }

    pub fn rules(&self) -> &[LexerRule] {
        &self.rules
    }

    /// Returns a lazy token iterator over `input`.
    pub fn tokens<'a>(&'a self, input: &'a str) -> Tokens<'a> {
        Tokens {
            lexer: self,
            input,
            cursor: LexerCursor::new(),
            done: false,
            stats: LexerStats::default(),
        }
    }

    /// Tokenizes the whole buffer, failing on the first unmatched character.
    pub fn tokenize_all(&self, input: &str) -> Result<Vec<Token>, LexError> {
        self.tokens(input).collect()
    }
}

/// Lazy token stream produced by [`Lexer::tokens`].
pub struct Tokens<'a> {
    lexer: &'a Lexer,
    input: &'a str,
    cursor: LexerCursor,
    done: bool,
    stats: LexerStats,
}

impl Tokens<'_> {
    pub fn stats(&self) -> LexerStats {
        self.stats.clone()
    }

    fn no_match(&mut self) -> LexError {
        self.done = true;
        let pos = self.cursor.position();
        LexError::NoMatch {
            line: pos.line,
            column: pos.column,
            ch: self.input[self.cursor.pos..].chars().next().unwrap_or('\0'),
        }
    }
}

impl Iterator for Tokens<'_> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done && self.cursor.pos < self.input.len() {
            let start = self.cursor.pos;
            let search = Input::new(self.input)
                .range(start..)
                .anchored(Anchored::Yes);
            let m = match self.lexer.regex.search(&search) {
                Some(m) if !m.is_empty() => m,
                _ => return Some(Err(self.no_match())),
            };
            self.stats.matches += 1;
            let rule = &self.lexer.rules[m.pattern().as_usize()];
            let text = &self.input[m.range()];
            self.cursor.advance(text);
            self.stats.chars += text.chars().count();
            log::trace!("MATCHED: rule {:?}, text {:?}", rule.kind, text);

            if rule.discard {
                self.stats.discarded += 1;
                continue;
            }
            let mut token = Token::new(&rule.kind, text, start, self.cursor.span);
            if let Some(rewrite) = rule.rewrite {
                rewrite(&mut token);
            }
            return Some(Ok(token));
        }
        self.done = true;
        None
    }
}

impl std::iter::FusedIterator for Tokens<'_> {}
