//! # Shift-reduce execution engine
//!
//! Walks a [`TableBundle`] over a token stream, invoking semantic actions on
//! every reduction, with yacc-style panic-mode error recovery.
//!
//! The engine keeps two aligned stacks, `states` and `values`, which always
//! have the same length. Both start with a single frame: state 0 and an
//! empty sentinel value.
//!
//! ## Recovery
//!
//! When the current state has no action for the lookahead the engine
//! reports a [`SyntaxError`] (unless it is still inside the suppression
//! window of a previous error), pops frames until a state can shift the
//! grammar's `error` symbol, shifts it, and then drops lookahead tokens until
//! one is acceptable. Three tokens must be shifted before another error is
//! reported.

use crate::tables::{Action, ProdID, StateID, SymbolID, TableBundle};
use crate::{LexError, Lexer, ParseError, Position, Span, SyntaxError, Token};
use std::sync::Arc;

/// Number of shifts after a recovery during which new errors are not
/// reported.
pub const RECOVERY_WINDOW: usize = 3;

/// Values carried on the engine's value stack.
pub trait StackValue: Sized {
    /// Value pushed when a token is shifted.
    fn from_token(token: &Token) -> Self;

    /// Value of the initial sentinel frame, of a shifted `error` symbol, and
    /// of empty productions without an action.
    fn empty() -> Self;
}

/// Semantic action of a production. Receives the caller's context and the
/// popped right-hand-side values, oldest first.
pub type ActionFn<C, V> = Arc<dyn Fn(&mut C, Vec<V>) -> anyhow::Result<V> + Send + Sync>;

/// Wraps a closure as an [`ActionFn`].
pub fn action_fn<C, V, F>(f: F) -> ActionFn<C, V>
where
    F: Fn(&mut C, Vec<V>) -> anyhow::Result<V> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Attempt panic-mode recovery instead of failing on the first error.
    pub recover: bool,
    /// Source lines shown around a rendered syntax error.
    pub context_lines: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            recover: true,
            context_lines: 2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParserStats {
    pub tokens: usize,
    pub shifts: usize,
    pub reductions: usize,
    pub recoveries: usize,
    /// Lookahead tokens dropped during recovery.
    pub discarded: usize,
}

/// Result of a successful (possibly recovered) parse.
#[derive(Debug)]
pub struct ParseOutput<V> {
    /// Value produced by the goal production.
    pub value: V,
    /// Every syntax error that was reported and recovered from.
    pub errors: Vec<SyntaxError>,
    pub stats: ParserStats,
}

/// A parser: a token source, a shared table bundle and the semantic actions
/// bound to its productions.
pub struct Engine<C, V> {
    lexer: Arc<Lexer>,
    tables: Arc<TableBundle>,
    actions: Arc<[Option<ActionFn<C, V>>]>,
    options: EngineOptions,
}

impl<C, V> Clone for Engine<C, V> {
    fn clone(&self) -> Self {
        Self {
            lexer: Arc::clone(&self.lexer),
            tables: Arc::clone(&self.tables),
            actions: Arc::clone(&self.actions),
            options: self.options.clone(),
        }
    }
}

impl<C, V> std::fmt::Debug for Engine<C, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("states", &self.tables.n_states())
            .field("productions", &self.tables.productions.len())
            .field("hash", &self.tables.hash)
            .field("options", &self.options)
            .finish()
    }
}

impl<C, V: StackValue> Engine<C, V> {
    /// Creates an engine. `actions[p]` is the action of production `p`;
    /// missing entries behave as pass-through.
    pub fn new(
        lexer: Arc<Lexer>,
        tables: Arc<TableBundle>,
        mut actions: Vec<Option<ActionFn<C, V>>>,
    ) -> Self {
        actions.resize_with(tables.productions.len(), || None);
        Self {
            lexer,
            tables,
            actions: actions.into(),
            options: EngineOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn tables(&self) -> &Arc<TableBundle> {
        &self.tables
    }

    pub fn lexer(&self) -> &Arc<Lexer> {
        &self.lexer
    }

    pub fn parse(&self, ctx: &mut C, source: &str) -> Result<ParseOutput<V>, ParseError> {
        self.parse_with(ctx, source, |_| {})
    }

    /// Tokenizes and parses `source`, calling `on_error` for every reported
    /// syntax error.
    pub fn parse_with<F>(
        &self,
        ctx: &mut C,
        source: &str,
        on_error: F,
    ) -> Result<ParseOutput<V>, ParseError>
    where
        F: FnMut(&SyntaxError),
    {
        self.parse_tokens_with(ctx, self.lexer.tokens(source), on_error)
    }

    /// Parses an already tokenized stream.
    pub fn parse_tokens_with<I, F>(
        &self,
        ctx: &mut C,
        tokens: I,
        on_error: F,
    ) -> Result<ParseOutput<V>, ParseError>
    where
        I: IntoIterator<Item = Result<Token, LexError>>,
        F: FnMut(&SyntaxError),
    {
        let mut run = ParserCtx {
            engine: self,
            tokens: tokens.into_iter(),
            on_error,
            states: vec![0],
            values: vec![V::empty()],
            countdown: 0,
            errors: Vec::new(),
            stats: ParserStats::default(),
            end: (0, Position::new(1, 1)),
        };
        let value = run.run(ctx)?;
        log::debug!(
            "parse finished: {} tokens, {} shifts, {} reductions, {} errors",
            run.stats.tokens,
            run.stats.shifts,
            run.stats.reductions,
            run.errors.len()
        );
        Ok(ParseOutput {
            value,
            errors: run.errors,
            stats: run.stats,
        })
    }
}

/// Current lookahead; `symbol` is `None` for token kinds the grammar does
/// not know.
struct Lookahead {
    symbol: Option<SymbolID>,
    token: Token,
}

/// State of a single parse call.
struct ParserCtx<'e, C, V, I, F> {
    engine: &'e Engine<C, V>,
    tokens: I,
    on_error: F,
    states: Vec<StateID>,
    values: Vec<V>,
    countdown: usize,
    errors: Vec<SyntaxError>,
    stats: ParserStats,
    /// Byte offset and position just past the last token read.
    end: (usize, Position),
}

impl<C, V, I, F> ParserCtx<'_, C, V, I, F>
where
    V: StackValue,
    I: Iterator<Item = Result<Token, LexError>>,
    F: FnMut(&SyntaxError),
{
    fn tables(&self) -> &TableBundle {
        &self.engine.tables
    }

    fn top(&self) -> StateID {
        self.states.last().copied().unwrap_or(0)
    }

    fn run(&mut self, ctx: &mut C) -> Result<V, ParseError> {
        let mut la = self.next_lookahead()?;
        loop {
            if log::log_enabled!(log::Level::Trace) {
                self.dump_state(&la);
            }
            match self.tables().lookup(self.top(), la.symbol) {
                Some(Action::Shift(state)) => {
                    log::trace!("Shift {state}");
                    self.states.push(state);
                    self.values.push(V::from_token(&la.token));
                    self.stats.shifts += 1;
                    self.countdown = self.countdown.saturating_sub(1);
                    la = self.next_lookahead()?;
                }
                Some(Action::Reduce(prod)) => {
                    log::trace!("Reduce {prod}");
                    let value = self.reduce(ctx, prod, &la)?;
                    self.stats.reductions += 1;
                    if prod == 0 {
                        return Ok(value);
                    }
                    let lhs = self.tables().productions[prod].lhs;
                    let Some(state) = self.tables().goto(self.top(), lhs) else {
                        return Err(ParseError::Table(format!(
                            "no goto from state {} on {}",
                            self.top(),
                            self.tables().label(lhs)
                        )));
                    };
                    self.states.push(state);
                    self.values.push(value);
                }
                None => la = self.recover(la)?,
            }
            debug_assert_eq!(self.states.len(), self.values.len());
        }
    }

    fn reduce(&mut self, ctx: &mut C, prod: ProdID, la: &Lookahead) -> Result<V, ParseError> {
        let Some(p) = self.tables().production(prod) else {
            return Err(ParseError::Table(format!("production {prod} out of range")));
        };
        if p.rhs_len >= self.states.len() {
            return Err(ParseError::Table(format!(
                "stack underflow reducing production {prod}"
            )));
        }
        let at = self.values.len() - p.rhs_len;
        self.states.truncate(at);
        let popped = self.values.split_off(at);

        let action = match prod {
            0 => None,
            _ => self.engine.actions.get(prod).and_then(Option::as_ref),
        };
        match action {
            Some(f) => f(ctx, popped).map_err(|e| ParseError::Action {
                production: prod,
                line: la.token.line(),
                message: format!("{e:#}"),
            }),
            None => Ok(popped.into_iter().next().unwrap_or_else(V::empty)),
        }
    }

    /// Pulls the next grammar token, skipping the bundle's discard symbol.
    /// End of input yields the EOF symbol.
    fn next_lookahead(&mut self) -> Result<Lookahead, ParseError> {
        for token in self.tokens.by_ref() {
            let token = token?;
            self.end = (token.offset + token.text.len(), token.span.end);
            let symbol = self.engine.tables.symbol(&token.kind);
            if symbol.is_some() && symbol == self.engine.tables.discard_symbol {
                continue;
            }
            self.stats.tokens += 1;
            return Ok(Lookahead { symbol, token });
        }
        let tables = &self.engine.tables;
        let (offset, pos) = self.end;
        Ok(Lookahead {
            symbol: Some(tables.eof_symbol),
            token: Token::new(
                tables.label(tables.eof_symbol),
                "",
                offset,
                Span::new(pos, pos),
            ),
        })
    }

    fn is_eof(&self, la: &Lookahead) -> bool {
        la.symbol == Some(self.tables().eof_symbol)
    }

    fn syntax_error(&self, la: &Lookahead) -> SyntaxError {
        SyntaxError {
            line: la.token.line(),
            column: la.token.column(),
            offset: la.token.offset,
            kind: la.token.kind.clone(),
            text: la.token.text.clone(),
            expected: self.tables().expected(self.top()),
        }
    }

    /// The error a failed recovery ends the parse with.
    fn failure(&self) -> ParseError {
        match self.errors.first() {
            Some(err) => ParseError::Syntax(err.clone()),
            None => ParseError::Table("recovery failed without a reported error".into()),
        }
    }

    /// Resynchronizes after the lookahead was rejected and returns the new
    /// lookahead.
    fn recover(&mut self, mut la: Lookahead) -> Result<Lookahead, ParseError> {
        if self.countdown == 0 {
            let err = self.syntax_error(&la);
            log::debug!("{err}");
            (self.on_error)(&err);
            self.errors.push(err);
            if !self.engine.options.recover {
                return Err(self.failure());
            }
        } else {
            log::trace!("suppressed error on {:?}", la.token.kind);
            if self.countdown == RECOVERY_WINDOW {
                // nothing shifted since the last resync
                if self.is_eof(&la) {
                    return Err(self.failure());
                }
                la = self.next_lookahead()?;
                self.stats.discarded += 1;
            }
        }

        let error_symbol = self.tables().error_symbol;
        loop {
            if let Some(Action::Shift(state)) = self.tables().action(self.top(), error_symbol) {
                log::trace!("Shift error {state}");
                self.states.push(state);
                self.values.push(V::empty());
                break;
            }
            if self.states.len() == 1 {
                return Err(self.failure());
            }
            self.states.pop();
            self.values.pop();
        }

        while self.tables().lookup(self.top(), la.symbol).is_none() {
            if self.is_eof(&la) {
                return Err(self.failure());
            }
            log::trace!("discard {:?} {:?}", la.token.kind, la.token.text);
            la = self.next_lookahead()?;
            self.stats.discarded += 1;
        }
        self.countdown = RECOVERY_WINDOW;
        self.stats.recoveries += 1;
        Ok(la)
    }

    fn dump_state(&self, la: &Lookahead) {
        let mut output = String::new();
        for state in &self.states {
            output.push_str(&format!("<{state}>  "));
        }
        log::trace!(
            "{output}<-  {} {:?}",
            la.symbol.map_or("?", |s| self.tables().label(s)),
            la.token.text
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_tables::{Item, stmt_engine};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn accepts_and_reduces_bottom_up() {
        init_logger();
        let engine = stmt_engine();
        let mut trace = Vec::new();
        let out = engine.parse(&mut trace, "a; b;").unwrap();
        assert_eq!(out.value, Item::List(vec!["a".into(), "b".into()]));
        assert!(out.errors.is_empty());
        assert_eq!(trace, [3, 2, 3, 1]);
        assert_eq!(out.stats.tokens, 4);
        assert_eq!(out.stats.shifts, 4);
        assert_eq!(out.stats.reductions, 5);
    }

    #[test]
    fn reparsing_is_idempotent() {
        let engine = stmt_engine();
        let first = engine.parse(&mut Vec::new(), "x; y; z;").unwrap();
        let second = engine.parse(&mut Vec::new(), "x; y; z;").unwrap();
        assert_eq!(first.value, second.value);
        assert_eq!(first.stats, second.stats);
    }

    #[test]
    fn isolated_error_is_reported_once_and_recovered() {
        init_logger();
        let engine = stmt_engine();
        let mut reported = Vec::new();
        let out = engine
            .parse_with(&mut Vec::new(), "a;\nb c;\nd;", |e| reported.push(e.clone()))
            .unwrap();
        assert_eq!(reported.len(), 1);
        let err = &reported[0];
        assert_eq!((err.line, err.column), (2, 3));
        assert_eq!(err.kind, "ID");
        assert_eq!(err.text, "c");
        assert_eq!(err.expected, ["SEMI"]);
        assert_eq!(out.errors, reported);
        assert_eq!(
            out.value,
            Item::List(vec!["a".into(), "error".into(), "d".into()])
        );
        assert_eq!(out.stats.recoveries, 1);
        assert_eq!(out.stats.discarded, 1);
    }

    #[test]
    fn adjacent_error_inside_window_is_suppressed() {
        init_logger();
        let engine = stmt_engine();
        let mut count = 0;
        let out = engine
            .parse_with(&mut Vec::new(), "a; ; ; b;", |_| count += 1)
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.stats.recoveries, 2);
        assert_eq!(
            out.value,
            Item::List(vec!["a".into(), "error".into(), "error".into(), "b".into()])
        );
    }

    #[test]
    fn errors_outside_window_are_each_reported() {
        let engine = stmt_engine();
        let out = engine
            .parse(&mut Vec::new(), "a b; c; d; e f; g;")
            .unwrap();
        assert_eq!(out.errors.len(), 2);
        assert_eq!(out.errors[1].text, "f");
    }

    #[test]
    fn failed_recovery_returns_first_error() {
        init_logger();
        let engine = stmt_engine();
        let mut count = 0;
        let err = engine
            .parse_with(&mut Vec::new(), "a; b", |_| count += 1)
            .unwrap_err();
        assert_eq!(count, 1);
        match err {
            ParseError::Syntax(e) => {
                assert_eq!(e.kind, "$");
                assert_eq!(e.text, "");
                assert_eq!((e.line, e.column), (1, 5));
                assert_eq!(e.expected, ["SEMI"]);
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn recovery_can_be_disabled() {
        let engine = stmt_engine().with_options(EngineOptions {
            recover: false,
            ..EngineOptions::default()
        });
        let err = engine.parse(&mut Vec::new(), "a b; c;").unwrap_err();
        assert!(matches!(err, ParseError::Syntax(ref e) if e.text == "b"));
    }

    #[test]
    fn unknown_token_kind_is_a_syntax_error() {
        let engine = stmt_engine();
        let out = engine.parse(&mut Vec::new(), "a; 42; b;").unwrap();
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].kind, "NUM");
        assert_eq!(out.errors[0].expected, ["$", "ID", "ERROR"]);
        assert_eq!(
            out.value,
            Item::List(vec!["a".into(), "error".into(), "b".into()])
        );
    }

    #[test]
    fn lexer_failure_is_propagated() {
        let engine = stmt_engine();
        let err = engine.parse(&mut Vec::new(), "a; #").unwrap_err();
        assert!(matches!(err, ParseError::Lex(LexError::NoMatch { ch: '#', .. })));
    }

    #[test]
    fn action_failure_is_wrapped() {
        let engine = stmt_engine();
        let err = engine.parse(&mut Vec::new(), "a; boom;").unwrap_err();
        match err {
            ParseError::Action {
                production, line, ..
            } => {
                assert_eq!(production, 3);
                assert_eq!(line, 1);
            }
            other => panic!("expected action error, got {other:?}"),
        }
    }

    #[test]
    fn missing_actions_pass_first_value_through() {
        let base = stmt_engine();
        let engine: Engine<Vec<usize>, Item> =
            Engine::new(Arc::clone(base.lexer()), Arc::clone(base.tables()), Vec::new());
        let out = engine.parse(&mut Vec::new(), "a; b;").unwrap();
        assert_eq!(out.value, Item::Token("a".into()));
    }

    #[test]
    fn parses_pre_tokenized_stream() {
        let engine = stmt_engine();
        let tokens = engine.lexer().tokenize_all("q;").unwrap();
        let out = engine
            .parse_tokens_with(&mut Vec::new(), tokens.into_iter().map(Ok), |_| {})
            .unwrap();
        assert_eq!(out.value, Item::List(vec!["q".into()]));
    }

    #[test]
    fn empty_input_fails_at_eof() {
        let engine = stmt_engine();
        let err = engine.parse(&mut Vec::new(), "  ").unwrap_err();
        assert!(matches!(err, ParseError::Syntax(ref e) if e.kind == "$"));
    }
}
