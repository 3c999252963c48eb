//! # shadeparse
//!
//! Runtime for table-driven LALR(1) parsers whose tables are produced by an
//! external grammar compiler.
//!
//! The crate provides:
//!
//! - [`Lexer`]: an ordered, first-match-wins token rule table compiled into
//!   one anchored multi-pattern regex; rules can be discarded or carry a
//!   rewrite hook.
//! - [`TableBundle`]: the action/goto/default-action tables, symbol labels
//!   and production list of one grammar, serializable with `serde`.
//! - [`GrammarDef`]: terminals, precedence groups and rules with their
//!   semantic actions; renders the canonical grammar description and its
//!   content hash.
//! - [`TableCache`]: persists bundles in a [`TableStore`] keyed by parser
//!   name and content hash, rebuilding through a [`GrammarCompiler`] only
//!   when the grammar changed.
//! - [`Engine`]: the shift-reduce driver with panic-mode error recovery.
//!
//! ## Example
//!
//! ```rust,no_run
//! use shadeparse::{
//!     CommandCompiler, FsStore, GrammarDef, Lexer, LexerRule, StackValue, TableCache, Token,
//!     action_fn,
//! };
//!
//! #[derive(Debug)]
//! struct Text(String);
//!
//! impl StackValue for Text {
//!     fn from_token(token: &Token) -> Self {
//!         Text(token.text.to_string())
//!     }
//!     fn empty() -> Self {
//!         Text(String::new())
//!     }
//! }
//!
//! let lexer = Lexer::try_new(vec![
//!     LexerRule::new("ID", "[a-z]+"),
//!     LexerRule::new("WS", r"\s+").discard(),
//! ])
//! .unwrap();
//! let grammar: GrammarDef<(), Text> = GrammarDef::new(["ID"]).rule(
//!     "words: words ID\n     | ID",
//!     action_fn(|_, v: Vec<Text>| Ok(Text(v.iter().map(|t| t.0.as_str()).collect()))),
//! );
//! let cache = TableCache::new(FsStore::new("cache"), CommandCompiler::new("grammar-compiler"));
//! let engine = cache.get_parser(lexer, &grammar, "words").unwrap();
//! let out = engine.parse(&mut (), "a b c").unwrap();
//! assert_eq!(out.value.0, "abc");
//! ```

mod cache;
mod cursor;
mod error;
mod grammar;
mod lexer;
mod parser;
mod tables;

#[cfg(test)]
mod test_tables;

pub use crate::cache::{
    CacheError, CacheLoadError, CommandCompiler, FsStore, GrammarCompiler, MemoryStore,
    TableCache, TableStore,
};
pub use crate::cursor::LexerCursor;
pub use crate::error::{LexError, ParseError, Position, Span, SyntaxError};
pub use crate::grammar::{Assoc, BindError, GrammarDef, PrecedenceGroup, RuleDef, content_hash};
pub use crate::lexer::{Lexer, LexerRule, LexerStats, RewriteFn, Token, Tokens};
pub use crate::parser::{
    ActionFn, Engine, EngineOptions, ParseOutput, ParserStats, RECOVERY_WINDOW, StackValue,
    action_fn,
};
pub use crate::tables::{
    Action, ProdID, Production, ProductionRecord, StateID, SymbolID, TableBundle, TableError,
};
