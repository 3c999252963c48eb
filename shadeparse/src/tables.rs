//! # Grammar table bundle
//!
//! The parse tables consumed by the [`Engine`](crate::Engine). A bundle is
//! produced by an external grammar compiler (see
//! [`GrammarCompiler`](crate::GrammarCompiler)), persisted by the
//! [`TableCache`](crate::TableCache) and shared read-only between parses.
//!
//! Rows of the action and goto tables are sparse `(symbol, target)` lists in
//! the order the compiler emitted them; that order is also the order in
//! which expected symbols are reported in syntax errors.
//!
//! The serialized field names (`pop_tab`, `act_tab`, `goto_tab`,
//! `defact_tab`, `whitespace_token`, ...) are the persisted record format and
//! must stay stable across releases.

use serde::{Deserialize, Serialize};
use smartstring::alias::String;
use std::collections::BTreeMap;
use thiserror::Error;

pub type StateID = usize;
pub type SymbolID = usize;
pub type ProdID = usize;

/// A parser action: push a new state, or reduce by a production.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Shift(StateID),
    Reduce(ProdID),
}

/// Left-hand symbol and right-hand length of a production; all the engine
/// needs to perform a reduction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Production {
    pub lhs: SymbolID,
    pub rhs_len: usize,
}

/// Full production as reported by the grammar compiler.
///
/// `code` is the action marker the compiler found after the rule text
/// (`_<rule id>`); it names the caller-supplied semantic action to bind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionRecord {
    pub id: usize,
    pub lhs: SymbolID,
    pub rhs: Vec<SymbolID>,
    #[serde(default)]
    pub code: String,
}

impl ProductionRecord {
    /// Rule id referenced by the action marker, if any.
    pub fn rule_id(&self) -> Option<usize> {
        self.code.trim().strip_prefix('_')?.parse().ok()
    }
}

/// Inconsistencies detected by [`TableBundle::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("table has no states")]
    Empty,
    #[error("{table} has {found} rows, expected {expected}")]
    RowCount {
        table: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("state {state} refers to unknown symbol {symbol}")]
    Symbol { state: StateID, symbol: SymbolID },
    #[error("state {state} refers to unknown target state {target}")]
    State { state: StateID, target: StateID },
    #[error("state {state} refers to unknown production {production}")]
    Production { state: StateID, production: ProdID },
    #[error("production {production} has unknown left-hand symbol {symbol}")]
    Lhs { production: ProdID, symbol: SymbolID },
    #[error("{name} symbol {symbol} is not a known symbol")]
    Special { name: &'static str, symbol: SymbolID },
    #[error("production record {production} disagrees with the production table")]
    Record { production: ProdID },
    #[error("label map entry {label:?} -> {symbol} disagrees with the label table")]
    LabelMap { label: String, symbol: SymbolID },
}

/// Immutable parse tables plus the content hash of the grammar they were
/// built from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableBundle {
    #[serde(rename = "pop_tab")]
    pub productions: Vec<Production>,
    #[serde(rename = "act_tab")]
    pub actions: Vec<Vec<(SymbolID, Action)>>,
    #[serde(rename = "goto_tab")]
    pub gotos: Vec<Vec<(SymbolID, StateID)>>,
    #[serde(rename = "defact_tab")]
    pub default_actions: Vec<Option<Action>>,
    pub labels: Vec<String>,
    #[serde(default)]
    pub labelmap: BTreeMap<String, SymbolID>,
    pub eof_symbol: SymbolID,
    pub error_symbol: SymbolID,
    #[serde(rename = "whitespace_token", default)]
    pub discard_symbol: Option<SymbolID>,
    #[serde(rename = "productions", default)]
    pub records: Vec<ProductionRecord>,
    #[serde(default)]
    pub hash: String,
}

impl TableBundle {
    #[inline]
    pub fn n_states(&self) -> usize {
        self.actions.len()
    }

    /// Lookahead-specific action of `state` on `symbol`.
    pub fn action(&self, state: StateID, symbol: SymbolID) -> Option<Action> {
        self.actions
            .get(state)?
            .iter()
            .find(|(sym, _)| *sym == symbol)
            .map(|(_, action)| *action)
    }

    pub fn default_action(&self, state: StateID) -> Option<Action> {
        self.default_actions.get(state).copied().flatten()
    }

    /// Action of `state` on `symbol`, falling back to the state's default
    /// action.
    #[inline]
    pub fn lookup(&self, state: StateID, symbol: Option<SymbolID>) -> Option<Action> {
        symbol
            .and_then(|sym| self.action(state, sym))
            .or_else(|| self.default_action(state))
    }

    pub fn goto(&self, state: StateID, symbol: SymbolID) -> Option<StateID> {
        self.gotos
            .get(state)?
            .iter()
            .find(|(sym, _)| *sym == symbol)
            .map(|(_, target)| *target)
    }

    pub fn production(&self, prod: ProdID) -> Option<Production> {
        self.productions.get(prod).copied()
    }

    /// Symbol id of a token kind or nonterminal label.
    pub fn symbol(&self, label: &str) -> Option<SymbolID> {
        self.labelmap.get(label).copied()
    }

    pub fn label(&self, symbol: SymbolID) -> &str {
        self.labels.get(symbol).map_or("?", |l| l.as_str())
    }

    /// Labels of every symbol `state` has a lookahead-specific action for.
    pub fn expected(&self, state: StateID) -> Vec<String> {
        self.actions
            .get(state)
            .map(|row| row.iter().map(|(sym, _)| self.label(*sym).into()).collect())
            .unwrap_or_default()
    }

    /// Rebuilds the label map from the label table.
    ///
    /// Compilers may omit `labelmap`; when two symbols share a label the
    /// first one wins.
    pub fn index_labels(&mut self) {
        self.labelmap.clear();
        for (i, label) in self.labels.iter().enumerate() {
            self.labelmap.entry(label.clone()).or_insert(i);
        }
    }

    /// Checks that every index in the bundle points at something that exists.
    pub fn validate(&self) -> Result<(), TableError> {
        let n_states = self.n_states();
        let n_symbols = self.labels.len();
        let n_prods = self.productions.len();
        if n_states == 0 {
            return Err(TableError::Empty);
        }
        for (table, found) in [
            ("goto_tab", self.gotos.len()),
            ("defact_tab", self.default_actions.len()),
        ] {
            if found != n_states {
                return Err(TableError::RowCount {
                    table,
                    expected: n_states,
                    found,
                });
            }
        }

        let check_action = |state: StateID, action: Action| match action {
            Action::Shift(target) if target >= n_states => {
                Err(TableError::State { state, target })
            }
            Action::Reduce(production) if production >= n_prods => {
                Err(TableError::Production { state, production })
            }
            _ => Ok(()),
        };
        for (state, row) in self.actions.iter().enumerate() {
            for &(symbol, action) in row {
                if symbol >= n_symbols {
                    return Err(TableError::Symbol { state, symbol });
                }
                check_action(state, action)?;
            }
            if let Some(action) = self.default_actions[state] {
                check_action(state, action)?;
            }
        }
        for (state, row) in self.gotos.iter().enumerate() {
            for &(symbol, target) in row {
                if symbol >= n_symbols {
                    return Err(TableError::Symbol { state, symbol });
                }
                if target >= n_states {
                    return Err(TableError::State { state, target });
                }
            }
        }

        for (production, p) in self.productions.iter().enumerate() {
            if p.lhs >= n_symbols {
                return Err(TableError::Lhs {
                    production,
                    symbol: p.lhs,
                });
            }
        }
        for (name, symbol) in [("eof", self.eof_symbol), ("error", self.error_symbol)]
            .into_iter()
            .chain(self.discard_symbol.map(|s| ("discard", s)))
        {
            if symbol >= n_symbols {
                return Err(TableError::Special { name, symbol });
            }
        }

        if !self.records.is_empty() {
            if self.records.len() != n_prods {
                return Err(TableError::RowCount {
                    table: "productions",
                    expected: n_prods,
                    found: self.records.len(),
                });
            }
            for (production, (rec, p)) in self.records.iter().zip(&self.productions).enumerate() {
                if rec.lhs != p.lhs || rec.rhs.len() != p.rhs_len {
                    return Err(TableError::Record { production });
                }
            }
        }
        for (label, &symbol) in &self.labelmap {
            if self.labels.get(symbol) != Some(label) {
                return Err(TableError::LabelMap {
                    label: label.clone(),
                    symbol,
                });
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> serde_json::Result<std::string::String> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}
