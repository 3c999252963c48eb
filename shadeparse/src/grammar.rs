//! # Grammar definitions
//!
//! A [`GrammarDef`] is what a language front end hands to the
//! [`TableCache`](crate::TableCache): its terminal list, precedence groups and
//! rules, each rule carrying the grammar text of one nonterminal and the
//! semantic action shared by its alternatives.
//!
//! [`GrammarDef::render`] produces the canonical textual description fed to
//! the grammar compiler; its SHA-256 is the cache key that decides whether
//! persisted tables are still valid. Every non-blank line of a rule is tagged
//! with the marker `[*_<rule id>*]`, so write one alternative per line: the
//! compiler reports the marker of each production back in
//! [`ProductionRecord::code`](crate::ProductionRecord), which is how
//! [`GrammarDef::bind_actions`] finds the action of every production.
//!
//! Rules are rendered last-declared first, so the last declared rule is the
//! grammar's goal.

use crate::parser::ActionFn;
use crate::tables::{ProdID, TableBundle};
use sha2::{Digest, Sha256};
use smartstring::alias::String;
use std::fmt::Write;
use thiserror::Error;

const HEADER: &str = "/~ We use our own lexical scanner ~/";
const FIRST_LINE_INDENT: &str = "               ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Left,
    Right,
    NonAssoc,
}

impl Assoc {
    fn marker(self) -> &'static str {
        match self {
            Assoc::Left => "<",
            Assoc::Right => ">",
            Assoc::NonAssoc => "",
        }
    }
}

/// Tokens sharing one precedence level. Groups are listed lowest precedence
/// first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecedenceGroup {
    pub assoc: Assoc,
    pub tokens: Vec<String>,
}

pub struct RuleDef<C, V> {
    pub grammar: std::string::String,
    pub action: Option<ActionFn<C, V>>,
}

impl<C, V> Clone for RuleDef<C, V> {
    fn clone(&self) -> Self {
        Self {
            grammar: self.grammar.clone(),
            action: self.action.clone(),
        }
    }
}

impl<C, V> std::fmt::Debug for RuleDef<C, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleDef")
            .field("grammar", &self.grammar)
            .field("action", &self.action.is_some())
            .finish()
    }
}

/// Failures attaching semantic actions to a freshly loaded bundle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("table bundle has no production records")]
    MissingRecords,
    #[error("production {production} carries marker {code:?} that names no rule")]
    UnknownRule { production: ProdID, code: String },
}

/// Hex SHA-256 of a rendered grammar description.
pub fn content_hash(rendered: &str) -> std::string::String {
    hex::encode(Sha256::digest(rendered.as_bytes()))
}

pub struct GrammarDef<C, V> {
    pub tokens: Vec<String>,
    pub precedence: Vec<PrecedenceGroup>,
    pub rules: Vec<RuleDef<C, V>>,
}

impl<C, V> Clone for GrammarDef<C, V> {
    fn clone(&self) -> Self {
        Self {
            tokens: self.tokens.clone(),
            precedence: self.precedence.clone(),
            rules: self.rules.clone(),
        }
    }
}

impl<C, V> std::fmt::Debug for GrammarDef<C, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrammarDef")
            .field("tokens", &self.tokens)
            .field("precedence", &self.precedence)
            .field("rules", &self.rules)
            .finish()
    }
}

impl<C, V> Default for GrammarDef<C, V> {
    fn default() -> Self {
        Self {
            tokens: Vec::new(),
            precedence: Vec::new(),
            rules: Vec::new(),
        }
    }
}

impl<C, V> GrammarDef<C, V> {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tokens: tokens.into_iter().map(|t| t.as_ref().into()).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn precedence(mut self, assoc: Assoc, tokens: &[&str]) -> Self {
        self.precedence.push(PrecedenceGroup {
            assoc,
            tokens: tokens.iter().map(|t| String::from(*t)).collect(),
        });
        self
    }

    #[must_use]
    pub fn rule(mut self, grammar: &str, action: ActionFn<C, V>) -> Self {
        self.rules.push(RuleDef {
            grammar: grammar.to_owned(),
            action: Some(action),
        });
        self
    }

    /// Adds a rule whose productions pass their first value through.
    #[must_use]
    pub fn passthrough(mut self, grammar: &str) -> Self {
        self.rules.push(RuleDef {
            grammar: grammar.to_owned(),
            action: None,
        });
        self
    }

    /// Renders the canonical grammar description.
    pub fn render(&self) -> std::string::String {
        let mut out = std::string::String::from(HEADER);
        out.push('\n');

        let mut level = 0;
        let mut seen = std::collections::HashSet::new();
        for group in &self.precedence {
            out.push_str(group.assoc.marker());
            out.push(' ');
            for (i, token) in group.tokens.iter().enumerate() {
                if i > 0 {
                    out.push_str("  ");
                }
                let _ = writeln!(out, " '{level}' {token}");
                level += 1;
                seen.insert(token.as_str());
            }
            out.push_str(";\n");
        }
        for token in &self.tokens {
            if seen.contains(token.as_str()) {
                continue;
            }
            let _ = writeln!(out, "'{level}'  {token} ");
            level += 1;
        }
        out.push_str(";\n\n##\n\n");

        for (id, rule) in self.rules.iter().enumerate().rev() {
            for (i, line) in rule.grammar.split('\n').enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                if i == 0 {
                    out.push_str(FIRST_LINE_INDENT);
                }
                let _ = writeln!(out, "{line} [*_{id}*]");
            }
            out.push_str("\n;\n");
        }
        out
    }

    /// Hex SHA-256 of [`render`](Self::render).
    pub fn content_hash(&self) -> std::string::String {
        content_hash(&self.render())
    }

    /// Maps every production of `tables` onto the action of the rule named
    /// by its marker. Production 0 (the goal) is always pass-through.
    pub fn bind_actions(
        &self,
        tables: &TableBundle,
    ) -> Result<Vec<Option<ActionFn<C, V>>>, BindError> {
        if tables.records.is_empty() {
            return Err(BindError::MissingRecords);
        }
        let mut actions = Vec::with_capacity(tables.records.len());
        for (production, rec) in tables.records.iter().enumerate() {
            if production == 0 {
                actions.push(None);
                continue;
            }
            let rule = rec
                .rule_id()
                .and_then(|id| self.rules.get(id))
                .ok_or_else(|| BindError::UnknownRule {
                    production,
                    code: rec.code.clone(),
                })?;
            actions.push(rule.action.clone());
        }
        log::debug!(
            "bound {} of {} productions",
            actions.iter().filter(|a| a.is_some()).count(),
            actions.len()
        );
        Ok(actions)
    }
}
