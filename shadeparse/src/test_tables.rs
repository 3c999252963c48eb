//! Hand-built tables for a statement-list grammar, used by the unit tests.
//!
//! ```text
//! 0  program' -> stmts
//! 1  stmts    -> stmts stmt
//! 2  stmts    -> stmt
//! 3  stmt     -> ID SEMI
//! 4  stmt     -> error SEMI
//! ```

use crate::grammar::GrammarDef;
use crate::parser::{ActionFn, Engine, StackValue, action_fn};
use crate::tables::{Action, Production, ProductionRecord, TableBundle};
use crate::{Lexer, LexerRule, Token};
use anyhow::bail;
use smartstring::alias::String;
use std::sync::Arc;

pub fn stmt_bundle() -> TableBundle {
    use Action::*;
    let labels: Vec<String> = ["program'", "stmts", "stmt", "ID", "SEMI", "$", "ERROR"]
        .into_iter()
        .map(String::from)
        .collect();
    let mut bundle = TableBundle {
        productions: vec![
            Production { lhs: 0, rhs_len: 1 },
            Production { lhs: 1, rhs_len: 2 },
            Production { lhs: 1, rhs_len: 1 },
            Production { lhs: 2, rhs_len: 2 },
            Production { lhs: 2, rhs_len: 2 },
        ],
        actions: vec![
            vec![(3, Shift(3)), (6, Shift(4))],
            vec![(5, Reduce(0)), (3, Shift(3)), (6, Shift(4))],
            vec![],
            vec![(4, Shift(6))],
            vec![(4, Shift(7))],
            vec![],
            vec![],
            vec![],
        ],
        gotos: vec![
            vec![(1, 1), (2, 2)],
            vec![(2, 5)],
            vec![],
            vec![],
            vec![],
            vec![],
            vec![],
            vec![],
        ],
        default_actions: vec![
            None,
            None,
            Some(Reduce(2)),
            None,
            None,
            Some(Reduce(1)),
            Some(Reduce(3)),
            Some(Reduce(4)),
        ],
        labels,
        labelmap: Default::default(),
        eof_symbol: 5,
        error_symbol: 6,
        discard_symbol: None,
        records: vec![
            record(0, 0, &[1], ""),
            record(1, 1, &[1, 2], "_2"),
            record(2, 1, &[2], "_2"),
            record(3, 2, &[3, 4], "_1"),
            record(4, 2, &[6, 4], "_0"),
        ],
        hash: "fixture".into(),
    };
    bundle.index_labels();
    bundle
}

fn record(id: usize, lhs: usize, rhs: &[usize], code: &str) -> ProductionRecord {
    ProductionRecord {
        id,
        lhs,
        rhs: rhs.to_vec(),
        code: code.into(),
    }
}

pub fn stmt_lexer() -> Lexer {
    let rules = vec![
        LexerRule::new("ID", "[a-z]+"),
        LexerRule::new("NUM", "[0-9]+"),
        LexerRule::new("SEMI", ";"),
        LexerRule::new("WS", r"[ \t\r\n]+").discard(),
    ];
    match Lexer::try_new(rules) {
        Ok(lexer) => lexer,
        Err(e) => panic!("fixture lexer: {e}"),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Empty,
    Token(String),
    Stmt(String),
    List(Vec<String>),
}

impl StackValue for Item {
    fn from_token(token: &Token) -> Self {
        Item::Token(token.text.clone())
    }

    fn empty() -> Self {
        Item::Empty
    }
}

/// Actions indexed by production; the context records the order of
/// reductions.
pub fn stmt_actions() -> Vec<Option<ActionFn<Vec<usize>, Item>>> {
    vec![
        None,
        Some(action_fn(|trace: &mut Vec<usize>, mut v: Vec<Item>| {
            trace.push(1);
            match (v.remove(0), v.remove(0)) {
                (Item::List(mut list), Item::Stmt(s)) => {
                    list.push(s);
                    Ok(Item::List(list))
                }
                other => bail!("bad stmts: {other:?}"),
            }
        })),
        Some(action_fn(|trace: &mut Vec<usize>, mut v: Vec<Item>| {
            trace.push(2);
            match v.remove(0) {
                Item::Stmt(s) => Ok(Item::List(vec![s])),
                other => bail!("bad stmt: {other:?}"),
            }
        })),
        Some(action_fn(|trace: &mut Vec<usize>, mut v: Vec<Item>| {
            trace.push(3);
            match v.remove(0) {
                Item::Token(t) if t == "boom" => bail!("refusing {t}"),
                Item::Token(t) => Ok(Item::Stmt(t)),
                other => bail!("bad id: {other:?}"),
            }
        })),
        Some(action_fn(|trace: &mut Vec<usize>, _v: Vec<Item>| {
            trace.push(4);
            Ok(Item::Stmt("error".into()))
        })),
    ]
}

pub fn stmt_engine() -> Engine<Vec<usize>, Item> {
    Engine::new(
        Arc::new(stmt_lexer()),
        Arc::new(stmt_bundle()),
        stmt_actions(),
    )
}

/// The grammar the tables above were built from. Rule ids match the
/// production markers: 0 `error SEMI`, 1 `ID SEMI`, 2 `stmts`.
pub fn stmt_grammar() -> GrammarDef<Vec<usize>, Item> {
    let actions = stmt_actions();
    let pick = |p: usize| {
        actions[p]
            .clone()
            .unwrap_or_else(|| action_fn(|_, _| Ok(Item::Empty)))
    };
    let (append, single) = (pick(1), pick(2));
    GrammarDef::new(["ID", "SEMI"])
        .rule("stmt: error SEMI", pick(4))
        .rule("stmt: ID SEMI", pick(3))
        .rule(
            "stmts: stmts stmt\n     | stmt",
            action_fn(move |ctx: &mut Vec<usize>, v: Vec<Item>| {
                if v.len() == 2 {
                    append(ctx, v)
                } else {
                    single(ctx, v)
                }
            }),
        )
}
