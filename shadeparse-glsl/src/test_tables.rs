//! Hand-built tables for the expression-statement subset of the shader
//! grammar, served by a fake grammar compiler in the unit tests.
//!
//! ```text
//! 0   S'                   -> translation_unit
//! 1   translation_unit     -> translation_unit external_declaration
//! 2   translation_unit     -> external_declaration
//! 3   external_declaration -> statement
//! 4   statement            -> expression SEMICOLON
//! 5   statement            -> error SEMICOLON
//! 6   expression           -> unary_expression
//! 7   unary_expression     -> postfix_expression
//! 8   postfix_expression   -> primary_expression
//! 9   primary_expression   -> var_expr
//! 10  var_expr             -> ID
//! ```
//!
//! Production markers are looked up in the real shader grammar, so the
//! fixture binds the real semantic actions.

use crate::grammar::glsl_grammar;
use shadeparse::{Action, GrammarCompiler, Production, ProductionRecord, TableBundle};
use smartstring::alias::String;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// `_<rule id>` of the shader grammar rule defining `lhs`.
pub fn marker(lhs: &str) -> String {
    let prefix = format!("{lhs}:");
    match glsl_grammar()
        .rules
        .iter()
        .position(|r| r.grammar.starts_with(&prefix))
    {
        Some(id) => format!("_{id}").as_str().into(),
        None => panic!("no rule for {lhs}"),
    }
}

fn record(id: usize, lhs: usize, rhs: &[usize], rule: &str) -> ProductionRecord {
    ProductionRecord {
        id,
        lhs,
        rhs: rhs.to_vec(),
        code: if rule.is_empty() {
            String::new()
        } else {
            marker(rule)
        },
    }
}

pub fn statement_bundle() -> TableBundle {
    use Action::*;
    let labels: Vec<String> = [
        "S'",
        "translation_unit",
        "external_declaration",
        "statement",
        "expression",
        "unary_expression",
        "postfix_expression",
        "primary_expression",
        "var_expr",
        "ID",
        "SEMICOLON",
        "$",
        "ERROR",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    let lhs_len = [
        (0, 1),
        (1, 2),
        (1, 1),
        (2, 1),
        (3, 2),
        (3, 2),
        (4, 1),
        (5, 1),
        (6, 1),
        (7, 1),
        (8, 1),
    ];
    let unit_gotos = vec![(3, 3), (4, 4), (5, 5), (6, 6), (7, 7), (8, 8)];
    let mut top_gotos = vec![(1, 1), (2, 2)];
    top_gotos.extend(unit_gotos.iter().copied());
    let mut unit_row = vec![(2, 9)];
    unit_row.extend(unit_gotos.iter().copied());

    let mut bundle = TableBundle {
        productions: lhs_len
            .iter()
            .map(|&(lhs, rhs_len)| Production { lhs, rhs_len })
            .collect(),
        actions: vec![
            vec![(9, Shift(11)), (12, Shift(12))],
            vec![(11, Reduce(0)), (9, Shift(11)), (12, Shift(12))],
            vec![],
            vec![],
            vec![(10, Shift(10))],
            vec![],
            vec![],
            vec![],
            vec![],
            vec![],
            vec![],
            vec![],
            vec![(10, Shift(13))],
            vec![],
        ],
        gotos: {
            let mut gotos = vec![Vec::new(); 14];
            gotos[0] = top_gotos;
            gotos[1] = unit_row;
            gotos
        },
        default_actions: vec![
            None,
            None,
            Some(Reduce(2)),
            Some(Reduce(3)),
            None,
            Some(Reduce(6)),
            Some(Reduce(7)),
            Some(Reduce(8)),
            Some(Reduce(9)),
            Some(Reduce(1)),
            Some(Reduce(4)),
            Some(Reduce(10)),
            None,
            Some(Reduce(5)),
        ],
        labels,
        labelmap: Default::default(),
        eof_symbol: 11,
        error_symbol: 12,
        discard_symbol: None,
        records: vec![
            record(0, 0, &[1], ""),
            record(1, 1, &[1, 2], "translation_unit"),
            record(2, 1, &[2], "translation_unit"),
            record(3, 2, &[3], "external_declaration"),
            record(4, 3, &[4, 10], "statement"),
            record(5, 3, &[12, 10], "statement"),
            record(6, 4, &[5], "expression"),
            record(7, 5, &[6], "unary_expression"),
            record(8, 6, &[7], "postfix_expression"),
            record(9, 7, &[8], "primary_expression"),
            record(10, 8, &[9], "var_expr"),
        ],
        hash: String::new(),
    };
    bundle.index_labels();
    bundle
}

/// Serves [`statement_bundle`] for the shader grammar and counts calls.
#[derive(Debug, Default)]
pub struct FixtureCompiler {
    pub calls: Arc<AtomicUsize>,
}

impl GrammarCompiler for FixtureCompiler {
    fn compile(&self, rendered: &str) -> anyhow::Result<TableBundle> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::ensure!(
            rendered.contains("translation_unit:"),
            "not the shader grammar"
        );
        Ok(statement_bundle())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_is_consistent() {
        let bundle = statement_bundle();
        bundle.validate().unwrap();
        let actions = glsl_grammar().bind_actions(&bundle).unwrap();
        assert_eq!(actions.len(), 11);
        // external_declaration passes its value through
        assert!(actions[3].is_none());
        assert!(actions[4].is_some());
    }
}
