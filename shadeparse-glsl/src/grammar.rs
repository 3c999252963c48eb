//! # Shader grammar
//!
//! Grammar rules of the shader language with the semantic actions that build
//! the [`SyntaxTree`]. The last rule, `translation_unit`, is the goal.
//!
//! Node kinds produced: `ID`, `IntConstant`, `UIntConstant`,
//! `FloatConstant`, `DoubleConstant`, `BoolConstant`, `StringLiteral`,
//! `Type`, `Qualifier`, `BinOp`, `UnaryOp`, `PostfixOp`, `Call`,
//! `Constructor`, `Index`, `Declaration`, `ArraySize`, `Param`, `Params`,
//! `Block`, `ExprStatement`, `Return`, `Error`, `Function` and
//! `TranslationUnit`.

use crate::token;
use crate::tree::{NodeId, Scalar, SyntaxTree};
use anyhow::{Context, Result, anyhow, bail};
use shadeparse::{Assoc, GrammarDef, StackValue, Token, action_fn};
use smartstring::alias::String;

/// Cache key of the shader parser tables.
pub const PARSER_NAME: &str = "glsl";

const TYPE_KEYWORDS: &[&str] = &[
    "VOID", "BOOL", "INT", "UINT", "FLOAT", "DOUBLE", "VEC2", "VEC3", "VEC4", "BVEC2", "BVEC3",
    "BVEC4", "IVEC2", "IVEC3", "IVEC4", "UVEC2", "UVEC3", "UVEC4", "DVEC2", "DVEC3", "DVEC4",
    "MAT2", "MAT3", "MAT4", "DMAT2", "DMAT3", "DMAT4", "SAMPLER2D", "SAMPLER3D", "SAMPLERCUBE",
];

const QUALIFIERS: &[&str] = &[
    "CONST", "IN", "OUT", "INOUT", "UNIFORM", "FLAT", "SMOOTH", "CENTROID", "NOPERSPECTIVE",
    "HIGHP", "MEDIUMP", "LOWP",
];

const BINARY_OPERATORS: &[&str] = &[
    "ASSIGN", "LOR", "LAND", "LTHAN", "GTHAN", "LEQUALS", "GEQUALS", "EQUALS", "NEQUALS",
    "BITAND", "BITOR", "XOR", "PLUS", "MINUS", "TIMES", "DIVIDE", "MOD", "EXP", "DOT",
];

const UNARY_OPERATORS: &[&str] = &["MINUS", "PLUS", "BANG", "BITINV", "INC", "DEC"];

/// Value stack entry of the shader parser.
#[derive(Debug, Clone, PartialEq)]
pub enum GlslValue {
    Empty,
    Token { kind: String, text: String, line: usize },
    Node(NodeId),
    List(Vec<NodeId>),
}

impl StackValue for GlslValue {
    fn from_token(token: &Token) -> Self {
        GlslValue::Token {
            kind: token.kind.clone(),
            text: token.text.clone(),
            line: token.line(),
        }
    }

    fn empty() -> Self {
        GlslValue::Empty
    }
}

/// Formats one rule with an alternative per line.
fn alternatives<I, S>(lhs: &str, rhs: I) -> std::string::String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let pad = " ".repeat(lhs.len());
    rhs.into_iter()
        .enumerate()
        .map(|(i, r)| match i {
            0 => format!("{lhs}: {}", r.as_ref()),
            _ => format!("{pad}| {}", r.as_ref()),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn glsl_grammar() -> GrammarDef<SyntaxTree, GlslValue> {
    GrammarDef::new(token::token_kinds())
        .precedence(Assoc::Right, &["ASSIGN"])
        .precedence(Assoc::Left, &["LOR", "LAND"])
        .precedence(Assoc::Left, &["LTHAN", "GTHAN", "LEQUALS", "GEQUALS"])
        .precedence(Assoc::Left, &["EQUALS", "NEQUALS"])
        .precedence(Assoc::Left, &["BITAND", "BITOR", "XOR"])
        .precedence(Assoc::Left, &["PLUS", "MINUS"])
        .precedence(Assoc::Left, &["TIMES", "DIVIDE", "MOD", "EXP"])
        .precedence(Assoc::Left, &["DOT"])
        .rule("var_expr: ID", action_fn(var_expr))
        .rule(
            &alternatives(
                "constant",
                [
                    "INTCONSTANT",
                    "UINTCONSTANT",
                    "FLOATCONSTANT",
                    "DOUBLECONSTANT",
                    "BOOLCONSTANT",
                    "STRLIT",
                ],
            ),
            action_fn(constant),
        )
        .rule(
            &alternatives(
                "primary_expression",
                ["var_expr", "constant", "LPAREN expression RPAREN"],
            ),
            action_fn(primary_expression),
        )
        .rule(
            &alternatives("type_specifier", TYPE_KEYWORDS),
            action_fn(|tree: &mut SyntaxTree, v: Vec<GlslValue>| keyword_leaf(tree, "Type", v)),
        )
        .rule(
            &alternatives(
                "postfix_expression",
                [
                    "primary_expression",
                    "postfix_expression LSBRACKET expression RSBRACKET",
                    "postfix_expression LPAREN RPAREN",
                    "postfix_expression LPAREN argument_list RPAREN",
                    "type_specifier LPAREN argument_list RPAREN",
                    "postfix_expression INC",
                    "postfix_expression DEC",
                ],
            ),
            action_fn(postfix_expression),
        )
        .rule(
            &alternatives(
                "argument_list",
                ["expression", "argument_list COMMA expression"],
            ),
            action_fn(list_rule),
        )
        .rule(
            &alternatives(
                "unary_expression",
                std::iter::once("postfix_expression".to_owned())
                    .chain(UNARY_OPERATORS.iter().map(|op| format!("{op} unary_expression"))),
            ),
            action_fn(unary_expression),
        )
        .rule(
            &alternatives(
                "expression",
                std::iter::once("unary_expression".to_owned()).chain(
                    BINARY_OPERATORS
                        .iter()
                        .map(|op| format!("expression {op} expression")),
                ),
            ),
            action_fn(expression),
        )
        .rule(
            &alternatives("type_qualifier", QUALIFIERS),
            action_fn(|tree: &mut SyntaxTree, v: Vec<GlslValue>| {
                keyword_leaf(tree, "Qualifier", v)
            }),
        )
        .rule(
            &alternatives(
                "fully_specified_type",
                ["type_specifier", "type_qualifier type_specifier"],
            ),
            action_fn(fully_specified_type),
        )
        .rule(
            &alternatives(
                "declaration",
                [
                    "fully_specified_type ID SEMICOLON",
                    "fully_specified_type ID ASSIGN expression SEMICOLON",
                    "fully_specified_type ID LSBRACKET expression RSBRACKET SEMICOLON",
                ],
            ),
            action_fn(declaration),
        )
        .rule("parameter: fully_specified_type ID", action_fn(parameter))
        .rule(
            &alternatives(
                "parameter_list",
                ["parameter", "parameter_list COMMA parameter"],
            ),
            action_fn(list_rule),
        )
        .rule(
            &alternatives("statement_list", ["statement", "statement_list statement"]),
            action_fn(list_rule),
        )
        .rule(
            &alternatives(
                "compound_statement",
                ["LBRACKET RBRACKET", "LBRACKET statement_list RBRACKET"],
            ),
            action_fn(compound_statement),
        )
        .rule(
            &alternatives(
                "statement",
                [
                    "declaration",
                    "expression SEMICOLON",
                    "compound_statement",
                    "RETURN SEMICOLON",
                    "RETURN expression SEMICOLON",
                    "error SEMICOLON",
                ],
            ),
            action_fn(statement),
        )
        .rule(
            &alternatives(
                "function_definition",
                [
                    "fully_specified_type ID LPAREN RPAREN compound_statement",
                    "fully_specified_type ID LPAREN parameter_list RPAREN compound_statement",
                ],
            ),
            action_fn(function_definition),
        )
        .passthrough(&alternatives(
            "external_declaration",
            ["function_definition", "statement"],
        ))
        .rule(
            &alternatives(
                "translation_unit",
                ["external_declaration", "translation_unit external_declaration"],
            ),
            action_fn(translation_unit),
        )
}

fn take<const N: usize>(v: Vec<GlslValue>) -> Result<[GlslValue; N]> {
    v.try_into()
        .map_err(|v: Vec<GlslValue>| anyhow!("expected {N} values, got {}", v.len()))
}

fn node(v: &GlslValue) -> Result<NodeId> {
    match v {
        GlslValue::Node(id) => Ok(*id),
        other => bail!("expected a syntax node, found {other:?}"),
    }
}

fn token(v: &GlslValue) -> Result<(&str, &str)> {
    match v {
        GlslValue::Token { kind, text, .. } => Ok((kind.as_str(), text.as_str())),
        other => bail!("expected a token, found {other:?}"),
    }
}

fn list(v: GlslValue) -> Result<Vec<NodeId>> {
    match v {
        GlslValue::List(items) => Ok(items),
        other => bail!("expected a list, found {other:?}"),
    }
}

fn id_leaf(tree: &mut SyntaxTree, v: &GlslValue) -> Result<NodeId> {
    let (_, name) = token(v)?;
    Ok(tree.leaf("ID", Scalar::Str(name.into())))
}

fn var_expr(tree: &mut SyntaxTree, v: Vec<GlslValue>) -> Result<GlslValue> {
    let [id] = take(v)?;
    Ok(GlslValue::Node(id_leaf(tree, &id)?))
}

fn parse_int(text: &str) -> Result<i64> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.with_context(|| format!("invalid integer constant {text:?}"))
}

fn parse_uint(text: &str) -> Result<u64> {
    let digits = text.trim_end_matches(['u', 'U']);
    let parsed = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => digits.parse(),
    };
    parsed.with_context(|| format!("invalid unsigned constant {text:?}"))
}

fn parse_float(text: &str, suffixes: &[char]) -> Result<f64> {
    text.trim_end_matches(suffixes)
        .parse()
        .with_context(|| format!("invalid floating-point constant {text:?}"))
}

fn unquote(text: &str) -> std::string::String {
    let inner = text
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(text);
    inner.replace("\\\"", "\"").replace("\\\\", "\\")
}

fn constant(tree: &mut SyntaxTree, v: Vec<GlslValue>) -> Result<GlslValue> {
    let [tok] = take(v)?;
    let (kind, text) = token(&tok)?;
    let (node_kind, value) = match kind {
        "INTCONSTANT" => ("IntConstant", Scalar::Int(parse_int(text)?)),
        "UINTCONSTANT" => ("UIntConstant", Scalar::UInt(parse_uint(text)?)),
        "FLOATCONSTANT" => ("FloatConstant", Scalar::Float(parse_float(text, &['f', 'F'])?)),
        "DOUBLECONSTANT" => (
            "DoubleConstant",
            Scalar::Double(parse_float(text, &['d', 'l', 'f', 'L', 'F'])?),
        ),
        "BOOLCONSTANT" => ("BoolConstant", Scalar::Bool(text == "true")),
        "STRLIT" => ("StringLiteral", Scalar::Str(unquote(text).as_str().into())),
        other => bail!("unexpected constant token {other}"),
    };
    Ok(GlslValue::Node(tree.leaf(node_kind, value)))
}

fn primary_expression(_: &mut SyntaxTree, v: Vec<GlslValue>) -> Result<GlslValue> {
    if v.len() == 1 {
        let [x] = take(v)?;
        return Ok(x);
    }
    let [_, x, _] = take(v)?;
    Ok(x)
}

/// Leaf of `kind` valued with the keyword's source spelling.
fn keyword_leaf(tree: &mut SyntaxTree, kind: &str, v: Vec<GlslValue>) -> Result<GlslValue> {
    let [tok] = take(v)?;
    let (_, text) = token(&tok)?;
    Ok(GlslValue::Node(tree.leaf(kind, Scalar::Str(text.into()))))
}

fn postfix_expression(tree: &mut SyntaxTree, v: Vec<GlslValue>) -> Result<GlslValue> {
    let id = match v.len() {
        1 => {
            let [x] = take(v)?;
            return Ok(x);
        }
        2 => {
            let [e, op] = take(v)?;
            let n = tree.op_node("PostfixOp", token(&op)?.1);
            tree.push(n, node(&e)?)?;
            n
        }
        3 => {
            let [f, _, _] = take(v)?;
            tree.branch("Call", &[node(&f)?])?
        }
        _ => {
            let [head, open, inner, _] = take(v)?;
            let head = node(&head)?;
            if token(&open)?.0 == "LSBRACKET" {
                tree.branch("Index", &[head, node(&inner)?])?
            } else {
                let kind = match tree.kind(head) {
                    Some("Type") => "Constructor",
                    _ => "Call",
                };
                let mut children = vec![head];
                children.extend(list(inner)?);
                tree.branch(kind, &children)?
            }
        }
    };
    Ok(GlslValue::Node(id))
}

/// `item`, `list item` and `list SEP item` all collect into a list.
fn list_rule(_: &mut SyntaxTree, v: Vec<GlslValue>) -> Result<GlslValue> {
    let (items, item) = match v.len() {
        1 => {
            let [x] = take(v)?;
            (Vec::new(), x)
        }
        2 => {
            let [l, x] = take(v)?;
            (list(l)?, x)
        }
        _ => {
            let [l, _, x] = take(v)?;
            (list(l)?, x)
        }
    };
    let mut items = items;
    items.push(node(&item)?);
    Ok(GlslValue::List(items))
}

fn unary_expression(tree: &mut SyntaxTree, v: Vec<GlslValue>) -> Result<GlslValue> {
    if v.len() == 1 {
        let [x] = take(v)?;
        return Ok(x);
    }
    let [op, e] = take(v)?;
    let n = tree.op_node("UnaryOp", token(&op)?.1);
    tree.push(n, node(&e)?)?;
    Ok(GlslValue::Node(n))
}

fn expression(tree: &mut SyntaxTree, v: Vec<GlslValue>) -> Result<GlslValue> {
    if v.len() == 1 {
        let [x] = take(v)?;
        return Ok(x);
    }
    let [lhs, op, rhs] = take(v)?;
    let n = tree.op_node("BinOp", token(&op)?.1);
    tree.push(n, node(&lhs)?)?;
    tree.push(n, node(&rhs)?)?;
    Ok(GlslValue::Node(n))
}

fn fully_specified_type(tree: &mut SyntaxTree, v: Vec<GlslValue>) -> Result<GlslValue> {
    if v.len() == 1 {
        let [x] = take(v)?;
        return Ok(x);
    }
    let [qualifier, ty] = take(v)?;
    let ty = node(&ty)?;
    tree.insert(ty, 0, node(&qualifier)?)?;
    Ok(GlslValue::Node(ty))
}

fn declaration(tree: &mut SyntaxTree, v: Vec<GlslValue>) -> Result<GlslValue> {
    let id = match v.len() {
        3 => {
            let [ty, name, _] = take(v)?;
            let name = id_leaf(tree, &name)?;
            tree.branch("Declaration", &[node(&ty)?, name])?
        }
        5 => {
            let [ty, name, _, init, _] = take(v)?;
            let name = id_leaf(tree, &name)?;
            tree.branch("Declaration", &[node(&ty)?, name, node(&init)?])?
        }
        _ => {
            let [ty, name, _, size, _, _] = take(v)?;
            let name = id_leaf(tree, &name)?;
            let size = tree.branch("ArraySize", &[node(&size)?])?;
            tree.branch("Declaration", &[node(&ty)?, name, size])?
        }
    };
    Ok(GlslValue::Node(id))
}

fn parameter(tree: &mut SyntaxTree, v: Vec<GlslValue>) -> Result<GlslValue> {
    let [ty, name] = take(v)?;
    let name = id_leaf(tree, &name)?;
    Ok(GlslValue::Node(tree.branch("Param", &[node(&ty)?, name])?))
}

fn compound_statement(tree: &mut SyntaxTree, v: Vec<GlslValue>) -> Result<GlslValue> {
    let statements = match v.len() {
        2 => Vec::new(),
        _ => {
            let [_, l, _] = take(v)?;
            list(l)?
        }
    };
    Ok(GlslValue::Node(tree.branch("Block", &statements)?))
}

fn statement(tree: &mut SyntaxTree, v: Vec<GlslValue>) -> Result<GlslValue> {
    let id = match v.len() {
        1 => {
            let [x] = take(v)?;
            return Ok(x);
        }
        2 => {
            let [x, _] = take(v)?;
            match x {
                GlslValue::Empty => tree.new_node("Error"),
                GlslValue::Token { .. } => tree.new_node("Return"),
                GlslValue::Node(e) => tree.branch("ExprStatement", &[e])?,
                other => bail!("unexpected statement head {other:?}"),
            }
        }
        _ => {
            let [_, e, _] = take(v)?;
            tree.branch("Return", &[node(&e)?])?
        }
    };
    Ok(GlslValue::Node(id))
}

fn function_definition(tree: &mut SyntaxTree, v: Vec<GlslValue>) -> Result<GlslValue> {
    let (ty, name, params, body) = match v.len() {
        5 => {
            let [ty, name, _, _, body] = take(v)?;
            (ty, name, Vec::new(), body)
        }
        _ => {
            let [ty, name, _, params, _, body] = take(v)?;
            (ty, name, list(params)?, body)
        }
    };
    let name = id_leaf(tree, &name)?;
    let params = tree.branch("Params", &params)?;
    let id = tree.branch("Function", &[node(&ty)?, name, params, node(&body)?])?;
    Ok(GlslValue::Node(id))
}

fn translation_unit(tree: &mut SyntaxTree, v: Vec<GlslValue>) -> Result<GlslValue> {
    if v.len() == 1 {
        let [decl] = take(v)?;
        return Ok(GlslValue::Node(
            tree.branch("TranslationUnit", &[node(&decl)?])?,
        ));
    }
    let [unit, decl] = take(v)?;
    let unit = node(&unit)?;
    tree.push(unit, node(&decl)?)?;
    Ok(GlslValue::Node(unit))
}
