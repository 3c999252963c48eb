//! # Shader tokens
//!
//! The ordered token rule table of the shader language. Rules are tried in
//! order and the first one that matches wins, so longer operators are listed
//! before their prefixes and `DOUBLECONSTANT` before `FLOATCONSTANT` before
//! `UINTCONSTANT` before `INTCONSTANT`.
//!
//! Identifiers whose upper-cased spelling is a keyword are re-kinded to that
//! keyword (`vec3` becomes `VEC3`); `true` and `false` become
//! `BOOLCONSTANT`.

use once_cell::sync::Lazy;
use shadeparse::{LexError, Lexer, LexerRule, Token};
use std::collections::HashSet;

pub static KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "CONST", "BOOL", "FLOAT", "DOUBLE", "INT", "UINT", "BREAK", "CONTINUE", "DO", "ELSE",
        "FOR", "IF", "DISCARD", "RETURN", "SWITCH", "CASE", "DEFAULT", "SUBROUTINE", "BVEC2",
        "BVEC3", "BVEC4", "IVEC2", "IVEC3", "IVEC4", "UVEC2", "UVEC3", "UVEC4", "VEC2", "VEC3",
        "VEC4", "MAT2", "MAT3", "MAT4", "CENTROID", "IN", "OUT", "INOUT", "UNIFORM", "PATCH",
        "SAMPLE", "BUFFER", "SHARED", "COHERENT", "VOLATILE", "RESTRICT", "READONLY",
        "WRITEONLY", "DVEC2", "DVEC3", "DVEC4", "DMAT2", "DMAT3", "DMAT4", "NOPERSPECTIVE",
        "FLAT", "SMOOTH", "LAYOUT", "MAT2X2", "MAT2X3", "MAT2X4", "MAT3X2", "MAT3X3", "MAT3X4",
        "MAT4X2", "MAT4X3", "MAT4X4", "DMAT2X2", "DMAT2X3", "DMAT2X4", "DMAT3X2", "DMAT3X3",
        "DMAT3X4", "DMAT4X2", "DMAT4X3", "DMAT4X4", "ATOMIC_UINT", "SAMPLER1D", "SAMPLER2D",
        "SAMPLER3D", "SAMPLERCUBE", "SAMPLER1DSHADOW", "SAMPLER2DSHADOW", "SAMPLERCUBESHADOW",
        "SAMPLER1DARRAY", "SAMPLER2DARRAY", "SAMPLER1DARRAYSHADOW", "SAMPLER2DARRAYSHADOW",
        "ISAMPLER1D", "ISAMPLER2D", "ISAMPLER3D", "ISAMPLERCUBE", "ISAMPLER1DARRAY",
        "ISAMPLER2DARRAY", "USAMPLER1D", "USAMPLER2D", "USAMPLER3D", "USAMPLERCUBE",
        "USAMPLER1DARRAY", "USAMPLER2DARRAY", "SAMPLER2DRECT", "SAMPLER2DRECTSHADOW",
        "ISAMPLER2DRECT", "USAMPLER2DRECT", "SAMPLERBUFFER", "ISAMPLERBUFFER", "USAMPLERBUFFER",
        "SAMPLERCUBEARRAY", "SAMPLERCUBEARRAYSHADOW", "ISAMPLERCUBEARRAY", "USAMPLERCUBEARRAY",
        "SAMPLER2DMS", "ISAMPLER2DMS", "USAMPLER2DMS", "SAMPLER2DMSARRAY", "ISAMPLER2DMSARRAY",
        "USAMPLER2DMSARRAY", "IMAGE1D", "IIMAGE1D", "UIMAGE1D", "IMAGE2D", "IIMAGE2D",
        "UIMAGE2D", "IMAGE3D", "IIMAGE3D", "UIMAGE3D", "IMAGE2DRECT", "IIMAGE2DRECT",
        "UIMAGE2DRECT", "IMAGECUBE", "IIMAGECUBE", "UIMAGECUBE", "IMAGEBUFFER", "IIMAGEBUFFER",
        "UIMAGEBUFFER", "IMAGE1DARRAY", "IIMAGE1DARRAY", "UIMAGE1DARRAY", "IMAGE2DARRAY",
        "IIMAGE2DARRAY", "UIMAGE2DARRAY", "IMAGECUBEARRAY", "IIMAGECUBEARRAY",
        "UIMAGECUBEARRAY", "IMAGE2DMS", "IIMAGE2DMS", "UIMAGE2DMS", "IMAGE2DMSARRAY",
        "IIMAGE2DMSARRAY", "UIMAGE2DMSARRAY", "STRUCT", "VOID", "WHILE", "INVARIANT", "PRECISE",
        "HIGHP", "MEDIUMP", "LOWP", "PRECISION",
    ]
    .into_iter()
    .collect()
});

/// `(kind, pattern)` of every kept rule, in match order.
const RULES: &[(&str, &str)] = &[
    ("ID", r"[a-zA-Z$_][a-zA-Z0-9$_]*"),
    ("DOUBLECONSTANT", r"[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?(lf|LF|d)"),
    ("FLOATCONSTANT", r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?[fF]?|[0-9]+[eE][+-]?[0-9]+[fF]?"),
    ("UINTCONSTANT", r"(0[xX][0-9a-fA-F]+|[0-9]+)[uU]"),
    ("INTCONSTANT", r"0[xX][0-9a-fA-F]+|[0-9]+"),
    ("STRLIT", r#""([^"\\\n]|\\.)*""#),
    ("INC", r"\+\+"),
    ("DEC", r"--"),
    ("EXP", r"\*\*"),
    ("LAND", r"&&"),
    ("LOR", r"\|\|"),
    ("EQUALS", r"=="),
    ("NEQUALS", r"!="),
    ("LEQUALS", r"<="),
    ("GEQUALS", r">="),
    ("LPAREN", r"\("),
    ("RPAREN", r"\)"),
    ("LSBRACKET", r"\["),
    ("RSBRACKET", r"\]"),
    ("LBRACKET", r"\{"),
    ("RBRACKET", r"\}"),
    ("COMMA", r","),
    ("COLON", r":"),
    ("SEMICOLON", r";"),
    ("QUESTION", r"\?"),
    ("DOT", r"\."),
    ("PLUS", r"\+"),
    ("MINUS", r"-"),
    ("TIMES", r"\*"),
    ("DIVIDE", r"/"),
    ("MOD", r"%"),
    ("BITAND", r"&"),
    ("BITOR", r"\|"),
    ("XOR", r"\^"),
    ("BITINV", r"~"),
    ("BANG", r"!"),
    ("ASSIGN", r"="),
    ("LTHAN", r"<"),
    ("GTHAN", r">"),
];

fn remap_keyword(token: &mut Token) {
    match token.text.as_str() {
        "true" | "false" => token.kind = "BOOLCONSTANT".into(),
        text => {
            let upper = text.to_ascii_uppercase();
            if KEYWORDS.contains(upper.as_str()) {
                token.kind = upper.as_str().into();
            }
        }
    }
}

/// The shader token rules: discarded comments and whitespace first, then
/// [`RULES`] with the keyword remap on `ID`.
pub fn rules() -> Vec<LexerRule> {
    let mut rules = vec![
        LexerRule::new("COMMENT", r"//[^\n]*").discard(),
        LexerRule::new("BLOCK_COMMENT", r"/\*([^*]|\*+[^*/])*\*+/").discard(),
        LexerRule::new("WS", r"[ \t\r\n]+").discard(),
    ];
    for &(kind, pattern) in RULES {
        let rule = LexerRule::new(kind, pattern);
        rules.push(match kind {
            "ID" => rule.with_rewrite(remap_keyword),
            _ => rule,
        });
    }
    rules
}

pub fn lexer() -> Result<Lexer, LexError> {
    Lexer::try_new(rules())
}

/// Every terminal the lexer can hand to the parser, sorted: keywords,
/// `BOOLCONSTANT` and the kept rule kinds.
pub fn token_kinds() -> Vec<&'static str> {
    let mut kinds: Vec<&'static str> = KEYWORDS.iter().copied().collect();
    kinds.push("BOOLCONSTANT");
    kinds.extend(RULES.iter().map(|(kind, _)| *kind));
    kinds.sort_unstable();
    kinds.dedup();
    kinds
}
