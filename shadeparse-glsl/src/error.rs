//! # Shader Front-End Error Type
//!
//! This module defines [`ShaderError`], the error surface of the shader
//! pipeline. It aggregates failures from:
//!
//! - **Preprocessing** (missing includes, unreadable files, include depth),
//! - **Table loading** (grammar compilation, bundle validation, binding),
//! - **Tokenizer construction**,
//! - **Parsing** (unrecoverable syntax errors, failing semantic actions).
//!
//! Conversions from the underlying error types are derived with `#[from]`, so
//! `?` works at call sites returning `Result<T, ShaderError>`.
use crate::PreprocessError;
use shadeparse::{CacheError, LexError, ParseError, SyntaxError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),

    #[error("cannot load shader parser: {0}")]
    Cache(#[from] CacheError),

    #[error("invalid token rules: {0}")]
    Lex(#[from] LexError),

    /// Unrecoverable syntax error, with `rendered` holding the source
    /// excerpt around it.
    #[error("{path}: {error}\n{rendered}")]
    Syntax {
        path: std::string::String,
        rendered: std::string::String,
        #[source]
        error: SyntaxError,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl ShaderError {
    /// Attaches the source excerpt to unrecoverable syntax errors.
    pub(crate) fn from_parse(
        err: ParseError,
        path: &str,
        source: &str,
        context_lines: usize,
    ) -> Self {
        match err {
            ParseError::Syntax(error) => ShaderError::Syntax {
                path: path.to_owned(),
                rendered: error.render(source, context_lines),
                error,
            },
            other => ShaderError::Parse(other),
        }
    }
}
