//! # shadeparse-glsl
//!
//! A front end for a GLSL-like shader language built on the **shadeparse**
//! runtime.
//!
//! The pipeline has three stages:
//!
//! - [`Preprocessor`]: expands `#define` macros and flattens `#include`
//!   directives, reading files through a [`SourceLoader`];
//! - the shader token rules ([`token::lexer`]): identifiers with keyword
//!   remapping, numeric and string constants, operators;
//! - the shader grammar ([`glsl_grammar`]): parsed by a
//!   [`shadeparse::Engine`] whose semantic actions build a [`SyntaxTree`].
//!
//! [`ShaderFrontend`] runs all three; its parse tables come from a
//! [`shadeparse::TableCache`] and are only recompiled when the grammar
//! changes.
//!
//! ## Example
//!
//! ```rust,no_run
//! use shadeparse::{CommandCompiler, FsStore, TableCache};
//! use shadeparse_glsl::{FsLoader, Preprocessor, ShaderFrontend};
//!
//! let cache = TableCache::new(FsStore::new(".cache"), CommandCompiler::new("grammar-compiler"));
//! let frontend = ShaderFrontend::new(Preprocessor::new(FsLoader::default()), &cache).unwrap();
//! let parsed = frontend.parse_file("main.glsl").unwrap();
//! print!("{}", parsed.render());
//! ```
pub mod error;
pub mod frontend;
pub mod grammar;
pub mod preprocess;
pub mod token;
pub mod tree;

#[cfg(test)]
mod test_tables;

pub use error::ShaderError;
pub use frontend::{ParsedShader, ShaderEngine, ShaderFrontend};
pub use grammar::{GlslValue, PARSER_NAME, glsl_grammar};
pub use preprocess::{
    FsLoader, MacroExpansionOverflow, MacroState, MemoryLoader, PreprocessError,
    PreprocessOptions, Preprocessor, SourceLoader,
};
pub use tree::{Node, NodeId, Scalar, SyntaxTree, TreeError};
