//! # Shader front end
//!
//! [`ShaderFrontend`] ties the pieces together: a file is read and expanded
//! by the [`Preprocessor`], tokenized by the shader token rules and parsed by
//! an [`Engine`] whose tables come from a [`TableCache`]. Every reported
//! syntax error is logged with its source excerpt and collected in the
//! [`ParsedShader`].

use crate::grammar::{GlslValue, PARSER_NAME, glsl_grammar};
use crate::preprocess::{MacroExpansionOverflow, MacroState, Preprocessor};
use crate::tree::{NodeId, SyntaxTree};
use crate::{ShaderError, token};
use shadeparse::{Engine, ParserStats, SyntaxError, TableCache};

/// Engine specialized to the shader grammar.
pub type ShaderEngine = Engine<SyntaxTree, GlslValue>;

/// Result of parsing one shader.
#[derive(Debug)]
pub struct ParsedShader {
    pub tree: SyntaxTree,
    /// The `TranslationUnit` node.
    pub root: NodeId,
    /// Preprocessed source the tree was parsed from.
    pub source: std::string::String,
    /// Syntax errors that were reported and recovered from.
    pub errors: Vec<SyntaxError>,
    pub overflows: Vec<MacroExpansionOverflow>,
    pub stats: ParserStats,
}

impl ParsedShader {
    pub fn render(&self) -> std::string::String {
        self.tree.render(self.root)
    }
}

#[derive(Debug)]
pub struct ShaderFrontend {
    preprocessor: Preprocessor,
    engine: ShaderEngine,
}

impl ShaderFrontend {
    /// Builds the shader parser through `cache`, compiling the grammar only
    /// if no current tables are cached.
    pub fn new(preprocessor: Preprocessor, cache: &TableCache) -> Result<Self, ShaderError> {
        let engine = cache.get_parser(token::lexer()?, &glsl_grammar(), PARSER_NAME)?;
        Ok(Self::from_engine(preprocessor, engine))
    }

    pub fn from_engine(preprocessor: Preprocessor, engine: ShaderEngine) -> Self {
        Self {
            preprocessor,
            engine,
        }
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn engine(&self) -> &ShaderEngine {
        &self.engine
    }

    /// Reads and preprocesses `path` with a fresh macro table.
    pub fn preprocess_file(
        &self,
        path: &str,
    ) -> Result<(std::string::String, MacroState), ShaderError> {
        let text = self.preprocessor.load(path)?;
        let mut macros = MacroState::new();
        let source = self.preprocessor.preprocess(&text, path, &mut macros)?;
        log::debug!(
            "{path}: preprocessed {} bytes into {}, {} macros",
            text.len(),
            source.len(),
            macros.len()
        );
        Ok((source, macros))
    }

    /// Parses already preprocessed `source`; `path` only labels diagnostics.
    pub fn parse_source(
        &self,
        source: std::string::String,
        path: &str,
    ) -> Result<ParsedShader, ShaderError> {
        let context_lines = self.engine.options().context_lines;
        let mut tree = SyntaxTree::new();
        let out = self
            .engine
            .parse_with(&mut tree, &source, |err| {
                log::warn!("{path}: {}", err.render(&source, context_lines));
            })
            .map_err(|e| ShaderError::from_parse(e, path, &source, context_lines))?;

        let root = match out.value {
            GlslValue::Node(id) => id,
            other => {
                log::debug!("{path}: goal produced {other:?}, using an empty unit");
                tree.new_node("TranslationUnit")
            }
        };
        Ok(ParsedShader {
            tree,
            root,
            source,
            errors: out.errors,
            overflows: Vec::new(),
            stats: out.stats,
        })
    }

    pub fn parse_file(&self, path: &str) -> Result<ParsedShader, ShaderError> {
        let (source, macros) = self.preprocess_file(path)?;
        let mut parsed = self.parse_source(source, path)?;
        parsed.overflows = macros.overflows;
        log::info!(
            "{path}: {} nodes, {} syntax errors",
            parsed.tree.len(),
            parsed.errors.len()
        );
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_tables::FixtureCompiler;
    use crate::{MemoryLoader, PreprocessOptions};
    use shadeparse::{EngineOptions, MemoryStore};
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn frontend_with(preprocessor: Preprocessor, options: EngineOptions) -> ShaderFrontend {
        init_logger();
        let cache = TableCache::new(MemoryStore::new(), FixtureCompiler::default())
            .with_engine_options(options);
        ShaderFrontend::new(preprocessor, &cache).unwrap()
    }

    fn frontend(loader: MemoryLoader, options: EngineOptions) -> ShaderFrontend {
        frontend_with(Preprocessor::new(loader), options)
    }

    #[test]
    fn expression_statements_build_a_unit() {
        let loader = MemoryLoader::new().with_file("main.glsl", "a;\nb;\n");
        let parsed = frontend(loader, EngineOptions::default())
            .parse_file("main.glsl")
            .unwrap();
        assert!(parsed.errors.is_empty());
        assert_eq!(
            parsed.render(),
            "TranslationUnit {\n\
             -ExprStatement {\n--ID : a {\n--}\n-}\n\
             -ExprStatement {\n--ID : b {\n--}\n-}\n\
             }\n"
        );
        assert_eq!(parsed.tree.parent(parsed.root), None);
    }

    #[test]
    fn macros_and_includes_apply_before_parsing() {
        let loader = MemoryLoader::new()
            .with_file("defs.glsl", "#define VALUE answer")
            .with_file("main.glsl", "#include \"defs.glsl\"\nVALUE;\n");
        let parsed = frontend(loader, EngineOptions::default())
            .parse_file("main.glsl")
            .unwrap();
        assert_eq!(parsed.source, "answer;\n\n");
        let stmt = parsed.tree.children(parsed.root)[0];
        let id = parsed.tree.children(stmt)[0];
        assert_eq!(
            parsed.tree.get(id).unwrap().value,
            Some(crate::Scalar::Str("answer".into()))
        );
    }

    #[test]
    fn isolated_error_becomes_error_node() {
        let loader = MemoryLoader::new().with_file("main.glsl", "a;\nb c;\nd;\n");
        let parsed = frontend(loader, EngineOptions::default())
            .parse_file("main.glsl")
            .unwrap();
        assert_eq!(parsed.errors.len(), 1);
        let err = &parsed.errors[0];
        assert_eq!((err.line, err.column), (2, 3));
        let expected: Vec<&str> = err.expected.iter().map(|s| s.as_str()).collect();
        assert_eq!(expected, ["SEMICOLON"]);

        let kinds: Vec<&str> = parsed
            .tree
            .children(parsed.root)
            .iter()
            .filter_map(|&c| parsed.tree.kind(c))
            .collect();
        assert_eq!(kinds, ["ExprStatement", "Error", "ExprStatement"]);
        assert_eq!(parsed.stats.recoveries, 1);
    }

    #[test]
    fn unrecoverable_error_is_rendered() {
        let loader = MemoryLoader::new().with_file("main.glsl", "a;\nb");
        let err = frontend(loader, EngineOptions::default())
            .parse_file("main.glsl")
            .unwrap_err();
        let ShaderError::Syntax {
            path,
            rendered,
            error,
        } = &err
        else {
            panic!("expected a syntax error, got {err:?}");
        };
        assert_eq!(path, "main.glsl");
        assert_eq!(error.line, 2);
        assert_eq!(error.kind, "$");
        assert!(rendered.contains("2: b"));
    }

    #[test]
    fn recovery_can_be_disabled() {
        let loader = MemoryLoader::new().with_file("main.glsl", "a;\nb c;\nd;\n");
        let options = EngineOptions {
            recover: false,
            context_lines: 0,
        };
        let err = frontend(loader, options).parse_file("main.glsl").unwrap_err();
        assert!(matches!(err, ShaderError::Syntax { ref error, .. } if error.line == 2));
    }

    #[test]
    fn missing_file_is_a_preprocess_error() {
        let err = frontend(MemoryLoader::new(), EngineOptions::default())
            .parse_file("nope.glsl")
            .unwrap_err();
        assert!(matches!(err, ShaderError::Preprocess(_)));
    }

    #[test]
    fn overflows_are_reported_with_the_tree() {
        let loader = MemoryLoader::new().with_file("main.glsl", "#define a a a\na;\n");
        let preprocessor = Preprocessor::new(loader).with_options(PreprocessOptions {
            max_passes: 2,
            ..PreprocessOptions::default()
        });
        let parsed = frontend_with(preprocessor, EngineOptions::default())
            .parse_file("main.glsl")
            .unwrap();
        assert_eq!(parsed.source, "a a a a;\n\n");
        assert_eq!(parsed.overflows.len(), 1);
        assert_eq!(parsed.overflows[0].unit, "passes");
        assert_eq!(parsed.errors.len(), 1);
        let first = parsed.tree.children(parsed.root)[0];
        assert_eq!(parsed.tree.kind(first), Some("Error"));
    }

    #[test]
    fn tables_are_compiled_once_per_cache() {
        init_logger();
        let compiler = FixtureCompiler::default();
        let calls = Arc::clone(&compiler.calls);
        let store = MemoryStore::new();
        let cache = TableCache::new(store.clone(), compiler);
        for _ in 0..3 {
            ShaderFrontend::new(Preprocessor::new(MemoryLoader::new()), &cache).unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(store.get(PARSER_NAME).is_some());
    }
}
