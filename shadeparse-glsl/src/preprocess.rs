//! # Macro preprocessor
//!
//! A line-oriented rewriter run before tokenization. It understands two
//! directives:
//!
//! - `#define NAME [body...]` registers a textual substitution;
//! - `#include "path"` splices in another file, preprocessed with the same
//!   macro table.
//!
//! Every other line is expanded by longest-match substitution, repeated until
//! a pass changes nothing. Directive lines are never emitted; any other
//! directive (`#version`, `#extension`, ...) is dropped.
//!
//! ## Example
//! ```rust
//! # use shadeparse_glsl::{MemoryLoader, Preprocessor};
//! let loader = MemoryLoader::new().with_file("tiles.glsl", "#define TILE 32");
//! let pp = Preprocessor::new(loader);
//! let out = pp.run("#include \"tiles.glsl\"\nint a = TILE * 2;", "main.glsl").unwrap();
//! assert_eq!(out, "int a = 32 * 2;\n");
//! ```

use indexmap::IndexMap;
use smartstring::alias::String;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal preprocessing failures.
#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("{from}:{line}: included file {path:?} not found")]
    IncludeNotFound {
        path: String,
        from: String,
        line: usize,
    },

    #[error("cannot read {path:?}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{from}:{line}: including {path:?} exceeds the nesting limit of {limit}")]
    IncludeDepthExceeded {
        path: String,
        from: String,
        line: usize,
        limit: usize,
    },
}

/// A line whose expansion hit one of the caps. Recorded, never fatal; the
/// line is emitted as far as it was expanded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}:{line}: macro expansion stopped after {limit} {unit}")]
pub struct MacroExpansionOverflow {
    pub path: String,
    pub line: usize,
    pub limit: usize,
    /// `"steps"` or `"passes"`.
    pub unit: &'static str,
}

/// Macro table and diagnostics of one preprocessing run. Shared by every
/// file the run includes.
#[derive(Debug, Clone, Default)]
pub struct MacroState {
    macros: IndexMap<String, String>,
    pub overflows: Vec<MacroExpansionOverflow>,
}

impl MacroState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name`. A redefinition replaces the body but keeps the
    /// macro's original registration slot.
    pub fn define(&mut self, name: impl AsRef<str>, replacement: impl AsRef<str>) {
        self.macros
            .insert(name.as_ref().into(), replacement.as_ref().into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.macros.get(name).map(|r| r.as_str())
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    /// Macros in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.macros.iter().map(|(n, r)| (n.as_str(), r.as_str()))
    }

    /// Longest macro whose name the text starts with; the earlier
    /// registration wins on equal length.
    fn longest_match(&self, text: &str) -> Option<(&str, &str)> {
        let mut best: Option<(&str, &str)> = None;
        for (name, replacement) in self.iter() {
            if name.is_empty() || !text.starts_with(name) {
                continue;
            }
            if best.is_none_or(|(b, _)| name.len() > b.len()) {
                best = Some((name, replacement));
            }
        }
        best
    }
}

/// Read access to shader sources by relative path.
pub trait SourceLoader: Send + Sync {
    /// Returns the file's text; a missing file is
    /// [`std::io::ErrorKind::NotFound`].
    fn load(&self, path: &str) -> std::io::Result<std::string::String>;
}

/// Reads files relative to a base directory.
#[derive(Debug, Clone)]
pub struct FsLoader {
    base: PathBuf,
}

impl FsLoader {
    pub const DEFAULT_BASE: &'static str = "./shaders";

    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

impl Default for FsLoader {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BASE)
    }
}

impl SourceLoader for FsLoader {
    fn load(&self, path: &str) -> std::io::Result<std::string::String> {
        let full = self.base.join(path);
        log::debug!("reading shader source {}", full.display());
        std::fs::read_to_string(full)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    files: HashMap<String, std::string::String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_file(mut self, path: &str, text: impl Into<std::string::String>) -> Self {
        self.insert(path, text);
        self
    }

    pub fn insert(&mut self, path: &str, text: impl Into<std::string::String>) {
        self.files.insert(path.into(), text.into());
    }
}

impl SourceLoader for MemoryLoader {
    fn load(&self, path: &str) -> std::io::Result<std::string::String> {
        self.files.get(path).cloned().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, format!("no file {path:?}"))
        })
    }
}

#[derive(Debug, Clone)]
pub struct PreprocessOptions {
    /// Whole-line rewrite passes before giving up on a fixpoint.
    pub max_passes: usize,
    /// Scan steps within one pass over one line.
    pub max_steps: usize,
    pub max_include_depth: usize,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            max_passes: 50,
            max_steps: 4096,
            max_include_depth: 64,
        }
    }
}

pub struct Preprocessor {
    loader: Box<dyn SourceLoader>,
    options: PreprocessOptions,
}

impl std::fmt::Debug for Preprocessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preprocessor")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Preprocessor {
    pub fn new(loader: impl SourceLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            options: PreprocessOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: PreprocessOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &PreprocessOptions {
        &self.options
    }

    /// Reads a top-level source file through the loader.
    pub fn load(&self, path: &str) -> Result<std::string::String, PreprocessError> {
        self.loader.load(path).map_err(|source| PreprocessError::Io {
            path: path.into(),
            source,
        })
    }

    /// Preprocesses `buf` with a fresh macro table.
    pub fn run(&self, buf: &str, path: &str) -> Result<std::string::String, PreprocessError> {
        let mut state = MacroState::new();
        self.preprocess(buf, path, &mut state)
    }

    /// Preprocesses `buf`, reading and updating `state`.
    pub fn preprocess(
        &self,
        buf: &str,
        path: &str,
        state: &mut MacroState,
    ) -> Result<std::string::String, PreprocessError> {
        self.expand_file(buf, path, state, 0)
    }

    fn expand_file(
        &self,
        buf: &str,
        path: &str,
        state: &mut MacroState,
        depth: usize,
    ) -> Result<std::string::String, PreprocessError> {
        let mut out = std::string::String::with_capacity(buf.len());
        for (i, line) in buf.split('\n').enumerate() {
            let lineno = i + 1;
            let trimmed = line.trim();
            let Some(directive) = trimmed.strip_prefix('#') else {
                out.push_str(&self.expand_line(line, path, lineno, state));
                out.push('\n');
                continue;
            };

            let mut words = directive.split_whitespace();
            match words.next() {
                Some("define") => {
                    let Some(name) = words.next() else {
                        log::warn!("{path}:{lineno}: #define without a name ignored");
                        continue;
                    };
                    let body: Vec<&str> = words.collect();
                    log::trace!("define {name} = {:?}", body.join(" "));
                    state.define(name, body.join(" "));
                }
                Some("include") => {
                    let Some(arg) = words.next() else {
                        log::warn!("{path}:{lineno}: #include without a path ignored");
                        continue;
                    };
                    let target: std::string::String = arg
                        .chars()
                        .filter(|c| !matches!(c, '"' | '\'' | '`'))
                        .collect();
                    let target = target.trim();
                    if depth + 1 > self.options.max_include_depth {
                        return Err(PreprocessError::IncludeDepthExceeded {
                            path: target.into(),
                            from: path.into(),
                            line: lineno,
                            limit: self.options.max_include_depth,
                        });
                    }
                    let text = match self.loader.load(target) {
                        Ok(text) => text,
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                            return Err(PreprocessError::IncludeNotFound {
                                path: target.into(),
                                from: path.into(),
                                line: lineno,
                            });
                        }
                        Err(source) => {
                            return Err(PreprocessError::Io {
                                path: target.into(),
                                source,
                            });
                        }
                    };
                    log::debug!("{path}:{lineno}: including {target}");
                    out.push_str(&self.expand_file(&text, target, state, depth + 1)?);
                }
                other => {
                    log::debug!("{path}:{lineno}: ignoring directive {:?}", other.unwrap_or(""));
                }
            }
        }
        Ok(out)
    }

    /// Rewrites a line until a pass changes nothing.
    fn expand_line(
        &self,
        line: &str,
        path: &str,
        lineno: usize,
        state: &mut MacroState,
    ) -> std::string::String {
        let mut current = line.to_owned();
        if state.is_empty() {
            return current;
        }
        for _ in 0..self.options.max_passes {
            let (next, finished) = self.expand_pass(&current, state);
            if !finished {
                self.overflow(state, path, lineno, self.options.max_steps, "steps");
                return next;
            }
            if next == current {
                return next;
            }
            current = next;
        }
        self.overflow(state, path, lineno, self.options.max_passes, "passes");
        current
    }

    /// One left-to-right scan. Returns `false` when the step cap cut it
    /// short; the unscanned rest is appended as is.
    fn expand_pass(&self, line: &str, state: &MacroState) -> (std::string::String, bool) {
        let mut out = std::string::String::with_capacity(line.len());
        let mut rest = line;
        let mut steps = 0;
        while let Some(ch) = rest.chars().next() {
            steps += 1;
            if steps > self.options.max_steps {
                out.push_str(rest);
                return (out, false);
            }
            match state.longest_match(rest) {
                Some((name, replacement)) => {
                    out.push_str(replacement);
                    rest = &rest[name.len()..];
                }
                None => {
                    out.push(ch);
                    rest = &rest[ch.len_utf8()..];
                }
            }
        }
        (out, true)
    }

    fn overflow(
        &self,
        state: &mut MacroState,
        path: &str,
        line: usize,
        limit: usize,
        unit: &'static str,
    ) {
        let overflow = MacroExpansionOverflow {
            path: path.into(),
            line,
            limit,
            unit,
        };
        log::warn!("{overflow}");
        state.overflows.push(overflow);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn pp() -> Preprocessor {
        Preprocessor::new(MemoryLoader::new())
    }

    #[test]
    fn longest_macro_wins() {
        init_logger();
        let out = pp().run("#define A 1\n#define AB 2\nAB;", "t").unwrap();
        assert_eq!(out, "2;\n");
        let out = pp().run("#define AB 2\n#define A 1\nA AB ABA", "t").unwrap();
        assert_eq!(out, "1 2 21\n");
    }

    #[test]
    fn expansion_repeats_to_fixpoint() {
        let out = pp().run("#define X Y\n#define Y 5\nX", "t").unwrap();
        assert_eq!(out, "5\n");
        let out = pp().run("#define SELF SELF\nSELF", "t").unwrap();
        assert_eq!(out, "SELF\n");
    }

    #[test]
    fn body_words_are_joined_by_single_spaces() {
        let mut state = MacroState::new();
        let out = pp()
            .preprocess("  #  define   SUM  a\t+   b  \nSUM;", "t", &mut state)
            .unwrap();
        assert_eq!(out, "a + b;\n");
        assert_eq!(state.get("SUM"), Some("a + b"));
    }

    #[test]
    fn define_without_body_expands_to_nothing() {
        let out = pp().run("#define EMPTY\nxEMPTYy", "t").unwrap();
        assert_eq!(out, "xy\n");
    }

    #[test]
    fn define_without_name_is_ignored() {
        init_logger();
        let mut state = MacroState::new();
        let out = pp().preprocess("#define\nx", "t", &mut state).unwrap();
        assert_eq!(out, "x\n");
        assert!(state.is_empty());
    }

    #[test]
    fn redefinition_keeps_registration_slot() {
        let mut state = MacroState::new();
        pp().preprocess("#define A 1\n#define B 2\n#define A 3", "t", &mut state)
            .unwrap();
        let macros: Vec<_> = state.iter().collect();
        assert_eq!(macros, [("A", "3"), ("B", "2")]);
    }

    #[test]
    fn unknown_directives_are_dropped() {
        let out = pp().run("#version 450\n#\nvoid main();", "t").unwrap();
        assert_eq!(out, "void main();\n");
    }

    #[test]
    fn every_line_is_newline_terminated() {
        assert_eq!(pp().run("a\nb\n", "t").unwrap(), "a\nb\n\n");
        assert_eq!(pp().run("", "t").unwrap(), "\n");
    }

    #[test]
    fn include_defines_are_visible_afterwards() {
        init_logger();
        let loader = MemoryLoader::new()
            .with_file("defs.glsl", "#define N 4\nfloat y;")
            .with_file("nested/more.glsl", "#include `defs.glsl`\n#define M N");
        let pp = Preprocessor::new(loader);
        let mut state = MacroState::new();
        let out = pp
            .preprocess(
                "#include \"nested/more.glsl\"\nint x = N + M;",
                "main.glsl",
                &mut state,
            )
            .unwrap();
        assert_eq!(out, "float y;\nint x = 4 + 4;\n");
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn include_path_quotes_are_stripped() {
        let loader = MemoryLoader::new().with_file("a.glsl", "a");
        let pp = Preprocessor::new(loader);
        for directive in ["#include \"a.glsl\"", "#include 'a.glsl'", "#include a.glsl"] {
            assert_eq!(pp.run(directive, "t").unwrap(), "a\n");
        }
    }

    #[test]
    fn missing_include_is_fatal() {
        let err = pp().run("x\n#include \"nope.glsl\"", "main.glsl").unwrap_err();
        match err {
            PreprocessError::IncludeNotFound { path, from, line } => {
                assert_eq!(path, "nope.glsl");
                assert_eq!(from, "main.glsl");
                assert_eq!(line, 2);
            }
            other => panic!("expected IncludeNotFound, got {other:?}"),
        }
    }

    #[test]
    fn include_cycle_hits_depth_limit() {
        let loader = MemoryLoader::new()
            .with_file("a.glsl", "#include \"b.glsl\"")
            .with_file("b.glsl", "#include \"a.glsl\"");
        let pp = Preprocessor::new(loader).with_options(PreprocessOptions {
            max_include_depth: 8,
            ..PreprocessOptions::default()
        });
        let err = pp.run("#include \"a.glsl\"", "main.glsl").unwrap_err();
        assert!(matches!(
            err,
            PreprocessError::IncludeDepthExceeded { limit: 8, .. }
        ));
    }

    #[test]
    fn runaway_expansion_is_recorded_not_fatal() {
        init_logger();
        let mut state = MacroState::new();
        let out = pp()
            .preprocess("#define A AA\nA;\nok", "t", &mut state)
            .unwrap();
        assert!(out.ends_with(";\nok\n"));
        assert!(out.starts_with("AAAA"));
        assert_eq!(state.overflows.len(), 1);
        assert_eq!(state.overflows[0].line, 2);
        assert_eq!(state.overflows[0].unit, "steps");
    }

    #[test]
    fn pass_cap_is_recorded() {
        let pp = pp().with_options(PreprocessOptions {
            max_passes: 3,
            ..PreprocessOptions::default()
        });
        let mut state = MacroState::new();
        let out = pp
            .preprocess("#define A B\n#define B A\nA", "t", &mut state)
            .unwrap();
        assert_eq!(out, "B\n");
        assert_eq!(state.overflows[0].unit, "passes");
        assert_eq!(state.overflows[0].limit, 3);
    }

    #[test]
    fn fs_loader_resolves_against_base() {
        let dir = std::env::temp_dir().join(format!("shadeparse-pp-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("common.glsl"), "#define PI 3.14").unwrap();
        let pp = Preprocessor::new(FsLoader::new(&dir));
        let out = pp.run("#include \"common.glsl\"\nfloat p = PI;", "main.glsl");
        let _ = std::fs::remove_dir_all(&dir);
        assert_eq!(out.unwrap(), "float p = 3.14;\n");
    }
}
