//! # Table cache
//!
//! Building LALR tables is expensive and done by an external grammar
//! compiler. [`TableCache`] keeps the last bundle built for each parser
//! name in a [`TableStore`], keyed by the SHA-256 of the rendered grammar,
//! and only calls the [`GrammarCompiler`] when the grammar text changed or
//! the persisted record cannot be used.
//!
//! Within one process a bundle is built at most once per parser name:
//! callers asking for the same name serialize on that name's slot and reuse
//! whatever the first caller built.

use crate::grammar::{BindError, GrammarDef, content_hash};
use crate::parser::{Engine, EngineOptions, StackValue};
use crate::tables::{TableBundle, TableError};
use crate::Lexer;
use anyhow::{Context, bail};
use smartstring::alias::String;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Why a persisted record could not be used. Always recovered from by
/// rebuilding.
#[derive(Debug, Error)]
pub enum CacheLoadError {
    #[error("cannot read record: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed record: {0}")]
    Json(#[from] serde_json::Error),
    #[error("inconsistent record: {0}")]
    Invalid(#[from] TableError),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cached tables are unusable: {0}")]
    Load(#[from] CacheLoadError),

    #[error("grammar compiler failed for parser {name:?}: {message}")]
    Compile { name: String, message: std::string::String },

    #[error("compiled tables for parser {name:?} are inconsistent: {source}")]
    Invalid {
        name: String,
        #[source]
        source: TableError,
    },

    #[error("cannot persist tables for parser {name:?}: {source}")]
    Store {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Bind(#[from] BindError),
}

/// Key-value storage for serialized table bundles.
pub trait TableStore: Send + Sync {
    /// Returns the record stored under `name`, if any.
    fn load(&self, name: &str) -> std::io::Result<Option<std::string::String>>;

    fn store(&self, name: &str, record: &str) -> std::io::Result<()>;
}

/// One `<name>.json` file per parser in a directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    dir: PathBuf,
}

impl FsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

impl TableStore for FsStore {
    fn load(&self, name: &str) -> std::io::Result<Option<std::string::String>> {
        match std::fs::read_to_string(self.path(name)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn store(&self, name: &str, record: &str) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path(name), record)
    }
}

/// In-memory store; clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, std::string::String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<std::string::String> {
        self.lock().get(name).cloned()
    }

    pub fn insert(&self, name: &str, record: impl Into<std::string::String>) {
        self.lock().insert(name.into(), record.into());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, std::string::String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TableStore for MemoryStore {
    fn load(&self, name: &str) -> std::io::Result<Option<std::string::String>> {
        Ok(self.get(name))
    }

    fn store(&self, name: &str, record: &str) -> std::io::Result<()> {
        self.insert(name, record);
        Ok(())
    }
}

/// Turns a rendered grammar description into parse tables.
pub trait GrammarCompiler: Send + Sync {
    fn compile(&self, grammar: &str) -> anyhow::Result<TableBundle>;
}

/// Runs an external program with the grammar description on stdin and
/// reads a JSON table bundle from its stdout.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    program: PathBuf,
    args: Vec<std::string::String>,
}

impl CommandCompiler {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<std::string::String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl GrammarCompiler for CommandCompiler {
    fn compile(&self, grammar: &str) -> anyhow::Result<TableBundle> {
        let program = self.program.display();
        log::debug!("running grammar compiler {program}");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("cannot start {program}"))?;

        let mut stdin = child.stdin.take().context("child stdin not captured")?;
        let input = grammar.to_owned();
        let writer = std::thread::spawn(move || stdin.write_all(input.as_bytes()));

        // stdout and stderr must drain together or a chatty compiler stalls
        let output = child
            .wait_with_output()
            .with_context(|| format!("cannot read output of {program}"))?;
        match writer.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => return Err(e).context("cannot write grammar to compiler"),
            Err(_) => bail!("grammar writer thread panicked"),
        }
        if !output.status.success() {
            bail!(
                "{program} exited with {}: {}",
                output.status,
                std::string::String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        let stdout = std::str::from_utf8(&output.stdout)
            .with_context(|| format!("{program} wrote non-UTF-8 output"))?;
        let bundle = TableBundle::from_json(stdout)
            .with_context(|| format!("{program} produced malformed tables"))?;
        Ok(bundle)
    }
}

type Slot = Arc<Mutex<Option<Arc<TableBundle>>>>;

/// Loads, builds and memoizes table bundles per parser name.
pub struct TableCache {
    store: Box<dyn TableStore>,
    compiler: Box<dyn GrammarCompiler>,
    slots: Mutex<HashMap<String, Slot>>,
    options: EngineOptions,
}

impl TableCache {
    pub fn new(store: impl TableStore + 'static, compiler: impl GrammarCompiler + 'static) -> Self {
        Self {
            store: Box::new(store),
            compiler: Box::new(compiler),
            slots: Mutex::new(HashMap::new()),
            options: EngineOptions::default(),
        }
    }

    /// Options given to every engine handed out by [`get_parser`](Self::get_parser).
    #[must_use]
    pub fn with_engine_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns an engine for `grammar`, reusing cached tables when the
    /// grammar is unchanged.
    pub fn get_parser<C, V: StackValue>(
        &self,
        lexer: impl Into<Arc<Lexer>>,
        grammar: &GrammarDef<C, V>,
        name: &str,
    ) -> Result<Engine<C, V>, CacheError> {
        let tables = self.tables(&grammar.render(), name)?;
        let actions = grammar.bind_actions(&tables)?;
        Ok(Engine::new(lexer.into(), tables, actions).with_options(self.options.clone()))
    }

    /// Returns the bundle for a rendered grammar description.
    pub fn tables(&self, rendered: &str, name: &str) -> Result<Arc<TableBundle>, CacheError> {
        let hash = content_hash(rendered);
        let slot = self.slot(name);
        let mut memo = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tables) = memo.as_ref().filter(|t| t.hash == hash) {
            log::debug!("parser {name:?}: reusing tables built in this process");
            return Ok(Arc::clone(tables));
        }

        match self.load(name) {
            Ok(Some(tables)) if tables.hash == hash => {
                log::debug!("parser {name:?}: cached tables are current");
                let tables = Arc::new(tables);
                *memo = Some(Arc::clone(&tables));
                return Ok(tables);
            }
            Ok(Some(tables)) => {
                log::debug!(
                    "parser {name:?}: grammar changed ({} -> {}), rebuilding",
                    tables.hash,
                    hash
                );
            }
            Ok(None) => log::debug!("parser {name:?}: no cached tables"),
            Err(e) => log::warn!("parser {name:?}: {e}; rebuilding"),
        }

        let tables = Arc::new(self.build(rendered, &hash, name)?);
        if let Err(e) = self.persist(name, &tables) {
            log::warn!("{e}");
        }
        *memo = Some(Arc::clone(&tables));
        Ok(tables)
    }

    fn slot(&self, name: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(name.into()).or_default())
    }

    fn load(&self, name: &str) -> Result<Option<TableBundle>, CacheError> {
        let Some(record) = self.store.load(name).map_err(CacheLoadError::from)? else {
            return Ok(None);
        };
        let mut tables = TableBundle::from_json(&record).map_err(CacheLoadError::from)?;
        if tables.labelmap.is_empty() {
            tables.index_labels();
        }
        tables.validate().map_err(CacheLoadError::from)?;
        Ok(Some(tables))
    }

    fn build(&self, rendered: &str, hash: &str, name: &str) -> Result<TableBundle, CacheError> {
        log::debug!("parser {name:?}: compiling grammar");
        let mut tables = self
            .compiler
            .compile(rendered)
            .map_err(|e| CacheError::Compile {
                name: name.into(),
                message: format!("{e:#}"),
            })?;
        if tables.labelmap.is_empty() {
            tables.index_labels();
        }
        tables.hash = hash.into();
        tables.validate().map_err(|source| CacheError::Invalid {
            name: name.into(),
            source,
        })?;
        log::debug!(
            "parser {name:?}: built {} states, {} productions",
            tables.n_states(),
            tables.productions.len()
        );
        Ok(tables)
    }

    fn persist(&self, name: &str, tables: &TableBundle) -> Result<(), CacheError> {
        let store_err = |source| CacheError::Store {
            name: name.into(),
            source,
        };
        let record = tables
            .to_json()
            .map_err(|e| store_err(std::io::Error::other(e)))?;
        self.store.store(name, &record).map_err(store_err)
    }
}

impl std::fmt::Debug for TableCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableCache")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
