//! Command-line interface for the shader front end.
//!
//! - `preprocess <PATH>` prints the macro-expanded source;
//! - `grammar` prints the rendered grammar description (or its hash);
//! - `parse <PATH>` parses a shader and prints its syntax tree, compiling the
//!   grammar with an external program when the cached tables are stale.

use anyhow::{Context, bail};
use clap::{ArgAction, Parser, Subcommand};
use shadeparse::{CommandCompiler, EngineOptions, FsStore, TableCache};
use shadeparse_glsl::{FsLoader, MacroState, Preprocessor, ShaderFrontend, glsl_grammar};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory shader paths and includes are resolved against.
    #[arg(short, long, default_value = FsLoader::DEFAULT_BASE)]
    base: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Prints the preprocessed source of a shader
    Preprocess { path: String },

    /// Prints the rendered grammar description
    Grammar {
        /// Print only the content hash
        #[arg(long)]
        hash: bool,
    },

    /// Parses a shader and prints its syntax tree
    Parse {
        path: String,

        /// Directory of cached parse tables
        #[arg(long, default_value = ".shadeparse-cache")]
        cache_dir: PathBuf,

        /// Grammar compiler: reads the grammar description on stdin and
        /// writes the table bundle as JSON on stdout
        #[arg(long, default_value = "shadeparse-compile")]
        compiler: PathBuf,

        /// Extra argument passed to the grammar compiler (repeatable)
        #[arg(long = "compiler-arg")]
        compiler_args: Vec<String>,

        /// Recover from syntax errors instead of stopping at the first one
        #[arg(long, action = ArgAction::Set, default_value_t = true)]
        recover: bool,

        /// Source lines shown around each syntax error
        #[arg(long, default_value_t = 2)]
        context_lines: usize,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let preprocessor = Preprocessor::new(FsLoader::new(&args.base));

    match args.command {
        Commands::Preprocess { path } => {
            let text = preprocessor.load(&path)?;
            let mut macros = MacroState::new();
            let out = preprocessor.preprocess(&text, &path, &mut macros)?;
            print!("{out}");
            for overflow in &macros.overflows {
                eprintln!("warning: {overflow}");
            }
        }
        Commands::Grammar { hash } => {
            let grammar = glsl_grammar();
            if hash {
                println!("{}", grammar.content_hash());
            } else {
                print!("{}", grammar.render());
            }
        }
        Commands::Parse {
            path,
            cache_dir,
            compiler,
            compiler_args,
            recover,
            context_lines,
        } => {
            let compiler = compiler_args
                .into_iter()
                .fold(CommandCompiler::new(&compiler), CommandCompiler::arg);
            let cache = TableCache::new(FsStore::new(cache_dir), compiler).with_engine_options(
                EngineOptions {
                    recover,
                    context_lines,
                },
            );
            let frontend = ShaderFrontend::new(preprocessor, &cache)
                .context("cannot set up the shader parser")?;
            let parsed = frontend.parse_file(&path)?;
            print!("{}", parsed.render());
            for err in &parsed.errors {
                eprint!("{}", err.render(&parsed.source, context_lines));
            }
            if !parsed.errors.is_empty() {
                bail!("{path}: {} syntax errors", parsed.errors.len());
            }
        }
    }
    Ok(())
}
