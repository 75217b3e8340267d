use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser as ClapParser;

use kiln::bytecode::Bytecode;
use kiln::bytecode::disasm::print_bc;
use kiln::frontend::lexer::Lexer;
use kiln::frontend::parser::Parser;
use kiln::frontend::token_dumper::TokenDumper;
use kiln::lang::value::Value;
use kiln::repl::{self, EvalError, Session};
use kiln::runtime::vm::VmConfig;

#[derive(ClapParser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Source file (or bytecode image with --image). Starts the REPL when omitted.
    file: Option<PathBuf>,

    /// Print the token stream and exit
    #[arg(long)]
    tokens: bool,

    /// Print the parsed program in canonical form and exit
    #[arg(long)]
    ast: bool,

    /// Print the disassembled bytecode before running
    #[arg(long)]
    bc: bool,

    /// Disable ANSI colors in --tokens output
    #[arg(long)]
    no_color: bool,

    /// Shorter --tokens output
    #[arg(long)]
    pretty: bool,

    /// Write the compiled bytecode image to PATH instead of running
    #[arg(long, value_name = "PATH")]
    emit: Option<PathBuf>,

    /// Treat FILE as a bytecode image written by --emit
    #[arg(long)]
    image: bool,

    /// Abort after this many executed instructions
    #[arg(long, value_name = "N")]
    max_steps: Option<usize>,

    /// VM stack capacity in values
    #[arg(long, value_name = "N")]
    stack_size: Option<usize>,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let defaults = VmConfig::default();
    let config = VmConfig {
        stack_size: cli.stack_size.unwrap_or(defaults.stack_size),
        max_steps: cli.max_steps.or(defaults.max_steps),
    };

    let Some(path) = cli.file.as_deref() else {
        repl::start(config)?;
        return Ok(());
    };

    if cli.image {
        return run_image(path, config, cli.bc);
    }

    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read '{}'", path.display()))?;

    if cli.tokens {
        let mut dumper = TokenDumper::new();
        if cli.no_color {
            dumper = dumper.no_color();
        }
        if cli.pretty {
            dumper = dumper.pretty();
        }
        dumper.dump(&Lexer::new(&source).tokenize());
        return Ok(());
    }

    let program = Parser::from_source(&source)
        .parse()
        .map_err(EvalError::Parse)?;

    if cli.ast {
        println!("{}", program);
        return Ok(());
    }

    let mut session = Session::with_config(config);
    let bytecode = session.compile(&program)?;

    if let Some(out) = &cli.emit {
        fs::write(out, bytecode.to_image()?)
            .with_context(|| format!("failed to write '{}'", out.display()))?;
        log::debug!("wrote {} bytes of bytecode to {}", bytecode.instructions.len(), out.display());
        return Ok(());
    }

    if cli.bc {
        print_bc(&bytecode);
    }

    let value = session.execute(bytecode)?;
    if program.ends_in_expression() {
        println!("{}", value);
    }
    Ok(())
}

/// Images carry no syntax tree, so any non-null last popped value is printed.
fn run_image(path: &Path, config: VmConfig, show_bc: bool) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("failed to read '{}'", path.display()))?;
    let bytecode = Bytecode::from_image(&bytes)
        .with_context(|| format!("'{}' is not a usable image", path.display()))?;

    if show_bc {
        print_bc(&bytecode);
    }

    let value = Session::with_config(config).execute(bytecode)?;
    if value != Value::Null {
        println!("{}", value);
    }
    Ok(())
}
