// sketchrun: run an Arduino sketch and print its command stream

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use clap::Parser as ClapParser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sketchrun::commands::{Command, CommandKind, Primitive, RequestKind};
use sketchrun::config::Config;
use sketchrun::interpreter::{ExecutionState, Interpreter};
use sketchrun::parser::{codec, parse_sketch, MacroTable};

#[derive(ClapParser)]
#[command(name = "sketchrun")]
#[command(about = "Run an Arduino sketch and print the commands it produces as JSON lines", long_about = None)]
struct Cli {
    /// Sketch source, or an encoded AST with --from-ast
    file: PathBuf,

    /// Configuration file (.toml or .json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of loop() iterations before the run completes
    #[arg(long)]
    max_loop_iterations: Option<u64>,

    /// Drive the sketch with step() instead of start() and tick()
    #[arg(long)]
    step: bool,

    /// Log every emitted command
    #[arg(short, long)]
    verbose: bool,

    /// Trace every frame the interpreter executes
    #[arg(long)]
    debug: bool,

    /// Answer for every analogRead() request
    #[arg(long, default_value = "512")]
    analog_value: i64,

    /// Answer for every digitalRead() request
    #[arg(long, default_value = "0")]
    digital_value: i64,

    /// Write the encoded AST to this path instead of running
    #[arg(long)]
    emit_ast: Option<PathBuf>,

    /// Treat FILE as an encoded AST
    #[arg(long)]
    from_ast: bool,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            if path.extension().is_some_and(|ext| ext == "json") {
                Config::from_json_str(&text)?
            } else {
                Config::from_toml_str(&text)?
            }
        }
        None => Config::default(),
    };
    if let Some(iterations) = cli.max_loop_iterations {
        config.max_loop_iterations = iterations;
    }
    config.verbose |= cli.verbose;
    config.debug |= cli.debug;
    Ok(config)
}

fn load_program(path: &Path, from_ast: bool) -> Result<(sketchrun::parser::ast::Program, MacroTable)> {
    if from_ast {
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let program = codec::decode(&bytes).with_context(|| format!("decoding {}", path.display()))?;
        return Ok((program, MacroTable::new()));
    }
    let source = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let sketch = parse_sketch(&source).with_context(|| format!("parsing {}", path.display()))?;
    Ok((sketch.program, sketch.macros))
}

/// Simulated time in microseconds, advanced by every delay the sketch issues.
fn advance_clock(clock: &Cell<u64>, command: &Command) {
    match command.kind {
        CommandKind::Delay { ms } => clock.set(clock.get() + ms.max(0) as u64 * 1000),
        CommandKind::DelayMicroseconds { us } => clock.set(clock.get() + us.max(0) as u64),
        _ => {}
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&cli)?;
    let (program, macros) = load_program(&cli.file, cli.from_ast)?;

    if let Some(out) = &cli.emit_ast {
        fs::write(out, codec::encode(&program)).with_context(|| format!("writing {}", out.display()))?;
        info!(nodes = program.nodes.len(), path = %out.display(), "wrote encoded AST");
        return Ok(());
    }

    let clock = Rc::new(Cell::new(0u64));
    let mut interp = Interpreter::new(&program, config).with_macros(macros);
    let listener_clock = Rc::clone(&clock);
    interp.add_listener(Box::new(move |command: &Command| {
        advance_clock(&listener_clock, command);
        match serde_json::to_string(command) {
            Ok(line) => println!("{}", line),
            Err(err) => tracing::error!(%err, "cannot serialize command"),
        }
    }));

    let (analog, digital) = (cli.analog_value, cli.digital_value);
    let respond = |kind: &RequestKind| match kind {
        RequestKind::AnalogRead { .. } => Primitive::Int(analog),
        RequestKind::DigitalRead { .. } => Primitive::Int(digital),
        RequestKind::Millis => Primitive::Int((clock.get() / 1000) as i64),
        RequestKind::Micros => Primitive::Int(clock.get() as i64),
        RequestKind::LibraryMethod { .. } => Primitive::Int(0),
    };

    let state = if cli.step {
        loop {
            match interp.state() {
                ExecutionState::Idle | ExecutionState::Paused => {
                    interp.step();
                }
                ExecutionState::WaitingForResponse => {
                    let Some(pending) = interp.pending_request().cloned() else {
                        break interp.state();
                    };
                    interp.resume_with_value(pending.request_id, respond(&pending.kind));
                }
                state => break state,
            }
        }
    } else {
        interp.run_with(respond)
    };

    if state == ExecutionState::Error {
        bail!("{} stopped with a runtime error", cli.file.display());
    }
    Ok(())
}
