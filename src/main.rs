// src/main.rs

// qian
// A small scripting language compiled in one pass to bytecode for a stack VM.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser as ClapParser;
use log::{info, LevelFilter};
use rustyline::error::ReadlineError;

use qian::config::{DEFAULT_MAX_FRAMES, FRAME_SLOTS};
use qian::vm::debug::disassemble_function;
use qian::{compile, Function, InterpretError, VmConfig, VM};

#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// The script file to run. If not provided, launches the REPL.
    file: Option<PathBuf>,

    /// Print the compiled bytecode before running it.
    #[arg(long)]
    disassemble: bool,

    /// Log every executed instruction (overrides RUST_LOG).
    #[arg(long)]
    trace: bool,

    /// Maximum operand stack depth.
    #[arg(long, default_value_t = FRAME_SLOTS * DEFAULT_MAX_FRAMES)]
    stack_size: usize,

    /// Maximum call depth.
    #[arg(long, default_value_t = DEFAULT_MAX_FRAMES)]
    max_frames: usize,
}

fn show_examples() {
    println!("\n--- qian Examples ---\n");

    let examples = [
        ("Arithmetic", "print 1 + 2 * 10 - (2 + 3) * 6;"),
        ("Globals", "var greeting = \"hello\"; greeting = greeting + \" world\"; print greeting;"),
        ("Block scope", "{ var a = 1; { var a = 2; print a; } print a; }"),
        ("Branches", "var n = 7; if (n < 5) print \"small\"; elif (n < 10) print \"medium\"; else print \"large\";"),
        ("Counting loop", "for (var i = 0; i < 3; i = i + 1) print i;"),
        ("Break and continue", "for (var i = 0; i < 10; i = i + 1) { if (i == 2) continue; if (i == 5) break; print i; }"),
        ("Recursion", "fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } print fib(15);"),
    ];

    for (description, code) in examples.iter() {
        println!("// {}", description);
        println!("{}\n", code);
    }
    println!("---------------------\n");
}

fn init_logging(trace: bool) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if trace {
        builder.filter_level(LevelFilter::Trace);
    }
    builder.init();
}

/// Compiles and runs one unit of source on `vm`, keeping its globals.
fn run_source<W: Write>(vm: &mut VM<W>, source: &str, disassemble: bool) -> Result<(), InterpretError> {
    let chunk = compile(source)?;
    if disassemble {
        println!("{}", disassemble_function(&Function::script(chunk.clone())));
    }
    vm.interpret(chunk)?;
    Ok(())
}

/// Runs the interpreter on a given script file.
fn run_file(path: &Path, config: VmConfig, disassemble: bool) -> anyhow::Result<()> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file '{}'", path.display()))?;
    info!("running {} ({} bytes)", path.display(), source.len());
    let mut vm = VM::new(config);
    run_source(&mut vm, &source, disassemble)?;
    Ok(())
}

// Line-at-a-time REPL. Globals persist between lines; errors are reported and the loop continues.
fn repl(config: VmConfig, disassemble: bool) -> anyhow::Result<()> {
    println!("qian REPL");
    println!("Enter statements, 'quit', or ':examples'");

    let mut editor = rustyline::DefaultEditor::new()?;
    let mut vm = VM::new(config);

    loop {
        let line = match editor.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        };
        let input = line.trim();

        if input == "quit" || input == "exit" {
            break;
        }
        if input.is_empty() {
            continue;
        }
        editor.add_history_entry(input)?;
        if input == ":examples" {
            show_examples();
            continue;
        }

        if let Err(err) = run_source(&mut vm, input, disassemble) {
            eprintln!("{}", err);
        }
    }
    Ok(())
}

fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<InterpretError>() {
        Some(InterpretError::Compile(_)) => 65,
        Some(InterpretError::Runtime { .. }) => 70,
        None => 74,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.trace);

    let config = VmConfig::new()
        .with_stack_size(cli.stack_size)
        .with_max_frames(cli.max_frames);

    let result = match &cli.file {
        Some(path) => run_file(path, config, cli.disassemble),
        None => repl(config, cli.disassemble),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{:#}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}
