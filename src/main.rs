// ABOUTME: Interactive shell over the compile-then-execute engine

use clap::Parser;
use parenvm::config::{HELP_TEXT, PROMPT, VERSION, WELCOME_MESSAGE, WELCOME_SUBTITLE};
use parenvm::{Context, Logger, StdoutSink};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Lisp engine: reader, bytecode compiler, stack machine
#[derive(Parser, Debug)]
#[command(name = "parenvm")]
#[command(version = VERSION)]
#[command(about = "A small Lisp compiled to bytecode and run on a stack VM")]
struct CliArgs {
    /// Script file to execute (starts the shell when omitted)
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,

    /// Skip loading the bundled library
    #[arg(long = "no-stdlib")]
    no_stdlib: bool,

    /// Print compiled instructions for each expression
    #[arg(long = "log-comp")]
    log_comp: bool,

    /// Trace every executed instruction
    #[arg(long = "log-exec")]
    log_exec: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = CliArgs::parse();

    let mut logger = Logger::new(Box::new(StdoutSink));
    logger.instructions = args.log_comp;
    logger.stack = args.log_exec;

    let ctx = match Context::new(!args.no_stdlib, logger) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("failed to start: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match &args.script {
        Some(path) => run_script(&ctx, path),
        None => run_repl(&ctx, args.log_exec),
    }
}

fn run_script(ctx: &Context, path: &PathBuf) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("cannot read {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
    };
    match ctx.compile_and_execute(&source) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_repl(ctx: &Context, log_exec: bool) -> ExitCode {
    println!("{} {}", WELCOME_MESSAGE, VERSION);
    println!("{}", WELCOME_SUBTITLE);
    println!("type ,help for shell commands");

    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("cannot start line editor: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut show_time = false;
    let mut exec_tracing = log_exec;

    loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(trimmed);

                if let Some(command) = trimmed.strip_prefix(',') {
                    match command {
                        "exit" => return ExitCode::SUCCESS,
                        "help" => println!("{}", HELP_TEXT),
                        "logcomp" => {
                            let mut logger = ctx.logger_mut();
                            logger.instructions = !logger.instructions;
                            println!(
                                "compilation logging {}",
                                if logger.instructions { "on" } else { "off" }
                            );
                        }
                        "logexec" => {
                            exec_tracing = !exec_tracing;
                            let mut logger = ctx.logger_mut();
                            logger.stack = exec_tracing;
                            println!(
                                "execution tracing {}",
                                if exec_tracing { "on" } else { "off" }
                            );
                        }
                        "time" => {
                            show_time = !show_time;
                            println!("timing {}", if show_time { "on" } else { "off" });
                        }
                        other => println!("unknown command ,{} (try ,help)", other),
                    }
                    continue;
                }

                match ctx.compile_and_execute(&line) {
                    Ok(outcomes) => {
                        for outcome in outcomes {
                            println!("{}", outcome.value);
                            if show_time {
                                println!("  elapsed: {:?}", outcome.elapsed);
                            }
                        }
                    }
                    Err(e) => eprintln!("{}", e),
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => return ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("readline error: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }
}
