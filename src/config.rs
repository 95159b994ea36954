// ABOUTME: Version and REPL banner constants

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const WELCOME_MESSAGE: &str = "parenvm";
pub const WELCOME_SUBTITLE: &str = "a small Lisp compiled to bytecode on a stack machine";
pub const PROMPT: &str = "pvm> ";

pub const HELP_TEXT: &str = r#"
Commands:
  ,exit      - leave the shell
  ,help      - show this help
  ,logcomp   - toggle printing compiled instructions
  ,logexec   - toggle per-instruction execution tracing
  ,time      - toggle evaluation timing

Anything else is parsed as expressions. Multi-line input is fine: the
reader waits until the form is complete.
"#;
