// ABOUTME: Error types for the reader, compiler, and virtual machine

use thiserror::Error;

/// Errors raised while reading source text into expressions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected '{0}'")]
    UnexpectedClose(char),

    #[error("unquote outside backquote")]
    UnquoteOutsideBackquote,

    #[error("unknown package prefix '{0}'")]
    UnknownPackage(String),

    #[error("map literal requires an even number of forms")]
    OddMapLiteral,

    #[error("dotted list inside backquote")]
    DottedBackquote,

    #[error("malformed dotted list")]
    BadDot,

    #[error("{0}")]
    Malformed(String),
}

/// Errors raised while translating expressions to instructions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("{form}: expected {expected} argument(s), got {actual}")]
    SpecialFormArity {
        form: String,
        expected: String,
        actual: usize,
    },

    #[error("invalid lambda parameter list: {0}")]
    InvalidParameterList(String),

    #[error("unresolved jump label '{0}'")]
    UnresolvedLabel(String),

    #[error("set!: target must be a symbol, got {0}")]
    InvalidSetTarget(String),

    #[error("call head is not callable: {0}")]
    NotCallable(String),

    #[error("macro {name}: {message}")]
    MacroExpansion { name: String, message: String },

    #[error("defmacro: name must be a symbol, got {0}")]
    InvalidMacroName(String),
}

/// Errors raised by the environment and the executing machine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LangError {
    #[error("invalid variable coordinates ({frame}, {slot})")]
    InvalidVarPos { frame: usize, slot: usize },

    #[error("evaluation stack underflow")]
    StackUnderflow,

    #[error("runaway opcodes: no RETURN before end of code block")]
    RunawayCode,

    #[error("invalid jump destination {0}")]
    BadJumpTarget(i64),

    #[error("cannot call non-closure value {0}")]
    NotAClosure(String),

    #[error("return without a return address on the stack")]
    ReturnWithoutAddress,

    #[error("wrong number of arguments: expected {expected}, got {actual}")]
    WrongArgCount { expected: String, actual: usize },

    #[error("invalid code handle {0}")]
    InvalidCodeHandle(usize),

    #[error("unknown primitive '{0}'")]
    UnknownPrimitive(String),

    #[error("{function}: expected {expected}, got {actual} at argument {position}")]
    TypeMismatch {
        function: String,
        expected: String,
        actual: String,
        position: usize,
    },

    #[error("{function}: expected {expected} argument{}, got {actual}", if *.expected == "1" { "" } else { "s" })]
    ArityError {
        function: String,
        expected: String,
        actual: usize,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("{function}: index {index} out of bounds (length {length})")]
    IndexOutOfBounds {
        function: String,
        index: usize,
        length: usize,
    },
}

/// Errors raised explicitly from user code via `(error …)`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("{0}")]
    Raised(String),
}

/// Errors raised by the host-interop primitives.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InteropError {
    #[error("no such member '{0}'")]
    MissingMember(String),

    #[error("{function}: host call expected {expected} argument(s), got {actual}")]
    Arity {
        function: String,
        expected: String,
        actual: usize,
    },

    #[error("host reflection failure: {0}")]
    Reflection(String),
}

/// Umbrella error covering every stage of the pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("language error: {0}")]
    Lang(#[from] LangError),

    #[error("error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("interop error: {0}")]
    Interop(#[from] InteropError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl LangError {
    /// Create a type mismatch error with full context
    pub fn type_error(
        function: &str,
        expected: &str,
        actual: &crate::value::Val,
        position: usize,
    ) -> Self {
        LangError::TypeMismatch {
            function: function.to_string(),
            expected: expected.to_string(),
            actual: actual.type_name().to_string(),
            position,
        }
    }

    /// Create an arity error with expected and actual counts
    pub fn arity_error(function: &str, expected: impl Into<String>, actual: usize) -> Self {
        LangError::ArityError {
            function: function.to_string(),
            expected: expected.into(),
            actual,
        }
    }
}
