use std::path::PathBuf;

use crate::diagnostic::Diagnostic;

/// Lexical and syntax diagnostics for one file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", list_diagnostics(path, diagnostics))]
pub struct ParseError {
    pub path: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// One `path:line:column: message` line per diagnostic.
fn list_diagnostics(path: &str, diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| format!("{path}:{d}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Errors from the schema linker.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("{file}: \"{name}\" is already defined")]
    DuplicateSymbol { file: String, name: String },

    #[error("{file}: \"{type_name}\" is not defined (referenced by {referenced_by})")]
    UndefinedType {
        file: String,
        type_name: String,
        referenced_by: String,
    },

    #[error("{file}: \"{type_name}\" referenced by {referenced_by} is not a message type")]
    NotAMessage {
        file: String,
        type_name: String,
        referenced_by: String,
    },

    #[error("{file}: field number {number} of {field} {reason}")]
    InvalidFieldNumber {
        file: String,
        field: String,
        number: i32,
        reason: &'static str,
    },

    #[error("{file}: field number {number} is used by both {first} and {second}")]
    DuplicateFieldNumber {
        file: String,
        number: i32,
        first: String,
        second: String,
    },

    #[error("{file}: duplicate field name \"{field_name}\" in {message}")]
    DuplicateFieldName {
        file: String,
        message: String,
        field_name: String,
    },

    #[error("{file}: the first value of proto3 enum {name} must be zero")]
    EnumFirstValueNotZero { file: String, name: String },

    #[error("{file}: enum {name} has no values")]
    EmptyEnum { file: String, name: String },

    #[error("{file}: {message}")]
    Invalid { file: String, message: String },

    #[error("{file}: dependency \"{dependency}\" was not linked")]
    UnlinkedDependency { file: String, dependency: String },
}

/// Errors raised by a backend while emitting code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("output \"{0}\" was generated twice")]
    DuplicateOutput(String),

    #[error("{target}: unsupported parameter \"{parameter}\"")]
    InvalidParameter { target: String, parameter: String },

    #[error("{target}: {message}")]
    Failed { target: String, message: String },
}

/// Top-level error returned by [`Compiler::compile`](crate::Compiler::compile).
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("{importer}: import \"{path}\" was not found")]
    MissingDependency { importer: String, path: String },

    #[error("circular import of \"{path}\" ({})", chain.join(" -> "))]
    CircularDependency { path: String, chain: Vec<String> },

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("unknown target \"{0}\"")]
    UnknownTarget(String),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result type alias for compile operations.
pub type Result<T> = std::result::Result<T, CompileError>;
