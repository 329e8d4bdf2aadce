// ABOUTME: Error types for failures the loader and interpreter can't continue past

use thiserror::Error;
use std::path::PathBuf;

/// Failures from the module loader. These are internal to the loader's
/// filesystem walk; the driver converts each into a single fatal
/// `Diagnostic` at the boundary rather than letting it cross into the
/// phase pipeline directly.
#[derive(Error, Debug, Clone)]
pub enum LoaderError {
    #[error("module `{key}` not found; tried {tried:?}")]
    NotFound { key: String, tried: Vec<PathBuf> },

    #[error("cycle detected at {key}")]
    Cycle { key: String },

    #[error("failed to read {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("{path} is not valid UTF-8")]
    InvalidUtf8 { path: PathBuf },

    #[error("{key}: parsing failed")]
    ParseFailed { key: String },
}

/// A runtime error the interpreter can't continue past. Converted to a
/// `Diagnostic` of category `Runtime` at the point execution aborts.
#[derive(Error, Debug, Clone)]
pub enum RuntimeError {
    #[error("undefined variable `{0}`")]
    UndefinedVariable(String),

    #[error("field `{0}` not found")]
    MissingField(String),

    #[error("index {index} out of range for array of length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("loop step is zero")]
    ZeroStep,

    #[error("division by zero")]
    DivisionByZero,

    #[error("loop bound is not an integer")]
    NonIntegerBound,

    #[error("division by a non-numeric operand")]
    DivisionByNonNumeric,

    #[error("`main` must have signature main(argc: []i32, argv: []string): i32")]
    BadMainSignature,

    #[error("`main` returned a non-integer value")]
    NonIntegerMainReturn,

    #[error("no method `{method}` found on `{receiver}`")]
    MethodNotFound { receiver: String, method: String },

    #[error("cannot instantiate template class `{0}`")]
    TemplateInstantiation(String),

    #[error("no builder of arity {arity} on `{ty}`")]
    NoMatchingBuilder { ty: String, arity: usize },
}
