use thiserror::Error;

use crate::{error::SourceLocation, snippet::SnippetError, types::ValueType};

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Unknown reference {reference} at {location}")]
    UnknownReference {
        reference: String,
        location: SourceLocation,
    },
    #[error("Ambiguous reference {reference} at {location}: {candidates} candidates")]
    AmbiguousReference {
        reference: String,
        candidates: usize,
        location: SourceLocation,
    },
    #[error("Reference {reference} accepts {expected} argument(s), {found} given at {location}")]
    ArgumentMismatch {
        reference: String,
        expected: usize,
        found: usize,
        location: SourceLocation,
    },
    #[error("Type mismatch at {location}: expected {expected}, found {found}")]
    TypeMismatch {
        expected: ValueType,
        found: ValueType,
        location: SourceLocation,
    },
    /// An operand of a comparison returns nothing
    #[error("Operand at {location} returns no value")]
    NoValue { location: SourceLocation },
    /// The right side of `->` has no parameter left to receive the piped value
    #[error("Nothing to chain into at {location}")]
    NothingToChain { location: SourceLocation },
    #[error("Generator {reference} failed at {location}: {message}")]
    Generator {
        reference: String,
        message: String,
        location: SourceLocation,
    },
    #[error("Raw argument '{text}' at {location} needs a snippet compiler")]
    SnippetUnavailable {
        text: String,
        location: SourceLocation,
    },
    #[error(transparent)]
    Snippet(#[from] SnippetError),
}

pub type CompileResult<T> = Result<T, CompileError>;
