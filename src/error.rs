use std::fmt;

use thiserror::Error;

use crate::analyzer::ParseError;
use crate::compiler::CompileError;
use crate::config::ConfigError;
use crate::eval::EvaluationError;
use crate::snippet::SnippetError;
use crate::tokenizer::LexError;

/// Where an expression came from, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// Document-level origin, e.g. `menu.xml:12`
    pub origin: Option<String>,
    /// Byte offset inside the expression text
    pub position: usize,
}

impl SourceLocation {
    pub fn new(origin: Option<String>, position: usize) -> Self {
        Self { origin, position }
    }

    pub fn at(&self, position: usize) -> Self {
        Self {
            origin: self.origin.clone(),
            position,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            Some(origin) => write!(f, "{} (position {})", origin, self.position),
            None => write!(f, "position {}", self.position),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Lex error: {0}")]
    Lex(#[from] LexError),
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),
    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),
    #[error("Snippet error: {0}")]
    Snippet(#[from] SnippetError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    /// No dialect accepted the text
    #[error("Invalid expression '{text}' at {location}: {source}")]
    InvalidExpression {
        text: String,
        location: SourceLocation,
        #[source]
        source: ParseError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
