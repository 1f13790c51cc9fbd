//! # Parse Errors
//!
//! Every structured-grammar failure carries an [`ErrorCode`] and a byte offset.
//! The code drives the fallback decisions of [`crate::factory::ExpressionFactory`]:
//! only [`ErrorCode::UndefinedToken`] lets the factory try another dialect.

use thiserror::Error;

use crate::tokenizer::LexError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, strum::AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    UndefinedToken,
    UndefinedOperator,
    IllegalIfArgument,
    MissingDoStatement,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    /// A token that cannot start or continue an expression here
    #[error("Unexpected token '{found}' at position {position}")]
    UnexpectedToken { found: String, position: usize },
    #[error("Unexpected end of expression at position {position}")]
    UnexpectedEnd { position: usize },
    /// Two operands with no operator between them
    #[error("Undefined operator '{found}' at position {position}")]
    UndefinedOperator { found: String, position: usize },
    #[error("Illegal IF argument '{found}' at position {position}")]
    IllegalIfArgument { found: String, position: usize },
    #[error("Missing DO statement at position {position}")]
    MissingDoStatement { position: usize },
}

impl ParseError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ParseError::Lex(_) | ParseError::UnexpectedToken { .. } | ParseError::UnexpectedEnd { .. } => {
                ErrorCode::UndefinedToken
            }
            ParseError::UndefinedOperator { .. } => ErrorCode::UndefinedOperator,
            ParseError::IllegalIfArgument { .. } => ErrorCode::IllegalIfArgument,
            ParseError::MissingDoStatement { .. } => ErrorCode::MissingDoStatement,
        }
    }

    pub fn position(&self) -> usize {
        match self {
            ParseError::Lex(e) => e.position(),
            ParseError::UnexpectedToken { position, .. }
            | ParseError::UnexpectedEnd { position }
            | ParseError::UndefinedOperator { position, .. }
            | ParseError::IllegalIfArgument { position, .. }
            | ParseError::MissingDoStatement { position } => *position,
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;
