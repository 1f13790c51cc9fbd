//! # Tokenizer
//!
//! Turns expression text into [`Token`]s.
//!
//! Recognition order at each position, after skipping whitespace:
//!
//! 1. literals (`"text"`, `'text'`, `12`, `1.5`, `true`, `false`, `null`)
//! 2. generator references (`::name`, `Owner::name`)
//! 3. references (`#name`, `Owner#name`, owners may contain dots)
//! 4. keywords `IF`, `DO`, `ELSE` as whole words
//! 5. operators, longest match first
//! 6. parentheses
//!
//! A reference may carry a parenthesized argument list. Each argument is lexed on its
//! own: a lone literal or reference becomes that token, anything else becomes
//! [`Token::Raw`] and is handed to the snippet compiler later.
//!
//! Anything unrecognized yields [`LexError::UndefinedToken`] with the byte offset.

pub mod chars;
pub mod keyword;
pub mod literal;
pub mod symbol;
pub mod token;

pub use chars::CharStream;
pub use keyword::Keyword;
pub use literal::Literal;
pub use symbol::{Operator, Punctuation};
pub use token::{LexError, LexResult, Lexer, ReferenceToken, Token, TokenSpan};
