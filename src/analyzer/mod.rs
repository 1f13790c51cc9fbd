//! # Analyzer
//!
//! Builds a [`SyntaxNode`] tree from tokens.
//!
//! Operator binding, weakest first:
//!
//! | operator | precedence |
//! |----------|-----------:|
//! | `;`      | 1 |
//! | `,`      | 2 |
//! | `OR`     | 4 |
//! | `AND`    | 5 |
//! | `<` `<=` `>` `>=` | 6 |
//! | `==` `!=` | 7 |
//! | `->`     | 11 |
//!
//! `IF p DO d ELSE e` is parsed by a dedicated rule. Its operands must start with a
//! literal, a reference, a parenthesized group or another `IF`.

pub mod core;
pub mod node;
pub mod parser;

pub use self::core::{ErrorCode, ParseError, ParseResult};
pub use node::SyntaxNode;
pub use parser::{parse, Parser};
