//! # botexpr: Expression Engine for Chat-Bot Documents
//!
//! botexpr compiles the short expressions a bot author writes into a declarative
//! document (`#isCommand -> #reply`, `IF #hasName DO #greet ELSE #ask`) into
//! deferred computations that run once per incoming chat event.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Text → Tokenizer → Parser → Reference Compiler → GeneratedValue → generate(pool)
//! ```
//!
//! ### Stage 1: Tokenization
//!
//! The [`tokenizer`] module walks a [`tokenizer::CharStream`] and produces literals,
//! `#references`, `::generators`, operators, the `IF`/`DO`/`ELSE` keywords and raw
//! snippet spans.
//!
//! ### Stage 2: Parsing
//!
//! The [`analyzer`] module builds a [`analyzer::SyntaxNode`] tree by precedence
//! climbing, with a dedicated rule for `IF ... DO ... ELSE ...`.
//!
//! ### Stage 3: Compilation
//!
//! The [`compiler`] module binds every reference to an operation of the
//! [`catalog`] and checks all types once, producing an
//! [`compiler::InvocableNode`] tree.
//!
//! ### Stage 4: Evaluation
//!
//! The [`eval`] module wraps the tree in a [`eval::GeneratedValue`]. Each call to
//! `generate` receives a [`eval::ResourcePool`] holding the per-event objects
//! (the event, the controller, the session memory). Per-reference results may be
//! memoized per event by the [`cache`].
//!
//! ## Fallbacks
//!
//! The [`factory`] is the only entry point most callers need. When the structured
//! grammar rejects a text, it tries string interpolation (`Hello ${#name}!`), host
//! snippets compiled by [`snippet`] (`${#count * 2 + 1}`), and bare literals.

pub mod analyzer;
pub mod cache;
pub mod catalog;
pub mod compiler;
pub mod config;
pub mod error;
pub mod eval;
pub mod factory;
pub mod memory;
pub mod snippet;
pub mod tokenizer;
pub mod types;

// Re-exports
pub use catalog::{Namespace, Operation, OperationCatalog, Provider};
pub use config::EngineConfig;
pub use error::*;
pub use eval::{GeneratedValue, ResourcePool};
pub use factory::ExpressionFactory;
pub use types::{FromValue, Resource, Value, ValueType};
