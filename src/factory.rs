//! # Expression Factory
//!
//! The single entry point from configuration text to a [`GeneratedValue`].
//!
//! Text is tried against each dialect in turn:
//!
//! 1. the structured reference grammar (`#a -> #b`, `IF ... DO ... ELSE ...`)
//! 2. for `String` targets, interpolation of literal text with `${...}` runs
//! 3. a whole-text `${...}` block as a host snippet
//! 4. a bare numeric or boolean literal
//!
//! Only an undefined-token failure of the structured grammar lets later dialects
//! run; any other grammar error is reported as is. Results that cannot change
//! between evaluations are folded into constants when they are created.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::{
    analyzer::{self, ErrorCode, ParseError},
    catalog::{Namespace, OperationCatalog},
    compiler::{InvocableNode, ReferenceCompiler, SnippetNode},
    config::EngineConfig,
    error::{Error, Result, SourceLocation},
    eval::{EvaluationError, GeneratedValue, ResourcePool, Scope},
    snippet::SnippetCompiler,
    types::{FromValue, Value, ValueType},
};

/// A piece of interpolated text.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    /// Body of a `${...}` run, and its byte offset in the whole text
    Expression { body: String, position: usize },
}

/// Splits `text` into literal runs and `${...}` runs.
///
/// `escape` makes the following character literal. Braces inside a run nest and
/// quoted strings inside a run are skipped. Returns `None` for an unterminated run.
pub fn split_interpolation(text: &str, escape: char) -> Option<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = text.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        if c == escape {
            if let Some((_, next)) = chars.next() {
                literal.push(next);
            } else {
                literal.push(c);
            }
            continue;
        }
        if c != '$' || !matches!(chars.peek(), Some((_, '{'))) {
            literal.push(c);
            continue;
        }
        chars.next();

        let start = offset + 2;
        let mut depth = 1;
        let mut quote: Option<char> = None;
        let mut end = None;
        for (index, c) in chars.by_ref() {
            match quote {
                Some(q) if c == q => quote = None,
                Some(_) => {}
                None => match c {
                    '"' | '\'' => quote = Some(c),
                    '{' => depth += 1,
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            end = Some(index);
                            break;
                        }
                    }
                    _ => {}
                },
            }
        }
        let end = end?;
        if !literal.is_empty() {
            segments.push(Segment::Text(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Expression {
            body: text[start..end].to_string(),
            position: start,
        });
    }
    if !literal.is_empty() || segments.is_empty() {
        segments.push(Segment::Text(literal));
    }
    Some(segments)
}

/// Parses a literal the structured grammar did not accept, e.g. `+3`, `1e3` or `TRUE`.
fn bare_literal(text: &str) -> Option<Value> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("true") {
        return Some(Value::Bool(true));
    }
    if text.eq_ignore_ascii_case("false") {
        return Some(Value::Bool(false));
    }
    if let Ok(long) = text.parse::<i64>() {
        return Some(Value::Long(long));
    }
    text.parse::<f64>().ok().map(Value::Double)
}

enum Part {
    Text(String),
    Node(InvocableNode),
}

pub struct ExpressionFactory {
    catalog: Arc<OperationCatalog>,
    snippets: SnippetCompiler,
    config: EngineConfig,
}

impl ExpressionFactory {
    pub fn new(catalog: Arc<OperationCatalog>, config: EngineConfig) -> Self {
        let snippets = SnippetCompiler::new(&config.snippet);
        Self {
            catalog,
            snippets,
            config,
        }
    }

    pub fn catalog(&self) -> &OperationCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn snippets(&self) -> &SnippetCompiler {
        &self.snippets
    }

    pub fn create<T: FromValue>(&self, text: &str, namespace: &Namespace) -> Result<GeneratedValue<T>> {
        Ok(self.create_at(text, T::value_type(), namespace, None)?.retype())
    }

    pub fn create_value(
        &self,
        text: &str,
        expected: ValueType,
        namespace: &Namespace,
    ) -> Result<GeneratedValue<Value>> {
        self.create_at(text, expected, namespace, None)
    }

    /// Like [`Self::create_value`], with a document-level origin for diagnostics.
    #[tracing::instrument(level = "debug", skip(self, namespace))]
    pub fn create_at(
        &self,
        text: &str,
        expected: ValueType,
        namespace: &Namespace,
        origin: Option<String>,
    ) -> Result<GeneratedValue<Value>> {
        let compiler = ReferenceCompiler::new(&self.catalog)
            .with_snippets(&self.snippets)
            .with_origin(origin.clone());
        let location = SourceLocation::new(origin, 0);

        let error = match analyzer::parse(text) {
            Ok(tree) => {
                let node = compiler.compile(&tree, namespace, &expected)?;
                return self.finish(node, expected);
            }
            Err(error) => error,
        };
        debug!("Structured grammar rejected '{}': {}", text, error);

        if expected == ValueType::String {
            if let Some(segments) = split_interpolation(text, self.config.interpolation.escape_char) {
                return self.interpolate(&compiler, segments, namespace, &location);
            }
        }

        if error.code() != ErrorCode::UndefinedToken {
            return Err(invalid(text, &location, error));
        }

        if let Some(body) = whole_block(text, self.config.interpolation.escape_char) {
            trace!("Compiling '{}' as a snippet", body);
            let node = self.snippet(body, namespace, &expected, location.at(2))?;
            return self.finish(node, expected);
        }

        if let Some(value) = bare_literal(text) {
            let value = value.convert(&expected).map_err(EvaluationError::from)?;
            return Ok(GeneratedValue::constant(value));
        }

        Err(invalid(text, &location, error))
    }

    fn snippet(
        &self,
        body: &str,
        namespace: &Namespace,
        expected: &ValueType,
        location: SourceLocation,
    ) -> Result<InvocableNode> {
        let unit = self.snippets.compile(body, &self.catalog, namespace)?;
        if unit.is_pure() {
            let value = unit
                .evaluate(&ResourcePool::new(), &location)?
                .convert(expected)
                .map_err(EvaluationError::from)?;
            return Ok(InvocableNode::Constant {
                value,
                ty: expected.clone(),
            });
        }
        Ok(InvocableNode::Snippet(Box::new(SnippetNode {
            unit,
            returns: expected.clone(),
            location,
        })))
    }

    /// A `${...}` run: structured grammar first, snippet on an undefined token.
    fn segment(
        &self,
        compiler: &ReferenceCompiler,
        body: &str,
        namespace: &Namespace,
        location: SourceLocation,
    ) -> Result<InvocableNode> {
        match analyzer::parse(body) {
            Ok(tree) => Ok(compiler.compile(&tree, namespace, &ValueType::String)?),
            Err(error) if error.code() == ErrorCode::UndefinedToken => {
                self.snippet(body, namespace, &ValueType::String, location)
            }
            Err(error) => Err(invalid(body, &location, error)),
        }
    }

    fn interpolate(
        &self,
        compiler: &ReferenceCompiler,
        segments: Vec<Segment>,
        namespace: &Namespace,
        location: &SourceLocation,
    ) -> Result<GeneratedValue<Value>> {
        let mut parts = Vec::with_capacity(segments.len());
        for segment in segments {
            match segment {
                Segment::Text(text) => parts.push(Part::Text(text)),
                Segment::Expression { body, position } => {
                    match self.segment(compiler, &body, namespace, location.at(position))? {
                        InvocableNode::Constant { value, .. } => parts.push(Part::Text(value.to_string())),
                        node => parts.push(Part::Node(node)),
                    }
                }
            }
        }

        if parts.iter().all(|part| matches!(part, Part::Text(_))) {
            let folded: String = parts
                .into_iter()
                .filter_map(|part| match part {
                    Part::Text(text) => Some(text),
                    Part::Node(_) => None,
                })
                .collect();
            return Ok(GeneratedValue::constant(Value::String(folded)));
        }

        let parts = Arc::new(parts);
        Ok(GeneratedValue::dynamic(ValueType::String, move |pool| {
            let mut out = String::new();
            for part in parts.iter() {
                match part {
                    Part::Text(text) => out.push_str(text),
                    Part::Node(node) => {
                        let value = node.evaluate(&mut Scope::new(pool))?;
                        out.push_str(&value.to_string());
                    }
                }
            }
            Ok(Value::String(out))
        }))
    }

    fn finish(&self, node: InvocableNode, expected: ValueType) -> Result<GeneratedValue<Value>> {
        if let InvocableNode::Constant { value, .. } = node {
            let value = value.convert(&expected).map_err(EvaluationError::from)?;
            return Ok(GeneratedValue::constant(value));
        }
        let node = Arc::new(node);
        Ok(GeneratedValue::dynamic(expected.clone(), move |pool| {
            let value = node.evaluate(&mut Scope::new(pool))?;
            Ok(value.convert(&expected)?)
        }))
    }
}

/// The body of `text` when it is exactly one `${...}` block.
fn whole_block(text: &str, escape: char) -> Option<&str> {
    let trimmed = text.trim();
    match split_interpolation(trimmed, escape)?.as_slice() {
        [Segment::Expression { .. }] => trimmed.strip_prefix("${")?.strip_suffix('}'),
        _ => None,
    }
}

fn invalid(text: &str, location: &SourceLocation, source: ParseError) -> Error {
    Error::InvalidExpression {
        text: text.to_string(),
        location: location.at(source.position()),
        source,
    }
}
