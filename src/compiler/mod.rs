//! # Reference Compiler
//!
//! Turns a [`SyntaxNode`] tree into an [`InvocableNode`] tree bound to operations
//! of an [`OperationCatalog`].
//!
//! Every type rule is checked here, once, so evaluation never re-validates:
//!
//! * a node's declared return type must be assignable to what its parent expects
//!   (numbers convert, `Any` matches everything, anything stringifies into `String`)
//! * `AND`, `OR` and `IF` predicates must produce `Bool`
//! * for `left -> right` the right side must still have an open parameter, and the
//!   left result must fit its first one; a `List` result is spread over several
//!   open parameters
//! * explicit arguments bind to the leading visible parameters; extra arguments are
//!   only accepted by a variadic operation

pub mod error;
pub mod node;

pub use error::{CompileError, CompileResult};
pub use node::{Call, InvocableNode, SnippetNode};

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    analyzer::SyntaxNode,
    cache::ReferenceCache,
    catalog::{Arguments, Namespace, OperationCatalog, ReferenceKind},
    error::SourceLocation,
    snippet::SnippetCompiler,
    tokenizer::{Literal, Operator, ReferenceToken, Token},
    types::{Value, ValueType},
};

pub struct ReferenceCompiler<'c> {
    catalog: &'c OperationCatalog,
    snippets: Option<&'c SnippetCompiler>,
    origin: Option<String>,
}

impl<'c> ReferenceCompiler<'c> {
    pub fn new(catalog: &'c OperationCatalog) -> Self {
        Self {
            catalog,
            snippets: None,
            origin: None,
        }
    }

    /// Enables raw arguments, which are compiled as snippets.
    pub fn with_snippets(mut self, snippets: &'c SnippetCompiler) -> Self {
        self.snippets = Some(snippets);
        self
    }

    /// Document-level origin used in error locations.
    pub fn with_origin(mut self, origin: Option<String>) -> Self {
        self.origin = origin;
        self
    }

    fn location(&self, position: usize) -> SourceLocation {
        SourceLocation::new(self.origin.clone(), position)
    }

    /// Compiles `node` and checks its result against `expected`.
    #[tracing::instrument(level = "debug", skip(self, node, namespace))]
    pub fn compile(
        &self,
        node: &SyntaxNode,
        namespace: &Namespace,
        expected: &ValueType,
    ) -> CompileResult<InvocableNode> {
        let compiled = self.compile_node(node, namespace, expected)?;
        self.check_type(&compiled.returns(), expected, node.position())?;
        Ok(compiled)
    }

    fn check_type(&self, found: &ValueType, expected: &ValueType, position: usize) -> CompileResult<()> {
        if found.is_convertible_to(expected) {
            Ok(())
        } else {
            Err(CompileError::TypeMismatch {
                expected: expected.clone(),
                found: found.clone(),
                location: self.location(position),
            })
        }
    }

    fn compile_node(
        &self,
        node: &SyntaxNode,
        namespace: &Namespace,
        expected: &ValueType,
    ) -> CompileResult<InvocableNode> {
        match node {
            SyntaxNode::Leaf { token, position } => {
                self.compile_token(token, namespace, expected, *position)
            }
            SyntaxNode::Binary {
                left,
                right,
                operator,
                position,
            } => self.compile_binary(left, right, *operator, *position, namespace, expected),
            SyntaxNode::Conditional {
                predicate,
                do_branch,
                else_branch,
                position,
            } => {
                let predicate = self.compile(predicate, namespace, &ValueType::Bool)?;
                let do_node = self.compile(do_branch, namespace, expected)?;
                let returns = do_node.returns();
                let else_node = match else_branch {
                    Some(else_branch) => {
                        let else_node = self.compile(else_branch, namespace, expected)?;
                        let else_type = else_node.returns();
                        if !else_type.is_assignable_to(&returns) && !returns.is_assignable_to(&else_type) {
                            return Err(CompileError::TypeMismatch {
                                expected: returns,
                                found: else_type,
                                location: self.location(else_branch.position()),
                            });
                        }
                        Some(Box::new(else_node))
                    }
                    None => None,
                };
                debug!("compiled IF at {}", position);
                Ok(InvocableNode::If {
                    predicate: Box::new(predicate),
                    do_node: Box::new(do_node),
                    else_node,
                    returns,
                })
            }
        }
    }

    fn compile_binary(
        &self,
        left: &SyntaxNode,
        right: &SyntaxNode,
        operator: Operator,
        position: usize,
        namespace: &Namespace,
        expected: &ValueType,
    ) -> CompileResult<InvocableNode> {
        match operator {
            Operator::Chain => {
                let right = self.compile(right, namespace, expected)?;
                let open = right.open_params();
                let Some(first) = open.first() else {
                    return Err(CompileError::NothingToChain {
                        location: self.location(position),
                    });
                };
                let left_node = self.compile_node(left, namespace, &ValueType::Any)?;
                let left_type = left_node.returns();
                let spread = left_type == ValueType::List
                    && (open.len() > 1 || !matches!(first, ValueType::List | ValueType::Any));
                if !spread && !left_type.is_assignable_to(first) {
                    return Err(CompileError::TypeMismatch {
                        expected: first.clone(),
                        found: left_type,
                        location: self.location(left.position()),
                    });
                }
                Ok(InvocableNode::Chain {
                    left: Box::new(left_node),
                    right: Box::new(right),
                    spread,
                })
            }
            Operator::Parallel => Ok(InvocableNode::Parallel {
                left: Box::new(self.compile_node(left, namespace, expected)?),
                right: Box::new(self.compile(right, namespace, &ValueType::Any)?),
            }),
            Operator::Tuple => {
                let mut elements = Vec::new();
                for element in flatten_tuple(left).into_iter().chain(flatten_tuple(right)) {
                    elements.push(self.compile(element, namespace, &ValueType::Any)?);
                }
                Ok(InvocableNode::Tuple(elements))
            }
            Operator::And | Operator::Or => Ok(InvocableNode::BoolOp {
                left: Box::new(self.compile(left, namespace, &ValueType::Bool)?),
                right: Box::new(self.compile(right, namespace, &ValueType::Bool)?),
                operator,
            }),
            _ => Ok(InvocableNode::Compare {
                left: Box::new(self.compile_operand(left, namespace)?),
                right: Box::new(self.compile_operand(right, namespace)?),
                operator,
            }),
        }
    }

    fn compile_operand(&self, node: &SyntaxNode, namespace: &Namespace) -> CompileResult<InvocableNode> {
        let compiled = self.compile(node, namespace, &ValueType::Any)?;
        if compiled.returns() == ValueType::Void {
            return Err(CompileError::NoValue {
                location: self.location(node.position()),
            });
        }
        Ok(compiled)
    }

    fn compile_token(
        &self,
        token: &Token,
        namespace: &Namespace,
        expected: &ValueType,
        position: usize,
    ) -> CompileResult<InvocableNode> {
        match token {
            Token::Value(literal) => self.compile_literal(literal, expected, position),
            Token::Reference(reference) => {
                self.compile_call(reference, ReferenceKind::Reference, namespace, position)
            }
            Token::Generator(reference) => {
                self.compile_call(reference, ReferenceKind::Generator, namespace, position)
            }
            Token::Raw(text) => self.compile_raw(text, namespace, expected, position),
            other => Err(CompileError::TypeMismatch {
                expected: expected.clone(),
                found: ValueType::named(other.to_string()),
                location: self.location(position),
            }),
        }
    }

    /// Literals are converted to the expected type up front.
    fn compile_literal(
        &self,
        literal: &Literal,
        expected: &ValueType,
        position: usize,
    ) -> CompileResult<InvocableNode> {
        let ty = literal.value_type();
        self.check_type(&ty, expected, position)?;
        let (value, ty) = match expected {
            ValueType::Any | ValueType::Void => (literal.to_value(), ty),
            target => {
                let value = literal
                    .to_value()
                    .convert(target)
                    .map_err(|e| CompileError::TypeMismatch {
                        expected: e.expected,
                        found: e.found,
                        location: self.location(position),
                    })?;
                (value, target.clone())
            }
        };
        Ok(InvocableNode::Constant { value, ty })
    }

    fn compile_raw(
        &self,
        text: &str,
        namespace: &Namespace,
        expected: &ValueType,
        position: usize,
    ) -> CompileResult<InvocableNode> {
        let snippets = self.snippets.ok_or_else(|| CompileError::SnippetUnavailable {
            text: text.to_string(),
            location: self.location(position),
        })?;
        let unit = snippets.compile(text, self.catalog, namespace)?;
        Ok(InvocableNode::Snippet(Box::new(SnippetNode {
            unit,
            returns: expected.clone(),
            location: self.location(position),
        })))
    }

    fn compile_call(
        &self,
        reference: &ReferenceToken,
        kind: ReferenceKind,
        namespace: &Namespace,
        position: usize,
    ) -> CompileResult<InvocableNode> {
        let sigil = match kind {
            ReferenceKind::Reference => "#",
            ReferenceKind::Generator => "::",
        };
        let name = reference.qualified_name(sigil);
        let mut candidates = self.catalog.candidates(reference, kind, namespace);
        let operation = match candidates.len() {
            0 => {
                return Err(CompileError::UnknownReference {
                    reference: name,
                    location: self.location(position),
                })
            }
            1 => candidates.remove(0),
            n => {
                return Err(CompileError::AmbiguousReference {
                    reference: name,
                    candidates: n,
                    location: self.location(position),
                })
            }
        };

        if operation.is_placeholder() {
            warn!(
                "{} at {} is a placeholder and fails when evaluated",
                name,
                self.location(position)
            );
        }

        let visible: Vec<ValueType> = operation.visible_params().map(|p| p.ty.clone()).collect();
        let fixed = if operation.is_variadic() {
            visible.len() - 1
        } else {
            visible.len()
        };
        let found = reference.args.len();
        let arity_ok = match kind {
            ReferenceKind::Generator => found == visible.len() || (operation.is_variadic() && found >= fixed),
            ReferenceKind::Reference => found <= fixed || operation.is_variadic(),
        };
        if !arity_ok {
            return Err(CompileError::ArgumentMismatch {
                reference: name,
                expected: fixed,
                found,
                location: self.location(position),
            });
        }

        let mut args = Vec::with_capacity(found);
        for (index, token) in reference.args.iter().enumerate() {
            let ty = visible.get(index.min(visible.len().saturating_sub(1)))
                .cloned()
                .unwrap_or(ValueType::Any);
            let arg = self.compile_token(token, namespace, &ty, position)?;
            self.check_type(&arg.returns(), &ty, position)?;
            args.push(arg);
        }

        let generated = if kind == ReferenceKind::Generator && args.iter().all(InvocableNode::is_constant) {
            let values = args
                .iter()
                .filter_map(|arg| match arg {
                    InvocableNode::Constant { value, .. } => Some(value.clone()),
                    _ => None,
                })
                .collect::<Vec<Value>>();
            let generated = operation
                .generate(&Arguments::new(values))
                .map_err(|e| CompileError::Generator {
                    reference: name.clone(),
                    message: e.to_string(),
                    location: self.location(position),
                })?;
            Some(generated)
        } else {
            None
        };

        debug!("bound {} to {}", name, operation.qualified_name());
        Ok(InvocableNode::Call(Box::new(Call {
            cache: ReferenceCache::new(operation.caching()),
            operation: Arc::clone(&operation),
            reference: name,
            args,
            generated,
            location: self.location(position),
        })))
    }
}

/// Collects the operands of nested `,` nodes in source order.
fn flatten_tuple(node: &SyntaxNode) -> Vec<&SyntaxNode> {
    match node {
        SyntaxNode::Binary {
            left,
            right,
            operator: Operator::Tuple,
            ..
        } => {
            let mut elements = flatten_tuple(left);
            elements.extend(flatten_tuple(right));
            elements
        }
        other => vec![other],
    }
}
