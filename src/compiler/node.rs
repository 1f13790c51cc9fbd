use std::{cmp::Ordering, sync::Arc};

use tracing::debug;

use crate::{
    cache::ReferenceCache,
    catalog::{Arguments, GeneratedReference, Invocation, Operation, ReferenceKind},
    error::SourceLocation,
    eval::{EvaluationError, EvaluationResult, Piped, Scope},
    snippet::CompiledSnippet,
    tokenizer::Operator,
    types::{FromValue, Value, ValueType},
};

/// One reference occurrence, with its own cache.
#[derive(Debug)]
pub struct Call {
    pub(crate) operation: Arc<Operation>,
    pub(crate) reference: String,
    pub(crate) args: Vec<InvocableNode>,
    /// Generated up front when every generator argument is a constant
    pub(crate) generated: Option<GeneratedReference>,
    pub(crate) cache: ReferenceCache,
    pub(crate) location: SourceLocation,
}

impl Call {
    pub fn operation(&self) -> &Arc<Operation> {
        &self.operation
    }

    pub fn cache(&self) -> &ReferenceCache {
        &self.cache
    }

    fn fixed_arity(&self) -> usize {
        let visible = self.operation.visible_params().count();
        if self.operation.is_variadic() {
            visible - 1
        } else {
            visible
        }
    }

    /// Parameter types still expected from piped input or the pool.
    pub fn open_params(&self) -> Vec<ValueType> {
        match self.operation.kind() {
            ReferenceKind::Generator => self.operation.generated_inputs().to_vec(),
            ReferenceKind::Reference => self
                .operation
                .visible_params()
                .take(self.fixed_arity())
                .skip(self.args.len())
                .map(|p| p.ty.clone())
                .collect(),
        }
    }

    fn failed(&self, source: crate::catalog::OperationError) -> EvaluationError {
        EvaluationError::Operation {
            reference: self.reference.clone(),
            location: self.location.clone(),
            source,
        }
    }

    fn evaluate(&self, scope: &mut Scope) -> EvaluationResult<Value> {
        let fingerprint = scope.pool().fingerprint();
        self.cache
            .get_or_compute(fingerprint, || self.compute(scope))
    }

    fn compute(&self, scope: &mut Scope) -> EvaluationResult<Value> {
        let explicit = self
            .args
            .iter()
            .map(|arg| arg.evaluate(scope))
            .collect::<EvaluationResult<Vec<_>>>()?;
        let open = scope.resolve_open(&self.reference, &self.open_params())?;
        debug!("invoking {}", self.reference);

        let value = match self.operation.kind() {
            ReferenceKind::Generator => {
                let generated = match &self.generated {
                    Some(generated) => generated.clone(),
                    None => self
                        .operation
                        .generate(&Arguments::new(explicit))
                        .map_err(|e| self.failed(e))?,
                };
                let invocation = Invocation {
                    args: Arguments::new(open),
                    pool: scope.pool(),
                };
                generated.call(&invocation).map_err(|e| self.failed(e))?
            }
            ReferenceKind::Reference => {
                let args = self.bind(scope, explicit, open)?;
                let invocation = Invocation {
                    args: Arguments::new(args),
                    pool: scope.pool(),
                };
                self.operation
                    .invoke(&invocation)
                    .map_err(|e| self.failed(e))?
            }
        };
        Ok(value.convert(self.operation.returns())?)
    }

    /// Lays out arguments in declared parameter order.
    fn bind(&self, scope: &Scope, explicit: Vec<Value>, open: Vec<Value>) -> EvaluationResult<Vec<Value>> {
        let fixed = self.fixed_arity();
        let mut explicit = explicit.into_iter();
        let mut open = open.into_iter();
        let mut visible_index = 0;
        let mut values = Vec::with_capacity(self.operation.params().len());

        for param in self.operation.params() {
            if param.hidden {
                values.push(scope.resolve_hidden(&self.reference, &param.ty)?);
                continue;
            }
            let value = if visible_index >= fixed {
                let rest = explicit
                    .by_ref()
                    .map(|v| v.convert(&param.ty))
                    .collect::<Result<Vec<_>, _>>()?;
                Value::List(rest)
            } else {
                match explicit.next().or_else(|| open.next()) {
                    Some(value) => value.convert(&param.ty)?,
                    None => {
                        return Err(EvaluationError::MissingResource {
                            reference: self.reference.clone(),
                            expected: param.ty.clone(),
                        })
                    }
                }
            };
            values.push(value);
            visible_index += 1;
        }
        Ok(values)
    }
}

#[derive(Debug)]
pub struct SnippetNode {
    pub(crate) unit: Arc<CompiledSnippet>,
    pub(crate) returns: ValueType,
    pub(crate) location: SourceLocation,
}

/// Executable counterpart of a [`crate::analyzer::SyntaxNode`].
#[derive(Debug)]
pub enum InvocableNode {
    Call(Box<Call>),
    Chain {
        left: Box<InvocableNode>,
        right: Box<InvocableNode>,
        /// Bind a list result positionally instead of as one value
        spread: bool,
    },
    Parallel {
        left: Box<InvocableNode>,
        right: Box<InvocableNode>,
    },
    Compare {
        left: Box<InvocableNode>,
        right: Box<InvocableNode>,
        operator: Operator,
    },
    BoolOp {
        left: Box<InvocableNode>,
        right: Box<InvocableNode>,
        operator: Operator,
    },
    If {
        predicate: Box<InvocableNode>,
        do_node: Box<InvocableNode>,
        else_node: Option<Box<InvocableNode>>,
        returns: ValueType,
    },
    Tuple(Vec<InvocableNode>),
    Constant {
        value: Value,
        ty: ValueType,
    },
    Snippet(Box<SnippetNode>),
}

impl InvocableNode {
    pub fn returns(&self) -> ValueType {
        match self {
            InvocableNode::Call(call) => call.operation.returns().clone(),
            InvocableNode::Chain { right, .. } => right.returns(),
            InvocableNode::Parallel { left, .. } => left.returns(),
            InvocableNode::Compare { .. } | InvocableNode::BoolOp { .. } => ValueType::Bool,
            InvocableNode::If { returns, .. } => returns.clone(),
            InvocableNode::Tuple(_) => ValueType::List,
            InvocableNode::Constant { ty, .. } => ty.clone(),
            InvocableNode::Snippet(node) => node.returns.clone(),
        }
    }

    /// Parameter types this node still needs from piped input or the pool, in order.
    pub fn open_params(&self) -> Vec<ValueType> {
        match self {
            InvocableNode::Call(call) => call.open_params(),
            InvocableNode::Chain { left, .. } => left.open_params(),
            InvocableNode::Parallel { left, right }
            | InvocableNode::Compare { left, right, .. }
            | InvocableNode::BoolOp { left, right, .. } => {
                let mut params = left.open_params();
                params.extend(right.open_params());
                params
            }
            InvocableNode::If {
                predicate,
                do_node,
                else_node,
                ..
            } => {
                let mut params = predicate.open_params();
                params.extend(do_node.open_params());
                if let Some(else_node) = else_node {
                    params.extend(else_node.open_params());
                }
                params
            }
            InvocableNode::Tuple(elements) => elements.iter().flat_map(|e| e.open_params()).collect(),
            InvocableNode::Constant { .. } | InvocableNode::Snippet(_) => Vec::new(),
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, InvocableNode::Constant { .. })
    }

    pub fn evaluate(&self, scope: &mut Scope) -> EvaluationResult<Value> {
        match self {
            InvocableNode::Call(call) => call.evaluate(scope),
            InvocableNode::Chain { left, right, spread } => {
                let value = left.evaluate(scope)?;
                let piped = match (spread, value) {
                    (true, Value::List(items)) => Piped::Spread(items),
                    (_, value) => Piped::Single {
                        ty: left.returns(),
                        value,
                    },
                };
                scope.push(piped);
                let result = right.evaluate(scope);
                scope.pop();
                result
            }
            InvocableNode::Parallel { left, right } => {
                let kept = left.evaluate(scope)?;
                right.evaluate(scope)?;
                Ok(kept)
            }
            InvocableNode::Compare {
                left,
                right,
                operator,
            } => {
                let l = left.evaluate(scope)?;
                let r = right.evaluate(scope)?;
                Ok(Value::Bool(compare(&l, &r, *operator)))
            }
            InvocableNode::BoolOp {
                left,
                right,
                operator,
            } => {
                let l = bool::from_value(left.evaluate(scope)?)?;
                let result = match (operator, l) {
                    (Operator::And, false) => false,
                    (Operator::Or, true) => true,
                    _ => bool::from_value(right.evaluate(scope)?)?,
                };
                Ok(Value::Bool(result))
            }
            InvocableNode::If {
                predicate,
                do_node,
                else_node,
                ..
            } => {
                if bool::from_value(predicate.evaluate(scope)?)? {
                    do_node.evaluate(scope)
                } else {
                    match else_node {
                        Some(else_node) => else_node.evaluate(scope),
                        None => Ok(Value::Null),
                    }
                }
            }
            InvocableNode::Tuple(elements) => elements
                .iter()
                .map(|e| e.evaluate(scope))
                .collect::<EvaluationResult<Vec<_>>>()
                .map(Value::List),
            InvocableNode::Constant { value, .. } => Ok(value.clone()),
            InvocableNode::Snippet(node) => {
                let value = node.unit.evaluate(scope.pool(), &node.location)?;
                Ok(value.convert(&node.returns)?)
            }
        }
    }
}

/// Relational and equality comparison. Numbers compare by value across types;
/// other values compare only with the same type, otherwise the result is false.
pub fn compare(left: &Value, right: &Value, operator: Operator) -> bool {
    if operator.is_equality() {
        let equal = left.loose_eq(right);
        return if operator == Operator::Equal { equal } else { !equal };
    }
    let ordering = match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    };
    match ordering {
        Some(ordering) => match operator {
            Operator::Less => ordering == Ordering::Less,
            Operator::LessEqual => ordering != Ordering::Greater,
            Operator::Greater => ordering == Ordering::Greater,
            Operator::GreaterEqual => ordering != Ordering::Less,
            _ => false,
        },
        None => false,
    }
}
