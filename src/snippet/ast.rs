use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    catalog::{Arguments, Invocation, Operation},
    compiler::node::compare,
    error::SourceLocation,
    eval::{EvaluationError, EvaluationResult, ResourcePool},
    tokenizer::Operator,
    types::Value,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SnippetLiteral {
    Integer(i64),
    Decimal(f64),
    String(String),
    Bool(bool),
    Null,
}

impl SnippetLiteral {
    /// Integers that fit `Int` are `Int`, as in host arithmetic.
    pub fn to_value(&self) -> Value {
        match self {
            SnippetLiteral::Integer(i) => match i32::try_from(*i) {
                Ok(small) => Value::Int(small),
                Err(_) => Value::Long(*i),
            },
            SnippetLiteral::Decimal(d) => Value::Double(*d),
            SnippetLiteral::String(s) => Value::String(s.clone()),
            SnippetLiteral::Bool(b) => Value::Bool(*b),
            SnippetLiteral::Null => Value::Null,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SnippetExpr {
    Literal {
        value: SnippetLiteral,
    },
    Unary {
        op: UnaryOp,
        operand: Box<SnippetExpr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<SnippetExpr>,
        right: Box<SnippetExpr>,
    },
    Ternary {
        condition: Box<SnippetExpr>,
        then: Box<SnippetExpr>,
        otherwise: Box<SnippetExpr>,
    },
    Call {
        owner: Option<String>,
        name: String,
        args: Vec<SnippetExpr>,
    },
}

impl SnippetExpr {
    pub fn literal(value: SnippetLiteral) -> Self {
        SnippetExpr::Literal { value }
    }

    pub fn binary(op: BinaryOp, left: SnippetExpr, right: SnippetExpr) -> Self {
        SnippetExpr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, operand: SnippetExpr) -> Self {
        SnippetExpr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    /// Key under which a call's bound operation is stored.
    pub fn call_key(owner: Option<&str>, name: &str) -> String {
        match owner {
            Some(owner) => format!("{}.{}", owner, name),
            None => name.to_string(),
        }
    }

    /// Visits every call in the tree.
    pub fn for_each_call<'a>(&'a self, visit: &mut impl FnMut(Option<&'a str>, &'a str, usize)) {
        match self {
            SnippetExpr::Literal { .. } => {}
            SnippetExpr::Unary { operand, .. } => operand.for_each_call(visit),
            SnippetExpr::Binary { left, right, .. } => {
                left.for_each_call(visit);
                right.for_each_call(visit);
            }
            SnippetExpr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                condition.for_each_call(visit);
                then.for_each_call(visit);
                otherwise.for_each_call(visit);
            }
            SnippetExpr::Call { owner, name, args } => {
                visit(owner.as_deref(), name, args.len());
                for arg in args {
                    arg.for_each_call(visit);
                }
            }
        }
    }
}

/// Evaluates a bound snippet tree.
pub(crate) struct Interpreter<'a> {
    pub bindings: &'a HashMap<String, Arc<Operation>>,
    pub pool: &'a ResourcePool,
    pub location: &'a SourceLocation,
}

impl Interpreter<'_> {
    fn fail(&self, message: impl Into<String>) -> EvaluationError {
        EvaluationError::Snippet {
            message: message.into(),
            location: self.location.clone(),
        }
    }

    fn boolean(&self, expr: &SnippetExpr) -> EvaluationResult<bool> {
        match self.evaluate(expr)? {
            Value::Bool(b) => Ok(b),
            other => Err(self.fail(format!("expected Bool, found {}", other.value_type()))),
        }
    }

    pub fn evaluate(&self, expr: &SnippetExpr) -> EvaluationResult<Value> {
        match expr {
            SnippetExpr::Literal { value } => Ok(value.to_value()),
            SnippetExpr::Unary { op, operand } => match op {
                UnaryOp::Not => Ok(Value::Bool(!self.boolean(operand)?)),
                UnaryOp::Negate => match self.evaluate(operand)? {
                    Value::Int(i) => Ok(Value::Int(i.wrapping_neg())),
                    Value::Long(l) => Ok(Value::Long(l.wrapping_neg())),
                    Value::Double(d) => Ok(Value::Double(-d)),
                    other => Err(self.fail(format!("cannot negate {}", other.value_type()))),
                },
            },
            SnippetExpr::Binary { op, left, right } => match op {
                BinaryOp::And => Ok(Value::Bool(self.boolean(left)? && self.boolean(right)?)),
                BinaryOp::Or => Ok(Value::Bool(self.boolean(left)? || self.boolean(right)?)),
                _ => {
                    let l = self.evaluate(left)?;
                    let r = self.evaluate(right)?;
                    self.binary(*op, l, r)
                }
            },
            SnippetExpr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                if self.boolean(condition)? {
                    self.evaluate(then)
                } else {
                    self.evaluate(otherwise)
                }
            }
            SnippetExpr::Call { owner, name, args } => self.call(owner.as_deref(), name, args),
        }
    }

    fn call(&self, owner: Option<&str>, name: &str, args: &[SnippetExpr]) -> EvaluationResult<Value> {
        let key = SnippetExpr::call_key(owner, name);
        let operation = self
            .bindings
            .get(&key)
            .ok_or_else(|| self.fail(format!("unbound function {}", key)))?;
        let mut explicit = args
            .iter()
            .map(|arg| self.evaluate(arg))
            .collect::<EvaluationResult<Vec<_>>>()?
            .into_iter();

        let fixed = operation.visible_params().count() - usize::from(operation.is_variadic());
        let mut visible_index = 0;
        let mut values = Vec::with_capacity(operation.params().len());
        for param in operation.params() {
            if param.hidden {
                let value = self.pool.get(&param.ty).cloned().ok_or_else(|| {
                    EvaluationError::MissingResource {
                        reference: key.clone(),
                        expected: param.ty.clone(),
                    }
                })?;
                values.push(value);
                continue;
            }
            let value = if visible_index >= fixed {
                Value::List(
                    explicit
                        .by_ref()
                        .map(|v| v.convert(&param.ty))
                        .collect::<Result<Vec<_>, _>>()?,
                )
            } else {
                explicit
                    .next()
                    .ok_or_else(|| self.fail(format!("missing argument for {}", key)))?
                    .convert(&param.ty)?
            };
            values.push(value);
            visible_index += 1;
        }

        let invocation = Invocation {
            args: Arguments::new(values),
            pool: self.pool,
        };
        let value = operation
            .invoke(&invocation)
            .map_err(|source| EvaluationError::Operation {
                reference: key,
                location: self.location.clone(),
                source,
            })?;
        Ok(value.convert(operation.returns())?)
    }

    fn binary(&self, op: BinaryOp, l: Value, r: Value) -> EvaluationResult<Value> {
        let comparison = match op {
            BinaryOp::Eq => Some(Operator::Equal),
            BinaryOp::Ne => Some(Operator::NotEqual),
            BinaryOp::Lt => Some(Operator::Less),
            BinaryOp::Le => Some(Operator::LessEqual),
            BinaryOp::Gt => Some(Operator::Greater),
            BinaryOp::Ge => Some(Operator::GreaterEqual),
            _ => None,
        };
        if let Some(operator) = comparison {
            return Ok(Value::Bool(compare(&l, &r, operator)));
        }

        if op == BinaryOp::Add && (matches!(l, Value::String(_)) || matches!(r, Value::String(_))) {
            return Ok(Value::String(format!("{}{}", l, r)));
        }

        match (&l, &r) {
            (Value::Double(_), _) | (_, Value::Double(_)) => {
                let (a, b) = match (l.as_f64(), r.as_f64()) {
                    (Some(a), Some(b)) => (a, b),
                    _ => return Err(self.mismatch(op, &l, &r)),
                };
                Ok(Value::Double(match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    _ => a % b,
                }))
            }
            (Value::Int(a), Value::Int(b)) => {
                let result = match op {
                    BinaryOp::Add => Some(a.wrapping_add(*b)),
                    BinaryOp::Sub => Some(a.wrapping_sub(*b)),
                    BinaryOp::Mul => Some(a.wrapping_mul(*b)),
                    BinaryOp::Div => a.checked_div(*b),
                    _ => a.checked_rem(*b),
                };
                result
                    .map(Value::Int)
                    .ok_or_else(|| self.fail("division by zero"))
            }
            _ => {
                let (a, b) = match (integer(&l), integer(&r)) {
                    (Some(a), Some(b)) => (a, b),
                    _ => return Err(self.mismatch(op, &l, &r)),
                };
                let result = match op {
                    BinaryOp::Add => Some(a.wrapping_add(b)),
                    BinaryOp::Sub => Some(a.wrapping_sub(b)),
                    BinaryOp::Mul => Some(a.wrapping_mul(b)),
                    BinaryOp::Div => a.checked_div(b),
                    _ => a.checked_rem(b),
                };
                result
                    .map(Value::Long)
                    .ok_or_else(|| self.fail("division by zero"))
            }
        }
    }

    fn mismatch(&self, op: BinaryOp, l: &Value, r: &Value) -> EvaluationError {
        self.fail(format!(
            "cannot apply {:?} to {} and {}",
            op,
            l.value_type(),
            r.value_type()
        ))
    }
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i as i64),
        Value::Long(l) => Some(*l),
        _ => None,
    }
}
