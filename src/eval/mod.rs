//! # Evaluation Layer
//!
//! Runs compiled node trees against a [`ResourcePool`].
//!
//! A [`Scope`] lives for one evaluation. Chains push the left result as a
//! [`Piped`] frame before evaluating the right side and pop it afterwards, so piped
//! values are visible only to the rest of that evaluation and never leak into the
//! pool itself.

pub mod generated;
pub mod pool;

pub use generated::GeneratedValue;
pub use pool::ResourcePool;

use thiserror::Error;

use crate::{
    catalog::OperationError,
    error::SourceLocation,
    types::{ConversionError, Value, ValueType},
};

#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("Reference {reference} failed at {location}: {source}")]
    Operation {
        reference: String,
        location: SourceLocation,
        #[source]
        source: OperationError,
    },
    #[error("No value of type {expected} available for {reference}")]
    MissingResource {
        reference: String,
        expected: ValueType,
    },
    #[error("Resource {type_name} does not hold a {expected}")]
    ResourceType {
        type_name: String,
        expected: &'static str,
    },
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),
    #[error("Snippet failed at {location}: {message}")]
    Snippet {
        message: String,
        location: SourceLocation,
    },
}

pub type EvaluationResult<T> = Result<T, EvaluationError>;

/// A value handed from the left side of `->` to the right side.
#[derive(Debug, Clone, PartialEq)]
pub enum Piped {
    /// One value with the declared type of the producing node
    Single { ty: ValueType, value: Value },
    /// List elements bound positionally to the open parameters
    Spread(Vec<Value>),
}

pub struct Scope<'p> {
    pool: &'p ResourcePool,
    piped: Vec<Piped>,
}

impl<'p> Scope<'p> {
    pub fn new(pool: &'p ResourcePool) -> Self {
        Self {
            pool,
            piped: Vec::new(),
        }
    }

    pub fn pool(&self) -> &'p ResourcePool {
        self.pool
    }

    pub fn push(&mut self, piped: Piped) {
        self.piped.push(piped);
    }

    pub fn pop(&mut self) -> Option<Piped> {
        self.piped.pop()
    }

    /// Values for the open (non-explicit, non-hidden) parameters of a call.
    ///
    /// A spread frame on top binds positionally. Otherwise each parameter takes the
    /// nearest piped value whose type fits, falling back to the pool.
    pub fn resolve_open(&self, reference: &str, params: &[ValueType]) -> EvaluationResult<Vec<Value>> {
        if let Some(Piped::Spread(values)) = self.piped.last() {
            if values.len() < params.len() {
                return Err(EvaluationError::MissingResource {
                    reference: reference.to_string(),
                    expected: params[values.len()].clone(),
                });
            }
            return params
                .iter()
                .zip(values)
                .map(|(ty, value)| value.clone().convert(ty).map_err(EvaluationError::from))
                .collect();
        }
        params
            .iter()
            .map(|ty| self.lookup(reference, ty))
            .collect()
    }

    fn lookup(&self, reference: &str, ty: &ValueType) -> EvaluationResult<Value> {
        for frame in self.piped.iter().rev() {
            if let Piped::Single { ty: declared, value } = frame {
                let actual = if *declared == ValueType::Any {
                    value.value_type()
                } else {
                    declared.clone()
                };
                if actual.is_assignable_to(ty) {
                    return Ok(value.clone().convert(ty)?);
                }
            }
        }
        self.resolve_hidden(reference, ty)
    }

    /// Values for hidden parameters come from the pool only.
    pub fn resolve_hidden(&self, reference: &str, ty: &ValueType) -> EvaluationResult<Value> {
        self.pool
            .get(ty)
            .cloned()
            .ok_or_else(|| EvaluationError::MissingResource {
                reference: reference.to_string(),
                expected: ty.clone(),
            })
    }
}
