use std::{fmt, marker::PhantomData, sync::Arc};

use crate::types::{FromValue, Value, ValueType};

use super::{EvaluationError, ResourcePool};

type Producer = Arc<dyn Fn(&ResourcePool) -> Result<Value, EvaluationError> + Send + Sync>;

#[derive(Clone)]
enum Generated {
    Constant(Value),
    Dynamic(Producer),
}

/// A compiled expression waiting for a resource pool.
///
/// `generate` is the only evaluation entry point callers see. Constant values never
/// look at the pool.
pub struct GeneratedValue<T> {
    inner: Generated,
    returns: ValueType,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for GeneratedValue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            returns: self.returns.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for GeneratedValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Generated::Constant(value) => write!(f, "GeneratedValue::Constant({:?})", value),
            Generated::Dynamic(_) => write!(f, "GeneratedValue::Dynamic({})", self.returns),
        }
    }
}

impl<T: FromValue> GeneratedValue<T> {
    pub fn constant(value: Value) -> Self {
        let returns = value.value_type();
        Self {
            inner: Generated::Constant(value),
            returns,
            _marker: PhantomData,
        }
    }

    pub fn dynamic<F>(returns: ValueType, producer: F) -> Self
    where
        F: Fn(&ResourcePool) -> Result<Value, EvaluationError> + Send + Sync + 'static,
    {
        Self {
            inner: Generated::Dynamic(Arc::new(producer)),
            returns,
            _marker: PhantomData,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.inner, Generated::Constant(_))
    }

    /// Declared type of the underlying expression.
    pub fn returns(&self) -> &ValueType {
        &self.returns
    }

    pub fn generate_value(&self, pool: &ResourcePool) -> Result<Value, EvaluationError> {
        match &self.inner {
            Generated::Constant(value) => Ok(value.clone()),
            Generated::Dynamic(producer) => producer(pool),
        }
    }

    pub fn generate(&self, pool: &ResourcePool) -> Result<T, EvaluationError> {
        let value = self.generate_value(pool)?;
        Ok(T::from_value(value)?)
    }

    /// Re-types the value, e.g. when an untyped `create_value` result is handed to a
    /// typed consumer.
    pub fn retype<U: FromValue>(self) -> GeneratedValue<U> {
        GeneratedValue {
            inner: self.inner,
            returns: self.returns,
            _marker: PhantomData,
        }
    }
}
