//! # Value Model
//!
//! Runtime values and their declared types.
//!
//! Every operation in the catalog declares the [`ValueType`] of its parameters and
//! its result. The compiler checks those declarations once, and the evaluation layer
//! moves [`Value`]s between nodes. Host objects that the engine does not understand
//! (the inbound event, the active controller, a message sender) travel as
//! [`Resource`]s tagged with a stable type name.
//!
//! ## Assignability
//!
//! A value of type `A` may flow into a slot of type `B` when:
//!
//! * `A == B`
//! * both are numeric (`Int`, `Long`, `Double`), converted by value
//! * either side is [`ValueType::Any`]
//! * `B` is `String`, in which case the value is stringified
use std::{any::Any, fmt, str::FromStr, sync::Arc};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    Any,
    Void,
    Bool,
    Int,
    Long,
    Double,
    String,
    List,
    /// A host resource type registered under this name.
    Named(String),
}

impl ValueType {
    pub fn named(name: impl Into<String>) -> Self {
        ValueType::Named(name.into())
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Int | ValueType::Long | ValueType::Double)
    }

    /// Whether a value declared as `self` may be passed where `target` is expected.
    pub fn is_assignable_to(&self, target: &ValueType) -> bool {
        self == target
            || *self == ValueType::Any
            || *target == ValueType::Any
            || (self.is_numeric() && target.is_numeric())
    }

    /// Like [`ValueType::is_assignable_to`], but also accepts stringification.
    pub fn is_convertible_to(&self, target: &ValueType) -> bool {
        self.is_assignable_to(target) || (*target == ValueType::String && *self != ValueType::Void)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Any => write!(f, "Any"),
            ValueType::Void => write!(f, "Void"),
            ValueType::Bool => write!(f, "Bool"),
            ValueType::Int => write!(f, "Int"),
            ValueType::Long => write!(f, "Long"),
            ValueType::Double => write!(f, "Double"),
            ValueType::String => write!(f, "String"),
            ValueType::List => write!(f, "List"),
            ValueType::Named(name) => write!(f, "{}", name),
        }
    }
}

impl FromStr for ValueType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Any" | "Object" => ValueType::Any,
            "Void" => ValueType::Void,
            "Bool" | "Boolean" => ValueType::Bool,
            "Int" | "Integer" => ValueType::Int,
            "Long" => ValueType::Long,
            "Double" => ValueType::Double,
            "String" => ValueType::String,
            "List" => ValueType::List,
            other => ValueType::Named(other.to_string()),
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("cannot convert {found} to {expected}")]
pub struct ConversionError {
    pub expected: ValueType,
    pub found: ValueType,
}

/// An opaque host object carried through the pool.
#[derive(Clone)]
pub struct Resource {
    type_name: String,
    inner: Arc<dyn Any + Send + Sync>,
}

impl Resource {
    pub fn new<T: Any + Send + Sync>(type_name: impl Into<String>, value: T) -> Self {
        Self {
            type_name: type_name.into(),
            inner: Arc::new(value),
        }
    }

    pub fn from_arc(type_name: impl Into<String>, inner: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            type_name: type_name.into(),
            inner,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn downcast_arc<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.inner).downcast::<T>().ok()
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name && Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    String(String),
    List(Vec<Value>),
    Resource(Resource),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Any,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Long(_) => ValueType::Long,
            Value::Double(_) => ValueType::Double,
            Value::String(_) => ValueType::String,
            Value::List(_) => ValueType::List,
            Value::Resource(r) => ValueType::Named(r.type_name.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Long(l) => Some(*l as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Converts the value into `target`.
    ///
    /// Numbers convert by value, anything non-null stringifies when `target` is
    /// `String`, and `Null` passes through unchanged.
    pub fn convert(self, target: &ValueType) -> Result<Value, ConversionError> {
        let mismatch = |found: ValueType| ConversionError {
            expected: target.clone(),
            found,
        };
        match (self, target) {
            (Value::Null, _) => Ok(Value::Null),
            (value, ValueType::Any) => Ok(value),
            (value, ValueType::String) => Ok(match value {
                Value::String(s) => Value::String(s),
                other => Value::String(other.to_string()),
            }),
            (value, ValueType::Int) => match value {
                Value::Int(i) => Ok(Value::Int(i)),
                Value::Long(l) => Ok(Value::Int(l as i32)),
                Value::Double(d) => Ok(Value::Int(d as i32)),
                other => Err(mismatch(other.value_type())),
            },
            (value, ValueType::Long) => match value {
                Value::Int(i) => Ok(Value::Long(i as i64)),
                Value::Long(l) => Ok(Value::Long(l)),
                Value::Double(d) => Ok(Value::Long(d as i64)),
                other => Err(mismatch(other.value_type())),
            },
            (value, ValueType::Double) => value
                .as_f64()
                .map(Value::Double)
                .ok_or_else(|| mismatch(value.value_type())),
            (value, ValueType::Void) => Ok(value),
            (value, expected) => {
                if value.value_type() == *expected {
                    Ok(value)
                } else {
                    Err(mismatch(value.value_type()))
                }
            }
        }
    }

    /// Equality with numeric widening: `Int(2) == Double(2.0)`.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Long(l) => write!(f, "{}", l),
            Value::Double(d) => write!(f, "{}", d),
            Value::String(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Resource(r) => write!(f, "<{}>", r.type_name),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Typed extraction of a [`Value`], used by operation bodies and by
/// [`crate::eval::GeneratedValue`].
pub trait FromValue: Sized {
    fn value_type() -> ValueType;
    fn from_value(value: Value) -> Result<Self, ConversionError>;
}

fn converted(value: Value, target: ValueType) -> Result<Value, ConversionError> {
    if value.is_null() {
        return Err(ConversionError {
            expected: target,
            found: ValueType::Any,
        });
    }
    value.convert(&target)
}

impl FromValue for Value {
    fn value_type() -> ValueType {
        ValueType::Any
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        Ok(value)
    }
}

impl FromValue for () {
    fn value_type() -> ValueType {
        ValueType::Void
    }

    fn from_value(_: Value) -> Result<Self, ConversionError> {
        Ok(())
    }
}

macro_rules! impl_from_value {
    ($ty:ty, $value_type:expr, $variant:ident) => {
        impl FromValue for $ty {
            fn value_type() -> ValueType {
                $value_type
            }

            fn from_value(value: Value) -> Result<Self, ConversionError> {
                match converted(value, $value_type)? {
                    Value::$variant(v) => Ok(v),
                    other => Err(ConversionError {
                        expected: $value_type,
                        found: other.value_type(),
                    }),
                }
            }
        }
    };
}

impl_from_value!(bool, ValueType::Bool, Bool);
impl_from_value!(i32, ValueType::Int, Int);
impl_from_value!(i64, ValueType::Long, Long);
impl_from_value!(f64, ValueType::Double, Double);
impl_from_value!(String, ValueType::String, String);
impl_from_value!(Vec<Value>, ValueType::List, List);

impl<T: FromValue> FromValue for Option<T> {
    fn value_type() -> ValueType {
        T::value_type()
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_assignability() {
        assert!(ValueType::Int.is_assignable_to(&ValueType::Double));
        assert!(ValueType::Bool.is_assignable_to(&ValueType::Any));
        assert!(ValueType::Any.is_assignable_to(&ValueType::Bool));
        assert!(!ValueType::Bool.is_assignable_to(&ValueType::String));
        assert!(ValueType::Bool.is_convertible_to(&ValueType::String));
        assert!(!ValueType::named("Update").is_assignable_to(&ValueType::Int));
    }

    #[test]
    fn test_stringify_on_conversion() {
        assert_eq!(
            Value::List(vec![Value::Long(1), Value::from("a")]).convert(&ValueType::String),
            Ok(Value::from("[1, a]"))
        );
        assert_eq!(Value::Null.convert(&ValueType::String), Ok(Value::Null));
    }

    #[test]
    fn test_conversion_rejects_mismatch() {
        let err = Value::from("x").convert(&ValueType::Bool).unwrap_err();
        assert_eq!(err.expected, ValueType::Bool);
        assert_eq!(err.found, ValueType::String);
        assert!(bool::from_value(Value::Null).is_err());
        assert_eq!(Option::<bool>::from_value(Value::Null), Ok(None));
    }

    #[test]
    fn test_resource_equality_is_identity() {
        let a = Resource::new("Update", 42u32);
        let b = Resource::new("Update", 42u32);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(a.downcast_ref::<u32>(), Some(&42));
    }

    proptest! {
        #[test]
        fn test_numeric_conversion_preserves_value(n in -1_000_000i32..1_000_000) {
            prop_assert_eq!(i64::from_value(Value::Int(n)), Ok(n as i64));
            prop_assert_eq!(f64::from_value(Value::Long(n as i64)), Ok(n as f64));
            prop_assert_eq!(i32::from_value(Value::Double(n as f64)), Ok(n));
        }
    }
}
