use std::{any::Any, collections::HashMap, hash::Hash, sync::Arc};

use crate::{
    cache::Fingerprint,
    memory::{memory_resource, SessionMemory},
    types::{Resource, Value, ValueType},
};

use super::EvaluationError;

/// Per-event bag of ambient objects keyed by declared type.
///
/// Created by the dispatch layer for one inbound event and dropped after it; never
/// shared between events or threads.
#[derive(Debug, Clone, Default)]
pub struct ResourcePool {
    components: HashMap<ValueType, Value>,
    fingerprint: Option<Fingerprint>,
}

impl ResourcePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the inbound event and derives the cache fingerprint from `identity`.
    pub fn with_event<H: Hash + ?Sized>(mut self, identity: &H, event: Resource) -> Self {
        self.fingerprint = Some(Fingerprint::of(identity));
        self.insert(Value::Resource(event));
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: Fingerprint) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }

    pub fn with_component(mut self, value: Value) -> Self {
        self.insert(value);
        self
    }

    pub fn with_memory(mut self, memory: Arc<dyn SessionMemory>) -> Self {
        self.insert(memory_resource(memory));
        self
    }

    /// Stores `value` under its runtime type, replacing any previous component.
    pub fn insert(&mut self, value: Value) {
        self.components.insert(value.value_type(), value);
    }

    pub fn insert_as(&mut self, ty: ValueType, value: Value) {
        self.components.insert(ty, value);
    }

    pub fn get(&self, ty: &ValueType) -> Option<&Value> {
        self.components.get(ty)
    }

    pub fn require(&self, ty: &ValueType) -> Result<&Value, EvaluationError> {
        self.get(ty).ok_or_else(|| EvaluationError::MissingResource {
            reference: String::from("pool"),
            expected: ty.clone(),
        })
    }

    /// Typed access to a host resource; fails when the component is missing or holds
    /// another Rust type.
    pub fn resource<T: Any + Send + Sync>(&self, type_name: &str) -> Result<Arc<T>, EvaluationError> {
        let ty = ValueType::named(type_name);
        match self.require(&ty)? {
            Value::Resource(resource) => resource.downcast_arc::<T>().ok_or_else(|| {
                EvaluationError::ResourceType {
                    type_name: type_name.to_string(),
                    expected: std::any::type_name::<T>(),
                }
            }),
            _ => Err(EvaluationError::MissingResource {
                reference: String::from("pool"),
                expected: ty,
            }),
        }
    }

    pub fn fingerprint(&self) -> Option<Fingerprint> {
        self.fingerprint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemorySessionMemory;

    struct Update {
        text: String,
    }

    #[test]
    fn test_event_registration() {
        let pool = ResourcePool::new().with_event(
            &42u64,
            Resource::new(
                "Update",
                Update {
                    text: "hi".to_string(),
                },
            ),
        );
        assert_eq!(pool.fingerprint(), Some(Fingerprint::of(&42u64)));
        assert_eq!(pool.resource::<Update>("Update").unwrap().text, "hi");
    }

    #[test]
    fn test_typed_access_fails_loudly() {
        let pool = ResourcePool::new().with_component(Value::Resource(Resource::new("Update", 1u8)));
        assert!(matches!(
            pool.resource::<String>("Update"),
            Err(EvaluationError::ResourceType { .. })
        ));
        assert!(matches!(
            pool.resource::<u8>("Sender"),
            Err(EvaluationError::MissingResource { .. })
        ));
        assert_eq!(pool.fingerprint(), None);
    }

    #[test]
    fn test_components_keyed_by_type() {
        let mut pool = ResourcePool::new()
            .with_component(Value::Int(1))
            .with_memory(Arc::new(InMemorySessionMemory::new()));
        pool.insert(Value::Int(2));
        assert_eq!(pool.get(&ValueType::Int), Some(&Value::Int(2)));
        assert!(pool.get(&crate::memory::session_memory_type()).is_some());
        assert!(pool.require(&ValueType::Bool).is_err());
    }
}
