//! Session memory handle used by the `#memory` and `::store` built-ins.
//!
//! The dispatch layer places an `Arc<dyn SessionMemory>` into each
//! [`crate::eval::ResourcePool`] under [`SESSION_MEMORY`].

use std::sync::Arc;

use dashmap::DashMap;

use crate::{
    catalog::OperationError,
    types::{Resource, Value, ValueType},
};

/// Resource type name of the session-memory handle.
pub const SESSION_MEMORY: &str = "SessionMemory";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum MemoryScope {
    /// Visible to the current conversation tree only
    Tree,
    Global,
}

#[cfg_attr(test, mockall::automock)]
pub trait SessionMemory: Send + Sync {
    fn get(&self, scope: MemoryScope, key: &str) -> Option<Value>;
    fn put(&self, scope: MemoryScope, key: &str, value: Value);
}

#[derive(Debug, Default)]
pub struct InMemorySessionMemory {
    tree: DashMap<String, Value>,
    global: DashMap<String, Value>,
}

impl InMemorySessionMemory {
    pub fn new() -> Self {
        Self::default()
    }

    fn scope(&self, scope: MemoryScope) -> &DashMap<String, Value> {
        match scope {
            MemoryScope::Tree => &self.tree,
            MemoryScope::Global => &self.global,
        }
    }
}

impl SessionMemory for InMemorySessionMemory {
    fn get(&self, scope: MemoryScope, key: &str) -> Option<Value> {
        self.scope(scope).get(key).map(|entry| entry.value().clone())
    }

    fn put(&self, scope: MemoryScope, key: &str, value: Value) {
        self.scope(scope).insert(key.to_string(), value);
    }
}

pub fn session_memory_type() -> ValueType {
    ValueType::named(SESSION_MEMORY)
}

/// Wraps a memory handle so it can be placed into a resource pool.
pub fn memory_resource(memory: Arc<dyn SessionMemory>) -> Value {
    Value::Resource(Resource::new(SESSION_MEMORY, memory))
}

/// Extracts the handle placed by [`memory_resource`].
pub fn as_session_memory(value: &Value) -> Result<Arc<dyn SessionMemory>, OperationError> {
    match value {
        Value::Resource(resource) => resource
            .downcast_ref::<Arc<dyn SessionMemory>>()
            .cloned()
            .ok_or_else(|| format!("resource {} is not a session memory", resource.type_name()).into()),
        other => Err(format!("expected {}, found {}", SESSION_MEMORY, other.value_type()).into()),
    }
}
