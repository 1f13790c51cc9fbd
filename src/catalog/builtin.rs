//! Built-in references available in every namespace.
//!
//! | reference | signature |
//! |-----------|-----------|
//! | `#not` | `Bool -> Bool` |
//! | `#isNull`, `#notNull` | `Any -> Bool` |
//! | `#env(name)` | `String -> String` (null when unset) |
//! | `#memory(key)`, `#memoryGlobal(key)` | `String -> Any`, reads session memory |
//! | `#todo` | placeholder, fails when evaluated |
//! | `::matches(regex)` | generates `String -> Bool` |
//! | `::store(key)`, `::storeGlobal(key)` | generates `Any -> Any`, writes session memory |

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::{
    memory::{as_session_memory, session_memory_type, MemoryScope, SESSION_MEMORY},
    types::{Value, ValueType},
};

use super::{GeneratedReference, Invocation, Operation, OperationResult, Provider};

pub const BUILTIN_PROVIDER: &str = "builtin";

lazy_static! {
    static ref BUILTINS: Provider = {
        let mut provider = Provider::new(BUILTIN_PROVIDER);
        for operation in operations() {
            provider.register(operation);
        }
        provider
    };
}

/// A fresh provider sharing the built-in operations.
pub fn provider() -> Provider {
    Provider {
        name: BUILTINS.name.clone(),
        operations: BUILTINS.operations.clone(),
    }
}

fn read_memory(call: &Invocation, scope: MemoryScope) -> OperationResult {
    let key: String = call.arg(0)?;
    let memory = as_session_memory(call.args.value(1)?)?;
    Ok(memory.get(scope, &key).unwrap_or_default())
}

fn store_generator(scope: MemoryScope) -> impl Fn(&super::Arguments) -> Result<GeneratedReference, super::OperationError> {
    move |args| {
        let key: String = args.get(0)?;
        Ok(GeneratedReference::new(move |call| {
            let value = call.args.value(0)?.clone();
            let handle = call
                .pool
                .get(&session_memory_type())
                .ok_or_else(|| format!("no {} in resource pool", SESSION_MEMORY))?;
            let memory = as_session_memory(handle)?;
            debug!("storing {} in {} memory", key, scope);
            memory.put(scope, &key, value.clone());
            Ok(value)
        }))
    }
}

fn operations() -> Vec<Operation> {
    vec![
        Operation::reference("not")
            .as_static()
            .param(ValueType::Bool)
            .returns(ValueType::Bool)
            .invoke(|call| Ok(Value::Bool(!call.arg::<bool>(0)?))),
        Operation::reference("isNull")
            .as_static()
            .param(ValueType::Any)
            .returns(ValueType::Bool)
            .invoke(|call| Ok(Value::Bool(call.args.value(0)?.is_null()))),
        Operation::reference("notNull")
            .as_static()
            .param(ValueType::Any)
            .returns(ValueType::Bool)
            .invoke(|call| Ok(Value::Bool(!call.args.value(0)?.is_null()))),
        Operation::reference("env")
            .as_static()
            .param(ValueType::String)
            .returns(ValueType::String)
            .invoke(|call| {
                let name: String = call.arg(0)?;
                Ok(std::env::var(name).ok().into())
            }),
        Operation::reference("memory")
            .as_static()
            .param(ValueType::String)
            .hidden(session_memory_type())
            .returns(ValueType::Any)
            .invoke(|call| read_memory(call, MemoryScope::Tree)),
        Operation::reference("memoryGlobal")
            .as_static()
            .param(ValueType::String)
            .hidden(session_memory_type())
            .returns(ValueType::Any)
            .invoke(|call| read_memory(call, MemoryScope::Global)),
        Operation::reference("todo")
            .as_static()
            .placeholder()
            .returns(ValueType::Any)
            .invoke(|_| Err("reached a #todo reference".into())),
        Operation::generator("matches")
            .as_static()
            .param(ValueType::String)
            .input(ValueType::String)
            .returns(ValueType::Bool)
            .generate(|args| {
                let pattern: String = args.get(0)?;
                let regex = Regex::new(&pattern)?;
                Ok(GeneratedReference::new(move |call| {
                    let text: String = call.arg(0)?;
                    Ok(Value::Bool(regex.is_match(&text)))
                }))
            }),
        Operation::generator("store")
            .as_static()
            .param(ValueType::String)
            .input(ValueType::Any)
            .returns(ValueType::Any)
            .generate(store_generator(MemoryScope::Tree)),
        Operation::generator("storeGlobal")
            .as_static()
            .param(ValueType::String)
            .input(ValueType::Any)
            .returns(ValueType::Any)
            .generate(store_generator(MemoryScope::Global)),
    ]
}
