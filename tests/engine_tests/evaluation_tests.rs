use std::sync::Arc;

use botexpr::{
    eval::EvaluationError,
    memory::InMemorySessionMemory,
    Error, Namespace, ResourcePool, Value, ValueType,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use tempfile::TempDir;

use super::fixtures::{factory, namespace, Recorder};

#[test]
fn test_parallel_keeps_left_and_runs_both_in_order() {
    let dir = TempDir::new().unwrap();
    let log = Recorder::default();
    let factory = factory(&dir, &log);
    let value = factory.create::<i32>("#getOne ; #first", &namespace()).unwrap();
    assert_eq!(value.generate(&ResourcePool::new()).unwrap(), 1);
    assert_eq!(log.calls(), vec!["getOne", "first"]);
}

#[test]
fn test_nested_tuples_flatten() {
    let dir = TempDir::new().unwrap();
    let factory = factory(&dir, &Recorder::default());
    let value = factory
        .create_value("(#getOne, #getTwo, (#getTwo, #getOne))", ValueType::List, &namespace())
        .unwrap();
    assert_eq!(
        value.generate(&ResourcePool::new()).unwrap(),
        Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(2), Value::Int(1)])
    );
}

#[test]
fn test_tuple_spreads_into_parameters() {
    let dir = TempDir::new().unwrap();
    let factory = factory(&dir, &Recorder::default());
    let value = factory
        .create::<bool>("(#first, #third) -> #xor", &namespace())
        .unwrap();
    assert!(value.generate(&ResourcePool::new()).unwrap());
}

#[test]
fn test_generator_receives_piped_value() {
    let dir = TempDir::new().unwrap();
    let factory = factory(&dir, &Recorder::default());
    let value = factory.create::<i64>("#getTwo -> ::pow(6)", &namespace()).unwrap();
    assert_eq!(value.generate(&ResourcePool::new()).unwrap(), 64);
}

#[test]
fn test_null_is_piped() {
    let dir = TempDir::new().unwrap();
    let factory = factory(&dir, &Recorder::default());
    let value = factory
        .create::<String>("#getNull -> #consume", &namespace())
        .unwrap();
    assert_eq!(value.generate(&ResourcePool::new()).unwrap(), "nullA");
}

#[test]
fn test_nested_if() {
    let dir = TempDir::new().unwrap();
    let factory = factory(&dir, &Recorder::default());
    let value = factory
        .create::<i32>("IF #third DO 1 ELSE IF #first DO 2 ELSE 3", &namespace())
        .unwrap();
    assert_eq!(value.generate(&ResourcePool::new()).unwrap(), 2);
}

#[test]
fn test_if_runs_one_branch() {
    let dir = TempDir::new().unwrap();
    let log = Recorder::default();
    let factory = factory(&dir, &log);
    let ns = namespace();

    let taken = factory
        .create::<i32>("IF #first DO #doBranch ELSE #elseBranch", &ns)
        .unwrap();
    assert_eq!(taken.generate(&ResourcePool::new()).unwrap(), 10);
    assert_eq!(log.count("doBranch"), 1);
    assert_eq!(log.count("elseBranch"), 0);

    let skipped = factory
        .create::<i32>("IF #third DO #doBranch ELSE #elseBranch", &ns)
        .unwrap();
    assert_eq!(skipped.generate(&ResourcePool::new()).unwrap(), 20);
    assert_eq!(log.count("doBranch"), 1);
    assert_eq!(log.count("elseBranch"), 1);
}

#[test]
fn test_comparison_widens_numbers() {
    let dir = TempDir::new().unwrap();
    let log = Recorder::default();
    let factory = factory(&dir, &log);
    let value = factory.create::<bool>("#setNum(4) >= 4", &namespace()).unwrap();
    assert!(value.generate(&ResourcePool::new()).unwrap());
    assert_eq!(log.count("setNum"), 1);
}

#[test]
fn test_variadic_arguments() {
    let dir = TempDir::new().unwrap();
    let factory = factory(&dir, &Recorder::default());
    let value = factory
        .create::<i64>("#add(1, 4, 6) ; #add(1)", &namespace())
        .unwrap();
    assert_eq!(value.generate(&ResourcePool::new()).unwrap(), 11);
}

#[test]
fn test_active_provider_shadows_builtin() {
    let dir = TempDir::new().unwrap();
    let factory = factory(&dir, &Recorder::default());
    let pool = ResourcePool::new();
    let shadowed = factory.create::<bool>("#not(true)", &namespace()).unwrap();
    let builtin = factory.create::<bool>("#not(true)", &Namespace::new()).unwrap();
    assert!(shadowed.generate(&pool).unwrap());
    assert!(!builtin.generate(&pool).unwrap());
}

#[test]
fn test_hidden_parameter_comes_from_pool() {
    let dir = TempDir::new().unwrap();
    let factory = factory(&dir, &Recorder::default());
    let value = factory.create::<String>("#greetName", &namespace()).unwrap();
    let pool = ResourcePool::new().with_component(Value::from("Ada"));
    assert_eq!(value.generate(&pool).unwrap(), "Ada");
    assert!(matches!(
        value.generate(&ResourcePool::new()),
        Err(EvaluationError::MissingResource { .. })
    ));
}

#[test]
fn test_session_memory_builtins() {
    let dir = TempDir::new().unwrap();
    let factory = factory(&dir, &Recorder::default());
    let ns = namespace();
    let pool = ResourcePool::new().with_memory(Arc::new(InMemorySessionMemory::new()));

    let store = factory
        .create_value("#getTwo -> ::store('n')", ValueType::Any, &ns)
        .unwrap();
    let read = factory.create_value("#memory('n')", ValueType::Any, &ns).unwrap();
    assert_eq!(read.generate(&pool).unwrap(), Value::Null);
    assert_eq!(store.generate(&pool).unwrap(), Value::Int(2));
    assert_eq!(read.generate(&pool).unwrap(), Value::Int(2));
}

#[test]
fn test_matches_generator() {
    let dir = TempDir::new().unwrap();
    let factory = factory(&dir, &Recorder::default());
    let value = factory
        .create::<bool>("#getText -> ::matches('^[0-9]+$')", &namespace())
        .unwrap();
    assert!(value.generate(&ResourcePool::new()).unwrap());
}

#[test]
fn test_operation_failure_is_wrapped() {
    let dir = TempDir::new().unwrap();
    let factory = factory(&dir, &Recorder::default());
    let value = factory.create_value("#todo", ValueType::Any, &namespace()).unwrap();
    match value.generate(&ResourcePool::new()) {
        Err(EvaluationError::Operation { reference, .. }) => assert_eq!(reference, "#todo"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_interpolation() {
    let dir = TempDir::new().unwrap();
    let factory = factory(&dir, &Recorder::default());
    let ns = namespace();

    let greeting = factory.create::<String>("Hello ${#greetName}!", &ns).unwrap();
    assert!(!greeting.is_constant());
    let pool = ResourcePool::new().with_component(Value::from("Ada"));
    assert_eq!(greeting.generate(&pool).unwrap(), "Hello Ada!");

    let escaped = factory.create::<String>("Price: \\${x}", &ns).unwrap();
    assert!(escaped.is_constant());
    assert_eq!(escaped.generate(&pool).unwrap(), "Price: ${x}");
}

#[test]
fn test_type_mismatch_is_a_compile_error() {
    let dir = TempDir::new().unwrap();
    let factory = factory(&dir, &Recorder::default());
    assert!(matches!(
        factory.create::<i32>("#first", &namespace()),
        Err(Error::Compile(_))
    ));
}

proptest! {
    #[test]
    fn prop_literals_ignore_pool(n in -1_000_000i64..1_000_000, text in "[a-z]{1,8}") {
        let dir = TempDir::new().unwrap();
        let factory = factory(&dir, &Recorder::default());
        let ns = namespace();
        let value = factory.create::<i64>(&n.to_string(), &ns).unwrap();
        prop_assert!(value.is_constant());

        let empty = ResourcePool::new();
        let busy = ResourcePool::new()
            .with_component(Value::from(text))
            .with_component(Value::Long(n + 1));
        prop_assert_eq!(value.generate(&empty).unwrap(), n);
        prop_assert_eq!(value.generate(&busy).unwrap(), n);
    }
}
