use botexpr::{cache::Fingerprint, types::Resource, ResourcePool};
use tempfile::TempDir;

use super::fixtures::{factory, namespace, Recorder};

struct Update {
    id: u64,
}

fn event(id: u64) -> ResourcePool {
    ResourcePool::new().with_event(&id, Resource::new("Update", Update { id }))
}

#[test]
fn test_same_event_reuses_value() {
    let dir = TempDir::new().unwrap();
    let factory = factory(&dir, &Recorder::default());
    let counter = factory.create::<i64>("#counter", &namespace()).unwrap();

    let pool = event(7);
    assert_eq!(pool.resource::<Update>("Update").unwrap().id, 7);
    let first = counter.generate(&pool).unwrap();
    assert_eq!(counter.generate(&pool).unwrap(), first);
    assert_eq!(counter.generate(&event(7)).unwrap(), first);

    let next = counter.generate(&event(8)).unwrap();
    assert_ne!(next, first);
    assert_eq!(counter.generate(&event(8)).unwrap(), next);
}

#[test]
fn test_missing_fingerprint_always_recomputes() {
    let dir = TempDir::new().unwrap();
    let factory = factory(&dir, &Recorder::default());
    let counter = factory.create::<i64>("#counter", &namespace()).unwrap();

    let cached = counter
        .generate(&ResourcePool::new().with_fingerprint(Fingerprint::new(1)))
        .unwrap();
    let a = counter.generate(&ResourcePool::new()).unwrap();
    let b = counter.generate(&ResourcePool::new()).unwrap();
    assert_ne!(a, b);
    assert_ne!(a, cached);

    let again = counter
        .generate(&ResourcePool::new().with_fingerprint(Fingerprint::new(1)))
        .unwrap();
    assert_ne!(again, cached);
}

#[test]
fn test_each_occurrence_has_its_own_cache() {
    let dir = TempDir::new().unwrap();
    let factory = factory(&dir, &Recorder::default());
    let pair = factory
        .create_value("(#counter, #counter)", botexpr::ValueType::List, &namespace())
        .unwrap();
    match pair.generate(&event(1)).unwrap() {
        botexpr::Value::List(items) => assert_ne!(items[0], items[1]),
        other => panic!("unexpected {:?}", other),
    }
}
