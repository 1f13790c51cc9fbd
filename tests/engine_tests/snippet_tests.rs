use std::{fs, thread};

use botexpr::{
    snippet::{SnippetCompiler, SnippetError},
    Error, ResourcePool,
};
use tempfile::TempDir;

use super::fixtures::{catalog, config, factory, namespace, Recorder};

#[test]
fn test_snippet_and_literal_agree() {
    let dir = TempDir::new().unwrap();
    let factory = factory(&dir, &Recorder::default());
    let ns = namespace();
    let snippet = factory.create::<i32>("${1+2}", &ns).unwrap();
    let literal = factory.create::<i32>("3", &ns).unwrap();
    assert_eq!(snippet.generate(&ResourcePool::new()).unwrap(), 3);
    assert_eq!(literal.generate(&ResourcePool::new()).unwrap(), 3);
    assert!(snippet.is_constant());
}

#[test]
fn test_snippet_calls_operations_per_evaluation() {
    let dir = TempDir::new().unwrap();
    let log = Recorder::default();
    let factory = factory(&dir, &log);
    let value = factory
        .create::<i64>("${#getTwo * 3 + 1}", &namespace())
        .unwrap();
    assert!(!value.is_constant());
    assert_eq!(value.generate(&ResourcePool::new()).unwrap(), 7);
    assert_eq!(value.generate(&ResourcePool::new()).unwrap(), 7);
    assert_eq!(log.count("getTwo"), 2);
}

#[test]
fn test_raw_argument_is_a_snippet() {
    let dir = TempDir::new().unwrap();
    let factory = factory(&dir, &Recorder::default());
    let value = factory
        .create::<String>("#consume(#getTwo + 1)", &namespace())
        .unwrap();
    assert_eq!(value.generate(&ResourcePool::new()).unwrap(), "3A");
}

#[test]
fn test_artifact_reused_across_factories() {
    let dir = TempDir::new().unwrap();
    let ns = namespace();
    let hash = SnippetCompiler::fingerprint("#getTwo * 5", &ns);

    let first = factory(&dir, &Recorder::default());
    first.create::<i64>("${#getTwo * 5}", &ns).unwrap();
    let path = first.snippets().artifact_path(&hash);
    let written = fs::read_to_string(&path).unwrap();

    let second = factory(&dir, &Recorder::default());
    let value = second.create::<i64>("${#getTwo * 5}", &ns).unwrap();
    assert_eq!(value.generate(&ResourcePool::new()).unwrap(), 10);
    assert_eq!(fs::read_to_string(&path).unwrap(), written);
}

#[test]
fn test_corrupted_artifact_heals() {
    let dir = TempDir::new().unwrap();
    let ns = namespace();
    let factory = factory(&dir, &Recorder::default());
    let path = factory
        .snippets()
        .artifact_path(&SnippetCompiler::fingerprint("1 + 2", &ns));
    fs::write(&path, "{ truncated").unwrap();

    let value = factory.create::<i32>("${1 + 2}", &ns).unwrap();
    assert_eq!(value.generate(&ResourcePool::new()).unwrap(), 3);
    assert!(fs::read_to_string(&path).unwrap().contains("\"version\""));
}

#[test]
fn test_version_mismatch_is_reported() {
    let dir = TempDir::new().unwrap();
    let ns = namespace();
    let factory = factory(&dir, &Recorder::default());
    let hash = SnippetCompiler::fingerprint("1 + 2", &ns);
    let stale = format!(
        r#"{{"version":99,"hash":"{}","source":"1 + 2","tree":{{"kind":"literal","value":{{"type":"integer","value":3}}}}}}"#,
        hash
    );
    fs::write(factory.snippets().artifact_path(&hash), stale).unwrap();

    assert!(matches!(
        factory.create::<i32>("${1 + 2}", &ns),
        Err(Error::Snippet(SnippetError::VersionMismatch { found: 99, .. }))
    ));
}

#[test]
fn test_unknown_snippet_function() {
    let dir = TempDir::new().unwrap();
    let factory = factory(&dir, &Recorder::default());
    assert!(matches!(
        factory.create::<i32>("${missing(1)}", &namespace()),
        Err(Error::Snippet(SnippetError::UnknownFunction { .. }))
    ));
}

#[test]
fn test_concurrent_compiles_share_one_artifact() {
    let dir = TempDir::new().unwrap();
    let catalog = catalog(&Recorder::default());
    let ns = namespace();
    let settings = config(&dir).snippet;
    let expected = SnippetCompiler::fingerprint("#getTwo * 3 + 1", &ns);
    let path = SnippetCompiler::new(&settings).artifact_path(&expected);

    let (settings, catalog, ns) = (&settings, &catalog, &ns);
    for round in 0..24 {
        let results: Vec<Result<String, SnippetError>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(move || {
                        SnippetCompiler::new(settings)
                            .compile("#getTwo * 3 + 1", catalog, ns)
                            .map(|unit| unit.hash().to_string())
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for result in results {
            assert_eq!(result.unwrap(), expected, "round {}", round);
        }
        assert!(path.exists());
        if round % 2 == 0 {
            fs::remove_file(&path).unwrap();
        }
    }

    let files: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(files, vec![path]);
}

#[test]
fn test_stale_bindings_are_rebuilt() {
    let dir = TempDir::new().unwrap();
    let ns = namespace();
    let factory = factory(&dir, &Recorder::default());
    let hash = SnippetCompiler::fingerprint("#getTwo + 1", &ns);
    let stale = format!(
        r##"{{"version":1,"hash":"{}","source":"#getTwo + 1","tree":{{"kind":"call","owner":null,"name":"removed","args":[]}}}}"##,
        hash
    );
    let path = factory.snippets().artifact_path(&hash);
    fs::write(&path, stale).unwrap();

    let value = factory.create::<i64>("${#getTwo + 1}", &ns).unwrap();
    assert_eq!(value.generate(&ResourcePool::new()).unwrap(), 3);
    assert!(!fs::read_to_string(&path).unwrap().contains("removed"));
}
