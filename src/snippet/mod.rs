//! # Host Snippets
//!
//! Fallback for text the structured grammar rejects: the body of a `${...}` block
//! is an arithmetic/boolean expression with calls into the catalog, e.g.
//! `${#getTwo * 3 + 1}` or `${Utils.pow(2, 8) > 100 ? 'big' : 'small'}`.
//!
//! Compiled snippets are persisted as artifacts under the configured cache
//! directory, named `Expression<hash>.json`. The hash covers the snippet text,
//! the artifact format version, the controller and the sorted imports, so the
//! same text compiled for another namespace gets its own artifact.
//!
//! An artifact that cannot be loaded (unreadable, written for another text, or
//! calling operations the catalog no longer binds) is deleted and rebuilt once.
//! An artifact that reads fine but carries another format version is reported
//! as [`SnippetError::VersionMismatch`].

pub mod ast;
pub mod parser;

use std::{
    collections::HashMap,
    fs::{self, File},
    io::{BufReader, ErrorKind, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use dashmap::DashMap;
use ring::digest;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    catalog::{Namespace, Operation, OperationCatalog, ReferenceKind},
    config::SnippetConfig,
    error::SourceLocation,
    eval::{EvaluationResult, ResourcePool},
    tokenizer::ReferenceToken,
    types::Value,
};

pub use ast::SnippetExpr;
pub use parser::parse_snippet;

/// Format version of persisted artifacts.
pub const SNIPPET_VERSION: u32 = 1;

/// Owner name that addresses the active provider inside a snippet.
pub const CONTROLLER_OWNER: &str = "controller";

#[derive(Error, Debug)]
pub enum SnippetError {
    #[error("Syntax error at position {position}: {message}")]
    Syntax { message: String, position: usize },
    #[error("Unknown function {name}")]
    UnknownFunction { name: String },
    #[error("Ambiguous function {name}: {candidates} candidates")]
    AmbiguousFunction { name: String, candidates: usize },
    #[error("Function {name} takes {expected} argument(s), {found} given")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid artifact {path}: {message}")]
    Artifact { path: PathBuf, message: String },
    #[error("Artifact {path} has version {found}, expected {expected}")]
    VersionMismatch {
        path: PathBuf,
        found: u32,
        expected: u32,
    },
    #[error("Snippet compilation is disabled")]
    Disabled,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SnippetError + '_ {
    move |source| SnippetError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Artifact {
    version: u32,
    hash: String,
    source: String,
    tree: SnippetExpr,
}

/// A snippet tree with its calls bound to catalog operations.
#[derive(Debug)]
pub struct CompiledSnippet {
    hash: String,
    source: String,
    tree: SnippetExpr,
    bindings: HashMap<String, Arc<Operation>>,
}

impl CompiledSnippet {
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tree(&self) -> &SnippetExpr {
        &self.tree
    }

    /// True when the snippet calls nothing, so its value never changes.
    pub fn is_pure(&self) -> bool {
        self.bindings.is_empty()
    }

    #[tracing::instrument(level = "debug", skip(self, pool), fields(hash = %self.hash))]
    pub fn evaluate(&self, pool: &ResourcePool, location: &SourceLocation) -> EvaluationResult<Value> {
        ast::Interpreter {
            bindings: &self.bindings,
            pool,
            location,
        }
        .evaluate(&self.tree)
    }
}

pub struct SnippetCompiler {
    cache_dir: PathBuf,
    enabled: bool,
    loaded: DashMap<String, Arc<CompiledSnippet>>,
}

impl SnippetCompiler {
    pub fn new(config: &SnippetConfig) -> Self {
        Self {
            cache_dir: config.cache_dir.clone(),
            enabled: config.enabled,
            loaded: DashMap::new(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Content hash of a snippet compiled within `namespace`, hex encoded.
    pub fn fingerprint(text: &str, namespace: &Namespace) -> String {
        let mut context = digest::Context::new(&digest::SHA256);
        context.update(text.as_bytes());
        context.update(&[0]);
        context.update(&SNIPPET_VERSION.to_be_bytes());
        context.update(namespace.controller().unwrap_or_default().as_bytes());
        for import in namespace.sorted_imports() {
            context.update(&[0]);
            context.update(import.as_bytes());
        }
        context
            .finish()
            .as_ref()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    pub fn artifact_path(&self, hash: &str) -> PathBuf {
        self.cache_dir.join(format!("Expression{}.json", hash))
    }

    #[tracing::instrument(level = "debug", skip(self, catalog, namespace))]
    pub fn compile(
        &self,
        text: &str,
        catalog: &OperationCatalog,
        namespace: &Namespace,
    ) -> Result<Arc<CompiledSnippet>, SnippetError> {
        if !self.enabled {
            return Err(SnippetError::Disabled);
        }
        let hash = Self::fingerprint(text, namespace);
        if let Some(unit) = self.loaded.get(&hash) {
            return Ok(unit.clone());
        }

        let (tree, bindings) = self.load_or_build(&hash, text, catalog, namespace)?;
        let unit = Arc::new(CompiledSnippet {
            hash: hash.clone(),
            source: text.to_string(),
            tree,
            bindings,
        });
        self.loaded.insert(hash, unit.clone());
        Ok(unit)
    }

    fn load_or_build(
        &self,
        hash: &str,
        text: &str,
        catalog: &OperationCatalog,
        namespace: &Namespace,
    ) -> Result<Bound, SnippetError> {
        let path = self.artifact_path(hash);
        if path.exists() {
            match load(&path, hash, text, catalog, namespace) {
                Ok(bound) => return Ok(bound),
                Err(e @ SnippetError::VersionMismatch { .. }) => return Err(e),
                Err(e) => {
                    warn!("Discarding artifact {}: {}", path.display(), e);
                    discard(&path)?;
                }
            }
        }

        let built = self.build(hash, text, &path, catalog, namespace)?;
        match load(&path, hash, text, catalog, namespace) {
            Err(SnippetError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
                debug!("Artifact {} was replaced concurrently", path.display());
                Ok(built)
            }
            loaded => loaded,
        }
    }

    fn build(
        &self,
        hash: &str,
        text: &str,
        path: &Path,
        catalog: &OperationCatalog,
        namespace: &Namespace,
    ) -> Result<Bound, SnippetError> {
        fs::create_dir_all(&self.cache_dir).map_err(io_error(&self.cache_dir))?;

        let prefix = format!("Expression{}", hash);
        let mut source = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".src")
            .tempfile_in(&self.cache_dir)
            .map_err(io_error(&self.cache_dir))?;
        source.write_all(text.as_bytes()).map_err(io_error(source.path()))?;
        source.flush().map_err(io_error(source.path()))?;

        let tree = parse_snippet(text)?;
        let bindings = bind(&tree, catalog, namespace)?;

        let artifact = Artifact {
            version: SNIPPET_VERSION,
            hash: hash.to_string(),
            source: text.to_string(),
            tree,
        };
        let json = serde_json::to_vec_pretty(&artifact).map_err(|e| SnippetError::Artifact {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut temp_file = NamedTempFile::new_in(&self.cache_dir).map_err(io_error(&self.cache_dir))?;
        temp_file.write_all(&json).map_err(io_error(path))?;
        temp_file.flush().map_err(io_error(path))?;
        temp_file
            .persist(path)
            .map_err(|e| io_error(path)(e.error))?;

        let source_path = source.path().to_path_buf();
        source.close().map_err(io_error(&source_path))?;
        info!("Compiled snippet artifact {}", path.display());
        Ok((artifact.tree, bindings))
    }
}

type Bound = (SnippetExpr, HashMap<String, Arc<Operation>>);

/// Reads the artifact at `path`, checks it belongs to `text` and binds its calls.
fn load(
    path: &Path,
    hash: &str,
    text: &str,
    catalog: &OperationCatalog,
    namespace: &Namespace,
) -> Result<Bound, SnippetError> {
    let artifact = read_artifact(path)?;
    if artifact.version != SNIPPET_VERSION {
        return Err(SnippetError::VersionMismatch {
            path: path.to_path_buf(),
            found: artifact.version,
            expected: SNIPPET_VERSION,
        });
    }
    if artifact.hash != hash || artifact.source != text {
        return Err(SnippetError::Artifact {
            path: path.to_path_buf(),
            message: format!("holds '{}', expected '{}'", artifact.source, text),
        });
    }
    let bindings = bind(&artifact.tree, catalog, namespace)?;
    debug!("Loaded snippet artifact {}", path.display());
    Ok((artifact.tree, bindings))
}

fn discard(path: &Path) -> Result<(), SnippetError> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(io_error(path)(e)),
        _ => Ok(()),
    }
}

fn read_artifact(path: &Path) -> Result<Artifact, SnippetError> {
    let file = File::open(path).map_err(io_error(path))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| SnippetError::Artifact {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Resolves every call in `tree` against the catalog and checks its arity.
fn bind(
    tree: &SnippetExpr,
    catalog: &OperationCatalog,
    namespace: &Namespace,
) -> Result<HashMap<String, Arc<Operation>>, SnippetError> {
    let mut calls = Vec::new();
    tree.for_each_call(&mut |owner, name, found| calls.push((owner, name, found)));

    let mut bindings: HashMap<String, Arc<Operation>> = HashMap::new();
    for (owner, name, found) in calls {
        let key = SnippetExpr::call_key(owner, name);
        let operation = match bindings.get(&key) {
            Some(operation) => operation.clone(),
            None => {
                let mut candidates = resolve(owner, name, catalog, namespace);
                match candidates.len() {
                    0 => return Err(SnippetError::UnknownFunction { name: key }),
                    1 => candidates.remove(0),
                    n => {
                        return Err(SnippetError::AmbiguousFunction {
                            name: key,
                            candidates: n,
                        })
                    }
                }
            }
        };

        let visible = operation.visible_params().count();
        let expected = visible - usize::from(operation.is_variadic());
        if found < expected || (!operation.is_variadic() && found > expected) {
            return Err(SnippetError::Arity {
                name: key,
                expected,
                found,
            });
        }
        bindings.insert(key, operation);
    }
    Ok(bindings)
}

fn resolve(
    owner: Option<&str>,
    name: &str,
    catalog: &OperationCatalog,
    namespace: &Namespace,
) -> Vec<Arc<Operation>> {
    match owner {
        Some(CONTROLLER_OWNER) => namespace
            .controller()
            .and_then(|controller| catalog.provider(controller))
            .map(|provider| {
                provider
                    .operations()
                    .iter()
                    .filter(|op| op.name() == name && op.kind() == ReferenceKind::Reference)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default(),
        Some(owner) => catalog.candidates(
            &ReferenceToken::new(name).with_owner(owner),
            ReferenceKind::Reference,
            namespace,
        ),
        None => catalog.candidates(&ReferenceToken::new(name), ReferenceKind::Reference, namespace),
    }
}
