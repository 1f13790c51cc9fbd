//! # Operation Catalog
//!
//! Named callables exposed to expressions. Providers register their operations
//! explicitly at startup; the catalog is read-only afterwards and is shared behind
//! an `Arc`.
//!
//! ## Resolution
//!
//! * `#name` searches the active provider of the [`Namespace`] first, then the
//!   built-ins. A provider operation shadows a built-in of the same name.
//! * `Owner#name` searches only the static operations of providers whose full name
//!   or simple name (the part after the last `.`) equals `Owner`.
//!
//! Generator references (`::name`) resolve the same way but only match generator
//! operations.

pub mod builtin;

use std::{any::Any, collections::HashMap, fmt, marker::PhantomData, sync::Arc};

use crate::{
    cache::CachingStrategy,
    eval::ResourcePool,
    tokenizer::ReferenceToken,
    types::{FromValue, Resource, Value, ValueType},
};

pub type OperationError = Box<dyn std::error::Error + Send + Sync>;
pub type OperationResult = Result<Value, OperationError>;

type Invoker = Arc<dyn Fn(&Invocation) -> OperationResult + Send + Sync>;
type Generator = Arc<dyn Fn(&Arguments) -> Result<GeneratedReference, OperationError> + Send + Sync>;

/// Positional argument values with typed accessors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: Vec<Value>,
}

impl Arguments {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, index: usize) -> Result<&Value, OperationError> {
        self.values
            .get(index)
            .ok_or_else(|| format!("missing argument {}", index).into())
    }

    pub fn get<T: FromValue>(&self, index: usize) -> Result<T, OperationError> {
        let value = self.value(index)?.clone();
        Ok(T::from_value(value)?)
    }

    /// Downcasts a [`Value::Resource`] argument.
    pub fn resource<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>, OperationError> {
        match self.value(index)? {
            Value::Resource(resource) => resource.downcast_arc::<T>().ok_or_else(|| {
                format!("argument {} is not a {}", index, std::any::type_name::<T>()).into()
            }),
            other => Err(format!("argument {} is {}, not a resource", index, other.value_type()).into()),
        }
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.values
    }
}

/// One call of an operation: its arguments in declared parameter order (hidden
/// parameters included) and the pool of the current evaluation.
pub struct Invocation<'p> {
    pub args: Arguments,
    pub pool: &'p ResourcePool,
}

impl Invocation<'_> {
    pub fn arg<T: FromValue>(&self, index: usize) -> Result<T, OperationError> {
        self.args.get(index)
    }

    pub fn resource<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>, OperationError> {
        self.args.resource(index)
    }
}

/// The function returned by a generator operation.
#[derive(Clone)]
pub struct GeneratedReference {
    function: Invoker,
}

impl GeneratedReference {
    pub fn new<F>(function: F) -> Self
    where
        F: Fn(&Invocation) -> OperationResult + Send + Sync + 'static,
    {
        Self {
            function: Arc::new(function),
        }
    }

    pub fn call(&self, invocation: &Invocation) -> OperationResult {
        (self.function)(invocation)
    }
}

impl fmt::Debug for GeneratedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("GeneratedReference")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub ty: ValueType,
    /// Supplied from the resource pool, never from piped or explicit input
    pub hidden: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Reference,
    Generator,
}

enum Body {
    Reference(Invoker),
    Generator { generate: Generator, inputs: Vec<ValueType> },
}

/// A registered operation: its signature plus a type-erased body.
pub struct Operation {
    name: String,
    provider: String,
    params: Vec<Parameter>,
    returns: ValueType,
    is_static: bool,
    variadic: bool,
    placeholder: bool,
    caching: CachingStrategy,
    body: Body,
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("provider", &self.provider)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .field("is_static", &self.is_static)
            .field("kind", &self.kind())
            .finish()
    }
}

impl Operation {
    pub fn reference(name: impl Into<String>) -> OperationBuilder {
        OperationBuilder::new(name.into())
    }

    pub fn generator(name: impl Into<String>) -> OperationBuilder {
        OperationBuilder::new(name.into())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn qualified_name(&self) -> String {
        format!("{}#{}", self.provider, self.name)
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn visible_params(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter().filter(|p| !p.hidden)
    }

    pub fn returns(&self) -> &ValueType {
        &self.returns
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// The last visible parameter collects all remaining explicit arguments.
    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    /// Marks a reference that exists only as a stand-in and fails when evaluated.
    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn caching(&self) -> CachingStrategy {
        self.caching
    }

    pub fn kind(&self) -> ReferenceKind {
        match self.body {
            Body::Reference(_) => ReferenceKind::Reference,
            Body::Generator { .. } => ReferenceKind::Generator,
        }
    }

    /// Input types of the generated reference; empty for plain references.
    pub fn generated_inputs(&self) -> &[ValueType] {
        match &self.body {
            Body::Generator { inputs, .. } => inputs,
            Body::Reference(_) => &[],
        }
    }

    pub fn invoke(&self, invocation: &Invocation) -> OperationResult {
        match &self.body {
            Body::Reference(invoker) => invoker(invocation),
            Body::Generator { .. } => Err(format!("{} is a generator", self.name).into()),
        }
    }

    pub fn generate(&self, args: &Arguments) -> Result<GeneratedReference, OperationError> {
        match &self.body {
            Body::Generator { generate, .. } => generate(args),
            Body::Reference(_) => Err(format!("{} is not a generator", self.name).into()),
        }
    }
}

/// Builder state that still accepts positional parameters.
pub struct Open;

/// Builder state after a variadic parameter. The variadic parameter stays the last
/// visible one, so `param` and `variadic` are no longer available.
///
/// ```compile_fail
/// use botexpr::{Operation, ValueType};
///
/// let _ = Operation::reference("add")
///     .variadic(ValueType::Int)
///     .param(ValueType::Int);
/// ```
pub struct Variadic;

#[must_use]
pub struct OperationBuilder<S = Open> {
    name: String,
    params: Vec<Parameter>,
    inputs: Vec<ValueType>,
    returns: ValueType,
    is_static: bool,
    variadic: bool,
    placeholder: bool,
    caching: CachingStrategy,
    state: PhantomData<S>,
}

impl OperationBuilder<Open> {
    fn new(name: String) -> Self {
        Self {
            name,
            params: Vec::new(),
            inputs: Vec::new(),
            returns: ValueType::Void,
            is_static: false,
            variadic: false,
            placeholder: false,
            caching: CachingStrategy::None,
            state: PhantomData,
        }
    }

    pub fn param(mut self, ty: ValueType) -> Self {
        self.params.push(Parameter { ty, hidden: false });
        self
    }

    /// Adds a trailing parameter that receives the remaining explicit arguments as a
    /// list of `ty`.
    pub fn variadic(mut self, ty: ValueType) -> OperationBuilder<Variadic> {
        self.params.push(Parameter { ty, hidden: false });
        OperationBuilder {
            name: self.name,
            params: self.params,
            inputs: self.inputs,
            returns: self.returns,
            is_static: self.is_static,
            variadic: true,
            placeholder: self.placeholder,
            caching: self.caching,
            state: PhantomData,
        }
    }
}

impl<S> OperationBuilder<S> {
    pub fn hidden(mut self, ty: ValueType) -> Self {
        self.params.push(Parameter { ty, hidden: true });
        self
    }

    /// Declares an input of the reference a generator produces.
    pub fn input(mut self, ty: ValueType) -> Self {
        self.inputs.push(ty);
        self
    }

    pub fn returns(mut self, ty: ValueType) -> Self {
        self.returns = ty;
        self
    }

    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn placeholder(mut self) -> Self {
        self.placeholder = true;
        self
    }

    pub fn caching(mut self, strategy: CachingStrategy) -> Self {
        self.caching = strategy;
        self
    }

    fn build(self, body: Body) -> Operation {
        Operation {
            name: self.name,
            provider: String::new(),
            params: self.params,
            returns: self.returns,
            is_static: self.is_static,
            variadic: self.variadic,
            placeholder: self.placeholder,
            caching: self.caching,
            body,
        }
    }

    pub fn invoke<F>(self, invoker: F) -> Operation
    where
        F: Fn(&Invocation) -> OperationResult + Send + Sync + 'static,
    {
        self.build(Body::Reference(Arc::new(invoker)))
    }

    pub fn generate<F>(self, generator: F) -> Operation
    where
        F: Fn(&Arguments) -> Result<GeneratedReference, OperationError> + Send + Sync + 'static,
    {
        let inputs = self.inputs.clone();
        self.build(Body::Generator {
            generate: Arc::new(generator),
            inputs,
        })
    }
}

/// A named group of operations, typically one controller or utility type.
#[derive(Debug)]
pub struct Provider {
    name: String,
    operations: Vec<Arc<Operation>>,
}

impl Provider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operations: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The part after the last `.` of the provider name.
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    pub fn register(&mut self, mut operation: Operation) {
        operation.provider = self.name.clone();
        self.operations.push(Arc::new(operation));
    }

    pub fn with(mut self, operation: Operation) -> Self {
        self.register(operation);
        self
    }

    pub fn operations(&self) -> &[Arc<Operation>] {
        &self.operations
    }

    fn matching<'a>(
        &'a self,
        name: &'a str,
        kind: ReferenceKind,
        static_only: bool,
    ) -> impl Iterator<Item = &'a Arc<Operation>> {
        self.operations.iter().filter(move |op| {
            op.name == name && op.kind() == kind && (!static_only || op.is_static)
        })
    }
}

/// The active provider and the providers imported by the current document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespace {
    controller: Option<String>,
    imports: Vec<String>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_controller(mut self, provider: impl Into<String>) -> Self {
        self.controller = Some(provider.into());
        self
    }

    pub fn with_import(mut self, provider: impl Into<String>) -> Self {
        self.imports.push(provider.into());
        self
    }

    pub fn controller(&self) -> Option<&str> {
        self.controller.as_deref()
    }

    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    pub fn sorted_imports(&self) -> Vec<&str> {
        let mut imports: Vec<&str> = self.imports.iter().map(String::as_str).collect();
        imports.sort_unstable();
        imports.dedup();
        imports
    }
}

#[derive(Debug)]
pub struct OperationCatalog {
    providers: HashMap<String, Provider>,
    builtins: Provider,
}

impl Default for OperationCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationCatalog {
    /// A catalog holding the built-in operations only.
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            builtins: builtin::provider(),
        }
    }

    /// A catalog without built-ins.
    pub fn empty() -> Self {
        Self {
            providers: HashMap::new(),
            builtins: Provider::new(builtin::BUILTIN_PROVIDER),
        }
    }

    pub fn register(&mut self, provider: Provider) {
        self.providers.insert(provider.name.clone(), provider);
    }

    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.register(provider);
        self
    }

    pub fn provider(&self, name: &str) -> Option<&Provider> {
        self.providers.get(name)
    }

    pub fn builtins(&self) -> &Provider {
        &self.builtins
    }

    /// All operations `reference` may denote, after precedence is applied.
    ///
    /// An empty result means unknown; more than one means ambiguous.
    pub fn candidates(
        &self,
        reference: &ReferenceToken,
        kind: ReferenceKind,
        namespace: &Namespace,
    ) -> Vec<Arc<Operation>> {
        let name = reference.name.as_str();
        match &reference.owner {
            Some(owner) => self
                .owners(owner, namespace)
                .into_iter()
                .flat_map(|provider| provider.matching(name, kind, true))
                .cloned()
                .collect(),
            None => {
                let active: Vec<Arc<Operation>> = namespace
                    .controller()
                    .and_then(|controller| self.providers.get(controller))
                    .map(|provider| provider.matching(name, kind, false).cloned().collect())
                    .unwrap_or_default();
                if !active.is_empty() {
                    return active;
                }
                self.builtins.matching(name, kind, false).cloned().collect()
            }
        }
    }

    /// Providers an owner qualifier can refer to: a registered full name, or the
    /// simple name of the controller or an import.
    fn owners<'a>(&'a self, owner: &str, namespace: &Namespace) -> Vec<&'a Provider> {
        let mut owners: Vec<&Provider> = self.providers.get(owner).into_iter().collect();
        let visible = namespace
            .controller()
            .into_iter()
            .chain(namespace.sorted_imports());
        for provider in visible.filter_map(|name| self.providers.get(name)) {
            if provider.simple_name() == owner && !owners.iter().any(|p| p.name == provider.name) {
                owners.push(provider);
            }
        }
        if owner == self.builtins.name {
            owners.push(&self.builtins);
        }
        owners
    }
}

/// Wraps any host object for the pool or for an operation argument.
pub fn resource<T: Any + Send + Sync>(type_name: impl Into<String>, value: T) -> Value {
    Value::Resource(Resource::new(type_name, value))
}
