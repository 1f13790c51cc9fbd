use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc, Mutex,
};

use botexpr::{
    cache::CachingStrategy,
    catalog::{GeneratedReference, Invocation, OperationResult},
    EngineConfig, ExpressionFactory, FromValue, Namespace, Operation, OperationCatalog, Provider,
    Value, ValueType,
};
use tempfile::TempDir;

pub const CONTROLLER: &str = "bot.TestController";

/// Records operation invocations in call order.
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    pub fn record(&self, name: &str) {
        self.0.lock().unwrap().push(name.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls().iter().filter(|call| *call == name).count()
    }
}

fn recorded<F>(
    log: &Recorder,
    name: &'static str,
    value: F,
) -> impl Fn(&Invocation) -> OperationResult + Send + Sync + 'static
where
    F: Fn() -> Value + Send + Sync + 'static,
{
    let log = log.clone();
    move |_: &Invocation| {
        log.record(name);
        Ok(value())
    }
}

pub fn catalog(log: &Recorder) -> OperationCatalog {
    let counter = Arc::new(AtomicI64::new(0));
    let set_log = log.clone();

    let controller = Provider::new(CONTROLLER)
        .with(
            Operation::reference("getOne")
                .returns(ValueType::Int)
                .invoke(recorded(log, "getOne", || Value::Int(1))),
        )
        .with(
            Operation::reference("getTwo")
                .returns(ValueType::Int)
                .invoke(recorded(log, "getTwo", || Value::Int(2))),
        )
        .with(
            Operation::reference("getNull")
                .returns(ValueType::String)
                .invoke(|_| Ok(Value::Null)),
        )
        .with(
            Operation::reference("getText")
                .returns(ValueType::String)
                .invoke(|_| Ok("123".into())),
        )
        .with(
            Operation::reference("first")
                .returns(ValueType::Bool)
                .invoke(recorded(log, "first", || Value::Bool(true))),
        )
        .with(
            Operation::reference("third")
                .returns(ValueType::Bool)
                .invoke(recorded(log, "third", || Value::Bool(false))),
        )
        .with(
            Operation::reference("doBranch")
                .returns(ValueType::Int)
                .invoke(recorded(log, "doBranch", || Value::Int(10))),
        )
        .with(
            Operation::reference("elseBranch")
                .returns(ValueType::Int)
                .invoke(recorded(log, "elseBranch", || Value::Int(20))),
        )
        .with(
            Operation::reference("xor")
                .param(ValueType::Bool)
                .param(ValueType::Bool)
                .returns(ValueType::Bool)
                .invoke(|call| Ok((call.arg::<bool>(0)? ^ call.arg::<bool>(1)?).into())),
        )
        .with(
            Operation::reference("consume")
                .param(ValueType::String)
                .returns(ValueType::String)
                .invoke(|call| Ok(format!("{}A", call.args.value(0)?).into())),
        )
        .with(
            Operation::reference("add")
                .param(ValueType::Int)
                .variadic(ValueType::Int)
                .returns(ValueType::Long)
                .invoke(|call| {
                    let first: i32 = call.arg(0)?;
                    let rest: Vec<Value> = call.arg(1)?;
                    let rest: i64 = rest
                        .into_iter()
                        .map(i64::from_value)
                        .sum::<Result<i64, _>>()?;
                    Ok((first as i64 + rest).into())
                }),
        )
        .with(
            Operation::reference("setNum")
                .param(ValueType::Int)
                .returns(ValueType::Int)
                .invoke(move |call| {
                    set_log.record("setNum");
                    Ok(Value::Int(call.arg(0)?))
                }),
        )
        .with(
            Operation::reference("counter")
                .returns(ValueType::Long)
                .caching(CachingStrategy::Update)
                .invoke(move |_| Ok((counter.fetch_add(1, Ordering::SeqCst) + 1).into())),
        )
        .with(
            Operation::reference("greetName")
                .hidden(ValueType::String)
                .returns(ValueType::String)
                .invoke(|call| Ok(call.args.value(0)?.clone())),
        )
        .with(
            Operation::reference("not")
                .param(ValueType::Bool)
                .returns(ValueType::Bool)
                .invoke(|call| Ok(Value::Bool(call.arg(0)?))),
        )
        .with(
            Operation::generator("pow")
                .param(ValueType::Int)
                .input(ValueType::Int)
                .returns(ValueType::Long)
                .generate(|args| {
                    let exponent: i32 = args.get(0)?;
                    Ok(GeneratedReference::new(move |call| {
                        let base: i32 = call.arg(0)?;
                        Ok((base as i64).pow(exponent as u32).into())
                    }))
                }),
        );

    let ignored = Provider::new("if_ignore.Class").with(
        Operation::reference("method")
            .as_static()
            .returns(ValueType::String)
            .invoke(|_| Ok("ignored".into())),
    );

    OperationCatalog::new()
        .with_provider(controller)
        .with_provider(ignored)
}

pub fn config(dir: &TempDir) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.snippet.cache_dir = dir.path().to_path_buf();
    config
}

pub fn factory(dir: &TempDir, log: &Recorder) -> ExpressionFactory {
    ExpressionFactory::new(Arc::new(catalog(log)), config(dir))
}

pub fn namespace() -> Namespace {
    Namespace::new().with_controller(CONTROLLER)
}
