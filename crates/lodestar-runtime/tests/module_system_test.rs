//! Module system integration tests
//!
//! Drives the assembled runtime end to end over in-memory storage:
//! resolution, caching, dispatch, pipelines, and the retry evaluator.

use async_trait::async_trait;
use bytes::Bytes;
use lodestar_runtime::{
    CodeInvoker, MemoryReader, ModuleLoad, PackageDescriptor, PackageRegistry, ResourceReader,
    Result, Runtime, RuntimeError, RuntimeOptions, SourceTransform, Strategy, Value,
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Storage that counts reads per location and can slow them down.
struct CountingReader {
    inner: MemoryReader,
    reads: RefCell<HashMap<PathBuf, usize>>,
    delay_ms: u64,
}

impl CountingReader {
    fn new(delay_ms: u64) -> Self {
        Self {
            inner: MemoryReader::new(),
            reads: RefCell::new(HashMap::new()),
            delay_ms,
        }
    }

    fn insert(&self, location: &str, contents: &str) {
        self.inner.insert(location, contents);
    }

    fn reads_of(&self, location: &str) -> usize {
        self.reads
            .borrow()
            .get(Path::new(location))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait(?Send)]
impl ResourceReader for CountingReader {
    async fn read(&self, location: &Path) -> io::Result<Bytes> {
        *self
            .reads
            .borrow_mut()
            .entry(location.to_path_buf())
            .or_insert(0) += 1;
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        self.inner.read(location).await
    }
}

fn demo_registry() -> PackageRegistry {
    let mut registry = PackageRegistry::new();
    registry.insert("app", PackageDescriptor::new("app").with_main("main"));
    registry.insert("dep", PackageDescriptor::new("deps"));
    registry
}

fn demo_runtime(reader: Rc<CountingReader>) -> Runtime {
    Runtime::new(RuntimeOptions::new(demo_registry()).with_storage(reader))
}

#[tokio::test]
async fn loads_a_module_graph_end_to_end() {
    let reader = Rc::new(CountingReader::new(0));
    reader.insert(
        "app/main.lds",
        "var one = require(\"dep/one\");\nexports.total = one.base + 1;",
    );
    reader.insert("deps/one.lds", "exports.base = 41;");

    let runtime = demo_runtime(reader.clone());
    let bindings = runtime.load_module("app/main").await.unwrap();

    assert_eq!(bindings.get_member("total"), Some(Value::Number(42.0)));
    assert_eq!(runtime.strategy(), Strategy::NativeAsync);
    assert_eq!(reader.reads_of("app/main.lds"), 1);
    assert_eq!(reader.reads_of("deps/one.lds"), 1);
}

#[tokio::test]
async fn repeat_requests_are_memoized_by_identifier() {
    let reader = Rc::new(CountingReader::new(0));
    reader.insert("app/main.lds", "exports.stamp = {};");

    let runtime = demo_runtime(reader.clone());
    let first = runtime.load_module("app/main").await.unwrap();
    let second = runtime.load_module("app/main").await.unwrap();

    // Same evaluation, same exports object
    assert_eq!(first, second);
    assert_eq!(reader.reads_of("app/main.lds"), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_requests_share_one_load_and_invoke() {
    let reader = Rc::new(CountingReader::new(50));
    reader.insert("app/main.lds", "exports.stamp = {};");

    let runtime = demo_runtime(reader.clone());
    let (a, b) = futures::join!(
        runtime.load_module("app/main"),
        runtime.load_module("app/main")
    );

    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(reader.reads_of("app/main.lds"), 1);
}

#[tokio::test]
async fn sync_require_of_uncached_dependency_retries_and_converges() {
    // Prefetch off: the literal require must be satisfied by the retry
    // loop itself.
    let reader = Rc::new(CountingReader::new(0));
    reader.insert(
        "app/main.lds",
        "var one = require(\"dep/one\");\nvar two = require(\"dep/two\");\nexports.sum = one.n + two.n;",
    );
    reader.insert("deps/one.lds", "exports.n = 40;");
    reader.insert("deps/two.lds", "exports.n = 2;");

    let runtime = Runtime::new(
        RuntimeOptions::new(demo_registry())
            .with_storage(reader.clone())
            .with_prefetch(false),
    );
    let bindings = runtime.load_module("app/main").await.unwrap();

    assert_eq!(bindings.get_member("sum"), Some(Value::Number(42.0)));
    // Each dependency was loaded exactly once despite the re-executions
    assert_eq!(reader.reads_of("deps/one.lds"), 1);
    assert_eq!(reader.reads_of("deps/two.lds"), 1);
}

#[tokio::test]
async fn load_source_returns_text_and_wraps_failures() {
    let reader = Rc::new(CountingReader::new(0));
    reader.insert("deps/one.lds", "exports.n = 1;");

    let runtime = demo_runtime(reader.clone());
    assert_eq!(
        runtime.load_source("dep/one").await.unwrap(),
        "exports.n = 1;"
    );

    let first = runtime.load_source("dep/ghost").await.unwrap_err();
    let RuntimeError::Load {
        identifier,
        location,
        ..
    } = &first
    else {
        panic!("expected load error, got {first:?}");
    };
    assert_eq!(identifier, "dep/ghost");
    assert_eq!(location, "deps/ghost.lds");

    // Permanently settled: the failed read is not attempted again
    let second = runtime.load_source("dep/ghost").await.unwrap_err();
    assert_eq!(first, second);
    assert_eq!(reader.reads_of("deps/ghost.lds"), 1);
}

#[tokio::test]
async fn unresolvable_identifier_names_the_original() {
    let runtime = demo_runtime(Rc::new(CountingReader::new(0)));
    let err = runtime.load_module("nowhere/at/all").await.unwrap_err();
    assert_eq!(err, RuntimeError::Resolution("nowhere/at/all".into()));
}

#[tokio::test]
async fn resolution_scenario_through_the_facade() {
    let registry = PackageRegistry::from_manifest(
        r#"{
            "packages": {
                "lib/foo": {
                    "basePath": "libs",
                    "main": "index",
                    "distDir": "dist",
                    "sourceDir": "src"
                }
            }
        }"#,
    )
    .unwrap();
    let runtime = Runtime::new(RuntimeOptions::new(registry));

    assert_eq!(
        runtime.resolve("lib/foo/bar").unwrap(),
        PathBuf::from("libs/bar")
    );
    assert_eq!(
        runtime.resolve_source("lib/foo/bar").unwrap(),
        PathBuf::from("libs/src/bar.lds")
    );
}

#[tokio::test]
async fn resolver_root_and_source_extension_are_configurable() {
    let reader = Rc::new(CountingReader::new(0));
    reader.insert("modules/deps/one.src", "exports.n = 1;");

    let runtime = Runtime::new(
        RuntimeOptions::new(demo_registry())
            .with_storage(reader.clone())
            .with_resolver_root("modules")
            .with_source_extension("src"),
    );

    assert_eq!(
        runtime.resolve_source("dep/one").unwrap(),
        PathBuf::from("modules/deps/one.src")
    );
    let bindings = runtime.load_module("dep/one").await.unwrap();
    assert_eq!(bindings.get_member("n"), Some(Value::Number(1.0)));
}

#[tokio::test]
async fn factory_registration_supersedes_plain_exports() {
    let reader = Rc::new(CountingReader::new(0));
    reader.insert(
        "app/main.lds",
        "exports.plain = 1;\ndefine([\"dep/one\"], function (one) { return { made: one.base + 1 }; });",
    );
    reader.insert("deps/one.lds", "exports.base = 41;");

    let runtime = demo_runtime(reader);
    let bindings = runtime.load_module("app/main").await.unwrap();

    assert_eq!(bindings.get_member("made"), Some(Value::Number(42.0)));
    assert_eq!(bindings.get_member("plain"), None);
}

#[tokio::test]
async fn reassigning_module_exports_replaces_the_bindings() {
    let reader = Rc::new(CountingReader::new(0));
    reader.insert(
        "app/main.lds",
        "exports.dropped = 1;\nmodule.exports = { kept: true };",
    );

    let runtime = demo_runtime(reader);
    let bindings = runtime.load_module("app/main").await.unwrap();

    assert_eq!(bindings.get_member("kept"), Some(Value::Boolean(true)));
    assert_eq!(bindings.get_member("dropped"), None);
}

#[tokio::test]
async fn invoke_code_supports_dynamic_import() {
    let reader = Rc::new(CountingReader::new(0));
    reader.insert("deps/one.lds", "exports.base = 41;");

    let runtime = demo_runtime(reader);
    let bindings = runtime
        .invoke_code("var one = await import(\"dep/one\");\nexports.v = one.base;")
        .await
        .unwrap();

    assert_eq!(bindings.get_member("v"), Some(Value::Number(41.0)));
}

#[tokio::test]
async fn builtin_modules_never_hit_the_loader() {
    let reader = Rc::new(CountingReader::new(0));
    reader.insert(
        "app/main.lds",
        "var math = require(\"math\");\nvar strings = require(\"strings\");\nexports.v = math.abs(-2) + strings.len(\"ab\");",
    );

    let runtime = demo_runtime(reader.clone());
    let bindings = runtime.load_module("app/main").await.unwrap();

    assert_eq!(bindings.get_member("v"), Some(Value::Number(4.0)));
    // Only the module itself was read; builtins resolved from the seed
    assert_eq!(reader.reads.borrow().len(), 1);
}

#[tokio::test]
async fn artifact_pipeline_folds_aliases_to_one_evaluation() {
    let reader = Rc::new(CountingReader::new(0));
    // Two identifiers, one physical artifact
    reader.insert("shared/mod", "exports.token = {};");

    let mut registry = PackageRegistry::new();
    registry.insert("first", PackageDescriptor::new("shared").with_main("mod"));
    registry.insert("second", PackageDescriptor::new("shared").with_main("mod"));

    let runtime = Runtime::new(
        RuntimeOptions::new(registry).with_storage(reader.clone()),
    );
    let a = runtime.load_artifact("first").await.unwrap();
    let b = runtime.load_artifact("second").await.unwrap();

    // Identical exports object: one evaluation, shared result
    assert_eq!(a, b);
    assert_eq!(reader.reads_of("shared/mod"), 1);
}

/// Replaces the placeholder `__ANSWER__` and counts invocations.
struct AnswerTransform {
    calls: Cell<usize>,
}

#[async_trait(?Send)]
impl SourceTransform for AnswerTransform {
    async fn transform(&self, source: String, _identifier: &str) -> Result<String> {
        self.calls.set(self.calls.get() + 1);
        Ok(source.replace("__ANSWER__", "42"))
    }
}

#[tokio::test]
async fn transform_runs_once_per_load() {
    let reader = Rc::new(CountingReader::new(0));
    reader.insert("app/main.lds", "exports.v = __ANSWER__;");

    let transform = Rc::new(AnswerTransform {
        calls: Cell::new(0),
    });
    let runtime = Runtime::new(
        RuntimeOptions::new(demo_registry())
            .with_storage(reader)
            .with_transform(transform.clone()),
    );

    let bindings = runtime.load_module("app/main").await.unwrap();
    assert_eq!(bindings.get_member("v"), Some(Value::Number(42.0)));

    runtime.load_module("app/main").await.unwrap();
    assert_eq!(transform.calls.get(), 1);
}

/// In-memory loader handing out preset bindings, counting loads.
struct MapLoader {
    modules: HashMap<String, Value>,
    calls: RefCell<HashMap<String, usize>>,
}

impl MapLoader {
    fn new(entries: Vec<(&str, Value)>) -> Self {
        Self {
            modules: entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            calls: RefCell::new(HashMap::new()),
        }
    }

    fn calls_for(&self, identifier: &str) -> usize {
        self.calls
            .borrow()
            .get(identifier)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait(?Send)]
impl ModuleLoad for MapLoader {
    async fn load_module(&self, identifier: &str) -> Result<Value> {
        *self
            .calls
            .borrow_mut()
            .entry(identifier.to_string())
            .or_insert(0) += 1;
        self.modules
            .get(identifier)
            .cloned()
            .ok_or_else(|| RuntimeError::Resolution(identifier.to_string()))
    }
}

const PROBED_BODY: &str = "\
var probe = require(\"probe\");
probe.runs = probe.runs + 1;
var a = require(\"dep/a\");
var b = require(\"dep/b\");
exports.done = a.ok && b.ok;";

fn dep(ok: bool) -> Value {
    Value::object_from([("ok".to_string(), Value::Boolean(ok))])
}

#[tokio::test]
async fn without_prefetch_each_missing_dependency_restarts_the_body() {
    let probe = Value::object_from([("runs".to_string(), Value::Number(0.0))]);
    let mut invoker = CodeInvoker::new().with_prefetch(false);
    invoker.register_builtin("probe", probe.clone());

    let loader = MapLoader::new(vec![("dep/a", dep(true)), ("dep/b", dep(true))]);
    let bindings = invoker.invoke(PROBED_BODY, &loader).await.unwrap();

    assert_eq!(bindings.get_member("done"), Some(Value::Boolean(true)));
    // Initial run + one restart per missing dependency
    assert_eq!(probe.get_member("runs"), Some(Value::Number(3.0)));
    assert_eq!(loader.calls_for("dep/a"), 1);
    assert_eq!(loader.calls_for("dep/b"), 1);
}

#[tokio::test]
async fn prefetch_satisfies_literal_dependencies_before_the_first_run() {
    let probe = Value::object_from([("runs".to_string(), Value::Number(0.0))]);
    let mut invoker = CodeInvoker::new();
    invoker.register_builtin("probe", probe.clone());

    let loader = MapLoader::new(vec![("dep/a", dep(true)), ("dep/b", dep(true))]);
    let bindings = invoker.invoke(PROBED_BODY, &loader).await.unwrap();

    assert_eq!(bindings.get_member("done"), Some(Value::Boolean(true)));
    assert_eq!(probe.get_member("runs"), Some(Value::Number(1.0)));
    assert_eq!(loader.calls_for("dep/a"), 1);
    assert_eq!(loader.calls_for("dep/b"), 1);
}

#[tokio::test]
async fn evaluation_errors_propagate_and_are_not_retried() {
    let probe = Value::object_from([("runs".to_string(), Value::Number(0.0))]);
    let mut invoker = CodeInvoker::new().with_prefetch(false);
    invoker.register_builtin("probe", probe.clone());

    let loader = MapLoader::new(vec![]);
    let err = invoker
        .invoke(
            "var probe = require(\"probe\"); probe.runs = probe.runs + 1; no_such_binding;",
            &loader,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, RuntimeError::Invocation(_)));
    assert_eq!(probe.get_member("runs"), Some(Value::Number(1.0)));
}

#[tokio::test]
async fn missing_dependency_failure_reaches_the_caller() {
    let invoker = CodeInvoker::new().with_prefetch(false);
    let loader = MapLoader::new(vec![]);
    let err = invoker
        .invoke("var x = require(\"dep/ghost\");", &loader)
        .await
        .unwrap_err();
    assert_eq!(err, RuntimeError::Resolution("dep/ghost".into()));
}
