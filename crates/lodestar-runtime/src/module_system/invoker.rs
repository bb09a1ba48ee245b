// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The code invoker: executes module bodies with cooperative retry
//!
//! A module body runs against five host bindings: `module` (the record
//! whose `exports` field is the default result), `exports` (the same
//! object), `require` (synchronous dependency accessor),
//! `__dynamic_import__` (asynchronous accessor, the rewritten form of
//! `import(...)`), and `define` (factory registration).
//!
//! `require` of an identifier missing from the invocation's module table
//! unwinds evaluation with a dependency signal. The driver catches exactly
//! that signal, loads the dependency through the pluggable loader, and
//! re-executes the whole body. Bodies are therefore re-executed up to and
//! including the point of their first unresolved dependency; top-level
//! effects must tolerate that, and two modules that synchronously require
//! each other will retry forever. Neither is guarded here.

use crate::error::{Result, RuntimeError};
use crate::module_system::ModuleLoad;
use lodestar_script::{
    Error as ScriptError, Interpreter, NativeFunction, Program, Unwind, Value,
};
use regex::Regex;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, trace};

/// Binding name the reserved `import(...)` form is rewritten to.
pub const DYNAMIC_IMPORT_ALIAS: &str = "__dynamic_import__";

/// The dependency signal: an internal control marker carrying the one
/// identifier a module body requested synchronously before it was
/// available.
///
/// Raised as an opaque host signal by the accessor bindings and downcast
/// by the retry driver; it never escapes [`CodeInvoker::invoke`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRequest {
    /// The requested module identifier
    pub identifier: String,
}

/// A factory registered by `define(dependencies, callback)`.
struct FactoryRegistration {
    dependencies: Vec<String>,
    callback: Value,
}

type ModuleTable = Rc<RefCell<HashMap<String, Value>>>;
type FactorySlot = Rc<RefCell<Option<FactoryRegistration>>>;

/// One completed execution of a module body.
struct Attempt {
    interp: Interpreter,
    module: Value,
    factory: Option<FactoryRegistration>,
}

/// Why an execution attempt stopped short.
enum AttemptHalt {
    /// The body synchronously requested an unavailable dependency
    Needs(String),
    /// The body raised an ordinary error; never retried
    Failed(ScriptError),
}

/// Executes module source text against the dependency-injection bindings.
pub struct CodeInvoker {
    prefetch: bool,
    builtins: HashMap<String, Value>,
    dynamic_import: Regex,
    literal_requests: Regex,
}

impl CodeInvoker {
    /// Creates an invoker with prefetching enabled and no builtin modules.
    pub fn new() -> Self {
        Self {
            prefetch: true,
            builtins: HashMap::new(),
            dynamic_import: Regex::new(r"\bimport\s*\(").expect("static pattern"),
            literal_requests: Regex::new(
                r#"\b(?:require|__dynamic_import__)\s*\(\s*(?:"([^"\\]*)"|'([^'\\]*)')\s*\)"#,
            )
            .expect("static pattern"),
        }
    }

    /// Enables or disables the literal-dependency pre-pass.
    pub fn with_prefetch(mut self, enabled: bool) -> Self {
        self.prefetch = enabled;
        self
    }

    /// Seeds a natively-implemented module into every invocation's table.
    pub fn register_builtin(&mut self, identifier: impl Into<String>, bindings: Value) {
        self.builtins.insert(identifier.into(), bindings);
    }

    /// Evaluates a module body and returns its exported bindings.
    ///
    /// `loader` satisfies nested dependencies; any implementor of the
    /// module-loading contract works, including the pipeline that owns
    /// this invoker.
    pub async fn invoke(&self, source: &str, loader: &dyn ModuleLoad) -> Result<Value> {
        let source = self.rewrite_dynamic_imports(source);
        let program = lodestar_script::parse(&source)?;
        let table: ModuleTable = Rc::new(RefCell::new(self.builtins.clone()));

        if self.prefetch {
            self.prefetch_literals(&source, &table, loader).await?;
        }

        let mut attempts = 0usize;
        loop {
            attempts += 1;
            let mut attempt = match self.attempt(&program, &table) {
                Ok(attempt) => attempt,
                Err(AttemptHalt::Needs(identifier)) => {
                    debug!(%identifier, attempts, "dependency signal, loading and retrying");
                    self.load_into_table(&identifier, &table, loader).await?;
                    continue;
                }
                Err(AttemptHalt::Failed(error)) => return Err(RuntimeError::Invocation(error)),
            };

            let Some(factory) = attempt.factory.take() else {
                return Ok(attempt.module.get_member("exports").unwrap_or_default());
            };

            // Factory phase: resolve the declared dependencies, then hand
            // them to the callback. Its return value supersedes the plain
            // exports object.
            let mut resolved = Vec::with_capacity(factory.dependencies.len());
            for dependency in &factory.dependencies {
                let cached = table.borrow().get(dependency).cloned();
                let value = match cached {
                    Some(value) => value,
                    None => self.load_into_table(dependency, &table, loader).await?,
                };
                resolved.push(value);
            }

            match attempt.interp.call_value(&factory.callback, &resolved) {
                Ok(value) => return Ok(value),
                Err(Unwind::Signal(signal)) => match signal.downcast::<DependencyRequest>() {
                    Ok(request) => {
                        debug!(
                            identifier = %request.identifier,
                            "dependency signal in factory callback, retrying"
                        );
                        self.load_into_table(&request.identifier, &table, loader)
                            .await?;
                        continue;
                    }
                    Err(_) => return Err(unrecognized_signal()),
                },
                Err(Unwind::Error(error)) => return Err(RuntimeError::Invocation(error)),
                Err(_) => {
                    return Err(RuntimeError::Invocation(ScriptError::SyntaxError(
                        "illegal control flow in factory callback".into(),
                    )));
                }
            }
        }
    }

    /// Runs the whole body once against fresh bindings.
    ///
    /// The exports object, module record, and factory slot are new for
    /// every attempt; an unwound attempt keeps no partial result. The
    /// module table is shared across attempts; that is what makes retries
    /// converge.
    fn attempt(&self, program: &Program, table: &ModuleTable) -> std::result::Result<Attempt, AttemptHalt> {
        let exports = Value::new_object();
        let module = Value::new_object();
        module.set_member("exports", exports.clone());
        let factory: FactorySlot = Rc::new(RefCell::new(None));

        let mut interp = Interpreter::new();
        interp.define("module", module.clone());
        interp.define("exports", exports);
        interp.define("require", require_binding(table));
        interp.define(DYNAMIC_IMPORT_ALIAS, dynamic_import_binding(table));
        interp.define("define", define_binding(&factory));

        match interp.run(program) {
            Ok(_) => {
                let factory = factory.borrow_mut().take();
                Ok(Attempt {
                    interp,
                    module,
                    factory,
                })
            }
            Err(Unwind::Signal(signal)) => match signal.downcast::<DependencyRequest>() {
                Ok(request) => Err(AttemptHalt::Needs(request.identifier.clone())),
                Err(_) => Err(AttemptHalt::Failed(ScriptError::InternalError(
                    "unrecognized host signal".into(),
                ))),
            },
            Err(Unwind::Error(error)) => Err(AttemptHalt::Failed(error)),
            Err(_) => Err(AttemptHalt::Failed(ScriptError::SyntaxError(
                "illegal top-level control flow".into(),
            ))),
        }
    }

    async fn load_into_table(
        &self,
        identifier: &str,
        table: &ModuleTable,
        loader: &dyn ModuleLoad,
    ) -> Result<Value> {
        let value = loader.load_module(identifier).await?;
        table
            .borrow_mut()
            .insert(identifier.to_string(), value.clone());
        Ok(value)
    }

    /// Rewrites the reserved `import(` form to its ordinary-binding alias.
    fn rewrite_dynamic_imports(&self, source: &str) -> String {
        self.dynamic_import
            .replace_all(source, format!("{DYNAMIC_IMPORT_ALIAS}(").as_str())
            .into_owned()
    }

    /// Scans for literal-argument accessor calls and loads every such
    /// identifier before the first attempt. An optimization only: retries
    /// still cover computed identifiers.
    async fn prefetch_literals(
        &self,
        source: &str,
        table: &ModuleTable,
        loader: &dyn ModuleLoad,
    ) -> Result<()> {
        let mut wanted: Vec<String> = Vec::new();
        for captures in self.literal_requests.captures_iter(source) {
            let Some(m) = captures.get(1).or_else(|| captures.get(2)) else {
                continue;
            };
            let identifier = m.as_str();
            if table.borrow().contains_key(identifier)
                || wanted.iter().any(|w| w == identifier)
            {
                continue;
            }
            wanted.push(identifier.to_string());
        }
        if wanted.is_empty() {
            return Ok(());
        }

        trace!(count = wanted.len(), "prefetching literal dependencies");
        let loads = wanted.iter().map(|identifier| loader.load_module(identifier));
        let values = futures::future::try_join_all(loads).await?;
        let mut table = table.borrow_mut();
        for (identifier, value) in wanted.into_iter().zip(values) {
            table.insert(identifier, value);
        }
        Ok(())
    }
}

impl Default for CodeInvoker {
    fn default() -> Self {
        Self::new()
    }
}

fn require_binding(table: &ModuleTable) -> Value {
    let table = Rc::clone(table);
    Value::Native(NativeFunction::new("require", move |args| {
        let identifier = identifier_argument("require", args)?;
        let cached = table.borrow().get(&identifier).cloned();
        match cached {
            Some(value) => Ok(value),
            None => Err(Unwind::Signal(Rc::new(DependencyRequest { identifier }))),
        }
    }))
}

fn dynamic_import_binding(table: &ModuleTable) -> Value {
    let table = Rc::clone(table);
    Value::Native(NativeFunction::new(DYNAMIC_IMPORT_ALIAS, move |args| {
        let identifier = identifier_argument(DYNAMIC_IMPORT_ALIAS, args)?;
        let cached = table.borrow().get(&identifier).cloned();
        match cached {
            // Already available: a settled promise the body can await
            Some(value) => Ok(Value::Promise(Rc::new(value))),
            // Not yet loaded: the evaluator cannot suspend mid-statement,
            // so this takes the same unwind-and-retry path as require
            None => Err(Unwind::Signal(Rc::new(DependencyRequest { identifier }))),
        }
    }))
}

fn define_binding(factory: &FactorySlot) -> Value {
    let slot = Rc::clone(factory);
    Value::Native(NativeFunction::new("define", move |args| {
        let dependencies = match args.first() {
            Some(Value::Array(elements)) => {
                let mut dependencies = Vec::with_capacity(elements.borrow().len());
                for element in elements.borrow().iter() {
                    match element {
                        Value::String(identifier) => dependencies.push(identifier.clone()),
                        other => {
                            return Err(Unwind::Error(ScriptError::TypeError(format!(
                                "define expects identifier strings, found a {}",
                                other.type_of()
                            ))));
                        }
                    }
                }
                dependencies
            }
            _ => {
                return Err(Unwind::Error(ScriptError::TypeError(
                    "define expects an array of module identifiers".into(),
                )));
            }
        };
        let callback = match args.get(1) {
            Some(callback) if callback.is_callable() => callback.clone(),
            _ => {
                return Err(Unwind::Error(ScriptError::TypeError(
                    "define expects a factory callback".into(),
                )));
            }
        };
        *slot.borrow_mut() = Some(FactoryRegistration {
            dependencies,
            callback,
        });
        Ok(Value::Undefined)
    }))
}

fn identifier_argument(
    binding: &str,
    args: &[Value],
) -> std::result::Result<String, Unwind> {
    match args.first() {
        Some(Value::String(identifier)) => Ok(identifier.clone()),
        _ => Err(Unwind::Error(ScriptError::TypeError(format!(
            "{binding} expects a module identifier string"
        )))),
    }
}

fn unrecognized_signal() -> RuntimeError {
    RuntimeError::Invocation(ScriptError::InternalError(
        "unrecognized host signal".into(),
    ))
}
