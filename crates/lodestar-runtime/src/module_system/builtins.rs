// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Natively-implemented modules seeded into every invocation

use crate::module_system::invoker::CodeInvoker;
use lodestar_script::{Error as ScriptError, NativeFunction, Unwind, Value};

/// Registers the default builtin modules (`math`, `strings`) on an
/// invoker.
pub fn install_default_builtins(invoker: &mut CodeInvoker) {
    invoker.register_builtin("math", create_math());
    invoker.register_builtin("strings", create_strings());
}

/// Create the `math` module exports.
pub fn create_math() -> Value {
    Value::object_from([
        ("abs".to_string(), unary_fn("abs", f64::abs)),
        ("floor".to_string(), unary_fn("floor", f64::floor)),
        ("ceil".to_string(), unary_fn("ceil", f64::ceil)),
        ("sqrt".to_string(), unary_fn("sqrt", f64::sqrt)),
        ("max".to_string(), fold_fn("max", f64::NEG_INFINITY, f64::max)),
        ("min".to_string(), fold_fn("min", f64::INFINITY, f64::min)),
    ])
}

/// Create the `strings` module exports.
pub fn create_strings() -> Value {
    Value::object_from([
        (
            "upper".to_string(),
            string_fn("upper", |s| Value::String(s.to_uppercase())),
        ),
        (
            "lower".to_string(),
            string_fn("lower", |s| Value::String(s.to_lowercase())),
        ),
        (
            "trim".to_string(),
            string_fn("trim", |s| Value::String(s.trim().to_string())),
        ),
        (
            "len".to_string(),
            string_fn("len", |s| Value::Number(s.chars().count() as f64)),
        ),
        (
            "split".to_string(),
            Value::Native(NativeFunction::new("split", |args| {
                let text = string_argument("split", args, 0)?;
                let separator = string_argument("split", args, 1)?;
                Ok(Value::array_from(
                    text.split(separator.as_str())
                        .map(|part| Value::String(part.to_string())),
                ))
            })),
        ),
    ])
}

fn unary_fn(name: &'static str, op: fn(f64) -> f64) -> Value {
    Value::Native(NativeFunction::new(name, move |args| {
        let n = number_argument(name, args, 0)?;
        Ok(Value::Number(op(n)))
    }))
}

fn fold_fn(name: &'static str, identity: f64, op: fn(f64, f64) -> f64) -> Value {
    Value::Native(NativeFunction::new(name, move |args| {
        let mut acc = identity;
        for (i, _) in args.iter().enumerate() {
            acc = op(acc, number_argument(name, args, i)?);
        }
        Ok(Value::Number(acc))
    }))
}

fn string_fn(name: &'static str, op: fn(&str) -> Value) -> Value {
    Value::Native(NativeFunction::new(name, move |args| {
        let s = string_argument(name, args, 0)?;
        Ok(op(&s))
    }))
}

fn number_argument(name: &str, args: &[Value], index: usize) -> Result<f64, Unwind> {
    match args.get(index) {
        Some(Value::Number(n)) => Ok(*n),
        _ => Err(Unwind::Error(ScriptError::TypeError(format!(
            "{name} expects a number argument"
        )))),
    }
}

fn string_argument(name: &str, args: &[Value], index: usize) -> Result<String, Unwind> {
    match args.get(index) {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(Unwind::Error(ScriptError::TypeError(format!(
            "{name} expects a string argument"
        )))),
    }
}
