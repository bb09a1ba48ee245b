// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # lodestar-script
//!
//! A small dynamic scripting language, implemented in Rust, serving as the
//! evaluation substrate for the Lodestar module runtime.
//!
//! ## Overview
//!
//! This crate provides a complete execution environment for a compact
//! JavaScript-flavoured language:
//! - Lexer and recursive descent parser
//! - Tree-walking interpreter with lexical closures
//! - Host bindings through native functions, which may unwind evaluation
//!   with opaque control markers the host later inspects
//!
//! The language is deliberately small: enough for module bodies that read
//! dependencies, populate an exports object, and register factories, and
//! for interactive use in the REPL.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lodestar_script::{Engine, Value};
//!
//! let mut engine = Engine::new();
//! let result = engine.eval("1 + 2")?;
//! assert_eq!(result, Value::Number(3.0));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod builtins;
pub mod lexer;
pub mod parser;
pub mod runtime;

// Re-exports for convenience
pub use ast::Program;
pub use parser::parse;
pub use runtime::{
    EnvRef, Environment, Exec, HostSignal, Interpreter, NativeFunction, ObjectRef,
    ScriptFunction, Unwind, Value,
};

/// The error type for parsing and evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Syntax error during scanning or parsing
    SyntaxError(String),
    /// Type error during execution
    TypeError(String),
    /// Reference error (undefined variable)
    ReferenceError(String),
    /// Range error (out of bounds, etc.)
    RangeError(String),
    /// Internal engine error
    InternalError(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::SyntaxError(msg) => write!(f, "SyntaxError: {}", msg),
            Error::TypeError(msg) => write!(f, "TypeError: {}", msg),
            Error::ReferenceError(msg) => write!(f, "ReferenceError: {}", msg),
            Error::RangeError(msg) => write!(f, "RangeError: {}", msg),
            Error::InternalError(msg) => write!(f, "InternalError: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

/// A convenience wrapper owning an interpreter with persistent globals.
///
/// Suited to REPL-style use where definitions accumulate across
/// evaluations. Hosts that manage bindings per evaluation use
/// [`Interpreter`] directly.
pub struct Engine {
    interp: Interpreter,
}

impl Engine {
    /// Creates a new engine instance with default globals.
    pub fn new() -> Self {
        Self {
            interp: Interpreter::new(),
        }
    }

    /// Defines a global binding visible to subsequent evaluations.
    pub fn define_global(&mut self, name: impl Into<String>, value: Value) {
        self.interp.define(name, value);
    }

    /// Evaluates source code and returns the result of the last expression.
    pub fn eval(&mut self, source: &str) -> Result<Value, Error> {
        let program = parse(source)?;
        match self.interp.run(&program) {
            Ok(value) => Ok(value),
            Err(Unwind::Error(error)) => Err(error),
            Err(Unwind::Signal(_)) => Err(Error::InternalError(
                "a host signal escaped evaluation".into(),
            )),
            Err(_) => Err(Error::InternalError(
                "illegal top-level control flow".into(),
            )),
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
