//! Runtime representation and evaluation.

pub mod environment;
pub mod interpreter;
pub mod value;

pub use environment::{EnvRef, Environment};
pub use interpreter::{Exec, HostSignal, Interpreter, Unwind};
pub use value::{ArrayRef, NativeFunction, ObjectRef, ScriptFunction, Value};
