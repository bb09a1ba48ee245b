//! The tree-walking interpreter.

use crate::Error;
use crate::ast::*;
use crate::builtins;
use crate::runtime::environment::{EnvRef, Environment};
use crate::runtime::value::{ScriptFunction, Value};
use std::any::Any;
use std::rc::Rc;

/// An opaque control marker a host binding can raise to abort evaluation.
///
/// The interpreter propagates it without inspecting it; only the host that
/// installed the binding knows the concrete type behind it. Script code has
/// no construct that can intercept the unwinding.
pub type HostSignal = Rc<dyn Any>;

/// The reason evaluation of a subtree stopped early.
#[derive(Clone)]
pub enum Unwind {
    /// A script error; surfaces to the caller as [`Error`]
    Error(Error),
    /// `return` unwinding to the nearest function call
    Return(Value),
    /// `break` unwinding to the nearest loop
    Break,
    /// `continue` unwinding to the nearest loop
    Continue,
    /// A host-raised control marker, propagated untouched
    Signal(HostSignal),
}

impl From<Error> for Unwind {
    fn from(error: Error) -> Self {
        Unwind::Error(error)
    }
}

impl std::fmt::Debug for Unwind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unwind::Error(e) => write!(f, "Error({e})"),
            Unwind::Return(v) => write!(f, "Return({v})"),
            Unwind::Break => write!(f, "Break"),
            Unwind::Continue => write!(f, "Continue"),
            Unwind::Signal(_) => write!(f, "Signal(..)"),
        }
    }
}

/// Result of evaluating a subtree.
pub type Exec<T> = Result<T, Unwind>;

/// A tree-walking interpreter over the script AST.
///
/// Each instance owns its global scope; hosts install bindings with
/// [`Interpreter::define`] before running a program.
pub struct Interpreter {
    globals: EnvRef,
}

impl Interpreter {
    /// Creates an interpreter with the default globals (`console`).
    pub fn new() -> Self {
        let globals = Environment::new();
        globals
            .borrow_mut()
            .define("console", builtins::create_console());
        Self { globals }
    }

    /// Defines a global binding.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.globals.borrow_mut().define(name, value);
    }

    /// Executes a program in the global scope and returns the value of the
    /// last expression statement.
    ///
    /// Top-level `return`/`break`/`continue` are reported as syntax errors;
    /// only [`Unwind::Error`] and [`Unwind::Signal`] escape this method.
    pub fn run(&mut self, program: &Program) -> Exec<Value> {
        let env = self.globals.clone();
        let mut last = Value::Undefined;
        for stmt in &program.body {
            last = match self.exec_stmt(stmt, &env) {
                Ok(value) => value,
                Err(Unwind::Return(_)) => {
                    return Err(Error::SyntaxError("'return' outside of a function".into()).into());
                }
                Err(Unwind::Break) | Err(Unwind::Continue) => {
                    return Err(
                        Error::SyntaxError("'break' or 'continue' outside of a loop".into())
                            .into(),
                    );
                }
                Err(other) => return Err(other),
            };
        }
        Ok(last)
    }

    /// Calls a callable value with the given arguments.
    pub fn call_value(&mut self, callee: &Value, args: &[Value]) -> Exec<Value> {
        match callee {
            Value::Function(func) => self.call_function(func, args),
            Value::Native(native) => native.call(args),
            other => Err(Error::TypeError(format!("{} is not a function", other.type_of())).into()),
        }
    }

    fn call_function(&mut self, func: &Rc<ScriptFunction>, args: &[Value]) -> Exec<Value> {
        let env = Environment::with_outer(func.closure.clone());
        {
            let mut scope = env.borrow_mut();
            for (i, param) in func.params.iter().enumerate() {
                scope.define(param, args.get(i).cloned().unwrap_or_default());
            }
        }
        match self.exec_stmts(&func.body, &env) {
            Ok(_) => Ok(Value::Undefined),
            Err(Unwind::Return(value)) => Ok(value),
            Err(other) => Err(other),
        }
    }

    fn exec_stmts(&mut self, stmts: &[Stmt], env: &EnvRef) -> Exec<Value> {
        let mut last = Value::Undefined;
        for stmt in stmts {
            last = self.exec_stmt(stmt, env)?;
        }
        Ok(last)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, env: &EnvRef) -> Exec<Value> {
        match stmt {
            Stmt::Var { name, init } => {
                let value = match init {
                    Some(expr) => self.eval_expr(expr, env)?,
                    None => Value::Undefined,
                };
                env.borrow_mut().define(name, value);
                Ok(Value::Undefined)
            }
            Stmt::Function(literal) => {
                let func = self.make_function(literal, env);
                env.borrow_mut()
                    .define(literal.name.as_deref().unwrap_or_default(), func);
                Ok(Value::Undefined)
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr, env)?,
                    None => Value::Undefined,
                };
                Err(Unwind::Return(value))
            }
            Stmt::If {
                condition,
                consequent,
                alternate,
            } => {
                if self.eval_expr(condition, env)?.to_boolean() {
                    let scope = Environment::with_outer(env.clone());
                    self.exec_stmts(consequent, &scope)?;
                } else if let Some(alternate) = alternate {
                    let scope = Environment::with_outer(env.clone());
                    self.exec_stmts(alternate, &scope)?;
                }
                Ok(Value::Undefined)
            }
            Stmt::While { condition, body } => {
                while self.eval_expr(condition, env)?.to_boolean() {
                    let scope = Environment::with_outer(env.clone());
                    match self.exec_stmts(body, &scope) {
                        Ok(_) => {}
                        Err(Unwind::Break) => break,
                        Err(Unwind::Continue) => continue,
                        Err(other) => return Err(other),
                    }
                }
                Ok(Value::Undefined)
            }
            Stmt::Break => Err(Unwind::Break),
            Stmt::Continue => Err(Unwind::Continue),
            Stmt::Block(body) => {
                let scope = Environment::with_outer(env.clone());
                self.exec_stmts(body, &scope)?;
                Ok(Value::Undefined)
            }
            Stmt::Expr(expr) => self.eval_expr(expr, env),
        }
    }

    fn eval_expr(&mut self, expr: &Expr, env: &EnvRef) -> Exec<Value> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::String(s) => Ok(Value::String(s.clone())),
            Expr::Boolean(b) => Ok(Value::Boolean(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Undefined => Ok(Value::Undefined),
            Expr::Identifier(name) => env
                .borrow()
                .get(name)
                .ok_or_else(|| Error::ReferenceError(format!("{name} is not defined")).into()),
            Expr::Array(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.eval_expr(element, env)?);
                }
                Ok(Value::array_from(values))
            }
            Expr::Object(entries) => {
                let object = Value::new_object();
                for (key, value) in entries {
                    let value = self.eval_expr(value, env)?;
                    object.set_member(key.clone(), value);
                }
                Ok(object)
            }
            Expr::Function(literal) => Ok(self.make_function(literal, env)),
            Expr::Member { object, property } => {
                let object = self.eval_expr(object, env)?;
                self.member_get(&object, property)
            }
            Expr::Index { object, index } => {
                let object = self.eval_expr(object, env)?;
                let index = self.eval_expr(index, env)?;
                self.index_get(&object, &index)
            }
            Expr::Call { callee, args } => {
                let callee = self.eval_expr(callee, env)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval_expr(arg, env)?);
                }
                self.call_value(&callee, &values)
            }
            Expr::Assign { target, value } => {
                let value = self.eval_expr(value, env)?;
                self.assign(target, value.clone(), env)?;
                Ok(value)
            }
            Expr::Unary { op, operand } => {
                let operand = self.eval_expr(operand, env)?;
                match op {
                    UnaryOp::Not => Ok(Value::Boolean(!operand.to_boolean())),
                    UnaryOp::Negate => match operand {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        other => Err(Error::TypeError(format!(
                            "cannot negate a {}",
                            other.type_of()
                        ))
                        .into()),
                    },
                }
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval_expr(left, env)?;
                let right = self.eval_expr(right, env)?;
                self.binary(*op, left, right)
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval_expr(left, env)?;
                match op {
                    LogicalOp::And if !left.to_boolean() => Ok(left),
                    LogicalOp::Or if left.to_boolean() => Ok(left),
                    _ => self.eval_expr(right, env),
                }
            }
            Expr::Await(operand) => {
                let value = self.eval_expr(operand, env)?;
                match value {
                    Value::Promise(inner) => Ok((*inner).clone()),
                    other => Ok(other),
                }
            }
        }
    }

    fn make_function(&self, literal: &FunctionLiteral, env: &EnvRef) -> Value {
        Value::Function(Rc::new(ScriptFunction {
            name: literal.name.clone(),
            params: literal.params.clone(),
            body: literal.body.clone(),
            closure: env.clone(),
        }))
    }

    fn assign(&mut self, target: &Expr, value: Value, env: &EnvRef) -> Exec<()> {
        match target {
            Expr::Identifier(name) => {
                if env.borrow_mut().assign(name, value) {
                    Ok(())
                } else {
                    Err(Error::ReferenceError(format!(
                        "assignment to undeclared variable {name}"
                    ))
                    .into())
                }
            }
            Expr::Member { object, property } => {
                let object = self.eval_expr(object, env)?;
                if object.set_member(property.clone(), value) {
                    Ok(())
                } else {
                    Err(Error::TypeError(format!(
                        "cannot set property '{property}' on a {}",
                        object.type_of()
                    ))
                    .into())
                }
            }
            Expr::Index { object, index } => {
                let object = self.eval_expr(object, env)?;
                let index = self.eval_expr(index, env)?;
                self.index_set(&object, &index, value)
            }
            _ => Err(Error::SyntaxError("invalid assignment target".into()).into()),
        }
    }

    fn member_get(&self, object: &Value, property: &str) -> Exec<Value> {
        match object {
            Value::Object(_) => Ok(object.get_member(property).unwrap_or_default()),
            Value::Array(elements) => match property {
                "length" => Ok(Value::Number(elements.borrow().len() as f64)),
                _ => Ok(Value::Undefined),
            },
            Value::String(s) => match property {
                "length" => Ok(Value::Number(s.chars().count() as f64)),
                _ => Ok(Value::Undefined),
            },
            other => Err(Error::TypeError(format!(
                "cannot read property '{property}' of {}",
                other.type_of()
            ))
            .into()),
        }
    }

    fn index_get(&self, object: &Value, index: &Value) -> Exec<Value> {
        match (object, index) {
            (Value::Array(elements), Value::Number(n)) => {
                let elements = elements.borrow();
                let i = *n as usize;
                if n.fract() == 0.0 && *n >= 0.0 && i < elements.len() {
                    Ok(elements[i].clone())
                } else {
                    Ok(Value::Undefined)
                }
            }
            (Value::Object(_), Value::String(key)) => {
                Ok(object.get_member(key).unwrap_or_default())
            }
            (Value::String(s), Value::Number(n)) => {
                let i = *n as usize;
                match s.chars().nth(i) {
                    Some(ch) if n.fract() == 0.0 && *n >= 0.0 => {
                        Ok(Value::String(ch.to_string()))
                    }
                    _ => Ok(Value::Undefined),
                }
            }
            (other, index) => Err(Error::TypeError(format!(
                "cannot index a {} with a {}",
                other.type_of(),
                index.type_of()
            ))
            .into()),
        }
    }

    fn index_set(&self, object: &Value, index: &Value, value: Value) -> Exec<()> {
        match (object, index) {
            (Value::Array(elements), Value::Number(n)) => {
                let mut elements = elements.borrow_mut();
                let i = *n as usize;
                if n.fract() != 0.0 || *n < 0.0 || i > elements.len() {
                    return Err(Error::RangeError(format!("index {n} out of range")).into());
                }
                if i == elements.len() {
                    elements.push(value);
                } else {
                    elements[i] = value;
                }
                Ok(())
            }
            (Value::Object(_), Value::String(key)) => {
                object.set_member(key.clone(), value);
                Ok(())
            }
            (other, index) => Err(Error::TypeError(format!(
                "cannot index a {} with a {}",
                other.type_of(),
                index.type_of()
            ))
            .into()),
        }
    }

    fn binary(&self, op: BinaryOp, left: Value, right: Value) -> Exec<Value> {
        use BinaryOp::*;

        match op {
            Equal => return Ok(Value::Boolean(left == right)),
            NotEqual => return Ok(Value::Boolean(left != right)),
            Add => {
                // String concatenation wins when either side is a string
                if let (Value::String(_), _) | (_, Value::String(_)) = (&left, &right) {
                    return Ok(Value::String(format!("{left}{right}")));
                }
            }
            _ => {}
        }

        match (&left, &right) {
            (Value::Number(a), Value::Number(b)) => {
                let value = match op {
                    Add => Value::Number(a + b),
                    Subtract => Value::Number(a - b),
                    Multiply => Value::Number(a * b),
                    Divide => Value::Number(a / b),
                    Remainder => Value::Number(a % b),
                    Less => Value::Boolean(a < b),
                    LessEqual => Value::Boolean(a <= b),
                    Greater => Value::Boolean(a > b),
                    GreaterEqual => Value::Boolean(a >= b),
                    Equal | NotEqual => unreachable!("handled above"),
                };
                Ok(value)
            }
            (Value::String(a), Value::String(b)) => {
                let value = match op {
                    Less => Value::Boolean(a < b),
                    LessEqual => Value::Boolean(a <= b),
                    Greater => Value::Boolean(a > b),
                    GreaterEqual => Value::Boolean(a >= b),
                    _ => {
                        return Err(Error::TypeError(format!(
                            "operator {op:?} is not defined for strings"
                        ))
                        .into());
                    }
                };
                Ok(value)
            }
            _ => Err(Error::TypeError(format!(
                "operator {op:?} is not defined for {} and {}",
                left.type_of(),
                right.type_of()
            ))
            .into()),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::runtime::value::NativeFunction;

    fn eval(source: &str) -> Value {
        let program = parse(source).expect("parse");
        Interpreter::new().run(&program).expect("run")
    }

    fn eval_err(source: &str) -> Error {
        let program = parse(source).expect("parse");
        match Interpreter::new().run(&program) {
            Err(Unwind::Error(e)) => e,
            other => panic!("expected an error, got {other:?}"),
        }
    }

    #[test]
    fn arithmetic_and_precedence() {
        assert_eq!(eval("1 + 2 * 3;"), Value::Number(7.0));
        assert_eq!(eval("(1 + 2) * 3;"), Value::Number(9.0));
        assert_eq!(eval("17 % 5;"), Value::Number(2.0));
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(eval("\"a\" + 1;"), Value::String("a1".into()));
        assert_eq!(eval("1 + \"a\";"), Value::String("1a".into()));
    }

    #[test]
    fn variables_and_assignment() {
        assert_eq!(eval("var x = 1; x = x + 2; x;"), Value::Number(3.0));
    }

    #[test]
    fn assignment_to_undeclared_is_an_error() {
        assert!(matches!(eval_err("ghost = 1;"), Error::ReferenceError(_)));
    }

    #[test]
    fn functions_and_closures() {
        assert_eq!(
            eval(
                "function counter() { var n = 0; return function () { n = n + 1; return n; }; }
                 var next = counter();
                 next(); next();"
            ),
            Value::Number(2.0)
        );
    }

    #[test]
    fn while_loop_with_break_and_continue() {
        assert_eq!(
            eval(
                "var total = 0; var i = 0;
                 while (true) {
                     i = i + 1;
                     if (i > 10) { break; }
                     if (i % 2 == 0) { continue; }
                     total = total + i;
                 }
                 total;"
            ),
            Value::Number(25.0)
        );
    }

    #[test]
    fn objects_share_identity() {
        assert_eq!(
            eval("var a = { n: 1 }; var b = a; b.n = 5; a.n;"),
            Value::Number(5.0)
        );
    }

    #[test]
    fn array_indexing() {
        assert_eq!(eval("var xs = [1, 2, 3]; xs[1];"), Value::Number(2.0));
        assert_eq!(eval("var xs = [1]; xs[5];"), Value::Undefined);
        assert_eq!(eval("var xs = [1]; xs.length;"), Value::Number(1.0));
    }

    #[test]
    fn logical_operators_short_circuit() {
        assert_eq!(eval("false && ghost;"), Value::Boolean(false));
        assert_eq!(eval("true || ghost;"), Value::Boolean(true));
        assert_eq!(eval("null || \"fallback\";"), Value::String("fallback".into()));
    }

    #[test]
    fn await_unwraps_settled_promises() {
        let program = parse("await wrapped;").unwrap();
        let mut interp = Interpreter::new();
        interp.define(
            "wrapped",
            Value::Promise(Rc::new(Value::Number(7.0))),
        );
        assert_eq!(interp.run(&program).unwrap(), Value::Number(7.0));
    }

    #[test]
    fn host_signal_propagates_uncaught() {
        let program = parse("poke(); var unreachable = 1;").unwrap();
        let mut interp = Interpreter::new();
        interp.define(
            "poke",
            Value::Native(NativeFunction::new("poke", |_args| {
                Err(Unwind::Signal(Rc::new("marker".to_string())))
            })),
        );
        match interp.run(&program) {
            Err(Unwind::Signal(signal)) => {
                let marker = signal.downcast::<String>().expect("downcast");
                assert_eq!(*marker, "marker");
            }
            other => panic!("expected signal, got {other:?}"),
        }
    }

    #[test]
    fn top_level_return_is_rejected() {
        assert!(matches!(eval_err("return 1;"), Error::SyntaxError(_)));
    }

    #[test]
    fn reference_error_names_the_variable() {
        let err = eval_err("missing;");
        assert_eq!(err.to_string(), "ReferenceError: missing is not defined");
    }
}
