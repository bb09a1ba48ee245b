//! Lexical environments for variable binding.

use super::value::Value;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;

/// A shared handle to an environment, so closures can capture their
/// defining scope.
pub type EnvRef = Rc<RefCell<Environment>>;

/// A lexical environment for variable bindings.
#[derive(Debug, Default)]
pub struct Environment {
    /// The bindings in this environment
    bindings: FxHashMap<String, Value>,
    /// The outer (parent) environment
    outer: Option<EnvRef>,
}

impl Environment {
    /// Creates a new root environment.
    pub fn new() -> EnvRef {
        Rc::new(RefCell::new(Self::default()))
    }

    /// Creates a new environment nested in an outer environment.
    pub fn with_outer(outer: EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Self {
            bindings: FxHashMap::default(),
            outer: Some(outer),
        }))
    }

    /// Declares a variable in this environment, shadowing outer bindings.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    /// Gets a variable's value, walking the scope chain.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.bindings.get(name) {
            return Some(value.clone());
        }
        self.outer.as_ref().and_then(|outer| outer.borrow().get(name))
    }

    /// Sets an existing variable, walking the scope chain; false if the
    /// variable is not declared anywhere.
    pub fn assign(&mut self, name: &str, value: Value) -> bool {
        if let Some(slot) = self.bindings.get_mut(name) {
            *slot = value;
            return true;
        }
        match &self.outer {
            Some(outer) => outer.borrow_mut().assign(name, value),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_the_chain() {
        let root = Environment::new();
        root.borrow_mut().define("x", Value::Number(1.0));
        let inner = Environment::with_outer(root);
        assert_eq!(inner.borrow().get("x"), Some(Value::Number(1.0)));
        assert_eq!(inner.borrow().get("y"), None);
    }

    #[test]
    fn define_shadows_outer() {
        let root = Environment::new();
        root.borrow_mut().define("x", Value::Number(1.0));
        let inner = Environment::with_outer(root.clone());
        inner.borrow_mut().define("x", Value::Number(2.0));
        assert_eq!(inner.borrow().get("x"), Some(Value::Number(2.0)));
        assert_eq!(root.borrow().get("x"), Some(Value::Number(1.0)));
    }

    #[test]
    fn assign_updates_the_declaring_scope() {
        let root = Environment::new();
        root.borrow_mut().define("x", Value::Number(1.0));
        let inner = Environment::with_outer(root.clone());
        assert!(inner.borrow_mut().assign("x", Value::Number(5.0)));
        assert_eq!(root.borrow().get("x"), Some(Value::Number(5.0)));
        assert!(!inner.borrow_mut().assign("missing", Value::Null));
    }
}
