use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("undefined variable '{0}'")]
pub struct UndefinedVariable(pub String);

/// One scope frame: bindings plus a link to the frame it was created in.
///
/// Frames are shared through `Rc` so closures can keep their defining chain alive.  The enclosing
/// link is fixed at construction.
#[derive(Debug, Default)]
pub struct Environment {
    enclosing: Option<Rc<Environment>>,
    values: RefCell<FxHashMap<String, Value>>,
}

impl Environment {
    /// A root (global) frame.
    pub fn new() -> Rc<Environment> {
        Rc::new(Environment::default())
    }

    pub fn with_enclosing(enclosing: Rc<Environment>) -> Rc<Environment> {
        Rc::new(Environment {
            enclosing: Some(enclosing),
            values: RefCell::default(),
        })
    }

    /// Binds `name` in this frame, replacing any previous binding here.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.values.borrow_mut().insert(name.into(), value);
    }

    /// Looks `name` up in this frame, then outward.
    pub fn get(&self, name: &str) -> Result<Value, UndefinedVariable> {
        if let Some(v) = self.values.borrow().get(name) {
            return Ok(v.clone());
        }
        match &self.enclosing {
            Some(enclosing) => enclosing.get(name),
            None => Err(UndefinedVariable(name.to_owned())),
        }
    }

    /// Updates the nearest existing binding of `name`.
    pub fn assign(&self, name: &str, value: Value) -> Result<(), UndefinedVariable> {
        if let Some(slot) = self.values.borrow_mut().get_mut(name) {
            *slot = value;
            return Ok(());
        }
        match &self.enclosing {
            Some(enclosing) => enclosing.assign(name, value),
            None => Err(UndefinedVariable(name.to_owned())),
        }
    }

    /// Reads `name` from the frame exactly `distance` links out.
    pub fn get_at(&self, distance: usize, name: &str) -> Result<Value, UndefinedVariable> {
        self.ancestor(distance)
            .and_then(|env| env.values.borrow().get(name).cloned())
            .ok_or_else(|| UndefinedVariable(name.to_owned()))
    }

    pub fn assign_at(
        &self,
        distance: usize,
        name: &str,
        value: Value,
    ) -> Result<(), UndefinedVariable> {
        let env = self
            .ancestor(distance)
            .ok_or_else(|| UndefinedVariable(name.to_owned()))?;
        let mut values = env.values.borrow_mut();
        match values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(UndefinedVariable(name.to_owned())),
        }
    }

    fn ancestor(&self, distance: usize) -> Option<&Environment> {
        let mut env = self;
        for _ in 0..distance {
            env = env.enclosing.as_deref()?;
        }
        Some(env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_and_get() -> Result<(), UndefinedVariable> {
        let env = Environment::new();
        env.define("a", Value::Number(1.0));
        assert_eq!(env.get("a")?, Value::Number(1.0));
        Ok(())
    }

    #[test]
    fn undefined() {
        let env = Environment::new();
        match env.get("nope") {
            Err(UndefinedVariable(name)) if name == "nope" => (),
            r => panic!("unexpected output: {:?}", r),
        }
        assert!(env.assign("nope", Value::Nil).is_err());
    }

    #[test]
    fn lookup_walks_outward() -> Result<(), UndefinedVariable> {
        let globals = Environment::new();
        globals.define("a", Value::Number(1.0));
        let inner = Environment::with_enclosing(Rc::clone(&globals));
        assert_eq!(inner.get("a")?, Value::Number(1.0));

        inner.assign("a", Value::Number(2.0))?;
        assert_eq!(globals.get("a")?, Value::Number(2.0));
        Ok(())
    }

    #[test]
    fn shadowing_keeps_outer_binding() -> Result<(), UndefinedVariable> {
        let globals = Environment::new();
        globals.define("a", Value::Number(1.0));
        let inner = Environment::with_enclosing(Rc::clone(&globals));
        inner.define("a", Value::Bool(true));
        assert_eq!(inner.get("a")?, Value::Bool(true));
        assert_eq!(globals.get("a")?, Value::Number(1.0));
        Ok(())
    }

    #[test]
    fn resolved_access_skips_exactly_distance_frames() -> Result<(), UndefinedVariable> {
        let outer = Environment::new();
        outer.define("x", Value::Number(1.0));
        let middle = Environment::with_enclosing(Rc::clone(&outer));
        middle.define("x", Value::Number(2.0));
        let inner = Environment::with_enclosing(Rc::clone(&middle));

        assert_eq!(inner.get_at(1, "x")?, Value::Number(2.0));
        assert_eq!(inner.get_at(2, "x")?, Value::Number(1.0));
        assert!(inner.get_at(0, "x").is_err());
        assert!(inner.get_at(3, "x").is_err());

        inner.assign_at(2, "x", Value::Nil)?;
        assert_eq!(outer.get("x")?, Value::Nil);
        assert_eq!(middle.get("x")?, Value::Number(2.0));
        Ok(())
    }
}
