use std::fmt;
use std::rc::Rc;

use crate::ast::Lambda;
use crate::env::Environment;
use crate::native::NativeFn;
use crate::token::Literal;

/// Run-time values.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Callable(Callable),
}

impl Value {
    /// `nil` and `false` are falsy, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            _ => true,
        }
    }
}

impl From<&Literal> for Value {
    fn from(lit: &Literal) -> Value {
        match lit {
            Literal::Nil => Value::Nil,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Number(n) => Value::Number(*n),
            Literal::String(s) => Value::String(Rc::clone(s)),
        }
    }
}

// Values of different types are never equal.  Callables compare by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(l), Value::Bool(r)) => l == r,
            (Value::Number(l), Value::Number(r)) => l == r,
            (Value::String(l), Value::String(r)) => l == r,
            (Value::Callable(l), Value::Callable(r)) => l.same(r),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Callable(c) => write!(f, "{}", c),
        }
    }
}

/// Number of arguments a callable accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    Variadic,
}

#[derive(Debug, Clone)]
pub enum Callable {
    Closure(Rc<Closure>),
    Native(Rc<NativeFunction>),
}

impl Callable {
    pub fn name(&self) -> &str {
        match self {
            Callable::Closure(c) => c.lambda.name(),
            Callable::Native(n) => n.name,
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            Callable::Closure(c) => Arity::Fixed(c.lambda.params.len()),
            Callable::Native(n) => n.arity,
        }
    }

    fn same(&self, other: &Callable) -> bool {
        match (self, other) {
            (Callable::Closure(l), Callable::Closure(r)) => Rc::ptr_eq(l, r),
            (Callable::Native(l), Callable::Native(r)) => Rc::ptr_eq(l, r),
            _ => false,
        }
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Closure(c) => write!(f, "<fn {}>", c.lambda.name()),
            Callable::Native(n) => write!(f, "<native fn {}>", n.name),
        }
    }
}

/// A function literal paired with the environment it was evaluated in.
pub struct Closure {
    pub lambda: Rc<Lambda>,
    pub env: Rc<Environment>,
}

// The environment may contain the closure itself.
impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("name", &self.lambda.name())
            .field("arity", &self.lambda.params.len())
            .finish_non_exhaustive()
    }
}

pub struct NativeFunction {
    pub name: &'static str,
    pub arity: Arity,
    pub func: NativeFn,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native;

    fn native_value(name: &'static str) -> Value {
        Value::Callable(Callable::Native(Rc::new(NativeFunction {
            name,
            arity: Arity::Fixed(0),
            func: native::clock,
        })))
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Number(0.0).is_truthy());
        assert!(Value::String("".into()).is_truthy());
        assert!(native_value("clock").is_truthy());
    }

    #[test]
    fn equality_is_typed() {
        assert_eq!(Value::Nil, Value::Nil);
        assert_eq!(Value::String("ab".into()), Value::String("ab".into()));
        assert_ne!(Value::Number(0.0), Value::Bool(false));
        assert_ne!(Value::Nil, Value::Bool(false));
        assert_ne!(Value::String("1".into()), Value::Number(1.0));
        assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));
    }

    #[test]
    fn callables_compare_by_identity() {
        let a = native_value("clock");
        let b = native_value("clock");
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn display() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::Bool(false).to_string(), "false");
        assert_eq!(Value::String("hi".into()).to_string(), "hi");
        assert_eq!(native_value("clock").to_string(), "<native fn clock>");
    }
}
