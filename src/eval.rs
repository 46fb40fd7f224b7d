use std::fmt;
use std::io::{self, Write};
use std::rc::Rc;

use thiserror::Error;

use crate::ast::{Expr, ExprId, ExprKind, Stmt};
use crate::diag::{Line, ResolveError};
use crate::env::{Environment, UndefinedVariable};
use crate::native::{define_natives, LineSource, NativeIo};
use crate::resolver::{self, Locals};
use crate::token::{Token, TokenKind};
use crate::value::{Arity, Callable, Closure, Value};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("line {line}: {message}")]
    Type { line: Line, message: &'static str },
    #[error("line {line}: undefined variable '{name}'")]
    UndefinedVariable { name: String, line: Line },
    #[error("line {line}: uninitialized variable '{name}'")]
    UninitializedVariable { name: String, line: Line },
    #[error("line {line}: can only call functions")]
    NotCallable { line: Line },
    #[error("line {line}: expected {expected} arguments but got {got}")]
    Arity {
        line: Line,
        expected: usize,
        got: usize,
    },
    #[error("line {line}: operand of '++' or '--' must be a variable")]
    InvalidPostfixTarget { line: Line },
    /// Failure inside a callee, tagged with the callee name and call site.
    #[error("line {line}: in {function}(): {source}")]
    Call {
        function: String,
        line: Line,
        source: Box<RuntimeError>,
    },
    #[error("{0}")]
    Native(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// `break`, `continue` or `return` reached the top level.  The resolver rejects such programs
    /// so this only happens with unresolved code.
    #[error("'{0}' outside of its enclosing construct")]
    StrayControlFlow(&'static str),
}

/// How a statement finished.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Completed,
    Broke,
    Continued,
    Returned(Value),
}

/// Statement executor and expression evaluator.
///
/// Owns the global environment and the resolution table, both of which persist across calls to
/// `resolve` and `interpret`.
pub struct Evaluator<'t, W: Write> {
    output: &'t mut W,
    input: Box<dyn LineSource + 't>,
    globals: Rc<Environment>,
    locals: Locals,
}

impl<W: Write> fmt::Debug for Evaluator<'_, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("globals", &self.globals)
            .field("locals", &self.locals.len())
            .finish_non_exhaustive()
    }
}

impl<'t, W: Write> Evaluator<'t, W> {
    pub fn new(output: &'t mut W, input: Box<dyn LineSource + 't>) -> Evaluator<'t, W> {
        let globals = Environment::new();
        define_natives(&globals);
        Evaluator {
            output,
            input,
            globals,
            locals: Locals::default(),
        }
    }

    pub fn locals(&self) -> &Locals {
        &self.locals
    }

    /// Adds the scope distances of `stmts` to the resolution table.
    pub fn resolve(&mut self, stmts: &[Stmt]) -> Result<(), ResolveError> {
        resolver::resolve(stmts, &mut self.locals)
    }

    /// Executes `stmts` in the global environment, stopping at the first error.
    pub fn interpret(&mut self, stmts: &[Stmt]) -> Result<(), RuntimeError> {
        let globals = Rc::clone(&self.globals);
        for stmt in stmts {
            match self.exec(stmt, &globals)? {
                Flow::Completed => (),
                flow => return Err(stray(&flow)),
            }
        }
        Ok(())
    }

    fn exec(&mut self, stmt: &Stmt, env: &Rc<Environment>) -> Result<Flow, RuntimeError> {
        match stmt {
            Stmt::Expression(e) => {
                self.eval(e, env)?;
                Ok(Flow::Completed)
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(init) => self.eval(init, env)?,
                    None => Value::Nil,
                };
                env.define(name.lexeme.as_str(), value);
                Ok(Flow::Completed)
            }
            Stmt::Block(stmts) => {
                let block_env = Environment::with_enclosing(Rc::clone(env));
                self.exec_block(stmts, &block_env)
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval(condition, env)?.is_truthy() {
                    self.exec(then_branch, env)
                } else if let Some(else_branch) = else_branch {
                    self.exec(else_branch, env)
                } else {
                    Ok(Flow::Completed)
                }
            }
            Stmt::While { condition, body } => {
                while self.eval(condition, env)?.is_truthy() {
                    match self.exec(body, env)? {
                        Flow::Completed | Flow::Continued => (),
                        Flow::Broke => break,
                        ret @ Flow::Returned(_) => return Ok(ret),
                    }
                }
                Ok(Flow::Completed)
            }
            Stmt::Break(_) => Ok(Flow::Broke),
            Stmt::Continue(_) => Ok(Flow::Continued),
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(e) => self.eval(e, env)?,
                    None => Value::Nil,
                };
                Ok(Flow::Returned(value))
            }
        }
    }

    fn exec_block(&mut self, stmts: &[Stmt], env: &Rc<Environment>) -> Result<Flow, RuntimeError> {
        for stmt in stmts {
            match self.exec(stmt, env)? {
                Flow::Completed => (),
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Completed)
    }

    fn eval(&mut self, expr: &Expr, env: &Rc<Environment>) -> Result<Value, RuntimeError> {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(Value::from(lit)),
            ExprKind::Grouping(inner) => self.eval(inner, env),
            ExprKind::Unary { op, right } => {
                let right = self.eval(right, env)?;
                unary(op, right)
            }
            ExprKind::Binary { left, op, right } => {
                let left = self.eval(left, env)?;
                let right = self.eval(right, env)?;
                binary(op, left, right)
            }
            ExprKind::Logical { left, op, right } => {
                let left = self.eval(left, env)?;
                let short_circuits = match op.kind {
                    TokenKind::Or => left.is_truthy(),
                    _ => !left.is_truthy(),
                };
                if short_circuits {
                    Ok(left)
                } else {
                    self.eval(right, env)
                }
            }
            ExprKind::PostUnary { left, op } => {
                let name = match &left.kind {
                    ExprKind::Variable(name) => name,
                    _ => return Err(RuntimeError::InvalidPostfixTarget { line: op.line }),
                };
                let n = match self.look_up(left.id, name, env)? {
                    Value::Number(n) => n,
                    _ => return Err(type_error(op, "operand must be a number")),
                };
                let updated = match op.kind {
                    TokenKind::MinusMinus => Value::Number(n - 1.0),
                    _ => Value::Number(n + 1.0),
                };
                self.assign(left.id, name, updated.clone(), env)?;
                Ok(updated)
            }
            ExprKind::Variable(name) => match self.look_up(expr.id, name, env)? {
                Value::Nil => Err(RuntimeError::UninitializedVariable {
                    name: name.lexeme.clone(),
                    line: name.line,
                }),
                value => Ok(value),
            },
            ExprKind::Assign { name, value } => {
                let value = self.eval(value, env)?;
                self.assign(expr.id, name, value.clone(), env)?;
                Ok(value)
            }
            ExprKind::Call {
                callee,
                args,
                paren,
            } => {
                let callee = self.eval(callee, env)?;
                let args = args
                    .iter()
                    .map(|a| self.eval(a, env))
                    .collect::<Result<Vec<_>, _>>()?;
                let callable = match callee {
                    Value::Callable(c) => c,
                    _ => return Err(RuntimeError::NotCallable { line: paren.line }),
                };
                if let Arity::Fixed(expected) = callable.arity() {
                    if expected != args.len() {
                        return Err(RuntimeError::Arity {
                            line: paren.line,
                            expected,
                            got: args.len(),
                        });
                    }
                }
                self.call(&callable, args, paren.line)
                    .map_err(|e| RuntimeError::Call {
                        function: callable.name().to_owned(),
                        line: paren.line,
                        source: Box::new(e),
                    })
            }
            ExprKind::Lambda(lambda) => Ok(Value::Callable(Callable::Closure(Rc::new(Closure {
                lambda: Rc::clone(lambda),
                env: Rc::clone(env),
            })))),
        }
    }

    #[tracing::instrument(level = "trace", skip(self, args))]
    fn call(
        &mut self,
        callable: &Callable,
        args: Vec<Value>,
        line: Line,
    ) -> Result<Value, RuntimeError> {
        match callable {
            Callable::Native(native) => {
                let mut io = NativeIo {
                    output: &mut *self.output,
                    input: &mut *self.input,
                };
                (native.func)(&mut io, &args)
            }
            Callable::Closure(closure) => {
                // Parameters and body share one frame.
                let env = Environment::with_enclosing(Rc::clone(&closure.env));
                for (param, arg) in closure.lambda.params.iter().zip(args) {
                    env.define(param.lexeme.as_str(), arg);
                }
                match self.exec_block(&closure.lambda.body, &env)? {
                    Flow::Completed => Ok(Value::Nil),
                    Flow::Returned(value) => Ok(value),
                    flow => Err(stray(&flow)),
                }
            }
        }
    }

    // Resolved references go straight to their frame, the others to the globals.
    fn look_up(
        &self,
        id: ExprId,
        name: &Token,
        env: &Rc<Environment>,
    ) -> Result<Value, RuntimeError> {
        let found = match self.locals.get(&id) {
            Some(&distance) => env.get_at(distance, &name.lexeme),
            None => self.globals.get(&name.lexeme),
        };
        found.map_err(|e| undefined(e, name))
    }

    fn assign(
        &self,
        id: ExprId,
        name: &Token,
        value: Value,
        env: &Rc<Environment>,
    ) -> Result<(), RuntimeError> {
        let assigned = match self.locals.get(&id) {
            Some(&distance) => env.assign_at(distance, &name.lexeme, value),
            None => self.globals.assign(&name.lexeme, value),
        };
        assigned.map_err(|e| undefined(e, name))
    }
}

fn unary(op: &Token, right: Value) -> Result<Value, RuntimeError> {
    match (op.kind, right) {
        (TokenKind::Minus, Value::Number(n)) => Ok(Value::Number(-n)),
        (TokenKind::Plus, Value::Number(n)) => Ok(Value::Number(n)),
        (TokenKind::Minus | TokenKind::Plus, _) => Err(type_error(op, "operand must be a number")),
        (TokenKind::Bang, v) => Ok(Value::Bool(!v.is_truthy())),
        _ => Err(type_error(op, "unsupported unary operator")),
    }
}

fn binary(op: &Token, left: Value, right: Value) -> Result<Value, RuntimeError> {
    use TokenKind as T;
    use Value::{Bool, Number};

    match (op.kind, left, right) {
        (T::Plus, Number(l), Number(r)) => Ok(Number(l + r)),
        (T::Plus, Value::String(l), Value::String(r)) => {
            Ok(Value::String(format!("{}{}", l, r).into()))
        }
        (T::Plus, _, _) => Err(type_error(op, "operands must be two numbers or two strings")),
        (T::Minus, Number(l), Number(r)) => Ok(Number(l - r)),
        (T::Star, Number(l), Number(r)) => Ok(Number(l * r)),
        (T::Slash, Number(l), Number(r)) => Ok(Number(l / r)),
        (T::Less, Number(l), Number(r)) => Ok(Bool(l < r)),
        (T::LessEqual, Number(l), Number(r)) => Ok(Bool(l <= r)),
        (T::Greater, Number(l), Number(r)) => Ok(Bool(l > r)),
        (T::GreaterEqual, Number(l), Number(r)) => Ok(Bool(l >= r)),
        (T::EqualEqual, l, r) => Ok(Bool(l == r)),
        (T::BangEqual, l, r) => Ok(Bool(l != r)),
        (
            T::Minus | T::Star | T::Slash | T::Less | T::LessEqual | T::Greater | T::GreaterEqual,
            _,
            _,
        ) => Err(type_error(op, "operands must be numbers")),
        _ => Err(type_error(op, "unsupported binary operator")),
    }
}

fn type_error(op: &Token, message: &'static str) -> RuntimeError {
    RuntimeError::Type {
        line: op.line,
        message,
    }
}

fn undefined(e: UndefinedVariable, name: &Token) -> RuntimeError {
    RuntimeError::UndefinedVariable {
        name: e.0,
        line: name.line,
    }
}

fn stray(flow: &Flow) -> RuntimeError {
    RuntimeError::StrayControlFlow(match flow {
        Flow::Broke => "break",
        Flow::Continued => "continue",
        _ => "return",
    })
}
