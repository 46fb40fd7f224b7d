//! A tree-walk interpreter for the Lox language.
//!
//! See [Crafting Interpreters](https://craftinginterpreters.com/).
//!
//! Source text goes through four phases: the [`scanner`] produces tokens, the Pratt [`parser`]
//! builds the syntax tree, the [`resolver`] computes the scope distance of every local variable
//! reference and the [`eval`]uator runs the tree.
//!
//! # Examples
//!
//! See [`crate::interpreter::Interpreter`].
//!
//! # Limitations
//!
//! - The scanner reports every lexical error but the parser stops at the first syntax error.
//! - Classes are not implemented: `class`, `this` and `super` are reserved words only.
//! - There is no recursion limit.  Deep recursion in Lox code overflows the host stack.
//! - Closures referencing themselves through their environment are never freed before the
//! interpreter is.

#![warn(rust_2018_idioms)]
#![warn(missing_debug_implementations)]

pub mod ast;
pub mod diag;
pub mod env;
pub mod eval;
pub mod interpreter;
pub mod native;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod token;
pub mod value;

pub use interpreter::{Interpreter, LoxError};
pub use parser::parse;
pub use scanner::scan;
