//! API to control the interpreter.

use std::io::prelude::*;
use std::rc::Rc;

use thiserror::Error;
use tracing::debug;

use crate::ast::ExprIds;
use crate::diag::{PartialParse, ResolveError, ScanErrors};
use crate::eval::{Evaluator, RuntimeError};
use crate::native::{LineSource, StdinSource};
use crate::parser::{Grammar, Parser};
use crate::scanner::scan;

/// Tree-walk interpreter session.
///
/// Globals, the resolution table and expression numbering survive from one call to `eval` to the
/// next, so a program may be fed in pieces.
///
/// # Example
///
/// Invoke the interpreter a first time to define a function then additional times to call this
/// function:
///
/// ```
/// # use plox::{Interpreter, LoxError};
///
/// let mut output: Vec<u8> = Vec::new();
/// let mut interp = Interpreter::new(&mut output);
///
/// let func_def = r#"
///     fun max(x, y) {
///         if (x > y) {
///             return x;
///         } else {
///             return y;
///         }
///     }
/// "#;
/// interp.eval(func_def)?;
///
/// interp.eval("print(max(10, 20));").expect("interpreter error");
/// interp.eval("print(max(5, 4));").expect("interpreter error");
/// drop(interp);
///
/// assert_eq!(output, b"20\n5\n");
/// # Ok::<(), LoxError>(())
/// ```
#[derive(Debug)]
pub struct Interpreter<'t, W: Write> {
    evaluator: Evaluator<'t, W>,
    grammar: Rc<Grammar>,
    ids: ExprIds,
}

/// Errors the interpreter can raise, one variant per phase.
#[derive(Debug, Error)]
pub enum LoxError {
    #[error("{0}")]
    Scan(#[from] ScanErrors),
    #[error("{0}")]
    Parse(#[from] PartialParse),
    #[error("{0}")]
    Resolve(#[from] ResolveError),
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

impl<'t, W: Write> Interpreter<'t, W> {
    /// `input()` reads from the process standard input.
    pub fn new(output: &'t mut W) -> Interpreter<'t, W> {
        Interpreter::with_input(output, StdinSource)
    }

    pub fn with_input(output: &'t mut W, input: impl LineSource + 't) -> Interpreter<'t, W> {
        Interpreter {
            evaluator: Evaluator::new(output, Box::new(input)),
            grammar: Rc::new(Grammar::default()),
            ids: ExprIds::default(),
        }
    }

    /// Scans, parses, resolves and runs `source`.
    ///
    /// Nothing runs unless the static phases succeed.  A runtime error stops execution at the
    /// failing statement; the effects of the statements before it are kept.
    pub fn eval(&mut self, source: &str) -> Result<(), LoxError> {
        let tokens = scan(source)?;
        debug!(tokens = tokens.len(), "scanned");

        let mut parser =
            Parser::with_grammar(tokens, Rc::clone(&self.grammar)).continuing(self.ids);
        let parsed = parser.parse_program();
        self.ids = parser.ids();
        let stmts = parsed?;
        debug!(statements = stmts.len(), "parsed");

        self.evaluator.resolve(&stmts)?;
        debug!(locals = self.evaluator.locals().len(), "resolved");

        self.evaluator.interpret(&stmts)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::{LexErrorKind, ParseErrorKind};
    use pretty_assertions::assert_eq;

    fn interpret(input: &str) -> Result<String, LoxError> {
        let mut raw_output: Vec<u8> = Vec::new();
        let mut interp = Interpreter::with_input(&mut raw_output, std::io::empty());
        interp.eval(input)?;
        drop(interp);
        let output = String::from_utf8(raw_output).expect("cannot convert output to string");
        Ok(output)
    }

    #[test]
    fn print_expr() -> Result<(), LoxError> {
        assert_eq!(interpret("print(3*2);")?, "6\n");
        Ok(())
    }

    #[test]
    fn init_set_get_var() -> Result<(), LoxError> {
        assert_eq!(interpret("var foo=42; foo=24; print(foo);")?, "24\n");
        Ok(())
    }

    #[test]
    fn if_else() -> Result<(), LoxError> {
        assert_eq!(
            interpret("var foo; if (2 + 2 == 4) foo = 1; else foo = 2; print(foo);")?,
            "1\n"
        );
        assert_eq!(
            interpret("var foo; if (2 + 2 != 4) foo = 1; else foo = 2; print(foo);")?,
            "2\n"
        );
        Ok(())
    }

    #[test]
    fn fibonacci() -> Result<(), LoxError> {
        let prg = r#"
            fun fib(n) {
                if (n < 2) return n;
                return fib(n - 2) + fib(n - 1);
            }
            for (var i = 0; i < 10; i = i + 1) {
                print(fib(i));
            }
        "#;
        assert_eq!(interpret(prg)?, "0\n1\n1\n2\n3\n5\n8\n13\n21\n34\n");
        Ok(())
    }

    #[test]
    fn local_recursive_function() -> Result<(), LoxError> {
        let prg = r#"
            {
                fun count(n) {
                    if (n > 0) count(n - 1);
                    print(n);
                }
                count(2);
            }
        "#;
        assert_eq!(interpret(prg)?, "0\n1\n2\n");
        Ok(())
    }

    #[test]
    fn make_counter() -> Result<(), LoxError> {
        let prg = r#"
            fun makeCounter() {
                var i = 0;
                fun count() {
                    i = i + 1;
                    print(i);
                }
                return count;
            }
            var counter = makeCounter();
            counter();
            counter();
        "#;
        assert_eq!(interpret(prg)?, "1\n2\n");
        Ok(())
    }

    #[test]
    fn nested_loops_with_break_and_continue() -> Result<(), LoxError> {
        let prg = r#"
            var i = 0;
            while (i < 3) {
                i++;
                var j = 0;
                while (true) {
                    j++;
                    if (j == 2) continue;
                    if (j > 3) break;
                    print(i, j);
                }
                if (i == 2) break;
            }
        "#;
        assert_eq!(interpret(prg)?, "1 1\n1 3\n2 1\n2 3\n");
        Ok(())
    }

    #[test]
    fn closures_share_captured_variable() -> Result<(), LoxError> {
        let prg = r#"
            var get;
            var set;
            fun make() {
                var x = 1;
                fun g() { return x; }
                fun s(v) { x = v; }
                get = g;
                set = s;
            }
            make();
            print(get());
            set(7);
            print(get());
            print(get());
        "#;
        assert_eq!(interpret(prg)?, "1\n7\n7\n");
        Ok(())
    }

    #[test]
    fn definitions_persist_across_evals() -> Result<(), LoxError> {
        let mut out: Vec<u8> = Vec::new();
        let mut interp = Interpreter::with_input(&mut out, std::io::empty());
        interp.eval("fun make() { var x = 1; return fun () { return x; }; } var get = make();")?;
        interp.eval("{ var a = 10; { var b = 20; print(a + b); } }")?;
        interp.eval("print(get());")?;
        drop(interp);
        assert_eq!(out, b"30\n1\n");
        Ok(())
    }

    #[test]
    fn session_survives_errors() -> Result<(), LoxError> {
        let mut out: Vec<u8> = Vec::new();
        let mut interp = Interpreter::with_input(&mut out, std::io::empty());
        interp.eval("var a = 1;")?;
        assert!(interp.eval("print(a); a = a + nil; print(a);").is_err());
        assert!(interp.eval("var b = ;").is_err());
        interp.eval("print(a);")?;
        drop(interp);
        assert_eq!(out, b"1\n1\n");
        Ok(())
    }

    #[test]
    fn scan_errors_are_all_reported() {
        match interpret("print(1);\n@\n\"open") {
            Err(LoxError::Scan(ScanErrors(errors))) => {
                let kinds = errors.iter().map(|e| (e.line, &e.kind)).collect::<Vec<_>>();
                assert_eq!(
                    kinds,
                    vec![
                        (2, &LexErrorKind::UnexpectedCharacter('@')),
                        (3, &LexErrorKind::UnterminatedString),
                    ]
                );
            }
            r => panic!("unexpected output: {:?}", r),
        }
    }

    #[test]
    fn nothing_runs_after_parse_error() {
        match interpret("print(1);\nprint(2)") {
            Err(LoxError::Parse(PartialParse { statements, error })) => {
                assert_eq!(statements.len(), 1);
                assert_eq!(error.line, 2);
                assert_eq!(
                    error.kind,
                    ParseErrorKind::Expected("expected ';' after expression")
                );
            }
            r => panic!("unexpected output: {:?}", r),
        }
    }

    #[test]
    fn nothing_runs_after_resolve_error() {
        let mut out: Vec<u8> = Vec::new();
        let mut interp = Interpreter::with_input(&mut out, std::io::empty());
        match interp.eval("print(1); return 2;") {
            Err(LoxError::Resolve(ResolveError::ReturnOutsideFunction { line: 1 })) => (),
            r => panic!("unexpected output: {:?}", r),
        }
        drop(interp);
        assert!(out.is_empty());
    }

    #[test]
    fn runtime_error_message() {
        match interpret("fun f(x) {\n  return x + 1;\n}\nf(\"a\");") {
            Err(e @ LoxError::Runtime(_)) => assert_eq!(
                e.to_string(),
                "runtime error: line 4: in f(): line 2: operands must be two numbers or two strings"
            ),
            r => panic!("unexpected output: {:?}", r),
        }
    }

    #[test]
    fn input_from_line_source() -> Result<(), LoxError> {
        let mut out: Vec<u8> = Vec::new();
        let mut interp = Interpreter::with_input(&mut out, "Ada\n".as_bytes());
        interp.eval("print(\"hi \" + input()); print(input());")?;
        drop(interp);
        assert_eq!(out, b"hi Ada\nnil\n");
        Ok(())
    }
}
