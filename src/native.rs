//! Built-in functions bound in the global environment.

use std::fmt;
use std::io::{self, BufRead, Write};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::env::Environment;
use crate::eval::RuntimeError;
use crate::value::{Arity, Callable, NativeFunction, Value};

/// Where `input()` reads lines from.
pub trait LineSource {
    /// Appends one line, terminator included, to `buf`.  Returns 0 at end of input.
    fn read_line(&mut self, buf: &mut String) -> io::Result<usize>;
}

impl<R: BufRead> LineSource for R {
    fn read_line(&mut self, buf: &mut String) -> io::Result<usize> {
        BufRead::read_line(self, buf)
    }
}

/// Process standard input.  Locks stdin only for the duration of each read.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinSource;

impl LineSource for StdinSource {
    fn read_line(&mut self, buf: &mut String) -> io::Result<usize> {
        io::stdin().read_line(buf)
    }
}

/// I/O capabilities handed to native functions.
pub struct NativeIo<'a> {
    pub output: &'a mut dyn Write,
    pub input: &'a mut dyn LineSource,
}

impl fmt::Debug for NativeIo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeIo").finish_non_exhaustive()
    }
}

pub type NativeFn = fn(&mut NativeIo<'_>, &[Value]) -> Result<Value, RuntimeError>;

/// Binds `clock`, `print` and `input` in `globals`.
pub fn define_natives(globals: &Environment) {
    let natives: [(&'static str, Arity, NativeFn); 3] = [
        ("clock", Arity::Fixed(0), clock),
        ("print", Arity::Variadic, print),
        ("input", Arity::Fixed(0), input),
    ];
    for (name, arity, func) in natives {
        let native = NativeFunction { name, arity, func };
        globals.define(name, Value::Callable(Callable::Native(Rc::new(native))));
    }
}

/// Seconds since the Unix epoch.
pub fn clock(_io: &mut NativeIo<'_>, _args: &[Value]) -> Result<Value, RuntimeError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| RuntimeError::Native(format!("clock: {}", e)))?;
    Ok(Value::Number(now.as_secs_f64()))
}

/// Writes the arguments separated by spaces, then a newline.
pub fn print(io: &mut NativeIo<'_>, args: &[Value]) -> Result<Value, RuntimeError> {
    let line = args
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(io.output, "{}", line)?;
    Ok(Value::Nil)
}

/// Reads one line without its terminator.  `nil` at end of input.
pub fn input(io: &mut NativeIo<'_>, _args: &[Value]) -> Result<Value, RuntimeError> {
    io.output.flush()?;
    let mut buf = String::new();
    if io.input.read_line(&mut buf)? == 0 {
        return Ok(Value::Nil);
    }
    let line = buf.strip_suffix('\n').unwrap_or(&buf);
    let line = line.strip_suffix('\r').unwrap_or(line);
    Ok(Value::String(line.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn call(f: NativeFn, args: &[Value], input: &str) -> Result<(Value, String), RuntimeError> {
        let mut out: Vec<u8> = Vec::new();
        let mut src = input.as_bytes();
        let v = f(
            &mut NativeIo {
                output: &mut out,
                input: &mut src,
            },
            args,
        )?;
        Ok((v, String::from_utf8(out).expect("output is not utf-8")))
    }

    #[test]
    fn print_joins_with_spaces() -> Result<(), RuntimeError> {
        let args = [Value::Number(1.0), Value::String("a".into()), Value::Nil];
        assert_eq!(call(print, &args, "")?, (Value::Nil, "1 a nil\n".to_string()));
        assert_eq!(call(print, &[], "")?, (Value::Nil, "\n".to_string()));
        Ok(())
    }

    #[test]
    fn input_reads_lines() -> Result<(), RuntimeError> {
        let mut out: Vec<u8> = Vec::new();
        let mut src = "first\r\nsecond".as_bytes();
        let mut io = NativeIo {
            output: &mut out,
            input: &mut src,
        };
        assert_eq!(input(&mut io, &[])?, Value::String("first".into()));
        assert_eq!(input(&mut io, &[])?, Value::String("second".into()));
        assert_eq!(input(&mut io, &[])?, Value::Nil);
        Ok(())
    }

    #[test]
    fn clock_is_positive() -> Result<(), RuntimeError> {
        match call(clock, &[], "")? {
            (Value::Number(n), _) if n > 0.0 => (),
            r => panic!("unexpected output: {:?}", r),
        }
        Ok(())
    }

    #[test]
    fn natives_are_defined() {
        let globals = Environment::new();
        define_natives(&globals);
        for name in ["clock", "print", "input"] {
            match globals.get(name) {
                Ok(Value::Callable(c)) => assert_eq!(c.name(), name),
                r => panic!("unexpected output: {:?}", r),
            }
        }
    }
}
