//! Diagnostics raised by the static phases: scanning, parsing and resolution.

use std::fmt;

use thiserror::Error;

use crate::ast::Stmt;

/// Line number (starting at one).
pub type Line = u32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {kind}")]
pub struct LexError {
    pub line: Line,
    pub kind: LexErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexErrorKind {
    #[error("unexpected character: {0}")]
    UnexpectedCharacter(char),
    #[error("unterminated string")]
    UnterminatedString,
}

/// Every lexical error found in one pass over the source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ScanErrors(pub Vec<LexError>);

impl fmt::Display for ScanErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "scan error: {}", e)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error: line {line} at {}: {kind}", Where(.lexeme))]
pub struct ParseError {
    pub line: Line,
    pub lexeme: String,
    pub kind: ParseErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("expected expression")]
    ExpectedExpression,
    #[error("{0}")]
    Expected(&'static str),
    #[error("left hand side of assignment must be a variable")]
    InvalidAssignmentTarget,
    #[error("can't have more than 255 arguments")]
    TooManyArguments,
    #[error("can't have more than 255 parameters")]
    TooManyParameters,
}

struct Where<'a>(&'a str);

impl fmt::Display for Where<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "end")
        } else {
            write!(f, "'{}'", self.0)
        }
    }
}

/// A parse failure together with the statements parsed before it.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct PartialParse {
    pub statements: Vec<Stmt>,
    #[source]
    pub error: ParseError,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("resolve error: line {line}: cannot read local variable '{name}' in its own initializer")]
    SelfReferencingInitializer { name: String, line: Line },
    #[error("resolve error: line {line}: '{keyword}' outside of a loop")]
    OutsideLoop { keyword: &'static str, line: Line },
    #[error("resolve error: line {line}: 'return' outside of a function")]
    ReturnOutsideFunction { line: Line },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_errors_are_joined() {
        let errors = ScanErrors(vec![
            LexError {
                line: 1,
                kind: LexErrorKind::UnexpectedCharacter('@'),
            },
            LexError {
                line: 3,
                kind: LexErrorKind::UnterminatedString,
            },
        ]);
        assert_eq!(
            errors.to_string(),
            "scan error: line 1: unexpected character: @\nscan error: line 3: unterminated string"
        );
    }

    #[test]
    fn parse_error_at_end() {
        let e = ParseError {
            line: 2,
            lexeme: String::new(),
            kind: ParseErrorKind::Expected("expected ')' after expression"),
        };
        assert_eq!(
            e.to_string(),
            "parse error: line 2 at end: expected ')' after expression"
        );
    }
}
