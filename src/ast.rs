use std::fmt;
use std::rc::Rc;

use crate::token::{Literal, Token};

/// Stable identity of an expression node, assigned at parse time.
///
/// The resolver keys its distance table by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(u32);

/// Hands out `ExprId`s.  A session threads one counter through every parse so ids never collide.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExprIds {
    next: u32,
}

impl ExprIds {
    pub fn next_id(&mut self) -> ExprId {
        let id = ExprId(self.next);
        self.next += 1;
        id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: ExprId,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Grouping(Box<Expr>),
    Unary {
        op: Token,
        right: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: Token,
        right: Box<Expr>,
    },
    /// Short-circuiting `and` / `or`.
    Logical {
        left: Box<Expr>,
        op: Token,
        right: Box<Expr>,
    },
    /// `++` / `--`.
    PostUnary {
        left: Box<Expr>,
        op: Token,
    },
    Variable(Token),
    Assign {
        name: Token,
        value: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        // Closing paren, kept to locate runtime errors.
        paren: Token,
    },
    Lambda(Rc<Lambda>),
}

/// Function literal.  Shared with every closure created from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    /// Set when the lambda comes from a `fun name(...)` declaration.
    pub name: Option<Token>,
    pub keyword: Token,
    pub params: Vec<Token>,
    pub body: Vec<Stmt>,
}

impl Lambda {
    pub fn name(&self) -> &str {
        self.name.as_ref().map_or("anonymous", |t| t.lexeme.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expression(Expr),
    /// `var name = initializer;`.  A missing initializer means `nil`.
    Var {
        name: Token,
        initializer: Option<Expr>,
    },
    Block(Vec<Stmt>),
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    Break(Token),
    Continue(Token),
    Return {
        keyword: Token,
        value: Option<Expr>,
    },
}

/// Parenthesized prefix notation, e.g. `(+ 1 (* 2 3))`.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Literal(lit) => write!(f, "{}", lit),
            ExprKind::Grouping(inner) => write!(f, "(group {})", inner),
            ExprKind::Unary { op, right } => write!(f, "({} {})", op.lexeme, right),
            ExprKind::Binary { left, op, right } | ExprKind::Logical { left, op, right } => {
                write!(f, "({} {} {})", op.lexeme, left, right)
            }
            ExprKind::PostUnary { left, op } => write!(f, "({} {})", left, op.lexeme),
            ExprKind::Variable(name) => write!(f, "{}", name.lexeme),
            ExprKind::Assign { name, value } => write!(f, "(= {} {})", name.lexeme, value),
            ExprKind::Call { callee, args, .. } => {
                write!(f, "(call {}", callee)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                write!(f, ")")
            }
            ExprKind::Lambda(lambda) => {
                write!(f, "(fun ")?;
                if let Some(name) = &lambda.name {
                    write!(f, "{} ", name.lexeme)?;
                }
                let params = lambda
                    .params
                    .iter()
                    .map(|p| p.lexeme.as_str())
                    .collect::<Vec<_>>();
                write!(f, "({}))", params.join(" "))
            }
        }
    }
}
