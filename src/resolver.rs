//! Static scope resolution.
//!
//! Walks the tree once before execution and records, for each local variable reference, how many
//! scopes separate it from the declaring scope.  References that are not found in any enclosing
//! local scope are left out of the table and looked up in the globals at run time.

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::ast::{Expr, ExprId, ExprKind, Lambda, Stmt};
use crate::diag::ResolveError;
use crate::token::Token;

/// Scope distance of every resolved local reference.
pub type Locals = FxHashMap<ExprId, usize>;

/// Resolves `stmts` and records distances into `locals`.
pub fn resolve(stmts: &[Stmt], locals: &mut Locals) -> Result<(), ResolveError> {
    Resolver::new(locals).resolve(stmts)
}

#[derive(Debug)]
pub struct Resolver<'a> {
    locals: &'a mut Locals,
    // Innermost last.  `false` means declared but not yet initialized.
    scopes: Vec<FxHashMap<String, bool>>,
    loop_depth: usize,
    function_depth: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(locals: &'a mut Locals) -> Resolver<'a> {
        Resolver {
            locals,
            scopes: vec![],
            loop_depth: 0,
            function_depth: 0,
        }
    }

    pub fn resolve(&mut self, stmts: &[Stmt]) -> Result<(), ResolveError> {
        for stmt in stmts {
            self.stmt(stmt)?;
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<(), ResolveError> {
        match stmt {
            Stmt::Expression(e) => self.expr(e),
            Stmt::Var { name, initializer } => {
                // Early definition lets a function refer to itself.
                let is_function = matches!(
                    initializer,
                    Some(Expr {
                        kind: ExprKind::Lambda(_),
                        ..
                    })
                );
                self.declare(name);
                if is_function {
                    self.define(name);
                }
                if let Some(init) = initializer {
                    self.expr(init)?;
                }
                self.define(name);
                Ok(())
            }
            Stmt::Block(stmts) => {
                self.begin_scope();
                let r = self.resolve(stmts);
                self.end_scope();
                r
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.expr(condition)?;
                self.stmt(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.stmt(else_branch)?;
                }
                Ok(())
            }
            Stmt::While { condition, body } => {
                self.expr(condition)?;
                self.loop_depth += 1;
                let r = self.stmt(body);
                self.loop_depth -= 1;
                r
            }
            Stmt::Break(keyword) => self.check_in_loop("break", keyword),
            Stmt::Continue(keyword) => self.check_in_loop("continue", keyword),
            Stmt::Return { keyword, value } => {
                if self.function_depth == 0 {
                    return Err(ResolveError::ReturnOutsideFunction { line: keyword.line });
                }
                match value {
                    Some(value) => self.expr(value),
                    None => Ok(()),
                }
            }
        }
    }

    fn expr(&mut self, expr: &Expr) -> Result<(), ResolveError> {
        match &expr.kind {
            ExprKind::Literal(_) => Ok(()),
            ExprKind::Grouping(inner) => self.expr(inner),
            ExprKind::Unary { right, .. } => self.expr(right),
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                self.expr(left)?;
                self.expr(right)
            }
            ExprKind::PostUnary { left, .. } => self.expr(left),
            ExprKind::Variable(name) => {
                let innermost = self
                    .scopes
                    .iter()
                    .rev()
                    .find_map(|scope| scope.get(&name.lexeme));
                if innermost == Some(&false) {
                    return Err(ResolveError::SelfReferencingInitializer {
                        name: name.lexeme.clone(),
                        line: name.line,
                    });
                }
                self.resolve_local(expr.id, name);
                Ok(())
            }
            ExprKind::Assign { name, value } => {
                self.expr(value)?;
                self.resolve_local(expr.id, name);
                Ok(())
            }
            ExprKind::Call { callee, args, .. } => {
                self.expr(callee)?;
                for arg in args {
                    self.expr(arg)?;
                }
                Ok(())
            }
            ExprKind::Lambda(lambda) => self.function(lambda),
        }
    }

    // Parameters and body statements share a single scope.
    fn function(&mut self, lambda: &Lambda) -> Result<(), ResolveError> {
        let enclosing_loop_depth = std::mem::replace(&mut self.loop_depth, 0);
        self.function_depth += 1;
        self.begin_scope();
        for param in &lambda.params {
            self.declare(param);
            self.define(param);
        }
        let r = self.resolve(&lambda.body);
        self.end_scope();
        self.function_depth -= 1;
        self.loop_depth = enclosing_loop_depth;
        r
    }

    fn check_in_loop(&self, keyword: &'static str, token: &Token) -> Result<(), ResolveError> {
        if self.loop_depth == 0 {
            Err(ResolveError::OutsideLoop {
                keyword,
                line: token.line,
            })
        } else {
            Ok(())
        }
    }

    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        for (distance, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                trace!(name = %name.lexeme, line = name.line, distance, "resolved local");
                self.locals.insert(id, distance);
                return;
            }
        }
        trace!(name = %name.lexeme, line = name.line, "assuming global");
    }

    fn begin_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), false);
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }
}
