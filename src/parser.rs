//! Pratt parser.
//!
//! Expressions are parsed by precedence climbing over two parselet tables keyed by token kind: a
//! prefix table for tokens that start an expression and an infix table for tokens that continue
//! one.  Statements are dispatched on the lookahead token through a third table, falling back to
//! an expression statement.  All three tables live in a [`Grammar`] which callers may extend.

use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::ast::{Expr, ExprIds, ExprKind, Lambda, Stmt};
use crate::diag::{ParseError, ParseErrorKind, PartialParse};
use crate::token::{Literal, Token, TokenKind};

/// Maximum number of call arguments and of function parameters.
const MAX_ARITY: usize = 255;

/// Binding power of infix operators, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    Lowest,
    Assignment,
    Or,
    And,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Postfix,
    Call,
}

/// Parses an expression starting with the already consumed `token`.
pub type PrefixParselet = fn(&mut Parser, Token) -> Result<Expr, ParseError>;

/// Parses the rest of an expression whose left operand and operator token are already consumed.
pub type InfixFn = fn(&mut Parser, Expr, Token) -> Result<Expr, ParseError>;

/// Parses a statement.  The introducing token has not been consumed yet.
pub type StatementParselet = fn(&mut Parser) -> Result<Stmt, ParseError>;

#[derive(Clone, Copy)]
pub struct InfixParselet {
    pub precedence: Precedence,
    pub parse: InfixFn,
}

impl fmt::Debug for InfixParselet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfixParselet")
            .field("precedence", &self.precedence)
            .finish_non_exhaustive()
    }
}

/// Parselet tables driving a `Parser`.
///
/// `Grammar::default()` is the Lox grammar.
#[derive(Clone)]
pub struct Grammar {
    prefix: FxHashMap<TokenKind, PrefixParselet>,
    infix: FxHashMap<TokenKind, InfixParselet>,
    statements: FxHashMap<TokenKind, StatementParselet>,
}

impl Grammar {
    /// A grammar with no parselets: every statement is an expression statement and no token
    /// starts an expression.
    pub fn empty() -> Grammar {
        Grammar {
            prefix: FxHashMap::default(),
            infix: FxHashMap::default(),
            statements: FxHashMap::default(),
        }
    }

    pub fn register_prefix(&mut self, kind: TokenKind, parselet: PrefixParselet) -> &mut Self {
        self.prefix.insert(kind, parselet);
        self
    }

    pub fn register_infix(
        &mut self,
        kind: TokenKind,
        precedence: Precedence,
        parse: InfixFn,
    ) -> &mut Self {
        self.infix.insert(kind, InfixParselet { precedence, parse });
        self
    }

    pub fn register_statement(&mut self, kind: TokenKind, parselet: StatementParselet) -> &mut Self {
        self.statements.insert(kind, parselet);
        self
    }

    pub fn prefix(&self, kind: TokenKind) -> Option<PrefixParselet> {
        self.prefix.get(&kind).copied()
    }

    pub fn infix(&self, kind: TokenKind) -> Option<InfixParselet> {
        self.infix.get(&kind).copied()
    }

    pub fn statement(&self, kind: TokenKind) -> Option<StatementParselet> {
        self.statements.get(&kind).copied()
    }

    /// Precedence of `kind` used as an infix operator, `Lowest` if it is not one.
    pub fn precedence(&self, kind: TokenKind) -> Precedence {
        self.infix
            .get(&kind)
            .map_or(Precedence::Lowest, |p| p.precedence)
    }
}

impl Default for Grammar {
    fn default() -> Self {
        use Precedence as P;
        use TokenKind as T;

        let mut g = Grammar::empty();
        g.register_prefix(T::Plus, unary)
            .register_prefix(T::Minus, unary)
            .register_prefix(T::Bang, unary)
            .register_prefix(T::Number, literal)
            .register_prefix(T::String, literal)
            .register_prefix(T::Nil, literal)
            .register_prefix(T::True, literal)
            .register_prefix(T::False, literal)
            .register_prefix(T::Identifier, variable)
            .register_prefix(T::LeftParen, grouping)
            .register_prefix(T::Fun, lambda);

        g.register_infix(T::Equal, P::Assignment, assignment)
            .register_infix(T::Or, P::Or, logical)
            .register_infix(T::And, P::And, logical)
            .register_infix(T::EqualEqual, P::Equality, binary)
            .register_infix(T::BangEqual, P::Equality, binary)
            .register_infix(T::Less, P::Comparison, binary)
            .register_infix(T::LessEqual, P::Comparison, binary)
            .register_infix(T::Greater, P::Comparison, binary)
            .register_infix(T::GreaterEqual, P::Comparison, binary)
            .register_infix(T::Plus, P::Term, binary)
            .register_infix(T::Minus, P::Term, binary)
            .register_infix(T::Star, P::Factor, binary)
            .register_infix(T::Slash, P::Factor, binary)
            .register_infix(T::PlusPlus, P::Postfix, postfix)
            .register_infix(T::MinusMinus, P::Postfix, postfix)
            .register_infix(T::LeftParen, P::Call, call);

        g.register_statement(T::LeftBrace, block)
            .register_statement(T::Fun, function_declaration)
            .register_statement(T::Var, var_declaration)
            .register_statement(T::If, if_statement)
            .register_statement(T::While, while_statement)
            .register_statement(T::For, for_statement)
            .register_statement(T::Break, break_statement)
            .register_statement(T::Continue, continue_statement)
            .register_statement(T::Return, return_statement);
        g
    }
}

impl fmt::Debug for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grammar")
            .field("prefix", &self.prefix.keys().collect::<Vec<_>>())
            .field("infix", &self.infix)
            .field("statements", &self.statements.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Parses a whole token sequence with the Lox grammar.
pub fn parse(tokens: Vec<Token>) -> Result<Vec<Stmt>, PartialParse> {
    Parser::new(tokens).parse_program()
}

#[derive(Debug)]
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    grammar: Rc<Grammar>,
    ids: ExprIds,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Parser {
        Parser::with_grammar(tokens, Rc::new(Grammar::default()))
    }

    pub fn with_grammar(mut tokens: Vec<Token>, grammar: Rc<Grammar>) -> Parser {
        if tokens.last().map(|t| t.kind) != Some(TokenKind::Eof) {
            let line = tokens.last().map_or(1, |t| t.line);
            tokens.push(Token::new(TokenKind::Eof, "", line));
        }
        Parser {
            tokens,
            current: 0,
            grammar,
            ids: ExprIds::default(),
        }
    }

    /// Resume expression numbering from `ids`, so nodes never share an id with an earlier parse.
    pub fn continuing(mut self, ids: ExprIds) -> Parser {
        self.ids = ids;
        self
    }

    /// The id counter, positioned after the last node created so far.
    pub fn ids(&self) -> ExprIds {
        self.ids
    }

    /// Parses statements up to end of input.
    ///
    /// There is no error recovery: the first error stops parsing and is returned together with
    /// the statements parsed before it.
    pub fn parse_program(&mut self) -> Result<Vec<Stmt>, PartialParse> {
        let mut statements = vec![];
        while !self.is_at_end() {
            match self.statement() {
                Ok(stmt) => statements.push(stmt),
                Err(error) => return Err(PartialParse { statements, error }),
            }
        }
        Ok(statements)
    }

    pub fn statement(&mut self) -> Result<Stmt, ParseError> {
        let parselet = self
            .grammar
            .statement(self.peek().kind)
            .unwrap_or(expression_statement);
        parselet(self)
    }

    pub fn expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_expr(Precedence::Lowest)
    }

    /// Parses an expression whose infix operators all bind tighter than `min`.
    pub fn parse_expr(&mut self, min: Precedence) -> Result<Expr, ParseError> {
        let token = self.advance();
        let prefix = match self.grammar.prefix(token.kind) {
            Some(prefix) => prefix,
            None => return Err(error_at(&token, ParseErrorKind::ExpectedExpression)),
        };
        let mut left = prefix(self, token)?;

        while min < self.grammar.precedence(self.peek().kind) {
            let token = self.advance();
            let infix = match self.grammar.infix(token.kind) {
                Some(infix) => infix,
                None => return Err(error_at(&token, ParseErrorKind::ExpectedExpression)),
            };
            left = (infix.parse)(self, left, token)?;
        }
        Ok(left)
    }

    /// Parses statements up to and including the closing brace.  The opening brace is already
    /// consumed.
    pub fn block_body(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut stmts = vec![];
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            stmts.push(self.statement()?);
        }
        self.consume(TokenKind::RightBrace, "expected '}' after block")?;
        Ok(stmts)
    }

    /// Wraps `kind` in a node with a fresh id.
    pub fn expr(&mut self, kind: ExprKind) -> Expr {
        Expr {
            id: self.ids.next_id(),
            kind,
        }
    }

    pub fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    /// Kind of the token `n` positions after the current one.
    pub fn peek_kind_at(&self, n: usize) -> TokenKind {
        self.tokens
            .get(self.current + n)
            .map_or(TokenKind::Eof, |t| t.kind)
    }

    /// Consumes the current token.  `Eof` is never consumed.
    pub fn advance(&mut self) -> Token {
        let token = self.tokens[self.current].clone();
        if token.kind != TokenKind::Eof {
            self.current += 1;
        }
        token
    }

    pub fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    /// Consumes the current token if it is of the given kind.
    pub fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn consume(&mut self, kind: TokenKind, message: &'static str) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(error_at(self.peek(), ParseErrorKind::Expected(message)))
        }
    }

    fn is_at_end(&self) -> bool {
        self.check(TokenKind::Eof)
    }
}

pub fn error_at(token: &Token, kind: ParseErrorKind) -> ParseError {
    ParseError {
        line: token.line,
        lexeme: token.lexeme.clone(),
        kind,
    }
}

fn literal(p: &mut Parser, token: Token) -> Result<Expr, ParseError> {
    let lit = match token.kind {
        TokenKind::True => Literal::Bool(true),
        TokenKind::False => Literal::Bool(false),
        TokenKind::Nil => Literal::Nil,
        _ => match token.literal {
            Some(lit) => lit,
            None => return Err(error_at(&token, ParseErrorKind::ExpectedExpression)),
        },
    };
    Ok(p.expr(ExprKind::Literal(lit)))
}

fn variable(p: &mut Parser, token: Token) -> Result<Expr, ParseError> {
    Ok(p.expr(ExprKind::Variable(token)))
}

fn grouping(p: &mut Parser, _paren: Token) -> Result<Expr, ParseError> {
    let inner = p.expression()?;
    p.consume(TokenKind::RightParen, "expected ')' after expression")?;
    Ok(p.expr(ExprKind::Grouping(Box::new(inner))))
}

fn unary(p: &mut Parser, op: Token) -> Result<Expr, ParseError> {
    let right = p.parse_expr(Precedence::Unary)?;
    Ok(p.expr(ExprKind::Unary {
        op,
        right: Box::new(right),
    }))
}

fn lambda(p: &mut Parser, keyword: Token) -> Result<Expr, ParseError> {
    function(p, keyword, None)
}

/// Parameter list and body of a function literal.  `fun` and the optional name are consumed.
fn function(p: &mut Parser, keyword: Token, name: Option<Token>) -> Result<Expr, ParseError> {
    p.consume(TokenKind::LeftParen, "expected '(' before parameters")?;
    let mut params = vec![];
    if !p.check(TokenKind::RightParen) {
        loop {
            if params.len() >= MAX_ARITY {
                return Err(error_at(p.peek(), ParseErrorKind::TooManyParameters));
            }
            params.push(p.consume(TokenKind::Identifier, "expected parameter name")?);
            if !p.matches(TokenKind::Comma) {
                break;
            }
        }
    }
    p.consume(TokenKind::RightParen, "expected ')' after parameters")?;
    p.consume(TokenKind::LeftBrace, "expected '{' before function body")?;
    let body = p.block_body()?;
    Ok(p.expr(ExprKind::Lambda(Rc::new(Lambda {
        name,
        keyword,
        params,
        body,
    }))))
}

fn binary(p: &mut Parser, left: Expr, op: Token) -> Result<Expr, ParseError> {
    let precedence = p.grammar.precedence(op.kind);
    let right = p.parse_expr(precedence)?;
    Ok(p.expr(ExprKind::Binary {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }))
}

fn logical(p: &mut Parser, left: Expr, op: Token) -> Result<Expr, ParseError> {
    let precedence = p.grammar.precedence(op.kind);
    let right = p.parse_expr(precedence)?;
    Ok(p.expr(ExprKind::Logical {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }))
}

// Right associative: the value is parsed one level below assignment.
fn assignment(p: &mut Parser, left: Expr, equal: Token) -> Result<Expr, ParseError> {
    let value = p.parse_expr(Precedence::Lowest)?;
    match left.kind {
        ExprKind::Variable(name) => Ok(p.expr(ExprKind::Assign {
            name,
            value: Box::new(value),
        })),
        _ => Err(error_at(&equal, ParseErrorKind::InvalidAssignmentTarget)),
    }
}

fn postfix(p: &mut Parser, left: Expr, op: Token) -> Result<Expr, ParseError> {
    Ok(p.expr(ExprKind::PostUnary {
        left: Box::new(left),
        op,
    }))
}

fn call(p: &mut Parser, callee: Expr, _paren: Token) -> Result<Expr, ParseError> {
    let mut args = vec![];
    if !p.check(TokenKind::RightParen) {
        loop {
            if args.len() >= MAX_ARITY {
                return Err(error_at(p.peek(), ParseErrorKind::TooManyArguments));
            }
            args.push(p.expression()?);
            if !p.matches(TokenKind::Comma) {
                break;
            }
        }
    }
    let paren = p.consume(TokenKind::RightParen, "expected ')' after arguments")?;
    Ok(p.expr(ExprKind::Call {
        callee: Box::new(callee),
        args,
        paren,
    }))
}

fn expression_statement(p: &mut Parser) -> Result<Stmt, ParseError> {
    let expr = p.expression()?;
    p.consume(TokenKind::Semicolon, "expected ';' after expression")?;
    Ok(Stmt::Expression(expr))
}

fn var_declaration(p: &mut Parser) -> Result<Stmt, ParseError> {
    p.advance();
    let name = p.consume(TokenKind::Identifier, "expected variable name")?;
    let initializer = if p.matches(TokenKind::Equal) {
        Some(p.expression()?)
    } else {
        None
    };
    p.consume(
        TokenKind::Semicolon,
        "expected ';' after variable declaration",
    )?;
    Ok(Stmt::Var { name, initializer })
}

/// `fun name(...) {...}` becomes `var name = fun (...) {...};`.  A `fun` not followed by a name
/// starts a lambda expression statement.
fn function_declaration(p: &mut Parser) -> Result<Stmt, ParseError> {
    if p.peek_kind_at(1) != TokenKind::Identifier {
        return expression_statement(p);
    }
    let keyword = p.advance();
    let name = p.advance();
    let lambda = function(p, keyword, Some(name.clone()))?;
    Ok(Stmt::Var {
        name,
        initializer: Some(lambda),
    })
}

fn block(p: &mut Parser) -> Result<Stmt, ParseError> {
    p.advance();
    Ok(Stmt::Block(p.block_body()?))
}

fn if_statement(p: &mut Parser) -> Result<Stmt, ParseError> {
    p.advance();
    p.consume(TokenKind::LeftParen, "expected '(' after 'if'")?;
    let condition = p.expression()?;
    p.consume(TokenKind::RightParen, "expected ')' after if condition")?;
    let then_branch = Box::new(p.statement()?);
    let else_branch = if p.matches(TokenKind::Else) {
        Some(Box::new(p.statement()?))
    } else {
        None
    };
    Ok(Stmt::If {
        condition,
        then_branch,
        else_branch,
    })
}

fn while_statement(p: &mut Parser) -> Result<Stmt, ParseError> {
    p.advance();
    p.consume(TokenKind::LeftParen, "expected '(' after 'while'")?;
    let condition = p.expression()?;
    p.consume(TokenKind::RightParen, "expected ')' after while condition")?;
    let body = Box::new(p.statement()?);
    Ok(Stmt::While { condition, body })
}

/// Desugars `for (init; cond; incr) body` into
/// `{ init; while (cond) { body; incr; } }`.
fn for_statement(p: &mut Parser) -> Result<Stmt, ParseError> {
    p.advance();
    p.consume(TokenKind::LeftParen, "expected '(' after 'for'")?;

    let initializer = if p.matches(TokenKind::Semicolon) {
        None
    } else if p.check(TokenKind::Var) {
        Some(var_declaration(p)?)
    } else {
        Some(expression_statement(p)?)
    };

    let condition = if p.check(TokenKind::Semicolon) {
        None
    } else {
        Some(p.expression()?)
    };
    p.consume(TokenKind::Semicolon, "expected ';' after loop condition")?;

    let increment = if p.check(TokenKind::RightParen) {
        None
    } else {
        Some(p.expression()?)
    };
    p.consume(TokenKind::RightParen, "expected ')' after for clauses")?;

    let mut body = p.statement()?;
    if let Some(increment) = increment {
        body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
    }
    let condition = match condition {
        Some(condition) => condition,
        None => p.expr(ExprKind::Literal(Literal::Bool(true))),
    };
    let mut stmt = Stmt::While {
        condition,
        body: Box::new(body),
    };
    if let Some(initializer) = initializer {
        stmt = Stmt::Block(vec![initializer, stmt]);
    }
    Ok(stmt)
}

fn break_statement(p: &mut Parser) -> Result<Stmt, ParseError> {
    let keyword = p.advance();
    p.consume(TokenKind::Semicolon, "expected ';' after 'break'")?;
    Ok(Stmt::Break(keyword))
}

fn continue_statement(p: &mut Parser) -> Result<Stmt, ParseError> {
    let keyword = p.advance();
    p.consume(TokenKind::Semicolon, "expected ';' after 'continue'")?;
    Ok(Stmt::Continue(keyword))
}

fn return_statement(p: &mut Parser) -> Result<Stmt, ParseError> {
    let keyword = p.advance();
    let value = if p.check(TokenKind::Semicolon) {
        None
    } else {
        Some(p.expression()?)
    };
    p.consume(TokenKind::Semicolon, "expected ';' after return value")?;
    Ok(Stmt::Return { keyword, value })
}
