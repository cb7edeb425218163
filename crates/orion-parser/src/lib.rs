//! Recursive-descent parser for the Orion++ front-end language.
//!
//! Grammar (precedence lowest to highest): `program → declaration*`,
//! `declaration → function`, `statement → varDecl | exprStmt | block | if |
//! while | for | return`, `expression → assignment`, `assignment →
//! IDENT '=' assignment | logical_or` (right-associative), then the usual
//! `logical_or → logical_and → equality → comparison → term → factor →
//! unary → call → primary` chain.
//!
//! Parse errors trigger panic-mode recovery: the parser discards tokens
//! until it reaches a statement terminator (`;`) or the start of a new
//! declaration, then resumes, collecting every error it encounters rather
//! than stopping at the first one.

#![deny(missing_docs)]

use orion_ast::{BinaryOp, Expr, Function, Param, Program, SemType, Stmt, UnaryOp};
use orion_core::{OrionError, OrionResult, SourceId, Span};
use orion_lexer::{tokenize, Token, TokenKind};

/// Parses a full translation unit from source text.
pub fn parse(source_id: SourceId, source: &str) -> OrionResult<Program> {
    let tokens = tokenize(source_id, source)?;
    Parser::new(tokens).parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<String>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0, errors: Vec::new() }
    }

    fn parse_program(mut self) -> OrionResult<Program> {
        let mut functions = Vec::new();
        while !self.check_eof() {
            match self.parse_function() {
                Ok(f) => functions.push(f),
                Err(e) => {
                    self.errors.push(e.to_string());
                    self.synchronize_top_level();
                }
            }
        }
        if let Some(first) = self.errors.first() {
            return Err(OrionError::ParseError { message: first.clone().into() });
        }
        Ok(Program { functions })
    }

    /* ───────────────────────── top-level ───────────────────────── */

    fn parse_function(&mut self) -> OrionResult<Function> {
        let start_span = self.peek().span;
        let return_type = self.parse_type()?;
        let name = self.expect_ident()?;
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let ty = self.parse_type()?;
                let pname = self.expect_ident()?;
                params.push(Param { ty, name: pname });
                if self.check(&TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        let body_span = self.peek().span;
        self.expect(&TokenKind::LBrace)?;
        let mut body = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.check_eof() {
            match self.parse_statement() {
                Ok(stmt) => body.push(stmt),
                Err(e) => {
                    self.errors.push(e.to_string());
                    self.synchronize_statement();
                }
            }
        }
        self.expect(&TokenKind::RBrace)?;
        let end = self.previous().span;
        Ok(Function { name, return_type, params, body, span: join(start_span, end).unwrap_or(body_span) })
    }

    fn parse_type(&mut self) -> OrionResult<SemType> {
        let tok = self.advance().clone();
        let ty = match &tok.value {
            TokenKind::KwInt => SemType::Int,
            TokenKind::KwChar => SemType::Char,
            TokenKind::KwVoid => SemType::Void,
            TokenKind::KwConst => return self.parse_type(),
            other => return Err(unexpected(other, "a type keyword")),
        };
        Ok(ty)
    }

    /* ───────────────────────── statements ───────────────────────── */

    fn parse_statement(&mut self) -> OrionResult<Stmt> {
        match &self.peek().value {
            TokenKind::KwInt | TokenKind::KwChar | TokenKind::KwConst => self.parse_var_decl(),
            TokenKind::LBrace => self.parse_block(),
            TokenKind::KwIf => self.parse_if(),
            TokenKind::KwWhile => self.parse_while(),
            TokenKind::KwFor => self.parse_for(),
            TokenKind::KwReturn => self.parse_return(),
            _ => self.parse_expr_stmt(),
        }
    }

    fn parse_var_decl(&mut self) -> OrionResult<Stmt> {
        let start = self.peek().span;
        let ty = self.parse_type()?;
        let name = self.expect_ident()?;
        let init = if self.check(&TokenKind::Assign) {
            self.advance();
            Some(self.parse_expression()?)
        } else {
            None
        };
        let end = self.expect(&TokenKind::Semicolon)?.span;
        Ok(Stmt::VarDecl { ty, name, init, span: join(start, end).unwrap_or(start) })
    }

    fn parse_block(&mut self) -> OrionResult<Stmt> {
        let start = self.expect(&TokenKind::LBrace)?.span;
        let mut statements = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.check_eof() {
            statements.push(self.parse_statement()?);
        }
        let end = self.expect(&TokenKind::RBrace)?.span;
        Ok(Stmt::Block { statements, span: join(start, end).unwrap_or(start) })
    }

    fn parse_if(&mut self) -> OrionResult<Stmt> {
        let start = self.expect(&TokenKind::KwIf)?.span;
        self.expect(&TokenKind::LParen)?;
        let cond = self.parse_expression()?;
        self.expect(&TokenKind::RParen)?;
        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.check(&TokenKind::KwElse) {
            self.advance();
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        let end = else_branch.as_ref().map_or(then_branch.span(), |s| s.span());
        Ok(Stmt::If { cond, then_branch, else_branch, span: join(start, end).unwrap_or(start) })
    }

    fn parse_while(&mut self) -> OrionResult<Stmt> {
        let start = self.expect(&TokenKind::KwWhile)?.span;
        self.expect(&TokenKind::LParen)?;
        let cond = self.parse_expression()?;
        self.expect(&TokenKind::RParen)?;
        let body = Box::new(self.parse_statement()?);
        let end = body.span();
        Ok(Stmt::While { cond, body, span: join(start, end).unwrap_or(start) })
    }

    fn parse_for(&mut self) -> OrionResult<Stmt> {
        let start = self.expect(&TokenKind::KwFor)?.span;
        self.expect(&TokenKind::LParen)?;
        let init = if self.check(&TokenKind::Semicolon) {
            self.advance();
            None
        } else {
            let stmt = if matches!(self.peek().value, TokenKind::KwInt | TokenKind::KwChar | TokenKind::KwConst) {
                self.parse_var_decl()?
            } else {
                self.parse_expr_stmt()?
            };
            Some(Box::new(stmt))
        };
        let cond = if self.check(&TokenKind::Semicolon) { None } else { Some(self.parse_expression()?) };
        self.expect(&TokenKind::Semicolon)?;
        let step = if self.check(&TokenKind::RParen) { None } else { Some(self.parse_expression()?) };
        self.expect(&TokenKind::RParen)?;
        let body = Box::new(self.parse_statement()?);
        let end = body.span();
        Ok(Stmt::For { init, cond, step, body, span: join(start, end).unwrap_or(start) })
    }

    fn parse_return(&mut self) -> OrionResult<Stmt> {
        let start = self.expect(&TokenKind::KwReturn)?.span;
        let value = if self.check(&TokenKind::Semicolon) { None } else { Some(self.parse_expression()?) };
        let end = self.expect(&TokenKind::Semicolon)?.span;
        Ok(Stmt::Return { value, span: join(start, end).unwrap_or(start) })
    }

    fn parse_expr_stmt(&mut self) -> OrionResult<Stmt> {
        let expr = self.parse_expression()?;
        let start = expr.span();
        let end = self.expect(&TokenKind::Semicolon)?.span;
        Ok(Stmt::ExpressionStmt { expr, span: join(start, end).unwrap_or(start) })
    }

    /* ───────────────────────── expressions ───────────────────────── */

    fn parse_expression(&mut self) -> OrionResult<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> OrionResult<Expr> {
        let target = self.parse_logical_or()?;
        if self.check(&TokenKind::Assign) {
            self.advance();
            let value = self.parse_assignment()?;
            if !matches!(&target, Expr::Identifier { .. }) {
                return Err(OrionError::ParseError { message: "assignment target must be a variable".into() });
            }
            let span = join(target.span(), value.span()).unwrap_or(target.span());
            return Ok(Expr::Assign { target: Box::new(target), value: Box::new(value), span });
        }
        Ok(target)
    }

    fn parse_logical_or(&mut self) -> OrionResult<Expr> {
        self.parse_binary_chain(Self::parse_logical_and, &[(TokenKind::OrOr, BinaryOp::LogicalOr)])
    }

    fn parse_logical_and(&mut self) -> OrionResult<Expr> {
        self.parse_binary_chain(Self::parse_equality, &[(TokenKind::AndAnd, BinaryOp::LogicalAnd)])
    }

    fn parse_equality(&mut self) -> OrionResult<Expr> {
        self.parse_binary_chain(
            Self::parse_comparison,
            &[(TokenKind::EqEq, BinaryOp::Eq), (TokenKind::NotEq, BinaryOp::Ne)],
        )
    }

    fn parse_comparison(&mut self) -> OrionResult<Expr> {
        self.parse_binary_chain(
            Self::parse_term,
            &[
                (TokenKind::Gt, BinaryOp::Gt),
                (TokenKind::Ge, BinaryOp::Ge),
                (TokenKind::Lt, BinaryOp::Lt),
                (TokenKind::Le, BinaryOp::Le),
            ],
        )
    }

    fn parse_term(&mut self) -> OrionResult<Expr> {
        self.parse_binary_chain(Self::parse_factor, &[(TokenKind::Plus, BinaryOp::Add), (TokenKind::Minus, BinaryOp::Sub)])
    }

    fn parse_factor(&mut self) -> OrionResult<Expr> {
        self.parse_binary_chain(
            Self::parse_unary,
            &[(TokenKind::Star, BinaryOp::Mul), (TokenKind::Slash, BinaryOp::Div), (TokenKind::Percent, BinaryOp::Mod)],
        )
    }

    fn parse_binary_chain(
        &mut self,
        mut next: impl FnMut(&mut Self) -> OrionResult<Expr>,
        ops: &[(TokenKind, BinaryOp)],
    ) -> OrionResult<Expr> {
        let mut lhs = next(self)?;
        loop {
            let Some((_, op)) = ops.iter().find(|(tok, _)| self.check(tok)) else { break };
            self.advance();
            let rhs = next(self)?;
            let span = join(lhs.span(), rhs.span()).unwrap_or(lhs.span());
            lhs = Expr::Binary { op: *op, lhs: Box::new(lhs), rhs: Box::new(rhs), span };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> OrionResult<Expr> {
        let start = self.peek().span;
        let op = match &self.peek().value {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::PlusPlus => Some(UnaryOp::PreInc),
            TokenKind::MinusMinus => Some(UnaryOp::PreDec),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let expr = self.parse_unary()?;
            let span = join(start, expr.span()).unwrap_or(start);
            return Ok(Expr::Unary { op, expr: Box::new(expr), span });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> OrionResult<Expr> {
        let mut expr = self.parse_call()?;
        loop {
            let op = match &self.peek().value {
                TokenKind::PlusPlus => UnaryOp::PostInc,
                TokenKind::MinusMinus => UnaryOp::PostDec,
                _ => break,
            };
            let end = self.advance().span;
            let span = join(expr.span(), end).unwrap_or(expr.span());
            expr = Expr::Unary { op, expr: Box::new(expr), span };
        }
        Ok(expr)
    }

    fn parse_call(&mut self) -> OrionResult<Expr> {
        let primary = self.parse_primary()?;
        if self.check(&TokenKind::LParen) {
            let Expr::Identifier { name, span } = primary else {
                return Err(OrionError::ParseError { message: "only identifiers can be called".into() });
            };
            self.advance();
            let mut args = Vec::new();
            if !self.check(&TokenKind::RParen) {
                loop {
                    args.push(self.parse_expression()?);
                    if self.check(&TokenKind::Comma) {
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
            let end = self.expect(&TokenKind::RParen)?.span;
            return Ok(Expr::Call { callee: name, args, span: join(span, end).unwrap_or(span) });
        }
        Ok(primary)
    }

    fn parse_primary(&mut self) -> OrionResult<Expr> {
        let tok = self.advance().clone();
        match tok.value {
            TokenKind::IntLiteral(value) => Ok(Expr::Number { value, span: tok.span }),
            TokenKind::StringLiteral(value) => Ok(Expr::StringLit { value, span: tok.span }),
            TokenKind::CharLiteral(value) => Ok(Expr::CharLit { value, span: tok.span }),
            TokenKind::Ident(name) => Ok(Expr::Identifier { name, span: tok.span }),
            TokenKind::LParen => {
                let expr = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                Ok(expr)
            }
            other => Err(unexpected(&other, "an expression")),
        }
    }

    /* ───────────────────────── token-stream plumbing ───────────────────────── */

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.pos.saturating_sub(1).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> &Token {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        self.previous()
    }

    fn check(&self, kind: &TokenKind) -> bool {
        core::mem::discriminant(&self.peek().value) == core::mem::discriminant(kind)
    }

    fn check_eof(&self) -> bool {
        matches!(self.peek().value, TokenKind::Eof)
    }

    fn expect(&mut self, kind: &TokenKind) -> OrionResult<&Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(unexpected(&self.peek().value.clone(), &format!("{kind:?}")))
        }
    }

    fn expect_ident(&mut self) -> OrionResult<String> {
        match self.advance().value.clone() {
            TokenKind::Ident(name) => Ok(name),
            other => Err(unexpected(&other, "an identifier")),
        }
    }

    /// Discards tokens until a statement boundary: past a `;`, or just
    /// before a token that can start a new statement/declaration.
    fn synchronize_statement(&mut self) {
        while !self.check_eof() {
            if matches!(self.previous().value, TokenKind::Semicolon) {
                return;
            }
            if matches!(
                self.peek().value,
                TokenKind::KwInt
                    | TokenKind::KwChar
                    | TokenKind::KwVoid
                    | TokenKind::KwConst
                    | TokenKind::KwIf
                    | TokenKind::KwWhile
                    | TokenKind::KwFor
                    | TokenKind::KwReturn
                    | TokenKind::RBrace
            ) {
                return;
            }
            self.advance();
        }
    }

    /// Discards tokens until the start of what looks like the next
    /// top-level function (a type keyword) or end of input.
    fn synchronize_top_level(&mut self) {
        while !self.check_eof() {
            if matches!(self.peek().value, TokenKind::KwInt | TokenKind::KwChar | TokenKind::KwVoid) {
                return;
            }
            self.advance();
        }
    }
}

fn join(a: Span, b: Span) -> Option<Span> {
    Some(Span::new(a.source, a.start.min(b.start), a.end.max(b.end)))
}

fn unexpected(found: &TokenKind, expected: &str) -> OrionError {
    OrionError::ParseError { message: format!("expected {expected}, found {found:?}").into() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_main_function() {
        let program = parse(SourceId(0), "int main() { return 0; }").unwrap();
        assert_eq!(program.functions.len(), 1);
        assert_eq!(program.functions[0].name, "main");
        assert_eq!(program.functions[0].return_type, SemType::Int);
    }

    #[test]
    fn parses_var_decl_with_initializer_and_arithmetic() {
        let program = parse(SourceId(0), "int main() { int x = 1 + 2 * 3; return x; }").unwrap();
        let Stmt::VarDecl { init: Some(Expr::Binary { op, .. }), .. } = &program.functions[0].body[0] else {
            panic!("expected a binary-op initializer");
        };
        assert_eq!(*op, BinaryOp::Add);
    }

    #[test]
    fn assignment_is_right_associative() {
        let program = parse(SourceId(0), "int main() { int a; int b; a = b = 3; return 0; }").unwrap();
        let Stmt::ExpressionStmt { expr: Expr::Assign { value, .. }, .. } = &program.functions[0].body[2] else {
            panic!("expected an assignment statement");
        };
        assert!(matches!(**value, Expr::Assign { .. }));
    }

    #[test]
    fn parses_if_while_for_and_call() {
        let src = "int main() { if (1) { while (1) { for (int i = 0; i < 10; i = i + 1) { foo(i); } } } return 0; }";
        let program = parse(SourceId(0), src).unwrap();
        assert!(matches!(program.functions[0].body[0], Stmt::If { .. }));
    }

    #[test]
    fn rejects_assignment_to_non_identifier() {
        assert!(parse(SourceId(0), "int main() { 1 = 2; return 0; }").is_err());
    }

    #[test]
    fn reports_error_but_recovers_to_next_function() {
        let err = parse(SourceId(0), "int broken( { } int main() { return 0; }").unwrap_err();
        assert!(matches!(err, OrionError::ParseError { .. }));
    }
}
