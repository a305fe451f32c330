//! Recursive-descent parser, grounded in `original_source/src/parser/Parser.cpp`'s
//! grammar and precedence-climbing algorithm, reshaped to propagate errors
//! through `Result` instead of C++ exceptions.

pub mod ast;
pub mod pretty;

use glint_common::error::{CompileError, Result, Stage};
use glint_common::{Diagnostic, TokenInfo, TokenKind};

use ast::*;

pub struct Parser<'a> {
    tokens: &'a [TokenInfo],
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [TokenInfo]) -> Self {
        assert!(!tokens.is_empty() && tokens.last().unwrap().kind == TokenKind::Eos, "token stream must end in Eos");
        Parser { tokens, pos: 0 }
    }

    pub fn parse_source_unit(tokens: &'a [TokenInfo]) -> Result<SourceUnit> {
        Parser::new(tokens).source_unit()
    }

    fn current(&self) -> &TokenInfo {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> TokenInfo {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    /// `peek(predicate)` -- does not consume.
    fn peek(&self, predicate: impl Fn(TokenKind) -> bool) -> bool {
        predicate(self.current().kind)
    }

    /// `match(predicate)` -- consumes on success.
    fn eat(&mut self, predicate: impl Fn(TokenKind) -> bool) -> Option<TokenInfo> {
        if predicate(self.current().kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    /// `expect(predicate)` -- consumes on success, raises a typed parse error on failure.
    fn expect(&mut self, predicate: impl Fn(TokenKind) -> bool, expected: &str) -> Result<TokenInfo> {
        if predicate(self.current().kind) {
            Ok(self.advance())
        } else {
            Err(self.error(expected))
        }
    }

    fn expect_kind(&mut self, kind: TokenKind, expected: &str) -> Result<TokenInfo> {
        self.expect(|k| k == kind, expected)
    }

    fn error(&self, expected: &str) -> CompileError {
        let tok = self.current();
        CompileError::new(
            Stage::Parse,
            Diagnostic::error(
                tok.location.clone(),
                format!("unexpected token `{}`", tok.lexeme),
                format!("expected {expected}"),
            ),
        )
    }

    // ── Source unit ──────────────────────────────────────────────────────

    fn source_unit(&mut self) -> Result<SourceUnit> {
        let mut items = Vec::new();
        while !self.peek(|k| k == TokenKind::Eos) {
            if self.peek(|k| k == TokenKind::Function) {
                items.push(Item::Function(self.function_def()?));
            } else if self.peek(|k| k == TokenKind::Struct) {
                items.push(Item::StructDef(self.struct_def()?));
                self.expect_kind(TokenKind::Semicolon, "`;`")?;
            } else if self.peek(TokenKind::is_type) {
                items.push(Item::VariableDef(self.variable_def()?));
                self.expect_kind(TokenKind::Semicolon, "`;`")?;
            } else {
                return Err(self.error("a function, variable, or struct definition"));
            }
        }
        Ok(SourceUnit { items })
    }

    fn function_def(&mut self) -> Result<FunctionDef> {
        let start = self.expect_kind(TokenKind::Function, "`function`")?;
        let name = self.expect_kind(TokenKind::Ident, "a function name")?.lexeme;
        let params = self.param_list()?;

        let visibility = self
            .eat(TokenKind::is_visibility)
            .and_then(|t| visibility_from_token(t.kind))
            .unwrap_or(Visibility::Default);

        let return_type = if self.eat(|k| k == TokenKind::Returns).is_some() {
            self.expect_kind(TokenKind::LParen, "`(`")?;
            let ty = self.type_name()?;
            self.expect_kind(TokenKind::RParen, "`)`")?;
            Some(ty)
        } else {
            None
        };

        let body = self.block()?;

        Ok(FunctionDef {
            name,
            params,
            visibility,
            return_type,
            body,
            span: start.location,
        })
    }

    fn param_list(&mut self) -> Result<Vec<VariableDef>> {
        self.expect_kind(TokenKind::LParen, "`(`")?;
        let mut params = Vec::new();
        if self.eat(|k| k == TokenKind::RParen).is_some() {
            return Ok(params);
        }
        loop {
            params.push(self.variable_def()?);
            if self.eat(|k| k == TokenKind::Comma).is_some() {
                continue;
            }
            self.expect_kind(TokenKind::RParen, "`)`")?;
            break;
        }
        Ok(params)
    }

    fn type_name(&mut self) -> Result<TypeName> {
        let tok = self.expect(TokenKind::is_type, "a type name")?;
        let width = width_from_lexeme(&tok.lexeme);
        Ok(TypeName {
            token: tok.kind,
            width,
            span: tok.location,
        })
    }

    fn variable_def(&mut self) -> Result<VariableDef> {
        let ty = self.type_name()?;
        let name_tok = self.expect_kind(TokenKind::Ident, "a variable name")?;
        let name = name_tok.lexeme;
        let span = name_tok.location;

        if self.eat(|k| k == TokenKind::LBracket).is_some() {
            let size = self.literal()?;
            if !matches!(size, Expr::NumberLiteral { is_float: false, .. }) {
                return Err(self.error("an integer literal array size"));
            }
            self.expect_kind(TokenKind::RBracket, "`]`")?;
            let init = if self.eat(|k| k == TokenKind::Assign).is_some() {
                Some(self.expression()?)
            } else {
                None
            };
            return Ok(VariableDef::Array {
                name,
                ty,
                size: Box::new(size),
                init,
                span,
            });
        }
        if self.eat(|k| k == TokenKind::Assign).is_some() {
            let init = self.expression()?;
            return Ok(VariableDef::Plain {
                name,
                ty,
                init: Some(init),
                span,
            });
        }
        Ok(VariableDef::Plain { name, ty, init: None, span })
    }

    fn struct_def(&mut self) -> Result<StructDef> {
        let start = self.expect_kind(TokenKind::Struct, "`struct`")?;
        let name = self.expect_kind(TokenKind::Ident, "a struct name")?.lexeme;
        let mut members = Vec::new();
        if self.eat(|k| k == TokenKind::LBrace).is_some() {
            while self.eat(|k| k == TokenKind::RBrace).is_none() {
                members.push(self.variable_def()?);
                self.expect_kind(TokenKind::Semicolon, "`;`")?;
            }
        }
        Ok(StructDef { name, members, span: start.location })
    }

    // ── Statements ───────────────────────────────────────────────────────

    fn block(&mut self) -> Result<Block> {
        self.expect_kind(TokenKind::LBrace, "`{`")?;
        let mut stmts = Vec::new();
        while self.eat(|k| k == TokenKind::RBrace).is_none() {
            stmts.push(self.statement()?);
        }
        Ok(stmts)
    }

    fn statement(&mut self) -> Result<Stmt> {
        if self.peek(|k| k == TokenKind::Return) {
            let stmt = self.return_stmt()?;
            self.expect_kind(TokenKind::Semicolon, "`;`")?;
            Ok(stmt)
        } else if self.peek(|k| k == TokenKind::If) {
            self.if_stmt()
        } else if self.peek(|k| k == TokenKind::While) {
            self.while_stmt()
        } else if self.peek(|k| k == TokenKind::For) {
            self.for_stmt()
        } else if self.peek(|k| k == TokenKind::Do) {
            let stmt = self.do_while_stmt()?;
            self.expect_kind(TokenKind::Semicolon, "`;`")?;
            Ok(stmt)
        } else if self.peek(|k| k == TokenKind::Continue) {
            let tok = self.advance();
            self.expect_kind(TokenKind::Semicolon, "`;`")?;
            Ok(Stmt::Continue(tok.location))
        } else if self.peek(|k| k == TokenKind::Break) {
            let tok = self.advance();
            self.expect_kind(TokenKind::Semicolon, "`;`")?;
            Ok(Stmt::Break(tok.location))
        } else if self.peek(|k| k == TokenKind::Semicolon) {
            let tok = self.advance();
            Ok(Stmt::Empty(tok.location))
        } else if self.peek(|k| k == TokenKind::Struct) {
            let def = self.struct_def()?;
            self.expect_kind(TokenKind::Semicolon, "`;`")?;
            Ok(Stmt::StructDef(def))
        } else if self.peek(TokenKind::is_type) {
            let def = self.variable_def()?;
            self.expect_kind(TokenKind::Semicolon, "`;`")?;
            Ok(Stmt::VariableDef(def))
        } else if self.peek(|k| k == TokenKind::LBrace) {
            Ok(Stmt::Block(self.block()?))
        } else {
            let expr = self.expression()?;
            self.expect_kind(TokenKind::Semicolon, "`;`")?;
            Ok(Stmt::Expr(expr))
        }
    }

    fn return_stmt(&mut self) -> Result<Stmt> {
        let start = self.expect_kind(TokenKind::Return, "`return`")?;
        let expr = if self.peek(|k| k == TokenKind::Semicolon) { None } else { Some(self.expression()?) };
        Ok(Stmt::Return { expr, span: start.location })
    }

    fn if_stmt(&mut self) -> Result<Stmt> {
        let start = self.expect_kind(TokenKind::If, "`if`")?;
        self.expect_kind(TokenKind::LParen, "`(`")?;
        let condition = self.expression()?;
        self.expect_kind(TokenKind::RParen, "`)`")?;
        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.eat(|k| k == TokenKind::Else).is_some() {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If { condition, then_branch, else_branch, span: start.location })
    }

    fn while_stmt(&mut self) -> Result<Stmt> {
        let start = self.expect_kind(TokenKind::While, "`while`")?;
        self.expect_kind(TokenKind::LParen, "`(`")?;
        let condition = self.expression()?;
        self.expect_kind(TokenKind::RParen, "`)`")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::While { condition, body, span: start.location })
    }

    fn for_stmt(&mut self) -> Result<Stmt> {
        let start = self.expect_kind(TokenKind::For, "`for`")?;
        self.expect_kind(TokenKind::LParen, "`(`")?;
        let init = if self.peek(|k| k == TokenKind::Semicolon) {
            None
        } else if self.peek(TokenKind::is_type) {
            Some(Box::new(Stmt::VariableDef(self.variable_def()?)))
        } else {
            Some(Box::new(Stmt::Expr(self.expression()?)))
        };
        self.expect_kind(TokenKind::Semicolon, "`;`")?;
        let condition = if self.peek(|k| k == TokenKind::Semicolon) { None } else { Some(self.expression()?) };
        self.expect_kind(TokenKind::Semicolon, "`;`")?;
        let update = if self.peek(|k| k == TokenKind::RParen) { None } else { Some(self.expression()?) };
        self.expect_kind(TokenKind::RParen, "`)`")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::For { init, condition, update, body, span: start.location })
    }

    fn do_while_stmt(&mut self) -> Result<Stmt> {
        let start = self.expect_kind(TokenKind::Do, "`do`")?;
        let body = Box::new(self.statement()?);
        self.expect_kind(TokenKind::While, "`while`")?;
        self.expect_kind(TokenKind::LParen, "`(`")?;
        let condition = self.expression()?;
        self.expect_kind(TokenKind::RParen, "`)`")?;
        Ok(Stmt::DoWhile { body, condition, span: start.location })
    }

    // ── Expressions ──────────────────────────────────────────────────────

    /// Binary expression first, then wrap in an assignment if an assignment
    /// operator follows -- assignment is right-associative and binds looser
    /// than every binary operator.
    fn expression(&mut self) -> Result<Expr> {
        let expr = self.binary_expr(4)?;
        if self.peek(|k| k.is_assignment_op()) {
            let op_tok = self.advance();
            let rhs = self.expression()?;
            return Ok(Expr::Assignment {
                lhs: Box::new(expr),
                op: op_tok.kind,
                rhs: Box::new(rhs),
                decoration: TypeDecoration::default(),
                span: op_tok.location,
            });
        }
        Ok(expr)
    }

    fn binary_expr(&mut self, min_precedence: i32) -> Result<Expr> {
        let mut expr = self.unary_expr()?;
        let mut cur_precedence = self.current().kind.precedence() as i32;
        while cur_precedence >= min_precedence {
            while self.current().kind.precedence() as i32 == cur_precedence && self.peek(|k| k.is_binary_op()) {
                let op_tok = self.advance();
                let rhs = self.binary_expr(cur_precedence + 1)?;
                expr = Expr::BinaryOp {
                    lhs: Box::new(expr),
                    op: op_tok.kind,
                    rhs: Box::new(rhs),
                    decoration: TypeDecoration::default(),
                    span: op_tok.location,
                };
            }
            cur_precedence -= 1;
        }
        Ok(expr)
    }

    fn unary_expr(&mut self) -> Result<Expr> {
        if self.peek(|k| k.is_unary_op()) {
            let op_tok = self.advance();
            let sub = self.unary_expr()?;
            return Ok(Expr::UnaryOp {
                op: op_tok.kind,
                expr: Box::new(sub),
                is_prefix: true,
                decoration: TypeDecoration::default(),
                span: op_tok.location,
            });
        }
        let mut expr = self.postfix_expr()?;
        if self.peek(|k| k == TokenKind::Inc || k == TokenKind::Dec) {
            let op_tok = self.advance();
            expr = Expr::UnaryOp {
                op: op_tok.kind,
                expr: Box::new(expr),
                is_prefix: false,
                decoration: TypeDecoration::default(),
                span: op_tok.location,
            };
        }
        Ok(expr)
    }

    fn postfix_expr(&mut self) -> Result<Expr> {
        let mut expr = self.primary_expr()?;
        loop {
            if self.eat(|k| k == TokenKind::LBracket).is_some() {
                let span = expr.span().clone();
                let index = self.expression()?;
                self.expect_kind(TokenKind::RBracket, "`]`")?;
                expr = Expr::IndexAccess {
                    expr: Box::new(expr),
                    index: Box::new(index),
                    decoration: TypeDecoration::default(),
                    span,
                };
            } else if self.eat(|k| k == TokenKind::Dot).is_some() {
                let span = expr.span().clone();
                let member = self.expect_kind(TokenKind::Ident, "a member name")?.lexeme;
                expr = Expr::MemberAccess {
                    expr: Box::new(expr),
                    member,
                    decoration: TypeDecoration::default(),
                    span,
                };
            } else if self.eat(|k| k == TokenKind::LParen).is_some() {
                let span = expr.span().clone();
                let mut args = Vec::new();
                if !self.peek(|k| k == TokenKind::RParen) {
                    args.push(self.expression()?);
                    while self.eat(|k| k == TokenKind::Comma).is_some() {
                        args.push(self.expression()?);
                    }
                }
                self.expect_kind(TokenKind::RParen, "`)`")?;
                expr = Expr::FunctionCall {
                    callee: Box::new(expr),
                    args,
                    decoration: TypeDecoration::default(),
                    span,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary_expr(&mut self) -> Result<Expr> {
        if is_literal(self.current().kind) {
            return self.literal();
        }
        if self.peek(|k| k == TokenKind::Ident) {
            let tok = self.advance();
            return Ok(Expr::Identifier {
                name: tok.lexeme,
                decoration: TypeDecoration::default(),
                span: tok.location,
            });
        }
        if self.eat(|k| k == TokenKind::LParen).is_some() {
            let expr = self.expression()?;
            self.expect_kind(TokenKind::RParen, "`)`")?;
            return Ok(expr);
        }
        Err(self.error("an expression"))
    }

    fn literal(&mut self) -> Result<Expr> {
        let tok = self.expect(is_literal, "a literal")?;
        match tok.kind {
            TokenKind::True => Ok(Expr::BooleanLiteral { value: true, decoration: TypeDecoration::default(), span: tok.location }),
            TokenKind::False => Ok(Expr::BooleanLiteral { value: false, decoration: TypeDecoration::default(), span: tok.location }),
            TokenKind::IntNumber => Ok(Expr::NumberLiteral { text: tok.lexeme, is_float: false, decoration: TypeDecoration::default(), span: tok.location }),
            TokenKind::DoubleNumber => Ok(Expr::NumberLiteral { text: tok.lexeme, is_float: true, decoration: TypeDecoration::default(), span: tok.location }),
            TokenKind::StringLiteral => Ok(Expr::StringLiteral { value: tok.lexeme, decoration: TypeDecoration::default(), span: tok.location }),
            _ => unreachable!("is_literal guards to these five kinds"),
        }
    }
}

fn is_literal(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::True | TokenKind::False | TokenKind::IntNumber | TokenKind::DoubleNumber | TokenKind::StringLiteral
    )
}

fn width_from_lexeme(lexeme: &str) -> Option<u16> {
    let digits = lexeme.strip_prefix("int").or_else(|| lexeme.strip_prefix("uint"))?;
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glint_lexer::Lexer;
    use std::path::PathBuf;

    fn parse(src: &str) -> Result<SourceUnit> {
        let line = glint_common::Line::new(format!("{src}\n"), PathBuf::from("t.sol"), 1, None);
        let stream = glint_common::CharStream::new(vec![line]);
        let tokens = Lexer::tokenize(&stream).unwrap();
        Parser::parse_source_unit(&tokens)
    }

    #[test]
    fn parses_a_function_with_return() {
        let unit = parse("function f() returns (int) { return 1 + 2; }").unwrap();
        assert_eq!(unit.items.len(), 1);
        let Item::Function(f) = &unit.items[0] else { panic!("expected function") };
        assert_eq!(f.name, "f");
        assert_eq!(f.body.len(), 1);
    }

    #[test]
    fn assignment_binds_looser_than_binary_ops() {
        let unit = parse("function f() { int x; x = 1 + 2 * 3; }").unwrap();
        let Item::Function(f) = &unit.items[0] else { panic!() };
        let Stmt::Expr(Expr::Assignment { rhs, .. }) = &f.body[1] else { panic!("expected assignment") };
        let Expr::BinaryOp { op, .. } = rhs.as_ref() else { panic!("expected top-level +") };
        assert_eq!(*op, TokenKind::Add);
    }

    #[test]
    fn postfix_and_prefix_increment_distinguish_by_position() {
        let unit = parse("function f() { int x; x++; ++x; }").unwrap();
        let Item::Function(f) = &unit.items[0] else { panic!() };
        let Stmt::Expr(Expr::UnaryOp { is_prefix: false, .. }) = &f.body[1] else { panic!("expected postfix") };
        let Stmt::Expr(Expr::UnaryOp { is_prefix: true, .. }) = &f.body[2] else { panic!("expected prefix") };
    }

    #[test]
    fn array_definition_requires_integer_literal_size() {
        let unit = parse("int x[10];").unwrap();
        let Item::VariableDef(VariableDef::Array { .. }) = &unit.items[0] else { panic!("expected array def") };
    }

    #[test]
    fn for_loop_with_variable_def_init() {
        let unit = parse("function f() { for (int i = 0; i; i++) { } }").unwrap();
        let Item::Function(f) = &unit.items[0] else { panic!() };
        let Stmt::For { init: Some(init), .. } = &f.body[0] else { panic!("expected for loop") };
        assert!(matches!(init.as_ref(), Stmt::VariableDef(_)));
    }

    #[test]
    fn function_call_with_arguments() {
        let unit = parse("function f() { foo(1, 2); }").unwrap();
        let Item::Function(f) = &unit.items[0] else { panic!() };
        let Stmt::Expr(Expr::FunctionCall { args, .. }) = &f.body[0] else { panic!("expected call") };
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn missing_semicolon_is_a_parse_error() {
        assert!(parse("int x").is_err());
    }

    #[test]
    fn explicit_width_types_carry_their_width() {
        let unit = parse("int256 x;").unwrap();
        let Item::VariableDef(VariableDef::Plain { ty, .. }) = &unit.items[0] else { panic!() };
        assert_eq!(ty.width, Some(256));
    }

    #[test]
    fn struct_definition_with_members() {
        let unit = parse("struct Point { int x; int y; };").unwrap();
        let Item::StructDef(s) = &unit.items[0] else { panic!() };
        assert_eq!(s.members.len(), 2);
    }

    #[test]
    fn visibility_keyword_is_recognized() {
        let unit = parse("function f() public { }").unwrap();
        let Item::Function(f) = &unit.items[0] else { panic!() };
        assert_eq!(f.visibility, Visibility::Public);
    }

    #[test]
    fn unary_minus_shares_the_subtraction_token() {
        let unit = parse("function f() { int x; x = -x; }").unwrap();
        let Item::Function(f) = &unit.items[0] else { panic!() };
        let Stmt::Expr(Expr::Assignment { rhs, .. }) = &f.body[1] else { panic!("expected assignment") };
        assert!(matches!(rhs.as_ref(), Expr::UnaryOp { op: TokenKind::Sub, is_prefix: true, .. }));
    }

    #[test]
    fn member_access_and_index_chain() {
        let unit = parse("function f() { a.b[0]; }").unwrap();
        let Item::Function(f) = &unit.items[0] else { panic!() };
        assert!(matches!(&f.body[0], Stmt::Expr(Expr::IndexAccess { .. })));
    }
}
