// ABOUTME: Pratt expression parser + recursive-descent declaration/statement parser

use crate::ast::*;
use crate::diagnostics::Diagnostic;
use crate::token::{Literal, Span, Token, TokenKind};
use std::rc::Rc;

/// Parses one token stream into a `File`. On the first parse error, parsing
/// stops immediately — that error marks the parser fatal — and `None` is
/// returned alongside the accumulated diagnostics.
pub fn parse_file(tokens: &[Token], file: Rc<str>) -> (Option<File>, Vec<Diagnostic>) {
    let mut p = Parser::new(tokens, file);
    match p.parse_file_inner() {
        Ok(f) => (Some(f), p.diagnostics),
        Err(()) => (None, p.diagnostics),
    }
}

/// Sentinel "already diagnosed, parser is now fatal" error. The concrete
/// diagnostic was pushed onto `Parser::diagnostics` at the point of failure.
type PResult<T> = Result<T, ()>;

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    diagnostics: Vec<Diagnostic>,
    next_id: NodeId,
}

// Binding powers; higher binds tighter.
const BP_ASSIGN: u8 = 1;
const BP_TERNARY: u8 = 2;
const BP_OR: u8 = 2;
const BP_AND: u8 = 3;
const BP_BIT_OR: u8 = 4;
const BP_BIT_XOR: u8 = 5;
const BP_BIT_AND: u8 = 6;
const BP_EQUALITY: u8 = 7;
const BP_COMPARE: u8 = 8;
const BP_RANGE: u8 = 9;
const BP_SHIFT: u8 = 10;
const BP_ADD: u8 = 11;
const BP_MUL: u8 = 12;

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token], _file: Rc<str>) -> Self {
        Parser { tokens, pos: 0, diagnostics: Vec::new(), next_id: 0 }
    }

    fn fresh_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn at_end(&self) -> bool {
        self.peek_kind() == TokenKind::EndOfFile
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if !self.at_end() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn fatal<T>(&mut self, message: impl Into<String>, span: Span) -> PResult<T> {
        self.diagnostics.push(Diagnostic::lexical(message, span));
        Err(())
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> PResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let tok = self.peek().clone();
            self.fatal(format!("expected {}, found `{}`", what, tok.lexeme), tok.span.clone())
        }
    }

    fn expect_ident(&mut self, what: &str) -> PResult<Ident> {
        let tok = self.expect(TokenKind::Ident, what)?;
        Ok(Ident { name: tok.lexeme, span: tok.span })
    }

    // -------------------------------------------------------------
    // Top level
    // -------------------------------------------------------------

    fn parse_file_inner(&mut self) -> PResult<File> {
        let start_span = self.peek().span.clone();
        let mod_decl = if self.check(TokenKind::Mod) {
            let s = self.advance().span;
            let name = self.expect_ident("a module name")?;
            let end = self.expect(TokenKind::Semi, "`;` after module declaration")?.span;
            Some(ModuleDecl { name: name.name, span: s.merge(&end) })
        } else {
            None
        };

        let mut imports = Vec::new();
        while self.check(TokenKind::Import) {
            imports.push(self.parse_import()?);
        }

        let mut decls = Vec::new();
        while !self.at_end() {
            decls.push(self.parse_top_level_decl()?);
        }
        let end_span = self.peek().span.clone();
        Ok(File { mod_decl, imports, decls, span: start_span.merge(&end_span) })
    }

    fn parse_import(&mut self) -> PResult<ImportDecl> {
        let start = self.expect(TokenKind::Import, "`import`")?.span;
        let mut segments = vec![self.expect_ident("a module path segment")?.name];
        while self.eat(TokenKind::Dot) {
            segments.push(self.expect_ident("a module path segment")?.name);
        }
        let items = if self.eat(TokenKind::ColonColon) {
            self.expect(TokenKind::LBrace, "`{` after `::`")?;
            let mut items = Vec::new();
            if !self.check(TokenKind::RBrace) {
                loop {
                    let name = self.expect_ident("an imported name")?;
                    let alias = if self.eat(TokenKind::As) {
                        Some(self.expect_ident("an alias name")?.name)
                    } else {
                        None
                    };
                    items.push(ImportItem { name: name.name, alias, span: name.span });
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                    if self.check(TokenKind::RBrace) {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RBrace, "`}` to close import list")?;
            Some(items)
        } else {
            None
        };
        let end = self.expect(TokenKind::Semi, "`;` after import")?.span;
        Ok(ImportDecl { segments, items, span: start.merge(&end) })
    }

    fn parse_vis(&mut self) -> Vis {
        if self.eat(TokenKind::Pub) {
            Vis::Public
        } else if self.eat(TokenKind::Priv) {
            Vis::Private
        } else if self.eat(TokenKind::Prot) {
            Vis::Protected
        } else {
            Vis::Default
        }
    }

    fn parse_top_level_decl(&mut self) -> PResult<Decl> {
        let start_span = self.peek().span.clone();
        let vis = self.parse_vis();
        match self.peek_kind() {
            TokenKind::Let | TokenKind::Var => {
                let is_let = self.advance().kind == TokenKind::Let;
                let name = self.expect_ident("a variable name")?;
                let ty = if self.eat(TokenKind::Colon) { Some(self.parse_type_expr()?) } else { None };
                let init = if self.eat(TokenKind::Eq) { Some(self.parse_expr(BP_ASSIGN)?) } else { None };
                let end = self.expect(TokenKind::Semi, "`;` after global variable declaration")?.span;
                Ok(Decl::GlobalVar(GlobalVarDecl {
                    vis,
                    is_let,
                    name: name.name,
                    ty,
                    init,
                    span: start_span.merge(&end),
                }))
            }
            TokenKind::Func => Ok(Decl::Func(self.parse_func_decl(vis, start_span)?)),
            TokenKind::Class => Ok(Decl::Class(self.parse_class_decl(vis, start_span)?)),
            TokenKind::Struct => Ok(Decl::Struct(self.parse_struct_decl(vis, start_span)?)),
            TokenKind::Enum => Ok(Decl::Enum(self.parse_enum_decl(vis, start_span)?)),
            _ => {
                let tok = self.peek().clone();
                self.fatal(format!("expected a top-level declaration, found `{}`", tok.lexeme), tok.span)
            }
        }
    }

    fn parse_params(&mut self) -> PResult<Vec<Param>> {
        self.expect(TokenKind::LParen, "`(` to start a parameter list")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                let name = self.expect_ident("a parameter name")?;
                self.expect(TokenKind::Colon, "`:` before a parameter type")?;
                let ty = self.parse_type_expr()?;
                let span = name.span.merge(&ty.span);
                params.push(Param { name: name.name, ty, span });
                if !self.eat(TokenKind::Comma) {
                    break;
                }
                if self.check(TokenKind::RParen) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "`)` to close a parameter list")?;
        Ok(params)
    }

    fn parse_func_decl(&mut self, vis: Vis, start_span: Span) -> PResult<FuncDecl> {
        self.expect(TokenKind::Func, "`func`")?;
        let name = self.expect_ident("a function name")?;
        let params = self.parse_params()?;
        self.expect(TokenKind::Colon, "`:` before a return type")?;
        let return_type = self.parse_type_expr()?;
        let body = self.parse_block()?;
        let span = start_span.merge(&body.span);
        Ok(FuncDecl { vis, name: name.name, params, return_type, body, span })
    }

    /// Parses one field/method/builder member common to class/struct/enum
    /// bodies. Returns `Ok(false)` when the next tokens don't start any of
    /// these three shapes (the caller decides what that means).
    fn parse_member(
        &mut self,
        type_name: &str,
        fields: &mut Vec<FieldDecl>,
        methods: &mut Vec<MethodDecl>,
        builders: &mut Vec<BuilderDecl>,
    ) -> PResult<bool> {
        let member_start = self.peek().span.clone();
        if self.check(TokenKind::Fin) || self.check(TokenKind::Var) {
            let is_final = self.eat(TokenKind::Fin);
            self.expect(TokenKind::Var, "`var` in a field declaration")?;
            let name = self.expect_ident("a field name")?;
            self.expect(TokenKind::Colon, "`:` before a field type")?;
            let ty = self.parse_type_expr()?;
            let end = self.expect(TokenKind::Semi, "`;` after a field declaration")?.span;
            fields.push(FieldDecl { name: name.name, ty, is_final, span: member_start.merge(&end) });
            Ok(true)
        } else if self.check(TokenKind::Template) || self.check(TokenKind::Override) || self.check(TokenKind::Func) {
            let is_template = self.eat(TokenKind::Template);
            let is_override = self.eat(TokenKind::Override);
            self.expect(TokenKind::Func, "`func` in a method declaration")?;
            let name = self.expect_ident("a method name")?;
            let params = self.parse_params()?;
            self.expect(TokenKind::Colon, "`:` before a return type")?;
            let return_type = self.parse_type_expr()?;
            let (body, end_span) = if self.check(TokenKind::LBrace) {
                let b = self.parse_block()?;
                let s = b.span.clone();
                (Some(b), s)
            } else {
                let s = self.expect(TokenKind::Semi, "`;` after a template method signature")?.span;
                (None, s)
            };
            methods.push(MethodDecl {
                vis: Vis::Default,
                name: name.name,
                params,
                return_type,
                body,
                is_template,
                is_override,
                span: member_start.merge(&end_span),
            });
            Ok(true)
        } else if self.check(TokenKind::Builder)
            || (self.check(TokenKind::Ident) && self.peek().lexeme == type_name && self.peek_at(1).kind == TokenKind::LParen)
        {
            self.advance(); // `builder` keyword or the type-name identifier
            let params = self.parse_params()?;
            let body = self.parse_block()?;
            let span = member_start.merge(&body.span);
            builders.push(BuilderDecl { params, body, span });
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn parse_class_decl(&mut self, vis: Vis, start_span: Span) -> PResult<ClassDecl> {
        self.expect(TokenKind::Class, "`class`")?;
        let name = self.expect_ident("a class name")?;
        let super_type = if self.eat(TokenKind::Colon) { Some(self.expect_ident("a base class name")?) } else { None };
        self.expect(TokenKind::LBrace, "`{` to start a class body")?;
        let mut fields = Vec::new();
        let mut methods = Vec::new();
        let mut builders = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.at_end() {
            if !self.parse_member(&name.name, &mut fields, &mut methods, &mut builders)? {
                let tok = self.peek().clone();
                return self.fatal(format!("unexpected token `{}` in class body", tok.lexeme), tok.span);
            }
        }
        let end = self.expect(TokenKind::RBrace, "`}` to close a class body")?.span;
        // A class with at least one `template` method is itself a template
        // (abstract) type and cannot be instantiated directly.
        let is_template = methods.iter().any(|m| m.is_template);
        Ok(ClassDecl { vis, is_template, name: name.name, super_type, fields, methods, builders, span: start_span.merge(&end) })
    }

    fn parse_struct_decl(&mut self, vis: Vis, start_span: Span) -> PResult<StructDecl> {
        self.expect(TokenKind::Struct, "`struct`")?;
        let name = self.expect_ident("a struct name")?;
        self.expect(TokenKind::LBrace, "`{` to start a struct body")?;
        let mut fields = Vec::new();
        let mut methods = Vec::new();
        let mut builders = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.at_end() {
            if !self.parse_member(&name.name, &mut fields, &mut methods, &mut builders)? {
                let tok = self.peek().clone();
                return self.fatal(format!("unexpected token `{}` in struct body", tok.lexeme), tok.span);
            }
        }
        let end = self.expect(TokenKind::RBrace, "`}` to close a struct body")?.span;
        Ok(StructDecl { vis, name: name.name, fields, methods, builders, span: start_span.merge(&end) })
    }

    fn parse_enum_decl(&mut self, vis: Vis, start_span: Span) -> PResult<EnumDecl> {
        self.expect(TokenKind::Enum, "`enum`")?;
        let name = self.expect_ident("an enum name")?;
        self.expect(TokenKind::LBrace, "`{` to start an enum body")?;

        let mut cases = Vec::new();
        // Leading comma-separated case list: bare identifiers (optionally
        // with a parenthesized payload-expression list), up to the first
        // member that isn't shaped like a case.
        while self.check(TokenKind::Ident)
            && !(self.peek().lexeme == name.name && self.peek_at(1).kind == TokenKind::LParen)
        {
            let case_name = self.advance();
            let mut payload_exprs = Vec::new();
            let mut end_span = case_name.span.clone();
            if self.eat(TokenKind::LParen) {
                if !self.check(TokenKind::RParen) {
                    loop {
                        payload_exprs.push(self.parse_expr(BP_ASSIGN)?);
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                        if self.check(TokenKind::RParen) {
                            break;
                        }
                    }
                }
                end_span = self.expect(TokenKind::RParen, "`)` to close a case payload")?.span;
            }
            cases.push(EnumCase { name: case_name.lexeme, payload_exprs, span: case_name.span.merge(&end_span) });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        let mut builders = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.at_end() {
            if !self.parse_member(&name.name, &mut fields, &mut methods, &mut builders)? {
                let tok = self.peek().clone();
                return self.fatal(format!("unexpected token `{}` in enum body", tok.lexeme), tok.span);
            }
        }
        let end = self.expect(TokenKind::RBrace, "`}` to close an enum body")?.span;
        Ok(EnumDecl { vis, name: name.name, cases, fields, methods, builders, span: start_span.merge(&end) })
    }

    // -------------------------------------------------------------
    // Types
    // -------------------------------------------------------------

    fn parse_type_expr(&mut self) -> PResult<TypeExpr> {
        let start = self.peek().span.clone();
        let mut array_depth = 0;
        while self.check(TokenKind::LBracket) {
            self.advance();
            self.expect(TokenKind::RBracket, "`]` after `[` in a type")?;
            array_depth += 1;
        }
        let name_tok = if self.check(TokenKind::SelfKw) {
            self.advance()
        } else {
            self.expect(TokenKind::Ident, "a type name")?
        };
        let mut end = name_tok.span.clone();
        let nullable = if self.check(TokenKind::Question) {
            end = self.advance().span;
            true
        } else {
            false
        };
        Ok(TypeExpr { name: name_tok.lexeme, array_depth, nullable, span: start.merge(&end) })
    }

    // -------------------------------------------------------------
    // Statements
    // -------------------------------------------------------------

    fn parse_block(&mut self) -> PResult<Block> {
        let start = self.expect(TokenKind::LBrace, "`{` to start a block")?.span;
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.at_end() {
            stmts.push(self.parse_stmt()?);
        }
        let end = self.expect(TokenKind::RBrace, "`}` to close a block")?.span;
        Ok(Block { stmts, span: start.merge(&end) })
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        match self.peek_kind() {
            TokenKind::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            TokenKind::Let | TokenKind::Var => self.parse_let_stmt(),
            TokenKind::Ret => {
                let start = self.advance().span;
                let value = if self.check(TokenKind::Semi) { None } else { Some(self.parse_expr(BP_ASSIGN)?) };
                let end = self.expect(TokenKind::Semi, "`;` after a return statement")?.span;
                Ok(Stmt::Return { value, span: start.merge(&end) })
            }
            TokenKind::If => self.parse_if_stmt(),
            TokenKind::While => self.parse_while_stmt(),
            TokenKind::Do => self.parse_do_while_stmt(),
            TokenKind::Loop => self.parse_loop_stmt(),
            TokenKind::Break => {
                let s = self.advance().span;
                let end = self.expect(TokenKind::Semi, "`;` after `break`")?.span;
                Ok(Stmt::Break(s.merge(&end)))
            }
            TokenKind::Continue => {
                let s = self.advance().span;
                let end = self.expect(TokenKind::Semi, "`;` after `continue`")?.span;
                Ok(Stmt::Continue(s.merge(&end)))
            }
            _ => {
                let expr = self.parse_expr(BP_ASSIGN)?;
                self.expect(TokenKind::Semi, "`;` after an expression statement")?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn parse_let_stmt(&mut self) -> PResult<Stmt> {
        let start = self.peek().span.clone();
        let is_let = self.advance().kind == TokenKind::Let;
        let name = self.expect_ident("a variable name")?;
        let ty = if self.eat(TokenKind::Colon) { Some(self.parse_type_expr()?) } else { None };
        self.expect(TokenKind::Eq, "`=` in a let/var statement")?;
        let init = self.parse_expr(BP_ASSIGN)?;
        let end = self.expect(TokenKind::Semi, "`;` after a let/var statement")?.span;
        Ok(Stmt::Let(LetStmt { is_let, name: name.name, ty, init, span: start.merge(&end) }))
    }

    fn parse_if_stmt(&mut self) -> PResult<Stmt> {
        let start = self.expect(TokenKind::If, "`if`")?.span;
        let cond = self.parse_expr(BP_ASSIGN)?;
        let then_block = self.parse_block()?;
        let mut elifs = Vec::new();
        while self.check(TokenKind::Elif) {
            self.advance();
            let c = self.parse_expr(BP_ASSIGN)?;
            let b = self.parse_block()?;
            elifs.push((c, b));
        }
        let else_block = if self.eat(TokenKind::Else) { Some(self.parse_block()?) } else { None };
        let end = else_block
            .as_ref()
            .map(|b| b.span.clone())
            .or_else(|| elifs.last().map(|(_, b)| b.span.clone()))
            .unwrap_or_else(|| then_block.span.clone());
        Ok(Stmt::If(IfStmt { cond, then_block, elifs, else_block, span: start.merge(&end) }))
    }

    fn parse_while_stmt(&mut self) -> PResult<Stmt> {
        let start = self.expect(TokenKind::While, "`while`")?.span;
        let cond = self.parse_expr(BP_ASSIGN)?;
        let body = self.parse_block()?;
        let span = start.merge(&body.span);
        Ok(Stmt::While(WhileStmt { cond, body, span }))
    }

    fn parse_do_while_stmt(&mut self) -> PResult<Stmt> {
        let start = self.expect(TokenKind::Do, "`do`")?.span;
        let body = self.parse_block()?;
        self.expect(TokenKind::While, "`while` after a `do` block")?;
        let cond = self.parse_expr(BP_ASSIGN)?;
        let end = self.expect(TokenKind::Semi, "`;` after a `do`-`while` statement")?.span;
        Ok(Stmt::DoWhile(DoWhileStmt { body, cond, span: start.merge(&end) }))
    }

    fn parse_loop_stmt(&mut self) -> PResult<Stmt> {
        let start = self.expect(TokenKind::Loop, "`loop`")?.span;
        self.expect(TokenKind::LParen, "`(` after `loop`")?;
        let var = self.expect_ident("a loop variable name")?;
        let form = if self.eat(TokenKind::In) {
            let iterable = self.parse_expr(BP_ASSIGN)?;
            LoopForm::Iterable(IterableLoop { var: var.name.clone(), iterable, span: var.span.clone() })
        } else {
            self.expect(TokenKind::Colon, "`:` or `in` after a loop variable")?;
            let reverse = self.eat(TokenKind::Rev);
            let from = self.parse_expr(BP_RANGE + 1)?;
            let inclusive = if self.eat(TokenKind::DotDotEq) {
                true
            } else {
                self.expect(TokenKind::DotDot, "`..` or `..=` in a range loop")?;
                false
            };
            let to = self.parse_expr(BP_RANGE + 1)?;
            let step = if self.eat(TokenKind::Step) { Some(self.parse_expr(BP_RANGE + 1)?) } else { None };
            LoopForm::Range(RangeLoop { var: var.name.clone(), from, to, inclusive, reverse, step, span: var.span.clone() })
        };
        self.expect(TokenKind::RParen, "`)` to close a loop header")?;
        let body = self.parse_block()?;
        let span = start.merge(&body.span);
        Ok(Stmt::Loop(LoopStmt { form, body, span }))
    }

    // -------------------------------------------------------------
    // Expressions (Pratt)
    // -------------------------------------------------------------

    fn parse_expr(&mut self, min_bp: u8) -> PResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let kind = self.peek_kind();
            if let Some(op) = assign_op(kind) {
                if BP_ASSIGN < min_bp {
                    break;
                }
                self.advance();
                let rhs = self.parse_expr(BP_ASSIGN)?;
                let span = lhs.span.merge(&rhs.span);
                let id = self.fresh_id();
                lhs = Expr::new(id, ExprKind::Assign { op, target: Box::new(lhs), value: Box::new(rhs) }, span);
                continue;
            }
            if kind == TokenKind::Question {
                if BP_OR < min_bp {
                    break;
                }
                self.advance();
                let then_expr = self.parse_expr(BP_ASSIGN)?;
                self.expect(TokenKind::Colon, "`:` in a ternary expression")?;
                let else_expr = self.parse_expr(BP_TERNARY)?;
                let span = lhs.span.merge(&else_expr.span);
                let id = self.fresh_id();
                lhs = Expr::new(
                    id,
                    ExprKind::Ternary { cond: Box::new(lhs), then_expr: Box::new(then_expr), else_expr: Box::new(else_expr) },
                    span,
                );
                continue;
            }
            let Some((op, bp)) = binary_op(kind) else { break };
            if bp < min_bp {
                break;
            }
            self.advance();
            let rhs = self.parse_expr(bp + 1)?;
            let span = lhs.span.merge(&rhs.span);
            let id = self.fresh_id();
            lhs = Expr::new(id, ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }, span);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let kind = self.peek_kind();
        let prefix_op = match kind {
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::PlusPlus => Some(UnaryOp::PreInc),
            TokenKind::MinusMinus => Some(UnaryOp::PreDec),
            _ => None,
        };
        if let Some(op) = prefix_op {
            let start = self.advance().span;
            let operand = self.parse_unary()?;
            let span = start.merge(&operand.span);
            let id = self.fresh_id();
            return Ok(Expr::new(id, ExprKind::Unary { op, operand: Box::new(operand) }, span));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek_kind() {
                TokenKind::LParen => {
                    self.advance();
                    let mut args = Vec::new();
                    if !self.check(TokenKind::RParen) {
                        loop {
                            args.push(CallArg { expr: self.parse_expr(BP_ASSIGN)? });
                            if !self.eat(TokenKind::Comma) {
                                break;
                            }
                            if self.check(TokenKind::RParen) {
                                break;
                            }
                        }
                    }
                    let end = self.expect(TokenKind::RParen, "`)` to close a call")?.span;
                    let span = expr.span.merge(&end);
                    let id = self.fresh_id();
                    expr = Expr::new(id, ExprKind::Call { callee: Box::new(expr), args }, span);
                }
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect_ident("a member name")?;
                    let span = expr.span.merge(&name.span);
                    let id = self.fresh_id();
                    expr = Expr::new(id, ExprKind::Member { base: Box::new(expr), name: name.name }, span);
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr(BP_ASSIGN)?;
                    let end = self.expect(TokenKind::RBracket, "`]` to close an index")?.span;
                    let span = expr.span.merge(&end);
                    let id = self.fresh_id();
                    expr = Expr::new(id, ExprKind::Index { base: Box::new(expr), index: Box::new(index) }, span);
                }
                TokenKind::As => {
                    self.advance();
                    let ty = self.parse_type_expr()?;
                    let span = expr.span.merge(&ty.span);
                    let id = self.fresh_id();
                    expr = Expr::new(id, ExprKind::Cast { expr: Box::new(expr), ty }, span);
                }
                TokenKind::PlusPlus => {
                    let end = self.advance().span;
                    let span = expr.span.merge(&end);
                    let id = self.fresh_id();
                    expr = Expr::new(id, ExprKind::Unary { op: UnaryOp::PostInc, operand: Box::new(expr) }, span);
                }
                TokenKind::MinusMinus => {
                    let end = self.advance().span;
                    let span = expr.span.merge(&end);
                    let id = self.fresh_id();
                    expr = Expr::new(id, ExprKind::Unary { op: UnaryOp::PostDec, operand: Box::new(expr) }, span);
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::LParen => {
                // Parentheses are transparent: consumed, no distinct node.
                self.advance();
                let inner = self.parse_expr(BP_ASSIGN)?;
                self.expect(TokenKind::RParen, "`)` to close a parenthesized expression")?;
                Ok(inner)
            }
            TokenKind::Number => {
                self.advance();
                let lit = match tok.value {
                    Some(Literal::Number(n)) => n,
                    _ => return self.fatal("malformed number literal", tok.span),
                };
                let id = self.fresh_id();
                Ok(Expr::new(id, ExprKind::Literal(LiteralExpr::Number(lit)), tok.span))
            }
            TokenKind::String => {
                self.advance();
                let s = match tok.value {
                    Some(Literal::Str(s)) => s,
                    _ => return self.fatal("malformed string literal", tok.span),
                };
                let id = self.fresh_id();
                Ok(Expr::new(id, ExprKind::Literal(LiteralExpr::Str(s)), tok.span))
            }
            TokenKind::Char => {
                self.advance();
                let c = match tok.value {
                    Some(Literal::Char(c)) => c,
                    _ => return self.fatal("malformed char literal", tok.span),
                };
                let id = self.fresh_id();
                Ok(Expr::new(id, ExprKind::Literal(LiteralExpr::Char(c)), tok.span))
            }
            TokenKind::True => {
                self.advance();
                let id = self.fresh_id();
                Ok(Expr::new(id, ExprKind::Literal(LiteralExpr::Bool(true)), tok.span))
            }
            TokenKind::False => {
                self.advance();
                let id = self.fresh_id();
                Ok(Expr::new(id, ExprKind::Literal(LiteralExpr::Bool(false)), tok.span))
            }
            TokenKind::Null => {
                self.advance();
                let id = self.fresh_id();
                Ok(Expr::new(id, ExprKind::Literal(LiteralExpr::Null), tok.span))
            }
            TokenKind::SelfKw => {
                self.advance();
                let id = self.fresh_id();
                Ok(Expr::new(id, ExprKind::SelfExpr, tok.span))
            }
            TokenKind::Super => {
                self.advance();
                self.expect(TokenKind::LParen, "`(` after `super`")?;
                let mut args = Vec::new();
                if !self.check(TokenKind::RParen) {
                    loop {
                        args.push(CallArg { expr: self.parse_expr(BP_ASSIGN)? });
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                        if self.check(TokenKind::RParen) {
                            break;
                        }
                    }
                }
                let end = self.expect(TokenKind::RParen, "`)` to close a `super` call")?.span;
                let id = self.fresh_id();
                Ok(Expr::new(id, ExprKind::SuperCall { args }, tok.span.merge(&end)))
            }
            // Built-in float type names (f16/f32/f64) are never made
            // keywords, so they already fall through as plain identifiers
            // here — this is what lets `x.to_float(f32)` parse without a
            // dedicated case.
            TokenKind::Ident => {
                self.advance();
                let id = self.fresh_id();
                Ok(Expr::new(id, ExprKind::Ident(tok.lexeme), tok.span))
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if !self.check(TokenKind::RBracket) {
                    loop {
                        items.push(self.parse_expr(BP_ASSIGN)?);
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                        if self.check(TokenKind::RBracket) {
                            break;
                        }
                    }
                }
                let end = self.expect(TokenKind::RBracket, "`]` to close an array literal")?.span;
                let id = self.fresh_id();
                Ok(Expr::new(id, ExprKind::ArrayLit(items), tok.span.merge(&end)))
            }
            _ => self.fatal(format!("expected an expression, found `{}`", tok.lexeme), tok.span),
        }
    }
}

fn assign_op(kind: TokenKind) -> Option<AssignOp> {
    Some(match kind {
        TokenKind::Eq => AssignOp::Assign,
        TokenKind::PlusEq => AssignOp::AddAssign,
        TokenKind::MinusEq => AssignOp::SubAssign,
        TokenKind::StarEq => AssignOp::MulAssign,
        TokenKind::SlashEq => AssignOp::DivAssign,
        TokenKind::PercentEq => AssignOp::RemAssign,
        _ => return None,
    })
}

fn binary_op(kind: TokenKind) -> Option<(BinOp, u8)> {
    use TokenKind::*;
    Some(match kind {
        OrOr => (BinOp::Or, BP_OR),
        AndAnd => (BinOp::And, BP_AND),
        Pipe => (BinOp::BitOr, BP_BIT_OR),
        Caret => (BinOp::BitXor, BP_BIT_XOR),
        Amp => (BinOp::BitAnd, BP_BIT_AND),
        EqEq => (BinOp::Eq, BP_EQUALITY),
        BangEq => (BinOp::Ne, BP_EQUALITY),
        Lt => (BinOp::Lt, BP_COMPARE),
        LtEq => (BinOp::Le, BP_COMPARE),
        Gt => (BinOp::Gt, BP_COMPARE),
        GtEq => (BinOp::Ge, BP_COMPARE),
        DotDot => (BinOp::RangeExclusive, BP_RANGE),
        DotDotEq => (BinOp::RangeInclusive, BP_RANGE),
        Shl => (BinOp::Shl, BP_SHIFT),
        Shr => (BinOp::Shr, BP_SHIFT),
        Plus => (BinOp::Add, BP_ADD),
        Minus => (BinOp::Sub, BP_ADD),
        Star => (BinOp::Mul, BP_MUL),
        Slash => (BinOp::Div, BP_MUL),
        Percent => (BinOp::Rem, BP_MUL),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_expr_str(src: &str) -> (Option<Expr>, Vec<Diagnostic>) {
        let file: Rc<str> = Rc::from("t.ell");
        let wrapped = format!("func main(): i32 {{ ret {}; }}", src);
        let (tokens, _) = tokenize(&wrapped, file.clone());
        let (ast, diags) = parse_file(&tokens, file);
        let expr = ast.and_then(|f| match &f.decls[0] {
            Decl::Func(fd) => match &fd.body.stmts[0] {
                Stmt::Return { value, .. } => value.clone(),
                _ => None,
            },
            _ => None,
        });
        (expr, diags)
    }

    #[test]
    fn precedence_mul_binds_tighter_than_add() {
        let (expr, diags) = parse_expr_str("1 + 2 * 3");
        assert!(diags.is_empty());
        match expr.unwrap().kind {
            ExprKind::Binary { op: BinOp::Add, rhs, .. } => {
                assert!(matches!(rhs.kind, ExprKind::Binary { op: BinOp::Mul, .. }));
            }
            other => panic!("unexpected shape: {:?}", other),
        }
    }

    #[test]
    fn assignment_is_right_associative() {
        let (expr, diags) = parse_expr_str("a = b = 1");
        assert!(diags.is_empty());
        match expr.unwrap().kind {
            ExprKind::Assign { value, .. } => {
                assert!(matches!(value.kind, ExprKind::Assign { .. }));
            }
            other => panic!("unexpected shape: {:?}", other),
        }
    }

    #[test]
    fn ternary_condition_cannot_be_a_bare_assignment() {
        // `a = 1 ? x : y` parses as `a = (1 ? x : y)`, not `(a = 1) ? x : y`,
        // because assignment binds looser than the ternary's or-level slot.
        let (expr, diags) = parse_expr_str("a = 1 ? x : y");
        assert!(diags.is_empty());
        match expr.unwrap().kind {
            ExprKind::Assign { value, .. } => assert!(matches!(value.kind, ExprKind::Ternary { .. })),
            other => panic!("unexpected shape: {:?}", other),
        }
    }

    #[test]
    fn postfix_call_binds_tighter_than_binary() {
        let (expr, diags) = parse_expr_str("1 + f(2)");
        assert!(diags.is_empty());
        match expr.unwrap().kind {
            ExprKind::Binary { rhs, .. } => assert!(matches!(rhs.kind, ExprKind::Call { .. })),
            other => panic!("unexpected shape: {:?}", other),
        }
    }

    #[test]
    fn parenthesized_expression_produces_no_extra_node() {
        let (expr, _) = parse_expr_str("(1 + 2) * 3");
        match expr.unwrap().kind {
            ExprKind::Binary { op: BinOp::Mul, lhs, .. } => {
                assert!(matches!(lhs.kind, ExprKind::Binary { op: BinOp::Add, .. }));
            }
            other => panic!("unexpected shape: {:?}", other),
        }
    }

    #[test]
    fn first_parse_error_is_fatal() {
        let file: Rc<str> = Rc::from("t.ell");
        let (tokens, _) = tokenize("func main(): i32 { ret 1 }", file.clone());
        let (ast, diags) = parse_file(&tokens, file);
        assert!(ast.is_none());
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn class_with_constructor_and_method_parses() {
        let file: Rc<str> = Rc::from("t.ell");
        let src = r#"
            class Counter {
                var n: i32;
                Counter(start: i32) { self.n = start; }
                func inc(): i32 { self.n += 1; ret self.n; }
            }
        "#;
        let (tokens, _) = tokenize(src, file.clone());
        let (ast, diags) = parse_file(&tokens, file);
        assert!(diags.is_empty(), "{:?}", diags);
        let file = ast.unwrap();
        match &file.decls[0] {
            Decl::Class(c) => {
                assert_eq!(c.fields.len(), 1);
                assert_eq!(c.builders.len(), 1);
                assert_eq!(c.methods.len(), 1);
            }
            other => panic!("expected a class decl, got {:?}", other),
        }
    }

    #[test]
    fn range_loop_parses_inclusive_and_step() {
        let file: Rc<str> = Rc::from("t.ell");
        let src = "func main(): i32 { var s: i32 = 0; loop (i: 1..=5) { s += i; } ret s; }";
        let (tokens, _) = tokenize(src, file.clone());
        let (ast, diags) = parse_file(&tokens, file);
        assert!(diags.is_empty(), "{:?}", diags);
        let file = ast.unwrap();
        match &file.decls[0] {
            Decl::Func(f) => match &f.body.stmts[1] {
                Stmt::Loop(l) => match &l.form {
                    LoopForm::Range(r) => assert!(r.inclusive),
                    _ => panic!("expected a range loop"),
                },
                other => panic!("unexpected stmt: {:?}", other),
            },
            other => panic!("unexpected decl: {:?}", other),
        }
    }
}
