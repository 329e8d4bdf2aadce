// ABOUTME: Type checker — shared binder+checker AST walk

// Binding and type checking are implemented as one traversal here: a local
// variable's resolved `Type` in the type-scope chain below doubles as both
// "this identifier is bound" and "this identifier has this type", so there
// is exactly one tree walk per function/method/builder body instead of two.

use crate::ast::*;
use crate::diagnostics::Diagnostic;
use crate::scope::{Scope, SymbolKind, SymbolNode};
use crate::types::resolver::resolve_type_expr;
use crate::types::{BaseKind, Builtin, Type, TypeTable};
use std::collections::HashMap;
use std::rc::Rc;

/// One function/method/builder body's chain of block-local variable types,
/// plus the receiver type when checking an instance method.
struct TypeScope {
    frames: Vec<HashMap<String, Type>>,
    self_type: Option<Type>,
}

impl TypeScope {
    fn new(self_type: Option<Type>) -> Self {
        TypeScope { frames: vec![HashMap::new()], self_type }
    }

    fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    fn pop(&mut self) {
        self.frames.pop();
    }

    fn define(&mut self, name: &str, ty: Type) {
        self.frames.last_mut().unwrap().insert(name.to_string(), ty);
    }

    fn lookup(&self, name: &str) -> Option<Type> {
        for frame in self.frames.iter().rev() {
            if let Some(t) = frame.get(name) {
                return Some(t.clone());
            }
        }
        None
    }
}

pub struct Checker<'a> {
    scope: &'a Rc<Scope>,
    templated: &'a HashMap<String, bool>,
    types: TypeTable,
    diags: Vec<Diagnostic>,
}

fn fields_of(scope: &Rc<Scope>, type_name: &str) -> Vec<FieldDecl> {
    match scope.resolve(type_name).map(|s| s.node) {
        Some(SymbolNode::Class(c)) => {
            let mut fields = c.fields.clone();
            if let Some(super_ident) = &c.super_type {
                let mut base = fields_of(scope, &super_ident.name);
                base.extend(fields);
                fields = base;
            }
            fields
        }
        Some(SymbolNode::Struct(s)) => s.fields.clone(),
        Some(SymbolNode::Enum(e)) => e.fields.clone(),
        _ => Vec::new(),
    }
}

fn method_of(scope: &Rc<Scope>, type_name: &str, method_name: &str) -> Option<MethodDecl> {
    match scope.resolve(type_name).map(|s| s.node) {
        Some(SymbolNode::Class(c)) => {
            if let Some(m) = c.methods.iter().find(|m| m.name == method_name) {
                return Some(m.clone());
            }
            c.super_type.as_ref().and_then(|s| method_of(scope, &s.name, method_name))
        }
        Some(SymbolNode::Struct(s)) => s.methods.iter().find(|m| m.name == method_name).cloned(),
        Some(SymbolNode::Enum(e)) => e.methods.iter().find(|m| m.name == method_name).cloned(),
        _ => None,
    }
}

fn builders_of(scope: &Rc<Scope>, type_name: &str) -> Vec<BuilderDecl> {
    match scope.resolve(type_name).map(|s| s.node) {
        Some(SymbolNode::Class(c)) => c.builders.clone(),
        Some(SymbolNode::Struct(s)) => s.builders.clone(),
        Some(SymbolNode::Enum(e)) => e.builders.clone(),
        _ => Vec::new(),
    }
}

fn case_of(scope: &Rc<Scope>, type_name: &str, case_name: &str) -> Option<EnumCase> {
    match scope.resolve(type_name).map(|s| s.node) {
        Some(SymbolNode::Enum(e)) => e.cases.iter().find(|c| c.name == case_name).cloned(),
        _ => None,
    }
}

/// Whether a value of type `value` may be assigned, passed, or returned
/// where `target` is expected.
pub fn assignable(target: &Type, value: &Type) -> bool {
    if target == value {
        return true;
    }
    if value.is_null() {
        // null is assignable to any target except bit.
        return !target.is_builtin(Builtin::Bit);
    }
    if target.is_numeric() && value.is_numeric() {
        return true;
    }
    if target.is_any_array() && value.is_array() {
        return true;
    }
    if target.is_array() && value.is_array() && target.array_depth == value.array_depth {
        return target.base == value.base || (matches!(target.base, BaseKind::Any));
    }
    false
}

impl<'a> Checker<'a> {
    pub fn new(scope: &'a Rc<Scope>, templated: &'a HashMap<String, bool>) -> Self {
        Checker { scope, templated, types: TypeTable::new(), diags: Vec::new() }
    }

    pub fn finish(self) -> (TypeTable, Vec<Diagnostic>) {
        (self.types, self.diags)
    }

    fn err(&mut self, d: Diagnostic) {
        self.diags.push(d);
    }

    fn resolve_ty(&mut self, texpr: &TypeExpr, self_type: Option<&Type>) -> Type {
        match resolve_type_expr(texpr, self.scope, self_type) {
            Ok(t) => t,
            Err(d) => {
                self.err(d);
                Type::any_array().element_type()
            }
        }
    }

    pub fn check_file(&mut self, file: &File) {
        for decl in &file.decls {
            self.check_decl(decl);
        }
    }

    fn check_decl(&mut self, decl: &Decl) {
        match decl {
            Decl::GlobalVar(g) => self.check_global(g),
            Decl::Func(f) => self.check_func(f),
            Decl::Class(c) => self.check_class(c),
            Decl::Struct(s) => self.check_struct(s),
            Decl::Enum(e) => self.check_enum(e),
        }
    }

    fn check_global(&mut self, g: &GlobalVarDecl) {
        let declared = g.ty.as_ref().map(|t| self.resolve_ty(t, None));
        if let Some(init) = &g.init {
            let mut ts = TypeScope::new(None);
            let value_ty = self.check_expr(init, &mut ts);
            if let Some(target) = &declared {
                self.check_assignable(target, &value_ty, init);
            }
        }
    }

    fn check_func(&mut self, f: &FuncDecl) {
        let ret = self.resolve_ty(&f.return_type, None);
        let mut ts = TypeScope::new(None);
        for p in &f.params {
            let pty = self.resolve_ty(&p.ty, None);
            ts.define(&p.name, pty);
        }
        self.check_block(&f.body, &mut ts, &ret);
    }

    fn check_class(&mut self, c: &ClassDecl) {
        let self_ty = Type::user(c.name.clone());
        for field in &c.fields {
            let _ = self.resolve_ty(&field.ty, Some(&self_ty));
        }
        for m in &c.methods {
            self.check_method(m, &self_ty);
        }
        for b in &c.builders {
            self.check_builder(b, &self_ty);
        }
    }

    fn check_struct(&mut self, s: &StructDecl) {
        let self_ty = Type::user(s.name.clone());
        for field in &s.fields {
            let _ = self.resolve_ty(&field.ty, Some(&self_ty));
        }
        for m in &s.methods {
            self.check_method(m, &self_ty);
        }
        for b in &s.builders {
            self.check_builder(b, &self_ty);
        }
    }

    fn check_enum(&mut self, e: &EnumDecl) {
        let self_ty = Type::user(e.name.clone());
        for case in &e.cases {
            let mut ts = TypeScope::new(None);
            for expr in &case.payload_exprs {
                self.check_expr(expr, &mut ts);
            }
        }
        for field in &e.fields {
            let _ = self.resolve_ty(&field.ty, Some(&self_ty));
        }
        for m in &e.methods {
            self.check_method(m, &self_ty);
        }
        for b in &e.builders {
            self.check_builder(b, &self_ty);
        }
    }

    fn check_method(&mut self, m: &MethodDecl, self_ty: &Type) {
        let ret = self.resolve_ty(&m.return_type, Some(self_ty));
        let Some(body) = &m.body else { return };
        let mut ts = TypeScope::new(Some(self_ty.clone()));
        for p in &m.params {
            let pty = self.resolve_ty(&p.ty, Some(self_ty));
            ts.define(&p.name, pty);
        }
        self.check_block(body, &mut ts, &ret);
    }

    fn check_builder(&mut self, b: &BuilderDecl, self_ty: &Type) {
        let mut ts = TypeScope::new(Some(self_ty.clone()));
        for p in &b.params {
            let pty = self.resolve_ty(&p.ty, Some(self_ty));
            ts.define(&p.name, pty);
        }
        let void = Type::builtin(Builtin::Void);
        self.check_block(&b.body, &mut ts, &void);
    }

    fn check_block(&mut self, block: &Block, ts: &mut TypeScope, ret: &Type) {
        ts.push();
        for stmt in &block.stmts {
            self.check_stmt(stmt, ts, ret);
        }
        ts.pop();
    }

    fn check_stmt(&mut self, stmt: &Stmt, ts: &mut TypeScope, ret: &Type) {
        match stmt {
            Stmt::Block(b) => self.check_block(b, ts, ret),
            Stmt::Let(l) => {
                let value_ty = self.check_expr(&l.init, ts);
                let declared = l.ty.as_ref().map(|t| self.resolve_ty(t, ts.self_type.as_ref()));
                if let Some(target) = &declared {
                    if let ExprKind::Literal(LiteralExpr::Number(n)) = &l.init.kind {
                        self.check_literal_range(n, target, &l.init);
                    }
                    self.check_assignable(target, &value_ty, &l.init);
                }
                ts.define(&l.name, declared.unwrap_or(value_ty));
            }
            Stmt::Expr(e) => {
                self.check_expr(e, ts);
            }
            Stmt::Return { value, .. } => {
                if let Some(v) = value {
                    let vty = self.check_expr(v, ts);
                    if !assignable(ret, &vty) && !ret.is_builtin(Builtin::Void) {
                        self.err(
                            Diagnostic::semantic(format!("cannot return `{}` where `{}` is expected", vty, ret))
                                .at(v.span().clone()),
                        );
                    }
                }
            }
            Stmt::If(s) => {
                let cty = self.check_expr(&s.cond, ts);
                self.require_bool(&cty, &s.cond);
                self.check_block(&s.then_block, ts, ret);
                for (cond, block) in &s.elifs {
                    let cty = self.check_expr(cond, ts);
                    self.require_bool(&cty, cond);
                    self.check_block(block, ts, ret);
                }
                if let Some(e) = &s.else_block {
                    self.check_block(e, ts, ret);
                }
            }
            Stmt::While(s) => {
                let cty = self.check_expr(&s.cond, ts);
                self.require_bool(&cty, &s.cond);
                self.check_block(&s.body, ts, ret);
            }
            Stmt::DoWhile(s) => {
                self.check_block(&s.body, ts, ret);
                let cty = self.check_expr(&s.cond, ts);
                self.require_bool(&cty, &s.cond);
            }
            Stmt::Loop(s) => self.check_loop(s, ts, ret),
            Stmt::Break(_) | Stmt::Continue(_) => {}
        }
    }

    fn check_loop(&mut self, s: &LoopStmt, ts: &mut TypeScope, ret: &Type) {
        ts.push();
        match &s.form {
            LoopForm::Range(r) => {
                let from_ty = self.check_expr(&r.from, ts);
                let to_ty = self.check_expr(&r.to, ts);
                self.require_integer(&from_ty, &r.from);
                self.require_integer(&to_ty, &r.to);
                if let Some(step) = &r.step {
                    let step_ty = self.check_expr(step, ts);
                    self.require_integer(&step_ty, step);
                }
                let var_ty = if from_ty.is_integer() { from_ty } else { Type::builtin(Builtin::I32) };
                ts.define(&r.var, var_ty);
            }
            LoopForm::Iterable(it) => {
                let iter_ty = self.check_expr(&it.iterable, ts);
                if !iter_ty.is_array() {
                    self.err(
                        Diagnostic::semantic("loop iterable must be an array").at(it.iterable.span().clone()),
                    );
                    ts.define(&it.var, Type::any_array().element_type());
                } else {
                    ts.define(&it.var, iter_ty.element_type());
                }
            }
        }
        self.check_block(&s.body, ts, ret);
        ts.pop();
    }

    fn require_bool(&mut self, ty: &Type, expr: &Expr) {
        if !ty.is_bool() {
            self.err(Diagnostic::semantic(format!("expected `bool`, found `{}`", ty)).at(expr.span().clone()));
        }
    }

    fn require_integer(&mut self, ty: &Type, expr: &Expr) {
        if !ty.is_integer() {
            self.err(Diagnostic::semantic(format!("expected an integer type, found `{}`", ty)).at(expr.span().clone()));
        }
    }

    fn check_assignable(&mut self, target: &Type, value: &Type, site: &Expr) {
        if target.is_builtin(Builtin::Bit) && value.is_null() {
            self.err(
                Diagnostic::semantic("bit cannot be null")
                    .at(site.span().clone())
                    .with_hint("pass 0 or 1 instead of null"),
            );
            return;
        }
        if !assignable(target, value) {
            self.err(
                Diagnostic::semantic(format!("cannot assign `{}` to `{}`", value, target)).at(site.span().clone()),
            );
        }
    }

    /// Checks an integer/float literal fits its declared target's range.
    fn check_literal_range(&mut self, num: &crate::token::NumberLit, target: &Type, site: &Expr) {
        if target.is_builtin(Builtin::Bit) {
            if let Ok(v) = i128::from_str_radix(&num.digits, target_radix(num)) {
                if v != 0 && v != 1 {
                    self.err(
                        Diagnostic::semantic("literal out of range for `bit`")
                            .at(site.span().clone())
                            .with_hint("bit only accepts 0 or 1"),
                    );
                }
            }
            return;
        }
        let Some((base, _)) = target.clone().into_builtin() else { return };
        let Some((min, max)) = base.int_range() else { return };
        if let Ok(v) = i128::from_str_radix(&num.digits, target_radix(num)) {
            if v < min || v > max {
                self.err(
                    Diagnostic::semantic(format!("literal {} out of range for `{}`", num.digits, target))
                        .at(site.span().clone())
                        .with_hint(format!("`{}` accepts values from {} to {}", target, min, max)),
                );
            }
        }
    }

    fn check_expr(&mut self, expr: &Expr, ts: &mut TypeScope) -> Type {
        let ty = self.infer_expr(expr, ts);
        self.types.record(expr.id, ty.clone());
        ty
    }

    fn infer_expr(&mut self, expr: &Expr, ts: &mut TypeScope) -> Type {
        match &expr.kind {
            ExprKind::Literal(lit) => self.infer_literal(lit),
            ExprKind::Ident(name) => self.infer_ident(name, expr, ts),
            ExprKind::SelfExpr => match &ts.self_type {
                Some(t) => t.clone(),
                None => {
                    self.err(Diagnostic::semantic("`self` used outside an instance method").at(expr.span.clone()));
                    Type::any_array().element_type()
                }
            },
            ExprKind::ArrayLit(items) => {
                let mut elem = None;
                for it in items {
                    let t = self.check_expr(it, ts);
                    elem.get_or_insert(t);
                }
                let elem = elem.unwrap_or(Type::any_array().element_type());
                elem.array()
            }
            ExprKind::Index { base, index } => {
                let base_ty = self.check_expr(base, ts);
                let idx_ty = self.check_expr(index, ts);
                self.require_integer(&idx_ty, index);
                if !base_ty.is_array() {
                    self.err(Diagnostic::semantic(format!("cannot index `{}`", base_ty)).at(base.span().clone()));
                    return Type::any_array().element_type();
                }
                base_ty.element_type()
            }
            ExprKind::Member { base, name } => self.infer_member(base, name, expr, ts),
            ExprKind::Call { callee, args } => self.infer_call(callee, args, expr, ts),
            ExprKind::Unary { op, operand } => self.infer_unary(*op, operand, ts),
            ExprKind::Binary { op, lhs, rhs } => self.infer_binary(*op, lhs, rhs, ts),
            ExprKind::Ternary { cond, then_expr, else_expr } => {
                let cty = self.check_expr(cond, ts);
                self.require_bool(&cty, cond);
                let t = self.check_expr(then_expr, ts);
                let e = self.check_expr(else_expr, ts);
                if t == e {
                    t
                } else {
                    Type::any_array().element_type()
                }
            }
            ExprKind::Assign { op, target, value } => self.infer_assign(*op, target, value, ts),
            ExprKind::Cast { expr: inner, ty } => {
                self.check_expr(inner, ts);
                self.resolve_ty(ty, ts.self_type.as_ref())
            }
            ExprKind::SuperCall { args } => {
                for a in args {
                    self.check_expr(&a.expr, ts);
                }
                Type::builtin(Builtin::Void)
            }
        }
    }

    fn infer_literal(&mut self, lit: &LiteralExpr) -> Type {
        match lit {
            LiteralExpr::Number(n) if n.is_float => Type::builtin(Builtin::F64),
            LiteralExpr::Number(n) => match &n.suffix {
                Some(s) => Builtin::from_name(s).map(Type::builtin).unwrap_or(Type::builtin(Builtin::I32)),
                None => Type::builtin(Builtin::I32),
            },
            LiteralExpr::Str(_) => Type::builtin(Builtin::String),
            LiteralExpr::Char(_) => Type::builtin(Builtin::Char),
            LiteralExpr::Bool(_) => Type::builtin(Builtin::Bool),
            LiteralExpr::Null => Type::null(),
        }
    }

    fn infer_ident(&mut self, name: &str, expr: &Expr, ts: &mut TypeScope) -> Type {
        if let Some(t) = ts.lookup(name) {
            return t;
        }
        if let Some(self_ty) = ts.self_type.clone() {
            if let Some(name_str) = self_ty.user_name() {
                if let Some(field) = fields_of(self.scope, name_str).into_iter().find(|f| f.name == name) {
                    return self.resolve_ty(&field.ty, Some(&self_ty));
                }
            }
        }
        if Builtin::from_name(name).is_some() {
            return Type::builtin(Builtin::String);
        }
        match self.scope.resolve(name) {
            Some(sym) => match sym.node {
                SymbolNode::GlobalVar(g) => g.ty.as_ref().map(|t| self.resolve_ty(t, None)).unwrap_or_else(|| {
                    g.init.as_ref().map(|i| self.infer_expr(i, ts)).unwrap_or(Type::any_array().element_type())
                }),
                SymbolNode::Class(c) => Type::user(c.name.clone()),
                SymbolNode::Struct(s) => Type::user(s.name.clone()),
                SymbolNode::Enum(e) => Type::user(e.name.clone()),
                _ => Type::any_array().element_type(),
            },
            None => {
                self.err(
                    Diagnostic::semantic(format!("unknown identifier `{}`", name))
                        .at(expr.span.clone())
                        .with_hint("define it earlier, import it, or check for typos"),
                );
                Type::any_array().element_type()
            }
        }
    }

    fn infer_member(&mut self, base: &Expr, name: &str, _expr: &Expr, ts: &mut TypeScope) -> Type {
        // `M.name` where M is a module symbol.
        if let ExprKind::Ident(base_name) = &base.kind {
            if ts.lookup(base_name).is_none() {
                if let Some(sym) = self.scope.resolve(base_name) {
                    if let SymbolNode::Module(inner) = &sym.node {
                        return match inner.resolve_local(name) {
                            Some(s) => self.type_of_symbol(&s.node),
                            None => {
                                self.err(
                                    Diagnostic::semantic(format!("`{}` not found in module `{}`", name, base_name))
                                        .at(base.span().clone()),
                                );
                                Type::any_array().element_type()
                            }
                        };
                    }
                    if let SymbolNode::Enum(e) = &sym.node {
                        if case_of(self.scope, &e.name, name).is_some() {
                            return Type::user(e.name.clone());
                        }
                    }
                }
            }
        }

        let base_ty = self.check_expr(base, ts);
        if name == "type" {
            return Type::builtin(Builtin::String);
        }
        if let Some(type_name) = base_ty.user_name() {
            if let Some(field) = fields_of(self.scope, type_name).into_iter().find(|f| f.name == name) {
                return self.resolve_ty(&field.ty, Some(&base_ty));
            }
        }
        Type::any_array().element_type()
    }

    fn type_of_symbol(&mut self, node: &SymbolNode) -> Type {
        match node {
            SymbolNode::GlobalVar(g) => g.ty.as_ref().map(|t| self.resolve_ty(t, None)).unwrap_or(Type::any_array().element_type()),
            SymbolNode::Class(c) => Type::user(c.name.clone()),
            SymbolNode::Struct(s) => Type::user(s.name.clone()),
            SymbolNode::Enum(e) => Type::user(e.name.clone()),
            _ => Type::any_array().element_type(),
        }
    }

    fn infer_call(&mut self, callee: &Expr, args: &[CallArg], call_expr: &Expr, ts: &mut TypeScope) -> Type {
        match &callee.kind {
            ExprKind::Ident(name) if Builtin::from_name(name).is_some() => {
                for a in args {
                    self.check_expr(&a.expr, ts);
                }
                Type::builtin(Builtin::from_name(name).unwrap())
            }
            ExprKind::Ident(name) if self.is_user_type(name) => {
                for a in args {
                    self.check_expr(&a.expr, ts);
                }
                if *self.templated.get(name).unwrap_or(&false) {
                    self.err(
                        Diagnostic::semantic(format!("cannot instantiate template class `{}`", name))
                            .at(call_expr.span.clone()),
                    );
                } else {
                    let builders = builders_of(self.scope, name);
                    if !builders.is_empty() && !builders.iter().any(|b| b.params.len() == args.len()) {
                        self.err(
                            Diagnostic::semantic(format!("no builder of `{}` takes {} argument(s)", name, args.len()))
                                .at(call_expr.span.clone()),
                        );
                    }
                }
                Type::user(name.clone())
            }
            ExprKind::Ident(name) => {
                for a in args {
                    self.check_expr(&a.expr, ts);
                }
                match self.scope.resolve(name).map(|s| s.node) {
                    Some(SymbolNode::Func(f)) => {
                        self.check_call_args(&f.params, args, ts, name == "printf");
                        self.resolve_ty(&f.return_type, None)
                    }
                    _ => {
                        self.err(
                            Diagnostic::semantic(format!("unknown identifier `{}`", name)).at(callee.span().clone()),
                        );
                        Type::any_array().element_type()
                    }
                }
            }
            ExprKind::Member { base, name: method_name } => self.infer_method_call(base, method_name, args, ts),
            _ => {
                let _ = self.check_expr(callee, ts);
                for a in args {
                    self.check_expr(&a.expr, ts);
                }
                Type::any_array().element_type()
            }
        }
    }

    fn is_user_type(&self, name: &str) -> bool {
        matches!(
            self.scope.resolve(name).map(|s| s.kind),
            Some(SymbolKind::Class) | Some(SymbolKind::Struct) | Some(SymbolKind::Enum)
        )
    }

    fn infer_method_call(&mut self, base: &Expr, method_name: &str, args: &[CallArg], ts: &mut TypeScope) -> Type {
        // `M.name(...)` where M is a module.
        if let ExprKind::Ident(base_name) = &base.kind {
            if ts.lookup(base_name).is_none() {
                if let Some(sym) = self.scope.resolve(base_name) {
                    if let SymbolNode::Module(inner) = &sym.node {
                        return match inner.resolve_local(method_name) {
                            Some(crate::scope::Symbol { node: SymbolNode::Func(f), .. }) => {
                                for a in args {
                                    self.check_expr(&a.expr, ts);
                                }
                                self.check_call_args(&f.params, args, ts, method_name == "printf");
                                self.resolve_ty(&f.return_type, None)
                            }
                            _ => {
                                self.err(
                                    Diagnostic::semantic(format!(
                                        "`{}` not found in module `{}`",
                                        method_name, base_name
                                    ))
                                    .at(base.span().clone()),
                                );
                                Type::any_array().element_type()
                            }
                        };
                    }
                }
            }
        }

        let recv_ty = self.check_expr(base, ts);
        for a in args {
            self.check_expr(&a.expr, ts);
        }

        if recv_ty.is_numeric() {
            return self.intrinsic_result(method_name, &recv_ty, base.span());
        }
        if method_name == "type" {
            return Type::builtin(Builtin::String);
        }

        if let Some(type_name) = recv_ty.user_name() {
            if let Some(m) = method_of(self.scope, type_name, method_name) {
                self.check_call_args(&m.params, args, ts, false);
                let ret = self.resolve_ty(&m.return_type, Some(&recv_ty));
                return if ret.user_name() == Some("self") { recv_ty } else { ret };
            }
            self.err(
                Diagnostic::semantic(format!("no method `{}` on `{}`", method_name, type_name)).at(base.span().clone()),
            );
        }
        Type::any_array().element_type()
    }

    fn intrinsic_result(&mut self, name: &str, recv: &Type, span: &crate::token::Span) -> Type {
        match name {
            "to_dec" | "to_hex" | "to_bin" | "to_oct" | "to_base" | "to_sci" => Type::builtin(Builtin::String),
            "to_float" => recv
                .clone()
                .into_builtin()
                .map(|(b, _)| Type::builtin(if b.is_float() { b } else { Builtin::F64 }))
                .unwrap_or(Type::builtin(Builtin::F64)),
            "type" => Type::builtin(Builtin::String),
            _ => {
                self.err(Diagnostic::semantic(format!("no intrinsic `{}` on `{}`", name, recv)).at(span.clone()));
                Type::any_array().element_type()
            }
        }
    }

    fn check_call_args(&mut self, params: &[Param], args: &[CallArg], ts: &mut TypeScope, is_printf: bool) {
        if is_printf {
            if let Some(first) = args.first() {
                let t = self.infer_expr(&first.expr, ts);
                if !t.is_string() {
                    self.err(Diagnostic::semantic("printf's first argument must be string-like").at(first.expr.span().clone()));
                }
            }
            return;
        }
        if params.len() != args.len() {
            self.err(Diagnostic::semantic(format!("expected {} argument(s), got {}", params.len(), args.len())));
            return;
        }
        for (p, a) in params.iter().zip(args.iter()) {
            let pty = self.resolve_ty(&p.ty, ts.self_type.as_ref());
            let aty = self.infer_expr(&a.expr, ts);
            if !assignable(&pty, &aty) {
                self.err(
                    Diagnostic::semantic(format!("argument `{}` expects `{}`, got `{}`", p.name, pty, aty))
                        .at(a.expr.span().clone()),
                );
            }
        }
    }

    fn infer_unary(&mut self, op: UnaryOp, operand: &Expr, ts: &mut TypeScope) -> Type {
        let ty = self.check_expr(operand, ts);
        match op {
            UnaryOp::Not => {
                self.require_bool(&ty, operand);
                Type::builtin(Builtin::Bool)
            }
            UnaryOp::BitNot => {
                self.require_integer(&ty, operand);
                ty
            }
            UnaryOp::Neg => {
                if !ty.is_numeric() {
                    self.err(Diagnostic::semantic(format!("expected numeric, found `{}`", ty)).at(operand.span().clone()));
                }
                ty
            }
            UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec => {
                if !ty.is_numeric() {
                    self.err(Diagnostic::semantic(format!("`++`/`--` require a numeric operand, found `{}`", ty)).at(operand.span().clone()));
                }
                ty
            }
        }
    }

    fn infer_binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr, ts: &mut TypeScope) -> Type {
        let lt = self.check_expr(lhs, ts);
        let rt = self.check_expr(rhs, ts);
        use BinOp::*;
        match op {
            And | Or => {
                self.require_bool(&lt, lhs);
                self.require_bool(&rt, rhs);
                Type::builtin(Builtin::Bool)
            }
            Eq | Ne => {
                let ok = (lt.is_numeric() && rt.is_numeric())
                    || (lt.is_string() && rt.is_string())
                    || (lt.is_bool() && rt.is_bool())
                    || lt.is_null()
                    || rt.is_null();
                if !ok {
                    self.err(Diagnostic::semantic(format!("cannot compare `{}` and `{}`", lt, rt)).at(lhs.span().clone()));
                }
                Type::builtin(Builtin::Bool)
            }
            Lt | Le | Gt | Ge => {
                if !lt.is_numeric() || !rt.is_numeric() {
                    self.err(Diagnostic::semantic(format!("cannot compare `{}` and `{}`", lt, rt)).at(lhs.span().clone()));
                }
                Type::builtin(Builtin::Bool)
            }
            BitAnd | BitOr | BitXor | Shl | Shr => {
                self.require_integer(&lt, lhs);
                self.require_integer(&rt, rhs);
                lt
            }
            Add => {
                if lt.is_string() || rt.is_string() {
                    Type::builtin(Builtin::String)
                } else if lt.is_numeric() && rt.is_numeric() {
                    if lt.is_float() || rt.is_float() {
                        Type::builtin(Builtin::F64)
                    } else {
                        lt
                    }
                } else {
                    self.err(Diagnostic::semantic(format!("cannot add `{}` and `{}`", lt, rt)).at(lhs.span().clone()));
                    lt
                }
            }
            Sub | Mul => {
                if !lt.is_numeric() || !rt.is_numeric() {
                    self.err(Diagnostic::semantic(format!("expected numeric operands, found `{}` and `{}`", lt, rt)).at(lhs.span().clone()));
                    return lt;
                }
                if lt.is_float() || rt.is_float() {
                    Type::builtin(Builtin::F64)
                } else {
                    lt
                }
            }
            Rem => {
                self.require_integer(&lt, lhs);
                self.require_integer(&rt, rhs);
                lt
            }
            Div => {
                if !lt.is_numeric() || !rt.is_numeric() {
                    self.err(Diagnostic::semantic(format!("expected numeric operands, found `{}` and `{}`", lt, rt)).at(lhs.span().clone()));
                }
                Type::builtin(Builtin::F64)
            }
            RangeExclusive | RangeInclusive => {
                self.require_integer(&lt, lhs);
                self.require_integer(&rt, rhs);
                lt
            }
        }
    }

    fn infer_assign(&mut self, op: AssignOp, target: &Expr, value: &Expr, ts: &mut TypeScope) -> Type {
        let target_ty = self.check_expr(target, ts);
        let value_ty = self.check_expr(value, ts);
        if matches!(op, AssignOp::Assign) {
            if let ExprKind::Literal(LiteralExpr::Number(n)) = &value.kind {
                self.check_literal_range(n, &target_ty, value);
            }
            self.check_assignable(&target_ty, &value_ty, value);
        } else if !target_ty.is_numeric() || !value_ty.is_numeric() {
            self.err(
                Diagnostic::semantic(format!("compound assignment requires numeric operands, found `{}` and `{}`", target_ty, value_ty))
                    .at(value.span().clone()),
            );
        }
        target_ty
    }
}

fn target_radix(num: &crate::token::NumberLit) -> u32 {
    num.base as u32
}

impl Type {
    fn into_builtin(self) -> Option<(Builtin, ())> {
        match self.base {
            BaseKind::Builtin(b) if self.array_depth == 0 => Some((b, ())),
            _ => None,
        }
    }
}

/// Entry point used by the driver: runs the shared binder+checker walk over
/// one module, given its (already import-resolved) scope and the override
/// check's template-class map.
pub fn check_module(file: &File, scope: &Rc<Scope>, templated: &HashMap<String, bool>) -> (TypeTable, Vec<Diagnostic>) {
    let mut checker = Checker::new(scope, templated);
    checker.check_file(file);
    checker.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse_file;

    fn check_source(src: &str) -> Vec<Diagnostic> {
        let file_id: Rc<str> = Rc::from("t.ell");
        let (tokens, mut diags) = tokenize(src, file_id.clone());
        let (ast, parse_diags) = parse_file(&tokens, file_id);
        diags.extend(parse_diags);
        let ast = ast.expect("parse should succeed");
        let (scope, top_diags) = crate::binder::collect_top_level(&ast);
        diags.extend(top_diags);
        let (templated, override_diags) = crate::types::resolver::check_overrides(&scope);
        diags.extend(override_diags);
        let (_types, check_diags) = check_module(&ast, &scope, &templated);
        diags.extend(check_diags);
        diags
    }

    #[test]
    fn hello_arithmetic_has_no_diagnostics() {
        let diags = check_source(
            "pub func main(argc: []i32, argv: []string): i32 { var x = 40 + 2; ret x; }",
        );
        assert!(diags.is_empty(), "{:?}", diags);
    }

    #[test]
    fn null_to_bit_is_diagnosed() {
        let diags = check_source(
            "pub func main(argc: []i32, argv: []string): i32 { var b: bit = null; ret 0; }",
        );
        assert!(diags.iter().any(|d| d.message.contains("bit cannot be null")), "{:?}", diags);
    }

    #[test]
    fn division_always_yields_f64() {
        let diags = check_source(
            "pub func main(argc: []i32, argv: []string): i32 { var x: f64 = 4 / 2; ret 0; }",
        );
        assert!(diags.is_empty(), "{:?}", diags);
    }

    #[test]
    fn template_class_cannot_be_instantiated() {
        let diags = check_source(
            "class Base { template func name(): string; } class Bad : Base { } pub func main(argc: []i32, argv: []string): i32 { var b = Bad(); ret 0; }",
        );
        assert!(diags.iter().any(|d| d.message.contains("cannot instantiate template class")), "{:?}", diags);
    }

    #[test]
    fn integer_literal_out_of_range_is_diagnosed() {
        let diags = check_source(
            "pub func main(argc: []i32, argv: []string): i32 { var x: i8 = 200; ret 0; }",
        );
        assert!(diags.iter().any(|d| d.message.contains("out of range")), "{:?}", diags);
    }
}
