// ABOUTME: Call dispatch — constructors, builders, instance methods, `super`, and free functions

use crate::ast::{BuilderDecl, CallArg, Expr, ExprKind, FieldDecl, FuncDecl, MethodDecl};
use crate::diagnostics::Diagnostic;
use crate::error::RuntimeError;
use crate::interpreter::env::Env;
use crate::interpreter::intrinsics;
use crate::interpreter::value::{ObjectData, Value};
use crate::interpreter::{Interpreter, Signal};
use crate::scope::{Symbol, SymbolNode};
use crate::types::Builtin;
use std::rc::Rc;

fn rt(err: RuntimeError, expr: &Expr) -> Diagnostic {
    Diagnostic::runtime(err.to_string()).at(expr.span.clone())
}

/// Zero value for a freshly-constructed field that a builder doesn't touch.
/// User types and nullable/array fields default to `null`; non-nullable
/// builtins get their natural zero, keeping every field address-able
/// immediately after construction.
fn default_for_field(f: &FieldDecl) -> Value {
    if f.ty.array_depth > 0 || f.ty.nullable {
        if f.ty.array_depth > 0 {
            return Value::array(vec![]);
        }
        return Value::Null;
    }
    match Builtin::from_name(&f.ty.name) {
        Some(b) if b.is_integer() => Value::Int { value: 0, width: b },
        Some(b) if b.is_float() => Value::Float(0.0),
        Some(Builtin::Bool) => Value::Bool(false),
        Some(Builtin::Char) => Value::Char('\0'),
        Some(Builtin::String) => Value::Str(String::new()),
        _ => Value::Null,
    }
}

impl<'a> Interpreter<'a> {
    fn eval_args(&self, args: &[CallArg], env: &mut Env) -> Result<Vec<Value>, Diagnostic> {
        args.iter().map(|a| self.eval_expr(&a.expr, env)).collect()
    }

    /// A class's fields in base-to-derived order, so a derived field with
    /// the same name (disallowed by the checker, but harmless here) simply
    /// wins by being inserted last.
    fn collect_fields(&self, type_name: &str) -> Vec<FieldDecl> {
        let mut out = Vec::new();
        if let Some(sym) = self.scope.resolve(type_name) {
            match &sym.node {
                SymbolNode::Class(c) => {
                    if let Some(super_ident) = &c.super_type {
                        out.extend(self.collect_fields(&super_ident.name));
                    }
                    out.extend(c.fields.iter().cloned());
                }
                SymbolNode::Struct(s) => out.extend(s.fields.iter().cloned()),
                SymbolNode::Enum(e) => out.extend(e.fields.iter().cloned()),
                _ => {}
            }
        }
        out
    }

    fn builders_of(&self, type_name: &str) -> Vec<BuilderDecl> {
        match self.scope.resolve(type_name).map(|s| s.node) {
            Some(SymbolNode::Class(c)) => c.builders.clone(),
            Some(SymbolNode::Struct(s)) => s.builders.clone(),
            Some(SymbolNode::Enum(e)) => e.builders.clone(),
            _ => Vec::new(),
        }
    }

    /// Finds an instance method by name and arity, climbing a class's super
    /// chain when the receiving type doesn't define it directly — the same
    /// order `super`-matching uses for override checks.
    fn find_method(&self, type_name: &str, name: &str, arity: usize) -> Option<(Rc<MethodDecl>, String)> {
        let sym = self.scope.resolve(type_name)?;
        let (methods, super_name): (&[MethodDecl], Option<String>) = match &sym.node {
            SymbolNode::Class(c) => (&c.methods, c.super_type.as_ref().map(|i| i.name.clone())),
            SymbolNode::Struct(s) => (&s.methods, None),
            SymbolNode::Enum(e) => (&e.methods, None),
            _ => return None,
        };
        if let Some(m) = methods.iter().find(|m| m.name == name && m.params.len() == arity && m.body.is_some()) {
            return Some((Rc::new(m.clone()), type_name.to_string()));
        }
        match super_name {
            Some(sn) => self.find_method(&sn, name, arity),
            None => None,
        }
    }

    fn construct_instance(&self, sym: &Symbol, args: &[Value], expr: &Expr) -> Result<Value, Diagnostic> {
        let name = sym.name.clone();
        if matches!(sym.node, SymbolNode::Class(_)) && *self.templated.get(&name).unwrap_or(&false) {
            return Err(rt(RuntimeError::TemplateInstantiation(name), expr));
        }

        let mut data = ObjectData::new(name.clone());
        for field in self.collect_fields(&name) {
            data.fields.insert(field.name.clone(), default_for_field(&field));
        }
        let self_value = Value::object(data);

        let builders = self.builders_of(&name);
        let builder = builders.iter().find(|b| b.params.len() == args.len());
        match builder {
            Some(b) => {
                let mut env = Env::new(self.globals.clone());
                env.push_block();
                env.define("self", self_value.clone());
                for (p, v) in b.params.iter().zip(args) {
                    env.define(&p.name, v.clone());
                }
                self.exec_stmts(&b.body.stmts, &mut env)?;
            }
            None if builders.is_empty() && args.is_empty() => {}
            None => {
                return Err(rt(RuntimeError::NoMatchingBuilder { ty: name, arity: args.len() }, expr));
            }
        }
        Ok(self_value)
    }

    fn call_function(&self, f: &FuncDecl, args: &[Value]) -> Result<Value, Diagnostic> {
        let mut env = Env::new(self.globals.clone());
        env.push_block();
        for (p, v) in f.params.iter().zip(args) {
            env.define(&p.name, v.clone());
        }
        let sig = self.exec_stmts(&f.body.stmts, &mut env)?;
        Ok(match sig {
            Signal::Return(v) => v,
            _ => Value::Null,
        })
    }

    fn call_method(&self, m: &MethodDecl, receiver: Value, args: &[Value], expr: &Expr) -> Result<Value, Diagnostic> {
        let body = m.body.as_ref().ok_or_else(|| {
            rt(RuntimeError::MethodNotFound { receiver: receiver.type_name(), method: m.name.clone() }, expr)
        })?;
        let mut env = Env::new(self.globals.clone());
        env.push_block();
        env.define("self", receiver);
        for (p, v) in m.params.iter().zip(args) {
            env.define(&p.name, v.clone());
        }
        let sig = self.exec_stmts(&body.stmts, &mut env)?;
        Ok(match sig {
            Signal::Return(v) => v,
            _ => Value::Null,
        })
    }

    pub(super) fn eval_call(&self, callee: &Expr, args: &[CallArg], env: &mut Env, expr: &Expr) -> Result<Value, Diagnostic> {
        match &callee.kind {
            ExprKind::Ident(name) if name == "type" => {
                let values = self.eval_args(args, env)?;
                let v = values.first().cloned().unwrap_or(Value::Null);
                Ok(Value::Str(v.type_name()))
            }
            ExprKind::Ident(name) if Builtin::from_name(name).is_some() => {
                let values = self.eval_args(args, env)?;
                let v = values.first().cloned().unwrap_or(Value::Null);
                self.eval_cast(&v, name)
            }
            ExprKind::Ident(name) => match self.scope.resolve(name) {
                Some(sym) if matches!(sym.node, SymbolNode::Func(_)) => {
                    let values = self.eval_args(args, env)?;
                    let f = match &sym.node {
                        SymbolNode::Func(f) => f.clone(),
                        _ => unreachable!(),
                    };
                    self.call_function(&f, &values)
                }
                Some(sym) if matches!(sym.node, SymbolNode::Class(_) | SymbolNode::Struct(_) | SymbolNode::Enum(_)) => {
                    let values = self.eval_args(args, env)?;
                    self.construct_instance(&sym, &values, expr)
                }
                _ => Err(rt(RuntimeError::UndefinedVariable(name.clone()), expr)),
            },
            ExprKind::Member { base, name } => {
                if let ExprKind::Ident(base_name) = &base.kind {
                    if env.get_local(base_name).is_none() && env.get_global(base_name).is_none() {
                        if let Some(sym) = self.scope.resolve(base_name) {
                            if let SymbolNode::Module(inner) = &sym.node {
                                let inner_sym = inner.resolve_local(name).ok_or_else(|| {
                                    rt(RuntimeError::MissingField(name.clone()), expr)
                                })?;
                                return match &inner_sym.node {
                                    SymbolNode::Func(f) => {
                                        let values = self.eval_args(args, env)?;
                                        self.call_function(f, &values)
                                    }
                                    _ => Err(rt(RuntimeError::MissingField(name.clone()), expr)),
                                };
                            }
                        }
                    }
                }

                let receiver = self.eval_expr(base, env)?;
                let values = self.eval_args(args, env)?;
                if intrinsics::is_intrinsic(name) && matches!(receiver, Value::Int { .. } | Value::Float(_)) {
                    return intrinsics::call_intrinsic(name, &receiver, &values, &expr.span);
                }
                match &receiver {
                    Value::Object(o) => {
                        let type_name = o.borrow().type_name.clone();
                        let (method, _owner) = self
                            .find_method(&type_name, name, values.len())
                            .ok_or_else(|| rt(RuntimeError::MethodNotFound { receiver: type_name.clone(), method: name.clone() }, expr))?;
                        self.call_method(&method, receiver.clone(), &values, expr)
                    }
                    _ => Err(rt(RuntimeError::MethodNotFound { receiver: receiver.type_name(), method: name.clone() }, expr)),
                }
            }
            _ => Err(rt(RuntimeError::MissingField("<call>".into()), expr)),
        }
    }

    /// `super(...)` resolves against `self`'s declared class's `super_type`
    /// — correct for the common single-level-inheritance case; a method
    /// several levels removed from the instantiated class would need a
    /// lexical "current class" stack this interpreter doesn't track.
    pub(super) fn eval_super_call(&self, args: &[CallArg], env: &mut Env, expr: &Expr) -> Result<Value, Diagnostic> {
        let self_v = env.get_local("self").ok_or_else(|| rt(RuntimeError::UndefinedVariable("self".into()), expr))?;
        let type_name = match &self_v {
            Value::Object(o) => o.borrow().type_name.clone(),
            _ => return Err(rt(RuntimeError::UndefinedVariable("self".into()), expr)),
        };
        let class = match self.scope.resolve(&type_name) {
            Some(Symbol { node: SymbolNode::Class(c), .. }) => c,
            _ => return Err(rt(RuntimeError::MethodNotFound { receiver: type_name, method: "super".into() }, expr)),
        };
        let super_name = class
            .super_type
            .as_ref()
            .ok_or_else(|| rt(RuntimeError::MethodNotFound { receiver: type_name.clone(), method: "super".into() }, expr))?
            .name
            .clone();

        let values = self.eval_args(args, env)?;
        let builders = self.builders_of(&super_name);
        let builder = builders
            .iter()
            .find(|b| b.params.len() == values.len())
            .ok_or_else(|| rt(RuntimeError::NoMatchingBuilder { ty: super_name.clone(), arity: values.len() }, expr))?;

        let mut inner = Env::new(self.globals.clone());
        inner.push_block();
        inner.define("self", self_v);
        for (p, v) in builder.params.iter().zip(&values) {
            inner.define(&p.name, v.clone());
        }
        self.exec_stmts(&builder.body.stmts, &mut inner)?;
        Ok(Value::Null)
    }
}
