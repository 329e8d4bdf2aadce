// ABOUTME: Statement execution — blocks, control flow, and loop forms

use crate::ast::{Block, LoopForm, Stmt};
use crate::diagnostics::Diagnostic;
use crate::error::RuntimeError;
use crate::interpreter::env::Env;
use crate::interpreter::value::Value;
use crate::interpreter::{Interpreter, Signal};
use crate::types::{BaseKind, Builtin};

fn rt(err: RuntimeError, span: &crate::token::Span) -> Diagnostic {
    Diagnostic::runtime(err.to_string()).at(span.clone())
}

impl<'a> Interpreter<'a> {
    /// Runs a block in its own scope, releasing locals it introduced on exit
    /// regardless of how control leaves (fall-through, `return`, `break`,
    /// `continue`, or a propagated error — `?` still unwinds past `pop_block`
    /// callers, each of which runs before the error keeps going up).
    pub fn exec_block(&self, block: &Block, env: &mut Env) -> Result<Signal, Diagnostic> {
        env.push_block();
        let result = self.exec_stmts(&block.stmts, env);
        env.pop_block();
        result
    }

    /// Runs a statement list without introducing a new block scope — used
    /// for function/builder/method bodies, where the parameter bindings
    /// share the body's top-level scope rather than nesting inside it.
    pub fn exec_stmts(&self, stmts: &[Stmt], env: &mut Env) -> Result<Signal, Diagnostic> {
        for stmt in stmts {
            match self.exec_stmt(stmt, env)? {
                Signal::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Signal::Normal)
    }

    fn exec_stmt(&self, stmt: &Stmt, env: &mut Env) -> Result<Signal, Diagnostic> {
        match stmt {
            Stmt::Block(b) => self.exec_block(b, env),
            Stmt::Let(l) => {
                let value = self.eval_expr(&l.init, env)?;
                env.define(&l.name, value);
                Ok(Signal::Normal)
            }
            Stmt::Expr(e) => {
                self.eval_expr(e, env)?;
                Ok(Signal::Normal)
            }
            Stmt::Return { value, .. } => {
                let v = match value {
                    Some(e) => self.eval_expr(e, env)?,
                    None => Value::Null,
                };
                Ok(Signal::Return(v))
            }
            Stmt::If(s) => {
                if self.eval_expr(&s.cond, env)?.as_bool().unwrap_or(false) {
                    return self.exec_block(&s.then_block, env);
                }
                for (cond, block) in &s.elifs {
                    if self.eval_expr(cond, env)?.as_bool().unwrap_or(false) {
                        return self.exec_block(block, env);
                    }
                }
                if let Some(else_block) = &s.else_block {
                    return self.exec_block(else_block, env);
                }
                Ok(Signal::Normal)
            }
            Stmt::While(s) => {
                while self.eval_expr(&s.cond, env)?.as_bool().unwrap_or(false) {
                    match self.exec_block(&s.body, env)? {
                        Signal::Break => break,
                        Signal::Continue | Signal::Normal => {}
                        ret @ Signal::Return(_) => return Ok(ret),
                    }
                }
                Ok(Signal::Normal)
            }
            Stmt::DoWhile(s) => loop {
                match self.exec_block(&s.body, env)? {
                    Signal::Break => break Ok(Signal::Normal),
                    Signal::Continue | Signal::Normal => {
                        if !self.eval_expr(&s.cond, env)?.as_bool().unwrap_or(false) {
                            break Ok(Signal::Normal);
                        }
                    }
                    ret @ Signal::Return(_) => break Ok(ret),
                }
            },
            Stmt::Loop(s) => self.exec_loop(s, env),
            Stmt::Break(_) => Ok(Signal::Break),
            Stmt::Continue(_) => Ok(Signal::Continue),
        }
    }

    fn exec_loop(&self, s: &crate::ast::LoopStmt, env: &mut Env) -> Result<Signal, Diagnostic> {
        match &s.form {
            LoopForm::Range(r) => {
                let from = self
                    .eval_expr(&r.from, env)?
                    .as_int()
                    .ok_or_else(|| rt(RuntimeError::NonIntegerBound, &r.span))?;
                let to = self.eval_expr(&r.to, env)?.as_int().ok_or_else(|| rt(RuntimeError::NonIntegerBound, &r.span))?;
                let step = match &r.step {
                    Some(e) => self.eval_expr(e, env)?.as_int().ok_or_else(|| rt(RuntimeError::NonIntegerBound, &r.span))?,
                    None => 1,
                };
                if step == 0 {
                    return Err(rt(RuntimeError::ZeroStep, &r.span));
                }
                let step = step.abs() * if r.reverse { -1 } else { 1 };
                let mut i = if r.reverse { to } else { from };
                let width = match self.types.get(r.from.id).map(|t| t.base.clone()) {
                    Some(BaseKind::Builtin(b)) if b.is_numeric() => b,
                    _ => Builtin::I32,
                };

                loop {
                    let done = if r.reverse {
                        if r.inclusive { i < from } else { i <= from }
                    } else if r.inclusive {
                        i > to
                    } else {
                        i >= to
                    };
                    if done {
                        break;
                    }
                    env.push_block();
                    env.define(&r.var, Value::Int { value: i, width });
                    let sig = self.exec_stmts(&s.body.stmts, env);
                    env.pop_block();
                    match sig? {
                        Signal::Break => break,
                        Signal::Continue | Signal::Normal => {}
                        ret @ Signal::Return(_) => return Ok(ret),
                    }
                    i += step;
                }
                Ok(Signal::Normal)
            }
            LoopForm::Iterable(it) => {
                let iterable = self.eval_expr(&it.iterable, env)?;
                let items = match &iterable {
                    Value::Array(items) => items.borrow().clone(),
                    _ => return Err(rt(RuntimeError::NonIntegerBound, &it.span)),
                };
                for item in items {
                    env.push_block();
                    env.define(&it.var, item);
                    let sig = self.exec_stmts(&s.body.stmts, env);
                    env.pop_block();
                    match sig? {
                        Signal::Break => break,
                        Signal::Continue | Signal::Normal => {}
                        ret @ Signal::Return(_) => return Ok(ret),
                    }
                }
                Ok(Signal::Normal)
            }
        }
    }
}
