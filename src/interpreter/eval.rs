// ABOUTME: Expression evaluation

use crate::ast::{AssignOp, BinOp, Expr, ExprKind, LiteralExpr, UnaryOp};
use crate::diagnostics::Diagnostic;
use crate::error::RuntimeError;
use crate::interpreter::env::Env;
use crate::interpreter::value::{ObjectData, Value};
use crate::interpreter::{Interpreter, Num};
use crate::token::NumBase;
use crate::types::{BaseKind, Builtin};

fn rt(err: RuntimeError, expr: &Expr) -> Diagnostic {
    Diagnostic::runtime(err.to_string()).at(expr.span.clone())
}

impl<'a> Interpreter<'a> {
    pub fn eval_expr(&self, expr: &Expr, env: &mut Env) -> Result<Value, Diagnostic> {
        match &expr.kind {
            ExprKind::Literal(lit) => self.eval_literal(lit, expr),
            ExprKind::Ident(name) => self.eval_ident(name, env, expr),
            ExprKind::SelfExpr => env.get("self").ok_or_else(|| rt(RuntimeError::UndefinedVariable("self".into()), expr)),
            ExprKind::ArrayLit(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expr(item, env)?);
                }
                Ok(Value::array(values))
            }
            ExprKind::Index { base, index } => {
                let base_v = self.eval_expr(base, env)?;
                let idx_v = self.eval_expr(index, env)?;
                self.index_value(&base_v, &idx_v, expr)
            }
            ExprKind::Member { base, name } => self.eval_member(base, name, env, expr),
            ExprKind::Call { callee, args } => self.eval_call(callee, args, env, expr),
            ExprKind::SuperCall { args } => self.eval_super_call(args, env, expr),
            ExprKind::Unary { op, operand } => self.eval_unary(*op, operand, env, expr),
            ExprKind::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs, env, expr),
            ExprKind::Ternary { cond, then_expr, else_expr } => {
                let c = self.eval_expr(cond, env)?;
                if c.as_bool().unwrap_or(false) {
                    self.eval_expr(then_expr, env)
                } else {
                    self.eval_expr(else_expr, env)
                }
            }
            ExprKind::Assign { op, target, value } => self.eval_assign(*op, target, value, env, expr),
            ExprKind::Cast { expr: inner, ty } => {
                let v = self.eval_expr(inner, env)?;
                self.eval_cast(&v, &ty.name)
            }
        }
    }

    fn eval_literal(&self, lit: &LiteralExpr, expr: &Expr) -> Result<Value, Diagnostic> {
        Ok(match lit {
            LiteralExpr::Bool(b) => Value::Bool(*b),
            LiteralExpr::Str(s) => Value::Str(s.clone()),
            LiteralExpr::Char(c) => Value::Char(*c),
            LiteralExpr::Null => Value::Null,
            LiteralExpr::Number(n) => {
                if n.is_float {
                    Value::Float(n.digits.parse::<f64>().unwrap_or(0.0))
                } else {
                    let radix = match n.base {
                        NumBase::Bin => 2,
                        NumBase::Oct => 8,
                        NumBase::Dec => 10,
                        NumBase::Hex => 16,
                    };
                    let magnitude = i64::from_str_radix(&n.digits, radix)
                        .map_err(|_| rt(RuntimeError::NonIntegerBound, expr))?;
                    // An explicit suffix wins; otherwise defer to the width the
                    // checker already settled on for this literal (e.g. from an
                    // assignment target or parameter type) before falling back
                    // to the default width. The type table is read-only here —
                    // only the checker ever writes to it.
                    let width = n
                        .suffix
                        .as_deref()
                        .and_then(Builtin::from_name)
                        .filter(|b| b.is_numeric())
                        .or_else(|| match self.types.get(expr.id).map(|t| &t.base) {
                            Some(BaseKind::Builtin(b)) if b.is_numeric() => Some(*b),
                            _ => None,
                        })
                        .unwrap_or(Builtin::I32);
                    if width.is_float() {
                        Value::Float(magnitude as f64)
                    } else {
                        Value::Int { value: magnitude, width }
                    }
                }
            }
        })
    }

    fn eval_ident(&self, name: &str, env: &Env, expr: &Expr) -> Result<Value, Diagnostic> {
        if let Some(v) = env.get_local(name) {
            return Ok(v);
        }
        if let Some(Value::Object(o)) = env.get_local("self") {
            if let Some(v) = o.borrow().fields.get(name) {
                return Ok(v.clone());
            }
        }
        env.get_global(name).ok_or_else(|| rt(RuntimeError::UndefinedVariable(name.to_string()), expr))
    }

    fn index_value(&self, base: &Value, index: &Value, expr: &Expr) -> Result<Value, Diagnostic> {
        let i = index.as_int().ok_or_else(|| rt(RuntimeError::NonIntegerBound, expr))?;
        match base {
            Value::Array(items) => {
                let items = items.borrow();
                usize::try_from(i)
                    .ok()
                    .and_then(|idx| items.get(idx).cloned())
                    .ok_or_else(|| rt(RuntimeError::IndexOutOfRange { index: i, len: items.len() }, expr))
            }
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                usize::try_from(i)
                    .ok()
                    .and_then(|idx| chars.get(idx).copied())
                    .map(Value::Char)
                    .ok_or_else(|| rt(RuntimeError::IndexOutOfRange { index: i, len: chars.len() }, expr))
            }
            _ => Err(rt(RuntimeError::MissingField("[]".into()), expr)),
        }
    }

    /// Field access, module-qualified lookups, and enum case materialization
    /// share the `base.name` syntax. A bare `EnumName.CaseName` — never
    /// called — builds the case object on the spot from the payload
    /// expressions fixed in its declaration.
    fn eval_member(&self, base: &Expr, name: &str, env: &mut Env, expr: &Expr) -> Result<Value, Diagnostic> {
        if let ExprKind::Ident(base_name) = &base.kind {
            if env.get_local(base_name).is_none() && env.get_global(base_name).is_none() {
                if let Some(sym) = self.scope.resolve(base_name) {
                    if let crate::scope::SymbolNode::Enum(e) = &sym.node {
                        if let Some(case) = e.cases.iter().find(|c| c.name == name) {
                            let mut payload = Vec::with_capacity(case.payload_exprs.len());
                            for p in &case.payload_exprs {
                                payload.push(self.eval_expr(p, env)?);
                            }
                            let mut data = ObjectData::new(e.name.clone());
                            data.case = Some(case.name.clone());
                            data.payload = payload;
                            return Ok(Value::object(data));
                        }
                    }
                }
            }
        }

        let base_v = self.eval_expr(base, env)?;
        match &base_v {
            Value::Object(o) => {
                let o = o.borrow();
                if let Some(v) = o.fields.get(name) {
                    return Ok(v.clone());
                }
                if name == "case" {
                    if let Some(c) = &o.case {
                        return Ok(Value::Str(c.clone()));
                    }
                }
                Err(rt(RuntimeError::MissingField(name.to_string()), expr))
            }
            _ => Err(rt(RuntimeError::MissingField(name.to_string()), expr)),
        }
    }

    fn eval_unary(&self, op: UnaryOp, operand: &Expr, env: &mut Env, expr: &Expr) -> Result<Value, Diagnostic> {
        match op {
            UnaryOp::Neg => {
                let v = self.eval_expr(operand, env)?;
                Ok(match Num::from_value(&v) {
                    Some(Num::Int(n, w)) => Value::Int { value: -n, width: w },
                    Some(Num::Float(f)) => Value::Float(-f),
                    None => v,
                })
            }
            UnaryOp::Not => {
                let v = self.eval_expr(operand, env)?;
                Ok(Value::Bool(!v.as_bool().unwrap_or(false)))
            }
            UnaryOp::BitNot => {
                let v = self.eval_expr(operand, env)?;
                Ok(match v {
                    Value::Int { value, width } => Value::Int { value: !value, width },
                    other => other,
                })
            }
            UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec => {
                let old = self.eval_expr(operand, env)?;
                let delta = if matches!(op, UnaryOp::PreInc | UnaryOp::PostInc) { 1 } else { -1 };
                let new = match Num::from_value(&old) {
                    Some(Num::Int(n, w)) => Value::Int { value: n + delta, width: w },
                    Some(Num::Float(f)) => Value::Float(f + delta as f64),
                    None => old.clone(),
                };
                self.assign_place(operand, new.clone(), env, expr)?;
                Ok(if matches!(op, UnaryOp::PreInc | UnaryOp::PreDec) { new } else { old })
            }
        }
    }

    fn eval_binary(&self, op: BinOp, lhs: &Expr, rhs: &Expr, env: &mut Env, expr: &Expr) -> Result<Value, Diagnostic> {
        if matches!(op, BinOp::And | BinOp::Or) {
            let l = self.eval_expr(lhs, env)?.as_bool().unwrap_or(false);
            return Ok(Value::Bool(match op {
                BinOp::And => l && self.eval_expr(rhs, env)?.as_bool().unwrap_or(false),
                BinOp::Or => l || self.eval_expr(rhs, env)?.as_bool().unwrap_or(false),
                _ => unreachable!(),
            }));
        }

        let l = self.eval_expr(lhs, env)?;
        let r = self.eval_expr(rhs, env)?;

        match op {
            BinOp::RangeExclusive | BinOp::RangeInclusive => {
                let from = l.as_int().ok_or_else(|| rt(RuntimeError::NonIntegerBound, expr))?;
                let to = r.as_int().ok_or_else(|| rt(RuntimeError::NonIntegerBound, expr))?;
                let to = if matches!(op, BinOp::RangeInclusive) { to } else { to - 1 };
                Ok(Value::array((from..=to).map(|n| Value::i32(n as i32)).collect()))
            }
            BinOp::Eq => Ok(Value::Bool(l == r)),
            BinOp::Ne => Ok(Value::Bool(l != r)),
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                let (a, b) = (l.as_f64().unwrap_or(0.0), r.as_f64().unwrap_or(0.0));
                Ok(Value::Bool(match op {
                    BinOp::Lt => a < b,
                    BinOp::Le => a <= b,
                    BinOp::Gt => a > b,
                    BinOp::Ge => a >= b,
                    _ => unreachable!(),
                }))
            }
            BinOp::Add => match (&l, &r) {
                (Value::Str(a), _) => Ok(Value::Str(format!("{}{}", a, r))),
                (_, Value::Str(b)) => Ok(Value::Str(format!("{}{}", l, b))),
                _ => self.numeric_binary(op, &l, &r, expr),
            },
            BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => self.numeric_binary(op, &l, &r, expr),
            BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Shl | BinOp::Shr => {
                let (a, aw) = match Num::from_value(&l) {
                    Some(Num::Int(n, w)) => (n, w),
                    _ => return Err(rt(RuntimeError::DivisionByNonNumeric, expr)),
                };
                let b = r.as_int().ok_or_else(|| rt(RuntimeError::DivisionByNonNumeric, expr))?;
                let value = match op {
                    BinOp::BitAnd => a & b,
                    BinOp::BitOr => a | b,
                    BinOp::BitXor => a ^ b,
                    BinOp::Shl => a << b,
                    BinOp::Shr => a >> b,
                    _ => unreachable!(),
                };
                Ok(Value::Int { value, width: aw })
            }
            BinOp::And | BinOp::Or => unreachable!("handled above"),
        }
    }

    /// `/` always produces `f64`, following IEEE-754 for a zero divisor
    /// (infinity or NaN, never an error); `+`/`-`/`*` promote to `f64` if
    /// either operand is a float, otherwise stay integer, keeping the left
    /// operand's width (the same "result-left-type" rule the checker
    /// applies to bitwise ops).
    fn numeric_binary(&self, op: BinOp, l: &Value, r: &Value, expr: &Expr) -> Result<Value, Diagnostic> {
        let ln = Num::from_value(l).ok_or_else(|| rt(RuntimeError::DivisionByNonNumeric, expr))?;
        let rn = Num::from_value(r).ok_or_else(|| rt(RuntimeError::DivisionByNonNumeric, expr))?;

        if matches!(op, BinOp::Div) {
            return Ok(Value::Float(ln.as_f64() / rn.as_f64()));
        }

        if matches!(op, BinOp::Rem) {
            let (a, w) = match ln {
                Num::Int(n, w) => (n, w),
                Num::Float(_) => return Err(rt(RuntimeError::DivisionByNonNumeric, expr)),
            };
            let b = r.as_int().ok_or_else(|| rt(RuntimeError::DivisionByNonNumeric, expr))?;
            if b == 0 {
                return Err(rt(RuntimeError::DivisionByZero, expr));
            }
            return Ok(Value::Int { value: a % b, width: w });
        }

        if ln.is_float() || rn.is_float() {
            let (a, b) = (ln.as_f64(), rn.as_f64());
            return Ok(Value::Float(match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                _ => unreachable!(),
            }));
        }

        let (a, w) = match ln {
            Num::Int(n, w) => (n, w),
            Num::Float(_) => unreachable!(),
        };
        let b = match rn {
            Num::Int(n, _) => n,
            Num::Float(_) => unreachable!(),
        };
        Ok(Value::Int {
            value: match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                _ => unreachable!(),
            },
            width: w,
        })
    }

    pub(super) fn eval_cast(&self, v: &Value, target: &str) -> Result<Value, Diagnostic> {
        if target == "string" {
            return Ok(Value::Str(v.to_string()));
        }
        if let Some(b) = Builtin::from_name(target) {
            if b.is_float() {
                return Ok(Value::Float(v.as_f64().unwrap_or(0.0)));
            }
            if b.is_integer() {
                let n = v.as_int().or_else(|| v.as_f64().map(|f| f as i64)).unwrap_or(0);
                return Ok(Value::Int { value: n, width: b });
            }
        }
        Ok(v.clone())
    }

    fn eval_assign(
        &self,
        op: AssignOp,
        target: &Expr,
        value: &Expr,
        env: &mut Env,
        expr: &Expr,
    ) -> Result<Value, Diagnostic> {
        let new_value = if matches!(op, AssignOp::Assign) {
            self.eval_expr(value, env)?
        } else {
            let current = self.eval_expr(target, env)?;
            let rhs = self.eval_expr(value, env)?;
            let bin_op = match op {
                AssignOp::AddAssign => BinOp::Add,
                AssignOp::SubAssign => BinOp::Sub,
                AssignOp::MulAssign => BinOp::Mul,
                AssignOp::DivAssign => BinOp::Div,
                AssignOp::RemAssign => BinOp::Rem,
                AssignOp::Assign => unreachable!(),
            };
            match bin_op {
                BinOp::Add => match (&current, &rhs) {
                    (Value::Str(a), _) => Value::Str(format!("{}{}", a, rhs)),
                    (_, Value::Str(b)) => Value::Str(format!("{}{}", current, b)),
                    _ => self.numeric_binary(bin_op, &current, &rhs, expr)?,
                },
                _ => self.numeric_binary(bin_op, &current, &rhs, expr)?,
            }
        };
        self.assign_place(target, new_value.clone(), env, expr)?;
        Ok(new_value)
    }

    /// Writes through an lvalue — identifier, field, or index — sharing the
    /// same three target shapes the pre/post increment operators use.
    pub(super) fn assign_place(&self, target: &Expr, value: Value, env: &mut Env, expr: &Expr) -> Result<(), Diagnostic> {
        match &target.kind {
            ExprKind::Ident(name) => {
                if env.assign(name, value) {
                    Ok(())
                } else {
                    Err(rt(RuntimeError::UndefinedVariable(name.clone()), expr))
                }
            }
            ExprKind::Member { base, name } => {
                let base_v = self.eval_expr(base, env)?;
                match base_v {
                    Value::Object(o) => {
                        o.borrow_mut().fields.insert(name.clone(), value);
                        Ok(())
                    }
                    _ => Err(rt(RuntimeError::MissingField(name.clone()), expr)),
                }
            }
            ExprKind::Index { base, index } => {
                let base_v = self.eval_expr(base, env)?;
                let idx_v = self.eval_expr(index, env)?;
                let i = idx_v.as_int().ok_or_else(|| rt(RuntimeError::NonIntegerBound, expr))?;
                match base_v {
                    Value::Array(items) => {
                        let mut items = items.borrow_mut();
                        let len = items.len();
                        let idx = usize::try_from(i).ok().filter(|idx| *idx < len);
                        match idx {
                            Some(idx) => {
                                items[idx] = value;
                                Ok(())
                            }
                            None => Err(rt(RuntimeError::IndexOutOfRange { index: i, len }, expr)),
                        }
                    }
                    _ => Err(rt(RuntimeError::MissingField("[]".into()), expr)),
                }
            }
            _ => Err(rt(RuntimeError::MissingField("<expr>".into()), expr)),
        }
    }
}
