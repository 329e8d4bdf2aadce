// ABOUTME: Tree-walking interpreter — entry point, globals, and the `main` contract

pub mod dispatch;
pub mod env;
pub mod eval;
pub mod exec;
pub mod intrinsics;
pub mod value;

use crate::ast::File;
use crate::diagnostics::Diagnostic;
use crate::error::RuntimeError;
use crate::scope::{Scope, SymbolNode};
use crate::types::{Builtin, TypeTable};
use env::Env;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use value::Value;

/// A `return` (or, internally, `break`/`continue`) bubbling up through
/// nested blocks until something consumes it.
pub enum Signal {
    Normal,
    Return(Value),
    Break,
    Continue,
}

thread_local! {
    /// The type table `execute` is currently running against. The
    /// interpreter keeps a process-wide pointer to the current type table
    /// for the duration of `execute`; it is cleared on exit. Only `execute`
    /// (via `TypeTableGuard`) ever writes this cell.
    static CURRENT_TYPES: RefCell<Option<Rc<TypeTable>>> = RefCell::new(None);
}

/// Installs `CURRENT_TYPES` on construction, clears it on drop — so it's
/// cleared on every exit path out of `execute`, including an early `?`.
struct TypeTableGuard;

impl TypeTableGuard {
    fn install(types: Rc<TypeTable>) -> Self {
        CURRENT_TYPES.with(|c| *c.borrow_mut() = Some(types));
        TypeTableGuard
    }
}

impl Drop for TypeTableGuard {
    fn drop(&mut self) {
        CURRENT_TYPES.with(|c| *c.borrow_mut() = None);
    }
}

/// The type table of the `execute` call presently running on this thread.
/// Panics outside `execute` — nothing else is meant to call this.
pub fn current_types() -> Rc<TypeTable> {
    CURRENT_TYPES.with(|c| c.borrow().clone()).expect("current_types() called outside of execute()")
}

/// Holds the pieces every evaluation/execution method needs: the resolved
/// module scope (for decl lookups — functions, classes, imports), the type
/// table the checker produced, and which classes are template/abstract.
pub struct Interpreter<'a> {
    pub scope: &'a Rc<Scope>,
    pub types: Rc<TypeTable>,
    pub templated: &'a HashMap<String, bool>,
    pub globals: Rc<RefCell<HashMap<String, Value>>>,
}

impl<'a> Interpreter<'a> {
    pub fn new(scope: &'a Rc<Scope>, types: Rc<TypeTable>, templated: &'a HashMap<String, bool>) -> Self {
        Interpreter { scope, types, templated, globals: Rc::new(RefCell::new(HashMap::new())) }
    }

    fn to_runtime_diag(err: RuntimeError) -> Diagnostic {
        Diagnostic::runtime(err.to_string())
    }
}

/// Runs a checked file's `main` to completion, returning its exit code.
pub fn execute(
    file: &File,
    scope: &Rc<Scope>,
    types: Rc<TypeTable>,
    templated: &HashMap<String, bool>,
    program_args: &[String],
) -> Result<i32, Diagnostic> {
    let _types_guard = TypeTableGuard::install(types.clone());
    let interp = Interpreter::new(scope, types, templated);
    let mut env = Env::new(interp.globals.clone());

    log::debug!("interpreter: initializing {} global(s)", file.decls.len());
    for decl in &file.decls {
        if let crate::ast::Decl::GlobalVar(g) = decl {
            let value = match &g.init {
                Some(init) => interp.eval_expr(init, &mut env)?,
                None => Value::Null,
            };
            interp.globals.borrow_mut().insert(g.name.clone(), value);
        }
    }

    let main_sym = scope
        .resolve("main")
        .ok_or_else(|| Interpreter::to_runtime_diag(RuntimeError::BadMainSignature))?;
    let main_fn = match main_sym.node {
        SymbolNode::Func(f) => f,
        _ => return Err(Interpreter::to_runtime_diag(RuntimeError::BadMainSignature)),
    };
    if main_fn.params.len() != 2 || !is_main_signature(&main_fn) {
        return Err(Interpreter::to_runtime_diag(RuntimeError::BadMainSignature));
    }

    log::debug!("interpreter: entering main with {} program arg(s)", program_args.len());
    let argc = Value::array(vec![Value::i32(program_args.len() as i32)]);
    let argv = Value::array(program_args.iter().map(|a| Value::Str(a.clone())).collect());

    env.push_block();
    env.define(&main_fn.params[0].name, argc);
    env.define(&main_fn.params[1].name, argv);
    let signal = interp.exec_block(&main_fn.body, &mut env)?;
    env.pop_block();

    let result = match signal {
        Signal::Return(v) => v,
        _ => Value::i32(0),
    };
    result
        .as_int()
        .map(|v| v as i32)
        .ok_or_else(|| Interpreter::to_runtime_diag(RuntimeError::NonIntegerMainReturn))
}

/// `main` must take `([]i32, []string)` and return `i32` — anything else
/// is rejected before a single statement of its body runs.
fn is_main_signature(main_fn: &crate::ast::FuncDecl) -> bool {
    fn shaped(ty: &crate::ast::TypeExpr, name: &str, array_depth: u32) -> bool {
        ty.name == name && ty.array_depth == array_depth && !ty.nullable
    }
    shaped(&main_fn.params[0].ty, "i32", 1)
        && shaped(&main_fn.params[1].ty, "string", 1)
        && shaped(&main_fn.return_type, "i32", 0)
}

/// Numeric value promoted to a common representation for arithmetic —
/// mixed int/float arithmetic promotes to `f64`.
#[derive(Debug, Clone, Copy)]
pub enum Num {
    Int(i64, Builtin),
    Float(f64),
}

impl Num {
    pub fn from_value(v: &Value) -> Option<Num> {
        match v {
            Value::Int { value, width } => Some(Num::Int(*value, *width)),
            Value::Float(f) => Some(Num::Float(*f)),
            _ => None,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Num::Int(v, _) => v as f64,
            Num::Float(f) => f,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Num::Float(_))
    }
}
