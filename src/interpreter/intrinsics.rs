// ABOUTME: Numeric intrinsic methods — to_dec/to_hex/to_bin/to_oct/to_base/to_sci/to_float

use crate::diagnostics::Diagnostic;
use crate::error::RuntimeError;
use crate::interpreter::value::Value;
use crate::token::Span;
use crate::types::Builtin;

fn rt(err: RuntimeError, span: &Span) -> Diagnostic {
    Diagnostic::runtime(err.to_string()).at(span.clone())
}

fn radix_digits(n: i64, radix: u32) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let neg = n < 0;
    let mut digits = Vec::new();
    let mut n_abs = if neg { (n as i128).unsigned_abs() } else { n as u128 };
    while n_abs > 0 {
        let d = (n_abs % radix as u128) as u32;
        digits.push(std::char::from_digit(d, radix).unwrap());
        n_abs /= radix as u128;
    }
    if neg {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

/// Dispatches a numeric intrinsic by name against a receiver value. `args`
/// are already-evaluated call arguments (`to_base`/`to_sci`/`to_float` take
/// an optional numeric parameter).
pub fn call_intrinsic(method: &str, receiver: &Value, args: &[Value], span: &Span) -> Result<Value, Diagnostic> {
    let n = receiver.as_int().or_else(|| receiver.as_f64().map(|f| f as i64));
    match method {
        "to_dec" => Ok(Value::Str(radix_digits(n.unwrap_or(0), 10))),
        "to_hex" => Ok(Value::Str(radix_digits(n.unwrap_or(0), 16))),
        "to_bin" => Ok(Value::Str(radix_digits(n.unwrap_or(0), 2))),
        "to_oct" => Ok(Value::Str(radix_digits(n.unwrap_or(0), 8))),
        "to_base" => {
            let radix = args.first().and_then(|v| v.as_int()).ok_or_else(|| rt(RuntimeError::NonIntegerBound, span))?;
            Ok(Value::Str(radix_digits(n.unwrap_or(0), radix as u32)))
        }
        "to_sci" => {
            let precision = args.first().and_then(|v| v.as_int()).unwrap_or(6) as usize;
            let f = receiver.as_f64().unwrap_or(n.unwrap_or(0) as f64);
            Ok(Value::Str(format!("{:.*e}", precision, f)))
        }
        "to_float" => {
            let width = args
                .first()
                .and_then(|v| match v {
                    Value::Str(s) => Builtin::from_name(s),
                    _ => None,
                })
                .filter(|b| b.is_float())
                .unwrap_or(Builtin::F64);
            let f = receiver.as_f64().unwrap_or(n.unwrap_or(0) as f64);
            let f = if width == Builtin::F32 { f as f32 as f64 } else { f };
            Ok(Value::Float(f))
        }
        other => Err(rt(RuntimeError::MethodNotFound { receiver: receiver.type_name(), method: other.to_string() }, span)),
    }
}

/// True when `method` names one of the universal numeric intrinsics, so the
/// caller can route a `recv.method(...)` call here instead of instance
/// method lookup.
pub fn is_intrinsic(method: &str) -> bool {
    matches!(method, "to_dec" | "to_hex" | "to_bin" | "to_oct" | "to_base" | "to_sci" | "to_float")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Builtin;

    fn span() -> Span {
        Span::point(std::rc::Rc::from("t.ell"), 1, 1)
    }

    #[test]
    fn to_hex_formats_positive_and_negative() {
        let v = Value::int(255, Builtin::I32);
        assert_eq!(call_intrinsic("to_hex", &v, &[], &span()).unwrap(), Value::Str("ff".into()));
        let v = Value::int(-1, Builtin::I32);
        assert_eq!(call_intrinsic("to_hex", &v, &[], &span()).unwrap(), Value::Str("-1".into()));
    }

    #[test]
    fn to_base_uses_given_radix() {
        let v = Value::int(8, Builtin::I32);
        assert_eq!(call_intrinsic("to_base", &v, &[Value::i32(2)], &span()).unwrap(), Value::Str("1000".into()));
    }

    #[test]
    fn to_float_widens_int() {
        let v = Value::int(3, Builtin::I32);
        assert_eq!(call_intrinsic("to_float", &v, &[], &span()).unwrap(), Value::Float(3.0));
    }
}
