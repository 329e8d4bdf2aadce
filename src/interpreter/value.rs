// ABOUTME: Runtime value model — arrays and objects live behind Rc<RefCell<_>> handles

use crate::types::Builtin;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

pub type ArrayHandle = Rc<RefCell<Vec<Value>>>;
pub type ObjectHandle = Rc<RefCell<ObjectData>>;

/// A class/struct/enum instance: a field-name→value map tagged with its
/// declared type name, plus the reserved enum-case slots. These live in
/// dedicated struct fields rather than in `fields`, so a user field named
/// `case` or `payload` can never collide with them.
#[derive(Debug, Clone)]
pub struct ObjectData {
    pub type_name: String,
    pub fields: HashMap<String, Value>,
    pub case: Option<String>,
    pub payload: Vec<Value>,
}

impl ObjectData {
    pub fn new(type_name: impl Into<String>) -> Self {
        ObjectData { type_name: type_name.into(), fields: HashMap::new(), case: None, payload: Vec::new() }
    }
}

/// One runtime value. Integers carry their declared width/signedness in
/// one tagged variant holding a signed 64-bit magnitude and a width marker;
/// arithmetic always operates on the `i64` magnitude, narrowing having
/// already been checked by the type checker.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int { value: i64, width: Builtin },
    Float(f64),
    Str(String),
    Char(char),
    Array(ArrayHandle),
    Object(ObjectHandle),
}

impl Value {
    pub fn int(value: i64, width: Builtin) -> Value {
        Value::Int { value, width }
    }

    pub fn i32(value: i32) -> Value {
        Value::Int { value: value as i64, width: Builtin::I32 }
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(data: ObjectData) -> Value {
        Value::Object(Rc::new(RefCell::new(data)))
    }

    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Int { width, .. } => width.name().to_string(),
            Value::Float(_) => "f64".to_string(),
            Value::Str(_) => "string".to_string(),
            Value::Char(_) => "char".to_string(),
            Value::Array(_) => "array".to_string(),
            Value::Object(o) => o.borrow().type_name.clone(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int { value, .. } => Some(*value as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int { value, .. } => write!(f, "{}", value),
            Value::Float(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "{}", s),
            Value::Char(c) => write!(f, "{}", c),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Object(o) => {
                let o = o.borrow();
                write!(f, "{}", o.type_name)?;
                if let Some(case) = &o.case {
                    write!(f, ".{}", case)?;
                }
                Ok(())
            }
        }
    }
}

/// Structural equality, including the fallback for user-defined classes and
/// structs without a user `==`: field-by-field comparison in declaration
/// order.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int { value: a, .. }, Value::Int { value: b, .. }) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int { value: a, .. }, Value::Float(b)) | (Value::Float(b), Value::Int { value: a, .. }) => {
                (*a as f64) == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                let a = a.borrow();
                let b = b.borrow();
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
            }
            (Value::Object(a), Value::Object(b)) => {
                let a = a.borrow();
                let b = b.borrow();
                if a.type_name != b.type_name || a.case != b.case {
                    return false;
                }
                let mut keys: Vec<&String> = a.fields.keys().collect();
                keys.sort();
                keys.iter().all(|k| a.fields.get(*k) == b.fields.get(*k))
            }
            (Value::Null, _) | (_, Value::Null) => false,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_array() {
        let v = Value::array(vec![Value::i32(1), Value::i32(2)]);
        assert_eq!(format!("{}", v), "[1, 2]");
    }

    #[test]
    fn structural_equality_on_objects_is_field_order_independent() {
        let mut a = ObjectData::new("Point");
        a.fields.insert("x".to_string(), Value::i32(1));
        a.fields.insert("y".to_string(), Value::i32(2));
        let mut b = ObjectData::new("Point");
        b.fields.insert("y".to_string(), Value::i32(2));
        b.fields.insert("x".to_string(), Value::i32(1));
        assert_eq!(Value::object(a), Value::object(b));
    }

    #[test]
    fn null_equals_only_null() {
        assert_eq!(Value::Null, Value::Null);
        assert_ne!(Value::Null, Value::i32(0));
    }
}
