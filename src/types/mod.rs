// ABOUTME: Type environment & table — built-in registry and per-node resolved types

pub mod checker;
pub mod resolver;

use crate::ast::NodeId;
use std::collections::HashMap;
use std::fmt;

/// A built-in base type name, closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Void,
    Bool,
    Bit,
    Byte,
    Char,
    String,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F16,
    F32,
    F64,
}

impl Builtin {
    pub const ALL: &'static [Builtin] = &[
        Builtin::Void,
        Builtin::Bool,
        Builtin::Bit,
        Builtin::Byte,
        Builtin::Char,
        Builtin::String,
        Builtin::I8,
        Builtin::I16,
        Builtin::I32,
        Builtin::I64,
        Builtin::U8,
        Builtin::U16,
        Builtin::U32,
        Builtin::U64,
        Builtin::F16,
        Builtin::F32,
        Builtin::F64,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Void => "void",
            Builtin::Bool => "bool",
            Builtin::Bit => "bit",
            Builtin::Byte => "byte",
            Builtin::Char => "char",
            Builtin::String => "string",
            Builtin::I8 => "i8",
            Builtin::I16 => "i16",
            Builtin::I32 => "i32",
            Builtin::I64 => "i64",
            Builtin::U8 => "u8",
            Builtin::U16 => "u16",
            Builtin::U32 => "u32",
            Builtin::U64 => "u64",
            Builtin::F16 => "f16",
            Builtin::F32 => "f32",
            Builtin::F64 => "f64",
        }
    }

    pub fn from_name(name: &str) -> Option<Builtin> {
        Self::ALL.iter().copied().find(|b| b.name() == name)
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Builtin::I8
                | Builtin::I16
                | Builtin::I32
                | Builtin::I64
                | Builtin::U8
                | Builtin::U16
                | Builtin::U32
                | Builtin::U64
                | Builtin::Byte
                | Builtin::Bit
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, Builtin::F16 | Builtin::F32 | Builtin::F64)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_signed(self) -> bool {
        matches!(self, Builtin::I8 | Builtin::I16 | Builtin::I32 | Builtin::I64)
    }

    /// Inclusive range for integer types, as `(min, max)` in `i128` to avoid
    /// overflow while checking literal ranges.
    pub fn int_range(self) -> Option<(i128, i128)> {
        Some(match self {
            Builtin::I8 => (i8::MIN as i128, i8::MAX as i128),
            Builtin::I16 => (i16::MIN as i128, i16::MAX as i128),
            Builtin::I32 => (i32::MIN as i128, i32::MAX as i128),
            Builtin::I64 => (i64::MIN as i128, i64::MAX as i128),
            Builtin::U8 => (0, u8::MAX as i128),
            Builtin::U16 => (0, u16::MAX as i128),
            Builtin::U32 => (0, u32::MAX as i128),
            Builtin::U64 => (0, u64::MAX as i128),
            Builtin::Byte => (0, u8::MAX as i128),
            Builtin::Bit => (0, 1),
            _ => return None,
        })
    }
}

/// The canonical in-memory form of a type: `(base_kind, array_depth, nullable)`.
/// `base_kind` is either a built-in or a user-declared name. The sentinel
/// `Null` applies only to the null literal; `AnyArray` is `[]any`, the
/// universal array supertype.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BaseKind {
    Builtin(Builtin),
    User(String),
    /// The sentinel type of the `null` literal.
    Null,
    /// `any`, only meaningful as the element type of `[]any`.
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Type {
    pub base: BaseKind,
    pub array_depth: u32,
    pub nullable: bool,
}

impl Type {
    pub fn builtin(b: Builtin) -> Type {
        Type { base: BaseKind::Builtin(b), array_depth: 0, nullable: false }
    }

    pub fn user(name: impl Into<String>) -> Type {
        Type { base: BaseKind::User(name.into()), array_depth: 0, nullable: false }
    }

    pub fn null() -> Type {
        Type { base: BaseKind::Null, array_depth: 0, nullable: false }
    }

    pub fn any_array() -> Type {
        Type { base: BaseKind::Any, array_depth: 1, nullable: false }
    }

    pub fn nullable(mut self) -> Type {
        self.nullable = true;
        self
    }

    pub fn array(mut self) -> Type {
        self.array_depth += 1;
        self
    }

    pub fn is_array(&self) -> bool {
        self.array_depth > 0
    }

    pub fn is_any_array(&self) -> bool {
        matches!(self.base, BaseKind::Any) && self.array_depth >= 1
    }

    /// The element type after indexing once. Only meaningful when `is_array()`.
    pub fn element_type(&self) -> Type {
        Type { base: self.base.clone(), array_depth: self.array_depth.saturating_sub(1), nullable: false }
    }

    pub fn is_builtin(&self, b: Builtin) -> bool {
        self.array_depth == 0 && matches!(&self.base, BaseKind::Builtin(x) if *x == b)
    }

    pub fn is_numeric(&self) -> bool {
        self.array_depth == 0 && matches!(&self.base, BaseKind::Builtin(b) if b.is_numeric())
    }

    pub fn is_integer(&self) -> bool {
        self.array_depth == 0 && matches!(&self.base, BaseKind::Builtin(b) if b.is_integer())
    }

    pub fn is_float(&self) -> bool {
        self.array_depth == 0 && matches!(&self.base, BaseKind::Builtin(b) if b.is_float())
    }

    pub fn is_null(&self) -> bool {
        matches!(self.base, BaseKind::Null)
    }

    pub fn is_string(&self) -> bool {
        self.is_builtin(Builtin::String)
    }

    pub fn is_bool(&self) -> bool {
        self.is_builtin(Builtin::Bool)
    }

    pub fn user_name(&self) -> Option<&str> {
        match &self.base {
            BaseKind::User(n) => Some(n.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for _ in 0..self.array_depth {
            write!(f, "[]")?;
        }
        match &self.base {
            BaseKind::Builtin(b) => write!(f, "{}", b.name())?,
            BaseKind::User(n) => write!(f, "{}", n)?,
            BaseKind::Null => write!(f, "null")?,
            BaseKind::Any => write!(f, "any")?,
        }
        if self.nullable {
            write!(f, "?")?;
        }
        Ok(())
    }
}

/// Side table mapping expression nodes to their resolved type, written
/// exclusively by the type checker and read-only afterward.
#[derive(Debug, Default)]
pub struct TypeTable {
    types: HashMap<NodeId, Type>,
}

impl TypeTable {
    pub fn new() -> Self {
        TypeTable { types: HashMap::new() }
    }

    pub fn record(&mut self, id: NodeId, ty: Type) {
        self.types.insert(id, ty);
    }

    pub fn get(&self, id: NodeId) -> Option<&Type> {
        self.types.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_round_trips_by_name() {
        for b in Builtin::ALL {
            assert_eq!(Builtin::from_name(b.name()), Some(*b));
        }
        assert_eq!(Builtin::from_name("nope"), None);
    }

    #[test]
    fn display_matches_string_form() {
        let t = Type::user("Foo").array().nullable();
        assert_eq!(format!("{}", t), "[]Foo?");
    }

    #[test]
    fn any_array_is_universal_array_supertype() {
        let t = Type::any_array();
        assert!(t.is_any_array());
        assert_eq!(format!("{}", t), "[]any");
    }

    #[test]
    fn int_ranges_are_inclusive() {
        assert_eq!(Builtin::I8.int_range(), Some((-128, 127)));
        assert_eq!(Builtin::Bit.int_range(), Some((0, 1)));
        assert_eq!(Builtin::F64.int_range(), None);
    }
}
