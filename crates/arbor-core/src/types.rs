//! Static types, compile-time constants and declaration instances.

use crate::naming::{Word, resolve};
use crate::position::Position;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// A resolved static type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Type {
    Void,
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
    /// Type of the `null` literal.
    Null,
    /// A class type, by qualified name.
    Class(Arc<str>),
    Array(Arc<Type>),
    /// Marker substituted after a reported error so that the fault does
    /// not cascade into further diagnostics.
    Error,
}

impl Type {
    pub fn class(name: impl Into<Arc<str>>) -> Self {
        Type::Class(name.into())
    }

    pub fn string() -> Self {
        Type::class("String")
    }

    pub fn object() -> Self {
        Type::class("Object")
    }

    pub fn array_of(element: Type) -> Self {
        Type::Array(Arc::new(element))
    }

    /// Maps a primitive keyword (`int`, `boolean`, ...) to its type.
    pub fn primitive(name: &str) -> Option<Type> {
        Some(match name {
            "void" => Type::Void,
            "boolean" => Type::Boolean,
            "byte" => Type::Byte,
            "short" => Type::Short,
            "char" => Type::Char,
            "int" => Type::Int,
            "long" => Type::Long,
            "float" => Type::Float,
            "double" => Type::Double,
            _ => return None,
        })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, Type::Boolean)
    }

    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            Type::Byte | Type::Short | Type::Char | Type::Int | Type::Long
        )
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integral() || matches!(self, Type::Float | Type::Double)
    }

    /// `byte`, `short` and `char`: the targets of constant narrowing.
    pub fn is_narrow_integral(&self) -> bool {
        matches!(self, Type::Byte | Type::Short | Type::Char)
    }

    pub fn is_primitive(&self) -> bool {
        self.is_numeric() || self.is_boolean()
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Type::Class(_) | Type::Array(_) | Type::Null)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Type::Class(name) if &**name == "String")
    }

    pub fn element(&self) -> Option<&Type> {
        match self {
            Type::Array(element) => Some(element),
            _ => None,
        }
    }

    /// Widening primitive conversion, identity excluded.
    pub fn widens_to(&self, to: &Type) -> bool {
        use Type::*;
        matches!(
            (self, to),
            (Byte, Short | Int | Long | Float | Double)
                | (Short | Char, Int | Long | Float | Double)
                | (Int, Long | Float | Double)
                | (Long, Float | Double)
                | (Float, Double)
        )
    }

    /// Whether a value of this type is assignable to `to` without an
    /// explicit cast. Class subtyping beyond `Object` is left to the
    /// language's type system.
    pub fn is_implicit_cast_valid(&self, to: &Type) -> bool {
        if self.is_error() || to.is_error() || self == to {
            return true;
        }
        match (self, to) {
            (Type::Null, to) => to.is_reference() && !matches!(to, Type::Null),
            (Type::Class(_) | Type::Array(_), Type::Class(name)) => &**name == "Object",
            (Type::Array(a), Type::Array(b)) => {
                a.is_reference() && b.is_reference() && a.is_implicit_cast_valid(b)
            }
            (from, to) => from.widens_to(to),
        }
    }

    /// Whether an explicit cast from this type to `to` can succeed.
    pub fn is_cast_valid(&self, to: &Type) -> bool {
        if self.is_error() || to.is_error() || self == to {
            return true;
        }
        (self.is_numeric() && to.is_numeric()) || (self.is_reference() && to.is_reference())
    }

    /// Whether `value` is representable in this type without loss.
    pub fn numeric_conversion_valid(&self, value: &ConstValue) -> bool {
        let Some(v) = value.as_integral() else {
            return false;
        };
        match self {
            Type::Byte => i8::try_from(v).is_ok(),
            Type::Short => i16::try_from(v).is_ok(),
            Type::Char => u16::try_from(v).is_ok(),
            Type::Int => i32::try_from(v).is_ok(),
            Type::Long => true,
            _ => false,
        }
    }

    /// Unary numeric promotion.
    pub fn unary_promotion(&self) -> Option<Type> {
        match self {
            Type::Byte | Type::Short | Type::Char | Type::Int => Some(Type::Int),
            Type::Long | Type::Float | Type::Double => Some(self.clone()),
            _ => None,
        }
    }

    /// Binary numeric promotion.
    pub fn binary_promotion(&self, other: &Type) -> Option<Type> {
        if !self.is_numeric() || !other.is_numeric() {
            return None;
        }
        let promoted = if matches!(self, Type::Double) || matches!(other, Type::Double) {
            Type::Double
        } else if matches!(self, Type::Float) || matches!(other, Type::Float) {
            Type::Float
        } else if matches!(self, Type::Long) || matches!(other, Type::Long) {
            Type::Long
        } else {
            Type::Int
        };
        Some(promoted)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => f.write_str("void"),
            Type::Boolean => f.write_str("boolean"),
            Type::Byte => f.write_str("byte"),
            Type::Short => f.write_str("short"),
            Type::Char => f.write_str("char"),
            Type::Int => f.write_str("int"),
            Type::Long => f.write_str("long"),
            Type::Float => f.write_str("float"),
            Type::Double => f.write_str("double"),
            Type::Null => f.write_str("null"),
            Type::Class(name) => f.write_str(name),
            Type::Array(element) => write!(f, "{element}[]"),
            Type::Error => f.write_str("<error>"),
        }
    }
}

/// A compile-time constant value.
///
/// `Int` holds every value of type `int` or narrower (already truncated to
/// its type's range); `Long` is kept apart so that folding knows which
/// width to wrap at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConstValue {
    Int(i64),
    Long(i64),
    Double(f64),
    Bool(bool),
    Str(Arc<str>),
}

impl ConstValue {
    pub fn as_integral(&self) -> Option<i64> {
        match self {
            ConstValue::Int(v) | ConstValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            ConstValue::Int(v) | ConstValue::Long(v) => Some(*v as f64),
            ConstValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Applies a casting conversion to `to`, or `None` when the result is
    /// not a constant of that type.
    pub fn cast_to(&self, to: &Type) -> Option<ConstValue> {
        let integral = || match self {
            ConstValue::Int(v) | ConstValue::Long(v) => Some(*v),
            ConstValue::Double(v) => Some(*v as i64),
            _ => None,
        };
        match to {
            Type::Byte => integral().map(|v| ConstValue::Int(i64::from(v as i8))),
            Type::Short => integral().map(|v| ConstValue::Int(i64::from(v as i16))),
            Type::Char => integral().map(|v| ConstValue::Int(i64::from(v as u16))),
            Type::Int => match self {
                ConstValue::Double(v) => Some(ConstValue::Int(i64::from(*v as i32))),
                _ => integral().map(|v| ConstValue::Int(i64::from(v as i32))),
            },
            Type::Long => integral().map(ConstValue::Long),
            Type::Float | Type::Double => self.as_double().map(ConstValue::Double),
            Type::Boolean => match self {
                ConstValue::Bool(_) => Some(self.clone()),
                _ => None,
            },
            t if t.is_string() => match self {
                ConstValue::Str(_) => Some(self.clone()),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Int(v) => write!(f, "{v}"),
            ConstValue::Long(v) => write!(f, "{v}L"),
            ConstValue::Double(v) => write!(f, "{v:?}"),
            ConstValue::Bool(v) => write!(f, "{v}"),
            ConstValue::Str(s) => write!(f, "{s:?}"),
        }
    }
}

/// Result of constant checking for an expression or declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Constant {
    NotConstant,
    Value(ConstValue),
}

impl Constant {
    pub fn value(&self) -> Option<&ConstValue> {
        match self {
            Constant::Value(v) => Some(v),
            Constant::NotConstant => None,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::NotConstant => f.write_str("not-constant"),
            Constant::Value(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VarKind {
    Field,
    Local,
    Formal,
}

/// The shared type object of a field, local or formal.
///
/// The declaration node and every reference to it hold the same instance.
/// Its type and constant are written once by the passes responsible for
/// them; later writes of an equal value are accepted so that retried
/// passes converge.
#[derive(Debug)]
pub struct VarInstance {
    name: Word,
    kind: VarKind,
    is_final: bool,
    position: Position,
    ty: OnceLock<Type>,
    constant: OnceLock<Constant>,
}

impl VarInstance {
    pub fn new(name: Word, kind: VarKind, is_final: bool, position: Position) -> Self {
        Self {
            name,
            kind,
            is_final,
            position,
            ty: OnceLock::new(),
            constant: OnceLock::new(),
        }
    }

    pub fn name(&self) -> Word {
        self.name
    }

    pub fn name_str(&self) -> &'static str {
        resolve(self.name)
    }

    pub fn kind(&self) -> VarKind {
        self.kind
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn ty(&self) -> Option<&Type> {
        self.ty.get()
    }

    /// Sets the declared type. Returns `false` if a different type was
    /// already recorded.
    pub fn set_type(&self, ty: Type) -> bool {
        let stored = self.ty.get_or_init(|| ty.clone());
        *stored == ty
    }

    pub fn constant(&self) -> Option<&Constant> {
        self.constant.get()
    }

    /// Sets the constant state. Returns `false` if a different state was
    /// already recorded.
    pub fn set_constant(&self, constant: Constant) -> bool {
        let stored = self.constant.get_or_init(|| constant.clone());
        *stored == constant
    }
}

impl PartialEq for VarInstance {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.kind == other.kind
            && self.is_final == other.is_final
            && self.ty.get() == other.ty.get()
            && self.constant.get() == other.constant.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::intern;
    use rstest::rstest;

    #[rstest]
    #[case(Type::Byte, 127, true)]
    #[case(Type::Byte, 128, false)]
    #[case(Type::Byte, -128, true)]
    #[case(Type::Short, 32_767, true)]
    #[case(Type::Short, 40_000, false)]
    #[case(Type::Char, 65_535, true)]
    #[case(Type::Char, -1, false)]
    #[case(Type::Int, 1 << 40, false)]
    #[case(Type::Long, 1 << 40, true)]
    fn numeric_conversion_respects_ranges(#[case] ty: Type, #[case] value: i64, #[case] ok: bool) {
        assert_eq!(ty.numeric_conversion_valid(&ConstValue::Int(value)), ok);
    }

    #[rstest]
    #[case(Type::Byte, Type::Int, true)]
    #[case(Type::Char, Type::Short, false)]
    #[case(Type::Int, Type::Byte, false)]
    #[case(Type::Long, Type::Double, true)]
    #[case(Type::Null, Type::string(), true)]
    #[case(Type::string(), Type::object(), true)]
    #[case(Type::Boolean, Type::Int, false)]
    #[case(Type::Error, Type::Int, true)]
    fn implicit_casts(#[case] from: Type, #[case] to: Type, #[case] ok: bool) {
        assert_eq!(from.is_implicit_cast_valid(&to), ok);
    }

    #[test]
    fn cast_constants_truncate() {
        assert_eq!(ConstValue::Int(300).cast_to(&Type::Byte), Some(ConstValue::Int(44)));
        assert_eq!(ConstValue::Int(-1).cast_to(&Type::Char), Some(ConstValue::Int(65_535)));
        assert_eq!(ConstValue::Int(7).cast_to(&Type::Long), Some(ConstValue::Long(7)));
        assert_eq!(ConstValue::Double(3.9).cast_to(&Type::Int), Some(ConstValue::Int(3)));
        assert_eq!(ConstValue::Bool(true).cast_to(&Type::Int), None);
    }

    #[test]
    fn var_instance_cells_are_set_once() {
        let var = VarInstance::new(intern("x"), VarKind::Local, true, Position::default());
        assert!(var.set_type(Type::Int));
        assert!(var.set_type(Type::Int));
        assert!(!var.set_type(Type::Long));
        assert_eq!(var.ty(), Some(&Type::Int));

        assert!(var.set_constant(Constant::Value(ConstValue::Int(1))));
        assert!(!var.set_constant(Constant::NotConstant));
        assert_eq!(var.constant(), Some(&Constant::Value(ConstValue::Int(1))));
    }

    #[test]
    fn display_types() {
        assert_eq!(Type::array_of(Type::Byte).to_string(), "byte[]");
        assert_eq!(Type::string().to_string(), "String");
    }
}
