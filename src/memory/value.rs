//! Runtime value representation
//!
//! This module defines the [`Value`] enum, which represents all possible runtime values
//! in the sketch interpreter. Values are tagged; every operator checks the tags
//! of its operands and reports a type mismatch instead of guessing.
//!
//! # Value Types
//!
//! - [`Value::Int`]: 32-bit signed integer (also holds promoted `byte`, `short`, `word`)
//! - [`Value::UInt`]: 32-bit unsigned integer (`unsigned long`, `millis()`)
//! - [`Value::Long`]: 64-bit signed integer (`long long`, `int64_t`)
//! - [`Value::Float`]: floating point (`float` values are kept at `f32` precision)
//! - [`Value::Char`]: 8-bit signed character
//! - [`Value::Str`]: Arduino `String` or string literal
//! - [`Value::Pointer`]: a [`Place`] inside the variable arenas
//! - [`Value::Object`]: an instance of a library class such as `Servo`

use super::environment::Place;
use crate::commands::Primitive;
use serde::{Deserialize, Serialize};

/// Library object handle: class name plus the variable it was declared as
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub class: String,
    pub name: String,
}

/// Runtime values in the interpreter
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Void,
    Null,
    Bool(bool),
    Char(i8),
    Int(i32),
    UInt(u32),
    Long(i64),
    Float(f64),
    Str(String),
    Array(Vec<Value>),
    Struct {
        name: String,
        fields: Vec<(String, Value)>,
    },
    Pointer(Place),
    Function(String),
    Object(ObjectRef),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Void => "void",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::Int(_) => "int",
            Value::UInt(_) => "unsigned long",
            Value::Long(_) => "long long",
            Value::Float(_) => "float",
            Value::Str(_) => "String",
            Value::Array(_) => "array",
            Value::Struct { .. } => "struct",
            Value::Pointer(_) => "pointer",
            Value::Function(_) => "function",
            Value::Object(_) => "object",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::Bool(_)
                | Value::Char(_)
                | Value::Int(_)
                | Value::UInt(_)
                | Value::Long(_)
                | Value::Float(_)
        )
    }

    /// Integer view of a numeric value; floats truncate toward zero.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(*b as i64),
            Value::Char(c) => Some(*c as i64),
            Value::Int(n) => Some(*n as i64),
            Value::UInt(n) => Some(*n as i64),
            Value::Long(n) => Some(*n),
            Value::Float(f) => Some(f.trunc() as i64),
            Value::Null => Some(0),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            other => other.as_i64().map(|n| n as f64),
        }
    }

    /// Condition value as C would test it. `None` for values that have no
    /// truth value (structs, `void`).
    pub fn truthiness(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Char(c) => Some(*c != 0),
            Value::Int(n) => Some(*n != 0),
            Value::UInt(n) => Some(*n != 0),
            Value::Long(n) => Some(*n != 0),
            Value::Float(f) => Some(*f != 0.0),
            Value::Null => Some(false),
            Value::Pointer(_)
            | Value::Str(_)
            | Value::Array(_)
            | Value::Function(_)
            | Value::Object(_) => Some(true),
            Value::Void | Value::Struct { .. } => None,
        }
    }

    /// Text as Arduino's `Print` would produce it.
    pub fn render(&self) -> String {
        match self {
            Value::Void => String::new(),
            Value::Null => "0".to_string(),
            Value::Bool(b) => (*b as u8).to_string(),
            Value::Char(c) => ((*c as u8) as char).to_string(),
            Value::Int(n) => n.to_string(),
            Value::UInt(n) => n.to_string(),
            Value::Long(n) => n.to_string(),
            Value::Float(f) => format_float(*f, 2),
            Value::Str(s) => s.clone(),
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().map(Value::render).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Struct { name, fields } => {
                let parts: Vec<String> = fields
                    .iter()
                    .map(|(n, v)| format!("{}: {}", n, v.render()))
                    .collect();
                format!("{} {{ {} }}", name, parts.join(", "))
            }
            Value::Pointer(_) => "<pointer>".to_string(),
            Value::Function(name) => name.clone(),
            Value::Object(obj) => obj.name.clone(),
        }
    }

    /// Command payload form. Pointers never leave the interpreter as places.
    pub fn to_primitive(&self) -> Primitive {
        match self {
            Value::Bool(b) => Primitive::Bool(*b),
            Value::Char(_) | Value::Int(_) | Value::UInt(_) | Value::Long(_) | Value::Null => {
                Primitive::Int(self.as_i64().unwrap_or(0))
            }
            Value::Float(f) => Primitive::Float(*f),
            Value::Str(s) => Primitive::Text(s.clone()),
            Value::Array(items) => Primitive::List(items.iter().map(Value::to_primitive).collect()),
            other => Primitive::Text(other.render()),
        }
    }

    /// Runtime value for a host-supplied primitive.
    pub fn from_primitive(primitive: &Primitive) -> Value {
        match primitive {
            Primitive::Bool(b) => Value::Bool(*b),
            Primitive::Int(n) => match i32::try_from(*n) {
                Ok(n) => Value::Int(n),
                Err(_) => Value::Long(*n),
            },
            Primitive::Float(f) => Value::Float(*f),
            Primitive::Text(s) => Value::Str(s.clone()),
            Primitive::List(items) => Value::Array(items.iter().map(Value::from_primitive).collect()),
        }
    }
}

/// Fixed-point rendering used by `print` for floating point values.
pub fn format_float(value: f64, decimals: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return "inf".to_string();
    }
    format!("{:.*}", decimals, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_matches_print() {
        assert_eq!(Value::Float(1.23456).render(), "1.23");
        assert_eq!(Value::Char(65).render(), "A");
        assert_eq!(Value::Bool(true).render(), "1");
        assert_eq!(Value::UInt(4_000_000_000).render(), "4000000000");
    }

    #[test]
    fn test_truthiness() {
        assert_eq!(Value::Int(0).truthiness(), Some(false));
        assert_eq!(Value::Float(0.5).truthiness(), Some(true));
        assert_eq!(Value::Null.truthiness(), Some(false));
        assert_eq!(Value::Void.truthiness(), None);
    }

    #[test]
    fn test_primitive_conversion() {
        assert_eq!(Value::Char(7).to_primitive(), Primitive::Int(7));
        assert_eq!(
            Value::Array(vec![Value::Int(1), Value::Float(0.5)]).to_primitive(),
            Primitive::List(vec![Primitive::Int(1), Primitive::Float(0.5)])
        );
        assert_eq!(Value::from_primitive(&Primitive::Int(1 << 40)), Value::Long(1 << 40));
    }
}
