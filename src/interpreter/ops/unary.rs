use crate::interpreter::errors::RuntimeError;
use crate::memory::value::Value;
use crate::parser::ast::{SourceLocation, UnOp};

/// Apply a value-level unary operator. `*` and `&` work on places and never
/// reach this function.
pub(crate) fn unary_op(op: UnOp, value: &Value, location: SourceLocation) -> Result<Value, RuntimeError> {
    let mismatch = || {
        RuntimeError::type_mismatch(
            format!("unary operator {:?} on {}", op, value.type_name()),
            location,
        )
    };

    match op {
        UnOp::Not => value
            .truthiness()
            .map(|b| Value::Bool(!b))
            .ok_or_else(mismatch),
        UnOp::Neg => match value {
            Value::Float(f) => Ok(Value::Float(-f)),
            Value::UInt(n) => Ok(Value::UInt(n.wrapping_neg())),
            Value::Long(n) => Ok(Value::Long(n.wrapping_neg())),
            Value::Bool(_) | Value::Char(_) | Value::Int(_) => {
                Ok(Value::Int((value.as_i64().unwrap_or(0) as i32).wrapping_neg()))
            }
            _ => Err(mismatch()),
        },
        UnOp::Plus => match value {
            Value::Bool(_) | Value::Char(_) => Ok(Value::Int(value.as_i64().unwrap_or(0) as i32)),
            v if v.is_numeric() => Ok(v.clone()),
            _ => Err(mismatch()),
        },
        UnOp::BitNot => match value {
            Value::UInt(n) => Ok(Value::UInt(!n)),
            Value::Long(n) => Ok(Value::Long(!n)),
            Value::Bool(_) | Value::Char(_) | Value::Int(_) => {
                Ok(Value::Int(!(value.as_i64().unwrap_or(0) as i32)))
            }
            _ => Err(mismatch()),
        },
        UnOp::Deref | UnOp::AddrOf => Err(RuntimeError::unsupported(
            "address operators are evaluated as places",
            location,
        )),
    }
}

/// `current + delta` for `++`/`--` on arithmetic values, keeping the operand's representation.
pub(crate) fn step_value(current: &Value, delta: i32, location: SourceLocation) -> Result<Value, RuntimeError> {
    match current {
        Value::Int(n) => Ok(Value::Int(n.wrapping_add(delta))),
        Value::UInt(n) => Ok(Value::UInt(n.wrapping_add_signed(delta))),
        Value::Long(n) => Ok(Value::Long(n.wrapping_add(delta as i64))),
        Value::Char(c) => Ok(Value::Char(c.wrapping_add(delta as i8))),
        Value::Bool(b) => Ok(Value::Int(*b as i32 + delta)),
        Value::Float(f) => Ok(Value::Float(f + delta as f64)),
        other => Err(RuntimeError::type_mismatch(
            format!("cannot increment a value of type {}", other.type_name()),
            location,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> SourceLocation {
        SourceLocation::new(1, 1)
    }

    #[test]
    fn test_negation_and_not() {
        assert_eq!(unary_op(UnOp::Neg, &Value::Char(5), loc()).unwrap(), Value::Int(-5));
        assert_eq!(unary_op(UnOp::Not, &Value::Int(0), loc()).unwrap(), Value::Bool(true));
        assert_eq!(unary_op(UnOp::BitNot, &Value::UInt(0), loc()).unwrap(), Value::UInt(u32::MAX));
        assert!(unary_op(UnOp::Neg, &Value::Str("x".into()), loc()).is_err());
    }

    #[test]
    fn test_step_value_wraps() {
        assert_eq!(step_value(&Value::UInt(0), -1, loc()).unwrap(), Value::UInt(u32::MAX));
        assert_eq!(step_value(&Value::Char(127), 1, loc()).unwrap(), Value::Char(-128));
        assert_eq!(step_value(&Value::Float(1.5), 1, loc()).unwrap(), Value::Float(2.5));
    }
}
