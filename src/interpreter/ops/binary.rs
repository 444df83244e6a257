//! Binary operators
//!
//! Operands go through the usual arithmetic conversions: `bool` and `char`
//! promote to `int`, then the wider of `int < unsigned long < long long <
//! double` wins. Integer arithmetic wraps the way the hardware does.
//!
//! `pointer ± n` needs the array the pointer walks and is evaluated by the
//! interpreter before operands reach [`binary_op`].

use crate::interpreter::errors::RuntimeError;
use crate::memory::value::Value;
use crate::parser::ast::{BinOp, SourceLocation};
use std::cmp::Ordering;

/// Common representation after promotion
#[derive(Debug, Clone, Copy)]
enum Promoted {
    Int(i32, i32),
    UInt(u32, u32),
    Long(i64, i64),
    Float(f64, f64),
}

fn rank(value: &Value) -> Option<u8> {
    match value {
        Value::Bool(_) | Value::Char(_) | Value::Int(_) => Some(0),
        Value::UInt(_) => Some(1),
        Value::Long(_) => Some(2),
        Value::Float(_) => Some(3),
        _ => None,
    }
}

fn promote(left: &Value, right: &Value) -> Option<Promoted> {
    let target = rank(left)?.max(rank(right)?);
    let (a, b) = (left.as_i64()?, right.as_i64()?);
    Some(match target {
        0 => Promoted::Int(a as i32, b as i32),
        1 => Promoted::UInt(a as u32, b as u32),
        2 => Promoted::Long(a, b),
        _ => Promoted::Float(left.as_f64()?, right.as_f64()?),
    })
}

fn compare(op: BinOp, ordering: Option<Ordering>) -> Value {
    let result = match ordering {
        Some(ord) => match op {
            BinOp::Eq => ord == Ordering::Equal,
            BinOp::Ne => ord != Ordering::Equal,
            BinOp::Lt => ord == Ordering::Less,
            BinOp::Le => ord != Ordering::Greater,
            BinOp::Gt => ord == Ordering::Greater,
            BinOp::Ge => ord != Ordering::Less,
            _ => false,
        },
        // NaN compares unequal to everything
        None => op == BinOp::Ne,
    };
    Value::Bool(result)
}

fn is_comparison(op: BinOp) -> bool {
    matches!(
        op,
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
    )
}

macro_rules! integer_arith {
    ($op:expr, $a:expr, $b:expr, $wrap:path, $location:expr) => {{
        let (a, b) = ($a, $b);
        match $op {
            BinOp::Add => Ok($wrap(a.wrapping_add(b))),
            BinOp::Sub => Ok($wrap(a.wrapping_sub(b))),
            BinOp::Mul => Ok($wrap(a.wrapping_mul(b))),
            BinOp::Div | BinOp::Mod if b == 0 => Err(RuntimeError::DivisionByZero {
                operation: if $op == BinOp::Div { "Division" } else { "Modulo" }.to_string(),
                location: $location,
            }),
            BinOp::Div => Ok($wrap(a.wrapping_div(b))),
            BinOp::Mod => Ok($wrap(a.wrapping_rem(b))),
            BinOp::BitAnd => Ok($wrap(a & b)),
            BinOp::BitOr => Ok($wrap(a | b)),
            BinOp::BitXor => Ok($wrap(a ^ b)),
            op => Ok(compare(op, Some(a.cmp(&b)))),
        }
    }};
}

/// Apply `op` to two evaluated operands.
pub(crate) fn binary_op(
    op: BinOp,
    left: &Value,
    right: &Value,
    location: SourceLocation,
) -> Result<Value, RuntimeError> {
    match (left, right) {
        (Value::Pointer(_), _) | (_, Value::Pointer(_)) | (Value::Null, _) | (_, Value::Null) => {
            return pointer_op(op, left, right, location)
        }
        (Value::Str(_), _) | (_, Value::Str(_)) => return string_op(op, left, right, location),
        _ => {}
    }

    if matches!(op, BinOp::Shl | BinOp::Shr) {
        return shift_op(op, left, right, location);
    }

    let Some(promoted) = promote(left, right) else {
        return Err(RuntimeError::type_mismatch(
            format!(
                "operator {} on {} and {}",
                op.symbol(),
                left.type_name(),
                right.type_name()
            ),
            location,
        ));
    };

    match promoted {
        Promoted::Int(a, b) => integer_arith!(op, a, b, Value::Int, location),
        Promoted::UInt(a, b) => integer_arith!(op, a, b, Value::UInt, location),
        Promoted::Long(a, b) => integer_arith!(op, a, b, Value::Long, location),
        Promoted::Float(a, b) => match op {
            BinOp::Add => Ok(Value::Float(a + b)),
            BinOp::Sub => Ok(Value::Float(a - b)),
            BinOp::Mul => Ok(Value::Float(a * b)),
            BinOp::Div => Ok(Value::Float(a / b)),
            op if is_comparison(op) => Ok(compare(op, a.partial_cmp(&b))),
            op => Err(RuntimeError::type_mismatch(
                format!("operator {} on floating point operands", op.symbol()),
                location,
            )),
        },
    }
}

/// Shifts take the type of the promoted left operand.
fn shift_op(
    op: BinOp,
    left: &Value,
    right: &Value,
    location: SourceLocation,
) -> Result<Value, RuntimeError> {
    let amount = match right {
        Value::Float(_) => None,
        other => other.as_i64(),
    };
    let (Some(amount), Some(_)) = (amount, rank(left).filter(|r| *r < 3)) else {
        return Err(RuntimeError::type_mismatch(
            format!("operator {} needs integer operands", op.symbol()),
            location,
        ));
    };
    let amount = amount as u32;
    let left_bits = left.as_i64().unwrap_or(0);
    let shl = op == BinOp::Shl;

    Ok(match left {
        Value::UInt(n) => Value::UInt(if shl { n.wrapping_shl(amount) } else { n.wrapping_shr(amount) }),
        Value::Long(n) => Value::Long(if shl { n.wrapping_shl(amount) } else { n.wrapping_shr(amount) }),
        _ => {
            let n = left_bits as i32;
            Value::Int(if shl { n.wrapping_shl(amount) } else { n.wrapping_shr(amount) })
        }
    })
}

fn string_op(
    op: BinOp,
    left: &Value,
    right: &Value,
    location: SourceLocation,
) -> Result<Value, RuntimeError> {
    match (op, left, right) {
        (BinOp::Add, l, r) if concatenable(l) && concatenable(r) => {
            Ok(Value::Str(format!("{}{}", l.render(), r.render())))
        }
        (op, Value::Str(a), Value::Str(b)) if is_comparison(op) => Ok(compare(op, Some(a.cmp(b)))),
        _ => Err(RuntimeError::type_mismatch(
            format!(
                "operator {} on {} and {}",
                op.symbol(),
                left.type_name(),
                right.type_name()
            ),
            location,
        )),
    }
}

fn concatenable(value: &Value) -> bool {
    matches!(value, Value::Str(_)) || value.is_numeric()
}

/// Pointer distance, equality and ordering.
fn pointer_op(
    op: BinOp,
    left: &Value,
    right: &Value,
    location: SourceLocation,
) -> Result<Value, RuntimeError> {
    let mismatch = || {
        RuntimeError::type_mismatch(
            format!(
                "operator {} on {} and {}",
                op.symbol(),
                left.type_name(),
                right.type_name()
            ),
            location,
        )
    };
    let is_null = |v: &Value| match v {
        Value::Null => true,
        Value::Float(_) => false,
        v => v.is_numeric() && v.as_i64() == Some(0),
    };

    match (op, left, right) {
        (BinOp::Sub, Value::Pointer(a), Value::Pointer(b)) if a.same_array(b) => {
            let (from, to) = (a.last_index().unwrap_or(0), b.last_index().unwrap_or(0));
            let distance = (from as i64).wrapping_sub(to as i64);
            Ok(Value::Int(distance as i32))
        }
        (BinOp::Eq | BinOp::Ne, Value::Pointer(a), Value::Pointer(b)) => {
            Ok(compare(op, Some(if a == b { Ordering::Equal } else { Ordering::Less })))
        }
        (BinOp::Eq | BinOp::Ne, a, b) if is_null(a) && is_null(b) => {
            Ok(compare(op, Some(Ordering::Equal)))
        }
        (BinOp::Eq | BinOp::Ne, a, b) if is_null(a) || is_null(b) => {
            Ok(compare(op, Some(Ordering::Less)))
        }
        (op, Value::Pointer(a), Value::Pointer(b)) if is_comparison(op) && a.same_array(b) => {
            Ok(compare(op, Some(a.last_index().cmp(&b.last_index()))))
        }
        _ => Err(mismatch()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{CellId, Place};

    fn loc() -> SourceLocation {
        SourceLocation::new(1, 1)
    }

    #[test]
    fn test_promotion() {
        assert_eq!(
            binary_op(BinOp::Add, &Value::Int(1), &Value::Float(0.5), loc()).unwrap(),
            Value::Float(1.5)
        );
        assert_eq!(
            binary_op(BinOp::Sub, &Value::UInt(0), &Value::Int(1), loc()).unwrap(),
            Value::UInt(u32::MAX)
        );
        assert_eq!(
            binary_op(BinOp::Mul, &Value::Char(3), &Value::Bool(true), loc()).unwrap(),
            Value::Int(3)
        );
    }

    #[test]
    fn test_integer_division() {
        assert_eq!(
            binary_op(BinOp::Div, &Value::Int(-7), &Value::Int(2), loc()).unwrap(),
            Value::Int(-3)
        );
        assert!(matches!(
            binary_op(BinOp::Mod, &Value::Int(1), &Value::Int(0), loc()),
            Err(RuntimeError::DivisionByZero { .. })
        ));
        assert_eq!(
            binary_op(BinOp::Div, &Value::Float(1.0), &Value::Int(0), loc()).unwrap(),
            Value::Float(f64::INFINITY)
        );
    }

    #[test]
    fn test_int_overflow_wraps() {
        assert_eq!(
            binary_op(BinOp::Add, &Value::Int(i32::MAX), &Value::Int(1), loc()).unwrap(),
            Value::Int(i32::MIN)
        );
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            binary_op(BinOp::Add, &Value::Str("t=".into()), &Value::Int(4), loc()).unwrap(),
            Value::Str("t=4".into())
        );
        assert_eq!(
            binary_op(BinOp::Lt, &Value::Str("a".into()), &Value::Str("b".into()), loc()).unwrap(),
            Value::Bool(true)
        );
        assert!(binary_op(BinOp::Eq, &Value::Str("1".into()), &Value::Int(1), loc()).is_err());
    }

    #[test]
    fn test_pointer_arithmetic() {
        let base = Place::of(CellId::Global(0)).index(1);
        let moved = base.offset(2).unwrap();
        assert_eq!(moved.last_index(), Some(3));
        assert_eq!(
            binary_op(BinOp::Sub, &Value::Pointer(moved), &Value::Pointer(base.clone()), loc()).unwrap(),
            Value::Int(2)
        );
        assert_eq!(
            binary_op(BinOp::Eq, &Value::Pointer(base), &Value::Null, loc()).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_shift_uses_left_type() {
        assert_eq!(
            binary_op(BinOp::Shl, &Value::UInt(1), &Value::Int(31), loc()).unwrap(),
            Value::UInt(1 << 31)
        );
        assert!(binary_op(BinOp::Shl, &Value::Float(1.0), &Value::Int(1), loc()).is_err());
    }
}
