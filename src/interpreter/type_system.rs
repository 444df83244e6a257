//! Conversions, default values and static types
//!
//! - [`convert`]: the single place where a value is coerced to a declared
//!   type (declarations, assignment, parameters, return values, casts);
//!   the interpreter calls it through [`Interpreter::convert_value`], which
//!   also lets a `char` array stand in for a `String`
//! - [`default_value`]: the value of a declared-but-uninitialized variable
//! - [`sizeof_type`]: AVR sizes (`int` is 4 bytes here, matching 32-bit boards)
//! - [`Interpreter::static_type`]: the type of an expression without
//!   evaluating it, used by `sizeof(expr)`

use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::RuntimeError;
use crate::interpreter::machine::ExecutionContext;
use crate::memory::environment::StructTable;
use crate::memory::value::Value;
use crate::memory::{PathStep, Place};
use crate::parser::ast::{BaseType, BinOp, NodeId, NodeKind, SourceLocation, Type, UnOp};

/// Wrap an integer into the representation of an integer base type.
fn wrap_integer(n: i64, base: &BaseType) -> Value {
    match base {
        BaseType::Bool => Value::Bool(n != 0),
        BaseType::Char => Value::Char(n as i8),
        BaseType::UChar => Value::Int(n as u8 as i32),
        BaseType::Short => Value::Int(n as i16 as i32),
        BaseType::UShort => Value::Int(n as u16 as i32),
        BaseType::UInt => Value::UInt(n as u32),
        BaseType::LongLong => Value::Long(n),
        _ => Value::Int(n as i32),
    }
}

/// Coerce `value` to `ty`.
pub fn convert(
    value: Value,
    ty: &Type,
    structs: &StructTable,
    location: SourceLocation,
) -> Result<Value, RuntimeError> {
    if ty.is_array() {
        return convert_array(value, ty, structs, location);
    }
    if ty.pointer_depth > 0 {
        return convert_pointer(value, ty, location);
    }

    let mismatch = |value: &Value| {
        RuntimeError::type_mismatch(
            format!("cannot convert {} to {:?}", value.type_name(), ty.base),
            location,
        )
    };

    match &ty.base {
        BaseType::Void => Ok(Value::Void),
        base if base.is_integer() => match &value {
            Value::Float(f) => Ok(wrap_integer(f.trunc() as i64, base)),
            v if v.is_numeric() => Ok(wrap_integer(v.as_i64().unwrap_or(0), base)),
            v => Err(mismatch(v)),
        },
        BaseType::Float => match value.as_f64() {
            Some(f) if value.is_numeric() => Ok(Value::Float(f as f32 as f64)),
            _ => Err(mismatch(&value)),
        },
        BaseType::Double => match value.as_f64() {
            Some(f) if value.is_numeric() => Ok(Value::Float(f)),
            _ => Err(mismatch(&value)),
        },
        BaseType::String => match value {
            Value::Str(s) => Ok(Value::Str(s)),
            v if v.is_numeric() => Ok(Value::Str(v.render())),
            v => Err(mismatch(&v)),
        },
        BaseType::Struct(name) => convert_struct(value, name, structs, location),
        BaseType::Class(class) => match value {
            Value::Object(obj) if &obj.class == class => Ok(Value::Object(obj)),
            v => Err(mismatch(&v)),
        },
        _ => Err(mismatch(&value)),
    }
}

fn convert_pointer(value: Value, ty: &Type, location: SourceLocation) -> Result<Value, RuntimeError> {
    match value {
        Value::Pointer(place) => Ok(Value::Pointer(place)),
        Value::Null => Ok(Value::Null),
        Value::Str(s) if ty.base == BaseType::Char && ty.pointer_depth == 1 => Ok(Value::Str(s)),
        ref v if v.is_numeric() && !matches!(v, Value::Float(_)) && v.as_i64() == Some(0) => {
            Ok(Value::Null)
        }
        v => Err(RuntimeError::type_mismatch(
            format!("cannot convert {} to a pointer", v.type_name()),
            location,
        )),
    }
}

fn convert_array(
    value: Value,
    ty: &Type,
    structs: &StructTable,
    location: SourceLocation,
) -> Result<Value, RuntimeError> {
    let elem = ty.element_type();
    let declared = ty.array_dims.first().copied().flatten();

    let mut items = match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| convert(item, &elem, structs, location))
            .collect::<Result<Vec<_>, _>>()?,
        Value::Str(s) if elem.base == BaseType::Char && !elem.is_array() && elem.pointer_depth == 0 => {
            let mut bytes: Vec<Value> = s.bytes().map(|b| Value::Char(b as i8)).collect();
            bytes.push(Value::Char(0));
            bytes
        }
        v => {
            return Err(RuntimeError::type_mismatch(
                format!("cannot initialize an array from {}", v.type_name()),
                location,
            ))
        }
    };

    if let Some(size) = declared {
        if items.len() > size {
            return Err(RuntimeError::type_mismatch(
                format!("too many initializers for array of size {}", size),
                location,
            ));
        }
        while items.len() < size {
            items.push(default_value(&elem, structs));
        }
    }
    Ok(Value::Array(items))
}

fn convert_struct(
    value: Value,
    name: &str,
    structs: &StructTable,
    location: SourceLocation,
) -> Result<Value, RuntimeError> {
    let Some(layout) = structs.get(name) else {
        return Err(RuntimeError::type_mismatch(
            format!("unknown struct '{}'", name),
            location,
        ));
    };

    match value {
        Value::Struct { name: actual, fields } if actual == name => Ok(Value::Struct {
            name: actual,
            fields,
        }),
        Value::Array(items) => {
            if items.len() > layout.len() {
                return Err(RuntimeError::type_mismatch(
                    format!("too many initializers for struct {}", name),
                    location,
                ));
            }
            let mut items = items.into_iter();
            let mut fields = Vec::with_capacity(layout.len());
            for field in layout {
                let value = match items.next() {
                    Some(item) => convert(item, &field.field_type, structs, location)?,
                    None => default_value(&field.field_type, structs),
                };
                fields.push((field.name.clone(), value));
            }
            Ok(Value::Struct {
                name: name.to_string(),
                fields,
            })
        }
        v => Err(RuntimeError::type_mismatch(
            format!("cannot convert {} to struct {}", v.type_name(), name),
            location,
        )),
    }
}

/// Value of a variable declared without an initializer.
pub fn default_value(ty: &Type, structs: &StructTable) -> Value {
    if let Some(dim) = ty.array_dims.first() {
        let elem = ty.element_type();
        let size = dim.unwrap_or(0);
        return Value::Array((0..size).map(|_| default_value(&elem, structs)).collect());
    }
    if ty.pointer_depth > 0 {
        return Value::Null;
    }

    match &ty.base {
        BaseType::Void | BaseType::Class(_) => Value::Void,
        BaseType::Bool => Value::Bool(false),
        BaseType::Char => Value::Char(0),
        BaseType::UChar | BaseType::Short | BaseType::UShort | BaseType::Int => Value::Int(0),
        BaseType::UInt => Value::UInt(0),
        BaseType::LongLong => Value::Long(0),
        BaseType::Float | BaseType::Double => Value::Float(0.0),
        BaseType::String => Value::Str(String::new()),
        BaseType::Struct(name) => Value::Struct {
            name: name.clone(),
            fields: structs
                .get(name)
                .map(|fields| {
                    fields
                        .iter()
                        .map(|f| (f.name.clone(), default_value(&f.field_type, structs)))
                        .collect()
                })
                .unwrap_or_default(),
        },
    }
}

/// Size in bytes
pub fn sizeof_type(ty: &Type, structs: &StructTable) -> usize {
    if ty.is_array() {
        let count: usize = ty.array_dims.iter().map(|d| d.unwrap_or(0)).product();
        let mut scalar = ty.clone();
        scalar.array_dims.clear();
        return count * sizeof_type(&scalar, structs);
    }
    if ty.pointer_depth > 0 {
        return 4;
    }

    match &ty.base {
        BaseType::Void => 1,
        BaseType::Bool | BaseType::Char | BaseType::UChar => 1,
        BaseType::Short | BaseType::UShort => 2,
        BaseType::Int | BaseType::UInt | BaseType::Float => 4,
        BaseType::LongLong | BaseType::Double => 8,
        BaseType::String => 6,
        BaseType::Class(_) => 4,
        BaseType::Struct(name) => structs
            .get(name)
            .map(|fields| fields.iter().map(|f| sizeof_type(&f.field_type, structs)).sum())
            .unwrap_or(0),
    }
}

/// Type of a runtime value, for values that did not come from a variable.
fn type_of_value(value: &Value) -> Type {
    match value {
        Value::Bool(_) => Type::new(BaseType::Bool),
        Value::Char(_) => Type::new(BaseType::Char),
        Value::UInt(_) => Type::new(BaseType::UInt),
        Value::Long(_) => Type::new(BaseType::LongLong),
        Value::Float(_) => Type::new(BaseType::Double),
        Value::Str(_) => Type::new(BaseType::String),
        _ => Type::new(BaseType::Int),
    }
}

/// Usual arithmetic conversions on two operand types.
fn arithmetic_result(left: &Type, right: &Type) -> Type {
    if left.pointer_depth > 0 || left.is_array() {
        return left.clone();
    }
    if right.pointer_depth > 0 || right.is_array() {
        return right.clone();
    }
    let rank = |base: &BaseType| match base {
        BaseType::Double => 5,
        BaseType::Float => 4,
        BaseType::LongLong => 3,
        BaseType::UInt => 2,
        _ => 1,
    };
    let base = if rank(&left.base) >= rank(&right.base) {
        &left.base
    } else {
        &right.base
    };
    match base {
        BaseType::Double | BaseType::Float | BaseType::LongLong | BaseType::UInt => {
            Type::new(base.clone())
        }
        _ => Type::new(BaseType::Int),
    }
}

impl Interpreter<'_> {
    /// [`convert`], reading a pointer into a `char` array as text when the
    /// target is a `String`.
    pub(crate) fn convert_value(
        &self,
        ctx: &ExecutionContext,
        value: Value,
        ty: &Type,
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        let value = if ty.base == BaseType::String && ty.pointer_depth == 0 && !ty.is_array() {
            text_of(ctx, value)
        } else {
            value
        };
        convert(value, ty, &self.structs, location)
    }

    /// Type of `node` without evaluating it.
    pub(crate) fn static_type(
        &self,
        ctx: &ExecutionContext,
        node: NodeId,
    ) -> Result<Type, RuntimeError> {
        let location = self.program.location(node);
        match self.program.kind(node) {
            NodeKind::IntLiteral { value, unsigned } => Ok(type_of_value(&int_literal(*value, *unsigned))),
            NodeKind::FloatLiteral(_) => Ok(Type::new(BaseType::Double)),
            NodeKind::CharLiteral(_) => Ok(Type::new(BaseType::Char)),
            NodeKind::BoolLiteral(_) => Ok(Type::new(BaseType::Bool)),
            NodeKind::StringLiteral(s) => {
                Ok(Type::new(BaseType::Char).with_array(Some(s.len() + 1)))
            }
            NodeKind::NullLiteral => Ok(Type::new(BaseType::Void).with_pointer()),
            NodeKind::Identifier(name) => match ctx.env.try_lookup(name) {
                Some(cell) => ctx
                    .env
                    .place_type(&Place::of(cell), &self.structs)
                    .map_err(|e| e.at(location)),
                None => self.resolve_name(name, location).map(|v| type_of_value(&v)),
            },
            NodeKind::Index { array, .. } => Ok(self.static_type(ctx, *array)?.element_type()),
            NodeKind::Member { object, field, .. } => {
                let owner = self.static_type(ctx, *object)?;
                let BaseType::Struct(name) = &owner.base else {
                    return Err(RuntimeError::type_mismatch(
                        format!("member '{}' of a non-struct value", field),
                        location,
                    ));
                };
                self.structs
                    .get(name)
                    .and_then(|fields| fields.iter().find(|f| &f.name == field))
                    .map(|f| f.field_type.clone())
                    .ok_or_else(|| {
                        RuntimeError::type_mismatch(format!("no field '{}' in {}", field, name), location)
                    })
            }
            NodeKind::Unary { op: UnOp::Deref, operand } => {
                Ok(self.static_type(ctx, *operand)?.element_type())
            }
            NodeKind::Unary { op: UnOp::AddrOf, operand } => {
                Ok(self.static_type(ctx, *operand)?.with_pointer())
            }
            NodeKind::Unary { op: UnOp::Not, .. } => Ok(Type::new(BaseType::Bool)),
            NodeKind::Unary { operand, .. } => {
                let ty = self.static_type(ctx, *operand)?;
                Ok(arithmetic_result(&ty, &Type::new(BaseType::Int)))
            }
            NodeKind::IncDec { target, .. } => self.static_type(ctx, *target),
            NodeKind::Binary { op, left, right } => match op {
                BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                    Ok(Type::new(BaseType::Bool))
                }
                BinOp::Shl | BinOp::Shr => self.static_type(ctx, *left),
                _ => Ok(arithmetic_result(
                    &self.static_type(ctx, *left)?,
                    &self.static_type(ctx, *right)?,
                )),
            },
            NodeKind::Logical { .. } => Ok(Type::new(BaseType::Bool)),
            NodeKind::Ternary { then_expr, .. } => self.static_type(ctx, *then_expr),
            NodeKind::Assign { target, .. } | NodeKind::CompoundAssign { target, .. } => {
                self.static_type(ctx, *target)
            }
            NodeKind::Cast { target_type, .. } => Ok(target_type.clone()),
            NodeKind::Call { callee, .. } => match self.functions.get(callee) {
                Some(&def) => match self.program.kind(def) {
                    NodeKind::FunctionDef { return_type, .. } => Ok(return_type.clone()),
                    _ => Ok(Type::new(BaseType::Int)),
                },
                None => Ok(Type::new(BaseType::Int)),
            },
            NodeKind::SizeofType(_) | NodeKind::SizeofExpr(_) => Ok(Type::new(BaseType::Int)),
            NodeKind::InitList(items) => match items.first() {
                Some(&first) => Ok(self.static_type(ctx, first)?.with_array(Some(items.len()))),
                None => Ok(Type::new(BaseType::Int).with_array(Some(0))),
            },
            _ => Err(RuntimeError::unsupported("sizeof of this expression", location)),
        }
    }
}

/// Runtime value of an integer literal: `int` when it fits, then
/// `unsigned long` for `u`-suffixed or hex literals that fit, then `long long`.
pub(crate) fn int_literal(value: i64, unsigned: bool) -> Value {
    if !unsigned {
        if let Ok(n) = i32::try_from(value) {
            return Value::Int(n);
        }
    }
    match u32::try_from(value) {
        Ok(n) => Value::UInt(n),
        Err(_) => Value::Long(value),
    }
}

/// Element places of a pointer into a `char` array, as text up to the NUL.
pub(crate) fn c_string_at(ctx: &ExecutionContext, place: &Place) -> Option<String> {
    let mut bytes = Vec::new();
    let mut cursor = place.clone();
    loop {
        match ctx.env.read(&cursor).ok()? {
            Value::Char(0) => break,
            Value::Char(c) => bytes.push(c as u8),
            _ => return None,
        }
        let next = cursor.last_index()? + 1;
        if let Some(PathStep::Index(i)) = cursor.path.last_mut() {
            *i = next;
        }
    }
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// `value` as a `Str` when it points into a `char` array, otherwise unchanged.
pub(crate) fn text_of(ctx: &ExecutionContext, value: Value) -> Value {
    if let Value::Pointer(place) = &value {
        if let Some(text) = c_string_at(ctx, place) {
            return Value::Str(text);
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::Field;

    fn loc() -> SourceLocation {
        SourceLocation::new(1, 1)
    }

    #[test]
    fn test_integer_targets_wrap() {
        let structs = StructTable::default();
        let byte = Type::new(BaseType::UChar);
        assert_eq!(convert(Value::Int(300), &byte, &structs, loc()).unwrap(), Value::Int(44));
        let ulong = Type::new(BaseType::UInt);
        assert_eq!(
            convert(Value::Int(-1), &ulong, &structs, loc()).unwrap(),
            Value::UInt(u32::MAX)
        );
        let int = Type::new(BaseType::Int);
        assert_eq!(convert(Value::Float(-3.9), &int, &structs, loc()).unwrap(), Value::Int(-3));
    }

    #[test]
    fn test_char_array_from_string() {
        let structs = StructTable::default();
        let ty = Type::new(BaseType::Char).with_array(Some(4));
        let value = convert(Value::Str("hi".into()), &ty, &structs, loc()).unwrap();
        assert_eq!(
            value,
            Value::Array(vec![Value::Char(104), Value::Char(105), Value::Char(0), Value::Char(0)])
        );
    }

    #[test]
    fn test_struct_from_positional_list() {
        let mut structs = StructTable::default();
        structs.insert(
            "Point".to_string(),
            vec![
                Field {
                    name: "x".into(),
                    field_type: Type::new(BaseType::Int),
                },
                Field {
                    name: "y".into(),
                    field_type: Type::new(BaseType::Int),
                },
            ],
        );
        let ty = Type::new(BaseType::Struct("Point".into()));
        let value = convert(Value::Array(vec![Value::Int(3)]), &ty, &structs, loc()).unwrap();
        assert_eq!(
            value,
            Value::Struct {
                name: "Point".into(),
                fields: vec![("x".into(), Value::Int(3)), ("y".into(), Value::Int(0))],
            }
        );
        assert_eq!(sizeof_type(&ty, &structs), 8);
    }

    #[test]
    fn test_rejects_string_to_int() {
        let structs = StructTable::default();
        let err = convert(Value::Str("5".into()), &Type::new(BaseType::Int), &structs, loc());
        assert!(matches!(err, Err(RuntimeError::TypeMismatch { .. })));
    }

    #[test]
    fn test_int_literal_typing() {
        assert_eq!(int_literal(5, false), Value::Int(5));
        assert_eq!(int_literal(3_000_000_000, false), Value::UInt(3_000_000_000));
        assert_eq!(int_literal(7, true), Value::UInt(7));
        assert_eq!(int_literal(1 << 40, false), Value::Long(1 << 40));
    }
}
