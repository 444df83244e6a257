//! Expression evaluation.
//!
//! Two entry frames drive everything here:
//!
//! - `Eval` leaves the value of an expression on the operand stack
//! - `EvalPlace` leaves the *location* an lvalue designates, as
//!   `Value::Pointer(place)`
//!
//! Compound expressions push a continuation frame and then the frames for
//! their operands, in source order. Assignment targets are resolved before
//! the assigned value is evaluated, and call arguments evaluate left to right.

use crate::interpreter::constants;
use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::RuntimeError;
use crate::interpreter::machine::{ExecutionContext, Frame};
use crate::interpreter::ops::{binary_op, step_value, unary_op};
use crate::interpreter::statements::truth;
use crate::interpreter::type_system::{int_literal, sizeof_type, text_of};
use crate::interpreter::builtins;
use crate::memory::value::Value;
use crate::memory::Place;
use crate::parser::ast::{BinOp, LogicalOp, NodeId, NodeKind, SourceLocation, UnOp};
use crate::parser::MacroValue;

impl Interpreter<'_> {
    /// Value of a name that is not a variable: a macro, an Arduino constant or
    /// a function.
    pub(crate) fn resolve_name(&self, name: &str, location: SourceLocation) -> Result<Value, RuntimeError> {
        if let Some(value) = self.macros.get(name) {
            return Ok(match value {
                MacroValue::Int(n) => int_literal(*n, false),
                MacroValue::Float(f) => Value::Float(*f),
                MacroValue::Text(s) => Value::Str(s.clone()),
            });
        }
        if let Some(value) = constants::lookup(name) {
            return Ok(value);
        }
        if self.functions.contains_key(name) {
            return Ok(Value::Function(name.to_string()));
        }
        Err(RuntimeError::UndefinedVariable {
            name: name.to_string(),
            location,
        })
    }

    /// Read `place`; arrays decay to a pointer to their first element.
    fn read_place(
        &self,
        ctx: &ExecutionContext,
        place: Place,
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        match ctx.env.read(&place).map_err(|e| e.at(location))? {
            Value::Array(_) => Ok(Value::Pointer(place.index(0))),
            value => Ok(value),
        }
    }

    /// True when `node` designates storage, so indexing it can work on the
    /// place instead of a copy.
    fn is_place_node(&self, ctx: &ExecutionContext, node: NodeId) -> bool {
        match self.program.kind(node) {
            NodeKind::Identifier(name) => ctx.env.try_lookup(name).is_some(),
            NodeKind::Index { .. }
            | NodeKind::Member { .. }
            | NodeKind::Unary {
                op: UnOp::Deref, ..
            } => true,
            _ => false,
        }
    }

    fn operand(&self, ctx: &ExecutionContext, node: NodeId) -> (Frame, bool) {
        if self.is_place_node(ctx, node) {
            (Frame::EvalPlace { node }, true)
        } else {
            (Frame::Eval { node }, false)
        }
    }

    pub(crate) fn eval(&mut self, ctx: &mut ExecutionContext, node: NodeId) -> Result<(), RuntimeError> {
        let program = self.program;
        let location = program.location(node);

        match program.kind(node) {
            NodeKind::IntLiteral { value, unsigned } => ctx.values.push(int_literal(*value, *unsigned)),
            NodeKind::FloatLiteral(f) => ctx.values.push(Value::Float(*f)),
            NodeKind::CharLiteral(c) => ctx.values.push(Value::Char(*c)),
            NodeKind::StringLiteral(s) => ctx.values.push(Value::Str(s.clone())),
            NodeKind::BoolLiteral(b) => ctx.values.push(Value::Bool(*b)),
            NodeKind::NullLiteral => ctx.values.push(Value::Null),
            NodeKind::Identifier(name) => {
                let value = match ctx.env.try_lookup(name) {
                    Some(cell) => self.read_place(ctx, Place::of(cell), location)?,
                    None => self.resolve_name(name, location)?,
                };
                ctx.values.push(value);
            }
            NodeKind::Binary { left, right, .. } => {
                ctx.frames.push(Frame::Binary { node });
                ctx.push_in_order([Frame::Eval { node: *left }, Frame::Eval { node: *right }].into_iter());
            }
            NodeKind::Logical { left, .. } => {
                ctx.frames.push(Frame::Logical { node, rhs: false });
                ctx.frames.push(Frame::Eval { node: *left });
            }
            NodeKind::Unary {
                op: UnOp::AddrOf,
                operand,
            } => ctx.frames.push(Frame::EvalPlace { node: *operand }),
            NodeKind::Unary { op: UnOp::Deref, .. } | NodeKind::Index { .. } | NodeKind::Member { .. } => {
                ctx.frames.push(Frame::Load { node });
                ctx.frames.push(Frame::EvalPlace { node });
            }
            NodeKind::Unary { operand, .. } => {
                ctx.frames.push(Frame::Unary { node });
                ctx.frames.push(Frame::Eval { node: *operand });
            }
            NodeKind::IncDec { target, .. } => {
                ctx.frames.push(Frame::IncDec { node });
                ctx.frames.push(Frame::EvalPlace { node: *target });
            }
            NodeKind::Ternary { condition, .. } => {
                ctx.frames.push(Frame::Select { node });
                ctx.frames.push(Frame::Eval { node: *condition });
            }
            NodeKind::Assign { target, value } => {
                ctx.frames.push(Frame::Assign { node });
                ctx.push_in_order([Frame::EvalPlace { node: *target }, Frame::Eval { node: *value }].into_iter());
            }
            NodeKind::CompoundAssign { target, value, .. } => {
                ctx.frames.push(Frame::CompoundAssign { node });
                ctx.push_in_order([Frame::EvalPlace { node: *target }, Frame::Eval { node: *value }].into_iter());
            }
            NodeKind::Call { callee, args } => {
                if let Some(&function) = self.functions.get(callee) {
                    ctx.frames.push(Frame::Call {
                        function,
                        argc: args.len(),
                        location,
                    });
                } else if builtins::is_builtin(callee) {
                    ctx.frames.push(Frame::Builtin { node });
                } else {
                    return Err(RuntimeError::UndefinedFunction {
                        name: callee.clone(),
                        location,
                    });
                }
                ctx.push_in_order(args.iter().map(|&arg| Frame::Eval { node: arg }));
            }
            NodeKind::MethodCall { receiver, args, .. } => {
                ctx.frames.push(Frame::Method { node });
                ctx.push_in_order(
                    std::iter::once(*receiver)
                        .chain(args.iter().copied())
                        .map(|node| Frame::Eval { node }),
                );
            }
            NodeKind::Cast { expr, .. } => {
                ctx.frames.push(Frame::Cast { node });
                ctx.frames.push(Frame::Eval { node: *expr });
            }
            NodeKind::SizeofType(ty) => {
                ctx.values.push(Value::Int(sizeof_type(ty, &self.structs) as i32));
            }
            NodeKind::SizeofExpr(expr) => {
                let ty = self.static_type(ctx, *expr)?;
                ctx.values.push(Value::Int(sizeof_type(&ty, &self.structs) as i32));
            }
            NodeKind::InitList(items) => {
                ctx.frames.push(Frame::Collect { count: items.len() });
                ctx.push_in_order(items.iter().map(|&item| Frame::Eval { node: item }));
            }
            _ => {
                return Err(RuntimeError::unsupported(
                    "statement used where a value is expected",
                    location,
                ))
            }
        }
        Ok(())
    }

    pub(crate) fn eval_place(&mut self, ctx: &mut ExecutionContext, node: NodeId) -> Result<(), RuntimeError> {
        let program = self.program;
        let location = program.location(node);

        match program.kind(node) {
            NodeKind::Identifier(name) => match ctx.env.try_lookup(name) {
                Some(cell) => ctx.values.push(Value::Pointer(Place::of(cell))),
                None => {
                    // Macros and constants exist, but have no storage
                    self.resolve_name(name, location)?;
                    return Err(RuntimeError::ConstAssignment {
                        name: name.clone(),
                        location,
                    });
                }
            },
            NodeKind::Index { array, index } => {
                let (base, from_place) = self.operand(ctx, *array);
                ctx.frames.push(Frame::IndexPlace { node, from_place });
                ctx.push_in_order([base, Frame::Eval { node: *index }].into_iter());
            }
            NodeKind::Member {
                object,
                through_pointer,
                ..
            } => {
                ctx.frames.push(Frame::FieldPlace { node });
                if *through_pointer {
                    ctx.frames.push(Frame::Eval { node: *object });
                } else {
                    ctx.frames.push(Frame::EvalPlace { node: *object });
                }
            }
            NodeKind::Unary {
                op: UnOp::Deref,
                operand,
            } => {
                let (pointer, from_place) = self.operand(ctx, *operand);
                ctx.frames.push(Frame::DerefPlace { node, from_place });
                ctx.frames.push(pointer);
            }
            _ => {
                return Err(RuntimeError::unsupported(
                    "expression does not designate storage",
                    location,
                ))
            }
        }
        Ok(())
    }

    /// Pop a place pushed by `EvalPlace`.
    fn pop_place(&self, ctx: &mut ExecutionContext, location: SourceLocation) -> Result<Place, RuntimeError> {
        match ctx.pop_value(location)? {
            Value::Pointer(place) => Ok(place),
            Value::Null => Err(RuntimeError::NullDereference { location }),
            other => Err(RuntimeError::type_mismatch(
                format!("{} does not designate storage", other.type_name()),
                location,
            )),
        }
    }

    fn check_writable(&self, ctx: &ExecutionContext, place: &Place, location: SourceLocation) -> Result<(), RuntimeError> {
        let var = ctx.env.variable(place.cell).map_err(|e| e.at(location))?;
        if var.ty.is_const && var.ty.pointer_depth == 0 {
            return Err(RuntimeError::ConstAssignment {
                name: var.name.clone(),
                location,
            });
        }
        Ok(())
    }

    /// Convert `value` to the type of `place`, store it and report the store.
    fn store(
        &mut self,
        ctx: &mut ExecutionContext,
        place: &Place,
        value: Value,
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        let ty = ctx
            .env
            .place_type(place, &self.structs)
            .map_err(|e| e.at(location))?;
        let value = self.convert_value(ctx, value, &ty, location)?;
        ctx.env
            .write(place, value.clone())
            .map_err(|e| e.at(location))?;
        self.emit_var_set(ctx, place, &value);
        Ok(value)
    }

    pub(crate) fn load(&mut self, ctx: &mut ExecutionContext, node: NodeId) -> Result<(), RuntimeError> {
        let location = self.program.location(node);
        let place = self.pop_place(ctx, location)?;
        let value = self.read_place(ctx, place, location)?;
        ctx.values.push(value);
        Ok(())
    }

    pub(crate) fn apply_binary(&mut self, ctx: &mut ExecutionContext, node: NodeId) -> Result<(), RuntimeError> {
        let program = self.program;
        let location = program.location(node);
        let NodeKind::Binary { op, .. } = program.kind(node) else {
            return Err(RuntimeError::unsupported("binary expression expected", location));
        };
        let right = ctx.pop_value(location)?;
        let left = ctx.pop_value(location)?;
        let (left, right) = string_operands(ctx, left, right);
        let result = match offset_operands(*op, &left, &right) {
            Some((pointer, delta)) => Value::Pointer(offset_place(ctx, pointer, delta, location)?),
            None => binary_op(*op, &left, &right, location)?,
        };
        ctx.values.push(result);
        Ok(())
    }

    /// `&&`/`||`: the right operand only runs when the left does not decide.
    pub(crate) fn step_logical(&mut self, ctx: &mut ExecutionContext, node: NodeId, rhs: bool) -> Result<(), RuntimeError> {
        let program = self.program;
        let location = program.location(node);
        let NodeKind::Logical { op, right, .. } = program.kind(node) else {
            return Err(RuntimeError::unsupported("logical expression expected", location));
        };
        let value = truth(&ctx.pop_value(location)?, location)?;

        if rhs {
            ctx.values.push(Value::Bool(value));
            return Ok(());
        }
        match (op, value) {
            (LogicalOp::And, false) => ctx.values.push(Value::Bool(false)),
            (LogicalOp::Or, true) => ctx.values.push(Value::Bool(true)),
            _ => {
                ctx.frames.push(Frame::Logical { node, rhs: true });
                ctx.frames.push(Frame::Eval { node: *right });
            }
        }
        Ok(())
    }

    pub(crate) fn apply_unary(&mut self, ctx: &mut ExecutionContext, node: NodeId) -> Result<(), RuntimeError> {
        let program = self.program;
        let location = program.location(node);
        let NodeKind::Unary { op, .. } = program.kind(node) else {
            return Err(RuntimeError::unsupported("unary expression expected", location));
        };
        let value = ctx.pop_value(location)?;
        ctx.values.push(unary_op(*op, &value, location)?);
        Ok(())
    }

    pub(crate) fn apply_inc_dec(&mut self, ctx: &mut ExecutionContext, node: NodeId) -> Result<(), RuntimeError> {
        let program = self.program;
        let location = program.location(node);
        let NodeKind::IncDec { op, .. } = program.kind(node) else {
            return Err(RuntimeError::unsupported("increment expected", location));
        };

        let place = self.pop_place(ctx, location)?;
        self.check_writable(ctx, &place, location)?;
        let old = ctx.env.read(&place).map_err(|e| e.at(location))?;
        let new = match &old {
            Value::Pointer(pointer) => {
                Value::Pointer(offset_place(ctx, pointer, op.delta() as i64, location)?)
            }
            other => step_value(other, op.delta(), location)?,
        };
        let new = self.store(ctx, &place, new, location)?;
        ctx.values.push(if op.is_prefix() { new } else { old });
        Ok(())
    }

    pub(crate) fn step_select(&mut self, ctx: &mut ExecutionContext, node: NodeId) -> Result<(), RuntimeError> {
        let program = self.program;
        let location = program.location(node);
        let NodeKind::Ternary {
            then_expr,
            else_expr,
            ..
        } = program.kind(node)
        else {
            return Err(RuntimeError::unsupported("conditional expression expected", location));
        };

        let condition = ctx.pop_value(location)?;
        let chosen = if truth(&condition, location)? {
            *then_expr
        } else {
            *else_expr
        };
        ctx.frames.push(Frame::Eval { node: chosen });
        Ok(())
    }

    pub(crate) fn apply_assign(&mut self, ctx: &mut ExecutionContext, node: NodeId) -> Result<(), RuntimeError> {
        let location = self.program.location(node);
        let value = ctx.pop_value(location)?;
        let place = self.pop_place(ctx, location)?;
        self.check_writable(ctx, &place, location)?;
        let stored = self.store(ctx, &place, value, location)?;
        ctx.values.push(stored);
        Ok(())
    }

    pub(crate) fn apply_compound_assign(
        &mut self,
        ctx: &mut ExecutionContext,
        node: NodeId,
    ) -> Result<(), RuntimeError> {
        let program = self.program;
        let location = program.location(node);
        let NodeKind::CompoundAssign { op, .. } = program.kind(node) else {
            return Err(RuntimeError::unsupported("compound assignment expected", location));
        };

        let rhs = ctx.pop_value(location)?;
        let place = self.pop_place(ctx, location)?;
        self.check_writable(ctx, &place, location)?;
        let current = ctx.env.read(&place).map_err(|e| e.at(location))?;
        let (current, rhs) = string_operands(ctx, current, rhs);
        let result = match offset_operands(*op, &current, &rhs) {
            Some((pointer, delta)) => Value::Pointer(offset_place(ctx, pointer, delta, location)?),
            None => binary_op(*op, &current, &rhs, location)?,
        };
        let stored = self.store(ctx, &place, result, location)?;
        ctx.values.push(stored);
        Ok(())
    }

    pub(crate) fn apply_cast(&mut self, ctx: &mut ExecutionContext, node: NodeId) -> Result<(), RuntimeError> {
        let program = self.program;
        let location = program.location(node);
        let NodeKind::Cast { target_type, .. } = program.kind(node) else {
            return Err(RuntimeError::unsupported("cast expected", location));
        };
        let value = ctx.pop_value(location)?;
        let converted = self.convert_value(ctx, value, target_type, location)?;
        ctx.values.push(converted);
        Ok(())
    }

    pub(crate) fn index_place(
        &mut self,
        ctx: &mut ExecutionContext,
        node: NodeId,
        from_place: bool,
    ) -> Result<(), RuntimeError> {
        let location = self.program.location(node);
        let index = ctx.pop_value(location)?;
        let index = match index {
            Value::Float(_) => None,
            ref v if v.is_numeric() => v.as_i64(),
            _ => None,
        }
        .ok_or_else(|| {
            RuntimeError::type_mismatch(
                format!("array index of type {}", index.type_name()),
                location,
            )
        })?;
        let base = ctx.pop_value(location)?;

        let out_of_bounds = |size: usize| RuntimeError::ArrayIndexOutOfBounds { index, size, location };
        let target = match base {
            Value::Pointer(place) if from_place => match ctx.env.read(&place).map_err(|e| e.at(location))? {
                Value::Array(items) => {
                    if index < 0 || index as usize >= items.len() {
                        return Err(out_of_bounds(items.len()));
                    }
                    place.index(index as usize)
                }
                Value::Str(s) => {
                    if index < 0 || index as usize > s.len() {
                        return Err(out_of_bounds(s.len() + 1));
                    }
                    place.index(index as usize)
                }
                Value::Pointer(pointee) => offset_place(ctx, &pointee, index, location)?,
                Value::Null => return Err(RuntimeError::NullDereference { location }),
                other => {
                    return Err(RuntimeError::type_mismatch(
                        format!("cannot index a value of type {}", other.type_name()),
                        location,
                    ))
                }
            },
            Value::Pointer(pointee) => offset_place(ctx, &pointee, index, location)?,
            Value::Null => return Err(RuntimeError::NullDereference { location }),
            other => {
                return Err(RuntimeError::type_mismatch(
                    format!("cannot index a value of type {}", other.type_name()),
                    location,
                ))
            }
        };
        ctx.values.push(Value::Pointer(target));
        Ok(())
    }

    pub(crate) fn field_place(&mut self, ctx: &mut ExecutionContext, node: NodeId) -> Result<(), RuntimeError> {
        let program = self.program;
        let location = program.location(node);
        let NodeKind::Member { field, .. } = program.kind(node) else {
            return Err(RuntimeError::unsupported("member access expected", location));
        };
        let place = self.pop_place(ctx, location)?;
        ctx.values.push(Value::Pointer(place.field(field)));
        Ok(())
    }

    pub(crate) fn deref_place(
        &mut self,
        ctx: &mut ExecutionContext,
        node: NodeId,
        from_place: bool,
    ) -> Result<(), RuntimeError> {
        let location = self.program.location(node);
        let base = ctx.pop_value(location)?;

        let pointer = match base {
            Value::Pointer(place) if from_place => match ctx.env.read(&place).map_err(|e| e.at(location))? {
                Value::Pointer(pointee) => pointee,
                // `*s` on a string or an array reads its first element
                Value::Str(_) | Value::Array(_) => place.index(0),
                Value::Null => return Err(RuntimeError::NullDereference { location }),
                other => {
                    return Err(RuntimeError::type_mismatch(
                        format!("cannot dereference a value of type {}", other.type_name()),
                        location,
                    ))
                }
            },
            Value::Pointer(pointee) => pointee,
            Value::Null => return Err(RuntimeError::NullDereference { location }),
            other => {
                return Err(RuntimeError::type_mismatch(
                    format!("cannot dereference a value of type {}", other.type_name()),
                    location,
                ))
            }
        };
        ctx.values.push(Value::Pointer(pointer));
        Ok(())
    }
}

/// Next to a `String`, a pointer into a `char` array takes part as its text.
fn string_operands(ctx: &ExecutionContext, left: Value, right: Value) -> (Value, Value) {
    match (left, right) {
        (left @ Value::Str(_), right @ Value::Pointer(_)) => (left, text_of(ctx, right)),
        (left @ Value::Pointer(_), right @ Value::Str(_)) => (text_of(ctx, left), right),
        pair => pair,
    }
}

/// `pointer ± n` as the pointer and its signed element offset.
fn offset_operands<'v>(op: BinOp, left: &'v Value, right: &'v Value) -> Option<(&'v Place, i64)> {
    let integer = |v: &Value| match v {
        Value::Float(_) => None,
        v if v.is_numeric() => v.as_i64(),
        _ => None,
    };
    match (op, left, right) {
        (BinOp::Add, Value::Pointer(pointer), n) | (BinOp::Add, n, Value::Pointer(pointer)) => {
            Some((pointer, integer(n)?))
        }
        (BinOp::Sub, Value::Pointer(pointer), n) => Some((pointer, integer(n)?.wrapping_neg())),
        _ => None,
    }
}

/// `pointer[index]` as a place.
fn offset_place(
    ctx: &ExecutionContext,
    pointer: &Place,
    index: i64,
    location: SourceLocation,
) -> Result<Place, RuntimeError> {
    if index == 0 {
        return Ok(pointer.clone());
    }
    let Some(base) = pointer.last_index() else {
        return Err(RuntimeError::unsupported(
            "indexing a pointer that does not point into an array",
            location,
        ));
    };
    pointer.offset(index).ok_or_else(|| RuntimeError::ArrayIndexOutOfBounds {
        index: (base as i64).wrapping_add(index),
        size: ctx.env.element_count(pointer).unwrap_or(0),
        location,
    })
}
