//! Built-in Arduino functions and methods
//!
//! Free functions (`pinMode`, `delay`, `map`, ...) run from a
//! [`Frame::Builtin`](crate::interpreter::machine::Frame::Builtin) once their
//! arguments are on the operand stack. Method calls dispatch on the receiver:
//!
//! - `Serial` methods produce serial commands
//! - library objects go through the [`LibraryTable`](crate::interpreter::LibraryTable)
//! - `String` values (and `char` arrays) get the read-only `String` methods
//!
//! Functions that need host data (`analogRead`, `digitalRead`, `millis`,
//! `micros`, library queries) return [`Step::Suspend`] and push nothing; the
//! host's answer takes the place of the result.

use crate::commands::{CommandKind, RequestKind};
use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::RuntimeError;
use crate::interpreter::library::MethodRoute;
use crate::interpreter::machine::{ExecutionContext, Step};
use crate::interpreter::ops::binary_op;
use crate::interpreter::type_system::c_string_at;
use crate::memory::value::{format_float, ObjectRef, Value};
use crate::parser::ast::{BinOp, NodeId, NodeKind, SourceLocation};
use std::cmp::Ordering;
use std::ops::RangeInclusive;

const BUILTINS: &[&str] = &[
    "pinMode",
    "digitalWrite",
    "digitalRead",
    "analogWrite",
    "analogRead",
    "delay",
    "delayMicroseconds",
    "millis",
    "micros",
    "tone",
    "noTone",
    "abs",
    "min",
    "max",
    "constrain",
    "map",
    "pow",
    "sqrt",
    "sq",
    "sin",
    "cos",
    "tan",
    "floor",
    "ceil",
    "round",
    "random",
    "randomSeed",
    "bit",
    "bitRead",
    "lowByte",
    "highByte",
    "String",
];

pub(crate) fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

fn check_arity(
    function: &str,
    args: &[Value],
    accepted: RangeInclusive<usize>,
    location: SourceLocation,
) -> Result<(), RuntimeError> {
    if accepted.contains(&args.len()) {
        return Ok(());
    }
    let expected = if args.len() < *accepted.start() {
        *accepted.start()
    } else {
        *accepted.end()
    };
    Err(RuntimeError::ArgumentCountMismatch {
        function: function.to_string(),
        expected,
        got: args.len(),
        location,
    })
}

fn int_arg(function: &str, args: &[Value], index: usize, location: SourceLocation) -> Result<i64, RuntimeError> {
    let value = args.get(index).unwrap_or(&Value::Void);
    if value.is_numeric() {
        if let Some(n) = value.as_i64() {
            return Ok(n);
        }
    }
    Err(RuntimeError::type_mismatch(
        format!("argument {} of {}() is {}, expected a number", index + 1, function, value.type_name()),
        location,
    ))
}

fn float_arg(function: &str, args: &[Value], index: usize, location: SourceLocation) -> Result<f64, RuntimeError> {
    let value = args.get(index).unwrap_or(&Value::Void);
    match value.as_f64() {
        Some(f) if value.is_numeric() => Ok(f),
        _ => Err(RuntimeError::type_mismatch(
            format!("argument {} of {}() is {}, expected a number", index + 1, function, value.type_name()),
            location,
        )),
    }
}

/// Digits of `n` in `base`.
fn radix(mut n: u64, base: u64, uppercase: bool) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let digits: &[u8] = if uppercase {
        b"0123456789ABCDEF"
    } else {
        b"0123456789abcdef"
    };
    let mut out = Vec::new();
    while n > 0 {
        out.push(digits[(n % base) as usize]);
        n /= base;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Integer text in `base` as `print(n, base)` and `String(n, base)` render
/// it. Negative numbers show their 32 bit two's complement outside base 10.
fn integer_in_base(n: i64, base: i64, uppercase: bool) -> String {
    match base {
        2 | 8 | 16 => radix(n as u32 as u64, base as u64, uppercase),
        _ => n.to_string(),
    }
}

/// Leading integer of `text`, as `String::toInt` parses it.
fn leading_int(text: &str) -> i64 {
    let trimmed = text.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let n = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| acc.wrapping_mul(10).wrapping_add((d - b'0') as i64));
    if negative {
        n.wrapping_neg()
    } else {
        n
    }
}

/// Leading decimal number of `text`, as `String::toFloat` parses it.
fn leading_float(text: &str) -> f64 {
    let trimmed = text.trim_start();
    let end = trimmed
        .char_indices()
        .take_while(|&(i, c)| c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    trimmed[..end].parse().unwrap_or(0.0)
}

impl Interpreter<'_> {
    pub(crate) fn call_builtin(&mut self, ctx: &mut ExecutionContext, node: NodeId) -> Result<Step, RuntimeError> {
        let program = self.program;
        let location = program.location(node);
        let NodeKind::Call { callee, args } = program.kind(node) else {
            return Err(RuntimeError::unsupported("call expected", location));
        };
        let name = callee.as_str();
        let args = ctx.pop_values(args.len(), location)?;

        let result = match name {
            "pinMode" => {
                check_arity(name, &args, 2..=2, location)?;
                self.emit(CommandKind::PinMode {
                    pin: int_arg(name, &args, 0, location)?,
                    mode: int_arg(name, &args, 1, location)?,
                });
                Value::Void
            }
            "digitalWrite" => {
                check_arity(name, &args, 2..=2, location)?;
                let value = int_arg(name, &args, 1, location)?;
                self.emit(CommandKind::DigitalWrite {
                    pin: int_arg(name, &args, 0, location)?,
                    value: (value != 0) as i64,
                });
                Value::Void
            }
            "analogWrite" => {
                check_arity(name, &args, 2..=2, location)?;
                self.emit(CommandKind::AnalogWrite {
                    pin: int_arg(name, &args, 0, location)?,
                    value: int_arg(name, &args, 1, location)?,
                });
                Value::Void
            }
            "delay" => {
                check_arity(name, &args, 1..=1, location)?;
                self.emit(CommandKind::Delay {
                    ms: int_arg(name, &args, 0, location)?,
                });
                Value::Void
            }
            "delayMicroseconds" => {
                check_arity(name, &args, 1..=1, location)?;
                self.emit(CommandKind::DelayMicroseconds {
                    us: int_arg(name, &args, 0, location)?,
                });
                Value::Void
            }
            "tone" => {
                check_arity(name, &args, 2..=3, location)?;
                let duration = match args.len() {
                    3 => Some(int_arg(name, &args, 2, location)?),
                    _ => None,
                };
                self.emit(CommandKind::Tone {
                    pin: int_arg(name, &args, 0, location)?,
                    frequency: int_arg(name, &args, 1, location)?,
                    duration,
                });
                Value::Void
            }
            "noTone" => {
                check_arity(name, &args, 1..=1, location)?;
                self.emit(CommandKind::NoTone {
                    pin: int_arg(name, &args, 0, location)?,
                });
                Value::Void
            }

            // Host data
            "analogRead" => {
                check_arity(name, &args, 1..=1, location)?;
                let pin = int_arg(name, &args, 0, location)?;
                return Ok(Step::Suspend(RequestKind::AnalogRead { pin }));
            }
            "digitalRead" => {
                check_arity(name, &args, 1..=1, location)?;
                let pin = int_arg(name, &args, 0, location)?;
                return Ok(Step::Suspend(RequestKind::DigitalRead { pin }));
            }
            "millis" => {
                check_arity(name, &args, 0..=0, location)?;
                return Ok(Step::Suspend(RequestKind::Millis));
            }
            "micros" => {
                check_arity(name, &args, 0..=0, location)?;
                return Ok(Step::Suspend(RequestKind::Micros));
            }

            _ => self.math_builtin(ctx, name, &args, location)?,
        };
        ctx.values.push(result);
        Ok(Step::Continue)
    }

    fn math_builtin(
        &mut self,
        ctx: &mut ExecutionContext,
        name: &str,
        args: &[Value],
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        let less = |a: &Value, b: &Value| -> Result<bool, RuntimeError> {
            Ok(matches!(binary_op(BinOp::Lt, a, b, location)?, Value::Bool(true)))
        };

        let value = match name {
            "abs" => {
                check_arity(name, args, 1..=1, location)?;
                match &args[0] {
                    Value::Float(f) => Value::Float(f.abs()),
                    Value::UInt(n) => Value::UInt(*n),
                    Value::Long(n) => Value::Long(n.wrapping_abs()),
                    _ => Value::Int((int_arg(name, args, 0, location)? as i32).wrapping_abs()),
                }
            }
            "min" => {
                check_arity(name, args, 2..=2, location)?;
                if less(&args[1], &args[0])? {
                    args[1].clone()
                } else {
                    args[0].clone()
                }
            }
            "max" => {
                check_arity(name, args, 2..=2, location)?;
                if less(&args[0], &args[1])? {
                    args[1].clone()
                } else {
                    args[0].clone()
                }
            }
            "constrain" => {
                check_arity(name, args, 3..=3, location)?;
                if less(&args[0], &args[1])? {
                    args[1].clone()
                } else if less(&args[2], &args[0])? {
                    args[2].clone()
                } else {
                    args[0].clone()
                }
            }
            "map" => {
                check_arity(name, args, 5..=5, location)?;
                let [x, in_min, in_max, out_min, out_max] = [0, 1, 2, 3, 4].map(|i| int_arg(name, args, i, location));
                let (x, in_min, in_max, out_min, out_max) = (x?, in_min?, in_max?, out_min?, out_max?);
                if in_max == in_min {
                    return Err(RuntimeError::DivisionByZero {
                        operation: "map".to_string(),
                        location,
                    });
                }
                let mapped = x
                    .wrapping_sub(in_min)
                    .wrapping_mul(out_max.wrapping_sub(out_min))
                    .wrapping_div(in_max.wrapping_sub(in_min))
                    .wrapping_add(out_min);
                Value::Int(mapped as i32)
            }
            "pow" => {
                check_arity(name, args, 2..=2, location)?;
                Value::Float(float_arg(name, args, 0, location)?.powf(float_arg(name, args, 1, location)?))
            }
            "sq" => {
                check_arity(name, args, 1..=1, location)?;
                binary_op(BinOp::Mul, &args[0], &args[0], location)?
            }
            "sqrt" | "sin" | "cos" | "tan" | "floor" | "ceil" => {
                check_arity(name, args, 1..=1, location)?;
                let x = float_arg(name, args, 0, location)?;
                Value::Float(match name {
                    "sqrt" => x.sqrt(),
                    "sin" => x.sin(),
                    "cos" => x.cos(),
                    "tan" => x.tan(),
                    "floor" => x.floor(),
                    _ => x.ceil(),
                })
            }
            "round" => {
                check_arity(name, args, 1..=1, location)?;
                Value::Int(float_arg(name, args, 0, location)?.round() as i32)
            }
            "random" => {
                check_arity(name, args, 1..=2, location)?;
                let (low, high) = match args.len() {
                    1 => (0, int_arg(name, args, 0, location)?),
                    _ => (int_arg(name, args, 0, location)?, int_arg(name, args, 1, location)?),
                };
                Value::Int(next_random(ctx, low, high) as i32)
            }
            "randomSeed" => {
                check_arity(name, args, 1..=1, location)?;
                ctx.rng_state = int_arg(name, args, 0, location)? as u64;
                Value::Void
            }
            "bit" => {
                check_arity(name, args, 1..=1, location)?;
                Value::UInt(1u32.wrapping_shl(int_arg(name, args, 0, location)? as u32))
            }
            "bitRead" => {
                check_arity(name, args, 2..=2, location)?;
                let x = int_arg(name, args, 0, location)?;
                let n = int_arg(name, args, 1, location)?;
                Value::Int(((x as u64).wrapping_shr(n as u32) & 1) as i32)
            }
            "lowByte" => {
                check_arity(name, args, 1..=1, location)?;
                Value::Int((int_arg(name, args, 0, location)? & 0xff) as i32)
            }
            "highByte" => {
                check_arity(name, args, 1..=1, location)?;
                Value::Int(((int_arg(name, args, 0, location)? >> 8) & 0xff) as i32)
            }
            "String" => {
                check_arity(name, args, 0..=2, location)?;
                Value::Str(match (args.first(), args.get(1)) {
                    (None, _) => String::new(),
                    (Some(Value::Float(f)), Some(_)) => {
                        format_float(*f, int_arg(name, args, 1, location)?.max(0) as usize)
                    }
                    (Some(value), Some(_)) if value.is_numeric() => integer_in_base(
                        int_arg(name, args, 0, location)?,
                        int_arg(name, args, 1, location)?,
                        false,
                    ),
                    (Some(value), _) => self.display_text(ctx, value),
                })
            }
            _ => {
                return Err(RuntimeError::UndefinedFunction {
                    name: name.to_string(),
                    location,
                })
            }
        };
        Ok(value)
    }

    /// Text of a value as `print` shows it; `char` array pointers print as strings.
    fn display_text(&self, ctx: &ExecutionContext, value: &Value) -> String {
        match value {
            Value::Pointer(place) => c_string_at(ctx, place).unwrap_or_else(|| value.render()),
            _ => value.render(),
        }
    }

    pub(crate) fn call_method(&mut self, ctx: &mut ExecutionContext, node: NodeId) -> Result<Step, RuntimeError> {
        let program = self.program;
        let location = program.location(node);
        let NodeKind::MethodCall { method, args, .. } = program.kind(node) else {
            return Err(RuntimeError::unsupported("method call expected", location));
        };
        let mut values = ctx.pop_values(args.len() + 1, location)?;
        let receiver = values.remove(0);

        let result = match receiver {
            Value::Object(object) if object.class == "Serial" => self.serial_method(ctx, method, &values, location)?,
            Value::Object(object) => return self.library_method(ctx, object, method, &values, location),
            Value::Str(text) => self.string_method(ctx, &text, method, &values, location)?,
            Value::Pointer(ref place) => match c_string_at(ctx, place) {
                Some(text) => self.string_method(ctx, &text, method, &values, location)?,
                None => {
                    return Err(RuntimeError::type_mismatch(
                        format!("cannot call {}() through a pointer", method),
                        location,
                    ))
                }
            },
            other => {
                return Err(RuntimeError::type_mismatch(
                    format!("cannot call {}() on a value of type {}", method, other.type_name()),
                    location,
                ))
            }
        };
        ctx.values.push(result);
        Ok(Step::Continue)
    }

    fn serial_method(
        &mut self,
        ctx: &ExecutionContext,
        method: &str,
        args: &[Value],
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        let name = format!("Serial.{}", method);
        let value = match method {
            "begin" => {
                check_arity(&name, args, 1..=2, location)?;
                self.emit(CommandKind::SerialBegin {
                    baud: int_arg(&name, args, 0, location)?,
                });
                Value::Void
            }
            "print" | "println" => {
                check_arity(&name, args, 0..=2, location)?;
                let text = match (args.first(), args.get(1)) {
                    (None, _) => String::new(),
                    (Some(Value::Float(f)), Some(_)) => {
                        format_float(*f, int_arg(&name, args, 1, location)?.max(0) as usize)
                    }
                    (Some(value), Some(_)) if value.is_numeric() => integer_in_base(
                        int_arg(&name, args, 0, location)?,
                        int_arg(&name, args, 1, location)?,
                        true,
                    ),
                    (Some(value), _) => self.display_text(ctx, value),
                };
                let written = text.len() as i32;
                if method == "println" {
                    self.emit(CommandKind::SerialPrintln { text });
                    Value::Int(written + 2)
                } else {
                    self.emit(CommandKind::SerialPrint { text });
                    Value::Int(written)
                }
            }
            "write" => {
                check_arity(&name, args, 1..=1, location)?;
                match &args[0] {
                    Value::Str(text) => {
                        let written = text.len() as i32;
                        self.emit(CommandKind::SerialPrint { text: text.clone() });
                        Value::Int(written)
                    }
                    _ => {
                        self.emit(CommandKind::SerialWrite {
                            byte: int_arg(&name, args, 0, location)? & 0xff,
                        });
                        Value::Int(1)
                    }
                }
            }
            // No input ever arrives on the simulated port
            "available" => Value::Int(0),
            "read" | "peek" => Value::Int(-1),
            "flush" | "end" => Value::Void,
            _ => {
                return Err(RuntimeError::unsupported(
                    format!("{}() is not supported", name),
                    location,
                ))
            }
        };
        Ok(value)
    }

    fn library_method(
        &mut self,
        ctx: &mut ExecutionContext,
        object: ObjectRef,
        method: &str,
        args: &[Value],
        location: SourceLocation,
    ) -> Result<Step, RuntimeError> {
        let Some(route) = self.library.route(&object.class, method) else {
            return Err(RuntimeError::unsupported(
                format!("{}.{}() has no library route", object.class, method),
                location,
            ));
        };

        match route {
            MethodRoute::Internal(compute) => {
                let value = compute(args).ok_or_else(|| {
                    RuntimeError::type_mismatch(
                        format!("invalid arguments for {}.{}()", object.class, method),
                        location,
                    )
                })?;
                ctx.values.push(value);
                Ok(Step::Continue)
            }
            MethodRoute::External { returns_value } => {
                let args = args.iter().map(|v| self.primitive_of(ctx, v)).collect();
                if returns_value {
                    return Ok(Step::Suspend(RequestKind::LibraryMethod {
                        class: object.class,
                        object: object.name,
                        method: method.to_string(),
                        args,
                    }));
                }
                self.emit(CommandKind::LibraryMethodCall {
                    class: object.class,
                    object: object.name,
                    method: method.to_string(),
                    args,
                });
                ctx.values.push(Value::Void);
                Ok(Step::Continue)
            }
        }
    }

    fn string_method(
        &self,
        ctx: &ExecutionContext,
        text: &str,
        method: &str,
        args: &[Value],
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        let name = format!("String.{}", method);
        let text_arg = |index: usize| -> Result<String, RuntimeError> {
            match args.get(index) {
                Some(Value::Char(c)) => Ok(((*c as u8) as char).to_string()),
                Some(value @ (Value::Str(_) | Value::Pointer(_))) => Ok(self.display_text(ctx, value)),
                other => Err(RuntimeError::type_mismatch(
                    format!(
                        "argument {} of {}() is {}, expected text",
                        index + 1,
                        name,
                        other.map_or("nothing", Value::type_name)
                    ),
                    location,
                )),
            }
        };
        let len = text.len() as i64;
        let position = |found: Option<usize>| Value::Int(found.map_or(-1, |i| i as i32));

        let value = match method {
            "length" => {
                check_arity(&name, args, 0..=0, location)?;
                Value::Int(len as i32)
            }
            "charAt" => {
                check_arity(&name, args, 1..=1, location)?;
                let index = int_arg(&name, args, 0, location)?;
                let byte = usize::try_from(index)
                    .ok()
                    .and_then(|i| text.as_bytes().get(i))
                    .copied()
                    .unwrap_or(0);
                Value::Char(byte as i8)
            }
            "indexOf" => {
                check_arity(&name, args, 1..=2, location)?;
                let needle = text_arg(0)?;
                let from = match args.len() {
                    2 => int_arg(&name, args, 1, location)?.clamp(0, len) as usize,
                    _ => 0,
                };
                position(text.get(from..).and_then(|rest| rest.find(&needle)).map(|i| i + from))
            }
            "lastIndexOf" => {
                check_arity(&name, args, 1..=1, location)?;
                position(text.rfind(&text_arg(0)?))
            }
            "substring" => {
                check_arity(&name, args, 1..=2, location)?;
                let from = int_arg(&name, args, 0, location)?.clamp(0, len) as usize;
                let to = match args.len() {
                    2 => int_arg(&name, args, 1, location)?.clamp(0, len) as usize,
                    _ => len as usize,
                };
                let (from, to) = if from > to { (to, from) } else { (from, to) };
                Value::Str(String::from_utf8_lossy(&text.as_bytes()[from..to]).into_owned())
            }
            "equals" => {
                check_arity(&name, args, 1..=1, location)?;
                Value::Bool(text == text_arg(0)?)
            }
            "equalsIgnoreCase" => {
                check_arity(&name, args, 1..=1, location)?;
                Value::Bool(text.eq_ignore_ascii_case(&text_arg(0)?))
            }
            "startsWith" => {
                check_arity(&name, args, 1..=1, location)?;
                Value::Bool(text.starts_with(&text_arg(0)?))
            }
            "endsWith" => {
                check_arity(&name, args, 1..=1, location)?;
                Value::Bool(text.ends_with(&text_arg(0)?))
            }
            "compareTo" => {
                check_arity(&name, args, 1..=1, location)?;
                Value::Int(match text.cmp(text_arg(0)?.as_str()) {
                    Ordering::Less => -1,
                    Ordering::Equal => 0,
                    Ordering::Greater => 1,
                })
            }
            "c_str" => {
                check_arity(&name, args, 0..=0, location)?;
                Value::Str(text.to_string())
            }
            "toInt" => {
                check_arity(&name, args, 0..=0, location)?;
                Value::Int(leading_int(text) as i32)
            }
            "toFloat" => {
                check_arity(&name, args, 0..=0, location)?;
                Value::Float(leading_float(text))
            }
            _ => {
                return Err(RuntimeError::unsupported(
                    format!("{}() is not supported", name),
                    location,
                ))
            }
        };
        Ok(value)
    }
}

/// Next value of `random(low, high)`, in `[low, high)`.
fn next_random(ctx: &mut ExecutionContext, low: i64, high: i64) -> i64 {
    if high <= low {
        return low;
    }
    ctx.rng_state = ctx
        .rng_state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    let span = high.wrapping_sub(low) as u64;
    low.wrapping_add(((ctx.rng_state >> 33) % span) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_in_base() {
        assert_eq!(integer_in_base(255, 16, true), "FF");
        assert_eq!(integer_in_base(255, 16, false), "ff");
        assert_eq!(integer_in_base(5, 2, true), "101");
        assert_eq!(integer_in_base(-1, 16, true), "FFFFFFFF");
        assert_eq!(integer_in_base(-12, 10, true), "-12");
        assert_eq!(integer_in_base(0, 8, true), "0");
    }

    #[test]
    fn test_leading_numbers() {
        assert_eq!(leading_int("  42abc"), 42);
        assert_eq!(leading_int("-7"), -7);
        assert_eq!(leading_int("abc"), 0);
        assert_eq!(leading_float("3.5V"), 3.5);
        assert_eq!(leading_float("x"), 0.0);
    }

    #[test]
    fn test_random_stays_in_range() {
        let mut ctx = ExecutionContext::new(1);
        for _ in 0..100 {
            let n = next_random(&mut ctx, 10, 20);
            assert!((10..20).contains(&n));
        }
        assert_eq!(next_random(&mut ctx, 5, 5), 5);
    }

    #[test]
    fn test_random_full_i64_range() {
        let mut ctx = ExecutionContext::new(3);
        for _ in 0..20 {
            let n = next_random(&mut ctx, i64::MIN, i64::MAX);
            assert!(n < i64::MAX);
        }
        let n = next_random(&mut ctx, -1, i64::MAX);
        assert!(n >= -1);
    }

    #[test]
    fn test_random_is_reproducible() {
        let mut a = ExecutionContext::new(7);
        let mut b = ExecutionContext::new(7);
        let first: Vec<i64> = (0..5).map(|_| next_random(&mut a, 0, 1000)).collect();
        let second: Vec<i64> = (0..5).map(|_| next_random(&mut b, 0, 1000)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_arity_reports_nearest_bound() {
        let err = check_arity("tone", &[Value::Int(1)], 2..=3, SourceLocation::new(1, 1)).unwrap_err();
        assert!(matches!(err, RuntimeError::ArgumentCountMismatch { expected: 2, got: 1, .. }));
        assert!(is_builtin("analogRead"));
        assert!(!is_builtin("printf"));
    }
}
