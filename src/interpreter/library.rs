//! Library routing table
//!
//! Maps `(class, method)` to what a call on a library object does:
//!
//! - [`MethodRoute::Internal`] computes the result inside the interpreter
//!   (pure helpers such as `Adafruit_NeoPixel::Color`)
//! - [`MethodRoute::External`] emits a `LibraryMethodCall` command; when the
//!   method returns a value the interpreter suspends with a
//!   `LibraryMethodRequest` instead and the host supplies the result
//!
//! Hosts can extend or replace the defaults with [`LibraryTable::register`].

use crate::memory::value::Value;
use rustc_hash::FxHashMap;

/// Synchronous implementation of an internal method. `None` rejects the arguments.
pub type InternalMethod = fn(&[Value]) -> Option<Value>;

#[derive(Debug, Clone, Copy)]
pub enum MethodRoute {
    Internal(InternalMethod),
    External { returns_value: bool },
}

#[derive(Debug, Clone, Default)]
pub struct LibraryTable {
    routes: FxHashMap<String, FxHashMap<String, MethodRoute>>,
}

const SERVO_COMMANDS: &[&str] = &["attach", "write", "writeMicroseconds", "detach"];
const SERVO_QUERIES: &[&str] = &["read", "attached"];

const NEOPIXEL_COMMANDS: &[&str] = &["begin", "show", "clear", "setPixelColor", "setBrightness", "fill"];
const NEOPIXEL_QUERIES: &[&str] = &["getPixelColor", "numPixels"];

const LCD_COMMANDS: &[&str] = &["begin", "print", "clear", "setCursor", "home"];

fn neopixel_color(args: &[Value]) -> Option<Value> {
    let channel = |i: usize| args.get(i).and_then(Value::as_i64).map(|c| (c as u32) & 0xff);
    let (r, g, b) = (channel(0)?, channel(1)?, channel(2)?);
    let w = if args.len() > 3 { channel(3)? } else { 0 };
    Some(Value::UInt((w << 24) | (r << 16) | (g << 8) | b))
}

impl LibraryTable {
    /// An empty table: every library call is rejected.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Routes for `Servo`, `Adafruit_NeoPixel` and `LiquidCrystal`.
    pub fn with_defaults() -> Self {
        let mut table = Self::empty();
        for method in SERVO_COMMANDS {
            table.register("Servo", method, MethodRoute::External { returns_value: false });
        }
        for method in SERVO_QUERIES {
            table.register("Servo", method, MethodRoute::External { returns_value: true });
        }
        for method in NEOPIXEL_COMMANDS {
            table.register("Adafruit_NeoPixel", method, MethodRoute::External { returns_value: false });
        }
        for method in NEOPIXEL_QUERIES {
            table.register("Adafruit_NeoPixel", method, MethodRoute::External { returns_value: true });
        }
        table.register("Adafruit_NeoPixel", "Color", MethodRoute::Internal(neopixel_color));
        for method in LCD_COMMANDS {
            table.register("LiquidCrystal", method, MethodRoute::External { returns_value: false });
        }
        table
    }

    pub fn register(&mut self, class: &str, method: &str, route: MethodRoute) {
        self.routes
            .entry(class.to_string())
            .or_default()
            .insert(method.to_string(), route);
    }

    pub fn route(&self, class: &str, method: &str) -> Option<MethodRoute> {
        self.routes.get(class)?.get(method).copied()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.routes.contains_key(class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_routes() {
        let table = LibraryTable::with_defaults();
        assert!(matches!(
            table.route("Servo", "read"),
            Some(MethodRoute::External { returns_value: true })
        ));
        assert!(matches!(
            table.route("Servo", "write"),
            Some(MethodRoute::External { returns_value: false })
        ));
        assert!(table.route("Servo", "explode").is_none());
        assert!(table.has_class("LiquidCrystal"));
    }

    #[test]
    fn test_color_is_internal() {
        let table = LibraryTable::with_defaults();
        let Some(MethodRoute::Internal(color)) = table.route("Adafruit_NeoPixel", "Color") else {
            panic!("Color should be internal");
        };
        assert_eq!(
            color(&[Value::Int(255), Value::Int(0), Value::Int(16)]),
            Some(Value::UInt(0xff0010))
        );
        assert_eq!(color(&[Value::Int(1)]), None);
    }
}
