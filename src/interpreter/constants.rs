// Arduino core constants

use crate::memory::value::Value;
use std::f64::consts::{FRAC_PI_2, PI};

pub const LOW: i32 = 0;
pub const HIGH: i32 = 1;

pub const INPUT: i32 = 0;
pub const OUTPUT: i32 = 1;
pub const INPUT_PULLUP: i32 = 2;

pub const LED_BUILTIN: i32 = 13;

/// Pin number of `A0`; `A1`..`A7` follow
pub const A0: i32 = 14;

/// Seed of `random()` until the sketch calls `randomSeed`
pub const DEFAULT_RANDOM_SEED: u64 = 1;

/// Value of a predefined identifier, if `name` is one.
pub fn lookup(name: &str) -> Option<Value> {
    let value = match name {
        "LOW" => Value::Int(LOW),
        "HIGH" => Value::Int(HIGH),
        "INPUT" => Value::Int(INPUT),
        "OUTPUT" => Value::Int(OUTPUT),
        "INPUT_PULLUP" => Value::Int(INPUT_PULLUP),
        "LED_BUILTIN" => Value::Int(LED_BUILTIN),
        "DEC" => Value::Int(10),
        "HEX" => Value::Int(16),
        "OCT" => Value::Int(8),
        "BIN" => Value::Int(2),
        "LSBFIRST" => Value::Int(0),
        "MSBFIRST" => Value::Int(1),
        "PI" => Value::Float(PI),
        "HALF_PI" => Value::Float(FRAC_PI_2),
        "TWO_PI" => Value::Float(PI * 2.0),
        "DEG_TO_RAD" => Value::Float(PI / 180.0),
        "RAD_TO_DEG" => Value::Float(180.0 / PI),
        "NEO_GRB" => Value::Int(0x52),
        "NEO_RGB" => Value::Int(0x06),
        "NEO_KHZ800" => Value::Int(0x0000),
        "NEO_KHZ400" => Value::Int(0x0100),
        _ => {
            let pin = name.strip_prefix('A')?.parse::<i32>().ok()?;
            if !(0..8).contains(&pin) {
                return None;
            }
            Value::Int(A0 + pin)
        }
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analog_pins() {
        assert_eq!(lookup("A0"), Some(Value::Int(14)));
        assert_eq!(lookup("A7"), Some(Value::Int(21)));
        assert_eq!(lookup("A8"), None);
        assert_eq!(lookup("Apple"), None);
    }
}
