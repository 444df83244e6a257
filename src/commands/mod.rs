//! Command vocabulary
//!
//! Every observable effect of a sketch (pin writes, delays, serial output,
//! library calls, variable updates, host requests) becomes one [`Command`].
//! Payloads are restricted to [`Primitive`] values so a command can always be
//! serialized and never holds on to interpreter state.
//!
//! Commands serialize as flat JSON records:
//!
//! ```text
//! {"seq":3,"type":"DigitalWrite","pin":13,"value":1}
//! {"seq":4,"type":"AnalogReadRequest","requestId":7,"pin":14}
//! ```

pub mod emitter;

pub use emitter::{next_request_id, CommandEmitter, CommandListener};

use serde::{Deserialize, Serialize};

/// Closed set of payload values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Primitive {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Primitive>),
}

impl From<i64> for Primitive {
    fn from(n: i64) -> Self {
        Primitive::Int(n)
    }
}

impl From<f64> for Primitive {
    fn from(f: f64) -> Self {
        Primitive::Float(f)
    }
}

impl From<bool> for Primitive {
    fn from(b: bool) -> Self {
        Primitive::Bool(b)
    }
}

impl From<&str> for Primitive {
    fn from(s: &str) -> Self {
        Primitive::Text(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum CommandKind {
    ProgramStart,
    ProgramEnd,
    LoopLimitReached {
        iterations: u64,
    },
    PinMode {
        pin: i64,
        mode: i64,
    },
    DigitalWrite {
        pin: i64,
        value: i64,
    },
    AnalogWrite {
        pin: i64,
        value: i64,
    },
    Delay {
        ms: i64,
    },
    DelayMicroseconds {
        us: i64,
    },
    Tone {
        pin: i64,
        frequency: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<i64>,
    },
    NoTone {
        pin: i64,
    },
    SerialBegin {
        baud: i64,
    },
    SerialPrint {
        text: String,
    },
    SerialPrintln {
        text: String,
    },
    SerialWrite {
        byte: i64,
    },
    LibraryObjectCreated {
        class: String,
        name: String,
        args: Vec<Primitive>,
    },
    LibraryMethodCall {
        class: String,
        object: String,
        method: String,
        args: Vec<Primitive>,
    },
    VarSet {
        name: String,
        value: Primitive,
    },
    AnalogReadRequest {
        request_id: u64,
        pin: i64,
    },
    DigitalReadRequest {
        request_id: u64,
        pin: i64,
    },
    MillisRequest {
        request_id: u64,
    },
    MicrosRequest {
        request_id: u64,
    },
    LibraryMethodRequest {
        request_id: u64,
        class: String,
        object: String,
        method: String,
        args: Vec<Primitive>,
    },
    Error {
        kind: String,
        message: String,
        line: u32,
        column: u32,
    },
}

impl CommandKind {
    /// Request id carried by request commands.
    pub fn request_id(&self) -> Option<u64> {
        match self {
            CommandKind::AnalogReadRequest { request_id, .. }
            | CommandKind::DigitalReadRequest { request_id, .. }
            | CommandKind::MillisRequest { request_id }
            | CommandKind::MicrosRequest { request_id }
            | CommandKind::LibraryMethodRequest { request_id, .. } => Some(*request_id),
            _ => None,
        }
    }
}

/// One emitted command with its position in the stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub seq: u64,
    #[serde(flatten)]
    pub kind: CommandKind,
}

/// Host data the interpreter is waiting for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RequestKind {
    AnalogRead {
        pin: i64,
    },
    DigitalRead {
        pin: i64,
    },
    Millis,
    Micros,
    LibraryMethod {
        class: String,
        object: String,
        method: String,
        args: Vec<Primitive>,
    },
}

impl RequestKind {
    /// The request command announcing this request under `request_id`.
    pub fn command(&self, request_id: u64) -> CommandKind {
        match self {
            RequestKind::AnalogRead { pin } => CommandKind::AnalogReadRequest {
                request_id,
                pin: *pin,
            },
            RequestKind::DigitalRead { pin } => CommandKind::DigitalReadRequest {
                request_id,
                pin: *pin,
            },
            RequestKind::Millis => CommandKind::MillisRequest { request_id },
            RequestKind::Micros => CommandKind::MicrosRequest { request_id },
            RequestKind::LibraryMethod {
                class,
                object,
                method,
                args,
            } => CommandKind::LibraryMethodRequest {
                request_id,
                class: class.clone(),
                object: object.clone(),
                method: method.clone(),
                args: args.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_json_shape() {
        let command = Command {
            seq: 3,
            kind: CommandKind::DigitalWrite { pin: 13, value: 1 },
        };
        let json = serde_json::to_value(&command).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"seq": 3, "type": "DigitalWrite", "pin": 13, "value": 1})
        );
    }

    #[test]
    fn test_request_fields_are_camel_case() {
        let kind = RequestKind::AnalogRead { pin: 14 }.command(7);
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["requestId"], 7);
        assert_eq!(kind.request_id(), Some(7));
    }

    #[test]
    fn test_primitive_untagged() {
        let value: Primitive = serde_json::from_str("[1, 2.5, \"x\", true]").unwrap();
        assert_eq!(
            value,
            Primitive::List(vec![
                Primitive::Int(1),
                Primitive::Float(2.5),
                Primitive::Text("x".to_string()),
                Primitive::Bool(true),
            ])
        );
    }
}
