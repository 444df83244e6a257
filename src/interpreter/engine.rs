//! Execution state machine
//!
//! [`Interpreter`] owns the run state, the pending request and the command
//! emitter, and exposes the host control surface (`start`, `tick`, `step`,
//! `pause`, `resume`, `stop`, `resume_with_value`). The frame machine in
//! [`super::machine`] does the actual evaluation one unit at a time.
//!
//! ```text
//!            start()              suspend              resume_with_value()
//!   Idle ─────────────► Running ─────────► WaitingForResponse ───────► Running
//!    │                   │  ▲                                          (or Paused
//!    │ step()    pause() │  │ resume()                                  when stepping)
//!    └──────► Stepping ──┴► Paused
//! ```
//!
//! Runtime failures never escape the public API. A fatal error emits one
//! `Error` command and parks the machine in [`ExecutionState::Error`]; the
//! loop limit ends the run in [`ExecutionState::Complete`].

use crate::commands::{next_request_id, Command, CommandEmitter, CommandKind, CommandListener, Primitive, RequestKind};
use crate::config::Config;
use crate::interpreter::constants::DEFAULT_RANDOM_SEED;
use crate::interpreter::errors::RuntimeError;
use crate::interpreter::library::LibraryTable;
use crate::interpreter::machine::{ExecutionContext, Unit};
use crate::interpreter::type_system::c_string_at;
use crate::memory::environment::StructTable;
use crate::memory::value::Value;
use crate::parser::ast::{NodeId, NodeKind, Program};
use crate::parser::MacroTable;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionState {
    Idle,
    Running,
    Stepping,
    Paused,
    WaitingForResponse,
    Complete,
    Error,
}

impl ExecutionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionState::Complete | ExecutionState::Error)
    }
}

/// A request the host has not answered yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub request_id: u64,
    pub kind: RequestKind,
    /// State to enter once the response has been consumed
    pub resume_target: ExecutionState,
}

/// Interpreter for one parsed sketch
pub struct Interpreter<'p> {
    pub(crate) program: &'p Program,

    /// Top-level function definitions by name
    pub(crate) functions: FxHashMap<String, NodeId>,

    pub(crate) structs: StructTable,

    /// Object-like `#define`s
    pub(crate) macros: MacroTable,

    pub(crate) library: LibraryTable,

    pub(crate) config: Config,

    emitter: CommandEmitter,

    state: ExecutionState,

    /// Live run state; `None` until the first `start()`/`step()` and after `stop()`
    context: Option<ExecutionContext>,

    pending: Option<PendingRequest>,
}

impl<'p> Interpreter<'p> {
    pub fn new(program: &'p Program, config: Config) -> Self {
        let mut functions = FxHashMap::default();
        let mut structs = StructTable::default();

        for &item in &program.items {
            match program.kind(item) {
                NodeKind::FunctionDef { name, .. } => {
                    functions.insert(name.clone(), item);
                }
                NodeKind::StructDef { name, fields } => {
                    structs.insert(name.clone(), fields.clone());
                }
                _ => {}
            }
        }

        Interpreter {
            program,
            functions,
            structs,
            macros: MacroTable::new(),
            library: LibraryTable::with_defaults(),
            config,
            emitter: CommandEmitter::new(),
            state: ExecutionState::Idle,
            context: None,
            pending: None,
        }
    }

    pub fn with_macros(mut self, macros: MacroTable) -> Self {
        self.macros = macros;
        self
    }

    pub fn with_library(mut self, library: LibraryTable) -> Self {
        self.library = library;
        self
    }

    pub fn add_listener(&mut self, listener: Box<dyn CommandListener>) {
        self.emitter.add_listener(listener);
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    /// Every command emitted in the current run.
    pub fn commands(&self) -> &[Command] {
        self.emitter.history()
    }

    pub fn pending_request(&self) -> Option<&PendingRequest> {
        self.pending.as_ref()
    }

    pub fn context(&self) -> Option<&ExecutionContext> {
        self.context.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn emit(&mut self, kind: CommandKind) {
        if self.config.verbose {
            debug!(command = ?kind, "emit");
        }
        self.emitter.emit(kind);
    }

    /// Command payload for `value`. A pointer to a `char` array travels as its
    /// text, any other pointer as `&name`.
    pub(crate) fn primitive_of(&self, ctx: &ExecutionContext, value: &Value) -> Primitive {
        match value {
            Value::Pointer(place) => match c_string_at(ctx, place) {
                Some(text) => Primitive::Text(text),
                None => Primitive::Text(format!("&{}", ctx.env.place_name(place))),
            },
            Value::Array(items) => Primitive::List(items.iter().map(|v| self.primitive_of(ctx, v)).collect()),
            other => other.to_primitive(),
        }
    }

    fn begin_run(&mut self) {
        self.emitter.reset();
        self.pending = None;
        self.context = Some(ExecutionContext::new(DEFAULT_RANDOM_SEED));
        debug!(functions = self.functions.len(), "program start");
        self.emit(CommandKind::ProgramStart);
    }

    /// Begin a fresh run. Only valid from `Idle`.
    pub fn start(&mut self) -> bool {
        if self.state != ExecutionState::Idle {
            return false;
        }
        self.begin_run();
        self.state = ExecutionState::Running;
        true
    }

    /// Run exactly one unit and land in `Paused`. From `Idle` this begins the
    /// program first.
    pub fn step(&mut self) -> bool {
        match self.state {
            ExecutionState::Idle => self.begin_run(),
            ExecutionState::Paused => {}
            _ => return false,
        }
        self.state = ExecutionState::Stepping;
        self.run_and_settle(false);
        if self.state == ExecutionState::Stepping {
            self.state = ExecutionState::Paused;
        }
        true
    }

    /// One unit of progress while `Running`. Returns whether anything ran.
    pub fn tick(&mut self) -> bool {
        if self.state != ExecutionState::Running {
            return false;
        }
        self.run_and_settle(false);
        true
    }

    pub fn pause(&mut self) -> bool {
        match self.state {
            ExecutionState::Running => {
                self.state = ExecutionState::Paused;
                true
            }
            ExecutionState::WaitingForResponse => self.retarget(ExecutionState::Paused),
            _ => false,
        }
    }

    pub fn resume(&mut self) -> bool {
        match self.state {
            ExecutionState::Paused => {
                self.state = ExecutionState::Running;
                true
            }
            ExecutionState::WaitingForResponse => self.retarget(ExecutionState::Running),
            _ => false,
        }
    }

    fn retarget(&mut self, target: ExecutionState) -> bool {
        match self.pending.as_mut() {
            Some(pending) => {
                pending.resume_target = target;
                true
            }
            None => false,
        }
    }

    /// Abandon the run. Scopes are dropped with the context, the pending
    /// request is forgotten and the emitter is sealed.
    pub fn stop(&mut self) {
        if matches!(self.state, ExecutionState::Idle) || self.state.is_terminal() {
            return;
        }
        debug!(state = ?self.state, "stop");
        self.context = None;
        self.pending = None;
        self.emitter.seal();
        self.state = ExecutionState::Idle;
    }

    /// Answer the pending request `request_id` and finish the interrupted
    /// unit. Unknown, answered or cancelled ids are ignored.
    pub fn resume_with_value(&mut self, request_id: u64, value: Primitive) -> bool {
        let is_pending = self.state == ExecutionState::WaitingForResponse
            && self.pending.as_ref().is_some_and(|p| p.request_id == request_id);
        if !is_pending {
            let err = RuntimeError::StaleRequestResponse { request_id };
            warn!(%err, "ignoring response");
            return false;
        }
        let (Some(pending), Some(ctx)) = (self.pending.take(), self.context.as_mut()) else {
            return false;
        };

        debug!(request_id, kind = ?pending.kind, "response");
        ctx.values.push(response_value(&pending.kind, &value));
        self.state = match pending.resume_target {
            ExecutionState::Paused => ExecutionState::Stepping,
            _ => ExecutionState::Running,
        };
        self.run_and_settle(true);
        if self.state == ExecutionState::Stepping {
            self.state = ExecutionState::Paused;
        }
        true
    }

    /// Tick until the machine leaves `Running`.
    pub fn run_until_blocked(&mut self) -> ExecutionState {
        while self.state == ExecutionState::Running {
            self.tick();
        }
        self.state
    }

    /// Run to the end, answering every request with `responder`.
    pub fn run_with(&mut self, mut responder: impl FnMut(&RequestKind) -> Primitive) -> ExecutionState {
        if self.state == ExecutionState::Idle {
            self.start();
        }
        loop {
            match self.state {
                ExecutionState::Running => {
                    self.tick();
                }
                ExecutionState::WaitingForResponse => {
                    let Some(pending) = self.pending.clone() else {
                        break;
                    };
                    let value = responder(&pending.kind);
                    self.resume_with_value(pending.request_id, value);
                }
                _ => break,
            }
        }
        self.state
    }

    fn run_and_settle(&mut self, started: bool) {
        let Some(mut ctx) = self.context.take() else {
            return;
        };
        let outcome = self.run_unit(&mut ctx, started);
        self.context = Some(ctx);

        match outcome {
            Ok(Unit::Boundary) => {}
            Ok(Unit::Suspended(kind)) => self.suspend(kind),
            Ok(Unit::Finished) => self.finish(),
            Err(err) => self.fail(err),
        }
    }

    fn suspend(&mut self, kind: RequestKind) {
        debug_assert!(self.pending.is_none(), "a request is already pending");

        let request_id = next_request_id();
        let resume_target = match self.state {
            ExecutionState::Stepping => ExecutionState::Paused,
            _ => ExecutionState::Running,
        };
        debug!(request_id, ?kind, "waiting for response");
        self.emit(kind.command(request_id));
        self.pending = Some(PendingRequest {
            request_id,
            kind,
            resume_target,
        });
        self.state = ExecutionState::WaitingForResponse;
    }

    fn finish(&mut self) {
        debug!("program end");
        self.emit(CommandKind::ProgramEnd);
        self.emitter.seal();
        self.state = ExecutionState::Complete;
    }

    fn fail(&mut self, err: RuntimeError) {
        self.pending = None;
        if !err.is_fatal() {
            if let RuntimeError::LoopLimitExceeded { iterations } = err {
                debug!(iterations, "loop limit reached");
                self.emit(CommandKind::LoopLimitReached { iterations });
            }
            self.finish();
            return;
        }

        debug!(%err, "runtime error");
        let location = err.location().copied().unwrap_or_default();
        self.emit(CommandKind::Error {
            kind: err.kind().name().to_string(),
            message: err.to_string(),
            line: location.line,
            column: location.column,
        });
        self.emitter.seal();
        self.state = ExecutionState::Error;
    }
}

/// Runtime value for the host's answer to `kind`.
fn response_value(kind: &RequestKind, value: &Primitive) -> Value {
    let as_int = || match value {
        Primitive::Int(n) => *n,
        Primitive::Float(f) => *f as i64,
        Primitive::Bool(b) => *b as i64,
        Primitive::Text(s) => s.trim().parse().unwrap_or(0),
        Primitive::List(_) => 0,
    };
    match kind {
        RequestKind::AnalogRead { .. } | RequestKind::DigitalRead { .. } => Value::Int(as_int() as i32),
        RequestKind::Millis | RequestKind::Micros => Value::UInt(as_int() as u32),
        RequestKind::LibraryMethod { .. } => Value::from_primitive(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_sketch;

    fn sketch(source: &str) -> Program {
        parse_sketch(source).unwrap().program
    }

    #[test]
    fn test_start_only_from_idle() {
        let program = sketch("void setup() {} void loop() {}");
        let mut interp = Interpreter::new(&program, Config::default());
        assert!(interp.start());
        assert!(!interp.start());
        assert_eq!(interp.state(), ExecutionState::Running);
    }

    #[test]
    fn test_tick_does_nothing_unless_running() {
        let program = sketch("void setup() {}");
        let mut interp = Interpreter::new(&program, Config::default());
        assert!(!interp.tick());
        assert!(interp.commands().is_empty());
    }

    #[test]
    fn test_empty_sketch_completes() {
        let program = sketch("int x = 1;");
        let mut interp = Interpreter::new(&program, Config::default());
        interp.start();
        assert_eq!(interp.run_until_blocked(), ExecutionState::Complete);
        let kinds: Vec<_> = interp.commands().iter().map(|c| c.kind.clone()).collect();
        assert_eq!(kinds.first(), Some(&CommandKind::ProgramStart));
        assert_eq!(kinds.last(), Some(&CommandKind::ProgramEnd));
    }

    #[test]
    fn test_pause_and_resume_while_running() {
        let program = sketch("void loop() { delay(1); }");
        let mut interp = Interpreter::new(&program, Config::default());
        interp.start();
        assert!(interp.pause());
        assert!(!interp.tick());
        assert!(interp.resume());
        assert_eq!(interp.run_until_blocked(), ExecutionState::Complete);
    }

    #[test]
    fn test_response_values_follow_request_kind() {
        assert_eq!(
            response_value(&RequestKind::AnalogRead { pin: 14 }, &Primitive::Int(742)),
            Value::Int(742)
        );
        assert_eq!(
            response_value(&RequestKind::Millis, &Primitive::Int(-1)),
            Value::UInt(u32::MAX)
        );
        assert_eq!(
            response_value(
                &RequestKind::LibraryMethod {
                    class: "Servo".to_string(),
                    object: "arm".to_string(),
                    method: "read".to_string(),
                    args: Vec::new(),
                },
                &Primitive::Float(1.5)
            ),
            Value::Float(1.5)
        );
    }
}
