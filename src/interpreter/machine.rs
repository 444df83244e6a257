//! Explicit frame machine
//!
//! The evaluator never recurses on the Rust stack. Work is a stack of
//! [`Frame`]s plus a stack of operand [`Value`]s, both held in the
//! [`ExecutionContext`]. Each step pops the top frame and either finishes it,
//! replaces it with a continuation frame, or pushes child frames above it.
//!
//! Suspension falls out of this shape: a builtin that needs host data
//! (`analogRead`, `millis`, a library query) pops its frame and returns
//! [`Step::Suspend`] instead of pushing a result. Everything needed to resume
//! is already on the two stacks, so the host's answer is pushed as the
//! missing value and the machine carries on from the very next frame.
//!
//! # Units
//!
//! [`Interpreter::run_unit`] runs until the next *boundary*: the start of a
//! statement, a loop condition re-check, or the next `loop()` call. One unit
//! is what `tick()` and `step()` perform.

use crate::commands::RequestKind;
use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::RuntimeError;
use crate::memory::value::{ObjectRef, Value};
use crate::memory::{Environment, Variable};
use crate::parser::ast::{BaseType, NodeId, NodeKind, SourceLocation, Type};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// All mutable state of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub env: Environment,
    pub frames: Vec<Frame>,
    pub values: Vec<Value>,
    /// State of the `random()` generator
    pub rng_state: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgramPhase {
    /// Executing top-level declarations, starting at item `next`
    Globals { next: usize },
    Setup,
    /// `loop()` has returned `completed` times
    Loop { completed: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopPhase {
    /// Evaluate the condition
    Cond,
    /// Condition value is on the operand stack
    Test,
    /// Run the body without testing (first pass of `do`/`while`)
    Body,
    /// Body finished; run the `for` increment
    Step,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Frame {
    Program {
        phase: ProgramPhase,
    },

    // Statements
    Exec {
        node: NodeId,
    },
    Block {
        node: NodeId,
        next: usize,
        scoped: bool,
    },
    Discard,
    Declare {
        node: NodeId,
    },
    Construct {
        node: NodeId,
    },
    Branch {
        node: NodeId,
    },
    Loop {
        node: NodeId,
        phase: LoopPhase,
        iterations: u64,
        scoped: bool,
    },
    SwitchSelect {
        node: NodeId,
    },
    Switch {
        node: NodeId,
        case: usize,
        next: usize,
    },
    Return {
        node: NodeId,
    },

    // Calls
    Call {
        function: NodeId,
        argc: usize,
        location: SourceLocation,
    },
    CallReturn {
        return_type: Type,
        value_height: usize,
        returned: bool,
        location: SourceLocation,
    },
    Builtin {
        node: NodeId,
    },
    Method {
        node: NodeId,
    },

    // Expressions
    Eval {
        node: NodeId,
    },
    /// Evaluate an lvalue; pushes `Value::Pointer(place)`
    EvalPlace {
        node: NodeId,
    },
    Load {
        node: NodeId,
    },
    Binary {
        node: NodeId,
    },
    Logical {
        node: NodeId,
        rhs: bool,
    },
    Unary {
        node: NodeId,
    },
    IncDec {
        node: NodeId,
    },
    Select {
        node: NodeId,
    },
    Assign {
        node: NodeId,
    },
    CompoundAssign {
        node: NodeId,
    },
    Cast {
        node: NodeId,
    },
    Collect {
        count: usize,
    },
    IndexPlace {
        node: NodeId,
        from_place: bool,
    },
    FieldPlace {
        node: NodeId,
    },
    DerefPlace {
        node: NodeId,
        from_place: bool,
    },
}

/// Result of executing one frame
#[derive(Debug)]
pub(crate) enum Step {
    Continue,
    Suspend(RequestKind),
}

/// Result of running one unit
#[derive(Debug)]
pub(crate) enum Unit {
    Boundary,
    Suspended(RequestKind),
    Finished,
}

impl ExecutionContext {
    pub fn new(seed: u64) -> Self {
        let mut env = Environment::new();
        let serial = Variable::new(
            "Serial",
            Type::new(BaseType::Class("Serial".to_string())),
            Value::Object(ObjectRef {
                class: "Serial".to_string(),
                name: "Serial".to_string(),
            }),
        );
        // A fresh environment has no bindings yet
        let _ = env.declare(serial);

        ExecutionContext {
            env,
            frames: vec![Frame::Program {
                phase: ProgramPhase::Globals { next: 0 },
            }],
            values: Vec::new(),
            rng_state: seed,
        }
    }

    pub(crate) fn pop_value(&mut self, location: SourceLocation) -> Result<Value, RuntimeError> {
        self.values
            .pop()
            .ok_or_else(|| RuntimeError::unsupported("operand stack underflow", location))
    }

    /// Pop `count` values, returned in evaluation order.
    pub(crate) fn pop_values(
        &mut self,
        count: usize,
        location: SourceLocation,
    ) -> Result<Vec<Value>, RuntimeError> {
        let at = self
            .values
            .len()
            .checked_sub(count)
            .ok_or_else(|| RuntimeError::unsupported("operand stack underflow", location))?;
        Ok(self.values.split_off(at))
    }

    /// Push frames so that they run in the given order.
    pub(crate) fn push_in_order(&mut self, frames: impl DoubleEndedIterator<Item = Frame>) {
        self.frames.extend(frames.rev());
    }
}

impl Interpreter<'_> {
    /// Run frames until the next boundary, a suspension, or the end of the
    /// program. With `started` set the unit is already in progress (a
    /// resumed request), so the very next boundary ends it.
    pub(crate) fn run_unit(
        &mut self,
        ctx: &mut ExecutionContext,
        mut started: bool,
    ) -> Result<Unit, RuntimeError> {
        loop {
            let Some(top) = ctx.frames.last() else {
                return Ok(Unit::Finished);
            };
            if self.is_boundary(top) {
                if started {
                    return Ok(Unit::Boundary);
                }
                started = true;
            }

            let Some(frame) = ctx.frames.pop() else {
                return Ok(Unit::Finished);
            };
            if self.config.debug {
                trace!(?frame, depth = ctx.frames.len(), values = ctx.values.len(), "frame");
            }
            if let Step::Suspend(request) = self.step_frame(ctx, frame)? {
                return Ok(Unit::Suspended(request));
            }
        }
    }

    fn is_boundary(&self, frame: &Frame) -> bool {
        match frame {
            Frame::Exec { node } => !matches!(
                self.program.kind(*node),
                NodeKind::Block { .. } | NodeKind::DeclGroup { .. }
            ),
            Frame::Loop {
                phase: LoopPhase::Cond,
                iterations,
                ..
            } => *iterations > 0,
            Frame::Program {
                phase: ProgramPhase::Loop { completed },
            } => *completed > 0,
            _ => false,
        }
    }

    fn step_frame(&mut self, ctx: &mut ExecutionContext, frame: Frame) -> Result<Step, RuntimeError> {
        match frame {
            Frame::Builtin { node } => return self.call_builtin(ctx, node),
            Frame::Method { node } => return self.call_method(ctx, node),

            Frame::Program { phase } => self.step_program(ctx, phase)?,
            Frame::Exec { node } => self.exec_statement(ctx, node)?,
            Frame::Block { node, next, scoped } => self.step_block(ctx, node, next, scoped),
            Frame::Discard => {
                ctx.values.pop();
            }
            Frame::Declare { node } => {
                let value = ctx.pop_value(self.program.location(node))?;
                self.declare_variable(ctx, node, Some(value))?;
            }
            Frame::Construct { node } => self.construct_object(ctx, node)?,
            Frame::Branch { node } => self.step_branch(ctx, node)?,
            Frame::Loop {
                node,
                phase,
                iterations,
                scoped,
            } => self.step_loop(ctx, node, phase, iterations, scoped)?,
            Frame::SwitchSelect { node } => self.select_case(ctx, node)?,
            Frame::Switch { node, case, next } => self.step_switch(ctx, node, case, next),
            Frame::Return { node } => self.exec_return(ctx, node)?,
            Frame::Call {
                function,
                argc,
                location,
            } => {
                let args = ctx.pop_values(argc, location)?;
                self.enter_function(ctx, function, args, location)?;
            }
            Frame::CallReturn {
                return_type,
                value_height,
                returned,
                location,
            } => self.finish_call(ctx, return_type, value_height, returned, location)?,

            Frame::Eval { node } => self.eval(ctx, node)?,
            Frame::EvalPlace { node } => self.eval_place(ctx, node)?,
            Frame::Load { node } => self.load(ctx, node)?,
            Frame::Binary { node } => self.apply_binary(ctx, node)?,
            Frame::Logical { node, rhs } => self.step_logical(ctx, node, rhs)?,
            Frame::Unary { node } => self.apply_unary(ctx, node)?,
            Frame::IncDec { node } => self.apply_inc_dec(ctx, node)?,
            Frame::Select { node } => self.step_select(ctx, node)?,
            Frame::Assign { node } => self.apply_assign(ctx, node)?,
            Frame::CompoundAssign { node } => self.apply_compound_assign(ctx, node)?,
            Frame::Cast { node } => self.apply_cast(ctx, node)?,
            Frame::Collect { count } => {
                let items = ctx.pop_values(count, SourceLocation::default())?;
                ctx.values.push(Value::Array(items));
            }
            Frame::IndexPlace { node, from_place } => self.index_place(ctx, node, from_place)?,
            Frame::FieldPlace { node } => self.field_place(ctx, node)?,
            Frame::DerefPlace { node, from_place } => self.deref_place(ctx, node, from_place)?,
        }
        Ok(Step::Continue)
    }

    /// Drive the sketch: globals, then `setup()`, then `loop()` repeatedly.
    fn step_program(&mut self, ctx: &mut ExecutionContext, phase: ProgramPhase) -> Result<(), RuntimeError> {
        match phase {
            ProgramPhase::Globals { next } => {
                let pending = self
                    .program
                    .items
                    .iter()
                    .copied()
                    .enumerate()
                    .skip(next)
                    .find(|&(_, item)| {
                        matches!(
                            self.program.kind(item),
                            NodeKind::VarDecl { .. } | NodeKind::ObjectDecl { .. } | NodeKind::DeclGroup { .. }
                        )
                    });
                match pending {
                    Some((index, item)) => {
                        ctx.frames.push(Frame::Program {
                            phase: ProgramPhase::Globals { next: index + 1 },
                        });
                        ctx.frames.push(Frame::Exec { node: item });
                    }
                    None => ctx.frames.push(Frame::Program {
                        phase: ProgramPhase::Setup,
                    }),
                }
            }
            ProgramPhase::Setup => {
                ctx.frames.push(Frame::Program {
                    phase: ProgramPhase::Loop { completed: 0 },
                });
                if let Some(&setup) = self.functions.get("setup") {
                    debug!("entering setup()");
                    ctx.frames.push(Frame::Discard);
                    self.enter_function(ctx, setup, Vec::new(), self.program.location(setup))?;
                }
            }
            ProgramPhase::Loop { completed } => {
                let Some(&body) = self.functions.get("loop") else {
                    return Ok(());
                };
                if completed >= self.config.max_loop_iterations {
                    return Err(RuntimeError::LoopLimitExceeded {
                        iterations: completed,
                    });
                }
                debug!(iteration = completed + 1, "entering loop()");
                ctx.frames.push(Frame::Program {
                    phase: ProgramPhase::Loop {
                        completed: completed + 1,
                    },
                });
                ctx.frames.push(Frame::Discard);
                self.enter_function(ctx, body, Vec::new(), self.program.location(body))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_knows_serial() {
        let ctx = ExecutionContext::new(1);
        assert!(matches!(ctx.env.get("Serial"), Some(Value::Object(obj)) if obj.class == "Serial"));
        assert_eq!(ctx.frames.len(), 1);
    }

    #[test]
    fn test_frames_serialize_with_tag() {
        let frame = Frame::Loop {
            node: 4,
            phase: LoopPhase::Test,
            iterations: 2,
            scoped: true,
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["t"], "Loop");
        let back: Frame = serde_json::from_value(json).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn test_pop_values_keeps_order() {
        let mut ctx = ExecutionContext::new(1);
        ctx.values.extend([Value::Int(1), Value::Int(2), Value::Int(3)]);
        let args = ctx.pop_values(2, SourceLocation::default()).unwrap();
        assert_eq!(args, vec![Value::Int(2), Value::Int(3)]);
        assert!(ctx.pop_values(5, SourceLocation::default()).is_err());
    }
}
