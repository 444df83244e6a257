//! Loop and `switch` frames.
//!
//! `while`, `do`/`while` and `for` share one [`Frame::Loop`] that cycles
//! through [`LoopPhase`]s. While the body runs, the loop frame waits beneath
//! it in phase `Step`, which is where `continue` lands.
//!
//! `switch` selects its arm once, then walks the arms from there so that a
//! missing `break` falls through into the next arm.

use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::RuntimeError;
use crate::interpreter::machine::{ExecutionContext, Frame, LoopPhase};
use crate::interpreter::ops::binary_op;
use crate::interpreter::statements::truth;
use crate::memory::value::Value;
use crate::memory::ScopeKind;
use crate::parser::ast::{NodeId, NodeKind, SourceLocation, UnOp};

impl Interpreter<'_> {
    pub(crate) fn step_loop(
        &mut self,
        ctx: &mut ExecutionContext,
        node: NodeId,
        phase: LoopPhase,
        iterations: u64,
        scoped: bool,
    ) -> Result<(), RuntimeError> {
        let program = self.program;
        let location = program.location(node);
        let (condition, body, increment) = match program.kind(node) {
            NodeKind::While { condition, body } => (Some(*condition), *body, None),
            NodeKind::DoWhile { body, condition } => (Some(*condition), *body, None),
            NodeKind::For {
                condition,
                increment,
                body,
                ..
            } => (*condition, *body, *increment),
            _ => return Err(RuntimeError::unsupported("loop expected", location)),
        };
        let frame = move |phase, iterations| Frame::Loop {
            node,
            phase,
            iterations,
            scoped,
        };

        match phase {
            LoopPhase::Cond => {
                ctx.frames.push(frame(LoopPhase::Test, iterations));
                match condition {
                    Some(condition) => ctx.frames.push(Frame::Eval { node: condition }),
                    // `for (;;)`
                    None => ctx.values.push(Value::Bool(true)),
                }
            }
            LoopPhase::Test => {
                let value = ctx.pop_value(location)?;
                if !truth(&value, location)? {
                    if scoped {
                        ctx.env.pop_scope();
                    }
                    return Ok(());
                }
                self.check_iteration_cap(iterations, location)?;
                ctx.frames.push(frame(LoopPhase::Step, iterations + 1));
                ctx.frames.push(Frame::Exec { node: body });
            }
            LoopPhase::Body => {
                self.check_iteration_cap(iterations, location)?;
                ctx.frames.push(frame(LoopPhase::Step, iterations + 1));
                ctx.frames.push(Frame::Exec { node: body });
            }
            LoopPhase::Step => {
                ctx.frames.push(frame(LoopPhase::Cond, iterations));
                if let Some(increment) = increment {
                    ctx.frames.push(Frame::Discard);
                    ctx.frames.push(Frame::Eval { node: increment });
                }
            }
        }
        Ok(())
    }

    fn check_iteration_cap(
        &self,
        iterations: u64,
        location: SourceLocation,
    ) -> Result<(), RuntimeError> {
        match self.config.max_inner_iterations {
            Some(limit) if iterations >= limit => {
                Err(RuntimeError::IterationCapExceeded { limit, location })
            }
            _ => Ok(()),
        }
    }

    /// Pick the arm for the selector on the operand stack.
    pub(crate) fn select_case(&mut self, ctx: &mut ExecutionContext, node: NodeId) -> Result<(), RuntimeError> {
        let program = self.program;
        let location = program.location(node);
        let NodeKind::Switch { cases, .. } = program.kind(node) else {
            return Err(RuntimeError::unsupported("switch expected", location));
        };

        let selector = ctx.pop_value(location)?;
        let selector = match selector {
            Value::Float(_) => None,
            ref v if v.is_numeric() => v.as_i64(),
            _ => None,
        }
        .ok_or_else(|| {
            RuntimeError::type_mismatch(
                format!("switch on a value of type {}", selector.type_name()),
                location,
            )
        })?;

        let mut chosen = None;
        let mut default = None;
        for (index, case) in cases.iter().enumerate() {
            match case.label {
                Some(label) => {
                    if self.label_value(ctx, label)? == selector {
                        chosen = Some(index);
                        break;
                    }
                }
                None => {
                    default.get_or_insert(index);
                }
            }
        }

        if let Some(case) = chosen.or(default) {
            ctx.env.push_scope(ScopeKind::Block);
            ctx.frames.push(Frame::Switch { node, case, next: 0 });
        }
        Ok(())
    }

    pub(crate) fn step_switch(&mut self, ctx: &mut ExecutionContext, node: NodeId, case: usize, next: usize) {
        let program = self.program;
        let NodeKind::Switch { cases, .. } = program.kind(node) else {
            return;
        };

        let Some(arm) = cases.get(case) else {
            ctx.env.pop_scope();
            return;
        };
        match arm.body.get(next) {
            Some(&statement) => {
                ctx.frames.push(Frame::Switch {
                    node,
                    case,
                    next: next + 1,
                });
                ctx.frames.push(Frame::Exec { node: statement });
            }
            None => ctx.frames.push(Frame::Switch {
                node,
                case: case + 1,
                next: 0,
            }),
        }
    }

    /// Value of a constant `case` label.
    fn label_value(&self, ctx: &ExecutionContext, node: NodeId) -> Result<i64, RuntimeError> {
        let program = self.program;
        let location = program.location(node);
        let not_constant = || RuntimeError::unsupported("case label is not a constant expression", location);

        match program.kind(node) {
            NodeKind::IntLiteral { value, .. } => Ok(*value),
            NodeKind::CharLiteral(c) => Ok(*c as i64),
            NodeKind::BoolLiteral(b) => Ok(*b as i64),
            NodeKind::Identifier(name) => {
                let value = match ctx.env.try_lookup(name) {
                    Some(cell) => ctx.env.variable(cell).map_err(|e| e.at(location))?.value.clone(),
                    None => self.resolve_name(name, location)?,
                };
                match value {
                    Value::Float(_) => Err(not_constant()),
                    v => v.as_i64().ok_or_else(not_constant),
                }
            }
            NodeKind::Unary {
                op: UnOp::Neg,
                operand,
            } => Ok(self.label_value(ctx, *operand)?.wrapping_neg()),
            NodeKind::Binary { op, left, right } => {
                let left = Value::Long(self.label_value(ctx, *left)?);
                let right = Value::Long(self.label_value(ctx, *right)?);
                binary_op(*op, &left, &right, location)?
                    .as_i64()
                    .ok_or_else(not_constant)
            }
            NodeKind::Cast { expr, .. } => self.label_value(ctx, *expr),
            _ => Err(not_constant()),
        }
    }
}
