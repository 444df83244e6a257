//! Calls and non-local control flow.
//!
//! `return`, `break` and `continue` unwind the frame stack directly. Every
//! frame popped on the way releases the scope it owns, so the environment
//! always mirrors the frames that are still live.

use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::RuntimeError;
use crate::interpreter::machine::{ExecutionContext, Frame};
use crate::interpreter::type_system::default_value;
use crate::memory::value::Value;
use crate::memory::{ScopeKind, Variable};
use crate::parser::ast::{NodeId, NodeKind, SourceLocation, Type};

impl Interpreter<'_> {
    /// Release the scope owned by a frame that is being discarded.
    fn release_frame(ctx: &mut ExecutionContext, frame: &Frame) {
        match frame {
            Frame::Block { scoped: true, .. } | Frame::Loop { scoped: true, .. } | Frame::Switch { .. } => {
                ctx.env.pop_scope()
            }
            _ => {}
        }
    }

    /// Bind arguments and start executing the body of `function`.
    pub(crate) fn enter_function(
        &mut self,
        ctx: &mut ExecutionContext,
        function: NodeId,
        args: Vec<Value>,
        location: SourceLocation,
    ) -> Result<(), RuntimeError> {
        let program = self.program;
        let NodeKind::FunctionDef {
            name,
            params,
            return_type,
            body,
        } = program.kind(function)
        else {
            return Err(RuntimeError::unsupported("call of a non-function", location));
        };

        if args.len() != params.len() {
            return Err(RuntimeError::ArgumentCountMismatch {
                function: name.clone(),
                expected: params.len(),
                got: args.len(),
                location,
            });
        }

        ctx.env.push_scope(ScopeKind::Function);
        ctx.frames.push(Frame::CallReturn {
            return_type: return_type.clone(),
            value_height: ctx.values.len(),
            returned: false,
            location,
        });
        for (param, arg) in params.iter().zip(args) {
            let value = self.convert_value(ctx, arg, &param.param_type, location)?;
            ctx.env
                .declare(Variable::new(param.name.clone(), param.param_type.clone(), value))
                .map_err(|e| e.at(location))?;
        }
        // The body shares the function scope with the parameters
        ctx.frames.push(Frame::Block {
            node: *body,
            next: 0,
            scoped: false,
        });
        Ok(())
    }

    /// Leave a function: pop its scope and push its converted result.
    pub(crate) fn finish_call(
        &mut self,
        ctx: &mut ExecutionContext,
        return_type: Type,
        value_height: usize,
        returned: bool,
        location: SourceLocation,
    ) -> Result<(), RuntimeError> {
        let value = if returned {
            ctx.pop_value(location)?
        } else {
            default_value(&return_type, &self.structs)
        };
        ctx.values.truncate(value_height);
        ctx.env.pop_scope();

        let value = self.convert_value(ctx, value, &return_type, location)?;
        ctx.values.push(value);
        Ok(())
    }

    pub(crate) fn exec_return(&mut self, ctx: &mut ExecutionContext, node: NodeId) -> Result<(), RuntimeError> {
        let program = self.program;
        let location = program.location(node);
        let value = match program.kind(node) {
            NodeKind::Return { expr: Some(_) } => ctx.pop_value(location)?,
            _ => Value::Void,
        };

        while let Some(frame) = ctx.frames.pop() {
            match frame {
                Frame::CallReturn {
                    return_type,
                    value_height,
                    location,
                    ..
                } => {
                    ctx.values.truncate(value_height);
                    ctx.values.push(value);
                    ctx.frames.push(Frame::CallReturn {
                        return_type,
                        value_height,
                        returned: true,
                        location,
                    });
                    return Ok(());
                }
                Frame::Program { .. } => {
                    ctx.frames.push(frame);
                    break;
                }
                other => Self::release_frame(ctx, &other),
            }
        }
        Err(RuntimeError::unsupported("return outside of a function", location))
    }

    pub(crate) fn unwind_break(
        &mut self,
        ctx: &mut ExecutionContext,
        location: SourceLocation,
    ) -> Result<(), RuntimeError> {
        while let Some(frame) = ctx.frames.pop() {
            match frame {
                Frame::Loop { .. } | Frame::Switch { .. } => {
                    Self::release_frame(ctx, &frame);
                    return Ok(());
                }
                Frame::CallReturn { .. } | Frame::Program { .. } => {
                    ctx.frames.push(frame);
                    break;
                }
                other => Self::release_frame(ctx, &other),
            }
        }
        Err(RuntimeError::unsupported("break outside of a loop or switch", location))
    }

    pub(crate) fn unwind_continue(
        &mut self,
        ctx: &mut ExecutionContext,
        location: SourceLocation,
    ) -> Result<(), RuntimeError> {
        while let Some(frame) = ctx.frames.pop() {
            match frame {
                // Parked in phase `Step` while its body runs
                Frame::Loop { .. } => {
                    ctx.frames.push(frame);
                    return Ok(());
                }
                Frame::CallReturn { .. } | Frame::Program { .. } => {
                    ctx.frames.push(frame);
                    break;
                }
                other => Self::release_frame(ctx, &other),
            }
        }
        Err(RuntimeError::unsupported("continue outside of a loop", location))
    }
}
