//! Statement execution.
//!
//! Adds `impl Interpreter` methods that turn an `Exec` frame into the frames
//! for its statement: blocks, declarations, library object construction and
//! `if`. Loops and `switch` live in [`super::loops`], `return`/`break`/
//! `continue` in [`super::jumps`].

use crate::commands::CommandKind;
use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::RuntimeError;
use crate::interpreter::machine::{ExecutionContext, Frame, LoopPhase};
use crate::interpreter::type_system::default_value;
use crate::memory::value::{ObjectRef, Value};
use crate::memory::{Place, ScopeKind, Variable};
use crate::parser::ast::{BaseType, NodeId, NodeKind, SourceLocation, Type};

/// Truth value of a condition.
pub(crate) fn truth(value: &Value, location: SourceLocation) -> Result<bool, RuntimeError> {
    value.truthiness().ok_or_else(|| {
        RuntimeError::type_mismatch(
            format!("{} cannot be used as a condition", value.type_name()),
            location,
        )
    })
}

impl Interpreter<'_> {
    /// Expand the statement `node` into frames.
    pub(crate) fn exec_statement(
        &mut self,
        ctx: &mut ExecutionContext,
        node: NodeId,
    ) -> Result<(), RuntimeError> {
        let program = self.program;
        let location = program.location(node);

        match program.kind(node) {
            NodeKind::Block { .. } => {
                ctx.env.push_scope(ScopeKind::Block);
                ctx.frames.push(Frame::Block {
                    node,
                    next: 0,
                    scoped: true,
                });
            }
            NodeKind::ExprStmt { expr } => {
                ctx.frames.push(Frame::Discard);
                ctx.frames.push(Frame::Eval { node: *expr });
            }
            NodeKind::VarDecl {
                init, is_static, ..
            } => {
                // A static initializer runs once per declaration site
                let initialized = *is_static && ctx.env.static_cell(node).is_some();
                match init {
                    Some(init) if !initialized => {
                        ctx.frames.push(Frame::Declare { node });
                        ctx.frames.push(Frame::Eval { node: *init });
                    }
                    _ => self.declare_variable(ctx, node, None)?,
                }
            }
            NodeKind::ObjectDecl { args, .. } => {
                ctx.frames.push(Frame::Construct { node });
                ctx.push_in_order(args.iter().map(|&arg| Frame::Eval { node: arg }));
            }
            NodeKind::DeclGroup { decls } => {
                ctx.push_in_order(decls.iter().map(|&decl| Frame::Exec { node: decl }));
            }
            NodeKind::If { condition, .. } => {
                ctx.frames.push(Frame::Branch { node });
                ctx.frames.push(Frame::Eval { node: *condition });
            }
            NodeKind::While { .. } => ctx.frames.push(Frame::Loop {
                node,
                phase: LoopPhase::Cond,
                iterations: 0,
                scoped: false,
            }),
            NodeKind::DoWhile { .. } => ctx.frames.push(Frame::Loop {
                node,
                phase: LoopPhase::Body,
                iterations: 0,
                scoped: false,
            }),
            NodeKind::For { init, .. } => {
                // The init clause declares into a scope that spans the whole loop
                ctx.env.push_scope(ScopeKind::Block);
                ctx.frames.push(Frame::Loop {
                    node,
                    phase: LoopPhase::Cond,
                    iterations: 0,
                    scoped: true,
                });
                if let Some(init) = init {
                    ctx.frames.push(Frame::Exec { node: *init });
                }
            }
            NodeKind::Switch { expr, .. } => {
                ctx.frames.push(Frame::SwitchSelect { node });
                ctx.frames.push(Frame::Eval { node: *expr });
            }
            NodeKind::Return { expr } => {
                ctx.frames.push(Frame::Return { node });
                if let Some(expr) = expr {
                    ctx.frames.push(Frame::Eval { node: *expr });
                }
            }
            NodeKind::Break => self.unwind_break(ctx, location)?,
            NodeKind::Continue => self.unwind_continue(ctx, location)?,
            NodeKind::Empty => {}
            NodeKind::FunctionDef { name, .. } => {
                return Err(RuntimeError::unsupported(
                    format!("nested definition of '{}'", name),
                    location,
                ))
            }
            NodeKind::StructDef { name, .. } => {
                return Err(RuntimeError::unsupported(
                    format!("local definition of struct '{}'", name),
                    location,
                ))
            }
            _ => {
                ctx.frames.push(Frame::Discard);
                ctx.frames.push(Frame::Eval { node });
            }
        }
        Ok(())
    }

    pub(crate) fn step_block(&mut self, ctx: &mut ExecutionContext, node: NodeId, next: usize, scoped: bool) {
        let program = self.program;
        let NodeKind::Block { statements } = program.kind(node) else {
            return;
        };

        match statements.get(next) {
            Some(&statement) => {
                ctx.frames.push(Frame::Block {
                    node,
                    next: next + 1,
                    scoped,
                });
                ctx.frames.push(Frame::Exec { node: statement });
            }
            None if scoped => ctx.env.pop_scope(),
            None => {}
        }
    }

    /// Declare the variable of `VarDecl` node `node`, initialized from `init`
    /// when the declaration has an initializer.
    pub(crate) fn declare_variable(
        &mut self,
        ctx: &mut ExecutionContext,
        node: NodeId,
        init: Option<Value>,
    ) -> Result<(), RuntimeError> {
        let program = self.program;
        let location = program.location(node);
        let NodeKind::VarDecl {
            name,
            var_type,
            is_static,
            is_volatile,
            ..
        } = program.kind(node)
        else {
            return Err(RuntimeError::unsupported("declaration expected", location));
        };

        if *is_static {
            if let Some(cell) = ctx.env.static_cell(node) {
                return ctx.env.bind(name, cell).map_err(|e| e.at(location));
            }
        }

        let mut ty = var_type.clone();
        let initialized = init.is_some();
        let value = match init {
            Some(value) => self.convert_value(ctx, value, &ty, location)?,
            None => default_value(&ty, &self.structs),
        };
        // `int a[] = {...}` takes its size from the initializer
        if let Value::Array(items) = &value {
            if ty.array_dims.first() == Some(&None) {
                ty.array_dims[0] = Some(items.len());
            }
        }

        let mut variable = Variable::new(name.clone(), ty, value.clone());
        variable.is_static = *is_static;
        variable.is_volatile = *is_volatile;

        let cell = if *is_static {
            ctx.env.declare_static(node, variable)
        } else {
            ctx.env.declare(variable)
        }
        .map_err(|e| e.at(location))?;

        if initialized {
            self.emit_var_set(ctx, &Place::of(cell), &value);
        }
        Ok(())
    }

    /// Finish `Class name(args);` once the constructor arguments are evaluated.
    pub(crate) fn construct_object(
        &mut self,
        ctx: &mut ExecutionContext,
        node: NodeId,
    ) -> Result<(), RuntimeError> {
        let program = self.program;
        let location = program.location(node);
        let NodeKind::ObjectDecl {
            name,
            class_name,
            args,
        } = program.kind(node)
        else {
            return Err(RuntimeError::unsupported("object declaration expected", location));
        };

        let values = ctx.pop_values(args.len(), location)?;
        let object = ObjectRef {
            class: class_name.clone(),
            name: name.clone(),
        };
        ctx.env
            .declare(Variable::new(
                name.clone(),
                Type::new(BaseType::Class(class_name.clone())),
                Value::Object(object),
            ))
            .map_err(|e| e.at(location))?;

        let args = values.iter().map(|v| self.primitive_of(ctx, v)).collect();
        self.emit(CommandKind::LibraryObjectCreated {
            class: class_name.clone(),
            name: name.clone(),
            args,
        });
        Ok(())
    }

    pub(crate) fn step_branch(&mut self, ctx: &mut ExecutionContext, node: NodeId) -> Result<(), RuntimeError> {
        let program = self.program;
        let location = program.location(node);
        let NodeKind::If {
            then_branch,
            else_branch,
            ..
        } = program.kind(node)
        else {
            return Err(RuntimeError::unsupported("if statement expected", location));
        };

        let condition = ctx.pop_value(location)?;
        if truth(&condition, location)? {
            ctx.frames.push(Frame::Exec { node: *then_branch });
        } else if let Some(else_branch) = else_branch {
            ctx.frames.push(Frame::Exec { node: *else_branch });
        }
        Ok(())
    }

    /// Emit `VarSet` for a store to `place`.
    pub(crate) fn emit_var_set(&mut self, ctx: &ExecutionContext, place: &Place, value: &Value) {
        let name = ctx.env.place_name(place);
        let value = self.primitive_of(ctx, value);
        self.emit(CommandKind::VarSet { name, value });
    }
}
