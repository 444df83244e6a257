//! Scoped variable storage
//!
//! Variables live in two arenas:
//! - the global arena holds globals and `static` locals and never shrinks
//! - the local arena holds automatic variables and is truncated whenever the
//!   scope that declared them is popped
//!
//! Local slots are reused once their scope pops, so every local cell carries
//! the generation it was declared in. A place whose generation no longer
//! matches the slot reads as [`MemoryError::DanglingPlace`].
//!
//! A [`Place`] names a location inside one of those variables (a cell plus an
//! index/field path). Places are what pointers hold and what assignments
//! write through, so no live reference into the arenas ever escapes.
//!
//! # Lookup
//!
//! Name resolution walks scopes from innermost outward and stops after the
//! innermost function scope, then falls back to the global scope. A callee
//! therefore never sees its caller's locals.

use super::value::Value;
use crate::parser::ast::{BaseType, Field, NodeId, Type};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Struct name → field list, used to type field places
pub type StructTable = FxHashMap<String, Vec<Field>>;

/// Identity of one variable cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellId {
    Global(u32),
    Local { index: u32, generation: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathStep {
    Index(usize),
    Field(String),
}

/// A storage location: a variable cell plus the path to an element or field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
    pub cell: CellId,
    pub path: Vec<PathStep>,
}

impl Place {
    pub fn of(cell: CellId) -> Self {
        Place {
            cell,
            path: Vec::new(),
        }
    }

    pub fn index(mut self, index: usize) -> Self {
        self.path.push(PathStep::Index(index));
        self
    }

    pub fn field(mut self, name: &str) -> Self {
        self.path.push(PathStep::Field(name.to_string()));
        self
    }

    /// Last array index on the path, if the place addresses an element.
    pub fn last_index(&self) -> Option<usize> {
        match self.path.last() {
            Some(PathStep::Index(i)) => Some(*i),
            _ => None,
        }
    }

    /// The place `offset` elements away, for pointer arithmetic.
    pub fn offset(&self, offset: i64) -> Option<Place> {
        let index = (self.last_index()? as i64).checked_add(offset)?;
        let mut moved = self.clone();
        *moved.path.last_mut()? = PathStep::Index(usize::try_from(index).ok()?);
        Some(moved)
    }

    /// True when both places address elements of the same array.
    pub fn same_array(&self, other: &Place) -> bool {
        self.cell == other.cell
            && self.path.len() == other.path.len()
            && self.path[..self.path.len().saturating_sub(1)]
                == other.path[..other.path.len().saturating_sub(1)]
    }
}

/// Failures of environment operations; the interpreter attaches a source location.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MemoryError {
    #[error("'{0}' is already declared in this scope")]
    DuplicateDeclaration(String),
    #[error("'{0}' is not declared")]
    UndefinedVariable(String),
    #[error("index {index} out of bounds for size {size}")]
    IndexOutOfBounds { index: usize, size: usize },
    #[error("pointer refers to storage that no longer exists")]
    DanglingPlace,
    #[error("cannot index a value of type {0}")]
    NotIndexable(&'static str),
    #[error("no field '{field}' in {owner}")]
    NoSuchField { owner: String, field: String },
}

/// One declared variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub ty: Type,
    pub value: Value,
    pub is_static: bool,
    pub is_volatile: bool,
}

impl Variable {
    pub fn new(name: impl Into<String>, ty: Type, value: Value) -> Self {
        Variable {
            name: name.into(),
            ty,
            value,
            is_static: false,
            is_volatile: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScopeKind {
    Global,
    Function,
    Block,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LocalSlot {
    generation: u32,
    var: Variable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Scope {
    kind: ScopeKind,
    bindings: FxHashMap<String, CellId>,
    /// Length of the local arena when the scope was entered
    locals_base: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    globals: Vec<Variable>,
    locals: Vec<LocalSlot>,
    /// Stamp for the next local declaration
    next_generation: u32,
    scopes: Vec<Scope>,
    /// Declaration site → cell of its `static` variable
    statics: FxHashMap<NodeId, CellId>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            globals: Vec::new(),
            locals: Vec::new(),
            next_generation: 0,
            scopes: vec![Scope {
                kind: ScopeKind::Global,
                bindings: FxHashMap::default(),
                locals_base: 0,
            }],
            statics: FxHashMap::default(),
        }
    }

    pub fn push_scope(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope {
            kind,
            bindings: FxHashMap::default(),
            locals_base: self.locals.len(),
        });
    }

    /// Pop the innermost scope and destroy its automatic variables.
    /// The global scope is never popped.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            if let Some(scope) = self.scopes.pop() {
                self.locals.truncate(scope.locals_base);
            }
        }
    }

    /// Number of scopes currently open, the global scope included.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    fn current(&mut self) -> &mut Scope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    /// Declare a variable in the innermost scope.
    pub fn declare(&mut self, var: Variable) -> Result<CellId, MemoryError> {
        if self.current().bindings.contains_key(&var.name) {
            return Err(MemoryError::DuplicateDeclaration(var.name));
        }

        let name = var.name.clone();
        let cell = if self.current().kind == ScopeKind::Global {
            self.globals.push(var);
            CellId::Global(self.globals.len() as u32 - 1)
        } else {
            let generation = self.next_generation;
            self.next_generation = self.next_generation.wrapping_add(1);
            self.locals.push(LocalSlot { generation, var });
            CellId::Local {
                index: self.locals.len() as u32 - 1,
                generation,
            }
        };
        self.current().bindings.insert(name, cell);
        Ok(cell)
    }

    /// Cell of the static declared at `site`, if it already exists.
    pub fn static_cell(&self, site: NodeId) -> Option<CellId> {
        self.statics.get(&site).copied()
    }

    /// Bind `name` to an existing cell in the innermost scope.
    pub fn bind(&mut self, name: &str, cell: CellId) -> Result<(), MemoryError> {
        let scope = self.current();
        if scope.bindings.contains_key(name) {
            return Err(MemoryError::DuplicateDeclaration(name.to_string()));
        }
        scope.bindings.insert(name.to_string(), cell);
        Ok(())
    }

    /// Declare a `static` variable for declaration site `site`.
    ///
    /// The first call stores `var` in the global arena; later calls for the
    /// same site only rebind the name to the existing cell.
    pub fn declare_static(&mut self, site: NodeId, var: Variable) -> Result<CellId, MemoryError> {
        if let Some(cell) = self.static_cell(site) {
            self.bind(&var.name, cell)?;
            return Ok(cell);
        }

        let name = var.name.clone();
        self.globals.push(var);
        let cell = CellId::Global(self.globals.len() as u32 - 1);
        self.bind(&name, cell)?;
        self.statics.insert(site, cell);
        Ok(cell)
    }

    pub fn try_lookup(&self, name: &str) -> Option<CellId> {
        for scope in self.scopes.iter().rev() {
            if let Some(cell) = scope.bindings.get(name) {
                return Some(*cell);
            }
            if scope.kind == ScopeKind::Function {
                break;
            }
        }
        self.scopes[0].bindings.get(name).copied()
    }

    pub fn lookup(&self, name: &str) -> Result<CellId, MemoryError> {
        self.try_lookup(name)
            .ok_or_else(|| MemoryError::UndefinedVariable(name.to_string()))
    }

    pub fn variable(&self, cell: CellId) -> Result<&Variable, MemoryError> {
        match cell {
            CellId::Global(i) => self.globals.get(i as usize),
            CellId::Local { index, generation } => self
                .locals
                .get(index as usize)
                .filter(|slot| slot.generation == generation)
                .map(|slot| &slot.var),
        }
        .ok_or(MemoryError::DanglingPlace)
    }

    fn variable_mut(&mut self, cell: CellId) -> Result<&mut Variable, MemoryError> {
        match cell {
            CellId::Global(i) => self.globals.get_mut(i as usize),
            CellId::Local { index, generation } => self
                .locals
                .get_mut(index as usize)
                .filter(|slot| slot.generation == generation)
                .map(|slot| &mut slot.var),
        }
        .ok_or(MemoryError::DanglingPlace)
    }

    /// Read the value stored at `place`.
    pub fn read(&self, place: &Place) -> Result<Value, MemoryError> {
        let mut value = &self.variable(place.cell)?.value;
        for step in &place.path {
            value = match (value, step) {
                (Value::Array(items), PathStep::Index(i)) => {
                    items.get(*i).ok_or(MemoryError::IndexOutOfBounds {
                        index: *i,
                        size: items.len(),
                    })?
                }
                // Strings read as NUL-terminated char arrays
                (Value::Str(s), PathStep::Index(i)) => {
                    return match s.as_bytes().get(*i) {
                        Some(b) => Ok(Value::Char(*b as i8)),
                        None if *i == s.len() => Ok(Value::Char(0)),
                        None => Err(MemoryError::IndexOutOfBounds {
                            index: *i,
                            size: s.len() + 1,
                        }),
                    };
                }
                (Value::Struct { fields, name }, PathStep::Field(f)) => fields
                    .iter()
                    .find(|(n, _)| n == f)
                    .map(|(_, v)| v)
                    .ok_or_else(|| MemoryError::NoSuchField {
                        owner: name.clone(),
                        field: f.clone(),
                    })?,
                (other, PathStep::Index(_)) => {
                    return Err(MemoryError::NotIndexable(other.type_name()))
                }
                (other, PathStep::Field(f)) => {
                    return Err(MemoryError::NoSuchField {
                        owner: other.type_name().to_string(),
                        field: f.clone(),
                    })
                }
            };
        }
        Ok(value.clone())
    }

    /// Overwrite the value stored at `place`.
    pub fn write(&mut self, place: &Place, new_value: Value) -> Result<(), MemoryError> {
        let mut slot = &mut self.variable_mut(place.cell)?.value;
        for step in &place.path {
            slot = match (slot, step) {
                (Value::Array(items), PathStep::Index(i)) => {
                    let size = items.len();
                    items
                        .get_mut(*i)
                        .ok_or(MemoryError::IndexOutOfBounds { index: *i, size })?
                }
                (Value::Str(s), PathStep::Index(i)) => {
                    let byte = new_value.as_i64().unwrap_or(0) as u8;
                    if *i >= s.len()
                        || !byte.is_ascii()
                        || !s.is_char_boundary(*i)
                        || !s.is_char_boundary(*i + 1)
                    {
                        return Err(MemoryError::IndexOutOfBounds {
                            index: *i,
                            size: s.len(),
                        });
                    }
                    s.replace_range(*i..*i + 1, &(byte as char).to_string());
                    return Ok(());
                }
                (Value::Struct { fields, name }, PathStep::Field(f)) => {
                    let owner = name.clone();
                    fields
                        .iter_mut()
                        .find(|(n, _)| n == f)
                        .map(|(_, v)| v)
                        .ok_or(MemoryError::NoSuchField {
                            owner,
                            field: f.clone(),
                        })?
                }
                (other, PathStep::Index(_)) => {
                    return Err(MemoryError::NotIndexable(other.type_name()))
                }
                (other, PathStep::Field(f)) => {
                    return Err(MemoryError::NoSuchField {
                        owner: other.type_name().to_string(),
                        field: f.clone(),
                    })
                }
            };
        }
        *slot = new_value;
        Ok(())
    }

    /// Length of the array whose element `place` addresses.
    pub fn element_count(&self, place: &Place) -> Option<usize> {
        let mut parent = place.clone();
        let PathStep::Index(_) = parent.path.pop()? else {
            return None;
        };
        match self.read(&parent).ok()? {
            Value::Array(items) => Some(items.len()),
            Value::Str(s) => Some(s.len() + 1),
            _ => None,
        }
    }

    /// Declared type of the storage at `place`.
    pub fn place_type(&self, place: &Place, structs: &StructTable) -> Result<Type, MemoryError> {
        let var = self.variable(place.cell)?;
        let mut ty = var.ty.clone();
        for step in &place.path {
            ty = match step {
                PathStep::Index(_) if ty.base == BaseType::String && !ty.is_array() => {
                    Type::new(BaseType::Char)
                }
                PathStep::Index(_) => ty.element_type(),
                PathStep::Field(f) => {
                    let BaseType::Struct(owner) = &ty.base else {
                        return Err(MemoryError::NoSuchField {
                            owner: var.name.clone(),
                            field: f.clone(),
                        });
                    };
                    structs
                        .get(owner)
                        .and_then(|fields| fields.iter().find(|field| &field.name == f))
                        .map(|field| field.field_type.clone())
                        .ok_or_else(|| MemoryError::NoSuchField {
                            owner: owner.clone(),
                            field: f.clone(),
                        })?
                }
            };
        }
        Ok(ty)
    }

    /// Human-readable name of a place, e.g. `leds[2]` or `p.x`.
    pub fn place_name(&self, place: &Place) -> String {
        let mut name = match self.variable(place.cell) {
            Ok(var) => var.name.clone(),
            Err(_) => "?".to_string(),
        };
        for step in &place.path {
            match step {
                PathStep::Index(i) => name.push_str(&format!("[{}]", i)),
                PathStep::Field(f) => {
                    name.push('.');
                    name.push_str(f);
                }
            }
        }
        name
    }

    /// Look up a variable by name and return its current value.
    pub fn get(&self, name: &str) -> Option<Value> {
        let cell = self.try_lookup(name)?;
        self.variable(cell).ok().map(|var| var.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_var(name: &str, n: i32) -> Variable {
        Variable::new(name, Type::new(BaseType::Int), Value::Int(n))
    }

    #[test]
    fn test_scope_pop_destroys_locals() {
        let mut env = Environment::new();
        env.push_scope(ScopeKind::Function);
        env.declare(int_var("a", 1)).unwrap();
        env.push_scope(ScopeKind::Block);
        env.declare(int_var("a", 2)).unwrap();
        assert_eq!(env.get("a"), Some(Value::Int(2)));
        env.pop_scope();
        assert_eq!(env.get("a"), Some(Value::Int(1)));
        env.pop_scope();
        assert_eq!(env.get("a"), None);
        assert!(env.locals.is_empty());
    }

    #[test]
    fn test_duplicate_declaration() {
        let mut env = Environment::new();
        env.declare(int_var("x", 1)).unwrap();
        assert_eq!(
            env.declare(int_var("x", 2)),
            Err(MemoryError::DuplicateDeclaration("x".to_string()))
        );
    }

    #[test]
    fn test_callee_cannot_see_caller_locals() {
        let mut env = Environment::new();
        env.declare(int_var("g", 7)).unwrap();
        env.push_scope(ScopeKind::Function);
        env.declare(int_var("caller_local", 1)).unwrap();
        env.push_scope(ScopeKind::Function);
        assert!(env.lookup("caller_local").is_err());
        assert_eq!(env.get("g"), Some(Value::Int(7)));
    }

    #[test]
    fn test_static_survives_scope() {
        let mut env = Environment::new();
        for expected in [0, 1] {
            env.push_scope(ScopeKind::Function);
            let cell = env.declare_static(42, int_var("count", 0)).unwrap();
            assert_eq!(env.variable(cell).unwrap().value, Value::Int(expected));
            env.write(&Place::of(cell), Value::Int(expected + 1)).unwrap();
            env.pop_scope();
        }
    }

    #[test]
    fn test_array_and_field_places() {
        let mut env = Environment::new();
        let cell = env
            .declare(Variable::new(
                "arr",
                Type::new(BaseType::Int).with_array(Some(3)),
                Value::Array(vec![Value::Int(0); 3]),
            ))
            .unwrap();
        let place = Place::of(cell).index(2);
        env.write(&place, Value::Int(9)).unwrap();
        assert_eq!(env.read(&place).unwrap(), Value::Int(9));
        assert_eq!(env.place_name(&place), "arr[2]");
        assert_eq!(
            env.read(&Place::of(cell).index(3)),
            Err(MemoryError::IndexOutOfBounds { index: 3, size: 3 })
        );
        assert_eq!(place.offset(-2).and_then(|p| p.last_index()), Some(0));
        assert_eq!(env.element_count(&place), Some(3));
        assert_eq!(env.element_count(&Place::of(cell)), None);
        assert!(place.offset(-3).is_none());
    }

    #[test]
    fn test_dangling_local_place() {
        let mut env = Environment::new();
        env.push_scope(ScopeKind::Function);
        let cell = env.declare(int_var("tmp", 3)).unwrap();
        env.pop_scope();
        assert_eq!(env.read(&Place::of(cell)), Err(MemoryError::DanglingPlace));
    }

    #[test]
    fn test_reused_local_slot_is_dangling() {
        let mut env = Environment::new();
        env.push_scope(ScopeKind::Function);
        let old = env.declare(int_var("a", 5)).unwrap();
        env.pop_scope();

        env.push_scope(ScopeKind::Function);
        let new = env.declare(int_var("b", 9)).unwrap();
        assert_ne!(old, new);
        assert_eq!(env.read(&Place::of(old)), Err(MemoryError::DanglingPlace));
        assert_eq!(
            env.write(&Place::of(old), Value::Int(1)),
            Err(MemoryError::DanglingPlace)
        );
        assert_eq!(env.read(&Place::of(new)).unwrap(), Value::Int(9));
    }
}
