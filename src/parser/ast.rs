//! Syntax tree for Arduino sketches
//!
//! The tree is stored as a flat arena: every [`Node`] lives in
//! [`Program::nodes`] and refers to its children by [`NodeId`]. Node ids are
//! stable for the lifetime of a program, which lets the interpreter use them
//! as declaration-site identities (for `static` locals) and lets suspended
//! frames refer to the code they are running without borrowing it.

use serde::{Deserialize, Serialize};

/// Index of a node inside [`Program::nodes`]
pub type NodeId = u32;

/// Source location information for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Base types understood by the interpreter.
///
/// Arduino and `<stdint.h>` aliases are folded into these when parsing:
/// `byte` and `uint8_t` become [`BaseType::UChar`], `unsigned long` becomes
/// [`BaseType::UInt`] and so on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaseType {
    Void,
    Bool,
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    LongLong,
    Float,
    Double,
    /// Arduino `String` object
    String,
    Struct(String),
    /// Instance of a library class (`Servo`, `Adafruit_NeoPixel`, ...)
    Class(String),
}

impl BaseType {
    /// Resolve an identifier-spelled type name (`byte`, `uint16_t`, `String`, ...).
    pub fn from_alias(name: &str) -> Option<Self> {
        let base = match name {
            "boolean" => BaseType::Bool,
            "byte" | "uint8_t" => BaseType::UChar,
            "int8_t" => BaseType::Char,
            "word" | "uint16_t" => BaseType::UShort,
            "int16_t" => BaseType::Short,
            "int32_t" => BaseType::Int,
            "uint32_t" | "size_t" => BaseType::UInt,
            "int64_t" | "uint64_t" => BaseType::LongLong,
            "String" => BaseType::String,
            _ => return None,
        };
        Some(base)
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            BaseType::Bool
                | BaseType::Char
                | BaseType::UChar
                | BaseType::Short
                | BaseType::UShort
                | BaseType::Int
                | BaseType::UInt
                | BaseType::LongLong
        )
    }
}

/// Type representation with const qualifier, pointers, and arrays
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Type {
    pub base: BaseType,
    pub is_const: bool,
    pub pointer_depth: u8,
    /// Outermost dimension first; `None` when the size comes from the initializer
    pub array_dims: Vec<Option<usize>>,
}

impl Type {
    pub fn new(base: BaseType) -> Self {
        Type {
            base,
            is_const: false,
            pointer_depth: 0,
            array_dims: Vec::new(),
        }
    }

    pub fn with_const(mut self) -> Self {
        self.is_const = true;
        self
    }

    pub fn with_pointer(mut self) -> Self {
        self.pointer_depth += 1;
        self
    }

    pub fn with_array(mut self, size: Option<usize>) -> Self {
        self.array_dims.push(size);
        self
    }

    pub fn is_array(&self) -> bool {
        !self.array_dims.is_empty()
    }

    pub fn is_pointer(&self) -> bool {
        self.array_dims.is_empty() && self.pointer_depth > 0
    }

    /// Type of one element of an array, or of the pointee of a pointer.
    pub fn element_type(&self) -> Type {
        let mut elem = self.clone();
        if !elem.array_dims.is_empty() {
            elem.array_dims.remove(0);
        } else if elem.pointer_depth > 0 {
            elem.pointer_depth -= 1;
        }
        elem
    }
}

/// Arithmetic, comparison and bitwise operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
        }
    }
}

/// Short-circuiting operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
}

/// Value-producing unary operators (`&` and `*` have their own handling in
/// place evaluation but share this enum)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    Neg,
    Plus,
    Not,
    BitNot,
    Deref,
    AddrOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncDecOp {
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

impl IncDecOp {
    pub fn is_prefix(self) -> bool {
        matches!(self, IncDecOp::PreInc | IncDecOp::PreDec)
    }

    pub fn delta(self) -> i32 {
        match self {
            IncDecOp::PreInc | IncDecOp::PostInc => 1,
            IncDecOp::PreDec | IncDecOp::PostDec => -1,
        }
    }
}

/// Function parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub param_type: Type,
}

/// Struct field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub field_type: Type,
}

/// One `case`/`default` arm of a switch. `label` is `None` for `default`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    pub label: Option<NodeId>,
    pub body: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    // Top-level declarations
    FunctionDef {
        name: String,
        params: Vec<Param>,
        return_type: Type,
        body: NodeId,
    },
    StructDef {
        name: String,
        fields: Vec<Field>,
    },

    // Declarations usable anywhere
    VarDecl {
        name: String,
        var_type: Type,
        init: Option<NodeId>,
        is_static: bool,
        is_volatile: bool,
    },
    /// `Servo arm;` or `Adafruit_NeoPixel strip(16, 6, NEO_GRB);`
    ObjectDecl {
        name: String,
        class_name: String,
        args: Vec<NodeId>,
    },
    /// `int a = 1, b, c[3];`
    DeclGroup {
        decls: Vec<NodeId>,
    },

    // Statements
    Block {
        statements: Vec<NodeId>,
    },
    ExprStmt {
        expr: NodeId,
    },
    If {
        condition: NodeId,
        then_branch: NodeId,
        else_branch: Option<NodeId>,
    },
    While {
        condition: NodeId,
        body: NodeId,
    },
    DoWhile {
        body: NodeId,
        condition: NodeId,
    },
    For {
        init: Option<NodeId>,
        condition: Option<NodeId>,
        increment: Option<NodeId>,
        body: NodeId,
    },
    Switch {
        expr: NodeId,
        cases: Vec<SwitchCase>,
    },
    Return {
        expr: Option<NodeId>,
    },
    Break,
    Continue,
    Empty,

    // Expressions
    IntLiteral {
        value: i64,
        unsigned: bool,
    },
    FloatLiteral(f64),
    CharLiteral(i8),
    StringLiteral(String),
    BoolLiteral(bool),
    NullLiteral,
    Identifier(String),
    Binary {
        op: BinOp,
        left: NodeId,
        right: NodeId,
    },
    Logical {
        op: LogicalOp,
        left: NodeId,
        right: NodeId,
    },
    Unary {
        op: UnOp,
        operand: NodeId,
    },
    IncDec {
        op: IncDecOp,
        target: NodeId,
    },
    Ternary {
        condition: NodeId,
        then_expr: NodeId,
        else_expr: NodeId,
    },
    Assign {
        target: NodeId,
        value: NodeId,
    },
    CompoundAssign {
        op: BinOp,
        target: NodeId,
        value: NodeId,
    },
    Call {
        callee: String,
        args: Vec<NodeId>,
    },
    /// `receiver.method(args)`, used for `Serial`, library objects and `String`
    MethodCall {
        receiver: NodeId,
        method: String,
        args: Vec<NodeId>,
    },
    Index {
        array: NodeId,
        index: NodeId,
    },
    Member {
        object: NodeId,
        field: String,
        through_pointer: bool,
    },
    Cast {
        target_type: Type,
        expr: NodeId,
    },
    SizeofType(Type),
    SizeofExpr(NodeId),
    InitList(Vec<NodeId>),
}

impl NodeKind {
    /// Ids of every node directly referenced by this one, in source order.
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            NodeKind::FunctionDef { body, .. } => vec![*body],
            NodeKind::VarDecl { init, .. } => init.iter().copied().collect(),
            NodeKind::ObjectDecl { args, .. } => args.clone(),
            NodeKind::DeclGroup { decls } => decls.clone(),
            NodeKind::Block { statements } => statements.clone(),
            NodeKind::ExprStmt { expr } => vec![*expr],
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let mut ids = vec![*condition, *then_branch];
                ids.extend(else_branch.iter().copied());
                ids
            }
            NodeKind::While { condition, body } => vec![*condition, *body],
            NodeKind::DoWhile { body, condition } => vec![*body, *condition],
            NodeKind::For {
                init,
                condition,
                increment,
                body,
            } => init
                .iter()
                .chain(condition.iter())
                .chain(increment.iter())
                .copied()
                .chain(std::iter::once(*body))
                .collect(),
            NodeKind::Switch { expr, cases } => {
                let mut ids = vec![*expr];
                for case in cases {
                    ids.extend(case.label.iter().copied());
                    ids.extend(case.body.iter().copied());
                }
                ids
            }
            NodeKind::Return { expr } => expr.iter().copied().collect(),
            NodeKind::Binary { left, right, .. } | NodeKind::Logical { left, right, .. } => {
                vec![*left, *right]
            }
            NodeKind::Unary { operand, .. } => vec![*operand],
            NodeKind::IncDec { target, .. } => vec![*target],
            NodeKind::Ternary {
                condition,
                then_expr,
                else_expr,
            } => vec![*condition, *then_expr, *else_expr],
            NodeKind::Assign { target, value } | NodeKind::CompoundAssign { target, value, .. } => {
                vec![*target, *value]
            }
            NodeKind::Call { args, .. } => args.clone(),
            NodeKind::MethodCall { receiver, args, .. } => {
                let mut ids = vec![*receiver];
                ids.extend(args.iter().copied());
                ids
            }
            NodeKind::Index { array, index } => vec![*array, *index],
            NodeKind::Member { object, .. } => vec![*object],
            NodeKind::Cast { expr, .. } => vec![*expr],
            NodeKind::SizeofExpr(expr) => vec![*expr],
            NodeKind::InitList(items) => items.clone(),
            NodeKind::StructDef { .. }
            | NodeKind::Break
            | NodeKind::Continue
            | NodeKind::Empty
            | NodeKind::IntLiteral { .. }
            | NodeKind::FloatLiteral(_)
            | NodeKind::CharLiteral(_)
            | NodeKind::StringLiteral(_)
            | NodeKind::BoolLiteral(_)
            | NodeKind::NullLiteral
            | NodeKind::Identifier(_)
            | NodeKind::SizeofType(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    pub location: SourceLocation,
}

/// A parsed sketch: the node arena plus the ids of its top-level items in
/// declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub nodes: Vec<Node>,
    pub items: Vec<NodeId>,
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }

    /// Append a node to the arena and return its id.
    pub fn push(&mut self, kind: NodeKind, location: SourceLocation) -> NodeId {
        self.nodes.push(Node { kind, location });
        (self.nodes.len() - 1) as NodeId
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn location(&self, id: NodeId) -> SourceLocation {
        self.node(id).location
    }

    /// Find a top-level function definition by name.
    pub fn function(&self, name: &str) -> Option<NodeId> {
        self.items.iter().copied().find(|&id| {
            matches!(self.kind(id), NodeKind::FunctionDef { name: n, .. } if n == name)
        })
    }
}
