//! Compact binary encoding of a [`Program`]
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! "SKAST" version:u16 node_count:u32
//! item_count:u32 item_id:u32*
//! string_count:u32 (len:u32 utf8)*
//! node*            tag:u8 line:u32 column:u32 fields...
//! ```
//!
//! Strings are interned in the table and referenced by index. Optional node
//! ids use `u32::MAX` for "absent". Numeric literals are written with the
//! smallest number tag that holds the value exactly; integer tags always decode
//! to [`NodeKind::IntLiteral`] and float tags to [`NodeKind::FloatLiteral`].
//!
//! Decoding only accepts a forest: every node has at most one parent, no node
//! is its own ancestor, and nesting stays within [`MAX_DEPTH`].

use super::ast::*;
use rustc_hash::FxHashMap;
use thiserror::Error;

pub const MAGIC: &[u8; 5] = b"SKAST";
pub const VERSION: u16 = 1;

const NONE: u32 = u32::MAX;

/// Deepest nesting accepted from decoded input
pub const MAX_DEPTH: usize = 1024;

// Number tags
const UINT8: u8 = 0x01;
const INT8: u8 = 0x02;
const UINT16: u8 = 0x03;
const INT16: u8 = 0x04;
const INT32: u8 = 0x05;
const UINT32: u8 = 0x06;
const INT64: u8 = 0x07;
const FLOAT: u8 = 0x08;
const DOUBLE: u8 = 0x09;

// Node tags
const FUNCTION_DEF: u8 = 1;
const STRUCT_DEF: u8 = 2;
const VAR_DECL: u8 = 3;
const OBJECT_DECL: u8 = 4;
const DECL_GROUP: u8 = 5;
const BLOCK: u8 = 6;
const EXPR_STMT: u8 = 7;
const IF: u8 = 8;
const WHILE: u8 = 9;
const DO_WHILE: u8 = 10;
const FOR: u8 = 11;
const SWITCH: u8 = 12;
const RETURN: u8 = 13;
const BREAK: u8 = 14;
const CONTINUE: u8 = 15;
const EMPTY: u8 = 16;
const NUMBER: u8 = 17;
const CHAR: u8 = 18;
const STRING: u8 = 19;
const BOOL: u8 = 20;
const NULL: u8 = 21;
const IDENTIFIER: u8 = 22;
const BINARY: u8 = 23;
const LOGICAL: u8 = 24;
const UNARY: u8 = 25;
const INC_DEC: u8 = 26;
const TERNARY: u8 = 27;
const ASSIGN: u8 = 28;
const COMPOUND_ASSIGN: u8 = 29;
const CALL: u8 = 30;
const METHOD_CALL: u8 = 31;
const INDEX: u8 = 32;
const MEMBER: u8 = 33;
const CAST: u8 = 34;
const SIZEOF_TYPE: u8 = 35;
const SIZEOF_EXPR: u8 = 36;
const INIT_LIST: u8 = 37;

const BIN_OPS: [BinOp; 16] = [
    BinOp::Add,
    BinOp::Sub,
    BinOp::Mul,
    BinOp::Div,
    BinOp::Mod,
    BinOp::Eq,
    BinOp::Ne,
    BinOp::Lt,
    BinOp::Le,
    BinOp::Gt,
    BinOp::Ge,
    BinOp::BitAnd,
    BinOp::BitOr,
    BinOp::BitXor,
    BinOp::Shl,
    BinOp::Shr,
];
const LOGICAL_OPS: [LogicalOp; 2] = [LogicalOp::And, LogicalOp::Or];
const UN_OPS: [UnOp; 6] = [
    UnOp::Neg,
    UnOp::Plus,
    UnOp::Not,
    UnOp::BitNot,
    UnOp::Deref,
    UnOp::AddrOf,
];
const INC_DEC_OPS: [IncDecOp; 4] = [
    IncDecOp::PreInc,
    IncDecOp::PreDec,
    IncDecOp::PostInc,
    IncDecOp::PostDec,
];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    #[error("Unexpected end of input at byte {0}")]
    UnexpectedEof(usize),
    #[error("Missing SKAST header")]
    BadMagic,
    #[error("Unsupported format version {0}")]
    UnsupportedVersion(u16),
    #[error("Unknown {what} tag {tag:#04x} at byte {offset}")]
    UnknownTag {
        what: &'static str,
        tag: u8,
        offset: usize,
    },
    #[error("String index {0} out of range")]
    BadString(u32),
    #[error("Invalid UTF-8 in string table")]
    InvalidUtf8,
    #[error("Node {0} refers to a node that does not exist")]
    DanglingNode(NodeId),
    #[error("Node {0} has more than one parent")]
    SharedNode(NodeId),
    #[error("Node {0} is its own ancestor")]
    CyclicNode(NodeId),
    #[error("Tree is nested deeper than {0} levels")]
    TooDeep(usize),
    #[error("{0} trailing bytes after last node")]
    TrailingBytes(usize),
}

/// Encode `program` into the binary format.
pub fn encode(program: &Program) -> Vec<u8> {
    let mut encoder = Encoder::default();
    for node in &program.nodes {
        encoder.node(node);
    }

    let mut out = Vec::with_capacity(encoder.body.len() + 64);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&(program.nodes.len() as u32).to_le_bytes());
    out.extend_from_slice(&(program.items.len() as u32).to_le_bytes());
    for item in &program.items {
        out.extend_from_slice(&item.to_le_bytes());
    }
    out.extend_from_slice(&(encoder.strings.len() as u32).to_le_bytes());
    for s in &encoder.strings {
        out.extend_from_slice(&(s.len() as u32).to_le_bytes());
        out.extend_from_slice(s.as_bytes());
    }
    out.extend_from_slice(&encoder.body);
    out
}

/// Decode a program produced by [`encode`].
pub fn decode(bytes: &[u8]) -> Result<Program, CodecError> {
    let mut reader = Reader { bytes, pos: 0 };

    if reader.take(MAGIC.len())? != MAGIC {
        return Err(CodecError::BadMagic);
    }
    let version = reader.u16()?;
    if version != VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }

    let node_count = reader.u32()?;
    let item_count = reader.u32()?;
    let items = (0..item_count)
        .map(|_| reader.u32())
        .collect::<Result<Vec<_>, _>>()?;

    let string_count = reader.u32()?;
    let mut strings = Vec::new();
    for _ in 0..string_count {
        let len = reader.u32()? as usize;
        let raw = reader.take(len)?;
        let s = std::str::from_utf8(raw).map_err(|_| CodecError::InvalidUtf8)?;
        strings.push(s.to_string());
    }

    let mut decoder = Decoder { reader, strings };
    let mut program = Program::new();
    for _ in 0..node_count {
        let node = decoder.node()?;
        program.nodes.push(node);
    }
    if decoder.reader.pos != bytes.len() {
        return Err(CodecError::TrailingBytes(bytes.len() - decoder.reader.pos));
    }
    program.items = items;

    validate(&program)?;
    Ok(program)
}

/// Decoded arenas must form a forest no deeper than [`MAX_DEPTH`].
fn validate(program: &Program) -> Result<(), CodecError> {
    let count = program.nodes.len() as NodeId;
    let mut has_parent = vec![false; program.nodes.len()];
    for (id, node) in program.nodes.iter().enumerate() {
        for child in node.kind.children() {
            if child >= count {
                return Err(CodecError::DanglingNode(id as NodeId));
            }
            if std::mem::replace(&mut has_parent[child as usize], true) {
                return Err(CodecError::SharedNode(child));
            }
        }
    }
    if let Some(item) = program.items.iter().find(|item| **item >= count) {
        return Err(CodecError::DanglingNode(*item));
    }

    // Every node has at most one parent, so a node no root reaches sits on a cycle
    let mut reached = vec![false; program.nodes.len()];
    let mut stack: Vec<(NodeId, usize)> = Vec::new();
    for root in (0..count).filter(|id| !has_parent[*id as usize]) {
        stack.push((root, 1));
        while let Some((id, depth)) = stack.pop() {
            if depth > MAX_DEPTH {
                return Err(CodecError::TooDeep(MAX_DEPTH));
            }
            reached[id as usize] = true;
            stack.extend(
                program.nodes[id as usize]
                    .kind
                    .children()
                    .into_iter()
                    .map(|child| (child, depth + 1)),
            );
        }
    }
    match reached.iter().position(|reached| !reached) {
        Some(id) => Err(CodecError::CyclicNode(id as NodeId)),
        None => Ok(()),
    }
}

#[derive(Default)]
struct Encoder {
    body: Vec<u8>,
    strings: Vec<String>,
    index: FxHashMap<String, u32>,
}

impl Encoder {
    fn u8(&mut self, v: u8) {
        self.body.push(v);
    }

    fn u32(&mut self, v: u32) {
        self.body.extend_from_slice(&v.to_le_bytes());
    }

    fn str(&mut self, s: &str) {
        let next = self.strings.len() as u32;
        let idx = *self.index.entry(s.to_string()).or_insert_with(|| next);
        if idx == next {
            self.strings.push(s.to_string());
        }
        self.u32(idx);
    }

    fn id(&mut self, id: NodeId) {
        self.u32(id);
    }

    fn opt(&mut self, id: Option<NodeId>) {
        self.u32(id.unwrap_or(NONE));
    }

    fn ids(&mut self, ids: &[NodeId]) {
        self.u32(ids.len() as u32);
        for id in ids {
            self.id(*id);
        }
    }

    fn ty(&mut self, ty: &Type) {
        match &ty.base {
            BaseType::Void => self.u8(0),
            BaseType::Bool => self.u8(1),
            BaseType::Char => self.u8(2),
            BaseType::UChar => self.u8(3),
            BaseType::Short => self.u8(4),
            BaseType::UShort => self.u8(5),
            BaseType::Int => self.u8(6),
            BaseType::UInt => self.u8(7),
            BaseType::LongLong => self.u8(8),
            BaseType::Float => self.u8(9),
            BaseType::Double => self.u8(10),
            BaseType::String => self.u8(11),
            BaseType::Struct(name) => {
                self.u8(12);
                self.str(name);
            }
            BaseType::Class(name) => {
                self.u8(13);
                self.str(name);
            }
        }
        self.u8(ty.is_const as u8);
        self.u8(ty.pointer_depth);
        self.u32(ty.array_dims.len() as u32);
        for dim in &ty.array_dims {
            self.u32(dim.map_or(NONE, |d| d as u32));
        }
    }

    fn int(&mut self, v: i64) {
        if let Ok(n) = u8::try_from(v) {
            self.u8(UINT8);
            self.u8(n);
        } else if let Ok(n) = i8::try_from(v) {
            self.u8(INT8);
            self.body.extend_from_slice(&n.to_le_bytes());
        } else if let Ok(n) = u16::try_from(v) {
            self.u8(UINT16);
            self.body.extend_from_slice(&n.to_le_bytes());
        } else if let Ok(n) = i16::try_from(v) {
            self.u8(INT16);
            self.body.extend_from_slice(&n.to_le_bytes());
        } else if let Ok(n) = i32::try_from(v) {
            self.u8(INT32);
            self.body.extend_from_slice(&n.to_le_bytes());
        } else if let Ok(n) = u32::try_from(v) {
            self.u8(UINT32);
            self.u32(n);
        } else {
            self.u8(INT64);
            self.body.extend_from_slice(&v.to_le_bytes());
        }
    }

    fn float(&mut self, v: f64) {
        let narrow = v as f32;
        if narrow as f64 == v {
            self.u8(FLOAT);
            self.body.extend_from_slice(&narrow.to_le_bytes());
        } else {
            self.u8(DOUBLE);
            self.body.extend_from_slice(&v.to_le_bytes());
        }
    }

    fn op<T: PartialEq>(&mut self, table: &[T], op: &T) {
        let idx = table.iter().position(|o| o == op).unwrap_or(0);
        self.u8(idx as u8);
    }

    fn node(&mut self, node: &Node) {
        let tag = match &node.kind {
            NodeKind::FunctionDef { .. } => FUNCTION_DEF,
            NodeKind::StructDef { .. } => STRUCT_DEF,
            NodeKind::VarDecl { .. } => VAR_DECL,
            NodeKind::ObjectDecl { .. } => OBJECT_DECL,
            NodeKind::DeclGroup { .. } => DECL_GROUP,
            NodeKind::Block { .. } => BLOCK,
            NodeKind::ExprStmt { .. } => EXPR_STMT,
            NodeKind::If { .. } => IF,
            NodeKind::While { .. } => WHILE,
            NodeKind::DoWhile { .. } => DO_WHILE,
            NodeKind::For { .. } => FOR,
            NodeKind::Switch { .. } => SWITCH,
            NodeKind::Return { .. } => RETURN,
            NodeKind::Break => BREAK,
            NodeKind::Continue => CONTINUE,
            NodeKind::Empty => EMPTY,
            NodeKind::IntLiteral { .. } | NodeKind::FloatLiteral(_) => NUMBER,
            NodeKind::CharLiteral(_) => CHAR,
            NodeKind::StringLiteral(_) => STRING,
            NodeKind::BoolLiteral(_) => BOOL,
            NodeKind::NullLiteral => NULL,
            NodeKind::Identifier(_) => IDENTIFIER,
            NodeKind::Binary { .. } => BINARY,
            NodeKind::Logical { .. } => LOGICAL,
            NodeKind::Unary { .. } => UNARY,
            NodeKind::IncDec { .. } => INC_DEC,
            NodeKind::Ternary { .. } => TERNARY,
            NodeKind::Assign { .. } => ASSIGN,
            NodeKind::CompoundAssign { .. } => COMPOUND_ASSIGN,
            NodeKind::Call { .. } => CALL,
            NodeKind::MethodCall { .. } => METHOD_CALL,
            NodeKind::Index { .. } => INDEX,
            NodeKind::Member { .. } => MEMBER,
            NodeKind::Cast { .. } => CAST,
            NodeKind::SizeofType(_) => SIZEOF_TYPE,
            NodeKind::SizeofExpr(_) => SIZEOF_EXPR,
            NodeKind::InitList(_) => INIT_LIST,
        };
        self.u8(tag);
        self.u32(node.location.line);
        self.u32(node.location.column);

        match &node.kind {
            NodeKind::FunctionDef {
                name,
                params,
                return_type,
                body,
            } => {
                self.str(name);
                self.u32(params.len() as u32);
                for param in params {
                    self.str(&param.name);
                    self.ty(&param.param_type);
                }
                self.ty(return_type);
                self.id(*body);
            }
            NodeKind::StructDef { name, fields } => {
                self.str(name);
                self.u32(fields.len() as u32);
                for field in fields {
                    self.str(&field.name);
                    self.ty(&field.field_type);
                }
            }
            NodeKind::VarDecl {
                name,
                var_type,
                init,
                is_static,
                is_volatile,
            } => {
                self.str(name);
                self.ty(var_type);
                self.opt(*init);
                self.u8(*is_static as u8 | (*is_volatile as u8) << 1);
            }
            NodeKind::ObjectDecl {
                name,
                class_name,
                args,
            } => {
                self.str(name);
                self.str(class_name);
                self.ids(args);
            }
            NodeKind::DeclGroup { decls: ids }
            | NodeKind::Block { statements: ids }
            | NodeKind::InitList(ids) => self.ids(ids),
            NodeKind::ExprStmt { expr } | NodeKind::SizeofExpr(expr) => self.id(*expr),
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.id(*condition);
                self.id(*then_branch);
                self.opt(*else_branch);
            }
            NodeKind::While { condition: a, body: b } | NodeKind::DoWhile { body: a, condition: b } => {
                self.id(*a);
                self.id(*b);
            }
            NodeKind::For {
                init,
                condition,
                increment,
                body,
            } => {
                self.opt(*init);
                self.opt(*condition);
                self.opt(*increment);
                self.id(*body);
            }
            NodeKind::Switch { expr, cases } => {
                self.id(*expr);
                self.u32(cases.len() as u32);
                for case in cases {
                    self.opt(case.label);
                    self.ids(&case.body);
                }
            }
            NodeKind::Return { expr } => self.opt(*expr),
            NodeKind::Break | NodeKind::Continue | NodeKind::Empty | NodeKind::NullLiteral => {}
            NodeKind::IntLiteral { value, unsigned } => {
                self.u8(*unsigned as u8);
                self.int(*value);
            }
            NodeKind::FloatLiteral(v) => {
                self.u8(0);
                self.float(*v);
            }
            NodeKind::CharLiteral(c) => self.u8(*c as u8),
            NodeKind::StringLiteral(s) | NodeKind::Identifier(s) => self.str(s),
            NodeKind::BoolLiteral(b) => self.u8(*b as u8),
            NodeKind::Binary { op, left, right } => {
                self.op(&BIN_OPS, op);
                self.id(*left);
                self.id(*right);
            }
            NodeKind::Logical { op, left, right } => {
                self.op(&LOGICAL_OPS, op);
                self.id(*left);
                self.id(*right);
            }
            NodeKind::Unary { op, operand } => {
                self.op(&UN_OPS, op);
                self.id(*operand);
            }
            NodeKind::IncDec { op, target } => {
                self.op(&INC_DEC_OPS, op);
                self.id(*target);
            }
            NodeKind::Ternary {
                condition,
                then_expr,
                else_expr,
            } => {
                self.id(*condition);
                self.id(*then_expr);
                self.id(*else_expr);
            }
            NodeKind::Assign { target, value } => {
                self.id(*target);
                self.id(*value);
            }
            NodeKind::CompoundAssign { op, target, value } => {
                self.op(&BIN_OPS, op);
                self.id(*target);
                self.id(*value);
            }
            NodeKind::Call { callee, args } => {
                self.str(callee);
                self.ids(args);
            }
            NodeKind::MethodCall {
                receiver,
                method,
                args,
            } => {
                self.id(*receiver);
                self.str(method);
                self.ids(args);
            }
            NodeKind::Index { array, index } => {
                self.id(*array);
                self.id(*index);
            }
            NodeKind::Member {
                object,
                field,
                through_pointer,
            } => {
                self.id(*object);
                self.str(field);
                self.u8(*through_pointer as u8);
            }
            NodeKind::Cast { target_type, expr } => {
                self.ty(target_type);
                self.id(*expr);
            }
            NodeKind::SizeofType(ty) => self.ty(ty),
        }
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(CodecError::UnexpectedEof(self.pos))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.array()?))
    }
}

struct Decoder<'a> {
    reader: Reader<'a>,
    strings: Vec<String>,
}

/// A decoded numeric literal
enum Number {
    Int(i64),
    Float(f64),
}

impl Decoder<'_> {
    fn unknown(&self, what: &'static str, tag: u8) -> CodecError {
        CodecError::UnknownTag {
            what,
            tag,
            offset: self.reader.pos.saturating_sub(1),
        }
    }

    fn str(&mut self) -> Result<String, CodecError> {
        let idx = self.reader.u32()?;
        self.strings
            .get(idx as usize)
            .cloned()
            .ok_or(CodecError::BadString(idx))
    }

    fn flag(&mut self) -> Result<bool, CodecError> {
        Ok(self.reader.u8()? != 0)
    }

    fn id(&mut self) -> Result<NodeId, CodecError> {
        self.reader.u32()
    }

    fn opt(&mut self) -> Result<Option<NodeId>, CodecError> {
        let id = self.reader.u32()?;
        Ok((id != NONE).then_some(id))
    }

    fn ids(&mut self) -> Result<Vec<NodeId>, CodecError> {
        let count = self.reader.u32()?;
        (0..count).map(|_| self.id()).collect()
    }

    fn op<T: Copy>(&mut self, table: &[T], what: &'static str) -> Result<T, CodecError> {
        let tag = self.reader.u8()?;
        table
            .get(tag as usize)
            .copied()
            .ok_or_else(|| self.unknown(what, tag))
    }

    fn ty(&mut self) -> Result<Type, CodecError> {
        let tag = self.reader.u8()?;
        let base = match tag {
            0 => BaseType::Void,
            1 => BaseType::Bool,
            2 => BaseType::Char,
            3 => BaseType::UChar,
            4 => BaseType::Short,
            5 => BaseType::UShort,
            6 => BaseType::Int,
            7 => BaseType::UInt,
            8 => BaseType::LongLong,
            9 => BaseType::Float,
            10 => BaseType::Double,
            11 => BaseType::String,
            12 => BaseType::Struct(self.str()?),
            13 => BaseType::Class(self.str()?),
            _ => return Err(self.unknown("type", tag)),
        };
        let is_const = self.flag()?;
        let pointer_depth = self.reader.u8()?;
        let dim_count = self.reader.u32()?;
        let mut array_dims = Vec::new();
        for _ in 0..dim_count {
            let dim = self.reader.u32()?;
            array_dims.push((dim != NONE).then_some(dim as usize));
        }
        Ok(Type {
            base,
            is_const,
            pointer_depth,
            array_dims,
        })
    }

    fn number(&mut self) -> Result<Number, CodecError> {
        let tag = self.reader.u8()?;
        let r = &mut self.reader;
        let number = match tag {
            UINT8 => Number::Int(r.u8()? as i64),
            INT8 => Number::Int(i8::from_le_bytes(r.array()?) as i64),
            UINT16 => Number::Int(u16::from_le_bytes(r.array()?) as i64),
            INT16 => Number::Int(i16::from_le_bytes(r.array()?) as i64),
            INT32 => Number::Int(i32::from_le_bytes(r.array()?) as i64),
            UINT32 => Number::Int(u32::from_le_bytes(r.array()?) as i64),
            INT64 => Number::Int(i64::from_le_bytes(r.array()?)),
            FLOAT => Number::Float(f32::from_le_bytes(r.array()?) as f64),
            DOUBLE => Number::Float(f64::from_le_bytes(r.array()?)),
            _ => return Err(self.unknown("number", tag)),
        };
        Ok(number)
    }

    fn node(&mut self) -> Result<Node, CodecError> {
        let tag = self.reader.u8()?;
        let location = SourceLocation::new(self.reader.u32()?, self.reader.u32()?);

        let kind = match tag {
            FUNCTION_DEF => {
                let name = self.str()?;
                let count = self.reader.u32()?;
                let mut params = Vec::new();
                for _ in 0..count {
                    params.push(Param {
                        name: self.str()?,
                        param_type: self.ty()?,
                    });
                }
                NodeKind::FunctionDef {
                    name,
                    params,
                    return_type: self.ty()?,
                    body: self.id()?,
                }
            }
            STRUCT_DEF => {
                let name = self.str()?;
                let count = self.reader.u32()?;
                let mut fields = Vec::new();
                for _ in 0..count {
                    fields.push(Field {
                        name: self.str()?,
                        field_type: self.ty()?,
                    });
                }
                NodeKind::StructDef { name, fields }
            }
            VAR_DECL => {
                let name = self.str()?;
                let var_type = self.ty()?;
                let init = self.opt()?;
                let flags = self.reader.u8()?;
                NodeKind::VarDecl {
                    name,
                    var_type,
                    init,
                    is_static: flags & 1 != 0,
                    is_volatile: flags & 2 != 0,
                }
            }
            OBJECT_DECL => NodeKind::ObjectDecl {
                name: self.str()?,
                class_name: self.str()?,
                args: self.ids()?,
            },
            DECL_GROUP => NodeKind::DeclGroup { decls: self.ids()? },
            BLOCK => NodeKind::Block {
                statements: self.ids()?,
            },
            EXPR_STMT => NodeKind::ExprStmt { expr: self.id()? },
            IF => NodeKind::If {
                condition: self.id()?,
                then_branch: self.id()?,
                else_branch: self.opt()?,
            },
            WHILE => NodeKind::While {
                condition: self.id()?,
                body: self.id()?,
            },
            DO_WHILE => NodeKind::DoWhile {
                body: self.id()?,
                condition: self.id()?,
            },
            FOR => NodeKind::For {
                init: self.opt()?,
                condition: self.opt()?,
                increment: self.opt()?,
                body: self.id()?,
            },
            SWITCH => {
                let expr = self.id()?;
                let count = self.reader.u32()?;
                let mut cases = Vec::new();
                for _ in 0..count {
                    cases.push(SwitchCase {
                        label: self.opt()?,
                        body: self.ids()?,
                    });
                }
                NodeKind::Switch { expr, cases }
            }
            RETURN => NodeKind::Return { expr: self.opt()? },
            BREAK => NodeKind::Break,
            CONTINUE => NodeKind::Continue,
            EMPTY => NodeKind::Empty,
            NUMBER => {
                let unsigned = self.flag()?;
                match self.number()? {
                    Number::Int(value) => NodeKind::IntLiteral { value, unsigned },
                    Number::Float(v) => NodeKind::FloatLiteral(v),
                }
            }
            CHAR => NodeKind::CharLiteral(self.reader.u8()? as i8),
            STRING => NodeKind::StringLiteral(self.str()?),
            BOOL => NodeKind::BoolLiteral(self.flag()?),
            NULL => NodeKind::NullLiteral,
            IDENTIFIER => NodeKind::Identifier(self.str()?),
            BINARY => NodeKind::Binary {
                op: self.op(&BIN_OPS, "binary operator")?,
                left: self.id()?,
                right: self.id()?,
            },
            LOGICAL => NodeKind::Logical {
                op: self.op(&LOGICAL_OPS, "logical operator")?,
                left: self.id()?,
                right: self.id()?,
            },
            UNARY => NodeKind::Unary {
                op: self.op(&UN_OPS, "unary operator")?,
                operand: self.id()?,
            },
            INC_DEC => NodeKind::IncDec {
                op: self.op(&INC_DEC_OPS, "increment operator")?,
                target: self.id()?,
            },
            TERNARY => NodeKind::Ternary {
                condition: self.id()?,
                then_expr: self.id()?,
                else_expr: self.id()?,
            },
            ASSIGN => NodeKind::Assign {
                target: self.id()?,
                value: self.id()?,
            },
            COMPOUND_ASSIGN => NodeKind::CompoundAssign {
                op: self.op(&BIN_OPS, "binary operator")?,
                target: self.id()?,
                value: self.id()?,
            },
            CALL => NodeKind::Call {
                callee: self.str()?,
                args: self.ids()?,
            },
            METHOD_CALL => NodeKind::MethodCall {
                receiver: self.id()?,
                method: self.str()?,
                args: self.ids()?,
            },
            INDEX => NodeKind::Index {
                array: self.id()?,
                index: self.id()?,
            },
            MEMBER => NodeKind::Member {
                object: self.id()?,
                field: self.str()?,
                through_pointer: self.flag()?,
            },
            CAST => NodeKind::Cast {
                target_type: self.ty()?,
                expr: self.id()?,
            },
            SIZEOF_TYPE => NodeKind::SizeofType(self.ty()?),
            SIZEOF_EXPR => NodeKind::SizeofExpr(self.id()?),
            INIT_LIST => NodeKind::InitList(self.ids()?),
            _ => return Err(self.unknown("node", tag)),
        };

        Ok(Node { kind, location })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_sketch;

    const SKETCH: &str = r#"
#define LED 13
struct Point { int x; float y; };
static const unsigned long big = 4000000000UL;
Servo arm;

void setup() {
  pinMode(LED, OUTPUT);
  Serial.begin(9600);
  arm.attach(9);
}

void loop() {
  int values[3] = {1, -200, 70000};
  Point p = {1, 2.5};
  for (int i = 0; i < 3; i++) {
    switch (values[i] % 3) {
      case 0: digitalWrite(LED, HIGH); break;
      default: p.x += i << 2;
    }
  }
  double d = 0.1;
  char c = 'a';
  Serial.println(d > 0 && c != 0 ? "yes" : "no");
  delay(1000);
}
"#;

    #[test]
    fn test_round_trip() {
        let program = parse_sketch(SKETCH).unwrap().program;
        let bytes = encode(&program);
        assert_eq!(&bytes[..5], MAGIC);
        assert_eq!(decode(&bytes).unwrap(), program);
    }

    #[test]
    fn test_integer_tags_stay_integers() {
        let mut program = Program::new();
        let whole = program.push(NodeKind::FloatLiteral(2.0), SourceLocation::new(1, 1));
        let int = program.push(
            NodeKind::IntLiteral {
                value: 2,
                unsigned: false,
            },
            SourceLocation::new(1, 5),
        );
        let decoded = decode(&encode(&program)).unwrap();
        assert_eq!(decoded.kind(whole), &NodeKind::FloatLiteral(2.0));
        assert!(matches!(decoded.kind(int), NodeKind::IntLiteral { value: 2, .. }));
    }

    #[test]
    fn test_number_tag_selection() {
        let mut encoder = Encoder::default();
        encoder.int(200);
        encoder.int(-5);
        encoder.int(-40000);
        encoder.int(3_000_000_000);
        encoder.float(0.5);
        encoder.float(0.1);
        let tags: Vec<u8> = {
            let b = &encoder.body;
            vec![b[0], b[2], b[4], b[9], b[14], b[19]]
        };
        assert_eq!(tags, vec![UINT8, INT8, INT32, UINT32, FLOAT, DOUBLE]);
    }

    #[test]
    fn test_malformed_input() {
        assert_eq!(decode(b"NOPE"), Err(CodecError::UnexpectedEof(0)));
        assert_eq!(decode(b"XXXXX\x01\x00"), Err(CodecError::BadMagic));

        let mut program = Program::new();
        program.push(NodeKind::ExprStmt { expr: 7 }, SourceLocation::new(1, 1));
        assert_eq!(decode(&encode(&program)), Err(CodecError::DanglingNode(0)));

        let bytes = encode(&Program::new());
        assert!(matches!(
            decode(&bytes[..bytes.len() - 1]),
            Err(CodecError::UnexpectedEof(_))
        ));
    }

    fn negate(operand: NodeId) -> NodeKind {
        NodeKind::Unary {
            op: UnOp::Neg,
            operand,
        }
    }

    #[test]
    fn test_rejects_graphs_that_are_not_trees() {
        let loc = SourceLocation::new(1, 1);

        let mut self_loop = Program::new();
        self_loop.push(negate(0), loc);
        assert_eq!(decode(&encode(&self_loop)), Err(CodecError::CyclicNode(0)));

        let mut ring = Program::new();
        ring.push(negate(1), loc);
        ring.push(negate(0), loc);
        assert_eq!(decode(&encode(&ring)), Err(CodecError::CyclicNode(0)));

        let mut shared = Program::new();
        let leaf = shared.push(NodeKind::Identifier("x".into()), loc);
        let sum = shared.push(
            NodeKind::Binary {
                op: BinOp::Add,
                left: leaf,
                right: leaf,
            },
            loc,
        );
        shared.push(NodeKind::SizeofExpr(sum), loc);
        assert_eq!(decode(&encode(&shared)), Err(CodecError::SharedNode(leaf)));
    }

    #[test]
    fn test_nesting_limit() {
        let loc = SourceLocation::new(1, 1);
        let mut program = Program::new();
        let mut top = program.push(NodeKind::Identifier("x".into()), loc);
        for _ in 1..MAX_DEPTH {
            top = program.push(negate(top), loc);
        }
        assert!(decode(&encode(&program)).is_ok());

        program.push(negate(top), loc);
        assert_eq!(decode(&encode(&program)), Err(CodecError::TooDeep(MAX_DEPTH)));
    }
}
