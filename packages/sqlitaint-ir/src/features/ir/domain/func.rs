//! Functions, methods and closures

use std::sync::Arc;

use super::ids::{BlockId, OpId};
use super::types::OpType;
use crate::shared::models::Position;

/// Function flag bits
pub mod flags {
    pub const PUBLIC: u32 = 1;
    pub const PROTECTED: u32 = 1 << 1;
    pub const PRIVATE: u32 = 1 << 2;
    pub const STATIC: u32 = 1 << 3;
    pub const ABSTRACT: u32 = 1 << 4;
    pub const FINAL: u32 = 1 << 5;
    pub const RETURNS_REF: u32 = 1 << 6;
    pub const CLOSURE: u32 = 1 << 7;
}

/// Name given to the top-level code of a file
pub const MAIN_FUNC_NAME: &str = "{main}";

#[derive(Debug, Clone, PartialEq)]
pub struct Func {
    pub name: String,
    pub flags: u32,
    pub return_type: OpType,
    /// Declaring class (namespace-qualified) for methods
    pub class: Option<String>,
    /// Param ops in declaration order
    pub params: Vec<OpId>,
    pub entry: BlockId,
    /// Every block owned by this function, entry first
    pub blocks: Vec<BlockId>,
    /// The Function/ClassMethod/Closure op declaring this function
    pub callable_op: Option<OpId>,
    pub contains_tainted: bool,
    /// Ops reading a superglobal
    pub sources: Vec<OpId>,
    /// Call ops in this function
    pub calls: Vec<OpId>,
    pub position: Position,
    pub file_path: Option<Arc<str>>,
}

impl Func {
    pub fn new(name: impl Into<String>, entry: BlockId) -> Self {
        Self {
            name: name.into(),
            flags: 0,
            return_type: OpType::Mixed,
            class: None,
            params: Vec::new(),
            entry,
            blocks: vec![entry],
            callable_op: None,
            contains_tainted: false,
            sources: Vec::new(),
            calls: Vec::new(),
            position: Position::zero(),
            file_path: None,
        }
    }

    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    pub fn is_main(&self) -> bool {
        self.name == MAIN_FUNC_NAME && self.class.is_none()
    }

    pub fn is_closure(&self) -> bool {
        self.has_flag(flags::CLOSURE)
    }

    /// `Class::method`, the function name, or `{main}`
    pub fn scoped_name(&self) -> String {
        match &self.class {
            Some(class) => format!("{}::{}", class, self.name),
            None => self.name.clone(),
        }
    }
}
