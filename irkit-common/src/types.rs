//! IR vocabulary shared across crates

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of a backend type descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Void,
    /// 32-bit IEEE float
    Float,
    /// 64-bit IEEE float
    Double,
    Integer,
    Pointer,
    Function,
    Label,
    /// Anything the layer above does not model
    Other,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeKind::Void => "void",
            TypeKind::Float => "float",
            TypeKind::Double => "double",
            TypeKind::Integer => "integer",
            TypeKind::Pointer => "pointer",
            TypeKind::Function => "function",
            TypeKind::Label => "label",
            TypeKind::Other => "other",
        };
        write!(f, "{}", name)
    }
}

/// Linkage types for functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Linkage {
    /// Visible to other modules
    #[default]
    External,
    /// Only visible within this module
    Internal,
    /// Like internal, but omitted from the symbol table
    Private,
}

impl Linkage {
    /// Keyword printed between `define` and the return type, if any
    pub fn keyword(&self) -> Option<&'static str> {
        match self {
            Linkage::External => None,
            Linkage::Internal => Some("internal"),
            Linkage::Private => Some("private"),
        }
    }
}

/// Binary arithmetic operations the builder can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    FAdd,
    FSub,
    FMul,
    FDiv,
}

impl BinaryOp {
    /// Every opcode, integer ones first
    pub const ALL: [BinaryOp; 9] = [
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::SDiv,
        BinaryOp::UDiv,
        BinaryOp::FAdd,
        BinaryOp::FSub,
        BinaryOp::FMul,
        BinaryOp::FDiv,
    ];

    /// True for the floating-point opcodes
    pub fn is_float(&self) -> bool {
        matches!(self, BinaryOp::FAdd | BinaryOp::FSub | BinaryOp::FMul | BinaryOp::FDiv)
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::SDiv => "sdiv",
            BinaryOp::UDiv => "udiv",
            BinaryOp::FAdd => "fadd",
            BinaryOp::FSub => "fsub",
            BinaryOp::FMul => "fmul",
            BinaryOp::FDiv => "fdiv",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_opcodes() {
        assert!(BinaryOp::FAdd.is_float());
        assert!(BinaryOp::FDiv.is_float());
        assert!(!BinaryOp::SDiv.is_float());
        assert!(!BinaryOp::Add.is_float());
    }

    #[test]
    fn test_all_opcodes_listed_once() {
        let floats = BinaryOp::ALL.iter().filter(|op| op.is_float()).count();
        assert_eq!(floats, 4);
        let mut mnemonics: Vec<&str> = BinaryOp::ALL.iter().map(|op| op.mnemonic()).collect();
        mnemonics.sort();
        mnemonics.dedup();
        assert_eq!(mnemonics.len(), 9);
    }

    #[test]
    fn test_opcode_display() {
        assert_eq!(format!("{}", BinaryOp::UDiv), "udiv");
        assert_eq!(format!("{}", BinaryOp::FMul), "fmul");
    }

    #[test]
    fn test_linkage_keyword() {
        assert_eq!(Linkage::default(), Linkage::External);
        assert_eq!(Linkage::External.keyword(), None);
        assert_eq!(Linkage::Internal.keyword(), Some("internal"));
    }
}
