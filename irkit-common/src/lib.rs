//! irkit - Common Types
//!
//! This crate contains the vocabulary shared by the backend capability
//! surface and the typed object layer: opaque handles and the small enums
//! that describe type kinds, linkage and arithmetic opcodes.

pub mod handle;
pub mod types;

pub use handle::{RawHandle, HANDLE_SIZE};
pub use types::{BinaryOp, Linkage, TypeKind};
