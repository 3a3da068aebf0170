//! irkit - Backend Capability Surface
//!
//! This crate defines the fixed set of entry points the typed object layer
//! calls into, and the backends that provide them:
//!
//! - [`ReferenceBackend`]: an in-process IR store that prints LLVM-style
//!   textual IR and performs structural verification. Always available.
//! - `LlvmBackend` (feature `llvm`): the native LLVM C API through
//!   `llvm-sys`, bound once per process.
//!
//! The surface speaks only in [`RawHandle`]s, NUL-terminated names and
//! explicit-length handle buffers, mirroring a C calling convention.

pub mod surface;
pub mod reference;

#[cfg(feature = "llvm")]
pub mod llvm;

pub use irkit_common::{BinaryOp, Linkage, RawHandle, TypeKind, HANDLE_SIZE};
pub use reference::{BackendStats, ReferenceBackend};
pub use surface::{Backend, Verification};

#[cfg(feature = "llvm")]
pub use llvm::LlvmBackend;
