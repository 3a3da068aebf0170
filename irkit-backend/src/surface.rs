//! The backend capability surface
//!
//! Every entry point mirrors one C-level function of a code-generation
//! backend. Constructors report failure by returning [`RawHandle::NULL`];
//! nothing here returns a `Result`, because the layer above owns error
//! classification.
//!
//! # Safety
//!
//! Entry points that accept handles are `unsafe`: the caller guarantees
//! that every handle was issued by this same backend instance, that the
//! context it belongs to has not been disposed, and that all handles passed
//! to one call belong to the same context. Names must stay alive for the
//! duration of the call. The typed object layer upholds these rules through
//! lifetimes and run-time context checks.

use irkit_common::{BinaryOp, Linkage, RawHandle, TypeKind};
use std::ffi::CStr;

/// Outcome of a verification request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Valid,
    /// The IR is malformed; diagnostics are included when the backend
    /// produces any.
    Broken(Option<String>),
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verification::Valid)
    }
}

/// The fixed set of backend entry points.
pub trait Backend {
    /// Short name used in logs and diagnostics.
    fn name(&self) -> &'static str;

    // ---- Allocation ----

    fn create_context(&self) -> RawHandle;

    /// Releases the context and everything allocated under it.
    unsafe fn dispose_context(&self, context: RawHandle);

    unsafe fn create_module(&self, name: &CStr, context: RawHandle) -> RawHandle;

    unsafe fn create_builder(&self, context: RawHandle) -> RawHandle;

    unsafe fn dispose_builder(&self, builder: RawHandle);

    // ---- Type constructors ----

    unsafe fn int_type(&self, context: RawHandle, width: u32) -> RawHandle;

    unsafe fn float_type(&self, context: RawHandle) -> RawHandle;

    unsafe fn double_type(&self, context: RawHandle) -> RawHandle;

    unsafe fn void_type(&self, context: RawHandle) -> RawHandle;

    unsafe fn pointer_type(&self, element: RawHandle, address_space: u32) -> RawHandle;

    /// `params` points at `count` contiguous handle slots in declaration
    /// order. A zero count may come with a dangling pointer.
    unsafe fn function_type(
        &self,
        return_type: RawHandle,
        params: *const RawHandle,
        count: u32,
        is_var_arg: bool,
    ) -> RawHandle;

    // ---- Introspection ----

    unsafe fn type_kind(&self, ty: RawHandle) -> TypeKind;

    /// Only meaningful for integer types.
    unsafe fn int_type_width(&self, ty: RawHandle) -> u32;

    unsafe fn type_of(&self, value: RawHandle) -> RawHandle;

    unsafe fn print_type(&self, ty: RawHandle) -> String;

    // ---- Functions and blocks ----

    unsafe fn add_function(&self, module: RawHandle, name: &CStr, function_type: RawHandle) -> RawHandle;

    unsafe fn set_linkage(&self, function: RawHandle, linkage: Linkage);

    unsafe fn append_block(&self, context: RawHandle, function: RawHandle, name: &CStr) -> RawHandle;

    unsafe fn param(&self, function: RawHandle, index: u32) -> RawHandle;

    // ---- Instruction emission ----

    unsafe fn position_at_end(&self, builder: RawHandle, block: RawHandle);

    unsafe fn build_binary(
        &self,
        builder: RawHandle,
        op: BinaryOp,
        lhs: RawHandle,
        rhs: RawHandle,
        name: &CStr,
    ) -> RawHandle;

    unsafe fn build_alloca(&self, builder: RawHandle, ty: RawHandle, name: &CStr) -> RawHandle;

    unsafe fn build_store(&self, builder: RawHandle, value: RawHandle, pointer: RawHandle) -> RawHandle;

    unsafe fn build_load(&self, builder: RawHandle, pointer: RawHandle, name: &CStr) -> RawHandle;

    unsafe fn build_br(&self, builder: RawHandle, target: RawHandle) -> RawHandle;

    unsafe fn build_cond_br(
        &self,
        builder: RawHandle,
        condition: RawHandle,
        then_block: RawHandle,
        else_block: RawHandle,
    ) -> RawHandle;

    /// A null `value` builds `ret void`.
    unsafe fn build_ret(&self, builder: RawHandle, value: RawHandle) -> RawHandle;

    // ---- Constants ----

    unsafe fn const_int(&self, ty: RawHandle, value: u64, sign_extend: bool) -> RawHandle;

    unsafe fn const_real(&self, ty: RawHandle, value: f64) -> RawHandle;

    // ---- Verification and serialization ----

    unsafe fn verify_function(&self, function: RawHandle) -> Verification;

    unsafe fn verify_module(&self, module: RawHandle) -> Verification;

    unsafe fn print_module(&self, module: RawHandle) -> String;
}
