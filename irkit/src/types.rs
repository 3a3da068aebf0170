//! IR types
//!
//! A [`Type`] is an immutable descriptor handed out by the backend. The
//! backend interns descriptors, so two wrappers around the same handle in
//! the same context are equal.

use crate::context::Context;
use crate::error::{IrError, Result};
use irkit_common::{RawHandle, TypeKind};
use std::fmt;

#[derive(Clone, Copy)]
pub struct Type<'ctx> {
    raw: RawHandle,
    context: &'ctx Context,
}

impl<'ctx> Type<'ctx> {
    fn wrap(context: &'ctx Context, raw: RawHandle, operation: &'static str) -> Result<Self> {
        if raw.is_null() {
            return Err(IrError::BackendAllocationFailed { operation });
        }
        Ok(Type { raw, context })
    }

    /// Integer type of `width` bits.
    pub fn int(context: &'ctx Context, width: u32) -> Result<Self> {
        // SAFETY: the context handle is live for 'ctx
        let raw = unsafe { context.backend().int_type(context.raw(), width) };
        Self::wrap(context, raw, "int_type")
    }

    pub fn bool(context: &'ctx Context) -> Result<Self> {
        Self::int(context, 1)
    }

    pub fn int8(context: &'ctx Context) -> Result<Self> {
        Self::int(context, 8)
    }

    pub fn int16(context: &'ctx Context) -> Result<Self> {
        Self::int(context, 16)
    }

    pub fn int32(context: &'ctx Context) -> Result<Self> {
        Self::int(context, 32)
    }

    pub fn int64(context: &'ctx Context) -> Result<Self> {
        Self::int(context, 64)
    }

    /// 32-bit IEEE float.
    pub fn float32(context: &'ctx Context) -> Result<Self> {
        let raw = unsafe { context.backend().float_type(context.raw()) };
        Self::wrap(context, raw, "float_type")
    }

    /// 64-bit IEEE float.
    pub fn float64(context: &'ctx Context) -> Result<Self> {
        let raw = unsafe { context.backend().double_type(context.raw()) };
        Self::wrap(context, raw, "double_type")
    }

    pub fn void(context: &'ctx Context) -> Result<Self> {
        let raw = unsafe { context.backend().void_type(context.raw()) };
        Self::wrap(context, raw, "void_type")
    }

    /// Pointer to `element` in address space 0.
    pub fn pointer(element: Type<'ctx>) -> Result<Self> {
        Self::pointer_in(element, 0)
    }

    /// Pointer to `element` in the given address space.
    pub fn pointer_in(element: Type<'ctx>, address_space: u32) -> Result<Self> {
        let context = element.context;
        // SAFETY: `element` was allocated in `context`
        let raw = unsafe { context.backend().pointer_type(element.raw, address_space) };
        Self::wrap(context, raw, "pointer_type")
    }

    pub fn kind(&self) -> TypeKind {
        unsafe { self.context.backend().type_kind(self.raw) }
    }

    pub fn is_integer(&self) -> bool {
        self.kind() == TypeKind::Integer
    }

    /// True for an integer type of exactly `width` bits.
    pub fn is_integer_of(&self, width: u32) -> bool {
        self.is_integer() && self.width_unchecked() == width
    }

    pub fn is_float32(&self) -> bool {
        self.kind() == TypeKind::Float
    }

    pub fn is_float64(&self) -> bool {
        self.kind() == TypeKind::Double
    }

    /// True for either floating-point type.
    pub fn is_float(&self) -> bool {
        matches!(self.kind(), TypeKind::Float | TypeKind::Double)
    }

    pub fn is_void(&self) -> bool {
        self.kind() == TypeKind::Void
    }

    pub fn is_pointer(&self) -> bool {
        self.kind() == TypeKind::Pointer
    }

    /// Bit width of an integer type.
    pub fn bit_width(&self) -> Result<u32> {
        if !self.is_integer() {
            return Err(IrError::NotAnIntegerType {
                found: self.to_string(),
            });
        }
        Ok(self.width_unchecked())
    }

    fn width_unchecked(&self) -> u32 {
        unsafe { self.context.backend().int_type_width(self.raw) }
    }

    pub fn context(&self) -> &'ctx Context {
        self.context
    }

    pub(crate) fn raw(&self) -> RawHandle {
        self.raw
    }

    /// Wraps a handle the backend reported for a value or signature.
    pub(crate) fn from_backend(context: &'ctx Context, raw: RawHandle, operation: &'static str) -> Result<Self> {
        Self::wrap(context, raw, operation)
    }
}

impl PartialEq for Type<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw && self.context.same_as(other.context)
    }
}

impl Eq for Type<'_> {}

impl fmt::Display for Type<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = unsafe { self.context.backend().print_type(self.raw) };
        write!(f, "{}", text)
    }
}

impl fmt::Debug for Type<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({})", self)
    }
}
