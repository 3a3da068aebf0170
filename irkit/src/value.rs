//! IR values and constants

use crate::context::Context;
use crate::error::{IrError, Result};
use crate::types::Type;
use irkit_common::RawHandle;
use std::fmt;

/// Opaque handle to any IR value: a parameter, a constant, or the result
/// of an instruction.
#[derive(Clone, Copy)]
pub struct Value<'ctx> {
    raw: RawHandle,
    context: &'ctx Context,
}

impl<'ctx> Value<'ctx> {
    pub(crate) fn wrap(context: &'ctx Context, raw: RawHandle, operation: &'static str) -> Result<Self> {
        if raw.is_null() {
            return Err(IrError::BackendAllocationFailed { operation });
        }
        Ok(Value { raw, context })
    }

    /// Integer constant of type `ty`.
    ///
    /// `signed` decides how `value` is widened when `ty` is wider than 64
    /// bits; narrower types keep the low bits.
    pub fn const_int(ty: Type<'ctx>, value: u64, signed: bool) -> Result<Self> {
        if !ty.is_integer() {
            return Err(IrError::NotAnIntegerType {
                found: ty.to_string(),
            });
        }
        let context = ty.context();
        let raw = unsafe { context.backend().const_int(ty.raw(), value, signed) };
        Self::wrap(context, raw, "const_int")
    }

    /// Floating-point constant, rounded to the nearest value `ty` can hold.
    pub fn const_float(ty: Type<'ctx>, value: f64) -> Result<Self> {
        if !ty.is_float() {
            return Err(IrError::NotAFloatType {
                found: ty.to_string(),
            });
        }
        let context = ty.context();
        let raw = unsafe { context.backend().const_real(ty.raw(), value) };
        Self::wrap(context, raw, "const_real")
    }

    /// The value's type, as the backend currently reports it.
    pub fn get_type(&self) -> Result<Type<'ctx>> {
        let raw = unsafe { self.context.backend().type_of(self.raw) };
        Type::from_backend(self.context, raw, "type_of")
    }

    pub fn context(&self) -> &'ctx Context {
        self.context
    }

    pub(crate) fn raw(&self) -> RawHandle {
        self.raw
    }
}

impl PartialEq for Value<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw && self.context.same_as(other.context)
    }
}

impl Eq for Value<'_> {}

impl fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Value").field(&self.raw).finish()
    }
}
