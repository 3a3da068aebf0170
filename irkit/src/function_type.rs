//! Function signatures
//!
//! A [`FunctionType`] is the single authoritative source of a function's
//! arity. The parameter count is fixed when the signature is built and is
//! copied, once, into every function created from it.

use crate::context::Context;
use crate::error::{IrError, Result};
use crate::marshal::HandleBuffer;
use crate::types::Type;
use irkit_common::RawHandle;
use log::debug;
use std::fmt;

#[derive(Clone)]
pub struct FunctionType<'ctx> {
    raw: RawHandle,
    context: &'ctx Context,
    param_types: Vec<Type<'ctx>>,
    return_type: Type<'ctx>,
    is_var_arg: bool,
    arity: u32,
}

impl<'ctx> FunctionType<'ctx> {
    /// Build a signature from fully known parameter types.
    pub fn create(param_types: &[Type<'ctx>], return_type: Type<'ctx>, is_var_arg: bool) -> Result<Self> {
        let slots: Vec<Option<Type<'ctx>>> = param_types.iter().copied().map(Some).collect();
        Self::from_slots(&slots, return_type, is_var_arg)
    }

    /// Build a signature from parameter slots that may still be unset.
    ///
    /// Every slot must hold a type from the return type's context. The
    /// first empty or foreign slot fails with `InvalidParameterType`, and
    /// in that case the backend is never called.
    pub fn from_slots(slots: &[Option<Type<'ctx>>], return_type: Type<'ctx>, is_var_arg: bool) -> Result<Self> {
        let context = return_type.context();
        let mut param_types = Vec::with_capacity(slots.len());
        for (index, slot) in slots.iter().enumerate() {
            match slot {
                Some(ty) if ty.context().same_as(context) => param_types.push(*ty),
                _ => return Err(IrError::InvalidParameterType { index }),
            }
        }

        let buffer = HandleBuffer::from_handles(param_types.iter().map(Type::raw));
        let arity = buffer.count()?;
        debug!(
            "Marshaled {} parameter types into {} bytes",
            arity,
            buffer.byte_len()
        );

        // SAFETY: every handle in `buffer` and `return_type` belongs to
        // `context`; `buffer` stays alive until the call returns.
        let raw = unsafe {
            context
                .backend()
                .function_type(return_type.raw(), buffer.as_ptr(), arity, is_var_arg)
        };
        drop(buffer);
        if raw.is_null() {
            return Err(IrError::BackendAllocationFailed {
                operation: "function_type",
            });
        }

        Ok(FunctionType {
            raw,
            context,
            param_types,
            return_type,
            is_var_arg,
            arity,
        })
    }

    /// Number of formal parameters
    pub fn arity(&self) -> u32 {
        self.arity
    }

    pub fn param_types(&self) -> &[Type<'ctx>] {
        &self.param_types
    }

    pub fn return_type(&self) -> Type<'ctx> {
        self.return_type
    }

    pub fn is_var_arg(&self) -> bool {
        self.is_var_arg
    }

    pub fn context(&self) -> &'ctx Context {
        self.context
    }

    pub(crate) fn raw(&self) -> RawHandle {
        self.raw
    }
}

impl fmt::Display for FunctionType<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = unsafe { self.context.backend().print_type(self.raw) };
        write!(f, "{}", text)
    }
}

impl fmt::Debug for FunctionType<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionType({})", self)
    }
}
