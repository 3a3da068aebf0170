//! Instruction builder
//!
//! The builder is a cursor over one context. It starts unpositioned; every
//! emission before the first [`Builder::insert_into`] fails with
//! `NoInsertionPoint` and reaches no backend entry point.
//!
//! Checks run in a fixed order: insertion point, then operand contexts,
//! then operand types. Only when all of them pass is the instruction handed
//! to the backend. Emission never moves the insertion point, so a second
//! terminator in the same block is accepted here and reported by
//! verification.

use crate::context::Context;
use crate::error::{IrError, Result};
use crate::function::BasicBlock;
use crate::marshal::c_name;
use crate::types::Type;
use crate::value::Value;
use irkit_common::{BinaryOp, RawHandle};
use log::{debug, trace};
use std::fmt;

pub struct Builder<'ctx> {
    raw: RawHandle,
    context: &'ctx Context,
    position: Option<BasicBlock<'ctx>>,
}

impl<'ctx> Builder<'ctx> {
    pub fn create(context: &'ctx Context) -> Result<Self> {
        let raw = unsafe { context.backend().create_builder(context.raw()) };
        if raw.is_null() {
            return Err(IrError::BackendAllocationFailed {
                operation: "create_builder",
            });
        }
        debug!("Created builder {:?}", raw);
        Ok(Builder {
            raw,
            context,
            position: None,
        })
    }

    /// Position the cursor at the end of `block`.
    pub fn insert_into(&mut self, block: &BasicBlock<'ctx>) -> Result<()> {
        self.context.ensure_same(block.context(), "insert_into")?;
        unsafe { self.context.backend().position_at_end(self.raw, block.raw()) };
        trace!("Builder positioned at end of '{}'", block.name());
        self.position = Some(block.clone());
        Ok(())
    }

    /// The block instructions are appended to, if the builder is positioned.
    pub fn insertion_block(&self) -> Option<&BasicBlock<'ctx>> {
        self.position.as_ref()
    }

    // ---- Arithmetic ----

    pub fn add(&self, lhs: Value<'ctx>, rhs: Value<'ctx>, name: &str) -> Result<Value<'ctx>> {
        self.binary(BinaryOp::Add, lhs, rhs, name)
    }

    pub fn sub(&self, lhs: Value<'ctx>, rhs: Value<'ctx>, name: &str) -> Result<Value<'ctx>> {
        self.binary(BinaryOp::Sub, lhs, rhs, name)
    }

    pub fn mul(&self, lhs: Value<'ctx>, rhs: Value<'ctx>, name: &str) -> Result<Value<'ctx>> {
        self.binary(BinaryOp::Mul, lhs, rhs, name)
    }

    /// Signed integer division
    pub fn sdiv(&self, lhs: Value<'ctx>, rhs: Value<'ctx>, name: &str) -> Result<Value<'ctx>> {
        self.binary(BinaryOp::SDiv, lhs, rhs, name)
    }

    /// Unsigned integer division
    pub fn udiv(&self, lhs: Value<'ctx>, rhs: Value<'ctx>, name: &str) -> Result<Value<'ctx>> {
        self.binary(BinaryOp::UDiv, lhs, rhs, name)
    }

    pub fn fadd(&self, lhs: Value<'ctx>, rhs: Value<'ctx>, name: &str) -> Result<Value<'ctx>> {
        self.binary(BinaryOp::FAdd, lhs, rhs, name)
    }

    pub fn fsub(&self, lhs: Value<'ctx>, rhs: Value<'ctx>, name: &str) -> Result<Value<'ctx>> {
        self.binary(BinaryOp::FSub, lhs, rhs, name)
    }

    pub fn fmul(&self, lhs: Value<'ctx>, rhs: Value<'ctx>, name: &str) -> Result<Value<'ctx>> {
        self.binary(BinaryOp::FMul, lhs, rhs, name)
    }

    pub fn fdiv(&self, lhs: Value<'ctx>, rhs: Value<'ctx>, name: &str) -> Result<Value<'ctx>> {
        self.binary(BinaryOp::FDiv, lhs, rhs, name)
    }

    fn binary(&self, op: BinaryOp, lhs: Value<'ctx>, rhs: Value<'ctx>, name: &str) -> Result<Value<'ctx>> {
        let operation = op.mnemonic();
        self.ensure_positioned(operation)?;
        self.ensure_operand(&lhs, operation)?;
        self.ensure_operand(&rhs, operation)?;

        let lhs_type = lhs.get_type()?;
        let rhs_type = rhs.get_type()?;
        let (class_ok, class) = if op.is_float() {
            (lhs_type.is_float(), "floating-point operand")
        } else {
            (lhs_type.is_integer(), "integer operand")
        };
        if !class_ok {
            return Err(IrError::OperandTypeMismatch {
                operation,
                expected: class.to_string(),
                found: lhs_type.to_string(),
            });
        }
        if lhs_type != rhs_type {
            return Err(IrError::OperandTypeMismatch {
                operation,
                expected: lhs_type.to_string(),
                found: rhs_type.to_string(),
            });
        }

        let c_name = c_name(name)?;
        let raw = unsafe {
            self.context
                .backend()
                .build_binary(self.raw, op, lhs.raw(), rhs.raw(), &c_name)
        };
        trace!("Emitted {} '{}'", operation, name);
        Value::wrap(self.context, raw, operation)
    }

    // ---- Memory ----

    /// Stack slot for one `ty`; the result is a pointer to `ty`.
    pub fn alloca(&self, ty: Type<'ctx>, name: &str) -> Result<Value<'ctx>> {
        self.ensure_positioned("alloca")?;
        self.context.ensure_same(ty.context(), "alloca")?;
        let c_name = c_name(name)?;
        let raw = unsafe { self.context.backend().build_alloca(self.raw, ty.raw(), &c_name) };
        trace!("Emitted alloca {} '{}'", ty, name);
        Value::wrap(self.context, raw, "alloca")
    }

    pub fn store(&self, value: Value<'ctx>, pointer: Value<'ctx>) -> Result<()> {
        self.ensure_positioned("store")?;
        self.ensure_operand(&value, "store")?;
        self.ensure_operand(&pointer, "store")?;
        self.ensure_pointer(&pointer, "store")?;

        let raw = unsafe {
            self.context
                .backend()
                .build_store(self.raw, value.raw(), pointer.raw())
        };
        trace!("Emitted store");
        Value::wrap(self.context, raw, "store").map(|_| ())
    }

    pub fn load(&self, pointer: Value<'ctx>, name: &str) -> Result<Value<'ctx>> {
        self.ensure_positioned("load")?;
        self.ensure_operand(&pointer, "load")?;
        self.ensure_pointer(&pointer, "load")?;

        let c_name = c_name(name)?;
        let raw = unsafe { self.context.backend().build_load(self.raw, pointer.raw(), &c_name) };
        trace!("Emitted load '{}'", name);
        Value::wrap(self.context, raw, "load")
    }

    // ---- Control flow ----

    /// Unconditional jump to `target`.
    pub fn br(&self, target: &BasicBlock<'ctx>) -> Result<()> {
        self.ensure_positioned("br")?;
        self.context.ensure_same(target.context(), "br")?;
        let raw = unsafe { self.context.backend().build_br(self.raw, target.raw()) };
        trace!("Emitted br to '{}'", target.name());
        Value::wrap(self.context, raw, "br").map(|_| ())
    }

    /// Two-way branch on an `i1` condition.
    pub fn cond_br(
        &self,
        condition: Value<'ctx>,
        then_block: &BasicBlock<'ctx>,
        else_block: &BasicBlock<'ctx>,
    ) -> Result<()> {
        self.ensure_positioned("cond_br")?;
        self.ensure_operand(&condition, "cond_br")?;
        self.context.ensure_same(then_block.context(), "cond_br")?;
        self.context.ensure_same(else_block.context(), "cond_br")?;

        let condition_type = condition.get_type()?;
        if !condition_type.is_integer_of(1) {
            return Err(IrError::ConditionMustBeBoolean {
                found: condition_type.to_string(),
            });
        }

        let raw = unsafe {
            self.context
                .backend()
                .build_cond_br(self.raw, condition.raw(), then_block.raw(), else_block.raw())
        };
        trace!("Emitted cond_br to '{}' / '{}'", then_block.name(), else_block.name());
        Value::wrap(self.context, raw, "cond_br").map(|_| ())
    }

    /// Return from the enclosing function.
    ///
    /// A value is required exactly when the function returns non-void, and
    /// its type must equal the declared return type.
    pub fn ret(&self, value: Option<Value<'ctx>>) -> Result<()> {
        let block = self.ensure_positioned("ret")?;
        let expected = block.return_type();

        let raw_value = match value {
            None if expected.is_void() => RawHandle::NULL,
            None => {
                return Err(IrError::ReturnTypeMismatch {
                    expected: expected.to_string(),
                    found: "void".to_string(),
                })
            }
            Some(value) => {
                self.ensure_operand(&value, "ret")?;
                let found = value.get_type()?;
                if expected.is_void() || found != expected {
                    return Err(IrError::ReturnTypeMismatch {
                        expected: expected.to_string(),
                        found: found.to_string(),
                    });
                }
                value.raw()
            }
        };

        let raw = unsafe { self.context.backend().build_ret(self.raw, raw_value) };
        trace!("Emitted ret in '{}'", block.name());
        Value::wrap(self.context, raw, "ret").map(|_| ())
    }

    fn ensure_positioned(&self, operation: &'static str) -> Result<&BasicBlock<'ctx>> {
        self.position
            .as_ref()
            .ok_or(IrError::NoInsertionPoint { operation })
    }

    fn ensure_operand(&self, value: &Value<'ctx>, operation: &'static str) -> Result<()> {
        self.context.ensure_same(value.context(), operation)
    }

    fn ensure_pointer(&self, pointer: &Value<'ctx>, operation: &'static str) -> Result<()> {
        let ty = pointer.get_type()?;
        if ty.is_pointer() {
            Ok(())
        } else {
            Err(IrError::OperandTypeMismatch {
                operation,
                expected: "pointer".to_string(),
                found: ty.to_string(),
            })
        }
    }
}

impl fmt::Debug for Builder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("raw", &self.raw)
            .field("position", &self.position.as_ref().map(|b| b.name()))
            .finish()
    }
}

impl Drop for Builder<'_> {
    fn drop(&mut self) {
        // SAFETY: the builder handle belongs to `context`, which outlives us
        unsafe { self.context.backend().dispose_builder(self.raw) };
    }
}
