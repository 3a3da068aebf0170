//! Functions and basic blocks

use crate::context::Context;
use crate::error::{IrError, Result};
use crate::function_type::FunctionType;
use crate::marshal::c_name;
use crate::types::Type;
use crate::value::Value;
use irkit_backend::Verification;
use irkit_common::{Linkage, RawHandle};
use log::{debug, warn};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A function owned by a [`Module`](crate::Module).
///
/// Cloning yields another handle to the same function; blocks appended
/// through one clone are visible through every other.
#[derive(Clone)]
pub struct Function<'ctx> {
    inner: Rc<FunctionInner<'ctx>>,
}

struct FunctionInner<'ctx> {
    raw: RawHandle,
    context: &'ctx Context,
    name: String,
    arity: u32,
    return_type: Type<'ctx>,
    linkage: Linkage,
    blocks: RefCell<Vec<BasicBlock<'ctx>>>,
}

impl<'ctx> Function<'ctx> {
    /// Wraps a backend function created from `function_type`; the arity
    /// is copied from the signature here and never recomputed.
    pub(crate) fn new(
        context: &'ctx Context,
        raw: RawHandle,
        name: &str,
        function_type: &FunctionType<'ctx>,
        linkage: Linkage,
    ) -> Self {
        Function {
            inner: Rc::new(FunctionInner {
                raw,
                context,
                name: name.to_string(),
                arity: function_type.arity(),
                return_type: function_type.return_type(),
                linkage,
                blocks: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Append a new block at the end of the function.
    ///
    /// Block names need not be unique; the backend renames on collision.
    pub fn add_block(&self, name: &str) -> Result<BasicBlock<'ctx>> {
        let c_name = c_name(name)?;
        let context = self.inner.context;
        let raw = unsafe { context.backend().append_block(context.raw(), self.inner.raw, &c_name) };
        if raw.is_null() {
            return Err(IrError::BackendAllocationFailed {
                operation: "append_block",
            });
        }

        let block = BasicBlock {
            raw,
            context,
            name: name.to_string(),
            function: self.inner.raw,
            return_type: self.inner.return_type,
        };
        self.inner.blocks.borrow_mut().push(block.clone());
        debug!("Appended block '{}' to function '{}'", name, self.inner.name);
        Ok(block)
    }

    /// The parameter at `index`.
    pub fn arg(&self, index: u32) -> Result<Value<'ctx>> {
        if index >= self.inner.arity {
            return Err(IrError::ArgumentIndexOutOfRange {
                index,
                arity: self.inner.arity,
            });
        }
        let raw = unsafe { self.inner.context.backend().param(self.inner.raw, index) };
        Value::wrap(self.inner.context, raw, "param")
    }

    /// All parameters in declaration order.
    pub fn args(&self) -> Result<Vec<Value<'ctx>>> {
        (0..self.inner.arity).map(|index| self.arg(index)).collect()
    }

    /// Run the backend verifier over this function only.
    pub fn verify(&self) -> Result<()> {
        match unsafe { self.inner.context.backend().verify_function(self.inner.raw) } {
            Verification::Valid => {
                debug!("Function '{}' verified", self.inner.name);
                Ok(())
            }
            Verification::Broken(diagnostics) => {
                warn!("Function '{}' failed verification", self.inner.name);
                Err(IrError::FunctionVerificationFailed {
                    function: self.inner.name.clone(),
                    diagnostics,
                })
            }
        }
    }

    /// The name requested at creation
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn arity(&self) -> u32 {
        self.inner.arity
    }

    pub fn return_type(&self) -> Type<'ctx> {
        self.inner.return_type
    }

    pub fn linkage(&self) -> Linkage {
        self.inner.linkage
    }

    /// Blocks in the order they were appended.
    pub fn blocks(&self) -> Vec<BasicBlock<'ctx>> {
        self.inner.blocks.borrow().clone()
    }

    pub fn entry_block(&self) -> Option<BasicBlock<'ctx>> {
        self.inner.blocks.borrow().first().cloned()
    }

    pub fn context(&self) -> &'ctx Context {
        self.inner.context
    }
}

impl fmt::Debug for Function<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.inner.name)
            .field("arity", &self.inner.arity)
            .field("linkage", &self.inner.linkage)
            .field("blocks", &self.inner.blocks.borrow().len())
            .finish()
    }
}

/// An append-only instruction sequence inside one function
#[derive(Clone)]
pub struct BasicBlock<'ctx> {
    raw: RawHandle,
    context: &'ctx Context,
    name: String,
    function: RawHandle,
    return_type: Type<'ctx>,
}

impl<'ctx> BasicBlock<'ctx> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> &'ctx Context {
        self.context
    }

    pub(crate) fn raw(&self) -> RawHandle {
        self.raw
    }

    /// Return type of the enclosing function; `ret` checks against it.
    pub(crate) fn return_type(&self) -> Type<'ctx> {
        self.return_type
    }
}

impl PartialEq for BasicBlock<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw && self.context.same_as(other.context)
    }
}

impl Eq for BasicBlock<'_> {}

impl fmt::Debug for BasicBlock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicBlock")
            .field("name", &self.name)
            .field("raw", &self.raw)
            .field("function", &self.function)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Module;

    #[test]
    fn test_args_follow_arity() {
        let ctx = Context::create().unwrap();
        let module = Module::create("demo", &ctx).unwrap();
        let i32_ty = Type::int32(&ctx).unwrap();
        let fn_ty = FunctionType::create(&[i32_ty, i32_ty, i32_ty], i32_ty, false).unwrap();
        let function = module.create_function("f", &fn_ty).unwrap();

        assert_eq!(function.arity(), 3);
        let args = function.args().unwrap();
        assert_eq!(args.len(), 3);
        assert_eq!(args[1], function.arg(1).unwrap());
        assert_eq!(
            function.arg(3),
            Err(IrError::ArgumentIndexOutOfRange { index: 3, arity: 3 })
        );
    }

    #[test]
    fn test_zero_arity_function_has_no_args() {
        let ctx = Context::create().unwrap();
        let module = Module::create("demo", &ctx).unwrap();
        let void = Type::void(&ctx).unwrap();
        let fn_ty = FunctionType::create(&[], void, false).unwrap();
        let function = module.create_function("main", &fn_ty).unwrap();
        assert!(function.args().unwrap().is_empty());
        assert!(function.arg(0).is_err());
    }

    #[test]
    fn test_blocks_are_appended_in_order() {
        let ctx = Context::create().unwrap();
        let module = Module::create("demo", &ctx).unwrap();
        let void = Type::void(&ctx).unwrap();
        let fn_ty = FunctionType::create(&[], void, false).unwrap();
        let function = module.create_function("f", &fn_ty).unwrap();

        assert!(function.entry_block().is_none());
        let entry = function.add_block("entry").unwrap();
        let again = function.add_block("entry").unwrap();
        assert_ne!(entry, again);
        assert_eq!(again.name(), "entry");

        let names: Vec<String> = function.blocks().iter().map(|b| b.name().to_string()).collect();
        assert_eq!(names, vec!["entry", "entry"]);
        assert_eq!(function.entry_block(), Some(entry));
    }

    #[test]
    fn test_empty_function_body_fails_verification() {
        let ctx = Context::create().unwrap();
        let module = Module::create("demo", &ctx).unwrap();
        let void = Type::void(&ctx).unwrap();
        let fn_ty = FunctionType::create(&[], void, false).unwrap();
        let function = module.create_function("f", &fn_ty).unwrap();
        function.add_block("entry").unwrap();

        match function.verify() {
            Err(IrError::FunctionVerificationFailed { function, diagnostics }) => {
                assert_eq!(function, "f");
                assert!(diagnostics.unwrap().contains("does not have terminator"));
            }
            other => panic!("expected verification failure, got {:?}", other),
        }
    }
}
