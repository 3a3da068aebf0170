//! Modules
//!
//! A module is the unit of verification and serialization. It keeps its
//! functions in creation order and hands out shared handles to them.

use crate::context::Context;
use crate::error::{IrError, Result};
use crate::function::Function;
use crate::function_type::FunctionType;
use crate::marshal::c_name;
use irkit_backend::Verification;
use irkit_common::{Linkage, RawHandle};
use log::{debug, warn};
use std::cell::RefCell;
use std::fmt;

pub struct Module<'ctx> {
    raw: RawHandle,
    context: &'ctx Context,
    name: String,
    functions: RefCell<Vec<Function<'ctx>>>,
}

impl<'ctx> Module<'ctx> {
    pub fn create(name: &str, context: &'ctx Context) -> Result<Self> {
        let c_name = c_name(name)?;
        let raw = unsafe { context.backend().create_module(&c_name, context.raw()) };
        if raw.is_null() {
            return Err(IrError::BackendAllocationFailed {
                operation: "create_module",
            });
        }
        debug!("Created module '{}'", name);
        Ok(Module {
            raw,
            context,
            name: name.to_string(),
            functions: RefCell::new(Vec::new()),
        })
    }

    /// Add an externally visible function with the given signature.
    pub fn create_function(&self, name: &str, function_type: &FunctionType<'ctx>) -> Result<Function<'ctx>> {
        self.create_function_with_linkage(name, function_type, Linkage::External)
    }

    /// Add a function with explicit linkage.
    pub fn create_function_with_linkage(
        &self,
        name: &str,
        function_type: &FunctionType<'ctx>,
        linkage: Linkage,
    ) -> Result<Function<'ctx>> {
        self.context.ensure_same(function_type.context(), "create_function")?;
        let c_name = c_name(name)?;

        let backend = self.context.backend();
        let raw = unsafe { backend.add_function(self.raw, &c_name, function_type.raw()) };
        if raw.is_null() {
            return Err(IrError::BackendAllocationFailed {
                operation: "add_function",
            });
        }
        if linkage != Linkage::External {
            unsafe { backend.set_linkage(raw, linkage) };
        }

        let function = Function::new(self.context, raw, name, function_type, linkage);
        self.functions.borrow_mut().push(function.clone());
        debug!(
            "Created function '{}' with arity {} in module '{}'",
            name,
            function_type.arity(),
            self.name
        );
        Ok(function)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> &'ctx Context {
        self.context
    }

    /// First function created under `name`, if any.
    pub fn function(&self, name: &str) -> Option<Function<'ctx>> {
        self.functions.borrow().iter().find(|f| f.name() == name).cloned()
    }

    /// Functions in creation order.
    pub fn functions(&self) -> Vec<Function<'ctx>> {
        self.functions.borrow().clone()
    }

    /// Run the backend verifier over the whole module.
    pub fn verify(&self) -> Result<()> {
        match unsafe { self.context.backend().verify_module(self.raw) } {
            Verification::Valid => {
                debug!("Module '{}' verified", self.name);
                Ok(())
            }
            Verification::Broken(diagnostics) => {
                warn!("Module '{}' failed verification", self.name);
                Err(IrError::ModuleVerificationFailed {
                    module: self.name.clone(),
                    diagnostics,
                })
            }
        }
    }

    /// Textual IR for the whole module.
    pub fn to_text(&self) -> String {
        unsafe { self.context.backend().print_module(self.raw) }
    }
}

impl fmt::Display for Module<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

impl fmt::Debug for Module<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("raw", &self.raw)
            .field("functions", &self.functions.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_module_text() {
        let ctx = Context::create().unwrap();
        let module = Module::create("empty", &ctx).unwrap();
        assert_eq!(
            module.to_text(),
            "; ModuleID = 'empty'\nsource_filename = \"empty\"\n"
        );
        assert!(module.verify().is_ok());
    }

    #[test]
    fn test_module_name_with_nul_is_rejected() {
        let ctx = Context::create().unwrap();
        assert_eq!(
            Module::create("a\0b", &ctx).err(),
            Some(IrError::InvalidName { name: "a\0b".to_string() })
        );
    }

    #[test]
    fn test_declarations_and_linkage() {
        let ctx = Context::create().unwrap();
        let module = Module::create("demo", &ctx).unwrap();
        let i32_ty = Type::int32(&ctx).unwrap();
        let fn_ty = FunctionType::create(&[i32_ty], i32_ty, false).unwrap();

        let external = module.create_function("ext", &fn_ty).unwrap();
        let internal = module
            .create_function_with_linkage("helper", &fn_ty, Linkage::Internal)
            .unwrap();
        assert_eq!(external.linkage(), Linkage::External);
        assert_eq!(internal.linkage(), Linkage::Internal);

        let names: Vec<String> = module.functions().iter().map(|f| f.name().to_string()).collect();
        assert_eq!(names, vec!["ext", "helper"]);
        assert_eq!(module.function("helper").unwrap().arity(), 1);
        assert!(module.function("missing").is_none());

        let text = module.to_text();
        assert!(text.contains("declare i32 @ext(i32)"), "{}", text);
        assert!(text.contains("declare internal i32 @helper(i32)"), "{}", text);
    }

    #[test]
    fn test_function_type_from_another_context() {
        let a = Context::create().unwrap();
        let b = Context::create().unwrap();
        let module = Module::create("demo", &a).unwrap();
        let void = Type::void(&b).unwrap();
        let fn_ty = FunctionType::create(&[], void, false).unwrap();
        assert_eq!(
            module.create_function("f", &fn_ty).err(),
            Some(IrError::CrossContextOperand { operation: "create_function" })
        );
        assert!(module.functions().is_empty());
    }

    #[test]
    fn test_to_text_does_not_mutate() {
        let ctx = Context::create().unwrap();
        let module = Module::create("demo", &ctx).unwrap();
        let void = Type::void(&ctx).unwrap();
        let fn_ty = FunctionType::create(&[], void, false).unwrap();
        module.create_function("f", &fn_ty).unwrap();
        assert_eq!(module.to_text(), module.to_text());
        assert_eq!(module.to_string(), module.to_text());
    }
}
