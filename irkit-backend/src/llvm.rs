//! Native backend over the LLVM C API
//!
//! The native library is a process-wide resource: it is initialized once
//! on first use and never torn down. Every entry point forwards to the
//! matching `LLVM*` function; handles are the native pointers themselves.

use crate::surface::{Backend, Verification};
use irkit_common::{BinaryOp, Linkage, RawHandle, TypeKind};
use llvm_sys::analysis::{LLVMVerifierFailureAction, LLVMVerifyFunction, LLVMVerifyModule};
use llvm_sys::core::*;
use llvm_sys::prelude::*;
use llvm_sys::{LLVMLinkage, LLVMTypeKind};
use log::debug;
use once_cell::sync::OnceCell;
use std::ffi::CStr;
use std::os::raw::c_char;
use std::ptr;

static BINDING: OnceCell<()> = OnceCell::new();

/// Handle on the process-wide native backend
#[derive(Debug)]
pub struct LlvmBackend {
    _bound: (),
}

impl LlvmBackend {
    /// Binds the native backend, initializing it on the first call.
    pub fn bind() -> Self {
        BINDING.get_or_init(|| {
            debug!("llvm: initializing native target");
            unsafe {
                let _ = llvm_sys::target::LLVM_InitializeNativeTarget();
            }
        });
        LlvmBackend { _bound: () }
    }
}

fn context(handle: RawHandle) -> LLVMContextRef {
    handle.as_ptr()
}

fn module(handle: RawHandle) -> LLVMModuleRef {
    handle.as_ptr()
}

fn builder(handle: RawHandle) -> LLVMBuilderRef {
    handle.as_ptr()
}

fn ty(handle: RawHandle) -> LLVMTypeRef {
    handle.as_ptr()
}

fn value(handle: RawHandle) -> LLVMValueRef {
    handle.as_ptr()
}

fn block(handle: RawHandle) -> LLVMBasicBlockRef {
    handle.as_ptr()
}

/// Copies a backend-allocated message and releases it.
unsafe fn take_message(message: *mut c_char) -> Option<String> {
    if message.is_null() {
        return None;
    }
    let text = CStr::from_ptr(message).to_string_lossy().into_owned();
    LLVMDisposeMessage(message);
    Some(text)
}

impl Backend for LlvmBackend {
    fn name(&self) -> &'static str {
        "llvm"
    }

    fn create_context(&self) -> RawHandle {
        unsafe { RawHandle::from_ptr(LLVMContextCreate()) }
    }

    unsafe fn dispose_context(&self, handle: RawHandle) {
        LLVMContextDispose(context(handle));
    }

    unsafe fn create_module(&self, name: &CStr, handle: RawHandle) -> RawHandle {
        RawHandle::from_ptr(LLVMModuleCreateWithNameInContext(name.as_ptr(), context(handle)))
    }

    unsafe fn create_builder(&self, handle: RawHandle) -> RawHandle {
        RawHandle::from_ptr(LLVMCreateBuilderInContext(context(handle)))
    }

    unsafe fn dispose_builder(&self, handle: RawHandle) {
        LLVMDisposeBuilder(builder(handle));
    }

    unsafe fn int_type(&self, handle: RawHandle, width: u32) -> RawHandle {
        let c = context(handle);
        let raw = match width {
            1 => LLVMInt1TypeInContext(c),
            8 => LLVMInt8TypeInContext(c),
            16 => LLVMInt16TypeInContext(c),
            32 => LLVMInt32TypeInContext(c),
            64 => LLVMInt64TypeInContext(c),
            0 => ptr::null_mut(),
            _ => LLVMIntTypeInContext(c, width),
        };
        RawHandle::from_ptr(raw)
    }

    unsafe fn float_type(&self, handle: RawHandle) -> RawHandle {
        RawHandle::from_ptr(LLVMFloatTypeInContext(context(handle)))
    }

    unsafe fn double_type(&self, handle: RawHandle) -> RawHandle {
        RawHandle::from_ptr(LLVMDoubleTypeInContext(context(handle)))
    }

    unsafe fn void_type(&self, handle: RawHandle) -> RawHandle {
        RawHandle::from_ptr(LLVMVoidTypeInContext(context(handle)))
    }

    unsafe fn pointer_type(&self, element: RawHandle, address_space: u32) -> RawHandle {
        RawHandle::from_ptr(LLVMPointerType(ty(element), address_space))
    }

    unsafe fn function_type(
        &self,
        return_type: RawHandle,
        params: *const RawHandle,
        count: u32,
        is_var_arg: bool,
    ) -> RawHandle {
        // RawHandle is a transparent pointer-sized slot
        let params = params as *mut LLVMTypeRef;
        RawHandle::from_ptr(LLVMFunctionType(ty(return_type), params, count, is_var_arg as LLVMBool))
    }

    unsafe fn type_kind(&self, handle: RawHandle) -> TypeKind {
        match LLVMGetTypeKind(ty(handle)) {
            LLVMTypeKind::LLVMVoidTypeKind => TypeKind::Void,
            LLVMTypeKind::LLVMFloatTypeKind => TypeKind::Float,
            LLVMTypeKind::LLVMDoubleTypeKind => TypeKind::Double,
            LLVMTypeKind::LLVMIntegerTypeKind => TypeKind::Integer,
            LLVMTypeKind::LLVMPointerTypeKind => TypeKind::Pointer,
            LLVMTypeKind::LLVMFunctionTypeKind => TypeKind::Function,
            LLVMTypeKind::LLVMLabelTypeKind => TypeKind::Label,
            _ => TypeKind::Other,
        }
    }

    unsafe fn int_type_width(&self, handle: RawHandle) -> u32 {
        LLVMGetIntTypeWidth(ty(handle))
    }

    unsafe fn type_of(&self, handle: RawHandle) -> RawHandle {
        RawHandle::from_ptr(LLVMTypeOf(value(handle)))
    }

    unsafe fn print_type(&self, handle: RawHandle) -> String {
        take_message(LLVMPrintTypeToString(ty(handle))).unwrap_or_default()
    }

    unsafe fn add_function(&self, handle: RawHandle, name: &CStr, function_type: RawHandle) -> RawHandle {
        RawHandle::from_ptr(LLVMAddFunction(module(handle), name.as_ptr(), ty(function_type)))
    }

    unsafe fn set_linkage(&self, function: RawHandle, linkage: Linkage) {
        let native = match linkage {
            Linkage::External => LLVMLinkage::LLVMExternalLinkage,
            Linkage::Internal => LLVMLinkage::LLVMInternalLinkage,
            Linkage::Private => LLVMLinkage::LLVMPrivateLinkage,
        };
        LLVMSetLinkage(value(function), native);
    }

    unsafe fn append_block(&self, handle: RawHandle, function: RawHandle, name: &CStr) -> RawHandle {
        RawHandle::from_ptr(LLVMAppendBasicBlockInContext(context(handle), value(function), name.as_ptr()))
    }

    unsafe fn param(&self, function: RawHandle, index: u32) -> RawHandle {
        if index >= LLVMCountParams(value(function)) {
            return RawHandle::NULL;
        }
        RawHandle::from_ptr(LLVMGetParam(value(function), index))
    }

    unsafe fn position_at_end(&self, handle: RawHandle, target: RawHandle) {
        LLVMPositionBuilderAtEnd(builder(handle), block(target));
    }

    unsafe fn build_binary(
        &self,
        handle: RawHandle,
        op: BinaryOp,
        lhs: RawHandle,
        rhs: RawHandle,
        name: &CStr,
    ) -> RawHandle {
        let build = match op {
            BinaryOp::Add => LLVMBuildAdd,
            BinaryOp::Sub => LLVMBuildSub,
            BinaryOp::Mul => LLVMBuildMul,
            BinaryOp::SDiv => LLVMBuildSDiv,
            BinaryOp::UDiv => LLVMBuildUDiv,
            BinaryOp::FAdd => LLVMBuildFAdd,
            BinaryOp::FSub => LLVMBuildFSub,
            BinaryOp::FMul => LLVMBuildFMul,
            BinaryOp::FDiv => LLVMBuildFDiv,
        };
        RawHandle::from_ptr(build(builder(handle), value(lhs), value(rhs), name.as_ptr()))
    }

    unsafe fn build_alloca(&self, handle: RawHandle, allocated: RawHandle, name: &CStr) -> RawHandle {
        RawHandle::from_ptr(LLVMBuildAlloca(builder(handle), ty(allocated), name.as_ptr()))
    }

    unsafe fn build_store(&self, handle: RawHandle, stored: RawHandle, pointer: RawHandle) -> RawHandle {
        RawHandle::from_ptr(LLVMBuildStore(builder(handle), value(stored), value(pointer)))
    }

    unsafe fn build_load(&self, handle: RawHandle, pointer: RawHandle, name: &CStr) -> RawHandle {
        let element = LLVMGetElementType(LLVMTypeOf(value(pointer)));
        RawHandle::from_ptr(LLVMBuildLoad2(builder(handle), element, value(pointer), name.as_ptr()))
    }

    unsafe fn build_br(&self, handle: RawHandle, target: RawHandle) -> RawHandle {
        RawHandle::from_ptr(LLVMBuildBr(builder(handle), block(target)))
    }

    unsafe fn build_cond_br(
        &self,
        handle: RawHandle,
        condition: RawHandle,
        then_block: RawHandle,
        else_block: RawHandle,
    ) -> RawHandle {
        RawHandle::from_ptr(LLVMBuildCondBr(
            builder(handle),
            value(condition),
            block(then_block),
            block(else_block),
        ))
    }

    unsafe fn build_ret(&self, handle: RawHandle, returned: RawHandle) -> RawHandle {
        let raw = if returned.is_null() {
            LLVMBuildRetVoid(builder(handle))
        } else {
            LLVMBuildRet(builder(handle), value(returned))
        };
        RawHandle::from_ptr(raw)
    }

    unsafe fn const_int(&self, handle: RawHandle, constant: u64, sign_extend: bool) -> RawHandle {
        RawHandle::from_ptr(LLVMConstInt(ty(handle), constant, sign_extend as LLVMBool))
    }

    unsafe fn const_real(&self, handle: RawHandle, constant: f64) -> RawHandle {
        RawHandle::from_ptr(LLVMConstReal(ty(handle), constant))
    }

    unsafe fn verify_function(&self, function: RawHandle) -> Verification {
        let broken = LLVMVerifyFunction(value(function), LLVMVerifierFailureAction::LLVMReturnStatusAction);
        if broken == 0 {
            return Verification::Valid;
        }
        // LLVMVerifyFunction reports status only; the text comes from the
        // enclosing module.
        let parent = RawHandle::from_ptr(LLVMGetGlobalParent(value(function)));
        match self.verify_module(parent) {
            Verification::Broken(diagnostics) => Verification::Broken(diagnostics),
            Verification::Valid => Verification::Broken(None),
        }
    }

    unsafe fn verify_module(&self, handle: RawHandle) -> Verification {
        let mut message: *mut c_char = ptr::null_mut();
        let broken = LLVMVerifyModule(
            module(handle),
            LLVMVerifierFailureAction::LLVMReturnStatusAction,
            &mut message,
        );
        let diagnostics = take_message(message).filter(|text| !text.is_empty());
        if broken == 0 {
            Verification::Valid
        } else {
            Verification::Broken(diagnostics)
        }
    }

    unsafe fn print_module(&self, handle: RawHandle) -> String {
        take_message(LLVMPrintModuleToString(module(handle))).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn test_bind_is_repeatable() {
        let first = LlvmBackend::bind();
        let second = LlvmBackend::bind();
        assert_eq!(first.name(), second.name());
        assert!(BINDING.get().is_some());
    }

    #[test]
    fn test_native_add_function() {
        let backend = LlvmBackend::bind();
        let name = |text: &str| CString::new(text).unwrap();
        unsafe {
            let ctx = backend.create_context();
            let m = backend.create_module(&name("demo"), ctx);
            let i32_ty = backend.int_type(ctx, 32);
            let params = [i32_ty, i32_ty];
            let fn_ty = backend.function_type(i32_ty, params.as_ptr(), 2, false);
            let f = backend.add_function(m, &name("add"), fn_ty);
            let entry = backend.append_block(ctx, f, &name("entry"));
            let b = backend.create_builder(ctx);
            backend.position_at_end(b, entry);
            let sum = backend.build_binary(b, BinaryOp::Add, backend.param(f, 0), backend.param(f, 1), &name("addtmp"));
            backend.build_ret(b, sum);
            assert_eq!(backend.verify_function(f), Verification::Valid);
            let text = backend.print_module(m);
            assert!(text.contains("define i32 @add(i32 %0, i32 %1)"), "{}", text);
            backend.dispose_builder(b);
            backend.dispose_context(ctx);
        }
    }

    #[test]
    fn test_function_verification_carries_diagnostics() {
        let backend = LlvmBackend::bind();
        let name = |text: &str| CString::new(text).unwrap();
        unsafe {
            let ctx = backend.create_context();
            let m = backend.create_module(&name("demo"), ctx);
            let void = backend.void_type(ctx);
            let fn_ty = backend.function_type(void, ptr::null(), 0, false);
            let f = backend.add_function(m, &name("twice"), fn_ty);
            let entry = backend.append_block(ctx, f, &name("entry"));
            let b = backend.create_builder(ctx);
            backend.position_at_end(b, entry);
            backend.build_ret(b, RawHandle::NULL);
            backend.build_ret(b, RawHandle::NULL);
            match backend.verify_function(f) {
                Verification::Broken(Some(text)) => {
                    assert!(text.contains("Terminator found in the middle of a basic block!"), "{}", text)
                }
                other => panic!("expected diagnostics, got {:?}", other),
            }
            backend.dispose_builder(b);
            backend.dispose_context(ctx);
        }
    }

    #[test]
    fn test_load_takes_the_pointee_type() {
        let backend = LlvmBackend::bind();
        let name = |text: &str| CString::new(text).unwrap();
        unsafe {
            let ctx = backend.create_context();
            let m = backend.create_module(&name("demo"), ctx);
            let void = backend.void_type(ctx);
            let i64_ty = backend.int_type(ctx, 64);
            let fn_ty = backend.function_type(void, ptr::null(), 0, false);
            let f = backend.add_function(m, &name("f"), fn_ty);
            let entry = backend.append_block(ctx, f, &name("entry"));
            let b = backend.create_builder(ctx);
            backend.position_at_end(b, entry);
            let slot = backend.build_alloca(b, i64_ty, &name("x"));
            let loaded = backend.build_load(b, slot, &name("v"));
            backend.build_ret(b, RawHandle::NULL);
            assert_eq!(backend.type_of(loaded), i64_ty);
            assert_eq!(backend.verify_function(f), Verification::Valid);
            backend.dispose_builder(b);
            backend.dispose_context(ctx);
        }
    }
}
