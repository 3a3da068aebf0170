//! In-process reference backend
//!
//! Implements the capability surface over an arena store. Each instance is
//! an independent backend; a context allocated by one instance is unknown
//! to every other instance.

mod printer;
mod store;
mod verifier;

use crate::surface::{Backend, Verification};
use irkit_common::{BinaryOp, Linkage, RawHandle, TypeKind};
use log::trace;
use std::cell::{Cell, RefCell};
use std::ffi::CStr;
use std::rc::Rc;
use store::{InstKind, Store, TypeData, ValueKind, MAX_INT_WIDTH};

/// Counters observable from outside the backend
#[derive(Debug, Default)]
pub struct BackendStats {
    calls: Cell<u64>,
    budget: Option<u64>,
}

impl BackendStats {
    /// Number of entry points invoked so far
    pub fn calls(&self) -> u64 {
        self.calls.get()
    }

    /// Counts the call; false once the call budget is spent.
    fn record(&self) -> bool {
        let calls = self.calls.get() + 1;
        self.calls.set(calls);
        self.budget.map_or(true, |budget| calls <= budget)
    }
}

/// The pure-Rust backend
#[derive(Debug, Default)]
pub struct ReferenceBackend {
    store: RefCell<Store>,
    stats: Rc<BackendStats>,
}

impl ReferenceBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose constructors return null handles once `budget`
    /// entry points have been called. Used to exercise allocation failures.
    pub fn with_call_budget(budget: u64) -> Self {
        ReferenceBackend {
            store: RefCell::default(),
            stats: Rc::new(BackendStats {
                calls: Cell::new(0),
                budget: Some(budget),
            }),
        }
    }

    /// Shared handle on the call counters; stays valid after the backend is
    /// boxed and handed to a context.
    pub fn stats(&self) -> Rc<BackendStats> {
        Rc::clone(&self.stats)
    }

    fn name_of(name: &CStr) -> String {
        name.to_string_lossy().into_owned()
    }

    fn value_type(&self, value: RawHandle) -> RawHandle {
        self.store.borrow().value(value).map(|v| v.ty).unwrap_or_default()
    }

    fn builder_context(&self, builder: RawHandle) -> RawHandle {
        self.store.borrow().builder(builder).map(|b| b.context).unwrap_or_default()
    }

    fn void_in(&self, context: RawHandle) -> RawHandle {
        self.store.borrow_mut().intern_type(context, TypeData::Void)
    }

    fn emit(&self, builder: RawHandle, kind: InstKind, result_type: RawHandle, name: &str) -> RawHandle {
        if result_type.is_null() {
            return RawHandle::NULL;
        }
        trace!("reference: emit {:?} as '{}'", kind, name);
        self.store.borrow_mut().append_instruction(builder, kind, result_type, name)
    }

    fn emit_void(&self, builder: RawHandle, kind: InstKind) -> RawHandle {
        let void = self.void_in(self.builder_context(builder));
        self.emit(builder, kind, void, "")
    }

    fn is_block(&self, block: RawHandle) -> bool {
        self.store.borrow().block(block).is_some()
    }

    fn is_value(&self, value: RawHandle) -> bool {
        self.store.borrow().value(value).is_some()
    }

    fn verification(problems: Vec<String>) -> Verification {
        if problems.is_empty() {
            Verification::Valid
        } else {
            Verification::Broken(Some(problems.join("\n")))
        }
    }
}

impl Backend for ReferenceBackend {
    fn name(&self) -> &'static str {
        "reference"
    }

    fn create_context(&self) -> RawHandle {
        if !self.stats.record() {
            return RawHandle::NULL;
        }
        self.store.borrow_mut().create_context()
    }

    unsafe fn dispose_context(&self, context: RawHandle) {
        self.stats.record();
        self.store.borrow_mut().dispose_context(context);
    }

    unsafe fn create_module(&self, name: &CStr, context: RawHandle) -> RawHandle {
        if !self.stats.record() {
            return RawHandle::NULL;
        }
        self.store.borrow_mut().create_module(context, Self::name_of(name))
    }

    unsafe fn create_builder(&self, context: RawHandle) -> RawHandle {
        if !self.stats.record() {
            return RawHandle::NULL;
        }
        self.store.borrow_mut().create_builder(context)
    }

    unsafe fn dispose_builder(&self, builder: RawHandle) {
        self.stats.record();
        self.store.borrow_mut().dispose_builder(builder);
    }

    unsafe fn int_type(&self, context: RawHandle, width: u32) -> RawHandle {
        if !self.stats.record() {
            return RawHandle::NULL;
        }
        if width == 0 || width > MAX_INT_WIDTH {
            return RawHandle::NULL;
        }
        self.store.borrow_mut().intern_type(context, TypeData::Int(width))
    }

    unsafe fn float_type(&self, context: RawHandle) -> RawHandle {
        if !self.stats.record() {
            return RawHandle::NULL;
        }
        self.store.borrow_mut().intern_type(context, TypeData::Float)
    }

    unsafe fn double_type(&self, context: RawHandle) -> RawHandle {
        if !self.stats.record() {
            return RawHandle::NULL;
        }
        self.store.borrow_mut().intern_type(context, TypeData::Double)
    }

    unsafe fn void_type(&self, context: RawHandle) -> RawHandle {
        if !self.stats.record() {
            return RawHandle::NULL;
        }
        self.void_in(context)
    }

    unsafe fn pointer_type(&self, element: RawHandle, address_space: u32) -> RawHandle {
        if !self.stats.record() {
            return RawHandle::NULL;
        }
        let mut store = self.store.borrow_mut();
        match store.context_of(element) {
            Some(context) if store.type_data(element).is_some() => {
                store.intern_type(context, TypeData::Pointer { element, address_space })
            }
            _ => RawHandle::NULL,
        }
    }

    unsafe fn function_type(
        &self,
        return_type: RawHandle,
        params: *const RawHandle,
        count: u32,
        is_var_arg: bool,
    ) -> RawHandle {
        if !self.stats.record() {
            return RawHandle::NULL;
        }
        let params = if count == 0 {
            Vec::new()
        } else {
            std::slice::from_raw_parts(params, count as usize).to_vec()
        };
        let mut store = self.store.borrow_mut();
        let context = match store.context_of(return_type) {
            Some(context) => context,
            None => return RawHandle::NULL,
        };
        let all_types = params
            .iter()
            .all(|p| store.type_data(*p).is_some() && store.context_of(*p) == Some(context));
        if store.type_data(return_type).is_none() || !all_types {
            return RawHandle::NULL;
        }
        store.intern_type(context, TypeData::Function { ret: return_type, params, is_var_arg })
    }

    unsafe fn type_kind(&self, ty: RawHandle) -> TypeKind {
        self.stats.record();
        self.store.borrow().type_data(ty).map_or(TypeKind::Other, TypeData::kind)
    }

    unsafe fn int_type_width(&self, ty: RawHandle) -> u32 {
        self.stats.record();
        match self.store.borrow().type_data(ty) {
            Some(TypeData::Int(width)) => *width,
            _ => 0,
        }
    }

    unsafe fn type_of(&self, value: RawHandle) -> RawHandle {
        if !self.stats.record() {
            return RawHandle::NULL;
        }
        self.value_type(value)
    }

    unsafe fn print_type(&self, ty: RawHandle) -> String {
        self.stats.record();
        printer::print_type(&self.store.borrow(), ty)
    }

    unsafe fn add_function(&self, module: RawHandle, name: &CStr, function_type: RawHandle) -> RawHandle {
        if !self.stats.record() {
            return RawHandle::NULL;
        }
        self.store
            .borrow_mut()
            .create_function(module, &Self::name_of(name), function_type)
    }

    unsafe fn set_linkage(&self, function: RawHandle, linkage: Linkage) {
        self.stats.record();
        self.store.borrow_mut().set_linkage(function, linkage);
    }

    unsafe fn append_block(&self, context: RawHandle, function: RawHandle, name: &CStr) -> RawHandle {
        if !self.stats.record() {
            return RawHandle::NULL;
        }
        self.store
            .borrow_mut()
            .append_block(context, function, &Self::name_of(name))
    }

    unsafe fn param(&self, function: RawHandle, index: u32) -> RawHandle {
        if !self.stats.record() {
            return RawHandle::NULL;
        }
        self.store
            .borrow()
            .function(function)
            .and_then(|f| f.params.get(index as usize).copied())
            .unwrap_or_default()
    }

    unsafe fn position_at_end(&self, builder: RawHandle, block: RawHandle) {
        self.stats.record();
        self.store.borrow_mut().position_at_end(builder, block);
    }

    unsafe fn build_binary(
        &self,
        builder: RawHandle,
        op: BinaryOp,
        lhs: RawHandle,
        rhs: RawHandle,
        name: &CStr,
    ) -> RawHandle {
        if !self.stats.record() {
            return RawHandle::NULL;
        }
        if !self.is_value(rhs) {
            return RawHandle::NULL;
        }
        let result_type = self.value_type(lhs);
        self.emit(builder, InstKind::Binary { op, lhs, rhs }, result_type, &Self::name_of(name))
    }

    unsafe fn build_alloca(&self, builder: RawHandle, ty: RawHandle, name: &CStr) -> RawHandle {
        if !self.stats.record() {
            return RawHandle::NULL;
        }
        let pointer = {
            let mut store = self.store.borrow_mut();
            match store.context_of(ty) {
                Some(context) if store.type_data(ty).is_some() => {
                    store.intern_type(context, TypeData::Pointer { element: ty, address_space: 0 })
                }
                _ => RawHandle::NULL,
            }
        };
        self.emit(builder, InstKind::Alloca { allocated: ty }, pointer, &Self::name_of(name))
    }

    unsafe fn build_store(&self, builder: RawHandle, value: RawHandle, pointer: RawHandle) -> RawHandle {
        if !self.stats.record() {
            return RawHandle::NULL;
        }
        if !self.is_value(value) || !self.is_value(pointer) {
            return RawHandle::NULL;
        }
        self.emit_void(builder, InstKind::Store { value, pointer })
    }

    unsafe fn build_load(&self, builder: RawHandle, pointer: RawHandle, name: &CStr) -> RawHandle {
        if !self.stats.record() {
            return RawHandle::NULL;
        }
        let pointer_type = self.value_type(pointer);
        let element = match self.store.borrow().type_data(pointer_type) {
            Some(TypeData::Pointer { element, .. }) => *element,
            _ => RawHandle::NULL,
        };
        self.emit(builder, InstKind::Load { pointer }, element, &Self::name_of(name))
    }

    unsafe fn build_br(&self, builder: RawHandle, target: RawHandle) -> RawHandle {
        if !self.stats.record() {
            return RawHandle::NULL;
        }
        if !self.is_block(target) {
            return RawHandle::NULL;
        }
        self.emit_void(builder, InstKind::Br { target })
    }

    unsafe fn build_cond_br(
        &self,
        builder: RawHandle,
        condition: RawHandle,
        then_block: RawHandle,
        else_block: RawHandle,
    ) -> RawHandle {
        if !self.stats.record() {
            return RawHandle::NULL;
        }
        if !self.is_value(condition) || !self.is_block(then_block) || !self.is_block(else_block) {
            return RawHandle::NULL;
        }
        self.emit_void(builder, InstKind::CondBr { condition, then_block, else_block })
    }

    unsafe fn build_ret(&self, builder: RawHandle, value: RawHandle) -> RawHandle {
        if !self.stats.record() {
            return RawHandle::NULL;
        }
        let value = value.non_null();
        if let Some(value) = value {
            if !self.is_value(value) {
                return RawHandle::NULL;
            }
        }
        self.emit_void(builder, InstKind::Ret { value })
    }

    unsafe fn const_int(&self, ty: RawHandle, value: u64, sign_extend: bool) -> RawHandle {
        if !self.stats.record() {
            return RawHandle::NULL;
        }
        let width = match self.store.borrow().type_data(ty) {
            Some(TypeData::Int(width)) => *width,
            _ => return RawHandle::NULL,
        };
        let wide = if sign_extend { value as i64 as i128 as u128 } else { value as u128 };
        let bits = if width >= 128 { wide } else { wide & ((1u128 << width) - 1) };
        self.store.borrow_mut().create_constant(ty, ValueKind::ConstInt(bits))
    }

    unsafe fn const_real(&self, ty: RawHandle, value: f64) -> RawHandle {
        if !self.stats.record() {
            return RawHandle::NULL;
        }
        let stored = match self.store.borrow().type_data(ty) {
            Some(TypeData::Float) => value as f32 as f64,
            Some(TypeData::Double) => value,
            _ => return RawHandle::NULL,
        };
        self.store.borrow_mut().create_constant(ty, ValueKind::ConstReal(stored))
    }

    unsafe fn verify_function(&self, function: RawHandle) -> Verification {
        self.stats.record();
        Self::verification(verifier::verify_function(&self.store.borrow(), function))
    }

    unsafe fn verify_module(&self, module: RawHandle) -> Verification {
        self.stats.record();
        Self::verification(verifier::verify_module(&self.store.borrow(), module))
    }

    unsafe fn print_module(&self, module: RawHandle) -> String {
        self.stats.record();
        printer::print_module(&self.store.borrow(), module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn name(text: &str) -> std::ffi::CString {
        std::ffi::CString::new(text).unwrap()
    }

    /// Builds `define i32 @add(i32 %0, i32 %1)` with a single add and ret.
    fn build_add(backend: &ReferenceBackend) -> (RawHandle, RawHandle, RawHandle) {
        unsafe {
            let ctx = backend.create_context();
            let module = backend.create_module(&name("demo"), ctx);
            let i32_ty = backend.int_type(ctx, 32);
            let params = [i32_ty, i32_ty];
            let fn_ty = backend.function_type(i32_ty, params.as_ptr(), 2, false);
            let function = backend.add_function(module, &name("add"), fn_ty);
            let entry = backend.append_block(ctx, function, &name("entry"));
            let builder = backend.create_builder(ctx);
            backend.position_at_end(builder, entry);
            let sum = backend.build_binary(
                builder,
                BinaryOp::Add,
                backend.param(function, 0),
                backend.param(function, 1),
                &name("addtmp"),
            );
            backend.build_ret(builder, sum);
            (module, function, builder)
        }
    }

    #[test]
    fn test_print_add_module() {
        let backend = ReferenceBackend::new();
        let (module, _, _) = build_add(&backend);
        let text = unsafe { backend.print_module(module) };
        assert_eq!(
            text,
            "; ModuleID = 'demo'\n\
             source_filename = \"demo\"\n\
             \n\
             define i32 @add(i32 %0, i32 %1) {\n\
             entry:\n\
             \x20 %addtmp = add i32 %0, %1\n\
             \x20 ret i32 %addtmp\n\
             }\n"
        );
    }

    #[test]
    fn test_add_module_verifies() {
        let backend = ReferenceBackend::new();
        let (module, function, _) = build_add(&backend);
        unsafe {
            assert_eq!(backend.verify_function(function), Verification::Valid);
            assert_eq!(backend.verify_module(module), Verification::Valid);
        }
    }

    #[test]
    fn test_second_terminator_is_reported() {
        let backend = ReferenceBackend::new();
        let (module, function, builder) = build_add(&backend);
        unsafe {
            backend.build_ret(builder, backend.param(function, 0));
            match backend.verify_module(module) {
                Verification::Broken(Some(text)) => {
                    assert!(text.contains("Terminator found in the middle of a basic block!"), "{}", text)
                }
                other => panic!("expected broken module, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_declaration_and_linkage() {
        let backend = ReferenceBackend::new();
        unsafe {
            let ctx = backend.create_context();
            let module = backend.create_module(&name("m"), ctx);
            let void = backend.void_type(ctx);
            let f64_ty = backend.double_type(ctx);
            let params = [f64_ty];
            let fn_ty = backend.function_type(void, params.as_ptr(), 1, true);
            backend.add_function(module, &name("ext"), fn_ty);
            let helper = backend.add_function(module, &name("helper"), backend.function_type(void, std::ptr::null(), 0, false));
            backend.set_linkage(helper, Linkage::Internal);
            let entry = backend.append_block(ctx, helper, &name("entry"));
            let builder = backend.create_builder(ctx);
            backend.position_at_end(builder, entry);
            backend.build_ret(builder, RawHandle::NULL);

            let text = backend.print_module(module);
            assert!(text.contains("declare void @ext(double, ...)\n"), "{}", text);
            assert!(text.contains("define internal void @helper() {\n"), "{}", text);
            assert!(text.contains("  ret void\n"), "{}", text);
        }
    }

    #[test]
    fn test_memory_instructions() {
        let backend = ReferenceBackend::new();
        unsafe {
            let ctx = backend.create_context();
            let module = backend.create_module(&name("m"), ctx);
            let void = backend.void_type(ctx);
            let i32_ty = backend.int_type(ctx, 32);
            let fn_ty = backend.function_type(void, std::ptr::null(), 0, false);
            let function = backend.add_function(module, &name("main"), fn_ty);
            let entry = backend.append_block(ctx, function, &name("entry"));
            let builder = backend.create_builder(ctx);
            backend.position_at_end(builder, entry);
            let slot = backend.build_alloca(builder, i32_ty, &name("x"));
            backend.build_store(builder, backend.const_int(i32_ty, 123, false), slot);
            let loaded = backend.build_load(builder, slot, &name("v"));
            backend.build_ret(builder, RawHandle::NULL);

            assert_eq!(backend.type_of(loaded), i32_ty);
            let text = backend.print_module(module);
            assert!(text.contains("  %x = alloca i32, align 4\n"), "{}", text);
            assert!(text.contains("  store i32 123, i32* %x, align 4\n"), "{}", text);
            assert!(text.contains("  %v = load i32, i32* %x, align 4\n"), "{}", text);
            assert_eq!(backend.verify_function(function), Verification::Valid);
        }
    }

    #[test]
    fn test_wide_integer_memory_alignment() {
        let backend = ReferenceBackend::new();
        unsafe {
            let ctx = backend.create_context();
            let module = backend.create_module(&name("m"), ctx);
            let void = backend.void_type(ctx);
            let i64_ty = backend.int_type(ctx, 64);
            let fn_ty = backend.function_type(void, std::ptr::null(), 0, false);
            let function = backend.add_function(module, &name("wide"), fn_ty);
            let entry = backend.append_block(ctx, function, &name("entry"));
            let builder = backend.create_builder(ctx);
            backend.position_at_end(builder, entry);
            let slot = backend.build_alloca(builder, i64_ty, &name("x"));
            backend.build_store(builder, backend.const_int(i64_ty, 7, false), slot);
            backend.build_load(builder, slot, &name("v"));
            backend.build_ret(builder, RawHandle::NULL);

            let text = backend.print_module(module);
            assert!(text.contains("  %x = alloca i64, align 8\n"), "{}", text);
            assert!(text.contains("  store i64 7, i64* %x, align 4\n"), "{}", text);
            assert!(text.contains("  %v = load i64, i64* %x, align 4\n"), "{}", text);
        }
    }

    #[test]
    fn test_unnamed_entry_block_has_no_label() {
        let backend = ReferenceBackend::new();
        unsafe {
            let ctx = backend.create_context();
            let module = backend.create_module(&name("m"), ctx);
            let i32_ty = backend.int_type(ctx, 32);
            let params = [i32_ty];
            let fn_ty = backend.function_type(i32_ty, params.as_ptr(), 1, false);
            let function = backend.add_function(module, &name("id"), fn_ty);
            let entry = backend.append_block(ctx, function, &name(""));
            let exit = backend.append_block(ctx, function, &name(""));
            let builder = backend.create_builder(ctx);
            backend.position_at_end(builder, entry);
            backend.build_br(builder, exit);
            backend.position_at_end(builder, exit);
            backend.build_ret(builder, backend.param(function, 0));

            assert_eq!(
                backend.print_module(module),
                "; ModuleID = 'm'\n\
                 source_filename = \"m\"\n\
                 \n\
                 define i32 @id(i32 %0) {\n\
                 \x20 br label %2\n\
                 \n\
                 2:\n\
                 \x20 ret i32 %0\n\
                 }\n"
            );
        }
    }

    #[test]
    fn test_function_names_are_quoted_when_needed() {
        let backend = ReferenceBackend::new();
        unsafe {
            let ctx = backend.create_context();
            let module = backend.create_module(&name("m"), ctx);
            let void = backend.void_type(ctx);
            let fn_ty = backend.function_type(void, std::ptr::null(), 0, false);
            let spaced = backend.add_function(module, &name("my fn"), fn_ty);
            backend.set_linkage(spaced, Linkage::Internal);
            backend.add_function(module, &name("say \"hi\""), fn_ty);
            backend.add_function(module, &name("2nd"), fn_ty);
            backend.add_function(module, &name("plain.name_1"), fn_ty);

            let text = backend.print_module(module);
            assert!(text.contains("declare internal void @\"my fn\"()\n"), "{}", text);
            assert!(text.contains("declare void @\"say \\22hi\\22\"()\n"), "{}", text);
            assert!(text.contains("declare void @\"2nd\"()\n"), "{}", text);
            assert!(text.contains("declare void @plain.name_1()\n"), "{}", text);
        }
    }

    #[test]
    fn test_const_int_truncates_to_width() {
        let backend = ReferenceBackend::new();
        unsafe {
            let ctx = backend.create_context();
            let i8_ty = backend.int_type(ctx, 8);
            let value = backend.const_int(i8_ty, 0x1FF, false);
            let store = backend.store.borrow();
            assert_eq!(store.value(value).map(|v| v.kind.clone()), Some(ValueKind::ConstInt(0xFF)));
        }
    }

    #[test]
    fn test_invalid_requests_return_null() {
        let backend = ReferenceBackend::new();
        unsafe {
            let ctx = backend.create_context();
            assert!(backend.int_type(ctx, 0).is_null());
            assert!(backend.int_type(RawHandle::from_raw(999), 32).is_null());
            assert!(backend.pointer_type(RawHandle::NULL, 0).is_null());
            let f32_ty = backend.float_type(ctx);
            assert!(backend.const_int(f32_ty, 1, false).is_null());
            let i32_ty = backend.int_type(ctx, 32);
            assert!(backend.const_real(i32_ty, 1.0).is_null());
        }
    }

    #[test]
    fn test_stats_count_calls() {
        let backend = ReferenceBackend::new();
        let stats = backend.stats();
        assert_eq!(stats.calls(), 0);
        let ctx = backend.create_context();
        unsafe {
            backend.int_type(ctx, 32);
        }
        assert_eq!(stats.calls(), 2);
    }

    #[test]
    fn test_call_budget_exhaustion_returns_null() {
        let backend = ReferenceBackend::with_call_budget(1);
        let ctx = backend.create_context();
        assert!(!ctx.is_null());
        unsafe {
            assert!(backend.int_type(ctx, 32).is_null());
        }
        assert_eq!(backend.stats().calls(), 2);
    }
}
