//! Structural verifier for the reference backend

use super::printer::print_type;
use super::store::{FunctionData, InstKind, Store, TypeData, ValueKind};
use irkit_common::RawHandle;

struct FunctionVerifier<'a> {
    store: &'a Store,
    handle: RawHandle,
    function: &'a FunctionData,
    return_type: RawHandle,
    problems: Vec<String>,
}

impl<'a> FunctionVerifier<'a> {
    fn report(&mut self, message: impl Into<String>) {
        self.problems.push(message.into());
    }

    fn type_of(&self, value: RawHandle) -> Option<RawHandle> {
        self.store.value(value).map(|v| v.ty)
    }

    fn label(&self, block: RawHandle) -> String {
        match self.store.block(block) {
            Some(data) if !data.name.is_empty() => format!("label %{}", data.name),
            _ => "label <unnamed>".to_string(),
        }
    }

    fn check_operand(&mut self, operand: RawHandle) {
        let kind = match self.store.value(operand) {
            Some(data) => data.kind.clone(),
            None => {
                self.report("Operand is not a value!");
                return;
            }
        };
        match kind {
            ValueKind::Param { function, .. } if function != self.handle => {
                self.report(format!("Referring to an argument in another function!\n  in function '{}'", self.function.name));
            }
            ValueKind::Inst { function, .. } if function != self.handle => {
                self.report(format!("Referring to an instruction in another function!\n  in function '{}'", self.function.name));
            }
            _ => {}
        }
    }

    fn check_instruction(&mut self, kind: &InstKind) {
        for operand in kind.operands() {
            self.check_operand(operand);
        }
        for target in kind.block_targets() {
            let owner = self.store.block(target).map(|b| b.function);
            if owner != Some(self.handle) {
                self.report(format!(
                    "Referring to a basic block in another function!\n  in function '{}'",
                    self.function.name
                ));
            }
        }

        match kind {
            InstKind::Binary { op, lhs, rhs } => {
                let (lhs_ty, rhs_ty) = (self.type_of(*lhs), self.type_of(*rhs));
                if lhs_ty != rhs_ty {
                    self.report("Both operands to a binary operator are not of the same type!");
                    return;
                }
                let data = lhs_ty.and_then(|ty| self.store.type_data(ty));
                let is_int = matches!(data, Some(TypeData::Int(_)));
                let is_float = matches!(data, Some(TypeData::Float) | Some(TypeData::Double));
                if op.is_float() && !is_float {
                    self.report("Floating-point arithmetic operators only work with floating-point types!");
                } else if !op.is_float() && !is_int {
                    self.report("Integer arithmetic operators only work with integral types!");
                }
            }
            InstKind::Store { value, pointer } => {
                let element = match self.type_of(*pointer).and_then(|ty| self.store.type_data(ty)) {
                    Some(TypeData::Pointer { element, .. }) => Some(*element),
                    _ => None,
                };
                if element.is_none() || element != self.type_of(*value) {
                    self.report("Stored value type does not match pointer operand type!");
                }
            }
            InstKind::Load { pointer } => {
                let is_pointer = matches!(
                    self.type_of(*pointer).and_then(|ty| self.store.type_data(ty)),
                    Some(TypeData::Pointer { .. })
                );
                if !is_pointer {
                    self.report("Load operand must be a pointer.");
                }
            }
            InstKind::CondBr { condition, .. } => {
                let is_bool = matches!(
                    self.type_of(*condition).and_then(|ty| self.store.type_data(ty)),
                    Some(TypeData::Int(1))
                );
                if !is_bool {
                    self.report("Branch condition is not 'i1' type!");
                }
            }
            InstKind::Ret { value } => {
                let returns_void = matches!(self.store.type_data(self.return_type), Some(TypeData::Void));
                let matches = match value {
                    None => returns_void,
                    Some(value) => !returns_void && self.type_of(*value) == Some(self.return_type),
                };
                if !matches {
                    self.report(format!(
                        "Function return type does not match operand type of return inst!\n  expected {}",
                        print_type(self.store, self.return_type)
                    ));
                }
            }
            InstKind::Alloca { .. } | InstKind::Br { .. } => {}
        }
    }

    fn run(mut self) -> Vec<String> {
        for block in self.function.blocks.clone() {
            let instructions = match self.store.block(block) {
                Some(data) => data.instructions.clone(),
                None => continue,
            };
            let terminated = instructions.last().map_or(false, |inst| inst.kind.is_terminator());
            if !terminated {
                let label = self.label(block);
                self.report(format!(
                    "Basic Block in function '{}' does not have terminator!\n{}",
                    self.function.name, label
                ));
            }
            let body = instructions.len().saturating_sub(1);
            if instructions[..body].iter().any(|inst| inst.kind.is_terminator()) {
                let label = self.label(block);
                self.report(format!("Terminator found in the middle of a basic block!\n{}", label));
            }
            for inst in &instructions {
                self.check_instruction(&inst.kind);
            }
        }
        self.problems
    }
}

/// Problems found in one function; empty when the function is well formed.
pub(crate) fn verify_function(store: &Store, function: RawHandle) -> Vec<String> {
    let data = match store.function(function) {
        Some(data) => data,
        None => return vec!["Invalid function handle".to_string()],
    };
    let return_type = match store.type_data(data.function_type) {
        Some(TypeData::Function { ret, .. }) => *ret,
        _ => return vec![format!("Function '{}' has no signature", data.name)],
    };
    FunctionVerifier {
        store,
        handle: function,
        function: data,
        return_type,
        problems: Vec::new(),
    }
    .run()
}

/// Problems found across every function of a module.
pub(crate) fn verify_module(store: &Store, module: RawHandle) -> Vec<String> {
    match store.module(module) {
        Some(data) => data
            .functions
            .iter()
            .flat_map(|function| verify_function(store, *function))
            .collect(),
        None => vec!["Invalid module handle".to_string()],
    }
}
