//! Textual IR printer for the reference backend
//!
//! The output follows the LLVM assembly conventions for the subset the
//! store models: typed pointers, `align` on memory operations, numbered
//! slots for unnamed values, `declare` for functions without a body.

use super::store::{BlockData, FunctionData, InstKind, Store, TypeData, ValueKind};
use irkit_common::RawHandle;
use std::collections::HashMap;
use std::fmt::Write;

pub(crate) fn print_type(store: &Store, ty: RawHandle) -> String {
    let data = match store.type_data(ty) {
        Some(data) => data,
        None => return "<invalid type>".to_string(),
    };
    match data {
        TypeData::Void => "void".to_string(),
        TypeData::Float => "float".to_string(),
        TypeData::Double => "double".to_string(),
        TypeData::Int(width) => format!("i{}", width),
        TypeData::Pointer { element, address_space: 0 } => format!("{}*", print_type(store, *element)),
        TypeData::Pointer { element, address_space } => {
            format!("{} addrspace({})*", print_type(store, *element), address_space)
        }
        TypeData::Function { ret, params, is_var_arg } => {
            let mut parts: Vec<String> = params.iter().map(|p| print_type(store, *p)).collect();
            if *is_var_arg {
                parts.push("...".to_string());
            }
            format!("{} ({})", print_type(store, *ret), parts.join(", "))
        }
    }
}

/// ABI alignment under the default data layout (`i64:32:64`), used by
/// loads and stores.
pub(crate) fn abi_align(store: &Store, ty: RawHandle) -> u32 {
    match store.type_data(ty) {
        Some(TypeData::Int(width)) => match *width {
            0..=8 => 1,
            9..=16 => 2,
            _ => 4,
        },
        Some(TypeData::Float) => 4,
        Some(TypeData::Double) | Some(TypeData::Pointer { .. }) => 8,
        _ => 1,
    }
}

/// Preferred alignment under the default data layout, used by `alloca`.
pub(crate) fn pref_align(store: &Store, ty: RawHandle) -> u32 {
    match store.type_data(ty) {
        Some(TypeData::Int(width)) if *width > 32 => 8,
        _ => abi_align(store, ty),
    }
}

/// Sign-extend a truncated bit pattern of `width` bits.
pub(crate) fn signed_value(bits: u128, width: u32) -> i128 {
    if width == 0 || width >= 128 {
        return bits as i128;
    }
    let shift = 128 - width;
    ((bits << shift) as i128) >> shift
}

/// Shortest exact `%e` rendering, falling back to the hexadecimal bit
/// pattern when six fractional digits cannot represent the value.
pub(crate) fn format_real(value: f64) -> String {
    let scientific = format!("{:.6e}", value);
    if let Some((mantissa, exponent)) = scientific.split_once('e') {
        if let Ok(exponent) = exponent.parse::<i32>() {
            let sign = if exponent < 0 { '-' } else { '+' };
            let text = format!("{}e{}{:02}", mantissa, sign, exponent.abs());
            if text.parse::<f64>() == Ok(value) {
                return text;
            }
        }
    }
    format!("0x{:016X}", value.to_bits())
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => false,
        Some(_) => name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '$' | '-')),
        None => false,
    }
}

/// Printable ASCII stays as is; quotes, backslashes and every other byte
/// become `\XX`.
fn escape_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte == b' ' || (byte.is_ascii_graphic() && byte != b'"' && byte != b'\\') {
            out.push(byte as char);
        } else {
            let _ = write!(out, "\\{:02X}", byte);
        }
    }
    out
}

fn prefixed_name(sigil: char, name: &str) -> String {
    if is_plain_identifier(name) {
        format!("{}{}", sigil, name)
    } else {
        format!("{}\"{}\"", sigil, escape_name(name))
    }
}

fn local_name(name: &str) -> String {
    prefixed_name('%', name)
}

fn global_name(name: &str) -> String {
    prefixed_name('@', name)
}

/// Slot numbers for the unnamed locals of one function
struct SlotTracker {
    slots: HashMap<RawHandle, u32>,
    next: u32,
}

impl SlotTracker {
    fn for_function(store: &Store, function: &FunctionData) -> Self {
        let mut tracker = SlotTracker { slots: HashMap::new(), next: 0 };
        for param in &function.params {
            if store.value(*param).map_or(false, |v| v.name.is_empty()) {
                tracker.assign(*param);
            }
        }
        for block in &function.blocks {
            let data = match store.block(*block) {
                Some(data) => data,
                None => continue,
            };
            if data.name.is_empty() {
                tracker.assign(*block);
            }
            for inst in &data.instructions {
                let unnamed = store.value(inst.value).map_or(false, |v| {
                    v.name.is_empty() && !matches!(store.type_data(v.ty), Some(TypeData::Void))
                });
                if unnamed {
                    tracker.assign(inst.value);
                }
            }
        }
        tracker
    }

    fn assign(&mut self, handle: RawHandle) {
        self.slots.insert(handle, self.next);
        self.next += 1;
    }

    fn get(&self, handle: RawHandle) -> Option<u32> {
        self.slots.get(&handle).copied()
    }
}

struct FunctionPrinter<'a> {
    store: &'a Store,
    slots: SlotTracker,
}

impl<'a> FunctionPrinter<'a> {
    fn value_ref(&self, value: RawHandle) -> String {
        let data = match self.store.value(value) {
            Some(data) => data,
            None => return "<badref>".to_string(),
        };
        match &data.kind {
            ValueKind::ConstInt(bits) => match self.store.type_data(data.ty) {
                Some(TypeData::Int(1)) => (if *bits == 0 { "false" } else { "true" }).to_string(),
                Some(TypeData::Int(width)) => signed_value(*bits, *width).to_string(),
                _ => bits.to_string(),
            },
            ValueKind::ConstReal(real) => format_real(*real),
            ValueKind::Param { .. } | ValueKind::Inst { .. } => {
                if !data.name.is_empty() {
                    local_name(&data.name)
                } else if let Some(slot) = self.slots.get(value) {
                    format!("%{}", slot)
                } else {
                    "<badref>".to_string()
                }
            }
        }
    }

    fn typed_ref(&self, value: RawHandle) -> String {
        let ty = self.store.value(value).map(|v| v.ty).unwrap_or_default();
        format!("{} {}", print_type(self.store, ty), self.value_ref(value))
    }

    fn block_ref(&self, block: RawHandle) -> String {
        match self.store.block(block) {
            Some(data) if !data.name.is_empty() => format!("label {}", local_name(&data.name)),
            Some(_) => match self.slots.get(block) {
                Some(slot) => format!("label %{}", slot),
                None => "label <badref>".to_string(),
            },
            None => "label <badref>".to_string(),
        }
    }

    fn block_label(&self, handle: RawHandle, block: &BlockData) -> String {
        if block.name.is_empty() {
            format!("{}:", self.slots.get(handle).unwrap_or_default())
        } else if is_plain_identifier(&block.name) {
            format!("{}:", block.name)
        } else {
            format!("\"{}\":", escape_name(&block.name))
        }
    }

    fn instruction(&self, value: RawHandle, kind: &InstKind) -> String {
        let store = self.store;
        match kind {
            InstKind::Binary { op, lhs, rhs } => format!(
                "{} = {} {}, {}",
                self.value_ref(value),
                op,
                self.typed_ref(*lhs),
                self.value_ref(*rhs)
            ),
            InstKind::Alloca { allocated } => format!(
                "{} = alloca {}, align {}",
                self.value_ref(value),
                print_type(store, *allocated),
                pref_align(store, *allocated)
            ),
            InstKind::Store { value: stored, pointer } => {
                let ty = store.value(*stored).map(|v| v.ty).unwrap_or_default();
                format!(
                    "store {}, {}, align {}",
                    self.typed_ref(*stored),
                    self.typed_ref(*pointer),
                    abi_align(store, ty)
                )
            }
            InstKind::Load { pointer } => {
                let ty = store.value(value).map(|v| v.ty).unwrap_or_default();
                format!(
                    "{} = load {}, {}, align {}",
                    self.value_ref(value),
                    print_type(store, ty),
                    self.typed_ref(*pointer),
                    abi_align(store, ty)
                )
            }
            InstKind::Br { target } => format!("br {}", self.block_ref(*target)),
            InstKind::CondBr { condition, then_block, else_block } => format!(
                "br {}, {}, {}",
                self.typed_ref(*condition),
                self.block_ref(*then_block),
                self.block_ref(*else_block)
            ),
            InstKind::Ret { value: Some(returned) } => format!("ret {}", self.typed_ref(*returned)),
            InstKind::Ret { value: None } => "ret void".to_string(),
        }
    }
}

fn print_function(store: &Store, function: &FunctionData, out: &mut String) {
    let (ret, is_var_arg) = match store.type_data(function.function_type) {
        Some(TypeData::Function { ret, is_var_arg, .. }) => (*ret, *is_var_arg),
        _ => return,
    };
    let printer = FunctionPrinter {
        store,
        slots: SlotTracker::for_function(store, function),
    };
    let is_declaration = function.blocks.is_empty();

    let mut params: Vec<String> = function
        .params
        .iter()
        .map(|param| {
            let ty = store.value(*param).map(|v| v.ty).unwrap_or_default();
            if is_declaration {
                print_type(store, ty)
            } else {
                printer.typed_ref(*param)
            }
        })
        .collect();
    if is_var_arg {
        params.push("...".to_string());
    }

    let keyword = if is_declaration { "declare" } else { "define" };
    let _ = write!(out, "{} ", keyword);
    if let Some(linkage) = function.linkage.keyword() {
        let _ = write!(out, "{} ", linkage);
    }
    let _ = write!(
        out,
        "{} {}({})",
        print_type(store, ret),
        global_name(&function.name),
        params.join(", ")
    );

    if is_declaration {
        out.push('\n');
        return;
    }

    out.push_str(" {\n");
    for (index, handle) in function.blocks.iter().enumerate() {
        let block = match store.block(*handle) {
            Some(block) => block,
            None => continue,
        };
        if index > 0 {
            out.push('\n');
        }
        // an unnamed entry block keeps its slot but prints no label
        if index > 0 || !block.name.is_empty() {
            let _ = writeln!(out, "{}", printer.block_label(*handle, block));
        }
        for inst in &block.instructions {
            let _ = writeln!(out, "  {}", printer.instruction(inst.value, &inst.kind));
        }
    }
    out.push_str("}\n");
}

pub(crate) fn print_module(store: &Store, module: RawHandle) -> String {
    let data = match store.module(module) {
        Some(data) => data,
        None => return String::new(),
    };
    let mut out = String::new();
    let _ = writeln!(out, "; ModuleID = '{}'", data.name);
    let _ = writeln!(out, "source_filename = \"{}\"", escape_name(&data.name));
    for function in &data.functions {
        if let Some(function) = store.function(*function) {
            out.push('\n');
            print_function(store, function, &mut out);
        }
    }
    out
}
