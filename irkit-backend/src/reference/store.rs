//! Arena storage for the reference backend
//!
//! Every entity lives in one arena; a handle is its index plus one, so the
//! null handle never names a live entity. Type descriptors are interned per
//! context, which makes handle equality the same thing as type equality.

use irkit_common::{BinaryOp, Linkage, RawHandle, TypeKind};
use std::collections::{HashMap, HashSet};

/// Type descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum TypeData {
    Void,
    Float,
    Double,
    Int(u32),
    Pointer { element: RawHandle, address_space: u32 },
    Function { ret: RawHandle, params: Vec<RawHandle>, is_var_arg: bool },
}

impl TypeData {
    pub(crate) fn kind(&self) -> TypeKind {
        match self {
            TypeData::Void => TypeKind::Void,
            TypeData::Float => TypeKind::Float,
            TypeData::Double => TypeKind::Double,
            TypeData::Int(_) => TypeKind::Integer,
            TypeData::Pointer { .. } => TypeKind::Pointer,
            TypeData::Function { .. } => TypeKind::Function,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ModuleData {
    pub context: RawHandle,
    pub name: String,
    pub functions: Vec<RawHandle>,
    global_names: HashSet<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct BuilderData {
    pub context: RawHandle,
    pub block: Option<RawHandle>,
}

#[derive(Debug, Clone)]
pub(crate) struct FunctionData {
    pub context: RawHandle,
    pub name: String,
    pub function_type: RawHandle,
    pub params: Vec<RawHandle>,
    pub blocks: Vec<RawHandle>,
    pub linkage: Linkage,
    local_names: HashSet<String>,
    last_unique: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct BlockData {
    pub context: RawHandle,
    pub function: RawHandle,
    pub name: String,
    pub instructions: Vec<Instruction>,
}

/// One emitted instruction. `value` is the handle returned to the caller;
/// terminators and stores get a void-typed value.
#[derive(Debug, Clone)]
pub(crate) struct Instruction {
    pub value: RawHandle,
    pub kind: InstKind,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum InstKind {
    Binary { op: BinaryOp, lhs: RawHandle, rhs: RawHandle },
    Alloca { allocated: RawHandle },
    Store { value: RawHandle, pointer: RawHandle },
    Load { pointer: RawHandle },
    Br { target: RawHandle },
    CondBr { condition: RawHandle, then_block: RawHandle, else_block: RawHandle },
    Ret { value: Option<RawHandle> },
}

impl InstKind {
    pub(crate) fn is_terminator(&self) -> bool {
        matches!(self, InstKind::Br { .. } | InstKind::CondBr { .. } | InstKind::Ret { .. })
    }

    pub(crate) fn operands(&self) -> Vec<RawHandle> {
        match self {
            InstKind::Binary { lhs, rhs, .. } => vec![*lhs, *rhs],
            InstKind::Alloca { .. } => Vec::new(),
            InstKind::Store { value, pointer } => vec![*value, *pointer],
            InstKind::Load { pointer } => vec![*pointer],
            InstKind::Br { .. } => Vec::new(),
            InstKind::CondBr { condition, .. } => vec![*condition],
            InstKind::Ret { value } => value.iter().copied().collect(),
        }
    }

    pub(crate) fn block_targets(&self) -> Vec<RawHandle> {
        match self {
            InstKind::Br { target } => vec![*target],
            InstKind::CondBr { then_block, else_block, .. } => vec![*then_block, *else_block],
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ValueKind {
    Param { function: RawHandle, index: u32 },
    /// Bit pattern already truncated to the type's width
    ConstInt(u128),
    ConstReal(f64),
    Inst { function: RawHandle, block: RawHandle },
}

#[derive(Debug, Clone)]
pub(crate) struct ValueData {
    pub context: RawHandle,
    pub ty: RawHandle,
    pub name: String,
    pub kind: ValueKind,
}

#[derive(Debug, Clone)]
pub(crate) enum Entity {
    Context,
    Module(ModuleData),
    Builder(BuilderData),
    Type { context: RawHandle, data: TypeData },
    Function(FunctionData),
    Block(BlockData),
    Value(ValueData),
    Disposed,
}

impl Entity {
    fn context(&self) -> Option<RawHandle> {
        match self {
            Entity::Context | Entity::Disposed => None,
            Entity::Module(m) => Some(m.context),
            Entity::Builder(b) => Some(b.context),
            Entity::Type { context, .. } => Some(*context),
            Entity::Function(f) => Some(f.context),
            Entity::Block(b) => Some(b.context),
            Entity::Value(v) => Some(v.context),
        }
    }
}

/// Largest integer width a type descriptor may have
pub(crate) const MAX_INT_WIDTH: u32 = (1 << 23) - 1;

#[derive(Debug, Default)]
pub(crate) struct Store {
    entities: Vec<Entity>,
    interned: HashMap<(RawHandle, TypeData), RawHandle>,
}

impl Store {
    fn push(&mut self, entity: Entity) -> RawHandle {
        self.entities.push(entity);
        RawHandle::from_raw(self.entities.len())
    }

    pub(crate) fn get(&self, handle: RawHandle) -> Option<&Entity> {
        handle.as_raw().checked_sub(1).and_then(|index| self.entities.get(index))
    }

    fn get_mut(&mut self, handle: RawHandle) -> Option<&mut Entity> {
        handle.as_raw().checked_sub(1).and_then(move |index| self.entities.get_mut(index))
    }

    // ---- Typed accessors ----

    pub(crate) fn is_context(&self, handle: RawHandle) -> bool {
        matches!(self.get(handle), Some(Entity::Context))
    }

    pub(crate) fn module(&self, handle: RawHandle) -> Option<&ModuleData> {
        match self.get(handle) {
            Some(Entity::Module(m)) => Some(m),
            _ => None,
        }
    }

    pub(crate) fn builder(&self, handle: RawHandle) -> Option<&BuilderData> {
        match self.get(handle) {
            Some(Entity::Builder(b)) => Some(b),
            _ => None,
        }
    }

    pub(crate) fn type_data(&self, handle: RawHandle) -> Option<&TypeData> {
        match self.get(handle) {
            Some(Entity::Type { data, .. }) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn function(&self, handle: RawHandle) -> Option<&FunctionData> {
        match self.get(handle) {
            Some(Entity::Function(f)) => Some(f),
            _ => None,
        }
    }

    fn function_mut(&mut self, handle: RawHandle) -> Option<&mut FunctionData> {
        match self.get_mut(handle) {
            Some(Entity::Function(f)) => Some(f),
            _ => None,
        }
    }

    pub(crate) fn block(&self, handle: RawHandle) -> Option<&BlockData> {
        match self.get(handle) {
            Some(Entity::Block(b)) => Some(b),
            _ => None,
        }
    }

    pub(crate) fn value(&self, handle: RawHandle) -> Option<&ValueData> {
        match self.get(handle) {
            Some(Entity::Value(v)) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn context_of(&self, handle: RawHandle) -> Option<RawHandle> {
        self.get(handle).and_then(Entity::context)
    }

    // ---- Allocation ----

    pub(crate) fn create_context(&mut self) -> RawHandle {
        self.push(Entity::Context)
    }

    /// Releases the context and every entity allocated under it.
    pub(crate) fn dispose_context(&mut self, context: RawHandle) {
        if !self.is_context(context) {
            return;
        }
        for entity in self.entities.iter_mut() {
            if entity.context() == Some(context) {
                *entity = Entity::Disposed;
            }
        }
        self.interned.retain(|(owner, _), _| *owner != context);
        if let Some(entity) = self.get_mut(context) {
            *entity = Entity::Disposed;
        }
    }

    pub(crate) fn create_module(&mut self, context: RawHandle, name: String) -> RawHandle {
        if !self.is_context(context) {
            return RawHandle::NULL;
        }
        self.push(Entity::Module(ModuleData {
            context,
            name,
            functions: Vec::new(),
            global_names: HashSet::new(),
        }))
    }

    pub(crate) fn create_builder(&mut self, context: RawHandle) -> RawHandle {
        if !self.is_context(context) {
            return RawHandle::NULL;
        }
        self.push(Entity::Builder(BuilderData { context, block: None }))
    }

    pub(crate) fn dispose_builder(&mut self, builder: RawHandle) {
        if self.builder(builder).is_some() {
            if let Some(entity) = self.get_mut(builder) {
                *entity = Entity::Disposed;
            }
        }
    }

    pub(crate) fn intern_type(&mut self, context: RawHandle, data: TypeData) -> RawHandle {
        if !self.is_context(context) {
            return RawHandle::NULL;
        }
        if let Some(existing) = self.interned.get(&(context, data.clone())) {
            return *existing;
        }
        let handle = self.push(Entity::Type { context, data: data.clone() });
        self.interned.insert((context, data), handle);
        handle
    }

    pub(crate) fn create_function(
        &mut self,
        module: RawHandle,
        name: &str,
        function_type: RawHandle,
    ) -> RawHandle {
        let context = match self.module(module) {
            Some(m) => m.context,
            None => return RawHandle::NULL,
        };
        let param_types = match self.type_data(function_type) {
            Some(TypeData::Function { params, .. }) if self.context_of(function_type) == Some(context) => {
                params.clone()
            }
            _ => return RawHandle::NULL,
        };

        let unique = match self.get_mut(module) {
            Some(Entity::Module(m)) => unique_global(&mut m.global_names, name),
            _ => return RawHandle::NULL,
        };

        let function = self.push(Entity::Function(FunctionData {
            context,
            name: unique,
            function_type,
            params: Vec::new(),
            blocks: Vec::new(),
            linkage: Linkage::External,
            local_names: HashSet::new(),
            last_unique: 0,
        }));

        let params: Vec<RawHandle> = param_types
            .iter()
            .enumerate()
            .map(|(index, ty)| {
                self.push(Entity::Value(ValueData {
                    context,
                    ty: *ty,
                    name: String::new(),
                    kind: ValueKind::Param { function, index: index as u32 },
                }))
            })
            .collect();

        if let Some(Entity::Module(m)) = self.get_mut(module) {
            m.functions.push(function);
        }
        if let Some(f) = self.function_mut(function) {
            f.params = params;
        }
        function
    }

    pub(crate) fn set_linkage(&mut self, function: RawHandle, linkage: Linkage) {
        if let Some(f) = self.function_mut(function) {
            f.linkage = linkage;
        }
    }

    pub(crate) fn append_block(&mut self, context: RawHandle, function: RawHandle, name: &str) -> RawHandle {
        let unique = match self.function_mut(function) {
            Some(f) if f.context == context => f.unique_local(name),
            _ => return RawHandle::NULL,
        };
        let block = self.push(Entity::Block(BlockData {
            context,
            function,
            name: unique,
            instructions: Vec::new(),
        }));
        if let Some(f) = self.function_mut(function) {
            f.blocks.push(block);
        }
        block
    }

    pub(crate) fn position_at_end(&mut self, builder: RawHandle, block: RawHandle) {
        let block_context = self.block(block).map(|b| b.context);
        if let Some(Entity::Builder(b)) = self.get_mut(builder) {
            if block_context == Some(b.context) {
                b.block = Some(block);
            }
        }
    }

    pub(crate) fn create_constant(&mut self, ty: RawHandle, kind: ValueKind) -> RawHandle {
        let context = match self.context_of(ty) {
            Some(context) => context,
            None => return RawHandle::NULL,
        };
        self.push(Entity::Value(ValueData {
            context,
            ty,
            name: String::new(),
            kind,
        }))
    }

    /// Appends an instruction at the builder's insertion block and returns
    /// the handle of its value. Null when the builder is not positioned.
    pub(crate) fn append_instruction(
        &mut self,
        builder: RawHandle,
        kind: InstKind,
        result_type: RawHandle,
        name: &str,
    ) -> RawHandle {
        let (context, block) = match self.builder(builder) {
            Some(BuilderData { context, block: Some(block) }) => (*context, *block),
            _ => return RawHandle::NULL,
        };
        let function = match self.block(block) {
            Some(b) => b.function,
            None => return RawHandle::NULL,
        };
        let is_void = matches!(self.type_data(result_type), Some(TypeData::Void));
        let unique = if is_void {
            String::new()
        } else {
            match self.function_mut(function) {
                Some(f) => f.unique_local(name),
                None => return RawHandle::NULL,
            }
        };
        let value = self.push(Entity::Value(ValueData {
            context,
            ty: result_type,
            name: unique,
            kind: ValueKind::Inst { function, block },
        }));
        if let Some(Entity::Block(b)) = self.get_mut(block) {
            b.instructions.push(Instruction { value, kind });
        }
        value
    }
}

impl FunctionData {
    /// Locals share one namespace per function; a clash gets the next
    /// counter appended.
    fn unique_local(&mut self, name: &str) -> String {
        if name.is_empty() {
            return String::new();
        }
        if self.local_names.insert(name.to_string()) {
            return name.to_string();
        }
        loop {
            self.last_unique += 1;
            let candidate = format!("{}{}", name, self.last_unique);
            if self.local_names.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

fn unique_global(names: &mut HashSet<String>, name: &str) -> String {
    if names.insert(name.to_string()) {
        return name.to_string();
    }
    let mut suffix = 1;
    loop {
        let candidate = format!("{}.{}", name, suffix);
        if names.insert(candidate.clone()) {
            return candidate;
        }
        suffix += 1;
    }
}
