//! irkit - Typed IR Construction
//!
//! A typed, ownership-safe layer over a code-generation backend. Programs
//! are built in a fixed order:
//!
//! 1. create a [`Context`], then a [`Module`] and a [`Builder`] in it;
//! 2. request [`Type`]s and combine them into a [`FunctionType`];
//! 3. create a [`Function`], append [`BasicBlock`]s and emit instructions;
//! 4. [`Module::verify`] and [`Module::to_text`].
//!
//! Every entity borrows its context for `'ctx`, so nothing outlives the
//! context that allocated it. Mixing entities from two contexts is caught
//! at run time before the backend sees the handles.
//!
//! ```
//! use irkit::{Builder, Context, FunctionType, Module, Type};
//!
//! let ctx = Context::create()?;
//! let module = Module::create("demo", &ctx)?;
//! let i32_ty = Type::int32(&ctx)?;
//! let add_ty = FunctionType::create(&[i32_ty, i32_ty], i32_ty, false)?;
//! let add = module.create_function("add", &add_ty)?;
//!
//! let mut builder = Builder::create(&ctx)?;
//! builder.insert_into(&add.add_block("entry")?)?;
//! let sum = builder.add(add.arg(0)?, add.arg(1)?, "sum")?;
//! builder.ret(Some(sum))?;
//!
//! module.verify()?;
//! assert!(module.to_text().contains("define i32 @add(i32 %0, i32 %1)"));
//! # Ok::<(), irkit::IrError>(())
//! ```

pub mod builder;
pub mod config;
pub mod context;
pub mod error;
pub mod function;
pub mod function_type;
mod marshal;
pub mod module;
pub mod types;
pub mod value;

pub use builder::Builder;
pub use config::{BackendKind, Config, BACKEND_ENV_VAR};
pub use context::Context;
pub use error::{IrError, Result};
pub use function::{BasicBlock, Function};
pub use function_type::FunctionType;
pub use module::Module;
pub use types::Type;
pub use value::Value;

pub use irkit_backend::{Backend, BackendStats, ReferenceBackend, Verification};
pub use irkit_common::{Linkage, TypeKind};
