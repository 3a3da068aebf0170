//! Execution context
//!
//! The context is the root allocation scope. It owns the backend instance
//! and one backend context handle; every other entity borrows it for
//! `'ctx`, so nothing can outlive it. Dropping the context releases the
//! whole graph allocated under it.

use crate::config::Config;
use crate::error::{IrError, Result};
use irkit_backend::Backend;
use irkit_common::RawHandle;
use log::debug;
use std::fmt;

/// Root allocation scope for IR construction.
///
/// A context and everything derived from it belong to one thread; the
/// type is neither `Send` nor `Sync`.
pub struct Context {
    backend: Box<dyn Backend>,
    raw: RawHandle,
}

impl Context {
    /// Create a context on the default backend.
    pub fn create() -> Result<Self> {
        Self::with_config(&Config::default())
    }

    /// Create a context on the backend selected by `config`.
    pub fn with_config(config: &Config) -> Result<Self> {
        Self::with_backend(config.backend.instantiate()?)
    }

    /// Create a context on an explicit backend instance.
    pub fn with_backend(backend: Box<dyn Backend>) -> Result<Self> {
        let raw = backend.create_context();
        if raw.is_null() {
            return Err(IrError::BackendAllocationFailed {
                operation: "create_context",
            });
        }
        debug!("Created context {:?} on backend '{}'", raw, backend.name());
        Ok(Context { backend, raw })
    }

    /// Name of the backend serving this context
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub(crate) fn raw(&self) -> RawHandle {
        self.raw
    }

    pub(crate) fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Identity comparison; two contexts are the same only if they are the
    /// same object.
    pub(crate) fn same_as(&self, other: &Context) -> bool {
        std::ptr::eq(self, other)
    }

    /// Fails with `CrossContextOperand` unless `other` is this context.
    pub(crate) fn ensure_same(&self, other: &Context, operation: &'static str) -> Result<()> {
        if self.same_as(other) {
            Ok(())
        } else {
            Err(IrError::CrossContextOperand { operation })
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("backend", &self.backend.name())
            .field("raw", &self.raw)
            .finish()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        debug!("Disposing context {:?}", self.raw);
        // SAFETY: the handle came from this backend and every borrower of
        // the context is gone by the time it drops.
        unsafe { self.backend.dispose_context(self.raw) };
    }
}
