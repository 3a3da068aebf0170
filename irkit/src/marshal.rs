//! Marshaling into the backend calling convention
//!
//! Names cross the boundary as NUL-terminated strings whose terminator is
//! appended here, never by the caller. Handle lists cross as one
//! contiguous buffer of handle-sized slots with an explicit count.

use crate::error::{IrError, Result};
use irkit_common::{RawHandle, HANDLE_SIZE};
use std::ffi::CString;

/// Encode `name` with a terminating NUL.
pub(crate) fn c_name(name: &str) -> Result<CString> {
    CString::new(name).map_err(|_| IrError::InvalidName {
        name: name.to_string(),
    })
}

/// A transient, exactly-sized buffer of handles in declaration order.
///
/// The buffer must outlive the backend call it is passed to; callers keep
/// it in a local for the duration of that call.
#[derive(Debug)]
pub(crate) struct HandleBuffer {
    slots: Vec<RawHandle>,
}

impl HandleBuffer {
    pub(crate) fn from_handles(handles: impl ExactSizeIterator<Item = RawHandle>) -> Self {
        let mut slots = Vec::with_capacity(handles.len());
        slots.extend(handles);
        HandleBuffer { slots }
    }

    pub(crate) fn as_ptr(&self) -> *const RawHandle {
        self.slots.as_ptr()
    }

    /// Element count passed alongside the pointer.
    pub(crate) fn count(&self) -> Result<u32> {
        u32::try_from(self.slots.len()).map_err(|_| IrError::TooManyParameters {
            count: self.slots.len(),
        })
    }

    pub(crate) fn byte_len(&self) -> usize {
        self.slots.len() * HANDLE_SIZE
    }
}
