//! Opaque backend handles
//!
//! A handle identifies a backend-owned resource. It is carried but never
//! interpreted outside the backend that issued it. A zero handle is the
//! backend's way of reporting an allocation failure.

use std::fmt;

/// An opaque, pointer-sized backend handle.
///
/// The representation is transparent so a `&[RawHandle]` can be passed to
/// a native entry point expecting an array of pointers.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RawHandle(usize);

/// Size in bytes of one handle slot in a marshaled buffer.
pub const HANDLE_SIZE: usize = std::mem::size_of::<RawHandle>();

impl RawHandle {
    /// The null handle.
    pub const NULL: RawHandle = RawHandle(0);

    pub const fn from_raw(raw: usize) -> Self {
        RawHandle(raw)
    }

    pub const fn as_raw(self) -> usize {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// `None` for the null handle.
    pub fn non_null(self) -> Option<Self> {
        if self.is_null() {
            None
        } else {
            Some(self)
        }
    }

    /// Wrap a native pointer.
    pub fn from_ptr<T>(ptr: *mut T) -> Self {
        RawHandle(ptr as usize)
    }

    /// Reinterpret as a native pointer.
    pub fn as_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }
}

impl fmt::Debug for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "RawHandle(null)")
        } else {
            write!(f, "RawHandle({:#x})", self.0)
        }
    }
}
