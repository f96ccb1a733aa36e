// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::BindingError;
use std::ffi::{c_void, CStr, CString};
use std::ptr::NonNull;

/// Maps the name of an exported function to its address.
///
/// The resolver must stay alive for as long as any address it handed out may be called: the
/// tracker keeps it next to the resolved entry points.
pub trait SymbolResolver: Send + Sync {
    /// Returns `None` when `symbol` is not exported.
    fn resolve(&self, symbol: &CStr) -> Option<NonNull<c_void>>;
}

/// A dynamically loaded shared library, closed on drop.
pub struct SharedLibrary {
    handle: platform::Handle,
}

// SAFETY: library handles are process-wide and may be used from any thread.
unsafe impl Send for SharedLibrary {}
// SAFETY: resolving symbols does not mutate the handle.
unsafe impl Sync for SharedLibrary {}

impl SharedLibrary {
    pub fn open(lib_path: &str) -> Result<Self, BindingError> {
        let cstr = CString::new(lib_path)
            .map_err(|_| BindingError::InvalidLibraryPath(lib_path.to_string()))?;
        let handle = platform::open(&cstr).map_err(|reason| BindingError::LibraryNotFound {
            path: lib_path.to_string(),
            reason,
        })?;
        Ok(Self { handle })
    }
}

impl SymbolResolver for SharedLibrary {
    fn resolve(&self, symbol: &CStr) -> Option<NonNull<c_void>> {
        platform::symbol(&self.handle, symbol)
    }
}

impl Drop for SharedLibrary {
    fn drop(&mut self) {
        platform::close(&self.handle);
    }
}

#[cfg(unix)]
mod platform {
    use std::ffi::{c_void, CStr};
    use std::ptr::NonNull;

    pub(super) struct Handle(NonNull<c_void>);

    pub(super) fn open(path: &CStr) -> Result<Handle, String> {
        // SAFETY: `path` is a valid NUL terminated string.
        let handle = unsafe { libc::dlopen(path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
        NonNull::new(handle).map(Handle).ok_or_else(last_error)
    }

    pub(super) fn symbol(handle: &Handle, symbol: &CStr) -> Option<NonNull<c_void>> {
        // SAFETY: the handle is open until `close`, `symbol` is NUL terminated.
        NonNull::new(unsafe { libc::dlsym(handle.0.as_ptr(), symbol.as_ptr()) })
    }

    pub(super) fn close(handle: &Handle) {
        // SAFETY: the handle came from `dlopen` and is closed exactly once, on drop.
        unsafe { libc::dlclose(handle.0.as_ptr()) };
    }

    fn last_error() -> String {
        // SAFETY: dlerror returns null or a NUL terminated, thread-local message.
        let message = unsafe { libc::dlerror() };
        if message.is_null() {
            "unknown dlopen error".to_string()
        } else {
            // SAFETY: checked for null above.
            unsafe { CStr::from_ptr(message) }
                .to_string_lossy()
                .into_owned()
        }
    }
}

#[cfg(windows)]
mod platform {
    use std::ffi::{c_void, CStr};
    use std::ptr::NonNull;
    use windows::core::PCSTR;
    use windows::Win32::Foundation::{FreeLibrary, HMODULE};
    use windows::Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryA};

    pub(super) struct Handle(HMODULE);

    pub(super) fn open(path: &CStr) -> Result<Handle, String> {
        // SAFETY: `path` is a valid NUL terminated string.
        unsafe { LoadLibraryA(PCSTR::from_raw(path.as_ptr().cast())) }
            .map(Handle)
            .map_err(|e| e.to_string())
    }

    pub(super) fn symbol(handle: &Handle, symbol: &CStr) -> Option<NonNull<c_void>> {
        // SAFETY: the module is loaded until `close`, `symbol` is NUL terminated.
        let address = unsafe { GetProcAddress(handle.0, PCSTR::from_raw(symbol.as_ptr().cast())) }?;
        NonNull::new(address as *mut c_void)
    }

    pub(super) fn close(handle: &Handle) {
        // SAFETY: the module came from `LoadLibraryA` and is freed exactly once, on drop.
        let _ = unsafe { FreeLibrary(handle.0) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg_attr(miri, ignore)]
    fn missing_library_is_reported() {
        let err = SharedLibrary::open("libdoes_not_exist_gpu_crashtracker.so")
            .err()
            .unwrap();
        assert!(matches!(err, BindingError::LibraryNotFound { .. }));
    }

    #[test]
    fn nul_in_path_is_rejected() {
        let err = SharedLibrary::open("bad\0path").err().unwrap();
        assert!(matches!(err, BindingError::InvalidLibraryPath(_)));
    }
}
