// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::ffi::{c_char, CStr, CString};
use std::fmt::{Debug, Display, Formatter};
use std::ptr;

/// You probably don't want to use this directly. This constant is used by `handle_panic_error` to
/// signal that something went wrong, but avoid needing any allocations to represent it.
pub(crate) const CANNOT_ALLOCATE_ERROR: Error = Error {
    message: ptr::null_mut(),
};

// This error message is used as a placeholder for errors without message -- corresponding to an
// error where we couldn't even _allocate_ the message (or some other even weirder error).
const CANNOT_ALLOCATE: &CStr = c"libdatadog failed: (panic) Cannot allocate error message";

/// Please treat this as opaque; do not reach into it, and especially don't
/// write into it! The most relevant APIs are:
/// * `ddog_Error_message`, to get the message as a NUL terminated string.
/// * `ddog_Error_drop`.
#[repr(C)]
pub struct Error {
    /// A NUL terminated string owned by the error, or null if it could not be allocated.
    message: *mut c_char,
}

// SAFETY: the error uniquely owns its message.
unsafe impl Send for Error {}
// SAFETY: the message is never mutated through a shared reference.
unsafe impl Sync for Error {}

impl Error {
    fn message(&self) -> &CStr {
        if self.message.is_null() {
            CANNOT_ALLOCATE
        } else {
            // Safety: a non-null message comes from `CString::into_raw`.
            unsafe { CStr::from_ptr(self.message) }
        }
    }
}

impl AsRef<str> for Error {
    fn as_ref(&self) -> &str {
        // Messages are built from Rust strings, so they are valid UTF-8.
        self.message().to_str().unwrap_or_default()
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("Error(\"{}\")", self.as_ref()))
    }
}

impl std::error::Error for Error {}

impl Drop for Error {
    fn drop(&mut self) {
        clear_error(self)
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        // C readers stop at the first NUL.
        let message = CString::new(value.replace('\0', "\\0")).unwrap_or_default();
        Self {
            message: message.into_raw(),
        }
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        // {:#} is the "alternate" format, see:
        // https://docs.rs/anyhow/latest/anyhow/struct.Error.html#display-representations
        Self::from(format!("{value:#}"))
    }
}

/// Internal function to safely clear an error's contents
pub fn clear_error(err: &mut Error) {
    let message = std::mem::replace(&mut err.message, ptr::null_mut());
    if !message.is_null() {
        // Safety: a non-null message comes from `CString::into_raw` and is released once.
        drop(unsafe { CString::from_raw(message) });
    }
}

/// Drops the error. It should not be used after this, though the
/// implementation tries to limit the damage in the case of use-after-free and
/// double-free scenarios.
///
/// # Safety
///
/// Only pass null or a pointer to a valid, mutable `ddog_Error`.
#[no_mangle]
pub unsafe extern "C" fn ddog_Error_drop(error: Option<&mut Error>) {
    if let Some(err) = error {
        clear_error(err);
    }
}

/// Returns the error's message as a NUL terminated string that is valid until the error is
/// dropped.
/// # Safety
/// Only pass null or a valid reference to a `ddog_Error`.
#[no_mangle]
pub unsafe extern "C" fn ddog_Error_message(error: Option<&Error>) -> *const c_char {
    match error {
        None => c"".as_ptr(),
        Some(err) => err.message().as_ptr(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_is_nul_terminated() {
        let error = Error::from(anyhow::anyhow!("inner").context("outer"));
        let message = unsafe { CStr::from_ptr(ddog_Error_message(Some(&error))) };
        assert_eq!(message.to_str().unwrap(), "outer: inner");
    }

    #[test]
    fn interior_nul_does_not_truncate() {
        let error = Error::from("bad\0path");
        assert_eq!(error.to_string(), "bad\\0path");
    }

    #[test]
    fn dropped_error_falls_back_to_placeholder() {
        let mut error = Error::from("some failure");
        unsafe { ddog_Error_drop(Some(&mut error)) };
        assert_eq!(
            error.to_string(),
            "libdatadog failed: (panic) Cannot allocate error message"
        );
        assert_eq!(CANNOT_ALLOCATE_ERROR.to_string(), error.to_string());
    }
}
