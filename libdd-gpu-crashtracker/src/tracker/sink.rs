// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bridge from the extension's C callbacks to [`CrashDumpSink`].
//!
//! The extension only knows about plain function pointers and an opaque `user_data` pointer. The
//! trampolines below recover the sink from `user_data` and forward the call; they hold no state.

use crate::extension::{AddDescriptionFn, CallbackTable, DescriptionKey};
use std::ffi::{c_void, CStr};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Receiver of the notifications sent by the extension.
///
/// Every method may be called concurrently from threads owned by the driver. None of them can
/// report a failure back: the extension does not expect an answer.
pub trait CrashDumpSink: Sync {
    /// A GPU crash dump was captured.
    fn on_crash_dump(&self, gpu_crash_dump: &[u8]);

    /// Debug information for a shader was emitted.
    fn on_shader_debug_info(&self, shader_debug_info: &[u8]);

    /// The extension asks for the key/value pairs describing the application, to be embedded
    /// in the crash dump.
    fn on_description_request(&self, description: &DescriptionWriter);
}

/// Adds key/value pairs to the description of the crash dump being processed.
pub struct DescriptionWriter {
    add_description: AddDescriptionFn,
}

impl DescriptionWriter {
    pub(crate) fn new(add_description: AddDescriptionFn) -> Self {
        Self { add_description }
    }

    pub fn add(&self, key: DescriptionKey, value: &CStr) {
        // SAFETY: the function comes from the extension and `value` is NUL terminated for the
        // duration of the call.
        unsafe { (self.add_description)(key as u32, value.as_ptr()) }
    }
}

pub(crate) fn callback_table<S: CrashDumpSink>() -> CallbackTable {
    CallbackTable {
        gpu_crash_dump: gpu_crash_dump_trampoline::<S>,
        shader_debug_info: shader_debug_info_trampoline::<S>,
        description: description_trampoline::<S>,
    }
}

/// # Safety
/// `user_data` must be null or point at a live `S`.
unsafe fn sink<'a, S: CrashDumpSink>(user_data: *mut c_void) -> Option<&'a S> {
    (user_data as *const S).as_ref()
}

/// # Safety
/// `data` must be null or readable for `size` bytes for the duration of the callback.
unsafe fn buffer<'a>(data: *const c_void, size: u32) -> &'a [u8] {
    if data.is_null() || size == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(data.cast(), size as usize)
    }
}

// Unwinding into the driver is undefined behaviour.
fn forward(callback: &'static str, f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        tracing::error!(callback, "Panic while handling an Aftermath callback");
    }
}

unsafe extern "C" fn gpu_crash_dump_trampoline<S: CrashDumpSink>(
    gpu_crash_dump: *const c_void,
    size: u32,
    user_data: *mut c_void,
) {
    if let Some(sink) = sink::<S>(user_data) {
        let dump = buffer(gpu_crash_dump, size);
        forward("gpu_crash_dump", || sink.on_crash_dump(dump));
    }
}

unsafe extern "C" fn shader_debug_info_trampoline<S: CrashDumpSink>(
    shader_debug_info: *const c_void,
    size: u32,
    user_data: *mut c_void,
) {
    if let Some(sink) = sink::<S>(user_data) {
        let debug_info = buffer(shader_debug_info, size);
        forward("shader_debug_info", || sink.on_shader_debug_info(debug_info));
    }
}

unsafe extern "C" fn description_trampoline<S: CrashDumpSink>(
    add_description: AddDescriptionFn,
    user_data: *mut c_void,
) {
    if let Some(sink) = sink::<S>(user_data) {
        let description = DescriptionWriter::new(add_description);
        forward("crash_dump_description", || {
            sink.on_description_request(&description)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::ffi::CString;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        dumps: Mutex<Vec<Vec<u8>>>,
        debug_infos: Mutex<Vec<Vec<u8>>>,
    }

    impl CrashDumpSink for RecordingSink {
        fn on_crash_dump(&self, gpu_crash_dump: &[u8]) {
            self.dumps.lock().unwrap().push(gpu_crash_dump.to_vec());
        }

        fn on_shader_debug_info(&self, shader_debug_info: &[u8]) {
            if shader_debug_info == b"panic" {
                panic!("sink failure");
            }
            self.debug_infos
                .lock()
                .unwrap()
                .push(shader_debug_info.to_vec());
        }

        fn on_description_request(&self, description: &DescriptionWriter) {
            description.add(DescriptionKey::ApplicationName, c"recording");
        }
    }

    thread_local! {
        static ADDED: RefCell<Vec<(u32, String)>> = const { RefCell::new(Vec::new()) };
    }

    unsafe extern "C" fn record_description(key: u32, value: *const std::ffi::c_char) {
        let value = CStr::from_ptr(value).to_string_lossy().into_owned();
        ADDED.with(|added| added.borrow_mut().push((key, value)));
    }

    fn context(sink: &RecordingSink) -> *mut c_void {
        sink as *const RecordingSink as *mut c_void
    }

    #[test]
    fn trampolines_forward_to_the_sink() {
        let sink = RecordingSink::default();
        let table = callback_table::<RecordingSink>();
        let dump = b"dump bytes";
        let debug_info = b"debug info";

        unsafe {
            (table.gpu_crash_dump)(dump.as_ptr().cast(), dump.len() as u32, context(&sink));
            (table.shader_debug_info)(
                debug_info.as_ptr().cast(),
                debug_info.len() as u32,
                context(&sink),
            );
            (table.description)(record_description, context(&sink));
        }

        assert_eq!(*sink.dumps.lock().unwrap(), vec![dump.to_vec()]);
        assert_eq!(*sink.debug_infos.lock().unwrap(), vec![debug_info.to_vec()]);
        let added = ADDED.with(|added| added.borrow().clone());
        assert_eq!(
            added,
            vec![(DescriptionKey::ApplicationName as u32, "recording".to_string())]
        );
    }

    #[test]
    fn null_context_and_buffers_are_tolerated() {
        let sink = RecordingSink::default();
        let table = callback_table::<RecordingSink>();
        unsafe {
            (table.gpu_crash_dump)(std::ptr::null(), 16, std::ptr::null_mut());
            (table.gpu_crash_dump)(std::ptr::null(), 16, context(&sink));
        }
        assert_eq!(*sink.dumps.lock().unwrap(), vec![Vec::<u8>::new()]);
    }

    #[test]
    fn panics_do_not_cross_the_callback() {
        let sink = RecordingSink::default();
        let table = callback_table::<RecordingSink>();
        let payload = CString::new("panic").unwrap();
        unsafe {
            (table.shader_debug_info)(payload.as_ptr().cast(), 5, context(&sink));
        }
        assert!(sink.debug_infos.lock().unwrap().is_empty());
    }
}
