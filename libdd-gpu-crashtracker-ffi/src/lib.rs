// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

//! C API of the GPU crash tracker.
//!
//! A host renderer creates a tracker from a JSON configuration, initializes it once its Vulkan
//! device is about to be created, hands every compiled SPIR-V module to it and drops it at
//! shutdown. Failures come back as a `ddog_Error` and leave the tracker inert; panics never cross
//! the boundary.

use anyhow::Context;
use function_name::named;
use libdd_common_ffi::{
    wrap_with_ffi_result, wrap_with_void_ffi_result, Handle, Result, ToInner, VoidResult,
};
use libdd_gpu_crashtracker::{GpuCrashTracker, GpuCrashTrackerConfig};
use std::ffi::{c_char, CStr};

#[no_mangle]
#[must_use]
#[named]
/// Creates a GPU crash tracker from a JSON encoded configuration, for instance
/// `{"log_root": "/var/log/app", "application_name": "renderer"}`.
/// The tracker is inert until `ddog_gpucrash_tracker_initialize` succeeds.
///
/// # Safety
/// `config_json` must be null or a valid NUL terminated string.
pub unsafe extern "C" fn ddog_gpucrash_tracker_new(
    config_json: *const c_char,
) -> Result<Handle<GpuCrashTracker>> {
    wrap_with_ffi_result!({
        anyhow::ensure!(!config_json.is_null(), "config_json is null");
        let json = CStr::from_ptr(config_json)
            .to_str()
            .context("config_json is not valid UTF-8")?;
        let config: GpuCrashTrackerConfig =
            serde_json::from_str(json).context("parsing the GPU crash tracker configuration")?;
        config.validate()?;
        anyhow::Ok(GpuCrashTracker::new(config).into())
    })
}

#[no_mangle]
#[must_use]
#[named]
/// Loads the Aftermath extension and registers the tracker with it.
/// After a failure the tracker stays inert and every other call on it is a no-op.
///
/// # Safety
/// `tracker` must be null or come from `ddog_gpucrash_tracker_new`.
/// No other function may use the tracker concurrently.
pub unsafe extern "C" fn ddog_gpucrash_tracker_initialize(
    mut tracker: *mut Handle<GpuCrashTracker>,
) -> VoidResult {
    wrap_with_void_ffi_result!({
        tracker.to_inner_mut()?.try_initialize()?;
    })
}

#[no_mangle]
#[must_use]
/// # Safety
/// `tracker` must be null or come from `ddog_gpucrash_tracker_new`.
pub unsafe extern "C" fn ddog_gpucrash_tracker_is_initialized(
    tracker: *mut Handle<GpuCrashTracker>,
) -> bool {
    tracker
        .to_inner()
        .is_ok_and(|tracker| tracker.is_initialized())
}

#[no_mangle]
#[must_use]
#[named]
/// Archives a SPIR-V module of `len` 32-bit words into the dump directory, keyed by its hash.
/// A no-op if the tracker is not initialized.
///
/// # Safety
/// `tracker` must be null or come from `ddog_gpucrash_tracker_new`.
/// `words` must be null or readable for `len` words.
/// May be called concurrently from several threads.
pub unsafe extern "C" fn ddog_gpucrash_tracker_save_shader(
    tracker: *mut Handle<GpuCrashTracker>,
    words: *const u32,
    len: usize,
) -> VoidResult {
    wrap_with_void_ffi_result!({
        let tracker = tracker.to_inner()?;
        let spirv: &[u32] = if words.is_null() || len == 0 {
            &[]
        } else {
            std::slice::from_raw_parts(words, len)
        };
        tracker.save_shader(spirv);
    })
}

#[no_mangle]
/// Disables crash dump capture, if the tracker was initialized, and frees the tracker.
///
/// # Safety
/// `tracker` must be null or come from `ddog_gpucrash_tracker_new`, and must not be used after
/// this call.
pub unsafe extern "C" fn ddog_gpucrash_tracker_drop(tracker: *mut Handle<GpuCrashTracker>) {
    // Dropping twice is harmless since `take` leaves a null behind, but don't rely on it.
    if !tracker.is_null() {
        drop((*tracker).take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libdd_gpu_crashtracker::test_utils::{
        fake_calls, fake_hash, reset_fake_calls, FakeAftermath,
    };
    use std::ffi::CString;
    use std::fs;
    use std::ptr;

    fn config_json(log_root: &std::path::Path) -> CString {
        let json = serde_json::json!({
            "log_root": log_root,
            "library_path": "libno_such_aftermath_library.so",
        });
        CString::new(json.to_string()).unwrap()
    }

    fn new_error(config_json: *const c_char) -> String {
        unsafe { ddog_gpucrash_tracker_new(config_json) }
            .unwrap_err()
            .to_string()
    }

    #[test]
    fn invalid_configurations_are_errors() {
        for config in [
            ptr::null(),
            c"not json".as_ptr(),
            c"{}".as_ptr(),
            c"{\"log_root\": \"\"}".as_ptr(),
        ] {
            let message = new_error(config);
            assert!(
                message.starts_with("ddog_gpucrash_tracker_new failed"),
                "{message}"
            );
        }
        assert!(new_error(ptr::null()).contains("config_json is null"));
    }

    #[test]
    fn null_handles_are_errors() {
        unsafe {
            let initialized: anyhow::Result<()> =
                ddog_gpucrash_tracker_initialize(ptr::null_mut()).into();
            assert!(initialized.unwrap_err().to_string().contains("Null pointer"));

            let saved: anyhow::Result<()> =
                ddog_gpucrash_tracker_save_shader(ptr::null_mut(), [1u32, 2].as_ptr(), 2).into();
            assert!(saved.is_err());

            assert!(!ddog_gpucrash_tracker_is_initialized(ptr::null_mut()));
            ddog_gpucrash_tracker_drop(ptr::null_mut());
        }
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn missing_library_leaves_the_tracker_inert() {
        let tmp = tempfile::tempdir().unwrap();
        let json = config_json(tmp.path());
        unsafe {
            let mut tracker = ddog_gpucrash_tracker_new(json.as_ptr()).unwrap();

            let initialized: anyhow::Result<()> =
                ddog_gpucrash_tracker_initialize(&mut tracker).into();
            let message = format!("{:#}", initialized.unwrap_err());
            assert!(
                message.contains("Failed to load the Aftermath library"),
                "{message}"
            );
            assert!(!ddog_gpucrash_tracker_is_initialized(&mut tracker));

            let saved: anyhow::Result<()> =
                ddog_gpucrash_tracker_save_shader(&mut tracker, [1u32, 2, 3].as_ptr(), 3).into();
            saved.unwrap();

            ddog_gpucrash_tracker_drop(&mut tracker);
            // A second drop finds an empty handle.
            ddog_gpucrash_tracker_drop(&mut tracker);
        }
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn dropped_tracker_is_a_use_after_free_error() {
        let tmp = tempfile::tempdir().unwrap();
        let json = config_json(tmp.path());
        unsafe {
            let mut tracker = ddog_gpucrash_tracker_new(json.as_ptr()).unwrap();
            ddog_gpucrash_tracker_drop(&mut tracker);

            let saved: anyhow::Result<()> =
                ddog_gpucrash_tracker_save_shader(&mut tracker, [1u32].as_ptr(), 1).into();
            assert!(saved
                .unwrap_err()
                .to_string()
                .contains("indicates use after free"));
        }
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn shaders_are_archived_through_the_c_api() {
        let tmp = tempfile::tempdir().unwrap();
        reset_fake_calls();
        let mut tracker: Handle<GpuCrashTracker> = GpuCrashTracker::with_resolver(
            GpuCrashTrackerConfig::for_log_root(tmp.path()),
            Box::new(FakeAftermath::new()),
        )
        .into();
        let module = [0x0723_0203u32, 0x0001_0000, 0x0008_000b, 42];

        unsafe {
            let initialized: anyhow::Result<()> =
                ddog_gpucrash_tracker_initialize(&mut tracker).into();
            initialized.unwrap();
            assert!(ddog_gpucrash_tracker_is_initialized(&mut tracker));

            let saved: anyhow::Result<()> =
                ddog_gpucrash_tracker_save_shader(&mut tracker, module.as_ptr(), module.len())
                    .into();
            saved.unwrap();

            ddog_gpucrash_tracker_drop(&mut tracker);
        }

        let bytes: Vec<u8> = module.iter().flat_map(|w| w.to_ne_bytes()).collect();
        let path = tmp
            .path()
            .join("gpucrash")
            .join(format!("source_{:016x}.spv", fake_hash(&bytes)));
        assert_eq!(fs::read(path).unwrap(), bytes);
        assert_eq!(fake_calls().disable, 1);
    }
}
