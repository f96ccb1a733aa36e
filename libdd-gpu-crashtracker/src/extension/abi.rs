// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! C types and entry point signatures of the Nsight Aftermath crash dump extension.

use serde::{Deserialize, Serialize};
use std::ffi::{c_char, c_void};
use std::fmt;

/// `GFSDK_Aftermath_Version_API` of the 2020.1 SDK, the revision whose `GenerateJSON` takes the
/// four shader lookup callbacks declared below. The extension rejects calls made with another
/// version.
pub(crate) const AFTERMATH_VERSION_API: u32 = 0x0000_020B;

/// Result code returned by every extension entry point.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AftermathResult(pub u32);

impl AftermathResult {
    pub const SUCCESS: Self = Self(0x1);
    pub const NOT_AVAILABLE: Self = Self(0x2);
    pub const FAIL: Self = Self(0xBAD0_0000);

    const FAILURE_MASK: u32 = 0xFFF0_0000;

    pub fn is_success(self) -> bool {
        self.0 & Self::FAILURE_MASK != Self::FAIL.0
    }
}

impl fmt::Display for AftermathResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// Content hash of a SPIR-V module, computed by the extension.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct ShaderHash {
    pub hash: u64,
}

/// Identifier of a shader debug info blob, computed by the extension.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct ShaderDebugIdentifier {
    pub id: [u64; 2],
}

// Only ever built by the extension, for the lookup callbacks.
#[allow(dead_code)]
#[repr(C)]
pub(crate) struct ShaderInstructionsHash {
    pub hash: u64,
}

#[allow(dead_code)]
#[repr(C)]
pub(crate) struct ShaderDebugName {
    pub name: [c_char; 127],
}

#[repr(C)]
pub(crate) struct SpirvCode {
    pub data: *const c_void,
    /// In bytes.
    pub size: u32,
}

/// Keys of the key/value pairs a description callback can add to a crash dump.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DescriptionKey {
    ApplicationName = 0x1,
    ApplicationVersion = 0x2,
    UserDefined = 0x10000,
}

/// Graphics APIs whose devices the extension watches for faults.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchedApis {
    DirectX,
    #[default]
    Vulkan,
    All,
}

impl WatchedApis {
    pub(crate) fn flags(self) -> u32 {
        const DX: u32 = 0x1;
        const VULKAN: u32 = 0x2;
        match self {
            WatchedApis::DirectX => DX,
            WatchedApis::Vulkan => VULKAN,
            WatchedApis::All => DX | VULKAN,
        }
    }
}

pub(crate) mod feature_flags {
    pub const DEFAULT: u32 = 0x0;
    pub const DEFER_DEBUG_INFO_CALLBACKS: u32 = 0x1;
}

pub(crate) mod decoder_flags {
    pub const ALL_INFO: u32 = 0xFFF;
}

pub(crate) mod formatter_flags {
    pub const NONE: u32 = 0x0;
}

/// Opaque decoder handle owned by the extension.
pub(crate) type RawDecoder = *mut c_void;

pub type GpuCrashDumpCallback =
    unsafe extern "C" fn(gpu_crash_dump: *const c_void, size: u32, user_data: *mut c_void);
pub type ShaderDebugInfoCallback =
    unsafe extern "C" fn(shader_debug_info: *const c_void, size: u32, user_data: *mut c_void);
/// Handed to a description callback to register one key/value pair.
pub type AddDescriptionFn = unsafe extern "C" fn(key: u32, value: *const c_char);
pub type CrashDumpDescriptionCallback =
    unsafe extern "C" fn(add_description: AddDescriptionFn, user_data: *mut c_void);

pub(crate) type PfnEnableGpuCrashDumps = unsafe extern "C" fn(
    api_version: u32,
    watched_apis: u32,
    feature_flags: u32,
    gpu_crash_dump_cb: Option<GpuCrashDumpCallback>,
    shader_debug_info_cb: Option<ShaderDebugInfoCallback>,
    description_cb: Option<CrashDumpDescriptionCallback>,
    user_data: *mut c_void,
) -> AftermathResult;
pub(crate) type PfnDisableGpuCrashDumps = unsafe extern "C" fn() -> AftermathResult;
pub(crate) type PfnGetShaderDebugInfoIdentifier = unsafe extern "C" fn(
    api_version: u32,
    shader_debug_info: *const c_void,
    size: u32,
    identifier: *mut ShaderDebugIdentifier,
) -> AftermathResult;
pub(crate) type PfnGetShaderHashSpirv = unsafe extern "C" fn(
    api_version: u32,
    shader: *const SpirvCode,
    hash: *mut ShaderHash,
) -> AftermathResult;
pub(crate) type PfnCreateDecoder = unsafe extern "C" fn(
    api_version: u32,
    gpu_crash_dump: *const c_void,
    size: u32,
    decoder: *mut RawDecoder,
) -> AftermathResult;
pub(crate) type PfnDestroyDecoder = unsafe extern "C" fn(decoder: RawDecoder) -> AftermathResult;
/// Hands the data a lookup callback found back to the decoder.
pub(crate) type SetDataFn = unsafe extern "C" fn(data: *const c_void, size: u32);

// Lookups the decoder may issue while generating a report. The tracker never supplies them: the
// archived shaders are matched offline.
pub(crate) type ShaderDebugInfoLookupCallback = unsafe extern "C" fn(
    identifier: *const ShaderDebugIdentifier,
    set_shader_debug_info: SetDataFn,
    user_data: *mut c_void,
);
pub(crate) type ShaderLookupCallback = unsafe extern "C" fn(
    shader_hash: *const ShaderHash,
    set_shader_binary: SetDataFn,
    user_data: *mut c_void,
);
pub(crate) type ShaderInstructionsLookupCallback = unsafe extern "C" fn(
    shader_instructions_hash: *const ShaderInstructionsHash,
    set_shader_binary: SetDataFn,
    user_data: *mut c_void,
);
pub(crate) type ShaderSourceDebugInfoLookupCallback = unsafe extern "C" fn(
    shader_debug_name: *const ShaderDebugName,
    set_shader_binary: SetDataFn,
    user_data: *mut c_void,
);

/// Renders the decoded dump as JSON and reports the size of the rendering. `user_data` is only
/// handed to the lookup callbacks.
pub(crate) type PfnGenerateJson = unsafe extern "C" fn(
    decoder: RawDecoder,
    decoder_flags: u32,
    formatter_flags: u32,
    shader_debug_info_lookup_cb: Option<ShaderDebugInfoLookupCallback>,
    shader_lookup_cb: Option<ShaderLookupCallback>,
    shader_instructions_lookup_cb: Option<ShaderInstructionsLookupCallback>,
    shader_source_debug_info_lookup_cb: Option<ShaderSourceDebugInfoLookupCallback>,
    user_data: *mut c_void,
    json_size: *mut u32,
) -> AftermathResult;
/// Copies the JSON produced by the last `GenerateJSON` call into `json`.
pub(crate) type PfnGetJson =
    unsafe extern "C" fn(decoder: RawDecoder, size: u32, json: *mut c_char) -> AftermathResult;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_codes_share_the_bad_prefix() {
        assert!(AftermathResult::SUCCESS.is_success());
        assert!(AftermathResult::NOT_AVAILABLE.is_success());
        assert!(!AftermathResult::FAIL.is_success());
        assert!(!AftermathResult(0xBAD0_0005).is_success());
        assert_eq!(AftermathResult::FAIL.to_string(), "0xBAD00000");
    }

    #[test]
    fn watched_api_flags() {
        assert_eq!(WatchedApis::default(), WatchedApis::Vulkan);
        assert_eq!(WatchedApis::All.flags(), 0x3);
    }
}
