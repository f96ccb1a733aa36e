// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! An in-process stand-in for the Aftermath extension.
//!
//! [`FakeAftermath`] resolves every entry point to a Rust `extern "C"` function. Calls are
//! recorded in thread-local state, so tests running in parallel do not see each other, as long
//! as each test creates, uses and drops its tracker on one thread.
//!
//! Failures are injected through the content of the buffers:
//! - crash dumps starting with [`BAD_DUMP`] cannot be decoded,
//! - crash dumps starting with [`BAD_JSON`] fail JSON generation,
//! - debug info starting with [`BAD_DEBUG_INFO`] has no identifier,
//! - SPIR-V modules starting with [`BAD_SPIRV_WORD`] cannot be hashed.

use crate::extension::abi::{self, SpirvCode};
use crate::extension::{
    AddDescriptionFn, AftermathResult, CrashDumpDescriptionCallback, GpuCrashDumpCallback,
    ShaderDebugIdentifier, ShaderDebugInfoCallback, ShaderHash, SymbolResolver,
};
use std::cell::RefCell;
use std::ffi::{c_char, c_void, CStr};
use std::ptr::NonNull;

pub const BAD_DUMP: &[u8] = b"bad-dump";
pub const BAD_JSON: &[u8] = b"bad-json";
pub const BAD_DEBUG_INFO: &[u8] = b"bad-debug-info";
pub const BAD_SPIRV_WORD: u32 = 0xDEAD_BEEF;

/// What the fake extension saw on the current thread.
#[derive(Debug, Default, Clone)]
pub struct FakeCalls {
    pub enable: usize,
    pub disable: usize,
    pub decoders_created: usize,
    pub decoders_destroyed: usize,
    pub watched_apis: u32,
    pub feature_flags: u32,
    /// The API version passed to every versioned entry point, in call order.
    pub api_versions: Vec<u32>,
    /// Lookup callbacks handed to `GenerateJSON`; the extension may call any of them.
    pub lookup_callbacks: usize,
    /// The `user_data` of every `GenerateJSON` call, as an address.
    pub json_user_data: Vec<usize>,
    registered: Option<Registration>,
}

impl FakeCalls {
    /// The context registered with `EnableGpuCrashDumps`, as an address.
    pub fn registered_user_data(&self) -> Option<usize> {
        self.registered
            .map(|registration| registration.user_data as usize)
    }
}

#[derive(Debug, Clone, Copy)]
struct Registration {
    gpu_crash_dump: GpuCrashDumpCallback,
    shader_debug_info: ShaderDebugInfoCallback,
    description: CrashDumpDescriptionCallback,
    user_data: *mut c_void,
}

thread_local! {
    static CALLS: RefCell<FakeCalls> = RefCell::new(FakeCalls::default());
    static DESCRIPTION: RefCell<Vec<(u32, String)>> = const { RefCell::new(Vec::new()) };
}

fn record_api_version(api_version: u32) {
    CALLS.with(|calls| calls.borrow_mut().api_versions.push(api_version));
}

pub fn fake_calls() -> FakeCalls {
    CALLS.with(|calls| calls.borrow().clone())
}

pub fn reset_fake_calls() {
    CALLS.with(|calls| *calls.borrow_mut() = FakeCalls::default());
}

/// Invokes the crash dump callback registered on this thread, the way the driver would.
/// Returns false if nothing is registered.
pub fn fire_gpu_crash_dump(gpu_crash_dump: &[u8]) -> bool {
    match fake_calls().registered {
        Some(registration) => {
            // SAFETY: the callback and its context were registered by a live tracker.
            unsafe {
                (registration.gpu_crash_dump)(
                    gpu_crash_dump.as_ptr().cast(),
                    gpu_crash_dump.len() as u32,
                    registration.user_data,
                )
            };
            true
        }
        None => false,
    }
}

/// Invokes the shader debug info callback registered on this thread.
pub fn fire_shader_debug_info(shader_debug_info: &[u8]) -> bool {
    match fake_calls().registered {
        Some(registration) => {
            // SAFETY: the callback and its context were registered by a live tracker.
            unsafe {
                (registration.shader_debug_info)(
                    shader_debug_info.as_ptr().cast(),
                    shader_debug_info.len() as u32,
                    registration.user_data,
                )
            };
            true
        }
        None => false,
    }
}

/// 64-bit FNV-1a, standing in for the extension's content hash.
pub fn fake_hash(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

/// Resolves the Aftermath entry points to the fake implementations below.
#[derive(Debug, Default, Clone)]
pub struct FakeAftermath {
    missing_symbol: Option<&'static str>,
    failing_enable: bool,
}

impl FakeAftermath {
    pub fn new() -> Self {
        Self::default()
    }

    /// The resolver pretends `symbol` is not exported.
    pub fn without_symbol(symbol: &'static str) -> Self {
        Self {
            missing_symbol: Some(symbol),
            ..Self::default()
        }
    }

    /// `GFSDK_Aftermath_EnableGpuCrashDumps` fails.
    pub fn with_failing_enable() -> Self {
        Self {
            failing_enable: true,
            ..Self::default()
        }
    }
}

impl SymbolResolver for FakeAftermath {
    fn resolve(&self, symbol: &CStr) -> Option<NonNull<c_void>> {
        let name = symbol.to_str().ok()?;
        if self.missing_symbol == Some(name) {
            return None;
        }
        let address = match name {
            "GFSDK_Aftermath_DisableGpuCrashDumps" => disable as *mut c_void,
            "GFSDK_Aftermath_EnableGpuCrashDumps" if self.failing_enable => {
                enable_failing as *mut c_void
            }
            "GFSDK_Aftermath_EnableGpuCrashDumps" => enable as *mut c_void,
            "GFSDK_Aftermath_GetShaderDebugInfoIdentifier" => {
                shader_debug_info_identifier as *mut c_void
            }
            "GFSDK_Aftermath_GetShaderHashSpirv" => shader_hash_spirv as *mut c_void,
            "GFSDK_Aftermath_GpuCrashDump_CreateDecoder" => create_decoder as *mut c_void,
            "GFSDK_Aftermath_GpuCrashDump_DestroyDecoder" => destroy_decoder as *mut c_void,
            "GFSDK_Aftermath_GpuCrashDump_GenerateJSON" => generate_json as *mut c_void,
            "GFSDK_Aftermath_GpuCrashDump_GetJSON" => get_json as *mut c_void,
            _ => return None,
        };
        NonNull::new(address)
    }
}

struct FakeDecoder {
    dump: Vec<u8>,
    json: Option<Vec<u8>>,
}

unsafe fn bytes<'a>(data: *const c_void, size: u32) -> &'a [u8] {
    if data.is_null() {
        &[]
    } else {
        std::slice::from_raw_parts(data.cast(), size as usize)
    }
}

unsafe extern "C" fn enable(
    api_version: u32,
    watched_apis: u32,
    feature_flags: u32,
    gpu_crash_dump_cb: Option<GpuCrashDumpCallback>,
    shader_debug_info_cb: Option<ShaderDebugInfoCallback>,
    description_cb: Option<CrashDumpDescriptionCallback>,
    user_data: *mut c_void,
) -> AftermathResult {
    let (Some(gpu_crash_dump), Some(shader_debug_info), Some(description)) =
        (gpu_crash_dump_cb, shader_debug_info_cb, description_cb)
    else {
        return AftermathResult::FAIL;
    };
    record_api_version(api_version);
    CALLS.with(|calls| {
        let mut calls = calls.borrow_mut();
        calls.enable += 1;
        calls.watched_apis = watched_apis;
        calls.feature_flags = feature_flags;
        calls.registered = Some(Registration {
            gpu_crash_dump,
            shader_debug_info,
            description,
            user_data,
        });
    });
    AftermathResult::SUCCESS
}

unsafe extern "C" fn enable_failing(
    _api_version: u32,
    _watched_apis: u32,
    _feature_flags: u32,
    _gpu_crash_dump_cb: Option<GpuCrashDumpCallback>,
    _shader_debug_info_cb: Option<ShaderDebugInfoCallback>,
    _description_cb: Option<CrashDumpDescriptionCallback>,
    _user_data: *mut c_void,
) -> AftermathResult {
    AftermathResult::FAIL
}

unsafe extern "C" fn disable() -> AftermathResult {
    CALLS.with(|calls| {
        let mut calls = calls.borrow_mut();
        calls.disable += 1;
        calls.registered = None;
    });
    AftermathResult::SUCCESS
}

unsafe extern "C" fn shader_debug_info_identifier(
    api_version: u32,
    shader_debug_info: *const c_void,
    size: u32,
    identifier: *mut ShaderDebugIdentifier,
) -> AftermathResult {
    record_api_version(api_version);
    let blob = bytes(shader_debug_info, size);
    if blob.starts_with(BAD_DEBUG_INFO) {
        return AftermathResult::FAIL;
    }
    *identifier = ShaderDebugIdentifier {
        id: [fake_hash(blob), blob.len() as u64],
    };
    AftermathResult::SUCCESS
}

unsafe extern "C" fn shader_hash_spirv(
    api_version: u32,
    shader: *const SpirvCode,
    hash: *mut ShaderHash,
) -> AftermathResult {
    record_api_version(api_version);
    let code = &*shader;
    let module = bytes(code.data, code.size);
    if module.starts_with(&BAD_SPIRV_WORD.to_ne_bytes()) {
        return AftermathResult::FAIL;
    }
    *hash = ShaderHash {
        hash: fake_hash(module),
    };
    AftermathResult::SUCCESS
}

unsafe extern "C" fn create_decoder(
    api_version: u32,
    gpu_crash_dump: *const c_void,
    size: u32,
    decoder: *mut *mut c_void,
) -> AftermathResult {
    record_api_version(api_version);
    let dump = bytes(gpu_crash_dump, size);
    if dump.starts_with(BAD_DUMP) {
        return AftermathResult::FAIL;
    }
    CALLS.with(|calls| calls.borrow_mut().decoders_created += 1);
    *decoder = Box::into_raw(Box::new(FakeDecoder {
        dump: dump.to_vec(),
        json: None,
    }))
    .cast();
    AftermathResult::SUCCESS
}

unsafe extern "C" fn destroy_decoder(decoder: *mut c_void) -> AftermathResult {
    if decoder.is_null() {
        return AftermathResult::FAIL;
    }
    drop(Box::from_raw(decoder.cast::<FakeDecoder>()));
    CALLS.with(|calls| calls.borrow_mut().decoders_destroyed += 1);
    AftermathResult::SUCCESS
}

unsafe extern "C" fn add_description(key: u32, value: *const c_char) {
    let value = CStr::from_ptr(value).to_string_lossy().into_owned();
    DESCRIPTION.with(|description| description.borrow_mut().push((key, value)));
}

// The resolver hands out untyped addresses: pin every fake to the signature it stands for.
const _: AddDescriptionFn = add_description;
const _: abi::PfnEnableGpuCrashDumps = enable;
const _: abi::PfnEnableGpuCrashDumps = enable_failing;
const _: abi::PfnDisableGpuCrashDumps = disable;
const _: abi::PfnGetShaderDebugInfoIdentifier = shader_debug_info_identifier;
const _: abi::PfnGetShaderHashSpirv = shader_hash_spirv;
const _: abi::PfnCreateDecoder = create_decoder;
const _: abi::PfnDestroyDecoder = destroy_decoder;
const _: abi::PfnGenerateJson = generate_json;
const _: abi::PfnGetJson = get_json;

#[allow(clippy::too_many_arguments)]
unsafe extern "C" fn generate_json(
    decoder: *mut c_void,
    decoder_flags: u32,
    _formatter_flags: u32,
    shader_debug_info_lookup_cb: Option<abi::ShaderDebugInfoLookupCallback>,
    shader_lookup_cb: Option<abi::ShaderLookupCallback>,
    shader_instructions_lookup_cb: Option<abi::ShaderInstructionsLookupCallback>,
    shader_source_debug_info_lookup_cb: Option<abi::ShaderSourceDebugInfoLookupCallback>,
    user_data: *mut c_void,
    json_size: *mut u32,
) -> AftermathResult {
    let lookup_callbacks = [
        shader_debug_info_lookup_cb.is_some(),
        shader_lookup_cb.is_some(),
        shader_instructions_lookup_cb.is_some(),
        shader_source_debug_info_lookup_cb.is_some(),
    ]
    .into_iter()
    .filter(|&supplied| supplied)
    .count();
    let registered = CALLS.with(|calls| {
        let mut calls = calls.borrow_mut();
        calls.lookup_callbacks += lookup_callbacks;
        calls.json_user_data.push(user_data as usize);
        calls.registered
    });
    let Some(decoder) = decoder.cast::<FakeDecoder>().as_mut() else {
        return AftermathResult::FAIL;
    };
    if decoder.dump.starts_with(BAD_JSON) {
        return AftermathResult::FAIL;
    }
    // The description comes from the callback registered at enable time, with its own context.
    DESCRIPTION.with(|description| description.borrow_mut().clear());
    if let Some(registration) = registered {
        (registration.description)(add_description, registration.user_data);
    }
    let description = DESCRIPTION.with(|description| description.take());
    let description: Vec<String> = description
        .iter()
        .map(|(key, value)| format!("\"{key}\":{value:?}"))
        .collect();
    let json = format!(
        "{{\"decoder_flags\":{decoder_flags},\"dump_size\":{},\"description\":{{{}}}}}",
        decoder.dump.len(),
        description.join(",")
    );
    *json_size = json.len() as u32;
    decoder.json = Some(json.into_bytes());
    AftermathResult::SUCCESS
}

unsafe extern "C" fn get_json(
    decoder: *mut c_void,
    size: u32,
    json: *mut c_char,
) -> AftermathResult {
    let Some(decoder) = decoder.cast::<FakeDecoder>().as_ref() else {
        return AftermathResult::FAIL;
    };
    match &decoder.json {
        Some(generated) if generated.len() == size as usize => {
            std::ptr::copy_nonoverlapping(generated.as_ptr(), json.cast(), generated.len());
            AftermathResult::SUCCESS
        }
        _ => AftermathResult::FAIL,
    }
}
