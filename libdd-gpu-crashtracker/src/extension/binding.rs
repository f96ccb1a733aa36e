// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::abi::*;
use super::library::SymbolResolver;
use crate::error::{BindingError, ExtensionError};
use std::ffi::{c_void, CStr};
use std::marker::PhantomData;
use std::ptr;

/// The callbacks handed to the extension when crash dumps are enabled.
#[derive(Copy, Clone)]
pub(crate) struct CallbackTable {
    pub gpu_crash_dump: GpuCrashDumpCallback,
    pub shader_debug_info: ShaderDebugInfoCallback,
    pub description: CrashDumpDescriptionCallback,
}

/// Entry points of the extension, resolved all at once. A binding only exists if every one of
/// them was found.
pub(crate) struct ExtensionBinding {
    disable_gpu_crash_dumps: PfnDisableGpuCrashDumps,
    enable_gpu_crash_dumps: PfnEnableGpuCrashDumps,
    get_shader_debug_info_identifier: PfnGetShaderDebugInfoIdentifier,
    get_shader_hash_spirv: PfnGetShaderHashSpirv,
    create_decoder: PfnCreateDecoder,
    destroy_decoder: PfnDestroyDecoder,
    generate_json: PfnGenerateJson,
    get_json: PfnGetJson,
}

/// Reinterprets the address of `symbol` as the function pointer type `F`.
///
/// # Safety
/// `F` must be the function pointer type matching the exported symbol's signature.
unsafe fn resolve<F: Copy>(
    resolver: &dyn SymbolResolver,
    symbol: &'static CStr,
) -> Result<F, BindingError> {
    debug_assert_eq!(std::mem::size_of::<F>(), std::mem::size_of::<*mut c_void>());
    let address = resolver.resolve(symbol).ok_or_else(|| {
        BindingError::MissingSymbol(symbol.to_str().unwrap_or("<non utf-8 symbol>"))
    })?;
    Ok(std::mem::transmute_copy::<*mut c_void, F>(&address.as_ptr()))
}

fn check(operation: &'static str, result: AftermathResult) -> Result<(), ExtensionError> {
    if result.is_success() {
        Ok(())
    } else {
        Err(ExtensionError::Failed { operation, result })
    }
}

fn buffer_len(operation: &'static str, len: usize) -> Result<u32, ExtensionError> {
    u32::try_from(len).map_err(|_| ExtensionError::BufferTooLarge { operation, len })
}

impl ExtensionBinding {
    pub fn resolve(resolver: &dyn SymbolResolver) -> Result<Self, BindingError> {
        // SAFETY: each type alias mirrors the signature of the symbol it is resolved from.
        unsafe {
            Ok(Self {
                disable_gpu_crash_dumps: resolve(resolver, c"GFSDK_Aftermath_DisableGpuCrashDumps")?,
                enable_gpu_crash_dumps: resolve(resolver, c"GFSDK_Aftermath_EnableGpuCrashDumps")?,
                get_shader_debug_info_identifier: resolve(
                    resolver,
                    c"GFSDK_Aftermath_GetShaderDebugInfoIdentifier",
                )?,
                get_shader_hash_spirv: resolve(resolver, c"GFSDK_Aftermath_GetShaderHashSpirv")?,
                create_decoder: resolve(resolver, c"GFSDK_Aftermath_GpuCrashDump_CreateDecoder")?,
                destroy_decoder: resolve(
                    resolver,
                    c"GFSDK_Aftermath_GpuCrashDump_DestroyDecoder",
                )?,
                generate_json: resolve(resolver, c"GFSDK_Aftermath_GpuCrashDump_GenerateJSON")?,
                get_json: resolve(resolver, c"GFSDK_Aftermath_GpuCrashDump_GetJSON")?,
            })
        }
    }

    /// Registers `callbacks` with the extension. `user_data` is passed back verbatim to every
    /// callback and must stay valid until `disable` returns.
    pub fn enable(
        &self,
        watched_apis: WatchedApis,
        feature_flags: u32,
        callbacks: CallbackTable,
        user_data: *mut c_void,
    ) -> Result<(), ExtensionError> {
        // SAFETY: the entry point was resolved from the extension, the callbacks are valid for
        // the lifetime of the program.
        let result = unsafe {
            (self.enable_gpu_crash_dumps)(
                AFTERMATH_VERSION_API,
                watched_apis.flags(),
                feature_flags,
                Some(callbacks.gpu_crash_dump),
                Some(callbacks.shader_debug_info),
                Some(callbacks.description),
                user_data,
            )
        };
        check("GFSDK_Aftermath_EnableGpuCrashDumps", result)
    }

    pub fn disable(&self) -> Result<(), ExtensionError> {
        // SAFETY: no arguments.
        let result = unsafe { (self.disable_gpu_crash_dumps)() };
        check("GFSDK_Aftermath_DisableGpuCrashDumps", result)
    }

    pub fn shader_debug_info_identifier(
        &self,
        shader_debug_info: &[u8],
    ) -> Result<ShaderDebugIdentifier, ExtensionError> {
        const OPERATION: &str = "GFSDK_Aftermath_GetShaderDebugInfoIdentifier";
        let size = buffer_len(OPERATION, shader_debug_info.len())?;
        let mut identifier = ShaderDebugIdentifier::default();
        // SAFETY: the buffer is valid for `size` bytes, `identifier` is a valid out pointer.
        let result = unsafe {
            (self.get_shader_debug_info_identifier)(
                AFTERMATH_VERSION_API,
                shader_debug_info.as_ptr().cast(),
                size,
                &mut identifier,
            )
        };
        check(OPERATION, result)?;
        Ok(identifier)
    }

    pub fn shader_hash_spirv(&self, spirv: &[u32]) -> Result<ShaderHash, ExtensionError> {
        const OPERATION: &str = "GFSDK_Aftermath_GetShaderHashSpirv";
        let code = SpirvCode {
            data: spirv.as_ptr().cast(),
            size: buffer_len(OPERATION, std::mem::size_of_val(spirv))?,
        };
        let mut hash = ShaderHash::default();
        // SAFETY: `code` points at `size` readable bytes, `hash` is a valid out pointer.
        let result =
            unsafe { (self.get_shader_hash_spirv)(AFTERMATH_VERSION_API, &code, &mut hash) };
        check(OPERATION, result)?;
        Ok(hash)
    }

    /// Opens a decoder over `gpu_crash_dump`. The decoder is destroyed when the returned guard
    /// is dropped, whatever happens in between.
    pub fn create_decoder<'a>(
        &'a self,
        gpu_crash_dump: &'a [u8],
    ) -> Result<Decoder<'a>, ExtensionError> {
        const OPERATION: &str = "GFSDK_Aftermath_GpuCrashDump_CreateDecoder";
        let size = buffer_len(OPERATION, gpu_crash_dump.len())?;
        let mut raw: RawDecoder = ptr::null_mut();
        // SAFETY: the dump is valid for `size` bytes and outlives the decoder.
        let result = unsafe {
            (self.create_decoder)(
                AFTERMATH_VERSION_API,
                gpu_crash_dump.as_ptr().cast(),
                size,
                &mut raw,
            )
        };
        check(OPERATION, result)?;
        Ok(Decoder {
            binding: self,
            raw,
            _dump: PhantomData,
        })
    }
}

/// A decoder bound to one crash dump buffer.
pub(crate) struct Decoder<'a> {
    binding: &'a ExtensionBinding,
    raw: RawDecoder,
    _dump: PhantomData<&'a [u8]>,
}

impl Decoder<'_> {
    /// Generates the JSON report with every piece of information the decoder knows about, and
    /// returns its size. No lookup callback is supplied; the description comes from the callback
    /// registered when crash dumps were enabled.
    pub fn generate_json(&self, user_data: *mut c_void) -> Result<u32, ExtensionError> {
        let mut json_size = 0u32;
        // SAFETY: the decoder is live, `json_size` is a valid out pointer.
        let result = unsafe {
            (self.binding.generate_json)(
                self.raw,
                decoder_flags::ALL_INFO,
                formatter_flags::NONE,
                None,
                None,
                None,
                None,
                user_data,
                &mut json_size,
            )
        };
        check("GFSDK_Aftermath_GpuCrashDump_GenerateJSON", result)?;
        Ok(json_size)
    }

    /// Copies the report produced by `generate_json` into a buffer of exactly `json_size` bytes.
    pub fn json(&self, json_size: u32) -> Result<Vec<u8>, ExtensionError> {
        let mut json = vec![0u8; json_size as usize];
        // SAFETY: the buffer is writable for `json_size` bytes.
        let result =
            unsafe { (self.binding.get_json)(self.raw, json_size, json.as_mut_ptr().cast()) };
        check("GFSDK_Aftermath_GpuCrashDump_GetJSON", result)?;
        Ok(json)
    }
}

impl Drop for Decoder<'_> {
    fn drop(&mut self) {
        // SAFETY: the decoder was created by this binding and is destroyed exactly once.
        let result = unsafe { (self.binding.destroy_decoder)(self.raw) };
        if !result.is_success() {
            tracing::warn!(%result, "Failed to destroy GPU crash dump decoder");
        }
    }
}
