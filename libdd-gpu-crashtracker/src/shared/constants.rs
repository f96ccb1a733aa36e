// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! File names and defaults shared by the configuration and the tracker.

/// Name of the directory, relative to the log root, that receives every artifact.
pub const GPU_CRASH_DUMP_DIR_NAME: &str = "gpucrash";

/// Stem and extension of the raw crash dumps. The first dump of a session is
/// `crash.nv-gpudmp`, the following ones `crash_<n>.nv-gpudmp`.
pub const GPU_CRASH_DUMP_STEM: &str = "crash";
pub const GPU_CRASH_DUMP_EXTENSION: &str = "nv-gpudmp";

/// Appended to the raw dump file name to form the decoded report's file name.
pub const GPU_CRASH_DUMP_JSON_SUFFIX: &str = ".json";

pub const SHADER_DEBUG_INFO_PREFIX: &str = "shader_";
pub const SHADER_DEBUG_INFO_EXTENSION: &str = "nvdbg";

pub const SHADER_SOURCE_PREFIX: &str = "source_";
pub const SHADER_SOURCE_EXTENSION: &str = "spv";

#[cfg(windows)]
pub const DEFAULT_AFTERMATH_LIBRARY: &str = "GFSDK_Aftermath_Lib.x64.dll";
#[cfg(not(windows))]
pub const DEFAULT_AFTERMATH_LIBRARY: &str = "libGFSDK_Aftermath_Lib.x64.so";

/// Reported under the application name key when the host does not provide one.
pub const DEFAULT_APPLICATION_NAME: &str = "libdatadog";
