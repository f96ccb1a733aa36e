// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

//! This crate captures GPU crash telemetry reported by the NVIDIA Nsight Aftermath extension.
//!
//! When the driver detects a fatal device fault it hands the extension a crash dump, which the
//! extension forwards to the callbacks registered by this crate. Architecturally it consists of:
//! 1. An extension binding, which resolves the Aftermath entry points at runtime from a shared
//!    library. If any of them is missing the tracker stays inert, it never takes the host down.
//! 2. A tracker, which registers itself as the callback context with the extension and persists
//!    every artifact it receives into a `gpucrash` directory under the host's log root:
//!    i. raw crash dumps (`crash.nv-gpudmp`, `crash_1.nv-gpudmp`, ...) and their decoded JSON
//!    reports (`<dump>.json`),
//!    ii. shader debug info blobs (`shader_<identifier>.nvdbg`),
//!    iii. SPIR-V sources handed over by the shader compiler (`source_<hash>.spv`), so that
//!    the shader hashes referenced by a report can be matched offline.
//!
//! All of the callbacks may be invoked concurrently from driver threads, and the shader archiver
//! from the host's compile threads. A single lock per tracker serializes every write.

mod error;
mod extension;
mod shared;
mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
mod tracker;

pub use error::*;
pub use extension::{
    AddDescriptionFn, AftermathResult, CrashDumpDescriptionCallback, DescriptionKey,
    GpuCrashDumpCallback, SharedLibrary, ShaderDebugIdentifier, ShaderDebugInfoCallback,
    ShaderHash, SymbolResolver, WatchedApis,
};
pub use shared::configuration::GpuCrashTrackerConfig;
pub use shared::constants::*;
pub use store::{ArtifactStore, FsArtifactStore};
pub use tracker::{CrashDumpSink, DescriptionWriter, GpuCrashTracker};
