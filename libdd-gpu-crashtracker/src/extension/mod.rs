// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Runtime binding to the Nsight Aftermath extension.
//!
//! Nothing links against the extension: its entry points are looked up through a
//! [`SymbolResolver`], usually a [`SharedLibrary`], and the binding refuses to exist unless all
//! of them are found.

pub(crate) mod abi;
mod binding;
mod library;

pub use abi::{
    AddDescriptionFn, AftermathResult, CrashDumpDescriptionCallback, DescriptionKey,
    GpuCrashDumpCallback, ShaderDebugIdentifier, ShaderDebugInfoCallback, ShaderHash,
    WatchedApis,
};
pub(crate) use binding::{CallbackTable, ExtensionBinding};
pub use library::{SharedLibrary, SymbolResolver};
