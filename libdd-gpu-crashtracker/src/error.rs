// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::extension::AftermathResult;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures to locate the Aftermath extension or one of its entry points.
#[derive(Debug, Error)]
pub enum BindingError {
    #[error("Invalid Aftermath library path {0:?}")]
    InvalidLibraryPath(String),
    #[error("Failed to load the Aftermath library {path}: {reason}")]
    LibraryNotFound { path: String, reason: String },
    #[error("The Aftermath library does not export {0}")]
    MissingSymbol(&'static str),
}

/// A call into the extension that did not succeed.
#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error("{operation} failed with {result}")]
    Failed {
        operation: &'static str,
        result: AftermathResult,
    },
    #[error("{operation} was given {len} bytes, more than the extension can address")]
    BufferTooLarge { operation: &'static str, len: usize },
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Short write to {}: {written} of {expected} bytes", path.display())]
    ShortWrite {
        path: PathBuf,
        expected: usize,
        written: usize,
    },
}

/// Reasons for `GpuCrashTracker::try_initialize` to fail. Any of them leaves the tracker inert.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("Invalid GPU crash tracker configuration: {0:#}")]
    Config(anyhow::Error),
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error("Failed to create the GPU crash dump directory {}: {source}", path.display())]
    DumpDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to enable GPU crash dumps: {0}")]
    Enable(#[source] ExtensionError),
    #[error("The GPU crash tracker is disabled after a failed initialization")]
    Disabled,
}

/// Failure of a single capture operation (crash dump, debug info or shader source).
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error(transparent)]
    Extension(#[from] ExtensionError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}
