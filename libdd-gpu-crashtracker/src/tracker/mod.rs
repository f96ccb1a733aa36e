// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

mod capture;
mod session;
mod sink;

pub use sink::{CrashDumpSink, DescriptionWriter};

use crate::error::InitError;
use crate::extension::abi::feature_flags;
use crate::extension::{ExtensionBinding, SharedLibrary, SymbolResolver};
use crate::shared::configuration::GpuCrashTrackerConfig;
use crate::store::{ArtifactStore, FsArtifactStore};
use session::TrackerSession;
use std::ffi::{c_void, CString};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{error, info};

/// Captures the GPU crash dumps, shader debug info and shader sources of one process.
///
/// A tracker does nothing until [`GpuCrashTracker::initialize`] succeeds. If initialization
/// fails, the tracker stays inert for the rest of its life and every operation is a no-op.
/// Dropping an initialized tracker disables crash dump capture with the extension.
pub struct GpuCrashTracker {
    config: GpuCrashTrackerConfig,
    store: Arc<dyn ArtifactStore>,
    resolver: Option<Box<dyn SymbolResolver>>,
    state: TrackerState,
}

enum TrackerState {
    Uninitialized,
    // Boxed so that the address registered with the extension never moves.
    Armed(Box<TrackerCore>),
    Disabled,
}

/// Everything the extension callbacks need. Its address is the `user_data` registered with the
/// extension.
pub(crate) struct TrackerCore {
    binding: ExtensionBinding,
    store: Arc<dyn ArtifactStore>,
    session: Mutex<TrackerSession>,
    application_name: CString,
    application_version: Option<CString>,
    // Keeps the extension loaded while `binding` may be called. Dropped last.
    _resolver: Box<dyn SymbolResolver>,
}

impl GpuCrashTracker {
    /// A tracker loading the extension from `config.library_path()` and writing to the local
    /// filesystem.
    pub fn new(config: GpuCrashTrackerConfig) -> Self {
        Self {
            config,
            store: Arc::new(FsArtifactStore),
            resolver: None,
            state: TrackerState::Uninitialized,
        }
    }

    /// A tracker resolving the extension's entry points through `resolver` instead of loading
    /// `config.library_path()`.
    pub fn with_resolver(config: GpuCrashTrackerConfig, resolver: Box<dyn SymbolResolver>) -> Self {
        let mut tracker = Self::new(config);
        tracker.resolver = Some(resolver);
        tracker
    }

    pub fn with_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = store;
        self
    }

    /// Binds the extension, recreates the dump directory and registers the tracker's callbacks.
    /// Returns whether the tracker is armed; failures are logged.
    pub fn initialize(&mut self) -> bool {
        match self.try_initialize() {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Failed to initialize the GPU crash tracker");
                false
            }
        }
    }

    /// Same as [`GpuCrashTracker::initialize`], with the reason of the failure.
    ///
    /// Initializing an armed tracker is a no-op. After a failure, the tracker is permanently
    /// disabled and every later call fails with [`InitError::Disabled`].
    pub fn try_initialize(&mut self) -> Result<(), InitError> {
        match self.state {
            TrackerState::Armed(_) => return Ok(()),
            TrackerState::Disabled => return Err(InitError::Disabled),
            TrackerState::Uninitialized => {}
        }
        // Only a complete initialization arms the tracker.
        self.state = TrackerState::Disabled;

        self.config.validate().map_err(InitError::Config)?;
        let resolver = match self.resolver.take() {
            Some(resolver) => resolver,
            None => Box::new(SharedLibrary::open(self.config.library_path())?),
        };
        let binding = ExtensionBinding::resolve(resolver.as_ref())?;

        let dump_dir = self.config.dump_dir();
        self.store
            .recreate_dir(&dump_dir)
            .map_err(|source| InitError::DumpDirectory {
                path: dump_dir.clone(),
                source,
            })?;

        let core = Box::new(TrackerCore {
            binding,
            store: self.store.clone(),
            session: Mutex::new(TrackerSession::new(dump_dir)),
            application_name: c_string(self.config.application_name())?,
            application_version: self.config.application_version().map(c_string).transpose()?,
            _resolver: resolver,
        });
        let flags = if self.config.defer_debug_info_callbacks() {
            feature_flags::DEFER_DEBUG_INFO_CALLBACKS
        } else {
            feature_flags::DEFAULT
        };
        core.binding
            .enable(
                self.config.watched_apis(),
                flags,
                sink::callback_table::<TrackerCore>(),
                core.context(),
            )
            .map_err(InitError::Enable)?;

        info!(
            dump_dir = %self.config.dump_dir().display(),
            "GPU crash dumps enabled"
        );
        self.state = TrackerState::Armed(core);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state, TrackerState::Armed(_))
    }

    /// The directory artifacts are written to, once initialized.
    pub fn dump_dir(&self) -> Option<PathBuf> {
        self.core()
            .map(|core| core.lock_session().dump_dir().to_path_buf())
    }

    pub fn config(&self) -> &GpuCrashTrackerConfig {
        &self.config
    }

    /// Archives a SPIR-V module as `source_<hash>.spv`, so that the shader hashes found in crash
    /// reports can be matched with their source. Failures are logged and never reach the caller.
    pub fn save_shader(&self, spirv: &[u32]) {
        if let Some(core) = self.core() {
            core.save_shader(spirv);
        }
    }

    fn core(&self) -> Option<&TrackerCore> {
        match &self.state {
            TrackerState::Armed(core) => Some(core),
            _ => None,
        }
    }
}

/// Uninitialized trackers ignore every notification.
impl CrashDumpSink for GpuCrashTracker {
    fn on_crash_dump(&self, gpu_crash_dump: &[u8]) {
        if let Some(core) = self.core() {
            core.on_crash_dump(gpu_crash_dump);
        }
    }

    fn on_shader_debug_info(&self, shader_debug_info: &[u8]) {
        if let Some(core) = self.core() {
            core.on_shader_debug_info(shader_debug_info);
        }
    }

    fn on_description_request(&self, description: &DescriptionWriter) {
        if let Some(core) = self.core() {
            core.on_description_request(description);
        }
    }
}

impl Drop for GpuCrashTracker {
    fn drop(&mut self) {
        if let TrackerState::Armed(core) = &self.state {
            if let Err(e) = core.binding.disable() {
                error!(error = %e, "Failed to disable GPU crash dumps");
            }
        }
    }
}

impl TrackerCore {
    fn context(&self) -> *mut c_void {
        self as *const Self as *mut c_void
    }

    // A panic while holding the lock must not take the remaining captures down with it.
    fn lock_session(&self) -> MutexGuard<'_, TrackerSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn c_string(value: &str) -> Result<CString, InitError> {
    CString::new(value).map_err(|e| InitError::Config(e.into()))
}
