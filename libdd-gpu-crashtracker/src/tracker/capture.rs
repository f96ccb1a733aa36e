// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::session::{report_path, TrackerSession};
use super::sink::{CrashDumpSink, DescriptionWriter};
use super::TrackerCore;
use crate::error::{CaptureError, ExtensionError};
use crate::extension::DescriptionKey;
use crate::store::write_artifact;
use std::path::PathBuf;
use tracing::{debug, error};

impl TrackerCore {
    /// Renders the crash dump as a JSON report.
    fn decode_report(&self, gpu_crash_dump: &[u8]) -> Result<Vec<u8>, ExtensionError> {
        let decoder = self.binding.create_decoder(gpu_crash_dump)?;
        let json_size = decoder.generate_json(self.context())?;
        decoder.json(json_size)
    }

    fn capture_crash_dump(
        &self,
        session: &mut TrackerSession,
        gpu_crash_dump: &[u8],
    ) -> Result<PathBuf, CaptureError> {
        let dump_path = session.next_dump_path();
        let report = self.decode_report(gpu_crash_dump);
        write_artifact(self.store.as_ref(), &dump_path, gpu_crash_dump)?;
        match report {
            Ok(json) => write_artifact(self.store.as_ref(), &report_path(&dump_path), &json)?,
            // The raw dump can still be decoded offline.
            Err(e) => error!(
                dump = %dump_path.display(),
                error = %e,
                "Failed to decode GPU crash dump, only the raw dump was saved"
            ),
        }
        Ok(dump_path)
    }

    fn capture_shader_debug_info(
        &self,
        session: &TrackerSession,
        shader_debug_info: &[u8],
    ) -> Result<PathBuf, CaptureError> {
        let identifier = self
            .binding
            .shader_debug_info_identifier(shader_debug_info)?;
        let path = session.debug_info_path(identifier);
        write_artifact(self.store.as_ref(), &path, shader_debug_info)?;
        Ok(path)
    }

    pub(super) fn save_shader(&self, spirv: &[u32]) {
        let bytes: Vec<u8> = spirv.iter().flat_map(|word| word.to_ne_bytes()).collect();
        let session = self.lock_session();
        let hash = match self.binding.shader_hash_spirv(spirv) {
            Ok(hash) => hash,
            Err(e) => {
                error!(error = %e, "Failed to hash SPIR-V module");
                return;
            }
        };
        let path = session.shader_source_path(hash);
        if let Err(e) = write_artifact(self.store.as_ref(), &path, &bytes) {
            error!(
                hash = %format_args!("{:016x}", hash.hash),
                error = %e,
                "Failed to save SPIR-V module"
            );
        }
    }
}

impl CrashDumpSink for TrackerCore {
    fn on_crash_dump(&self, gpu_crash_dump: &[u8]) {
        let mut session = self.lock_session();
        error!(size = gpu_crash_dump.len(), "GPU crash dump received");
        match self.capture_crash_dump(&mut session, gpu_crash_dump) {
            Ok(path) => debug!(dump = %path.display(), "GPU crash dump saved"),
            Err(e) => error!(error = %e, "Failed to save GPU crash dump"),
        }
    }

    fn on_shader_debug_info(&self, shader_debug_info: &[u8]) {
        let session = self.lock_session();
        if let Err(e) = self.capture_shader_debug_info(&session, shader_debug_info) {
            error!(error = %e, "Failed to save shader debug info");
        }
    }

    // May run while a crash dump is being captured on the same thread: never takes the lock.
    fn on_description_request(&self, description: &DescriptionWriter) {
        description.add(DescriptionKey::ApplicationName, &self.application_name);
        if let Some(version) = &self.application_version {
            description.add(DescriptionKey::ApplicationVersion, version);
        }
    }
}
