// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::extension::{ShaderDebugIdentifier, ShaderHash};
use crate::shared::constants::*;
use std::path::{Path, PathBuf};

/// State shared by every callback of an armed tracker. Only ever touched under the tracker lock.
#[derive(Debug)]
pub(crate) struct TrackerSession {
    dump_dir: PathBuf,
    dump_counter: u64,
}

impl TrackerSession {
    pub fn new(dump_dir: PathBuf) -> Self {
        Self {
            dump_dir,
            dump_counter: 0,
        }
    }

    pub fn dump_dir(&self) -> &Path {
        &self.dump_dir
    }

    /// Allocates the file name of the next crash dump: `crash.nv-gpudmp` first, then
    /// `crash_1.nv-gpudmp`, `crash_2.nv-gpudmp`, ...
    ///
    /// Every call consumes an ordinal, whether or not the dump makes it to disk afterwards.
    pub fn next_dump_path(&mut self) -> PathBuf {
        let id = self.dump_counter;
        self.dump_counter += 1;
        let name = if id == 0 {
            format!("{GPU_CRASH_DUMP_STEM}.{GPU_CRASH_DUMP_EXTENSION}")
        } else {
            format!("{GPU_CRASH_DUMP_STEM}_{id}.{GPU_CRASH_DUMP_EXTENSION}")
        };
        self.dump_dir.join(name)
    }

    pub fn debug_info_path(&self, identifier: ShaderDebugIdentifier) -> PathBuf {
        let [high, low] = identifier.id;
        self.dump_dir.join(format!(
            "{SHADER_DEBUG_INFO_PREFIX}{high:016x}{low:016x}.{SHADER_DEBUG_INFO_EXTENSION}"
        ))
    }

    pub fn shader_source_path(&self, hash: ShaderHash) -> PathBuf {
        self.dump_dir.join(format!(
            "{SHADER_SOURCE_PREFIX}{:016x}.{SHADER_SOURCE_EXTENSION}",
            hash.hash
        ))
    }
}

/// The decoded report sits next to its dump, with `.json` appended to the full name.
pub(crate) fn report_path(dump_path: &Path) -> PathBuf {
    let mut name = dump_path.as_os_str().to_owned();
    name.push(GPU_CRASH_DUMP_JSON_SUFFIX);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_name(path: &Path) -> &str {
        path.file_name().unwrap().to_str().unwrap()
    }

    #[test]
    fn dump_names_follow_the_counter() {
        let mut session = TrackerSession::new(PathBuf::from("/logs/gpucrash"));
        let names: Vec<_> = (0..4).map(|_| session.next_dump_path()).collect();
        let names: Vec<_> = names.iter().map(|p| file_name(p)).collect();
        assert_eq!(
            names,
            [
                "crash.nv-gpudmp",
                "crash_1.nv-gpudmp",
                "crash_2.nv-gpudmp",
                "crash_3.nv-gpudmp"
            ]
        );
    }

    #[test]
    fn report_keeps_the_dump_extension() {
        let report = report_path(Path::new("/logs/gpucrash/crash_1.nv-gpudmp"));
        assert_eq!(file_name(&report), "crash_1.nv-gpudmp.json");
        assert_eq!(report.parent(), Some(Path::new("/logs/gpucrash")));
    }

    #[test]
    fn content_keys_are_zero_padded_hex() {
        let session = TrackerSession::new(PathBuf::from("/logs/gpucrash"));
        let debug_info = session.debug_info_path(ShaderDebugIdentifier { id: [0xab, 0x1234] });
        assert_eq!(
            file_name(&debug_info),
            "shader_00000000000000ab0000000000001234.nvdbg"
        );
        let source = session.shader_source_path(ShaderHash {
            hash: 0xdead_beef_0000_0001,
        });
        assert_eq!(file_name(&source), "source_deadbeef00000001.spv");
    }
}
