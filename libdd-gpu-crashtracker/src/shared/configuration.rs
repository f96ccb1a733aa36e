// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
use crate::extension::WatchedApis;
use crate::shared::constants;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuCrashTrackerConfig {
    // Every artifact lands in `<log_root>/gpucrash`
    log_root: PathBuf,
    #[serde(default = "default_library_path")]
    library_path: String,
    #[serde(default = "default_application_name")]
    application_name: String,
    #[serde(default)]
    application_version: Option<String>,
    #[serde(default)]
    watched_apis: WatchedApis,
    /// Asks the extension to hold debug info callbacks back until a crash happens, instead of
    /// emitting them whenever a shader is loaded.
    #[serde(default)]
    defer_debug_info_callbacks: bool,
}

fn default_library_path() -> String {
    constants::DEFAULT_AFTERMATH_LIBRARY.to_string()
}

fn default_application_name() -> String {
    constants::DEFAULT_APPLICATION_NAME.to_string()
}

impl GpuCrashTrackerConfig {
    pub fn new(
        log_root: PathBuf,
        library_path: Option<String>,
        application_name: Option<String>,
        application_version: Option<String>,
        watched_apis: WatchedApis,
        defer_debug_info_callbacks: bool,
    ) -> anyhow::Result<Self> {
        let config = Self {
            log_root,
            library_path: library_path.unwrap_or_else(default_library_path),
            application_name: application_name.unwrap_or_else(default_application_name),
            application_version,
            watched_apis,
            defer_debug_info_callbacks,
        };
        config.validate()?;
        Ok(config)
    }

    /// A configuration using the defaults for everything but the log root.
    pub fn for_log_root(log_root: impl Into<PathBuf>) -> Self {
        Self {
            log_root: log_root.into(),
            library_path: default_library_path(),
            application_name: default_application_name(),
            application_version: None,
            watched_apis: WatchedApis::default(),
            defer_debug_info_callbacks: false,
        }
    }

    /// Checks the invariants `new` enforces. Deserialized configurations must go through this
    /// before being handed to a tracker.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.log_root.as_os_str().is_empty(),
            "The log root must not be empty"
        );
        anyhow::ensure!(
            !self.library_path.is_empty(),
            "The Aftermath library path must not be empty"
        );
        anyhow::ensure!(
            !self.application_name.is_empty(),
            "The application name must not be empty"
        );
        // Descriptions are handed to the extension as C strings.
        anyhow::ensure!(
            !self.application_name.contains('\0'),
            "The application name ({:?}) contains a NUL byte",
            self.application_name
        );
        if let Some(version) = &self.application_version {
            anyhow::ensure!(
                !version.contains('\0'),
                "The application version ({version:?}) contains a NUL byte"
            );
        }
        Ok(())
    }

    pub fn log_root(&self) -> &Path {
        &self.log_root
    }

    pub fn dump_dir(&self) -> PathBuf {
        self.log_root.join(constants::GPU_CRASH_DUMP_DIR_NAME)
    }

    pub fn library_path(&self) -> &str {
        &self.library_path
    }

    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    pub fn application_version(&self) -> Option<&str> {
        self.application_version.as_deref()
    }

    pub fn watched_apis(&self) -> WatchedApis {
        self.watched_apis
    }

    pub fn defer_debug_info_callbacks(&self) -> bool {
        self.defer_debug_info_callbacks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_fields() {
        let config: GpuCrashTrackerConfig =
            serde_json::from_str(r#"{"log_root": "/var/log/app"}"#).unwrap();
        assert_eq!(config, GpuCrashTrackerConfig::for_log_root("/var/log/app"));
        assert_eq!(config.library_path(), constants::DEFAULT_AFTERMATH_LIBRARY);
        assert_eq!(config.watched_apis(), WatchedApis::Vulkan);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn dump_dir_is_under_log_root() {
        let config = GpuCrashTrackerConfig::for_log_root("/var/log/app");
        assert_eq!(config.dump_dir(), PathBuf::from("/var/log/app/gpucrash"));
    }

    #[test]
    fn rejects_nul_in_descriptions() {
        let err = GpuCrashTrackerConfig::new(
            "/tmp".into(),
            None,
            Some("bad\0name".to_string()),
            None,
            WatchedApis::Vulkan,
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("NUL"));

        assert!(GpuCrashTrackerConfig::new(
            "/tmp".into(),
            None,
            None,
            Some("1.0\0".to_string()),
            WatchedApis::Vulkan,
            false,
        )
        .is_err());
    }

    #[test]
    fn rejects_empty_fields() {
        assert!(GpuCrashTrackerConfig::new(
            PathBuf::new(),
            None,
            None,
            None,
            WatchedApis::Vulkan,
            false
        )
        .is_err());
        assert!(GpuCrashTrackerConfig::new(
            "/tmp".into(),
            Some(String::new()),
            None,
            None,
            WatchedApis::Vulkan,
            false
        )
        .is_err());
    }
}
