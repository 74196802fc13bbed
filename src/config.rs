//! Settings for artifact location and the update-in-place toggle.
//!
//! Settings come from defaults, an optional YAML file and the environment,
//! in that order of increasing precedence. The update flag is resolved when a
//! match is invoked and then passed down explicitly; it is never cached.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ApprovalError;

/// Overrides the artifact root directory.
pub const ROOT_ENV: &str = "SNAPGATE_ROOT";
/// Enables overwriting approved artifacts on mismatch.
pub const UPDATE_IN_PLACE_ENV: &str = "SNAPGATE_UPDATE_IN_PLACE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Artifact root, relative to the crate under test unless absolute.
    pub root: PathBuf,
    /// File extension of artifacts, without the dot.
    pub extension: String,
    /// Default for the `assert_*` entry points when the environment is silent.
    pub update_in_place: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("approvals"),
            extension: "json".to_string(),
            update_in_place: false,
        }
    }
}

impl Settings {
    /// Defaults overlaid with environment overrides.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Reads settings from a YAML file. Missing keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ApprovalError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| ApprovalError::io("read", path, source))?;
        serde_yaml::from_str(&text).map_err(|e| {
            crate::err_msg!(Config, "invalid settings file {}: {}", path.display(), e)
                .with_help("Expected keys: root, extension, update_in_place.")
        })
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(root) = std::env::var(ROOT_ENV) {
            if !root.trim().is_empty() {
                self.root = PathBuf::from(root);
            }
        }
        if let Ok(flag) = std::env::var(UPDATE_IN_PLACE_ENV) {
            self.update_in_place = parse_flag(&flag);
        }
        self
    }

    /// Resolves the update-in-place toggle right now.
    ///
    /// A set environment variable wins over the configured value.
    pub fn update_in_place_now(&self) -> bool {
        std::env::var(UPDATE_IN_PLACE_ENV)
            .map(|v| parse_flag(&v))
            .unwrap_or(self.update_in_place)
    }
}

fn parse_flag(value: &str) -> bool {
    let value = value.trim();
    value.eq_ignore_ascii_case("true") || value == "1"
}
