//! Local user settings / 本地用户设置
//!
//! Selected cloud-type filters and display density, persisted as JSON.
//! Reads never fail: a missing or corrupt file yields defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;

/// Result list density / 显示密度
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DensityMode {
    #[default]
    Comfortable,
    Compact,
}

impl DensityMode {
    pub fn toggled(self) -> Self {
        match self {
            DensityMode::Comfortable => DensityMode::Compact,
            DensityMode::Compact => DensityMode::Comfortable,
        }
    }
}

impl From<&str> for DensityMode {
    fn from(s: &str) -> Self {
        match s {
            "compact" => DensityMode::Compact,
            _ => DensityMode::Comfortable,
        }
    }
}

impl<'de> Deserialize<'de> for DensityMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(DensityMode::from).unwrap_or_default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub selected_cloud_types: Vec<String>,
    #[serde(default)]
    pub density: DensityMode,
}

/// File-backed settings store / 设置存储
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Settings {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Settings::default(),
            Err(e) => {
                tracing::warn!("Failed to read settings {:?}: {}", self.path, e);
                return Settings::default();
            }
        };

        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Ignoring malformed settings {:?}: {}", self.path, e);
            Settings::default()
        })
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(settings)?;
        std::fs::write(&self.path, content)?;
        tracing::debug!("Saved settings to {:?}", self.path);
        Ok(())
    }

    /// Replace the selected cloud types and persist
    pub fn set_cloud_types(&self, cloud_types: Vec<String>) -> Result<Settings> {
        let mut settings = self.load();
        settings.selected_cloud_types = cloud_types;
        self.save(&settings)?;
        Ok(settings)
    }

    pub fn set_density(&self, density: DensityMode) -> Result<Settings> {
        let mut settings = self.load();
        settings.density = density;
        self.save(&settings)?;
        Ok(settings)
    }
}
