//! Configuration
//!
//! Layered settings: compiled defaults, then the global file
//! (`$XDG_CONFIG_HOME/enkan/config.toml`), then an explicit file, then
//! `ENKAN__SECTION__KEY` environment variables. The loaded [`EnkanConfig`] is
//! turned into a [`BuildSettings`] value that is passed explicitly to builders.

pub mod facade;
pub mod merge;
pub mod paths;
pub mod sources;

pub use facade::ConfigLoader;

use crate::error::ConfigError;
use crate::logging::LoggingConfig;
use crate::mode::ModeTable;
use crate::source::BuildSettings;
use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnkanConfig {
    /// Mode string applied when the command line gives none
    #[serde(default)]
    pub mode: Option<String>,

    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which files become leaves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaConfig {
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,

    #[serde(default = "default_video_extensions")]
    pub video_extensions: Vec<String>,

    /// Videos become leaves unless a directive says otherwise
    #[serde(default)]
    pub include_video: bool,

    #[serde(default = "default_true")]
    pub mute: bool,
}

fn default_image_extensions() -> Vec<String> {
    BuildSettings::default().image_extensions.into_iter().collect()
}

fn default_video_extensions() -> Vec<String> {
    BuildSettings::default().video_extensions.into_iter().collect()
}

fn default_true() -> bool {
    true
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            image_extensions: default_image_extensions(),
            video_extensions: default_video_extensions(),
            include_video: false,
            mute: true,
        }
    }
}

/// Pipeline behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Build independent sources on separate threads
    #[serde(default = "default_true")]
    pub parallel_sources: bool,

    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            parallel_sources: true,
            follow_symlinks: false,
        }
    }
}

impl EnkanConfig {
    /// Parsed `mode`, if set
    pub fn mode_table(&self) -> Result<Option<ModeTable>, ConfigError> {
        match self.mode.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(mode) => ModeTable::parse(mode)
                .map(Some)
                .map_err(|e| ConfigError::Invalid(format!("mode: {}", e))),
        }
    }

    pub fn build_settings(&self) -> Result<BuildSettings, ConfigError> {
        let normalise = |items: &[String]| {
            items
                .iter()
                .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect()
        };
        Ok(BuildSettings {
            image_extensions: normalise(&self.media.image_extensions),
            video_extensions: normalise(&self.media.video_extensions),
            include_video: self.media.include_video,
            mute: self.media.mute,
            mode_hint: self.mode_table()?,
        })
    }
}
