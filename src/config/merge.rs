//! Merge policy: compiled defaults every layered load starts from

pub mod service;

use crate::config::MediaConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Builder seeded with the compiled defaults
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let media = MediaConfig::default();
    Config::builder()
        .set_default("media.image_extensions", media.image_extensions)?
        .set_default("media.video_extensions", media.video_extensions)?
        .set_default("media.include_video", media.include_video)?
        .set_default("media.mute", media.mute)?
        .set_default("build.parallel_sources", true)?
        .set_default("build.follow_symlinks", false)
}
