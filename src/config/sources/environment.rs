//! Environment variable source: ENKAN prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Add the environment overlay, e.g. `ENKAN__BUILD__PARALLEL_SOURCES=false`.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(
        Environment::with_prefix("ENKAN")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("media.image_extensions")
            .with_list_parse_key("media.video_extensions")
            .try_parsing(true),
    ))
}
