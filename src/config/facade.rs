//! ConfigLoader facade delegating to the merge service.

use super::merge::service::MergeService;
use super::EnkanConfig;
use crate::error::ConfigError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from the global file, an optional explicit file and the environment.
    pub fn load(explicit: Option<&Path>) -> Result<EnkanConfig, ConfigError> {
        Ok(MergeService::load(explicit)?)
    }

    /// Load from one file plus the environment.
    pub fn load_from_file(path: &Path) -> Result<EnkanConfig, ConfigError> {
        Ok(MergeService::load_from_file(path)?)
    }

    /// Compiled defaults only.
    pub fn defaults() -> EnkanConfig {
        EnkanConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "mode = \"b2\"\n\n[media]\nimage_extensions = [\"png\"]\ninclude_video = true\n\n[logging]\nlevel = \"debug\""
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.mode.as_deref(), Some("b2"));
        assert_eq!(config.media.image_extensions, vec!["png".to_string()]);
        assert!(config.media.include_video);
        assert!(config.media.mute);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "text");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let missing = temp.path().join("absent.toml");
        assert!(matches!(
            ConfigLoader::load_from_file(&missing),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn test_defaults() {
        assert_eq!(ConfigLoader::defaults(), EnkanConfig::default());
    }
}
