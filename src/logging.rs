//! Logging
//!
//! `tracing` subscriber setup. Level, format and destination come from the
//! `[logging]` configuration section, with `ENKAN_LOG*` environment variables
//! taking priority.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Resolve the log file path with precedence: CLI, `ENKAN_LOG_FILE`, config file, default.
pub fn resolve_log_file_path(
    cli_file: Option<PathBuf>,
    config_file: Option<PathBuf>,
) -> Result<PathBuf, ConfigError> {
    if let Some(p) = cli_file.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(p);
    }
    if let Ok(env_path) = std::env::var("ENKAN_LOG_FILE") {
        if !env_path.is_empty() {
            return Ok(PathBuf::from(env_path));
        }
    }
    if let Some(p) = config_file.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(p);
    }
    default_log_file_path()
}

/// `enkan.log` in the platform state directory (local data directory where
/// the platform has no state directory)
fn default_log_file_path() -> Result<PathBuf, ConfigError> {
    let dirs = directories::ProjectDirs::from("", "enkan", "enkan").ok_or_else(|| {
        ConfigError::Invalid("Could not determine platform directories for log file".to_string())
    })?;
    let dir = dirs
        .state_dir()
        .unwrap_or_else(|| dirs.data_local_dir())
        .to_path_buf();
    Ok(dir.join("enkan.log"))
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// json or text
    #[serde(default = "default_format")]
    pub format: String,

    /// stdout, stderr, file, file+stderr, both
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file when output includes file; `None` uses the platform default
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Colored text output on terminals
    #[serde(default = "default_true")]
    pub color: bool,

    /// Per-module levels, e.g. `enkan::merge = "debug"`
    #[serde(default)]
    pub modules: BTreeMap<String, String>,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stderr".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: None,
            color: default_true(),
            modules: BTreeMap::new(),
        }
    }
}

/// Where log lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Destination {
    Stdout,
    Stderr,
    File,
    FileAndStderr,
    Both,
}

impl Destination {
    fn parse(output: &str) -> Result<Self, ConfigError> {
        match output {
            "stdout" => Ok(Destination::Stdout),
            "stderr" => Ok(Destination::Stderr),
            "file" => Ok(Destination::File),
            "file+stderr" => Ok(Destination::FileAndStderr),
            "both" => Ok(Destination::Both),
            _ => Err(ConfigError::Invalid(format!(
                "Invalid log output: {} (must be 'stdout', 'stderr', 'file', 'file+stderr', or 'both')",
                output
            ))),
        }
    }

    fn uses_file(self) -> bool {
        matches!(self, Destination::File | Destination::FileAndStderr)
    }
}

/// Install the global subscriber.
///
/// Priority order (highest to lowest): environment variables (`ENKAN_LOG`,
/// `ENKAN_LOG_FORMAT`, `ENKAN_LOG_OUTPUT`, `ENKAN_LOG_MODULES`,
/// `ENKAN_LOG_FILE`), the configuration, defaults.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), ConfigError> {
    if config.map(|c| !c.enabled).unwrap_or(false) {
        Registry::default()
            .with(EnvFilter::new("off"))
            .with(fmt::layer().with_writer(std::io::sink))
            .try_init()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        return Ok(());
    }

    let filter = build_env_filter(config)?;
    let json = determine_format(config)? == "json";
    let destination = determine_output(config)?;
    let color = config.map(|c| c.color).unwrap_or(true) && !destination.uses_file();
    let writer = make_writer(destination, config.and_then(|c| c.file.clone()))?;

    let registry = Registry::default().with(filter);
    let installed = if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(color)
                    .with_writer(writer),
            )
            .try_init()
    };
    installed.map_err(|e| ConfigError::Invalid(format!("Logging already initialised: {}", e)))
}

fn make_writer(
    destination: Destination,
    config_file: Option<PathBuf>,
) -> Result<BoxMakeWriter, ConfigError> {
    let open_file = || -> Result<std::fs::File, ConfigError> {
        let log_file = resolve_log_file_path(None, config_file.clone())?;
        if let Some(parent) = log_file.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::Invalid(format!("Failed to create log directory: {}", e))
            })?;
        }
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .map_err(|e| {
                ConfigError::Invalid(format!("Failed to open log file {:?}: {}", log_file, e))
            })
    };

    Ok(match destination {
        Destination::Stdout => BoxMakeWriter::new(std::io::stdout),
        Destination::Stderr => BoxMakeWriter::new(std::io::stderr),
        Destination::Both => BoxMakeWriter::new(std::io::stdout.and(std::io::stderr)),
        Destination::File => BoxMakeWriter::new(std::sync::Mutex::new(open_file()?)),
        Destination::FileAndStderr => BoxMakeWriter::new(
            std::sync::Mutex::new(open_file()?).and(std::io::stderr),
        ),
    })
}

/// Build the filter from `ENKAN_LOG`, else from config plus `ENKAN_LOG_MODULES`
fn build_env_filter(config: Option<&LoggingConfig>) -> Result<EnvFilter, ConfigError> {
    if let Ok(filter) = EnvFilter::try_from_env("ENKAN_LOG") {
        return Ok(filter);
    }

    let level = config.map(|c| c.level.as_str()).unwrap_or("warn");
    if level == "off" {
        return Ok(EnvFilter::new("off"));
    }
    let mut filter = EnvFilter::new(level);

    let mut directives: Vec<String> = config
        .map(|c| {
            c.modules
                .iter()
                .map(|(module, level)| format!("{}={}", module, level))
                .collect()
        })
        .unwrap_or_default();
    if let Ok(modules) = std::env::var("ENKAN_LOG_MODULES") {
        directives.extend(parse_module_levels(&modules));
    }
    for directive in directives {
        filter = filter.add_directive(
            directive
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("Invalid log directive: {}", e)))?,
        );
    }
    Ok(filter)
}

/// `a=debug, b=trace` into directives; malformed pairs are skipped
fn parse_module_levels(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|pair| {
            let (module, level) = pair.split_once('=')?;
            let (module, level) = (module.trim(), level.trim());
            (!module.is_empty() && !level.is_empty()).then(|| format!("{}={}", module, level))
        })
        .collect()
}

fn determine_format(config: Option<&LoggingConfig>) -> Result<String, ConfigError> {
    if let Ok(format) = std::env::var("ENKAN_LOG_FORMAT") {
        if format == "json" || format == "text" {
            return Ok(format);
        }
    }
    let format = config.map(|c| c.format.as_str()).unwrap_or("text");
    if format != "json" && format != "text" {
        return Err(ConfigError::Invalid(format!(
            "Invalid log format: {} (must be 'json' or 'text')",
            format
        )));
    }
    Ok(format.to_string())
}

fn determine_output(config: Option<&LoggingConfig>) -> Result<Destination, ConfigError> {
    if let Ok(output) = std::env::var("ENKAN_LOG_OUTPUT") {
        return Destination::parse(&output);
    }
    Destination::parse(config.map(|c| c.output.as_str()).unwrap_or("stderr"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_logging_config() {
        let config = LoggingConfig::default();
        assert!(config.enabled);
        assert_eq!(config.level, "warn");
        assert_eq!(config.format, "text");
        assert_eq!(config.output, "stderr");
        assert_eq!(config.file, None);
        assert!(config.color);
    }

    #[test]
    fn test_parse_destinations() {
        assert_eq!(Destination::parse("stdout").unwrap(), Destination::Stdout);
        assert_eq!(Destination::parse("both").unwrap(), Destination::Both);
        let combined = Destination::parse("file+stderr").unwrap();
        assert!(combined.uses_file());
        assert!(!Destination::Stderr.uses_file());
        assert!(Destination::parse("syslog").is_err());
    }

    #[test]
    fn test_module_levels() {
        assert_eq!(
            parse_module_levels("enkan::merge=debug, enkan::weights = trace,broken"),
            vec!["enkan::merge=debug", "enkan::weights=trace"]
        );
    }

    #[test]
    fn test_log_file_precedence() {
        let cli = Some(PathBuf::from("/tmp/cli.log"));
        let config = Some(PathBuf::from("/tmp/config.log"));
        assert_eq!(
            resolve_log_file_path(cli, config.clone()).unwrap(),
            PathBuf::from("/tmp/cli.log")
        );
        if std::env::var("ENKAN_LOG_FILE").is_err() {
            assert_eq!(
                resolve_log_file_path(None, config).unwrap(),
                PathBuf::from("/tmp/config.log")
            );
            let default = resolve_log_file_path(None, None).unwrap();
            assert!(default.ends_with("enkan.log"));
        }
    }

    #[test]
    fn test_invalid_format_is_rejected() {
        if std::env::var("ENKAN_LOG_FORMAT").is_ok() {
            return;
        }
        let config = LoggingConfig {
            format: "xml".to_string(),
            ..LoggingConfig::default()
        };
        assert!(determine_format(Some(&config)).is_err());
    }
}
