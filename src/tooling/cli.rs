//! CLI
//!
//! `enkan build` folds the given sources into one weighted tree and optionally
//! writes the weighted list and a snapshot; `enkan mode` explains a mode string
//! and `enkan config` prints the layered configuration.

use crate::concurrency::CancellationToken;
use crate::config::{ConfigLoader, EnkanConfig};
use crate::extract::{extract, write_weighted_list, ListHeader};
use crate::logging::LoggingConfig;
use crate::mode::ModeTable;
use crate::orchestrator::{build_all, BuildRequest};
use crate::source::fs::OsFs;
use crate::source::snapshot::write_snapshot;
use crate::tooling::format::{format_build_text, format_mode_table};
use crate::tree::hasher::fingerprint_hex;
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

/// Enkan - weighted selection trees from image-source descriptions
#[derive(Parser)]
#[command(name = "enkan")]
#[command(about = "Build weighted selection trees from folders, lists and snapshots")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (layered over the global config)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build, merge and weight one or more sources
    Build {
        /// Sources in merge order: .txt, .lst, .tree files or directories
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Mode string overriding every source's own (e.g. b1w3,-20)
        #[arg(long)]
        mode: Option<String>,

        /// Write `path,weight` lines here
        #[arg(long)]
        output_list: Option<PathBuf>,

        /// Write a snapshot of the final tree here
        #[arg(long)]
        output_tree: Option<PathBuf>,

        /// Print the share of every branch at the lowest rung
        #[arg(long)]
        summary: bool,

        /// Build sources one after another
        #[arg(long)]
        sequential: bool,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Explain a mode string level by level
    Mode {
        mode: String,
    },
    /// Print the effective configuration as TOML
    Config,
}

impl Cli {
    /// Logging section of `config` with command-line flags applied on top
    pub fn logging_config(&self, config: &EnkanConfig) -> LoggingConfig {
        let mut logging = config.logging.clone();
        if let Some(ref level) = self.log_level {
            logging.level = level.clone();
        }
        if let Some(ref format) = self.log_format {
            logging.format = format.clone();
        }
        if let Some(ref output) = self.log_output {
            logging.output = output.clone();
        }
        if let Some(ref file) = self.log_file {
            logging.file = Some(file.clone());
        }
        logging
    }
}

/// Everything a command needs
pub struct CliContext {
    config: EnkanConfig,
    cancel: CancellationToken,
}

impl CliContext {
    pub fn new(config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let config = ConfigLoader::load(config_path.as_deref())
            .context("Failed to load configuration")?;
        Ok(Self::with_config(config))
    }

    pub fn with_config(config: EnkanConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &EnkanConfig {
        &self.config
    }

    /// Token observed by running builds
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run `command` and return what should be printed
    pub fn execute(&self, command: &Commands) -> anyhow::Result<String> {
        match command {
            Commands::Build {
                inputs,
                mode,
                output_list,
                output_tree,
                summary,
                sequential,
                format,
            } => self.build(
                inputs,
                mode.as_deref(),
                output_list.as_ref(),
                output_tree.as_ref(),
                *summary,
                *sequential,
                format,
            ),
            Commands::Mode { mode } => {
                let table = ModeTable::parse(mode)
                    .with_context(|| format!("Invalid mode string '{}'", mode))?;
                Ok(format_mode_table(&table))
            }
            Commands::Config => toml::to_string_pretty(&self.config)
                .context("Failed to render configuration"),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        &self,
        inputs: &[PathBuf],
        mode: Option<&str>,
        output_list: Option<&PathBuf>,
        output_tree: Option<&PathBuf>,
        summary: bool,
        sequential: bool,
        format: &str,
    ) -> anyhow::Result<String> {
        if format != "text" && format != "json" {
            bail!("Invalid format '{}' (must be 'text' or 'json')", format);
        }
        let mode_override = match mode {
            Some(raw) => Some(
                ModeTable::parse(raw).with_context(|| format!("Invalid mode string '{}'", raw))?,
            ),
            None => self.config.mode_table()?,
        };
        let settings = self.config.build_settings()?;
        let fs = OsFs::new(self.config.build.follow_symlinks);
        let request = BuildRequest::new(inputs.to_vec())
            .with_mode(mode_override)
            .parallel(self.config.build.parallel_sources && !sequential);

        let outcome = build_all(&request, &fs, &settings, &self.cancel)?;
        let extraction = extract(&outcome.tree);

        if let Some(path) = output_list {
            let header = ListHeader {
                inputs: inputs.to_vec(),
                mode: outcome.tree.mode_table.to_string(),
            };
            write_weighted_list(path, &extraction, &header)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), entries = extraction.len(), "Wrote weighted list");
        }
        if let Some(path) = output_tree {
            write_snapshot(path, &outcome.tree, outcome.target_mode.as_ref())
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }

        let digest = fingerprint_hex(&outcome.tree);
        if format == "json" {
            let warnings: Vec<_> = outcome.warnings.iter().collect();
            let value = json!({
                "mode": outcome.tree.mode_table.to_string(),
                "leaves": extraction.len(),
                "total": extraction.total(),
                "fingerprint": digest,
                "warnings": warnings,
            });
            return Ok(serde_json::to_string_pretty(&value)?);
        }
        Ok(format_build_text(&outcome, &digest, summary))
    }
}
