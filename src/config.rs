// ABOUTME: Dump configuration and its TOML file loader
// ABOUTME: Merges file settings with command-line overrides into a validated DumpConfig

use crate::error::DumpError;
use crate::filters::{DumpFilterSet, DEFAULT_EXCLUDE_TABLES, DEFAULT_SCHEMA_ONLY};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::time::Duration;

pub const DEFAULT_INSERT_COUNT: usize = 1000;

/// Everything a dump run needs besides the connection
#[derive(Debug, Clone, PartialEq)]
pub struct DumpConfig {
    /// Comma-separated patterns of tables dumped without rows
    pub schema_only: String,
    /// Comma-separated patterns of tables left out, or `none`
    pub exclude_tables: String,
    /// Optional comma-separated patterns restricting the dump
    pub tables: Option<String>,
    /// Maximum rows per insert statement
    pub insert_count: usize,
    /// Maximum rows read per table
    pub max_rows: Option<u64>,
    pub tool_name: String,
    pub tool_version: String,
    pub timeout: Option<Duration>,
}

impl DumpConfig {
    /// Defaults with an explicit tool identity for the generated preamble
    pub fn new(tool_name: impl Into<String>, tool_version: impl Into<String>) -> Self {
        Self {
            schema_only: DEFAULT_SCHEMA_ONLY.to_string(),
            exclude_tables: DEFAULT_EXCLUDE_TABLES.to_string(),
            tables: None,
            insert_count: DEFAULT_INSERT_COUNT,
            max_rows: None,
            tool_name: tool_name.into(),
            tool_version: tool_version.into(),
            timeout: None,
        }
    }

    pub fn validate(&self) -> Result<(), DumpError> {
        if self.insert_count == 0 {
            return Err(DumpError::Config(
                "insert-count must be a positive integer".to_string(),
            ));
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(DumpError::Config(
                "timeout must be greater than zero seconds".to_string(),
            ));
        }
        if self.tool_name.trim().is_empty() {
            return Err(DumpError::Config("tool name cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Compile the table patterns
    pub fn filters(&self) -> Result<DumpFilterSet, DumpError> {
        DumpFilterSet::new(
            &self.schema_only,
            &self.exclude_tables,
            self.tables.as_deref(),
        )
        .map_err(|e| DumpError::Config(format!("{:#}", e)))
    }
}

#[derive(Debug, Deserialize)]
struct DumpConfigFile {
    #[serde(default)]
    dump: DumpSettings,
}

/// Optional settings from a config file or the command line
///
/// Unset fields fall through to the next layer; see [`DumpSettings::overlay`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DumpSettings {
    pub schema_only: Option<String>,
    pub exclude_tables: Option<String>,
    pub tables: Option<String>,
    pub insert_count: Option<usize>,
    pub max_rows: Option<u64>,
    pub tool_name: Option<String>,
    pub tool_version: Option<String>,
    pub timeout_secs: Option<u64>,
    pub output: Option<String>,
}

impl DumpSettings {
    /// Layer `overrides` on top of `self`; set fields in `overrides` win
    pub fn overlay(self, overrides: DumpSettings) -> DumpSettings {
        DumpSettings {
            schema_only: overrides.schema_only.or(self.schema_only),
            exclude_tables: overrides.exclude_tables.or(self.exclude_tables),
            tables: overrides.tables.or(self.tables),
            insert_count: overrides.insert_count.or(self.insert_count),
            max_rows: overrides.max_rows.or(self.max_rows),
            tool_name: overrides.tool_name.or(self.tool_name),
            tool_version: overrides.tool_version.or(self.tool_version),
            timeout_secs: overrides.timeout_secs.or(self.timeout_secs),
            output: overrides.output.or(self.output),
        }
    }

    /// Resolve into a full config, filling gaps from the built-in defaults
    pub fn into_config(self, default_tool_name: &str, default_tool_version: &str) -> DumpConfig {
        let mut config = DumpConfig::new(
            self.tool_name.unwrap_or_else(|| default_tool_name.to_string()),
            self.tool_version
                .unwrap_or_else(|| default_tool_version.to_string()),
        );
        if let Some(schema_only) = self.schema_only {
            config.schema_only = schema_only;
        }
        if let Some(exclude_tables) = self.exclude_tables {
            config.exclude_tables = exclude_tables;
        }
        if let Some(insert_count) = self.insert_count {
            config.insert_count = insert_count;
        }
        config.tables = self.tables;
        config.max_rows = self.max_rows;
        config.timeout = self.timeout_secs.map(Duration::from_secs);
        config
    }
}

/// Read the `[dump]` table of a TOML config file
pub fn load_dump_config_from_file(path: &str) -> Result<DumpSettings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path))?;
    let parsed: DumpConfigFile =
        toml::from_str(&raw).with_context(|| format!("Failed to parse TOML config at {}", path))?;

    tracing::debug!("Loaded dump settings from {}", path);

    Ok(parsed.dump)
}
