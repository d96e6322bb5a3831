// ABOUTME: Table selection logic for dumps
// ABOUTME: Compiles schema-only, exclude and include patterns and classifies tables

use anyhow::{Context, Result};
use regex::Regex;

/// Tables whose rows are transient or session-bound by default
pub const DEFAULT_SCHEMA_ONLY: &str = "cache.*,sessions,watchdog";

/// Tables created by test runners; they are left out entirely by default
pub const DEFAULT_EXCLUDE_TABLES: &str = "test[0-9]+";

/// Token that clears the exclude list
pub const NO_EXCLUDES: &str = "none";

/// What a dump does with one table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableDisposition {
    /// Not dumped at all
    Excluded,
    /// Structure only, no rows
    SchemaOnly,
    /// Structure and rows
    Full,
}

/// Compiled table patterns for one dump
#[derive(Debug, Clone, Default)]
pub struct DumpFilterSet {
    schema_only: Vec<Regex>,
    exclude: Vec<Regex>,
    include: Option<Vec<Regex>>,
}

impl DumpFilterSet {
    /// Compile comma-separated pattern lists
    ///
    /// Each pattern is a regular expression matched against the whole table
    /// name. An exclude list of `none` means nothing is excluded.
    ///
    /// # Examples
    ///
    /// ```
    /// # use seren_db_dump::filters::{DumpFilterSet, TableDisposition};
    /// let filters = DumpFilterSet::new("rout.*", "none", None).unwrap();
    /// assert_eq!(filters.classify("router"), TableDisposition::SchemaOnly);
    /// assert_eq!(filters.classify("users"), TableDisposition::Full);
    /// ```
    pub fn new(schema_only: &str, exclude: &str, include: Option<&str>) -> Result<Self> {
        let exclude = if exclude.trim().eq_ignore_ascii_case(NO_EXCLUDES) {
            Vec::new()
        } else {
            compile_patterns(exclude).context("Invalid exclude-tables pattern")?
        };

        let include = match include {
            Some(list) if !list.trim().is_empty() => {
                Some(compile_patterns(list).context("Invalid tables pattern")?)
            }
            _ => None,
        };

        Ok(Self {
            schema_only: compile_patterns(schema_only).context("Invalid schema-only pattern")?,
            exclude,
            include,
        })
    }

    /// Filter set using the built-in schema-only and exclude defaults
    pub fn with_defaults() -> Result<Self> {
        Self::new(DEFAULT_SCHEMA_ONLY, DEFAULT_EXCLUDE_TABLES, None)
    }

    /// Classify a table; exclusion takes precedence over schema-only
    pub fn classify(&self, table: &str) -> TableDisposition {
        if let Some(ref include) = self.include {
            if !matches_any(include, table) {
                return TableDisposition::Excluded;
            }
        }

        if matches_any(&self.exclude, table) {
            return TableDisposition::Excluded;
        }

        if matches_any(&self.schema_only, table) {
            return TableDisposition::SchemaOnly;
        }

        TableDisposition::Full
    }

    pub fn is_empty(&self) -> bool {
        self.schema_only.is_empty() && self.exclude.is_empty() && self.include.is_none()
    }
}

fn matches_any(patterns: &[Regex], table: &str) -> bool {
    patterns.iter().any(|pattern| pattern.is_match(table))
}

fn compile_patterns(list: &str) -> Result<Vec<Regex>> {
    list.split(',')
        .map(str::trim)
        .filter(|pattern| !pattern.is_empty())
        .map(|pattern| {
            Regex::new(&format!("^(?:{})$", pattern))
                .with_context(|| format!("'{}' is not a valid regular expression", pattern))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_classify_well_known_tables() {
        let filters = DumpFilterSet::with_defaults().unwrap();

        assert_eq!(filters.classify("cache_bootstrap"), TableDisposition::SchemaOnly);
        assert_eq!(filters.classify("cache"), TableDisposition::SchemaOnly);
        assert_eq!(filters.classify("sessions"), TableDisposition::SchemaOnly);
        assert_eq!(filters.classify("watchdog"), TableDisposition::SchemaOnly);
        assert_eq!(filters.classify("test12345678"), TableDisposition::Excluded);
        assert_eq!(filters.classify("router"), TableDisposition::Full);
        assert_eq!(filters.classify("node"), TableDisposition::Full);
    }

    #[test]
    fn test_patterns_match_whole_name() {
        let filters = DumpFilterSet::new("router", "none", None).unwrap();

        assert_eq!(filters.classify("router"), TableDisposition::SchemaOnly);
        assert_eq!(filters.classify("router_old"), TableDisposition::Full);
        assert_eq!(filters.classify("old_router"), TableDisposition::Full);
    }

    #[test]
    fn test_wildcard_pattern() {
        let filters = DumpFilterSet::new("rout.*", "none", None).unwrap();
        assert_eq!(filters.classify("router"), TableDisposition::SchemaOnly);
        assert_eq!(filters.classify("routes"), TableDisposition::SchemaOnly);
        assert_eq!(filters.classify("node"), TableDisposition::Full);
    }

    #[test]
    fn test_exclude_wins_over_schema_only() {
        let filters = DumpFilterSet::new("router", "router", None).unwrap();
        assert_eq!(filters.classify("router"), TableDisposition::Excluded);
    }

    #[test]
    fn test_none_token_clears_excludes() {
        let filters = DumpFilterSet::new("", "none", None).unwrap();
        assert_eq!(filters.classify("test1"), TableDisposition::Full);
        assert!(filters.is_empty());

        let filters = DumpFilterSet::new("", "NONE", None).unwrap();
        assert_eq!(filters.classify("test1"), TableDisposition::Full);
    }

    #[test]
    fn test_include_list_limits_tables() {
        let filters = DumpFilterSet::new("sessions", "none", Some("router, sessions")).unwrap();

        assert_eq!(filters.classify("router"), TableDisposition::Full);
        assert_eq!(filters.classify("sessions"), TableDisposition::SchemaOnly);
        assert_eq!(filters.classify("node"), TableDisposition::Excluded);
    }

    #[test]
    fn test_empty_include_is_ignored() {
        let filters = DumpFilterSet::new("", "none", Some("  ")).unwrap();
        assert_eq!(filters.classify("node"), TableDisposition::Full);
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let err = DumpFilterSet::new("cache(", "none", None).unwrap_err();
        assert!(format!("{:#}", err).contains("schema-only"));

        assert!(DumpFilterSet::new("", "[a-", None).is_err());
    }
}
