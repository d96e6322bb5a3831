// ABOUTME: Error taxonomy for dump runs
// ABOUTME: Fatal DumpError variants plus the non-fatal diagnostics collected in a report

use std::fmt;
use thiserror::Error;

/// Failures that abort a dump
#[derive(Debug, Error)]
pub enum DumpError {
    /// The source could not be reached or its tables could not be enumerated
    #[error("connection error: {0}")]
    Connection(String),

    /// Invalid configuration, detected before any table is read
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The output writer failed
    #[error("failed to write dump output: {0}")]
    Io(#[from] std::io::Error),
}

impl DumpError {
    /// Wrap an anyhow chain as a connection failure, keeping every cause in the message
    pub fn connection(err: &anyhow::Error) -> Self {
        DumpError::Connection(format!("{:#}", err))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Table metadata could not be read; the table was skipped
    Introspection,
    /// Rows could not be read; the table was skipped
    Sampling,
    /// A column type had no portable mapping and was dumped as text
    UnrecognizedType,
    /// The dump stopped before this table was committed
    Cancelled,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::Introspection => "introspection",
            DiagnosticKind::Sampling => "sampling",
            DiagnosticKind::UnrecognizedType => "unrecognized-type",
            DiagnosticKind::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// A non-fatal problem recorded while dumping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub table: String,
    pub column: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, table: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            table: table.into(),
            column: None,
            message: message.into(),
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.column {
            Some(column) => write!(
                f,
                "[{}] {}.{}: {}",
                self.kind, self.table, column, self.message
            ),
            None => write!(f, "[{}] {}: {}", self.kind, self.table, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_connection_error_keeps_cause_chain() {
        let err = Err::<(), _>(anyhow::anyhow!("Connection refused"))
            .context("Failed to list tables")
            .unwrap_err();
        let dump_err = DumpError::connection(&err);
        let message = dump_err.to_string();
        assert!(message.contains("Failed to list tables"));
        assert!(message.contains("Connection refused"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: DumpError = io.into();
        assert!(matches!(err, DumpError::Io(_)));
    }

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic::new(DiagnosticKind::UnrecognizedType, "logs", "interval")
            .with_column("span");
        assert_eq!(diag.to_string(), "[unrecognized-type] logs.span: interval");
    }
}
