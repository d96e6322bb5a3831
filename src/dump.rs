// ABOUTME: Orchestrates a dump: enumerate, filter, inspect, sample and emit each table
// ABOUTME: Tables are buffered and committed whole so cancellation never leaves partial statements

use crate::config::DumpConfig;
use crate::emitter::CodeEmitter;
use crate::error::{Diagnostic, DiagnosticKind, DumpError};
use crate::filters::{DumpFilterSet, TableDisposition};
use crate::sampler::RowSampler;
use crate::schema::SchemaInspector;
use crate::utils::sanitize_identifier;
use anyhow::Context;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::time::Instant;
use tokio::sync::watch;

/// Phase the orchestrator is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpState {
    Idle,
    Enumerating,
    Inspecting,
    Sampling,
    Emitting,
    Done,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableOutcome {
    /// Structure and rows were written
    Dumped { rows: u64, inserts: usize },
    /// Structure only
    SchemaOnly,
    /// Left out by the exclude or include patterns
    Excluded,
    /// Metadata or rows could not be read; nothing was written
    Skipped,
    /// The dump stopped while this table was in flight; nothing was written
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReport {
    pub name: String,
    pub outcome: TableOutcome,
}

/// Result of a dump that reached the end or was cancelled
#[derive(Debug, Clone, Default)]
pub struct DumpReport {
    pub tables: Vec<TableReport>,
    pub diagnostics: Vec<Diagnostic>,
    pub cancelled: bool,
    /// Hex SHA-256 of everything written to the output
    pub digest: String,
}

impl DumpReport {
    pub fn outcome(&self, table: &str) -> Option<TableOutcome> {
        self.tables
            .iter()
            .find(|report| report.name == table)
            .map(|report| report.outcome)
    }

    pub fn skipped(&self) -> impl Iterator<Item = &TableReport> {
        self.tables
            .iter()
            .filter(|report| report.outcome == TableOutcome::Skipped)
    }

    pub fn total_rows(&self) -> u64 {
        self.tables
            .iter()
            .map(|report| match report.outcome {
                TableOutcome::Dumped { rows, .. } => rows,
                _ => 0,
            })
            .sum()
    }
}

/// Bytes of rendered statements held in memory before a table spills to disk
pub const SPILL_THRESHOLD: usize = 8 * 1024 * 1024;

/// One table's statements, held back until the table is committed
///
/// Text accumulates in memory up to a threshold and then moves to an anonymous
/// temporary file, which is removed when the buffer is dropped.
struct TableBuffer {
    memory: String,
    spill: Option<File>,
    threshold: usize,
}

impl TableBuffer {
    fn new(header: String, threshold: usize) -> Self {
        Self {
            memory: header,
            spill: None,
            threshold,
        }
    }

    fn push(&mut self, text: &str) -> io::Result<()> {
        if let Some(file) = self.spill.as_mut() {
            return file.write_all(text.as_bytes());
        }

        self.memory.push_str(text);
        if self.memory.len() > self.threshold {
            let mut file = tempfile::tempfile()?;
            file.write_all(self.memory.as_bytes())?;
            self.memory = String::new();
            self.spill = Some(file);
        }
        Ok(())
    }

    fn is_spilled(&self) -> bool {
        self.spill.is_some()
    }

    /// Copy everything to `out`, feeding the same bytes to `hasher`
    fn commit<W>(self, out: &mut W, hasher: &mut Sha256) -> io::Result<()>
    where
        W: Write + ?Sized,
    {
        let Some(mut file) = self.spill else {
            out.write_all(self.memory.as_bytes())?;
            hasher.update(self.memory.as_bytes());
            return Ok(());
        };

        file.seek(SeekFrom::Start(0))?;
        let mut chunk = vec![0u8; 64 * 1024];
        loop {
            let read = file.read(&mut chunk)?;
            if read == 0 {
                return Ok(());
            }
            out.write_all(&chunk[..read])?;
            hasher.update(&chunk[..read]);
        }
    }
}

/// Drives one dump over an exclusively owned inspector
pub struct Dumper {
    inspector: Box<dyn SchemaInspector>,
    filters: DumpFilterSet,
    sampler: RowSampler,
    emitter: CodeEmitter,
    timeout: Option<std::time::Duration>,
    cancel: Option<watch::Receiver<bool>>,
    spill_threshold: usize,
    state: DumpState,
}

impl Dumper {
    /// Validate the configuration and prepare a dump; nothing is read yet
    pub fn new(inspector: Box<dyn SchemaInspector>, config: &DumpConfig) -> Result<Self, DumpError> {
        config.validate()?;
        let filters = config.filters()?;

        Ok(Self {
            inspector,
            filters,
            sampler: RowSampler::new(config.insert_count, config.max_rows),
            emitter: CodeEmitter::new(&config.tool_name, &config.tool_version),
            timeout: config.timeout,
            cancel: None,
            spill_threshold: SPILL_THRESHOLD,
            state: DumpState::Idle,
        })
    }

    /// Stop between tables once the receiver observes `true`
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn state(&self) -> DumpState {
        self.state
    }

    /// Write the full dump to `out`
    ///
    /// Only a failure to enumerate tables or to write output is returned as an
    /// error; per-table problems end up as diagnostics in the report.
    pub async fn run<W>(&mut self, out: &mut W) -> Result<DumpReport, DumpError>
    where
        W: Write + Send + ?Sized,
    {
        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        let mut report = DumpReport::default();
        let mut hasher = Sha256::new();

        self.state = DumpState::Enumerating;
        tracing::info!("Enumerating {} tables", self.inspector.engine());

        let mut tables = match self.inspector.list_tables().await {
            Ok(tables) => tables,
            Err(e) => {
                self.state = DumpState::Error;
                return Err(DumpError::connection(&e.context("Failed to enumerate tables")));
            }
        };
        tables.sort();
        tables.dedup();

        let preamble = self.emitter.preamble();
        out.write_all(preamble.as_bytes())?;
        hasher.update(preamble.as_bytes());

        for table in tables {
            let disposition = self.filters.classify(&table);
            if disposition == TableDisposition::Excluded {
                tracing::debug!("Excluding table '{}'", sanitize_identifier(&table));
                report.tables.push(TableReport {
                    name: table,
                    outcome: TableOutcome::Excluded,
                });
                continue;
            }

            if let Some(reason) = self.interruption(deadline) {
                self.cancel_table(&mut report, table, reason);
                break;
            }

            self.state = DumpState::Inspecting;
            let descriptor = match self.inspector.describe_table(&table).await {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    tracing::warn!(
                        "Skipping table '{}': {:#}",
                        sanitize_identifier(&table),
                        e
                    );
                    report.diagnostics.push(Diagnostic::new(
                        DiagnosticKind::Introspection,
                        &table,
                        format!("{:#}", e),
                    ));
                    report.tables.push(TableReport {
                        name: table,
                        outcome: TableOutcome::Skipped,
                    });
                    continue;
                }
            };

            for column in descriptor.fallback_columns() {
                tracing::warn!(
                    "Column '{}.{}' has unrecognized type '{}', dumping as text",
                    sanitize_identifier(&table),
                    sanitize_identifier(&column.name),
                    column.native_type
                );
                report.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::UnrecognizedType,
                        &table,
                        format!("native type '{}' mapped to text", column.native_type),
                    )
                    .with_column(&column.name),
                );
            }

            let mut buffer =
                TableBuffer::new(self.emitter.create_table(&descriptor), self.spill_threshold);

            let outcome = if disposition == TableDisposition::Full {
                self.state = DumpState::Sampling;
                let emitter = &self.emitter;
                let sampled = self
                    .sampler
                    .sample(self.inspector.as_mut(), &descriptor, |batch| {
                        buffer
                            .push(&emitter.insert(&batch))
                            .context("Failed to buffer insert statements")
                    })
                    .await;

                if buffer.is_spilled() {
                    tracing::debug!(
                        "Statements for '{}' spilled to a temporary file",
                        sanitize_identifier(&table)
                    );
                }

                match sampled {
                    Ok(summary) => TableOutcome::Dumped {
                        rows: summary.rows,
                        inserts: summary.batches,
                    },
                    Err(e) => {
                        tracing::warn!(
                            "Skipping table '{}', rows could not be read: {:#}",
                            sanitize_identifier(&table),
                            e
                        );
                        report.diagnostics.push(Diagnostic::new(
                            DiagnosticKind::Sampling,
                            &table,
                            format!("{:#}", e),
                        ));
                        report.tables.push(TableReport {
                            name: table,
                            outcome: TableOutcome::Skipped,
                        });
                        continue;
                    }
                }
            } else {
                TableOutcome::SchemaOnly
            };

            if let Some(reason) = self.interruption(deadline) {
                self.cancel_table(&mut report, table, reason);
                break;
            }

            self.state = DumpState::Emitting;
            buffer.commit(out, &mut hasher)?;

            match outcome {
                TableOutcome::Dumped { rows, inserts } => tracing::info!(
                    "Dumped table '{}' ({} rows, {} insert statements)",
                    sanitize_identifier(&table),
                    rows,
                    inserts
                ),
                _ => tracing::info!("Dumped structure of '{}'", sanitize_identifier(&table)),
            }

            report.tables.push(TableReport {
                name: table,
                outcome,
            });
        }

        out.flush()?;
        report.digest = format!("{:x}", hasher.finalize());
        self.state = DumpState::Done;

        if report.cancelled {
            tracing::warn!("Dump stopped early; output covers completed tables only");
        } else {
            tracing::info!(
                "Dump complete: {} table(s), {} row(s), {} diagnostic(s)",
                report.tables.len(),
                report.total_rows(),
                report.diagnostics.len()
            );
        }

        Ok(report)
    }

    fn interruption(&self, deadline: Option<Instant>) -> Option<&'static str> {
        if self.cancel.as_ref().is_some_and(|rx| *rx.borrow()) {
            return Some("cancelled by operator");
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Some("timeout elapsed");
        }
        None
    }

    fn cancel_table(&self, report: &mut DumpReport, table: String, reason: &str) {
        tracing::warn!(
            "Dump interrupted before committing '{}': {}",
            sanitize_identifier(&table),
            reason
        );
        report.cancelled = true;
        report
            .diagnostics
            .push(Diagnostic::new(DiagnosticKind::Cancelled, &table, reason));
        report.tables.push(TableReport {
            name: table,
            outcome: TableOutcome::Cancelled,
        });
    }
}
