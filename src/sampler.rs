// ABOUTME: Reads a bounded, ordered sample of rows and chunks it into insert batches
// ABOUTME: Rows stream from the inspector; only the batch being filled is held in memory

use crate::schema::{ReadPlan, RowBatch, SchemaInspector, TableDescriptor, Value};
use anyhow::Result;

/// Splits a row stream into batches of at most `insert_count` rows
#[derive(Debug)]
pub struct BatchCollector {
    insert_count: usize,
    current: RowBatch,
}

impl BatchCollector {
    pub fn new(table: &TableDescriptor, insert_count: usize) -> Self {
        Self {
            insert_count: insert_count.max(1),
            current: RowBatch::new(table.name.clone(), table.column_names()),
        }
    }

    /// Add a row, returning the batch it completed if any
    pub fn push(&mut self, row: Vec<Value>) -> Option<RowBatch> {
        self.current.rows.push(row);
        if self.current.len() < self.insert_count {
            return None;
        }
        let next = RowBatch::new(self.current.table.clone(), self.current.columns.clone());
        Some(std::mem::replace(&mut self.current, next))
    }

    /// The trailing partial batch, if it holds any rows
    pub fn finish(self) -> Option<RowBatch> {
        if self.current.is_empty() {
            None
        } else {
            Some(self.current)
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleSummary {
    pub rows: u64,
    pub batches: usize,
}

/// Row sampling policy shared by every table of a dump
#[derive(Debug, Clone, Copy)]
pub struct RowSampler {
    insert_count: usize,
    max_rows: Option<u64>,
}

impl RowSampler {
    pub fn new(insert_count: usize, max_rows: Option<u64>) -> Self {
        Self {
            insert_count,
            max_rows,
        }
    }

    /// Primary key order when there is one, natural order otherwise
    pub fn plan(&self, table: &TableDescriptor) -> ReadPlan {
        ReadPlan {
            order_by: table.primary_key.clone(),
            limit: self.max_rows,
        }
    }

    /// Stream the table's sample, handing each completed batch to `on_batch`
    pub async fn sample<F>(
        &self,
        inspector: &mut dyn SchemaInspector,
        table: &TableDescriptor,
        mut on_batch: F,
    ) -> Result<SampleSummary>
    where
        F: FnMut(RowBatch) -> Result<()> + Send,
    {
        let plan = self.plan(table);
        let mut collector = BatchCollector::new(table, self.insert_count);
        let mut batches = 0usize;

        let rows = {
            let mut sink = |row: Vec<Value>| -> Result<()> {
                if let Some(batch) = collector.push(row) {
                    on_batch(batch)?;
                    batches += 1;
                }
                Ok(())
            };
            inspector.read_rows(table, &plan, &mut sink).await?
        };

        if let Some(batch) = collector.finish() {
            on_batch(batch)?;
            batches += 1;
        }

        tracing::debug!(
            "Sampled {} rows from '{}' into {} batch(es)",
            rows,
            table.name,
            batches
        );

        Ok(SampleSummary { rows, batches })
    }
}
