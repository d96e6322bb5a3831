// ABOUTME: Engine-polymorphic schema introspection and row reading capability
// ABOUTME: Selects the SQLite, MySQL or PostgreSQL inspector from the connection string

use super::{TableDescriptor, Value};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::fmt;

/// Database engine behind a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Sqlite,
    Mysql,
    Postgres,
}

impl Engine {
    /// Detect the engine from a connection string or file path
    ///
    /// # Examples
    ///
    /// ```
    /// # use seren_db_dump::schema::Engine;
    /// assert_eq!(Engine::detect("mysql://localhost/db").unwrap(), Engine::Mysql);
    /// assert_eq!(Engine::detect("postgresql://u@h/db").unwrap(), Engine::Postgres);
    /// assert_eq!(Engine::detect("site.sqlite").unwrap(), Engine::Sqlite);
    /// assert!(Engine::detect("mongodb://localhost").is_err());
    /// ```
    pub fn detect(source: &str) -> Result<Self> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            bail!("Source connection string cannot be empty");
        }
        if trimmed.starts_with("mysql://") {
            return Ok(Engine::Mysql);
        }
        if trimmed.starts_with("postgres://") || trimmed.starts_with("postgresql://") {
            return Ok(Engine::Postgres);
        }
        if let Some((scheme, _)) = trimmed.split_once("://") {
            bail!(
                "Unsupported source scheme '{}://'. \
                 Use mysql://, postgresql:// or a SQLite file path",
                scheme
            );
        }
        Ok(Engine::Sqlite)
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Engine::Sqlite => "sqlite",
            Engine::Mysql => "mysql",
            Engine::Postgres => "postgres",
        };
        f.write_str(name)
    }
}

/// How rows of a table are read: ordering and an optional row cap
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReadPlan {
    /// Columns to order by ascending; empty means natural order
    pub order_by: Vec<String>,
    pub limit: Option<u64>,
}

/// Callback receiving one row (values in column order) at a time
pub type RowSink<'a> = dyn FnMut(Vec<Value>) -> Result<()> + Send + 'a;

/// Introspection and read capability for one connected database
///
/// Implementations own their connection and are driven by a single dump at a time.
#[async_trait]
pub trait SchemaInspector: Send {
    fn engine(&self) -> Engine;

    /// User tables sorted by name
    async fn list_tables(&mut self) -> Result<Vec<String>>;

    /// Columns, keys, indexes and storage options of one table
    async fn describe_table(&mut self, table: &str) -> Result<TableDescriptor>;

    /// Stream the rows selected by `plan` into `sink`, returning how many were read
    async fn read_rows(
        &mut self,
        table: &TableDescriptor,
        plan: &ReadPlan,
        sink: &mut RowSink<'_>,
    ) -> Result<u64>;
}

/// Open a connection for `source` and wrap it in the matching inspector
pub async fn connect_inspector(source: &str) -> Result<Box<dyn SchemaInspector>> {
    let engine = Engine::detect(source)?;
    tracing::info!("Connecting to {} source", engine);

    let inspector: Box<dyn SchemaInspector> = match engine {
        Engine::Sqlite => Box::new(crate::sqlite::reader::SqliteInspector::open(source)?),
        Engine::Mysql => Box::new(crate::mysql::reader::MysqlInspector::connect(source).await?),
        Engine::Postgres => {
            Box::new(crate::postgres::reader::PostgresInspector::connect(source).await?)
        }
    };

    Ok(inspector)
}
