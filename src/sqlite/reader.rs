// ABOUTME: SQLite schema introspection and row streaming for dumps
// ABOUTME: Reads sqlite_master and PRAGMA metadata into portable table descriptors

use crate::schema::inspector::RowSink;
use crate::schema::{
    normalize_default, ColumnDescriptor, Engine, IndexDescriptor, IndexKind, NativeType,
    PortableType, ReadPlan, SchemaInspector, TableDescriptor, Value,
};
use crate::utils::{build_select, quote_ident};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OptionalExtension};

/// Inspector over a single SQLite connection
pub struct SqliteInspector {
    conn: Connection,
}

impl SqliteInspector {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Open a SQLite file read-only, see [`crate::sqlite::open_sqlite`]
    pub fn open(path: &str) -> Result<Self> {
        Ok(Self::new(super::open_sqlite(path)?))
    }

    /// List user tables, excluding `sqlite_*` internals, sorted by name
    pub fn table_names(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type='table' \
                 AND name NOT LIKE 'sqlite_%' \
                 ORDER BY name",
            )
            .context("Failed to prepare statement to list tables")?;

        let tables = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .context("Failed to query table list")?
            .collect::<Result<Vec<String>, _>>()
            .context("Failed to collect table names")?;

        tracing::info!("Found {} user tables in SQLite database", tables.len());

        Ok(tables)
    }

    pub fn describe(&self, table: &str) -> Result<TableDescriptor> {
        let create_sql: Option<String> = self
            .conn
            .query_row(
                "SELECT sql FROM sqlite_master WHERE type='table' AND name = ?1",
                [table],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("Failed to look up table '{}'", table))?;
        let Some(create_sql) = create_sql else {
            bail!("Table '{}' does not exist", table);
        };
        let has_autoincrement = create_sql.to_uppercase().contains("AUTOINCREMENT");

        let mut descriptor = TableDescriptor::new(table);
        let mut pk_positions: Vec<(i64, String)> = Vec::new();

        let pragma = format!("PRAGMA table_info({})", quote_ident(Engine::Sqlite, table));
        let mut stmt = self
            .conn
            .prepare(&pragma)
            .with_context(|| format!("Failed to read column info for '{}'", table))?;
        let columns = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, bool>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })
            .with_context(|| format!("Failed to query columns of '{}'", table))?
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to collect columns of '{}'", table))?;

        if columns.is_empty() {
            bail!("Table '{}' reported no columns", table);
        }

        for (name, declared, not_null, default, pk) in columns {
            let native = NativeType::parse(declared.as_deref().unwrap_or(""));
            let mut column = ColumnDescriptor::from_native(&name, &native, !not_null);
            column.default = normalize_default(default.as_deref(), &column.portable);
            if pk > 0 {
                pk_positions.push((pk, name.clone()));
            }
            descriptor.columns.push(column);
        }

        pk_positions.sort();
        descriptor.primary_key = pk_positions.into_iter().map(|(_, name)| name).collect();

        // Only INTEGER PRIMARY KEY AUTOINCREMENT is a true serial column in SQLite
        if let [pk] = descriptor.primary_key.as_slice() {
            let pk = pk.clone();
            if let Some(column) = descriptor.columns.iter_mut().find(|c| c.name == pk) {
                if has_autoincrement && column.native_type == "integer" {
                    column.auto_increment = true;
                }
            }
        }

        descriptor.indexes = self.indexes(table)?;

        tracing::debug!(
            "Described SQLite table '{}': {} columns, {} indexes",
            table,
            descriptor.columns.len(),
            descriptor.indexes.len()
        );

        Ok(descriptor)
    }

    fn indexes(&self, table: &str) -> Result<Vec<IndexDescriptor>> {
        let pragma = format!("PRAGMA index_list({})", quote_ident(Engine::Sqlite, table));
        let mut stmt = self
            .conn
            .prepare(&pragma)
            .with_context(|| format!("Failed to list indexes of '{}'", table))?;
        let listed = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(1)?,
                    row.get::<_, bool>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to collect indexes of '{}'", table))?;

        let mut indexes = Vec::new();
        for (name, unique, origin) in listed {
            // The primary key is carried separately on the descriptor
            if origin == "pk" {
                continue;
            }
            let pragma = format!("PRAGMA index_info({})", quote_ident(Engine::Sqlite, &name));
            let mut info = self.conn.prepare(&pragma)?;
            let columns = info
                .query_map([], |row| row.get::<_, Option<String>>(2))?
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("Failed to read columns of index '{}'", name))?;
            let columns: Vec<String> = columns.into_iter().flatten().collect();
            if columns.is_empty() {
                tracing::debug!("Skipping expression index '{}' on '{}'", name, table);
                continue;
            }

            indexes.push(IndexDescriptor {
                name,
                kind: if unique {
                    IndexKind::Unique
                } else {
                    IndexKind::Index
                },
                columns,
            });
        }

        indexes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(indexes)
    }

    pub fn stream_rows(
        &self,
        table: &TableDescriptor,
        plan: &ReadPlan,
        sink: &mut RowSink<'_>,
    ) -> Result<u64> {
        let select_list = table
            .columns
            .iter()
            .map(|c| quote_ident(Engine::Sqlite, &c.name))
            .collect::<Vec<_>>()
            .join(", ");

        let mut query = build_select(
            Engine::Sqlite,
            &select_list,
            &table.name,
            &plan.order_by,
            None,
        );
        if plan.order_by.is_empty() {
            query.push_str(" ORDER BY rowid");
        }
        if let Some(limit) = plan.limit {
            query.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = self
            .conn
            .prepare(&query)
            .with_context(|| format!("Failed to prepare row query for '{}'", table.name))?;
        let mut rows = stmt
            .query([])
            .with_context(|| format!("Failed to query rows from '{}'", table.name))?;

        let mut count = 0u64;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(table.columns.len());
            for (idx, column) in table.columns.iter().enumerate() {
                values.push(convert_value(row.get_ref(idx)?, column));
            }
            sink(values)?;
            count += 1;
        }

        tracing::debug!("Read {} rows from SQLite table '{}'", count, table.name);

        Ok(count)
    }
}

#[async_trait]
impl SchemaInspector for SqliteInspector {
    fn engine(&self) -> Engine {
        Engine::Sqlite
    }

    async fn list_tables(&mut self) -> Result<Vec<String>> {
        self.table_names()
    }

    async fn describe_table(&mut self, table: &str) -> Result<TableDescriptor> {
        self.describe(table)
    }

    async fn read_rows(
        &mut self,
        table: &TableDescriptor,
        plan: &ReadPlan,
        sink: &mut RowSink<'_>,
    ) -> Result<u64> {
        self.stream_rows(table, plan, sink)
    }
}

fn convert_value(raw: ValueRef<'_>, column: &ColumnDescriptor) -> Value {
    match raw {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) if column.portable == PortableType::Boolean => Value::Bool(i != 0),
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) if column.is_binary() => Value::Bytes(bytes.to_vec()),
        // SQLite stores TEXT without validating its encoding
        ValueRef::Text(bytes) => match String::from_utf8(bytes.to_vec()) {
            Ok(text) => Value::Text(text),
            Err(err) => Value::Bytes(err.into_bytes()),
        },
        ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
    }
}
