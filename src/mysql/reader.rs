// ABOUTME: MySQL schema introspection and row streaming for dumps
// ABOUTME: Reads INFORMATION_SCHEMA into portable descriptors, including engine and collation

use crate::schema::inspector::RowSink;
use crate::schema::{
    normalize_default, ColumnDescriptor, Engine, IndexDescriptor, IndexKind, NativeType,
    PortableType, ReadPlan, SchemaInspector, TableDescriptor, Value,
};
use crate::utils::{build_select, quote_ident};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use mysql_async::{prelude::*, Conn};

/// Inspector over a MySQL connection bound to one schema
pub struct MysqlInspector {
    conn: Conn,
    database: String,
}

type ColumnRow = (String, String, String, Option<String>, String, String);
type IndexRow = (String, i64, Option<String>, String);

impl MysqlInspector {
    pub fn new(conn: Conn, database: impl Into<String>) -> Self {
        Self {
            conn,
            database: database.into(),
        }
    }

    /// Connect using a `mysql://` URL, which must name the schema to dump
    pub async fn connect(url: &str) -> Result<Self> {
        let database = super::extract_database_name(url).with_context(|| {
            "MySQL connection string must include a database name (mysql://host/database)"
        })?;
        let conn = super::connect_mysql(url).await?;
        Ok(Self::new(conn, database))
    }

    async fn columns(&mut self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let rows: Vec<ColumnRow> = self
            .conn
            .exec(
                r#"
                SELECT COLUMN_NAME, COLUMN_TYPE, IS_NULLABLE, COLUMN_DEFAULT, EXTRA, COLUMN_COMMENT
                FROM INFORMATION_SCHEMA.COLUMNS
                WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
                ORDER BY ORDINAL_POSITION
                "#,
                (self.database.as_str(), table),
            )
            .await
            .with_context(|| format!("Failed to read columns of '{}'", table))?;

        let columns = rows
            .into_iter()
            .map(|(name, column_type, is_nullable, default, extra, comment)| {
                let native = NativeType::parse(&column_type);
                let mut column = ColumnDescriptor::from_native(name, &native, is_nullable == "YES");
                let extra = extra.to_lowercase();
                column.auto_increment = extra.contains("auto_increment");
                // DEFAULT_GENERATED marks an expression default (MySQL 8)
                if !extra.contains("default_generated") {
                    column.default = match default.as_deref() {
                        // COLUMN_DEFAULT reports DEFAULT '' as an empty, unquoted string
                        Some("") if !column.portable.is_numeric() => Some(Value::Text(String::new())),
                        raw => normalize_default(raw, &column.portable),
                    };
                }
                if !comment.is_empty() {
                    column.comment = Some(comment);
                }
                column
            })
            .collect::<Vec<_>>();

        Ok(columns)
    }

    async fn keys(&mut self, table: &str) -> Result<(Vec<String>, Vec<IndexDescriptor>)> {
        let rows: Vec<IndexRow> = self
            .conn
            .exec(
                r#"
                SELECT INDEX_NAME, NON_UNIQUE, COLUMN_NAME, INDEX_TYPE
                FROM INFORMATION_SCHEMA.STATISTICS
                WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
                ORDER BY INDEX_NAME, SEQ_IN_INDEX
                "#,
                (self.database.as_str(), table),
            )
            .await
            .with_context(|| format!("Failed to read indexes of '{}'", table))?;

        Ok(group_indexes(rows))
    }

    async fn storage(&mut self, table: &str, descriptor: &mut TableDescriptor) -> Result<()> {
        let status: Option<(Option<String>, Option<String>, Option<String>)> = self
            .conn
            .exec_first(
                r#"
                SELECT ENGINE, TABLE_COLLATION, TABLE_COMMENT
                FROM INFORMATION_SCHEMA.TABLES
                WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
                "#,
                (self.database.as_str(), table),
            )
            .await
            .with_context(|| format!("Failed to read table status of '{}'", table))?;

        let Some((engine, collation, comment)) = status else {
            bail!("Table '{}' does not exist", table);
        };

        if let Some(engine) = engine {
            descriptor.storage.insert("mysql_engine".into(), engine);
        }
        if let Some(collation) = collation {
            if let Some((charset, _)) = collation.split_once('_') {
                descriptor
                    .storage
                    .insert("mysql_character_set".into(), charset.to_string());
            }
            descriptor
                .storage
                .insert("mysql_collation".into(), collation);
        }
        descriptor.comment = comment.filter(|c| !c.is_empty());

        Ok(())
    }
}

#[async_trait]
impl SchemaInspector for MysqlInspector {
    fn engine(&self) -> Engine {
        Engine::Mysql
    }

    async fn list_tables(&mut self) -> Result<Vec<String>> {
        tracing::info!("Listing tables from MySQL database '{}'", self.database);

        let tables: Vec<String> = self
            .conn
            .exec(
                r#"
                SELECT TABLE_NAME
                FROM INFORMATION_SCHEMA.TABLES
                WHERE TABLE_SCHEMA = ?
                AND TABLE_TYPE = 'BASE TABLE'
                ORDER BY TABLE_NAME
                "#,
                (self.database.as_str(),),
            )
            .await
            .with_context(|| format!("Failed to list tables from database '{}'", self.database))?;

        tracing::info!(
            "Found {} table(s) in database '{}'",
            tables.len(),
            self.database
        );

        Ok(tables)
    }

    async fn describe_table(&mut self, table: &str) -> Result<TableDescriptor> {
        let mut descriptor = TableDescriptor::new(table);
        self.storage(table, &mut descriptor).await?;

        descriptor.columns = self.columns(table).await?;
        if descriptor.columns.is_empty() {
            bail!("Table '{}' reported no columns", table);
        }

        let (primary_key, indexes) = self.keys(table).await?;
        descriptor.primary_key = primary_key;
        descriptor.indexes = indexes;

        tracing::debug!(
            "Described MySQL table '{}': {} columns, {} indexes",
            table,
            descriptor.columns.len(),
            descriptor.indexes.len()
        );

        Ok(descriptor)
    }

    async fn read_rows(
        &mut self,
        table: &TableDescriptor,
        plan: &ReadPlan,
        sink: &mut RowSink<'_>,
    ) -> Result<u64> {
        let select_list = table
            .columns
            .iter()
            .map(|c| quote_ident(Engine::Mysql, &c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let query = build_select(
            Engine::Mysql,
            &select_list,
            &table.name,
            &plan.order_by,
            plan.limit,
        );

        let mut result = self
            .conn
            .query_iter(query)
            .await
            .with_context(|| format!("Failed to query rows from '{}'", table.name))?;

        let mut count = 0u64;
        while let Some(mut row) = result
            .next()
            .await
            .with_context(|| format!("Failed to read row from '{}'", table.name))?
        {
            let values: Vec<Value> = table
                .columns
                .iter()
                .enumerate()
                .map(|(idx, column)| {
                    let raw = row
                        .take::<mysql_async::Value, usize>(idx)
                        .unwrap_or(mysql_async::Value::NULL);
                    convert_value(raw, column)
                })
                .collect();
            sink(values)?;
            count += 1;
        }

        tracing::debug!("Read {} rows from MySQL table '{}'", count, table.name);

        Ok(count)
    }
}

/// Fold STATISTICS rows (one per index column) into a primary key and indexes
fn group_indexes(rows: Vec<IndexRow>) -> (Vec<String>, Vec<IndexDescriptor>) {
    let mut primary_key = Vec::new();
    let mut indexes: Vec<IndexDescriptor> = Vec::new();

    for (name, non_unique, column, index_type) in rows {
        // Functional index parts have no column name
        let Some(column) = column else {
            continue;
        };

        if name == "PRIMARY" {
            primary_key.push(column);
            continue;
        }

        match indexes.last_mut() {
            Some(last) if last.name == name => last.columns.push(column),
            _ => {
                let kind = if index_type.eq_ignore_ascii_case("FULLTEXT") {
                    IndexKind::Fulltext
                } else if non_unique == 0 {
                    IndexKind::Unique
                } else {
                    IndexKind::Index
                };
                indexes.push(IndexDescriptor {
                    name,
                    kind,
                    columns: vec![column],
                });
            }
        }
    }

    (primary_key, indexes)
}

fn convert_value(raw: mysql_async::Value, column: &ColumnDescriptor) -> Value {
    use mysql_async::Value as Raw;

    match raw {
        Raw::NULL => Value::Null,
        // bit(1) arrives as a single raw byte over the text protocol
        Raw::Bytes(bytes)
            if column.portable == PortableType::Boolean && matches!(bytes.as_slice(), [0] | [1]) =>
        {
            Value::Bool(bytes[0] == 1)
        }
        Raw::Bytes(bytes) if column.is_binary() => Value::Bytes(bytes),
        Raw::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => Value::from_text(text, &column.portable),
            Err(err) => Value::Bytes(err.into_bytes()),
        },
        Raw::Int(i) if column.portable == PortableType::Boolean => Value::Bool(i != 0),
        Raw::Int(i) => Value::Int(i),
        Raw::UInt(u) => Value::UInt(u),
        Raw::Float(f) => Value::Float(f as f64),
        Raw::Double(d) => Value::Float(d),
        Raw::Date(year, month, day, hour, minute, second, micros) => {
            let mut text = format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            );
            if micros > 0 {
                text.push_str(&format!(".{:06}", micros));
            }
            if column.portable == PortableType::Date {
                text.truncate(10);
            }
            Value::Text(text)
        }
        Raw::Time(negative, days, hours, minutes, seconds, micros) => {
            let total_hours = days * 24 + u32::from(hours);
            let mut text = format!(
                "{}{:02}:{:02}:{:02}",
                if negative { "-" } else { "" },
                total_hours,
                minutes,
                seconds
            );
            if micros > 0 {
                text.push_str(&format!(".{:06}", micros));
            }
            Value::Text(text)
        }
    }
}
