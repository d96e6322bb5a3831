// ABOUTME: PostgreSQL schema introspection and row streaming for dumps
// ABOUTME: Reads information_schema and pg_catalog metadata for the connection's current schema

use crate::schema::inspector::RowSink;
use crate::schema::{
    normalize_default, ColumnDescriptor, Engine, IndexDescriptor, IndexKind, NativeType,
    PortableType, ReadPlan, SchemaInspector, TableDescriptor, Value,
};
use crate::utils::{build_select, quote_ident};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Client, Row};

/// Inspector over a PostgreSQL client bound to one schema
pub struct PostgresInspector {
    client: Client,
    schema: String,
}

impl PostgresInspector {
    pub fn new(client: Client, schema: impl Into<String>) -> Self {
        Self {
            client,
            schema: schema.into(),
        }
    }

    /// Connect (with retries) and dump the schema first on the search path
    pub async fn connect(url: &str) -> Result<Self> {
        let client = super::connect_with_retry(url).await?;

        let row = client
            .query_one("SELECT current_schema()::text", &[])
            .await
            .context("Failed to determine current schema")?;
        let schema: Option<String> = row.get(0);
        let schema = schema.unwrap_or_else(|| "public".to_string());

        tracing::info!("Inspecting PostgreSQL schema '{}'", schema);

        Ok(Self::new(client, schema))
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let rows = self
            .client
            .query(
                r#"
                SELECT c.column_name::text,
                       c.data_type::text,
                       c.udt_name::text,
                       c.character_maximum_length::int4,
                       c.numeric_precision::int4,
                       c.numeric_scale::int4,
                       c.is_nullable::text,
                       c.column_default::text,
                       c.is_identity::text,
                       col_description(
                           format('%I.%I', c.table_schema, c.table_name)::regclass,
                           c.ordinal_position::int4
                       )
                FROM information_schema.columns c
                WHERE c.table_schema::text = $1 AND c.table_name::text = $2
                ORDER BY c.ordinal_position
                "#,
                &[&self.schema, &table],
            )
            .await
            .with_context(|| format!("Failed to read columns of '{}'", table))?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.get(0);
            let data_type: String = row.get(1);
            let udt_name: String = row.get(2);
            let native = catalog_native_type(
                &data_type,
                &udt_name,
                row.get::<_, Option<i32>>(3),
                row.get::<_, Option<i32>>(4),
                row.get::<_, Option<i32>>(5),
            );

            let is_nullable: String = row.get(6);
            let default: Option<String> = row.get(7);
            let is_identity: Option<String> = row.get(8);

            let mut column = ColumnDescriptor::from_native(name, &native, is_nullable == "YES");
            column.auto_increment = is_identity.as_deref() == Some("YES")
                || default
                    .as_deref()
                    .is_some_and(|d| d.starts_with("nextval("));
            column.default = normalize_default(default.as_deref(), &column.portable);
            column.comment = row.get(9);
            columns.push(column);
        }

        Ok(columns)
    }

    async fn keys(&self, table: &str) -> Result<(Vec<String>, Vec<IndexDescriptor>)> {
        let rows = self
            .client
            .query(
                r#"
                SELECT i.relname::text, ix.indisprimary, ix.indisunique, a.attname::text
                FROM pg_index ix
                JOIN pg_class t ON t.oid = ix.indrelid
                JOIN pg_class i ON i.oid = ix.indexrelid
                JOIN pg_namespace n ON n.oid = t.relnamespace
                CROSS JOIN LATERAL unnest(ix.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord)
                JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum
                WHERE n.nspname::text = $1 AND t.relname::text = $2
                ORDER BY i.relname, k.ord
                "#,
                &[&self.schema, &table],
            )
            .await
            .with_context(|| format!("Failed to read indexes of '{}'", table))?;

        let mut primary_key = Vec::new();
        let mut indexes: Vec<IndexDescriptor> = Vec::new();
        for row in rows {
            let name: String = row.get(0);
            let is_primary: bool = row.get(1);
            let is_unique: bool = row.get(2);
            let column: String = row.get(3);

            if is_primary {
                primary_key.push(column);
                continue;
            }

            match indexes.last_mut() {
                Some(last) if last.name == name => last.columns.push(column),
                _ => indexes.push(IndexDescriptor {
                    name,
                    kind: if is_unique {
                        IndexKind::Unique
                    } else {
                        IndexKind::Index
                    },
                    columns: vec![column],
                }),
            }
        }

        Ok((primary_key, indexes))
    }
}

#[async_trait]
impl SchemaInspector for PostgresInspector {
    fn engine(&self) -> Engine {
        Engine::Postgres
    }

    async fn list_tables(&mut self) -> Result<Vec<String>> {
        let rows = self
            .client
            .query(
                "SELECT tablename::text FROM pg_tables WHERE schemaname::text = $1 ORDER BY tablename",
                &[&self.schema],
            )
            .await
            .with_context(|| format!("Failed to list tables in schema '{}'", self.schema))?;

        let tables: Vec<String> = rows.iter().map(|row| row.get(0)).collect();
        tracing::info!(
            "Found {} table(s) in schema '{}'",
            tables.len(),
            self.schema
        );

        Ok(tables)
    }

    async fn describe_table(&mut self, table: &str) -> Result<TableDescriptor> {
        let status = self
            .client
            .query_opt(
                r#"
                SELECT obj_description(c.oid, 'pg_class')
                FROM pg_class c
                JOIN pg_namespace n ON n.oid = c.relnamespace
                WHERE n.nspname::text = $1 AND c.relname::text = $2 AND c.relkind IN ('r', 'p')
                "#,
                &[&self.schema, &table],
            )
            .await
            .with_context(|| format!("Failed to look up table '{}'", table))?;

        let Some(status) = status else {
            bail!("Table '{}' does not exist", table);
        };

        let mut descriptor = TableDescriptor::new(table);
        descriptor.comment = status.get(0);
        descriptor.columns = self.columns(table).await?;

        let (primary_key, indexes) = self.keys(table).await?;
        descriptor.primary_key = primary_key;
        descriptor.indexes = indexes;

        tracing::debug!(
            "Described PostgreSQL table '{}': {} columns, {} indexes",
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
        let query = build_select(
            Engine::Postgres,
            &select_list(table),
            &table.name,
            &plan.order_by,
            plan.limit,
        );

        let params: Vec<&(dyn ToSql + Sync)> = Vec::new();
        let stream = self
            .client
            .query_raw(query.as_str(), params)
            .await
            .with_context(|| format!("Failed to query rows from '{}'", table.name))?;
        futures::pin_mut!(stream);

        let mut count = 0u64;
        while let Some(row) = stream
            .try_next()
            .await
            .with_context(|| format!("Failed to read row from '{}'", table.name))?
        {
            let mut values = Vec::with_capacity(table.columns.len());
            for (idx, column) in table.columns.iter().enumerate() {
                values.push(decode_cell(&row, idx, column).with_context(|| {
                    format!("Failed to decode '{}.{}'", table.name, column.name)
                })?);
            }
            sink(values)?;
            count += 1;
        }

        tracing::debug!("Read {} rows from PostgreSQL table '{}'", count, table.name);

        Ok(count)
    }
}

/// Rebuild the declared native type from information_schema columns
fn catalog_native_type(
    data_type: &str,
    udt_name: &str,
    length: Option<i32>,
    precision: Option<i32>,
    scale: Option<i32>,
) -> NativeType {
    let to_u32 = |v: Option<i32>| v.and_then(|v| u32::try_from(v).ok());

    match data_type {
        "USER-DEFINED" | "ARRAY" => NativeType::new(udt_name),
        "numeric" => NativeType::new(data_type).with_precision(to_u32(precision), to_u32(scale)),
        "character" | "character varying" | "bit" | "bit varying" => {
            NativeType::new(data_type).with_length(to_u32(length))
        }
        _ => NativeType::new(data_type),
    }
}

/// Columns with a native binary decoding are selected as-is; the rest go through `::text`
fn select_list(table: &TableDescriptor) -> String {
    table
        .columns
        .iter()
        .map(|column| {
            let ident = quote_ident(Engine::Postgres, &column.name);
            // Booleans go through text so bit(1) decodes the same way as boolean
            match column.portable {
                PortableType::Int { .. } | PortableType::Float { .. } | PortableType::Blob { .. } => {
                    ident
                }
                _ => format!("{}::text AS {}", ident, ident),
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn decode_cell(row: &Row, idx: usize, column: &ColumnDescriptor) -> Result<Value> {
    let ty = row.columns()[idx].type_().clone();

    let value = if ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx)?.map(Value::Bool)
    } else if ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)?
            .map(|v| Value::Int(i64::from(v)))
    } else if ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)?
            .map(|v| Value::Int(i64::from(v)))
    } else if ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)?.map(Value::Int)
    } else if ty == Type::OID {
        row.try_get::<_, Option<u32>>(idx)?
            .map(|v| Value::UInt(u64::from(v)))
    } else if ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)?
            .map(|v| Value::Float(f64::from(v)))
    } else if ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx)?.map(Value::Float)
    } else if ty == Type::BYTEA {
        row.try_get::<_, Option<Vec<u8>>>(idx)?.map(Value::Bytes)
    } else {
        row.try_get::<_, Option<String>>(idx)?
            .map(|text| Value::from_text(text, &column.portable))
    };

    Ok(value.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Size;

    #[test]
    fn test_catalog_native_type_keeps_parameters() {
        let varchar = catalog_native_type("character varying", "varchar", Some(255), None, None);
        assert_eq!(varchar.to_string(), "character varying(255)");
        assert_eq!(
            crate::schema::map_native_type(&varchar),
            PortableType::Varchar { length: Some(255) }
        );

        let numeric = catalog_native_type("numeric", "numeric", None, Some(10), Some(2));
        assert_eq!(numeric.to_string(), "numeric(10,2)");

        // information_schema reports a precision for integers too; it must not leak
        let int = catalog_native_type("integer", "int4", None, Some(32), Some(0));
        assert_eq!(int.to_string(), "integer");
    }

    #[test]
    fn test_catalog_native_type_uses_udt_for_user_defined() {
        let mood = catalog_native_type("USER-DEFINED", "mood", None, None, None);
        assert_eq!(mood.name, "mood");
        assert_eq!(
            crate::schema::map_native_type(&mood),
            PortableType::FallbackText
        );
    }

    #[test]
    fn test_select_list_casts_non_binary_columns_to_text() {
        let mut table = TableDescriptor::new("logs");
        table.columns.push(ColumnDescriptor::from_native(
            "id",
            &NativeType::new("integer"),
            false,
        ));
        table.columns.push(ColumnDescriptor::from_native(
            "span",
            &NativeType::new("interval"),
            true,
        ));
        assert_eq!(
            table.columns[0].portable,
            PortableType::Int {
                size: Size::Normal,
                unsigned: false
            }
        );

        assert_eq!(select_list(&table), "\"id\", \"span\"::text AS \"span\"");
    }

    #[test]
    fn test_select_list_reads_bit_and_boolean_as_text() {
        let mut table = TableDescriptor::new("flags");
        table.columns.push(ColumnDescriptor::from_native(
            "enabled",
            &NativeType::parse("bit(1)"),
            false,
        ));
        table.columns.push(ColumnDescriptor::from_native(
            "visible",
            &NativeType::new("boolean"),
            false,
        ));
        assert_eq!(table.columns[0].portable, PortableType::Boolean);

        assert_eq!(
            select_list(&table),
            "\"enabled\"::text AS \"enabled\", \"visible\"::text AS \"visible\""
        );
        assert_eq!(
            Value::from_text("1".into(), &table.columns[0].portable),
            Value::Bool(true)
        );
        assert_eq!(
            Value::from_text("false".into(), &table.columns[1].portable),
            Value::Bool(false)
        );
    }
}
