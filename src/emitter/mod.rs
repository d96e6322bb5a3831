// ABOUTME: Renders table descriptors and row batches as a generated PHP dump script
// ABOUTME: Emits the file preamble, schema-builder createTable calls and batched inserts

pub mod php;

use crate::schema::{ColumnDescriptor, IndexKind, PortableType, RowBatch, Size, TableDescriptor};
use php::{PhpItem, PhpNode};

/// Code generator for one dump; output depends only on its inputs
#[derive(Debug, Clone)]
pub struct CodeEmitter {
    tool_name: String,
    tool_version: String,
}

impl CodeEmitter {
    pub fn new(tool_name: impl Into<String>, tool_version: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            tool_version: tool_version.into(),
        }
    }

    /// File header naming the generating tool and acquiring `$connection`
    pub fn preamble(&self) -> String {
        format!(
            "<?php\n\
             // phpcs:ignoreFile\n\
             /**\n \
             * @file\n \
             * A database agnostic dump for testing purposes.\n \
             *\n \
             * This file was generated by the {} {} db-tools script.\n \
             */\n\
             \n\
             use Drupal\\Core\\Database\\Database;\n\
             \n\
             $connection = Database::getConnection();\n",
            self.tool_name, self.tool_version
        )
    }

    /// One `createTable` call describing the whole table
    pub fn create_table(&self, table: &TableDescriptor) -> String {
        let mut spec = vec![PhpItem::Keyed(
            "fields".into(),
            PhpNode::Array(
                table
                    .columns
                    .iter()
                    .map(|column| PhpItem::Keyed(column.name.clone(), field_spec(column)))
                    .collect(),
            ),
        )];

        if !table.primary_key.is_empty() {
            spec.push(PhpItem::Keyed(
                "primary key".into(),
                PhpNode::string_list(table.primary_key.iter().map(String::as_str)),
            ));
        }

        for (key, kind) in [
            ("unique keys", IndexKind::Unique),
            ("indexes", IndexKind::Index),
            ("fulltext keys", IndexKind::Fulltext),
        ] {
            let items: Vec<PhpItem> = table
                .indexes
                .iter()
                .filter(|index| index.kind == kind)
                .map(|index| {
                    PhpItem::Keyed(
                        index.name.clone(),
                        PhpNode::string_list(index.columns.iter().map(String::as_str)),
                    )
                })
                .collect();
            if !items.is_empty() {
                spec.push(PhpItem::Keyed(key.into(), PhpNode::Array(items)));
            }
        }

        if let Some(ref comment) = table.comment {
            spec.push(PhpItem::Keyed(
                "description".into(),
                PhpNode::string(comment),
            ));
        }

        for (option, value) in &table.storage {
            spec.push(PhpItem::Keyed(option.clone(), PhpNode::string(value)));
        }

        format!(
            "\n$connection->schema()->createTable({}, {});\n",
            php::string_literal(&table.name),
            PhpNode::Array(spec).render()
        )
    }

    /// One insert statement carrying every row of the batch
    pub fn insert(&self, batch: &RowBatch) -> String {
        let mut out = format!(
            "\n$connection->insert({})\n->fields({})\n",
            php::string_literal(&batch.table),
            PhpNode::string_list(batch.columns.iter().map(String::as_str)).render()
        );

        for index in 0..batch.len() {
            let row = PhpNode::Array(
                batch
                    .row(index)
                    .map(|(column, value)| PhpItem::Keyed(column.to_string(), PhpNode::value(value)))
                    .collect(),
            );
            out.push_str("->values(");
            out.push_str(&row.render());
            out.push_str(")\n");
        }

        out.push_str("->execute();\n");
        out
    }
}

fn field_spec(column: &ColumnDescriptor) -> PhpNode {
    let mut items = Vec::new();

    if column.portable == PortableType::FallbackText {
        items.push(PhpItem::Comment(format!(
            "Native type '{}' has no portable equivalent; dumped as text.",
            column.native_type
        )));
    }

    let type_name = match column.portable {
        PortableType::Int { .. } if column.auto_increment => "serial",
        ref portable => portable.schema_name(),
    };
    items.push(PhpItem::Keyed("type".into(), PhpNode::string(type_name)));

    let size = match column.portable {
        PortableType::Int { size, .. }
        | PortableType::Float { size }
        | PortableType::Text { size }
        | PortableType::Blob { size } => Some(size),
        PortableType::FallbackText => Some(Size::Big),
        _ => None,
    };
    if let Some(size) = size.filter(|s| *s != Size::Normal) {
        items.push(PhpItem::Keyed("size".into(), PhpNode::string(size.as_str())));
    }

    match column.portable {
        PortableType::Int { unsigned: true, .. } => {
            items.push(PhpItem::Keyed("unsigned".into(), PhpNode::bool(true)));
        }
        PortableType::Char { length: Some(length) }
        | PortableType::Varchar { length: Some(length) } => {
            items.push(PhpItem::Keyed(
                "length".into(),
                PhpNode::Literal(length.to_string()),
            ));
        }
        PortableType::Numeric { precision, scale } => {
            if let Some(precision) = precision {
                items.push(PhpItem::Keyed(
                    "precision".into(),
                    PhpNode::Literal(precision.to_string()),
                ));
            }
            if let Some(scale) = scale {
                items.push(PhpItem::Keyed(
                    "scale".into(),
                    PhpNode::Literal(scale.to_string()),
                ));
            }
        }
        _ => {}
    }

    items.push(PhpItem::Keyed("not null".into(), PhpNode::bool(!column.nullable)));

    if let Some(ref default) = column.default {
        items.push(PhpItem::Keyed("default".into(), PhpNode::value(default)));
    }

    if let Some(ref comment) = column.comment {
        items.push(PhpItem::Keyed("description".into(), PhpNode::string(comment)));
    }

    PhpNode::Array(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{IndexDescriptor, NativeType, Value};

    fn router() -> TableDescriptor {
        let mut table = TableDescriptor::new("router");
        let mut name = ColumnDescriptor::from_native("name", &NativeType::parse("varchar(255)"), false);
        name.default = Some(Value::Text(String::new()));
        table.columns.push(name);
        table.columns.push(ColumnDescriptor::from_native(
            "path",
            &NativeType::parse("varchar(255)"),
            false,
        ));
        table.columns.push(ColumnDescriptor::from_native(
            "fit",
            &NativeType::parse("int(11)"),
            false,
        ));
        table.primary_key = vec!["name".into()];
        table.indexes.push(IndexDescriptor {
            name: "pattern_outline_parts".into(),
            kind: IndexKind::Index,
            columns: vec!["path".into(), "fit".into()],
        });
        table
            .storage
            .insert("mysql_character_set".into(), "utf8mb4".into());
        table
    }

    #[test]
    fn test_preamble_identifies_tool() {
        let preamble = CodeEmitter::new("seren-db-dump", "3.0.0").preamble();

        assert!(preamble.starts_with("<?php\n// phpcs:ignoreFile\n"));
        assert!(preamble.contains(
            "This file was generated by the seren-db-dump 3.0.0 db-tools script."
        ));
        assert!(preamble.ends_with("$connection = Database::getConnection();\n"));
    }

    #[test]
    fn test_create_table_layout() {
        let output = CodeEmitter::new("t", "1").create_table(&router());

        let expected = "
$connection->schema()->createTable('router', [
  'fields' => [
    'name' => [
      'type' => 'varchar',
      'length' => 255,
      'not null' => TRUE,
      'default' => '',
    ],
    'path' => [
      'type' => 'varchar',
      'length' => 255,
      'not null' => TRUE,
    ],
    'fit' => [
      'type' => 'int',
      'not null' => TRUE,
    ],
  ],
  'primary key' => [
    'name',
  ],
  'indexes' => [
    'pattern_outline_parts' => [
      'path',
      'fit',
    ],
  ],
  'mysql_character_set' => 'utf8mb4',
]);
";
        assert_eq!(output, expected);
    }

    #[test]
    fn test_field_spec_variants() {
        let mut id = ColumnDescriptor::from_native("id", &NativeType::parse("int(10) unsigned"), false);
        id.auto_increment = true;
        let rendered = field_spec(&id).render();
        assert!(rendered.contains("'type' => 'serial'"));
        assert!(rendered.contains("'unsigned' => TRUE"));

        let price = ColumnDescriptor::from_native("price", &NativeType::parse("decimal(10,2)"), true);
        let rendered = field_spec(&price).render();
        assert!(rendered.contains("'type' => 'numeric'"));
        assert!(rendered.contains("'precision' => 10"));
        assert!(rendered.contains("'scale' => 2"));
        assert!(rendered.contains("'not null' => FALSE"));

        let data = ColumnDescriptor::from_native("data", &NativeType::parse("longblob"), true);
        let rendered = field_spec(&data).render();
        assert!(rendered.contains("'type' => 'blob'"));
        assert!(rendered.contains("'size' => 'big'"));
    }

    #[test]
    fn test_fallback_field_carries_caveat_comment() {
        let span = ColumnDescriptor::from_native("span", &NativeType::parse("interval"), false);
        let rendered = field_spec(&span).render();

        assert!(rendered.contains("// Native type 'interval' has no portable equivalent; dumped as text."));
        assert!(rendered.contains("'type' => 'text'"));
    }

    #[test]
    fn test_table_with_unique_fulltext_and_comment() {
        let mut table = TableDescriptor::new("files");
        table.columns.push(ColumnDescriptor::from_native(
            "uri",
            &NativeType::parse("varchar(255)"),
            false,
        ));
        table.indexes.push(IndexDescriptor {
            name: "uri".into(),
            kind: IndexKind::Unique,
            columns: vec!["uri".into()],
        });
        table.indexes.push(IndexDescriptor {
            name: "uri_text".into(),
            kind: IndexKind::Fulltext,
            columns: vec!["uri".into()],
        });
        table.comment = Some("Stores file metadata.".into());

        let output = CodeEmitter::new("t", "1").create_table(&table);
        assert!(output.contains("'unique keys' => [\n    'uri' => [\n      'uri',\n    ],\n  ],"));
        assert!(output.contains("'fulltext keys' => ["));
        assert!(output.contains("'description' => 'Stores file metadata.',"));
        assert!(!output.contains("'primary key'"));
    }

    #[test]
    fn test_insert_layout() {
        let mut batch = RowBatch::new("router", vec!["name".into(), "fit".into()]);
        batch.rows.push(vec![Value::Text("test".into()), Value::Int(1)]);
        batch.rows.push(vec![Value::Text("o'k".into()), Value::Null]);

        let output = CodeEmitter::new("t", "1").insert(&batch);
        let expected = "
$connection->insert('router')
->fields([
  'name',
  'fit',
])
->values([
  'name' => 'test',
  'fit' => 1,
])
->values([
  'name' => 'o\\'k',
  'fit' => NULL,
])
->execute();
";
        assert_eq!(output, expected);
    }
}
