// ABOUTME: Integration tests for dumping a live MySQL schema
// ABOUTME: Requires TEST_MYSQL_URL pointing at a scratch database; run with --ignored

use mysql_async::prelude::*;
use seren_db_dump::schema::{connect_inspector, IndexKind, PortableType, SchemaInspector};
use seren_db_dump::{DiagnosticKind, DumpConfig, Dumper, TableOutcome};
use std::env;

/// Helper to get test MySQL source URL from environment
fn get_test_mysql_url() -> Option<String> {
    env::var("TEST_MYSQL_URL").ok()
}

async fn create_test_tables(mysql_url: &str) -> anyhow::Result<()> {
    let mut conn = seren_db_dump::mysql::connect_mysql(mysql_url).await?;

    for table in ["router", "foo", "files"] {
        conn.query_drop(format!("DROP TABLE IF EXISTS {}", table))
            .await?;
    }

    conn.query_drop(
        "
        CREATE TABLE router (
            name VARCHAR(255) NOT NULL DEFAULT '' COMMENT 'Machine name of this route',
            path VARCHAR(255) NOT NULL DEFAULT '',
            pattern_outline VARCHAR(255) NOT NULL DEFAULT '',
            fit INT NOT NULL DEFAULT 0,
            route LONGBLOB,
            number_parts SMALLINT NOT NULL DEFAULT 0,
            PRIMARY KEY (name),
            KEY pattern_outline_parts (pattern_outline, number_parts)
        ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_general_ci COMMENT='Maps paths to various callbacks'
    ",
    )
    .await?;

    conn.exec_batch(
        "INSERT INTO router (name, path, pattern_outline, fit, number_parts) VALUES (?, ?, ?, ?, ?)",
        vec![
            ("test", "test", "test", 1, 1),
            ("user.login", "/user/login", "/user/login", 3, 2),
            ("user.page", "/user", "/user", 1, 1),
        ],
    )
    .await?;

    conn.query_drop(
        "
        CREATE TABLE files (
            fid INT UNSIGNED NOT NULL AUTO_INCREMENT,
            uri VARCHAR(255) NOT NULL,
            body TEXT,
            size BIGINT UNSIGNED NOT NULL DEFAULT 0,
            price DECIMAL(10, 2) DEFAULT NULL,
            PRIMARY KEY (fid),
            UNIQUE KEY uri (uri),
            FULLTEXT KEY body (body)
        ) ENGINE=InnoDB
    ",
    )
    .await?;

    conn.query_drop("CREATE TABLE foo (test YEAR NOT NULL)")
        .await?;
    conn.query_drop("INSERT INTO foo VALUES (2024)").await?;

    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_mysql_describe_router() {
    let url = get_test_mysql_url().expect("TEST_MYSQL_URL must be set");
    create_test_tables(&url).await.unwrap();

    let mut inspector = connect_inspector(&url).await.unwrap();
    let tables = inspector.list_tables().await.unwrap();
    assert!(tables.contains(&"router".to_string()));

    let router = inspector.describe_table("router").await.unwrap();
    assert_eq!(router.primary_key, vec!["name"]);
    assert_eq!(router.indexes[0].name, "pattern_outline_parts");
    assert_eq!(router.indexes[0].columns, vec!["pattern_outline", "number_parts"]);
    assert_eq!(
        router.storage.get("mysql_engine").map(String::as_str),
        Some("InnoDB")
    );
    assert_eq!(
        router.storage.get("mysql_character_set").map(String::as_str),
        Some("utf8mb4")
    );
    assert_eq!(router.comment.as_deref(), Some("Maps paths to various callbacks"));
    assert_eq!(
        router.column("name").unwrap().comment.as_deref(),
        Some("Machine name of this route")
    );

    let files = inspector.describe_table("files").await.unwrap();
    assert!(files.column("fid").unwrap().auto_increment);
    assert!(files
        .indexes
        .iter()
        .any(|i| i.name == "uri" && i.kind == IndexKind::Unique));
    assert!(files
        .indexes
        .iter()
        .any(|i| i.name == "body" && i.kind == IndexKind::Fulltext));
    assert_eq!(
        files.column("price").unwrap().portable,
        PortableType::Numeric {
            precision: Some(10),
            scale: Some(2)
        }
    );

    assert!(inspector.describe_table("no_such_table").await.is_err());
}

#[tokio::test]
#[ignore]
async fn test_mysql_dump_router_scenarios() {
    let url = get_test_mysql_url().expect("TEST_MYSQL_URL must be set");
    create_test_tables(&url).await.unwrap();

    let config = DumpConfig::new("seren-db-dump", "3.0.0");
    let mut dumper = Dumper::new(connect_inspector(&url).await.unwrap(), &config).unwrap();
    let mut out = Vec::new();
    let report = dumper.run(&mut out).await.unwrap();
    let output = String::from_utf8(out).unwrap();

    assert!(output.contains("createTable('router"));
    assert!(output.contains("'name' => 'test"));
    assert!(output.contains("'mysql_engine' => 'InnoDB',"));
    assert!(output.contains("// Native type 'year' has no portable equivalent; dumped as text."));
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::UnrecognizedType && d.table == "foo"));

    let mut config = DumpConfig::new("seren-db-dump", "3.0.0");
    config.schema_only = "rout.*".into();
    let mut dumper = Dumper::new(connect_inspector(&url).await.unwrap(), &config).unwrap();
    let mut out = Vec::new();
    let report = dumper.run(&mut out).await.unwrap();
    let output = String::from_utf8(out).unwrap();

    assert!(output.contains("createTable('router"));
    assert!(!output.contains("insert('router"));
    assert_eq!(report.outcome("router"), Some(TableOutcome::SchemaOnly));

    let mut config = DumpConfig::new("seren-db-dump", "3.0.0");
    config.insert_count = 1;
    let mut dumper = Dumper::new(connect_inspector(&url).await.unwrap(), &config).unwrap();
    let mut out = Vec::new();
    dumper.run(&mut out).await.unwrap();
    let output = String::from_utf8(out).unwrap();

    assert_eq!(output.matches("insert('router").count(), 3);
}
