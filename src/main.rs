// ABOUTME: CLI entry point for seren-db-dump
// ABOUTME: Parses flags, merges the config file and writes the dump to stdout or a file

use anyhow::Context;
use clap::Parser;
use seren_db_dump::{
    load_dump_config_from_file, schema::connect_inspector, DumpError, DumpSettings, Dumper,
};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "seren-db-dump")]
#[command(
    about = "Dump a database's schema and sample data as a portable PHP script",
    long_about = None
)]
struct Cli {
    /// Source database: mysql://..., postgresql://... or a SQLite file path
    #[arg(long)]
    source: String,
    /// Tables to dump without rows (comma-separated regular expressions)
    #[arg(long)]
    schema_only: Option<String>,
    /// Tables to leave out entirely (comma-separated regular expressions, or "none")
    #[arg(long)]
    exclude_tables: Option<String>,
    /// Only dump these tables (comma-separated regular expressions)
    #[arg(long)]
    tables: Option<String>,
    /// Maximum rows per insert statement
    #[arg(long)]
    insert_count: Option<usize>,
    /// Maximum rows read per table
    #[arg(long)]
    max_rows: Option<u64>,
    /// Stop between tables after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Tool name written into the generated file header
    #[arg(long)]
    tool_name: Option<String>,
    /// Tool version written into the generated file header
    #[arg(long)]
    tool_version: Option<String>,
    /// Write the dump here instead of stdout
    #[arg(short, long)]
    output: Option<String>,
    /// TOML file with a [dump] table of defaults
    #[arg(long)]
    config: Option<String>,
}

impl Cli {
    fn settings(&self) -> DumpSettings {
        DumpSettings {
            schema_only: self.schema_only.clone(),
            exclude_tables: self.exclude_tables.clone(),
            tables: self.tables.clone(),
            insert_count: self.insert_count,
            max_rows: self.max_rows,
            tool_name: self.tool_name.clone(),
            tool_version: self.tool_version.clone(),
            timeout_secs: self.timeout_secs,
            output: self.output.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only the dump
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let file_settings = match cli.config {
        Some(ref path) => load_dump_config_from_file(path)?,
        None => DumpSettings::default(),
    };
    let settings = file_settings.overlay(cli.settings());
    let output = settings.output.clone();
    let config = settings.into_config(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let inspector = connect_inspector(&cli.source)
        .await
        .map_err(|e| DumpError::connection(&e))?;
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let mut dumper = Dumper::new(inspector, &config)?.with_cancellation(cancel_rx);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current table");
            let _ = cancel_tx.send(true);
        }
    });

    let mut writer: Box<dyn Write + Send> = match output {
        Some(ref path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create output file {}", path))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    let report = dumper.run(&mut writer).await?;

    let skipped = report.skipped().count();
    if skipped > 0 {
        tracing::warn!("{} table(s) were skipped, see warnings above", skipped);
    }
    if let Some(ref path) = output {
        tracing::info!("Wrote dump to {} (sha256 {})", path, report.digest);
    }

    Ok(())
}
