// ABOUTME: Library module for seren-db-dump
// ABOUTME: Exports the dump engine, engine inspectors and configuration for the binary and tests

pub mod config;
pub mod dump;
pub mod emitter;
pub mod error;
pub mod filters;
pub mod mysql;
pub mod postgres;
pub mod sampler;
pub mod schema;
pub mod sqlite;
pub mod utils;

pub use config::{load_dump_config_from_file, DumpConfig, DumpSettings};
pub use dump::{DumpReport, DumpState, Dumper, TableOutcome};
pub use error::{Diagnostic, DiagnosticKind, DumpError};
