//! CLI runner - executes commands

use crate::catalog::{load_catalog, CatalogParser, ParsedCatalog};
use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::{DestinationType, TyperDeduperConfig};
use crate::destination::{DestinationDriver, DuckDbDestination, RawRecord};
use crate::dialect::{DuckDbDialect, SqlDialect};
use crate::differ::SchemaDiff;
use crate::engine::TyperDeduper;
use crate::error::{Error, Result};
use crate::naming::COLUMN_EXTRACTED_AT;
use crate::sql::SqlGenerator;
use crate::typing::TypingSource;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::fs;
use std::sync::Arc;
use tracing::info;

/// CLI runner
pub struct Runner {
    cli: Cli,
    config: TyperDeduperConfig,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli, config: TyperDeduperConfig) -> Self {
        Self { cli, config }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Plan => self.plan().await,
            Commands::Generate {
                stream,
                full_history,
            } => self.generate(stream, *full_history),
            Commands::LoadRaw { stream, input } => self.load_raw(stream, input).await,
            Commands::Run => self.run_sync().await,
            Commands::Dump { stream, raw } => self.dump(stream, *raw).await,
        }
    }

    /// Parse and validate the configured catalog
    fn parse_catalog(&self, dialect: &dyn SqlDialect) -> Result<ParsedCatalog> {
        let path = self
            .cli
            .catalog
            .as_ref()
            .ok_or_else(|| Error::config("Catalog file not specified (use --catalog)"))?;
        let catalog = load_catalog(path)?;
        CatalogParser::new(self.config.resolver(dialect)).parse(&catalog)
    }

    fn open_destination(&self) -> Result<Arc<DuckDbDestination>> {
        let destination = match self.config.destination.destination_type {
            DestinationType::Duckdb => match &self.config.destination.path {
                Some(path) => DuckDbDestination::open(path, &self.config.raw_namespace)?,
                None => DuckDbDestination::open_in_memory(&self.config.raw_namespace)?,
            },
        };
        Ok(Arc::new(
            destination
                .with_retry_policy(self.config.retry_policy())
                .with_max_connections(self.config.max_connections),
        ))
    }

    fn engine(&self) -> Result<(Arc<DuckDbDestination>, TyperDeduper<DuckDbDestination>)> {
        let destination = self.open_destination()?;
        let catalog = self.parse_catalog(destination.dialect().as_ref())?;
        let engine = TyperDeduper::new(destination.clone(), catalog)
            .with_options(self.config.engine_options());
        Ok((destination, engine))
    }

    /// Show every stream's DDL plan
    async fn plan(&self) -> Result<()> {
        let (_, engine) = self.engine()?;

        for planned in engine.plan_all().await? {
            let (diff, reason) = match &planned.diff {
                SchemaDiff::Absent => ("absent", None),
                SchemaDiff::Additive(columns) if columns.is_empty() => ("unchanged", None),
                SchemaDiff::Additive(_) => ("additive", None),
                SchemaDiff::Incompatible(reason) => ("incompatible", Some(reason.clone())),
            };
            self.output_message(&json!({
                "stream": planned.stream,
                "table": planned.table,
                "diff": diff,
                "reason": reason,
                "plan": planned.plan.to_string(),
            }));
        }
        Ok(())
    }

    /// Print the typing SQL for one stream
    fn generate(&self, stream: &str, full_history: bool) -> Result<()> {
        let dialect: Arc<dyn SqlDialect> = Arc::new(DuckDbDialect::new());
        let catalog = self.parse_catalog(dialect.as_ref())?;
        let config = catalog.find(stream)?;

        let source = if full_history {
            TypingSource::FullHistory
        } else {
            TypingSource::unprocessed()
        };
        let sql = SqlGenerator::new(dialect).typing_operation(config, source, "");
        println!("{sql}");
        Ok(())
    }

    /// Append JSONL records to a raw table
    async fn load_raw(&self, stream: &str, input: &std::path::Path) -> Result<()> {
        use crate::error::ResultExt;

        let destination = self.open_destination()?;
        let catalog = self.parse_catalog(destination.dialect().as_ref())?;
        let config = catalog.find(stream)?;

        let content = fs::read_to_string(input).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound {
                    path: input.display().to_string(),
                }
            } else {
                Error::Io(e)
            }
        })?;

        let now = Utc::now();
        let records = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                parse_raw_line(line, now)
                    .with_context(|| format!("{}:{}", input.display(), i + 1))
            })
            .collect::<Result<Vec<_>>>()?;

        let count = destination.insert_raw_records(config.id(), records).await?;
        info!("Loaded {} records into {}", count, config.id().raw_table());

        self.output_message(&json!({
            "stream": config.id().to_string(),
            "table": config.id().raw_table().to_string(),
            "records": count,
        }));
        Ok(())
    }

    /// Prepare, type and dedupe, commit
    async fn run_sync(&self) -> Result<()> {
        let (_, engine) = self.engine()?;
        let stats = engine.run().await?;
        self.output_message(&serde_json::to_value(&stats)?);
        Ok(())
    }

    /// Print final or raw rows
    async fn dump(&self, stream: &str, raw: bool) -> Result<()> {
        let destination = self.open_destination()?;
        let catalog = self.parse_catalog(destination.dialect().as_ref())?;
        let id = catalog.find(stream)?.id();

        let table = if raw { id.raw_table() } else { id.final_table("") };
        for row in destination.dump_table(&table).await? {
            self.output_message(&Value::Object(row));
        }
        Ok(())
    }

    /// Output a JSON message
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

/// Parse one JSONL line into a raw record
///
/// An `_airbyte_extracted_at` field (RFC 3339 string or epoch milliseconds)
/// sets the extraction time and is removed from the data; otherwise
/// `default_extracted_at` is used.
pub fn parse_raw_line(
    line: &str,
    default_extracted_at: DateTime<Utc>,
) -> anyhow::Result<RawRecord> {
    use anyhow::Context;

    let value: Value = serde_json::from_str(line).context("invalid JSON")?;
    let Value::Object(mut data) = value else {
        anyhow::bail!("record is not a JSON object");
    };

    let extracted_at = match data.remove(COLUMN_EXTRACTED_AT) {
        None | Some(Value::Null) => default_extracted_at,
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(&s)
            .with_context(|| format!("invalid {COLUMN_EXTRACTED_AT} '{s}'"))?
            .with_timezone(&Utc),
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .with_context(|| format!("invalid {COLUMN_EXTRACTED_AT} {n}"))?,
        Some(other) => anyhow::bail!("invalid {COLUMN_EXTRACTED_AT} {other}"),
    };

    Ok(RawRecord::new(Value::Object(data), extracted_at))
}
