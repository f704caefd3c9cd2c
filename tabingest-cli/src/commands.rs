//! Command handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, bail};
use serde::Serialize;
use tabingest_core::sources::SqlDumpStrategy;
use tabingest_core::{
    FileSourceRegistry, JsonFileRowSink, NormalizedFrame, SourceKind, SourceRecord,
    SourceStrategy, SyncOrchestrator, create_strategy_from_config,
};
use tracing::{info, warn};

use crate::output::write_json;
use crate::{Cli, Command, DataArgs, DataFormat, RegisterArgs, SchemaArgs, SyncArgs};

/// Dispatches the parsed command.
///
/// # Errors
/// Returns error if the source cannot be read, output cannot be written, or
/// any requested sync fails.
pub async fn run(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Command::Schema(args) => schema(args).await,
        Command::Data(args) => data(args).await,
        Command::Register(args) => register(args).await,
        Command::Sync(args) => sync(args).await,
        Command::Kinds => {
            for kind in supported_kinds() {
                let status = if kind.available { "" } else { " (not compiled in)" };
                println!("{:<10} {}{}", kind.tag, kind.description, status);
            }
            Ok(())
        }
    }
}

async fn schema(args: &SchemaArgs) -> anyhow::Result<()> {
    let config = args.source.to_config();
    config.validate()?;
    info!("Reading schema from {}", config);

    let mut strategy = create_strategy_from_config(config)?;
    let schema = strategy.get_schema().await;
    release(strategy.as_mut()).await;
    let schema = schema?;

    for warning in &schema.warnings {
        warn!("{}", warning);
    }
    info!(
        "Found {} tables ({} rows)",
        schema.tables.len(),
        schema.total_rows()
    );
    write_json(&schema, args.output.as_deref()).await?;
    Ok(())
}

async fn data(args: &DataArgs) -> anyhow::Result<()> {
    let config = args.source.to_config();
    config.validate()?;
    info!("Reading data from {}", config);

    if args.per_table {
        if config.kind() != Some(SourceKind::SqlDump) {
            bail!("--per-table is only supported for sql sources");
        }
        let mut strategy = SqlDumpStrategy::new(config);
        let tables = strategy.all_table_data(args.limit).await?;
        let rendered: BTreeMap<String, serde_json::Value> = tables
            .into_iter()
            .map(|(name, frame)| Ok((name, render_frame(&frame, args.format)?)))
            .collect::<anyhow::Result<_>>()?;
        write_json(&rendered, args.output.as_deref()).await?;
        return Ok(());
    }

    let mut strategy = create_strategy_from_config(config)?;
    let frame = strategy.get_data(args.limit).await;
    release(strategy.as_mut()).await;
    let frame = frame?;

    info!("Read {} rows", frame.row_count());
    write_json(&render_frame(&frame, args.format)?, args.output.as_deref()).await?;
    Ok(())
}

fn render_frame(frame: &NormalizedFrame, format: DataFormat) -> anyhow::Result<serde_json::Value> {
    let value = match format {
        DataFormat::Records => serde_json::to_value(frame.to_records()),
        DataFormat::Frame => serde_json::to_value(frame),
    };
    value.context("Failed to render rows")
}

async fn release(strategy: &mut dyn SourceStrategy) {
    if let Err(e) = strategy.disconnect().await {
        warn!("Failed to release source: {}", e);
    }
}

async fn register(args: &RegisterArgs) -> anyhow::Result<()> {
    let config = args.source.to_config();
    config.validate()?;

    let registry = FileSourceRegistry::open(&args.registry)
        .await
        .with_context(|| format!("Failed to open registry {}", args.registry.display()))?;

    let name = args
        .name
        .clone()
        .unwrap_or_else(|| format!("source {}", args.id));
    registry
        .insert(SourceRecord::new(args.id, name, config).with_active(!args.inactive))
        .await?;

    info!(
        "Registered source {} in {}",
        args.id,
        registry.path().display()
    );
    Ok(())
}

async fn sync(args: &SyncArgs) -> anyhow::Result<()> {
    let config = args.sync_config();
    config.validate()?;

    let registry = FileSourceRegistry::open(&args.registry)
        .await
        .with_context(|| format!("Failed to open registry {}", args.registry.display()))?;
    let sink = JsonFileRowSink::new(&args.rows_dir);
    let orchestrator =
        SyncOrchestrator::new(Arc::new(registry), Arc::new(sink)).with_config(config);

    let outcomes = if args.source_ids.is_empty() {
        orchestrator.sync_all().await?
    } else {
        let mut outcomes = Vec::with_capacity(args.source_ids.len());
        for &id in &args.source_ids {
            outcomes.push(orchestrator.sync(id).await);
        }
        outcomes
    };

    write_json(&outcomes, args.output.as_deref()).await?;

    let failed = outcomes.iter().filter(|o| !o.success).count();
    if failed > 0 {
        bail!("{} of {} sources failed to sync", failed, outcomes.len());
    }
    info!("Synced {} sources into {}", outcomes.len(), args.rows_dir.display());
    Ok(())
}

/// One row of the `kinds` listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindInfo {
    /// Short name used on the command line
    pub tag: &'static str,
    /// Description, with compiled engines for relational sources
    pub description: String,
    /// Whether the driver is compiled in
    pub available: bool,
}

/// Source kinds and whether their drivers are compiled in.
pub fn supported_kinds() -> Vec<KindInfo> {
    SourceKind::ALL
        .iter()
        .map(|kind| {
            let (description, available) = match kind {
                SourceKind::Spreadsheet => (kind.to_string(), cfg!(feature = "spreadsheet")),
                SourceKind::RelationalConnection => (
                    format!("{} ({})", kind, compiled_engines().join(", ")),
                    !compiled_engines().is_empty(),
                ),
                _ => (kind.to_string(), true),
            };
            KindInfo {
                tag: kind.as_tag(),
                description,
                available,
            }
        })
        .collect()
}

fn compiled_engines() -> Vec<&'static str> {
    let mut engines = Vec::new();
    if cfg!(feature = "postgresql") {
        engines.push("postgresql");
    }
    if cfg!(feature = "mysql") {
        engines.push("mysql");
    }
    if cfg!(feature = "sqlite") {
        engines.push("sqlite");
    }
    engines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_kinds_cover_every_kind() {
        let kinds = supported_kinds();
        assert_eq!(kinds.len(), SourceKind::ALL.len());
        assert!(kinds.iter().any(|k| k.tag == "csv" && k.available));
        assert!(kinds.iter().any(|k| k.tag == "sql" && k.available));
    }

    #[test]
    fn test_render_frame_formats() {
        let mut frame = NormalizedFrame::new(vec!["a".to_string()]);
        frame.push_row(vec![serde_json::json!(1)]);

        assert_eq!(
            render_frame(&frame, DataFormat::Records).unwrap(),
            serde_json::json!([{"a": 1}])
        );
        assert_eq!(
            render_frame(&frame, DataFormat::Frame).unwrap(),
            serde_json::json!({"columns": ["a"], "rows": [[1]]})
        );
    }
}
