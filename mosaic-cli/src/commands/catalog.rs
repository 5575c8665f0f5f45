//! Aggregated catalog command.

use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use mosaic_models::providers::CatalogEntry;
use serde::Serialize;

use super::{Context, cancel_on_ctrl_c, print_json};

/// Catalog arguments.
#[derive(Args, Debug)]
pub struct CatalogArgs {
    /// Skip connections that fail instead of aborting
    #[arg(long)]
    pub lenient: bool,

    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct FailureReport {
    index: usize,
    connection_id: u64,
    status: u16,
    error: String,
}

#[derive(Serialize)]
struct LenientReport<'a> {
    entries: &'a [CatalogEntry],
    failures: Vec<FailureReport>,
}

/// Run catalog command.
pub async fn run(args: CatalogArgs, ctx: Context) -> Result<()> {
    let cancel = cancel_on_ctrl_c();

    if !args.lenient {
        let entries = ctx.catalog.aggregate(&cancel).await?;
        if args.json {
            return print_json(&entries);
        }
        print_entries(&entries);
        return Ok(());
    }

    let catalog = ctx.catalog.aggregate_lenient(&cancel).await?;
    let failures: Vec<_> = catalog
        .failures
        .iter()
        .map(|f| FailureReport {
            index: f.index,
            connection_id: f.connection_id.0,
            status: f.error.status_code(),
            error: f.error.to_string(),
        })
        .collect();

    if args.json {
        return print_json(&LenientReport {
            entries: &catalog.entries,
            failures,
        });
    }

    print_entries(&catalog.entries);
    for failure in &failures {
        eprintln!(
            "warning: connection {} (#{}) skipped: {}",
            failure.connection_id, failure.index, failure.error
        );
    }
    Ok(())
}

fn print_entries(entries: &[CatalogEntry]) {
    if entries.is_empty() {
        println!("No models available from any connection.");
        return;
    }
    println!("{}", entries_table(entries));
}

/// Table of catalog entries with their origin indices.
pub fn entries_table(entries: &[CatalogEntry]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Model").fg(Color::Cyan),
        Cell::new("Name").fg(Color::Cyan),
        Cell::new("Provider").fg(Color::Cyan),
        Cell::new("Type").fg(Color::Cyan),
        Cell::new("Connections").fg(Color::Cyan),
    ]);

    for entry in entries {
        table.add_row(vec![
            Cell::new(&entry.id),
            Cell::new(&entry.name),
            Cell::new(entry.owned_by),
            Cell::new(&entry.connection_type),
            Cell::new(format_origins(&entry.origin.indices())),
        ]);
    }
    table
}

fn format_origins(indices: &[usize]) -> String {
    indices
        .iter()
        .map(|i| format!("#{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}
