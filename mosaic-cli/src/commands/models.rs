//! Local model registry commands.
//!
//! Models are read from and written to JSON files using the same shape the
//! registry stores. Pass `-` as a path to use stdin.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Args, Subcommand, ValueEnum};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use mosaic_models::registry::{Direction, ModelFilter, OrderBy, PAGE_SIZE, ViewOption, page_count};
use mosaic_models::{ModelForm, ModelImport, ModelRecord};
use tracing::debug;

use super::{Context, format_timestamp, print_json, read_json, truncate_str};

/// Models management arguments.
#[derive(Args, Debug)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub command: ModelsCommands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ViewArg {
    Created,
    Shared,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OrderByArg {
    Name,
    #[value(name = "updated_at")]
    UpdatedAt,
    #[value(name = "created_at")]
    CreatedAt,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum DirectionArg {
    Asc,
    Desc,
}

/// Models subcommands.
#[derive(Subcommand, Debug)]
pub enum ModelsCommands {
    /// List derived models visible to the caller
    List {
        /// Substring of name or id
        #[arg(long)]
        query: Option<String>,

        #[arg(long)]
        view: Option<ViewArg>,

        #[arg(long)]
        tag: Option<String>,

        #[arg(long, value_enum, default_value = "created_at")]
        order_by: OrderByArg,

        #[arg(long, value_enum, default_value = "desc")]
        direction: DirectionArg,

        /// 1-indexed page of 30 models
        #[arg(long)]
        page: Option<usize>,

        #[arg(long)]
        json: bool,
    },
    /// List base models
    Base {
        #[arg(long)]
        json: bool,
    },
    /// List every tag in use
    Tags,
    /// Show one model as JSON
    Get { id: String },
    /// Flip a model's active flag
    Toggle { id: String },
    /// Create a model from a JSON file
    Create { file: PathBuf },
    /// Replace a model's fields from a JSON file
    Update { id: String, file: PathBuf },
    /// Delete a model
    Delete { id: String },
    /// Delete every model
    DeleteAll {
        #[arg(long)]
        yes: bool,
    },
    /// Write the caller's models as a JSON array
    Export {
        /// Output file (stdout if omitted)
        file: Option<PathBuf>,
    },
    /// Create or update models from a JSON array
    Import { file: PathBuf },
    /// Replace the whole collection with a JSON array (destructive)
    Sync {
        file: PathBuf,

        /// Confirm that models missing from the file are deleted
        #[arg(long)]
        yes: bool,
    },
}

/// Run models command.
pub async fn run(args: ModelsArgs, ctx: Context) -> Result<()> {
    let caller = &ctx.caller;
    let registry = &ctx.models;

    match args.command {
        ModelsCommands::List {
            query,
            view,
            tag,
            order_by,
            direction,
            page,
            json,
        } => {
            let filter = ModelFilter {
                query,
                view: match view {
                    None => ViewOption::All,
                    Some(ViewArg::Created) => ViewOption::Created,
                    Some(ViewArg::Shared) => ViewOption::Shared,
                },
                tag,
                order_by: match order_by {
                    OrderByArg::Name => OrderBy::Name,
                    OrderByArg::UpdatedAt => OrderBy::UpdatedAt,
                    OrderByArg::CreatedAt => OrderBy::CreatedAt,
                },
                direction: match direction {
                    DirectionArg::Asc => Direction::Asc,
                    DirectionArg::Desc => Direction::Desc,
                },
                page,
            };
            debug!(?filter, "listing models");

            let result = registry.list(caller, &filter).await?;
            if json {
                return print_json(&result);
            }
            if result.items.is_empty() {
                println!("No models match ({} total).", result.total);
                return Ok(());
            }
            println!("{}", models_table(&result.items));
            if let Some(page) = page {
                println!(
                    "Page {page} of {} ({} models, {PAGE_SIZE} per page)",
                    page_count(result.total),
                    result.total
                );
            }
            Ok(())
        }
        ModelsCommands::Base { json } => {
            let models = registry.list_base().await?;
            if json {
                return print_json(&models);
            }
            if models.is_empty() {
                println!("No base models registered.");
                return Ok(());
            }
            println!("{}", models_table(&models));
            Ok(())
        }
        ModelsCommands::Tags => {
            for tag in registry.list_tags().await? {
                println!("{tag}");
            }
            Ok(())
        }
        ModelsCommands::Get { id } => print_json(&registry.get(caller, &id).await?),
        ModelsCommands::Toggle { id } => {
            let model = registry.toggle(caller, &id).await?;
            let state = if model.is_active { "active" } else { "inactive" };
            println!("Model {} is now {state}", model.id);
            Ok(())
        }
        ModelsCommands::Create { file } => {
            let form: ModelForm = read_json(&file)?;
            let model = registry.create(caller, form).await?;
            println!("Created model {}", model.id);
            Ok(())
        }
        ModelsCommands::Update { id, file } => {
            let form: ModelForm = read_json(&file)?;
            let model = registry.update(caller, &id, form).await?;
            println!("Updated model {}", model.id);
            Ok(())
        }
        ModelsCommands::Delete { id } => {
            registry.delete(caller, &id).await?;
            println!("Deleted model {id}");
            Ok(())
        }
        ModelsCommands::DeleteAll { yes } => {
            if !caller.is_admin() {
                bail!("delete-all requires the admin role");
            }
            if !yes {
                bail!("refusing to delete every model without --yes");
            }
            let count = registry.delete_all().await?;
            println!("Deleted {count} models");
            Ok(())
        }
        ModelsCommands::Export { file } => {
            let models = registry.export(caller).await?;
            match file {
                Some(path) => {
                    std::fs::write(&path, serde_json::to_vec_pretty(&models)?)?;
                    println!("Exported {} models to {}", models.len(), path.display());
                    Ok(())
                }
                None => print_json(&models),
            }
        }
        ModelsCommands::Import { file } => {
            let items: Vec<ModelImport> = read_json(&file)?;
            let summary = registry.import(caller, items).await?;
            println!(
                "Imported: {} created, {} updated, {} skipped",
                summary.created, summary.updated, summary.skipped
            );
            Ok(())
        }
        ModelsCommands::Sync { file, yes } => {
            let forms: Vec<ModelForm> = read_json(&file)?;
            if !yes {
                bail!(
                    "sync replaces the whole collection with {} models and deletes the rest; rerun with --yes",
                    forms.len()
                );
            }
            let models = registry.sync_replace(caller, forms).await?;
            println!("Synced: {} models in registry", models.len());
            Ok(())
        }
    }
}

fn models_table(models: &[ModelRecord]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("ID").fg(Color::Cyan),
        Cell::new("Name").fg(Color::Cyan),
        Cell::new("Base").fg(Color::Cyan),
        Cell::new("Owner").fg(Color::Cyan),
        Cell::new("Active").fg(Color::Cyan),
        Cell::new("Updated").fg(Color::Cyan),
    ]);

    for model in models {
        let active = if model.is_active {
            Cell::new("yes").fg(Color::Green)
        } else {
            Cell::new("no").fg(Color::Yellow)
        };
        table.add_row(vec![
            Cell::new(truncate_str(&model.id, 32)),
            Cell::new(truncate_str(&model.name, 32)),
            Cell::new(model.base_model_id.as_deref().unwrap_or("-")),
            Cell::new(&model.user_id),
            active,
            Cell::new(format_timestamp(model.updated_at)),
        ]);
    }
    table
}
