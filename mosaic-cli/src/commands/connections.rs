//! Provider connection commands.
//!
//! Register, edit and remove provider endpoints, check that they answer,
//! and list what a single connection exposes.

use anyhow::{Result, anyhow};
use clap::{Args, Subcommand};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use mosaic_models::providers::{
    AuthType, ConnectionForm, ConnectionId, ConnectionPatch, ProviderConnection, ProviderKind,
};
use std::collections::BTreeMap;

use super::{Context, cancel_on_ctrl_c, catalog::entries_table, print_json, truncate_str};

/// Connection management arguments.
#[derive(Args, Debug)]
pub struct ConnectionsArgs {
    #[command(subcommand)]
    pub command: ConnectionsCommands,
}

/// Connection subcommands.
#[derive(Subcommand, Debug)]
pub enum ConnectionsCommands {
    /// List registered connections in origin-index order
    List {
        #[arg(long)]
        json: bool,
    },
    /// Register a new connection
    Add {
        /// Protocol: openai or ollama
        #[arg(long = "type")]
        kind: ProviderKind,

        #[arg(long)]
        name: String,

        /// Base URL, e.g. https://api.openai.com/v1
        #[arg(long)]
        url: String,

        #[arg(long)]
        api_key: Option<String>,

        /// Prefix applied to every model id as "<prefix>.<id>"
        #[arg(long)]
        prefix: Option<String>,

        /// Restrict to these remote model ids (repeatable)
        #[arg(long = "model")]
        models: Vec<String>,

        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Extra request header as NAME=VALUE (repeatable)
        #[arg(long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,

        /// Label such as "local" or "external"
        #[arg(long)]
        connection_type: Option<String>,

        /// Send no Authorization header
        #[arg(long)]
        no_auth: bool,

        /// Use the Azure OpenAI URL shape
        #[arg(long)]
        azure: bool,

        #[arg(long)]
        api_version: Option<String>,

        /// Register without including it in the catalog
        #[arg(long)]
        disabled: bool,
    },
    /// Change fields of an existing connection
    Update {
        id: u64,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        url: Option<String>,

        #[arg(long)]
        api_key: Option<String>,

        #[arg(long)]
        prefix: Option<String>,

        /// Replace the allow-list (repeatable)
        #[arg(long = "model")]
        models: Vec<String>,

        /// Replace the tags (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        #[arg(long)]
        enable: Option<bool>,
    },
    /// Delete a connection
    Remove { id: u64 },
    /// Check that a connection's endpoint answers
    Verify { id: u64 },
    /// List the models one connection exposes, unmerged
    Models {
        id: u64,

        #[arg(long)]
        json: bool,
    },
}

/// Run connections command.
pub async fn run(args: ConnectionsArgs, ctx: Context) -> Result<()> {
    match args.command {
        ConnectionsCommands::List { json } => list(&ctx, json).await,
        ConnectionsCommands::Add {
            kind,
            name,
            url,
            api_key,
            prefix,
            models,
            tags,
            headers,
            connection_type,
            no_auth,
            azure,
            api_version,
            disabled,
        } => {
            let form = ConnectionForm {
                name,
                kind: Some(kind),
                base_url: url,
                api_key: api_key.unwrap_or_default(),
                enable: !disabled,
                connection_type,
                prefix_id: prefix,
                tags,
                model_ids: models,
                headers: headers.into_iter().collect::<BTreeMap<_, _>>(),
                auth_type: if no_auth {
                    AuthType::Disabled
                } else {
                    AuthType::Bearer
                },
                api_version,
                azure,
                meta: Default::default(),
            };
            let created = ctx.connections.create(form).await?;
            println!("Created connection {} ({})", created.id, created.name);
            Ok(())
        }
        ConnectionsCommands::Update {
            id,
            name,
            url,
            api_key,
            prefix,
            models,
            tags,
            enable,
        } => {
            let patch = ConnectionPatch {
                name,
                base_url: url,
                api_key,
                prefix_id: prefix,
                model_ids: (!models.is_empty()).then_some(models),
                tags: (!tags.is_empty()).then_some(tags),
                enable,
                ..Default::default()
            };
            let updated = ctx.connections.update(ConnectionId(id), patch).await?;
            println!("Updated connection {} ({})", updated.id, updated.name);
            Ok(())
        }
        ConnectionsCommands::Remove { id } => {
            ctx.connections.delete(ConnectionId(id)).await?;
            println!("Removed connection {id}");
            Ok(())
        }
        ConnectionsCommands::Verify { id } => {
            let status = ctx
                .catalog
                .verify_connection(ConnectionId(id), &cancel_on_ctrl_c())
                .await?;
            println!("Connection {id} OK: {} {}", status.status, status.status_text);
            Ok(())
        }
        ConnectionsCommands::Models { id, json } => {
            let entries = ctx
                .catalog
                .fetch_connection_models(ConnectionId(id), &cancel_on_ctrl_c())
                .await?;
            if json {
                return print_json(&entries);
            }
            if entries.is_empty() {
                println!("Connection {id} exposes no models.");
                return Ok(());
            }
            println!("{}", entries_table(&entries));
            Ok(())
        }
    }
}

async fn list(ctx: &Context, json: bool) -> Result<()> {
    let connections = ctx.connections.list().await?;

    if json {
        // api_key stays out of the output
        let redacted: Vec<_> = connections.into_iter().map(redact).collect();
        return print_json(&redacted);
    }
    if connections.is_empty() {
        println!("No connections registered.");
        println!();
        println!("Add one with: mosaic connections add --type ollama --name local --url http://localhost:11434");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#").fg(Color::Cyan),
        Cell::new("ID").fg(Color::Cyan),
        Cell::new("Name").fg(Color::Cyan),
        Cell::new("Type").fg(Color::Cyan),
        Cell::new("URL").fg(Color::Cyan),
        Cell::new("Prefix").fg(Color::Cyan),
        Cell::new("Enabled").fg(Color::Cyan),
    ]);

    for (index, conn) in connections.iter().enumerate() {
        let enabled = if conn.enable {
            Cell::new("yes").fg(Color::Green)
        } else {
            Cell::new("no").fg(Color::Yellow)
        };
        table.add_row(vec![
            Cell::new(index),
            Cell::new(conn.id),
            Cell::new(&conn.name),
            Cell::new(conn.kind),
            Cell::new(truncate_str(&conn.base_url, 48)),
            Cell::new(conn.prefix_id.as_deref().unwrap_or("-")),
            enabled,
        ]);
    }

    println!("{table}");
    Ok(())
}

fn redact(mut connection: ProviderConnection) -> ProviderConnection {
    if !connection.api_key.is_empty() {
        connection.api_key = "[REDACTED]".to_string();
    }
    connection
}

/// Parse a `NAME=VALUE` header argument.
fn parse_header(s: &str) -> Result<(String, String)> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("expected NAME=VALUE, got {s:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("header name must not be empty"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}
