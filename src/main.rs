use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use storyloom_core::models::Project;
use storyloom_core::Workspace;

const DEFAULT_TABS: [&str; 4] = ["Story", "Design", "Shooting", "Generate"];

#[derive(Parser)]
#[command(name = "loom")]
#[command(about = "Versioned block store and asset library for guided creative writing")]
struct Cli {
    /// Workspace root directory (holds project.db and assets/)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a workspace with a project and its default tabs
    Init {
        /// Project name
        #[arg(short, long, default_value = "My Movie")]
        name: String,
    },
    /// Show the project, its tabs and block counts
    Info,
    /// List the blocks of a tab (by name)
    Blocks { tab: String },
    /// Show the mutation trail of a block, newest first
    History { block: Uuid },
    /// List stored assets, optionally filtered by metadata tag
    Assets {
        #[arg(short, long)]
        tag: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "storyloom=info,storyloom_core=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let ws = Workspace::open(&cli.root)?;

    match cli.command {
        Commands::Init { name } => {
            if let Some(existing) = ws.db.list_projects()?.into_iter().next() {
                bail!("workspace already initialized with project {}", existing.id);
            }
            let project = ws.db.create_project(&name, &cli.root.display().to_string())?;
            for (i, tab) in DEFAULT_TABS.iter().enumerate() {
                ws.db.create_tab(project.id, tab, i as i64)?;
            }
            tracing::info!(project = %project.id, tabs = DEFAULT_TABS.len(), "workspace initialized");
            println!("Initialized project {} ({})", project.name, project.id);
        }
        Commands::Info => {
            let project = current_project(&ws)?;
            println!("{} ({})", project.name, project.id);
            for tab in ws.db.list_tabs(project.id)? {
                let blocks = ws.db.list_blocks(tab.id)?;
                println!("  [{}] {}: {} block(s)", tab.position, tab.name, blocks.len());
            }
        }
        Commands::Blocks { tab } => {
            let project = current_project(&ws)?;
            let tab = ws
                .db
                .list_tabs(project.id)?
                .into_iter()
                .find(|t| t.name.eq_ignore_ascii_case(&tab))
                .with_context(|| format!("no tab named {tab:?}"))?;
            for block in ws.db.list_blocks(tab.id)? {
                let preview: String = block.content.chars().take(60).collect();
                println!(
                    "{}  v{}  {}  {}  {:?}",
                    block.id, block.version, block.kind, preview, block.tags
                );
            }
        }
        Commands::History { block } => {
            for entry in ws.db.get_history(block)? {
                println!(
                    "{}  {}  {}",
                    entry.timestamp.to_rfc3339(),
                    entry.action.as_str(),
                    serde_json::to_string(&entry.payload)?
                );
            }
        }
        Commands::Assets { tag } => {
            let project = current_project(&ws)?;
            let assets = match tag {
                Some(tag) => ws.assets.search_by_tag(project.id, &tag)?,
                None => ws.assets.list(project.id)?,
            };
            for asset in assets {
                println!(
                    "{}  {}  {}  {} bytes",
                    asset.id, asset.mime_type, asset.path, asset.size_bytes
                );
            }
        }
    }

    Ok(())
}

fn current_project(ws: &Workspace) -> anyhow::Result<Project> {
    ws.db
        .list_projects()?
        .into_iter()
        .next()
        .context("workspace not initialized; run `loom init` first")
}
