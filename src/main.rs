//! ALFA Media Vault - CLI
//!
//! Command-line interface for vault operations.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use secrecy::SecretString;

use alfa_media_vault::batch::{BatchProgress, BatchReport, CancelToken};
use alfa_media_vault::catalog::AiConfigDraft;
use alfa_media_vault::model::{MediaItem, MediaType, UNCATEGORIZED_ID};
use alfa_media_vault::{MediaVault, VaultConfig};

#[derive(Parser)]
#[command(name = "alfa-media")]
#[command(author = "Karen Tonoyan")]
#[command(version = alfa_media_vault::VERSION)]
#[command(about = "ALFA Media Vault - Encrypted media library with AI tagging")]
struct Cli {
    /// Database path (overrides the config file)
    #[arg(long)]
    db: Option<PathBuf>,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Vault password
    #[arg(short, long, global = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set the vault password
    Init,

    /// Import images or videos
    Import {
        /// Files to import
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Target category (id or name)
        #[arg(short, long)]
        category: Option<String>,
    },

    /// List media items
    List {
        /// Only this category (id or name)
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Decrypt an item to a file
    Export {
        /// Item ID
        id: String,

        /// Output path
        output: PathBuf,
    },

    /// Delete an item
    Delete {
        /// Item ID
        id: String,
    },

    /// Manage categories
    Category {
        #[command(subcommand)]
        command: CategoryCommand,
    },

    /// Manage AI vision endpoints
    Ai {
        #[command(subcommand)]
        command: AiCommand,
    },

    /// Tag untagged items with the active AI config
    Tag {
        /// Only this category (id or name)
        #[arg(short, long)]
        category: Option<String>,

        /// Prompt (defaults to the active config's prompt)
        #[arg(long)]
        prompt: Option<String>,

        /// Retry failed items once
        #[arg(long)]
        retry: bool,
    },

    /// List items without AI tags
    Untagged {
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Search tags and AI descriptions
    Search {
        query: String,
    },

    /// Write a metadata-only JSON export
    ExportMetadata {
        output: PathBuf,
    },

    /// Show vault statistics
    Stats,
}

#[derive(Subcommand)]
enum CategoryCommand {
    /// Create a category
    Add {
        name: String,

        #[arg(short, long, default_value = "")]
        description: String,

        #[arg(long, default_value = "#2196f3")]
        color: String,
    },

    /// List categories
    List,

    /// Delete a category; its items move to "uncategorized"
    Remove {
        /// Category id or name
        category: String,
    },
}

#[derive(Subcommand)]
enum AiCommand {
    /// Add an OpenAI-compatible endpoint
    Add {
        name: String,

        /// Base URL, e.g. https://api.openai.com/v1
        #[arg(long)]
        url: String,

        /// API key (stored encrypted)
        #[arg(long)]
        key: String,

        #[arg(long, default_value = "gpt-4o")]
        model: String,

        /// Default tagging prompt
        #[arg(long)]
        prompt: Option<String>,

        /// Make it the active config
        #[arg(long)]
        activate: bool,
    },

    /// List configs
    List,

    /// Make a config the active one
    Activate {
        id: String,
    },

    /// Check the endpoint by listing its models
    Test {
        id: String,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => VaultConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => VaultConfig::default(),
    };
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    let vault = MediaVault::open(config).context("opening vault database")?;
    let password = cli.password.as_deref();

    match cli.command {
        Commands::Init => {
            let password = password.context("--password is required")?;
            println!("🔐 Setting up ALFA Media Vault...");
            vault.setup_password(password)?;
            println!("✅ Vault ready at: {}", vault.config().db_path.display());
        }

        Commands::Import { paths, category } => {
            unlock(&vault, password)?;
            let category_id = match category {
                Some(key) => resolve_category(&vault, &key)?,
                None => UNCATEGORIZED_ID.to_string(),
            };

            println!("📥 Importing {} file(s)...", paths.len());
            let report = vault.import_paths(paths, &category_id, &CancelToken::new(), &mut print_progress);
            print_summary("Imported", &report);
        }

        Commands::List { category } => {
            let category_id = category.map(|key| resolve_category(&vault, &key)).transpose()?;
            let items = vault.catalog().list_items(category_id.as_deref())?;
            print_items(&items, "📭 No media in vault");
        }

        Commands::Export { id, output } => {
            unlock(&vault, password)?;
            println!("📤 Exporting item: {}", id);
            let data = vault.file_bytes(&id)?;
            std::fs::write(&output, &data)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("✅ Exported to: {}", output.display());
        }

        Commands::Delete { id } => {
            unlock(&vault, password)?;
            if vault.catalog().delete_item(&id)? {
                println!("🗑️ Deleted item {}", id);
            } else {
                bail!("no item with id {}", id);
            }
        }

        Commands::Category { command } => match command {
            CategoryCommand::Add { name, description, color } => {
                let category = vault.catalog().create_category(&name, &description, &color)?;
                println!("✅ Category created: {} ({})", category.name, category.id);
            }
            CategoryCommand::List => {
                for category in vault.catalog().list_categories()? {
                    let count = vault.catalog().list_items(Some(&category.id))?.len();
                    println!("{}  {:<24} {:>5} items  {}", category.color, category.name, count, category.id);
                }
            }
            CategoryCommand::Remove { category } => {
                let id = resolve_category(&vault, &category)?;
                let moved = vault.catalog().delete_category(&id)?;
                println!("🗑️ Category removed, {} item(s) moved to {}", moved, UNCATEGORIZED_ID);
            }
        },

        Commands::Ai { command } => {
            unlock(&vault, password)?;
            run_ai(&vault, command)?;
        }

        Commands::Tag { category, prompt, retry } => {
            unlock(&vault, password)?;
            let category_id = category.map(|key| resolve_category(&vault, &key)).transpose()?;
            run_tagging(&vault, category_id.as_deref(), prompt.as_deref(), retry)?;
        }

        Commands::Untagged { category } => {
            let category_id = category.map(|key| resolve_category(&vault, &key)).transpose()?;
            let items = vault.tagging().get_untagged(category_id.as_deref())?;
            print_items(&items, "🏷️ Every item is tagged");
        }

        Commands::Search { query } => {
            let items = vault.tagging().search_by_tags(&query)?;
            print_items(&items, "🔍 No matches");
        }

        Commands::ExportMetadata { output } => {
            let export = vault.export_metadata()?;
            std::fs::write(&output, export.to_json()?)
                .with_context(|| format!("writing {}", output.display()))?;
            println!(
                "✅ Exported metadata for {} items to {}",
                export.media_items.len(),
                output.display()
            );
        }

        Commands::Stats => {
            let stats = vault.stats()?;
            println!("📊 ALFA Media Vault Statistics");
            println!("{:-<40}", "");
            println!("Total items:      {}", stats.items);
            println!("Images:           {}", stats.images);
            println!("Videos:           {}", stats.videos);
            println!("Tagged:           {}", stats.tagged);
            println!("Untagged:         {}", stats.untagged);
            println!("Categories:       {}", stats.categories);
            println!("AI configs:       {}", stats.ai_configs);
            println!("Original size:    {} MB", stats.total_bytes / 1024 / 1024);
        }
    }

    Ok(())
}

fn run_ai(vault: &MediaVault, command: AiCommand) -> Result<()> {
    match command {
        AiCommand::Add { name, url, key, model, prompt, activate } => {
            let config = vault.catalog().create_ai_config(AiConfigDraft {
                name,
                api_url: url,
                api_key: SecretString::new(key),
                model,
                default_prompt: prompt.unwrap_or_else(|| vault.config().default_prompt.clone()),
                activate,
            })?;
            println!("✅ AI config saved: {} ({})", config.name, config.id);
        }
        AiCommand::List => {
            for config in vault.catalog().list_ai_configs()? {
                let active = if config.is_active { "⭐" } else { "  " };
                let tested = config
                    .last_tested
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "never".into());
                println!(
                    "{} {} - {} [{}] {} (tested: {})",
                    active, config.id, config.name, config.model, config.api_url, tested
                );
            }
        }
        AiCommand::Activate { id } => {
            let config = vault.catalog().activate_ai_config(&id)?;
            println!("⭐ Active AI config: {}", config.name);
        }
        AiCommand::Test { id } => test_connection(vault, &id)?,
    }
    Ok(())
}

#[cfg(feature = "vision-http")]
fn test_connection(vault: &MediaVault, id: &str) -> Result<()> {
    println!("🔌 Testing connection...");
    let models = vault.test_ai_connection(id)?;
    println!("✅ Endpoint reachable, {} model(s):", models.len());
    for model in models {
        println!("   {}", model);
    }
    Ok(())
}

#[cfg(not(feature = "vision-http"))]
fn test_connection(_vault: &MediaVault, _id: &str) -> Result<()> {
    bail!("built without the vision-http feature")
}

#[cfg(feature = "vision-http")]
fn run_tagging(
    vault: &MediaVault,
    category_id: Option<&str>,
    prompt: Option<&str>,
    retry: bool,
) -> Result<()> {
    let vision = vault.vision_for_active_config()?;
    let prompt = vault.resolve_prompt(prompt)?;
    let cancel = CancelToken::new();

    println!("🏷️ Tagging untagged items...");
    let report = vault
        .tagging()
        .tag_untagged(category_id, &vision, &prompt, &cancel, &mut print_progress)?;
    print_summary("Tagged", &report);

    if retry && report.failure_count() > 0 {
        println!("🔁 Retrying {} failed item(s)...", report.failure_count());
        let retried = vault
            .tagging()
            .retry_failed(&report, &vision, &prompt, &cancel, &mut print_progress)?;
        print_summary("Tagged", &retried);
    }
    Ok(())
}

#[cfg(not(feature = "vision-http"))]
fn run_tagging(_: &MediaVault, _: Option<&str>, _: Option<&str>, _: bool) -> Result<()> {
    bail!("built without the vision-http feature")
}

fn unlock(vault: &MediaVault, password: Option<&str>) -> Result<()> {
    let password = password.context("--password is required")?;
    vault.unlock(password)?;
    Ok(())
}

/// Category id for an id or a (case-insensitive) name
fn resolve_category(vault: &MediaVault, key: &str) -> Result<String> {
    vault
        .catalog()
        .list_categories()?
        .into_iter()
        .find(|c| c.id == key || c.name.eq_ignore_ascii_case(key))
        .map(|c| c.id)
        .with_context(|| format!("no category named {}", key))
}

fn print_progress(p: &BatchProgress) {
    let mark = if p.succeeded { "✅" } else { "❌" };
    println!("  [{}/{}] {} {}", p.done, p.total, mark, p.label);
}

fn print_summary(verb: &str, report: &BatchReport<MediaItem>) {
    println!(
        "{} {} of {} item(s){}",
        verb,
        report.success_count(),
        report.len(),
        if report.cancelled { " (cancelled)" } else { "" }
    );
    for (label, err) in report.failed() {
        println!("   ⚠️ {}: {}", label, err);
    }
}

fn print_items(items: &[MediaItem], empty: &str) {
    if items.is_empty() {
        println!("{}", empty);
        return;
    }

    println!("🎞️ Media items ({}):", items.len());
    println!("{:-<60}", "");
    for item in items {
        let icon = match item.media_type {
            MediaType::Image => "📷",
            MediaType::Video => "🎬",
        };
        let tags = if item.is_tagged() {
            item.ai_tags().join(", ")
        } else {
            "-".to_string()
        };
        println!(
            "{} {} - {} ({} bytes) [{}]",
            icon, item.id, item.file_name, item.file_size, tags
        );
    }
}
