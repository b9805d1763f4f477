use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use site_editor::backends::{FsBlobStore, ObjectUrlRegistry, SqliteDocumentStore, StaticAuthorization};
use site_editor::config::EditorConfig;
use site_editor::script::EditScript;
use site_editor::{EditSession, EditSessionArguments, PublishOutcome};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Publish site content edits from the command line
#[derive(Parser, Debug)]
#[command(name = "site-editor")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Apply a JSON edit script and publish it in one batch
    Publish {
        /// Edit script; image paths are relative to its directory
        script: PathBuf,
    },

    /// Print the stored fields of one document
    Show {
        collection: String,
        document_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "site_editor=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EditorConfig::from_env()?;

    match cli.command {
        Command::Publish { script } => publish(&config, &script).await,
        Command::Show {
            collection,
            document_id,
        } => show(&config, &collection, &document_id).await,
    }
}

async fn publish(config: &EditorConfig, script_path: &Path) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(script_path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", script_path.display()))?;
    let script = EditScript::parse(&raw)?;

    let authorization = match script.actor_id.clone().or_else(|| config.actor_id.clone()) {
        Some(actor) => StaticAuthorization::editor(actor),
        None => anyhow::bail!("No actor identity: set SITE_EDITOR_ACTOR_ID or actor_id in the script"),
    };

    let documents = SqliteDocumentStore::connect(&config.database_url).await?;
    let blobs = FsBlobStore::new(&config.blob_root, &config.blob_public_base_url);
    info!(
        database = %config.database_url,
        blob_root = %config.blob_root.display(),
        "publishing edit script"
    );

    let session = EditSession::new(EditSessionArguments {
        authorization: Arc::new(authorization),
        documents: Arc::new(documents),
        blobs: Arc::new(blobs),
        previews: Arc::new(ObjectUrlRegistry::with_origin("site-editor")),
        upload_policy: config.upload_policy(),
    });
    session.set_edit_mode(true);

    let base_dir = script_path.parent().unwrap_or_else(|| Path::new("."));
    script.apply(&session, base_dir).await?;
    info!(pending = session.count(), "edit script applied");

    match session.publish().await? {
        PublishOutcome::Published(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        PublishOutcome::NothingToPublish => println!("nothing to publish"),
        PublishOutcome::Aborted => anyhow::bail!("publish aborted"),
    }
    Ok(())
}

async fn show(config: &EditorConfig, collection: &str, document_id: &str) -> anyhow::Result<()> {
    let documents = SqliteDocumentStore::connect(&config.database_url).await?;
    match documents.fetch(collection, document_id).await? {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record.fields)?),
        None => anyhow::bail!("{collection}/{document_id} not found"),
    }
    Ok(())
}
