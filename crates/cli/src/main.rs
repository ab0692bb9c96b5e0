//! Cartshield CLI - Database migrations and operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! cartshield migrate
//!
//! # Onboard a primary store
//! cartshield store create --domain primary.myshopify.com --token shpat_...
//!
//! # Rotate a primary store's Admin API token
//! cartshield store set-token --store-id 1 --token shpat_...
//!
//! # Sync product mappings for every enabled backup store
//! cartshield sync --store-id 1
//!
//! # Delete mappings not refreshed by the latest sync
//! cartshield prune --store-id 1
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "cartshield")]
#[command(author, version, about = "Cartshield CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage primary stores
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
    /// Sync product mappings from the primary catalog to backup stores
    Sync {
        /// Primary store ID
        #[arg(long)]
        store_id: i32,

        /// Only sync this backup store
        #[arg(long)]
        backup_id: Option<i32>,
    },
    /// Delete mappings not refreshed by the latest sync
    Prune {
        /// Primary store ID
        #[arg(long)]
        store_id: i32,
    },
}

#[derive(Subcommand)]
enum StoreAction {
    /// Register a primary store
    Create {
        /// Store domain (any form; canonicalized)
        #[arg(short, long)]
        domain: String,

        /// Admin API access token
        #[arg(short, long)]
        token: Option<String>,
    },
    /// Replace a primary store's Admin API token
    SetToken {
        /// Primary store ID
        #[arg(long)]
        store_id: i32,

        /// Admin API access token
        #[arg(short, long)]
        token: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cartshield=info,cartshield_server=info".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Store { action } => match action {
            StoreAction::Create { domain, token } => {
                commands::store::create(&domain, token).await?;
            }
            StoreAction::SetToken { store_id, token } => {
                commands::store::set_token(store_id, token).await?;
            }
        },
        Commands::Sync {
            store_id,
            backup_id,
        } => commands::sync::sync(store_id, backup_id).await?,
        Commands::Prune { store_id } => commands::sync::prune(store_id).await?,
    }
    Ok(())
}
