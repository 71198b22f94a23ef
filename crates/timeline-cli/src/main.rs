mod cli;
mod commands;
mod credentials;
mod error;

use clap::Parser;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::add::{run_add, AddArgs};
use crate::commands::auth_cmd::run_auth;
use crate::commands::common::load_config;
use crate::commands::delete::run_delete;
use crate::commands::edit::{run_edit, EditArgs};
use crate::commands::list::run_list;
use crate::commands::restore::run_restore;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "timeline=info".parse::<Directive>() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.data_dir)?;

    match cli.command {
        Commands::Add {
            text,
            images,
            audio,
            tags,
            pin,
        } => {
            run_add(
                AddArgs {
                    text,
                    images,
                    audio,
                    tags,
                    pin,
                },
                &config,
            )
            .await
        }
        Commands::List { limit, json } => run_list(limit, json, &config).await,
        Commands::Edit {
            id,
            text,
            tags,
            pin,
            unpin,
            add_images,
            remove_images,
            add_audio,
            remove_audio,
        } => {
            let args = EditArgs {
                text,
                tags,
                pin,
                unpin,
                add_images,
                remove_images,
                add_audio,
                remove_audio,
            };
            run_edit(&id, args, &config).await
        }
        Commands::Delete { id } => run_delete(&id, &config).await,
        Commands::Sync { command } => run_sync(command, &config).await,
        Commands::Restore { limit } => run_restore(limit, &config).await,
        Commands::Auth { command } => run_auth(command, &config).await,
    }
}
