use timeline_core::auth::CredentialStore;
use timeline_core::config::AppConfig;
use timeline_core::state::SyncStatus;
use timeline_core::sync::SyncError;

use crate::cli::SyncCommands;
use crate::commands::common::{build_orchestrator, credential_store, open_repository};
use crate::error::CliError;

pub async fn run_sync(command: Option<SyncCommands>, config: &AppConfig) -> Result<(), CliError> {
    match command {
        None => run_sync_now(config).await,
        Some(SyncCommands::Status) => run_sync_status(config).await,
        Some(SyncCommands::Resync) => run_resync(config).await,
    }
}

async fn run_sync_now(config: &AppConfig) -> Result<(), CliError> {
    let repo = open_repository(config).await?;
    let signed_in = credential_store(config)?.load_access()?.is_some();
    let mut status = SyncStatus::default();
    if status.is_sync_disabled(signed_in) {
        return Err(SyncError::NotSignedIn.into());
    }

    let orchestrator = build_orchestrator(config, &repo)?;
    status.begin();
    let outcome = orchestrator.perform_sync().await;
    status.finish(&outcome);

    let report = match outcome {
        Ok(report) => report,
        Err(error) => {
            let remaining = repo.queue().pending_count().await?;
            tracing::warn!("Sync stopped with {remaining} operation(s) still queued");
            return Err(error.into());
        }
    };

    if report.ops_sent == 0 {
        println!("Nothing to sync.");
    } else {
        println!(
            "Synced {} operation(s) in {} batch(es).",
            report.ops_sent, report.batches_sent
        );
        for result in &report.results {
            tracing::debug!("Server result for {}: {}", result.note_id, result.result);
        }
    }
    println!("Last sync: {}", status.last_sync_text());
    Ok(())
}

async fn run_sync_status(config: &AppConfig) -> Result<(), CliError> {
    let repo = open_repository(config).await?;
    let pending = repo.queue().pending_count().await?;
    let signed_in = if config.base_url.is_some() {
        credential_store(config)?.load_access()?.is_some()
    } else {
        false
    };

    println!("Queued operations: {pending}");
    println!("Signed in: {}", if signed_in { "yes" } else { "no" });
    if config.base_url.is_none() {
        println!("Notes service: not configured");
    }
    Ok(())
}

async fn run_resync(config: &AppConfig) -> Result<(), CliError> {
    let repo = open_repository(config).await?;
    let queued = repo.enqueue_full_resync().await?;
    println!("Queued {queued} note(s) for upload. Run `timeline sync` to send them.");
    Ok(())
}
