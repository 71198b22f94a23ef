use timeline_core::auth::CredentialStore;
use timeline_core::config::AppConfig;
use timeline_core::state::SyncStatus;
use timeline_core::sync::SyncError;

use crate::commands::common::{build_orchestrator, credential_store, open_repository};
use crate::error::CliError;

pub async fn run_restore(limit: Option<usize>, config: &AppConfig) -> Result<(), CliError> {
    let signed_in = credential_store(config)?.load_access()?.is_some();
    if SyncStatus::default().is_restore_disabled(signed_in) {
        return Err(SyncError::NotSignedIn.into());
    }

    let repo = open_repository(config).await?;
    let orchestrator = build_orchestrator(config, &repo)?;
    let limit = limit.filter(|limit| *limit > 0).unwrap_or(config.restore_limit);
    let report = orchestrator.restore_latest(limit).await?;

    println!(
        "Restored {} note(s), skipped {}.",
        report.notes_restored, report.notes_skipped
    );
    if report.media_written + report.media_deduplicated > 0 {
        println!(
            "Media: {} written, {} already present.",
            report.media_written, report.media_deduplicated
        );
    }
    Ok(())
}
