use timeline_core::config::AppConfig;

use crate::commands::common::{open_repository, resolve_note};
use crate::error::CliError;

pub async fn run_delete(id: &str, config: &AppConfig) -> Result<(), CliError> {
    let repo = open_repository(config).await?;
    let note = resolve_note(id, &repo)?;

    repo.delete(&note.id).await?;
    println!("{}", note.id);
    Ok(())
}
