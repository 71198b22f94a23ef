use timeline_core::config::AppConfig;

use crate::commands::common::{format_note_lines, note_to_list_item, open_repository, NoteListItem};
use crate::error::CliError;

pub async fn run_list(limit: usize, as_json: bool, config: &AppConfig) -> Result<(), CliError> {
    let repo = open_repository(config).await?;
    let mut notes = repo.list()?;
    notes.truncate(limit);

    if as_json {
        let json_items = notes
            .iter()
            .map(note_to_list_item)
            .collect::<Vec<NoteListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if notes.is_empty() {
        println!("No notes yet.");
    } else {
        for line in format_note_lines(&notes) {
            println!("{line}");
        }
    }

    Ok(())
}
