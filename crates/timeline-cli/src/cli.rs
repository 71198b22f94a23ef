use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "timeline")]
#[command(about = "Local-first notes with offline sync")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding notes, media and the sync queue
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new note
    #[command(alias = "new")]
    Add {
        /// Note text
        text: Vec<String>,
        /// Attach an image file
        #[arg(long = "image", value_name = "FILE")]
        images: Vec<PathBuf>,
        /// Attach an audio file
        #[arg(long = "audio", value_name = "FILE")]
        audio: Vec<PathBuf>,
        /// Tag the note (repeatable)
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,
        /// Pin the note
        #[arg(long)]
        pin: bool,
    },
    /// List notes, pinned first
    List {
        /// Number of notes to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit an existing note
    Edit {
        /// Note ID or unique ID prefix
        id: String,
        /// Replace the note text
        #[arg(long)]
        text: Option<String>,
        /// Replace all tags (repeatable)
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,
        /// Pin the note
        #[arg(long, conflicts_with = "unpin")]
        pin: bool,
        /// Unpin the note
        #[arg(long)]
        unpin: bool,
        /// Attach an image file
        #[arg(long = "add-image", value_name = "FILE")]
        add_images: Vec<PathBuf>,
        /// Detach an image by its stored path
        #[arg(long = "remove-image", value_name = "PATH")]
        remove_images: Vec<String>,
        /// Attach an audio file
        #[arg(long = "add-audio", value_name = "FILE")]
        add_audio: Vec<PathBuf>,
        /// Detach an audio recording by its stored path
        #[arg(long = "remove-audio", value_name = "PATH")]
        remove_audio: Vec<String>,
    },
    /// Delete a note
    Delete {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Upload queued changes to the notes service
    Sync {
        #[command(subcommand)]
        command: Option<SyncCommands>,
    },
    /// Pull the most recent notes from the notes service
    Restore {
        /// Number of notes to fetch (defaults to `restore_limit`)
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Sign in to the notes service
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Show queued changes and sign-in state
    Status,
    /// Queue every local note for upload again
    Resync,
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Complete sign-in with an authorization code or redirect URL
    #[command(group(ArgGroup::new("source").required(true).args(["code", "callback_url"])))]
    Login {
        /// Authorization code from the login page
        #[arg(long)]
        code: Option<String>,
        /// Full redirect URL received after login
        #[arg(long, value_name = "URL")]
        callback_url: Option<String>,
    },
    /// Show whether credentials are stored
    Status,
    /// Forget stored credentials
    Logout,
    /// Print the URL that starts the login flow
    Url,
}
