use timeline_core::auth::CredentialStore;
use timeline_core::config::AppConfig;

use crate::cli::AuthCommands;
use crate::commands::common::{credential_store, session_manager};
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, config: &AppConfig) -> Result<(), CliError> {
    match command {
        AuthCommands::Login { code, callback_url } => {
            run_auth_login(code.as_deref(), callback_url.as_deref(), config).await
        }
        AuthCommands::Status => run_auth_status(config),
        AuthCommands::Logout => run_auth_logout(config),
        AuthCommands::Url => run_auth_url(config),
    }
}

async fn run_auth_login(
    code: Option<&str>,
    callback_url: Option<&str>,
    config: &AppConfig,
) -> Result<(), CliError> {
    let manager = session_manager(config)?;

    if let Some(url) = callback_url {
        if !manager.handle_callback(url).await? {
            return Err(CliError::InvalidCallback(url.to_string()));
        }
    } else if let Some(code) = code {
        manager.sign_in_with_code(code.trim()).await?;
    }

    println!("Signed in to {}", config.require_base_url()?);
    Ok(())
}

fn run_auth_status(config: &AppConfig) -> Result<(), CliError> {
    let store = credential_store(config)?;
    let base_url = config.require_base_url()?;
    match (store.load_access()?, store.load_refresh()?) {
        (Some(_), Some(_)) => println!("Signed in to {base_url}"),
        (Some(_), None) => println!("Signed in to {base_url} (no refresh token)"),
        (None, _) => println!("Not signed in"),
    }
    Ok(())
}

fn run_auth_logout(config: &AppConfig) -> Result<(), CliError> {
    session_manager(config)?.sign_out()?;
    println!("Signed out");
    Ok(())
}

fn run_auth_url(config: &AppConfig) -> Result<(), CliError> {
    let manager = session_manager(config)?;
    let url = manager.login_url().ok_or(CliError::MissingLoginUrl)?;
    println!("{url}");
    println!("After signing in, run `timeline auth login --callback-url <redirect URL>`.");
    Ok(())
}
