use super::credentials::{CredentialStore, Credentials, SecretStore};
use super::errors::{PushError, Result};
use inquire::{Password, PasswordDisplayMode, Text};
use log::{info, warn};

/// Source of interactive answers.
pub trait Prompt {
    fn ask(&mut self, label: &str, secret: bool) -> Result<String>;
}

/// Reads answers from the terminal; secret answers are masked.
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn ask(&mut self, label: &str, secret: bool) -> Result<String> {
        let answer = if secret {
            Password::new(label)
                .without_confirmation()
                .with_display_mode(PasswordDisplayMode::Masked)
                .prompt()
        } else {
            Text::new(label).prompt()
        };
        answer.map_err(|error| PushError::Prompt(error.to_string()))
    }
}

/// Asks for a username and token. Either one being blank is an error.
pub fn prompt_credentials(prompt: &mut impl Prompt) -> Result<Credentials> {
    let username = prompt.ask("GitHub username:", false)?.trim().to_string();
    let token = prompt
        .ask("GitHub personal access token:", true)?
        .trim()
        .to_string();

    if username.is_empty() || token.is_empty() {
        return Err(PushError::InvalidCredentials);
    }
    Ok(Credentials { username, token })
}

/// Prompts unconditionally and stores the answers, replacing whatever was
/// stored before. Failing to store is an error here.
pub fn setup_credentials<S: SecretStore>(
    store: &CredentialStore<S>,
    prompt: &mut impl Prompt,
) -> Result<Credentials> {
    let credentials = prompt_credentials(prompt)?;
    store.set(&credentials)?;
    info!("Credentials saved to keychain.");
    Ok(credentials)
}

/// Returns the stored pair, prompting only when nothing usable is stored. If
/// the freshly entered pair cannot be stored it is still used for this run.
pub fn ensure_credentials<S: SecretStore>(
    store: &CredentialStore<S>,
    prompt: &mut impl Prompt,
) -> Result<Credentials> {
    match store.get() {
        Ok(Some(credentials)) => {
            info!("Using stored credentials for user: {}", credentials.username);
            return Ok(credentials);
        }
        Ok(None) => info!("GitHub credentials not found. Please set them up:"),
        Err(error) => warn!("Could not read stored credentials ({error}). Please enter them:"),
    }

    let credentials = prompt_credentials(prompt)?;
    match store.set(&credentials) {
        Ok(()) => info!("Credentials saved to keychain."),
        Err(error) => warn!("Credentials will only be used for this run: {error}"),
    }
    Ok(credentials)
}
