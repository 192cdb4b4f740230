use alsync_core::settings::TOKEN_ENV_VAR;
use alsync_core::Settings;
use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::Input;
use std::path::PathBuf;

pub fn run(config: Option<PathBuf>) -> Result<()> {
    let path = super::settings_path(config);
    let existing = if path.exists() {
        Settings::load(&path).with_context(|| format!("Failed to read {:?}", path))?
    } else {
        Settings::default()
    };

    println!("{}", "Configure alsync".bold().cyan());
    println!();

    let project_path: String = Input::new()
        .with_prompt("Ableton project folder")
        .with_initial_text(existing.project_path.display().to_string())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("a project folder is required")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let remote_url: String = Input::new()
        .with_prompt("Git repository URL")
        .with_initial_text(existing.remote_url.clone())
        .interact_text()?;

    let username: String = Input::new()
        .with_prompt("Git username")
        .with_initial_text(existing.username.clone())
        .interact_text()?;

    let email: String = Input::new()
        .with_prompt("Commit email (blank for <username>@example.com)")
        .with_initial_text(existing.email.clone().unwrap_or_default())
        .allow_empty(true)
        .interact_text()?;

    let project_path = PathBuf::from(project_path.trim());
    if !project_path.exists() {
        println!(
            "   {} {:?} does not exist yet, it will be cloned on first {}",
            "note:".yellow(),
            project_path,
            "alsync watch".cyan()
        );
    }

    let settings = Settings {
        project_path,
        remote_url: remote_url.trim().to_string(),
        username: username.trim().to_string(),
        email: Some(email.trim().to_string()).filter(|e| !e.is_empty()),
        ..existing
    };

    settings
        .save(&path)
        .with_context(|| format!("Failed to write {:?}", path))?;

    println!();
    println!("{} {:?}", "Saved settings to".green(), path);
    println!(
        "Set {} or enter your token when {} asks for it",
        TOKEN_ENV_VAR.cyan(),
        "alsync watch".cyan()
    );

    Ok(())
}
