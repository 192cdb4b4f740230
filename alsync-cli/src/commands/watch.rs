use alsync_core::settings::{token_from_env, TOKEN_ENV_VAR};
use alsync_core::Settings;
use alsync_server::AlsyncServer;
use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::Password;
use indicatif::{ProgressBar, ProgressStyle};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

#[tokio::main]
pub async fn run(config: Option<PathBuf>, port: u16) -> Result<()> {
    let path = super::settings_path(config);
    if !path.exists() {
        println!("{} {:?}", "No settings found at".red(), path);
        println!("Run {} first", "alsync init".cyan());
        anyhow::bail!("missing settings file");
    }

    let settings = Settings::load(&path).with_context(|| format!("Failed to read {:?}", path))?;
    debug!("Loaded settings from {:?}", path);
    let secret = match token_from_env() {
        Some(token) => token,
        None => Password::new()
            .with_prompt(format!("Git token for {} ({} is not set)", settings.username, TOKEN_ENV_VAR))
            .interact()?,
    };

    println!("{}", "Starting alsync...".bold().cyan());
    println!("   {}: {:?}", "Project".bold(), settings.project_path);
    println!("   {}: {}", "Remote".bold(), settings.remote_url);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("   {spinner} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(if settings.project_path.exists() {
        "Opening repository"
    } else {
        "Cloning repository"
    });

    let started = AlsyncServer::start(&settings, &secret).await;
    spinner.finish_and_clear();
    let server = started?;

    println!("   {}: {}", "Session ID".bold(), server.session_id());
    println!(
        "   {}: every {}s after the first commit",
        "Push".bold(),
        settings.push_interval().as_secs()
    );
    println!(
        "   {}: {}",
        "Control API".bold(),
        super::base_url(port).green()
    );
    println!();
    println!("{}", "Press Ctrl+C to stop".dimmed());
    println!();

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    server.serve(addr).await?;

    println!("{}", "Stopped".yellow());
    Ok(())
}
