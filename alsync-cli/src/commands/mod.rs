pub mod init;
pub mod log;
pub mod push;
pub mod status;
pub mod stop;
pub mod watch;

use alsync_core::settings::SETTINGS_FILE;
use alsync_sdk::AlsyncClient;
use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 3131;

pub fn settings_path(custom_path: Option<PathBuf>) -> PathBuf {
    custom_path.unwrap_or_else(|| PathBuf::from(SETTINGS_FILE))
}

pub fn base_url(port: u16) -> String {
    format!("http://127.0.0.1:{}", port)
}

/// Client for the session on `port`, or an explanation when none is running.
pub fn connect(port: u16) -> Result<AlsyncClient> {
    let client = AlsyncClient::new(base_url(port));

    if !client.health_check().unwrap_or(false) {
        println!("{}", "No running alsync session found".red());
        println!("Run {} to start one", "alsync watch".cyan());
        anyhow::bail!("nothing is listening on {}", client.base_url());
    }

    Ok(client)
}
