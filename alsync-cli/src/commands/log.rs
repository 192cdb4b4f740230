use anyhow::Result;
use colored::Colorize;

pub fn run(limit: usize, port: u16) -> Result<()> {
    let client = super::connect(port)?;
    let entries = client.activity(limit)?;

    if entries.is_empty() {
        println!("{}", "No activity yet".yellow());
        return Ok(());
    }

    println!("{}", "Session Activity".bold().cyan());
    println!();

    for entry in &entries {
        let kind = match entry.kind.as_str() {
            "commit_created" | "push_succeeded" => entry.kind.green(),
            "commit_failed" | "push_failed" | "watch_error" => entry.kind.yellow(),
            "fatal" => entry.kind.red().bold(),
            _ => entry.kind.normal(),
        };

        println!("{} {:<16} {}", entry.timestamp.dimmed(), kind, entry.message);
    }

    if entries.len() == limit {
        println!();
        println!("Use {} to see more", "--limit N".cyan());
    }

    Ok(())
}
