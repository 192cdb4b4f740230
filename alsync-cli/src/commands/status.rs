use anyhow::Result;
use colored::Colorize;

pub fn run(port: u16) -> Result<()> {
    let client = super::connect(port)?;
    let status = client.status()?;

    let state = match status.state.as_str() {
        "watching" => status.state.green(),
        "stopping" => status.state.yellow(),
        _ => status.state.red(),
    };

    println!("{}", "Session Status".bold().cyan());
    println!("  {}: {}", "Project".bold(), status.project_path.display());
    println!("  {}: {}", "Session ID".bold(), status.session_id);
    println!("  {}: {}", "Started".bold(), status.started);
    println!("  {}: {}", "State".bold(), state);
    println!(
        "  {}: {}",
        "Push scheduler".bold(),
        if status.push_scheduler_running {
            "running".green()
        } else {
            "waiting for first commit".dimmed()
        }
    );
    println!();

    println!(
        "  {} {}  {} {}",
        "Commits:".bold(),
        status.commits.to_string().cyan(),
        "failed:".bold(),
        status.commit_failures.to_string().yellow()
    );
    println!(
        "  {} {}  {} {}",
        "Pushes:".bold(),
        status.pushes_succeeded.to_string().cyan(),
        "failed:".bold(),
        status.pushes_failed.to_string().yellow()
    );

    if let Some(commit) = status.last_commit {
        println!("  {}: {} {}", "Last commit".bold(), commit.timestamp, commit.message.dimmed());
    }
    if let Some(push) = status.last_push {
        println!("  {}: {}", "Last push".bold(), push.timestamp);
    }

    Ok(())
}
