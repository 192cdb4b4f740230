use anyhow::Result;
use colored::Colorize;

pub fn run(port: u16) -> Result<()> {
    let client = super::connect(port)?;
    let state = client.stop()?;

    println!("{} ({})", "Stop requested".yellow(), state);
    Ok(())
}
