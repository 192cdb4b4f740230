use anyhow::Result;
use colored::Colorize;
use indicatif::ProgressBar;
use std::time::Duration;

pub fn run(port: u16) -> Result<()> {
    let client = super::connect(port)?;

    let spinner = ProgressBar::new_spinner();
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("Pushing all branches");

    let result = client.push();
    spinner.finish_and_clear();

    match result {
        Ok(()) => {
            println!("{}", "Pushed all branches".green());
            Ok(())
        }
        Err(e) => {
            println!("{} {}", "Push failed:".red().bold(), e);
            println!("Run {} for details", "alsync log".cyan());
            Err(e)
        }
    }
}
