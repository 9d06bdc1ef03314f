use anyhow::Result;
use clap::Parser;

use taskdeck::cli::{Cli, CliCommand};

fn main() -> Result<()> {
    let cli = Cli::parse();
    taskdeck::logging::init_tracing(cli.log_filter.as_deref())?;

    let config = taskdeck::config::from_cli(&cli)?;
    let command = command_or_default(&cli);
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    taskdeck::commands::run_blocking(&config, command, &mut handle)?;

    Ok(())
}

fn command_or_default(cli: &Cli) -> CliCommand {
    cli.command.clone().unwrap_or(CliCommand::Dashboard)
}
