//! Command-line interface

pub mod args;
pub mod commands;
pub mod output;

pub use args::{Args, Command, LogFormat};
pub use commands::App;

use console::style;
use tracing::error;

use crate::config::Config;
use crate::errors::Result;
use crate::status::ExitStatus;

/// Load configuration for the parsed arguments
pub fn load_app(args: &Args) -> Result<App> {
    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = args.data_dir.clone().unwrap_or_else(|| config.data_dir());
    Ok(App::new(config, &data_dir))
}

async fn dispatch(args: Args) -> Result<ExitStatus> {
    let app = load_app(&args)?;
    match args.command {
        Command::Run(run) => commands::run(&app, run).await,
        Command::Send(send) => commands::send(&app, send).await,
        Command::Env(command) => commands::env(&app, command),
        Command::Cookies(command) => commands::cookies(&app, command),
        Command::Import { file } => commands::import(&app, &file),
        Command::Collections => commands::collections(&app),
        Command::History { clear } => commands::history(&app, clear),
    }
}

/// Run a parsed command line and map failures to an exit status
pub async fn run(args: Args) -> ExitStatus {
    match dispatch(args).await {
        Ok(status) => status,
        Err(err) => {
            error!(error = %err, "command failed");
            eprintln!("{} {}", style("error:").red().bold(), err);
            ExitStatus::Error
        }
    }
}
