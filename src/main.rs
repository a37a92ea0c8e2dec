mod config;
mod frame;
mod input;
mod model;
mod poller;
mod policy;
mod render;
mod router;
mod rpc;
mod term;
mod tui;

use std::{fs::OpenOptions, io, path::Path, process};

use anyhow::{Context, Result};
use clap::Parser;
use config::{build_config, Cli};
use env_logger::{Env, Target};
use log::LevelFilter;

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err:#}");
        process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    let config = build_config(&cli)?;
    init_logging(config.log_level, config.log_file.as_deref())?;
    tui::run(config)
}

// The dashboard owns the terminal, so logs go to a file or nowhere.
fn init_logging(level: LevelFilter, log_file: Option<&Path>) -> Result<()> {
    let target = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            Target::Pipe(Box::new(file))
        }
        None => Target::Pipe(Box::new(io::sink())),
    };
    let env = Env::default().default_filter_or(level.to_string());
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .target(target)
        .try_init();
    Ok(())
}
