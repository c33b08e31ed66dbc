pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod explore;
pub mod export;
pub mod format;
pub mod insights;
pub mod io_utils;
pub mod library;
pub mod loader;
pub mod report;
pub mod segment;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("retail_insights", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Report(args) => report::execute(&args),
        Commands::Explore(args) => explore::execute(&args),
        Commands::Segment(args) => segment::execute(&args),
        Commands::Library(args) => library::execute(&args),
    }
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
