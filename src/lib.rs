pub mod activities;
pub mod appender;
pub mod cli;
pub mod columns;
pub mod data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod extract;
pub mod io_utils;
pub mod merger;
pub mod parser;
pub mod preface;
pub mod process;
pub mod resolver;
pub mod row;
pub mod schema;
pub mod session;
pub mod table;
pub mod timestamps;
pub mod validator;
pub mod verify;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

pub use crate::{
    appender::{CollectingAppender, FieldDataAppender},
    error::MappingError,
    parser::{FieldVisitParser, ParseResult, ParseSummary, SpreadsheetConverter},
    schema::Schema,
};

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("tabular_field_visits", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Parse(args) => process::execute(&args),
        Commands::Validate(args) => verify::execute(&args),
        Commands::Columns(args) => columns::execute(&args),
    }
}
