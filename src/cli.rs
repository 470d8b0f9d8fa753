use std::path::PathBuf;

use chrono::FixedOffset;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::data::parse_utc_offset;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Map delimited field-visit files onto hydrological visits and activities",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Parse a field data file with the first schema that fits it
    Parse(ParseArgs),
    /// Load and validate schema files, optionally against a sample file
    Validate(ValidateArgs),
    /// List the flattened column definitions of a schema
    Columns(ColumnsArgs),
}

#[derive(Debug, Args)]
pub struct ParseArgs {
    /// Input file to parse (`-` reads standard input)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Schema files to try, in order of their priority
    #[arg(short = 's', long = "schema", required = true, action = clap::ArgAction::Append)]
    pub schemas: Vec<PathBuf>,
    /// Location identifier to use for rows without a location column
    #[arg(long)]
    pub location: Option<String>,
    /// UTC offset for locations registered during the parse (e.g. +10:00)
    #[arg(long = "utc-offset", value_parser = parse_utc_offset, allow_hyphen_values = true)]
    pub utc_offset: Option<FixedOffset>,
    /// Output document format
    #[arg(long, value_enum, default_value = "yaml")]
    pub format: OutputFormat,
    /// Destination file (defaults to stdout)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Schema files to validate
    #[arg(short = 's', long = "schema", required = true, action = clap::ArgAction::Append)]
    pub schemas: Vec<PathBuf>,
    /// Sample input whose header row each schema is checked against
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,
    /// Treat the location as supplied by the host
    #[arg(long)]
    pub fixed_location: bool,
}

#[derive(Debug, Args)]
pub struct ColumnsArgs {
    /// Schema file to describe
    #[arg(short = 's', long = "schema")]
    pub schema: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Yaml,
    Json,
}
