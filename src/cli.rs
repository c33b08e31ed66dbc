use std::{path::PathBuf, str::FromStr};

use clap::{Args, Parser, Subcommand};

use crate::{
    library::catalogue::{DEFAULT_BOOK_SEED, DEFAULT_MEMBER_SEED},
    loader::DatePolicy,
    segment::{Dimension, Metric},
};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Summarize retail transactions and track library loans",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the full pipeline: clean, explore, segment, derive insights and export tables
    Report(ReportArgs),
    /// Print dataset overview, top products, top cities and revenue statistics
    Explore(ExploreArgs),
    /// Print one aggregate table grouped by one or two dimensions
    Segment(SegmentArgs),
    /// In-memory library catalogue and lending tracker
    Library(LibraryArgs),
}

/// Options shared by every command that reads a transactions file.
#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Transactions file to analyze (may also come from --config)
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,
    /// YAML file supplying defaults for these options
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// What to do with a row whose date cannot be parsed
    #[arg(long = "date-policy", value_enum)]
    pub date_policy: Option<DatePolicy>,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Directory receiving the exported aggregate tables
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: Option<PathBuf>,
    /// Number of products listed in the top products table
    #[arg(long = "top-products")]
    pub top_products: Option<usize>,
    /// Number of cities listed in the top cities table
    #[arg(long = "top-cities")]
    pub top_cities: Option<usize>,
    /// Currency symbol used when printing money values
    #[arg(long)]
    pub currency: Option<String>,
    /// Skip writing aggregate tables to the output directory
    #[arg(long = "no-export")]
    pub no_export: bool,
}

#[derive(Debug, Args)]
pub struct ExploreArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Number of products listed in the top products table
    #[arg(long = "top-products")]
    pub top_products: Option<usize>,
    /// Number of cities listed in the top cities table
    #[arg(long = "top-cities")]
    pub top_cities: Option<usize>,
    /// Currency symbol used when printing money values
    #[arg(long)]
    pub currency: Option<String>,
}

#[derive(Debug, Args)]
pub struct SegmentArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// One or two grouping dimensions, e.g. `season` or `season,store_type`
    #[arg(
        short = 'b',
        long = "by",
        required = true,
        value_delimiter = ',',
        value_parser = parse_dimension
    )]
    pub by: Vec<Dimension>,
    /// Sort rows descending by this metric (ignored for day of week and month)
    #[arg(long, value_parser = parse_metric, default_value = "total-revenue")]
    pub sort: Metric,
    /// Currency symbol used when printing money values
    #[arg(long)]
    pub currency: Option<String>,
}

#[derive(Debug, Args)]
pub struct LibraryArgs {
    #[command(subcommand)]
    pub command: LibraryCommands,
}

#[derive(Debug, Subcommand)]
pub enum LibraryCommands {
    /// Seed a sample catalogue, run a scripted lending session and print the results
    Demo(LibraryDemoArgs),
}

#[derive(Debug, Args)]
pub struct LibraryDemoArgs {
    /// First identifier handed out to books
    #[arg(long = "book-seed", default_value_t = DEFAULT_BOOK_SEED)]
    pub book_seed: u32,
    /// First identifier handed out to members
    #[arg(long = "member-seed", default_value_t = DEFAULT_MEMBER_SEED)]
    pub member_seed: u32,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

pub fn parse_dimension(value: &str) -> Result<Dimension, String> {
    Dimension::from_str(value).map_err(|err| err.to_string())
}

pub fn parse_metric(value: &str) -> Result<Metric, String> {
    Metric::from_str(value).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_delimiter_accepts_named_tokens() {
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter("semicolon"), Ok(b';'));
        assert_eq!(parse_delimiter("#"), Ok(b'#'));
        assert!(parse_delimiter("ab").is_err());
        assert!(parse_delimiter("").is_err());
    }

    #[test]
    fn segment_args_split_dimension_pairs() {
        let cli = Cli::try_parse_from([
            "retail-insights",
            "segment",
            "-i",
            "data.csv",
            "--by",
            "season,store_type",
            "--sort",
            "avg-cost",
        ])
        .expect("parse segment args");
        match cli.command {
            Commands::Segment(args) => {
                assert_eq!(args.by, vec![Dimension::Season, Dimension::StoreType]);
                assert_eq!(args.sort, Metric::AvgCost);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn segment_sorts_by_revenue_unless_told_otherwise() {
        let cli = Cli::try_parse_from(["retail-insights", "segment", "-i", "data.csv", "--by", "city"])
            .expect("parse segment args");
        match cli.command {
            Commands::Segment(args) => assert_eq!(args.sort, Metric::TotalRevenue),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
