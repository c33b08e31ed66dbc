//! Run configuration: an optional YAML file overlaid by command-line flags.
//!
//! ```yaml
//! input: data/Retail_Transactions_Dataset.csv
//! output_dir: analysis_output
//! delimiter: ","
//! date_policy: skip
//! top_products: 5
//! top_cities: 10
//! currency: "$"
//! ```

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    cli::{SourceArgs, parse_delimiter},
    io_utils,
    loader::{DatePolicy, LoadOptions},
};

pub const DEFAULT_OUTPUT_DIR: &str = "analysis_output";
pub const DEFAULT_TOP_PRODUCTS: usize = 5;
pub const DEFAULT_TOP_CITIES: usize = 10;
pub const DEFAULT_CURRENCY: &str = "₹";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub input: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub delimiter: Option<String>,
    pub input_encoding: Option<String>,
    pub date_policy: Option<DatePolicy>,
    pub top_products: Option<usize>,
    pub top_cities: Option<usize>,
    pub currency: Option<String>,
    pub export: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let reader = BufReader::new(file);
        serde_yaml::from_reader(reader).with_context(|| format!("Parsing config YAML {path:?}"))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("Parsing config YAML")
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default, Clone, Copy)]
pub struct Overrides<'a> {
    pub output_dir: Option<&'a Path>,
    pub top_products: Option<usize>,
    pub top_cities: Option<usize>,
    pub currency: Option<&'a str>,
    pub no_export: bool,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub input: PathBuf,
    pub load: LoadOptions,
    pub output_dir: PathBuf,
    pub top_products: usize,
    pub top_cities: usize,
    pub currency: String,
    pub export: bool,
}

impl Settings {
    pub fn resolve(source: &SourceArgs, overrides: Overrides<'_>) -> Result<Self> {
        let file = match &source.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::merge(source, overrides, file)
    }

    pub fn merge(source: &SourceArgs, overrides: Overrides<'_>, file: FileConfig) -> Result<Self> {
        let input = source
            .input
            .clone()
            .or(file.input)
            .ok_or_else(|| anyhow!("No input file given. Pass --input or set `input` in --config."))?;
        let file_delimiter = file
            .delimiter
            .as_deref()
            .map(parse_delimiter)
            .transpose()
            .map_err(|err| anyhow!("Invalid delimiter in config: {err}"))?;
        let delimiter = io_utils::resolve_input_delimiter(&input, source.delimiter.or(file_delimiter));
        let encoding = io_utils::resolve_encoding(
            source
                .input_encoding
                .as_deref()
                .or(file.input_encoding.as_deref()),
        )?;
        let date_policy = source.date_policy.or(file.date_policy).unwrap_or_default();

        let settings = Settings {
            input,
            load: LoadOptions {
                delimiter,
                encoding,
                date_policy,
            },
            output_dir: overrides
                .output_dir
                .map(Path::to_path_buf)
                .or(file.output_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            top_products: overrides
                .top_products
                .or(file.top_products)
                .unwrap_or(DEFAULT_TOP_PRODUCTS),
            top_cities: overrides
                .top_cities
                .or(file.top_cities)
                .unwrap_or(DEFAULT_TOP_CITIES),
            currency: overrides
                .currency
                .map(str::to_string)
                .or(file.currency)
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            export: !overrides.no_export && file.export.unwrap_or(true),
        };
        debug!("Resolved settings: {settings:?}");
        Ok(settings)
    }
}
