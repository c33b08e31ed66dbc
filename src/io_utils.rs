//! I/O utilities for delimited input, exported tables and output directories.
//!
//! Every file the crate touches goes through this module:
//!
//! - **Delimiter resolution**: extension-based auto-detection (`.csv` → comma,
//!   `.tsv` → tab) with manual override support.
//! - **Decoding**: input bytes are decoded with `encoding_rs`, defaulting to
//!   UTF-8, so legacy exports (e.g. windows-1252) load without conversion.
//! - **stdin**: the `-` path convention reads transactions from standard input.
//! - **Exports**: CSV writers for aggregate tables and creation of the output
//!   directory when it does not exist yet.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8, has_headers: bool) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(has_headers)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(
    path: &Path,
    delimiter: u8,
    has_headers: bool,
) -> Result<csv::Reader<Box<dyn Read>>> {
    let reader: Box<dyn Read> = if is_dash(path) {
        Box::new(std::io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        ))
    };
    Ok(open_csv_reader(reader, delimiter, has_headers))
}

/// Creates `dir` (and its parents) unless it already exists.
pub fn ensure_directory(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir).with_context(|| format!("Creating output directory {dir:?}"))
}

pub fn open_csv_writer(path: &Path, delimiter: u8) -> Result<csv::Writer<Box<dyn Write>>> {
    let writer: Box<dyn Write> = Box::new(BufWriter::new(
        File::create(path).with_context(|| format!("Creating output file {path:?}"))?,
    ));
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true);
    Ok(builder.from_writer(writer))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

pub fn reader_headers<R>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
) -> Result<Vec<String>>
where
    R: Read,
{
    let headers = reader.byte_headers()?.clone();
    let mut decoded = decode_record(&headers, encoding)?;
    if let Some(first) = decoded.first_mut() {
        // Spreadsheet exports often prefix the first header with a BOM.
        *first = first.trim_start_matches('\u{feff}').to_string();
    }
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1252;

    #[test]
    fn tsv_extension_selects_tab_delimiter() {
        assert_eq!(
            resolve_input_delimiter(Path::new("sales.TSV"), None),
            DEFAULT_TSV_DELIMITER
        );
        assert_eq!(
            resolve_input_delimiter(Path::new("sales.csv"), None),
            DEFAULT_CSV_DELIMITER
        );
        assert_eq!(resolve_input_delimiter(Path::new("sales.tsv"), Some(b';')), b';');
    }

    #[test]
    fn decode_bytes_honours_legacy_encoding() {
        let decoded = decode_bytes(&[0x43, 0x61, 0x66, 0xE9], WINDOWS_1252).expect("decode");
        assert_eq!(decoded, "Café");
        assert!(resolve_encoding(Some("latin-9000")).is_err());
    }

    #[test]
    fn reader_headers_strip_byte_order_mark() {
        let input = "\u{feff}Date,City\n2024-01-01,Pune\n";
        let mut reader = open_csv_reader(input.as_bytes(), b',', true);
        let headers = reader_headers(&mut reader, UTF_8).expect("headers");
        assert_eq!(headers, vec!["Date".to_string(), "City".to_string()]);
    }
}
