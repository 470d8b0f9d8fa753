//! I/O utilities for input decoding, delimited-text reading and output.
//!
//! All file I/O flows through this module. It provides:
//!
//! - **Encoding**: input decoding via `encoding_rs` with BOM sniffing from
//!   `encoding_rs_io`, defaulting to UTF-8.
//! - **Reader construction**: `open_csv_reader` configured for ragged,
//!   header-less vendor files.
//! - **Spreadsheet sniffing**: magic-byte detection of workbook binaries.
//! - **stdin/stdout**: the `-` path convention routes through standard streams.

use std::{
    fs::File,
    io::{self, BufWriter, Read, Write},
    path::Path,
};

use anyhow::Context;
use encoding_rs::{Encoding, UTF_8};
use encoding_rs_io::DecodeReaderBytesBuilder;

use crate::error::{MappingError, Result};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpreadsheetFormat {
    /// Zip-packaged workbook (`.xlsx` and friends).
    OfficeOpenXml,
    /// Compound-document workbook (`.xls`).
    LegacyCompound,
}

pub fn sniff_spreadsheet(bytes: &[u8]) -> Option<SpreadsheetFormat> {
    if bytes.starts_with(ZIP_MAGIC) {
        Some(SpreadsheetFormat::OfficeOpenXml)
    } else if bytes.starts_with(OLE_MAGIC) {
        Some(SpreadsheetFormat::LegacyCompound)
    } else {
        None
    }
}

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    match label.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => Encoding::for_label(value.as_bytes())
            .ok_or_else(|| MappingError::config(format!("Unknown encoding '{value}'"))),
        None => Ok(UTF_8),
    }
}

/// Decodes raw input to text. A byte-order mark overrides the requested
/// encoding.
pub fn decode_text(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let mut decoder = DecodeReaderBytesBuilder::new()
        .encoding(Some(encoding))
        .bom_sniffing(true)
        .build(bytes);
    let mut text = String::new();
    decoder.read_to_string(&mut text)?;
    Ok(text)
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn read_input(path: &Path) -> anyhow::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    if is_dash(path) {
        io::stdin()
            .lock()
            .read_to_end(&mut bytes)
            .context("Reading standard input")?;
    } else {
        File::open(path)
            .with_context(|| format!("Opening input file {path:?}"))?
            .read_to_end(&mut bytes)
            .with_context(|| format!("Reading input file {path:?}"))?;
    }
    Ok(bytes)
}

pub fn open_output(path: Option<&Path>) -> anyhow::Result<Box<dyn Write>> {
    Ok(match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(io::stdout()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workbooks_are_recognised_by_magic_bytes() {
        assert_eq!(
            sniff_spreadsheet(b"PK\x03\x04rest"),
            Some(SpreadsheetFormat::OfficeOpenXml)
        );
        assert_eq!(
            sniff_spreadsheet(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1]),
            Some(SpreadsheetFormat::LegacyCompound)
        );
        assert_eq!(sniff_spreadsheet(b"Site,Date\n"), None);
    }

    #[test]
    fn byte_order_mark_wins_over_label() {
        let encoding = resolve_encoding(Some("windows-1252")).unwrap();
        let text = decode_text(b"\xEF\xBB\xBFcaf\xC3\xA9", encoding).unwrap();
        assert_eq!(text, "café");
        let latin = decode_text(b"caf\xE9", encoding).unwrap();
        assert_eq!(latin, "café");
    }

    #[test]
    fn unknown_encoding_is_a_configuration_error() {
        assert!(matches!(
            resolve_encoding(Some("nope")),
            Err(MappingError::Configuration(_))
        ));
        assert_eq!(resolve_encoding(None).unwrap(), UTF_8);
    }
}
