//! Reading spreadsheet exports into [`RawTable`]s and writing series output.
//!
//! Exports come from several tools, so input handling is lenient:
//!
//! - **Delimiter**: `.tsv` implies tab, anything else comma, unless overridden.
//! - **Encoding**: decoded through `encoding_rs`, UTF-8 by default. A leading
//!   byte-order mark on the first header is dropped.
//! - **Ragged rows**: readers are `flexible`, so short rows are padded and long
//!   rows open `Unnamed: N` columns instead of failing the file.
//! - **stdin/stdout**: the `-` path routes through standard streams.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};

use crate::raw::{RawCell, RawTable};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

const BOM: char = '\u{feff}';

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

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    Ok(if is_dash(path) {
        Box::new(std::io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        ))
    })
}

pub fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(std::io::stdout()),
    })
}

pub fn open_csv_writer(path: Option<&Path>) -> Result<csv::Writer<Box<dyn Write>>> {
    let writer = open_output(path)?;
    Ok(csv::WriterBuilder::new()
        .delimiter(DEFAULT_CSV_DELIMITER)
        .from_writer(writer))
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
    if let Some(first) = decoded.first_mut()
        && let Some(stripped) = first.strip_prefix(BOM)
    {
        *first = stripped.to_string();
    }
    Ok(decoded)
}

/// Loads a whole delimited file. Every cell stays text; interpretation is
/// left to the normalizer.
pub fn read_raw_table<R>(
    reader: R,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<RawTable>
where
    R: Read,
{
    let mut reader = open_csv_reader(reader, delimiter);
    let headers = reader_headers(&mut reader, encoding)?;
    let mut table = RawTable::new(&headers);
    for (idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", idx + 2))?;
        let cells = decode_record(&record, encoding)
            .with_context(|| format!("Decoding row {}", idx + 2))?;
        table.push_row(cells.into_iter().map(RawCell::from));
    }
    Ok(table)
}

pub fn read_raw_table_from_path(
    path: &Path,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
) -> Result<RawTable> {
    let delimiter = resolve_input_delimiter(path, delimiter);
    let input = open_input(path)?;
    read_raw_table(input, delimiter, encoding).with_context(|| format!("Loading {path:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiter_follows_extension_unless_overridden() {
        assert_eq!(resolve_input_delimiter(Path::new("a.tsv"), None), b'\t');
        assert_eq!(resolve_input_delimiter(Path::new("a.TSV"), None), b'\t');
        assert_eq!(resolve_input_delimiter(Path::new("a.csv"), None), b',');
        assert_eq!(resolve_input_delimiter(Path::new("a.tsv"), Some(b';')), b';');
    }

    #[test]
    fn unknown_encoding_is_rejected() {
        assert!(resolve_encoding(Some("not-a-charset")).is_err());
        assert_eq!(resolve_encoding(None).unwrap(), UTF_8);
        assert_eq!(
            resolve_encoding(Some("latin1")).unwrap().name(),
            "windows-1252"
        );
    }

    #[test]
    fn bom_and_ragged_rows_are_tolerated() {
        let input = "\u{feff}Empresa,Mes,Año\nAcme,1\nAcme,2,2026,extra\n";
        let table = read_raw_table(input.as_bytes(), b',', UTF_8).unwrap();
        assert_eq!(table.columns(), ["Empresa", "Mes", "Año", "Unnamed: 3"]);
        assert_eq!(table.len(), 2);
        assert!(table.cell(0, 2).is_empty());
        assert_eq!(table.cell(1, 3).as_text(), "extra");
    }

    #[test]
    fn legacy_encodings_decode_accents() {
        let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode("Empresa;Año\nÑandú;2026\n");
        let table = read_raw_table(&bytes[..], b';', encoding_rs::WINDOWS_1252).unwrap();
        assert_eq!(table.columns(), ["Empresa", "Año"]);
        assert_eq!(table.cell(0, 0).as_text(), "Ñandú");
    }
}
