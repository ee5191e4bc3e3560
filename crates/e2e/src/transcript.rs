//! Recorded conversation loading
//!
//! Transcripts are two significant columns, `Speaker` and `Message`, in
//! either comma-separated text or a spreadsheet container. Column names are
//! matched case-insensitively after trimming; any other columns are ignored.

use std::path::Path;

use calamine::{open_workbook_auto, Reader};
use compare_qa_common::TranscriptRow;
use tracing::debug;

use crate::error::{E2eError, E2eResult};

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xltx", "xltm", "xls", "xlsb", "ods"];
const DELIMITER_CANDIDATES: &[u8] = &[b',', b';', b'\t', b'|'];

/// Load a transcript from disk, dispatching on the file extension
pub fn load_transcript(path: &Path) -> E2eResult<Vec<TranscriptRow>> {
    if !path.exists() {
        let shown = path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf())
            .display()
            .to_string();
        return Err(E2eError::TranscriptNotFound(shown));
    }

    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let origin = path.display().to_string();

    let rows = if ext == "csv" {
        let bytes = std::fs::read(path)?;
        parse_csv(&String::from_utf8_lossy(&bytes), &origin)?
    } else if SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) {
        parse_spreadsheet(path, &origin)?
    } else {
        return Err(E2eError::UnsupportedFormat(format!(".{}", ext)));
    };

    debug!("Loaded {} transcript row(s) from {}", rows.len(), origin);
    Ok(rows)
}

/// Parse comma-separated transcript text.
///
/// Tolerates a leading byte-order mark, exports where every line is wrapped in
/// quotes, and non-comma delimiters detected on the header line.
pub fn parse_csv(raw: &str, origin: &str) -> E2eResult<Vec<TranscriptRow>> {
    let raw = raw.trim_start_matches('\u{feff}');
    let cleaned = unwrap_quoted_lines(raw);
    let header = cleaned.lines().next().unwrap_or_default();
    let delimiter = sniff_delimiter(header);

    match parse_delimited(&cleaned, delimiter, origin) {
        Err(E2eError::MissingColumns { .. }) if delimiter != b',' => {
            debug!(
                "Sniffed delimiter {:?} did not yield the required columns, retrying with ','",
                delimiter as char
            );
            parse_delimited(&cleaned, b',', origin)
        }
        other => other,
    }
}

fn parse_delimited(text: &str, delimiter: u8, origin: &str) -> E2eResult<Vec<TranscriptRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let (speaker_idx, message_idx) = locate_columns(&headers, origin)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(TranscriptRow::new(
            record.get(speaker_idx).unwrap_or_default(),
            record.get(message_idx).unwrap_or_default(),
        ));
    }
    Ok(rows)
}

fn parse_spreadsheet(path: &Path, origin: &str) -> E2eResult<Vec<TranscriptRow>> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| E2eError::TranscriptParse(format!("{} has no worksheets", origin)))??;

    let mut sheet_rows = range.rows();
    let headers: Vec<String> = match sheet_rows.next() {
        Some(cells) => cells.iter().map(|c| c.to_string().trim().to_string()).collect(),
        None => Vec::new(),
    };
    let (speaker_idx, message_idx) = locate_columns(&headers, origin)?;

    let rows = sheet_rows
        .filter(|cells| cells.iter().any(|c| !c.to_string().trim().is_empty()))
        .map(|cells| {
            let cell = |i: usize| cells.get(i).map(|c| c.to_string()).unwrap_or_default();
            TranscriptRow::new(cell(speaker_idx), cell(message_idx))
        })
        .collect();
    Ok(rows)
}

fn locate_columns(headers: &[String], origin: &str) -> E2eResult<(usize, usize)> {
    let find = |name: &str| headers.iter().position(|h| h.to_lowercase() == name);
    match (find("speaker"), find("message")) {
        (Some(s), Some(m)) => Ok((s, m)),
        _ => Err(E2eError::MissingColumns {
            path: origin.to_string(),
            found: headers.to_vec(),
        }),
    }
}

/// Undo exports that wrap each whole line in quotes, e.g. `"Speaker,Message"`.
///
/// Detection happens on the header line only; when it matches, every line
/// that is wrapped gets its outer quotes removed and doubled quotes
/// collapsed. A header like `"Speaker","Message"` is ordinary quoting and is
/// left alone.
pub fn unwrap_quoted_lines(raw: &str) -> String {
    let mut lines = raw.lines();
    let header = match lines.next() {
        Some(h) => h.trim(),
        None => return raw.to_string(),
    };
    if !is_wrapped(header) || !header.contains(',') {
        return raw.to_string();
    }
    let inner = &header[1..header.len() - 1];
    if inner.replace("\"\"", "").contains('"') {
        return raw.to_string();
    }

    raw.lines()
        .map(|line| {
            let s = line.trim();
            if is_wrapped(s) {
                s[1..s.len() - 1].replace("\"\"", "\"")
            } else {
                s.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_wrapped(s: &str) -> bool {
    s.len() >= 2 && s.starts_with('"') && s.ends_with('"')
}

/// Pick the most frequent candidate delimiter outside quotes, comma on no evidence
pub fn sniff_delimiter(header: &str) -> u8 {
    let mut counts = [0usize; 4];
    let mut in_quotes = false;
    for b in header.bytes() {
        if b == b'"' {
            in_quotes = !in_quotes;
            continue;
        }
        if in_quotes {
            continue;
        }
        if let Some(i) = DELIMITER_CANDIDATES.iter().position(|&c| c == b) {
            counts[i] += 1;
        }
    }

    let mut best = 0;
    for i in 1..counts.len() {
        if counts[i] > counts[best] {
            best = i;
        }
    }
    if counts[best] == 0 {
        b','
    } else {
        DELIMITER_CANDIDATES[best]
    }
}
