//! Static HTML session report

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use compare_qa_common::TranscriptEvent;
use tracing::info;

use crate::error::E2eResult;

const STYLE: &str = " body { font-family: -apple-system, system-ui, Segoe UI, Roboto, Helvetica, Arial, sans-serif; margin: 24px; }
 table { border-collapse: collapse; width: 100%; }
 th, td { border: 1px solid #ddd; padding: 8px; vertical-align: top; }
 th { background: #f7f7f7; text-align: left; }";

/// Escape text for HTML element and attribute content
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render events in append order. Pure: the same input gives the same bytes.
pub fn render_report(events: &[TranscriptEvent], session_id: &str, title: &str) -> String {
    let mut rows = String::new();
    for event in events {
        let _ = write!(
            rows,
            "<tr><td>{}</td><td>{}</td><td style='white-space:pre-wrap'>{}",
            escape_html(&event.timestamp),
            escape_html(&event.agent),
            escape_html(&event.text)
        );
        if let Some(shot) = &event.screenshot {
            let _ = write!(
                rows,
                "<div style='margin-top:6px'><img src='{}' alt='screenshot' \
                 style='max-width:100%;border:1px solid #ddd;border-radius:6px'/></div>",
                escape_html(&shot.display().to_string())
            );
        }
        rows.push_str("</td></tr>\n");
    }

    let title = escape_html(title);
    format!(
        "<!doctype html>
<html lang=\"en\">
<head>
<meta charset=\"utf-8\">
<title>{title} (Session {session})</title>
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">
<style>
{STYLE}
</style>
</head>
<body>
<h1>{title}</h1>
<table>
  <thead><tr><th>Timestamp</th><th>Who</th><th>Message / Action</th></tr></thead>
  <tbody>
{rows}  </tbody>
</table>
</body>
</html>
",
        session = escape_html(session_id),
    )
}

/// Render and write a report, creating the parent directory
pub fn write_report(
    path: &Path,
    events: &[TranscriptEvent],
    session_id: &str,
    title: &str,
) -> E2eResult<PathBuf> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_report(events, session_id, title))?;
    info!("HTML report: {}", path.display());
    Ok(path.to_path_buf())
}

/// Session identifier of the form `<prefix>-YYYYmmdd-HHMMSS`
pub fn session_id(prefix: &str) -> String {
    format!("{}-{}", prefix, chrono::Local::now().format("%Y%m%d-%H%M%S"))
}
