// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! FreeSurfer statistics parsers.
//!
//! `.stats` grammar:
//! - `# Measure <struct>, <short>, <desc>, <value>, <unit>` becomes one
//!   `{short: value}` pair (float when it parses, string otherwise).
//! - `# ColHeaders <h1> <h2> ...` opens a table; subsequent
//!   non-comment rows with a matching column count become ordered rows
//!   coerced to float where possible.
//!
//! A file yielding neither measures nor a table parses to `None`.

use serde_json::{Map, Value};

fn coerce(raw: &str) -> Value {
    match raw.parse::<f64>() {
        Ok(number) => serde_json::json!(number),
        Err(_) => Value::String(raw.to_string()),
    }
}

/// Parse a FreeSurfer `.stats` document.
pub fn parse_stats_file(text: &str) -> Option<Value> {
    let mut measures = Map::new();
    let mut table: Vec<Value> = Vec::new();
    let mut headers: Vec<String> = Vec::new();

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("# Measure") {
            let parts: Vec<&str> = rest.split(',').map(|p| p.trim()).collect();
            if parts.len() >= 4 {
                measures.insert(parts[1].to_string(), coerce(parts[3]));
            }
        } else if let Some(rest) = line.strip_prefix("# ColHeaders") {
            headers = rest.split_whitespace().map(|h| h.to_string()).collect();
        } else if !line.starts_with('#') && !line.trim().is_empty() && !headers.is_empty() {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() == headers.len() {
                let mut row = Map::new();
                for (header, value) in headers.iter().zip(&cols) {
                    row.insert(header.clone(), coerce(value));
                }
                table.push(Value::Object(row));
            }
        }
    }

    if measures.is_empty() && table.is_empty() {
        return None;
    }
    if !table.is_empty() {
        measures.insert("table".to_string(), Value::Array(table));
    }
    Some(Value::Object(measures))
}

/// Parse a FreeSurfer-style color LUT: hash-delimited lines of
/// `idx name R G B flag`.
pub fn parse_color_lut(text: &str) -> Value {
    let mut labels = Map::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 5 {
            let (r, g, b) = (
                parts[2].parse::<u8>().unwrap_or(0),
                parts[3].parse::<u8>().unwrap_or(0),
                parts[4].parse::<u8>().unwrap_or(0),
            );
            labels.insert(
                parts[0].to_string(),
                serde_json::json!({
                    "name": parts[1],
                    "color": format!("#{r:02x}{g:02x}{b:02x}"),
                }),
            );
        }
    }
    Value::Object(labels)
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
