// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File classification, size formatting, and media types.

use serde::Serialize;

/// Coarse file classification by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Volume,
    Metadata,
    Metrics,
    Image,
    Report,
    Log,
    File,
}

ni_core::simple_display! {
    FileType {
        Volume => "volume",
        Metadata => "metadata",
        Metrics => "metrics",
        Image => "image",
        Report => "report",
        Log => "log",
        File => "file",
    }
}

/// Classify a file by its (lowercased) name.
pub fn classify_file(name: &str) -> FileType {
    let lower = name.to_lowercase();
    let has = |suffixes: &[&str]| suffixes.iter().any(|s| lower.ends_with(s));

    if has(&[".nii", ".nii.gz", ".mgz", ".mgh"]) {
        FileType::Volume
    } else if has(&[".json"]) {
        FileType::Metadata
    } else if has(&[".csv", ".tsv", ".stats"]) {
        FileType::Metrics
    } else if has(&[".png", ".jpg", ".jpeg", ".svg"]) {
        FileType::Image
    } else if has(&[".html"]) {
        FileType::Report
    } else if has(&[".log", ".txt"]) {
        FileType::Log
    } else {
        FileType::File
    }
}

/// Human-readable size: `1.5 KB`, `2.3 MB`, ...
pub fn format_size(size_bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if size_bytes < KB {
        format!("{size_bytes} B")
    } else if size_bytes < MB {
        format!("{:.1} KB", size_bytes as f64 / KB as f64)
    } else if size_bytes < GB {
        format!("{:.1} MB", size_bytes as f64 / MB as f64)
    } else {
        format!("{:.1} GB", size_bytes as f64 / GB as f64)
    }
}

/// Best-effort media type for in-browser viewing.
pub fn media_type(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    let has = |suffix: &str| lower.ends_with(suffix);

    if has(".json") {
        "application/json"
    } else if has(".csv") {
        "text/csv"
    } else if has(".tsv") {
        "text/tab-separated-values"
    } else if has(".html") {
        "text/html"
    } else if has(".png") {
        "image/png"
    } else if has(".jpg") || has(".jpeg") {
        "image/jpeg"
    } else if has(".svg") {
        "image/svg+xml"
    } else if has(".txt") || has(".log") {
        "text/plain"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
#[path = "classify_tests.rs"]
mod tests;
