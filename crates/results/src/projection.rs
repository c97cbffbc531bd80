// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The projection itself: listing, discovery, download resolution,
//! export, and provenance over one job's output tree.

use crate::classify::{classify_file, format_size, FileType};
use crate::stats::{parse_color_lut, parse_stats_file};
use flate2::write::GzEncoder;
use flate2::Compression;
use ni_core::Job;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("no output directory for job {0}. Job may still be running or has no results.")]
    NoResults(String),

    #[error("invalid file path (path traversal detected)")]
    PathTraversal,

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("not a file: {0}")]
    NotAFile(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One listed output file.
#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    /// Path relative to the output root.
    pub name: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    /// Download path for the HTTP layer.
    pub path: String,
    pub size_bytes: u64,
    pub size: String,
}

/// One discovered volume or segmentation.
#[derive(Debug, Clone, Serialize)]
pub struct FoundFile {
    pub name: String,
    pub path: String,
    pub size: String,
}

/// Read-only view over one job's output directory.
pub struct Projection {
    job_id: String,
    root: PathBuf,
}

/// Every file under `root`, relative paths, `_inputs/` excluded,
/// sorted.
fn walk(root: &Path) -> Vec<PathBuf> {
    fn visit(dir: &Path, found: &mut Vec<PathBuf>) {
        let Ok(entries) = std::fs::read_dir(dir) else { return };
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.is_dir() {
                visit(&path, found);
            } else {
                found.push(path);
            }
        }
    }

    let mut found = Vec::new();
    let Ok(entries) = std::fs::read_dir(root) else {
        return found;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        // The staging directory is internal.
        if path.file_name().and_then(|n| n.to_str()) == Some("_inputs") {
            continue;
        }
        if path.is_dir() {
            visit(&path, &mut found);
        } else {
            found.push(path);
        }
    }
    found.sort();
    found
}

impl Projection {
    pub fn new(job_id: impl Into<String>, output_root: impl Into<PathBuf>) -> Self {
        Self { job_id: job_id.into(), root: output_root.into() }
    }

    pub fn exists(&self) -> bool {
        self.root.exists()
    }

    fn ensure_exists(&self) -> Result<(), ProjectionError> {
        if self.exists() {
            Ok(())
        } else {
            Err(ProjectionError::NoResults(self.job_id.clone()))
        }
    }

    fn rel(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .display()
            .to_string()
    }

    fn download_path(&self, rel: &str) -> String {
        format!("/api/results/{}/download?file_path={rel}", self.job_id)
    }

    /// Flat listing of every output file with classification and size.
    pub fn list_files(&self) -> Result<Vec<FileEntry>, ProjectionError> {
        self.ensure_exists()?;
        let mut entries = Vec::new();
        for path in walk(&self.root) {
            let rel = self.rel(&path);
            let size_bytes = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            entries.push(FileEntry {
                file_type: classify_file(name),
                path: self.download_path(&rel),
                size_bytes,
                size: format_size(size_bytes),
                name: rel,
            });
        }
        Ok(entries)
    }

    fn find_files(&self, patterns: &[&str]) -> Vec<FoundFile> {
        walk(&self.root)
            .into_iter()
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?.to_lowercase();
                if !patterns.iter().any(|p| name.contains(p)) {
                    return None;
                }
                let rel = self.rel(&path);
                let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                Some(FoundFile {
                    path: self.download_path(&rel),
                    name: rel,
                    size: format_size(size),
                })
            })
            .collect()
    }

    /// Main anatomical volume candidates, falling back to any NIfTI.
    pub fn volumes(&self) -> Result<Vec<FoundFile>, ProjectionError> {
        self.ensure_exists()?;
        let named = self.find_files(&["norm.nii", "t1w.nii", "brain.nii", "anatomy.nii", "orig.nii"]);
        if !named.is_empty() {
            return Ok(named);
        }
        Ok(self.find_files(&[".nii.gz", ".nii"]))
    }

    /// Segmentation overlays.
    pub fn segmentations(&self) -> Result<Vec<FoundFile>, ProjectionError> {
        self.ensure_exists()?;
        Ok(self.find_files(&["aseg.nii", "aparc", "segmentation.nii", "labels.nii", "dseg.nii"]))
    }

    /// Label definitions: the first `*labels*.json`, else a parsed
    /// FreeSurfer color LUT. None when the output has neither.
    pub fn labels(&self) -> Result<Option<(serde_json::Value, String)>, ProjectionError> {
        self.ensure_exists()?;
        for path in walk(&self.root) {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
            if name.to_lowercase().contains("labels") && name.ends_with(".json") {
                if let Ok(text) = std::fs::read_to_string(&path) {
                    if let Ok(value) = serde_json::from_str(&text) {
                        return Ok(Some((value, name.to_string())));
                    }
                }
            }
        }
        for path in walk(&self.root) {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
            if name.contains("ColorLUT") {
                if let Ok(text) = std::fs::read_to_string(&path) {
                    return Ok(Some((parse_color_lut(&text), name.to_string())));
                }
            }
        }
        Ok(None)
    }

    /// Quantitative metrics: decoded JSON summaries, parsed `.stats`
    /// files, and the relative paths of CSV/TSV tables for the UI.
    pub fn metrics(
        &self,
    ) -> Result<(serde_json::Map<String, serde_json::Value>, Vec<String>, Vec<String>), ProjectionError>
    {
        self.ensure_exists()?;
        let mut metrics = serde_json::Map::new();
        let mut sources = Vec::new();
        let mut tables = Vec::new();

        let json_patterns = ["metrics", "stats", "summary"];
        for path in walk(&self.root) {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
            let lower = name.to_lowercase();
            let stem = lower.trim_end_matches(".json");

            if lower.ends_with(".json")
                && (json_patterns.iter().any(|p| stem.starts_with(p)) || stem.ends_with("_stats"))
            {
                if let Ok(text) = std::fs::read_to_string(&path) {
                    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) {
                        metrics.insert(stem.to_string(), value);
                        sources.push(self.rel(&path));
                    }
                }
            } else if lower.ends_with(".stats") {
                if let Ok(text) = std::fs::read_to_string(&path) {
                    if let Some(parsed) = parse_stats_file(&text) {
                        let stem = lower.trim_end_matches(".stats").to_string();
                        metrics.insert(stem, parsed);
                        sources.push(self.rel(&path));
                    }
                }
            } else if lower.ends_with(".csv") || lower.ends_with(".tsv") {
                tables.push(self.rel(&path));
            }
        }

        Ok((metrics, tables, sources))
    }

    /// Resolve a download request to an absolute path plus media type.
    ///
    /// The resolved path must stay inside the output root; `..`
    /// segments, absolute paths, and symlink escapes are rejected.
    pub fn resolve_download(&self, file_path: &str) -> Result<(PathBuf, &'static str), ProjectionError> {
        let requested = Path::new(file_path);
        let mut clean = PathBuf::new();
        for component in requested.components() {
            match component {
                Component::Normal(part) => clean.push(part),
                Component::CurDir => {}
                _ => return Err(ProjectionError::PathTraversal),
            }
        }

        let target = self.root.join(&clean);
        if !target.exists() {
            return Err(ProjectionError::FileNotFound(file_path.to_string()));
        }

        // Symlinks must not lead outside the root either.
        let canonical_root = self.root.canonicalize()?;
        let canonical = target.canonicalize()?;
        if !canonical.starts_with(&canonical_root) {
            return Err(ProjectionError::PathTraversal);
        }
        if !canonical.is_file() {
            return Err(ProjectionError::NotAFile(file_path.to_string()));
        }

        let name = canonical
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let media = crate::classify::media_type(name);
        Ok((canonical, media))
    }

    /// Write the whole output tree (minus `_inputs/`) as a gzip tar
    /// archive.
    pub fn export<W: std::io::Write>(&self, writer: W) -> Result<(), ProjectionError> {
        self.ensure_exists()?;
        let encoder = GzEncoder::new(writer, Compression::default());
        let mut archive = tar::Builder::new(encoder);
        for path in walk(&self.root) {
            let rel = self.rel(&path);
            archive.append_path_with_name(&path, &rel)?;
        }
        archive.into_inner()?.finish()?;
        Ok(())
    }

    /// Suggested archive filename.
    pub fn export_filename(&self) -> String {
        let short: String = self.job_id.chars().take(8).collect();
        format!("neuroinsight_{short}_results.tar.gz")
    }

    /// Reproducibility record: `job_spec.json` merged with row timing
    /// and a SHA-256 of every input file that still exists locally.
    pub fn provenance(&self, job: Option<&Job>) -> serde_json::Value {
        let spec: serde_json::Value = std::fs::read_to_string(self.root.join("job_spec.json"))
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_else(|| serde_json::json!({}));

        let mut input_hashes = serde_json::Map::new();
        if let Some(inputs) = spec.get("input_files").and_then(|v| v.as_array()) {
            for input in inputs.iter().filter_map(|i| i.as_str()) {
                let path = Path::new(input);
                if let Ok(bytes) = std::fs::read(path) {
                    let digest = hex::encode(Sha256::digest(&bytes));
                    let name = path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or(input)
                        .to_string();
                    input_hashes.insert(name, serde_json::json!(format!("sha256:{digest}")));
                }
            }
        }

        let execution = match job {
            Some(job) => serde_json::json!({
                "submitted_at": job.submitted_at.to_rfc3339(),
                "started_at": job.started_at.map(|t| t.to_rfc3339()),
                "completed_at": job.completed_at.map(|t| t.to_rfc3339()),
                "exit_code": job.exit_code,
                "backend_type": job.backend_type,
                "backend_job_id": job.backend_job_id,
            }),
            None => serde_json::json!({}),
        };

        serde_json::json!({
            "job_id": self.job_id,
            "container_image": spec.get("container_image"),
            "plugin_id": spec.get("plugin_id"),
            "workflow_id": spec.get("workflow_id"),
            "parameters": spec.get("parameters").cloned().unwrap_or_else(|| serde_json::json!({})),
            "resources": spec.get("resources").cloned().unwrap_or_else(|| serde_json::json!({})),
            "input_files": spec.get("input_files").cloned().unwrap_or_else(|| serde_json::json!([])),
            "input_hashes": input_hashes,
            "execution": execution,
            "reproducibility_command": build_repro_command(&spec),
        })
    }
}

/// Best-effort CLI line to reproduce a job.
fn build_repro_command(spec: &serde_json::Value) -> String {
    let Some(image) = spec.get("container_image").and_then(|i| i.as_str()) else {
        return String::new();
    };
    if image.is_empty() {
        return String::new();
    }
    let mut parts = vec![
        "docker run --rm".to_string(),
        "-v $(pwd)/inputs:/data/inputs:ro".to_string(),
        "-v $(pwd)/outputs:/data/outputs:rw".to_string(),
    ];
    match spec.get("command_template").and_then(|c| c.as_str()) {
        Some(command) if !command.trim().is_empty() => {
            let snippet: String = command.trim().chars().take(200).collect();
            parts.push(format!("{image} /bin/bash -c \"{snippet}...\""));
        }
        _ => parts.push(image.to_string()),
    }
    parts.join(" \\\n  ")
}

#[cfg(test)]
#[path = "projection_tests.rs"]
mod tests;
