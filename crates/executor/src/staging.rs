// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Input staging: copy inputs into `_inputs/` under the names the
//! plugin's command template expects.

use std::path::{Path, PathBuf};

/// The full suffix chain of a filename (`T1.nii.gz` → `.nii.gz`).
///
/// Leading dots (hidden files) do not count as a suffix.
fn suffix_chain(file_name: &str) -> &str {
    if file_name.len() < 2 {
        return "";
    }
    match file_name[1..].find('.') {
        Some(idx) => &file_name[idx + 1..],
        None => "",
    }
}

/// Copy each existing input into `staging_dir`.
///
/// Input `i` is renamed to `expected_keys[i]` plus the original suffix
/// chain, preserving compound extensions like `.nii.gz`. Inputs beyond
/// the expected list keep their original names. Already-staged files
/// are left alone, so re-staging is a no-op.
///
/// Returns the staged paths, in input order.
pub fn stage_inputs(
    staging_dir: &Path,
    input_files: &[String],
    expected_keys: &[&str],
) -> std::io::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(staging_dir)?;

    let mut staged = Vec::new();
    for (i, input) in input_files.iter().enumerate() {
        let source = Path::new(input);
        // Directory inputs (a previous step's output tree) are already
        // inside the mounted output root; only plain files are staged.
        if !source.is_file() {
            continue;
        }
        let original_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let staged_name = match expected_keys.get(i) {
            Some(key) => format!("{key}{}", suffix_chain(&original_name)),
            None => original_name,
        };

        let target = staging_dir.join(&staged_name);
        if !target.exists() {
            std::fs::copy(source, &target)?;
            tracing::debug!(source = %source.display(), target = %target.display(), "staged input");
        }
        staged.push(target);
    }
    Ok(staged)
}

#[cfg(test)]
#[path = "staging_tests.rs"]
mod tests;
