// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container-image allow-list.
//!
//! Submission is rejected unless the image's registry path starts with
//! one of these neuroimaging publishers. The list is fixed at build
//! time; extending it is a code change, not configuration.
//!
//! Matching is a plain string prefix over the image base (tag and
//! digest stripped), so `freesurfer/freesurfer` also matches
//! `freesurfer/freesurfer-forked`. Kept deliberately; see DESIGN.md.

/// Allowed Docker image prefixes for neuroimaging plugins.
pub const ALLOWED_IMAGE_PREFIXES: &[&str] = &[
    "freesurfer/freesurfer",
    "deepmi/fastsurfer",
    "nipreps/fmriprep",
    "pennlinc/xcp_d",
    "pennbbl/qsiprep",
    "pennbbl/qsirecon",
    "pennlinc/qsirecon",
    "nipy/heudiconv",
    "meldproject/meld_graph",
    "nipreps/mriqc",
    "bids/",
];

/// The image base: everything before the first `:` or `@`.
pub fn image_base(image: &str) -> &str {
    let end = image.find([':', '@']).unwrap_or(image.len());
    &image[..end]
}

/// Whether the image's base matches an allow-listed prefix.
pub fn image_allowed(image: &str) -> bool {
    let base = image_base(image);
    ALLOWED_IMAGE_PREFIXES.iter().any(|prefix| base.starts_with(prefix))
}

#[cfg(test)]
#[path = "images_tests.rs"]
mod tests;
