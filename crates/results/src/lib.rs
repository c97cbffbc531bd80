// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ni-results: read-only projection of a job's output directory as
//! typed, path-safe downloads.
//!
//! Everything reads from the real output tree; no placeholder data.
//! Every path handed back is a descendant of the job's output root.

pub mod classify;
pub mod projection;
pub mod stats;

pub use classify::{classify_file, format_size, media_type, FileType};
pub use projection::{FileEntry, FoundFile, Projection, ProjectionError};
pub use stats::{parse_color_lut, parse_stats_file};
