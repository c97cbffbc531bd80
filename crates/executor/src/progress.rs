// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Milestone progress reducer.
//!
//! Accumulates container stdout and maps marker sightings to monotone
//! progress. Markers are tried as regular expressions; an invalid
//! pattern falls back to substring matching. At most one milestone
//! advances per log chunk; later chunks pick up the rest.

use ni_core::PhaseMilestone;
use regex::Regex;

/// Owns the log buffer and the current progress for one running
/// container. The reducer is the only writer to either.
pub struct MilestoneTracker {
    milestones: &'static [PhaseMilestone],
    patterns: Vec<Option<Regex>>,
    buffer: String,
    current: u8,
    /// Progress band: milestone percentages are rescaled into
    /// `[base, base + range]` (workflow steps own a slice of 0-90).
    base: u8,
    range: u8,
}

impl MilestoneTracker {
    /// Full-band tracker starting from `initial` percent.
    pub fn new(milestones: &'static [PhaseMilestone], initial: u8) -> Self {
        Self::with_band(milestones, initial, 0, 100)
    }

    /// Tracker whose milestones are rescaled into `[base, base+range]`.
    pub fn with_band(
        milestones: &'static [PhaseMilestone],
        initial: u8,
        base: u8,
        range: u8,
    ) -> Self {
        let patterns = milestones.iter().map(|m| Regex::new(m.marker).ok()).collect();
        Self { milestones, patterns, buffer: String::new(), current: initial, base, range }
    }

    pub fn progress(&self) -> u8 {
        self.current
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    fn scaled(&self, pct: u8) -> u8 {
        self.base + ((pct as u32 * self.range as u32) / 100) as u8
    }

    fn matches(&self, idx: usize, marker: &str) -> bool {
        match &self.patterns[idx] {
            Some(regex) => regex.is_match(&self.buffer),
            None => self.buffer.contains(marker),
        }
    }

    /// Feed one log chunk.
    ///
    /// Returns `(progress, label)` when a milestone advanced. Progress
    /// never decreases, and only one milestone fires per chunk.
    pub fn observe(&mut self, chunk: &str) -> Option<(u8, String)> {
        self.buffer.push_str(chunk);

        for (idx, milestone) in self.milestones.iter().enumerate() {
            let pct = self.scaled(milestone.pct);
            if pct <= self.current {
                continue;
            }
            // 100 is reserved: a terminal marker only becomes 100 once
            // the exit code is observed as zero.
            if pct >= 100 {
                continue;
            }
            if self.matches(idx, milestone.marker) {
                self.current = pct;
                return Some((pct, milestone.label.to_string()));
            }
        }
        None
    }
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
