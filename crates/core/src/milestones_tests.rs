// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn known_plugins_get_their_tables() {
    assert_eq!(milestones_for("freesurfer_recon"), FREESURFER_RECON_MILESTONES);
    assert_eq!(milestones_for("freesurfer_recon_long"), FREESURFER_RECON_MILESTONES);
    assert_eq!(milestones_for("fastsurfer"), FASTSURFER_MILESTONES);
    assert_eq!(milestones_for("fastsurfer_seg"), FASTSURFER_MILESTONES);
    assert_eq!(milestones_for("fmriprep"), FMRIPREP_MILESTONES);
}

#[test]
fn unknown_plugin_falls_back_to_generic() {
    assert_eq!(milestones_for("qsiprep"), GENERIC_MILESTONES);
    assert_eq!(milestones_for(""), GENERIC_MILESTONES);
}

#[test]
fn tables_are_monotone_in_percentage() {
    for table in [
        FREESURFER_RECON_MILESTONES,
        FASTSURFER_MILESTONES,
        FMRIPREP_MILESTONES,
        GENERIC_MILESTONES,
    ] {
        let mut last = 0;
        for milestone in table {
            assert!(
                milestone.pct >= last,
                "{} at {}% breaks monotonic ordering",
                milestone.marker,
                milestone.pct
            );
            last = milestone.pct;
        }
        assert_eq!(table.last().map(|m| m.pct), Some(100));
    }
}

#[test]
fn markers_are_nonempty() {
    for table in [FREESURFER_RECON_MILESTONES, FASTSURFER_MILESTONES, FMRIPREP_MILESTONES] {
        for milestone in table {
            assert!(!milestone.marker.is_empty());
            assert!(!milestone.label.is_empty());
            assert!(milestone.pct <= 100);
        }
    }
}
