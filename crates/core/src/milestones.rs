// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Phase milestones: fixed progress percentages per pipeline phase.
//!
//! Each plugin has an ordered list of `(marker, percentage, label)`
//! entries. When the executor sees a marker in the container's stdout,
//! the job's progress jumps to that fixed percentage. The percentages
//! are hand-tuned weights of typical wall-clock time per phase, not
//! computed values. Progress never goes backwards.

/// One `(marker, percentage, label)` milestone.
///
/// `marker` is tried as a regular expression first; if it fails to
/// compile it is matched as a plain substring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseMilestone {
    pub marker: &'static str,
    pub pct: u8,
    pub label: &'static str,
}

const fn m(marker: &'static str, pct: u8, label: &'static str) -> PhaseMilestone {
    PhaseMilestone { marker, pct, label }
}

// FreeSurfer recon-all (~6-8 hours).
//
// autorecon1 (motion correct, talairach, skull strip)   ~15 min -> 3%
// autorecon2 (normalize, segment, tessellate, register) ~4-5 h  -> 70%
// autorecon3 (sphere, thickness, stats)                 ~1-2 h  -> 20%
// post-processing (stats, bundle extraction)            ~10 min -> 5%
pub const FREESURFER_RECON_MILESTONES: &[PhaseMilestone] = &[
    m("recon-all", 2, "Initializing recon-all"),
    m("SUBJECTS_DIR", 3, "Setting up subject directory"),
    // autorecon1
    m("Motion Correct", 5, "Motion correction"),
    m("mri_convert", 6, "Converting input format"),
    m("Talairach", 8, "Talairach registration"),
    m("NU Intensity Correction", 10, "Intensity correction (N3)"),
    m("Skull Stripping", 14, "Skull stripping"),
    // autorecon2
    m("EM Register", 18, "EM registration"),
    m("CA Normalize", 20, "CA normalize"),
    m("CA Register", 25, "CA register (atlas)"),
    m("SubCort Seg", 30, "Subcortical segmentation"),
    m("Intensity Normalization2", 33, "Intensity normalization 2"),
    m("White Matter Segmentation", 36, "White matter segmentation"),
    m("Fill", 38, "Filling ventricles"),
    m("Tessellate", 42, "Tessellating hemispheres"),
    m("Smooth1", 45, "Smoothing surface 1"),
    m("Inflation1", 48, "Inflating surface 1"),
    m("QSphere", 52, "Quasi-sphere mapping"),
    m("Fix Topology", 56, "Fixing topology"),
    m("Make White Surface", 60, "Generating white surface"),
    m("Smooth2", 63, "Smoothing surface 2"),
    m("Inflation2", 65, "Inflating surface 2"),
    m("Spherical Mapping", 68, "Spherical mapping"),
    m("Ipsilateral Surface Reg", 72, "Surface registration"),
    m("Cortical Parcellation", 75, "Cortical parcellation (Desikan)"),
    m("Pial Surface", 78, "Generating pial surface"),
    // autorecon3
    m("Cortical Parcellation 2", 82, "Cortical parcellation (DKT)"),
    m("Cortical ribbon", 85, "Cortical ribbon mask"),
    m("Cortical Thickness", 88, "Computing cortical thickness"),
    m("Parcellation Stats", 91, "Parcellation statistics"),
    m("Cortical Parcellation 3", 93, "Cortical parcellation (BA)"),
    m("WM/GM Contrast", 95, "WM/GM contrast"),
    // completion
    m("recon-all.*finished", 97, "recon-all finished"),
    m("FreeSurfer recon-all completed", 100, "Completed"),
];

// FastSurfer (~10-60 min depending on GPU/CPU).
//
// segmentation CNN ~1-5 min -> 35%, surfaces ~5-45 min -> 50%, stats ~2 min -> 10%
pub const FASTSURFER_MILESTONES: &[PhaseMilestone] = &[
    m("run_fastsurfer", 2, "Starting FastSurfer"),
    m("SUBJECTS_DIR", 3, "Setting up directories"),
    // segmentation (CNN)
    m("Running FastSurfer CNN", 5, "Loading segmentation model"),
    m("Loading checkpoint", 8, "Loading model checkpoint"),
    m("Evaluating", 12, "Running CNN segmentation"),
    m("sagittal", 18, "Segmenting sagittal plane"),
    m("coronal", 24, "Segmenting coronal plane"),
    m("axial", 30, "Segmenting axial plane"),
    m("View Aggregation", 35, "Aggregating views"),
    // surface reconstruction
    m("recon-surf", 38, "Starting surface recon"),
    m("mri_convert", 40, "Converting volumes"),
    m("mris_inflate", 50, "Inflating surfaces"),
    m("mris_sphere", 58, "Spherical mapping"),
    m("mris_register", 65, "Surface registration"),
    m("mris_ca_label", 72, "Cortical parcellation"),
    m("mris_anatomical_stats", 80, "Anatomical statistics"),
    m("mri_aparc2aseg", 85, "aparc+aseg creation"),
    // stats & metrics
    m("aseg.stats", 90, "Writing statistics"),
    m("Metrics extracted", 95, "Extracting metrics"),
    // completion
    m("FastSurfer completed", 100, "Completed"),
];

// fMRIPrep (~2-6 hours).
pub const FMRIPREP_MILESTONES: &[PhaseMilestone] = &[
    m("fMRIPrep", 2, "Initializing fMRIPrep"),
    m("Anatomical processing", 8, "Anatomical preprocessing"),
    m("Brain extraction", 15, "Brain extraction"),
    m("Tissue segmentation", 22, "Tissue segmentation"),
    m("Surface reconstruction", 35, "Surface reconstruction"),
    m("BOLD processing", 50, "BOLD preprocessing"),
    m("Slice-timing correction", 55, "Slice-timing correction"),
    m("Head-motion estimation", 60, "Head-motion estimation"),
    m("Susceptibility distortion", 65, "Susceptibility distortion correction"),
    m("Registration", 72, "Registration to standard"),
    m("Confound estimation", 82, "Confound estimation"),
    m("BOLD resampling", 90, "BOLD resampling"),
    m("Generating report", 95, "Generating report"),
    m("fMRIPrep finished", 100, "Completed"),
];

/// Generic fallback for any unknown plugin.
pub const GENERIC_MILESTONES: &[PhaseMilestone] = &[
    m("Starting", 5, "Initializing"),
    m("Processing", 25, "Processing"),
    m("Running", 50, "Running"),
    m("Writing", 75, "Writing outputs"),
    m("completed", 100, "Completed"),
];

/// Milestones for a plugin, falling back to the generic table.
pub fn milestones_for(plugin_id: &str) -> &'static [PhaseMilestone] {
    match plugin_id {
        "freesurfer_recon" | "freesurfer_recon_long" => FREESURFER_RECON_MILESTONES,
        "fastsurfer" | "fastsurfer_seg" => FASTSURFER_MILESTONES,
        "fmriprep" => FMRIPREP_MILESTONES,
        _ => GENERIC_MILESTONES,
    }
}

#[cfg(test)]
#[path = "milestones_tests.rs"]
mod tests;
