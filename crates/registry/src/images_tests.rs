// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn image_base_strips_tag() {
    assert_eq!(image_base("deepmi/fastsurfer:latest"), "deepmi/fastsurfer");
    assert_eq!(image_base("freesurfer/freesurfer:7.4.1"), "freesurfer/freesurfer");
}

#[test]
fn image_base_strips_digest() {
    assert_eq!(
        image_base("nipreps/fmriprep@sha256:deadbeef"),
        "nipreps/fmriprep"
    );
}

#[test]
fn image_base_without_tag_is_identity() {
    assert_eq!(image_base("bids/validator"), "bids/validator");
}

#[test]
fn allowed_publishers_pass() {
    assert!(image_allowed("freesurfer/freesurfer:7.4.1"));
    assert!(image_allowed("deepmi/fastsurfer:cpu-latest"));
    assert!(image_allowed("nipreps/fmriprep@sha256:abc"));
    assert!(image_allowed("bids/validator:1.0"));
}

#[test]
fn disallowed_images_fail() {
    assert!(!image_allowed("evil.io/miner:latest"));
    assert!(!image_allowed("ubuntu:22.04"));
    assert!(!image_allowed("docker.io/library/alpine"));
}

#[test]
fn tag_cannot_smuggle_an_allowed_prefix() {
    assert!(!image_allowed("evil.io/miner:freesurfer/freesurfer"));
}

#[test]
fn prefix_matching_is_string_prefix() {
    // Documented quirk: a fork sharing the publisher prefix also passes.
    assert!(image_allowed("freesurfer/freesurfer-forked:1.0"));
}
