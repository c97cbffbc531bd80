// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::fs;

fn write_input(dir: &Path, name: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, name.as_bytes()).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn suffix_chain_handles_compound_extensions() {
    assert_eq!(suffix_chain("T1.nii.gz"), ".nii.gz");
    assert_eq!(suffix_chain("scan.nii"), ".nii");
    assert_eq!(suffix_chain("noext"), "");
    assert_eq!(suffix_chain(".bashrc"), "");
    assert_eq!(suffix_chain(""), "");
}

#[test]
fn renames_to_expected_key_preserving_suffixes() {
    let src = tempfile::tempdir().unwrap();
    let stage = tempfile::tempdir().unwrap();
    let input = write_input(src.path(), "subject42_scan.nii.gz");

    let staged = stage_inputs(stage.path(), &[input], &["T1w"]).unwrap();
    assert_eq!(staged, vec![stage.path().join("T1w.nii.gz")]);
    assert!(stage.path().join("T1w.nii.gz").exists());
}

#[test]
fn extra_inputs_keep_original_names() {
    let src = tempfile::tempdir().unwrap();
    let stage = tempfile::tempdir().unwrap();
    let a = write_input(src.path(), "a.nii");
    let b = write_input(src.path(), "extra.txt");

    let staged = stage_inputs(stage.path(), &[a, b], &["T1w"]).unwrap();
    assert_eq!(
        staged,
        vec![stage.path().join("T1w.nii"), stage.path().join("extra.txt")]
    );
}

#[test]
fn missing_inputs_are_skipped() {
    let stage = tempfile::tempdir().unwrap();
    let staged = stage_inputs(stage.path(), &["/nope/missing.nii".to_string()], &["T1w"]).unwrap();
    assert!(staged.is_empty());
}

#[test]
fn restaging_is_a_noop() {
    let src = tempfile::tempdir().unwrap();
    let stage = tempfile::tempdir().unwrap();
    let input = write_input(src.path(), "scan.nii.gz");

    stage_inputs(stage.path(), std::slice::from_ref(&input), &["T1w"]).unwrap();
    // Overwrite the staged copy, then stage again: the copy must survive.
    fs::write(stage.path().join("T1w.nii.gz"), b"already staged").unwrap();
    stage_inputs(stage.path(), std::slice::from_ref(&input), &["T1w"]).unwrap();

    assert_eq!(fs::read(stage.path().join("T1w.nii.gz")).unwrap(), b"already staged");
}
