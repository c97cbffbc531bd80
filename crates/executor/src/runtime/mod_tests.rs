// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn bind_strings() {
    assert_eq!(Bind::ro("/host/in", "/data/inputs").to_bind_string(), "/host/in:/data/inputs:ro");
    assert_eq!(Bind::rw("/host/out", "/data/outputs").to_bind_string(), "/host/out:/data/outputs");
}

#[test]
fn run_spec_builder_chain() {
    let spec = RunSpec::new("deepmi/fastsurfer:latest")
        .command("run_fastsurfer.sh --t1 /data/inputs/T1w.nii.gz")
        .memory_gb(16)
        .cpus(8)
        .gpu(true)
        .security_opt(vec!["no-new-privileges".to_string()])
        .network_mode("none")
        .labels(vec![("managed-by".to_string(), "neuroinsight".to_string())]);

    assert_eq!(spec.image, "deepmi/fastsurfer:latest");
    assert_eq!(spec.memory_gb, 16);
    assert!(spec.gpu);
    assert_eq!(spec.network_mode.as_deref(), Some("none"));
    assert!(spec.command.as_deref().unwrap().starts_with("run_fastsurfer.sh"));
}
