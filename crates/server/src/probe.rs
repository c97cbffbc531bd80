// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local system-resource probe.
//!
//! External collaborator boundary: the HTTP layer's system-info
//! endpoint and the submission UI's sizing hints read through
//! [`SystemProbe`]; the default implementation uses sysinfo.

use serde::Serialize;
use std::path::Path;

/// A snapshot of the host's capacity.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SystemResources {
    pub cpu_count: usize,
    pub total_memory_gb: u64,
    pub available_memory_gb: u64,
    pub disk_free_gb: u64,
}

/// Host introspection seam.
pub trait SystemProbe: Send + Sync {
    fn resources(&self, data_dir: &Path) -> SystemResources;
}

/// sysinfo-backed probe.
#[derive(Default)]
pub struct SysinfoProbe;

impl SystemProbe for SysinfoProbe {
    fn resources(&self, data_dir: &Path) -> SystemResources {
        use sysinfo::{Disks, System};

        let mut system = System::new();
        system.refresh_memory();
        system.refresh_cpu();

        const GB: u64 = 1024 * 1024 * 1024;
        let disks = Disks::new_with_refreshed_list();
        // The disk whose mount point is the longest prefix of data_dir
        // holds the job outputs.
        let disk_free = disks
            .iter()
            .filter(|disk| data_dir.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .map(|disk| disk.available_space())
            .unwrap_or(0);

        SystemResources {
            cpu_count: system.cpus().len(),
            total_memory_gb: system.total_memory() / GB,
            available_memory_gb: system.available_memory() / GB,
            disk_free_gb: disk_free / GB,
        }
    }
}

#[cfg(test)]
#[path = "probe_tests.rs"]
mod tests;
