// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ni-storage: job rows, the durable task spool, the object-store
//! interface, and the append-only audit sink.
//!
//! The relational database behind [`JobStore`] is an external
//! collaborator; this crate pins down the row schema, the required
//! queries, and the transition guards, and ships an in-memory store
//! plus a JSON-snapshot store for embedded and test use.

pub mod audit;
pub mod job_store;
pub mod object_store;
pub mod spool;

pub use audit::AuditLog;
pub use job_store::{FileJobStore, JobStore, MemoryJobStore, StoreError};
pub use object_store::{FsObjectStore, ObjectStore, ObjectStoreError};
pub use spool::{SpoolError, Task, TaskKind, TaskSpool};
