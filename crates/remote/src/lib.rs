// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ni-remote: long-lived, thread-safe SSH+SFTP session.
//!
//! One process-wide session bound to at most one `{host, port, user}`.
//! Every operation refreshes the last-activity time and re-arms the
//! idle-eviction timer; a dead transport triggers one silent reconnect
//! before the operation surfaces `ConnectionLost`.

pub mod session;

pub use session::{
    ConnectionInfo, DirEntry, DirEntryKind, SessionHealth, SshConfig, SshError, SshSession,
};
