// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSH session state, command execution, and SFTP file operations.

use parking_lot::Mutex;
use serde::Serialize;
use ssh2::{OpenFlags, OpenType, Session, Sftp};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);
/// Auto-disconnect after 30 idle minutes. Zero disables eviction.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(1800);

#[derive(Debug, Error)]
pub enum SshError {
    #[error("SSH not configured. Call configure(host, username) first.")]
    NotConfigured,

    #[error("authentication failed for {user}@{host}. Ensure your SSH key is loaded (ssh-add) or set key_path. Error: {reason}")]
    Auth { user: String, host: String, reason: String },

    #[error("cannot connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    /// The transport died and one reconnect attempt failed. Callers may
    /// retry the whole operation.
    #[error("SSH connection lost: {0}")]
    ConnectionLost(String),

    #[error("command failed (exit {exit_code}): {command}\nstderr: {stderr}")]
    Command { command: String, exit_code: i32, stderr: String },

    #[error("sftp error on {path}: {reason}")]
    Sftp { path: String, reason: String },
}

/// Connection parameters for [`SshSession::configure`].
#[derive(Debug, Clone)]
pub struct SshConfig {
    pub host: String,
    pub username: String,
    pub port: u16,
    /// Private key file. None prefers the SSH agent, then default keys.
    pub key_path: Option<PathBuf>,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    pub keepalive_interval: Duration,
    pub idle_timeout: Duration,
}

impl SshConfig {
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            port: 22,
            key_path: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    ni_core::setters! {
        set {
            port: u16,
            connect_timeout: Duration,
            command_timeout: Duration,
            keepalive_interval: Duration,
            idle_timeout: Duration,
        }
        option {
            key_path: PathBuf,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }

    fn same_endpoint(&self, other: &SshConfig) -> bool {
        self.host == other.host && self.username == other.username && self.port == other.port
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DirEntryKind {
    Directory,
    File,
}

/// One remote directory entry.
#[derive(Debug, Clone, Serialize)]
pub struct DirEntry {
    pub name: String,
    pub path: String,
    pub kind: DirEntryKind,
    pub size: u64,
    pub modified: Option<u64>,
}

/// Directories first, then case-insensitive name order.
pub(crate) fn sort_entries(entries: &mut [DirEntry]) {
    entries.sort_by(|a, b| {
        let rank = |e: &DirEntry| match e.kind {
            DirEntryKind::Directory => 0,
            DirEntryKind::File => 1,
        };
        rank(a)
            .cmp(&rank(b))
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}

/// Snapshot of the current connection state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConnectionInfo {
    pub connected: bool,
    pub host: Option<String>,
    pub username: Option<String>,
    pub port: Option<u16>,
    pub uptime_seconds: u64,
    pub last_activity_seconds_ago: Option<u64>,
    pub idle_timeout_seconds: Option<u64>,
    pub idle_timeout_remaining: Option<u64>,
}

/// Health-check outcome. Never an error.
#[derive(Debug, Clone, Serialize)]
pub struct SessionHealth {
    pub healthy: bool,
    pub message: String,
    pub remote_hostname: Option<String>,
    pub info: ConnectionInfo,
}

struct State {
    config: Option<SshConfig>,
    session: Option<Session>,
    sftp: Option<Sftp>,
    connected_at: Option<Instant>,
    last_activity: Option<Instant>,
    /// Called with the idle seconds when the eviction timer fires.
    idle_hook: Option<Arc<dyn Fn(u64) + Send + Sync>>,
}

struct Inner {
    state: Mutex<State>,
    /// Bumped on every activity; a pending idle timer only fires if its
    /// generation is still current, so re-arming cancels atomically.
    idle_gen: AtomicU64,
}

/// Thread-safe SSH session with connection reuse and cached SFTP.
///
/// Internally a single mutex guards all session state; public methods
/// lock once and call private `_locked` helpers, so there is no
/// re-entrant locking.
#[derive(Clone)]
pub struct SshSession {
    inner: Arc<Inner>,
}

impl Default for SshSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SshSession {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    config: None,
                    session: None,
                    sftp: None,
                    connected_at: None,
                    last_activity: None,
                    idle_hook: None,
                }),
                idle_gen: AtomicU64::new(0),
            }),
        }
    }

    /// Set connection parameters. A live session bound to a different
    /// endpoint is disconnected before the new parameters are adopted.
    pub fn configure(&self, config: SshConfig) {
        let mut state = self.inner.state.lock();
        let endpoint_changed = match &state.config {
            Some(current) => !current.same_endpoint(&config),
            None => false,
        };
        if endpoint_changed && state.session.is_some() {
            Self::close_locked(&mut state);
            tracing::info!(endpoint = %config.endpoint(), "SSH reconfigured, previous session closed");
        }
        state.config = Some(config);
    }

    /// Hook invoked (with the idle seconds) when the idle timer evicts
    /// the session. Used for audit logging.
    pub fn set_idle_hook(&self, hook: Arc<dyn Fn(u64) + Send + Sync>) {
        self.inner.state.lock().idle_hook = Some(hook);
    }

    /// Establish the connection.
    ///
    /// Authentication priority: SSH agent, explicit key file, default
    /// key locations (`~/.ssh/id_ed25519`, `~/.ssh/id_rsa`).
    pub fn connect(&self) -> Result<(), SshError> {
        let mut state = self.inner.state.lock();
        if Self::alive_locked(&state) {
            tracing::debug!("SSH already connected, reusing");
            return Ok(());
        }
        self.connect_locked(&mut state)
    }

    fn connect_locked(&self, state: &mut State) -> Result<(), SshError> {
        let config = state.config.clone().ok_or(SshError::NotConfigured)?;
        Self::close_locked(state);

        let endpoint = config.endpoint();
        let addr = format!("{}:{}", config.host, config.port);
        let stream = {
            use std::net::ToSocketAddrs;
            let mut addrs =
                addr.to_socket_addrs().map_err(|e| SshError::Connect {
                    endpoint: endpoint.clone(),
                    reason: e.to_string(),
                })?;
            let first = addrs.next().ok_or_else(|| SshError::Connect {
                endpoint: endpoint.clone(),
                reason: "no address resolved".to_string(),
            })?;
            TcpStream::connect_timeout(&first, config.connect_timeout).map_err(|e| {
                SshError::Connect { endpoint: endpoint.clone(), reason: e.to_string() }
            })?
        };

        let mut session = Session::new().map_err(|e| SshError::Connect {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        })?;
        session.set_tcp_stream(stream);
        session.set_timeout(config.connect_timeout.as_millis() as u32);
        session.handshake().map_err(|e| SshError::Connect {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        })?;

        Self::authenticate(&session, &config)?;
        session.set_keepalive(true, config.keepalive_interval.as_secs() as u32);

        tracing::info!(endpoint = %endpoint, "SSH connected");
        state.session = Some(session);
        state.sftp = None;
        state.connected_at = Some(Instant::now());
        state.last_activity = Some(Instant::now());
        self.arm_idle_timer(state);
        Ok(())
    }

    fn authenticate(session: &Session, config: &SshConfig) -> Result<(), SshError> {
        let user = &config.username;
        let auth_err = |reason: String| SshError::Auth {
            user: user.clone(),
            host: config.host.clone(),
            reason,
        };

        // Explicit key file bypasses agent and default locations.
        if let Some(key_path) = &config.key_path {
            if key_path.is_file() {
                return session
                    .userauth_pubkey_file(user, None, key_path, None)
                    .map_err(|e| auth_err(e.to_string()));
            }
        }

        // Agent first, then default key locations.
        let mut last_err = String::from("no authentication method succeeded");
        match session.userauth_agent(user) {
            Ok(()) => return Ok(()),
            Err(e) => last_err = e.to_string(),
        }

        for candidate in default_key_paths() {
            if !candidate.is_file() {
                continue;
            }
            match session.userauth_pubkey_file(user, None, &candidate, None) {
                Ok(()) => return Ok(()),
                Err(e) => last_err = e.to_string(),
            }
        }

        Err(auth_err(last_err))
    }

    /// Close the session and cancel the idle timer.
    pub fn disconnect(&self) {
        // Bumping the generation invalidates any pending timer.
        self.inner.idle_gen.fetch_add(1, Ordering::SeqCst);
        let mut state = self.inner.state.lock();
        Self::close_locked(&mut state);
        tracing::info!("SSH disconnected");
    }

    fn close_locked(state: &mut State) {
        state.sftp = None;
        if let Some(session) = state.session.take() {
            let _ = session.disconnect(None, "closing", None);
        }
        state.connected_at = None;
    }

    fn alive_locked(state: &State) -> bool {
        match &state.session {
            Some(session) => session.keepalive_send().is_ok(),
            None => false,
        }
    }

    /// Reconnect silently if the transport died; one attempt only.
    fn ensure_connected_locked(&self, state: &mut State) -> Result<(), SshError> {
        if Self::alive_locked(state) {
            return Ok(());
        }
        if state.config.is_none() {
            return Err(SshError::NotConfigured);
        }
        tracing::info!("SSH connection lost, reconnecting");
        self.connect_locked(state)
            .map_err(|e| SshError::ConnectionLost(e.to_string()))
    }

    /// Record activity and re-arm the idle timer. Must hold the lock.
    fn touch(&self, state: &mut State) {
        state.last_activity = Some(Instant::now());
        self.arm_idle_timer(state);
    }

    fn arm_idle_timer(&self, state: &State) {
        let Some(config) = &state.config else { return };
        let idle_timeout = config.idle_timeout;
        if idle_timeout.is_zero() {
            return;
        }
        let generation = self.inner.idle_gen.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = Arc::clone(&self.inner);
        std::thread::spawn(move || {
            std::thread::sleep(idle_timeout);
            if inner.idle_gen.load(Ordering::SeqCst) != generation {
                return; // re-armed or disconnected since
            }
            let mut state = inner.state.lock();
            if inner.idle_gen.load(Ordering::SeqCst) != generation {
                return;
            }
            let idle_secs = state
                .last_activity
                .map(|t| t.elapsed().as_secs())
                .unwrap_or_default();
            tracing::info!(
                idle_seconds = idle_secs,
                timeout_seconds = idle_timeout.as_secs(),
                "SSH session idle, auto-disconnecting"
            );
            if let Some(hook) = state.idle_hook.clone() {
                hook(idle_secs);
            }
            Self::close_locked(&mut state);
        });
    }

    pub fn is_connected(&self) -> bool {
        let state = self.inner.state.lock();
        Self::alive_locked(&state)
    }

    pub fn connection_info(&self) -> ConnectionInfo {
        let state = self.inner.state.lock();
        let connected = Self::alive_locked(&state);
        let idle_ago = state.last_activity.map(|t| t.elapsed().as_secs());
        let idle_timeout = state
            .config
            .as_ref()
            .map(|c| c.idle_timeout.as_secs())
            .filter(|&t| t > 0);
        ConnectionInfo {
            connected,
            host: state.config.as_ref().map(|c| c.host.clone()),
            username: state.config.as_ref().map(|c| c.username.clone()),
            port: state.config.as_ref().map(|c| c.port),
            uptime_seconds: if connected {
                state.connected_at.map(|t| t.elapsed().as_secs()).unwrap_or_default()
            } else {
                0
            },
            last_activity_seconds_ago: idle_ago,
            idle_timeout_seconds: idle_timeout,
            idle_timeout_remaining: match (connected, idle_timeout, idle_ago) {
                (true, Some(timeout), Some(ago)) => Some(timeout.saturating_sub(ago)),
                _ => None,
            },
        }
    }

    // ------------------------------------------------------------------
    // Command execution
    // ------------------------------------------------------------------

    /// Run a command on the remote host.
    ///
    /// Returns `(exit_code, stdout, stderr)`. With `check`, a non-zero
    /// exit becomes [`SshError::Command`].
    pub fn execute(
        &self,
        command: &str,
        timeout: Option<Duration>,
        check: bool,
    ) -> Result<(i32, String, String), SshError> {
        let mut state = self.inner.state.lock();
        self.ensure_connected_locked(&mut state)?;
        self.touch(&mut state);

        let command_timeout = timeout
            .or_else(|| state.config.as_ref().map(|c| c.command_timeout))
            .unwrap_or(DEFAULT_COMMAND_TIMEOUT);

        let session = state.session.as_ref().ok_or_else(|| {
            SshError::ConnectionLost("session closed during execute".to_string())
        })?;
        session.set_timeout(command_timeout.as_millis() as u32);

        let lost = |reason: String| SshError::ConnectionLost(reason);
        let mut channel = session
            .channel_session()
            .map_err(|e| lost(e.to_string()))?;
        channel.exec(command).map_err(|e| lost(e.to_string()))?;

        let mut stdout = String::new();
        channel
            .read_to_string(&mut stdout)
            .map_err(|e| lost(e.to_string()))?;
        let mut stderr = String::new();
        channel
            .stderr()
            .read_to_string(&mut stderr)
            .map_err(|e| lost(e.to_string()))?;

        channel.wait_close().map_err(|e| lost(e.to_string()))?;
        let exit_code = channel.exit_status().map_err(|e| lost(e.to_string()))?;

        tracing::debug!(
            command = %truncate(command, 80),
            exit_code,
            "SSH exec"
        );

        if check && exit_code != 0 {
            return Err(SshError::Command {
                command: command.to_string(),
                exit_code,
                stderr: truncate(&stderr, 500).to_string(),
            });
        }
        Ok((exit_code, stdout, stderr))
    }

    /// Run a command and return stdout, failing on non-zero exit.
    pub fn execute_check(
        &self,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<String, SshError> {
        let (_, stdout, _) = self.execute(command, timeout, true)?;
        Ok(stdout)
    }

    // ------------------------------------------------------------------
    // SFTP operations
    // ------------------------------------------------------------------

    fn with_sftp<T>(
        &self,
        op: impl FnOnce(&Sftp) -> Result<T, SshError>,
    ) -> Result<T, SshError> {
        let mut state = self.inner.state.lock();
        self.ensure_connected_locked(&mut state)?;
        self.touch(&mut state);

        if state.sftp.is_none() {
            let session = state.session.as_ref().ok_or_else(|| {
                SshError::ConnectionLost("session closed during sftp".to_string())
            })?;
            let sftp = session
                .sftp()
                .map_err(|e| SshError::ConnectionLost(e.to_string()))?;
            state.sftp = Some(sftp);
        }
        // Invariant: set above when missing.
        match state.sftp.as_ref() {
            Some(sftp) => op(sftp),
            None => Err(SshError::ConnectionLost("sftp unavailable".to_string())),
        }
    }

    /// Upload a local file, creating remote parent directories.
    pub fn put_file(&self, local_path: &Path, remote_path: &str) -> Result<(), SshError> {
        let data = std::fs::read(local_path).map_err(|e| SshError::Sftp {
            path: local_path.display().to_string(),
            reason: e.to_string(),
        })?;
        self.with_sftp(|sftp| {
            mkdir_p(sftp, parent_dir(remote_path))?;
            let mut file = sftp.create(Path::new(remote_path)).map_err(|e| sftp_err(remote_path, e))?;
            file.write_all(&data).map_err(|e| sftp_io_err(remote_path, e))?;
            tracing::debug!(local = %local_path.display(), remote = remote_path, "SFTP put");
            Ok(())
        })
    }

    /// Download a remote file, creating local parent directories.
    pub fn get_file(&self, remote_path: &str, local_path: &Path) -> Result<(), SshError> {
        let data = self.with_sftp(|sftp| {
            let mut file = sftp.open(Path::new(remote_path)).map_err(|e| sftp_err(remote_path, e))?;
            let mut data = Vec::new();
            file.read_to_end(&mut data)
                .map_err(|e| sftp_io_err(remote_path, e))?;
            Ok(data)
        })?;
        if let Some(parent) = local_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SshError::Sftp {
                path: local_path.display().to_string(),
                reason: e.to_string(),
            })?;
        }
        std::fs::write(local_path, data).map_err(|e| SshError::Sftp {
            path: local_path.display().to_string(),
            reason: e.to_string(),
        })?;
        tracing::debug!(remote = remote_path, local = %local_path.display(), "SFTP get");
        Ok(())
    }

    /// Write text content to a remote file with the given mode,
    /// creating parent directories.
    pub fn write_file(&self, remote_path: &str, content: &str, mode: i32) -> Result<(), SshError> {
        self.with_sftp(|sftp| {
            mkdir_p(sftp, parent_dir(remote_path))?;
            let mut file = sftp
                .open_mode(
                    Path::new(remote_path),
                    OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
                    mode,
                    OpenType::File,
                )
                .map_err(|e| sftp_err(remote_path, e))?;
            file.write_all(content.as_bytes())
                .map_err(|e| sftp_io_err(remote_path, e))?;
            tracing::debug!(remote = remote_path, bytes = content.len(), "SFTP write");
            Ok(())
        })
    }

    /// Read a remote file as UTF-8 (lossy).
    pub fn read_file(&self, remote_path: &str) -> Result<String, SshError> {
        self.with_sftp(|sftp| {
            let mut file = sftp.open(Path::new(remote_path)).map_err(|e| sftp_err(remote_path, e))?;
            let mut data = Vec::new();
            file.read_to_end(&mut data)
                .map_err(|e| sftp_io_err(remote_path, e))?;
            Ok(String::from_utf8_lossy(&data).into_owned())
        })
    }

    /// List a remote directory: directories first, then by
    /// case-insensitive name.
    pub fn list_dir(&self, remote_path: &str) -> Result<Vec<DirEntry>, SshError> {
        self.with_sftp(|sftp| {
            let listing = sftp
                .readdir(Path::new(remote_path))
                .map_err(|e| sftp_err(remote_path, e))?;
            let mut entries: Vec<DirEntry> = listing
                .into_iter()
                .map(|(path, stat)| {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    DirEntry {
                        path: format!("{}/{}", remote_path.trim_end_matches('/'), name),
                        name,
                        kind: if stat.is_dir() {
                            DirEntryKind::Directory
                        } else {
                            DirEntryKind::File
                        },
                        size: stat.size.unwrap_or(0),
                        modified: stat.mtime,
                    }
                })
                .collect();
            sort_entries(&mut entries);
            Ok(entries)
        })
    }

    /// Whether a remote file or directory exists.
    pub fn file_exists(&self, remote_path: &str) -> Result<bool, SshError> {
        self.with_sftp(|sftp| Ok(sftp.stat(Path::new(remote_path)).is_ok()))
    }

    /// Remove a remote file.
    pub fn remove_file(&self, remote_path: &str) -> Result<(), SshError> {
        self.with_sftp(|sftp| {
            sftp.unlink(Path::new(remote_path)).map_err(|e| sftp_err(remote_path, e))
        })
    }

    // ------------------------------------------------------------------
    // Health
    // ------------------------------------------------------------------

    /// Probe the session. Never returns an error.
    pub fn health_check(&self) -> SessionHealth {
        let info = self.connection_info();
        if info.host.is_none() {
            return SessionHealth {
                healthy: false,
                message: "SSH not configured".to_string(),
                remote_hostname: None,
                info,
            };
        }
        if !info.connected {
            return SessionHealth {
                healthy: false,
                message: format!(
                    "Not connected to {}",
                    info.host.as_deref().unwrap_or_default()
                ),
                remote_hostname: None,
                info,
            };
        }

        match self.execute("echo OK && hostname", Some(Duration::from_secs(10)), false) {
            Ok((0, stdout, _)) => {
                let hostname = stdout.lines().last().unwrap_or("unknown").trim().to_string();
                SessionHealth {
                    healthy: true,
                    message: format!("Connected to {hostname}"),
                    remote_hostname: Some(hostname),
                    info: self.connection_info(),
                }
            }
            Ok((code, _, _)) => SessionHealth {
                healthy: false,
                message: format!("Connection test failed (exit {code})"),
                remote_hostname: None,
                info: self.connection_info(),
            },
            Err(e) => SessionHealth {
                healthy: false,
                message: format!("Connection test failed: {e}"),
                remote_hostname: None,
                info: self.connection_info(),
            },
        }
    }
}

fn sftp_err(path: &str, e: ssh2::Error) -> SshError {
    SshError::Sftp { path: path.to_string(), reason: e.to_string() }
}

fn sftp_io_err(path: &str, e: std::io::Error) -> SshError {
    SshError::Sftp { path: path.to_string(), reason: e.to_string() }
}

fn parent_dir(remote_path: &str) -> &str {
    match remote_path.rfind('/') {
        Some(0) => "/",
        Some(idx) => &remote_path[..idx],
        None => "",
    }
}

/// Recursively create a remote directory, tolerating races.
fn mkdir_p(sftp: &Sftp, remote_dir: &str) -> Result<(), SshError> {
    if remote_dir.is_empty() || remote_dir == "/" || remote_dir == "." {
        return Ok(());
    }
    if sftp.stat(Path::new(remote_dir)).is_ok() {
        return Ok(());
    }
    mkdir_p(sftp, parent_dir(remote_dir))?;
    // Another writer may have created it between stat and mkdir.
    let _ = sftp.mkdir(Path::new(remote_dir), 0o755);
    Ok(())
}

/// Default private-key candidates, preferred order.
fn default_key_paths() -> Vec<PathBuf> {
    let Some(home) = std::env::var_os("HOME") else {
        return Vec::new();
    };
    let ssh_dir = PathBuf::from(home).join(".ssh");
    vec![ssh_dir.join("id_ed25519"), ssh_dir.join("id_rsa")]
}

fn truncate(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
