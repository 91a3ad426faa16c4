// src/lock/mod.rs
// File-based mutexes keyed by resource name.
//
// The lock file layout is part of the external interface:
// `{resource, owner, pid, hostname, acquiredAt, expiresAt, ttlMs}` written
// via temp-then-rename under `<lockdir>/<sanitized>.lock`, permissions 0600
// (0700 for the directory).

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CortexError, Result};
use crate::util::now_millis;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockFile {
    pub resource: String,
    pub owner: String,
    pub pid: u32,
    pub hostname: String,
    #[serde(rename = "acquiredAt")]
    pub acquired_at: i64,
    #[serde(rename = "expiresAt")]
    pub expires_at: i64,
    #[serde(rename = "ttlMs")]
    pub ttl_ms: u64,
}

#[derive(Debug, Clone)]
pub struct AcquireOpts {
    pub ttl_ms: u64,
    pub owner: String,
}

impl Default for AcquireOpts {
    fn default() -> Self {
        Self {
            ttl_ms: 30_000,
            owner: format!("pid-{}", std::process::id()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TryAcquireResult {
    pub acquired: bool,
    pub holder: Option<LockFile>,
}

#[derive(Debug, Clone)]
pub struct AcquireResult {
    pub acquired: bool,
    pub waited_ms: u64,
    pub timed_out: bool,
}

/// Polling interval for `acquire`'s wait loop.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

pub struct LockManager {
    lock_dir: PathBuf,
    hostname: String,
}

impl LockManager {
    pub fn new(lock_dir: impl Into<PathBuf>) -> Result<Self> {
        let lock_dir = lock_dir.into();
        std::fs::create_dir_all(&lock_dir)?;
        set_dir_permissions(&lock_dir)?;
        Ok(Self {
            lock_dir,
            hostname: hostname(),
        })
    }

    fn path_for(&self, resource: &str) -> PathBuf {
        self.lock_dir.join(format!("{}.lock", sanitize(resource)))
    }

    /// Read the current lock file for a resource, if any valid JSON is
    /// present. Parsing failures are treated as "no lock" (defensively read,
    /// like the log store).
    fn read(&self, resource: &str) -> Option<LockFile> {
        let path = self.path_for(resource);
        let bytes = std::fs::read(&path).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    fn is_stale(&self, lock: &LockFile) -> bool {
        if lock.expires_at < now_millis() {
            return true;
        }
        if lock.hostname != self.hostname {
            // Can't probe liveness on a remote host; trust the TTL only.
            return false;
        }
        !pid_alive(lock.pid)
    }

    pub fn try_acquire(&self, resource: &str, opts: &AcquireOpts) -> Result<TryAcquireResult> {
        if let Some(existing) = self.read(resource) {
            if !self.is_stale(&existing) {
                return Ok(TryAcquireResult {
                    acquired: false,
                    holder: Some(existing),
                });
            }
            info!(resource, pid = existing.pid, "reclaiming stale lock");
        }

        let now = now_millis();
        let lock = LockFile {
            resource: resource.to_string(),
            owner: opts.owner.clone(),
            pid: std::process::id(),
            hostname: self.hostname.clone(),
            acquired_at: now,
            expires_at: now + opts.ttl_ms as i64,
            ttl_ms: opts.ttl_ms,
        };
        self.write_atomic(resource, &lock)?;
        debug!(resource, "lock acquired");
        Ok(TryAcquireResult {
            acquired: true,
            holder: Some(lock),
        })
    }

    pub async fn acquire(
        &self,
        resource: &str,
        timeout_ms: u64,
        opts: &AcquireOpts,
    ) -> Result<AcquireResult> {
        let start = Instant::now();
        loop {
            let attempt = self.try_acquire(resource, opts)?;
            if attempt.acquired {
                return Ok(AcquireResult {
                    acquired: true,
                    waited_ms: start.elapsed().as_millis() as u64,
                    timed_out: false,
                });
            }
            if start.elapsed() >= Duration::from_millis(timeout_ms) {
                return Ok(AcquireResult {
                    acquired: false,
                    waited_ms: start.elapsed().as_millis() as u64,
                    timed_out: true,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Only unlinks the lock file if this process is the recorded owner pid.
    pub fn release(&self, resource: &str) -> Result<()> {
        let path = self.path_for(resource);
        if let Some(existing) = self.read(resource)
            && existing.pid == std::process::id()
        {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(resource, "lock released"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    pub fn renew(&self, resource: &str, ttl_ms: u64) -> Result<bool> {
        let Some(mut existing) = self.read(resource) else {
            return Ok(false);
        };
        if existing.pid != std::process::id() {
            return Ok(false);
        }
        existing.expires_at = now_millis() + ttl_ms as i64;
        existing.ttl_ms = ttl_ms;
        self.write_atomic(resource, &existing)?;
        Ok(true)
    }

    fn write_atomic(&self, resource: &str, lock: &LockFile) -> Result<()> {
        let path = self.path_for(resource);
        let tmp = path.with_extension("lock.tmp");
        let bytes = serde_json::to_vec(lock)?;
        std::fs::write(&tmp, bytes)?;
        set_file_permissions(&tmp)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Acquire -> run `f` -> release in all exit paths.
    pub async fn with_lock<T, F, Fut>(
        &self,
        resource: &str,
        timeout_ms: u64,
        opts: AcquireOpts,
        f: F,
    ) -> Result<std::result::Result<T, String>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = std::result::Result<T, String>>,
    {
        let attempt = self.acquire(resource, timeout_ms, &opts).await?;
        if !attempt.acquired {
            return Err(CortexError::LockTimeout {
                resource: resource.to_string(),
                waited_ms: attempt.waited_ms,
            });
        }
        let result = f().await;
        self.release(resource)?;
        Ok(result)
    }

    /// Startup sweep: drop any lock files whose holder is stale. Safe to
    /// call repeatedly; never touches a live lock.
    pub fn sweep_stale(&self) -> Result<u32> {
        let mut cleaned = 0u32;
        let entries = match std::fs::read_dir(&self.lock_dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("lock") {
                continue;
            }
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };
            let Ok(lock) = serde_json::from_slice::<LockFile>(&bytes) else {
                continue;
            };
            if self.is_stale(&lock) {
                let _ = std::fs::remove_file(&path);
                cleaned += 1;
                warn!(resource = %lock.resource, pid = lock.pid, "swept stale lock at startup");
            }
        }
        Ok(cleaned)
    }
}

fn sanitize(resource: &str) -> String {
    resource
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "localhost".to_string())
}

#[cfg(unix)]
fn pid_alive(pid: u32) -> bool {
    // signal 0 performs no-op error checking only; ESRCH means the pid is
    // gone. This is the standard liveness probe and requires no special
    // privileges for processes owned by the same user.
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 || std::io::Error::last_os_error().raw_os_error() != Some(libc::ESRCH) }
}

#[cfg(not(unix))]
fn pid_alive(_pid: u32) -> bool {
    // No portable liveness probe; assume alive and rely on TTL expiry alone.
    true
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_fails_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = LockManager::new(dir.path()).unwrap();
        let opts = AcquireOpts { ttl_ms: 30_000, owner: "a".into() };
        let first = mgr.try_acquire("write:working", &opts).unwrap();
        assert!(first.acquired);
        let second = mgr.try_acquire("write:working", &opts).unwrap();
        assert!(!second.acquired);
    }

    #[tokio::test]
    async fn release_then_acquire_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = LockManager::new(dir.path()).unwrap();
        let opts = AcquireOpts::default();
        mgr.try_acquire("r", &opts).unwrap();
        mgr.release("r").unwrap();
        let second = mgr.try_acquire("r", &opts).unwrap();
        assert!(second.acquired);
    }

    #[tokio::test]
    async fn stale_ttl_lock_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = LockManager::new(dir.path()).unwrap();
        let opts = AcquireOpts { ttl_ms: 0, owner: "a".into() };
        mgr.try_acquire("r", &opts).unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = mgr.try_acquire("r", &AcquireOpts::default()).unwrap();
        assert!(second.acquired);
    }

    #[tokio::test]
    async fn acquire_times_out_when_never_released() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = LockManager::new(dir.path()).unwrap();
        let opts = AcquireOpts { ttl_ms: 60_000, owner: "a".into() };
        mgr.try_acquire("r", &opts).unwrap();
        let result = mgr.acquire("r", 50, &AcquireOpts { ttl_ms: 1000, owner: "b".into() }).await.unwrap();
        assert!(!result.acquired);
        assert!(result.timed_out);
    }

    #[tokio::test]
    async fn with_lock_releases_on_success_and_error() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = LockManager::new(dir.path()).unwrap();
        let outcome = mgr
            .with_lock("r", 1000, AcquireOpts::default(), || async { Ok::<_, String>(42) })
            .await
            .unwrap();
        assert_eq!(outcome, Ok(42));
        // lock must be released by now
        let again = mgr.try_acquire("r", &AcquireOpts::default()).unwrap();
        assert!(again.acquired);
        mgr.release("r").unwrap();

        let outcome = mgr
            .with_lock("r", 1000, AcquireOpts::default(), || async { Err::<i32, _>("boom".to_string()) })
            .await
            .unwrap();
        assert!(outcome.is_err());
        let again = mgr.try_acquire("r", &AcquireOpts::default()).unwrap();
        assert!(again.acquired);
    }
}
