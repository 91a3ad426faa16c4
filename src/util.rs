// src/util.rs
// Small shared helpers: timestamps, hashing, id generation.

use std::path::Path;

use chrono::Utc;
use sha2::{Digest, Sha256};

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Stable 12-hex-char hash of an absolute directory path. Hex, not
/// base64, so it's filename-safe for
/// `data/memories/projects/<hash>.jsonl`.
pub fn project_hash(absolute_dir: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(absolute_dir.as_bytes());
    let digest = hasher.finalize();
    hex_prefix(&digest, 12)
}

fn hex_prefix(bytes: &[u8], len: usize) -> String {
    let mut out = String::with_capacity(len);
    for b in bytes {
        if out.len() >= len {
            break;
        }
        out.push_str(&format!("{:02x}", b));
    }
    out.truncate(len);
    out
}

/// `<adapter>:<timestamp>:<random>` id convention.
pub fn generate_id(adapter_prefix: &str) -> String {
    let rand_suffix: u32 = rand::random();
    format!("{adapter_prefix}:{}:{:08x}", now_millis(), rand_suffix)
}

/// `<adapter>:<hash>` id convention for content-addressed records.
pub fn content_id(adapter_prefix: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    format!("{adapter_prefix}:{}", hex_prefix(&digest, 16))
}

/// Write-to-temp-then-rename so readers never observe a partial file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_hash_is_twelve_hex_chars() {
        let h = project_hash("/home/user/project");
        assert_eq!(h.len(), 12);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn project_hash_is_stable() {
        assert_eq!(project_hash("/a/b"), project_hash("/a/b"));
        assert_ne!(project_hash("/a/b"), project_hash("/a/c"));
    }
}
