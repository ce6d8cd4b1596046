//! Flatfile loading.
//!
//! A flatfile is a plain list of `host:port` entries, one per line. A
//! leading `/` is tolerated, `#` starts a comment line, and blank lines are
//! skipped. Duplicate entries collapse to the first occurrence.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;

use tracing::debug;

use crate::error::{CoreError, CoreResult};

/// Read and parse a flatfile from disk.
pub fn read_flatfile(path: &Path) -> CoreResult<Vec<SocketAddr>> {
    let content = std::fs::read_to_string(path).map_err(|source| CoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let peers = parse_flatfile(&content)?;
    debug!(?path, peers = peers.len(), "flatfile loaded");
    Ok(peers)
}

/// Parse flatfile contents.
pub fn parse_flatfile(content: &str) -> CoreResult<Vec<SocketAddr>> {
    let mut peers = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let entry = raw.trim();
        if entry.is_empty() || entry.starts_with('#') {
            continue;
        }

        let addr = parse_entry(entry).ok_or_else(|| CoreError::Flatfile {
            line: idx + 1,
            entry: entry.to_string(),
        })?;

        if !peers.contains(&addr) {
            peers.push(addr);
        }
    }

    Ok(peers)
}

fn parse_entry(entry: &str) -> Option<SocketAddr> {
    let entry = entry.strip_prefix('/').unwrap_or(entry);
    if let Ok(addr) = entry.parse::<SocketAddr>() {
        return Some(addr);
    }
    // Hostname entries go through the system resolver.
    entry.to_socket_addrs().ok()?.next()
}
