//! Filesystem bridge
//!
//! Exposes the content cache as a single flat directory: every cached (or
//! peer-fetchable) name appears as a file. The kernel-facing side is
//! `fuser`; this module supplies the directory/file callbacks and the mount
//! helpers.

mod bridge;

use std::path::Path;

use fuser::MountOption;
use tracing::{debug, info};

use crate::network::exchange::ExchangeService;

pub use bridge::CacheFs;

/// Filesystem bridge error.
#[derive(Debug)]
pub enum FsError {
    /// Mounting failed (missing fuse device, bad mount point, no runtime).
    MountFailed(String),
}

impl std::fmt::Display for FsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FsError::MountFailed(e) => write!(f, "mount failed: {}", e),
        }
    }
}

impl std::error::Error for FsError {}

/// The adapter's lookup path: cache hit, else fetch from peers and fill the
/// cache so the name shows up in later listings and reads.
///
/// Returns `None` when the name is absent locally and on every peer.
pub async fn lookup_or_fetch(exchange: &ExchangeService, name: &str) -> Option<Vec<u8>> {
    if let Some(data) = exchange.cache().get(name) {
        return Some(data);
    }

    match exchange.request_file(name).await {
        Ok(data) => {
            info!(name = %name, size = data.len(), "filled cache from peer fetch");
            exchange.cache().put(name, data.clone());
            Some(data)
        }
        Err(e) => {
            debug!(name = %name, error = %e, "lookup fetch failed");
            None
        }
    }
}

fn mount_options() -> Vec<MountOption> {
    vec![
        MountOption::FSName("skiff".to_string()),
        MountOption::AutoUnmount,
    ]
}

/// Mount the bridge at `mountpoint`, blocking until unmounted.
///
/// The mount point directory is created if it does not exist.
pub fn mount(bridge: CacheFs, mountpoint: &Path) -> Result<(), FsError> {
    std::fs::create_dir_all(mountpoint)
        .map_err(|e| FsError::MountFailed(format!("failed to create mount point: {}", e)))?;
    fuser::mount2(bridge, mountpoint, &mount_options())
        .map_err(|e| FsError::MountFailed(e.to_string()))
}

/// Mount the bridge at `mountpoint` in the background.
///
/// The returned session keeps the filesystem mounted; dropping it (or
/// calling `join()`) unmounts.
pub fn spawn_mount(
    bridge: CacheFs,
    mountpoint: &Path,
) -> Result<fuser::BackgroundSession, FsError> {
    std::fs::create_dir_all(mountpoint)
        .map_err(|e| FsError::MountFailed(format!("failed to create mount point: {}", e)))?;
    fuser::spawn_mount2(bridge, mountpoint, &mount_options())
        .map_err(|e| FsError::MountFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_error_display() {
        let err = FsError::MountFailed("no fuse device".to_string());
        assert_eq!(err.to_string(), "mount failed: no fuse device");
    }
}
