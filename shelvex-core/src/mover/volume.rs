//! Volume detection: rename vs copy strategy.
//!
//! Source and destination share a volume when their filesystem device ids
//! match; only then is a single atomic rename possible. When the id of
//! either side cannot be determined the answer is `false`, which routes
//! the operation down the (slower, but always safe) copy path.

use std::io;
use std::path::Path;

/// Nearest ancestor of `path` that exists on disk. Destination parents
/// may not exist yet before the transaction creates them.
pub fn nearest_existing_ancestor(path: &Path) -> Option<&Path> {
    let mut current = Some(path);
    while let Some(candidate) = current {
        if candidate.exists() {
            return Some(candidate);
        }
        current = candidate.parent();
    }
    None
}

#[cfg(unix)]
pub fn device_id(path: &Path) -> io::Result<u64> {
    use std::os::unix::fs::MetadataExt;
    Ok(std::fs::metadata(path)?.dev())
}

#[cfg(windows)]
pub fn device_id(path: &Path) -> io::Result<u64> {
    // No stable device id on Windows through std; the drive or UNC share
    // prefix stands in for the volume.
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    use std::path::Component;

    let root = path
        .components()
        .find(|c| matches!(c, Component::Prefix(_)))
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no prefix"))?;
    let mut hasher = DefaultHasher::new();
    root.as_os_str().to_ascii_uppercase().hash(&mut hasher);
    Ok(hasher.finish())
}

/// Whether `source` and the (possibly not-yet-created) parent of
/// `destination` live on the same filesystem.
pub fn same_volume(source: &Path, destination: &Path) -> bool {
    let dest_anchor = destination
        .parent()
        .and_then(nearest_existing_ancestor);
    let (Ok(src), Some(anchor)) = (device_id(source), dest_anchor) else {
        return false;
    };
    match device_id(anchor) {
        Ok(dst) => src == dst,
        Err(_) => false,
    }
}
