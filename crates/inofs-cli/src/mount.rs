use std::path::Path;

use anyhow::{Context, Result};
use inofs_rs::{BLOCK_SIZE, Disk, Geometry, MemDisk, VolumeFs};
use tracing::info;

/// Maps the image at `path`, sized for `geometry`, and mounts it. A missing
/// or blank image is formatted; an existing volume keeps its own geometry.
pub fn open_image(path: &Path, geometry: Geometry) -> Result<VolumeFs<Disk>> {
    let len = u64::from(geometry.total_blocks) * BLOCK_SIZE as u64;
    let disk = Disk::open_prealloc(path, len)
        .with_context(|| format!("failed to open image {}", path.display()))?;
    let fresh = disk.fresh;
    // A file created just now has no superblock to look for.
    let fs = if fresh {
        VolumeFs::format(disk, geometry)
    } else {
        VolumeFs::mount_or_format(disk, geometry)
    }
    .with_context(|| format!("failed to mount image {}", path.display()))?;
    info!(
        image = %path.display(),
        fresh,
        free_blocks = fs.free_blocks(),
        free_inodes = fs.free_inodes(),
        "volume ready"
    );
    Ok(fs)
}

/// A freshly formatted volume that lives only as long as the process.
pub fn open_memory(geometry: Geometry) -> Result<VolumeFs<MemDisk>> {
    let fs = VolumeFs::format(MemDisk::new(geometry.total_blocks), geometry)
        .context("failed to format in-memory volume")?;
    info!(blocks = geometry.total_blocks, "in-memory volume ready");
    Ok(fs)
}
