//! Restore-direction writer.
//!
//! Decodes flattened backup paths back into a filesystem namespace,
//! recreates missing intermediate directories, writes the incoming byte
//! stream, and re-applies file attributes on a best-effort basis.

use std::fs::{self, File};
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use nix::sys::stat::utimes;
use nix::sys::time::{TimeVal, TimeValLike};
use nix::unistd::{chown, Gid, Uid};
use tracing::{info, warn};

use crate::path::decode_object_path;
use crate::utils::errors::Result;

/// Attributes the host replays after an object's data has been restored.
#[derive(Debug, Clone, Copy)]
pub struct FileAttributes {
    /// Unix mode bits.
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,

    /// Access time, epoch seconds.
    pub atime: i64,

    /// Modification time, epoch seconds.
    pub mtime: i64,
}

/// Writes one restored object to its decoded destination.
pub struct RestoreWriter {
    file: File,
    dest: PathBuf,
}

impl RestoreWriter {
    /// Decode `encoded` and open the destination for writing, creating any
    /// missing intermediate directories first.
    pub fn create(encoded: &str) -> Result<Self> {
        let dest = PathBuf::from(decode_object_path(encoded));
        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                info!("directory {} does not exist, creating it", parent.display());
                fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(&dest)?;
        Ok(Self { file, dest })
    }

    /// Append a chunk. A failure carries the OS error code for the host to
    /// report; it does not abort the restore job.
    pub fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Flush and close the destination.
    pub fn close(mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Best-effort attribute restoration. Permission changes commonly fail for
/// unprivileged restores, so every failure is downgraded to a warning.
/// Symbolic-link targets are left alone entirely.
pub fn apply_attributes(path: &Path, attrs: &FileAttributes, is_symlink: bool) {
    if is_symlink {
        return;
    }

    if let Err(err) = chown(path, Some(Uid::from_raw(attrs.uid)), Some(Gid::from_raw(attrs.gid))) {
        warn!("could not set owner of {}: {err}", path.display());
    }

    if let Err(err) = fs::set_permissions(path, fs::Permissions::from_mode(attrs.mode)) {
        warn!("could not set mode of {}: {err}", path.display());
    }

    let atime = TimeVal::seconds(attrs.atime);
    let mtime = TimeVal::seconds(attrs.mtime);
    if let Err(err) = utimes(path, &atime, &mtime) {
        warn!("could not set times of {}: {err}", path.display());
    }
}
