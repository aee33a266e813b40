//! Archive building
//!
//! Packages a materialized directory tree into a single gzip-compressed
//! tar artifact. Output is deterministic: entries are sorted by path,
//! timestamps and ownership are zeroed, and modes are normalized, so the
//! same tree always produces the same bytes.

use crate::error::{StashError, StashResult};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::path::Path;
use tar::{EntryType, Header};
use tracing::debug;
use walkdir::WalkDir;

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    false
}

/// Compress a directory tree into a gzip-compressed tar file at `dest`
///
/// Entry paths inside the archive are relative to `src`; the root
/// directory itself is not an entry.
pub fn compress_dir(src: &Path, dest: &Path) -> StashResult<()> {
    let file = File::create(dest)
        .map_err(|e| StashError::io(format!("creating archive {}", dest.display()), e))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);

    for entry in WalkDir::new(src).sort_by(|a, b| a.path().cmp(b.path())) {
        let entry = entry.map_err(|e| {
            let io = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("walk failed"));
            StashError::io(format!("walking {}", src.display()), io)
        })?;
        let path = entry.path();
        if path == src {
            continue;
        }
        let rel = path.strip_prefix(src).map_err(|_| {
            StashError::Internal(format!("path {} escapes archive root", path.display()))
        })?;
        let metadata = entry
            .metadata()
            .map_err(|e| StashError::Internal(format!("metadata for {}: {}", path.display(), e)))?;

        let mut header = Header::new_gnu();
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);

        if metadata.is_dir() {
            header.set_entry_type(EntryType::Directory);
            header.set_mode(0o755);
            header.set_size(0);
            builder
                .append_data(&mut header, rel, std::io::empty())
                .map_err(|e| StashError::io(format!("archiving {}", rel.display()), e))?;
        } else if metadata.is_file() {
            header.set_entry_type(EntryType::Regular);
            header.set_mode(if is_executable(&metadata) { 0o755 } else { 0o644 });
            header.set_size(metadata.len());
            let reader = File::open(path)
                .map_err(|e| StashError::io(format!("reading {}", path.display()), e))?;
            builder
                .append_data(&mut header, rel, reader)
                .map_err(|e| StashError::io(format!("archiving {}", rel.display()), e))?;
        }
        // Symlinks never occur in materialized trees; skip anything else.
    }

    let encoder = builder
        .into_inner()
        .map_err(|e| StashError::io(format!("finalizing archive {}", dest.display()), e))?;
    encoder
        .finish()
        .map_err(|e| StashError::io(format!("flushing archive {}", dest.display()), e))?;

    debug!("Compressed {} into {}", src.display(), dest.display());
    Ok(())
}
