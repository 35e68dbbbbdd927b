//! The move primitive: rename, or copy-verify-delete across devices.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, warn};

/// How a file reached its destination.
///
/// `Rename` covers every same-volume move (link + unlink, or a checked
/// rename where links are unsupported).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveMethod {
    Rename,
    CopyVerifyDelete,
}

impl MoveMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rename => "rename",
            Self::CopyVerifyDelete => "copy",
        }
    }
}

fn is_cross_device(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::CrossesDevices
}

/// Filesystems without hard links (FAT, some network mounts) report one of
/// these from `link(2)`.
fn links_unsupported(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Unsupported | io::ErrorKind::PermissionDenied
    )
}

/// Move `src` to `dst` without ever replacing an existing `dst`.
///
/// On one volume the file is hard-linked to `dst` and then unlinked from
/// `src`; `link` fails with `AlreadyExists` where `rename` would silently
/// clobber. Across volumes it is copied, verified and deleted.
///
/// `AlreadyExists` is passed through as `Error::Io` so the caller can pick a
/// fresh destination name.
pub fn move_file(src: &Path, dst: &Path) -> Result<MoveMethod> {
    match fs::hard_link(src, dst) {
        Ok(()) => {
            unlink_source(src, dst)?;
            Ok(MoveMethod::Rename)
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(Error::Io(e)),
        Err(e) if is_cross_device(&e) => copy_across(src, dst),
        Err(e) if e.kind() == io::ErrorKind::NotFound && !src.exists() => Err(vanished(src)),
        Err(e) if links_unsupported(&e) => {
            debug!(source = %src.display(), error = %e, "no hard links here, renaming");
            rename_if_free(src, dst)
        }
        Err(e) => Err(Error::Move(format!(
            "link {} -> {}: {e}",
            src.display(),
            dst.display()
        ))),
    }
}

fn copy_across(src: &Path, dst: &Path) -> Result<MoveMethod> {
    debug!(source = %src.display(), "move crosses devices, copying");
    copy_verify_delete(src, dst)?;
    Ok(MoveMethod::CopyVerifyDelete)
}

fn vanished(src: &Path) -> Error {
    Error::Transient(format!("{} vanished before it could be moved", src.display()))
}

/// Drop the old name once `dst` holds the data. If that fails the new link
/// is removed again so the file does not end up in two places.
fn unlink_source(src: &Path, dst: &Path) -> Result<()> {
    match fs::remove_file(src) {
        Ok(()) => Ok(()),
        // someone else removed the old name; dst still has the data
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            if let Err(rm) = fs::remove_file(dst) {
                warn!(path = %dst.display(), error = %rm, "could not undo link");
            }
            Err(Error::Move(format!(
                "linked to {} but could not remove {}: {e}",
                dst.display(),
                src.display()
            )))
        }
    }
}

/// Plain rename for filesystems without links. `rename` replaces an existing
/// target, so the target is checked first; callers serialise moves into
/// the same directory.
fn rename_if_free(src: &Path, dst: &Path) -> Result<MoveMethod> {
    if dst.try_exists()? {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", dst.display()),
        )));
    }
    match fs::rename(src, dst) {
        Ok(()) => Ok(MoveMethod::Rename),
        Err(e) if is_cross_device(&e) => copy_across(src, dst),
        Err(e) if e.kind() == io::ErrorKind::NotFound && !src.exists() => Err(vanished(src)),
        Err(e) => Err(Error::Move(format!(
            "rename {} -> {}: {e}",
            src.display(),
            dst.display()
        ))),
    }
}

/// Copy into a brand-new `dst`, check it byte-for-byte (length + SHA-256),
/// then remove `src`. Any failure removes the partial copy and keeps `src`.
pub fn copy_verify_delete(src: &Path, dst: &Path) -> Result<()> {
    let mut out = match OpenOptions::new().write(true).create_new(true).open(dst) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Err(Error::Io(e)),
        Err(e) => {
            return Err(Error::Move(format!("create {}: {e}", dst.display())));
        }
    };

    let copied = (|| -> io::Result<(u64, Vec<u8>)> {
        let mut input = File::open(src)?;
        let mut tee = HashingWriter::new(&mut out);
        let n = io::copy(&mut input, &mut tee)?;
        let digest = tee.finish();
        out.flush()?;
        out.sync_all()?;
        Ok((n, digest))
    })();

    let verified = copied.and_then(|(n, src_digest)| {
        let dst_len = fs::metadata(dst)?.len();
        let dst_digest = sha256_file(dst)?;
        if dst_len != n || dst_digest != src_digest {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "copied file does not match the source",
            ));
        }
        // a hard link or alias would make the delete below destroy the only copy
        if same_file::is_same_file(src, dst)? {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "source and destination are the same file",
            ));
        }
        Ok(())
    });

    if let Err(e) = verified {
        drop(out);
        if let Err(rm) = fs::remove_file(dst) {
            warn!(path = %dst.display(), error = %rm, "could not remove partial copy");
        }
        return Err(Error::Move(format!(
            "copy {} -> {}: {e}",
            src.display(),
            dst.display()
        )));
    }

    fs::remove_file(src).map_err(|e| {
        Error::Move(format!(
            "copied to {} but could not remove {}: {e}",
            dst.display(),
            src.display()
        ))
    })
}

fn sha256_file(path: &Path) -> io::Result<Vec<u8>> {
    let mut hasher = Sha256::new();
    io::copy(&mut File::open(path)?, &mut hasher)?;
    Ok(hasher.finalize().to_vec())
}

/// Hashes everything written through it.
struct HashingWriter<'a, W: Write> {
    inner: &'a mut W,
    hasher: Sha256,
}

impl<'a, W: Write> HashingWriter<'a, W> {
    fn new(inner: &'a mut W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    fn finish(self) -> Vec<u8> {
        self.hasher.finalize().to_vec()
    }
}

impl<W: Write> Write for HashingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
