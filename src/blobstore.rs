// src/blobstore.rs

//! Disk spill area for blob content in canonical mode.
//!
//! Each file revision's payload is written once, keyed by serial, and
//! read back (then unlinked) when the first commit referencing it is
//! emitted. Entries are splayed across nested directories by the
//! radix-256 digits of the serial so no directory collects more than 256
//! children. Entries hold the final `data <len>` framing, so emission is
//! a straight byte copy.

use crate::error::{Error, Result};
use crate::marks::Serial;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Maximum children per fan-out directory.
const FANOUT: u32 = 256;

pub struct BlobStore {
    root: TempDir,
    compress: bool,
}

impl BlobStore {
    /// Create the spill root under `TMPDIR` (or `/tmp`).
    pub fn create(compress: bool) -> Result<BlobStore> {
        let root = tempfile::Builder::new()
            .prefix("cvs-fast-export-")
            .tempdir()
            .map_err(|e| Error::BlobDir {
                path: std::env::temp_dir(),
                source: e,
            })?;
        debug!("blob store at {:?}", root.path());
        Ok(BlobStore { root, compress })
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Fan-out location of a serial: the digits of `serial / 256` name
    /// nested directories, ascending in significance; the low digit forms
    /// the `=<hex>` leaf.
    fn entry_path(&self, serial: Serial) -> PathBuf {
        let mut path = self.root.path().to_path_buf();
        let mut rest = serial / FANOUT;
        while rest > 0 {
            path.push(format!("{:x}", rest % FANOUT));
            rest /= FANOUT;
        }
        path.push(format!("={:x}", serial % FANOUT));
        path
    }

    /// Store a framed entry: `data <len>` header, optional prefix (the
    /// CVS-ignore boilerplate for `.cvsignore` masters), payload, and the
    /// separating newline.
    pub fn write(&self, serial: Serial, prefix: Option<&str>, payload: &[u8]) -> Result<()> {
        let path = self.entry_path(serial);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::BlobDir {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let file = fs::File::create(&path).map_err(|e| Error::BlobWrite {
            serial,
            path: path.clone(),
            source: e,
        })?;
        let io_err = |e| Error::BlobWrite {
            serial,
            path: path.clone(),
            source: e,
        };
        if self.compress {
            let mut encoder = GzEncoder::new(file, Compression::default());
            write_entry(&mut encoder, prefix, payload).map_err(io_err)?;
            encoder.finish().map_err(io_err)?;
        } else {
            let mut file = file;
            write_entry(&mut file, prefix, payload).map_err(io_err)?;
        }
        Ok(())
    }

    /// Stream a stored entry into `out`, then unlink it. Each entry is
    /// read exactly once.
    pub fn read_into(&self, serial: Serial, out: &mut dyn Write) -> Result<()> {
        let path = self.entry_path(serial);
        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::BlobMissing(serial));
            }
            Err(e) => return Err(e.into()),
        };
        if self.compress {
            io::copy(&mut GzDecoder::new(file), out)?;
        } else {
            let mut file = file;
            io::copy(&mut file, out)?;
        }
        if let Err(e) = fs::remove_file(&path) {
            debug!("could not unlink blob {:?}: {}", path, e);
        }
        Ok(())
    }

    /// Recursively remove the spill root.
    pub fn destroy_all(self) -> Result<()> {
        Ok(self.root.close()?)
    }
}

fn write_entry(out: &mut dyn Write, prefix: Option<&str>, payload: &[u8]) -> io::Result<()> {
    let prefix = prefix.unwrap_or("");
    writeln!(out, "data {}", prefix.len() + payload.len())?;
    out.write_all(prefix.as_bytes())?;
    out.write_all(payload)?;
    out.write_all(b"\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_unlink() {
        let store = BlobStore::create(false).unwrap();
        store.write(1, None, b"hello\n").unwrap();

        let mut out = Vec::new();
        store.read_into(1, &mut out).unwrap();
        assert_eq!(out, b"data 6\nhello\n\n");

        // Entry is gone after the read.
        match store.read_into(1, &mut Vec::new()) {
            Err(Error::BlobMissing(1)) => {}
            other => panic!("expected missing blob, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_prefix_is_counted_in_length() {
        let store = BlobStore::create(false).unwrap();
        store.write(2, Some("xy"), b"z").unwrap();

        let mut out = Vec::new();
        store.read_into(2, &mut out).unwrap();
        assert_eq!(out, b"data 3\nxyz\n");
    }

    #[test]
    fn test_fanout_layout() {
        let store = BlobStore::create(false).unwrap();
        // 0x12345 = 74565: leaf =45 under 23/1.
        store.write(0x12345, None, b"x").unwrap();
        let expected = store.path().join("23").join("1").join("=45");
        assert!(expected.exists(), "missing {:?}", expected);

        // Small serials live directly under the root.
        store.write(7, None, b"x").unwrap();
        assert!(store.path().join("=7").exists());
    }

    #[test]
    fn test_compressed_round_trip() {
        let store = BlobStore::create(true).unwrap();
        let payload = b"squeeze me ".repeat(50);
        store.write(9, None, &payload).unwrap();

        let mut out = Vec::new();
        store.read_into(9, &mut out).unwrap();
        let expected = {
            let mut v = format!("data {}\n", payload.len()).into_bytes();
            v.extend_from_slice(&payload);
            v.push(b'\n');
            v
        };
        assert_eq!(out, expected);
    }

    #[test]
    fn test_destroy_removes_root() {
        let store = BlobStore::create(false).unwrap();
        store.write(300, None, b"x").unwrap();
        let root = store.path().to_path_buf();
        assert!(root.exists());
        store.destroy_all().unwrap();
        assert!(!root.exists());
    }
}
