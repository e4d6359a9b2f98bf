//! On-disk form of a revision.
//!
//! ```text
//! +-------+---------+----------+-------------+---------+-------+
//! | magic | version | revision | payload len | payload | crc32 |
//! | TSRA  | u32     | u64      | u64         | bincode | u32   |
//! +-------+---------+----------+-------------+---------+-------+
//! ```
//!
//! All integers are little endian; the checksum covers the payload only.
//! A directory holds one file per persisted revision plus a `CURRENT` file
//! naming the newest one.

use std::fs::{self, File, OpenOptions};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::warn;
use memmap2::Mmap;

use crate::backend::revision::Revision;
use crate::error::{Result, TesseraError};

pub const MAGIC: &[u8; 4] = b"TSRA";
pub const FORMAT_VERSION: u32 = 1;
pub const CURRENT_FILE: &str = "CURRENT";
pub const LOCK_FILE: &str = "LOCK";

const HEADER_LEN: usize = 4 + 4 + 8 + 8;
const TRAILER_LEN: usize = 4;
const REVISION_PREFIX: &str = "revision-";
const REVISION_SUFFIX: &str = ".tsra";

/// Serialise `revision` into the file layout above.
pub fn encode_revision(revision: &Revision) -> Result<Vec<u8>> {
    let payload = bincode::serialize(revision)?;
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len() + TRAILER_LEN);
    out.write_all(MAGIC)?;
    out.write_u32::<LittleEndian>(FORMAT_VERSION)?;
    out.write_u64::<LittleEndian>(revision.number())?;
    out.write_u64::<LittleEndian>(payload.len() as u64)?;
    out.write_all(&payload)?;
    out.write_u32::<LittleEndian>(crc32fast::hash(&payload))?;
    Ok(out)
}

/// Parse and verify a revision file's bytes.
pub fn decode_revision(bytes: &[u8]) -> Result<Revision> {
    if bytes.len() < HEADER_LEN + TRAILER_LEN {
        return Err(TesseraError::corrupt(format!(
            "revision file too short ({} bytes)",
            bytes.len()
        )));
    }
    let mut reader = Cursor::new(bytes);
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(TesseraError::corrupt("bad magic"));
    }
    let version = reader.read_u32::<LittleEndian>()?;
    if version != FORMAT_VERSION {
        return Err(TesseraError::corrupt(format!(
            "unsupported format version {version}"
        )));
    }
    let number = reader.read_u64::<LittleEndian>()?;
    let payload_len = reader.read_u64::<LittleEndian>()?;
    let expected = payload_len.checked_add((HEADER_LEN + TRAILER_LEN) as u64);
    if expected != Some(bytes.len() as u64) {
        return Err(TesseraError::corrupt(format!(
            "payload length {payload_len} does not match file size {}",
            bytes.len()
        )));
    }
    let payload = &bytes[HEADER_LEN..HEADER_LEN + payload_len as usize];
    reader.set_position((HEADER_LEN as u64) + payload_len);
    let stored = reader.read_u32::<LittleEndian>()?;
    let actual = crc32fast::hash(payload);
    if stored != actual {
        return Err(TesseraError::corrupt(format!(
            "checksum mismatch: stored {stored:08x}, computed {actual:08x}"
        )));
    }
    let revision: Revision = bincode::deserialize(payload)?;
    if revision.number() != number {
        return Err(TesseraError::corrupt(format!(
            "header says revision {number}, payload says {}",
            revision.number()
        )));
    }
    Ok(revision)
}

pub fn revision_file_name(number: u64) -> String {
    format!("{REVISION_PREFIX}{number:020}{REVISION_SUFFIX}")
}

fn parse_revision_file_name(name: &str) -> Option<u64> {
    name.strip_prefix(REVISION_PREFIX)?
        .strip_suffix(REVISION_SUFFIX)?
        .parse()
        .ok()
}

/// Load a revision file through a memory map.
pub fn read_revision_file(path: &Path) -> Result<Revision> {
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Err(TesseraError::corrupt(format!("{} is empty", path.display())));
    }
    let mmap = unsafe { Mmap::map(&file)? };
    decode_revision(&mmap).inspect_err(|e| warn!("rejected {}: {e}", path.display()))
}

/// Write `revision` next to the others and make it current.
///
/// The file is written under a temporary name and renamed into place, so a
/// crash leaves either the old or the new revision, never a torn one.
pub fn write_revision(dir: &Path, revision: &Revision, sync: bool) -> Result<PathBuf> {
    let name = revision_file_name(revision.number());
    let path = dir.join(&name);
    let tmp = dir.join(format!("{name}.tmp"));

    let bytes = encode_revision(revision)?;
    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp)?;
        file.write_all(&bytes)?;
        if sync {
            file.sync_all()?;
        }
    }
    fs::rename(&tmp, &path)?;
    write_current(dir, &name, sync)?;
    Ok(path)
}

fn write_current(dir: &Path, name: &str, sync: bool) -> Result<()> {
    let tmp = dir.join(format!("{CURRENT_FILE}.tmp"));
    {
        let mut file = File::create(&tmp)?;
        writeln!(file, "{name}")?;
        if sync {
            file.sync_all()?;
        }
    }
    fs::rename(tmp, dir.join(CURRENT_FILE))?;
    Ok(())
}

/// Path of the current revision file, `None` for a directory that has
/// never been written to.
pub fn current_revision_path(dir: &Path) -> Result<Option<PathBuf>> {
    let pointer = dir.join(CURRENT_FILE);
    if !pointer.exists() {
        return Ok(None);
    }
    let name = fs::read_to_string(&pointer)?;
    let name = name.trim();
    if parse_revision_file_name(name).is_none() {
        return Err(TesseraError::corrupt(format!(
            "CURRENT names an unknown file: {name:?}"
        )));
    }
    Ok(Some(dir.join(name)))
}

/// Revision files in `dir`, oldest first.
pub fn list_revisions(dir: &Path) -> Result<Vec<(u64, PathBuf)>> {
    let mut revisions = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if let Some(number) = name.to_str().and_then(parse_revision_file_name) {
            revisions.push((number, entry.path()));
        }
    }
    revisions.sort_by_key(|(number, _)| *number);
    Ok(revisions)
}

/// Delete all but the newest `keep` revision files. Returns how many were
/// removed.
pub fn prune_revisions(dir: &Path, keep: usize) -> Result<usize> {
    let revisions = list_revisions(dir)?;
    let excess = revisions.len().saturating_sub(keep.max(1));
    for (_, path) in &revisions[..excess] {
        fs::remove_file(path)?;
    }
    Ok(excess)
}
