//! On-disk layout of a store directory.
//!
//! ```text
//! keys.txt   one key per line, line i holds ordinal i
//! tf.bin     little-endian u32 per ordinal
//! df.bin     little-endian u32 per ordinal
//! total.bin  little-endian u32, documents ingested
//! ```
//!
//! Flushes stage every file as `<name>.tmp`, then publish `commit.json` and
//! rename the staged files into place. A store opened after a crash rolls
//! forward when the marker exists and discards staged files when it does not.

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;

const TMP_SUFFIX: &str = "tmp";

#[derive(Debug, Serialize, Deserialize)]
pub struct CommitMarker {
    pub num_keys: u64,
    pub total_docs: u32,
    pub written_at: String,
}

#[derive(Debug, Clone)]
pub struct StorePaths {
    pub root: PathBuf,
}

impl StorePaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn keys(&self) -> PathBuf { self.root.join("keys.txt") }
    pub fn tf(&self) -> PathBuf { self.root.join("tf.bin") }
    pub fn df(&self) -> PathBuf { self.root.join("df.bin") }
    pub fn total(&self) -> PathBuf { self.root.join("total.bin") }
    pub fn marker(&self) -> PathBuf { self.root.join("commit.json") }

    /// The four files that make up a snapshot.
    pub fn snapshot_files(&self) -> [PathBuf; 4] {
        [self.keys(), self.tf(), self.df(), self.total()]
    }

    /// How many of the snapshot files exist.
    pub fn present_count(&self) -> usize {
        self.snapshot_files().iter().filter(|p| p.exists()).count()
    }
}

/// Sibling path used while staging `path`.
pub fn staged(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(TMP_SUFFIX);
    path.with_file_name(name)
}

pub fn read_keys(path: &Path) -> Result<Vec<String>> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    let buf = String::from_utf8(bytes)
        .map_err(|e| StoreError::corrupt(path, format!("key file is not UTF-8: {e}")))?;
    if buf.is_empty() {
        return Ok(Vec::new());
    }
    let body = buf
        .strip_suffix('\n')
        .ok_or_else(|| StoreError::corrupt(path, "key file is not newline-terminated"))?;
    let mut keys = Vec::new();
    for (line_no, line) in body.split('\n').enumerate() {
        if line.is_empty() {
            return Err(StoreError::corrupt(path, format!("empty key on line {}", line_no + 1)));
        }
        keys.push(line.to_string());
    }
    Ok(keys)
}

pub fn read_counters(path: &Path) -> Result<Vec<u32>> {
    let mut buf = Vec::new();
    File::open(path)?.read_to_end(&mut buf)?;
    if buf.len() % 4 != 0 {
        return Err(StoreError::corrupt(path, format!("size {} is not a multiple of 4", buf.len())));
    }
    Ok(buf
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

pub fn read_total(path: &Path) -> Result<u32> {
    let mut buf = Vec::new();
    File::open(path)?.read_to_end(&mut buf)?;
    let bytes: [u8; 4] = buf
        .as_slice()
        .try_into()
        .map_err(|_| StoreError::corrupt(path, format!("expected 4 bytes, found {}", buf.len())))?;
    Ok(u32::from_le_bytes(bytes))
}

fn write_counters(path: &Path, values: &[u32]) -> Result<()> {
    let f = File::create(path)?;
    let mut w = BufWriter::new(f);
    for v in values {
        w.write_all(&v.to_le_bytes())?;
    }
    let f = w.into_inner().map_err(|e| e.into_error())?;
    f.sync_all()?;
    Ok(())
}

/// Stage `keys.txt` from the full key list, never from the live file.
fn stage_keys(paths: &StorePaths, keys: &[String]) -> Result<()> {
    let f = File::create(staged(&paths.keys()))?;
    let mut w = BufWriter::new(f);
    for key in keys {
        w.write_all(key.as_bytes())?;
        w.write_all(b"\n")?;
    }
    let f = w.into_inner().map_err(|e| e.into_error())?;
    f.sync_all()?;
    Ok(())
}

fn write_marker(paths: &StorePaths, marker: &CommitMarker) -> Result<()> {
    let tmp = staged(&paths.marker());
    let mut f = File::create(&tmp)?;
    f.write_all(&serde_json::to_vec_pretty(marker)?)?;
    f.sync_all()?;
    fs::rename(&tmp, paths.marker())?;
    Ok(())
}

pub fn load_marker(paths: &StorePaths) -> Result<CommitMarker> {
    let buf = fs::read(paths.marker())?;
    Ok(serde_json::from_slice(&buf)?)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

/// Everything a flush publishes.
pub struct Snapshot<'a> {
    /// Every key in ordinal order.
    pub keys: &'a [String],
    pub tf: &'a [u32],
    pub df: &'a [u32],
    pub total: u32,
}

/// Publish a snapshot so that readers see either the old or the new one.
pub fn commit(paths: &StorePaths, snap: &Snapshot<'_>) -> Result<()> {
    fs::create_dir_all(&paths.root)?;
    stage_keys(paths, snap.keys)?;
    write_counters(&staged(&paths.tf()), snap.tf)?;
    write_counters(&staged(&paths.df()), snap.df)?;
    write_counters(&staged(&paths.total()), &[snap.total])?;

    let marker = CommitMarker {
        num_keys: snap.tf.len() as u64,
        total_docs: snap.total,
        written_at: time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
    };
    write_marker(paths, &marker)?;
    sync_dir(&paths.root)?;
    publish(paths)
}

/// Rename every staged file still present over its live file, then drop the marker.
fn publish(paths: &StorePaths) -> Result<()> {
    for file in paths.snapshot_files() {
        let tmp = staged(&file);
        if tmp.exists() {
            fs::rename(&tmp, &file)?;
        }
    }
    sync_dir(&paths.root)?;
    fs::remove_file(paths.marker())?;
    sync_dir(&paths.root)?;
    Ok(())
}

/// Outcome of inspecting a directory for an interrupted flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    Clean,
    RolledForward,
    RolledBack,
}

pub fn recover(paths: &StorePaths) -> Result<Recovery> {
    if paths.marker().exists() {
        match load_marker(paths) {
            Ok(marker) => tracing::warn!(
                root = %paths.root.display(),
                num_keys = marker.num_keys,
                total_docs = marker.total_docs,
                written_at = %marker.written_at,
                "completing interrupted flush"
            ),
            Err(_) => tracing::warn!(root = %paths.root.display(), "completing interrupted flush"),
        }
        publish(paths)?;
        return Ok(Recovery::RolledForward);
    }

    let mut files = paths.snapshot_files().to_vec();
    files.push(paths.marker());
    let mut discarded = false;
    for file in &files {
        let tmp = staged(file);
        if tmp.exists() {
            fs::remove_file(&tmp)?;
            discarded = true;
        }
    }
    if discarded {
        tracing::warn!(root = %paths.root.display(), "discarded staged files from an unfinished flush");
        return Ok(Recovery::RolledBack);
    }
    Ok(Recovery::Clean)
}
