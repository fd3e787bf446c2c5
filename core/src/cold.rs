use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::persist::{self, Recovery, Snapshot, StorePaths};
use crate::trie::{OrderedTrie, Ordinal};

/// Term and document frequency of one key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub tf: u32,
    pub df: u32,
}

impl Counts {
    pub fn new(tf: u32, df: u32) -> Self {
        Self { tf, df }
    }

    pub fn saturating_add(self, other: Counts) -> Counts {
        Counts { tf: self.tf.saturating_add(other.tf), df: self.df.saturating_add(other.df) }
    }
}

impl From<(u32, u32)> for Counts {
    fn from((tf, df): (u32, u32)) -> Self {
        Self { tf, df }
    }
}

/// `tf * ln(total / df)`, zero when the key never occurred in a document.
pub fn tf_idf(counts: Counts, total_docs: u32) -> f64 {
    if counts.df == 0 || total_docs == 0 {
        return 0.0;
    }
    counts.tf as f64 * (total_docs as f64 / counts.df as f64).ln()
}

/// Read-only view of the last flushed state of a store directory.
#[derive(Debug)]
pub struct ColdSnapshot {
    pub(crate) paths: StorePaths,
    pub(crate) keys: OrderedTrie,
    pub(crate) tf: Vec<u32>,
    pub(crate) df: Vec<u32>,
    pub(crate) total: u32,
}

impl ColdSnapshot {
    /// Load the snapshot under `dir`, creating an empty one when `create` is set.
    pub fn open<P: AsRef<Path>>(dir: P, create: bool) -> Result<Self> {
        let paths = StorePaths::new(dir);
        if !paths.root.exists() {
            if !create {
                return Err(StoreError::StoreNotFound(paths.root));
            }
            fs::create_dir_all(&paths.root)?;
        }
        if persist::recover(&paths)? != Recovery::Clean {
            tracing::debug!(root = %paths.root.display(), "store recovered");
        }

        match paths.present_count() {
            0 if create => {
                tracing::debug!(root = %paths.root.display(), "creating empty store");
                persist::commit(&paths, &Snapshot { keys: &[], tf: &[], df: &[], total: 0 })?;
            }
            0 => return Err(StoreError::StoreNotFound(paths.root)),
            4 => {}
            n => {
                return Err(StoreError::corrupt(
                    &paths.root,
                    format!("{n} of keys.txt, tf.bin, df.bin, total.bin present"),
                ))
            }
        }
        Self::load(paths)
    }

    fn load(paths: StorePaths) -> Result<Self> {
        let keys = OrderedTrie::from_keys(persist::read_keys(&paths.keys())?).map_err(|e| match e {
            StoreError::DuplicateKey(k) => StoreError::corrupt(paths.keys(), format!("duplicate key {k:?}")),
            StoreError::InvalidKey(k) => StoreError::corrupt(paths.keys(), format!("invalid key {k:?}")),
            other => other,
        })?;
        let tf = persist::read_counters(&paths.tf())?;
        let df = persist::read_counters(&paths.df())?;
        let total = persist::read_total(&paths.total())?;

        if tf.len() != keys.len() || df.len() != keys.len() {
            return Err(StoreError::corrupt(
                &paths.root,
                format!("{} keys but {} tf and {} df entries", keys.len(), tf.len(), df.len()),
            ));
        }
        tracing::debug!(root = %paths.root.display(), keys = keys.len(), total, "loaded snapshot");
        Ok(Self { paths, keys, tf, df, total })
    }

    pub fn path(&self) -> &Path {
        &self.paths.root
    }

    pub fn len(&self) -> usize {
        self.tf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tf.is_empty()
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn get(&self, key: &str) -> Option<Counts> {
        self.keys.ordinal(key).map(|i| self.counts_at(i))
    }

    pub fn ordinal(&self, key: &str) -> Result<Ordinal> {
        self.keys.ordinal(key).ok_or_else(|| StoreError::KeyNotFound(key.to_string()))
    }

    pub(crate) fn counts_at(&self, i: Ordinal) -> Counts {
        Counts::new(self.tf[i as usize], self.df[i as usize])
    }

    /// Keys in ordinal order.
    pub fn keys(&self) -> impl Iterator<Item = String> {
        self.keys.iter()
    }

    pub fn items(&self) -> impl Iterator<Item = (String, Counts)> + '_ {
        self.keys().enumerate().map(|(i, k)| (k, self.counts_at(i as Ordinal)))
    }

    pub fn tf_idf(&self, key: &str) -> f64 {
        self.get(key).map(|c| tf_idf(c, self.total)).unwrap_or(0.0)
    }
}
