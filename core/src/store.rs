//! Write-buffered counting store.
//!
//! A [`Store`] pairs the flushed [`ColdSnapshot`] with a [`HotOverlay`] of
//! pending increments. Keys first seen since the last flush get ordinals
//! after the cold range, in the order they were observed, so `write` only
//! has to append them to the dictionary.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::cold::{tf_idf, ColdSnapshot, Counts};
use crate::error::{validate_key, Result, StoreError};
use crate::persist::{self, Snapshot};
use crate::trie::Ordinal;

/// Increments accumulated since the last flush.
#[derive(Debug, Default)]
pub struct HotOverlay {
    tf: Vec<u32>,
    df: Vec<u32>,
    new_keys: Vec<String>,
    index: HashMap<String, Ordinal>,
    total: u32,
}

impl HotOverlay {
    fn new(cold_len: usize) -> Self {
        Self { tf: vec![0; cold_len], df: vec![0; cold_len], ..Default::default() }
    }

    /// Keys first seen since the last flush, in observation order.
    pub fn new_keys(&self) -> &[String] {
        &self.new_keys
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    fn ordinal(&self, key: &str) -> Option<Ordinal> {
        self.index.get(key).copied()
    }

    fn push_key(&mut self, key: &str) -> Ordinal {
        let ord = self.tf.len() as Ordinal;
        self.tf.push(0);
        self.df.push(0);
        self.new_keys.push(key.to_string());
        self.index.insert(key.to_string(), ord);
        ord
    }

    fn counts_at(&self, i: Ordinal) -> Counts {
        Counts::new(self.tf[i as usize], self.df[i as usize])
    }
}

/// A counting store opened on a directory: cold snapshot plus hot overlay.
#[derive(Debug)]
pub struct Store {
    cold: ColdSnapshot,
    hot: HotOverlay,
}

impl Store {
    /// Open the store under `dir`; with `create`, a missing store starts empty.
    pub fn open<P: AsRef<Path>>(dir: P, create: bool) -> Result<Self> {
        let cold = ColdSnapshot::open(dir, create)?;
        let hot = HotOverlay::new(cold.len());
        Ok(Self { cold, hot })
    }

    pub fn path(&self) -> &Path {
        self.cold.path()
    }

    pub fn cold(&self) -> &ColdSnapshot {
        &self.cold
    }

    pub fn hot(&self) -> &HotOverlay {
        &self.hot
    }

    /// Number of distinct keys, flushed or pending.
    pub fn len(&self) -> usize {
        self.hot.tf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Documents counted, flushed or pending.
    pub fn total(&self) -> u32 {
        self.cold.total().saturating_add(self.hot.total)
    }

    /// Pending changes exist that `write` would persist.
    pub fn is_dirty(&self) -> bool {
        self.hot.total > 0 || !self.hot.new_keys.is_empty() || self.hot.tf.iter().any(|&v| v > 0)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.hot.index.contains_key(key) || self.cold.contains(key)
    }

    fn lookup(&self, key: &str) -> Option<Ordinal> {
        self.hot.ordinal(key).or_else(|| self.cold.keys.ordinal(key))
    }

    pub fn ordinal(&self, key: &str) -> Result<Ordinal> {
        self.lookup(key).ok_or_else(|| StoreError::KeyNotFound(key.to_string()))
    }

    /// Flushed plus pending counts; unknown keys read as zero.
    pub fn get(&self, key: &str) -> Counts {
        self.lookup(key).map(|ord| self.counts_at(ord)).unwrap_or_default()
    }

    fn counts_at(&self, ord: Ordinal) -> Counts {
        let hot = self.hot.counts_at(ord);
        if (ord as usize) < self.cold.len() {
            self.cold.counts_at(ord).saturating_add(hot)
        } else {
            hot
        }
    }

    pub fn tf_idf(&self, key: &str) -> f64 {
        if !self.contains(key) {
            return 0.0;
        }
        tf_idf(self.get(key), self.total())
    }

    /// Keys in ordinal order: flushed keys, then keys pending since the last flush.
    pub fn keys(&self) -> impl Iterator<Item = String> + '_ {
        self.cold.keys().chain(self.hot.new_keys.iter().cloned())
    }

    pub fn items(&self) -> impl Iterator<Item = (String, Counts)> + '_ {
        self.keys().enumerate().map(|(i, k)| (k, self.counts_at(i as Ordinal)))
    }

    fn resolve_or_insert(&mut self, key: &str) -> Ordinal {
        match self.lookup(key) {
            Some(ord) => ord,
            None => self.hot.push_key(key),
        }
    }

    fn bump(&mut self, key: &str, by: Counts) -> Ordinal {
        let ord = self.resolve_or_insert(key);
        let slot = ord as usize;
        self.hot.tf[slot] = self.hot.tf[slot].saturating_add(by.tf);
        self.hot.df[slot] = self.hot.df[slot].saturating_add(by.df);
        ord
    }

    /// Count one document given as its sequence of keys.
    ///
    /// Every occurrence adds to tf; each distinct key adds one to df.
    pub fn add_document<I, S>(&mut self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys: Vec<S> = keys.into_iter().collect();
        for key in &keys {
            validate_key(key.as_ref())?;
        }
        let mut seen: HashSet<Ordinal> = HashSet::new();
        for key in &keys {
            let ord = self.bump(key.as_ref(), Counts::new(1, 0));
            if seen.insert(ord) {
                let slot = ord as usize;
                self.hot.df[slot] = self.hot.df[slot].saturating_add(1);
            }
        }
        self.hot.total = self.hot.total.saturating_add(1);
        Ok(())
    }

    /// Count one document given as pre-aggregated key counts.
    ///
    /// Each pair adds `n` to tf; each distinct key adds one to df, even when
    /// the same key appears in several pairs.
    pub fn add_counter<I, S>(&mut self, counts: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: AsRef<str>,
    {
        let counts: Vec<(S, u32)> = counts.into_iter().collect();
        for (key, _) in &counts {
            validate_key(key.as_ref())?;
        }
        let mut seen: HashSet<Ordinal> = HashSet::new();
        for (key, n) in &counts {
            let ord = self.bump(key.as_ref(), Counts::new(*n, 0));
            if seen.insert(ord) {
                let slot = ord as usize;
                self.hot.df[slot] = self.hot.df[slot].saturating_add(1);
            }
        }
        self.hot.total = self.hot.total.saturating_add(1);
        Ok(())
    }

    /// Fold every key of `other` (flushed and pending) into this store's overlay.
    ///
    /// Nothing is written until the next `write`. Merging the same source twice
    /// counts it twice.
    pub fn merge(&mut self, other: &Store) {
        let before = self.len();
        for (key, counts) in other.items() {
            self.bump(&key, counts);
        }
        self.hot.total = self.hot.total.saturating_add(other.total());
        tracing::debug!(
            from = %other.path().display(),
            into = %self.path().display(),
            keys = other.len(),
            new_keys = self.len() - before,
            "merged store"
        );
    }

    /// Commit the overlay into a new snapshot and start an empty overlay.
    pub fn write(&mut self) -> Result<()> {
        let cold_len = self.cold.len();
        let mut tf = self.cold.tf.clone();
        let mut df = self.cold.df.clone();
        for (i, (dtf, ddf)) in self.hot.tf[..cold_len].iter().zip(&self.hot.df[..cold_len]).enumerate() {
            if *dtf == 0 && *ddf == 0 {
                continue;
            }
            tf[i] = tf[i].saturating_add(*dtf);
            df[i] = df[i].saturating_add(*ddf);
        }
        tf.extend_from_slice(&self.hot.tf[cold_len..]);
        df.extend_from_slice(&self.hot.df[cold_len..]);

        let keys = self.cold.keys.append(self.hot.new_keys.iter().map(String::as_str))?;
        if keys.len() != tf.len() {
            return Err(StoreError::corrupt(
                self.path(),
                format!("dictionary has {} keys, counters have {}", keys.len(), tf.len()),
            ));
        }
        let total = self.total();
        let all_keys = keys.keys();

        persist::commit(&self.cold.paths, &Snapshot { keys: &all_keys, tf: &tf, df: &df, total })?;

        tracing::info!(
            root = %self.path().display(),
            keys = tf.len(),
            new_keys = self.hot.new_keys.len(),
            total,
            "flushed store"
        );
        self.cold.keys = keys;
        self.cold.tf = tf;
        self.cold.df = df;
        self.cold.total = total;
        self.hot = HotOverlay::new(self.cold.len());
        Ok(())
    }
}
