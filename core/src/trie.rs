//! Immutable key dictionary that remembers insertion order.
//!
//! Keys live in an FST, which stores them in lexicographic order. Each key
//! maps to the position it had in the source sequence, so counters can be
//! kept in plain arrays indexed by that position and the dictionary can be
//! rebuilt with more keys without moving any existing counter.

use std::fmt;
use std::path::Path;

use fst::{Map, MapBuilder, Streamer};

use crate::error::{validate_key, Result, StoreError};
use crate::persist;

/// Dense index of a key in a store's counter arrays.
pub type Ordinal = u32;

pub struct OrderedTrie {
    map: Map<Vec<u8>>,
}

impl OrderedTrie {
    /// Build a dictionary from unique keys; each key gets its position in `keys`.
    pub fn from_keys<I, S>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut entries: Vec<(String, u64)> = keys
            .into_iter()
            .enumerate()
            .map(|(pos, key)| (key.into(), pos as u64))
            .collect();
        for (key, _) in &entries {
            validate_key(key)?;
        }
        if entries.len() > Ordinal::MAX as usize {
            return Err(StoreError::InvalidKey(format!("vocabulary exceeds {} keys", Ordinal::MAX)));
        }
        // FST insertion must be in byte order
        entries.sort_unstable();
        if let Some(pair) = entries.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(StoreError::DuplicateKey(pair[0].0.clone()));
        }

        let mut builder = MapBuilder::memory();
        for (key, pos) in &entries {
            builder.insert(key, *pos)?;
        }
        let map = Map::new(builder.into_inner()?)?;
        Ok(Self { map })
    }

    /// Load a newline-terminated key file, one key per line.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_keys(persist::read_keys(path.as_ref())?)
    }

    /// A new dictionary holding these keys followed by `new_keys`.
    ///
    /// Existing ordinals are unchanged; new keys continue from `len()`.
    pub fn append<I, S>(&self, new_keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_keys(self.keys().into_iter().chain(new_keys.into_iter().map(Into::into)))
    }

    pub fn ordinal(&self, key: &str) -> Option<Ordinal> {
        self.map.get(key).map(|pos| pos as Ordinal)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// All keys in ordinal order.
    pub fn keys(&self) -> Vec<String> {
        let mut ordered = vec![String::new(); self.len()];
        let mut stream = self.map.stream();
        while let Some((key, pos)) = stream.next() {
            ordered[pos as usize] = String::from_utf8_lossy(key).into_owned();
        }
        ordered
    }

    pub fn iter(&self) -> impl Iterator<Item = String> {
        self.keys().into_iter()
    }
}

impl fmt::Debug for OrderedTrie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedTrie").field("len", &self.len()).finish()
    }
}
