//! Persistent term and document frequency counts over an open vocabulary.

pub mod cold;
pub mod error;
pub mod persist;
pub mod store;
pub mod tokenizer;
pub mod trie;

pub use cold::{tf_idf, ColdSnapshot, Counts};
pub use error::{Result, StoreError};
pub use store::{HotOverlay, Store};
pub use trie::{OrderedTrie, Ordinal};
