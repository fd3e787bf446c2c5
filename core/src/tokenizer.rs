use lazy_static::lazy_static;
use regex::Regex;
pub use rust_stemmers::Algorithm;
use rust_stemmers::Stemmer;
use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    // Sentence ends at terminal punctuation followed by whitespace, or at a blank line.
    static ref SENTENCE_END: Regex = Regex::new(r"[.!?…]+\s+|\n\s*\n").expect("valid regex");
    static ref SPACE: Regex = Regex::new(r"\s+").expect("valid regex");
}

/// Turns text into keys: sentences, then whitespace tokens, then n-grams.
///
/// Stateless apart from its settings, so one value can be shared by every caller.
pub struct Analyzer {
    ngram: usize,
    stemmer: Option<Stemmer>,
}

impl Analyzer {
    /// `ngram` words per key; zero is treated as one.
    pub fn new(ngram: usize) -> Self {
        Self { ngram: ngram.max(1), stemmer: None }
    }

    pub fn with_stemming(mut self, algorithm: Algorithm) -> Self {
        self.stemmer = Some(Stemmer::create(algorithm));
        self
    }

    pub fn ngram(&self) -> usize {
        self.ngram
    }

    /// NFKC-normalized, lowercased sentences split into tokens.
    pub fn sentences(&self, text: &str) -> Vec<Vec<String>> {
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        SENTENCE_END
            .split(&normalized)
            .map(|sentence| {
                SPACE
                    .split(sentence)
                    .filter(|t| !t.is_empty())
                    .map(|t| match &self.stemmer {
                        Some(s) => s.stem(t).into_owned(),
                        None => t.to_string(),
                    })
                    .collect::<Vec<_>>()
            })
            .filter(|tokens| !tokens.is_empty())
            .collect()
    }

    /// Every n-gram of every sentence, joined by single spaces.
    pub fn locutions(&self, text: &str) -> Vec<String> {
        self.sentences(text)
            .iter()
            .flat_map(|tokens| ngrams(tokens, self.ngram))
            .collect()
    }

    /// Locution counts for one document, ready for `Store::add_counter`.
    pub fn count(&self, text: &str) -> HashMap<String, u32> {
        let mut counts = HashMap::new();
        for loc in self.locutions(text) {
            *counts.entry(loc).or_insert(0) += 1;
        }
        counts
    }
}

/// Sliding windows of `size` tokens; nothing when the sentence is shorter.
pub fn ngrams(tokens: &[String], size: usize) -> impl Iterator<Item = String> + '_ {
    tokens.windows(size.max(1)).map(|w| w.join(" "))
}
