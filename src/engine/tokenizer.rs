use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Reserved id for sequence padding.
pub const PAD_ID: u32 = 0;
/// Reserved id for words not present in a frozen vocabulary.
pub const UNK_ID: u32 = 1;
/// Fixed encoded sequence length. Longer inputs are truncated,
/// shorter ones right-padded with [`PAD_ID`].
pub const MAX_LEN: usize = 12;

const PAD_TOKEN: &str = "[PAD]";
const UNK_TOKEN: &str = "[UNK]";

// Typical command words, pre-populated so the first ids are stable
// across training runs.
const STANDARD_WORDS: &[&str] = &[
    "lock", "computer", "system", "status", "volume", "up", "down", "increase", "decrease",
    "make", "quieter", "louder", "check", "laptop", "screen", "machine", "battery", "cpu",
    "usage",
];

lazy_static! {
    static ref WORD_RE: Regex = Regex::new(r"\w+").expect("word pattern is valid");
}

/// Result of looking a word up in a frozen vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenLookup {
    Known(u32),
    Unknown,
}

/// Word-level vocabulary for the intent engine.
///
/// Ids are dense and start at 2; 0 and 1 are reserved for padding and
/// unknown words. The vocabulary is append-only while training
/// ([`Vocabulary::encode_train`]) and must be treated as a frozen,
/// read-only snapshot during inference ([`Vocabulary::encode`] never
/// mutates; unseen words map to [`UNK_ID`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vocabulary {
    word_to_id: HashMap<String, u32>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new()
    }
}

impl Vocabulary {
    pub fn new() -> Self {
        let mut vocab = Self {
            word_to_id: HashMap::new(),
        };
        vocab.word_to_id.insert(PAD_TOKEN.to_string(), PAD_ID);
        vocab.word_to_id.insert(UNK_TOKEN.to_string(), UNK_ID);
        for word in STANDARD_WORDS {
            vocab.add_word(word);
        }
        vocab
    }

    /// Number of distinct ids, including the two reserved ones.
    pub fn len(&self) -> usize {
        self.word_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.word_to_id.is_empty()
    }

    /// Iterates over every (word, id) pair, in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.word_to_id.iter().map(|(word, &id)| (word.as_str(), id))
    }

    pub fn lookup(&self, word: &str) -> TokenLookup {
        match self.word_to_id.get(word) {
            Some(&id) => TokenLookup::Known(id),
            None => TokenLookup::Unknown,
        }
    }

    fn add_word(&mut self, word: &str) -> u32 {
        if let Some(&id) = self.word_to_id.get(word) {
            return id;
        }
        let id = self.word_to_id.len() as u32;
        self.word_to_id.insert(word.to_string(), id);
        id
    }

    /// Encodes text against the frozen vocabulary. Never mutates;
    /// unseen words become [`UNK_ID`].
    pub fn encode(&self, text: &str) -> Vec<u32> {
        let mut ids: Vec<u32> = normalize_words(text)
            .iter()
            .take(MAX_LEN)
            .map(|word| match self.lookup(word) {
                TokenLookup::Known(id) => id,
                TokenLookup::Unknown => UNK_ID,
            })
            .collect();
        ids.resize(MAX_LEN, PAD_ID);
        ids
    }

    /// Encodes text during training, assigning the next free id to any
    /// unseen word.
    pub fn encode_train(&mut self, text: &str) -> Vec<u32> {
        let words = normalize_words(text);
        let mut ids: Vec<u32> = words.iter().take(MAX_LEN).map(|w| self.add_word(w)).collect();
        ids.resize(MAX_LEN, PAD_ID);
        ids
    }

    /// Reconstructs the word sequence, skipping padding. Ids without a
    /// word (including [`UNK_ID`]) render as `[UNK]`.
    pub fn decode(&self, ids: &[u32]) -> String {
        let id_to_word: HashMap<u32, &str> = self
            .word_to_id
            .iter()
            .map(|(word, &id)| (id, word.as_str()))
            .collect();
        ids.iter()
            .filter(|&&id| id != PAD_ID)
            .map(|id| id_to_word.get(id).copied().unwrap_or(UNK_TOKEN))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn split_words(text: &str) -> impl Iterator<Item = &str> {
    WORD_RE.find_iter(text).map(|m| m.as_str())
}

/// Lower-cases and splits text the same way encoding does.
pub(crate) fn normalize_words(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    split_words(&lower).map(|w| w.to_string()).collect()
}
