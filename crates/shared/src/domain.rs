use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(KanjiId);

/// Which half of a kanji a review item drills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrillKind {
    Meaning,
    Word,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KanjiWord {
    pub word: String,
    /// Comma-separated list of accepted readings.
    pub reading: String,
}

/// One kanji as served by the review backend. Immutable once part of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KanjiRecord {
    pub id: KanjiId,
    pub kanji: String,
    /// Comma-separated list of accepted meanings.
    pub meaning: String,
    #[serde(default)]
    pub examples: Vec<KanjiWord>,
}

impl KanjiRecord {
    pub fn new(id: i64, kanji: impl Into<String>, meaning: impl Into<String>) -> Self {
        Self {
            id: KanjiId(id),
            kanji: kanji.into(),
            meaning: meaning.into(),
            examples: Vec::new(),
        }
    }

    pub fn with_example(mut self, word: impl Into<String>, reading: impl Into<String>) -> Self {
        self.examples.push(KanjiWord {
            word: word.into(),
            reading: reading.into(),
        });
        self
    }

    /// Number of review items this record expands to: its meaning plus one per example word.
    pub fn drill_count(&self) -> usize {
        1 + self.examples.len()
    }
}
