use std::collections::BTreeMap;

use shared::{domain::KanjiId, protocol::KanjiAnswer};

/// Per-kanji incorrect-answer counts for the current batch.
///
/// Counts mean "times missed this batch" and therefore never go below zero.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StreakTracker {
    counts: BTreeMap<KanjiId, u32>,
}

impl StreakTracker {
    /// Tracker with every key of the batch present at zero.
    pub fn for_batch(keys: impl IntoIterator<Item = KanjiId>) -> Self {
        Self {
            counts: keys.into_iter().map(|key| (key, 0)).collect(),
        }
    }

    pub fn increment(&mut self, key: KanjiId) -> u32 {
        let count = self.counts.entry(key).or_insert(0);
        *count += 1;
        *count
    }

    pub fn decrement(&mut self, key: KanjiId) -> u32 {
        let count = self.counts.entry(key).or_insert(0);
        *count = count.saturating_sub(1);
        *count
    }

    pub fn get(&self, key: KanjiId) -> u32 {
        self.counts.get(&key).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> BTreeMap<KanjiId, u32> {
        self.counts.clone()
    }

    /// Snapshot in the shape the review backend accepts.
    pub fn to_answers(&self) -> Vec<KanjiAnswer> {
        self.counts
            .iter()
            .map(|(&kanji_id, &incorrect_streak)| KanjiAnswer {
                kanji_id,
                incorrect_streak,
            })
            .collect()
    }

    pub fn total_misses(&self) -> u32 {
        self.counts.values().sum()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
