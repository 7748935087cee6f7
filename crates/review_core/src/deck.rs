//! Ordered working queue of review items for the active batch.
//!
//! The front item is always the one shown to the user. Items leave the deck only
//! through [`Deck::pop_front`]; a missed item is rotated to the back and comes
//! around again later in the same pass.

use std::collections::VecDeque;

use rand::Rng;
use shared::domain::DrillKind;

/// One drillable question derived from a kanji record of the current batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewItem {
    pub kind: DrillKind,
    /// Index of the owning record in the batch the item was built from.
    pub kanji_index: usize,
    pub prompt: String,
    /// Comma-separated accepted answers.
    pub accepted: String,
}

#[derive(Debug, Default, Clone)]
pub struct Deck {
    items: VecDeque<ReviewItem>,
}

impl Deck {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the contents, optionally shuffling them with `rng`.
    pub fn load<R>(&mut self, items: Vec<ReviewItem>, shuffle: bool, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        let mut items = items;
        if shuffle {
            fisher_yates(&mut items, rng);
        }
        self.items = items.into();
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn peek_front(&self) -> Option<&ReviewItem> {
        self.items.front()
    }

    pub fn peek_back(&self) -> Option<&ReviewItem> {
        self.items.back()
    }

    /// Discards the front item. Returns `None` on an empty deck.
    pub fn pop_front(&mut self) -> Option<ReviewItem> {
        self.items.pop_front()
    }

    /// Moves the front item to the back. Returns false on an empty deck.
    pub fn requeue_front_to_back(&mut self) -> bool {
        match self.items.pop_front() {
            Some(item) => {
                self.items.push_back(item);
                true
            }
            None => false,
        }
    }

    /// Moves the back item to the front, reversing the last requeue.
    ///
    /// Only meaningful directly after [`requeue_front_to_back`](Self::requeue_front_to_back);
    /// the session controller enforces that window.
    pub fn undo_last_requeue(&mut self) -> bool {
        match self.items.pop_back() {
            Some(item) => {
                self.items.push_front(item);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReviewItem> {
        self.items.iter()
    }
}

/// Uniform in-place shuffle: for `i` from `len - 1` down to 1, swap `i` with an
/// index drawn from `[0, i]`.
fn fisher_yates<T, R>(items: &mut [T], rng: &mut R)
where
    R: Rng + ?Sized,
{
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn item(prompt: &str) -> ReviewItem {
        ReviewItem {
            kind: DrillKind::Meaning,
            kanji_index: 0,
            prompt: prompt.to_string(),
            accepted: prompt.to_string(),
        }
    }

    fn prompts(deck: &Deck) -> Vec<&str> {
        deck.iter().map(|i| i.prompt.as_str()).collect()
    }

    fn ordered(names: &[&str]) -> Deck {
        let mut deck = Deck::new();
        let mut rng = StdRng::seed_from_u64(0);
        deck.load(names.iter().map(|n| item(n)).collect(), false, &mut rng);
        deck
    }

    #[test]
    fn load_without_shuffle_keeps_order() {
        let deck = ordered(&["x", "y", "z"]);
        assert_eq!(prompts(&deck), ["x", "y", "z"]);
        assert_eq!(deck.peek_front().map(|i| i.prompt.as_str()), Some("x"));
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let names: Vec<String> = (0..50).map(|n| format!("item-{n}")).collect();
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut deck = Deck::new();
            deck.load(names.iter().map(|n| item(n)).collect(), true, &mut rng);

            let mut shuffled: Vec<String> = deck.iter().map(|i| i.prompt.clone()).collect();
            assert_eq!(shuffled.len(), names.len());
            shuffled.sort();
            let mut expected = names.clone();
            expected.sort();
            assert_eq!(shuffled, expected);
        }
    }

    #[test]
    fn shuffle_reorders_for_some_seed() {
        let names: Vec<String> = (0..10).map(|n| n.to_string()).collect();
        let reordered = (0..10).any(|seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut deck = Deck::new();
            deck.load(names.iter().map(|n| item(n)).collect(), true, &mut rng);
            deck.iter().map(|i| i.prompt.clone()).collect::<Vec<_>>() != names
        });
        assert!(reordered);
    }

    #[test]
    fn shuffle_handles_tiny_decks() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut deck = Deck::new();
        deck.load(Vec::new(), true, &mut rng);
        assert!(deck.is_empty());
        deck.load(vec![item("only")], true, &mut rng);
        assert_eq!(prompts(&deck), ["only"]);
    }

    #[test]
    fn requeue_then_undo_restores_order() {
        let mut deck = ordered(&["x", "y", "z"]);
        assert!(deck.requeue_front_to_back());
        assert_eq!(prompts(&deck), ["y", "z", "x"]);
        assert!(deck.undo_last_requeue());
        assert_eq!(prompts(&deck), ["x", "y", "z"]);
    }

    #[test]
    fn pop_front_removes_current() {
        let mut deck = ordered(&["x", "y"]);
        assert_eq!(deck.pop_front().map(|i| i.prompt), Some("x".to_string()));
        assert_eq!(prompts(&deck), ["y"]);
    }

    #[test]
    fn operations_on_empty_deck_are_noops() {
        let mut deck = Deck::new();
        assert!(deck.pop_front().is_none());
        assert!(!deck.requeue_front_to_back());
        assert!(!deck.undo_last_requeue());
        assert!(deck.peek_front().is_none());
    }
}
