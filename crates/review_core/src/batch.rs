use std::sync::Arc;

use shared::{
    domain::{DrillKind, KanjiRecord},
    protocol::KanjiAnswer,
};
use tracing::{debug, info};

use crate::{deck::ReviewItem, error::SourceError, ReviewSource};

/// A fetched batch together with its expanded review items.
#[derive(Debug, Clone)]
pub struct LoadedBatch {
    pub records: Vec<KanjiRecord>,
    pub items: Vec<ReviewItem>,
    pub total_pending: u32,
}

#[derive(Debug, Clone)]
pub enum BatchOutcome {
    Ready(LoadedBatch),
    /// Nothing left to review at all.
    Exhausted,
    /// The backend has pending material but did not hand any out yet.
    NotYetAvailable { total_pending: u32 },
}

/// Expands records into review items: one meaning drill per kanji, then one word
/// drill per example, in record order.
pub fn expand_records(records: &[KanjiRecord]) -> Vec<ReviewItem> {
    let mut items = Vec::with_capacity(records.iter().map(KanjiRecord::drill_count).sum());
    for (kanji_index, record) in records.iter().enumerate() {
        items.push(ReviewItem {
            kind: DrillKind::Meaning,
            kanji_index,
            prompt: record.kanji.clone(),
            accepted: record.meaning.clone(),
        });
        for example in &record.examples {
            items.push(ReviewItem {
                kind: DrillKind::Word,
                kanji_index,
                prompt: example.word.clone(),
                accepted: example.reading.clone(),
            });
        }
    }
    items
}

/// Talks to the review backend on behalf of the session controller.
#[derive(Clone)]
pub struct BatchLoader {
    source: Arc<dyn ReviewSource>,
}

impl BatchLoader {
    pub fn new(source: Arc<dyn ReviewSource>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &Arc<dyn ReviewSource> {
        &self.source
    }

    pub async fn request_batch(&self) -> Result<BatchOutcome, SourceError> {
        let response = self.source.fetch_review_batch().await?;
        if response.kanjis.is_empty() {
            debug!(
                total_pending = response.total_pending,
                "batch: backend returned no kanji"
            );
            return Ok(if response.total_pending == 0 {
                BatchOutcome::Exhausted
            } else {
                BatchOutcome::NotYetAvailable {
                    total_pending: response.total_pending,
                }
            });
        }

        let items = expand_records(&response.kanjis);
        info!(
            kanji = response.kanjis.len(),
            items = items.len(),
            total_pending = response.total_pending,
            "batch: fetched"
        );
        Ok(BatchOutcome::Ready(LoadedBatch {
            records: response.kanjis,
            items,
            total_pending: response.total_pending,
        }))
    }

    /// Asks the backend to make new material available. Must finish before the
    /// next [`request_batch`](Self::request_batch) can be expected to return it.
    pub async fn request_more(&self) -> Result<(), SourceError> {
        self.source.request_additional_material().await?;
        info!("batch: additional material requested");
        Ok(())
    }

    pub async fn report(&self, answers: &[KanjiAnswer]) -> Result<(), SourceError> {
        self.source.submit_batch_result(answers).await?;
        info!(kanji = answers.len(), "batch: results reported");
        Ok(())
    }
}
