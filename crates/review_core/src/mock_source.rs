//! In-memory review backend for offline use and tests.

use std::time::Duration;

use async_trait::async_trait;
use shared::{
    domain::KanjiRecord,
    protocol::{KanjiAnswer, ReviewBatchResponse, TelegramCredential},
};
use tokio::sync::Mutex;
use tracing::debug;

use crate::{error::SourceError, ReviewSource};

const MOCK_TOKEN: &str = "mock-token";

/// Serves a fixed sequence of batches.
///
/// The first batch is due immediately. Once its results are reported it is
/// retired, and the next batch only becomes due after
/// [`request_additional_material`](ReviewSource::request_additional_material).
pub struct MockReviewSource {
    batches: Vec<Vec<KanjiRecord>>,
    latency: Duration,
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    current: usize,
    retired: bool,
    token: Option<String>,
    reports: Vec<Vec<KanjiAnswer>>,
    learn_more_calls: usize,
}

impl MockReviewSource {
    pub fn new(batches: Vec<Vec<KanjiRecord>>) -> Self {
        Self {
            batches,
            latency: Duration::ZERO,
            state: Mutex::new(MockState::default()),
        }
    }

    /// Three small batches of colour and landscape kanji.
    pub fn sample() -> Self {
        Self::new(vec![
            vec![KanjiRecord::new(1, "黒", "black")
                .with_example("黒", "くろ")
                .with_example("黒い", "くろい")],
            vec![
                KanjiRecord::new(4, "青", "blue")
                    .with_example("青", "あお")
                    .with_example("青い", "あおい"),
                KanjiRecord::new(5, "緑", "green").with_example("緑", "みどり"),
            ],
            vec![
                KanjiRecord::new(6, "山", "mountain")
                    .with_example("山", "やま")
                    .with_example("富士山", "ふじさん"),
                KanjiRecord::new(7, "川", "river").with_example("川", "かわ"),
            ],
        ])
    }

    /// Delay applied to every call, to exercise loading states.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub async fn reports(&self) -> Vec<Vec<KanjiAnswer>> {
        self.state.lock().await.reports.clone()
    }

    pub async fn learn_more_calls(&self) -> usize {
        self.state.lock().await.learn_more_calls
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn require_token(state: &MockState) -> Result<(), SourceError> {
        if state.token.is_some() {
            Ok(())
        } else {
            Err(SourceError::Unauthorized)
        }
    }
}

#[async_trait]
impl ReviewSource for MockReviewSource {
    async fn authenticate(&self, credential: &TelegramCredential) -> Result<String, SourceError> {
        self.simulate_latency().await;
        debug!(user = %credential.username, "mock: login");
        self.state.lock().await.token = Some(MOCK_TOKEN.to_string());
        Ok(MOCK_TOKEN.to_string())
    }

    async fn set_token(&self, token: Option<String>) {
        self.state.lock().await.token = token;
    }

    async fn has_token(&self) -> bool {
        self.state.lock().await.token.is_some()
    }

    async fn fetch_review_batch(&self) -> Result<ReviewBatchResponse, SourceError> {
        self.simulate_latency().await;
        let state = self.state.lock().await;
        Self::require_token(&state)?;

        let due = match self.batches.get(state.current) {
            Some(batch) if !state.retired => batch.clone(),
            _ => Vec::new(),
        };
        debug!(batch = state.current, kanji = due.len(), "mock: fetch");
        let total_pending = due.len() as u32;
        Ok(ReviewBatchResponse::new(due, total_pending))
    }

    async fn submit_batch_result(&self, answers: &[KanjiAnswer]) -> Result<(), SourceError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        Self::require_token(&state)?;
        debug!(answers = answers.len(), "mock: answers");
        state.reports.push(answers.to_vec());
        state.retired = true;
        Ok(())
    }

    async fn request_additional_material(&self) -> Result<(), SourceError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        Self::require_token(&state)?;
        state.learn_more_calls += 1;
        if state.retired && state.current < self.batches.len() {
            state.current += 1;
            state.retired = false;
        }
        debug!(batch = state.current, "mock: learn more");
        Ok(())
    }
}
