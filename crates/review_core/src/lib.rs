//! Kanji review session core: answer matching, the review deck, per-kanji miss
//! tracking, batch replenishment, and the session state machine that ties them
//! together. The review backend and the phonetic input converter are injected.

use async_trait::async_trait;
use shared::protocol::{KanjiAnswer, ReviewBatchResponse, TelegramCredential};

pub mod batch;
pub mod deck;
pub mod error;
pub mod matcher;
pub mod mock_source;
pub mod normalize;
pub mod session;
pub mod source;
pub mod streak;

pub use batch::{BatchLoader, BatchOutcome, LoadedBatch};
pub use deck::{Deck, ReviewItem};
pub use error::{IgnoredReason, ReviewError, ReviewResult, SourceError};
pub use mock_source::MockReviewSource;
pub use normalize::{InputNormalizer, PassthroughNormalizer, WanaKanaNormalizer};
pub use session::{
    CompletionSummary, DeferredEffect, EffectKind, Feedback, KanjiScore, SessionController,
    SessionOptions, SessionPhase, SessionState, Transition,
};
pub use source::HttpReviewSource;
pub use streak::StreakTracker;

/// The remote side of a review session.
///
/// Implementations hold the session token returned by [`authenticate`] and attach
/// it to every other call. A rejected token surfaces as
/// [`SourceError::Unauthorized`].
///
/// [`authenticate`]: ReviewSource::authenticate
#[async_trait]
pub trait ReviewSource: Send + Sync {
    async fn authenticate(&self, credential: &TelegramCredential) -> Result<String, SourceError>;
    async fn set_token(&self, token: Option<String>);
    async fn has_token(&self) -> bool;
    async fn fetch_review_batch(&self) -> Result<ReviewBatchResponse, SourceError>;
    async fn submit_batch_result(&self, answers: &[KanjiAnswer]) -> Result<(), SourceError>;
    async fn request_additional_material(&self) -> Result<(), SourceError>;
}

/// Notified when the review backend rejects the session token.
pub trait AuthObserver: Send + Sync {
    fn on_auth_expired(&self);
}

pub struct NoopAuthObserver;

impl AuthObserver for NoopAuthObserver {
    fn on_auth_expired(&self) {}
}

impl<F> AuthObserver for F
where
    F: Fn() + Send + Sync,
{
    fn on_auth_expired(&self) {
        self()
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod session_tests;

#[cfg(test)]
#[path = "tests/source_tests.rs"]
mod source_tests;
