//! The review session state machine.
//!
//! All mutation goes through [`SessionController`]. Answer feedback is shown for a
//! short while before the deck moves on; those delayed steps are handed back to
//! the caller as [`DeferredEffect`]s, each tagged with the batch generation and a
//! ticket. An effect is applied only while both still match, so a late effect
//! from an earlier batch or a cancelled transition can never touch the deck.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use rand::{rngs::StdRng, SeedableRng};
use shared::{
    domain::{DrillKind, KanjiId, KanjiRecord},
    protocol::{KanjiAnswer, TelegramCredential},
};
use tracing::{debug, error, info, warn};

use crate::{
    batch::{BatchLoader, BatchOutcome, LoadedBatch},
    deck::{Deck, ReviewItem},
    error::{IgnoredReason, ReviewError, ReviewResult, SourceError},
    matcher,
    normalize::{InputNormalizer, WanaKanaNormalizer},
    streak::StreakTracker,
    AuthObserver, NoopAuthObserver, ReviewSource,
};

pub const DEFAULT_CORRECT_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_INCORRECT_DELAY: Duration = Duration::from_millis(800);

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// How long "correct" feedback stays up before the next item.
    pub correct_delay: Duration,
    /// How long "incorrect" feedback stays up before the item is requeued.
    pub incorrect_delay: Duration,
    pub shuffle: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            correct_delay: DEFAULT_CORRECT_DELAY,
            incorrect_delay: DEFAULT_INCORRECT_DELAY,
            shuffle: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Unauthenticated,
    Loading,
    Active,
    /// The deck drained; results are being reported and the next batch fetched.
    Exhausted,
    Completed,
}

impl SessionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Loading => "loading",
            Self::Active => "active",
            Self::Exhausted => "exhausted",
            Self::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Feedback {
    #[default]
    None,
    Correct,
    Incorrect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    AdvanceAfterCorrect,
    RequeueAfterIncorrect,
}

/// A delayed transition scheduled by [`SessionController::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredEffect {
    pub generation: u64,
    pub ticket: u64,
    pub kind: EffectKind,
    pub delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Nothing changed.
    Ignored(IgnoredReason),
    /// An answer was judged; apply `effect` once `effect.delay` has elapsed.
    Evaluated {
        correct: bool,
        effect: DeferredEffect,
    },
    Advanced,
    Requeued,
    UndoApplied,
    BatchLoaded {
        generation: u64,
        items: usize,
        total_pending: u32,
    },
    Completed,
    LoggedOut,
}

/// Observable session state. Only [`SessionController`] mutates it.
#[derive(Debug, Default, Clone)]
pub struct SessionState {
    deck: Deck,
    streaks: StreakTracker,
    pending_input: String,
    feedback: Feedback,
    shake: bool,
    undo_available: bool,
    loading: bool,
}

impl SessionState {
    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    pub fn streaks(&self) -> &StreakTracker {
        &self.streaks
    }

    pub fn pending_input(&self) -> &str {
        &self.pending_input
    }

    pub fn feedback(&self) -> Feedback {
        self.feedback
    }

    pub fn shake(&self) -> bool {
        self.shake
    }

    pub fn undo_available(&self) -> bool {
        self.undo_available
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    fn clear_feedback(&mut self) {
        self.feedback = Feedback::None;
        self.pending_input.clear();
        self.shake = false;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KanjiScore {
    pub id: KanjiId,
    pub kanji: String,
    pub misses: u32,
}

/// Score of the batch that was just finished, shown once nothing is left to review.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionSummary {
    pub scores: Vec<KanjiScore>,
    pub total_misses: u32,
    /// Kanji answered without a single miss.
    pub perfect: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadPath {
    Initial,
    Replenish,
    LearnMore,
}

/// Remaining remote steps of a load in progress. Each step is dropped once the
/// backend acknowledges it, so resuming after a failure never repeats one.
#[derive(Debug, Clone)]
struct LoadPlan {
    path: LoadPath,
    report: Option<Vec<KanjiAnswer>>,
    request_more: bool,
}

#[derive(Debug, Clone, Copy)]
struct PendingEffect {
    ticket: u64,
    kind: EffectKind,
}

pub struct SessionController {
    loader: BatchLoader,
    normalizer: Arc<dyn InputNormalizer>,
    auth_observer: Arc<dyn AuthObserver>,
    options: SessionOptions,
    rng: StdRng,
    phase: SessionPhase,
    state: SessionState,
    records: Vec<KanjiRecord>,
    total_pending: u32,
    generation: u64,
    next_ticket: u64,
    pending_effect: Option<PendingEffect>,
    load_plan: Option<LoadPlan>,
    last_error: Option<String>,
}

impl SessionController {
    pub fn new(source: Arc<dyn ReviewSource>, options: SessionOptions) -> Self {
        Self::new_with_dependencies(
            source,
            options,
            Arc::new(WanaKanaNormalizer),
            Arc::new(NoopAuthObserver),
        )
    }

    pub fn new_with_dependencies(
        source: Arc<dyn ReviewSource>,
        options: SessionOptions,
        normalizer: Arc<dyn InputNormalizer>,
        auth_observer: Arc<dyn AuthObserver>,
    ) -> Self {
        Self {
            loader: BatchLoader::new(source),
            normalizer,
            auth_observer,
            options,
            rng: StdRng::from_os_rng(),
            phase: SessionPhase::Unauthenticated,
            state: SessionState::default(),
            records: Vec::new(),
            total_pending: 0,
            generation: 0,
            next_ticket: 0,
            pending_effect: None,
            load_plan: None,
            last_error: None,
        }
    }

    /// Makes deck shuffling reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn current_item(&self) -> Option<&ReviewItem> {
        self.state.deck.peek_front()
    }

    pub fn current_kanji(&self) -> Option<&KanjiRecord> {
        self.current_item()
            .and_then(|item| self.records.get(item.kanji_index))
    }

    pub fn records(&self) -> &[KanjiRecord] {
        &self.records
    }

    pub fn remaining(&self) -> usize {
        self.state.deck.len()
    }

    pub fn total_pending(&self) -> u32 {
        self.total_pending
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Loading was interrupted by a remote failure and waits for [`resume`](Self::resume).
    pub fn is_stalled(&self) -> bool {
        self.state.loading && self.last_error.is_some()
    }

    pub fn placeholder(&self) -> Option<&'static str> {
        self.current_item().map(|item| match item.kind {
            DrillKind::Meaning => "Enter the meaning...",
            DrillKind::Word => "Enter the reading...",
        })
    }

    /// Per-kanji results of the last finished batch; available in `Completed`.
    pub fn completion_summary(&self) -> Option<CompletionSummary> {
        if self.phase != SessionPhase::Completed {
            return None;
        }
        let counts: BTreeMap<KanjiId, u32> = self.state.streaks.snapshot();
        let scores: Vec<KanjiScore> = self
            .records
            .iter()
            .map(|record| KanjiScore {
                id: record.id,
                kanji: record.kanji.clone(),
                misses: counts.get(&record.id).copied().unwrap_or(0),
            })
            .collect();
        Some(CompletionSummary {
            total_misses: scores.iter().map(|s| s.misses).sum(),
            perfect: scores.iter().filter(|s| s.misses == 0).count(),
            scores,
        })
    }

    /// Signs in and loads the first batch.
    pub async fn login(&mut self, credential: &TelegramCredential) -> ReviewResult<Transition> {
        self.state.loading = true;
        match self.loader.source().authenticate(credential).await {
            Ok(_) => self.start().await,
            Err(err) => {
                self.state.loading = false;
                warn!(user = %credential.username, error = %err, "session: sign-in failed");
                if err.is_unauthorized() {
                    Err(ReviewError::LoginRejected)
                } else {
                    self.last_error = Some(err.to_string());
                    Err(ReviewError::Remote(err))
                }
            }
        }
    }

    /// Loads the first batch using whatever token the source already holds.
    pub async fn start(&mut self) -> ReviewResult<Transition> {
        if !self.loader.source().has_token().await {
            return Err(ReviewError::NotAuthenticated);
        }
        self.begin_load(LoadPlan {
            path: LoadPath::Initial,
            report: None,
            request_more: false,
        });
        self.run_load_plan().await
    }

    pub async fn logout(&mut self) -> Transition {
        self.loader.source().set_token(None).await;
        self.reset_unauthenticated();
        info!("session: signed out");
        Transition::LoggedOut
    }

    /// Updates the pending answer as the user types. Word drills show kana.
    pub fn set_input(&mut self, raw: &str) {
        if self.state.feedback != Feedback::None {
            return;
        }
        self.state.pending_input = match self.current_item() {
            Some(item) if item.kind == DrillKind::Word => self.normalizer.normalize_partial(raw),
            _ => raw.to_string(),
        };
    }

    /// Judges the pending input against the current item.
    pub fn submit(&mut self) -> Transition {
        if self.state.feedback != Feedback::None {
            return Transition::Ignored(IgnoredReason::FeedbackPending);
        }
        if self.state.pending_input.trim().is_empty() {
            return Transition::Ignored(IgnoredReason::ValidationSkip);
        }
        let (correct, kanji_id) = {
            let Some(item) = self.current_item() else {
                return Transition::Ignored(IgnoredReason::NoCurrentItem);
            };
            if self.phase != SessionPhase::Active {
                return Transition::Ignored(IgnoredReason::NoCurrentItem);
            }
            let correct = matcher::matches(
                &self.state.pending_input,
                &item.accepted,
                item.kind,
                self.normalizer.as_ref(),
            );
            let Some(kanji_id) = self.records.get(item.kanji_index).map(|r| r.id) else {
                return Transition::Ignored(IgnoredReason::NoCurrentItem);
            };
            (correct, kanji_id)
        };

        let kind = if correct {
            self.state.feedback = Feedback::Correct;
            self.state.undo_available = false;
            EffectKind::AdvanceAfterCorrect
        } else {
            self.state.feedback = Feedback::Incorrect;
            self.state.shake = true;
            self.state.undo_available = true;
            let misses = self.state.streaks.increment(kanji_id);
            debug!(%kanji_id, misses, "session: miss recorded");
            EffectKind::RequeueAfterIncorrect
        };

        let effect = self.schedule(kind);
        info!(
            generation = self.generation,
            %kanji_id,
            correct,
            "session: answer evaluated"
        );
        Transition::Evaluated { correct, effect }
    }

    /// Sets the pending input and submits it in one step.
    pub fn submit_answer(&mut self, raw: &str) -> Transition {
        if self.state.feedback != Feedback::None {
            return Transition::Ignored(IgnoredReason::FeedbackPending);
        }
        self.set_input(raw);
        self.submit()
    }

    /// Waits out the effect's display delay, then applies it.
    pub async fn settle(&mut self, effect: DeferredEffect) -> ReviewResult<Transition> {
        tokio::time::sleep(effect.delay).await;
        self.apply_effect(effect).await
    }

    /// Applies a deferred effect if it is still the one the session is waiting for.
    pub async fn apply_effect(&mut self, effect: DeferredEffect) -> ReviewResult<Transition> {
        let is_current = effect.generation == self.generation
            && self
                .pending_effect
                .is_some_and(|pending| pending.ticket == effect.ticket);
        if !is_current {
            debug!(
                effect_generation = effect.generation,
                current_generation = self.generation,
                ticket = effect.ticket,
                "session: stale effect discarded"
            );
            return Ok(Transition::Ignored(IgnoredReason::StaleEffect {
                effect_generation: effect.generation,
                current_generation: self.generation,
            }));
        }
        self.pending_effect = None;

        match effect.kind {
            EffectKind::RequeueAfterIncorrect => {
                self.state.deck.requeue_front_to_back();
                self.state.clear_feedback();
                debug!(deck_len = self.state.deck.len(), "session: item requeued");
                Ok(Transition::Requeued)
            }
            EffectKind::AdvanceAfterCorrect => {
                self.state.deck.pop_front();
                self.state.clear_feedback();
                if self.state.deck.is_empty() {
                    self.finish_batch().await
                } else {
                    debug!(deck_len = self.state.deck.len(), "session: advanced");
                    Ok(Transition::Advanced)
                }
            }
        }
    }

    /// Reverses the most recent miss: the item returns to the front and its miss
    /// no longer counts. Available once per miss.
    pub fn undo(&mut self) -> Transition {
        if !self.state.undo_available {
            return Transition::Ignored(IgnoredReason::UndoUnavailable);
        }

        let requeue_pending = matches!(
            self.pending_effect,
            Some(PendingEffect {
                kind: EffectKind::RequeueAfterIncorrect,
                ..
            })
        );
        let restored = if requeue_pending {
            // The deck was not rotated yet; dropping the effect is enough.
            self.pending_effect = None;
            self.state.deck.peek_front().map(|item| item.kanji_index)
        } else {
            let index = self.state.deck.peek_back().map(|item| item.kanji_index);
            self.state.deck.undo_last_requeue();
            index
        };

        let restored_id = restored
            .and_then(|index| self.records.get(index))
            .map(|record| record.id);
        if let Some(kanji_id) = restored_id {
            let misses = self.state.streaks.decrement(kanji_id);
            info!(%kanji_id, misses, requeue_pending, "session: undo applied");
        }
        self.state.clear_feedback();
        self.state.undo_available = false;
        Transition::UndoApplied
    }

    /// Asks the backend for new material. Only valid once the session completed.
    pub async fn learn_more(&mut self) -> ReviewResult<Transition> {
        if self.phase != SessionPhase::Completed {
            return Err(ReviewError::InvalidPhase {
                operation: "learn more",
                phase: self.phase.as_str(),
            });
        }
        self.begin_load(LoadPlan {
            path: LoadPath::LearnMore,
            report: None,
            request_more: true,
        });
        self.run_load_plan().await
    }

    /// Retries the remote steps of a load that stalled on a failure.
    pub async fn resume(&mut self) -> ReviewResult<Transition> {
        if self.load_plan.is_none() {
            return Ok(Transition::Ignored(IgnoredReason::NoCurrentItem));
        }
        info!(phase = self.phase.as_str(), "session: resuming load");
        self.run_load_plan().await
    }

    fn schedule(&mut self, kind: EffectKind) -> DeferredEffect {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.pending_effect = Some(PendingEffect { ticket, kind });
        let delay = match kind {
            EffectKind::AdvanceAfterCorrect => self.options.correct_delay,
            EffectKind::RequeueAfterIncorrect => self.options.incorrect_delay,
        };
        DeferredEffect {
            generation: self.generation,
            ticket,
            kind,
            delay,
        }
    }

    async fn finish_batch(&mut self) -> ReviewResult<Transition> {
        let answers = self.state.streaks.to_answers();
        info!(
            generation = self.generation,
            kanji = answers.len(),
            misses = self.state.streaks.total_misses(),
            "session: batch finished"
        );
        self.state.undo_available = false;
        self.begin_load(LoadPlan {
            path: LoadPath::Replenish,
            report: Some(answers),
            request_more: false,
        });
        self.phase = SessionPhase::Exhausted;
        self.run_load_plan().await
    }

    fn begin_load(&mut self, plan: LoadPlan) {
        self.phase = SessionPhase::Loading;
        self.state.loading = true;
        self.last_error = None;
        self.load_plan = Some(plan);
    }

    async fn run_load_plan(&mut self) -> ReviewResult<Transition> {
        let Some(mut plan) = self.load_plan.take() else {
            return Ok(Transition::Ignored(IgnoredReason::NoCurrentItem));
        };
        self.state.loading = true;

        if let Some(answers) = plan.report.take() {
            if let Err(err) = self.loader.report(&answers).await {
                plan.report = Some(answers);
                return Err(self.stall(plan, err).await);
            }
        }

        if plan.request_more {
            if let Err(err) = self.loader.request_more().await {
                return Err(self.stall(plan, err).await);
            }
            plan.request_more = false;
        }

        let outcome = match self.loader.request_batch().await {
            Ok(outcome) => outcome,
            Err(err) => return Err(self.stall(plan, err).await),
        };

        self.last_error = None;
        match outcome {
            BatchOutcome::Ready(batch) => Ok(self.install(batch)),
            BatchOutcome::Exhausted => {
                self.total_pending = 0;
                self.complete();
                Ok(Transition::Completed)
            }
            BatchOutcome::NotYetAvailable { total_pending } => {
                self.total_pending = total_pending;
                if plan.path == LoadPath::Initial {
                    warn!(
                        total_pending,
                        "session: backend reports pending kanji but served none"
                    );
                }
                self.complete();
                if plan.path == LoadPath::LearnMore {
                    Ok(Transition::Ignored(IgnoredReason::NothingNew))
                } else {
                    Ok(Transition::Completed)
                }
            }
        }
    }

    async fn stall(&mut self, plan: LoadPlan, err: SourceError) -> ReviewError {
        if err.is_unauthorized() {
            warn!("session: token rejected, signing out");
            self.loader.source().set_token(None).await;
            self.reset_unauthenticated();
            self.auth_observer.on_auth_expired();
            return ReviewError::AuthExpired;
        }
        error!(error = %err, "session: load stalled");
        self.last_error = Some(err.to_string());
        self.load_plan = Some(plan);
        ReviewError::Remote(err)
    }

    fn install(&mut self, batch: LoadedBatch) -> Transition {
        self.generation += 1;
        self.pending_effect = None;
        self.load_plan = None;

        let LoadedBatch {
            records,
            items,
            total_pending,
        } = batch;
        self.state.streaks = StreakTracker::for_batch(records.iter().map(|r| r.id));
        self.state
            .deck
            .load(items, self.options.shuffle, &mut self.rng);
        self.state.clear_feedback();
        self.state.undo_available = false;
        self.state.loading = false;
        self.records = records;
        self.total_pending = total_pending;
        self.phase = SessionPhase::Active;

        let items = self.state.deck.len();
        info!(
            generation = self.generation,
            kanji = self.records.len(),
            items,
            total_pending,
            "session: batch loaded"
        );
        Transition::BatchLoaded {
            generation: self.generation,
            items,
            total_pending,
        }
    }

    /// Leaves the finished batch's records and streaks in place for the summary.
    fn complete(&mut self) {
        self.load_plan = None;
        self.pending_effect = None;
        self.state.deck.clear();
        self.state.clear_feedback();
        self.state.undo_available = false;
        self.state.loading = false;
        self.phase = SessionPhase::Completed;
        info!(
            generation = self.generation,
            misses = self.state.streaks.total_misses(),
            "session: completed"
        );
    }

    fn reset_unauthenticated(&mut self) {
        self.generation += 1;
        self.pending_effect = None;
        self.load_plan = None;
        self.last_error = None;
        self.records.clear();
        self.total_pending = 0;
        self.state = SessionState::default();
        self.phase = SessionPhase::Unauthenticated;
    }
}
