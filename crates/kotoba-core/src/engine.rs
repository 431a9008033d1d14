use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_ANSWER_TIMEOUT_SECS;
use crate::error::Result;
use crate::familiarity::Familiarity;
use crate::model::{UserId, VocabularyItem};
use crate::progression::{LevelUpResult, record_answer};
use crate::repository::VocabRepository;
use crate::selector::{BucketWeights, select_question};
use crate::session::SessionGuard;

/// What came back from the learner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Answer {
    Response(String),
    Timeout,
}

/// Answer capture, owned by whatever front end talks to the learner.
#[async_trait]
pub trait AnswerCollector: Send + Sync {
    /// Show `item` to the learner and wait up to `timeout` for a reply.
    /// `None` when the learner can no longer answer at all, such as a
    /// closed input stream.
    async fn await_answer(
        &self,
        user_id: UserId,
        item: &VocabularyItem,
        timeout: Duration,
    ) -> Option<Answer>;
}

/// Everything a presenter needs to describe one finished round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundReport {
    pub item: VocabularyItem,
    pub answer: Answer,
    pub correct: bool,
    pub familiarity_before: Familiarity,
    pub familiarity_after: Familiarity,
    pub level_up: LevelUpResult,
}

impl RoundReport {
    pub fn timed_out(&self) -> bool {
        self.answer == Answer::Timeout
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoundOutcome {
    /// The user already has a round in flight; nothing was asked.
    Busy,
    /// The collector gave up before any answer or timeout; nothing was
    /// recorded.
    Abandoned,
    Completed(RoundReport),
}

/// Runs quiz rounds against a repository, one at a time per user.
pub struct QuizEngine<R> {
    repo: R,
    weights: BucketWeights,
    answer_timeout: Duration,
    sessions: SessionGuard,
}

impl<R: VocabRepository> QuizEngine<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            weights: BucketWeights::default(),
            answer_timeout: Duration::from_secs(DEFAULT_ANSWER_TIMEOUT_SECS),
            sessions: SessionGuard::new(),
        }
    }

    pub fn with_weights(mut self, weights: BucketWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_answer_timeout(mut self, timeout: Duration) -> Self {
        self.answer_timeout = timeout;
        self
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn sessions(&self) -> &SessionGuard {
        &self.sessions
    }

    pub fn weights(&self) -> &BucketWeights {
        &self.weights
    }

    /// Pick a question without opening a session.
    pub fn select(&self, user_id: UserId, rng: &mut impl Rng) -> Result<VocabularyItem> {
        select_question(&self.repo, user_id, &self.weights, rng)
    }

    /// Grade `answer` against `item` and record it, holding the user's
    /// session for the duration. `Busy` if a round is already in flight.
    pub fn grade(
        &self,
        user_id: UserId,
        item: &VocabularyItem,
        answer: Answer,
    ) -> Result<RoundOutcome> {
        let Some(_lease) = self.sessions.acquire(user_id) else {
            return Ok(RoundOutcome::Busy);
        };
        let report = self.record(user_id, item, answer)?;
        Ok(RoundOutcome::Completed(report))
    }

    /// Caller holds the user's lease.
    fn record(
        &self,
        user_id: UserId,
        item: &VocabularyItem,
        answer: Answer,
    ) -> Result<RoundReport> {
        let correct = match &answer {
            Answer::Response(text) => item.accepts(text),
            Answer::Timeout => {
                tracing::warn!(user_id, vocab_id = item.vocab_id, "answer timed out");
                false
            }
        };
        let familiarity_before = self.repo.familiarity(user_id, item.vocab_id)?;
        let level_up = record_answer(&self.repo, user_id, item.vocab_id, correct)?;
        Ok(RoundReport {
            item: item.clone(),
            answer,
            correct,
            familiarity_before,
            familiarity_after: familiarity_before.apply(correct),
            level_up,
        })
    }

    /// One full round: admit, ask, wait, grade, record, release.
    /// A collector returning `None` ends the round as `Abandoned` without
    /// touching stored progress.
    ///
    /// The session is released on every path out of this function,
    /// including errors from selection or recording.
    pub async fn run_round<C, G>(
        &self,
        user_id: UserId,
        collector: &C,
        rng: &mut G,
    ) -> Result<RoundOutcome>
    where
        C: AnswerCollector + ?Sized,
        G: Rng,
    {
        let Some(_lease) = self.sessions.acquire(user_id) else {
            return Ok(RoundOutcome::Busy);
        };

        let item = self.select(user_id, rng)?;
        let Some(answer) = collector
            .await_answer(user_id, &item, self.answer_timeout)
            .await
        else {
            tracing::info!(user_id, vocab_id = item.vocab_id, "round abandoned");
            return Ok(RoundOutcome::Abandoned);
        };
        let report = self.record(user_id, &item, answer)?;

        Ok(RoundOutcome::Completed(report))
    }
}
