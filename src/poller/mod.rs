//! Waits for the backend to attach an AI answer to a freshly submitted question.
//!
//! A single task races the next poll tick against the deadline, so one
//! terminal event always stops everything: there is no second timer left to
//! cancel. Dropping the [`AnswerWait`] handle cancels the task.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::{
    sync::{oneshot, watch},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};

use crate::error::ClientError;
use crate::models::{Comment, CreateComment, UpdateAnalysis, find_answer, last_question};

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3_000;
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 30_000;

/// Where comments come from. Implemented by the HTTP backend client and by
/// in-memory fakes in tests.
#[async_trait]
pub trait CommentSource: Send + Sync + 'static {
    async fn fetch_comments(&self, forecast_id: i64) -> Result<Vec<Comment>, ClientError>;

    async fn submit_comment(&self, forecast_id: i64, input: &CreateComment) -> Result<Comment, ClientError>;

    async fn submit_update(&self, request: &UpdateAnalysis) -> Result<Value, ClientError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            timeout: Duration::from_millis(DEFAULT_POLL_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[serde(rename = "not_started")]
    Idle,
    Waiting,
    Answered,
    TimedOut,
    Cancelled,
}

impl WaitState {
    pub fn is_waiting(self) -> bool {
        self == Self::Waiting
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Answered | Self::TimedOut | Self::Cancelled)
    }
}

/// State the poller writes on behalf of the view that started it.
#[derive(Debug, Clone)]
pub struct WaitBindings {
    pub comments: Arc<watch::Sender<Vec<Comment>>>,
    pub waiting: Arc<watch::Sender<bool>>,
}

impl WaitBindings {
    pub fn new() -> Self {
        Self {
            comments: Arc::new(watch::channel(Vec::new()).0),
            waiting: Arc::new(watch::channel(false).0),
        }
    }

    pub fn comments(&self) -> Vec<Comment> {
        self.comments.borrow().clone()
    }

    pub fn is_waiting(&self) -> bool {
        *self.waiting.borrow()
    }
}

impl Default for WaitBindings {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a running answer wait.
#[derive(Debug)]
pub struct AnswerWait {
    forecast_id: i64,
    question_id: i64,
    state: watch::Receiver<WaitState>,
    cancel: Option<oneshot::Sender<()>>,
    task: JoinHandle<WaitState>,
}

/// Re-fetches the comment list, picks the last question as the target and
/// starts polling for its answer.
///
/// Returns `None` without creating any timer when the list holds no question.
/// A failed initial fetch counts as an empty list.
pub async fn start<S>(
    source: Arc<S>,
    forecast_id: i64,
    settings: PollSettings,
    bindings: WaitBindings,
) -> Option<AnswerWait>
where
    S: CommentSource + ?Sized,
{
    let comments = match source.fetch_comments(forecast_id).await {
        Ok(comments) => comments,
        Err(error) => {
            tracing::warn!(forecast_id, "Failed to fetch comments before answer wait: {}", error);
            Vec::new()
        }
    };

    let target = last_question(&comments).map(|question| question.id);
    bindings.comments.send_replace(comments);

    let Some(question_id) = target else {
        tracing::debug!(forecast_id, "No question found, answer wait not started");
        return None;
    };

    Some(AnswerWait::spawn(source, forecast_id, question_id, settings, bindings))
}

impl AnswerWait {
    fn spawn<S>(
        source: Arc<S>,
        forecast_id: i64,
        question_id: i64,
        settings: PollSettings,
        bindings: WaitBindings,
    ) -> Self
    where
        S: CommentSource + ?Sized,
    {
        let started = Instant::now();
        let (state_tx, state_rx) = watch::channel(WaitState::Waiting);
        let (cancel_tx, cancel_rx) = oneshot::channel();

        bindings.waiting.send_replace(true);
        tracing::info!(forecast_id, question_id, "Waiting for AI answer");

        let task = tokio::spawn(run_wait(
            source,
            WaitTarget {
                forecast_id,
                question_id,
            },
            settings,
            started,
            bindings,
            state_tx,
            cancel_rx,
        ));

        Self {
            forecast_id,
            question_id,
            state: state_rx,
            cancel: Some(cancel_tx),
            task,
        }
    }

    pub fn forecast_id(&self) -> i64 {
        self.forecast_id
    }

    pub fn question_id(&self) -> i64 {
        self.question_id
    }

    pub fn state(&self) -> WaitState {
        *self.state.borrow()
    }

    pub fn is_waiting(&self) -> bool {
        self.state().is_waiting()
    }

    pub fn subscribe(&self) -> watch::Receiver<WaitState> {
        self.state.clone()
    }

    /// Stops polling. Has no effect once the wait has ended.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }

    /// Waits for the terminal state.
    pub async fn finish(self) -> WaitState {
        let AnswerWait {
            task,
            cancel: _cancel,
            ..
        } = self;
        // `_cancel` stays alive until the task ends; dropping it would cancel.
        match task.await {
            Ok(state) => state,
            Err(error) => {
                tracing::error!("Answer wait task failed: {}", error);
                WaitState::Cancelled
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct WaitTarget {
    forecast_id: i64,
    question_id: i64,
}

async fn run_wait<S>(
    source: Arc<S>,
    target: WaitTarget,
    settings: PollSettings,
    started: Instant,
    bindings: WaitBindings,
    state_tx: watch::Sender<WaitState>,
    mut cancel_rx: oneshot::Receiver<()>,
) -> WaitState
where
    S: CommentSource + ?Sized,
{
    let WaitTarget {
        forecast_id,
        question_id,
    } = target;

    // interval_at panics on a zero period
    let period = settings.interval.max(Duration::from_millis(1));
    let mut ticker = time::interval_at(started + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let deadline = time::sleep_until(started + settings.timeout);
    tokio::pin!(deadline);

    let mut tick = 0_u32;
    let outcome = loop {
        tokio::select! {
            biased;
            _ = &mut cancel_rx => break WaitState::Cancelled,
            _ = &mut deadline => break WaitState::TimedOut,
            _ = ticker.tick() => {}
        }
        tick += 1;

        let fetched = tokio::select! {
            biased;
            _ = &mut cancel_rx => break WaitState::Cancelled,
            _ = &mut deadline => break WaitState::TimedOut,
            result = source.fetch_comments(forecast_id) => result,
        };

        match fetched {
            Ok(comments) => {
                let answered = find_answer(&comments, question_id).is_some();
                bindings.comments.send_replace(comments);
                if answered {
                    break WaitState::Answered;
                }
            }
            Err(error) => {
                tracing::warn!(forecast_id, question_id, tick, "Answer poll failed: {}", error);
            }
        }
    };

    bindings.waiting.send_replace(false);
    state_tx.send_replace(outcome);
    tracing::info!(
        forecast_id,
        question_id,
        ticks = tick,
        elapsed_ms = started.elapsed().as_millis() as u64,
        outcome = ?outcome,
        "Answer wait finished"
    );

    outcome
}
