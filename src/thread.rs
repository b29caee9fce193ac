use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;

use crate::error::ClientError;
use crate::models::{Comment, CommentType, CreateComment, UpdateAnalysis};
use crate::poller::{self, AnswerWait, CommentSource, PollSettings, WaitBindings, WaitState};

pub const DEFAULT_UPDATE_REASON: &str = "Reflect the answer to the question";

/// Comment state for one forecast: the list the user sees, whether an AI
/// answer is being waited on, and the wait itself.
pub struct CommentThread<S: CommentSource + ?Sized> {
    source: Arc<S>,
    forecast_id: i64,
    settings: PollSettings,
    bindings: WaitBindings,
    active: Option<AnswerWait>,
}

impl<S: CommentSource + ?Sized> CommentThread<S> {
    pub fn new(source: Arc<S>, forecast_id: i64, settings: PollSettings) -> Self {
        Self {
            source,
            forecast_id,
            settings,
            bindings: WaitBindings::new(),
            active: None,
        }
    }

    pub fn forecast_id(&self) -> i64 {
        self.forecast_id
    }

    pub fn comments(&self) -> Vec<Comment> {
        self.bindings.comments()
    }

    pub fn is_waiting(&self) -> bool {
        self.bindings.is_waiting()
    }

    pub fn subscribe_comments(&self) -> watch::Receiver<Vec<Comment>> {
        self.bindings.comments.subscribe()
    }

    pub fn subscribe_waiting(&self) -> watch::Receiver<bool> {
        self.bindings.waiting.subscribe()
    }

    pub fn active_wait(&self) -> Option<&AnswerWait> {
        self.active.as_ref()
    }

    /// Reloads the list. On failure the previous list stays visible.
    pub async fn refresh(&self) {
        match self.source.fetch_comments(self.forecast_id).await {
            Ok(comments) => {
                self.bindings.comments.send_replace(comments);
            }
            Err(error) => {
                tracing::error!(forecast_id = self.forecast_id, "Failed to fetch comments: {}", error);
            }
        }
    }

    /// Creates a comment. Submitting a question starts waiting for its answer,
    /// replacing any earlier wait.
    pub async fn submit(&mut self, input: CreateComment) -> Result<Comment, ClientError> {
        let created = self.source.submit_comment(self.forecast_id, &input).await?;
        self.refresh().await;

        if input.comment_type == CommentType::Question {
            // the old task must finish before the new one raises the flag
            if let Some(mut previous) = self.active.take() {
                previous.cancel();
                previous.finish().await;
            }
            self.active = poller::start(
                self.source.clone(),
                self.forecast_id,
                self.settings,
                self.bindings.clone(),
            )
            .await;
        }

        Ok(created)
    }

    /// Asks the backend to fold an answered question back into the forecast.
    pub async fn apply_answer(
        &self,
        comment_id: i64,
        update_reason: Option<&str>,
    ) -> Result<Value, ClientError> {
        let request = UpdateAnalysis::new(comment_id, update_reason.unwrap_or(DEFAULT_UPDATE_REASON));
        self.source.submit_update(&request).await
    }

    pub fn cancel_wait(&mut self) {
        if let Some(mut wait) = self.active.take() {
            wait.cancel();
        }
    }

    /// Waits for the active wait, if any, to end.
    pub async fn settle(&mut self) -> Option<WaitState> {
        let wait = self.active.take()?;
        Some(wait.finish().await)
    }
}

impl<S: CommentSource + ?Sized> Drop for CommentThread<S> {
    fn drop(&mut self) {
        self.cancel_wait();
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::time;

    use super::*;

    /// In-memory backend: a question gets its answer after `answer_after`
    /// list fetches.
    #[derive(Default)]
    struct FakeBackend {
        comments: Mutex<Vec<Comment>>,
        fetches: Mutex<u32>,
        answer_after: Option<u32>,
        updates: Mutex<Vec<UpdateAnalysis>>,
        fail_create: bool,
    }

    impl FakeBackend {
        fn fetches(&self) -> u32 {
            *self.fetches.lock().unwrap()
        }
    }

    fn new_comment(id: i64, comment_type: CommentType, content: &str) -> Comment {
        Comment {
            id,
            forecast_id: 42,
            content: content.to_string(),
            comment_type,
            parent_comment_id: None,
            author: None,
            is_ai_response: comment_type == CommentType::Answer,
            created_at: None,
            updated_at: None,
            extra_metadata: None,
            replies: Vec::new(),
            answer: None,
        }
    }

    #[async_trait]
    impl CommentSource for FakeBackend {
        async fn fetch_comments(&self, _forecast_id: i64) -> Result<Vec<Comment>, ClientError> {
            let mut fetches = self.fetches.lock().unwrap();
            *fetches += 1;
            let mut comments = self.comments.lock().unwrap();
            if self.answer_after.is_some_and(|after| *fetches > after) {
                let next_id = comments.len() as i64 + 100;
                for comment in comments.iter_mut().filter(|c| c.is_question() && c.answer.is_none()) {
                    let mut answer = new_comment(next_id, CommentType::Answer, "RSI shows...");
                    answer.parent_comment_id = Some(comment.id);
                    comment.answer = Some(Box::new(answer));
                }
            }
            Ok(comments.clone())
        }

        async fn submit_comment(&self, _forecast_id: i64, input: &CreateComment) -> Result<Comment, ClientError> {
            if self.fail_create {
                return Err(ClientError::upstream(reqwest::StatusCode::UNPROCESSABLE_ENTITY, "bad comment"));
            }
            let mut comments = self.comments.lock().unwrap();
            let created = new_comment(comments.len() as i64 + 7, input.comment_type, &input.content);
            comments.push(created.clone());
            Ok(created)
        }

        async fn submit_update(&self, request: &UpdateAnalysis) -> Result<Value, ClientError> {
            self.updates.lock().unwrap().push(request.clone());
            Ok(json!({"id": 42, "updated": true}))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn note_submission_never_starts_waiting() {
        let backend = Arc::new(FakeBackend::default());
        let mut thread = CommentThread::new(backend.clone(), 42, PollSettings::default());

        let created = thread.submit(CreateComment::note("watch 1.0850")).await.unwrap();
        assert_eq!(created.comment_type, CommentType::Note);
        assert!(thread.active_wait().is_none());
        assert!(!thread.is_waiting());
        assert_eq!(thread.comments().len(), 1);

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(backend.fetches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn question_waits_until_answered() {
        // refresh, start fetch, 3s tick unanswered, 6s tick answered
        let backend = Arc::new(FakeBackend {
            answer_after: Some(3),
            ..Default::default()
        });
        let mut thread = CommentThread::new(backend.clone(), 42, PollSettings::default());
        let mut waiting = thread.subscribe_waiting();

        let created = thread
            .submit(CreateComment::question("What about the RSI divergence?"))
            .await
            .unwrap();
        assert_eq!(created.id, 7);
        assert!(thread.is_waiting());
        assert_eq!(thread.active_wait().map(|w| w.question_id()), Some(7));

        let started = time::Instant::now();
        waiting.wait_for(|flag| !*flag).await.unwrap();
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(6));
        assert!(elapsed < Duration::from_millis(6_010));

        assert_eq!(thread.settle().await, Some(WaitState::Answered));
        let comments = thread.comments();
        assert_eq!(comments[0].answer.as_ref().map(|a| a.content.as_str()), Some("RSI shows..."));

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(backend.fetches(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_submit_leaves_state_untouched() {
        let backend = Arc::new(FakeBackend {
            fail_create: true,
            ..Default::default()
        });
        let mut thread = CommentThread::new(backend.clone(), 42, PollSettings::default());

        let error = thread.submit(CreateComment::question("anything?")).await.unwrap_err();
        assert_eq!(error.status(), Some(reqwest::StatusCode::UNPROCESSABLE_ENTITY));
        assert!(!thread.is_waiting());
        assert_eq!(backend.fetches(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn second_question_replaces_first_wait() {
        let backend = Arc::new(FakeBackend::default());
        let mut thread = CommentThread::new(backend.clone(), 42, PollSettings::default());

        thread.submit(CreateComment::question("first?")).await.unwrap();
        time::sleep(Duration::from_secs(4)).await;
        thread.submit(CreateComment::question("second?")).await.unwrap();

        assert_eq!(thread.active_wait().map(|w| w.question_id()), Some(8));
        assert!(thread.is_waiting());
        assert_eq!(thread.settle().await, Some(WaitState::TimedOut));
        assert!(!thread.is_waiting());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_thread_clears_waiting() {
        let backend = Arc::new(FakeBackend::default());
        let mut thread = CommentThread::new(backend.clone(), 42, PollSettings::default());
        thread.submit(CreateComment::question("anything?")).await.unwrap();
        let waiting = thread.subscribe_waiting();
        assert!(*waiting.borrow());

        drop(thread);
        time::sleep(Duration::from_secs(60)).await;
        assert!(!*waiting.borrow());
        assert_eq!(backend.fetches(), 2);
    }

    #[tokio::test]
    async fn apply_answer_uses_default_reason() {
        let backend = Arc::new(FakeBackend::default());
        let thread = CommentThread::new(backend.clone(), 42, PollSettings::default());

        let summary = thread.apply_answer(8, None).await.unwrap();
        assert_eq!(summary["updated"], json!(true));

        let updates = backend.updates.lock().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].comment_id, 8);
        assert_eq!(updates[0].update_reason, DEFAULT_UPDATE_REASON);
        assert_eq!(updates[0].revised_sections, json!({}));
    }
}
