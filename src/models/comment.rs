use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentType {
    Question,
    Answer,
    #[default]
    Note,
}

impl CommentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::Answer => "answer",
            Self::Note => "note",
        }
    }
}

/// A note, question, or AI-generated answer attached to a forecast.
///
/// `answer` is populated by the backend once AI generation for a question
/// completes; the client never writes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    #[serde(default)]
    pub forecast_id: i64,
    #[serde(default)]
    pub content: String,
    pub comment_type: CommentType,
    #[serde(default)]
    pub parent_comment_id: Option<i64>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub is_ai_response: bool,
    #[serde(default, with = "flexible_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "flexible_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub extra_metadata: Option<Value>,
    #[serde(default)]
    pub replies: Vec<Comment>,
    #[serde(default)]
    pub answer: Option<Box<Comment>>,
}

impl Comment {
    pub fn is_question(&self) -> bool {
        self.comment_type == CommentType::Question
    }

    pub fn is_answered(&self) -> bool {
        self.answer.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateComment {
    pub content: String,
    #[serde(default)]
    pub comment_type: CommentType,
    #[serde(default)]
    pub parent_comment_id: Option<i64>,
    #[serde(default)]
    pub extra_metadata: Option<Value>,
}

impl CreateComment {
    pub fn question(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            comment_type: CommentType::Question,
            parent_comment_id: None,
            extra_metadata: None,
        }
    }

    pub fn note(content: impl Into<String>) -> Self {
        Self {
            comment_type: CommentType::Note,
            ..Self::question(content)
        }
    }
}

/// Body sent to the backend when creating a comment. The backend expects the
/// owning forecast in the payload rather than the path.
#[derive(Debug, Serialize)]
pub struct NewCommentPayload<'a> {
    pub content: &'a str,
    pub comment_type: CommentType,
    pub forecast_id: i64,
    pub parent_comment_id: Option<i64>,
    pub extra_metadata: Option<&'a Value>,
}

impl<'a> NewCommentPayload<'a> {
    pub fn new(forecast_id: i64, input: &'a CreateComment) -> Self {
        Self {
            content: &input.content,
            comment_type: input.comment_type,
            forecast_id,
            parent_comment_id: input.parent_comment_id,
            extra_metadata: input.extra_metadata.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAnalysis {
    pub comment_id: i64,
    pub update_reason: String,
    #[serde(default = "empty_sections")]
    pub revised_sections: Value,
}

impl UpdateAnalysis {
    pub fn new(comment_id: i64, update_reason: impl Into<String>) -> Self {
        Self {
            comment_id,
            update_reason: update_reason.into(),
            revised_sections: empty_sections(),
        }
    }
}

fn empty_sections() -> Value {
    Value::Object(Default::default())
}

#[derive(Debug, Deserialize)]
pub struct AskQuestion {
    pub content: String,
    #[serde(default)]
    pub extra_metadata: Option<Value>,
}

/// The most recent top-level question in a comment list.
pub fn last_question(comments: &[Comment]) -> Option<&Comment> {
    comments.iter().rev().find(|comment| comment.is_question())
}

/// The answer attached to `question_id`, if the backend has produced one.
pub fn find_answer(comments: &[Comment], question_id: i64) -> Option<&Comment> {
    comments
        .iter()
        .find(|comment| comment.id == question_id)
        .and_then(|comment| comment.answer.as_deref())
}

/// Parses an RFC 3339 timestamp, or a naive ISO-8601 one which is taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    raw.parse::<NaiveDateTime>().ok().map(|naive| naive.and_utc())
}

/// Unparsable timestamps decode to `None` so one bad row cannot fail a list.
mod flexible_timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::Value;

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.as_ref().map(|ts| ts.to_rfc3339()).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(raw
            .as_ref()
            .and_then(Value::as_str)
            .and_then(super::parse_timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn comment(id: i64, comment_type: CommentType) -> Comment {
        Comment {
            id,
            forecast_id: 42,
            content: format!("comment {}", id),
            comment_type,
            parent_comment_id: None,
            author: None,
            is_ai_response: false,
            created_at: None,
            updated_at: None,
            extra_metadata: None,
            replies: Vec::new(),
            answer: None,
        }
    }

    #[test]
    fn decodes_backend_comment_with_naive_timestamps() {
        let parsed: Comment = serde_json::from_value(json!({
            "id": 7,
            "forecast_id": 42,
            "content": "What about the RSI divergence?",
            "comment_type": "question",
            "parent_comment_id": null,
            "author": "user",
            "is_ai_response": false,
            "created_at": "2025-01-03T09:15:00.123456",
            "answer": {
                "id": 8,
                "forecast_id": 42,
                "content": "RSI shows...",
                "comment_type": "answer",
                "is_ai_response": true,
                "created_at": "2025-01-03T09:15:20Z",
                "parent_comment_id": 7
            }
        }))
        .unwrap();

        assert!(parsed.is_question());
        assert!(parsed.replies.is_empty());
        let answer = parsed.answer.as_deref().unwrap();
        assert_eq!(answer.comment_type, CommentType::Answer);
        assert!(answer.is_ai_response);
        assert_eq!(answer.parent_comment_id, Some(7));
        assert_eq!(
            parsed.created_at.unwrap().to_rfc3339(),
            "2025-01-03T09:15:00.123456+00:00"
        );
    }

    #[test]
    fn garbage_timestamp_decodes_to_none() {
        let parsed: Comment = serde_json::from_value(json!({
            "id": 1,
            "forecast_id": 1,
            "content": "x",
            "comment_type": "note",
            "created_at": "yesterday",
            "updated_at": 1735895700
        }))
        .unwrap();
        assert!(parsed.created_at.is_none());
        assert!(parsed.updated_at.is_none());
    }

    #[test]
    fn decodes_minimal_list_entries() {
        let parsed: Vec<Comment> = serde_json::from_value(json!([
            {"id": 3, "comment_type": "note", "answer": null},
            {
                "id": 7,
                "comment_type": "question",
                "answer": {
                    "id": 8,
                    "content": "RSI shows...",
                    "created_at": "2025-01-03T09:15:20",
                    "comment_type": "answer"
                }
            }
        ]))
        .unwrap();

        assert_eq!(last_question(&parsed).map(|c| c.id), Some(7));
        let answer = find_answer(&parsed, 7).unwrap();
        assert_eq!(answer.id, 8);
        assert_eq!(answer.content, "RSI shows...");
        assert_eq!(answer.forecast_id, 0);
        assert!(answer.created_at.is_some());
    }

    #[test]
    fn create_comment_defaults_to_note() {
        let input: CreateComment = serde_json::from_value(json!({"content": "watch 1.0850"})).unwrap();
        assert_eq!(input.comment_type, CommentType::Note);

        let payload = serde_json::to_value(NewCommentPayload::new(42, &input)).unwrap();
        assert_eq!(
            payload,
            json!({
                "content": "watch 1.0850",
                "comment_type": "note",
                "forecast_id": 42,
                "parent_comment_id": null,
                "extra_metadata": null
            })
        );
    }

    #[test]
    fn last_question_skips_trailing_notes() {
        let comments = vec![
            comment(1, CommentType::Question),
            comment(2, CommentType::Question),
            comment(3, CommentType::Note),
        ];
        assert_eq!(last_question(&comments).map(|c| c.id), Some(2));
        assert!(last_question(&comments[2..]).is_none());
    }

    #[test]
    fn find_answer_ignores_other_questions() {
        let mut answered = comment(1, CommentType::Question);
        answered.answer = Some(Box::new(comment(9, CommentType::Answer)));
        let comments = vec![answered, comment(2, CommentType::Question)];

        assert_eq!(find_answer(&comments, 1).map(|c| c.id), Some(9));
        assert!(find_answer(&comments, 2).is_none());
        assert!(find_answer(&comments, 3).is_none());
    }
}
