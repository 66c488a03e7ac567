//! Collaborator trait for the quiz backend.
//!
//! Implemented by the `octagnosis-client` crate (HTTP and in-memory
//! backends). Implementations should return [`crate::error::ServiceError`]
//! inside the `anyhow::Error` so callers can classify failures.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{AnswerMap, AttemptId, Demographics, Gender, Question};
use crate::results::AttemptResult;

/// Backend that creates attempts, serves questions, and scores submissions.
#[async_trait]
pub trait AttemptService: Send + Sync {
    /// Human-readable backend name (e.g. "http").
    fn name(&self) -> &str;

    /// Create a new attempt and return its raw id.
    ///
    /// The id is validated by the caller before it is used.
    async fn start(&self, request: &StartRequest) -> anyhow::Result<String>;

    /// Fetch the ordered question set for an attempt.
    async fn fetch_questions(&self, attempt_id: &AttemptId) -> anyhow::Result<Vec<Question>>;

    /// Submit the completed answers and return the scored result.
    async fn submit(
        &self,
        attempt_id: &AttemptId,
        answers: &AnswerMap,
    ) -> anyhow::Result<AttemptResult>;

    /// Fetch the stored result of a submitted attempt.
    async fn fetch_result(&self, attempt_id: &AttemptId) -> anyhow::Result<AttemptResult>;
}

/// Body of the attempt-creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
    pub gender: Gender,
    /// Representative age of the selected bracket.
    pub age: u32,
}

impl From<&Demographics> for StartRequest {
    fn from(d: &Demographics) -> Self {
        Self {
            gender: d.gender,
            age: d.age_range.representative_age(),
        }
    }
}
