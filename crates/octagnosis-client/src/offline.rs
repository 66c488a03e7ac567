//! In-memory backend over a local question bank.
//!
//! Useful for running the quiz without a server and for exercising the flow
//! engine in tests. Attempts live only as long as the backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use octagnosis_core::error::ServiceError;
use octagnosis_core::model::{
    AnswerMap, AttemptId, Question, QuestionBank, TypeCode, TypeProfile, MAX_SCORE, MIN_SCORE,
};
use octagnosis_core::results::AttemptResult;
use octagnosis_core::scoring;
use octagnosis_core::traits::{AttemptService, StartRequest};

struct OfflineAttempt {
    request: StartRequest,
    result: Option<AttemptResult>,
}

/// Backend that serves one question bank and scores submissions locally.
pub struct InMemoryBackend {
    questions: Vec<Question>,
    profiles: BTreeMap<TypeCode, TypeProfile>,
    attempts: Mutex<HashMap<AttemptId, OfflineAttempt>>,
}

impl InMemoryBackend {
    pub fn new(bank: &QuestionBank) -> Self {
        Self {
            questions: bank.questions.clone(),
            profiles: bank.profiles(),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Number of attempts started so far.
    pub fn attempt_count(&self) -> usize {
        self.lock().len()
    }

    /// The demographics an attempt was started with.
    pub fn start_request(&self, attempt_id: &AttemptId) -> Option<StartRequest> {
        self.lock().get(attempt_id).map(|a| a.request.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<AttemptId, OfflineAttempt>> {
        self.attempts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reject a submission a server would refuse: unknown ids, scores outside
    /// `1..=10`, or a question left unanswered.
    fn check_answers(&self, answers: &AnswerMap) -> Result<(), ServiceError> {
        let unprocessable = |message: String| ServiceError::Api {
            status: 422,
            message,
        };

        for (&question_id, &score) in answers {
            if !self.questions.iter().any(|q| q.id == question_id) {
                return Err(unprocessable(format!("unknown question id {question_id}")));
            }
            if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
                return Err(unprocessable(format!(
                    "score {score} for question {question_id} is outside 1..=10"
                )));
            }
        }
        if let Some(missing) = self.questions.iter().find(|q| !answers.contains_key(&q.id)) {
            return Err(unprocessable(format!(
                "question {} has not been answered",
                missing.id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl AttemptService for InMemoryBackend {
    fn name(&self) -> &str {
        "offline"
    }

    async fn start(&self, request: &StartRequest) -> anyhow::Result<String> {
        let attempt_id = AttemptId::generate();
        self.lock().insert(
            attempt_id,
            OfflineAttempt {
                request: request.clone(),
                result: None,
            },
        );
        tracing::debug!(%attempt_id, "offline attempt created");
        Ok(attempt_id.to_string())
    }

    async fn fetch_questions(&self, attempt_id: &AttemptId) -> anyhow::Result<Vec<Question>> {
        if !self.lock().contains_key(attempt_id) {
            return Err(ServiceError::NotFound(attempt_id.to_string()).into());
        }
        Ok(self.questions.clone())
    }

    async fn submit(
        &self,
        attempt_id: &AttemptId,
        answers: &AnswerMap,
    ) -> anyhow::Result<AttemptResult> {
        let mut attempts = self.lock();
        let attempt = attempts
            .get_mut(attempt_id)
            .ok_or_else(|| ServiceError::NotFound(attempt_id.to_string()))?;
        if attempt.result.is_some() {
            return Err(ServiceError::AlreadySubmitted(attempt_id.to_string()).into());
        }
        self.check_answers(answers)?;

        let result = scoring::score_attempt(*attempt_id, &self.questions, answers, &self.profiles)
            .map_err(|e| ServiceError::Api {
                status: 422,
                message: e.to_string(),
            })?;
        attempt.result = Some(result.clone());
        tracing::info!(%attempt_id, tie = result.is_tie(), "offline attempt scored");
        Ok(result)
    }

    async fn fetch_result(&self, attempt_id: &AttemptId) -> anyhow::Result<AttemptResult> {
        self.lock()
            .get(attempt_id)
            .and_then(|a| a.result.clone())
            .ok_or_else(|| ServiceError::NotFound(attempt_id.to_string()).into())
    }
}
