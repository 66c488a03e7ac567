//! Quiz flow engine.
//!
//! Drives an [`AttemptSession`] through the backend collaborator: creating
//! the attempt, loading its questions, and submitting it either to the local
//! scoring engine or to the backend. The session itself never awaits; every
//! suspension point lives here.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, ServiceError, SessionError, SubmissionError};
use crate::model::{AttemptId, Demographics, TypeCode, TypeProfile};
use crate::results::AttemptResult;
use crate::scoring;
use crate::session::{AttemptSession, DEFAULT_PAGE_SIZE};
use crate::traits::{AttemptService, StartRequest};

/// Where submitted answers are scored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMode {
    /// Score with the local engine; the backend is not told about the result.
    Local,
    /// Hand the answers to the backend, which scores and stores the result.
    #[default]
    Remote,
}

/// Configuration for the quiz engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Questions shown per page.
    pub page_size: usize,
    pub scoring: ScoringMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            scoring: ScoringMode::default(),
        }
    }
}

/// Orchestrates the attempt lifecycle against a backend.
pub struct QuizEngine {
    service: Arc<dyn AttemptService>,
    config: EngineConfig,
    profiles: BTreeMap<TypeCode, TypeProfile>,
}

impl QuizEngine {
    pub fn new(service: Arc<dyn AttemptService>, config: EngineConfig) -> Self {
        Self {
            service,
            config,
            profiles: BTreeMap::new(),
        }
    }

    /// Type profiles attached to locally scored results.
    pub fn with_profiles(mut self, profiles: BTreeMap<TypeCode, TypeProfile>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// A fresh, empty session using the configured page size.
    pub fn new_session(&self) -> AttemptSession {
        AttemptSession::new(self.config.page_size)
    }

    /// Create an attempt on the backend and validate the id it returns.
    pub async fn start(&self, demographics: &Demographics) -> Result<AttemptId, FlowError> {
        let request = StartRequest::from(demographics);
        let raw = self.service.start(&request).await.map_err(|e| {
            tracing::error!("failed to start attempt via {}: {e:#}", self.service.name());
            ServiceError::from_anyhow(e)
        })?;
        let attempt_id: AttemptId = raw.parse()?;
        tracing::info!(%attempt_id, gender = %request.gender, age = request.age, "attempt started");
        Ok(attempt_id)
    }

    /// Initialize the session for `attempt_id` and load its questions.
    ///
    /// Any earlier state in the session is discarded first. A failed fetch is
    /// recorded on the session and leaves it in the created state.
    pub async fn open(
        &self,
        session: &mut AttemptSession,
        attempt_id: &str,
    ) -> Result<(), FlowError> {
        session.initialize(attempt_id)?;
        let Some(id) = session.attempt_id() else {
            return Err(SessionError::NotInitialized.into());
        };

        match self.service.fetch_questions(&id).await {
            Ok(questions) => {
                session.load_questions(questions)?;
                Ok(())
            }
            Err(e) => {
                let err = ServiceError::from_anyhow(e);
                tracing::error!(attempt_id = %id, "failed to load questions: {err}");
                session.record_failure(format!("cannot load questions: {err}"));
                Err(err.into())
            }
        }
    }

    /// Submit the session according to the configured scoring mode.
    pub async fn submit(&self, session: &mut AttemptSession) -> Result<AttemptResult, FlowError> {
        match self.config.scoring {
            ScoringMode::Local => self.submit_local(session),
            ScoringMode::Remote => self.submit_remote(session).await,
        }
    }

    fn submit_local(&self, session: &mut AttemptSession) -> Result<AttemptResult, FlowError> {
        let answered = session.answers().len();
        let result_set = session.submit()?;
        let attempt_id = session
            .attempt_id()
            .ok_or(FlowError::Submission(SubmissionError::NotReady))?;
        Ok(scoring::package_result(
            attempt_id,
            result_set,
            answered,
            &self.profiles,
        ))
    }

    async fn submit_remote(
        &self,
        session: &mut AttemptSession,
    ) -> Result<AttemptResult, FlowError> {
        let pending = session.prepare_submission()?;

        match self.service.submit(&pending.attempt_id, &pending.answers).await {
            Ok(result) => {
                session.complete_submission(result.result_set.clone())?;
                Ok(result)
            }
            Err(e) => {
                let err = ServiceError::from_anyhow(e);
                tracing::error!(attempt_id = %pending.attempt_id, "submission failed: {err}");
                session.record_failure(format!("submission failed: {err}"));
                Err(SubmissionError::Service(err).into())
            }
        }
    }

    /// Fetch the stored result of a submitted attempt.
    pub async fn fetch_result(&self, attempt_id: &AttemptId) -> Result<AttemptResult, FlowError> {
        self.service
            .fetch_result(attempt_id)
            .await
            .map_err(|e| ServiceError::from_anyhow(e).into())
    }
}
