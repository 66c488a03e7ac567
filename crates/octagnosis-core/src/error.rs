//! Error types for the attempt lifecycle, scoring, and collaborator calls.
//!
//! Every failure is a value. `ServiceError` is defined here rather than in
//! `octagnosis-client` so the flow engine and its callers can downcast and
//! classify collaborator failures without string matching.

use thiserror::Error;

use crate::model::{AttemptStatus, QuestionId, TypeCode};

/// Validation and state errors raised by the attempt session store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The attempt id is missing or not a canonical UUID v4.
    #[error("invalid attempt id: '{0}'")]
    InvalidAttemptId(String),

    /// The question set to load was empty.
    #[error("question set is empty, nothing to display")]
    EmptyQuestionSet,

    /// Two questions in the set share an id.
    #[error("duplicate question id: {0}")]
    DuplicateQuestionId(QuestionId),

    #[error("score {score} is outside 1..=10")]
    ScoreOutOfRange { score: u8 },

    #[error("unknown question id: {0}")]
    UnknownQuestionId(QuestionId),

    /// No attempt has been initialized.
    #[error("no attempt has been initialized")]
    NotInitialized,

    /// The operation requires an in-progress attempt.
    #[error("attempt is {status}, expected in_progress")]
    NotInProgress { status: AttemptStatus },
}

/// Forward navigation refused because the current page has unanswered questions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("page {} is incomplete, unanswered questions: {unanswered:?}", .page + 1)]
pub struct IncompletePageError {
    /// Zero-based index of the page that blocked navigation.
    pub page: usize,
    /// Question ids on that page still missing an answer, in display order.
    pub unanswered: Vec<QuestionId>,
}

/// Errors from the scoring engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoringError {
    /// No answers or no weighted types, so there is no maximum to resolve.
    #[error("no scorable data: answers or personality types are empty")]
    NoScorableData,

    /// A type's total no longer fits the fixed-point range.
    #[error("score for type {0} overflowed")]
    Overflow(TypeCode),
}

/// Errors from submitting an attempt.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmissionError {
    /// At least one question is unanswered.
    #[error("question {question_id} has not been answered")]
    Incomplete { question_id: QuestionId },

    /// The attempt was already submitted; its result is final.
    #[error("attempt has already been submitted")]
    AlreadySubmitted,

    /// No attempt, or its questions were never loaded.
    #[error("attempt is not ready for submission")]
    NotReady,

    #[error("scoring failed: {0}")]
    Scoring(#[from] ScoringError),

    /// The submission collaborator rejected or failed the call.
    #[error("submission failed: {0}")]
    Service(ServiceError),
}

/// Failures reported by an external collaborator (backend, transport).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The attempt (or endpoint) does not exist.
    #[error("attempt not found: {0}")]
    NotFound(String),

    /// The backend already holds a result for this attempt.
    #[error("attempt already submitted: {0}")]
    AlreadySubmitted(String),

    /// The backend returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    Network(String),

    /// The response body could not be understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Any other collaborator failure.
    #[error("{0}")]
    Other(String),
}

impl ServiceError {
    /// Returns `true` if retrying the same call cannot succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ServiceError::NotFound(_)
                | ServiceError::AlreadySubmitted(_)
                | ServiceError::InvalidResponse(_)
        )
    }

    /// Recover the typed error carried by an `anyhow::Error`, or wrap its message.
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        match err.downcast::<ServiceError>() {
            Ok(service) => service,
            Err(other) => ServiceError::Other(format!("{other:#}")),
        }
    }
}

/// Errors surfaced by the flow engine, which drives a session through the
/// collaborators.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlowError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error("collaborator call failed: {0}")]
    Service(#[from] ServiceError),
}

impl FlowError {
    /// Whether the user has to go back to the start screen.
    pub fn requires_restart(&self) -> bool {
        matches!(
            self,
            FlowError::Session(SessionError::InvalidAttemptId(_))
                | FlowError::Service(ServiceError::NotFound(_))
        )
    }
}
