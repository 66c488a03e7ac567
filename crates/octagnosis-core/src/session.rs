//! The attempt session store.
//!
//! `AttemptSession` is the single owner of one attempt's progress: its
//! identity, the loaded question set, the page cursor, and the answers. Every
//! mutation goes through a method that upholds the lifecycle invariants:
//!
//! - status only moves forward: created, in progress, submitted;
//! - answers only exist for loaded questions and scores stay in `1..=10`;
//! - moving forward or submitting requires the current page to be complete,
//!   and submission additionally requires every question to be answered;
//! - a result is produced at most once.
//!
//! All operations are synchronous. Collaborator calls (fetching questions,
//! remote submission) happen outside the store; see [`crate::engine`].

use std::collections::HashSet;

use crate::error::{IncompletePageError, SessionError, SubmissionError};
use crate::model::{
    AnswerMap, Attempt, AttemptId, AttemptStatus, Progress, Question, QuestionId, MAX_SCORE,
    MIN_SCORE,
};
use crate::results::ResultSet;
use crate::scoring;

/// Questions shown per page unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 5;

/// A validated snapshot handed to a submission collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSubmission {
    pub attempt_id: AttemptId,
    pub answers: AnswerMap,
}

/// In-memory state of one attempt.
#[derive(Debug, Clone)]
pub struct AttemptSession {
    page_size: usize,
    attempt: Option<Attempt>,
    questions: Vec<Question>,
    answers: AnswerMap,
    page_index: usize,
    result: Option<ResultSet>,
    last_failure: Option<String>,
}

impl Default for AttemptSession {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl AttemptSession {
    /// Create an empty store. A page size of 0 is treated as 1.
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            attempt: None,
            questions: Vec::new(),
            answers: AnswerMap::new(),
            page_index: 0,
            result: None,
            last_failure: None,
        }
    }

    // -- lifecycle ----------------------------------------------------------

    /// Start tracking a new attempt.
    ///
    /// Prior state is always cleared first, so a failed call leaves the store
    /// exactly as a fresh one.
    pub fn initialize(&mut self, attempt_id: &str) -> Result<(), SessionError> {
        self.reset();
        let id: AttemptId = attempt_id.parse().inspect_err(|_| {
            tracing::warn!(attempt_id, "rejected malformed attempt id");
        })?;
        self.attempt = Some(Attempt::new(id));
        tracing::info!(attempt_id = %id, "attempt initialized");
        Ok(())
    }

    /// Replace the question set and move the attempt into progress.
    ///
    /// Answers to questions that are no longer present are dropped and the
    /// page cursor returns to the first page.
    pub fn load_questions(&mut self, questions: Vec<Question>) -> Result<(), SessionError> {
        let status = self.status().ok_or(SessionError::NotInitialized)?;
        if status == AttemptStatus::Submitted {
            return Err(SessionError::NotInProgress { status });
        }
        if questions.is_empty() {
            return Err(SessionError::EmptyQuestionSet);
        }

        let mut ids = HashSet::with_capacity(questions.len());
        for q in &questions {
            if !ids.insert(q.id) {
                return Err(SessionError::DuplicateQuestionId(q.id));
            }
        }

        self.answers.retain(|id, _| ids.contains(id));
        self.questions = questions;
        self.page_index = 0;
        self.last_failure = None;

        let (questions, pages) = (self.questions.len(), self.total_pages());
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.status = AttemptStatus::InProgress;
            tracing::debug!(attempt_id = %attempt.id, questions, pages, "questions loaded");
        }
        Ok(())
    }

    /// Return to the pre-initialize empty state.
    pub fn reset(&mut self) {
        self.attempt = None;
        self.questions.clear();
        self.answers.clear();
        self.page_index = 0;
        self.result = None;
        self.last_failure = None;
    }

    // -- answers ------------------------------------------------------------

    /// Record (or overwrite) the score for a question. Never changes page.
    pub fn set_answer(&mut self, question_id: QuestionId, score: u8) -> Result<(), SessionError> {
        self.ensure_in_progress()?;
        if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
            return Err(SessionError::ScoreOutOfRange { score });
        }
        if !self.has_question(question_id) {
            return Err(SessionError::UnknownQuestionId(question_id));
        }
        self.answers.insert(question_id, score);
        Ok(())
    }

    /// Forget the score for a question.
    pub fn clear_answer(&mut self, question_id: QuestionId) -> Result<(), SessionError> {
        self.ensure_in_progress()?;
        if !self.has_question(question_id) {
            return Err(SessionError::UnknownQuestionId(question_id));
        }
        self.answers.remove(&question_id);
        Ok(())
    }

    // -- pagination ---------------------------------------------------------

    /// The questions on the current page, in order.
    pub fn current_page_questions(&self) -> &[Question] {
        let start = (self.page_index * self.page_size).min(self.questions.len());
        let end = (start + self.page_size).min(self.questions.len());
        &self.questions[start..end]
    }

    /// Number of pages; 0 when no questions are loaded.
    pub fn total_pages(&self) -> usize {
        self.questions.len().div_ceil(self.page_size)
    }

    pub fn is_first_page(&self) -> bool {
        self.page_index == 0
    }

    pub fn is_last_page(&self) -> bool {
        self.page_index + 1 >= self.total_pages()
    }

    /// Every question on the current page has an answer.
    ///
    /// A page without questions is never complete.
    pub fn is_current_page_complete(&self) -> bool {
        let page = self.current_page_questions();
        !page.is_empty() && page.iter().all(|q| self.answers.contains_key(&q.id))
    }

    /// Ids on the current page still missing an answer, in display order.
    pub fn unanswered_on_current_page(&self) -> Vec<QuestionId> {
        self.current_page_questions()
            .iter()
            .filter(|q| !self.answers.contains_key(&q.id))
            .map(|q| q.id)
            .collect()
    }

    /// Move to the next page.
    ///
    /// On the last page this is a successful no-op (submit instead).
    pub fn advance_page(&mut self) -> Result<(), IncompletePageError> {
        if self.is_last_page() {
            return Ok(());
        }
        let unanswered = self.unanswered_on_current_page();
        if !unanswered.is_empty() {
            return Err(IncompletePageError {
                page: self.page_index,
                unanswered,
            });
        }
        self.page_index += 1;
        tracing::debug!(page = self.page_index, "advanced page");
        Ok(())
    }

    /// Move to the previous page, stopping at the first. Never validates.
    pub fn retreat_page(&mut self) {
        self.page_index = self.page_index.saturating_sub(1);
    }

    // -- submission ---------------------------------------------------------

    /// Validate and score the attempt locally.
    ///
    /// Succeeds once; later calls fail with `AlreadySubmitted` and the stored
    /// result stays available through [`AttemptSession::result`].
    pub fn submit(&mut self) -> Result<ResultSet, SubmissionError> {
        let pending = self.prepare_submission()?;
        let result_set = scoring::score(&self.questions, &pending.answers)?;
        self.complete_submission(result_set.clone())?;
        Ok(result_set)
    }

    /// Run every submission check and snapshot the answers, without changing
    /// state. Used when a collaborator performs the scoring.
    pub fn prepare_submission(&self) -> Result<PendingSubmission, SubmissionError> {
        let attempt = self.attempt.as_ref().ok_or(SubmissionError::NotReady)?;
        match attempt.status {
            AttemptStatus::Submitted => return Err(SubmissionError::AlreadySubmitted),
            AttemptStatus::Created => return Err(SubmissionError::NotReady),
            AttemptStatus::InProgress => {}
        }

        if let Some(&question_id) = self.unanswered_on_current_page().first() {
            return Err(SubmissionError::Incomplete { question_id });
        }
        // The current page being complete says nothing about earlier pages.
        if let Some(question) = self
            .questions
            .iter()
            .find(|q| !self.answers.contains_key(&q.id))
        {
            return Err(SubmissionError::Incomplete {
                question_id: question.id,
            });
        }

        Ok(PendingSubmission {
            attempt_id: attempt.id,
            answers: self.answers.clone(),
        })
    }

    /// Record the result of a successful submission and seal the attempt.
    pub fn complete_submission(&mut self, result: ResultSet) -> Result<(), SubmissionError> {
        let attempt = self.attempt.as_mut().ok_or(SubmissionError::NotReady)?;
        match attempt.status {
            AttemptStatus::Submitted => return Err(SubmissionError::AlreadySubmitted),
            AttemptStatus::Created => return Err(SubmissionError::NotReady),
            AttemptStatus::InProgress => {}
        }
        attempt.status = AttemptStatus::Submitted;
        tracing::info!(
            attempt_id = %attempt.id,
            types = ?result.type_codes(),
            tie = result.is_tie(),
            "attempt submitted"
        );
        self.result = Some(result);
        self.last_failure = None;
        Ok(())
    }

    /// Remember that a collaborator call failed. No state transition occurs.
    pub fn record_failure(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(%message, "recorded collaborator failure");
        self.last_failure = Some(message);
    }

    // -- accessors ----------------------------------------------------------

    pub fn attempt(&self) -> Option<&Attempt> {
        self.attempt.as_ref()
    }

    pub fn attempt_id(&self) -> Option<AttemptId> {
        self.attempt.as_ref().map(|a| a.id)
    }

    pub fn status(&self) -> Option<AttemptStatus> {
        self.attempt.as_ref().map(|a| a.status)
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    pub fn answer(&self, question_id: QuestionId) -> Option<u8> {
        self.answers.get(&question_id).copied()
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// The result of the submission, once submitted.
    pub fn result(&self) -> Option<&ResultSet> {
        self.result.as_ref()
    }

    /// The last collaborator failure, cleared by the next successful transition.
    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    pub fn progress(&self) -> Progress {
        Progress {
            answered: self.answers.len(),
            total: self.questions.len(),
        }
    }

    fn has_question(&self, question_id: QuestionId) -> bool {
        self.questions.iter().any(|q| q.id == question_id)
    }

    fn ensure_in_progress(&self) -> Result<(), SessionError> {
        match self.status() {
            None => Err(SessionError::NotInitialized),
            Some(AttemptStatus::InProgress) => Ok(()),
            Some(status) => Err(SessionError::NotInProgress { status }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FixedScore, TypeCode};

    const ATTEMPT: &str = "3f2b8c1e-9a4d-4e6f-8b7a-1c2d3e4f5a6b";

    fn questions(n: u32) -> Vec<Question> {
        (1..=n)
            .map(|id| {
                let code = if id % 2 == 0 { "B" } else { "A" };
                Question::new(id, format!("Question {id}")).weighted(code, 1.0)
            })
            .collect()
    }

    fn loaded(n: u32, page_size: usize) -> AttemptSession {
        let mut session = AttemptSession::new(page_size);
        session.initialize(ATTEMPT).unwrap();
        session.load_questions(questions(n)).unwrap();
        session
    }

    fn answer_current_page(session: &mut AttemptSession, score: u8) {
        let ids: Vec<QuestionId> = session.current_page_questions().iter().map(|q| q.id).collect();
        for id in ids {
            session.set_answer(id, score).unwrap();
        }
    }

    #[test]
    fn invalid_attempt_id_leaves_defaults() {
        let mut session = AttemptSession::default();
        let err = session.initialize("not-a-uuid").unwrap_err();
        assert_eq!(err, SessionError::InvalidAttemptId("not-a-uuid".into()));
        assert!(session.attempt().is_none());
        assert!(session.questions().is_empty());
        assert!(session.answers().is_empty());
        assert_eq!(session.page_index(), 0);
        assert_eq!(session.total_pages(), 0);
    }

    #[test]
    fn missing_attempt_id_is_invalid() {
        let mut session = AttemptSession::default();
        assert!(matches!(
            session.initialize(""),
            Err(SessionError::InvalidAttemptId(_))
        ));
    }

    #[test]
    fn invalid_id_never_reaches_in_progress() {
        let mut session = AttemptSession::default();
        let _ = session.initialize("12345678-1234-1234-1234-123456789abc");
        assert_eq!(
            session.load_questions(questions(3)),
            Err(SessionError::NotInitialized)
        );
        assert_eq!(session.status(), None);
    }

    #[test]
    fn initialize_then_load_moves_to_in_progress() {
        let mut session = AttemptSession::default();
        session.initialize(ATTEMPT).unwrap();
        assert_eq!(session.status(), Some(AttemptStatus::Created));
        session.load_questions(questions(3)).unwrap();
        assert_eq!(session.status(), Some(AttemptStatus::InProgress));
        assert_eq!(session.attempt_id().unwrap().to_string(), ATTEMPT);
    }

    #[test]
    fn reinitialize_clears_previous_attempt() {
        let mut session = loaded(7, 5);
        answer_current_page(&mut session, 6);
        session.advance_page().unwrap();
        session.record_failure("stale");

        session
            .initialize("0b9e0d5c-7c2a-4f3e-a1b2-c3d4e5f60718")
            .unwrap();
        assert!(session.answers().is_empty());
        assert!(session.questions().is_empty());
        assert_eq!(session.page_index(), 0);
        assert_eq!(session.status(), Some(AttemptStatus::Created));
        assert!(session.last_failure().is_none());
    }

    #[test]
    fn empty_question_set_is_rejected() {
        let mut session = AttemptSession::default();
        session.initialize(ATTEMPT).unwrap();
        assert_eq!(
            session.load_questions(vec![]),
            Err(SessionError::EmptyQuestionSet)
        );
        assert_eq!(session.status(), Some(AttemptStatus::Created));
    }

    #[test]
    fn duplicate_question_ids_are_rejected() {
        let mut session = AttemptSession::default();
        session.initialize(ATTEMPT).unwrap();
        let qs = vec![Question::new(1, "a"), Question::new(1, "b")];
        assert_eq!(
            session.load_questions(qs),
            Err(SessionError::DuplicateQuestionId(1))
        );
    }

    #[test]
    fn reloading_questions_prunes_orphan_answers() {
        let mut session = loaded(4, 5);
        session.set_answer(1, 5).unwrap();
        session.set_answer(4, 5).unwrap();
        session.load_questions(questions(2)).unwrap();
        assert_eq!(session.answers().keys().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn set_answer_validates_score_and_question() {
        let mut session = loaded(3, 5);
        assert_eq!(
            session.set_answer(1, 0),
            Err(SessionError::ScoreOutOfRange { score: 0 })
        );
        assert_eq!(
            session.set_answer(1, 11),
            Err(SessionError::ScoreOutOfRange { score: 11 })
        );
        assert_eq!(
            session.set_answer(99, 5),
            Err(SessionError::UnknownQuestionId(99))
        );
        session.set_answer(1, 1).unwrap();
        session.set_answer(1, 10).unwrap();
        assert_eq!(session.answer(1), Some(10));
        assert_eq!(session.page_index(), 0);
    }

    #[test]
    fn set_answer_requires_in_progress() {
        let mut session = AttemptSession::default();
        assert_eq!(session.set_answer(1, 5), Err(SessionError::NotInitialized));
        session.initialize(ATTEMPT).unwrap();
        assert_eq!(
            session.set_answer(1, 5),
            Err(SessionError::NotInProgress {
                status: AttemptStatus::Created
            })
        );
    }

    #[test]
    fn page_arithmetic() {
        for (n, page_size, pages, last_len) in
            [(1, 5, 1, 1), (5, 5, 1, 5), (6, 5, 2, 1), (12, 5, 3, 2), (10, 5, 2, 5), (7, 3, 3, 1)]
        {
            let mut session = loaded(n, page_size);
            assert_eq!(session.total_pages(), pages, "n={n} p={page_size}");
            while !session.is_last_page() {
                answer_current_page(&mut session, 5);
                session.advance_page().unwrap();
            }
            assert_eq!(session.current_page_questions().len(), last_len);
        }
    }

    #[test]
    fn zero_page_size_is_clamped() {
        let session = loaded(3, 0);
        assert_eq!(session.page_size(), 1);
        assert_eq!(session.total_pages(), 3);
    }

    #[test]
    fn current_page_slice_is_ordered() {
        let mut session = loaded(12, 5);
        let first: Vec<QuestionId> = session
            .current_page_questions()
            .iter()
            .map(|q| q.id)
            .collect();
        assert_eq!(first, vec![1, 2, 3, 4, 5]);
        answer_current_page(&mut session, 3);
        session.advance_page().unwrap();
        let second: Vec<QuestionId> =
            session.current_page_questions().iter().map(|q| q.id).collect();
        assert_eq!(second, vec![6, 7, 8, 9, 10]);
    }

    #[test]
    fn page_completeness_tracks_answers() {
        let mut session = loaded(7, 5);
        assert!(!session.is_current_page_complete());
        answer_current_page(&mut session, 4);
        assert!(session.is_current_page_complete());
        session.clear_answer(3).unwrap();
        assert!(!session.is_current_page_complete());
        assert_eq!(session.unanswered_on_current_page(), vec![3]);
        // answers on other pages do not matter
        session.set_answer(6, 2).unwrap();
        assert!(!session.is_current_page_complete());
    }

    #[test]
    fn empty_store_has_no_complete_page() {
        let session = AttemptSession::default();
        assert!(session.current_page_questions().is_empty());
        assert!(!session.is_current_page_complete());
    }

    #[test]
    fn advance_is_gated_on_current_page() {
        let mut session = loaded(12, 5);
        session.set_answer(1, 5).unwrap();
        let err = session.advance_page().unwrap_err();
        assert_eq!(err.page, 0);
        assert_eq!(err.unanswered, vec![2, 3, 4, 5]);
        assert_eq!(session.page_index(), 0);

        answer_current_page(&mut session, 5);
        session.advance_page().unwrap();
        assert_eq!(session.page_index(), 1);
    }

    #[test]
    fn advance_on_last_page_is_noop() {
        let mut session = loaded(3, 5);
        assert!(session.is_last_page());
        session.advance_page().unwrap();
        assert_eq!(session.page_index(), 0);
    }

    #[test]
    fn retreat_never_goes_below_zero() {
        let mut session = loaded(12, 5);
        session.retreat_page();
        assert_eq!(session.page_index(), 0);

        answer_current_page(&mut session, 5);
        session.advance_page().unwrap();
        // backward movement ignores completeness of the page being left
        session.retreat_page();
        assert_eq!(session.page_index(), 0);
        assert!(session.is_first_page());
    }

    #[test]
    fn submit_requires_current_page() {
        let mut session = loaded(3, 5);
        session.set_answer(1, 5).unwrap();
        session.set_answer(3, 5).unwrap();
        assert_eq!(
            session.submit(),
            Err(SubmissionError::Incomplete { question_id: 2 })
        );
        assert_eq!(session.status(), Some(AttemptStatus::InProgress));
    }

    #[test]
    fn submit_rechecks_every_page() {
        let mut session = loaded(7, 5);
        answer_current_page(&mut session, 5);
        session.advance_page().unwrap();
        answer_current_page(&mut session, 5);
        // reach back and clear an earlier answer, then return to the last page
        session.retreat_page();
        session.clear_answer(2).unwrap();
        session.page_index = 1;

        assert!(session.is_current_page_complete());
        assert_eq!(
            session.submit(),
            Err(SubmissionError::Incomplete { question_id: 2 })
        );
        assert_eq!(session.status(), Some(AttemptStatus::InProgress));
        assert!(session.result().is_none());
    }

    #[test]
    fn submit_scores_and_seals_attempt() {
        let mut session = AttemptSession::new(5);
        session.initialize(ATTEMPT).unwrap();
        session
            .load_questions(vec![
                Question::new(1, "Q1").weighted("A", 1.0),
                Question::new(2, "Q2").weighted("B", 1.0),
                Question::new(3, "Q3").weighted("A", 1.0).weighted("B", 1.0),
            ])
            .unwrap();
        session.set_answer(1, 10).unwrap();
        session.set_answer(2, 10).unwrap();
        session.set_answer(3, 5).unwrap();

        let result = session.submit().unwrap();
        assert!(result.is_tie());
        assert_eq!(result.type_codes(), vec![&TypeCode::from("A"), &TypeCode::from("B")]);
        assert_eq!(result.max_score(), Some(FixedScore::from_whole(15)));
        assert_eq!(session.status(), Some(AttemptStatus::Submitted));
        assert_eq!(session.result(), Some(&result));
    }

    #[test]
    fn double_submit_is_rejected_without_rescoring() {
        let mut session = loaded(2, 5);
        answer_current_page(&mut session, 7);
        let first = session.submit().unwrap();

        assert_eq!(session.submit(), Err(SubmissionError::AlreadySubmitted));
        assert_eq!(session.result(), Some(&first));
        // answers are frozen after submission
        assert_eq!(
            session.set_answer(1, 1),
            Err(SessionError::NotInProgress {
                status: AttemptStatus::Submitted
            })
        );
        assert_eq!(
            session.load_questions(questions(2)),
            Err(SessionError::NotInProgress {
                status: AttemptStatus::Submitted
            })
        );
    }

    #[test]
    fn submit_before_questions_is_not_ready() {
        let mut session = AttemptSession::default();
        assert_eq!(session.submit(), Err(SubmissionError::NotReady));
        session.initialize(ATTEMPT).unwrap();
        assert_eq!(session.submit(), Err(SubmissionError::NotReady));
    }

    #[test]
    fn failed_remote_submission_keeps_in_progress() {
        let mut session = loaded(2, 5);
        answer_current_page(&mut session, 7);
        let pending = session.prepare_submission().unwrap();
        assert_eq!(pending.answers.len(), 2);
        assert_eq!(pending.attempt_id.to_string(), ATTEMPT);

        session.record_failure("backend unavailable");
        assert_eq!(session.status(), Some(AttemptStatus::InProgress));
        assert_eq!(session.last_failure(), Some("backend unavailable"));

        let remote = ResultSet::default();
        session.complete_submission(remote.clone()).unwrap();
        assert_eq!(session.status(), Some(AttemptStatus::Submitted));
        assert!(session.last_failure().is_none());
        assert_eq!(
            session.complete_submission(remote),
            Err(SubmissionError::AlreadySubmitted)
        );
    }

    #[test]
    fn reset_returns_to_empty_state() {
        let mut session = loaded(6, 5);
        answer_current_page(&mut session, 5);
        session.advance_page().unwrap();
        session.reset();
        assert!(session.attempt().is_none());
        assert!(session.questions().is_empty());
        assert!(session.answers().is_empty());
        assert_eq!(session.page_index(), 0);
        assert!(session.result().is_none());
    }

    #[test]
    fn progress_counts_answers() {
        let mut session = loaded(4, 5);
        session.set_answer(1, 5).unwrap();
        session.set_answer(1, 6).unwrap();
        session.set_answer(2, 6).unwrap();
        let progress = session.progress();
        assert_eq!(progress.answered, 2);
        assert_eq!(progress.total, 4);
        assert_eq!(progress.percent(), 50.0);
    }
}
