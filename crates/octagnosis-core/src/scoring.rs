//! Weighted-sum personality scoring with exact tie resolution.
//!
//! Each answered question credits `score × weight` to every type it carries a
//! weight for. The result set holds every type sharing the maximum total,
//! ordered by type code, so identical input always yields identical output.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;

use crate::error::ScoringError;
use crate::model::{
    AnswerMap, AttemptId, FixedScore, Question, QuestionId, TypeCode, TypeProfile,
};
use crate::results::{AttemptResult, PersonalityTypeResult, ResultSet};

/// Aggregate score of every type referenced by the question set.
///
/// Types appear even when no answered question credits them (total 0);
/// types no question references never appear. Answers for questions outside
/// the set are ignored. A total that leaves the fixed-point range is
/// reported as [`ScoringError::Overflow`].
pub fn type_totals(
    questions: &[Question],
    answers: &AnswerMap,
) -> Result<BTreeMap<TypeCode, FixedScore>, ScoringError> {
    let mut totals: BTreeMap<TypeCode, FixedScore> = questions
        .iter()
        .flat_map(|q| q.type_weights.keys())
        .map(|code| (code.clone(), FixedScore::ZERO))
        .collect();

    let by_id: HashMap<QuestionId, &Question> = questions.iter().map(|q| (q.id, q)).collect();

    for (question_id, &score) in answers {
        let Some(question) = by_id.get(question_id) else {
            tracing::debug!(question_id, "ignoring answer for unknown question");
            continue;
        };
        for (code, weight) in &question.type_weights {
            if let Some(total) = totals.get_mut(code) {
                let current = *total;
                *total = weight
                    .checked_times(score)
                    .and_then(|credit| current.checked_add(credit))
                    .ok_or_else(|| ScoringError::Overflow(code.clone()))?;
            }
        }
    }

    Ok(totals)
}

/// Resolve the winning type(s) for a completed answer map.
pub fn score(questions: &[Question], answers: &AnswerMap) -> Result<ResultSet, ScoringError> {
    if answers.is_empty() {
        return Err(ScoringError::NoScorableData);
    }

    let totals = type_totals(questions, answers)?;
    let max_score = totals
        .values()
        .copied()
        .max()
        .ok_or(ScoringError::NoScorableData)?;

    // BTreeMap iteration is already ascending by type code.
    let winners: Vec<(TypeCode, FixedScore)> = totals
        .into_iter()
        .filter(|(_, total)| *total == max_score)
        .collect();
    let is_tied = winners.len() > 1;

    tracing::debug!(
        %max_score,
        winners = winners.len(),
        "resolved personality types"
    );

    Ok(ResultSet::new(
        winners
            .into_iter()
            .map(|(type_code, aggregate_score)| PersonalityTypeResult {
                type_code,
                aggregate_score,
                is_tied,
            })
            .collect(),
    ))
}

/// Score an attempt locally and package the full result record.
///
/// Only the winners' profiles are attached.
pub fn score_attempt(
    attempt_id: AttemptId,
    questions: &[Question],
    answers: &AnswerMap,
    profiles: &BTreeMap<TypeCode, TypeProfile>,
) -> Result<AttemptResult, ScoringError> {
    let result_set = score(questions, answers)?;
    Ok(package_result(attempt_id, result_set, answers.len(), profiles))
}

/// Wrap an already resolved result set into an `AttemptResult`.
pub fn package_result(
    attempt_id: AttemptId,
    result_set: ResultSet,
    total_questions_answered: usize,
    profiles: &BTreeMap<TypeCode, TypeProfile>,
) -> AttemptResult {
    let max_score = result_set.max_score().unwrap_or_default();
    let profiles = result_set
        .iter()
        .filter_map(|r| {
            profiles
                .get(&r.type_code)
                .map(|p| (r.type_code.clone(), p.clone()))
        })
        .collect();

    AttemptResult {
        attempt_id,
        completed_at: Utc::now(),
        max_score,
        result_set,
        total_questions_answered,
        profiles,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ab_questions() -> Vec<Question> {
        vec![
            Question::new(1, "Q1").weighted("A", 1.0),
            Question::new(2, "Q2").weighted("B", 1.0),
            Question::new(3, "Q3").weighted("A", 1.0).weighted("B", 1.0),
        ]
    }

    fn answers(pairs: &[(QuestionId, u8)]) -> AnswerMap {
        pairs.iter().copied().collect()
    }

    fn codes(set: &ResultSet) -> Vec<&str> {
        set.iter().map(|r| r.type_code.as_str()).collect()
    }

    #[test]
    fn composite_question_ties_both_types() {
        let set = score(&ab_questions(), &answers(&[(1, 10), (2, 10), (3, 5)])).unwrap();
        assert_eq!(codes(&set), vec!["A", "B"]);
        assert!(set.is_tie());
        assert!(set.iter().all(|r| r.is_tied));
        assert_eq!(set.max_score(), Some(FixedScore::from_whole(15)));
    }

    #[test]
    fn lowering_composite_answer_keeps_tie() {
        let set = score(&ab_questions(), &answers(&[(1, 10), (2, 10), (3, 4)])).unwrap();
        assert_eq!(codes(&set), vec!["A", "B"]);
        assert_eq!(set.max_score(), Some(FixedScore::from_whole(14)));
        assert!(set.is_tie());
    }

    #[test]
    fn dominant_type_wins_alone() {
        let set = score(&ab_questions(), &answers(&[(1, 10), (2, 5), (3, 5)])).unwrap();
        assert_eq!(codes(&set), vec!["A"]);
        assert!(!set.is_tie());
        assert!(!set.results[0].is_tied);
        assert_eq!(set.results[0].aggregate_score, FixedScore::from_whole(15));
    }

    #[test]
    fn near_miss_type_is_excluded_from_tie() {
        let questions = vec![
            Question::new(1, "Q1").weighted("A", 1.0),
            Question::new(2, "Q2").weighted("B", 1.0),
            Question::new(3, "Q3").weighted("C", 1.0),
        ];
        let set = score(&questions, &answers(&[(1, 8), (2, 8), (3, 7)])).unwrap();
        assert_eq!(codes(&set), vec!["A", "B"]);
        assert!(set.iter().all(|r| r.is_tied));
    }

    #[test]
    fn every_type_tied_at_max_is_returned() {
        let questions: Vec<Question> = ["D", "A", "C", "B"]
            .iter()
            .enumerate()
            .map(|(i, code)| Question::new(i as QuestionId + 1, "Q").weighted(*code, 1.0))
            .collect();
        let set = score(&questions, &answers(&[(1, 6), (2, 6), (3, 6), (4, 6)])).unwrap();
        assert_eq!(codes(&set), vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn fractional_weights_tie_exactly() {
        // 0.1 * 3 and 0.3 * 1 differ in f64 but are equal in thousandths.
        let questions = vec![
            Question::new(1, "Q1").weighted("A", 0.1),
            Question::new(2, "Q2").weighted("B", 0.3),
        ];
        let set = score(&questions, &answers(&[(1, 3), (2, 1)])).unwrap();
        assert_eq!(codes(&set), vec!["A", "B"]);
        assert_eq!(set.max_score(), Some(FixedScore::from_f64(0.3)));
    }

    #[test]
    fn empty_answers_are_not_scorable() {
        assert_eq!(
            score(&ab_questions(), &AnswerMap::new()),
            Err(ScoringError::NoScorableData)
        );
    }

    #[test]
    fn unweighted_questions_are_not_scorable() {
        let questions = vec![Question::new(1, "Q1"), Question::new(2, "Q2")];
        assert_eq!(
            score(&questions, &answers(&[(1, 5), (2, 5)])),
            Err(ScoringError::NoScorableData)
        );
    }

    #[test]
    fn type_without_questions_never_appears() {
        let totals = type_totals(&ab_questions(), &answers(&[(1, 3)])).unwrap();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[&TypeCode::from("A")], FixedScore::from_whole(3));
        assert_eq!(totals[&TypeCode::from("B")], FixedScore::ZERO);
        assert!(!totals.contains_key(&TypeCode::from("C")));
    }

    #[test]
    fn oversized_weight_is_an_overflow_error() {
        let questions = vec![
            Question::new(1, "Q1").weighted("A", 1e16),
            Question::new(2, "Q2").weighted("B", 1.0),
        ];
        assert_eq!(
            score(&questions, &answers(&[(1, 10), (2, 5)])),
            Err(ScoringError::Overflow(TypeCode::from("A")))
        );
    }

    #[test]
    fn overflowing_sum_is_an_overflow_error() {
        let near_max = FixedScore::from_thousandths(i64::MAX / 10);
        let mut first = Question::new(1, "Q1");
        first.type_weights.insert(TypeCode::from("A"), near_max);
        let mut second = Question::new(2, "Q2");
        second.type_weights.insert(TypeCode::from("A"), near_max);
        assert_eq!(
            type_totals(&[first, second], &answers(&[(1, 10), (2, 10)])),
            Err(ScoringError::Overflow(TypeCode::from("A")))
        );
    }

    #[test]
    fn genuine_zero_tie_is_reported() {
        let questions = vec![
            Question::new(1, "Q1").weighted("A", 0.0),
            Question::new(2, "Q2").weighted("B", 0.0),
        ];
        let set = score(&questions, &answers(&[(1, 5), (2, 5)])).unwrap();
        assert_eq!(codes(&set), vec!["A", "B"]);
        assert_eq!(set.max_score(), Some(FixedScore::ZERO));
    }

    #[test]
    fn scoring_is_deterministic() {
        let questions = ab_questions();
        let map = answers(&[(1, 7), (2, 9), (3, 2)]);
        let first = score(&questions, &map).unwrap();
        for _ in 0..50 {
            assert_eq!(score(&questions, &map).unwrap(), first);
        }
    }

    #[test]
    fn score_attempt_attaches_winner_profiles_only() {
        let mut profiles = BTreeMap::new();
        profiles.insert(
            TypeCode::from("A"),
            TypeProfile {
                type_name: "Analyst".into(),
                ..Default::default()
            },
        );
        profiles.insert(
            TypeCode::from("B"),
            TypeProfile {
                type_name: "Builder".into(),
                ..Default::default()
            },
        );

        let id = AttemptId::generate();
        let result = score_attempt(
            id,
            &ab_questions(),
            &answers(&[(1, 10), (2, 5), (3, 5)]),
            &profiles,
        )
        .unwrap();
        assert_eq!(result.attempt_id, id);
        assert_eq!(result.max_score, FixedScore::from_whole(15));
        assert_eq!(result.total_questions_answered, 3);
        assert_eq!(result.profiles.len(), 1);
        assert_eq!(
            result.profile(&TypeCode::from("A")).unwrap().type_name,
            "Analyst"
        );
    }
}
