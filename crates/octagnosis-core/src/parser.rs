//! TOML question bank and answer sheet parser.
//!
//! Loads question banks from TOML files and validates them.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{
    AnswerMap, FixedScore, Question, QuestionBank, QuestionId, TypeCode, TypeDefinition,
    TypeProfile, MAX_SCORE, MIN_SCORE,
};

/// Intermediate TOML structure for question bank files.
#[derive(Debug, Deserialize)]
struct TomlBankFile {
    bank: TomlBankHeader,
    #[serde(default)]
    types: Vec<TomlType>,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlBankHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    page_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct TomlType {
    code: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    theme_sentence: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    description_points: Vec<String>,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    weaknesses: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    id: QuestionId,
    text: String,
    #[serde(default)]
    weights: BTreeMap<String, FixedScore>,
}

/// Intermediate TOML structure for answer sheets.
#[derive(Debug, Deserialize)]
struct TomlAnswerSheet {
    #[serde(default)]
    answers: HashMap<String, i64>,
}

/// Parse a single TOML file into a `QuestionBank`.
pub fn parse_question_bank(path: &Path) -> Result<QuestionBank> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read question bank: {}", path.display()))?;

    parse_question_bank_str(&content, path)
}

/// Parse a TOML string into a `QuestionBank` (useful for testing).
pub fn parse_question_bank_str(content: &str, source_path: &Path) -> Result<QuestionBank> {
    let parsed: TomlBankFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let types = parsed
        .types
        .into_iter()
        .map(|t| TypeDefinition {
            code: TypeCode::new(t.code),
            profile: TypeProfile {
                type_name: t.name,
                title: t.title,
                theme_sentence: t.theme_sentence,
                description: t.description,
                description_points: t.description_points,
                strength_keywords: t.strengths,
                weakness_keywords: t.weaknesses,
            },
        })
        .collect();

    let questions = parsed
        .questions
        .into_iter()
        .map(|q| Question {
            id: q.id,
            text: q.text,
            type_weights: q
                .weights
                .into_iter()
                .map(|(code, weight)| (TypeCode::new(code), weight))
                .collect(),
        })
        .collect();

    Ok(QuestionBank {
        id: parsed.bank.id,
        name: parsed.bank.name,
        description: parsed.bank.description,
        page_size: parsed.bank.page_size,
        types,
        questions,
    })
}

/// Parse an answer sheet file (`[answers]` table of `question_id = score`).
pub fn parse_answers(path: &Path) -> Result<AnswerMap> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read answer sheet: {}", path.display()))?;

    parse_answers_str(&content)
        .with_context(|| format!("invalid answer sheet: {}", path.display()))
}

/// Parse an answer sheet from a TOML string.
///
/// Scores outside `1..=10`, non-numeric question ids and ids that appear
/// twice once normalized (`1` and `"01"`) are rejected here; whether the ids
/// exist is checked by the session they are loaded into.
pub fn parse_answers_str(content: &str) -> Result<AnswerMap> {
    let sheet: TomlAnswerSheet = toml::from_str(content).context("failed to parse TOML")?;

    let mut answers = AnswerMap::new();
    for (key, score) in sheet.answers {
        let id: QuestionId = key
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("question id '{key}' is not a number"))?;
        let score = u8::try_from(score)
            .ok()
            .filter(|s| (MIN_SCORE..=MAX_SCORE).contains(s))
            .ok_or_else(|| {
                anyhow::anyhow!("score {score} for question {id} is outside 1..=10")
            })?;
        if answers.insert(id, score).is_some() {
            anyhow::bail!("question {id} is answered more than once");
        }
    }
    Ok(answers)
}

/// A warning from question bank validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question ID (if applicable).
    pub question_id: Option<QuestionId>,
    /// Warning message.
    pub message: String,
}

/// Validate a question bank for common issues.
pub fn validate_question_bank(bank: &QuestionBank) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if bank.questions.is_empty() {
        warnings.push(ValidationWarning {
            question_id: None,
            message: "bank has no questions".into(),
        });
    }

    if bank.page_size == Some(0) {
        warnings.push(ValidationWarning {
            question_id: None,
            message: "page_size is 0, one question per page will be used".into(),
        });
    }

    // Check for duplicate question IDs
    let mut seen_ids = HashSet::new();
    for q in &bank.questions {
        if !seen_ids.insert(q.id) {
            warnings.push(ValidationWarning {
                question_id: Some(q.id),
                message: format!("duplicate question ID: {}", q.id),
            });
        }
    }

    for q in &bank.questions {
        if q.text.trim().is_empty() {
            warnings.push(ValidationWarning {
                question_id: Some(q.id),
                message: "question text is empty".into(),
            });
        }
        if q.type_weights.is_empty() {
            warnings.push(ValidationWarning {
                question_id: Some(q.id),
                message: "question has no type weights and never affects the result".into(),
            });
        }
    }

    // Cross-check weights against declared types, if any were declared
    if !bank.types.is_empty() {
        let declared: HashSet<&TypeCode> = bank.types.iter().map(|t| &t.code).collect();
        for q in &bank.questions {
            for code in q.type_weights.keys() {
                if !declared.contains(code) {
                    warnings.push(ValidationWarning {
                        question_id: Some(q.id),
                        message: format!("weight references undeclared type '{code}'"),
                    });
                }
            }
        }

        let weighted = bank.weighted_types();
        for t in &bank.types {
            if !weighted.contains(&t.code) {
                warnings.push(ValidationWarning {
                    question_id: None,
                    message: format!("type '{}' has no questions and can never win", t.code),
                });
            }
        }
    }

    warnings
}
