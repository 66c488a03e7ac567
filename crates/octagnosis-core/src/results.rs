//! Scoring outcomes: per-type results, tie-aware result sets, and the
//! immutable attempt result record with JSON persistence.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{AttemptId, FixedScore, TypeCode, TypeProfile};

/// One winning personality type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalityTypeResult {
    pub type_code: TypeCode,
    pub aggregate_score: FixedScore,
    /// True when at least one other type shares the same maximum.
    pub is_tied: bool,
}

/// The maximum-scoring type(s), ordered by ascending type code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSet {
    pub results: Vec<PersonalityTypeResult>,
}

impl ResultSet {
    pub fn new(results: Vec<PersonalityTypeResult>) -> Self {
        Self { results }
    }

    pub fn is_tie(&self) -> bool {
        self.results.len() > 1
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// The shared aggregate score of every member.
    pub fn max_score(&self) -> Option<FixedScore> {
        self.results.first().map(|r| r.aggregate_score)
    }

    pub fn type_codes(&self) -> Vec<&TypeCode> {
        self.results.iter().map(|r| &r.type_code).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PersonalityTypeResult> {
        self.results.iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a PersonalityTypeResult;
    type IntoIter = std::slice::Iter<'a, PersonalityTypeResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

/// The final, immutable outcome of a submitted attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptResult {
    pub attempt_id: AttemptId,
    pub completed_at: DateTime<Utc>,
    pub max_score: FixedScore,
    pub result_set: ResultSet,
    pub total_questions_answered: usize,
    /// Profiles of the winning types, when the scorer knows them.
    #[serde(default)]
    pub profiles: BTreeMap<TypeCode, TypeProfile>,
}

impl AttemptResult {
    pub fn is_tie(&self) -> bool {
        self.result_set.is_tie()
    }

    pub fn profile(&self, code: &TypeCode) -> Option<&TypeProfile> {
        self.profiles.get(code)
    }

    /// Format the result as markdown, one section per winning type.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        let heading = if self.is_tie() {
            "Tied personality types"
        } else {
            "Personality type"
        };
        md.push_str(&format!("## {heading}\n\n"));
        md.push_str(&format!(
            "**Score:** {} ({} questions answered)\n\n",
            self.max_score, self.total_questions_answered
        ));

        for r in &self.result_set {
            let Some(profile) = self.profiles.get(&r.type_code) else {
                md.push_str(&format!("### {}\n\n", r.type_code));
                continue;
            };
            md.push_str(&format!("### {} ({})\n\n", profile.type_name, r.type_code));
            if !profile.title.is_empty() {
                md.push_str(&format!("*{}*\n\n", profile.title));
            }
            if !profile.description.is_empty() {
                md.push_str(&format!("{}\n\n", profile.description));
            }
            for point in &profile.description_points {
                md.push_str(&format!("- {point}\n"));
            }
            if !profile.strength_keywords.is_empty() {
                md.push_str(&format!(
                    "\n**Strengths:** {}\n",
                    profile.strength_keywords.join(", ")
                ));
            }
            if !profile.weakness_keywords.is_empty() {
                md.push_str(&format!(
                    "**Weaknesses:** {}\n",
                    profile.weakness_keywords.join(", ")
                ));
            }
            md.push('\n');
        }

        md
    }

    /// Save the result as pretty JSON.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize result")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write result to {}", path.display()))?;
        Ok(())
    }

    /// Load a result from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read result from {}", path.display()))?;
        let result: AttemptResult =
            serde_json::from_str(&content).context("failed to parse result JSON")?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(code: &str, score: i64, is_tied: bool) -> PersonalityTypeResult {
        PersonalityTypeResult {
            type_code: TypeCode::from(code),
            aggregate_score: FixedScore::from_whole(score),
            is_tied,
        }
    }

    #[test]
    fn tie_flag_follows_length() {
        let single = ResultSet::new(vec![member("A", 15, false)]);
        assert!(!single.is_tie());
        assert_eq!(single.max_score(), Some(FixedScore::from_whole(15)));

        let tied = ResultSet::new(vec![member("A", 15, true), member("B", 15, true)]);
        assert!(tied.is_tie());
        assert_eq!(tied.type_codes(), vec![&TypeCode::from("A"), &TypeCode::from("B")]);

        assert_eq!(ResultSet::default().max_score(), None);
    }

    #[test]
    fn save_and_load_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("result.json");
        let result = AttemptResult {
            attempt_id: AttemptId::generate(),
            completed_at: Utc::now(),
            max_score: FixedScore::from_whole(15),
            result_set: ResultSet::new(vec![member("A", 15, true), member("B", 15, true)]),
            total_questions_answered: 3,
            profiles: BTreeMap::new(),
        };

        result.save_json(&path).unwrap();
        let loaded = AttemptResult::load_json(&path).unwrap();
        assert_eq!(loaded, result);
        assert!(loaded.is_tie());
    }

    #[test]
    fn markdown_lists_every_tied_type() {
        let mut profiles = BTreeMap::new();
        profiles.insert(
            TypeCode::from("A"),
            TypeProfile {
                type_name: "Analyst".into(),
                strength_keywords: vec!["focus".into(), "rigor".into()],
                ..Default::default()
            },
        );
        let result = AttemptResult {
            attempt_id: AttemptId::generate(),
            completed_at: Utc::now(),
            max_score: FixedScore::from_whole(15),
            result_set: ResultSet::new(vec![member("A", 15, true), member("B", 15, true)]),
            total_questions_answered: 3,
            profiles,
        };

        let md = result.to_markdown();
        assert!(md.contains("## Tied personality types"));
        assert!(md.contains("### Analyst (A)"));
        assert!(md.contains("**Strengths:** focus, rigor"));
        assert!(md.contains("### B"));
        assert!(md.contains("**Score:** 15 (3 questions answered)"));
    }
}
