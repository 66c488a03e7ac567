//! Core data model types for octagnosis.
//!
//! These are the fundamental types the whole system uses to represent
//! questions, attempts, answers, and the question bank they come from.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::SessionError;

/// Stable ordering key of a question.
pub type QuestionId = u32;

/// Lowest score a user can give a question.
pub const MIN_SCORE: u8 = 1;
/// Highest score a user can give a question.
pub const MAX_SCORE: u8 = 10;

/// Answers collected so far, keyed by question id.
pub type AnswerMap = BTreeMap<QuestionId, u8>;

// ---------------------------------------------------------------------------
// Personality types and fixed-point scores
// ---------------------------------------------------------------------------

/// Identifier of one candidate result category (e.g. "ANALYTIC").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeCode(String);

impl TypeCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeCode {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}

/// A weight or aggregate score held in thousandths.
///
/// Weights may be fractional, but ties must be detected with exact equality,
/// so every value is rounded to three decimal places on the way in and all
/// arithmetic stays in integers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FixedScore(i64);

impl FixedScore {
    /// Number of fixed-point units per whole point.
    pub const SCALE: i64 = 1000;
    pub const ZERO: FixedScore = FixedScore(0);
    /// Largest magnitude accepted when reading a weight or score.
    pub const MAX_MAGNITUDE: f64 = 1e9;

    pub fn from_whole(points: i64) -> Self {
        Self(points * Self::SCALE)
    }

    pub fn from_f64(value: f64) -> Self {
        Self((value * Self::SCALE as f64).round() as i64)
    }

    pub fn from_thousandths(units: i64) -> Self {
        Self(units)
    }

    pub fn thousandths(self) -> i64 {
        self.0
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }

    pub fn is_whole(self) -> bool {
        self.0 % Self::SCALE == 0
    }

    /// Whole points, rounded half away from zero.
    pub fn round(self) -> i64 {
        let half = Self::SCALE / 2;
        if self.0 >= 0 {
            (self.0 + half) / Self::SCALE
        } else {
            (self.0 - half) / Self::SCALE
        }
    }

    /// This weight applied to an answer score.
    pub fn times(self, score: u8) -> Self {
        Self(self.0 * i64::from(score))
    }

    /// `times`, or `None` when the product leaves the `i64` range.
    pub fn checked_times(self, score: u8) -> Option<Self> {
        self.0.checked_mul(i64::from(score)).map(Self)
    }

    pub fn checked_add(self, rhs: FixedScore) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }
}

impl Add for FixedScore {
    type Output = FixedScore;

    fn add(self, rhs: FixedScore) -> FixedScore {
        FixedScore(self.0 + rhs.0)
    }
}

impl AddAssign for FixedScore {
    fn add_assign(&mut self, rhs: FixedScore) {
        self.0 += rhs.0;
    }
}

impl fmt::Display for FixedScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_whole() {
            return write!(f, "{}", self.0 / Self::SCALE);
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let scale = Self::SCALE as u64;
        let frac = format!("{:03}", abs % scale);
        write!(f, "{sign}{}.{}", abs / scale, frac.trim_end_matches('0'))
    }
}

impl Serialize for FixedScore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_whole() {
            serializer.serialize_i64(self.0 / Self::SCALE)
        } else {
            serializer.serialize_f64(self.to_f64())
        }
    }
}

impl<'de> Deserialize<'de> for FixedScore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        if !value.is_finite() {
            return Err(serde::de::Error::custom("score must be a finite number"));
        }
        if value.abs() > Self::MAX_MAGNITUDE {
            return Err(serde::de::Error::custom(format!(
                "score {value} is outside -1e9..=1e9"
            )));
        }
        Ok(FixedScore::from_f64(value))
    }
}

// ---------------------------------------------------------------------------
// Questions
// ---------------------------------------------------------------------------

/// A single Likert-scale question with its contribution to each type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    /// Weight credited to each type per answer point.
    #[serde(default)]
    pub type_weights: BTreeMap<TypeCode, FixedScore>,
}

impl Question {
    pub fn new(id: QuestionId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            type_weights: BTreeMap::new(),
        }
    }

    /// Builder-style helper to attach a weight for a type.
    pub fn weighted(mut self, code: impl Into<String>, weight: f64) -> Self {
        self.type_weights
            .insert(TypeCode::new(code), FixedScore::from_f64(weight));
        self
    }
}

// ---------------------------------------------------------------------------
// Attempts
// ---------------------------------------------------------------------------

/// Validated identifier of an attempt: a canonical hyphenated UUID v4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AttemptId(Uuid);

impl AttemptId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

/// Check the 8-4-4-4-12 shape with version nibble 4 and variant 8/9/a/b.
pub fn is_uuid_v4(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != 36 {
        return false;
    }
    for (i, &b) in bytes.iter().enumerate() {
        let ok = match i {
            8 | 13 | 18 | 23 => b == b'-',
            14 => b == b'4',
            19 => matches!(b.to_ascii_lowercase(), b'8' | b'9' | b'a' | b'b'),
            _ => b.is_ascii_hexdigit(),
        };
        if !ok {
            return false;
        }
    }
    true
}

impl FromStr for AttemptId {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !is_uuid_v4(s) {
            return Err(SessionError::InvalidAttemptId(s.to_string()));
        }
        Uuid::parse_str(s)
            .map(AttemptId)
            .map_err(|_| SessionError::InvalidAttemptId(s.to_string()))
    }
}

impl TryFrom<String> for AttemptId {
    type Error = SessionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AttemptId> for String {
    fn from(id: AttemptId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Lifecycle state of an attempt. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Created,
    InProgress,
    Submitted,
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptStatus::Created => write!(f, "created"),
            AttemptStatus::InProgress => write!(f, "in_progress"),
            AttemptStatus::Submitted => write!(f, "submitted"),
        }
    }
}

/// One user's run through the quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: AttemptId,
    pub created_at: DateTime<Utc>,
    pub status: AttemptStatus,
}

impl Attempt {
    pub fn new(id: AttemptId) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            status: AttemptStatus::Created,
        }
    }
}

/// Answered versus total question count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub answered: usize,
    pub total: usize,
}

impl Progress {
    /// Percentage of questions answered, 0 when there are no questions.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.answered as f64 / self.total as f64 * 100.0
    }
}

// ---------------------------------------------------------------------------
// Demographics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => write!(f, "male"),
            Gender::Female => write!(f, "female"),
        }
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            other => Err(format!("unknown gender: {other}")),
        }
    }
}

/// Age bracket offered on the start screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgeRange {
    #[serde(rename = "under18")]
    Under18,
    #[serde(rename = "19-25")]
    From19To25,
    #[serde(rename = "26-50")]
    From26To50,
    #[serde(rename = "over51")]
    Over51,
}

impl AgeRange {
    /// The single age sent to the backend for this bracket.
    pub fn representative_age(self) -> u32 {
        match self {
            AgeRange::Under18 => 15,
            AgeRange::From19To25 => 22,
            AgeRange::From26To50 => 38,
            AgeRange::Over51 => 55,
        }
    }
}

impl fmt::Display for AgeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgeRange::Under18 => write!(f, "under18"),
            AgeRange::From19To25 => write!(f, "19-25"),
            AgeRange::From26To50 => write!(f, "26-50"),
            AgeRange::Over51 => write!(f, "over51"),
        }
    }
}

impl FromStr for AgeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "under18" => Ok(AgeRange::Under18),
            "19-25" => Ok(AgeRange::From19To25),
            "26-50" => Ok(AgeRange::From26To50),
            "over51" => Ok(AgeRange::Over51),
            other => Err(format!("unknown age range: {other}")),
        }
    }
}

/// Demographic input collected before an attempt starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Demographics {
    pub gender: Gender,
    pub age_range: AgeRange,
}

// ---------------------------------------------------------------------------
// Question bank
// ---------------------------------------------------------------------------

/// Descriptive metadata shown alongside a result type. Never affects scoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeProfile {
    #[serde(default)]
    pub type_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub theme_sentence: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub description_points: Vec<String>,
    #[serde(default)]
    pub strength_keywords: Vec<String>,
    #[serde(default)]
    pub weakness_keywords: Vec<String>,
}

/// A type code together with its profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub code: TypeCode,
    #[serde(flatten)]
    pub profile: TypeProfile,
}

/// A complete quiz definition: types plus ordered questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionBank {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Questions per page; callers fall back to their own default.
    #[serde(default)]
    pub page_size: Option<usize>,
    #[serde(default)]
    pub types: Vec<TypeDefinition>,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl QuestionBank {
    /// Profiles keyed by type code.
    pub fn profiles(&self) -> BTreeMap<TypeCode, TypeProfile> {
        self.types
            .iter()
            .map(|t| (t.code.clone(), t.profile.clone()))
            .collect()
    }

    /// Every type code referenced by at least one question weight.
    pub fn weighted_types(&self) -> HashSet<&TypeCode> {
        self.questions
            .iter()
            .flat_map(|q| q.type_weights.keys())
            .collect()
    }
}
