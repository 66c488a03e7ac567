//! HTTP backend implementation.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use octagnosis_core::error::ServiceError;
use octagnosis_core::model::{
    AnswerMap, AttemptId, FixedScore, Question, QuestionId, TypeCode, TypeProfile,
};
use octagnosis_core::results::{AttemptResult, PersonalityTypeResult, ResultSet};
use octagnosis_core::traits::{AttemptService, StartRequest};

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RESULT_RETRIES: u32 = 2;
pub const DEFAULT_RESULT_RETRY_DELAY_MS: u64 = 2000;

/// JSON-over-HTTP backend.
pub struct HttpAttemptService {
    base_url: String,
    timeout_secs: u64,
    result_retries: u32,
    result_retry_delay: Duration,
    client: reqwest::Client,
}

impl HttpAttemptService {
    pub fn new(base_url: &str, timeout_secs: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build HTTP client: {e}"))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs,
            result_retries: DEFAULT_RESULT_RETRIES,
            result_retry_delay: Duration::from_millis(DEFAULT_RESULT_RETRY_DELAY_MS),
            client,
        })
    }

    /// How often a transient result-fetch failure is retried, and the pause
    /// between tries.
    pub fn with_result_retry(mut self, retries: u32, delay: Duration) -> Self {
        self.result_retries = retries;
        self.result_retry_delay = delay;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send a request and map transport failures and error statuses.
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        subject: &str,
    ) -> Result<reqwest::Response, ServiceError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ServiceError::Timeout(self.timeout_secs)
            } else {
                ServiceError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if status < 400 {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status {
            404 => ServiceError::NotFound(subject.to_string()),
            409 => ServiceError::AlreadySubmitted(subject.to_string()),
            _ => ServiceError::Api {
                status,
                message: error_message(&body),
            },
        })
    }

    /// Decode a `{success, data, message}` envelope.
    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ServiceError> {
        let status = response.status().as_u16();
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(format!("failed to parse response: {e}")))?;

        if !envelope.success {
            return Err(ServiceError::Api {
                status,
                message: envelope
                    .message
                    .or(envelope.error)
                    .unwrap_or_else(|| "request was not successful".into()),
            });
        }
        envelope
            .data
            .ok_or_else(|| ServiceError::InvalidResponse("response has no data".into()))
    }

    async fn fetch_result_once(
        &self,
        attempt_id: &AttemptId,
    ) -> Result<AttemptResult, ServiceError> {
        let response = self
            .send(
                self.client
                    .get(self.url(&format!("/api/test/result/{attempt_id}"))),
                &attempt_id.to_string(),
            )
            .await?;
        let data: TestResultData = Self::decode(response).await?;
        data.into_result()
    }
}

/// Pull a readable message out of an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        error: Option<String>,
    }

    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message.or(b.error))
        .unwrap_or_else(|| body.to_string())
}

#[derive(Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    message: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct StartResponse {
    success: bool,
    #[serde(default)]
    attempt_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct QuestionData {
    id: QuestionId,
    question_text: String,
    #[serde(default)]
    weights: BTreeMap<String, FixedScore>,
}

impl From<QuestionData> for Question {
    fn from(q: QuestionData) -> Self {
        Question {
            id: q.id,
            text: q.question_text,
            type_weights: q
                .weights
                .into_iter()
                .map(|(code, weight)| (TypeCode::new(code), weight))
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    attempt_id: String,
    answers: Vec<SubmittedAnswer<'a>>,
}

#[derive(Serialize)]
struct SubmittedAnswer<'a> {
    question_id: &'a QuestionId,
    score: &'a u8,
}

#[derive(Deserialize)]
struct TestResultData {
    attempt_id: String,
    test_completed_at: DateTime<Utc>,
    max_score: FixedScore,
    #[serde(default)]
    personality_types: Vec<PersonalityTypeData>,
    #[serde(default)]
    is_tie: bool,
    #[serde(default)]
    total_questions_answered: usize,
}

#[derive(Deserialize)]
struct PersonalityTypeData {
    type_code: String,
    calculated_score: FixedScore,
    #[serde(flatten)]
    profile: TypeProfile,
}

impl TestResultData {
    fn into_result(self) -> Result<AttemptResult, ServiceError> {
        let attempt_id: AttemptId = self
            .attempt_id
            .parse()
            .map_err(|e| ServiceError::InvalidResponse(format!("{e}")))?;
        if self.personality_types.is_empty() {
            return Err(ServiceError::InvalidResponse(
                "result has no personality types".into(),
            ));
        }

        // The payload lists every type with its score; only the leaders are
        // part of the result.
        let max_score = self.max_score;
        let leaders: Vec<PersonalityTypeData> = self
            .personality_types
            .into_iter()
            .filter(|t| t.calculated_score == max_score)
            .collect();
        if leaders.is_empty() {
            return Err(ServiceError::InvalidResponse(format!(
                "no personality type reaches max_score {max_score}"
            )));
        }
        if self.is_tie != (leaders.len() > 1) {
            tracing::debug!(
                is_tie = self.is_tie,
                leaders = leaders.len(),
                "tie flag disagrees with scores, using scores"
            );
        }

        let tied = leaders.len() > 1;
        let mut results = Vec::with_capacity(leaders.len());
        let mut profiles = BTreeMap::new();
        for t in leaders {
            let code = TypeCode::new(t.type_code);
            results.push(PersonalityTypeResult {
                type_code: code.clone(),
                aggregate_score: t.calculated_score,
                is_tied: tied,
            });
            profiles.insert(code, t.profile);
        }
        results.sort_by(|a, b| a.type_code.cmp(&b.type_code));

        Ok(AttemptResult {
            attempt_id,
            completed_at: self.test_completed_at,
            max_score,
            result_set: ResultSet::new(results),
            total_questions_answered: self.total_questions_answered,
            profiles,
        })
    }
}

#[async_trait]
impl AttemptService for HttpAttemptService {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, request), fields(gender = %request.gender, age = request.age))]
    async fn start(&self, request: &StartRequest) -> anyhow::Result<String> {
        let response = self
            .send(
                self.client.post(self.url("/api/test/start")).json(request),
                "start",
            )
            .await?;

        let status = response.status().as_u16();
        let body: StartResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(format!("failed to parse response: {e}")))?;

        if !body.success {
            return Err(ServiceError::Api {
                status,
                message: body.error.unwrap_or_else(|| "failed to start attempt".into()),
            }
            .into());
        }
        body.attempt_id.ok_or_else(|| {
            ServiceError::InvalidResponse("response has no attempt_id".into()).into()
        })
    }

    #[instrument(skip(self), fields(attempt_id = %attempt_id))]
    async fn fetch_questions(&self, attempt_id: &AttemptId) -> anyhow::Result<Vec<Question>> {
        let response = self
            .send(
                self.client
                    .get(self.url(&format!("/api/test/questions/{attempt_id}"))),
                &attempt_id.to_string(),
            )
            .await?;
        let data: Vec<QuestionData> = Self::decode(response).await?;
        tracing::debug!(count = data.len(), "questions received");
        Ok(data.into_iter().map(Question::from).collect())
    }

    #[instrument(skip(self, answers), fields(attempt_id = %attempt_id, answered = answers.len()))]
    async fn submit(
        &self,
        attempt_id: &AttemptId,
        answers: &AnswerMap,
    ) -> anyhow::Result<AttemptResult> {
        let body = SubmitRequest {
            attempt_id: attempt_id.to_string(),
            answers: answers
                .iter()
                .map(|(question_id, score)| SubmittedAnswer { question_id, score })
                .collect(),
        };

        let response = self
            .send(
                self.client.post(self.url("/api/test/submit")).json(&body),
                &attempt_id.to_string(),
            )
            .await?;
        let data: TestResultData = Self::decode(response).await?;
        Ok(data.into_result()?)
    }

    #[instrument(skip(self), fields(attempt_id = %attempt_id))]
    async fn fetch_result(&self, attempt_id: &AttemptId) -> anyhow::Result<AttemptResult> {
        let mut tries = 0;
        loop {
            match self.fetch_result_once(attempt_id).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_permanent() || tries >= self.result_retries => return Err(e.into()),
                Err(e) => {
                    tries += 1;
                    tracing::warn!(
                        "result fetch failed (retry {tries}/{}): {e}",
                        self.result_retries
                    );
                    tokio::time::sleep(self.result_retry_delay).await;
                }
            }
        }
    }
}
