use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::formats::{
    ActivateQuizRequest, ContentRequest, ExplainRequest, ExplainResponse, GenerateQuizRequest,
    InterviewQuiz, InterviewRequest, LearningContent, Question, Quiz, QuizResult,
    SubmitInterviewRequest, SubmitQuizRequest,
};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// The learning backend as seen from the client. Every non-2xx response and
/// every transport error surfaces as `Err`; callers never branch on status.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn generate_content(&self, request: &ContentRequest) -> anyhow::Result<LearningContent>;
    async fn generate_quiz(&self, section_index: usize, store_quiz: bool) -> anyhow::Result<Quiz>;
    async fn activate_quiz(&self, quiz_id: &str, section_index: usize) -> anyhow::Result<()>;
    async fn submit_quiz(
        &self,
        answers: &[usize],
        section_index: usize,
    ) -> anyhow::Result<QuizResult>;
    async fn explain(&self, question: &str, section_index: usize) -> anyhow::Result<String>;
    async fn generate_interview_quiz(
        &self,
        request: &InterviewRequest,
    ) -> anyhow::Result<Vec<Question>>;
    async fn submit_interview_quiz(&self, answers: &[usize]) -> anyhow::Result<QuizResult>;
    async fn reset(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl BackendConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let base_url = std::env::var("LEARNPATH_BACKEND_URL")
            .ok()
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        let timeout_secs = match std::env::var("LEARNPATH_TIMEOUT_SECS") {
            Ok(raw) => raw.trim().parse::<u64>().with_context(|| {
                format!("invalid LEARNPATH_TIMEOUT_SECS={raw:?}. expected whole seconds")
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };
        Ok(Self {
            base_url,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Applies command-line overrides on top of the environment.
    pub fn with_overrides(mut self, base_url: Option<String>, timeout_secs: Option<u64>) -> Self {
        if let Some(base_url) = base_url {
            self.base_url = base_url;
        }
        if let Some(secs) = timeout_secs {
            self.timeout = Duration::from_secs(secs);
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> anyhow::Result<Self> {
        if config.timeout.is_zero() {
            anyhow::bail!("backend timeout must be > 0");
        }
        let base_url = parse_base_url(&config.base_url)?;

        // The backend keys quizzes and completion to its session cookie.
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.timeout)
            .build()
            .context("build http client")?;

        tracing::debug!(base_url = %base_url, timeout_secs = config.timeout.as_secs(), "backend client");
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn post_raw<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> anyhow::Result<String> {
        let url = endpoint(&self.base_url, path)?;
        tracing::debug!(%url, "backend request");

        let mut request = self.client.post(url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .with_context(|| format!("read response body: {path}"))?;
        if !status.is_success() {
            let message = parse_error_message(&raw).unwrap_or_else(|| raw.clone());
            anyhow::bail!("backend error ({status}) on {path}: {message}");
        }
        Ok(raw)
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> anyhow::Result<T> {
        let raw = self.post_raw(path, Some(body)).await?;
        serde_json::from_str(&raw).with_context(|| format!("parse {path} response"))
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn generate_content(&self, request: &ContentRequest) -> anyhow::Result<LearningContent> {
        self.post_json("generate-content", request).await
    }

    async fn generate_quiz(&self, section_index: usize, store_quiz: bool) -> anyhow::Result<Quiz> {
        let body = GenerateQuizRequest {
            section_index,
            store_quiz,
        };
        self.post_json("generate-quiz", &body).await
    }

    async fn activate_quiz(&self, quiz_id: &str, section_index: usize) -> anyhow::Result<()> {
        let body = ActivateQuizRequest {
            quiz_id: quiz_id.to_owned(),
            section_index,
        };
        self.post_raw("activate-quiz", Some(&body)).await?;
        Ok(())
    }

    async fn submit_quiz(
        &self,
        answers: &[usize],
        section_index: usize,
    ) -> anyhow::Result<QuizResult> {
        let body = SubmitQuizRequest {
            answers: answers.to_vec(),
            section_index,
        };
        self.post_json("submit-quiz", &body).await
    }

    async fn explain(&self, question: &str, section_index: usize) -> anyhow::Result<String> {
        let body = ExplainRequest {
            question: question.to_owned(),
            section_index,
        };
        let response: ExplainResponse = self.post_json("eli5-explain", &body).await?;
        Ok(response.explanation)
    }

    async fn generate_interview_quiz(
        &self,
        request: &InterviewRequest,
    ) -> anyhow::Result<Vec<Question>> {
        let quiz: InterviewQuiz = self.post_json("generate-interview-quiz", request).await?;
        Ok(quiz.questions)
    }

    async fn submit_interview_quiz(&self, answers: &[usize]) -> anyhow::Result<QuizResult> {
        let body = SubmitInterviewRequest {
            answers: answers.to_vec(),
        };
        self.post_json("submit-interview-quiz", &body).await
    }

    async fn reset(&self) -> anyhow::Result<()> {
        self.post_raw::<()>("reset", None).await?;
        Ok(())
    }
}

fn parse_base_url(raw: &str) -> anyhow::Result<Url> {
    let mut url = Url::parse(raw.trim()).with_context(|| format!("parse backend url: {raw}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("backend url must be http/https: {raw}");
    }
    // Url::join replaces the last path segment unless the base ends with '/'.
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

pub fn endpoint(base_url: &Url, path: &str) -> anyhow::Result<Url> {
    base_url
        .join(path.trim_start_matches('/'))
        .with_context(|| format!("join backend url {base_url} with {path}"))
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    let message = value.get("error")?.as_str()?.to_owned();
    Some(message)
}
