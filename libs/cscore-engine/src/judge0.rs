/// Remote Judge Client - Judge0 Protocol
///
/// **Responsibility:**
/// Submit code to a Judge0-compatible server and classify the result.
///
/// **Protocol:**
/// - POST /submissions with `wait=false`, base64 payloads, returns a token
/// - GET /submissions/{token} until the status id leaves 1-2 or polls run out
/// - Status ids are interpreted only by `JudgeStatus::from_status_id`

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use cscore_common::config::{RemoteJudgeConfig, HOST_HEADER};
use cscore_common::types::Language;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::backend::{BackendKind, ExecutionBackend, RawRun};
use crate::fault::Fault;
use crate::verdict::{JudgeStatus, Verdict};

#[derive(Debug, Serialize)]
struct SubmissionRequest {
    source_code: String,
    language_id: u32,
    stdin: String,
    expected_output: &'static str,
}

#[derive(Debug, Deserialize)]
struct CreatedSubmission {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    id: i64,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmissionBody {
    status: Option<StatusBody>,
    #[serde(default)]
    stdout: Option<String>,
    #[serde(default)]
    stderr: Option<String>,
    #[serde(default)]
    compile_output: Option<String>,
    /// Judge0 sends this as a string ("0.012"), some forks as a number
    #[serde(default)]
    time: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct LanguageBody {
    name: String,
}

/// Judge0 CE language ids
pub fn language_id(language: Language) -> u32 {
    match language {
        Language::C => 50,
        Language::Cpp => 54,
        Language::Java => 62,
        Language::JavaScript => 63,
        Language::Python => 71,
        Language::Rust => 73,
    }
}

fn encode(text: &str) -> String {
    general_purpose::STANDARD.encode(text)
}

/// Decode a base64 field. Judge0 wraps its base64 output in newlines;
/// anything that fails to decode is passed through as-is.
fn decode(field: Option<&str>) -> String {
    let Some(raw) = field else {
        return String::new();
    };
    let compact: String = raw.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    match general_purpose::STANDARD.decode(compact.as_bytes()) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => raw.to_string(),
    }
}

fn time_to_ms(time: Option<&serde_json::Value>) -> u64 {
    let seconds = match time {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match seconds {
        Some(s) if s.is_finite() && s > 0.0 => (s * 1000.0).round() as u64,
        _ => 0,
    }
}

#[derive(Debug, Clone)]
pub struct RemoteJudgeClient {
    client: reqwest::Client,
    config: RemoteJudgeConfig,
}

impl RemoteJudgeClient {
    pub fn new(config: RemoteJudgeConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            let name = HeaderName::from_bytes(config.api_key_header.as_bytes())
                .context("Invalid API key header name")?;
            let value = HeaderValue::from_str(key).context("Invalid API key header value")?;
            headers.insert(name, value);
        }
        if let Some(host) = &config.host {
            let value = HeaderValue::from_str(host).context("Invalid host header value")?;
            headers.insert(HeaderName::from_static(HOST_HEADER), value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client for remote judge")?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &RemoteJudgeConfig {
        &self.config
    }

    async fn create_submission(
        &self,
        code: &str,
        language: Language,
        stdin: &str,
    ) -> Result<String, Fault> {
        let url = format!(
            "{}/submissions?base64_encoded=true&wait=false",
            self.config.base_url
        );
        let request = SubmissionRequest {
            source_code: encode(code),
            language_id: language_id(language),
            stdin: encode(stdin),
            expected_output: "",
        };

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Fault::SubmissionCreateFailed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let created: CreatedSubmission = response.json().await?;
        created
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Fault::SubmissionCreateFailed("response carried no token".to_string()))
    }

    /// Poll until a terminal status, at most `poll_attempts` times
    async fn poll_result(&self, token: &str) -> Result<SubmissionBody, Fault> {
        let url = format!(
            "{}/submissions/{}?base64_encoded=true",
            self.config.base_url, token
        );
        let attempts = self.config.poll_attempts;

        for attempt in 1..=attempts {
            let response = self.client.get(&url).send().await?;

            if response.status().is_success() {
                let body: SubmissionBody = response.json().await?;
                if let Some(status) = &body.status {
                    debug!(
                        token = token,
                        attempt = attempt,
                        status_id = status.id,
                        description = status.description.as_deref().unwrap_or(""),
                        "Polled submission"
                    );
                    if JudgeStatus::from_status_id(status.id).is_terminal() {
                        return Ok(body);
                    }
                }
            } else {
                warn!(
                    token = token,
                    attempt = attempt,
                    http_status = response.status().as_u16(),
                    "Unexpected poll response"
                );
            }

            if attempt < attempts {
                tokio::time::sleep(self.config.poll_interval).await;
            }
        }

        Err(Fault::PollTimeout { attempts })
    }

    fn into_raw_run(body: SubmissionBody) -> RawRun {
        let verdict = match body.status.map(|s| JudgeStatus::from_status_id(s.id)) {
            Some(JudgeStatus::Finished(verdict)) => verdict,
            _ => Verdict::Unknown,
        };

        RawRun {
            verdict,
            stdout: decode(body.stdout.as_deref()),
            stderr: decode(body.stderr.as_deref()),
            compile_output: decode(body.compile_output.as_deref()),
            execution_time_ms: time_to_ms(body.time.as_ref()),
        }
    }
}

#[async_trait]
impl ExecutionBackend for RemoteJudgeClient {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/about", self.config.base_url);
        match self
            .client
            .get(&url)
            .timeout(self.config.probe_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "Remote judge probe failed");
                false
            }
        }
    }

    #[instrument(skip(self, code, stdin), fields(language = %language))]
    async fn run(&self, code: &str, language: Language, stdin: &str) -> Result<RawRun, Fault> {
        let token = self.create_submission(code, language, stdin).await?;
        debug!(token = %token, "Submission created");

        let body = self.poll_result(&token).await?;
        let raw = Self::into_raw_run(body);
        debug!(token = %token, verdict = %raw.verdict, execution_ms = raw.execution_time_ms, "Submission finished");
        Ok(raw)
    }

    async fn supported_languages(&self) -> Vec<String> {
        let url = format!("{}/languages", self.config.base_url);
        let response = match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!(http_status = response.status().as_u16(), "Failed to list remote languages");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, "Failed to list remote languages");
                return Vec::new();
            }
        };

        match response.json::<Vec<LanguageBody>>().await {
            Ok(languages) => languages.into_iter().map(|l| l.name).collect(),
            Err(e) => {
                warn!(error = %e, "Malformed remote language list");
                Vec::new()
            }
        }
    }
}
