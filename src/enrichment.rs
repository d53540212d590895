//! Best-effort task enrichment through a text-generation backend.
//!
//! Enrichment never fails the caller: every problem (transport error, timeout,
//! non-success status, unexpected response shape, empty answer) is logged and
//! turned into `None`.

use crate::config::EnrichmentConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Label placed between the original name and the generated answer.
pub const ENRICHMENT_LABEL: &str = "AI solution";

/// Produces an optional note for a task text.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, text: &str) -> Option<String>;
}

/// Enricher used when no backend is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEnricher;

#[async_trait]
impl Enricher for NoopEnricher {
    async fn enrich(&self, _text: &str) -> Option<String> {
        None
    }
}

/// Rewrite a name with an enrichment result, or keep it unchanged.
pub fn apply_enrichment(name: &str, result: Option<&str>) -> String {
    match result {
        Some(answer) if !answer.is_empty() => {
            format!("{} {}: {}", name, ENRICHMENT_LABEL, answer)
        }
        _ => name.to_string(),
    }
}

/// Build the instruction prompt for a task text.
pub fn build_prompt(task_text: &str) -> String {
    format!(
        "You are a task-completion assistant. Give a brief, practical plan for solving \
         the task and list 3-7 concrete steps. Add tips if they help.\n\n\
         Task text:\n{}",
        task_text
    )
}

/// Request body for the responses endpoint.
#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: String,
}

/// Expected response shape. Everything is optional so that a mismatch is a
/// `None` at extraction time rather than a decode error.
#[derive(Debug, Default, Deserialize)]
struct ResponsesReply {
    #[serde(default)]
    output: Option<Vec<OutputItem>>,
}

#[derive(Debug, Default, Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Option<Vec<ContentItem>>,
}

#[derive(Debug, Default, Deserialize)]
struct ContentItem {
    #[serde(default)]
    text: Option<String>,
}

/// Index of the output item holding the answer; the first one carries reasoning.
const ANSWER_OUTPUT_INDEX: usize = 1;

impl ResponsesReply {
    /// `output[1].content[0].text`, if present and non-empty.
    fn answer(&self) -> Option<&str> {
        self.output
            .as_ref()?
            .get(ANSWER_OUTPUT_INDEX)?
            .content
            .as_ref()?
            .first()?
            .text
            .as_deref()
            .filter(|text| !text.is_empty())
    }
}

/// Extract the answer text from a raw response body.
pub fn extract_answer(body: &str) -> Option<String> {
    let reply: ResponsesReply = match serde_json::from_str(body) {
        Ok(reply) => reply,
        Err(e) => {
            warn!("Unexpected enrichment response format: {}", e);
            return None;
        }
    };
    let answer = reply.answer().map(str::to_string);
    if answer.is_none() {
        warn!("Enrichment response has no answer text");
    }
    answer
}

/// `Enricher` backed by the Cloudflare Workers AI responses endpoint.
pub struct WorkersAiEnricher {
    client: Client,
    url: String,
    auth_token: String,
    model: String,
}

impl WorkersAiEnricher {
    /// Build from configuration. Returns `Ok(None)` when enrichment is inactive.
    pub fn from_config(config: &EnrichmentConfig) -> anyhow::Result<Option<Self>> {
        if !config.is_active() {
            return Ok(None);
        }
        let (Some(account_id), Some(auth_token)) = (&config.account_id, &config.auth_token) else {
            return Ok(None);
        };
        let client = Client::builder().timeout(config.timeout()).build()?;
        let url = format!(
            "{}/accounts/{}/ai/v1/responses",
            config.api_url.trim_end_matches('/'),
            account_id
        );

        Ok(Some(Self {
            client,
            url,
            auth_token: auth_token.clone(),
            model: config.model.clone(),
        }))
    }
}

#[async_trait]
impl Enricher for WorkersAiEnricher {
    async fn enrich(&self, text: &str) -> Option<String> {
        let request = ResponsesRequest {
            model: &self.model,
            input: build_prompt(text),
        };
        debug!("Sending enrichment request for task: {}", text);

        let response = match self
            .client
            .post(&self.url)
            .bearer_auth(&self.auth_token)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                error!("Enrichment request timed out: {}", e);
                return None;
            }
            Err(e) => {
                error!("Enrichment request failed: {}", e);
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            error!("Enrichment backend returned HTTP {}", status.as_u16());
            return None;
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                error!("Failed to read enrichment response: {}", e);
                return None;
            }
        };

        let answer = extract_answer(&body);
        if answer.is_some() {
            info!("Enrichment answer received");
        }
        answer
    }
}
