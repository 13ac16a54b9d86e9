use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use super::parse::parse_response;
use super::{StructuredArticle, StructuringClient, StructuringError, StructuringRequest};

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(45);
const MAX_INPUT_CHARS: usize = 12_000;

const SYSTEM_PROMPT: &str = "You turn news article text into structured JSON. \
Reply with a single JSON object and nothing else. Keys: title (string, no publisher suffix), \
excerpt (1-2 sentences), content (the article as HTML paragraphs, facts unchanged), \
slug (lowercase, hyphen-separated), seoTitle (<= 60 chars), seoDescription (<= 160 chars), \
tags (array of up to 8 lowercase topics), location (city or region, or null).";

/// Where and how to reach a chat-completions style endpoint.
#[derive(Debug, Clone)]
pub struct StructuringSettings {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl StructuringSettings {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct HttpStructuringClient {
    http: Client,
    settings: StructuringSettings,
}

impl HttpStructuringClient {
    pub fn new(settings: StructuringSettings) -> Result<Self, StructuringError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(settings.timeout)
            .build()
            .map_err(|e| StructuringError::Transport(e.to_string()))?;
        Ok(Self { http, settings })
    }

    fn user_prompt(request: &StructuringRequest) -> String {
        let text: String = request.text.chars().take(MAX_INPUT_CHARS).collect();
        let mut prompt = format!("Source: {}\n", request.source_url);
        if let Some(label) = &request.source_label {
            prompt.push_str(&format!("Publisher: {label}\n"));
        }
        if let Some(published) = request.published_at {
            prompt.push_str(&format!("Published: {}\n", published.to_rfc3339()));
        }
        prompt.push_str(&format!(
            "Fields: {}\nHeadline: {}\n\n{}",
            request.fields.join(", "),
            request.title,
            text
        ));
        prompt
    }
}

#[async_trait]
impl StructuringClient for HttpStructuringClient {
    #[instrument(skip_all, fields(url = %request.source_url, model = %self.settings.model))]
    async fn structure(&self, request: &StructuringRequest) -> Result<StructuredArticle, StructuringError> {
        if self.settings.api_key.is_empty() {
            return Err(StructuringError::Disabled);
        }

        let body = CompletionRequest {
            model: &self.settings.model,
            messages: vec![
                Message {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                Message {
                    role: "user",
                    content: Self::user_prompt(request),
                },
            ],
            temperature: 0.2,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .http
            .post(&self.settings.api_url)
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StructuringError::Timeout
                } else {
                    StructuringError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(StructuringError::Http(status.as_u16()));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| StructuringError::Malformed(e.to_string()))?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| StructuringError::Malformed("no choices".into()))?;

        debug!(chars = content.len(), "completion received");
        parse_response(&content, request)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
