//! HTTP text service using OpenAI-compatible or Anthropic endpoints.
//!
//! One request per call. Retries, caching and timeouts beyond the HTTP
//! client's own are layered on by [`CachedTextService`](crate::CachedTextService).

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{Provider, TextServiceConfig};
use crate::error::TextServiceError;
use crate::service::{Extraction, LanguageGuess, TextService};

/// API-based text service implementation.
pub struct ApiTextService {
    client: Client,
    provider: Provider,
    base_url: String,
    model: String,
    api_key: SecretString,
}

impl ApiTextService {
    /// Create a new API text service.
    ///
    /// Fails when the provider is not an HTTP provider or no API key is set.
    pub fn new(config: &TextServiceConfig) -> Result<Self, TextServiceError> {
        if !config.provider.is_remote() {
            return Err(TextServiceError::Config(format!(
                "provider {:?} is not an HTTP provider",
                config.provider
            )));
        }
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.expose_secret().trim().is_empty())
            .ok_or_else(|| TextServiceError::Config("api_key is required".to_string()))?;
        let base_url = config
            .effective_base_url()
            .ok_or_else(|| TextServiceError::Config("base_url is required".to_string()))?;

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| TextServiceError::Config(e.to_string()))?;

        Ok(Self {
            client,
            provider: config.provider,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    async fn complete(&self, prompt: &str) -> Result<String, TextServiceError> {
        debug!(provider = ?self.provider, model = %self.model, "Calling text service");
        match self.provider {
            Provider::Anthropic => self.make_anthropic_request(prompt).await,
            _ => self.make_openai_request(prompt).await,
        }
    }

    /// Make OpenAI-compatible API request.
    async fn make_openai_request(&self, prompt: &str) -> Result<String, TextServiceError> {
        #[derive(Serialize)]
        struct OpenAIRequest<'a> {
            model: &'a str,
            messages: Vec<OpenAIMessage<'a>>,
            response_format: OpenAIResponseFormat,
        }

        #[derive(Serialize)]
        struct OpenAIMessage<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Serialize)]
        struct OpenAIResponseFormat {
            #[serde(rename = "type")]
            format_type: &'static str,
        }

        #[derive(Deserialize)]
        struct OpenAIResponse {
            choices: Vec<OpenAIChoice>,
        }

        #[derive(Deserialize)]
        struct OpenAIChoice {
            message: OpenAIMessageResponse,
        }

        #[derive(Deserialize)]
        struct OpenAIMessageResponse {
            content: String,
        }

        let request = OpenAIRequest {
            model: &self.model,
            messages: vec![OpenAIMessage {
                role: "user",
                content: prompt,
            }],
            response_format: OpenAIResponseFormat {
                format_type: "json_object",
            },
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&request)
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = check_status(response).await?;

        let body: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| TextServiceError::MalformedResponse(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| TextServiceError::MalformedResponse("No choices in response".to_string()))
    }

    /// Make Anthropic API request.
    async fn make_anthropic_request(&self, prompt: &str) -> Result<String, TextServiceError> {
        #[derive(Serialize)]
        struct AnthropicRequest<'a> {
            model: &'a str,
            max_tokens: u32,
            messages: Vec<AnthropicMessage<'a>>,
        }

        #[derive(Serialize)]
        struct AnthropicMessage<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Deserialize)]
        struct AnthropicResponse {
            content: Vec<AnthropicContent>,
        }

        #[derive(Deserialize)]
        struct AnthropicContent {
            text: String,
        }

        let request = AnthropicRequest {
            model: &self.model,
            max_tokens: 512,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = check_status(response).await?;

        let body: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| TextServiceError::MalformedResponse(e.to_string()))?;

        body.content
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| TextServiceError::MalformedResponse("No content in response".to_string()))
    }
}

fn map_transport_error(e: reqwest::Error) -> TextServiceError {
    if e.is_timeout() {
        TextServiceError::Timeout
    } else {
        TextServiceError::Api(e.to_string())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, TextServiceError> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(TextServiceError::RateLimited);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(TextServiceError::Http {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

fn language_prompt(text: &str) -> String {
    format!(
        r#"Identify the language of the text below.

TEXT:
{text}

Respond in JSON format:
{{"language": "ISO 639-1 code", "confidence": 0.0}}"#
    )
}

fn label_prompt(candidates: &[String]) -> String {
    let listed = candidates
        .iter()
        .map(|c| format!("- {c}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        r#"These excerpts belong to one topic cluster. Name the topic.

EXCERPTS:
{listed}

Respond in JSON format:
{{"label": "Topic label (2-6 words)"}}"#
    )
}

fn extraction_prompt(text: &str, language: Option<&str>) -> String {
    let language = language.unwrap_or("unknown");
    format!(
        r#"Extract named entities and topical keywords from the text below (language: {language}).

TEXT:
{text}

Respond in JSON format:
{{"entities": ["Entity"], "keywords": ["keyword"]}}

Guidelines:
- Entities are people, organizations, places and products
- 3-10 keywords, lower-case"#
    )
}

/// Extract a JSON object from model output (handles code fences and prose).
fn extract_json(text: &str) -> &str {
    if let Some(start) = text.find("```json") {
        if let Some(end) = text[start + 7..].find("```") {
            return text[start + 7..start + 7 + end].trim();
        }
    }
    if let Some(start) = text.find("```") {
        if let Some(end) = text[start + 3..].find("```") {
            return text[start + 3..start + 3 + end].trim();
        }
    }
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            return &text[start..=end];
        }
    }
    text
}

fn parse<T: for<'de> Deserialize<'de>>(response: &str) -> Result<T, TextServiceError> {
    serde_json::from_str(extract_json(response))
        .map_err(|e| TextServiceError::MalformedResponse(format!("invalid JSON: {e}")))
}

pub(crate) fn parse_language(response: &str) -> Result<LanguageGuess, TextServiceError> {
    #[derive(Deserialize)]
    struct Raw {
        language: String,
        confidence: f32,
    }

    let raw: Raw = parse(response)?;
    let code = raw.language.trim().to_lowercase();
    if code.is_empty() {
        return Err(TextServiceError::MalformedResponse(
            "empty language code".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&raw.confidence) {
        return Err(TextServiceError::MalformedResponse(format!(
            "confidence {} outside [0, 1]",
            raw.confidence
        )));
    }
    Ok(LanguageGuess {
        code,
        confidence: raw.confidence,
    })
}

pub(crate) fn parse_label(response: &str) -> Result<String, TextServiceError> {
    #[derive(Deserialize)]
    struct Raw {
        label: String,
    }

    let raw: Raw = parse(response)?;
    let label = raw.label.split_whitespace().collect::<Vec<_>>().join(" ");
    if label.is_empty() {
        return Err(TextServiceError::MalformedResponse("empty label".to_string()));
    }
    Ok(label)
}

pub(crate) fn parse_extraction(response: &str) -> Result<Extraction, TextServiceError> {
    #[derive(Deserialize)]
    struct Raw {
        #[serde(default)]
        entities: Vec<String>,
        #[serde(default)]
        keywords: Vec<String>,
    }

    let raw: Raw = parse(response)?;
    Ok(Extraction {
        entities: raw
            .entities
            .into_iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect(),
        keywords: raw
            .keywords
            .into_iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect(),
    })
}

#[async_trait]
impl TextService for ApiTextService {
    async fn detect_language(&self, text: &str) -> Result<LanguageGuess, TextServiceError> {
        let response = self.complete(&language_prompt(text)).await?;
        parse_language(&response)
    }

    async fn synthesize_label(&self, candidates: &[String]) -> Result<String, TextServiceError> {
        if candidates.is_empty() {
            return Err(TextServiceError::Config(
                "no candidate strings to label".to_string(),
            ));
        }
        let response = self.complete(&label_prompt(candidates)).await?;
        parse_label(&response)
    }

    async fn extract_entities(
        &self,
        text: &str,
        language: Option<&str>,
    ) -> Result<Extraction, TextServiceError> {
        let response = self.complete(&extraction_prompt(text, language)).await?;
        parse_extraction(&response)
    }
}
