use crate::config::GeminiConfig;
use crate::error::{Error, Result, UPSTREAM_FALLBACK};
use crate::http::HttpClient;
use crate::relay::{Message, Role};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub struct GeminiClient {
    api_key: Option<String>,
    model: String,
    base_url: String,
    http: HttpClient,
}

// -- generateContent request --

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: Role,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

// -- generateContent response --
// Every level is optional, including null array entries: the provider drops
// `candidates` on safety blocks and `parts` on empty finishes.

#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    candidates: Option<Vec<Option<Candidate>>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Option<Vec<Option<CandidatePart>>>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    /// Text of the first candidate's first part, if every level is present
    /// and the text is non-empty.
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .as_ref()?
            .first()?
            .as_ref()?
            .content
            .as_ref()?
            .parts
            .as_ref()?
            .first()?
            .as_ref()?
            .text
            .as_deref()
            .filter(|t| !t.is_empty())
    }
}

/// Parse a successful generateContent body.
pub fn parse_generate_response(body: &str) -> Result<GenerateResponse> {
    serde_json::from_str(body).map_err(|e| {
        warn!("unparseable generateContent response: {e}");
        Error::upstream(UPSTREAM_FALLBACK)
    })
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, model: String, base_url: String, http: HttpClient) -> Self {
        Self {
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    /// Build from config, reading the API key from the configured env var.
    pub fn from_config(config: &GeminiConfig) -> Result<Self> {
        let http = HttpClient::new("solvinger-relay/0.1.0", config.timeout())?;
        Ok(Self::new(
            config.resolve_api_key(),
            config.model.clone(),
            config.base_url.clone(),
            http,
        ))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// Send the conversation in order and return the parsed response.
    pub async fn generate(&self, messages: &[Message]) -> Result<GenerateResponse> {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("no Gemini API key configured");
            return Err(Error::upstream("Gemini API key is not configured"));
        };

        let request = GenerateRequest {
            contents: messages
                .iter()
                .map(|m| Content {
                    role: m.role,
                    parts: [Part { text: &m.text }],
                })
                .collect(),
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| Error::upstream(format!("serialize request: {e}")))?;

        debug!(model = %self.model, turns = messages.len(), "sending generateContent request");
        let response_text = self
            .http
            .post_json_raw(&self.endpoint(), &body, &[("x-goog-api-key", api_key)])
            .await
            .map_err(|e| {
                warn!("Gemini API error: {e}");
                e
            })?;

        parse_generate_response(&response_text)
    }
}
