//! Conversation model and the relay that decides whether to answer locally
//! or forward to Gemini.

use crate::config::Config;
use crate::error::{Error, MISSING_MESSAGES, Result};
use crate::llm::GeminiClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

pub const OVERRIDE_MODEL: &str = "custom-response";
pub const OVERRIDE_REPLY: &str = "My name is Solvinger";
pub const NO_TEXT: &str = "No text generated";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

/// A conversation with at least one message: the earlier turns plus the
/// latest one.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    history: Vec<Message>,
    latest: Message,
}

impl ChatRequest {
    pub fn new(mut messages: Vec<Message>) -> Result<Self> {
        let Some(latest) = messages.pop() else {
            return Err(Error::validation(MISSING_MESSAGES));
        };
        Ok(Self {
            history: messages,
            latest,
        })
    }

    /// Validate an inbound JSON body of the form `{ "messages": [...] }`.
    pub fn from_json(body: &Value) -> Result<Self> {
        let items = body
            .get("messages")
            .and_then(Value::as_array)
            .filter(|items| !items.is_empty())
            .ok_or_else(|| Error::validation(MISSING_MESSAGES))?;

        let messages = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                Message::deserialize(item).map_err(|_| {
                    Error::validation(format!(
                        "messages[{i}] must have a role of \"user\" or \"model\" and a text string"
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(messages)
    }

    /// All turns in order, ending with [`Self::latest`].
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.history.iter().chain(std::iter::once(&self.latest))
    }

    pub fn latest(&self) -> &Message {
        &self.latest
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelReply {
    pub model: String,
    pub prompt_received: String,
    pub response: String,
}

/// Case-insensitive `"name"` containment. A narrow stand-in for intent
/// detection; nothing smarter is intended.
pub fn asks_for_name(text: &str) -> bool {
    text.to_lowercase().contains("name")
}

/// The instruction message followed by the caller's conversation.
pub fn augment<'a>(
    instruction: &str,
    messages: impl IntoIterator<Item = &'a Message>,
) -> Vec<Message> {
    let mut augmented = vec![Message {
        role: Role::User,
        text: instruction.to_string(),
    }];
    augmented.extend(messages.into_iter().cloned());
    augmented
}

pub struct ChatRelay {
    client: GeminiClient,
    instruction: String,
}

impl ChatRelay {
    pub fn new(client: GeminiClient, instruction: impl Into<String>) -> Self {
        Self {
            client,
            instruction: instruction.into(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = GeminiClient::from_config(&config.gemini)?;
        Ok(Self::new(client, config.relay.instruction.clone()))
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    pub async fn handle(&self, request: &ChatRequest) -> Result<ModelReply> {
        let latest = request.latest();

        if asks_for_name(&latest.text) {
            info!("answering name question locally");
            return Ok(ModelReply {
                model: OVERRIDE_MODEL.into(),
                prompt_received: latest.text.clone(),
                response: OVERRIDE_REPLY.into(),
            });
        }

        let conversation = augment(&self.instruction, request.messages());
        let generated = self.client.generate(&conversation).await?;
        let response = match generated.first_text() {
            Some(text) => text.to_string(),
            None => {
                debug!("upstream returned no text, using placeholder");
                NO_TEXT.to_string()
            }
        };

        Ok(ModelReply {
            model: self.client.model().to_string(),
            prompt_received: latest.text.clone(),
            response,
        })
    }
}
