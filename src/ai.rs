use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

// --- Provider trait ---

pub trait Llm {
    fn chat(&self, system: Option<&str>, prompt: &str) -> Result<String>;
    fn model_name(&self) -> &str;

    fn complete(&self, prompt: &str) -> Result<String> {
        self.chat(None, prompt)
    }
}

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const MAX_TOKENS: u32 = 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderKind {
    OpenAI,
    Anthropic,
    Draft,
}

#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub provider: ProviderKind,
    pub model_id: String,
    pub short_name: String,
}

pub fn resolve_model(name: &str) -> Result<ModelSpec> {
    let (provider, model_id, short_name) = match name {
        // OpenAI (requires OPENAI_API_KEY)
        "gpt-4o-mini" | "mini" => (ProviderKind::OpenAI, "gpt-4o-mini", "gpt-4o-mini"),
        "gpt-4o" => (ProviderKind::OpenAI, "gpt-4o", "gpt-4o"),
        "gpt-4.1" => (ProviderKind::OpenAI, "gpt-4.1", "gpt-4.1"),
        // Anthropic (requires ANTHROPIC_API_KEY)
        "api-sonnet" | "claude-sonnet" => {
            (ProviderKind::Anthropic, "claude-sonnet-4-5-20250929", "api-sonnet")
        }
        "api-haiku" | "claude-haiku" => {
            (ProviderKind::Anthropic, "claude-haiku-4-5-20251001", "api-haiku")
        }
        // Offline, no key needed
        "draft" | "local" => (ProviderKind::Draft, "draft", "draft"),
        _ => {
            return Err(anyhow!(
                "Unknown model '{}'. Available: gpt-4o-mini (default), gpt-4o, gpt-4.1, \
                 api-sonnet, api-haiku, draft",
                name
            ))
        }
    };
    Ok(ModelSpec {
        provider,
        model_id: model_id.to_string(),
        short_name: short_name.to_string(),
    })
}

pub fn create_provider(spec: &ModelSpec, client: reqwest::blocking::Client) -> Result<Box<dyn Llm>> {
    match spec.provider {
        ProviderKind::OpenAI => Ok(Box::new(OpenAIProvider::new(spec.model_id.clone(), client)?)),
        ProviderKind::Anthropic => Ok(Box::new(AnthropicProvider::new(spec.model_id.clone(), client)?)),
        ProviderKind::Draft => Ok(Box::new(DraftProvider)),
    }
}

// --- Anthropic provider ---

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug)]
pub struct AnthropicProvider {
    api_key: String,
    model_id: String,
    client: reqwest::blocking::Client,
}

impl AnthropicProvider {
    pub fn new(model_id: String, client: reqwest::blocking::Client) -> Result<Self> {
        let api_key = env::var("ANTHROPIC_API_KEY")
            .context("ANTHROPIC_API_KEY environment variable not set. Set it with: export ANTHROPIC_API_KEY=your-key-here")?;
        Ok(Self { api_key, model_id, client })
    }
}

impl Llm for AnthropicProvider {
    fn chat(&self, system: Option<&str>, prompt: &str) -> Result<String> {
        let request = AnthropicRequest {
            model: self.model_id.clone(),
            max_tokens: MAX_TOKENS,
            system: system.map(str::to_string),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .context("Failed to send request to Anthropic API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(anyhow!(
                "Anthropic API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let api_response: AnthropicResponse = response
            .json()
            .context("Failed to parse Anthropic API response")?;

        api_response
            .content
            .first()
            .map(|block| block.text.clone())
            .ok_or_else(|| anyhow!("No content in Anthropic API response"))
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- OpenAI provider ---

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug)]
pub struct OpenAIProvider {
    api_key: String,
    model_id: String,
    client: reqwest::blocking::Client,
}

impl OpenAIProvider {
    pub fn new(model_id: String, client: reqwest::blocking::Client) -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY environment variable not set. Set it with: export OPENAI_API_KEY=your-key-here")?;
        Ok(Self { api_key, model_id, client })
    }
}

fn openai_messages(system: Option<&str>, prompt: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: system.to_string(),
        });
    }
    messages.push(ChatMessage {
        role: "user".to_string(),
        content: prompt.to_string(),
    });
    messages
}

impl Llm for OpenAIProvider {
    fn chat(&self, system: Option<&str>, prompt: &str) -> Result<String> {
        let request = OpenAIRequest {
            model: self.model_id.clone(),
            max_tokens: MAX_TOKENS,
            messages: openai_messages(system, prompt),
        };

        let response = self
            .client
            .post(OPENAI_API_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .context("Failed to send request to OpenAI API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(anyhow!(
                "OpenAI API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let api_response: OpenAIResponse = response
            .json()
            .context("Failed to parse OpenAI API response")?;

        api_response
            .choices
            .first()
            .map(|choice| choice.message.content.clone().unwrap_or_default())
            .ok_or_else(|| anyhow!("No choices in OpenAI API response"))
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- Draft provider (offline echo) ---

const DRAFT_ECHO_CHARS: usize = 4000;

/// Echoes the prompt back so materials can be produced without network access.
#[derive(Debug, Default)]
pub struct DraftProvider;

impl Llm for DraftProvider {
    fn chat(&self, _system: Option<&str>, prompt: &str) -> Result<String> {
        let head: String = prompt.chars().take(DRAFT_ECHO_CHARS).collect();
        Ok(format!("[DRAFT]\n{}", head))
    }

    fn model_name(&self) -> &str {
        "draft"
    }
}
