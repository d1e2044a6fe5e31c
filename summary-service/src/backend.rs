use std::path::Path;

use anyhow::Context as _;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::Client;
use serde_json::{Value, json};
use summary_flow::{
    BackendError, GenerationBackend, GenerationRequest, GenerationResult, GenerationStrategy,
    StopCondition, profile::Sampling,
};
use tracing::{debug, info};

use crate::config::ServiceConfig;

/// Chat-completions client for OpenRouter or any OpenAI-compatible endpoint.
pub struct OpenRouterBackend {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    strategy: GenerationStrategy,
}

impl OpenRouterBackend {
    pub fn new(config: &ServiceConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build HTTP client")?;

        let strategy = config.profile.strategy;
        info!(
            model = %config.model,
            profile = %strategy.profile,
            quantization = ?strategy.quantization,
            precision = ?strategy.precision,
            device = ?strategy.device,
            max_new_tokens = strategy.max_new_tokens,
            "Generation backend configured"
        );

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            strategy,
        })
    }

    fn build_payload(&self, request: &GenerationRequest, image_url: Option<String>) -> Value {
        let content = match image_url {
            Some(url) => json!([
                { "type": "text", "text": request.prompt },
                { "type": "image_url", "image_url": { "url": url } }
            ]),
            None => json!(request.prompt),
        };

        let mut payload = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "user",
                    "content": content
                }
            ],
            "max_tokens": request.max_output_tokens
        });

        match self.strategy.sampling {
            Sampling::Greedy => {
                payload["temperature"] = json!(0.0);
            }
            Sampling::Nucleus { temperature, top_p } => {
                payload["temperature"] = json!(temperature);
                payload["top_p"] = json!(top_p);
            }
        }

        if let StopCondition::Sequences(sequences) = &request.stop {
            payload["stop"] = json!(sequences);
        }

        payload
    }
}

#[async_trait]
impl GenerationBackend for OpenRouterBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, BackendError> {
        let image_url = match &request.image {
            Some(path) => Some(encode_image(path).await?),
            None => None,
        };
        let payload = self.build_payload(request, image_url);

        let mut call = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&payload);
        if let Some(api_key) = &self.api_key {
            call = call.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = call
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Unavailable(format!(
                "LLM API request failed: {} {}",
                status,
                body.trim()
            )));
        }

        let response_json: Value = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        let result = parse_completion(&response_json)?;
        debug!(
            chars = result.raw_text.len(),
            truncated = result.truncated,
            "Completion received"
        );
        Ok(result)
    }
}

/// Decode a chat-completions body. `finish_reason == "length"` marks truncation.
pub fn parse_completion(response_json: &Value) -> Result<GenerationResult, BackendError> {
    if let Some(error) = response_json.get("error") {
        let message = error["message"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(BackendError::Unavailable(message));
    }

    let choice = &response_json["choices"][0];
    let content = choice["message"]["content"]
        .as_str()
        .ok_or_else(|| BackendError::InvalidResponse("Invalid response format from LLM".into()))?;

    Ok(GenerationResult {
        raw_text: content.to_string(),
        truncated: choice["finish_reason"].as_str() == Some("length"),
    })
}

async fn encode_image(path: &Path) -> Result<String, BackendError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| BackendError::ImageUnreadable {
            path: path.to_path_buf(),
            source,
        })?;

    let mime = match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/png",
    };

    Ok(format!("data:{};base64,{}", mime, STANDARD.encode(bytes)))
}
