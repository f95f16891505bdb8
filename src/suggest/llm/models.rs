use crate::config::EndpointConfig;
use serde::Deserialize;

/// Sampling settings sent with every suggestion request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::from_config(&EndpointConfig::default())
    }
}

impl GenerationParams {
    pub fn from_config(endpoint: &EndpointConfig) -> Self {
        Self {
            model: endpoint.model.clone(),
            temperature: endpoint.temperature,
            max_tokens: endpoint.max_tokens,
        }
    }
}

/// Token usage as reported by the endpoint
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}
