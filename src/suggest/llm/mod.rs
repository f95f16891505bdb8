pub mod client;
pub mod models;
pub mod parse;
pub mod prompts;

pub use client::{CompletionClient, LlmResponse, OpenAiClient};
pub use models::{GenerationParams, Usage};
pub use parse::{decode_suggestion, DecodeOutcome};
