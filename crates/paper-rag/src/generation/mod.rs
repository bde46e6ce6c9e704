//! Answer generation with Ollama

mod ollama;
mod prompt;
mod qa;

pub use ollama::OllamaClient;
pub use prompt::{PromptBuilder, NO_ANSWER};
pub use qa::QuestionAnswerer;
