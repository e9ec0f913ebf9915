//! Concrete [`LlmProvider`](super::provider::LlmProvider) implementations.

pub mod openai;

pub use openai::OpenAiCompatProvider;
