//! Judge client abstractions and provider implementations.
//!
//! The "judge" is the LLM capability used for planning, critique, scoring
//! and synthesis. Providers:
//! - **OpenAI**: any OpenAI-compatible chat-completions endpoint
//! - **Gemini**: Google Generative Language API

pub mod client;
pub mod gemini;
pub mod openai;

pub use client::{parse_structured, JudgeClient, JudgeProvider, ResponseFormat};
