pub mod chat_completions;

pub use chat_completions::{ChatCompletionsProvider, FALLBACK_REPLY};
