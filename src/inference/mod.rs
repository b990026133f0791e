pub mod provider;
pub mod providers;
pub mod resolver;
pub mod types;

pub use provider::{CompletionProvider, CompletionRequest, ProviderError};
pub use providers::{ChatCompletionsProvider, FALLBACK_REPLY};
pub use resolver::{Dialect, ProviderConfig, ProviderId, ProviderOverrides};
pub use types::{AnalysisResult, ConversationTurn, Correction, Role, Score};
