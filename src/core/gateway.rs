//! # Conversation Gateway
//!
//! One `converse` call makes two completion calls against the active provider:
//!
//! ```text
//! Idle → CallingReply → CallingAnalysis → ExtractingJSON ─┬─ Validated ───────────────┬→ Returned
//!                                                          └─ DefaultedOnParseFailure ─┘
//! ```
//!
//! Only a failure of the reply call reaches the caller. The analysis call and
//! its parsing are best-effort: any failure there yields the default score.
//! Nothing is retried.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::core::analysis::{analysis_turns, analyze_or_default};
use crate::inference::{
    AnalysisResult, CompletionProvider, CompletionRequest, ConversationTurn, Correction,
    ProviderError, Score,
};

const REPLY_DIRECTIVE: &str = "Important instructions:
1. Always respond in British English with appropriate accent characteristics
2. Keep responses SHORT and natural (1-2 sentences maximum)
3. If the user's English is correct, simply praise them briefly (e.g., \"Brilliant!\" or \"Well said!\") - NO explanations
4. Only provide corrections or suggestions when there are actual mistakes
5. Be encouraging and friendly
6. Use appropriate British expressions and vocabulary
7. Respond quickly and concisely";

/// Sampling parameters for one kind of call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl GenerationSettings {
    /// Conversational reply: natural phrasing, one or two sentences.
    pub const REPLY: GenerationSettings = GenerationSettings {
        temperature: 0.7,
        max_tokens: 150,
    };

    /// Analysis: consistent scoring, room for the JSON object.
    pub const ANALYSIS: GenerationSettings = GenerationSettings {
        temperature: 0.3,
        max_tokens: 200,
    };
}

/// Gateway knobs resolved from configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GatewaySettings {
    pub reply: GenerationSettings,
    pub analysis: GenerationSettings,
    /// Run the analysis call alongside the reply call instead of after it.
    pub concurrent_analysis: bool,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            reply: GenerationSettings::REPLY,
            analysis: GenerationSettings::ANALYSIS,
            concurrent_analysis: false,
        }
    }
}

/// What a successful `converse` hands back.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationOutcome {
    pub reply: String,
    pub correction: Option<Correction>,
    pub score: Score,
}

impl ConversationOutcome {
    fn new(reply: String, analysis: AnalysisResult) -> Self {
        Self {
            reply,
            correction: analysis.correction,
            score: analysis.score,
        }
    }
}

pub struct Gateway {
    provider: Arc<dyn CompletionProvider>,
    settings: GatewaySettings,
}

impl Gateway {
    pub fn new(provider: Arc<dyn CompletionProvider>, settings: GatewaySettings) -> Self {
        Self { provider, settings }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Replies to the conversation and assesses the user's last utterance.
    ///
    /// Fails only when the reply call fails. Analysis problems are logged and
    /// replaced by [`AnalysisResult::defaulted`].
    pub async fn converse(
        &self,
        history: &[ConversationTurn],
        persona_prompt: &str,
        last_user_utterance: &str,
    ) -> Result<ConversationOutcome, ProviderError> {
        let turns = conversation_turns(history, persona_prompt);

        if self.settings.concurrent_analysis {
            debug!("Issuing reply and analysis calls concurrently");
            // A failed reply drops the in-flight analysis.
            let (reply, analysis) = tokio::try_join!(self.reply(&turns), async {
                Ok::<_, ProviderError>(self.analyze(last_user_utterance).await)
            })?;
            return Ok(ConversationOutcome::new(reply, analysis));
        }

        let reply = self.reply(&turns).await?;
        let analysis = self.analyze(last_user_utterance).await;
        Ok(ConversationOutcome::new(reply, analysis))
    }

    async fn reply(&self, turns: &[ConversationTurn]) -> Result<String, ProviderError> {
        debug!("CallingReply: {} turns", turns.len());
        let request = CompletionRequest {
            turns,
            model: self.provider.model(),
            temperature: self.settings.reply.temperature,
            max_tokens: self.settings.reply.max_tokens,
        };
        let reply = self.provider.complete(request).await?;
        info!("Reply received ({} chars)", reply.len());
        Ok(reply)
    }

    async fn analyze(&self, utterance: &str) -> AnalysisResult {
        debug!("CallingAnalysis");
        let turns = analysis_turns(utterance);
        let request = CompletionRequest {
            turns: &turns,
            model: self.provider.model(),
            temperature: self.settings.analysis.temperature,
            max_tokens: self.settings.analysis.max_tokens,
        };

        match self.provider.complete(request).await {
            Ok(raw) => {
                debug!("ExtractingJSON from {} chars", raw.len());
                analyze_or_default(&raw)
            }
            Err(e) => {
                warn!("Analysis call failed, using default score: {}", e);
                AnalysisResult::defaulted()
            }
        }
    }
}

/// Prepends the persona's system turn to the caller's history.
pub fn conversation_turns(history: &[ConversationTurn], persona_prompt: &str) -> Vec<ConversationTurn> {
    let mut turns = Vec::with_capacity(history.len() + 1);
    turns.push(ConversationTurn::system(system_prompt(persona_prompt)));
    turns.extend_from_slice(history);
    turns
}

fn system_prompt(persona_prompt: &str) -> String {
    format!("{persona_prompt}\n\n{REPLY_DIRECTIVE}")
}
