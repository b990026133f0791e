//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::core::gateway::{Gateway, GatewaySettings};
use crate::inference::{
    CompletionProvider, CompletionRequest, ConversationTurn, ProviderError,
};

/// What the scripted provider answers with for one call.
#[derive(Debug)]
pub enum ScriptedReply {
    Text(String),
    Error(ProviderError),
}

/// A completion call as the provider saw it.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub turns: Vec<ConversationTurn>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

enum Script {
    /// Answers in call order.
    Queue(VecDeque<ScriptedReply>),
    /// Answers by call kind, so ordering doesn't matter.
    Routed {
        reply: Option<ScriptedReply>,
        analysis: Option<ScriptedReply>,
    },
}

/// An in-memory provider that plays back scripted answers and records calls.
pub struct ScriptedProvider {
    script: Mutex<Script>,
    calls: Mutex<Vec<RecordedCall>>,
    analysis_delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            script: Mutex::new(Script::Queue(replies.into())),
            calls: Mutex::new(Vec::new()),
            analysis_delay: None,
        }
    }

    /// Answers the reply call and the analysis call independently of their order.
    pub fn routed(reply: ScriptedReply, analysis: ScriptedReply) -> Self {
        Self {
            script: Mutex::new(Script::Routed {
                reply: Some(reply),
                analysis: Some(analysis),
            }),
            calls: Mutex::new(Vec::new()),
            analysis_delay: None,
        }
    }

    /// Makes the analysis call sleep before answering.
    pub fn with_analysis_delay(mut self, delay: Duration) -> Self {
        self.analysis_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn next_answer(&self, turns: &[ConversationTurn]) -> Option<ScriptedReply> {
        let mut script = self.script.lock().unwrap();
        match &mut *script {
            Script::Queue(queue) => queue.pop_front(),
            Script::Routed { reply, analysis } => {
                if is_analysis(turns) { analysis.take() } else { reply.take() }
            }
        }
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "test-model"
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, ProviderError> {
        self.calls.lock().unwrap().push(RecordedCall {
            turns: request.turns.to_vec(),
            model: request.model.to_string(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        });

        if let Some(delay) = self.analysis_delay
            && is_analysis(request.turns)
        {
            tokio::time::sleep(delay).await;
        }

        match self.next_answer(request.turns) {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Error(e)) => Err(e),
            None => Err(ProviderError::Network("script exhausted".to_string())),
        }
    }
}

fn is_analysis(turns: &[ConversationTurn]) -> bool {
    turns
        .first()
        .is_some_and(|t| t.content.starts_with("You are an expert British English teacher"))
}

/// Creates a Gateway over a ScriptedProvider with default settings.
pub fn scripted_gateway(replies: Vec<ScriptedReply>) -> (Arc<ScriptedProvider>, Gateway) {
    let provider = Arc::new(ScriptedProvider::new(replies));
    let gateway = Gateway::new(provider.clone(), GatewaySettings::default());
    (provider, gateway)
}
