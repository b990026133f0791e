use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
}

/// One exchange unit in a conversation, in the shape every backend accepts.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A suggested fix to the user's sentence.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Correction {
    pub original: String,
    pub corrected: String,
    /// Empty when the model judged the sentence correct.
    #[serde(default)]
    pub explanation: String,
}

impl Correction {
    /// True when there is nothing worth showing: no explanation, or the
    /// "corrected" text is the original unchanged.
    pub fn is_noop(&self) -> bool {
        self.explanation.is_empty() || self.corrected == self.original
    }
}

/// Four 0–100 ratings of the user's last utterance.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    pub pronunciation: u8,
    pub fluency: u8,
    pub accuracy: u8,
    pub overall: u8,
}

impl Score {
    pub const MAX: u8 = 100;

    /// Neutral score used whenever the analysis output can't be trusted.
    pub const DEFAULT: Score = Score {
        pronunciation: 75,
        fluency: 75,
        accuracy: 80,
        overall: 77,
    };

    /// Returns the name of the first field above 100, if any.
    pub fn out_of_range_field(&self) -> Option<&'static str> {
        [
            ("pronunciation", self.pronunciation),
            ("fluency", self.fluency),
            ("accuracy", self.accuracy),
            ("overall", self.overall),
        ]
        .into_iter()
        .find(|(_, value)| *value > Self::MAX)
        .map(|(name, _)| name)
    }
}

impl Default for Score {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Self-assessment of one utterance. Built fresh per request, never stored.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct AnalysisResult {
    pub correction: Option<Correction>,
    pub score: Score,
}

impl AnalysisResult {
    /// The fallback used when the analysis call fails or its output is unusable.
    pub fn defaulted() -> Self {
        Self::default()
    }

    /// The correction, unless it is absent or a no-op.
    pub fn actionable_correction(&self) -> Option<&Correction> {
        self.correction.as_ref().filter(|c| !c.is_noop())
    }
}
