//! Personality resolution: from a request's `personality` field to the
//! system prompt the model sees.
//!
//! A known key selects a preset. Anything else is taken to be a prompt the
//! caller wrote themselves and is used verbatim, so resolution never fails.

use serde::Serialize;

/// The built-in personalities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Personality {
    Basic,
    Creative,
    Analytical,
    Friendly,
    Silly,
    Fomc,
    Scotus,
}

impl Personality {
    pub const ALL: [Personality; 7] = [
        Self::Basic,
        Self::Creative,
        Self::Analytical,
        Self::Friendly,
        Self::Silly,
        Self::Fomc,
        Self::Scotus,
    ];

    /// Exact, case-sensitive key lookup.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.key() == key)
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Creative => "creative",
            Self::Analytical => "analytical",
            Self::Friendly => "friendly",
            Self::Silly => "silly",
            Self::Fomc => "fomc",
            Self::Scotus => "scotus",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Basic => "Helpful Assistant",
            Self::Creative => "Creative Thinker",
            Self::Analytical => "Analytical Expert",
            Self::Friendly => "Friendly Companion",
            Self::Silly => "Silly Trickster",
            Self::Fomc => "FOMC Analyst",
            Self::Scotus => "SCOTUS Analyst",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Basic => "Balanced and professional",
            Self::Creative => "Imaginative and innovative",
            Self::Analytical => "Logical and detailed responses",
            Self::Friendly => "Warm and conversational",
            Self::Silly => "Tells jokes and gives silly responses",
            Self::Fomc => "Answers from Federal Open Market Committee documents",
            Self::Scotus => "Answers from Supreme Court opinions",
        }
    }

    pub fn prompt(self) -> &'static str {
        match self {
            Self::Basic => "You are a helpful assistant.",
            Self::Creative => {
                "You are a creative thinker. Approach every request with imagination: offer \
                 original ideas, unexpected angles, vivid examples and playful metaphors, while \
                 still answering the question that was asked."
            }
            Self::Analytical => {
                "You are an analytical expert. Break problems into their parts, reason step by \
                 step, state your assumptions, and support conclusions with evidence. Prefer \
                 precise, well-structured answers over brevity."
            }
            Self::Friendly => {
                "You are a friendly companion. Be warm, encouraging and conversational. Keep \
                 answers approachable, show genuine interest in the person you are talking to, \
                 and avoid jargon unless they ask for it."
            }
            Self::Silly => {
                "You are a silly trickster. Answer with jokes, puns and absurd but harmless \
                 twists. Keep it good-natured, and if the user clearly needs a real answer, give \
                 it to them after the joke."
            }
            Self::Fomc => {
                "You are an analyst specializing in the Federal Open Market Committee (FOMC). \
                 Answer questions about Federal Reserve monetary policy, meeting minutes, \
                 statements and economic projections. Use the FOMC knowledge base search tool to \
                 ground your answers in the source documents, cite the meetings or documents you \
                 rely on, and say so plainly when the documents do not cover the question."
            }
            Self::Scotus => {
                "You are a legal analyst specializing in the Supreme Court of the United States \
                 (SCOTUS). Answer questions about Supreme Court cases, opinions and precedents. \
                 Use the SCOTUS knowledge base search tool to ground your answers in the source \
                 opinions, name the cases you rely on, and say so plainly when the opinions do \
                 not cover the question. Do not present your answers as legal advice."
            }
        }
    }
}

/// A resolved `personality` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersonalitySelection {
    Preset(Personality),
    /// The caller supplied the prompt text itself.
    Custom(String),
}

impl PersonalitySelection {
    pub fn parse(key: &str) -> Self {
        match Personality::from_key(key) {
            Some(p) => Self::Preset(p),
            None => Self::Custom(key.to_string()),
        }
    }

    pub fn system_prompt(&self) -> &str {
        match self {
            Self::Preset(p) => p.prompt(),
            Self::Custom(text) => text,
        }
    }

    pub fn preset(&self) -> Option<Personality> {
        match self {
            Self::Preset(p) => Some(*p),
            Self::Custom(_) => None,
        }
    }
}

/// Resolve a personality key (or literal prompt) to system-prompt text.
pub fn resolve_personality(key: &str) -> String {
    PersonalitySelection::parse(key).system_prompt().to_string()
}
