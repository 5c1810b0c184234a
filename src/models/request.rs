//! Generation request model: topic, word count and writing style.

use serde::{Deserialize, Serialize};
use std::num::IntErrorKind;
use std::str::FromStr;

/// Writing style offered by the form
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Style {
    #[default]
    Researcher,
    DataAnalyst,
    CommonPeople,
}

impl Style {
    /// All styles, in the order the form lists them
    pub const ALL: [Style; 3] = [Style::Researcher, Style::DataAnalyst, Style::CommonPeople];

    /// Returns the audience label embedded in prompts
    pub fn label(&self) -> &'static str {
        match self {
            Style::Researcher => "researcher",
            Style::DataAnalyst => "data analyst",
            Style::CommonPeople => "common people",
        }
    }
}

impl std::fmt::Display for Style {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Style {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', '_'], " ");
        Style::ALL
            .into_iter()
            .find(|style| style.label() == normalized)
            .ok_or_else(|| {
                format!(
                    "unknown style '{}' (expected one of: researcher, data analyst, common people)",
                    s
                )
            })
    }
}

/// Validation failures for raw form input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("topic required.")]
    TopicRequired,

    #[error("please enter a valid number for word count")]
    InvalidWordCount,
}

/// Requested length of the post, in words. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WordCount(u32);

impl WordCount {
    /// Parse user-supplied text. Surrounding whitespace is ignored; empty,
    /// fractional, negative and zero values are rejected. Integers too large
    /// for a `u32` saturate.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        match raw.trim().parse::<u32>() {
            Ok(n) if n > 0 => Ok(Self(n)),
            Err(e) if *e.kind() == IntErrorKind::PosOverflow => Ok(Self(u32::MAX)),
            _ => Err(ValidationError::InvalidWordCount),
        }
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for WordCount {
    type Error = ValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if value == 0 {
            Err(ValidationError::InvalidWordCount)
        } else {
            Ok(Self(value))
        }
    }
}

impl std::fmt::Display for WordCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated, single-use generation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Blog topic (never blank)
    pub topic: String,

    /// Requested length
    pub word_count: WordCount,

    /// Audience/writing style
    pub style: Style,
}

impl GenerationRequest {
    /// Validate raw form fields. The topic is checked before the word count.
    pub fn parse(
        topic: &str,
        word_count_raw: &str,
        style: Style,
    ) -> Result<Self, ValidationError> {
        if topic.trim().is_empty() {
            return Err(ValidationError::TopicRequired);
        }
        let word_count = WordCount::parse(word_count_raw)?;

        Ok(Self {
            topic: topic.to_string(),
            word_count,
            style,
        })
    }

    /// Render the prompt sent to the model. Style, topic and word count are
    /// embedded verbatim.
    pub fn prompt(&self) -> String {
        format!(
            "Write a blog for {} job profile on the topic \"{}\" within {} words.",
            self.style, self.topic, self.word_count
        )
    }
}
