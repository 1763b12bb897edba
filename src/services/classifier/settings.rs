use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MAX_LABELS: usize = 10;
pub const MAX_LABEL_LEN: usize = 25;

pub const DEFAULT_LABELS: [&str; MAX_LABELS] = [
    "animal",
    "plant",
    "human",
    "vehicle",
    "building",
    "food",
    "nature",
    "technology",
    "art",
    "miscellaneous",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModelType {
    #[default]
    #[serde(rename = "openai/clip-vit-base-patch32")]
    ClipVitBasePatch32,
    #[serde(rename = "google/siglip-base-patch16-224")]
    SiglipBasePatch16_224,
}

impl ModelType {
    pub const ALL: [ModelType; 2] = [ModelType::ClipVitBasePatch32, ModelType::SiglipBasePatch16_224];

    pub fn id(&self) -> &'static str {
        match self {
            ModelType::ClipVitBasePatch32 => "openai/clip-vit-base-patch32",
            ModelType::SiglipBasePatch16_224 => "google/siglip-base-patch16-224",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ModelType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ModelType::ALL
            .into_iter()
            .find(|m| m.id() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = ModelType::ALL.iter().map(|m| m.id()).collect();
                AppError::Configuration(format!("unknown model '{}', expected one of: {}", s, known.join(", ")))
            })
    }
}

/// Candidate labels after blank entries are dropped. Never empty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CandidateLabels(Vec<String>);

impl CandidateLabels {
    pub fn new<I, S>(inputs: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let labels: Vec<String> = inputs
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if labels.is_empty() {
            return Err(AppError::Validation("at least one candidate label is required".into()));
        }
        if labels.len() > MAX_LABELS {
            return Err(AppError::Validation(format!(
                "at most {} candidate labels are allowed, got {}",
                MAX_LABELS,
                labels.len()
            )));
        }
        if let Some(long) = labels.iter().find(|l| l.chars().count() > MAX_LABEL_LEN) {
            return Err(AppError::Validation(format!(
                "label '{}' is longer than {} characters",
                long, MAX_LABEL_LEN
            )));
        }
        Ok(Self(labels))
    }

    /// Parses the `a;b;c` form used by the shell.
    pub fn parse(joined: &str) -> Result<Self, AppError> {
        Self::new(joined.split(';'))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl Default for CandidateLabels {
    fn default() -> Self {
        Self(DEFAULT_LABELS.iter().map(|s| s.to_string()).collect())
    }
}

/// User-adjustable settings. Held in memory only.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub model: ModelType,
    pub labels: CandidateLabels,
}
