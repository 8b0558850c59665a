//! Comment moderation
//!
//! A [`ContentClassifier`] scores text per category; the [`ModerationPolicy`]
//! turns that verdict into approved / flagged / rejected.

use airdrop_core::{AirdropResult, ModerationResult, ModerationStatus};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::env;
use tracing::{debug, warn};

use crate::config::ConfigError;

/// Flag recorded when the classifier could not be reached
pub const CLASSIFIER_ERROR_FLAG: &str = "api_error";

/// Raw output of a content classifier
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifierVerdict {
    /// Whether any category fired
    pub flagged: bool,
    /// Category -> fired
    pub categories: BTreeMap<String, bool>,
    /// Category -> confidence in [0, 1]
    pub category_scores: BTreeMap<String, f64>,
}

impl ClassifierVerdict {
    /// Names of the categories that fired
    pub fn flagged_categories(&self) -> Vec<String> {
        self.categories
            .iter()
            .filter(|(_, fired)| **fired)
            .map(|(category, _)| category.clone())
            .collect()
    }

    pub fn score(&self, category: &str) -> f64 {
        self.category_scores.get(category).copied().unwrap_or(0.0)
    }
}

/// A text classifier
#[async_trait]
pub trait ContentClassifier: Send + Sync {
    async fn classify(&self, content: &str) -> AirdropResult<ClassifierVerdict>;

    fn name(&self) -> &str;
}

/// Maps classifier verdicts onto a moderation status
#[derive(Debug, Clone, PartialEq)]
pub struct ModerationPolicy {
    /// Score above which a severe category rejects the comment
    pub reject_threshold: f64,
    pub severe_categories: Vec<String>,
}

impl Default for ModerationPolicy {
    fn default() -> Self {
        Self {
            reject_threshold: 0.8,
            severe_categories: vec![
                "hate".to_string(),
                "violence".to_string(),
                "self-harm".to_string(),
            ],
        }
    }
}

impl ModerationPolicy {
    pub fn evaluate(&self, verdict: &ClassifierVerdict) -> ModerationResult {
        if !verdict.flagged {
            return ModerationResult::approved();
        }

        let severe = self
            .severe_categories
            .iter()
            .any(|category| verdict.score(category) > self.reject_threshold);

        ModerationResult {
            status: if severe {
                ModerationStatus::Rejected
            } else {
                ModerationStatus::Flagged
            },
            flags: verdict.flagged_categories(),
        }
    }

    /// Classify `content` and evaluate it. Classifier failures flag the
    /// comment for manual review.
    pub async fn moderate(
        &self,
        classifier: &dyn ContentClassifier,
        content: &str,
    ) -> ModerationResult {
        match classifier.classify(content).await {
            Ok(verdict) => self.evaluate(&verdict),
            Err(e) => {
                warn!("Classifier {} failed: {}", classifier.name(), e);
                ModerationResult {
                    status: ModerationStatus::Flagged,
                    flags: vec![CLASSIFIER_ERROR_FLAG.to_string()],
                }
            }
        }
    }
}

/// Keyword classifier
///
/// Each category has a list of terms; every distinct term found in the text
/// adds 0.5 to that category's score, capped at 1.0. Terms match whole
/// words only, and a multi-word term must appear as a run of words.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlocklistClassifier {
    terms: BTreeMap<String, Vec<String>>,
}

impl BlocklistClassifier {
    pub fn new(terms: BTreeMap<String, Vec<String>>) -> Self {
        let terms = terms
            .into_iter()
            .map(|(category, words)| {
                let words = words
                    .into_iter()
                    .map(|w| w.trim().to_lowercase())
                    .filter(|w| !w.is_empty())
                    .collect();
                (category.trim().to_lowercase(), words)
            })
            .collect();
        Self { terms }
    }

    /// Parse `category:term|term;category:term`
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let mut terms = BTreeMap::new();
        for section in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (category, words) = section
                .split_once(':')
                .ok_or_else(|| ConfigError::InvalidBlocklist(section.to_string()))?;
            if category.trim().is_empty() {
                return Err(ConfigError::InvalidBlocklist(section.to_string()));
            }
            terms
                .entry(category.trim().to_lowercase())
                .or_insert_with(Vec::new)
                .extend(words.split('|').map(str::to_string));
        }
        Ok(Self::new(terms))
    }

    /// Load from `MODERATION_BLOCKLIST`; unset means an empty blocklist
    pub fn from_env() -> Result<Self, ConfigError> {
        match env::var("MODERATION_BLOCKLIST") {
            Ok(raw) => Self::parse(&raw),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.terms.keys().map(String::as_str)
    }
}

#[async_trait]
impl ContentClassifier for BlocklistClassifier {
    async fn classify(&self, content: &str) -> AirdropResult<ClassifierVerdict> {
        let text = tokenize(content);
        let mut verdict = ClassifierVerdict::default();

        for (category, words) in &self.terms {
            let hits = words
                .iter()
                .filter(|term| contains_phrase(&text, &tokenize(term)))
                .count();
            let score = (hits as f64 * 0.5).min(1.0);
            verdict.categories.insert(category.clone(), hits > 0);
            verdict.category_scores.insert(category.clone(), score);
            verdict.flagged |= hits > 0;
        }

        debug!("Blocklist verdict: flagged={}", verdict.flagged);
        Ok(verdict)
    }

    fn name(&self) -> &str {
        "blocklist"
    }
}

/// Lowercase words, split on anything that is not alphanumeric
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn contains_phrase(words: &[String], phrase: &[String]) -> bool {
    !phrase.is_empty() && words.windows(phrase.len()).any(|window| window == phrase)
}
