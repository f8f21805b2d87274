//! Second-pass review of translations.
//!
//! A judge model checks each translation for grammar, naturalness, and
//! preservation of names, paths, and identifiers. When it rejects one, the
//! translation model is asked to revise it using the judge's feedback.

use crate::error::{ModelError, ReviewError};
use crate::model::ChatModel;
use crate::prompts::{
    build_correction_system_prompt, build_correction_user_prompt, build_judge_user_prompt,
    JUDGE_SYSTEM_PROMPT,
};
use crate::retry::{with_retry_if, RetryConfig, Sleeper, TokioSleeper};
use crate::translation::strip_code_fences;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

const DEFAULT_FEEDBACK: &str =
    "The reviewer rejected this translation without details; improve its grammar and naturalness.";

/// The judge's answer for one translation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Verdict {
    pub ok: bool,
    #[serde(default)]
    pub feedback: Option<String>,
}

impl Verdict {
    /// Feedback to act on, or `None` if the translation was accepted.
    fn rejection(&self) -> Option<&str> {
        if self.ok {
            return None;
        }
        Some(
            self.feedback
                .as_deref()
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .unwrap_or(DEFAULT_FEEDBACK),
        )
    }
}

/// Result of reviewing one translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewOutcome {
    Accepted(String),
    Corrected(String),
}

impl ReviewOutcome {
    pub fn into_text(self) -> String {
        match self {
            ReviewOutcome::Accepted(text) | ReviewOutcome::Corrected(text) => text,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReviewClient {
    judge: Arc<dyn ChatModel>,
    judge_model: String,
    corrector: Arc<dyn ChatModel>,
    corrector_model: String,
    max_rounds: u32,
    retry: RetryConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl ReviewClient {
    pub fn new(
        judge: Arc<dyn ChatModel>,
        judge_model: impl Into<String>,
        corrector: Arc<dyn ChatModel>,
        corrector_model: impl Into<String>,
    ) -> Self {
        Self {
            judge,
            judge_model: judge_model.into(),
            corrector,
            corrector_model: corrector_model.into(),
            max_rounds: 1,
            retry: RetryConfig::review(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// How many judge-then-correct rounds to run per translation
    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Review `translated` and return it unchanged or corrected.
    pub async fn review(
        &self,
        original: &str,
        translated: &str,
        target_language: &str,
    ) -> Result<ReviewOutcome, ReviewError> {
        let mut current = translated.to_string();
        let mut corrected = false;

        for round in 1..=self.max_rounds {
            let verdict = self.judge(original, &current, target_language).await?;
            let Some(feedback) = verdict.rejection() else {
                break;
            };
            debug!("Review round {} rejected translation: {}", round, feedback);
            current = self
                .correct(original, &current, feedback, target_language)
                .await?;
            corrected = true;
        }

        Ok(if corrected {
            ReviewOutcome::Corrected(current)
        } else {
            ReviewOutcome::Accepted(current)
        })
    }

    async fn judge(
        &self,
        original: &str,
        translated: &str,
        target_language: &str,
    ) -> Result<Verdict, ReviewError> {
        let user = build_judge_user_prompt(original, translated, target_language);

        with_retry_if(
            &self.retry,
            "Review judge",
            self.sleeper.as_ref(),
            || async {
                let raw = self
                    .judge
                    .complete(&self.judge_model, JUDGE_SYSTEM_PROMPT, &user)
                    .await?;
                parse_verdict(&raw)
            },
            ModelError::is_retryable,
        )
        .await
        .map_err(|failure| match failure.error {
            ModelError::Malformed(reason) => ReviewError::Verdict(reason),
            other => ReviewError::Judge(other),
        })
    }

    async fn correct(
        &self,
        original: &str,
        previous: &str,
        feedback: &str,
        target_language: &str,
    ) -> Result<String, ReviewError> {
        let system = build_correction_system_prompt(target_language);
        let user = build_correction_user_prompt(original, previous, feedback, target_language);

        with_retry_if(
            &self.retry,
            "Review correction",
            self.sleeper.as_ref(),
            || async {
                let raw = self
                    .corrector
                    .complete(&self.corrector_model, &system, &user)
                    .await?;
                let text = strip_code_fences(&raw);
                if text.is_empty() {
                    return Err(ModelError::EmptyResponse);
                }
                Ok::<_, ModelError>(text.to_string())
            },
            ModelError::is_retryable,
        )
        .await
        .map_err(|failure| ReviewError::Correction(failure.error))
    }
}

/// Parse a judge reply of the form `{"ok": bool, "feedback": "..."}`.
pub fn parse_verdict(raw: &str) -> Result<Verdict, ModelError> {
    let body = strip_code_fences(raw);
    serde_json::from_str(body)
        .map_err(|e| ModelError::Malformed(format!("unusable verdict ({}): {}", e, body)))
}
