use crate::documents::FileFormat;
use crate::error::ConfigError;
use crate::fields::FieldSelection;
use crate::retry::RetryConfig;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Backend used for the review judge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReviewProvider {
    #[default]
    Gemini,
    OpenAi,
}

impl FromStr for ReviewProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(ReviewProvider::Gemini),
            "openai" => Ok(ReviewProvider::OpenAi),
            _ => Err(ConfigError::UnknownReviewProvider(s.to_string())),
        }
    }
}

impl fmt::Display for ReviewProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewProvider::Gemini => write!(f, "gemini"),
            ReviewProvider::OpenAi => write!(f, "openai"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Run
    pub target_language: String,
    /// Field paths to translate; empty or `["auto"]` means every string
    pub fields: Vec<String>,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Parse every input file as this format instead of going by extension
    pub file_format: Option<FileFormat>,

    // OpenAI
    pub openai_api_key: String,
    pub openai_api_url: String,
    pub openai_model: String,
    pub temperature: f32,

    // Batching
    pub batch_size: usize,
    pub max_concurrency: usize,
    pub max_attempts: u32,

    // Review
    pub review_enabled: bool,
    pub review_model: String,
    pub review_provider: ReviewProvider,
    pub gemini_api_key: Option<String>,
    pub gemini_api_url: String,
    pub max_review_rounds: u32,
}

impl Config {
    /// Defaults for everything except the language and directories.
    pub fn new(
        target_language: impl Into<String>,
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            target_language: target_language.into(),
            fields: Vec::new(),
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            file_format: None,
            openai_api_key: String::new(),
            openai_api_url: crate::openai::DEFAULT_API_URL.to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            batch_size: 10,
            max_concurrency: 1,
            max_attempts: RetryConfig::translation().max_attempts,
            review_enabled: false,
            review_model: "gemini-2.5-pro".to_string(),
            review_provider: ReviewProvider::Gemini,
            gemini_api_key: None,
            gemini_api_url: crate::gemini::DEFAULT_API_URL.to_string(),
            max_review_rounds: 1,
        }
    }

    /// Read configuration from the environment.
    ///
    /// Missing values fall back to defaults; a missing target language or API
    /// key is left empty so command-line flags can still supply it. Call
    /// [`Config::validate`] once all overrides are applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::new(
            std::env::var("TARGET_LANGUAGE").unwrap_or_default(),
            std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            std::env::var("RESULT_DIR").unwrap_or_else(|_| "result".to_string()),
        );

        Ok(Self {
            fields: std::env::var("TRANSLATE_FIELDS")
                .map(|v| split_fields(&v))
                .unwrap_or_default(),
            file_format: match std::env::var("FILE_FORMAT") {
                Ok(v) if !v.trim().is_empty() && !v.trim().eq_ignore_ascii_case("auto") => {
                    Some(v.parse()?)
                }
                _ => None,
            },

            // OpenAI
            openai_api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            openai_api_url: std::env::var("OPENAI_API_URL").unwrap_or(defaults.openai_api_url),
            openai_model: std::env::var("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            temperature: std::env::var("OPENAI_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.temperature),

            // Batching
            batch_size: std::env::var("BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.batch_size),
            max_concurrency: std::env::var("MAX_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_concurrency),
            max_attempts: std::env::var("MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_attempts),

            // Review
            review_enabled: std::env::var("USE_JUDGE")
                .ok()
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.review_enabled),
            review_model: std::env::var("JUDGE_MODEL").unwrap_or(defaults.review_model),
            review_provider: match std::env::var("JUDGE_PROVIDER") {
                Ok(v) if !v.trim().is_empty() => v.parse()?,
                _ => defaults.review_provider,
            },
            gemini_api_key: std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            gemini_api_url: std::env::var("GEMINI_API_URL").unwrap_or(defaults.gemini_api_url),
            max_review_rounds: std::env::var("MAX_JUDGE_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_review_rounds),

            ..defaults
        })
    }

    /// Check run settings and field selectors. Does not look at API keys.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_language.trim().is_empty() {
            return Err(ConfigError::MissingTargetLanguage);
        }
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency(self.max_concurrency));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts(self.max_attempts));
        }
        self.field_selection()?;
        Ok(())
    }

    /// Check that every backend this run will call has a key.
    pub fn require_api_keys(&self) -> Result<(), ConfigError> {
        if self.openai_api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey("OPENAI_API_KEY"));
        }
        if self.review_enabled
            && self.review_provider == ReviewProvider::Gemini
            && self.gemini_api_key.is_none()
        {
            return Err(ConfigError::MissingApiKey("GEMINI_API_KEY"));
        }
        Ok(())
    }

    pub fn field_selection(&self) -> Result<FieldSelection, ConfigError> {
        FieldSelection::from_paths(&self.fields)
    }

    /// Translation retry policy with the configured attempt limit
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            ..RetryConfig::translation()
        }
    }
}

/// Split a comma-separated field list, dropping blanks
pub fn split_fields(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
