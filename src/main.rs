use anyhow::{Context, Result};
use clap::Parser;
use json_translator::config::{Config, ReviewProvider};
use json_translator::gemini::GeminiClient;
use json_translator::model::ChatModel;
use json_translator::openai::OpenAiClient;
use json_translator::review::ReviewClient;
use json_translator::translation::TranslationClient;
use json_translator::Pipeline;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Translate string fields of JSON / JSONL files with an LLM.
///
/// Every flag overrides the matching environment variable (also read from `.env`).
#[derive(Debug, Parser)]
#[command(name = "json-translator", version, about)]
struct Cli {
    /// Target language, e.g. "French" [env: TARGET_LANGUAGE]
    #[arg(short, long)]
    lang: Option<String>,

    /// Field paths such as `title` or `items[*].body`; pass `--fields` alone
    /// to translate every string [env: TRANSLATE_FIELDS]
    #[arg(short, long, num_args = 0.., value_delimiter = ',')]
    fields: Option<Vec<String>>,

    /// Translation model [env: OPENAI_MODEL]
    #[arg(short, long)]
    model: Option<String>,

    /// Strings per request [env: BATCH_SIZE]
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Directory holding the input files [env: DATA_DIR]
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory for translated files [env: RESULT_DIR]
    #[arg(long)]
    result_dir: Option<PathBuf>,

    /// Parse every input file as `json` or `jsonl`, whatever its extension
    /// [env: FILE_FORMAT]
    #[arg(long)]
    format: Option<String>,

    /// Review each translation with a judge model [env: USE_JUDGE]
    #[arg(long, overrides_with = "no_review")]
    review: bool,

    /// Skip the review pass even if USE_JUDGE is set
    #[arg(long)]
    no_review: bool,

    /// Judge model [env: JUDGE_MODEL]
    #[arg(long)]
    review_model: Option<String>,

    /// Judge backend, `gemini` or `openai` [env: JUDGE_PROVIDER]
    #[arg(long)]
    review_provider: Option<String>,

    /// Batches (and reviews) in flight at once [env: MAX_CONCURRENCY]
    #[arg(long)]
    concurrency: Option<usize>,

    /// Attempts per batch before the run fails [env: MAX_ATTEMPTS]
    #[arg(long)]
    max_attempts: Option<u32>,
}

impl Cli {
    fn apply(self, config: &mut Config) -> Result<()> {
        if let Some(lang) = self.lang {
            config.target_language = lang;
        }
        if let Some(fields) = self.fields {
            config.fields = fields
                .into_iter()
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .collect();
        }
        if let Some(model) = self.model {
            config.openai_model = model;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(dir) = self.data_dir {
            config.input_dir = dir;
        }
        if let Some(dir) = self.result_dir {
            config.output_dir = dir;
        }
        if let Some(format) = self.format {
            config.file_format = Some(format.parse()?);
        }
        if self.review {
            config.review_enabled = true;
        }
        if self.no_review {
            config.review_enabled = false;
        }
        if let Some(model) = self.review_model {
            config.review_model = model;
        }
        if let Some(provider) = self.review_provider {
            config.review_provider = provider.parse()?;
        }
        if let Some(concurrency) = self.concurrency {
            config.max_concurrency = concurrency;
        }
        if let Some(max_attempts) = self.max_attempts {
            config.max_attempts = max_attempts;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored when absent)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("json_translator=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    cli.apply(&mut config)?;
    config.validate()?;
    config.require_api_keys()?;

    info!(
        "Translating fields {:?} in {} into {}",
        config.fields,
        config.input_dir.display(),
        config.target_language
    );

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(180))
        .build()
        .context("Failed to build HTTP client")?;

    let openai: Arc<dyn ChatModel> = Arc::new(
        OpenAiClient::new(http.clone(), &config.openai_api_url, &config.openai_api_key)
            .with_temperature(config.temperature),
    );
    let translator = TranslationClient::new(
        openai.clone(),
        config.openai_model.clone(),
        config.retry_config(),
    );

    let reviewer = if config.review_enabled {
        let judge: Arc<dyn ChatModel> = match config.review_provider {
            ReviewProvider::Gemini => Arc::new(GeminiClient::new(
                http.clone(),
                &config.gemini_api_url,
                config.gemini_api_key.clone().unwrap_or_default(),
            )),
            ReviewProvider::OpenAi => openai.clone(),
        };
        info!(
            "Review enabled: {} via {} ({} round(s))",
            config.review_model, config.review_provider, config.max_review_rounds
        );
        Some(
            ReviewClient::new(
                judge,
                config.review_model.clone(),
                openai,
                config.openai_model.clone(),
            )
            .with_max_rounds(config.max_review_rounds),
        )
    } else {
        None
    };

    let pipeline = Pipeline::new(config, translator, reviewer)?;
    let report = pipeline.run().await?;

    for skipped in &report.files_skipped {
        warn!("Skipped {}: {}", skipped.path.display(), skipped.reason);
    }
    if report.reviewed() > 0 {
        info!(
            "Reviewed {} translation(s): {} accepted, {} corrected, {} kept after review failure",
            report.reviewed(),
            report.reviews_accepted,
            report.reviews_corrected,
            report.reviews_failed
        );
    }
    info!(
        "Translated {} string(s) across {} file(s)",
        report.units,
        report.files_written.len()
    );

    Ok(())
}
