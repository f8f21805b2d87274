//! Run orchestration: load, resolve, batch, translate, review, write.

use crate::batch::{batch, collect_units, Batch, TranslationUnit};
use crate::config::Config;
use crate::documents::{load_documents, write_document, SourceDocument};
use crate::error::{ConfigError, PipelineError};
use crate::fields::{self, FieldSelection};
use crate::metrics::{RunMetrics, RunReport};
use crate::review::{ReviewClient, ReviewOutcome};
use crate::translation::TranslationClient;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::Value;
use std::fmt;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Resolve,
    Batch,
    Translate,
    Review,
    Write,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Resolve => "resolve",
            Stage::Batch => "batch",
            Stage::Translate => "translate",
            Stage::Review => "review",
            Stage::Write => "write",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct Pipeline {
    config: Config,
    selection: FieldSelection,
    translator: TranslationClient,
    reviewer: Option<ReviewClient>,
}

impl Pipeline {
    /// Validate `config` and assemble a pipeline. No network calls are made.
    ///
    /// `config.review_enabled` decides whether the review pass runs. Enabling
    /// it without a `reviewer` is an error; a reviewer given while review is
    /// disabled is dropped.
    pub fn new(
        config: Config,
        translator: TranslationClient,
        reviewer: Option<ReviewClient>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let selection = config.field_selection()?;

        let reviewer = match (config.review_enabled, reviewer) {
            (true, None) => return Err(ConfigError::MissingReviewer),
            (false, Some(_)) => {
                debug!("Review disabled, ignoring the supplied review client");
                None
            }
            (_, reviewer) => reviewer,
        };

        Ok(Self {
            config,
            selection,
            translator,
            reviewer,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Translate every document in the input directory and write the results.
    ///
    /// Nothing is written unless every batch translated successfully.
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let result = self.run_stages().await;
        if let Err(e) = &result {
            error!("Stage {}: {}", Stage::Failed, e);
        }
        result
    }

    async fn run_stages(&self) -> Result<RunReport, PipelineError> {
        info!(
            "Stage {}: reading {}",
            Stage::Load,
            self.config.input_dir.display()
        );
        let loaded = load_documents(&self.config.input_dir, self.config.file_format)?;
        if loaded.documents.is_empty() {
            warn!(
                "No usable .json or .jsonl files in {}",
                self.config.input_dir.display()
            );
        }
        info!(
            "Loaded {} document(s), skipped {}",
            loaded.documents.len(),
            loaded.failures.len()
        );

        let (values, metrics) = self.translate_documents(&loaded.documents).await?;

        info!(
            "Stage {}: {} file(s) to {}",
            Stage::Write,
            values.len(),
            self.config.output_dir.display()
        );
        std::fs::create_dir_all(&self.config.output_dir).map_err(|source| {
            PipelineError::Output {
                path: self.config.output_dir.clone(),
                source,
            }
        })?;

        let mut written = Vec::with_capacity(values.len());
        for (document, value) in loaded.documents.iter().zip(&values) {
            let path = write_document(&self.config.output_dir, document, value)?;
            info!("Wrote {}", path.display());
            written.push(path);
        }

        let report = RunReport::new(&metrics, written, loaded.failures);
        info!(
            "Stage {}: {} string(s) in {} batch(es), {} file(s) written, {} skipped",
            Stage::Done,
            report.units,
            report.batches,
            report.files_written.len(),
            report.files_skipped.len()
        );
        Ok(report)
    }

    /// Translate already-loaded documents in memory.
    ///
    /// Returns one patched copy per input document, in input order. The
    /// inputs are never modified.
    pub async fn translate_documents(
        &self,
        documents: &[SourceDocument],
    ) -> Result<(Vec<Value>, RunMetrics), PipelineError> {
        let metrics = RunMetrics::new();

        debug!("Stage {}: fields {}", Stage::Resolve, self.selection);
        let units = collect_units(documents, &self.selection);
        metrics.record_units(units.len());

        let batches = batch(units, self.config.batch_size)?;
        info!(
            "Stage {}: {} string(s) in {} batch(es) of up to {}",
            Stage::Batch,
            metrics.units(),
            batches.len(),
            self.config.batch_size
        );

        let translations = self.translate_batches(&batches, documents, &metrics).await?;
        let mut pairs: Vec<(&TranslationUnit, String)> = batches
            .iter()
            .zip(translations)
            .flat_map(|(batch, texts)| batch.units.iter().zip(texts))
            .collect();

        if let (true, Some(reviewer)) = (self.config.review_enabled, &self.reviewer) {
            if !pairs.is_empty() {
                pairs = self.review_units(reviewer, pairs, documents, &metrics).await;
            }
        }

        let mut values: Vec<Value> = documents.iter().map(|d| d.value.clone()).collect();
        for (unit, text) in pairs {
            let Some(value) = values.get_mut(unit.document) else {
                continue;
            };
            fields::set(value, &unit.location, text).map_err(|source| {
                PipelineError::WriteBack {
                    document: documents[unit.document].name(),
                    source,
                }
            })?;
        }

        Ok((values, metrics))
    }

    /// Translate batches with at most `max_concurrency` in flight.
    ///
    /// Batches complete in any order and are sorted back by index. The first
    /// failure to complete drops the stream, cancelling every batch still in
    /// flight without waiting for earlier batches.
    async fn translate_batches(
        &self,
        batches: &[Batch],
        documents: &[SourceDocument],
        metrics: &RunMetrics,
    ) -> Result<Vec<Vec<String>>, PipelineError> {
        let total = batches.len();
        let target_language = self.config.target_language.as_str();
        info!(
            "Stage {}: {} batch(es) into {} with {} ({} concurrent)",
            Stage::Translate,
            total,
            target_language,
            self.translator.model_id(),
            self.config.max_concurrency
        );

        let results = stream::iter(batches.iter().map(move |batch| async move {
            let translated = self
                .translator
                .translate(batch.index, &batch.texts(), target_language)
                .await
                .map_err(|failure| PipelineError::TranslationFailed {
                    batch_index: batch.index,
                    documents: batch.document_names(documents),
                    attempts: failure.attempts,
                    source: failure.error,
                })?;

            metrics.record_batch();
            info!(
                "Batch {}/{} translated ({} strings)",
                batch.index + 1,
                total,
                batch.len()
            );
            Ok::<_, PipelineError>((batch.index, translated))
        }))
        .buffer_unordered(self.config.max_concurrency);

        let mut translated: Vec<(usize, Vec<String>)> = results.try_collect().await?;
        translated.sort_by_key(|(index, _)| *index);
        Ok(translated.into_iter().map(|(_, texts)| texts).collect())
    }

    /// Review each translation, keeping the unreviewed text when review fails.
    async fn review_units<'a>(
        &self,
        reviewer: &ReviewClient,
        pairs: Vec<(&'a TranslationUnit, String)>,
        documents: &[SourceDocument],
        metrics: &RunMetrics,
    ) -> Vec<(&'a TranslationUnit, String)> {
        let target_language = self.config.target_language.as_str();
        info!(
            "Stage {}: {} translation(s) ({} concurrent)",
            Stage::Review,
            pairs.len(),
            self.config.max_concurrency
        );

        let reviewed: Vec<(&'a TranslationUnit, String)> =
            stream::iter(pairs.into_iter().map(move |(unit, translated)| async move {
                let text = match reviewer.review(&unit.text, &translated, target_language).await {
                    Ok(ReviewOutcome::Accepted(text)) => {
                        metrics.record_review_accepted();
                        text
                    }
                    Ok(ReviewOutcome::Corrected(text)) => {
                        debug!("Corrected translation at {}", unit.location);
                        metrics.record_review_corrected();
                        text
                    }
                    Err(e) => {
                        let document = documents
                            .get(unit.document)
                            .map(|d| d.name())
                            .unwrap_or_default();
                        warn!(
                            "Review failed for {} at {}, keeping unreviewed translation: {}",
                            document, unit.location, e
                        );
                        metrics.record_review_failed();
                        translated
                    }
                };
                (unit, text)
            }))
            .buffered(self.config.max_concurrency)
            .collect()
            .await;

        info!(
            "Review complete: {} accepted, {} corrected, {} failed",
            metrics.reviews_accepted(),
            metrics.reviews_corrected(),
            metrics.reviews_failed()
        );
        reviewed
    }
}
