use crate::error::ModelError;
use crate::model::ChatModel;
use crate::prompts::{build_translation_system_prompt, build_translation_user_prompt};
use crate::retry::{with_retry_if, RetryConfig, RetryFailure, Sleeper, TokioSleeper};
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Translates batches of strings, aligned by position, with retries.
#[derive(Debug, Clone)]
pub struct TranslationClient {
    model: Arc<dyn ChatModel>,
    model_id: String,
    retry: RetryConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl TranslationClient {
    pub fn new(model: Arc<dyn ChatModel>, model_id: impl Into<String>, retry: RetryConfig) -> Self {
        Self {
            model,
            model_id: model_id.into(),
            retry,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replace how the client waits between attempts
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn chat_model(&self) -> &Arc<dyn ChatModel> {
        &self.model
    }

    /// Translate `texts` into `target_language`.
    ///
    /// The result always has exactly `texts.len()` entries in input order. The
    /// same request is resubmitted unchanged on every retryable failure.
    pub async fn translate(
        &self,
        batch_index: usize,
        texts: &[String],
        target_language: &str,
    ) -> Result<Vec<String>, RetryFailure<ModelError>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let system = build_translation_system_prompt(target_language);
        let user = build_translation_user_prompt(target_language, texts);
        let operation_name = format!("Translation batch {} to {}", batch_index, target_language);

        with_retry_if(
            &self.retry,
            &operation_name,
            self.sleeper.as_ref(),
            || async {
                let raw = self.model.complete(&self.model_id, &system, &user).await?;
                let translated = parse_translation_array(&raw, texts.len())?;
                debug!(
                    "Batch {}: received {} translations",
                    batch_index,
                    translated.len()
                );
                Ok::<_, ModelError>(translated)
            },
            ModelError::is_retryable,
        )
        .await
    }
}

/// Remove a surrounding markdown code fence, with or without a language tag
pub(crate) fn strip_code_fences(raw: &str) -> &str {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| {
        Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\r?\n?```$").expect("valid fence regex")
    });

    let trimmed = raw.trim();
    match fence.captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => trimmed,
    }
}

/// Parse the model's reply into exactly `expected` strings.
///
/// Numbers and booleans are accepted as their textual form. A reply that is
/// not a JSON array, contains other value types, or has the wrong length is
/// rejected rather than truncated or padded.
pub fn parse_translation_array(raw: &str, expected: usize) -> Result<Vec<String>, ModelError> {
    let body = strip_code_fences(raw);

    let value: Value = serde_json::from_str(body).map_err(|e| {
        ModelError::Malformed(format!("model returned non-JSON output ({}): {}", e, preview(body)))
    })?;

    let Value::Array(entries) = value else {
        return Err(ModelError::Malformed(format!(
            "expected a JSON array, got: {}",
            preview(body)
        )));
    };

    if entries.len() != expected {
        return Err(ModelError::CountMismatch {
            expected,
            actual: entries.len(),
        });
    }

    entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| match entry {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(ModelError::Malformed(format!(
                "entry {} is not a string: {}",
                i, other
            ))),
        })
        .collect()
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 200;
    if text.chars().count() <= LIMIT {
        text.to_string()
    } else {
        let cut: String = text.chars().take(LIMIT).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::retry::tests::RecordingSleeper;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays scripted replies in order; repeats the last one when exhausted.
    #[derive(Debug)]
    pub(crate) struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String, ModelError>>>,
        last: Mutex<Option<String>>,
        pub(crate) calls: AtomicUsize,
        pub(crate) prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        pub(crate) fn new(replies: Vec<Result<String, ModelError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                last: Mutex::new(None),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, _model: &str, _system: &str, user: &str) -> Result<String, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(user.to_string());
            let next = self.replies.lock().unwrap().pop_front();
            match next {
                Some(Ok(reply)) => {
                    *self.last.lock().unwrap() = Some(reply.clone());
                    Ok(reply)
                }
                Some(Err(err)) => Err(err),
                None => self
                    .last
                    .lock()
                    .unwrap()
                    .clone()
                    .ok_or(ModelError::EmptyResponse),
            }
        }
    }

    fn server_error() -> ModelError {
        ModelError::Api {
            status: 500,
            body: "Internal Server Error".to_string(),
        }
    }

    fn client(model: Arc<ScriptedModel>, max_attempts: u32) -> (TranslationClient, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = TranslationClient::new(
            model,
            "gpt-4o-mini",
            RetryConfig::new(max_attempts, Duration::from_secs(2)),
        )
        .with_sleeper(sleeper.clone());
        (client, sleeper)
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    // ==================== Parsing Tests ====================

    #[test]
    fn test_parse_plain_array() {
        let parsed = parse_translation_array(r#"["Hola", "Mundo"]"#, 2).unwrap();
        assert_eq!(parsed, vec!["Hola", "Mundo"]);
    }

    #[test]
    fn test_parse_fenced_array() {
        let raw = "```json\n[\"Bonjour\"]\n```";
        assert_eq!(parse_translation_array(raw, 1).unwrap(), vec!["Bonjour"]);

        let bare = "```\n[\"Hallo\"]\n```";
        assert_eq!(parse_translation_array(bare, 1).unwrap(), vec!["Hallo"]);
    }

    #[test]
    fn test_parse_count_mismatch_rejected() {
        let short = parse_translation_array(r#"["a"]"#, 2).unwrap_err();
        assert!(matches!(
            short,
            ModelError::CountMismatch {
                expected: 2,
                actual: 1
            }
        ));

        let long = parse_translation_array(r#"["a", "b", "c"]"#, 2).unwrap_err();
        assert!(matches!(
            long,
            ModelError::CountMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_parse_non_array_rejected() {
        assert!(matches!(
            parse_translation_array(r#"{"a": "b"}"#, 1),
            Err(ModelError::Malformed(_))
        ));
        assert!(matches!(
            parse_translation_array("Sure! Here is your translation.", 1),
            Err(ModelError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_scalar_entries() {
        let parsed = parse_translation_array(r#"["x", 42, true]"#, 3).unwrap();
        assert_eq!(parsed, vec!["x", "42", "true"]);

        assert!(matches!(
            parse_translation_array(r#"["x", null]"#, 2),
            Err(ModelError::Malformed(_))
        ));
    }

    #[test]
    fn test_preview_truncates_long_output() {
        let long = "x".repeat(500);
        let shown = preview(&long);
        assert_eq!(shown.len(), 203);
        assert!(shown.ends_with("..."));
    }

    // ==================== Client Tests ====================

    #[tokio::test]
    async fn test_translate_empty_batch_makes_no_call() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let (client, _) = client(model.clone(), 3);

        let result = client.translate(0, &[], "French").await.unwrap();

        assert!(result.is_empty());
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_translate_success_keeps_order() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(r#"["Un", "Deux", "Trois"]"#.to_string())]));
        let (client, sleeper) = client(model.clone(), 3);

        let result = client
            .translate(0, &texts(&["One", "Two", "Three"]), "French")
            .await
            .unwrap();

        assert_eq!(result, vec!["Un", "Deux", "Trois"]);
        assert_eq!(model.calls(), 1);
        assert!(sleeper.delays.lock().unwrap().is_empty());
        assert!(model.prompts.lock().unwrap()[0].contains("\"Two\""));
    }

    #[tokio::test]
    async fn test_translate_recovers_after_transient_failures() {
        let model = Arc::new(ScriptedModel::new(vec![
            Err(server_error()),
            Ok(r#"["only one"]"#.to_string()),
            Ok(r#"["Un", "Deux"]"#.to_string()),
        ]));
        let (client, sleeper) = client(model.clone(), 3);

        let result = client
            .translate(4, &texts(&["One", "Two"]), "French")
            .await
            .unwrap();

        assert_eq!(result, vec!["Un", "Deux"]);
        assert_eq!(model.calls(), 3);
        assert_eq!(
            *sleeper.delays.lock().unwrap(),
            vec![Duration::from_secs(2), Duration::from_secs(4)]
        );
        let prompts = model.prompts.lock().unwrap();
        assert!(prompts.iter().all(|p| p == &prompts[0]), "batch must be resent unchanged");
    }

    #[tokio::test]
    async fn test_translate_exhausts_attempts() {
        let model = Arc::new(ScriptedModel::new(vec![
            Err(server_error()),
            Err(server_error()),
            Ok(r#"["Un"]"#.to_string()),
        ]));
        let (client, _) = client(model.clone(), 2);

        let failure = client
            .translate(1, &texts(&["One"]), "French")
            .await
            .unwrap_err();

        assert_eq!(failure.attempts, 2);
        assert!(matches!(failure.error, ModelError::Api { status: 500, .. }));
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn test_translate_does_not_retry_client_error() {
        let model = Arc::new(ScriptedModel::new(vec![Err(ModelError::Api {
            status: 401,
            body: "Invalid API key".to_string(),
        })]));
        let (client, _) = client(model.clone(), 4);

        let failure = client
            .translate(0, &texts(&["One"]), "French")
            .await
            .unwrap_err();

        assert_eq!(failure.attempts, 1);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_translate_persistent_mismatch_is_failure() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(r#"["a", "b", "c"]"#.to_string())]));
        let (client, _) = client(model.clone(), 3);

        let failure = client
            .translate(0, &texts(&["One", "Two"]), "French")
            .await
            .unwrap_err();

        assert!(matches!(
            failure.error,
            ModelError::CountMismatch {
                expected: 2,
                actual: 3
            }
        ));
        assert_eq!(model.calls(), 3);
    }
}
