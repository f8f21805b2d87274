//! Prompt builders for translation, review, and post-review correction.

/// Build the system prompt for batch translation
pub fn build_translation_system_prompt(target_language: &str) -> String {
    format!(
        r#"You are a professional translator. Translate each entry of the JSON array you receive from English to {}.

## Translation Rules

### DO NOT translate (keep exactly as in the source):
- File names and extensions (e.g., final_report.pdf, config.yaml)
- Directory names and file paths (e.g., /home/user/documents, C:\Users\foo)
- Folder names used as proper nouns: in "workspace folder" keep "workspace", translate only "folder"
- Technical abbreviations and acronyms (CWD, CLI, API, CPU, RAM), without expanding them
- Commands, flags, and shell syntax (e.g., grep, sort, --output)
- Function, class, variable, and API names (e.g., load_config, HttpClient)
- URLs, email addresses, and domain names

### DO translate:
- Everything else, fluently and idiomatically, the way a native speaker would write it
- Idioms and colloquial phrases into their natural equivalent, never word for word
- Instructions as instructions and questions as questions, keeping intent and tone

### Formatting:
- Preserve markdown, line breaks, placeholders, and punctuation style
- If an entry is already in {}, return it unchanged
- If an entry is empty, return an empty string

### Output:
- Return ONLY a JSON array of strings, with no explanation and no code fences
- The array must have exactly as many entries as the input, in the same order
- Never merge, split, add, or drop entries"#,
        target_language, target_language
    )
}

/// Build the user prompt carrying one batch of texts
pub fn build_translation_user_prompt(target_language: &str, texts: &[String]) -> String {
    let texts_json = serde_json::to_string_pretty(texts).unwrap_or_else(|_| "[]".to_string());
    format!(
        "Translate the following {} texts into {}.\n\
         Keep file names, directory names, paths, abbreviations, commands, and technical proper nouns exactly as they appear.\n\n\
         Input JSON array:\n{}\n\n\
         Return only the translated JSON array with {} entries.",
        texts.len(),
        target_language,
        texts_json,
        texts.len()
    )
}

/// System prompt for the review judge
pub const JUDGE_SYSTEM_PROMPT: &str = r#"You are a strict translation quality reviewer.

You receive an original English text, its translation, and the target language.

## Check:
1. Grammar: is the translation grammatically correct?
2. Naturalness: does it read like something a native speaker would write? Flag stiff or word-for-word renderings.
3. Preservation: file names, paths, folder names used as names, abbreviations (CWD, CLI, API), commands, flags, code identifiers, URLs, and email addresses must appear exactly as in the source.

## Output:
Return ONLY a JSON object, no code fences:
- {"ok": true} if the translation is acceptable
- {"ok": false, "feedback": "..."} otherwise, explaining the problem and how to fix it. Give guidance, not a full rewritten sentence."#;

/// Build the user prompt for judging one translation
pub fn build_judge_user_prompt(original: &str, translated: &str, target_language: &str) -> String {
    let pair = serde_json::json!({
        "original": original,
        "translation": translated,
    });
    let pair_json = serde_json::to_string_pretty(&pair).unwrap_or_default();
    format!(
        "Target language: {}\n\nTranslation pair to review:\n{}\n\nReturn only the JSON object.",
        target_language, pair_json
    )
}

/// System prompt for re-translating a single string after review
pub fn build_correction_system_prompt(target_language: &str) -> String {
    format!(
        "You are a professional translator revising your own translation into {}. \
         Apply the reviewer's feedback while keeping file names, paths, abbreviations, \
         commands, identifiers, and URLs exactly as in the source. \
         Return ONLY the corrected translation, with no quotes, notes, or formatting.",
        target_language
    )
}

/// Build the user prompt asking for a corrected translation
pub fn build_correction_user_prompt(
    original: &str,
    previous_translation: &str,
    feedback: &str,
    target_language: &str,
) -> String {
    format!(
        "Your previous translation into {} was reviewed and rejected.\n\n\
         Original English:\n{}\n\n\
         Your previous translation:\n{}\n\n\
         Reviewer feedback:\n{}\n\n\
         Provide a corrected translation that addresses the feedback.",
        target_language, original, previous_translation, feedback
    )
}
