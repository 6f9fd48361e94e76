//! Cleanup of model-generated text before it enters the transcript.

use std::sync::LazyLock;

use regex::Regex;

/// Reasoning/internal tags stripped together with their content.
const REASONING_TAGS: &[&str] = &[
    "thinking",
    "think",
    "reflection",
    "reflect",
    "internal",
    "reasoning",
    "thought",
    "scratchpad",
    "scratch",
    "plan",
    "analysis",
    "deliberation",
];

static REASONING_BLOCKS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    REASONING_TAGS
        .iter()
        .filter_map(|tag| Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}>")).ok())
        .collect()
});

static ORPHAN_TAGS: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"</?\w+[^>]*>").ok());

static WHITESPACE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\s+").ok());

/// Strip reasoning blocks, leftover tags and markdown emphasis, then collapse
/// all whitespace so the result fits on one transcript line.
pub fn sanitize_response(response: &str) -> String {
    let mut result = response.to_string();

    for re in REASONING_BLOCKS.iter() {
        result = re.replace_all(&result, "").into_owned();
    }

    if let Some(re) = ORPHAN_TAGS.as_ref() {
        result = re.replace_all(&result, "").into_owned();
    }

    result = result.replace('*', "");

    single_line(&result)
}

/// Collapse runs of whitespace (including newlines) into single spaces.
pub fn single_line(text: &str) -> String {
    match WHITESPACE.as_ref() {
        Some(re) => re.replace_all(text.trim(), " ").into_owned(),
        None => text.split_whitespace().collect::<Vec<_>>().join(" "),
    }
}
