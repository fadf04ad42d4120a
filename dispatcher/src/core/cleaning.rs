//! Extraction of structured values from free-form model responses

use std::sync::LazyLock;
use regex::Regex;

/// Number of functions a functions-analysis response is expected to list
pub const EXPECTED_FUNCTIONS: usize = 5;

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid think-block pattern"));

static INTRO_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)^\s*.*?(is involved in|is primarily involved in|here are the top 5 main functions associated with these regions|functions of).*?:\s*",
    )
    .expect("valid intro pattern")
});

static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(.*?)\]").expect("valid bracket pattern"));

static NUMBERING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\d+\.\s*|Function\s*\d+:\s*)").expect("valid numbering pattern"));

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d*\.?\d+").expect("valid number pattern"));

const PLACEHOLDERS: [&str; 3] = ["unknown", "unclear", "n/a"];

fn strip_think_blocks(response: &str) -> String {
    THINK_BLOCK.replace_all(response, "").trim().to_string()
}

/// Pull up to five function names out of a model's answer
///
/// Reasoning blocks and introductory sentences are dropped, a bracketed list
/// is preferred when present, and numbering such as `1.` or `Function 2:` is
/// removed before splitting on commas.
pub fn clean_functions_response(response: &str) -> Vec<String> {
    let response = strip_think_blocks(response);
    let response = INTRO_TEXT.replace(&response, "");

    let listed = match BRACKETED.captures(&response) {
        Some(captures) => captures.get(1).map_or("", |m| m.as_str()).to_string(),
        None => response.to_string(),
    };
    let listed = NUMBERING.replace_all(&listed, "");

    listed
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty() && !PLACEHOLDERS.contains(&item.to_lowercase().as_str()))
        .map(|item| item.trim_matches(['"', '\'']).to_string())
        .take(EXPECTED_FUNCTIONS)
        .collect()
}

/// First number in `[-1, 1]` found in the answer, or `0.0` when there is none
pub fn clean_probability_response(response: &str) -> f64 {
    let response = strip_think_blocks(response);

    NUMBER
        .find_iter(&response)
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .find(|value| (-1.0..=1.0).contains(value))
        .unwrap_or(0.0)
}
