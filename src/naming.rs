use std::sync::LazyLock;

use regex::Regex;

pub const UNKNOWN_TOKEN: &str = "unknown";
pub const IMAGE_EXTENSION: &str = "jpg";

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static pattern"));
static NOT_TOKEN_CHAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w-]").expect("static pattern"));
static NOT_WORD_CHAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\W+").expect("static pattern"));

/// Maps a taxonomic label to a lowercase token usable as a path segment.
///
/// Whitespace runs become a single `_`; anything that is not a letter,
/// digit, `_` or `-` is dropped. A missing label maps to `"unknown"`.
pub fn sanitize_name(label: Option<&str>) -> String {
    let Some(label) = label else {
        return UNKNOWN_TOKEN.to_string();
    };
    let lowered = label.to_lowercase();
    let underscored = WHITESPACE_RUN.replace_all(lowered.trim(), "_");
    NOT_TOKEN_CHAR.replace_all(&underscored, "").into_owned()
}

/// Returns `"_<id>"` built from the last path segment of an observation page
/// URL, or an empty string when no usable id can be derived.
pub fn observation_id_fragment(url: Option<&str>) -> String {
    let Some(url) = url else {
        return String::new();
    };
    let tail = url.rsplit_once('/').map_or(url, |(_, tail)| tail);
    let id = NOT_WORD_CHAR.replace_all(tail, "");
    if id.is_empty() {
        String::new()
    } else {
        format!("_{id}")
    }
}

/// Deterministic file name for a record: `{token}{id_fragment}_{position}.jpg`.
pub fn image_file_name(
    scientific_name: Option<&str>,
    url: Option<&str>,
    position: usize,
) -> String {
    format!(
        "{}{}_{}.{}",
        sanitize_name(scientific_name),
        observation_id_fragment(url),
        position,
        IMAGE_EXTENSION
    )
}
