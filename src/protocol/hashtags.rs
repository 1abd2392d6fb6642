//! Hashtag helpers for free-text message bodies

use once_cell::sync::Lazy;
use regex::Regex;

/// A `#` and everything up to the next whitespace
static HASHTAG_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#\S*").expect("hashtag token pattern is valid"));

/// A tag of two or more word characters at the start or after whitespace
static HASHTAG_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)#(\w{2,})\b").expect("hashtag word pattern is valid"));

/// Remove every `#tag` token and trim the result
pub fn remove_hashtags(text: &str) -> String {
    HASHTAG_TOKEN.replace_all(text, "").trim().to_string()
}

/// Tag names (without `#`) that start the text or follow whitespace
pub fn find_hashtags(text: &str) -> Vec<String> {
    HASHTAG_WORD
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}
