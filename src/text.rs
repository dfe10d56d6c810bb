//! Deterministic text normalization shared by the index and query paths.
//!
//! The same pipeline runs on catalog documents and on incoming queries, so a
//! query can only match a document if both sides normalize identically.
//! Non-ASCII input (including CJK) normalizes to nothing by construction:
//! the final character-class fold keeps only `[a-z0-9]`. That is long-standing
//! observable behavior, not an oversight.

use std::collections::HashSet;
use std::sync::LazyLock;

/// Closed list of English function words and filler dropped from token streams.
pub const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "also", "am", "an", "and",
    "any", "are", "as", "at", "be", "because", "been", "before", "being",
    "below", "between", "both", "but", "by", "can", "could", "did", "do",
    "does", "doing", "down", "during", "each", "few", "for", "from", "further",
    "had", "has", "have", "having", "he", "her", "here", "hers", "him", "his",
    "how", "i", "if", "in", "into", "is", "it", "its", "just", "me", "more",
    "most", "my", "no", "nor", "not", "now", "of", "off", "on", "once", "only",
    "or", "other", "our", "out", "over", "own", "per", "same", "she", "should",
    "so", "some", "such", "than", "that", "the", "their", "them", "then",
    "there", "these", "they", "this", "those", "through", "to", "too", "under",
    "until", "up", "very", "via", "was", "we", "were", "what", "when", "where",
    "which", "while", "who", "why", "will", "with", "would", "you", "your",
];

static DEFAULT_STOPWORDS: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOPWORDS.iter().copied().collect());

pub const DEFAULT_MIN_TOKEN_LENGTH: usize = 2;

/// Tokenization knobs. The defaults match the index-side configuration, so
/// custom options only make sense when index and query paths share them.
#[derive(Clone, Debug)]
pub struct TokenizerOptions {
    pub min_token_length: usize,
    pub stopwords: HashSet<String>,
}

impl Default for TokenizerOptions {
    fn default() -> Self {
        Self {
            min_token_length: DEFAULT_MIN_TOKEN_LENGTH,
            stopwords: STOPWORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Normalize text to lowercase alphanumeric words separated by single spaces.
///
/// Steps, in order: fold `_`/`-` runs to a space, split camelCase, split at
/// letter<->digit boundaries in both directions, lowercase, fold every run of
/// characters outside `[a-z0-9]` to a single space, trim. Idempotent.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev: Option<char> = None;
    let mut pending_space = false;

    for c in text.chars() {
        if c == '_' || c == '-' {
            pending_space = !out.is_empty();
            prev = Some(c);
            continue;
        }

        let boundary = match prev {
            Some(p) => {
                ((p.is_ascii_lowercase() || p.is_ascii_digit()) && c.is_ascii_uppercase())
                    || (p.is_ascii_alphabetic() && c.is_ascii_digit())
                    || (p.is_ascii_digit() && c.is_ascii_alphabetic())
            }
            None => false,
        };
        prev = Some(c);

        let lower = c.to_ascii_lowercase();
        if lower.is_ascii_lowercase() || lower.is_ascii_digit() {
            if (pending_space || boundary) && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(lower);
        } else {
            pending_space = !out.is_empty();
        }
    }

    out
}

/// Normalized text with internal spaces removed, for exact/prefix name
/// comparison only.
pub fn normalize_for_match(text: &str) -> String {
    normalize(text).replace(' ', "")
}

/// Tokenize with the default options.
pub fn tokenize(text: &str) -> Vec<String> {
    tokenize_filtered(text, DEFAULT_MIN_TOKEN_LENGTH, |token| {
        DEFAULT_STOPWORDS.contains(token)
    })
}

/// Tokenize with caller-supplied options.
pub fn tokenize_with(text: &str, options: &TokenizerOptions) -> Vec<String> {
    tokenize_filtered(text, options.min_token_length, |token| {
        options.stopwords.contains(token)
    })
}

fn tokenize_filtered(
    text: &str,
    min_token_length: usize,
    is_stopword: impl Fn(&str) -> bool,
) -> Vec<String> {
    normalize(text)
        .split_whitespace()
        .filter(|token| token.len() >= min_token_length && !is_stopword(token))
        .map(|token| token.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_separators_and_case() {
        assert_eq!(normalize("post_message"), "post message");
        assert_eq!(normalize("get-weather--now"), "get weather now");
        assert_eq!(normalize("getWeatherNow"), "get weather now");
        assert_eq!(normalize("HTTPServer"), "httpserver");
    }

    #[test]
    fn test_normalize_letter_digit_boundaries() {
        assert_eq!(normalize("sha256sum"), "sha 256 sum");
        assert_eq!(normalize("v2"), "v 2");
        assert_eq!(normalize("utf8Decode"), "utf 8 decode");
    }

    #[test]
    fn test_normalize_strips_punctuation() {
        assert_eq!(normalize("read/write (files)!"), "read write files");
        assert_eq!(normalize("  spaced   out  "), "spaced out");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for s in ["post_message", "getWeatherNow", "a1b2C3", "read/write"] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn test_normalize_tokenize_law() {
        for s in ["sendSlackMessage", "query_db_v2", "The quick brown fox"] {
            assert_eq!(tokenize(&normalize(s)), tokenize(s));
        }
    }

    #[test]
    fn test_non_ascii_yields_no_tokens() {
        assert_eq!(normalize("日本語テキスト"), "");
        assert!(tokenize("日本語テキスト").is_empty());
        assert_eq!(tokenize("café"), vec!["caf".to_string()]);
    }

    #[test]
    fn test_tokenize_drops_short_and_stopwords() {
        assert_eq!(
            tokenize("send a message to the channel"),
            vec!["send".to_string(), "message".to_string(), "channel".to_string()]
        );
        // single-character tokens fall below the default length floor
        assert_eq!(tokenize("x y z"), Vec::<String>::new());
    }

    #[test]
    fn test_tokenize_with_custom_options() {
        let options = TokenizerOptions {
            min_token_length: 1,
            stopwords: HashSet::new(),
        };
        assert_eq!(
            tokenize_with("a to b", &options),
            vec!["a".to_string(), "to".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn test_normalize_for_match_removes_spaces() {
        assert_eq!(normalize_for_match("post_message"), "postmessage");
        assert_eq!(normalize_for_match("Post Message"), "postmessage");
    }

    #[test]
    fn test_determinism() {
        let a = tokenize("Sync MCP tools into the router catalog");
        let b = tokenize("Sync MCP tools into the router catalog");
        assert_eq!(a, b);
    }
}
