use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Collapses every run of at least `min_run` whitespace characters into
/// `canonical`. Shorter runs are kept as they are.
///
/// Statement memos often pad their sub-fields with a varying number of
/// spaces; templates are written against one canonical separator, so callers
/// normalise before parsing.
pub fn normalize_separators(text: &str, min_run: usize, canonical: &str) -> String {
    static RUN: OnceLock<Regex> = OnceLock::new();
    let run = RUN.get_or_init(|| Regex::new(r"\s+").expect("invalid regex"));
    let min_run = min_run.max(1);
    run.replace_all(text, |caps: &Captures<'_>| {
        let found = &caps[0];
        if found.chars().count() >= min_run {
            canonical.to_string()
        } else {
            found.to_string()
        }
    })
    .into_owned()
}
