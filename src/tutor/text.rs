//! Small keyword helpers shared by the response classifiers.

/// Lowercases, strips punctuation and pads with spaces so phrases can be
/// matched on word boundaries.
pub(crate) fn normalize(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '\'' { c } else { ' ' })
        .collect();
    let joined = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    format!(" {joined} ")
}

pub(crate) fn contains_phrase(normalized: &str, phrase: &str) -> bool {
    let phrase = phrase.trim();
    if phrase.is_empty() {
        return false;
    }
    normalized.contains(&format!(" {phrase} "))
}

pub(crate) fn contains_any(normalized: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| contains_phrase(normalized, p))
}

/// Words longer than three characters, normalized.
pub(crate) fn significant_words(text: &str) -> Vec<String> {
    normalize(text)
        .split_whitespace()
        .filter(|w| w.chars().count() > 3)
        .map(str::to_string)
        .collect()
}

/// Share of `reference`'s significant words that appear in `normalized`.
/// `None` when the reference has no significant words.
pub(crate) fn word_overlap(normalized: &str, reference: &str) -> Option<f64> {
    let words = significant_words(reference);
    if words.is_empty() {
        return None;
    }
    let hits = words.iter().filter(|w| contains_phrase(normalized, w)).count();
    Some(hits as f64 / words.len() as f64)
}
