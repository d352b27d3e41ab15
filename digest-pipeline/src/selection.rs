use crate::types::AnnotatedItem;
use std::collections::HashMap;
use tracing::{debug, info};

/// Share of a candidate's significant words that must match an already
/// selected title before the candidate counts as the same topic.
pub const DUPLICATE_TOPIC_THRESHOLD: f64 = 0.4;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "is", "are", "was", "were", "be", "how", "why", "what", "when", "where",
];

/// Greedy top-N selection under a per-category cap.
#[derive(Debug, Clone, Copy)]
pub struct DiversitySelector {
    pub top_n: usize,
    pub category_cap: usize,
}

impl DiversitySelector {
    pub fn new(top_n: usize, category_cap: usize) -> Self {
        Self { top_n, category_cap }
    }

    /// Walk the score-sorted candidates once and accept each one unless its
    /// category is full or its title repeats a selected topic.
    ///
    /// There is no second pass: when the constraints run out of eligible
    /// candidates the result is shorter than `top_n`.
    pub fn select(&self, candidates: Vec<AnnotatedItem>) -> Vec<AnnotatedItem> {
        let mut selected = Vec::with_capacity(self.top_n);
        let mut per_category: HashMap<String, usize> = HashMap::new();
        let mut selected_titles: Vec<String> = Vec::with_capacity(self.top_n);

        for candidate in candidates {
            if selected.len() >= self.top_n {
                break;
            }

            let taken = per_category.get(&candidate.category).copied().unwrap_or(0);
            if taken >= self.category_cap {
                debug!(
                    "Skipping '{}': category '{}' limit reached ({}/{})",
                    candidate.title(),
                    candidate.category,
                    taken,
                    self.category_cap
                );
                continue;
            }

            if is_duplicate_topic(candidate.title(), &selected_titles) {
                debug!("Skipping '{}': similar topic already selected", candidate.title());
                continue;
            }

            *per_category.entry(candidate.category.clone()).or_insert(0) += 1;
            selected_titles.push(candidate.title().to_string());
            selected.push(candidate);
        }

        info!(
            "Selected {} items across {} categories",
            selected.len(),
            per_category.len()
        );
        selected
    }
}

fn significant_words(title: &str) -> Vec<String> {
    title
        .to_lowercase()
        .split_whitespace()
        .filter(|word| word.chars().count() > 2 && !STOP_WORDS.contains(word))
        .map(str::to_string)
        .collect()
}

fn words_match(a: &str, b: &str) -> bool {
    a.starts_with(b) || b.starts_with(a)
}

/// True when `title` shares more than [`DUPLICATE_TOPIC_THRESHOLD`] of its
/// significant words with any of `selected_titles`.
///
/// Words match when one is a prefix of the other ("release"/"released").
/// The ratio is taken over the candidate's words only, so the check is not
/// symmetric.
pub fn is_duplicate_topic(title: &str, selected_titles: &[String]) -> bool {
    let words = significant_words(title);
    if words.is_empty() {
        return false;
    }

    selected_titles.iter().any(|selected| {
        let selected_words = significant_words(selected);
        let common = words
            .iter()
            .filter(|word| selected_words.iter().any(|other| words_match(word, other)))
            .count();
        common as f64 / words.len() as f64 > DUPLICATE_TOPIC_THRESHOLD
    })
}
