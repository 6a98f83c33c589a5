//! Near-duplicate removal over word-set Jaccard similarity.

use std::collections::BTreeSet;

/// Words of length <= this are ignored when building word sets.
const MIN_WORD_CHARS: usize = 3;

pub fn normalize_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Lower-cased alphanumeric words longer than three characters.
pub fn word_set(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > MIN_WORD_CHARS)
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity in [0,1].
///
/// Texts with no qualifying words compare equal only when their normalized
/// text is identical and non-empty.
pub fn similarity(a: &str, b: &str) -> f64 {
    set_similarity(&word_set(a), &normalize_text(a), &word_set(b), &normalize_text(b))
}

#[derive(Debug, Clone, PartialEq)]
pub struct DedupOutcome<T> {
    pub kept: Vec<T>,
    pub removed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deduplicator {
    threshold: f64,
}

impl Deduplicator {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Greedy, order-preserving: an item is kept unless it is more similar
    /// than the threshold to something already kept.
    pub fn apply<T>(&self, items: Vec<T>, text_of: impl Fn(&T) -> &str) -> DedupOutcome<T> {
        let mut kept: Vec<T> = Vec::with_capacity(items.len());
        let mut kept_sets: Vec<(BTreeSet<String>, String)> = Vec::with_capacity(items.len());
        let mut removed = 0usize;

        for item in items {
            let text = text_of(&item);
            let words = word_set(text);
            let normalized = normalize_text(text);
            let duplicate = kept_sets.iter().any(|(other, other_norm)| {
                set_similarity(&words, &normalized, other, other_norm) > self.threshold
            });
            if duplicate {
                removed += 1;
                continue;
            }
            kept_sets.push((words, normalized));
            kept.push(item);
        }

        DedupOutcome { kept, removed }
    }
}

fn set_similarity(a: &BTreeSet<String>, a_norm: &str, b: &BTreeSet<String>, b_norm: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return if !a_norm.is_empty() && a_norm == b_norm { 1.0 } else { 0.0 };
    }
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts() -> Vec<&'static str> {
        vec![
            "The engine is smooth and refined after the first service",
            "Engine is smooth and refined after first service, really happy",
            "Seat comfort is poor on long highway rides",
            "Mileage around 35 kmpl in the city",
            "Seat comfort is poor on long highway rides",
            "ok",
            "ok",
        ]
    }

    #[test]
    fn identical_texts_are_fully_similar() {
        assert_eq!(similarity("Seat comfort is poor", "seat  COMFORT is poor"), 1.0);
        assert_eq!(similarity("ok", "OK"), 1.0);
    }

    #[test]
    fn disjoint_texts_have_zero_similarity() {
        assert_eq!(similarity("engine smooth refined", "mileage city traffic"), 0.0);
        // short words do not count as overlap
        assert_eq!(similarity("the bike is ok", "the car is ok"), 0.0);
        assert_eq!(similarity("", ""), 0.0);
    }

    #[test]
    fn apply_drops_near_duplicates_in_input_order() {
        let outcome = Deduplicator::new(0.5).apply(texts(), |t| *t);
        assert_eq!(
            outcome.kept,
            vec![
                "The engine is smooth and refined after the first service",
                "Seat comfort is poor on long highway rides",
                "Mileage around 35 kmpl in the city",
                "ok",
            ]
        );
        assert_eq!(outcome.removed, 3);
    }

    #[test]
    fn apply_is_idempotent() {
        for threshold in [0.3, 0.5, 0.7] {
            let dedup = Deduplicator::new(threshold);
            let once = dedup.apply(texts(), |t| *t).kept;
            let twice = dedup.apply(once.clone(), |t| *t);
            assert_eq!(twice.kept, once);
            assert_eq!(twice.removed, 0);
        }
    }

    #[test]
    fn threshold_is_strict() {
        // {engine, smooth} vs {engine, rough}: 1/3
        let items = vec!["engine smooth", "engine rough"];
        assert_eq!(Deduplicator::new(1.0 / 3.0).apply(items.clone(), |t| *t).kept.len(), 2);
        assert_eq!(Deduplicator::new(0.3).apply(items, |t| *t).kept.len(), 1);
    }
}
