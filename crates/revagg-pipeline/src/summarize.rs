//! Extractive summaries and sentence-boundary truncation for long-form text.
//!
//! All lengths are counted in chars, never bytes.

const ELLIPSIS: char = '…';

/// Word prefixes that mark a sentence as relevant to an owner review.
const DOMAIN_KEYWORDS: &[&str] = &[
    "engine", "mileage", "kmpl", "fuel", "comfort", "seat", "suspension", "pillion", "brake",
    "handling", "corner", "service", "maintenance", "spares", "warranty", "price", "cost",
    "value", "build", "quality", "highway", "touring", "city", "traffic", "vibration", "torque",
    "power", "gear", "clutch", "tyre", "tire", "ride", "problem", "issue",
];

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn normalize(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits on `.`, `!`, `?` followed by whitespace (or the end), and on newlines.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\n' {
            flush(&mut current, &mut sentences);
            continue;
        }
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().map_or(true, |n| n.is_whitespace()) {
            flush(&mut current, &mut sentences);
        }
    }
    flush(&mut current, &mut sentences);
    sentences
}

fn flush(current: &mut String, sentences: &mut Vec<String>) {
    let sentence = normalize(current);
    if !sentence.is_empty() {
        sentences.push(sentence);
    }
    current.clear();
}

/// Domain keyword hits, plus 2 when the sentence carries a number.
pub fn sentence_score(sentence: &str) -> usize {
    let lower = sentence.to_lowercase();
    let hits = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .filter(|w| DOMAIN_KEYWORDS.iter().any(|k| w.starts_with(k)))
        .count();
    let number_bonus = if lower.chars().any(|c| c.is_ascii_digit()) { 2 } else { 0 };
    hits + number_bonus
}

/// Highest-scoring sentences that fit `budget`, emitted in their original order.
pub fn summarize(text: &str, budget: usize) -> String {
    let normalized = normalize(text);
    if char_len(&normalized) <= budget {
        return normalized;
    }

    let sentences = split_sentences(text);
    let mut ranked: Vec<(usize, usize)> = sentences
        .iter()
        .enumerate()
        .map(|(idx, s)| (idx, sentence_score(s)))
        .filter(|(_, score)| *score > 0)
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut chosen = Vec::new();
    let mut used = 0usize;
    for (idx, _) in ranked {
        let len = char_len(&sentences[idx]);
        let extra = if chosen.is_empty() { len } else { len + 1 };
        if used + extra <= budget {
            used += extra;
            chosen.push(idx);
        }
    }
    chosen.sort_unstable();

    let summary = chosen
        .iter()
        .map(|idx| sentences[*idx].as_str())
        .collect::<Vec<_>>()
        .join(" ");
    if char_len(&summary) < budget / 3 {
        return truncate_at_sentence(text, budget);
    }
    summary
}

/// Leading whole sentences that fit; a word-boundary cut when none does.
pub fn truncate_at_sentence(text: &str, max_chars: usize) -> String {
    let normalized = normalize(text);
    if char_len(&normalized) <= max_chars {
        return normalized;
    }

    let mut out = String::new();
    let mut used = 0usize;
    for sentence in split_sentences(text) {
        let len = char_len(&sentence);
        let extra = if out.is_empty() { len } else { len + 1 };
        if used + extra > max_chars {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&sentence);
        used += extra;
    }

    if out.is_empty() {
        clip_words(&normalized, max_chars)
    } else {
        out
    }
}

/// Cuts at a word boundary and appends `…`; the result never exceeds `max_chars`.
pub fn clip_words(text: &str, max_chars: usize) -> String {
    let normalized = normalize(text);
    if char_len(&normalized) <= max_chars {
        return normalized;
    }
    if max_chars == 0 {
        return String::new();
    }

    let room = max_chars - 1;
    let mut out = String::new();
    for word in normalized.split(' ') {
        let extra = if out.is_empty() { char_len(word) } else { char_len(word) + 1 };
        if char_len(&out) + extra > room {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    if out.is_empty() {
        out = normalized.chars().take(room).collect();
    }
    out.push(ELLIPSIS);
    out
}
