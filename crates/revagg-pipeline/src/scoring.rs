//! Quality score + content-type heuristics for a single unit.

use std::sync::OnceLock;

use regex::Regex;
use revagg_core::{ContentType, RawContentUnit};

pub const BASE_SCORE: i32 = 30;

/// Engagement thresholds, checked top-down; the first one reached applies.
const ENGAGEMENT_STEPS: [(u64, i32); 5] = [(100, 30), (50, 20), (20, 15), (10, 10), (1, 5)];

const QUESTION_PENALTY: i32 = 5;
const STRONG_EXPERIENCE_BONUS: i32 = 20;
const EXPERIENCE_BONUS: i32 = 10;
const OPINION_BONUS: i32 = 5;
const NUMERIC_CLAIM_BONUS: i32 = 5;
const SPAM_PENALTY: i32 = 40;

const INTERROGATIVES: &[&str] = &[
    "how", "what", "why", "which", "when", "where", "who", "is", "are", "does", "do", "did",
    "should", "can", "could", "will", "would", "anyone", "any",
];

const EXPERIENCE_PATTERNS: &[&str] = &[
    // first-person ownership
    r"\b(i|we)\s+(own|owned|bought|purchased|rode|ride|use|used)\b",
    r"\b(i've|i have|we've|we have)\s+(been riding|been using|owned|done|clocked|completed|covered)\b",
    r"\bmy (bike|motorcycle|scooter|car|vehicle|ride|unit)\b",
    // distances and durations
    r"\b\d[\d,]*\s*(km|kms|kilometers|kilometres|miles)\b",
    r"\b\d+\s*(days?|weeks?|months?|years?)\b",
    r"\bafter \d+",
    // maintenance
    r"\b(servic(e|ed|ing)|maintenance|oil change|warranty|spares|chain lube|tyres? changed)\b",
    r"\b(long[- ]term|odo(meter)?|clocked)\b",
];

const OPINION_PATTERNS: &[&str] = &[
    r"\b(i think|i feel|imo|imho|in my opinion|i prefer|i believe|personally)\b",
    r"\b(better than|worse than|worth it|not worth|overpriced|overrated|underrated)\b",
];

const NUMERIC_CLAIM_PATTERNS: &[&str] = &[
    // price
    r"(₹|\brs\.?|\binr)\s*\d|\b\d[\d,.]*\s*(lakhs?|k)\b",
    // efficiency
    r"\b\d+(\.\d+)?\s*(kmpl|km/l|km per litre|mpg)\b",
    // technical spec
    r"\b\d+(\.\d+)?\s*(cc|bhp|hp|ps|nm|kw|kmph)\b",
];

const SPAM_PATTERNS: &[&str] = &[
    r"\bsubscribe\b",
    r"\b(my|our) (channel|profile|page)\b",
    r"\b(please|pls|plz)\s+(like|share|subscribe)\b|\blike and (share|subscribe)\b",
    r"\b(whatsapp|telegram|dm me|contact me|call me)\b",
    r"\b(click|tap) (the |this |my )?link\b|\blink in (bio|description)\b",
    r"\breply (to this|if you)\b|\bcomment (below|if you)\b",
    r"\b(giveaway|free gift|earn money|work from home)\b",
];

/// Pattern tables behind the scorer. Swappable as a unit.
#[derive(Debug, Clone)]
pub struct ScoringRules {
    pub experience: Vec<Regex>,
    pub opinion: Vec<Regex>,
    pub numeric_claims: Vec<Regex>,
    pub spam: Vec<Regex>,
}

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("built-in scoring pattern compiles"))
        .collect()
}

impl ScoringRules {
    pub fn builtin() -> &'static ScoringRules {
        static RULES: OnceLock<ScoringRules> = OnceLock::new();
        RULES.get_or_init(|| ScoringRules {
            experience: compile_all(EXPERIENCE_PATTERNS),
            opinion: compile_all(OPINION_PATTERNS),
            numeric_claims: compile_all(NUMERIC_CLAIM_PATTERNS),
            spam: compile_all(SPAM_PATTERNS),
        })
    }
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self::builtin().clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assessment {
    pub quality: u8,
    pub content_type: ContentType,
    pub experience_hits: usize,
    pub spam_hits: usize,
}

pub fn score_unit(unit: &RawContentUnit) -> Assessment {
    score_with(ScoringRules::builtin(), unit)
}

/// Deterministic and total: every input yields a score in [0,100].
pub fn score_with(rules: &ScoringRules, unit: &RawContentUnit) -> Assessment {
    let text = unit.text.trim();
    let lower = text.to_lowercase();

    let mut score = BASE_SCORE;
    score += length_adjustment(text.chars().count());
    score += engagement_bonus(unit.engagement);

    let mut content_type = ContentType::Other;
    if is_question(&lower) {
        content_type = ContentType::Question;
        score -= QUESTION_PENALTY;
    }

    let experience_hits = count_hits(&rules.experience, &lower);
    if experience_hits >= 2 {
        content_type = ContentType::Experience;
        score += STRONG_EXPERIENCE_BONUS;
    } else if experience_hits == 1 {
        score += EXPERIENCE_BONUS;
        if content_type != ContentType::Question {
            content_type = ContentType::Experience;
        }
    }

    if content_type == ContentType::Other && count_hits(&rules.opinion, &lower) > 0 {
        content_type = ContentType::Opinion;
        score += OPINION_BONUS;
    }

    score += NUMERIC_CLAIM_BONUS * count_hits(&rules.numeric_claims, &lower) as i32;

    let spam_hits = count_hits(&rules.spam, &lower) + usize::from(has_emoji_flood(text));
    if spam_hits >= 1 {
        score -= SPAM_PENALTY;
    }
    if spam_hits >= 2 {
        content_type = ContentType::Spam;
    }

    Assessment {
        quality: score.clamp(0, 100) as u8,
        content_type,
        experience_hits,
        spam_hits,
    }
}

fn length_adjustment(chars: usize) -> i32 {
    match chars {
        0..=19 => -15,
        20..=49 => 0,
        50..=400 => 10,
        _ => 5,
    }
}

fn engagement_bonus(engagement: u64) -> i32 {
    ENGAGEMENT_STEPS
        .iter()
        .find(|(threshold, _)| engagement >= *threshold)
        .map(|(_, bonus)| *bonus)
        .unwrap_or(0)
}

fn is_question(lower: &str) -> bool {
    if lower.contains('?') {
        return true;
    }
    lower
        .split_whitespace()
        .next()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .is_some_and(|w| INTERROGATIVES.contains(&w))
}

fn count_hits(patterns: &[Regex], lower: &str) -> usize {
    patterns.iter().filter(|p| p.is_match(lower)).count()
}

/// Star rating glyphs sit inside the symbol block but are not emoji.
const RATING_GLYPHS: [char; 4] = ['★', '☆', '✩', '✪'];

fn is_emoji(c: char) -> bool {
    !RATING_GLYPHS.contains(&c) && matches!(c as u32, 0x1F000..=0x1FAFF | 0x2600..=0x27BF)
}

/// Four or more emoji overall, or three identical ones in a row.
fn has_emoji_flood(text: &str) -> bool {
    let mut total = 0usize;
    let mut run = 0usize;
    let mut prev: Option<char> = None;
    for c in text.chars() {
        // variation selector + zero-width joiner ride along with the emoji
        if c == '\u{FE0F}' || c == '\u{200D}' {
            continue;
        }
        if is_emoji(c) {
            total += 1;
            run = if prev == Some(c) { run + 1 } else { 1 };
            if run >= 3 {
                return true;
            }
            prev = Some(c);
        } else {
            prev = None;
            run = 0;
        }
    }
    total >= 4
}
