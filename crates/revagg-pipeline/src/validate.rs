//! Checks that collected content is actually about the target entity.

use std::collections::BTreeSet;

use regex::{Regex, RegexBuilder};
use revagg_core::{EntityMention, SourceCorpus, ValidationReport, WebSnippet};
use tracing::{info, warn};

pub const DEFAULT_CONFIDENCE_THRESHOLD: u8 = 50;
const MAX_UNEXPECTED_ENTITIES: usize = 5;

/// Manufacturer and filler tokens stripped before picking the model name.
pub const DEFAULT_BRANDS: &[&str] = &[
    "royal", "enfield", "re", "bajaj", "tvs", "hero", "motocorp", "honda", "ktm", "kawasaki",
    "triumph", "suzuki", "yamaha", "harley", "davidson", "bmw", "ducati", "jawa", "yezdi", "bike",
    "motorcycle",
];

pub const DEFAULT_KNOWN_MODELS: &[&str] = &[
    "classic", "bullet", "hunter", "meteor", "himalayan", "interceptor", "continental", "scram",
    "thunderbird", "shotgun", "guerrilla", "pulsar", "dominar", "avenger", "platina", "apache",
    "ronin", "raider", "jupiter", "ntorq", "splendor", "xpulse", "xtreme", "karizma", "unicorn",
    "hness", "cb350", "activa", "duke", "ninja", "versys", "z900", "trident", "gixxer", "burgman",
    "intruder", "r15", "mt15", "fz", "aerox", "perak",
];

#[derive(Debug, Clone)]
pub struct CorpusValidator {
    brands: BTreeSet<String>,
    known_models: Vec<String>,
    confidence_threshold: u8,
}

impl Default for CorpusValidator {
    fn default() -> Self {
        Self::new(
            DEFAULT_BRANDS.iter().map(|s| s.to_string()),
            DEFAULT_KNOWN_MODELS.iter().map(|s| s.to_string()),
            DEFAULT_CONFIDENCE_THRESHOLD,
        )
    }
}

fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn word_pattern(word: &str) -> Option<Regex> {
    RegexBuilder::new(&format!(r"\b{}\b", regex::escape(word)))
        .case_insensitive(true)
        .build()
        .ok()
}

impl CorpusValidator {
    pub fn new(
        brands: impl IntoIterator<Item = String>,
        known_models: impl IntoIterator<Item = String>,
        confidence_threshold: u8,
    ) -> Self {
        Self {
            brands: brands.into_iter().map(|b| b.to_lowercase()).collect(),
            known_models: known_models.into_iter().map(|m| m.to_lowercase()).collect(),
            confidence_threshold,
        }
    }

    pub fn with_confidence_threshold(mut self, threshold: u8) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Most distinctive token of the entity name: a known model if present,
    /// else the longest alphabetic non-brand token, else the whole name.
    pub fn canonical_name(&self, entity: &str) -> String {
        let candidates: Vec<String> = tokens(entity)
            .into_iter()
            .filter(|t| !self.brands.contains(t))
            .collect();
        if let Some(model) = candidates.iter().find(|t| self.known_models.contains(t)) {
            return model.clone();
        }
        let mut best: Option<&String> = None;
        for token in candidates.iter().filter(|t| t.chars().all(char::is_alphabetic)) {
            if best.map_or(true, |b| token.chars().count() > b.chars().count()) {
                best = Some(token);
            }
        }
        match best {
            Some(token) => token.clone(),
            None => entity.trim().to_lowercase(),
        }
    }

    /// Never fails; an empty corpus yields confidence 0 and one warning.
    pub fn validate(
        &self,
        entity: &str,
        corpora: &[SourceCorpus],
        web: Option<&[WebSnippet]>,
    ) -> ValidationReport {
        let canonical = self.canonical_name(entity);
        let full_name = entity.trim().to_lowercase();

        let mut texts: Vec<String> = corpora
            .iter()
            .flat_map(|c| c.items.iter().map(|i| i.combined_text().to_lowercase()))
            .collect();
        let source_items = texts.len();
        if let Some(snippets) = web {
            texts.extend(
                snippets
                    .iter()
                    .map(|s| format!("{} {}", s.title, s.snippet).to_lowercase()),
            );
        }

        let mut report = ValidationReport {
            confidence: 0,
            canonical_name: canonical.clone(),
            items_inspected: texts.len(),
            items_with_target: 0,
            warnings: Vec::new(),
            unexpected_entities: Vec::new(),
        };

        if texts.is_empty() {
            report.warnings.push(format!(
                "no content was collected for {entity}; every source came back empty"
            ));
            warn!(entity, "validation found no content");
            return report;
        }

        let target = word_pattern(&canonical);
        let mentions_target = |text: &str| {
            (!full_name.is_empty() && text.contains(&full_name))
                || target.as_ref().is_some_and(|p| p.is_match(text))
        };
        let hits = texts.iter().filter(|t| mentions_target(t.as_str())).count();
        report.items_with_target = hits;
        report.confidence = ((hits as f64 * 100.0) / texts.len() as f64).round() as u8;

        if source_items == 0 {
            report
                .warnings
                .push(format!("no video, discussion, forum or review items for {entity}"));
        }
        if web.is_some_and(|w| w.is_empty()) {
            report.warnings.push(format!("web search returned no results for {entity}"));
        }
        if report.confidence < self.confidence_threshold {
            report.warnings.push(format!(
                "low confidence ({}%) that collected content is about {entity}",
                report.confidence
            ));
        }

        let own_tokens: BTreeSet<String> = tokens(entity).into_iter().collect();
        let mut unexpected: Vec<EntityMention> = self
            .known_models
            .iter()
            .filter(|m| !own_tokens.contains(*m))
            .filter_map(|m| word_pattern(m).map(|p| (m, p)))
            .map(|(m, p)| EntityMention {
                name: m.clone(),
                mentions: texts.iter().filter(|t| p.is_match(t)).count(),
            })
            .filter(|e| e.mentions > hits)
            .collect();
        unexpected.sort_by(|a, b| b.mentions.cmp(&a.mentions).then_with(|| a.name.cmp(&b.name)));
        unexpected.truncate(MAX_UNEXPECTED_ENTITIES);
        for candidate in &unexpected {
            report.warnings.push(format!(
                "\"{}\" is mentioned in {} items, more than {entity} ({hits})",
                candidate.name, candidate.mentions
            ));
        }
        report.unexpected_entities = unexpected;

        if report.confidence < self.confidence_threshold {
            warn!(
                entity,
                confidence = report.confidence,
                canonical = %report.canonical_name,
                "collected content may be about a different entity"
            );
        } else {
            info!(
                entity,
                confidence = report.confidence,
                items = report.items_inspected,
                "validated corpus"
            );
        }
        report
    }
}
