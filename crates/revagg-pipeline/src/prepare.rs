//! Turns one source's raw batch into a capped, scored, deduplicated corpus.

use std::sync::OnceLock;

use regex::Regex;
use revagg_adapters::DELETED_AUTHOR;
use revagg_core::{
    ContentType, RawParentItem, RawSourceBatch, ScoredContentUnit, SourceCorpus, SourceItem,
    SourceKind,
};
use tracing::debug;

use crate::dedup::Deduplicator;
use crate::scoring::{score_with, ScoringRules};
use crate::summarize::{clip_words, summarize, truncate_at_sentence};
use crate::taxonomy::TopicTaxonomy;

/// How the long-form text of a parent item is shortened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    Summarize { budget: usize },
    Truncate { max_chars: usize },
}

impl BodyMode {
    pub fn apply(self, text: &str) -> String {
        match self {
            BodyMode::Summarize { budget } => summarize(text, budget),
            BodyMode::Truncate { max_chars } => truncate_at_sentence(text, max_chars),
        }
    }
}

/// Everything that differs between source kinds during preparation.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceProfile {
    pub kind: SourceKind,
    pub max_items: usize,
    pub min_engagement: u64,
    pub min_quality: u8,
    pub max_units_per_item: usize,
    pub max_unit_chars: usize,
    /// Within one source comments are short and noisy, so this sits above
    /// the cross-source merge threshold to avoid over-merging.
    pub dedup_threshold: f64,
    pub body: BodyMode,
    pub inherent_review: bool,
    pub skip_authors: Vec<String>,
    pub min_unit_chars: usize,
}

impl SourceProfile {
    pub fn for_kind(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Video => Self {
                kind,
                max_items: 10,
                min_engagement: 2,
                min_quality: 30,
                max_units_per_item: 5,
                max_unit_chars: 400,
                dedup_threshold: 0.6,
                body: BodyMode::Summarize { budget: 600 },
                inherent_review: false,
                skip_authors: Vec::new(),
                min_unit_chars: 0,
            },
            SourceKind::Discussion => Self {
                kind,
                max_items: 10,
                min_engagement: 1,
                min_quality: 25,
                max_units_per_item: 5,
                max_unit_chars: 300,
                dedup_threshold: 0.7,
                body: BodyMode::Truncate { max_chars: 500 },
                inherent_review: true,
                skip_authors: vec![DELETED_AUTHOR.to_string(), "AutoModerator".to_string()],
                min_unit_chars: 0,
            },
            SourceKind::Forum => Self {
                kind,
                max_items: 15,
                min_engagement: 0,
                min_quality: 25,
                max_units_per_item: 3,
                max_unit_chars: 500,
                dedup_threshold: 0.7,
                body: BodyMode::Truncate { max_chars: 500 },
                inherent_review: true,
                skip_authors: Vec::new(),
                min_unit_chars: 20,
            },
            SourceKind::Review => Self {
                kind,
                max_items: 15,
                min_engagement: 0,
                min_quality: 20,
                max_units_per_item: 10,
                max_unit_chars: 800,
                dedup_threshold: 0.6,
                body: BodyMode::Summarize { budget: 800 },
                inherent_review: true,
                skip_authors: Vec::new(),
                min_unit_chars: 20,
            },
        }
    }

    fn skips_author(&self, author: &str) -> bool {
        self.skip_authors.iter().any(|a| a.eq_ignore_ascii_case(author.trim()))
    }
}

fn review_indicator() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\b(review(ed|s)?|ownership|owners?|long[- ]term|experience|verdict|pros and cons|test ride)\b|\b\d[\d,]*\s*(km|kms|months?|years?)\b",
        )
        .expect("review indicator pattern compiles")
    })
}

/// Substantive review or owner post, judged from title and body.
pub fn looks_like_review(title: &str, body: Option<&str>) -> bool {
    review_indicator().is_match(title) || body.is_some_and(|b| review_indicator().is_match(b))
}

#[derive(Debug, Clone, Default)]
pub struct SourcePreparer {
    taxonomy: TopicTaxonomy,
    scoring: ScoringRules,
}

#[derive(Debug, Default)]
struct PrepareTally {
    duplicates_removed: usize,
    filtered_out: usize,
}

impl SourcePreparer {
    pub fn new(taxonomy: TopicTaxonomy, scoring: ScoringRules) -> Self {
        Self { taxonomy, scoring }
    }

    pub fn taxonomy(&self) -> &TopicTaxonomy {
        &self.taxonomy
    }

    pub fn prepare(&self, batch: RawSourceBatch, profile: &SourceProfile) -> SourceCorpus {
        let RawSourceBatch { kind, entity, mut items } = batch;

        // stable: equal engagement keeps harvest order
        items.sort_by(|a, b| b.engagement.cmp(&a.engagement));
        let dropped_items = items.len().saturating_sub(profile.max_items);
        items.truncate(profile.max_items);

        let mut tally = PrepareTally::default();
        let prepared = items
            .into_iter()
            .map(|item| self.prepare_item(item, profile, &mut tally))
            .collect::<Vec<_>>();

        let corpus = SourceCorpus::new(
            kind,
            entity,
            prepared,
            tally.duplicates_removed,
            tally.filtered_out,
        );
        debug!(
            source = %kind,
            entity = %corpus.entity,
            items = corpus.item_count,
            units = corpus.unit_count,
            dropped_items,
            duplicates = corpus.duplicates_removed,
            filtered = corpus.filtered_out,
            "prepared source corpus"
        );
        corpus
    }

    fn prepare_item(
        &self,
        item: RawParentItem,
        profile: &SourceProfile,
        tally: &mut PrepareTally,
    ) -> SourceItem {
        let summary = item
            .body
            .as_deref()
            .map(|b| profile.body.apply(b))
            .filter(|s| !s.is_empty());
        let is_review =
            profile.inherent_review || looks_like_review(&item.title, item.body.as_deref());

        let mut units = Vec::with_capacity(item.children.len());
        for mut child in item.children {
            let text = child.text.trim();
            if profile.skips_author(&child.author)
                || text.is_empty()
                || text.chars().count() < profile.min_unit_chars
            {
                tally.filtered_out += 1;
                continue;
            }
            child.text = clip_words(text, profile.max_unit_chars);

            let assessment = score_with(&self.scoring, &child);
            if assessment.content_type == ContentType::Spam
                || child.engagement < profile.min_engagement
                || assessment.quality < profile.min_quality
            {
                tally.filtered_out += 1;
                continue;
            }
            let topics = self.taxonomy.classify(&child.text);
            units.push(ScoredContentUnit::from_raw(
                child,
                assessment.quality,
                assessment.content_type,
                topics,
            ));
        }

        units.sort_by(|a, b| b.quality.cmp(&a.quality));
        let outcome = Deduplicator::new(profile.dedup_threshold).apply(units, |u| u.text.as_str());
        tally.duplicates_removed += outcome.removed;
        let mut units = outcome.kept;
        units.truncate(profile.max_units_per_item);

        SourceItem {
            title: item.title,
            summary,
            is_review,
            engagement: item.engagement,
            url: item.url,
            units,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use revagg_core::{RawContentUnit, Topic};

    fn child(kind: SourceKind, author: &str, text: &str, engagement: u64) -> RawContentUnit {
        RawContentUnit::new(kind, author, text, engagement)
    }

    fn discussion_batch() -> RawSourceBatch {
        let kind = SourceKind::Discussion;
        RawSourceBatch {
            kind,
            entity: "Example Classic 350".to_string(),
            items: vec![
                RawParentItem {
                    title: "Service cost?".to_string(),
                    engagement: 0,
                    children: vec![child(
                        kind,
                        "wrench_guy",
                        "First service cost me Rs 1200, the service center was quick and the spares are cheap.",
                        15,
                    )],
                    ..RawParentItem::default()
                },
                RawParentItem {
                    title: "Example Classic 350 after 1 year".to_string(),
                    body: Some("Bought it last year.   Engine is smooth.".to_string()),
                    engagement: 120,
                    children: vec![
                        child(
                            kind,
                            "tourer_raj",
                            "After 18 months and 14,000 kms, the engine is still smooth, only issue is seat comfort on long rides",
                            40,
                        ),
                        child(kind, "[deleted]", "[deleted]", 3),
                        child(kind, "AutoModerator", "Please follow the rules before posting.", 1),
                        child(kind, "city_commuter", "Is the clutch heavy in city traffic?", 6),
                        child(kind, "quiet", "   ", 9),
                    ],
                    ..RawParentItem::default()
                },
            ],
        }
    }

    #[test]
    fn discussion_batch_is_sorted_filtered_and_scored() {
        let corpus = SourcePreparer::default().prepare(
            discussion_batch(),
            &SourceProfile::for_kind(SourceKind::Discussion),
        );

        assert_eq!(corpus.item_count, 2);
        assert_eq!(corpus.items[0].title, "Example Classic 350 after 1 year");
        assert_eq!(
            corpus.items[0].summary.as_deref(),
            Some("Bought it last year. Engine is smooth.")
        );
        assert!(corpus.items.iter().all(|i| i.is_review));
        assert_eq!(corpus.filtered_out, 3);

        let first = &corpus.items[0].units;
        assert_eq!(
            first.iter().map(|u| u.author.as_str()).collect::<Vec<_>>(),
            vec!["tourer_raj", "city_commuter"]
        );
        assert_eq!(first[0].content_type, ContentType::Experience);
        assert!(first[0].topics.contains(&Topic::Engine));
        assert_eq!(first[1].content_type, ContentType::Question);

        let service = &corpus.items[1].units[0];
        assert_eq!(service.topics, BTreeSet::from([Topic::Service, Topic::Value]));
        assert_eq!(service.source, SourceKind::Discussion);
        assert_eq!(corpus.unit_count, 3);
    }

    #[test]
    fn item_cap_keeps_highest_engagement() {
        let kind = SourceKind::Forum;
        let items = (0..20)
            .map(|i| RawParentItem {
                title: format!("thread {i}"),
                engagement: i,
                ..RawParentItem::default()
            })
            .collect();
        let batch = RawSourceBatch {
            kind,
            entity: "x".to_string(),
            items,
        };
        let corpus = SourcePreparer::default().prepare(batch, &SourceProfile::for_kind(kind));
        assert_eq!(corpus.item_count, 15);
        assert_eq!(corpus.items[0].engagement, 19);
        assert_eq!(corpus.items[14].engagement, 5);
    }

    #[test]
    fn spam_low_engagement_and_duplicates_are_dropped() {
        let kind = SourceKind::Video;
        let text = "I own this bike for 2 years and 20,000 km, the engine is still smooth.";
        let batch = RawSourceBatch {
            kind,
            entity: "x".to_string(),
            items: vec![RawParentItem {
                title: "Long term review".to_string(),
                engagement: 1000,
                children: vec![
                    child(kind, "a", text, 50),
                    child(kind, "b", text, 40),
                    child(
                        kind,
                        "spam",
                        "Subscribe to my channel!! 🔥🔥🔥🔥 please like",
                        100,
                    ),
                    child(kind, "quiet", "Mileage is about 35 kmpl on the highway for me.", 1),
                ],
                ..RawParentItem::default()
            }],
        };
        let corpus = SourcePreparer::default().prepare(batch, &SourceProfile::for_kind(kind));
        let units = &corpus.items[0].units;
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].author, "a");
        assert_eq!(corpus.duplicates_removed, 1);
        assert_eq!(corpus.filtered_out, 2);
        assert!(corpus.items[0].is_review);
    }

    #[test]
    fn units_are_capped_and_clipped_per_profile() {
        let kind = SourceKind::Forum;
        let long = "The suspension is soft and the seat is wide. ".repeat(20);
        let children = vec![
            child(kind, "one", &long, 0),
            child(kind, "two", "Mileage is around 32 kmpl in city traffic for me.", 0),
            child(kind, "three", "Paint quality and chrome finish are excellent overall.", 0),
            child(kind, "four", "Brakes are weak, I upgraded the pads after 3000 km.", 0),
            child(kind, "short", "+1", 0),
        ];
        let batch = RawSourceBatch {
            kind,
            entity: "x".to_string(),
            items: vec![RawParentItem {
                title: "Owners thread".to_string(),
                children,
                ..RawParentItem::default()
            }],
        };
        let profile = SourceProfile::for_kind(kind);
        let corpus = SourcePreparer::default().prepare(batch, &profile);
        let units = &corpus.items[0].units;
        assert_eq!(units.len(), profile.max_units_per_item);
        assert!(units.iter().all(|u| u.text.chars().count() <= profile.max_unit_chars));
        assert!(units.windows(2).all(|w| w[0].quality >= w[1].quality));
    }

    #[test]
    fn empty_batch_yields_empty_corpus() {
        let batch = RawSourceBatch::empty(SourceKind::Review, "x");
        let profile = SourceProfile::for_kind(SourceKind::Review);
        let corpus = SourcePreparer::default().prepare(batch, &profile);
        assert_eq!(corpus.item_count, 0);
        assert_eq!(corpus.unit_count, 0);
    }

    #[test]
    fn review_indicators_flag_non_inherent_sources() {
        assert!(looks_like_review("Example Classic 350 Review | Long term test", None));
        assert!(looks_like_review("Exhaust sound", Some("After 12,000 km it still sounds great")));
        assert!(!looks_like_review("Exhaust sound", None));
    }
}
