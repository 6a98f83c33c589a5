//! Core domain model for the review corpus aggregator.
//!
//! Everything here is plain data: harvested records, the scored and prepared
//! shapes the pipeline derives from them, and the outbound corpus and report
//! types handed to collaborators. All of it lives for one aggregation request.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CRATE_NAME: &str = "revagg-core";

/// Unit-bearing source kinds. Declaration order is the tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Video,
    Discussion,
    Forum,
    Review,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Video,
        SourceKind::Discussion,
        SourceKind::Forum,
        SourceKind::Review,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Video => "video",
            SourceKind::Discussion => "discussion",
            SourceKind::Forum => "forum",
            SourceKind::Review => "review",
        }
    }

    /// Default short tag used in formatted corpus lines.
    pub fn abbreviation(self) -> &'static str {
        match self {
            SourceKind::Video => "VID",
            SourceKind::Discussion => "DSC",
            SourceKind::Forum => "FRM",
            SourceKind::Review => "REV",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        let needle = input.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|k| k.as_str() == needle)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Experience,
    Question,
    Opinion,
    Spam,
    Other,
}

/// Fixed topic taxonomy. Units can only ever carry these labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Engine,
    Mileage,
    Comfort,
    BuildQuality,
    Service,
    Value,
    Handling,
    Highway,
    City,
}

impl Topic {
    pub const ALL: [Topic; 9] = [
        Topic::Engine,
        Topic::Mileage,
        Topic::Comfort,
        Topic::BuildQuality,
        Topic::Service,
        Topic::Value,
        Topic::Handling,
        Topic::Highway,
        Topic::City,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Topic::Engine => "Engine",
            Topic::Mileage => "Mileage/Efficiency",
            Topic::Comfort => "Comfort",
            Topic::BuildQuality => "Build Quality",
            Topic::Service => "Service/Maintenance",
            Topic::Value => "Value/Price",
            Topic::Handling => "Handling",
            Topic::Highway => "Highway/Touring",
            Topic::City => "City/Traffic",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One harvested text item as supplied by a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawContentUnit {
    pub author: String,
    pub text: String,
    pub engagement: u64,
    pub source: SourceKind,
    pub created_at: Option<DateTime<Utc>>,
}

impl RawContentUnit {
    pub fn new(
        source: SourceKind,
        author: impl Into<String>,
        text: impl Into<String>,
        engagement: u64,
    ) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
            engagement,
            source,
            created_at: None,
        }
    }

    pub fn with_created_at(mut self, created_at: Option<DateTime<Utc>>) -> Self {
        self.created_at = created_at;
        self
    }
}

/// Parent record (a video, a post, a thread, a review) with its child units.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawParentItem {
    pub title: String,
    pub body: Option<String>,
    pub engagement: u64,
    pub url: Option<String>,
    pub children: Vec<RawContentUnit>,
}

/// Everything one source returned for one target entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSourceBatch {
    pub kind: SourceKind,
    pub entity: String,
    pub items: Vec<RawParentItem>,
}

impl RawSourceBatch {
    pub fn empty(kind: SourceKind, entity: impl Into<String>) -> Self {
        Self {
            kind,
            entity: entity.into(),
            items: Vec::new(),
        }
    }

    pub fn child_count(&self) -> usize {
        self.items.iter().map(|i| i.children.len()).sum()
    }
}

/// Stable identifier for a unit, derived from where it came from and what it says.
pub fn deterministic_unit_id(source: SourceKind, author: &str, text: &str) -> Uuid {
    let key = format!("{}:{}:{}", source.as_str(), author, text);
    Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredContentUnit {
    pub id: Uuid,
    pub author: String,
    pub text: String,
    pub engagement: u64,
    pub source: SourceKind,
    pub created_at: Option<DateTime<Utc>>,
    pub quality: u8,
    pub content_type: ContentType,
    pub topics: BTreeSet<Topic>,
}

impl ScoredContentUnit {
    /// Quality above 100 is clamped so the [0,100] bound holds for every unit.
    pub fn from_raw(
        raw: RawContentUnit,
        quality: u8,
        content_type: ContentType,
        topics: BTreeSet<Topic>,
    ) -> Self {
        Self {
            id: deterministic_unit_id(raw.source, &raw.author, &raw.text),
            author: raw.author,
            text: raw.text,
            engagement: raw.engagement,
            source: raw.source,
            created_at: raw.created_at,
            quality: quality.min(100),
            content_type,
            topics,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceItem {
    pub title: String,
    pub summary: Option<String>,
    pub is_review: bool,
    pub engagement: u64,
    pub url: Option<String>,
    pub units: Vec<ScoredContentUnit>,
}

impl SourceItem {
    /// Title plus summarized long-form text, the text inspected for entity mentions.
    pub fn combined_text(&self) -> String {
        match self.summary.as_deref() {
            Some(summary) if !summary.is_empty() => format!("{} {}", self.title, summary),
            _ => self.title.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCorpus {
    pub kind: SourceKind,
    pub entity: String,
    pub items: Vec<SourceItem>,
    pub item_count: usize,
    pub unit_count: usize,
    pub duplicates_removed: usize,
    pub filtered_out: usize,
}

impl SourceCorpus {
    pub fn new(
        kind: SourceKind,
        entity: impl Into<String>,
        items: Vec<SourceItem>,
        duplicates_removed: usize,
        filtered_out: usize,
    ) -> Self {
        let unit_count = items.iter().map(|i| i.units.len()).sum();
        Self {
            kind,
            entity: entity.into(),
            item_count: items.len(),
            unit_count,
            items,
            duplicates_removed,
            filtered_out,
        }
    }

    pub fn empty(kind: SourceKind, entity: impl Into<String>) -> Self {
        Self::new(kind, entity, Vec::new(), 0, 0)
    }

    pub fn units(&self) -> impl Iterator<Item = &ScoredContentUnit> {
        self.items.iter().flat_map(|i| i.units.iter())
    }
}

/// Options controlling how per-source corpora are combined.
///
/// Unspecified keys fall back to the defaults: dedup on at 0.5, equal
/// weighting, 8 units per topic, minimum quality 40.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MergeStrategy {
    pub dedupe: bool,
    pub source_weights: BTreeMap<SourceKind, f64>,
    pub max_items_per_topic: usize,
    pub min_quality_score: u8,
    /// Stricter than the per-source thresholds: catches the same review
    /// reposted on another platform.
    pub dedup_threshold: f64,
}

impl Default for MergeStrategy {
    fn default() -> Self {
        Self {
            dedupe: true,
            source_weights: BTreeMap::new(),
            max_items_per_topic: 8,
            min_quality_score: 40,
            dedup_threshold: 0.5,
        }
    }
}

impl MergeStrategy {
    pub fn weight_for(&self, kind: SourceKind) -> f64 {
        self.source_weights.get(&kind).copied().unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceCounts {
    pub items: usize,
    pub units: usize,
}

/// Per-topic tallies. `unique_authors` counts distinct authors, not mentions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicStat {
    pub topic: Topic,
    pub units: usize,
    pub unique_authors: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MergeMetadata {
    pub sources_used: BTreeSet<SourceKind>,
    pub per_source: BTreeMap<SourceKind, SourceCounts>,
    pub input_units: usize,
    pub below_quality_removed: usize,
    pub duplicates_removed: usize,
    pub merged_units: usize,
    pub topic_stats: Vec<TopicStat>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicGroup {
    pub topic: Topic,
    pub units: Vec<ScoredContentUnit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedCorpus {
    pub entity: String,
    /// Ordered by pre-cap unit count descending, then taxonomy order.
    pub groups: Vec<TopicGroup>,
    /// Units that matched no topic.
    pub general: Vec<ScoredContentUnit>,
    pub metadata: MergeMetadata,
}

impl MergedCorpus {
    pub fn group(&self, topic: Topic) -> Option<&TopicGroup> {
        self.groups.iter().find(|g| g.topic == topic)
    }

    /// Units tagged with `topic` before the per-topic cap was applied.
    pub fn topic_units(&self, topic: Topic) -> usize {
        self.metadata
            .topic_stats
            .iter()
            .find(|s| s.topic == topic)
            .map(|s| s.units)
            .or_else(|| self.group(topic).map(|g| g.units.len()))
            .unwrap_or(0)
    }

    /// Every unit once, even when it sits in several topic groups.
    pub fn distinct_units(&self) -> Vec<&ScoredContentUnit> {
        let mut seen = BTreeSet::new();
        self.groups
            .iter()
            .flat_map(|g| g.units.iter())
            .chain(self.general.iter())
            .filter(|u| seen.insert(u.id))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedCorpus {
    pub text: String,
    pub budget: usize,
    pub truncated: bool,
}

impl FormattedCorpus {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicCount {
    pub topic: Topic,
    pub units: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusSummary {
    pub entity: String,
    pub source_counts: BTreeMap<SourceKind, usize>,
    pub top_topics: Vec<TopicCount>,
    pub total_units: usize,
    pub blocks_emitted: usize,
}

/// Flat title/snippet record from the auxiliary web search collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WebSnippet {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMention {
    pub name: String,
    pub mentions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub confidence: u8,
    pub canonical_name: String,
    pub items_inspected: usize,
    pub items_with_target: usize,
    pub warnings: Vec<String>,
    pub unexpected_entities: Vec<EntityMention>,
}

/// Full result of aggregating one target entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityAggregation {
    pub entity: String,
    pub merged: MergedCorpus,
    pub formatted: FormattedCorpus,
    pub summary: CorpusSummary,
    pub validation: ValidationReport,
}

/// Two-entity shape kept for consumers of the older combined payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonCorpus {
    #[serde(rename = "entityA")]
    pub entity_a: EntityAggregation,
    #[serde(rename = "entityB")]
    pub entity_b: EntityAggregation,
    pub combined_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(source: SourceKind, author: &str, text: &str) -> ScoredContentUnit {
        ScoredContentUnit::from_raw(
            RawContentUnit::new(source, author, text, 3),
            55,
            ContentType::Other,
            BTreeSet::from([Topic::Engine]),
        )
    }

    #[test]
    fn quality_is_clamped_on_construction() {
        let u = ScoredContentUnit::from_raw(
            RawContentUnit::new(SourceKind::Forum, "a", "text", 0),
            250,
            ContentType::Other,
            BTreeSet::new(),
        );
        assert_eq!(u.quality, 100);
    }

    #[test]
    fn unit_ids_are_deterministic_and_source_scoped() {
        let a = unit(SourceKind::Video, "rider", "smooth engine");
        let b = unit(SourceKind::Video, "rider", "smooth engine");
        let c = unit(SourceKind::Forum, "rider", "smooth engine");
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn merge_strategy_fills_unspecified_options_with_defaults() {
        let parsed: MergeStrategy =
            serde_json::from_str(r#"{"maxItemsPerTopic": 3, "sourceWeights": {"review": 1.5}}"#)
                .unwrap();
        assert!(parsed.dedupe);
        assert_eq!(parsed.max_items_per_topic, 3);
        assert_eq!(parsed.min_quality_score, 40);
        assert_eq!(parsed.weight_for(SourceKind::Review), 1.5);
        assert_eq!(parsed.weight_for(SourceKind::Video), 1.0);
    }

    #[test]
    fn source_corpus_counts_follow_items() {
        let item = SourceItem {
            title: "Ownership review".into(),
            summary: None,
            is_review: true,
            engagement: 4,
            url: None,
            units: vec![
                unit(SourceKind::Forum, "a", "one"),
                unit(SourceKind::Forum, "b", "two"),
            ],
        };
        let corpus = SourceCorpus::new(SourceKind::Forum, "Example", vec![item], 1, 2);
        assert_eq!(corpus.item_count, 1);
        assert_eq!(corpus.unit_count, 2);
        assert_eq!(corpus.units().count(), 2);
    }

    #[test]
    fn distinct_units_skips_repeats_across_groups() {
        let shared = unit(SourceKind::Video, "a", "engine and seat");
        let merged = MergedCorpus {
            entity: "Example".into(),
            groups: vec![
                TopicGroup {
                    topic: Topic::Engine,
                    units: vec![shared.clone()],
                },
                TopicGroup {
                    topic: Topic::Comfort,
                    units: vec![shared],
                },
            ],
            general: vec![],
            metadata: MergeMetadata::default(),
        };
        assert_eq!(merged.distinct_units().len(), 1);
    }

    #[test]
    fn topic_units_prefer_pre_cap_stats() {
        let merged = MergedCorpus {
            entity: "Example".into(),
            groups: vec![
                TopicGroup {
                    topic: Topic::City,
                    units: vec![unit(SourceKind::Forum, "a", "traffic")],
                },
                TopicGroup {
                    topic: Topic::Engine,
                    units: vec![unit(SourceKind::Forum, "b", "engine")],
                },
            ],
            general: vec![],
            metadata: MergeMetadata {
                topic_stats: vec![TopicStat {
                    topic: Topic::City,
                    units: 30,
                    unique_authors: 12,
                }],
                ..MergeMetadata::default()
            },
        };
        assert_eq!(merged.topic_units(Topic::City), 30);
        assert_eq!(merged.topic_units(Topic::Engine), 1);
        assert_eq!(merged.topic_units(Topic::Comfort), 0);
    }

    #[test]
    fn source_kind_serializes_and_parses_as_lowercase_names() {
        let json = serde_json::to_value(SourceKind::Discussion).unwrap();
        assert_eq!(json, serde_json::json!("discussion"));
        assert_eq!(SourceKind::parse(" Forum "), Some(SourceKind::Forum));
        assert_eq!(SourceKind::parse("web"), None);
    }
}
