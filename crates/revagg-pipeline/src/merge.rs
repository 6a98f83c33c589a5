//! Cross-source merge: quality floor, global dedup, per-topic grouping.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use revagg_core::{
    MergeMetadata, MergeStrategy, MergedCorpus, ScoredContentUnit, SourceCorpus, Topic, TopicGroup,
    TopicStat,
};
use tracing::info;

use crate::dedup::Deduplicator;

/// Quality desc, weight desc, then fields that make the order total.
fn rank(strategy: &MergeStrategy, a: &ScoredContentUnit, b: &ScoredContentUnit) -> Ordering {
    b.quality
        .cmp(&a.quality)
        .then_with(|| strategy.weight_for(b.source).total_cmp(&strategy.weight_for(a.source)))
        .then_with(|| a.source.cmp(&b.source))
        .then_with(|| a.author.cmp(&b.author))
        .then_with(|| a.text.cmp(&b.text))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn merge_corpora(
    entity: &str,
    corpora: &[SourceCorpus],
    strategy: &MergeStrategy,
) -> MergedCorpus {
    let mut metadata = MergeMetadata::default();
    for corpus in corpora {
        let counts = metadata.per_source.entry(corpus.kind).or_default();
        counts.items += corpus.item_count;
        counts.units += corpus.unit_count;
    }

    let mut pool: Vec<ScoredContentUnit> =
        corpora.iter().flat_map(|c| c.units().cloned()).collect();
    metadata.input_units = pool.len();
    pool.retain(|u| u.quality >= strategy.min_quality_score);
    metadata.below_quality_removed = metadata.input_units - pool.len();

    pool.sort_by(|a, b| rank(strategy, a, b));
    if strategy.dedupe {
        let outcome = Deduplicator::new(strategy.dedup_threshold).apply(pool, |u| u.text.as_str());
        metadata.duplicates_removed = outcome.removed;
        pool = outcome.kept;
    }

    let mut ranked = Vec::new();
    for topic in Topic::ALL {
        let tagged: Vec<&ScoredContentUnit> =
            pool.iter().filter(|u| u.topics.contains(&topic)).collect();
        if tagged.is_empty() {
            continue;
        }
        let unique_authors = tagged
            .iter()
            .map(|u| u.author.as_str())
            .collect::<BTreeSet<_>>()
            .len();
        let stat = TopicStat {
            topic,
            units: tagged.len(),
            unique_authors,
        };
        let group = TopicGroup {
            topic,
            units: tagged
                .into_iter()
                .take(strategy.max_items_per_topic)
                .cloned()
                .collect(),
        };
        ranked.push((stat, group));
    }
    // pre-cap counts; stable, so equal counts stay in taxonomy order
    ranked.sort_by(|(a, _), (b, _)| b.units.cmp(&a.units));
    let (topic_stats, groups): (Vec<TopicStat>, Vec<TopicGroup>) = ranked.into_iter().unzip();
    metadata.topic_stats = topic_stats;

    let general: Vec<ScoredContentUnit> = pool
        .iter()
        .filter(|u| u.topics.is_empty())
        .take(strategy.max_items_per_topic)
        .cloned()
        .collect();

    let mut merged = MergedCorpus {
        entity: entity.to_string(),
        groups,
        general,
        metadata,
    };
    let distinct = merged.distinct_units();
    let merged_units = distinct.len();
    let sources_used = distinct.iter().map(|u| u.source).collect();
    merged.metadata.merged_units = merged_units;
    merged.metadata.sources_used = sources_used;

    info!(
        entity,
        sources = corpora.len(),
        input_units = merged.metadata.input_units,
        below_quality = merged.metadata.below_quality_removed,
        duplicates = merged.metadata.duplicates_removed,
        merged_units,
        topics = merged.groups.len(),
        "merged source corpora"
    );
    merged
}
