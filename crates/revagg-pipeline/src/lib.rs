//! Aggregation pipeline: score, tag, dedup, prepare, merge, format, validate.
//!
//! Everything below `gather` is synchronous and pure. `AggregationPipeline`
//! holds only immutable configuration, so one instance can serve concurrent
//! requests.

pub mod config;
pub mod dedup;
pub mod format;
pub mod gather;
pub mod merge;
pub mod prepare;
pub mod scoring;
pub mod summarize;
pub mod taxonomy;
pub mod validate;

use std::collections::BTreeMap;
use std::sync::Arc;

use revagg_adapters::{SnippetCollector, SourceCollector};
use revagg_core::{
    ComparisonCorpus, EntityAggregation, MergeStrategy, RawSourceBatch, SourceCorpus, SourceKind,
    WebSnippet,
};
use tracing::info;

pub use config::PipelineConfig;
pub use dedup::{similarity, DedupOutcome, Deduplicator};
pub use format::{format_corpus, FormatOptions};
pub use gather::{gather, GatherOutcome, SourceFailure};
pub use merge::merge_corpora;
pub use prepare::{BodyMode, SourcePreparer, SourceProfile};
pub use scoring::{score_unit, Assessment, ScoringRules};
pub use taxonomy::TopicTaxonomy;
pub use validate::CorpusValidator;

pub const CRATE_NAME: &str = "revagg-pipeline";

/// Blank line between the two entity blocks of a comparison.
const COMPARISON_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone)]
pub struct AggregationPipeline {
    preparer: SourcePreparer,
    profiles: BTreeMap<SourceKind, SourceProfile>,
    strategy: MergeStrategy,
    format: FormatOptions,
    validator: CorpusValidator,
}

impl Default for AggregationPipeline {
    fn default() -> Self {
        Self {
            preparer: SourcePreparer::default(),
            profiles: SourceKind::ALL
                .into_iter()
                .map(|kind| (kind, SourceProfile::for_kind(kind)))
                .collect(),
            strategy: MergeStrategy::default(),
            format: FormatOptions::default(),
            validator: CorpusValidator::default(),
        }
    }
}

impl AggregationPipeline {
    pub fn with_taxonomy(mut self, taxonomy: TopicTaxonomy) -> Self {
        self.preparer = SourcePreparer::new(taxonomy, ScoringRules::default());
        self
    }

    pub fn with_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_format(mut self, format: FormatOptions) -> Self {
        self.format = format;
        self
    }

    pub fn with_profile(mut self, profile: SourceProfile) -> Self {
        self.profiles.insert(profile.kind, profile);
        self
    }

    pub fn with_validator(mut self, validator: CorpusValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn strategy(&self) -> &MergeStrategy {
        &self.strategy
    }

    pub fn format_options(&self) -> &FormatOptions {
        &self.format
    }

    pub fn profile(&self, kind: SourceKind) -> SourceProfile {
        self.profiles
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| SourceProfile::for_kind(kind))
    }

    pub fn prepare(&self, batch: RawSourceBatch) -> SourceCorpus {
        let profile = self.profile(batch.kind);
        self.preparer.prepare(batch, &profile)
    }

    /// Prepares every batch, then merges, formats and validates the result.
    pub fn aggregate(
        &self,
        entity: &str,
        batches: Vec<RawSourceBatch>,
        snippets: Option<&[WebSnippet]>,
    ) -> EntityAggregation {
        self.aggregate_with_budget(entity, batches, snippets, self.format.budget)
    }

    fn aggregate_with_budget(
        &self,
        entity: &str,
        batches: Vec<RawSourceBatch>,
        snippets: Option<&[WebSnippet]>,
        budget: usize,
    ) -> EntityAggregation {
        let corpora: Vec<SourceCorpus> = batches.into_iter().map(|b| self.prepare(b)).collect();
        let merged = merge_corpora(entity, &corpora, &self.strategy);
        let options = FormatOptions {
            budget,
            ..self.format.clone()
        };
        let (formatted, summary) = format_corpus(&merged, &options);
        let validation = self.validator.validate(entity, &corpora, snippets);

        info!(
            entity,
            sources = corpora.len(),
            units = summary.total_units,
            chars = formatted.char_len(),
            confidence = validation.confidence,
            "aggregated entity"
        );
        EntityAggregation {
            entity: entity.to_string(),
            merged,
            formatted,
            summary,
            validation,
        }
    }

    /// Two entities side by side; each half gets an equal share of the budget.
    pub fn compare(
        &self,
        (entity_a, outcome_a): (&str, GatherOutcome),
        (entity_b, outcome_b): (&str, GatherOutcome),
    ) -> ComparisonCorpus {
        let half = self.format.budget.saturating_sub(COMPARISON_SEPARATOR.len()) / 2;
        let a = self.aggregate_with_budget(
            entity_a,
            outcome_a.batches,
            outcome_a.snippets.as_deref(),
            half,
        );
        let b = self.aggregate_with_budget(
            entity_b,
            outcome_b.batches,
            outcome_b.snippets.as_deref(),
            half,
        );
        let combined_text = [a.formatted.text.as_str(), b.formatted.text.as_str()]
            .into_iter()
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(COMPARISON_SEPARATOR);
        ComparisonCorpus {
            entity_a: a,
            entity_b: b,
            combined_text,
        }
    }

    /// Gathers from the collectors, then aggregates whatever came back.
    pub async fn run(
        &self,
        entity: &str,
        collectors: &[Arc<dyn SourceCollector>],
        web: Option<Arc<dyn SnippetCollector>>,
    ) -> (EntityAggregation, Vec<SourceFailure>) {
        let outcome = gather(entity, collectors, web).await;
        let aggregation = self.aggregate(entity, outcome.batches, outcome.snippets.as_deref());
        (aggregation, outcome.failures)
    }

    /// Both entities are gathered concurrently.
    pub async fn run_comparison(
        &self,
        entity_a: &str,
        entity_b: &str,
        collectors: &[Arc<dyn SourceCollector>],
        web: Option<Arc<dyn SnippetCollector>>,
    ) -> (ComparisonCorpus, Vec<SourceFailure>) {
        let (outcome_a, outcome_b) = tokio::join!(
            gather(entity_a, collectors, web.clone()),
            gather(entity_b, collectors, web)
        );
        let mut failures = outcome_a.failures.clone();
        failures.extend(outcome_b.failures.iter().cloned());
        let comparison = self.compare((entity_a, outcome_a), (entity_b, outcome_b));
        (comparison, failures)
    }
}
