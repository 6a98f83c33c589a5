//! Environment-driven configuration and file-backed strategy/rules loading.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use revagg_adapters::{collector_for_kind, web_fixture_collector, SnippetCollector, SourceCollector};
use revagg_core::{MergeStrategy, SourceKind};
use tracing::debug;

use crate::format::{FormatOptions, DEFAULT_CHAR_BUDGET};
use crate::taxonomy::TopicTaxonomy;
use crate::AggregationPipeline;

pub const TOPIC_RULES_FILE: &str = "topics.yaml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub fixtures_dir: PathBuf,
    pub rules_dir: PathBuf,
    pub char_budget: usize,
    pub strategy_file: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fixtures_dir: PathBuf::from("./fixtures"),
            rules_dir: PathBuf::from("./rules"),
            char_budget: DEFAULT_CHAR_BUDGET,
            strategy_file: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            fixtures_dir: std::env::var("REVAGG_FIXTURES_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.fixtures_dir),
            rules_dir: std::env::var("REVAGG_RULES_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.rules_dir),
            char_budget: std::env::var("REVAGG_CHAR_BUDGET")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.char_budget),
            strategy_file: std::env::var("REVAGG_STRATEGY_FILE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    /// Strategy file when configured, defaults otherwise.
    pub fn load_strategy(&self) -> Result<MergeStrategy> {
        match &self.strategy_file {
            Some(path) => load_strategy_file(path),
            None => Ok(MergeStrategy::default()),
        }
    }

    /// `<rules_dir>/topics.yaml` when present, the built-in table otherwise.
    pub fn load_taxonomy(&self) -> Result<TopicTaxonomy> {
        if self.rules_dir.join(TOPIC_RULES_FILE).exists() {
            TopicTaxonomy::from_rules_dir(&self.rules_dir)
        } else {
            debug!(dir = %self.rules_dir.display(), "no topic rules file, using built-in taxonomy");
            Ok(TopicTaxonomy::default())
        }
    }

    pub fn collectors(&self) -> Vec<Arc<dyn SourceCollector>> {
        SourceKind::ALL
            .into_iter()
            .map(|kind| collector_for_kind(kind, &self.fixtures_dir))
            .collect()
    }

    pub fn web_collector(&self) -> Arc<dyn SnippetCollector> {
        Arc::new(web_fixture_collector(&self.fixtures_dir))
    }

    pub fn build_pipeline(&self) -> Result<AggregationPipeline> {
        Ok(AggregationPipeline::default()
            .with_taxonomy(self.load_taxonomy()?)
            .with_strategy(self.load_strategy()?)
            .with_format(FormatOptions::with_budget(self.char_budget)))
    }
}

pub fn load_strategy_file(path: &Path) -> Result<MergeStrategy> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading merge strategy {}", path.display()))?;
    serde_yaml::from_str(&text)
        .with_context(|| format!("parsing merge strategy {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use revagg_core::Topic;

    fn workspace_root() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
    }

    #[test]
    fn strategy_file_overrides_only_given_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("strategy.yaml");
        std::fs::write(
            &path,
            "dedupe: false\nmaxItemsPerTopic: 4\nsourceWeights:\n  review: 1.5\n",
        )
        .unwrap();

        let config = PipelineConfig {
            strategy_file: Some(path),
            ..PipelineConfig::default()
        };
        let strategy = config.load_strategy().unwrap();
        assert!(!strategy.dedupe);
        assert_eq!(strategy.max_items_per_topic, 4);
        assert_eq!(strategy.weight_for(SourceKind::Review), 1.5);
        assert_eq!(strategy.weight_for(SourceKind::Video), 1.0);
        assert_eq!(strategy.min_quality_score, 40);
    }

    #[test]
    fn missing_strategy_file_is_an_error() {
        let config = PipelineConfig {
            strategy_file: Some(PathBuf::from("/nonexistent/strategy.yaml")),
            ..PipelineConfig::default()
        };
        let err = config.load_strategy().unwrap_err();
        assert!(format!("{err:#}").contains("reading merge strategy"));
    }

    #[test]
    fn taxonomy_falls_back_to_builtin_without_rules_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            rules_dir: tmp.path().to_path_buf(),
            ..PipelineConfig::default()
        };
        let taxonomy = config.load_taxonomy().unwrap();
        assert_eq!(taxonomy.rules().len(), TopicTaxonomy::builtin().rules().len());
    }

    #[test]
    fn shipped_rules_file_matches_builtin_behaviour() {
        let config = PipelineConfig {
            rules_dir: workspace_root().join("rules"),
            ..PipelineConfig::default()
        };
        let shipped = config.load_taxonomy().unwrap();
        let samples = [
            "After 18 months and 14,000 kms, the engine is still smooth, only issue is seat comfort on long rides",
            "First service cost me Rs 1200, the spares are cheap.",
            "Handling is sharp and it corners well, great for the city commute.",
            "Mileage is around 35 kmpl and paint quality is excellent.",
        ];
        for sample in samples {
            assert_eq!(
                shipped.classify(sample),
                TopicTaxonomy::builtin().classify(sample),
                "{sample}"
            );
        }
        assert_eq!(
            shipped.classify(samples[2]),
            BTreeSet::from([Topic::Handling, Topic::City])
        );
    }

    #[test]
    fn pipeline_uses_configured_budget() {
        let tmp = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            rules_dir: tmp.path().to_path_buf(),
            char_budget: 1234,
            ..PipelineConfig::default()
        };
        let pipeline = config.build_pipeline().unwrap();
        assert_eq!(pipeline.format_options().budget, 1234);
    }
}
