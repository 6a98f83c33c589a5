use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use revagg_adapters::{collector_for_kind, SnippetCollector, SourceCollector};
use revagg_core::SourceKind;
use revagg_pipeline::{PipelineConfig, SourceFailure};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "revagg")]
#[command(about = "Review corpus aggregator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build the bounded corpus for one entity.
    Aggregate {
        #[arg(long)]
        entity: String,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Build side-by-side corpora for two entities.
    Compare {
        #[arg(long)]
        entity_a: String,
        #[arg(long)]
        entity_b: String,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Print only the validation report for one entity.
    Validate {
        #[arg(long)]
        entity: String,
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Debug, Args)]
struct CommonArgs {
    /// Harvest bundle directory (overrides REVAGG_FIXTURES_DIR).
    #[arg(long)]
    fixtures: Option<PathBuf>,
    /// Topic rules directory (overrides REVAGG_RULES_DIR).
    #[arg(long)]
    rules: Option<PathBuf>,
    /// Character budget (overrides REVAGG_CHAR_BUDGET).
    #[arg(long)]
    budget: Option<usize>,
    /// Merge strategy YAML (overrides REVAGG_STRATEGY_FILE).
    #[arg(long)]
    strategy: Option<PathBuf>,
    /// Restrict collection to these source kinds.
    #[arg(long = "source")]
    sources: Vec<String>,
    /// Skip the web search collaborator.
    #[arg(long)]
    no_web: bool,
    /// Emit JSON instead of the formatted text block.
    #[arg(long)]
    json: bool,
}

impl CommonArgs {
    fn config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::from_env();
        if let Some(dir) = &self.fixtures {
            config.fixtures_dir = dir.clone();
        }
        if let Some(dir) = &self.rules {
            config.rules_dir = dir.clone();
        }
        if let Some(budget) = self.budget {
            config.char_budget = budget;
        }
        if let Some(path) = &self.strategy {
            config.strategy_file = Some(path.clone());
        }
        config
    }

    fn collectors(&self, config: &PipelineConfig) -> Result<Vec<Arc<dyn SourceCollector>>> {
        if self.sources.is_empty() {
            return Ok(config.collectors());
        }
        let mut collectors = Vec::with_capacity(self.sources.len());
        for name in &self.sources {
            let Some(kind) = SourceKind::parse(name) else {
                bail!("unknown source kind {name:?} (expected video, discussion, forum or review)");
            };
            collectors.push(collector_for_kind(kind, &config.fixtures_dir));
        }
        Ok(collectors)
    }

    fn web(&self, config: &PipelineConfig) -> Option<Arc<dyn SnippetCollector>> {
        (!self.no_web).then(|| config.web_collector())
    }
}

fn report_failures(failures: &[SourceFailure]) {
    for failure in failures {
        warn!(source = %failure.source, error = %failure.error, "source unavailable");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("revagg=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Aggregate { entity, common } => {
            let config = common.config();
            let pipeline = config.build_pipeline()?;
            let collectors = common.collectors(&config)?;
            let (aggregation, failures) = pipeline
                .run(&entity, &collectors, common.web(&config))
                .await;
            report_failures(&failures);
            if common.json {
                println!("{}", serde_json::to_string_pretty(&aggregation)?);
            } else {
                println!("{}", aggregation.formatted.text);
            }
        }
        Commands::Compare {
            entity_a,
            entity_b,
            common,
        } => {
            let config = common.config();
            let pipeline = config.build_pipeline()?;
            let collectors = common.collectors(&config)?;
            let (comparison, failures) = pipeline
                .run_comparison(&entity_a, &entity_b, &collectors, common.web(&config))
                .await;
            report_failures(&failures);
            if common.json {
                println!("{}", serde_json::to_string_pretty(&comparison)?);
            } else {
                println!("{}", comparison.combined_text);
            }
        }
        Commands::Validate { entity, common } => {
            let config = common.config();
            let pipeline = config.build_pipeline()?;
            let collectors = common.collectors(&config)?;
            let (aggregation, failures) = pipeline
                .run(&entity, &collectors, common.web(&config))
                .await;
            report_failures(&failures);
            let report = &aggregation.validation;
            if common.json {
                println!("{}", serde_json::to_string_pretty(report)?);
            } else {
                println!(
                    "{}: confidence {}% ({} of {} items mention \"{}\")",
                    entity,
                    report.confidence,
                    report.items_with_target,
                    report.items_inspected,
                    report.canonical_name
                );
                for warning in &report.warnings {
                    println!("warning: {warning}");
                }
            }
        }
    }

    Ok(())
}
