//! Fan-out/fan-in over collectors. One failing source never blocks the rest.

use std::sync::Arc;

use revagg_adapters::{SnippetCollector, SourceCollector};
use revagg_core::{RawSourceBatch, WebSnippet};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{info, warn};

pub const WEB_SOURCE: &str = "web";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub source: String,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct GatherOutcome {
    /// Ordered by source kind.
    pub batches: Vec<RawSourceBatch>,
    /// `None` when no web collector ran or it failed.
    pub snippets: Option<Vec<WebSnippet>>,
    pub failures: Vec<SourceFailure>,
}

pub async fn gather(
    entity: &str,
    collectors: &[Arc<dyn SourceCollector>],
    web: Option<Arc<dyn SnippetCollector>>,
) -> GatherOutcome {
    let mut tasks = JoinSet::new();
    for collector in collectors {
        let collector = Arc::clone(collector);
        let entity = entity.to_string();
        tasks.spawn(async move {
            let kind = collector.kind();
            (kind, collector.collect(&entity).await)
        });
    }
    let web_task = web.map(|collector| {
        let entity = entity.to_string();
        tokio::spawn(async move { collector.search(&entity).await })
    });

    let mut outcome = GatherOutcome::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(batch))) => outcome.batches.push(batch),
            Ok((kind, Err(err))) => {
                warn!(source = %kind, entity, error = %err, "source collection failed");
                outcome.failures.push(SourceFailure {
                    source: kind.to_string(),
                    error: err.to_string(),
                });
            }
            Err(err) => {
                warn!(entity, error = %err, "collector task aborted");
                outcome.failures.push(SourceFailure {
                    source: "collector".to_string(),
                    error: err.to_string(),
                });
            }
        }
    }
    outcome.batches.sort_by_key(|b| b.kind);

    if let Some(handle) = web_task {
        let error = match handle.await {
            Ok(Ok(snippets)) => {
                outcome.snippets = Some(snippets);
                None
            }
            Ok(Err(err)) => Some(err.to_string()),
            Err(err) => Some(err.to_string()),
        };
        if let Some(error) = error {
            warn!(source = WEB_SOURCE, entity, error = %error, "web search failed");
            outcome.failures.push(SourceFailure {
                source: WEB_SOURCE.to_string(),
                error,
            });
        }
    }

    info!(
        entity,
        batches = outcome.batches.len(),
        snippets = outcome.snippets.as_ref().map_or(0, Vec::len),
        failures = outcome.failures.len(),
        "gathered sources"
    );
    outcome
}
