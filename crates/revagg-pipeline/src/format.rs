//! Renders a merged corpus into a bounded, source-attributed text block.

use std::collections::BTreeMap;

use revagg_core::{
    CorpusSummary, FormattedCorpus, MergedCorpus, ScoredContentUnit, SourceKind, TopicCount,
};
use tracing::debug;

pub const DEFAULT_CHAR_BUDGET: usize = 6000;
pub const GENERAL_HEADING: &str = "General";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOptions {
    /// Maximum output length in chars.
    pub budget: usize,
    pub top_topics: usize,
    /// Overrides for the default per-source tags.
    pub abbreviations: BTreeMap<SourceKind, String>,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            budget: DEFAULT_CHAR_BUDGET,
            top_topics: 3,
            abbreviations: BTreeMap::new(),
        }
    }
}

impl FormatOptions {
    pub fn with_budget(budget: usize) -> Self {
        Self {
            budget,
            ..Self::default()
        }
    }

    pub fn abbreviation(&self, kind: SourceKind) -> &str {
        self.abbreviations
            .get(&kind)
            .map(String::as_str)
            .unwrap_or_else(|| kind.abbreviation())
    }
}

/// Appends whole lines while they fit in the char budget.
struct BudgetWriter {
    text: String,
    used: usize,
    lines: usize,
    budget: usize,
}

impl BudgetWriter {
    fn new(budget: usize) -> Self {
        Self {
            text: String::new(),
            used: 0,
            lines: 0,
            budget,
        }
    }

    /// All lines or none.
    fn push_lines(&mut self, lines: &[&str]) -> bool {
        let cost = lines
            .iter()
            .enumerate()
            .map(|(i, line)| line.chars().count() + usize::from(self.lines + i > 0))
            .sum::<usize>();
        if self.used.saturating_add(cost) > self.budget {
            return false;
        }
        for line in lines {
            if self.lines > 0 {
                self.text.push('\n');
            }
            self.text.push_str(line);
            self.lines += 1;
        }
        self.used += cost;
        true
    }
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn unit_line(options: &FormatOptions, unit: &ScoredContentUnit) -> String {
    format!(
        "[{}] \"{}\" —{} ({})",
        options.abbreviation(unit.source),
        one_line(&unit.text),
        one_line(&unit.author),
        unit.engagement
    )
}

fn header_lines(
    merged: &MergedCorpus,
    summary: &CorpusSummary,
    options: &FormatOptions,
) -> Vec<String> {
    let sources = summary
        .source_counts
        .iter()
        .map(|(kind, n)| format!("{} {}", options.abbreviation(*kind), n))
        .collect::<Vec<_>>();
    let mut lines = vec![if sources.is_empty() {
        format!("{}: {} units", merged.entity, summary.total_units)
    } else {
        format!(
            "{}: {} units from {}",
            merged.entity,
            summary.total_units,
            sources.join(", ")
        )
    }];
    if !summary.top_topics.is_empty() {
        let topics = summary
            .top_topics
            .iter()
            .map(|t| format!("{} ({})", t.topic.label(), t.units))
            .collect::<Vec<_>>();
        lines.push(format!("Top topics: {}", topics.join(", ")));
    }
    lines
}

fn summarize_corpus(merged: &MergedCorpus, options: &FormatOptions) -> CorpusSummary {
    let distinct = merged.distinct_units();
    let mut source_counts = BTreeMap::new();
    for unit in &distinct {
        *source_counts.entry(unit.source).or_insert(0usize) += 1;
    }
    CorpusSummary {
        entity: merged.entity.clone(),
        source_counts,
        top_topics: merged
            .groups
            .iter()
            .take(options.top_topics)
            .map(|g| TopicCount {
                topic: g.topic,
                units: merged.topic_units(g.topic),
            })
            .collect(),
        total_units: distinct.len(),
        blocks_emitted: 0,
    }
}

/// Header, then one block per topic group, then untagged units under
/// `## General`. Stops at the first line that would overflow the budget.
pub fn format_corpus(
    merged: &MergedCorpus,
    options: &FormatOptions,
) -> (FormattedCorpus, CorpusSummary) {
    let mut summary = summarize_corpus(merged, options);
    let mut writer = BudgetWriter::new(options.budget);
    let mut truncated = false;

    let header = header_lines(merged, &summary, options);
    for line in &header {
        if !writer.push_lines(&[line.as_str()]) {
            truncated = true;
            break;
        }
    }

    let blocks = merged
        .groups
        .iter()
        .map(|g| (g.topic.label(), &g.units))
        .chain(std::iter::once((GENERAL_HEADING, &merged.general)));

    if !truncated {
        'blocks: for (label, units) in blocks {
            let Some((first, rest)) = units.split_first() else {
                continue;
            };
            let heading = format!("## {label}");
            let first_line = unit_line(options, first);
            if !writer.push_lines(&["", heading.as_str(), first_line.as_str()]) {
                truncated = true;
                break;
            }
            summary.blocks_emitted += 1;
            for unit in rest {
                let line = unit_line(options, unit);
                if !writer.push_lines(&[line.as_str()]) {
                    truncated = true;
                    break 'blocks;
                }
            }
        }
    }

    debug!(
        entity = %merged.entity,
        budget = options.budget,
        chars = writer.used,
        blocks = summary.blocks_emitted,
        truncated,
        "formatted corpus"
    );
    let formatted = FormattedCorpus {
        text: writer.text,
        budget: options.budget,
        truncated,
    };
    (formatted, summary)
}
