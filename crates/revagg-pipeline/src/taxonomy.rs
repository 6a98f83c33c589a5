//! Keyword taxonomy used to tag text with topics.
//!
//! The table is data, not code: the built-in rules can be replaced wholesale
//! from a `topics.yaml` file without touching scoring or merging.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use revagg_core::Topic;
use serde::Deserialize;

const BUILTIN_RULES: &[(Topic, &[&str])] = &[
    (
        Topic::Engine,
        &[
            r"\bengines?\b",
            r"\b(refine(d|ment)|vibrat\w*|thump\w*|torque|power\w*|pick-?up|rpm|exhaust|gearbox|clutch)\b",
            r"\b\d+\s*cc\b",
        ],
    ),
    (
        Topic::Mileage,
        &[
            r"\b(mileage|kmpl|km/l|mpg|fuel efficien\w*|fuel economy|efficiency|fuel tank)\b",
        ],
    ),
    (
        Topic::Comfort,
        &[
            r"\b(comfort\w*|seats?|seating|ergonomic\w*|posture|back ?pain|suspension|pillion|ride quality)\b",
        ],
    ),
    (
        Topic::BuildQuality,
        &[
            r"\b(build quality|built|fit and finish|paint|chrome|rust\w*|plastics?|rattl\w*|panel gaps?)\b",
        ],
    ),
    (
        Topic::Service,
        &[
            r"\b(servic\w*|maintenance|spares?|parts availability|warranty|dealers?(hip)?|workshop|mechanic)\b",
        ],
    ),
    (
        Topic::Value,
        &[
            r"\b(price\w*|pricey|cost\w*|value for money|worth|budget|expensive|cheap\w*|lakhs?|on-road|emi)\b",
            r"(₹|\brs\.?)\s*\d",
        ],
    ),
    (
        Topic::Handling,
        &[
            r"\b(handling|handles|corner\w*|brak\w*|abs|nimble|flickable|agile|stability|stable|turning radius)\b",
        ],
    ),
    (
        Topic::Highway,
        &[
            r"\b(highways?|touring|tours?|long rides?|long distance|road ?trips?|cruis\w*|expressway)\b",
            r"\b\d+\s*kmph\b",
        ],
    ),
    (
        Topic::City,
        &[r"\b(city|traffic|commut\w*|urban|stop.and.go|bumper to bumper)\b"],
    ),
];

#[derive(Debug, Clone)]
pub struct TopicRule {
    pub topic: Topic,
    pub patterns: Vec<Regex>,
}

#[derive(Debug, Clone)]
pub struct TopicTaxonomy {
    rules: Vec<TopicRule>,
}

#[derive(Debug, Clone, Deserialize)]
struct TopicRulesFile {
    #[allow(dead_code)]
    version: u32,
    #[serde(default)]
    rules: Vec<TopicRuleSpec>,
}

#[derive(Debug, Clone, Deserialize)]
struct TopicRuleSpec {
    topic: Topic,
    patterns: Vec<String>,
}

fn compile(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .with_context(|| format!("compiling topic pattern {pattern:?}"))
}

impl TopicTaxonomy {
    /// Built-in table, compiled once per process.
    pub fn builtin() -> &'static TopicTaxonomy {
        static BUILTIN: OnceLock<TopicTaxonomy> = OnceLock::new();
        BUILTIN.get_or_init(|| {
            let specs = BUILTIN_RULES.iter().map(|(topic, patterns)| {
                (*topic, patterns.iter().map(|p| p.to_string()).collect())
            });
            Self::from_specs(specs).expect("built-in topic patterns compile")
        })
    }

    pub fn from_specs(specs: impl IntoIterator<Item = (Topic, Vec<String>)>) -> Result<Self> {
        let mut rules = Vec::new();
        for (topic, patterns) in specs {
            let patterns = patterns
                .iter()
                .map(|p| compile(p))
                .collect::<Result<Vec<_>>>()?;
            rules.push(TopicRule { topic, patterns });
        }
        Ok(Self { rules })
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let file: TopicRulesFile = serde_yaml::from_str(text).context("parsing topic rules")?;
        Self::from_specs(file.rules.into_iter().map(|r| (r.topic, r.patterns)))
    }

    /// Reads `<dir>/topics.yaml`.
    pub fn from_rules_dir(dir: &Path) -> Result<Self> {
        let path = dir.join("topics.yaml");
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn rules(&self) -> &[TopicRule] {
        &self.rules
    }

    /// Every topic with at least one matching pattern. May be empty.
    pub fn classify(&self, text: &str) -> BTreeSet<Topic> {
        let lower = text.to_lowercase();
        self.rules
            .iter()
            .filter(|rule| rule.patterns.iter().any(|p| p.is_match(&lower)))
            .map(|rule| rule.topic)
            .collect()
    }
}

impl Default for TopicTaxonomy {
    fn default() -> Self {
        Self::builtin().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn experience_comment_hits_engine_and_comfort() {
        let topics = TopicTaxonomy::default().classify(
            "After 18 months and 14,000 kms, the engine is still smooth, only issue is seat comfort on long rides",
        );
        assert!(topics.contains(&Topic::Engine));
        assert!(topics.contains(&Topic::Comfort));
        assert!(topics.contains(&Topic::Highway));
        assert!(!topics.contains(&Topic::Value));
    }

    #[test]
    fn unrelated_text_has_no_topics() {
        assert!(TopicTaxonomy::default().classify("Nice video bro").is_empty());
        assert!(TopicTaxonomy::default().classify("").is_empty());
    }

    #[test]
    fn price_and_service_language_is_tagged() {
        let topics = TopicTaxonomy::default()
            .classify("First service cost me Rs 1200, the spares are cheap.");
        assert_eq!(topics, BTreeSet::from([Topic::Service, Topic::Value]));
    }

    #[test]
    fn every_topic_has_builtin_rules() {
        let taxonomy = TopicTaxonomy::builtin();
        for topic in Topic::ALL {
            assert!(
                taxonomy.rules().iter().any(|r| r.topic == topic),
                "missing rules for {topic}"
            );
        }
    }

    #[test]
    fn yaml_rules_replace_the_table() {
        let taxonomy = TopicTaxonomy::from_yaml_str(
            "version: 1\nrules:\n  - topic: city\n    patterns: ['\\bscooty\\b']\n",
        )
        .unwrap();
        assert_eq!(taxonomy.classify("Great SCOOTY"), BTreeSet::from([Topic::City]));
        assert!(taxonomy.classify("engine is smooth").is_empty());
    }

    #[test]
    fn yaml_with_unknown_topic_is_rejected() {
        let err = TopicTaxonomy::from_yaml_str(
            "version: 1\nrules:\n  - topic: styling\n    patterns: ['looks']\n",
        );
        assert!(err.is_err());
    }
}
