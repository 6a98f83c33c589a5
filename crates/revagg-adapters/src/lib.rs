//! Collaborator boundary: harvested bundle shapes + fixture-backed collectors.
//!
//! Fetching over the network belongs to the collaborators; this crate only
//! knows the JSON they hand over and how to turn it into `RawSourceBatch`es.

use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use revagg_core::{RawContentUnit, RawParentItem, RawSourceBatch, SourceKind, WebSnippet};
use scraper::Html;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const CRATE_NAME: &str = "revagg-adapters";

/// Author recorded for forum posts that carry no handle.
pub const ANONYMOUS_FORUM_AUTHOR: &str = "forum member";
pub const DELETED_AUTHOR: &str = "[deleted]";

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// A collaborator that yields parent items + child units for one entity.
#[async_trait]
pub trait SourceCollector: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn collect(&self, entity: &str) -> Result<RawSourceBatch, AdapterError>;
}

/// The auxiliary web search collaborator; its snippets only feed validation.
#[async_trait]
pub trait SnippetCollector: Send + Sync {
    async fn search(&self, entity: &str) -> Result<Vec<WebSnippet>, AdapterError>;
}

/// Named per-entity payload inside a harvest bundle.
pub trait EntityPayload: DeserializeOwned + Send + Sync + 'static {
    fn name(&self) -> &str;
}

/// Payload that converts into parent items for one source kind.
pub trait ItemPayload: EntityPayload {
    const KIND: SourceKind;

    fn into_items(self) -> Vec<RawParentItem>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleMetadata {
    pub scraped_at: Option<String>,
    pub source: Option<String>,
    pub note: Option<String>,
}

/// Collaborator output. Comparison scrapers emit `bike1`/`bike2`; single-entity
/// collaborators emit an `entities` list. Both shapes are accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct HarvestBundle<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bike1: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bike2: Option<T>,
    #[serde(default)]
    pub entities: Vec<T>,
    #[serde(default)]
    pub metadata: BundleMetadata,
}

impl<T: EntityPayload> HarvestBundle<T> {
    pub fn into_entities(self) -> Vec<T> {
        self.bike1
            .into_iter()
            .chain(self.bike2)
            .chain(self.entities)
            .collect()
    }

    pub fn take_entity(self, name: &str) -> Option<T> {
        let wanted = normalize_name(name);
        self.into_entities()
            .into_iter()
            .find(|e| normalize_name(e.name()) == wanted)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscussionEntity {
    pub name: String,
    pub posts: Vec<DiscussionPost>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscussionPost {
    pub id: String,
    pub title: String,
    pub author: Option<String>,
    pub score: i64,
    pub url: Option<String>,
    pub created_utc: Option<f64>,
    pub num_comments: i64,
    pub selftext: String,
    pub comments: Vec<DiscussionComment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscussionComment {
    pub id: String,
    pub author: Option<String>,
    pub body: String,
    pub score: i64,
    pub created_utc: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ForumEntity {
    pub name: String,
    pub threads: Vec<ForumThread>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ForumThread {
    pub title: String,
    pub url: Option<String>,
    pub replies: Option<i64>,
    pub posts: Vec<ForumPost>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ForumPost {
    pub author: Option<String>,
    pub content: String,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoEntity {
    pub name: String,
    pub videos: Vec<VideoRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoRecord {
    pub title: String,
    pub description: String,
    pub transcript: String,
    pub view_count: i64,
    pub like_count: i64,
    pub channel: Option<String>,
    pub url: Option<String>,
    pub comments: Vec<VideoComment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoComment {
    pub author: Option<String>,
    pub text: String,
    pub likes: i64,
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewEntity {
    pub name: String,
    pub reviews: Vec<ReviewRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewRecord {
    pub title: String,
    pub body: String,
    pub author: Option<String>,
    pub helpful_votes: i64,
    pub url: Option<String>,
    pub remarks: Vec<ReviewRemark>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewRemark {
    pub author: Option<String>,
    pub text: String,
    pub votes: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebEntity {
    pub name: String,
    pub results: Vec<WebSnippet>,
}

impl EntityPayload for DiscussionEntity {
    fn name(&self) -> &str {
        &self.name
    }
}

impl ItemPayload for DiscussionEntity {
    const KIND: SourceKind = SourceKind::Discussion;

    fn into_items(self) -> Vec<RawParentItem> {
        self.posts
            .into_iter()
            .map(|post| RawParentItem {
                title: clean_text(&post.title),
                body: text_or_none(clean_text(&post.selftext)),
                engagement: clamp_engagement(post.score),
                url: post.url,
                children: post
                    .comments
                    .into_iter()
                    .map(|c| {
                        RawContentUnit::new(
                            Self::KIND,
                            author_or(c.author, DELETED_AUTHOR),
                            clean_text(&c.body),
                            clamp_engagement(c.score),
                        )
                        .with_created_at(epoch_to_utc(c.created_utc))
                    })
                    .collect(),
            })
            .collect()
    }
}

impl EntityPayload for ForumEntity {
    fn name(&self) -> &str {
        &self.name
    }
}

impl ItemPayload for ForumEntity {
    const KIND: SourceKind = SourceKind::Forum;

    fn into_items(self) -> Vec<RawParentItem> {
        self.threads
            .into_iter()
            .map(|thread| {
                // Threads without a reply counter rank by how many posts were harvested.
                let engagement = thread
                    .replies
                    .map(clamp_engagement)
                    .unwrap_or(thread.posts.len() as u64);
                RawParentItem {
                    title: clean_text(&thread.title),
                    body: None,
                    engagement,
                    url: thread.url,
                    children: thread
                        .posts
                        .into_iter()
                        .map(|p| {
                            RawContentUnit::new(
                                Self::KIND,
                                author_or(p.author, ANONYMOUS_FORUM_AUTHOR),
                                clean_text(&p.content),
                                0,
                            )
                            .with_created_at(parse_timestamp(p.timestamp.as_deref()))
                        })
                        .collect(),
                }
            })
            .collect()
    }
}

impl EntityPayload for VideoEntity {
    fn name(&self) -> &str {
        &self.name
    }
}

impl ItemPayload for VideoEntity {
    const KIND: SourceKind = SourceKind::Video;

    fn into_items(self) -> Vec<RawParentItem> {
        self.videos
            .into_iter()
            .map(|video| {
                let long_form = [clean_text(&video.description), clean_text(&video.transcript)]
                    .into_iter()
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                RawParentItem {
                    title: clean_text(&video.title),
                    body: text_or_none(long_form),
                    engagement: clamp_engagement(video.view_count),
                    url: video.url,
                    children: video
                        .comments
                        .into_iter()
                        .map(|c| {
                            RawContentUnit::new(
                                Self::KIND,
                                author_or(c.author, "anonymous"),
                                clean_text(&c.text),
                                clamp_engagement(c.likes),
                            )
                            .with_created_at(parse_timestamp(c.published_at.as_deref()))
                        })
                        .collect(),
                }
            })
            .collect()
    }
}

impl EntityPayload for ReviewEntity {
    fn name(&self) -> &str {
        &self.name
    }
}

impl ItemPayload for ReviewEntity {
    const KIND: SourceKind = SourceKind::Review;

    fn into_items(self) -> Vec<RawParentItem> {
        self.reviews
            .into_iter()
            .map(|review| {
                let body = text_or_none(clean_text(&review.body));
                let author = author_or(review.author, "verified owner");
                let votes = clamp_engagement(review.helpful_votes);
                // The vetted review text is itself the leading unit of its item.
                let mut children = Vec::with_capacity(review.remarks.len() + 1);
                if let Some(text) = &body {
                    children.push(RawContentUnit::new(Self::KIND, author, text.clone(), votes));
                }
                children.extend(review.remarks.into_iter().map(|r| {
                    RawContentUnit::new(
                        Self::KIND,
                        author_or(r.author, "verified owner"),
                        clean_text(&r.text),
                        clamp_engagement(r.votes),
                    )
                }));
                RawParentItem {
                    title: clean_text(&review.title),
                    body,
                    engagement: votes,
                    url: review.url,
                    children,
                }
            })
            .collect()
    }
}

impl EntityPayload for WebEntity {
    fn name(&self) -> &str {
        &self.name
    }
}

impl WebEntity {
    pub fn into_snippets(self) -> Vec<WebSnippet> {
        self.results
            .into_iter()
            .map(|r| WebSnippet {
                title: clean_text(&r.title),
                snippet: clean_text(&r.snippet),
                source: r.source.trim().to_string(),
            })
            .filter(|r| !r.title.is_empty() || !r.snippet.is_empty())
            .collect()
    }
}

pub fn load_harvest_bundle<T: EntityPayload>(path: impl AsRef<Path>) -> Result<HarvestBundle<T>> {
    read_json_file(path)
}

fn read_json_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let data = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}

/// Strip markup (forum bodies arrive as HTML fragments) and collapse whitespace.
pub fn clean_text(raw: &str) -> String {
    let text = if raw.contains('<') && raw.contains('>') {
        let fragment = Html::parse_fragment(raw);
        fragment.root_element().text().collect::<Vec<_>>().join(" ")
    } else {
        raw.to_string()
    };
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn text_or_none(value: String) -> Option<String> {
    let trimmed = value.trim().to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn author_or(author: Option<String>, fallback: &str) -> String {
    author
        .and_then(text_or_none)
        .unwrap_or_else(|| fallback.to_string())
}

fn clamp_engagement(value: i64) -> u64 {
    value.max(0) as u64
}

fn epoch_to_utc(secs: Option<f64>) -> Option<DateTime<Utc>> {
    let secs = secs.filter(|s| s.is_finite())?;
    DateTime::from_timestamp(secs.trunc() as i64, 0)
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw?.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn normalize_name(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Serves one source kind from a harvest bundle on disk.
#[derive(Debug, Clone)]
pub struct FixtureCollector<T> {
    path: PathBuf,
    _payload: PhantomData<fn() -> T>,
}

impl<T: ItemPayload> FixtureCollector<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _payload: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl<T: ItemPayload> SourceCollector for FixtureCollector<T> {
    fn kind(&self) -> SourceKind {
        T::KIND
    }

    async fn collect(&self, entity: &str) -> Result<RawSourceBatch, AdapterError> {
        if !self.path.exists() {
            return Err(AdapterError::Message(format!(
                "no {} harvest bundle at {}",
                T::KIND,
                self.path.display()
            )));
        }
        let bundle: HarvestBundle<T> = load_harvest_bundle(&self.path)?;
        let Some(payload) = bundle.take_entity(entity) else {
            debug!(kind = %T::KIND, entity, "entity absent from harvest bundle");
            return Ok(RawSourceBatch::empty(T::KIND, entity));
        };
        let batch = RawSourceBatch {
            kind: T::KIND,
            entity: entity.to_string(),
            items: payload.into_items(),
        };
        debug!(
            kind = %T::KIND,
            entity,
            items = batch.items.len(),
            children = batch.child_count(),
            "collected harvest bundle"
        );
        Ok(batch)
    }
}

#[derive(Debug, Clone)]
pub struct FixtureSnippetCollector {
    path: PathBuf,
}

impl FixtureSnippetCollector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SnippetCollector for FixtureSnippetCollector {
    async fn search(&self, entity: &str) -> Result<Vec<WebSnippet>, AdapterError> {
        if !self.path.exists() {
            return Err(AdapterError::Message(format!(
                "no web harvest bundle at {}",
                self.path.display()
            )));
        }
        let bundle: HarvestBundle<WebEntity> = load_harvest_bundle(&self.path)?;
        Ok(bundle
            .take_entity(entity)
            .map(WebEntity::into_snippets)
            .unwrap_or_default())
    }
}

pub fn video_fixture_collector(path: impl Into<PathBuf>) -> FixtureCollector<VideoEntity> {
    FixtureCollector::new(path)
}

pub fn discussion_fixture_collector(
    path: impl Into<PathBuf>,
) -> FixtureCollector<DiscussionEntity> {
    FixtureCollector::new(path)
}

pub fn forum_fixture_collector(path: impl Into<PathBuf>) -> FixtureCollector<ForumEntity> {
    FixtureCollector::new(path)
}

pub fn review_fixture_collector(path: impl Into<PathBuf>) -> FixtureCollector<ReviewEntity> {
    FixtureCollector::new(path)
}

/// Conventional bundle location: `<fixtures>/<kind>/sample.json`.
pub fn fixture_bundle_path(fixtures_dir: &Path, kind_dir: &str) -> PathBuf {
    fixtures_dir.join(kind_dir).join("sample.json")
}

pub fn collector_for_kind(kind: SourceKind, fixtures_dir: &Path) -> Arc<dyn SourceCollector> {
    let path = fixture_bundle_path(fixtures_dir, kind.as_str());
    match kind {
        SourceKind::Video => Arc::new(video_fixture_collector(path)),
        SourceKind::Discussion => Arc::new(discussion_fixture_collector(path)),
        SourceKind::Forum => Arc::new(forum_fixture_collector(path)),
        SourceKind::Review => Arc::new(review_fixture_collector(path)),
    }
}

pub fn web_fixture_collector(fixtures_dir: &Path) -> FixtureSnippetCollector {
    FixtureSnippetCollector::new(fixture_bundle_path(fixtures_dir, "web"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const CLASSIC: &str = "Example Classic 350";

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct GoldenItem {
        title: String,
        engagement: u64,
        has_body: bool,
        children: usize,
    }

    fn fixtures_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../fixtures")
            .canonicalize()
            .expect("fixtures dir")
    }

    fn items_to_golden(items: &[RawParentItem]) -> Vec<GoldenItem> {
        items
            .iter()
            .map(|i| GoldenItem {
                title: i.title.clone(),
                engagement: i.engagement,
                has_body: i.body.is_some(),
                children: i.children.len(),
            })
            .collect()
    }

    #[tokio::test]
    async fn golden_json_snapshot_test_discussion() {
        let collector = collector_for_kind(SourceKind::Discussion, &fixtures_dir());
        let batch = collector.collect(CLASSIC).await.unwrap();
        assert_eq!(batch.kind, SourceKind::Discussion);
        let text = fs::read_to_string(fixtures_dir().join("discussion/snapshot.json")).unwrap();
        let expected: Vec<GoldenItem> = serde_json::from_str(&text).unwrap();
        assert_eq!(items_to_golden(&batch.items), expected);
    }

    #[tokio::test]
    async fn discussion_comments_keep_author_score_and_timestamp() {
        let collector = collector_for_kind(SourceKind::Discussion, &fixtures_dir());
        let batch = collector.collect("  example   CLASSIC 350 ").await.unwrap();
        let first = &batch.items[0].children[0];
        assert_eq!(first.author, "tourer_raj");
        assert_eq!(first.engagement, 40);
        assert_eq!(first.source, SourceKind::Discussion);
        assert_eq!(first.created_at.unwrap().timestamp(), 1_700_003_600);
        assert_eq!(
            batch.items[2].body.as_deref(),
            Some("Torn between a few bikes. Budget is 2 lakh.")
        );
    }

    #[tokio::test]
    async fn forum_posts_are_stripped_of_markup_and_attributed() {
        let collector = collector_for_kind(SourceKind::Forum, &fixtures_dir());
        let batch = collector.collect(CLASSIC).await.unwrap();
        assert_eq!(batch.items.len(), 2);

        let thread = &batch.items[0];
        assert_eq!(thread.engagement, 3);
        assert!(thread.body.is_none());
        let anonymous = &thread.children[1];
        assert_eq!(anonymous.author, ANONYMOUS_FORUM_AUTHOR);
        assert_eq!(
            anonymous.text,
            "I've been riding the Example Classic 350 for 6 months now. Highway stability is excellent and fuel efficiency is around 40-45 kmpl in city conditions."
        );
        assert!(anonymous.created_at.is_some());
        assert_eq!(batch.items[1].engagement, 12);
    }

    #[tokio::test]
    async fn video_items_rank_by_views_and_carry_description() {
        let collector = collector_for_kind(SourceKind::Video, &fixtures_dir());
        let batch = collector.collect(CLASSIC).await.unwrap();
        assert_eq!(batch.items[0].engagement, 250_000);
        assert!(batch.items[0]
            .body
            .as_deref()
            .unwrap()
            .starts_with("In this video we review"));
        assert_eq!(batch.items[0].children.len(), 4);
        assert!(batch.items[1].body.is_none());
    }

    #[tokio::test]
    async fn review_body_becomes_the_leading_unit() {
        let collector = collector_for_kind(SourceKind::Review, &fixtures_dir());
        let batch = collector.collect(CLASSIC).await.unwrap();
        let review = &batch.items[0];
        assert_eq!(review.children.len(), 2);
        assert_eq!(review.children[0].author, "verified_owner_1");
        assert_eq!(review.children[0].engagement, 18);
        assert_eq!(review.children[0].text, review.body.clone().unwrap());
        assert_eq!(review.children[1].author, "verified_owner_2");
    }

    #[tokio::test]
    async fn unknown_entity_degrades_to_empty_batch() {
        let collector = collector_for_kind(SourceKind::Review, &fixtures_dir());
        let batch = collector.collect("Example Hunter 350").await.unwrap();
        assert!(batch.items.is_empty());
        assert_eq!(batch.entity, "Example Hunter 350");
    }

    #[tokio::test]
    async fn missing_bundle_is_a_collector_error() {
        let dir = tempdir().expect("tempdir");
        let collector = collector_for_kind(SourceKind::Video, dir.path());
        let err = collector.collect(CLASSIC).await.unwrap_err();
        assert!(err.to_string().contains("no video harvest bundle"));
    }

    #[tokio::test]
    async fn malformed_fields_fall_back_to_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("bundle.json");
        fs::write(
            &path,
            r#"{"entities": [{"name": "Example Classic 350", "videos": [{"comments": [{"text": "ok"}]}, {}]}]}"#,
        )
        .unwrap();
        let batch = video_fixture_collector(&path).collect(CLASSIC).await.unwrap();
        assert_eq!(batch.items.len(), 2);
        assert_eq!(batch.items[0].title, "");
        assert_eq!(batch.items[0].children[0].author, "anonymous");
        assert_eq!(batch.items[0].children[0].engagement, 0);
        assert!(batch.items[1].children.is_empty());
    }

    #[tokio::test]
    async fn web_snippets_are_loaded_per_entity() {
        let collector = web_fixture_collector(&fixtures_dir());
        let snippets = collector.search(CLASSIC).await.unwrap();
        assert_eq!(snippets.len(), 2);
        assert_eq!(snippets[0].source, "bikes.example.com");
        assert!(collector.search("Example Hunter 350").await.unwrap().is_empty());
    }

    #[test]
    fn bundle_sections_are_optional() {
        let dir = tempdir().expect("tempdir");
        let comparison = dir.path().join("comparison.json");
        fs::write(
            &comparison,
            r#"{"bike1": {"name": "Example Classic 350", "posts": []}}"#,
        )
        .unwrap();
        let bundle: HarvestBundle<DiscussionEntity> = load_harvest_bundle(&comparison).unwrap();
        assert!(bundle.bike2.is_none());
        assert!(bundle.entities.is_empty());
        assert!(bundle.metadata.source.is_none());
        assert!(bundle.take_entity(CLASSIC).is_some());

        let listed = dir.path().join("listed.json");
        fs::write(&listed, r#"{"entities": [{"name": "Example Hunter 350"}]}"#).unwrap();
        let bundle: HarvestBundle<ReviewEntity> = load_harvest_bundle(&listed).unwrap();
        assert!(bundle.bike1.is_none());
        assert_eq!(bundle.into_entities().len(), 1);
    }

    #[test]
    fn clean_text_collapses_whitespace_and_markup() {
        assert_eq!(clean_text("  a \n\n b\t c "), "a b c");
        assert_eq!(clean_text("<p>Great <b>engine</b></p>"), "Great engine");
        assert_eq!(clean_text(""), "");
    }
}
