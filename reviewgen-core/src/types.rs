use crate::error::CoreError;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A crawled post as handed over by the store. Field aliases accept the
/// crawler's export column names (`note_id`, `liked_count`, `desc`, `image_list`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(alias = "note_id")]
    pub id: String,
    #[serde(alias = "liked_count", deserialize_with = "deserialize_count", default)]
    pub like_count: u64,
    #[serde(default)]
    pub title: String,
    #[serde(alias = "desc", default)]
    pub text: String,
    #[serde(alias = "image_list", deserialize_with = "deserialize_image_list", default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub comments: Vec<String>,
    #[serde(alias = "nickname", default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(alias = "note_url", default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Post {
    pub fn new(id: impl Into<String>, like_count: u64) -> Self {
        Self {
            id: id.into(),
            like_count,
            title: String::new(),
            text: String::new(),
            image_urls: Vec::new(),
            comments: Vec::new(),
            author: None,
            url: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_images<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.image_urls = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_comments<I, S>(mut self, comments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.comments = comments.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Title and body joined, the way both the prompt and the term counter read a post.
    pub fn full_text(&self) -> String {
        match (self.title.trim(), self.text.trim()) {
            ("", body) => body.to_string(),
            (title, "") => title.to_string(),
            (title, body) => format!("{title} {body}"),
        }
    }

    /// First `max_chars` characters of the post text, on a char boundary.
    pub fn snippet(&self, max_chars: usize) -> String {
        let full = self.full_text();
        if full.chars().count() <= max_chars {
            full
        } else {
            let cut: String = full.chars().take(max_chars).collect();
            format!("{cut}...")
        }
    }
}

/// Parses crawler like counts: plain integers, thousands separators and the
/// `万`/`w` (x10,000) and `k` (x1,000) suffixes. Anything unreadable counts as zero.
pub fn parse_count(raw: &str) -> u64 {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '+' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return 0;
    }

    let (number, multiplier) = if let Some(n) = cleaned
        .strip_suffix('万')
        .or_else(|| cleaned.strip_suffix('w'))
        .or_else(|| cleaned.strip_suffix('W'))
    {
        (n, 10_000.0)
    } else if let Some(n) = cleaned
        .strip_suffix('k')
        .or_else(|| cleaned.strip_suffix('K'))
    {
        (n, 1_000.0)
    } else {
        (cleaned.as_str(), 1.0)
    };

    match number.parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => (value * multiplier).round() as u64,
        _ => 0,
    }
}

fn deserialize_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawCount {
        Number(i64),
        Float(f64),
        Text(String),
        Null(()),
    }

    Ok(match RawCount::deserialize(deserializer)? {
        RawCount::Number(n) => n.max(0) as u64,
        RawCount::Float(f) if f.is_finite() && f > 0.0 => f.round() as u64,
        RawCount::Float(_) => 0,
        RawCount::Text(s) => parse_count(&s),
        RawCount::Null(_) => 0,
    })
}

fn deserialize_image_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawImages {
        List(Vec<String>),
        Joined(String),
        Null(()),
    }

    let urls = match RawImages::deserialize(deserializer)? {
        RawImages::List(list) => list,
        RawImages::Joined(joined) => joined.split(',').map(str::to_string).collect(),
        RawImages::Null(_) => Vec::new(),
    };

    Ok(urls
        .into_iter()
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .collect())
}

/// Posts ordered by like count (descending, stable), never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingSet {
    posts: Vec<Post>,
}

impl WorkingSet {
    /// Wraps posts that are already in ranked order, checking the ordering.
    pub fn from_ranked(posts: Vec<Post>) -> Result<Self, CoreError> {
        if posts.is_empty() {
            return Err(CoreError::invariant("working set must not be empty"));
        }
        if let Some(pair) = posts.windows(2).find(|w| w[0].like_count < w[1].like_count) {
            return Err(CoreError::invariant(format!(
                "working set out of order: post {} ({} likes) before post {} ({} likes)",
                pair[0].id, pair[0].like_count, pair[1].id, pair[1].like_count
            )));
        }
        Ok(Self { posts })
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Post> {
        self.posts.iter()
    }

    /// The `n` most liked posts.
    pub fn top(&self, n: usize) -> &[Post] {
        &self.posts[..n.min(self.posts.len())]
    }
}

impl<'a> IntoIterator for &'a WorkingSet {
    type Item = &'a Post;
    type IntoIter = std::slice::Iter<'a, Post>;

    fn into_iter(self) -> Self::IntoIter {
        self.posts.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageCandidate {
    pub url: String,
    /// Position of the source post in the working set. Post ids from raw
    /// exports are not guaranteed unique, so grouping goes by rank.
    pub source_rank: usize,
    pub source_post_id: String,
    pub source_like_count: u64,
    pub snippet: String,
}

/// Images eligible for selection, in working-set order, with unique URLs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidatePool {
    candidates: Vec<ImageCandidate>,
}

impl CandidatePool {
    /// Keeps the first occurrence of every URL and drops blank ones.
    pub fn new(candidates: Vec<ImageCandidate>) -> Self {
        let mut seen = HashSet::new();
        let candidates = candidates
            .into_iter()
            .filter(|c| !c.url.trim().is_empty() && seen.insert(c.url.clone()))
            .collect();
        Self { candidates }
    }

    pub fn candidates(&self) -> &[ImageCandidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.candidates.iter().any(|c| c.url == url)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ImageCandidate> {
        self.candidates.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageProvenance {
    Ai,
    Heuristic,
}

impl fmt::Display for ImageProvenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageProvenance::Ai => write!(f, "ai"),
            ImageProvenance::Heuristic => write!(f, "heuristic"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextProvenance {
    Ai,
    Template,
}

impl fmt::Display for TextProvenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextProvenance::Ai => write!(f, "ai"),
            TextProvenance::Template => write!(f, "template"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionResult {
    pub images: Vec<String>,
    pub provenance: ImageProvenance,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    pub content: String,
    pub provenance: TextProvenance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub images: ImageProvenance,
    pub text: TextProvenance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    pub title: String,
    pub like_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl From<&Post> for PostSummary {
    fn from(post: &Post) -> Self {
        let title = if post.title.trim().is_empty() {
            post.snippet(30)
        } else {
            post.title.clone()
        };
        Self {
            title,
            like_count: post.like_count,
            url: post.url.clone(),
        }
    }
}

/// The single artifact handed to storage and display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedOutput {
    pub keyword: String,
    pub post_count: usize,
    pub images: Vec<String>,
    pub content: String,
    pub provenance: Provenance,
    #[serde(default)]
    pub top_posts: Vec<PostSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_count_formats() {
        assert_eq!(parse_count("1234"), 1234);
        assert_eq!(parse_count("1,234"), 1234);
        assert_eq!(parse_count("1.2万"), 12_000);
        assert_eq!(parse_count("3.4w"), 34_000);
        assert_eq!(parse_count("2k"), 2_000);
        assert_eq!(parse_count("10+"), 10);
        assert_eq!(parse_count(""), 0);
        assert_eq!(parse_count("n/a"), 0);
        assert_eq!(parse_count("-5"), 0);
    }

    #[test]
    fn test_post_from_crawler_export() {
        let json = r#"{
            "note_id": "abc",
            "liked_count": "1.5万",
            "title": "Best ribs",
            "desc": "Smoky and tender",
            "image_list": "http://img/1.jpg, http://img/2.jpg,,",
            "nickname": "foodie"
        }"#;
        let post: Post = serde_json::from_str(json).unwrap();
        assert_eq!(post.id, "abc");
        assert_eq!(post.like_count, 15_000);
        assert_eq!(post.text, "Smoky and tender");
        assert_eq!(post.image_urls, vec!["http://img/1.jpg", "http://img/2.jpg"]);
        assert_eq!(post.author.as_deref(), Some("foodie"));
        assert!(post.comments.is_empty());
    }

    #[test]
    fn test_post_numeric_and_null_fields() {
        let json = r#"{"id": "x", "like_count": 42, "image_urls": null}"#;
        let post: Post = serde_json::from_str(json).unwrap();
        assert_eq!(post.like_count, 42);
        assert!(post.image_urls.is_empty());
        assert_eq!(post.full_text(), "");

        let json = r#"{"id": "y", "like_count": null, "image_urls": "http://a, ,http://b"}"#;
        let post: Post = serde_json::from_str(json).unwrap();
        assert_eq!(post.like_count, 0);
        assert_eq!(post.image_urls, vec!["http://a", "http://b"]);
    }

    #[test]
    fn test_snippet_respects_char_boundaries() {
        let post = Post::new("p", 1).with_text("烤肉外焦里嫩非常好吃");
        assert_eq!(post.snippet(4), "烤肉外焦...");
        assert_eq!(post.snippet(100), "烤肉外焦里嫩非常好吃");
    }

    #[test]
    fn test_working_set_rejects_unsorted_and_empty() {
        assert!(matches!(
            WorkingSet::from_ranked(vec![]),
            Err(CoreError::InvariantViolation { .. })
        ));
        let unsorted = vec![Post::new("a", 1), Post::new("b", 5)];
        assert!(WorkingSet::from_ranked(unsorted).is_err());

        let sorted = vec![Post::new("a", 5), Post::new("b", 5), Post::new("c", 1)];
        let set = WorkingSet::from_ranked(sorted).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.top(2).len(), 2);
        assert_eq!(set.top(10).len(), 3);
    }

    #[test]
    fn test_candidate_pool_dedupes() {
        let candidate = |url: &str| ImageCandidate {
            url: url.to_string(),
            source_rank: 0,
            source_post_id: "p".to_string(),
            source_like_count: 1,
            snippet: String::new(),
        };
        let pool = CandidatePool::new(vec![
            candidate("http://a"),
            candidate("http://b"),
            candidate("http://a"),
            candidate("  "),
        ]);
        assert_eq!(pool.len(), 2);
        assert!(pool.contains("http://b"));
        assert!(!pool.contains("http://c"));
    }

    #[test]
    fn test_provenance_serializes_lowercase() {
        let provenance = Provenance {
            images: ImageProvenance::Heuristic,
            text: TextProvenance::Ai,
        };
        let json = serde_json::to_string(&provenance).unwrap();
        assert_eq!(json, r#"{"images":"heuristic","text":"ai"}"#);
    }
}
