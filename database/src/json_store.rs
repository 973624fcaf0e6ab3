use crate::PostRepository;
use async_trait::async_trait;
use reviewgen_core::{CoreError, Post};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone)]
struct StoredPost {
    keyword: Option<String>,
    post: Post,
}

/// Serves posts straight from a crawler JSON export.
///
/// The export is an array of post objects. Records carrying a
/// `source_keyword` only match that keyword; records without one match any.
#[derive(Debug, Clone, Default)]
pub struct JsonPostStore {
    posts: Vec<StoredPost>,
}

impl JsonPostStore {
    pub fn from_json_str(contents: &str) -> Result<Self, CoreError> {
        let records: Vec<serde_json::Value> = serde_json::from_str(contents)?;
        let mut posts = Vec::with_capacity(records.len());

        for (index, record) in records.into_iter().enumerate() {
            let keyword = record
                .get("source_keyword")
                .and_then(|k| k.as_str())
                .map(str::to_string);
            match serde_json::from_value::<Post>(record) {
                Ok(post) => posts.push(StoredPost { keyword, post }),
                Err(e) => warn!("Skipping unreadable post record #{}: {}", index, e),
            }
        }

        Ok(Self { posts })
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path).await?;
        let store = Self::from_json_str(&contents)?;
        info!("Loaded {} posts from {}", store.len(), path.display());
        Ok(store)
    }

    pub fn from_posts(posts: Vec<Post>) -> Self {
        Self {
            posts: posts
                .into_iter()
                .map(|post| StoredPost { keyword: None, post })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Every post matching `keyword`, in file order.
    pub fn posts_for(&self, keyword: &str) -> Vec<Post> {
        self.posts
            .iter()
            .filter(|stored| stored.keyword.as_deref().map_or(true, |k| k == keyword))
            .map(|stored| stored.post.clone())
            .collect()
    }
}

#[async_trait]
impl PostRepository for JsonPostStore {
    async fn top_n_by_likes(&self, keyword: &str, n: usize) -> Result<Vec<Post>, CoreError> {
        let mut posts = self.posts_for(keyword);
        posts.sort_by(|a, b| b.like_count.cmp(&a.like_count));
        posts.truncate(n);
        Ok(posts)
    }
}
