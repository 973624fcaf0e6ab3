use reviewgen_core::{CoreError, Post, WorkingSet};
use tracing::debug;

/// Orders posts by popularity and cuts them down to the working set.
#[derive(Debug, Clone, Copy)]
pub struct PostRanker {
    limit: usize,
}

impl PostRanker {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    /// Stable sort by like count, most liked first, truncated to the limit.
    /// `keyword` only labels the error for an empty input.
    pub fn rank(&self, keyword: &str, mut posts: Vec<Post>) -> Result<WorkingSet, CoreError> {
        if posts.is_empty() {
            return Err(CoreError::EmptyInput {
                keyword: keyword.to_string(),
            });
        }

        let received = posts.len();
        posts.sort_by(|a, b| b.like_count.cmp(&a.like_count));
        posts.truncate(self.limit.max(1));

        debug!(
            "Ranked {} posts for '{}', keeping {}",
            received,
            keyword,
            posts.len()
        );
        WorkingSet::from_ranked(posts)
    }
}
