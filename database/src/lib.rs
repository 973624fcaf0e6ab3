mod json_store;
mod sqlite;

pub use json_store::JsonPostStore;
pub use sqlite::SqlitePostStore;

use async_trait::async_trait;
use reviewgen_core::{CoreError, Post};

/// Read side of the post store as the pipeline sees it.
///
/// Implementations return at most `n` posts for `keyword`; callers must not
/// rely on their ordering.
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn top_n_by_likes(&self, keyword: &str, n: usize) -> Result<Vec<Post>, CoreError>;
}
