use crate::PostRepository;
use async_trait::async_trait;
use reviewgen_core::{CoreError, DatabaseError, Post};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use tracing::{debug, info};

/// SQLite-backed post store. Rows keep their insertion sequence so equal like
/// counts come back in discovery order.
pub struct SqlitePostStore {
    pool: SqlitePool,
}

#[derive(Debug, FromRow)]
struct PostRow {
    post_id: String,
    title: String,
    body: String,
    like_count: i64,
    image_list: String,
    comments: String,
    author: Option<String>,
    note_url: Option<String>,
}

impl PostRow {
    fn into_post(self) -> Result<Post, CoreError> {
        let image_urls: Vec<String> =
            serde_json::from_str(&self.image_list).map_err(|e| DatabaseError::CorruptRow {
                post_id: self.post_id.clone(),
                details: format!("image_list: {e}"),
            })?;
        let comments: Vec<String> =
            serde_json::from_str(&self.comments).map_err(|e| DatabaseError::CorruptRow {
                post_id: self.post_id.clone(),
                details: format!("comments: {e}"),
            })?;

        Ok(Post {
            id: self.post_id,
            like_count: self.like_count.max(0) as u64,
            title: self.title,
            text: self.body,
            image_urls,
            comments,
            author: self.author,
            url: self.note_url,
        })
    }
}

impl SqlitePostStore {
    /// Opens (creating if missing) the database at `database_url` and runs migrations.
    pub async fn connect(database_url: &str) -> Result<Self, CoreError> {
        Self::connect_with(database_url, 5).await
    }

    /// An in-memory store; a single connection keeps every query on the same database.
    pub async fn in_memory() -> Result<Self, CoreError> {
        Self::connect_with("sqlite::memory:", 1).await
    }

    async fn connect_with(database_url: &str, max_connections: u32) -> Result<Self, CoreError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("Post store ready at {}", database_url);
        Ok(store)
    }

    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id TEXT NOT NULL,
                keyword TEXT NOT NULL,
                title TEXT NOT NULL DEFAULT '',
                body TEXT NOT NULL DEFAULT '',
                like_count INTEGER NOT NULL DEFAULT 0,
                image_list TEXT NOT NULL DEFAULT '[]',
                comments TEXT NOT NULL DEFAULT '[]',
                author TEXT,
                note_url TEXT,
                UNIQUE (post_id, keyword)
            );

            CREATE INDEX IF NOT EXISTS idx_posts_keyword_likes ON posts(keyword, like_count DESC);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::MigrationFailed {
            migration: format!("create posts table: {e}"),
        })?;

        Ok(())
    }

    /// Inserts a post, or refreshes it in place when it was stored before.
    pub async fn save_post(&self, keyword: &str, post: &Post) -> Result<(), CoreError> {
        let image_list = serde_json::to_string(&post.image_urls)?;
        let comments = serde_json::to_string(&post.comments)?;
        let like_count = i64::try_from(post.like_count).unwrap_or(i64::MAX);

        sqlx::query(
            r#"
            INSERT INTO posts (post_id, keyword, title, body, like_count, image_list, comments, author, note_url)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (post_id, keyword) DO UPDATE SET
                title = excluded.title,
                body = excluded.body,
                like_count = excluded.like_count,
                image_list = excluded.image_list,
                comments = excluded.comments,
                author = excluded.author,
                note_url = excluded.note_url
            "#,
        )
        .bind(&post.id)
        .bind(keyword)
        .bind(&post.title)
        .bind(&post.text)
        .bind(like_count)
        .bind(image_list)
        .bind(comments)
        .bind(&post.author)
        .bind(&post.url)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        debug!("Saved post {} for '{}'", post.id, keyword);
        Ok(())
    }

    pub async fn save_posts(&self, keyword: &str, posts: &[Post]) -> Result<usize, CoreError> {
        for post in posts {
            self.save_post(keyword, post).await?;
        }
        info!("Saved {} posts for '{}'", posts.len(), keyword);
        Ok(posts.len())
    }

    pub async fn count(&self, keyword: &str) -> Result<usize, CoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE keyword = ?")
            .bind(keyword)
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        Ok(count.max(0) as usize)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl PostRepository for SqlitePostStore {
    async fn top_n_by_likes(&self, keyword: &str, n: usize) -> Result<Vec<Post>, CoreError> {
        let limit = i64::try_from(n).unwrap_or(i64::MAX);
        let rows: Vec<PostRow> = sqlx::query_as(
            r#"
            SELECT post_id, title, body, like_count, image_list, comments, author, note_url
            FROM posts
            WHERE keyword = ?
            ORDER BY like_count DESC, seq ASC
            LIMIT ?
            "#,
        )
        .bind(keyword)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryFailed {
            query: format!("top_n_by_likes('{keyword}', {n}): {e}"),
        })?;

        debug!("Fetched {} posts for '{}'", rows.len(), keyword);
        rows.into_iter().map(PostRow::into_post).collect()
    }
}
