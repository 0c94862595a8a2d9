//! Recent-post feed
//!
//! Queries the newest posts and renders them into the feed container,
//! replacing whatever it held before.

use backend_client::{DocumentStore, Query};
use std::sync::Arc;
use thiserror::Error;

use crate::page::{ElementId, Page, PostCard};
use crate::records::{PostRecord, POSTS, UPLOAD_DATE};

/// Number of posts shown in the feed
pub const FEED_LIMIT: usize = 5;

/// Feed query errors
#[derive(Debug, Error)]
pub enum QueryError {
    /// The document store query failed
    #[error("Error fetching posts: {0}")]
    Store(#[from] backend_client::Error),
}

/// Result type for feed operations
pub type Result<T> = std::result::Result<T, QueryError>;

/// Query for the newest posts, newest first
pub fn recent_posts_query() -> Query {
    Query::collection(POSTS, UPLOAD_DATE)
        .descending()
        .limit(FEED_LIMIT)
}

/// Renders the recent-post feed
#[derive(Clone)]
pub struct FeedRenderer {
    documents: Arc<dyn DocumentStore>,
    page: Arc<dyn Page>,
}

impl FeedRenderer {
    /// Create a renderer
    pub fn new(documents: Arc<dyn DocumentStore>, page: Arc<dyn Page>) -> Self {
        Self { documents, page }
    }

    /// Fetch the newest posts as cards
    ///
    /// Documents that do not decode as posts are skipped.
    pub async fn fetch_recent(&self) -> Result<Vec<PostCard>> {
        let documents = self.documents.query(&recent_posts_query()).await?;

        let cards = documents
            .iter()
            .filter_map(|doc| match doc.decode::<PostRecord>() {
                Ok(record) => Some(PostCard::from(&record)),
                Err(e) => {
                    tracing::warn!("Skipping malformed post {}: {}", doc.id, e);
                    None
                }
            })
            .collect();

        Ok(cards)
    }

    /// Replace the feed container's contents with the newest posts
    ///
    /// Returns the number of cards rendered. Failures are logged and leave
    /// the container empty.
    pub async fn refresh(&self) -> usize {
        if !self.page.has_element(ElementId::RecentPosts) {
            tracing::error!("Recent posts container not found!");
            return 0;
        }

        self.page.clear_children(ElementId::RecentPosts);

        match self.fetch_recent().await {
            Ok(cards) => {
                for card in &cards {
                    self.page.append_post_card(ElementId::RecentPosts, card);
                }
                tracing::debug!("Rendered {} recent posts", cards.len());
                cards.len()
            }
            Err(e) => {
                tracing::error!("{}", e);
                0
            }
        }
    }
}
