//! Post publishing
//!
//! Reads the editor form, derives the reading time and the preview from the
//! body, stores the post and refreshes the feed. Publishing requires a live
//! session; the author is always the live session's email.

use app_state::{HintStore, SubmissionGuard};
use backend_client::documents::to_fields;
use backend_client::{AuthUser, DocumentStore, IdentityService};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;

use crate::feeds::FeedRenderer;
use crate::page::{ElementId, Page};
use crate::records::{PostRecord, UserRecord, POSTS, USERS};
use crate::validation::{require, ValidationError};

/// Reading speed used for the reading time estimate
pub const WORDS_PER_MINUTE: usize = 200;

/// Notification shown after a post is stored
pub const POST_CREATED: &str = "Post created successfully!";

/// Post publishing errors
#[derive(Debug, Error)]
pub enum PostError {
    /// No live session
    #[error("You must be logged in to create a post.")]
    NotAuthenticated,

    /// Form input rejected before any network call
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// A publish is already running
    #[error("A post is already being published")]
    Busy,

    /// The document store rejected the post
    #[error("Failed to create post: {0}")]
    Store(#[source] backend_client::Error),
}

/// Result type for post operations
pub type Result<T> = std::result::Result<T, PostError>;

impl PostError {
    /// Notification to show for this failure, if any
    pub fn user_message(&self) -> Option<String> {
        match self {
            PostError::Validation(_) => Some("Please fill in all fields!".to_string()),
            PostError::Busy => None,
            other => Some(other.to_string()),
        }
    }
}

/// Estimated reading time in whole minutes, rounded up
///
/// Words are runs of non-whitespace. An empty body reads in zero minutes.
pub fn reading_time(content: &str) -> u32 {
    let words = content.split_whitespace().count();
    u32::try_from(words.div_ceil(WORDS_PER_MINUTE)).unwrap_or(u32::MAX)
}

/// First two lines of the body joined by a single space
pub fn preview(content: &str) -> String {
    content
        .split('\n')
        .take(2)
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Editor form contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDraft {
    /// Title
    pub title: String,
    /// Body text
    pub content: String,
    /// Category label
    pub category: String,
}

impl PostDraft {
    /// Create a draft
    pub fn new(title: impl Into<String>, content: impl Into<String>, category: impl Into<String>) -> Self {
        Self { title: title.into(), content: content.into(), category: category.into() }
    }

    /// Read the draft from the editor inputs
    pub fn from_page(page: &dyn Page) -> Self {
        Self {
            title: page.value(ElementId::HeadingInput).unwrap_or_default(),
            content: page.value(ElementId::ContentInput).unwrap_or_default(),
            category: page.value(ElementId::CategoryInput).unwrap_or_default(),
        }
    }

    /// Title and body are required; category may be empty
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        require("title", &self.title)?;
        require("content", &self.content)
    }
}

/// Publishes posts for the signed-in user
pub struct PostPublisher {
    identity: Arc<dyn IdentityService>,
    documents: Arc<dyn DocumentStore>,
    hints: HintStore,
    page: Arc<dyn Page>,
    feed: FeedRenderer,
    guard: SubmissionGuard,
}

impl PostPublisher {
    /// Create a publisher
    pub fn new(
        identity: Arc<dyn IdentityService>,
        documents: Arc<dyn DocumentStore>,
        hints: HintStore,
        page: Arc<dyn Page>,
        feed: FeedRenderer,
    ) -> Self {
        Self {
            identity,
            documents,
            hints,
            page,
            feed,
            guard: SubmissionGuard::new("publish"),
        }
    }

    /// Publish the draft in the editor form
    pub async fn publish(&self) -> Result<String> {
        let draft = PostDraft::from_page(self.page.as_ref());
        self.publish_draft(&draft).await
    }

    /// Publish a draft, returning the new post's id
    pub async fn publish_draft(&self, draft: &PostDraft) -> Result<String> {
        let result = self.try_publish(draft).await;
        if let Err(e) = &result {
            match e {
                PostError::Busy => tracing::warn!("Publish ignored: {}", e),
                _ => tracing::error!("Error creating post: {}", e),
            }
            if let Some(message) = e.user_message() {
                self.page.alert(&message);
            }
        }
        result
    }

    async fn try_publish(&self, draft: &PostDraft) -> Result<String> {
        let user = self.identity.current_user().ok_or(PostError::NotAuthenticated)?;
        draft.validate()?;
        let _in_flight = self.guard.try_begin().ok_or(PostError::Busy)?;

        let record = PostRecord::compose(draft, &user.email, Utc::now());
        let fields = to_fields(&record).map_err(PostError::Store)?;
        let id = self.documents.add(POSTS, fields).await.map_err(PostError::Store)?;
        tracing::info!("Post {} created by {}", id, user.email);

        self.page.alert(POST_CREATED);
        self.page.set_value(ElementId::HeadingInput, "");
        self.page.set_value(ElementId::ContentInput, "");

        self.bump_post_count(&user).await;
        self.feed.refresh().await;
        Ok(id)
    }

    /// Best-effort increment of the author's post count, in the user record
    /// and in the session hint
    async fn bump_post_count(&self, user: &AuthUser) {
        let count = match self.increment_user_record(user).await {
            Ok(Some(count)) => count,
            Ok(None) => {
                tracing::warn!("No user record for {}, post count not updated", user.email);
                return;
            }
            Err(e) => {
                tracing::warn!("Failed to update post count for {}: {}", user.email, e);
                return;
            }
        };

        match self.hints.load() {
            Ok(Some(hint)) if hint.email == user.email => {
                if let Err(e) = self.hints.set_post_count(count) {
                    tracing::warn!("Failed to update cached post count: {}", e);
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Failed to read session hint: {}", e),
        }
    }

    async fn increment_user_record(&self, user: &AuthUser) -> backend_client::Result<Option<u32>> {
        let Some(document) = self.documents.get(USERS, &user.uid).await? else {
            return Ok(None);
        };

        let mut record: UserRecord = document.decode()?;
        record.posts = record.posts.saturating_add(1);
        self.documents.set(USERS, &user.uid, to_fields(&record)?).await?;
        Ok(Some(record.posts))
    }
}
