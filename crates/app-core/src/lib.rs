//! Core application logic for Inkwell
//!
//! This crate contains the site's workflows: sign-up, login and logout,
//! session reconciliation against the optimistic session hint, post
//! publishing and the recent-post feed. Workflows talk to the page through
//! the [`page::Page`] trait and to the backend through the traits of
//! `backend-client`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod feeds;
pub mod page;
pub mod posts;
pub mod records;
pub mod session;
pub mod site;
pub mod validation;

pub use auth::{AuthError, AuthStage, CredentialWorkflows, Credentials};
pub use feeds::{FeedRenderer, QueryError, FEED_LIMIT};
pub use page::{ElementId, Page, PostCard, Route};
pub use posts::{preview, reading_time, PostDraft, PostError, PostPublisher};
pub use records::{PostRecord, UserRecord};
pub use session::{SessionReconciler, SessionVerdict};
pub use site::Site;
pub use validation::ValidationError;
