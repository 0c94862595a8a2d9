//! Application state for Inkwell
//!
//! This crate holds the client-side state shared between workflows: the
//! optimistic session hint and the in-flight submission guards.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod session;
pub mod submission;

pub use session::{HintStore, InvalidationReason, SessionHint, SessionHintError};
pub use submission::{InFlight, SubmissionGuard};
