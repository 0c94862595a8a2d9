//! User interface for Inkwell
//!
//! This crate provides the page layer: a headless model of the site's
//! pages implementing [`app_core::Page`], and the markup of feed entries.
//!
//! # Example
//!
//! ```rust
//! use app_core::{ElementId, Page, Route};
//! use app_ui::HeadlessPage;
//!
//! let page = HeadlessPage::new(Route::Home);
//! assert!(page.has_element(ElementId::RecentPosts));
//! assert_eq!(page.is_visible(ElementId::Logout), Some(false));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dom;
pub mod render;

pub use dom::{layout, ElementState, HeadlessPage};
pub use render::{escape_html, post_card_element, post_card_html};
