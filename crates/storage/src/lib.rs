//! Storage layer for Inkwell
//!
//! This crate provides the device-local key-value storage the site uses to
//! remember who was last signed in.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod kv;
pub mod memory;

pub use kv::{KvConfig, KvError, KvStore, LocalStore};
pub use memory::MemoryStore;
