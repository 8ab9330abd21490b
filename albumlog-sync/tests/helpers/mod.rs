//! Test helper utilities
//!
//! Shared builders and fakes for albumlog-sync integration tests

#![allow(dead_code)]

pub mod fake_provider;
pub mod fixtures;

pub use fake_provider::FakeProvider;
pub use fixtures::{album_details, memory_store, play_item, straight_through, MINUTE};
